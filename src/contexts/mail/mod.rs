use crate::core::registry::Registry;

pub mod clients;
pub mod probes;

pub(crate) fn register(registry: &mut Registry) {
    registry.register("pop3s", || Box::new(probes::Pop3sTest::new()));
}
