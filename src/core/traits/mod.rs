use crate::core::error::ProbeError;
use crate::core::model::{ArgumentSchema, Test, TestOptions};
use async_trait::async_trait;

/// A pluggable check for one service protocol.
///
/// `arguments` and `example` are pure and are consulted before any network
/// activity. `run_test` performs the live check; every call owns its own
/// connection, so one instance may serve many targets concurrently.
#[async_trait]
pub trait ProtocolTest: Send + Sync {
    fn arguments(&self) -> ArgumentSchema;

    fn example(&self) -> &'static str;

    async fn run_test(
        &self,
        test: &Test,
        target: &str,
        opts: &TestOptions,
    ) -> Result<(), ProbeError>;
}
