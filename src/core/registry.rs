use crate::core::traits::ProtocolTest;
use std::collections::BTreeMap;
use std::fmt;

pub type ProbeFactory = Box<dyn Fn() -> Box<dyn ProtocolTest> + Send + Sync>;

/// Name → factory table the scheduler uses to turn a rule keyword into a
/// probe instance. Populated once at startup and read-only afterwards.
#[derive(Default)]
pub struct Registry {
    factories: BTreeMap<String, ProbeFactory>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every probe compiled into this build.
    pub fn builtin() -> Self {
        let mut registry = Self::new();

        #[cfg(feature = "mail")]
        crate::contexts::mail::register(&mut registry);

        registry
    }

    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn() -> Box<dyn ProtocolTest> + Send + Sync + 'static,
    {
        let name = name.into();
        if self
            .factories
            .insert(name.clone(), Box::new(factory))
            .is_some()
        {
            tracing::warn!(probe = %name, "replacing previously registered probe");
        }
    }

    /// Builds a fresh instance of the probe registered under `name`.
    pub fn lookup(&self, name: &str) -> Option<Box<dyn ProtocolTest>> {
        self.factories.get(name).map(|factory| factory())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("probes", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}
