//! Polling method registry: maps configured method names to factories.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use broker_core::config::resource::PollingConfig;
use broker_core::error::BrokerError;
use broker_core::result::BrokerResult;
use broker_core::traits::PollingMethod;
use broker_core::types::ResourceAttributes;

/// Builds a polling method for one resource from its polling settings and
/// connection attributes.
pub type PollingFactory = Arc<
    dyn Fn(&PollingConfig, &ResourceAttributes) -> BrokerResult<Arc<dyn PollingMethod>>
        + Send
        + Sync,
>;

/// Registry of polling method factories, resolved once at startup.
#[derive(Clone, Default)]
pub struct PollingRegistry {
    /// Method name → factory.
    factories: HashMap<String, PollingFactory>,
}

impl PollingRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the built-in methods registered.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("tcp", |config, attrs| {
            let method = crate::polling::tcp::TcpPoll::from_attributes(config, attrs)?;
            Ok(Arc::new(method) as Arc<dyn PollingMethod>)
        });
        #[cfg(feature = "sql")]
        registry.register("sql", |config, attrs| {
            let method = crate::polling::sql::SqlPoll::from_attributes(config, attrs)?;
            Ok(Arc::new(method) as Arc<dyn PollingMethod>)
        });
        registry
    }

    /// Register a factory under `name`, replacing any previous one.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn(&PollingConfig, &ResourceAttributes) -> BrokerResult<Arc<dyn PollingMethod>>
            + Send
            + Sync
            + 'static,
    {
        self.factories.insert(name.into(), Arc::new(factory));
    }

    /// Construct the polling method named in `config`.
    pub fn build(
        &self,
        config: &PollingConfig,
        attributes: &ResourceAttributes,
    ) -> BrokerResult<Arc<dyn PollingMethod>> {
        let factory = self.factories.get(&config.method).ok_or_else(|| {
            BrokerError::configuration(format!(
                "Unknown polling method '{}'. Registered: {}",
                config.method,
                self.names().join(", ")
            ))
        })?;
        factory(config, attributes)
    }

    fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl fmt::Debug for PollingRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PollingRegistry")
            .field("methods", &self.names())
            .finish()
    }
}
