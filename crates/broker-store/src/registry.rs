//! Backend registry: maps configured handler classes to async factories.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;

use broker_core::config::store::HandlerConfig;
use broker_core::error::BrokerError;
use broker_core::result::BrokerResult;
use broker_core::traits::{ResourceLocator, StorageBackend};

/// Everything a backend factory gets to build and initialize a backend.
#[derive(Debug, Clone)]
pub struct BackendContext {
    /// Owning store id.
    pub store_id: String,
    /// Handler section of the store configuration.
    pub handler: HandlerConfig,
    /// Optional locator for networked backends.
    pub locator: Option<Arc<dyn ResourceLocator>>,
}

/// Builds and initializes a backend.
pub type BackendFactory = Arc<
    dyn Fn(BackendContext) -> BoxFuture<'static, BrokerResult<Arc<dyn StorageBackend>>>
        + Send
        + Sync,
>;

/// Registry of backend factories, resolved once per store initialization.
#[derive(Clone, Default)]
pub struct BackendRegistry {
    /// Handler class → factory.
    factories: HashMap<String, BackendFactory>,
}

impl BackendRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with every compiled-in backend registered.
    pub fn with_builtins() -> Self {
        #[allow(unused_mut)]
        let mut registry = Self::new();

        #[cfg(feature = "memory")]
        registry.register("memory", |_ctx| async move {
            Ok(Arc::new(crate::memory::MemoryBackend::new()) as Arc<dyn StorageBackend>)
        });

        #[cfg(feature = "sql")]
        registry.register("sql", |ctx| async move {
            let backend = crate::sql::SqlBackend::init(&ctx).await?;
            Ok(Arc::new(backend) as Arc<dyn StorageBackend>)
        });

        #[cfg(feature = "redis-backend")]
        registry.register("redis", |ctx| async move {
            let backend = crate::redis::RedisBackend::init(&ctx).await?;
            Ok(Arc::new(backend) as Arc<dyn StorageBackend>)
        });

        registry
    }

    /// Register a factory under `class`, replacing any previous one.
    pub fn register<F, Fut>(&mut self, class: impl Into<String>, factory: F)
    where
        F: Fn(BackendContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = BrokerResult<Arc<dyn StorageBackend>>> + Send + 'static,
    {
        let factory: BackendFactory = Arc::new(move |ctx| Box::pin(factory(ctx)));
        self.factories.insert(class.into(), factory);
    }

    /// Look up the factory for a handler class.
    pub fn resolve(&self, class: &str) -> BrokerResult<BackendFactory> {
        self.factories.get(class).cloned().ok_or_else(|| {
            BrokerError::configuration(format!(
                "Unknown storage backend '{class}'. Registered: {}",
                self.names().join(", ")
            ))
        })
    }

    fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl fmt::Debug for BackendRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendRegistry")
            .field("classes", &self.names())
            .finish()
    }
}
