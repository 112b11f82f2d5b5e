//! Broker wiring: resource groups and expiring stores built from configuration.

use std::collections::HashMap;
use std::sync::Arc;

use broker_core::config::BrokerConfig;
use broker_core::error::BrokerError;
use broker_core::result::BrokerResult;
use broker_core::traits::ResourceLocator;
use broker_resource::{PollingRegistry, ResourceGroup};
use broker_store::{BackendRegistry, ExpiringStore};

/// Every configured resource group and store, owned for the process lifetime.
#[derive(Debug, Default)]
pub struct Broker {
    groups: HashMap<String, Arc<ResourceGroup>>,
    stores: HashMap<String, Arc<ExpiringStore>>,
}

impl Broker {
    /// Build groups first, then stores, so stores can connect through a
    /// named group. If anything fails, what was already built is destroyed.
    pub async fn start(
        config: &BrokerConfig,
        polling: &PollingRegistry,
        backends: &BackendRegistry,
    ) -> BrokerResult<Self> {
        let mut broker = Self::default();
        if let Err(e) = broker.build(config, polling, backends).await {
            broker.shutdown().await;
            return Err(e);
        }
        Ok(broker)
    }

    async fn build(
        &mut self,
        config: &BrokerConfig,
        polling: &PollingRegistry,
        backends: &BackendRegistry,
    ) -> BrokerResult<()> {
        for group_config in &config.resource_groups {
            if self.groups.contains_key(&group_config.id) {
                return Err(BrokerError::configuration(format!(
                    "Duplicate resource group id '{}'",
                    group_config.id
                )));
            }
            let group = ResourceGroup::init(group_config, polling)?;
            self.groups.insert(group_config.id.clone(), group);
        }

        for store_config in &config.stores {
            if self.stores.contains_key(&store_config.id) {
                return Err(BrokerError::configuration(format!(
                    "Duplicate store id '{}'",
                    store_config.id
                )));
            }
            let locator = match &store_config.resource_group {
                Some(name) => {
                    let group = self.groups.get(name).ok_or_else(|| {
                        BrokerError::configuration(format!(
                            "Store '{}' refers to unknown resource group '{name}'",
                            store_config.id
                        ))
                    })?;
                    Some(Arc::clone(group) as Arc<dyn ResourceLocator>)
                }
                None => None,
            };
            let store = ExpiringStore::init(store_config, backends, locator).await?;
            self.stores.insert(store_config.id.clone(), Arc::new(store));
        }

        Ok(())
    }

    /// Look up a resource group by id.
    pub fn group(&self, id: &str) -> Option<&Arc<ResourceGroup>> {
        self.groups.get(id)
    }

    /// Look up a store by id.
    pub fn store(&self, id: &str) -> Option<&Arc<ExpiringStore>> {
        self.stores.get(id)
    }

    /// Destroy stores, then groups. Safe to call more than once.
    pub async fn shutdown(&self) {
        for store in self.stores.values() {
            store.destroy().await;
        }
        for group in self.groups.values() {
            group.destroy();
        }
    }
}
