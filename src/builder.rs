use std::sync::Arc;

use crate::{
    Config, Engine, Result,
    breaking::BreakingChangeRegistry,
    catalog::{NodeCatalog, StaticCatalog},
    diff::PortRegistry,
    store::{MemStore, WorkflowStore},
};

#[derive(Default)]
pub struct EngineBuilder {
    config: Config,
    catalog: Option<Arc<dyn NodeCatalog>>,
    registry: Option<Arc<BreakingChangeRegistry>>,
    store: Option<Arc<dyn WorkflowStore>>,
    ports: Option<PortRegistry>,
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(
        mut self,
        config: Config,
    ) -> Self {
        self.config = config;
        self
    }

    pub fn catalog(
        mut self,
        catalog: Arc<dyn NodeCatalog>,
    ) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn registry(
        mut self,
        registry: Arc<BreakingChangeRegistry>,
    ) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn store(
        mut self,
        store: Arc<dyn WorkflowStore>,
    ) -> Self {
        self.store = Some(store);
        self
    }

    pub fn ports(
        mut self,
        ports: PortRegistry,
    ) -> Self {
        self.ports = Some(ports);
        self
    }

    /// Build the engine. Anything not set falls back to the built-in catalog,
    /// the built-in registry and an in-memory store sized from the config.
    pub fn build(self) -> Result<Engine> {
        let catalog = match self.catalog {
            Some(catalog) => catalog,
            None => Arc::new(StaticCatalog::builtin()?),
        };
        let registry = match self.registry {
            Some(registry) => registry,
            None => Arc::new(BreakingChangeRegistry::builtin()?),
        };
        let store = self.store.unwrap_or_else(|| Arc::new(MemStore::new(self.config.store.initial_capacity)));
        let engine = Engine::from_parts(self.config, catalog, registry, store, self.ports.unwrap_or_default());

        Ok(engine)
    }
}
