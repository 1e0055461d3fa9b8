use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;

use super::{LoadRequest, LoadedModule, ResolutionError};
use crate::session::InterpreterSession;

/// One link of the REQUIRE chain. `Ok(None)` passes the request to the next resolver;
/// an `Err` ends resolution.
#[async_trait]
pub trait LibraryResolver: Send + Sync {
    fn name(&self) -> &str;

    async fn resolve(
        &self,
        request: &LoadRequest,
        session: &InterpreterSession,
    ) -> Result<Option<LoadedModule>, ResolutionError>;
}

pub type ModuleFactory = Arc<dyn Fn() -> Result<LoadedModule, ResolutionError> + Send + Sync>;

/// Modules the host registers by identifier. Publisher, registry and bundle lookups
/// plug in here, or as their own [`LibraryResolver`]s.
#[derive(Default)]
pub struct StaticResolver {
    name: String,
    modules: DashMap<String, ModuleFactory>,
}

impl StaticResolver {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            modules: DashMap::new(),
        }
    }

    pub fn with_module<F>(self, identifier: &str, factory: F) -> Self
    where
        F: Fn() -> Result<LoadedModule, ResolutionError> + Send + Sync + 'static,
    {
        self.add_module(identifier, factory);
        self
    }

    pub fn add_module<F>(&self, identifier: &str, factory: F)
    where
        F: Fn() -> Result<LoadedModule, ResolutionError> + Send + Sync + 'static,
    {
        self.modules
            .insert(identifier.trim().to_string(), Arc::new(factory));
    }

    pub fn identifiers(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.modules.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }
}

#[async_trait]
impl LibraryResolver for StaticResolver {
    fn name(&self) -> &str {
        &self.name
    }

    async fn resolve(
        &self,
        request: &LoadRequest,
        _session: &InterpreterSession,
    ) -> Result<Option<LoadedModule>, ResolutionError> {
        let factory = self
            .modules
            .get(&request.identifier)
            .map(|entry| entry.value().clone());
        match factory {
            Some(factory) => factory().map(Some),
            None => Ok(None),
        }
    }
}
