use std::sync::Arc;

use dashmap::{mapref::entry::Entry, DashMap};
use tracing::{debug, instrument};

use super::dispatch::DispatchError;
use super::handler::{AddressHandler, AddressTarget, TargetMetadata};

/// Name → target, case-insensitive. A name is written once; concurrent readers never block
/// each other.
#[derive(Debug, Default)]
pub struct AddressRegistry {
    targets: DashMap<String, Arc<AddressTarget>>,
}

impl AddressRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    #[instrument(level = "debug", skip(self, handler))]
    pub fn register(
        &self,
        name: &str,
        handler: Arc<dyn AddressHandler>,
        metadata: TargetMetadata,
    ) -> Result<Arc<AddressTarget>, DispatchError> {
        let key = name.to_uppercase();
        match self.targets.entry(key.clone()) {
            Entry::Occupied(_) => Err(DispatchError::AlreadyRegistered(key)),
            Entry::Vacant(entry) => {
                let target = Arc::new(AddressTarget {
                    name: key,
                    handler,
                    metadata,
                });
                entry.insert(target.clone());
                debug!("registered ADDRESS target");
                Ok(target)
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<AddressTarget>> {
        self.targets
            .get(&name.to_uppercase())
            .map(|entry| entry.value().clone())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.targets.contains_key(&name.to_uppercase())
    }

    pub fn unregister(&self, name: &str) -> Option<Arc<AddressTarget>> {
        self.targets
            .remove(&name.to_uppercase())
            .map(|(_, target)| target)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.targets.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }
}
