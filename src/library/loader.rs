use std::sync::Arc;

use async_recursion::async_recursion;
use dashmap::DashMap;
use tokio::sync::OnceCell;
use tracing::{debug, info, instrument, warn};

use super::{
    LibraryRegistration, LibraryResolver, LibraryType, LoadRequest, LoadedModule,
    ResolutionError,
};
use crate::event::event_bus::Event;
use crate::session::InterpreterSession;

type CacheSlot = Arc<OnceCell<Arc<LibraryRegistration>>>;

/// Resolver chain plus a per-identifier load cache. The first REQUIRE of an identifier
/// loads it; concurrent REQUIREs of the same identifier wait for that one load. A failed
/// load leaves the slot empty so a later REQUIRE tries again.
pub struct LibraryLoader {
    resolvers: Vec<Arc<dyn LibraryResolver>>,
    cache: DashMap<String, CacheSlot>,
}

impl LibraryLoader {
    pub fn new(resolvers: Vec<Arc<dyn LibraryResolver>>) -> Self {
        Self {
            resolvers,
            cache: DashMap::new(),
        }
    }

    pub fn resolver_names(&self) -> Vec<String> {
        self.resolvers
            .iter()
            .map(|resolver| resolver.name().to_string())
            .collect()
    }

    pub fn cached(&self, identifier: &str) -> Option<Arc<LibraryRegistration>> {
        self.cache
            .get(identifier.trim())
            .and_then(|slot| slot.get().cloned())
    }

    pub fn loaded(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .cache
            .iter()
            .filter(|entry| entry.value().initialized())
            .map(|entry| entry.key().clone())
            .collect();
        ids.sort();
        ids
    }

    #[async_recursion]
    pub async fn require(
        &self,
        request: &LoadRequest,
        session: &InterpreterSession,
    ) -> Result<Arc<LibraryRegistration>, ResolutionError> {
        if request.loading.contains(&request.identifier) {
            let mut chain = request.loading.clone();
            chain.push(request.identifier.clone());
            return Err(ResolutionError::Cycle(chain.join(" -> ")));
        }
        let slot = self
            .cache
            .entry(request.identifier.clone())
            .or_default()
            .clone();
        let registration = slot
            .get_or_try_init(|| self.load(request, session))
            .await?
            .clone();
        let requested = request.alias.as_ref().map(|a| a.to_uppercase());
        if registration.alias != requested {
            warn!(
                identifier = %request.identifier,
                "already loaded as {:?}; keeping the first registration",
                registration.alias
            );
        }
        Ok(registration)
    }

    #[instrument(level = "debug", skip(self, session), fields(identifier = %request.identifier))]
    async fn load(
        &self,
        request: &LoadRequest,
        session: &InterpreterSession,
    ) -> Result<Arc<LibraryRegistration>, ResolutionError> {
        let identifier = request.identifier.as_str();
        let module = self.resolve(request, session).await?;
        let descriptor = &module.descriptor;
        descriptor.validate(identifier)?;

        for dependency in descriptor.dependencies.keys() {
            let base_dir = module.base_dir.clone().or_else(|| request.base_dir.clone());
            let dependency = request.dependency(dependency, base_dir);
            self.require(&dependency, session).await?;
        }

        let prefix = request.alias.as_ref().map(|alias| alias.to_uppercase());
        let functions: Vec<_> = module
            .functions
            .iter()
            .map(|(name, entry)| {
                let name = name.to_uppercase();
                let name = match &prefix {
                    Some(prefix) => format!("{}.{}", prefix, name),
                    None => name,
                };
                (name, entry.clone())
            })
            .collect();
        if let Some((name, _)) = functions
            .iter()
            .find(|(name, _)| session.functions().contains(name))
        {
            return Err(conflict(identifier, name));
        }

        let target = match descriptor.kind() {
            LibraryType::AddressHandler => {
                let declared = descriptor.provides.address_target.clone().unwrap_or_default();
                let name = prefix.clone().unwrap_or_else(|| declared.to_uppercase());
                let handler = module.handler.clone().ok_or_else(|| {
                    ResolutionError::InvalidDescriptor {
                        identifier: identifier.to_string(),
                        message: "address-handler provides no handler".to_string(),
                    }
                })?;
                if session.addresses().contains(&name) {
                    return Err(conflict(identifier, &name));
                }
                Some((name, handler))
            }
            LibraryType::FunctionsLibrary => None,
        };

        // a library lands whole or not at all
        let address_target = match target {
            Some((name, handler)) => {
                session
                    .addresses()
                    .register(&name, handler, descriptor.target_metadata())
                    .map_err(|_| conflict(identifier, &name))?;
                Some(name)
            }
            None => None,
        };
        for (index, (name, entry)) in functions.iter().enumerate() {
            if !session.functions().register(name, entry.clone()) {
                for (registered, _) in &functions[..index] {
                    session.functions().unregister(registered);
                }
                if let Some(target) = &address_target {
                    session.addresses().unregister(target);
                }
                return Err(conflict(identifier, name));
            }
        }
        if let Some(name) = &address_target {
            publish(
                session,
                Event::TargetRegistered {
                    name: name.clone(),
                    library: Some(descriptor.name.clone()),
                },
            );
        }

        publish(
            session,
            Event::LibraryLoaded {
                identifier: identifier.to_string(),
                name: descriptor.name.clone(),
                version: descriptor.version.clone(),
            },
        );
        info!(
            name = %descriptor.name,
            version = %descriptor.version,
            functions = functions.len(),
            "library loaded"
        );
        Ok(Arc::new(LibraryRegistration {
            identifier: identifier.to_string(),
            descriptor: module.descriptor.clone(),
            alias: prefix,
            functions: functions.into_iter().map(|(name, _)| name).collect(),
            address_target,
        }))
    }

    async fn resolve(
        &self,
        request: &LoadRequest,
        session: &InterpreterSession,
    ) -> Result<LoadedModule, ResolutionError> {
        for resolver in &self.resolvers {
            if let Some(module) = resolver.resolve(request, session).await? {
                debug!(resolver = resolver.name(), "resolved");
                return Ok(module);
            }
        }
        Err(ResolutionError::NotFound(request.identifier.clone()))
    }
}

fn conflict(identifier: &str, name: &str) -> ResolutionError {
    ResolutionError::Conflict {
        identifier: identifier.to_string(),
        name: name.to_string(),
    }
}

fn publish(session: &InterpreterSession, event: Event) {
    if let Err(e) = session.event_bus().sync_publish(event) {
        warn!("event not published: {}", e);
    }
}
