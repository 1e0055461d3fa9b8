//! # REQUIRE resolution
//!
//! `REQUIRE "id" [AS alias]` walks an ordered chain of [`LibraryResolver`]s. The first one
//! that recognizes the identifier produces a [`LoadedModule`]. The [`LibraryLoader`]
//! validates its descriptor, loads its dependencies, registers its functions and ADDRESS
//! target, and caches the resulting [`LibraryRegistration`] per identifier.

pub mod descriptor;
pub mod loader;
pub mod local;
pub mod resolver;

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

use crate::address::AddressHandler;
use crate::functions::FunctionEntry;

pub use descriptor::{LibraryDescriptor, LibraryMetadata, LibraryType, Provides};
pub use loader::LibraryLoader;
pub use local::LocalFileResolver;
pub use resolver::{LibraryResolver, ModuleFactory, StaticResolver};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ResolutionError {
    #[error("library '{0}' was not found by any resolver")]
    NotFound(String),
    #[error("invalid descriptor for '{identifier}': {message}")]
    InvalidDescriptor { identifier: String, message: String },
    #[error("failed to load '{identifier}': {message}")]
    LoadFailed { identifier: String, message: String },
    #[error("circular REQUIRE: {0}")]
    Cycle(String),
    #[error("'{name}' from '{identifier}' is already registered")]
    Conflict { identifier: String, name: String },
}

/// One REQUIRE as the loader sees it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadRequest {
    pub identifier: String,
    pub alias: Option<String>,
    /// Directory of the requiring script.
    pub base_dir: Option<PathBuf>,
    /// Identifiers currently being loaded, outermost first.
    pub loading: Vec<String>,
}

impl LoadRequest {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into().trim().to_string(),
            ..Default::default()
        }
    }

    pub fn with_alias(mut self, alias: Option<String>) -> Self {
        self.alias = alias;
        self
    }

    pub fn with_base_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.base_dir = dir;
        self
    }

    fn dependency(&self, identifier: &str, base_dir: Option<PathBuf>) -> Self {
        let mut loading = self.loading.clone();
        loading.push(self.identifier.clone());
        Self {
            identifier: identifier.trim().to_string(),
            alias: None,
            base_dir,
            loading,
        }
    }
}

/// What a resolver hands back before anything is registered.
#[derive(Clone)]
pub struct LoadedModule {
    pub descriptor: LibraryDescriptor,
    /// Exported functions under their unaliased names.
    pub functions: Vec<(String, FunctionEntry)>,
    pub handler: Option<Arc<dyn AddressHandler>>,
    /// Where relative dependencies of this module resolve from.
    pub base_dir: Option<PathBuf>,
}

impl LoadedModule {
    pub fn new(descriptor: LibraryDescriptor) -> Self {
        Self {
            descriptor,
            functions: Vec::new(),
            handler: None,
            base_dir: None,
        }
    }

    pub fn with_function(mut self, name: &str, entry: FunctionEntry) -> Self {
        self.functions.push((name.to_uppercase(), entry));
        self
    }

    pub fn with_handler(mut self, handler: Arc<dyn AddressHandler>) -> Self {
        self.handler = Some(handler);
        self
    }
}

impl fmt::Debug for LoadedModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedModule")
            .field("descriptor", &self.descriptor)
            .field(
                "functions",
                &self.functions.iter().map(|(n, _)| n).collect::<Vec<_>>(),
            )
            .field("handler", &self.handler.is_some())
            .finish()
    }
}

/// A loaded library as the session registered it.
#[derive(Debug, Clone, PartialEq)]
pub struct LibraryRegistration {
    pub identifier: String,
    pub descriptor: LibraryDescriptor,
    pub alias: Option<String>,
    /// Registered function names, alias prefix included.
    pub functions: Vec<String>,
    /// Registered ADDRESS target name, alias applied.
    pub address_target: Option<String>,
}
