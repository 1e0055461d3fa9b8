//! # Function table
//!
//! Host and library functions callable from expressions and `CALL`. Script routines a
//! library exports sit in the same table as native functions.

pub mod builtins;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::{mapref::entry::Entry, DashMap};
use tracing::debug;

use crate::ast::Program;
use crate::eval::{EvalError, Value, ValueMap};

/// Arguments as the call site wrote them.
#[derive(Debug, Clone, PartialEq)]
pub enum CallArgs {
    Positional(Vec<Value>),
    Named(ValueMap),
}

impl CallArgs {
    pub fn len(&self) -> usize {
        match self {
            CallArgs::Positional(values) => values.len(),
            CallArgs::Named(map) => map.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Positional argument `index` (0-based). Named calls have none.
    pub fn get(&self, index: usize) -> Option<&Value> {
        match self {
            CallArgs::Positional(values) => values.get(index),
            CallArgs::Named(_) => None,
        }
    }

    pub fn named(&self, key: &str) -> Option<&Value> {
        match self {
            CallArgs::Named(map) => map.get_ignore_case(key),
            CallArgs::Positional(_) => None,
        }
    }

    pub fn into_values(self) -> Vec<Value> {
        match self {
            CallArgs::Positional(values) => values,
            CallArgs::Named(map) => map.into_iter().map(|(_, value)| value).collect(),
        }
    }
}

#[async_trait]
pub trait NativeFunction: Send + Sync {
    async fn call(&self, args: CallArgs) -> Result<Value, EvalError>;
}

/// Adapts a synchronous closure.
pub struct SyncFunction<F>(pub F);

#[async_trait]
impl<F> NativeFunction for SyncFunction<F>
where
    F: Fn(&CallArgs) -> Result<Value, EvalError> + Send + Sync,
{
    async fn call(&self, args: CallArgs) -> Result<Value, EvalError> {
        (self.0)(&args)
    }
}

#[derive(Clone)]
pub enum FunctionEntry {
    Native(Arc<dyn NativeFunction>),
    /// A routine starting at `label` inside a loaded library program.
    Script { program: Arc<Program>, label: String },
}

impl FunctionEntry {
    pub fn native<F>(f: F) -> Self
    where
        F: Fn(&CallArgs) -> Result<Value, EvalError> + Send + Sync + 'static,
    {
        FunctionEntry::Native(Arc::new(SyncFunction(f)))
    }
}

impl fmt::Debug for FunctionEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FunctionEntry::Native(_) => write!(f, "Native"),
            FunctionEntry::Script { label, .. } => write!(f, "Script({})", label),
        }
    }
}

#[derive(Debug, Default)]
pub struct FunctionRegistry {
    entries: DashMap<String, FunctionEntry>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_builtins() -> Self {
        let registry = Self::new();
        builtins::install(&registry);
        registry
    }

    /// Adds `name` unless it is taken. Returns false on conflict.
    pub fn register(&self, name: &str, entry: FunctionEntry) -> bool {
        match self.entries.entry(name.to_uppercase()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                debug!(function = %slot.key(), "registered function");
                slot.insert(entry);
                true
            }
        }
    }

    /// Adds or replaces `name`.
    pub fn insert(&self, name: &str, entry: FunctionEntry) {
        self.entries.insert(name.to_uppercase(), entry);
    }

    pub fn unregister(&self, name: &str) -> Option<FunctionEntry> {
        self.entries
            .remove(&name.to_uppercase())
            .map(|(_, entry)| entry)
    }

    pub fn get(&self, name: &str) -> Option<FunctionEntry> {
        self.entries
            .get(&name.to_uppercase())
            .map(|entry| entry.value().clone())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(&name.to_uppercase())
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }
}
