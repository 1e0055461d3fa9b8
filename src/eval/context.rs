use std::collections::HashMap;
use std::path::PathBuf;

use uuid::Uuid;

use super::{EvalError, EvalResult, Value, ValueMap, MAX_CALL_DEPTH};
use crate::ast::{Span, TrapMode};
use crate::config::SessionConfig;

/// One call frame's variable pool. Keys are fully resolved, uppercased names: `X`, `A.1`,
/// and `A.` for a stem default.
#[derive(Debug, Clone, Default)]
pub struct Frame {
    variables: HashMap<String, Value>,
    pub arguments: Vec<Value>,
    pub routine: Option<String>,
    exposed: Vec<String>,
}

impl Frame {
    pub fn new(routine: Option<String>, arguments: Vec<Value>) -> Self {
        Self {
            routine,
            arguments,
            ..Default::default()
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.variables.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.variables.insert(key.into(), value);
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.variables.remove(key)
    }

    fn remove_prefixed(&mut self, prefix: &str) {
        self.variables.retain(|key, _| !key.starts_with(prefix));
    }

    fn prefixed(&self, prefix: &str) -> Vec<(String, Value)> {
        self.variables
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }

    /// Snapshot in name order.
    pub fn snapshot(&self) -> ValueMap {
        let mut entries: Vec<_> = self.variables.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        entries
            .into_iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }
}

/// The armed error trap.
#[derive(Debug, Clone, PartialEq)]
pub struct Trap {
    pub mode: TrapMode,
    pub label: String,
}

/// Per-run interpreter state, owned by exactly one running script.
#[derive(Debug)]
pub struct ExecutionContext {
    pub execution_id: Uuid,
    frames: Vec<Frame>,
    address: Option<String>,
    previous_address: Option<String>,
    pub digits: u64,
    pub strict_variables: bool,
    pub trap: Option<Trap>,
    /// Innermost clause of the failure currently unwinding.
    pub error_location: Option<Span>,
    /// Directory that relative REQUIRE paths start from.
    pub script_dir: Option<PathBuf>,
    checkpoint_sequence: u64,
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self::new(&SessionConfig::default())
    }
}

impl ExecutionContext {
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            execution_id: Uuid::new_v4(),
            frames: vec![Frame::default()],
            address: config.default_address.as_ref().map(|name| name.to_uppercase()),
            previous_address: None,
            digits: config.numeric_digits,
            strict_variables: config.strict_variables,
            trap: None,
            error_location: None,
            script_dir: None,
            checkpoint_sequence: 0,
        }
    }

    pub fn with_script_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.script_dir = dir;
        self
    }

    // Frames

    pub fn frame(&self) -> &Frame {
        // the top-level frame is never popped
        &self.frames[self.frames.len() - 1]
    }

    fn frame_mut(&mut self) -> &mut Frame {
        let last = self.frames.len() - 1;
        &mut self.frames[last]
    }

    pub fn global_frame(&self) -> &Frame {
        &self.frames[0]
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn push_frame(&mut self, frame: Frame) -> EvalResult<()> {
        if self.frames.len() >= MAX_CALL_DEPTH {
            return Err(EvalError::RecursionLimit(MAX_CALL_DEPTH));
        }
        self.frames.push(frame);
        Ok(())
    }

    /// Pops the current frame and writes exposed variables back to the caller.
    pub fn pop_frame(&mut self) -> Option<Frame> {
        if self.frames.len() < 2 {
            return None;
        }
        let frame = self.frames.pop()?;
        let caller = self.frame_mut();
        for name in &frame.exposed {
            if name.ends_with('.') {
                caller.remove_prefixed(name);
                for (key, value) in frame.prefixed(name) {
                    caller.insert(key, value);
                }
            } else {
                match frame.get(name) {
                    Some(value) => caller.insert(name.clone(), value.clone()),
                    None => {
                        caller.remove(name);
                    }
                }
            }
        }
        Some(frame)
    }

    /// `PROCEDURE EXPOSE`: copies the named caller variables (or whole stems) into the
    /// current frame and marks them for write-back.
    pub fn expose(&mut self, names: &[String]) {
        if self.frames.len() < 2 {
            return;
        }
        let caller_index = self.frames.len() - 2;
        for name in names {
            let name = name.to_uppercase();
            let copied = if name.ends_with('.') {
                self.frames[caller_index].prefixed(&name)
            } else {
                self.frames[caller_index]
                    .get(&name)
                    .map(|value| vec![(name.clone(), value.clone())])
                    .unwrap_or_default()
            };
            let frame = self.frame_mut();
            for (key, value) in copied {
                frame.insert(key, value);
            }
            frame.exposed.push(name);
        }
    }

    pub fn arguments(&self) -> &[Value] {
        &self.frame().arguments
    }

    // Variables

    /// Resolves a symbol to its pool key. Symbols are case-folded. In a compound name each
    /// tail part that names a set variable is replaced by that variable's value.
    pub fn resolve_name(&self, symbol: &str) -> String {
        let upper = symbol.to_uppercase();
        let Some(dot) = upper.find('.') else {
            return upper;
        };
        let (stem, tail) = upper.split_at(dot + 1);
        if tail.is_empty() {
            return upper;
        }
        let parts: Vec<String> = tail
            .split('.')
            .map(|part| {
                if part.is_empty() || part.starts_with(|c: char| c.is_ascii_digit()) {
                    return part.to_string();
                }
                match self.frame().get(part) {
                    Some(value) => value.to_string(),
                    None => part.to_string(),
                }
            })
            .collect();
        format!("{}{}", stem, parts.join("."))
    }

    pub fn lookup(&self, symbol: &str) -> Option<Value> {
        let key = self.resolve_name(symbol);
        self.lookup_key(&key)
    }

    fn lookup_key(&self, key: &str) -> Option<Value> {
        let frame = self.frame();
        if let Some(value) = frame.get(key) {
            return Some(value.clone());
        }
        match key.find('.') {
            Some(dot) if dot + 1 < key.len() => frame.get(&key[..=dot]).cloned(),
            _ => None,
        }
    }

    /// Reads a symbol the way an expression does: an unset name evaluates to itself,
    /// uppercased, unless strict variables are on.
    pub fn value_of(&self, symbol: &str) -> EvalResult<Value> {
        let key = self.resolve_name(symbol);
        match self.lookup_key(&key) {
            Some(value) => Ok(value),
            None if self.strict_variables => Err(EvalError::UndefinedVariable { name: key }),
            None => Ok(Value::String(key)),
        }
    }

    pub fn is_set(&self, symbol: &str) -> bool {
        self.lookup(symbol).is_some()
    }

    /// Assigns a symbol. Assigning a stem (`A.`) clears every `A.*` entry and sets the
    /// default for the family.
    pub fn assign(&mut self, symbol: &str, value: Value) {
        let key = self.resolve_name(symbol);
        let frame = self.frame_mut();
        if key.ends_with('.') {
            frame.remove_prefixed(&key);
        }
        frame.insert(key, value);
    }

    /// Sets a reserved or already-resolved name, bypassing tail substitution.
    pub fn set_var(&mut self, key: &str, value: Value) {
        self.frame_mut().insert(key.to_uppercase(), value);
    }

    pub fn remove_var(&mut self, key: &str) {
        self.frame_mut().remove(&key.to_uppercase());
    }

    pub fn drop_var(&mut self, symbol: &str) {
        let key = self.resolve_name(symbol);
        let frame = self.frame_mut();
        if key.ends_with('.') {
            frame.remove_prefixed(&key);
        } else {
            frame.remove(&key);
        }
    }

    /// Elements `stem.1 … stem.N` for the populated contiguous run, after setting
    /// `stem.0 = N`.
    pub fn stem_elements(&mut self, stem: &str) -> Vec<Value> {
        let stem = stem.to_uppercase();
        let mut elements = Vec::new();
        loop {
            let key = format!("{}{}", stem, elements.len() + 1);
            match self.frame().get(&key) {
                Some(value) => elements.push(value.clone()),
                None => break,
            }
        }
        self.frame_mut()
            .insert(format!("{}0", stem), Value::from(elements.len()));
        elements
    }

    pub fn variables(&self) -> ValueMap {
        self.frame().snapshot()
    }

    // ADDRESS environment

    pub fn address(&self) -> Option<&str> {
        self.address.as_deref()
    }

    pub fn set_address(&mut self, name: &str) {
        self.previous_address = self.address.take();
        self.address = Some(name.to_uppercase());
    }

    /// `ADDRESS` alone: swap current and previous.
    pub fn swap_address(&mut self) {
        std::mem::swap(&mut self.address, &mut self.previous_address);
    }

    /// Saves environment and trap settings across a routine call.
    pub(crate) fn save_settings(&self) -> (Option<String>, Option<String>, Option<Trap>, u64) {
        (
            self.address.clone(),
            self.previous_address.clone(),
            self.trap.clone(),
            self.digits,
        )
    }

    pub(crate) fn restore_settings(
        &mut self,
        (address, previous, trap, digits): (Option<String>, Option<String>, Option<Trap>, u64),
    ) {
        self.address = address;
        self.previous_address = previous;
        self.trap = trap;
        self.digits = digits;
    }

    pub fn set_digits(&mut self, digits: u64) {
        self.digits = digits.max(1);
    }

    pub fn next_checkpoint_sequence(&mut self) -> u64 {
        self.checkpoint_sequence += 1;
        self.checkpoint_sequence
    }
}
