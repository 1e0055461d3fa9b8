//! `{name}` substitution for ADDRESS targets that ask the interpreter to interpolate.
//!
//! A reference names a variable, optionally followed by a path into a structured value:
//! `{user.name}` first tries the compound variable `USER.NAME`, then the `name` key of the map
//! held in `USER`. Array steps are 0-based indices. A reference that resolves to nothing is
//! left as written.

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

use crate::eval::Value;
use crate::{Error, InternalResult};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "pattern", rename_all = "kebab-case")]
pub enum InterpolationPattern {
    /// `{name}`
    #[default]
    Curly,
    /// `{{name}}`
    DoubleCurly,
    /// `${name}`
    Dollar,
    Custom { open: String, close: String },
}

impl InterpolationPattern {
    pub fn delimiters(&self) -> (&str, &str) {
        match self {
            InterpolationPattern::Curly => ("{", "}"),
            InterpolationPattern::DoubleCurly => ("{{", "}}"),
            InterpolationPattern::Dollar => ("${", "}"),
            InterpolationPattern::Custom { open, close } => (open, close),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Interpolator {
    pattern: Regex,
}

impl Interpolator {
    pub fn new(pattern: &InterpolationPattern) -> InternalResult<Self> {
        let (open, close) = pattern.delimiters();
        if open.is_empty() || close.is_empty() {
            return Err(Error::Config(
                "interpolation delimiters must not be empty".to_string(),
            ));
        }
        let source = format!(
            r"{}\s*([A-Za-z_][A-Za-z0-9_]*(?:\.[A-Za-z0-9_]+)*)\s*{}",
            regex::escape(open),
            regex::escape(close)
        );
        let pattern = Regex::new(&source)
            .map_err(|e| Error::Config(format!("invalid interpolation pattern: {}", e)))?;
        Ok(Self { pattern })
    }

    /// Replaces every resolvable reference in `text`. `lookup` reads a variable by name.
    pub fn interpolate<F>(&self, text: &str, lookup: F) -> String
    where
        F: Fn(&str) -> Option<Value>,
    {
        self.pattern
            .replace_all(text, |caps: &Captures| match resolve(&caps[1], &lookup) {
                Some(value) => value.to_string(),
                None => caps[0].to_string(),
            })
            .into_owned()
    }

    pub fn has_references(&self, text: &str) -> bool {
        self.pattern.is_match(text)
    }
}

fn resolve<F>(path: &str, lookup: &F) -> Option<Value>
where
    F: Fn(&str) -> Option<Value>,
{
    if let Some(value) = lookup(path) {
        return Some(value);
    }
    let mut parts = path.split('.');
    let mut current = lookup(parts.next()?)?;
    for part in parts {
        current = match current {
            Value::Map(map) => map.get_ignore_case(part)?.clone(),
            Value::Array(items) => items.get(part.parse::<usize>().ok()?)?.clone(),
            _ => return None,
        };
    }
    Some(current)
}
