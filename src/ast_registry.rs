//! Source → [`Program`], with a cache for library files.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use crate::analyzer::{parse_program, parsers::span_at};
use crate::ast::Program;
use crate::preprocessor::{Preprocessor, TokenPreprocessor};
use crate::tokenizer::token::{Tokenizer, TokenizerError};
use crate::{InternalResult, SyntaxError};

#[derive(Debug, Default)]
pub struct AstRegistry {
    programs: DashMap<PathBuf, Arc<Program>>,
}

impl AstRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tokenizes, preprocesses and parses `source`. `origin` names the source in errors.
    pub fn parse(&self, origin: &str, source: &str) -> Result<Arc<Program>, SyntaxError> {
        let tokens = Tokenizer::new().tokenize(source).map_err(|e| {
            let TokenizerError::ParseError { message, span, .. } = e;
            SyntaxError {
                origin: origin.to_string(),
                message,
                line: span.line,
                column: span.column,
            }
        })?;
        let tokens = TokenPreprocessor::new().process(tokens);
        let program = parse_program(&tokens).map_err(|e| {
            let span = span_at(&tokens, e.get_position());
            SyntaxError {
                origin: origin.to_string(),
                message: e.to_string(),
                line: span.line,
                column: span.column,
            }
        })?;
        debug!(origin, statements = program.statements.len(), "parsed program");
        Ok(Arc::new(program))
    }

    /// Parses a file once; later loads of the same path reuse the program.
    pub async fn load_file(&self, path: &Path) -> InternalResult<Arc<Program>> {
        let key = tokio::fs::canonicalize(path)
            .await
            .unwrap_or_else(|_| path.to_path_buf());
        if let Some(program) = self.programs.get(&key) {
            return Ok(program.value().clone());
        }
        let source = tokio::fs::read_to_string(&key).await?;
        let program = self.parse(&path.display().to_string(), &source)?;
        self.programs.insert(key, program.clone());
        Ok(program)
    }

    pub fn cached_paths(&self) -> Vec<PathBuf> {
        self.programs.iter().map(|entry| entry.key().clone()).collect()
    }
}
