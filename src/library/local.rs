//! Script libraries on the local filesystem.
//!
//! A library file runs its top-level clauses once at load. Its `<NAME>_META` routine returns
//! the descriptor (a map, usually a HEREDOC JSON block), every other label is exported as a
//! function, and `provides.handlerFunction` names the routine serving ADDRESS calls.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::{LibraryDescriptor, LibraryResolver, LoadRequest, LoadedModule, ResolutionError};
use crate::address::{AddressCall, AddressHandler, HandlerError, HandlerResponse, SourceContext};
use crate::ast::Program;
use crate::eval::{Evaluator, ExecutionContext, RuntimeError, Value};
use crate::functions::{CallArgs, FunctionEntry};
use crate::session::{InterpreterSession, WeakSession};

const EXTENSION: &str = "rexx";

#[derive(Debug, Default, Clone)]
pub struct LocalFileResolver;

impl LocalFileResolver {
    pub fn new() -> Self {
        Self
    }

    pub fn handles(identifier: &str) -> bool {
        identifier.starts_with("./")
            || identifier.starts_with("../")
            || identifier.starts_with('/')
            || identifier.ends_with(&format!(".{}", EXTENSION))
    }

    /// Candidate paths in lookup order: the requiring script's directory, then each
    /// configured library path. Each is tried as written and with the extension added.
    pub fn candidates(identifier: &str, base_dir: Option<&Path>, library_paths: &[PathBuf]) -> Vec<PathBuf> {
        let path = Path::new(identifier);
        let roots: Vec<PathBuf> = if path.is_absolute() {
            vec![PathBuf::new()]
        } else {
            base_dir
                .map(Path::to_path_buf)
                .into_iter()
                .chain(library_paths.iter().cloned())
                .chain(std::iter::once(PathBuf::from(".")))
                .collect()
        };
        roots
            .into_iter()
            .flat_map(|root| {
                let candidate = root.join(path);
                let with_extension = match candidate.extension() {
                    Some(ext) if ext == EXTENSION => None,
                    _ => Some(PathBuf::from(format!("{}.{}", candidate.display(), EXTENSION))),
                };
                std::iter::once(candidate).chain(with_extension)
            })
            .collect()
    }

    async fn locate(&self, request: &LoadRequest, library_paths: &[PathBuf]) -> Option<PathBuf> {
        for candidate in Self::candidates(&request.identifier, request.base_dir.as_deref(), library_paths) {
            if let Ok(metadata) = tokio::fs::metadata(&candidate).await {
                if metadata.is_file() {
                    return Some(candidate);
                }
            }
        }
        None
    }
}

#[async_trait]
impl LibraryResolver for LocalFileResolver {
    fn name(&self) -> &str {
        "local"
    }

    async fn resolve(
        &self,
        request: &LoadRequest,
        session: &InterpreterSession,
    ) -> Result<Option<LoadedModule>, ResolutionError> {
        if !Self::handles(&request.identifier) {
            return Ok(None);
        }
        let Some(path) = self.locate(request, &session.config().library_paths).await else {
            return Ok(None);
        };
        debug!(path = %path.display(), "loading script library");
        let identifier = request.identifier.as_str();
        let load_failed = |message: String| ResolutionError::LoadFailed {
            identifier: identifier.to_string(),
            message,
        };

        let program = session
            .ast_registry()
            .load_file(&path)
            .await
            .map_err(|e| load_failed(e.to_string()))?;
        let base_dir = path.parent().map(Path::to_path_buf);
        let evaluator = Evaluator::new(session.clone(), program.clone());
        let mut ctx = ExecutionContext::new(session.config()).with_script_dir(base_dir.clone());
        evaluator
            .run_prologue(&mut ctx)
            .await
            .map_err(|e| runtime_failure(identifier, e))?;

        let mut labels: Vec<String> = program.label_names().cloned().collect();
        labels.sort_by_key(|label| program.label(label));
        let meta = labels
            .iter()
            .find(|label| label.ends_with("_META"))
            .cloned()
            .ok_or_else(|| ResolutionError::InvalidDescriptor {
                identifier: identifier.to_string(),
                message: "no <NAME>_META routine".to_string(),
            })?;
        let value = evaluator
            .call_routine(&meta, CallArgs::Positional(Vec::new()), &mut ctx)
            .await
            .map_err(|e| runtime_failure(identifier, e))?
            .unwrap_or_default();
        let descriptor = LibraryDescriptor::from_value(identifier, value)?;

        let mut module = LoadedModule::new(descriptor.clone());
        module.base_dir = base_dir.clone();
        for label in labels.iter().filter(|label| **label != meta) {
            module = module.with_function(
                label,
                FunctionEntry::Script {
                    program: program.clone(),
                    label: label.clone(),
                },
            );
        }
        if let Some(routine) = &descriptor.provides.handler_function {
            if program.label(routine).is_none() {
                return Err(ResolutionError::InvalidDescriptor {
                    identifier: identifier.to_string(),
                    message: format!("handlerFunction {} is not a routine", routine),
                });
            }
            module = module.with_handler(Arc::new(ScriptHandler {
                session: session.downgrade(),
                program,
                routine: routine.to_uppercase(),
                base_dir,
            }));
        }
        Ok(Some(module))
    }
}

fn runtime_failure(identifier: &str, error: RuntimeError) -> ResolutionError {
    match error.error {
        crate::eval::EvalError::Resolution(inner) => inner,
        _ => ResolutionError::LoadFailed {
            identifier: identifier.to_string(),
            message: error.to_string(),
        },
    }
}

/// Serves ADDRESS calls with a script routine. A command arrives as one argument, the
/// command text. A method call arrives as two, the method name and the parameter map.
/// The routine may return a plain value or a `{success, result, error, errorCode}` map.
pub struct ScriptHandler {
    session: WeakSession,
    program: Arc<Program>,
    routine: String,
    base_dir: Option<PathBuf>,
}

#[async_trait]
impl AddressHandler for ScriptHandler {
    async fn invoke(
        &self,
        call: &AddressCall,
        context: &SourceContext,
    ) -> Result<HandlerResponse, HandlerError> {
        let session = self
            .session
            .upgrade()
            .ok_or_else(|| HandlerError::Failed("session has been dropped".to_string()))?;
        let args = match call {
            AddressCall::Command(text) => vec![Value::from(text.as_str())],
            AddressCall::Method { name, params } => {
                vec![Value::from(name.as_str()), Value::Map(params.clone())]
            }
        };
        let evaluator = Evaluator::new(session.clone(), self.program.clone());
        let mut ctx = ExecutionContext::new(session.config()).with_script_dir(self.base_dir.clone());
        ctx.execution_id = context.execution_id;
        let value = evaluator
            .call_routine(&self.routine, CallArgs::Positional(args), &mut ctx)
            .await
            .map_err(|e| HandlerError::Failed(e.to_string()))?;
        Ok(HandlerResponse::from_value(value.unwrap_or_default()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handles_paths_and_extension() {
        assert!(LocalFileResolver::handles("./lib/util.rexx"));
        assert!(LocalFileResolver::handles("../shared"));
        assert!(LocalFileResolver::handles("/opt/lib"));
        assert!(LocalFileResolver::handles("util.rexx"));
        assert!(!LocalFileResolver::handles("sqlite3"));
        assert!(!LocalFileResolver::handles("org/package"));
    }

    #[test]
    fn test_candidate_order() {
        let candidates = LocalFileResolver::candidates(
            "./util",
            Some(Path::new("/scripts")),
            &[PathBuf::from("/libs")],
        );
        assert_eq!(
            candidates,
            vec![
                PathBuf::from("/scripts/./util"),
                PathBuf::from("/scripts/./util.rexx"),
                PathBuf::from("/libs/./util"),
                PathBuf::from("/libs/./util.rexx"),
                PathBuf::from("././util"),
                PathBuf::from("././util.rexx"),
            ]
        );
    }

    #[test]
    fn test_absolute_identifier() {
        let candidates = LocalFileResolver::candidates("/opt/x.rexx", Some(Path::new("/s")), &[]);
        assert_eq!(candidates, vec![PathBuf::from("/opt/x.rexx")]);
    }
}
