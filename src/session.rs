//! # Interpreter session
//!
//! Owns everything that outlives a single run: configuration, the ADDRESS registry, the
//! function table, the REQUIRE loader and its cache, the parsed-program cache, the event
//! bus and the output and checkpoint sinks. Sessions are cheap to clone and independent of
//! each other; two sessions in one process share nothing.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};

use tracing::{info, instrument, warn};

use crate::address::{AddressHandler, AddressRegistry, TargetMetadata};
use crate::ast::Program;
use crate::ast_registry::AstRegistry;
use crate::checkpoint::{CheckpointSink, EventBusSink};
use crate::config::SessionConfig;
use crate::eval::{
    numeric, Evaluator, ExecutionContext, ExecutionOutcome, InterpreterState, RuntimeError, Value,
};
use crate::event::event_bus::{ErrorEvent, Event, EventBus};
use crate::functions::{FunctionEntry, FunctionRegistry};
use crate::interpolation::Interpolator;
use crate::library::{LibraryLoader, LibraryResolver, LocalFileResolver};
use crate::output::{OutputSink, StdoutSink};
use crate::InternalResult;

pub(crate) struct SessionInner {
    config: SessionConfig,
    interpolator: Interpolator,
    addresses: AddressRegistry,
    functions: FunctionRegistry,
    loader: LibraryLoader,
    ast_registry: AstRegistry,
    event_bus: Arc<EventBus>,
    output: Arc<dyn OutputSink>,
    checkpoints: Arc<dyn CheckpointSink>,
}

#[derive(Clone)]
pub struct InterpreterSession {
    inner: Arc<SessionInner>,
}

/// Non-owning handle, held by handlers the session itself registers.
#[derive(Clone)]
pub struct WeakSession(Weak<SessionInner>);

impl WeakSession {
    pub fn upgrade(&self) -> Option<InterpreterSession> {
        self.0.upgrade().map(|inner| InterpreterSession { inner })
    }
}

impl InterpreterSession {
    pub fn builder() -> SessionBuilder {
        SessionBuilder::default()
    }

    pub fn new() -> InternalResult<Self> {
        Self::builder().build()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    pub fn interpolator(&self) -> &Interpolator {
        &self.inner.interpolator
    }

    pub fn addresses(&self) -> &AddressRegistry {
        &self.inner.addresses
    }

    pub fn functions(&self) -> &FunctionRegistry {
        &self.inner.functions
    }

    pub fn loader(&self) -> &LibraryLoader {
        &self.inner.loader
    }

    pub fn ast_registry(&self) -> &AstRegistry {
        &self.inner.ast_registry
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.inner.event_bus
    }

    pub fn output(&self) -> &Arc<dyn OutputSink> {
        &self.inner.output
    }

    pub fn checkpoints(&self) -> &Arc<dyn CheckpointSink> {
        &self.inner.checkpoints
    }

    pub fn downgrade(&self) -> WeakSession {
        WeakSession(Arc::downgrade(&self.inner))
    }

    /// Runs source text. Syntax errors are returned as `Err`; runtime failures come back as
    /// an outcome in the error state.
    pub async fn execute(&self, source: &str) -> InternalResult<ExecutionOutcome> {
        let program = self.inner.ast_registry.parse("<script>", source)?;
        Ok(self.execute_program(program, "<script>", None).await)
    }

    /// Runs a script file. Relative REQUIREs resolve against its directory.
    pub async fn execute_file(&self, path: impl AsRef<Path>) -> InternalResult<ExecutionOutcome> {
        let path = path.as_ref();
        let source = tokio::fs::read_to_string(path).await?;
        let origin = path.display().to_string();
        let program = self.inner.ast_registry.parse(&origin, &source)?;
        let dir = path.parent().map(Path::to_path_buf);
        Ok(self.execute_program(program, &origin, dir).await)
    }

    #[instrument(level = "debug", skip(self, program, script_dir))]
    pub async fn execute_program(
        &self,
        program: Arc<Program>,
        origin: &str,
        script_dir: Option<PathBuf>,
    ) -> ExecutionOutcome {
        let mut ctx = ExecutionContext::new(&self.inner.config).with_script_dir(script_dir);
        let execution_id = ctx.execution_id;
        self.publish(Event::ExecutionStarted {
            execution_id: execution_id.to_string(),
            origin: origin.to_string(),
        });

        let evaluator = Evaluator::new(self.clone(), program);
        let (state, result) = match evaluator.run(&mut ctx).await {
            Ok(result) => (InterpreterState::Exited(exit_code(result.as_ref())), result),
            Err(error) => {
                self.report(&execution_id.to_string(), &error);
                (
                    InterpreterState::Error {
                        kind: error.kind(),
                        message: error.error.to_string(),
                        location: error.location,
                    },
                    None,
                )
            }
        };
        info!(%execution_id, ?state, "execution finished");
        self.publish(Event::ExecutionFinished {
            execution_id: execution_id.to_string(),
            state: state.clone(),
        });
        ExecutionOutcome {
            execution_id,
            state,
            result,
            variables: ctx.global_frame().snapshot(),
        }
    }

    fn publish(&self, event: Event) {
        if let Err(e) = self.inner.event_bus.sync_publish(event) {
            warn!("event not published: {}", e);
        }
    }

    fn report(&self, execution_id: &str, error: &RuntimeError) {
        let event = ErrorEvent {
            execution_id: execution_id.to_string(),
            kind: error.kind(),
            message: error.error.to_string(),
            location: error.location,
        };
        if let Err(e) = self.inner.event_bus.sync_publish_error(event) {
            warn!("error event not published: {}", e);
        }
    }
}

/// Numeric whole EXIT values are the exit code; anything else exits 0.
fn exit_code(result: Option<&Value>) -> i32 {
    result
        .and_then(Value::to_number)
        .and_then(|n| numeric::to_whole_i64(&n))
        .and_then(|n| i32::try_from(n).ok())
        .unwrap_or(0)
}

#[derive(Default)]
pub struct SessionBuilder {
    config: SessionConfig,
    handlers: Vec<(String, Arc<dyn AddressHandler>, TargetMetadata)>,
    functions: Vec<(String, FunctionEntry)>,
    resolvers: Vec<Arc<dyn LibraryResolver>>,
    output: Option<Arc<dyn OutputSink>>,
    checkpoints: Option<Arc<dyn CheckpointSink>>,
}

impl SessionBuilder {
    pub fn with_config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_address_handler(
        mut self,
        name: &str,
        handler: Arc<dyn AddressHandler>,
        metadata: TargetMetadata,
    ) -> Self {
        self.handlers.push((name.to_string(), handler, metadata));
        self
    }

    pub fn with_function(mut self, name: &str, entry: FunctionEntry) -> Self {
        self.functions.push((name.to_string(), entry));
        self
    }

    /// Appends a resolver after the local-file resolver and any added before it.
    pub fn with_resolver(mut self, resolver: Arc<dyn LibraryResolver>) -> Self {
        self.resolvers.push(resolver);
        self
    }

    pub fn with_output(mut self, output: Arc<dyn OutputSink>) -> Self {
        self.output = Some(output);
        self
    }

    pub fn with_checkpoint_sink(mut self, sink: Arc<dyn CheckpointSink>) -> Self {
        self.checkpoints = Some(sink);
        self
    }

    pub fn build(self) -> InternalResult<InterpreterSession> {
        let event_bus = Arc::new(EventBus::new(self.config.event_buffer_size));
        let interpolator = Interpolator::new(&self.config.interpolation)?;

        let addresses = AddressRegistry::new();
        for (name, handler, metadata) in self.handlers {
            addresses.register(&name, handler, metadata)?;
        }
        let functions = FunctionRegistry::with_builtins();
        for (name, entry) in self.functions {
            functions.insert(&name, entry);
        }

        let mut resolvers: Vec<Arc<dyn LibraryResolver>> = vec![Arc::new(LocalFileResolver::new())];
        resolvers.extend(self.resolvers);

        let checkpoints = self
            .checkpoints
            .unwrap_or_else(|| Arc::new(EventBusSink::new(event_bus.clone())));
        let inner = SessionInner {
            config: self.config,
            interpolator,
            addresses,
            functions,
            loader: LibraryLoader::new(resolvers),
            ast_registry: AstRegistry::new(),
            event_bus,
            output: self.output.unwrap_or_else(|| Arc::new(StdoutSink)),
            checkpoints,
        };
        Ok(InterpreterSession {
            inner: Arc::new(inner),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code() {
        assert_eq!(exit_code(None), 0);
        assert_eq!(exit_code(Some(&Value::from(3))), 3);
        assert_eq!(exit_code(Some(&Value::from("done"))), 0);
        assert_eq!(exit_code(Some(&Value::from("2.5"))), 0);
    }

    #[test]
    fn test_builder_rejects_duplicate_targets() {
        let handler = crate::address::handler_fn(|_, _| Ok(crate::address::HandlerResponse::ok(1)));
        let result = InterpreterSession::builder()
            .with_address_handler("X", handler.clone(), TargetMetadata::default())
            .with_address_handler("x", handler, TargetMetadata::default())
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_resolver_order_starts_with_local() {
        let session = InterpreterSession::builder()
            .with_resolver(Arc::new(crate::library::StaticResolver::new("registry")))
            .build()
            .unwrap();
        assert_eq!(
            session.loader().resolver_names(),
            vec!["local".to_string(), "registry".to_string()]
        );
    }
}
