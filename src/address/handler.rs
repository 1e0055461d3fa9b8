use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::eval::{numeric, Value, ValueMap};

/// What the script asked an environment to do.
#[derive(Debug, Clone, PartialEq)]
pub enum AddressCall {
    /// Command-string style. The text is already interpolated when the target asked for it.
    Command(String),
    /// Method-call style, from `LET r = method k=v` or a `f(k=v)` fallback.
    Method { name: String, params: ValueMap },
}

impl AddressCall {
    pub fn describe(&self) -> String {
        match self {
            AddressCall::Command(text) => {
                let first = text.lines().next().unwrap_or_default();
                format!("command '{}'", first)
            }
            AddressCall::Method { name, .. } => format!("method {}", name),
        }
    }
}

/// Script-side facts handed to the handler alongside the call.
#[derive(Debug, Clone, Default)]
pub struct SourceContext {
    pub execution_id: Uuid,
    /// Uppercased target name the call was routed to.
    pub address: String,
    /// True when the engine already substituted `{name}` references.
    pub interpolated: bool,
    /// Snapshot of the calling frame's variable pool.
    pub variables: ValueMap,
}

/// A handler's raw answer. The field pairs mirror what handlers commonly return; the
/// dispatcher picks `result` over `output` and `error` over `error_message`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HandlerResponse {
    pub success: bool,
    pub result: Option<Value>,
    pub output: Option<Value>,
    pub error: Option<String>,
    pub error_message: Option<String>,
    pub error_code: Option<i64>,
}

impl HandlerResponse {
    pub fn ok(result: impl Into<Value>) -> Self {
        Self {
            success: true,
            result: Some(result.into()),
            ..Default::default()
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Default::default()
        }
    }

    pub fn with_code(mut self, code: i64) -> Self {
        self.error_code = Some(code);
        self
    }

    /// Reads a response out of a script value. A map carrying a `success` key is read field
    /// by field; anything else is a successful result.
    pub fn from_value(value: Value) -> Self {
        let Value::Map(map) = value else {
            return Self::ok(value);
        };
        let Some(success) = map.get("success").map(|v| v.to_logical().unwrap_or(false)) else {
            return Self::ok(Value::Map(map));
        };
        let text = |key: &str| {
            map.get(key)
                .filter(|v| !v.is_null())
                .map(|v| v.to_string())
        };
        Self {
            success,
            result: map.get("result").cloned(),
            output: map.get("output").cloned(),
            error: text("error"),
            error_message: text("errorMessage"),
            error_code: map
                .get("errorCode")
                .and_then(|v| v.to_number())
                .and_then(|n| numeric::to_whole_i64(&n)),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum HandlerError {
    #[error("{0}")]
    Failed(String),
    #[error("unsupported call: {0}")]
    Unsupported(String),
}

#[mockall::automock]
#[async_trait]
pub trait AddressHandler: Send + Sync {
    async fn invoke(
        &self,
        call: &AddressCall,
        context: &SourceContext,
    ) -> Result<HandlerResponse, HandlerError>;
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TargetMetadata {
    pub library_name: Option<String>,
    pub version: Option<String>,
    pub interpreter_handles_interpolation: bool,
}

impl TargetMetadata {
    pub fn interpolating() -> Self {
        Self {
            interpreter_handles_interpolation: true,
            ..Default::default()
        }
    }
}

/// A registered environment.
#[derive(Clone)]
pub struct AddressTarget {
    pub name: String,
    pub handler: Arc<dyn AddressHandler>,
    pub metadata: TargetMetadata,
}

impl fmt::Debug for AddressTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AddressTarget")
            .field("name", &self.name)
            .field("metadata", &self.metadata)
            .finish()
    }
}

/// Adapts a synchronous closure into a handler.
pub struct FnHandler<F>(F);

#[async_trait]
impl<F> AddressHandler for FnHandler<F>
where
    F: Fn(&AddressCall, &SourceContext) -> Result<HandlerResponse, HandlerError> + Send + Sync,
{
    async fn invoke(
        &self,
        call: &AddressCall,
        context: &SourceContext,
    ) -> Result<HandlerResponse, HandlerError> {
        (self.0)(call, context)
    }
}

pub fn handler_fn<F>(f: F) -> Arc<dyn AddressHandler>
where
    F: Fn(&AddressCall, &SourceContext) -> Result<HandlerResponse, HandlerError>
        + Send
        + Sync
        + 'static,
{
    Arc::new(FnHandler(f))
}
