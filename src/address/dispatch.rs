use std::time::Duration;

use thiserror::Error;
use tracing::{debug, warn};

use super::handler::{AddressCall, AddressTarget, HandlerResponse, SourceContext};
use crate::eval::Value;

/// A dispatch normalized for the engine. `rc` is 0 on success and at least 1 on failure.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchOutcome {
    pub success: bool,
    pub rc: i64,
    pub result: Value,
    /// Present only on failure.
    pub error_text: Option<String>,
}

impl DispatchOutcome {
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            rc: 1,
            result: Value::Null,
            error_text: Some(message.into()),
        }
    }
}

impl From<HandlerResponse> for DispatchOutcome {
    fn from(response: HandlerResponse) -> Self {
        let result = response.result.or(response.output).unwrap_or_default();
        if response.success {
            return Self {
                success: true,
                rc: response.error_code.unwrap_or(0),
                result,
                error_text: None,
            };
        }
        let rc = match response.error_code {
            Some(code) if code >= 1 => code,
            _ => 1,
        };
        let error_text = response
            .error
            .or(response.error_message)
            .unwrap_or_else(|| "command failed".to_string());
        Self {
            success: false,
            rc,
            result,
            error_text: Some(error_text),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DispatchError {
    #[error("no ADDRESS environment named {0}")]
    UnknownTarget(String),
    #[error("ADDRESS environment {0} is already registered")]
    AlreadyRegistered(String),
    #[error("{target} timed out after {millis}ms")]
    Timeout { target: String, millis: u64 },
}

/// Invokes a target and normalizes what comes back. Handler errors become failed outcomes;
/// only an expired timeout is returned as an error.
pub async fn dispatch(
    target: &AddressTarget,
    call: &AddressCall,
    context: &SourceContext,
    timeout: Option<Duration>,
) -> Result<DispatchOutcome, DispatchError> {
    debug!(target = %target.name, call = %call.describe(), "dispatch");
    let invocation = target.handler.invoke(call, context);
    let response = match timeout {
        Some(limit) => tokio::time::timeout(limit, invocation)
            .await
            .map_err(|_| DispatchError::Timeout {
                target: target.name.clone(),
                millis: limit.as_millis() as u64,
            })?,
        None => invocation.await,
    };
    let outcome = match response {
        Ok(response) => DispatchOutcome::from(response),
        Err(e) => {
            warn!(target = %target.name, "handler error: {}", e);
            DispatchOutcome::failure(e.to_string())
        }
    };
    debug!(target = %target.name, rc = outcome.rc, "dispatch finished");
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::address::handler::{handler_fn, HandlerError, MockAddressHandler, TargetMetadata};

    fn target(handler: Arc<dyn crate::address::AddressHandler>) -> AddressTarget {
        AddressTarget {
            name: "TEST".into(),
            handler,
            metadata: TargetMetadata::default(),
        }
    }

    #[test]
    fn test_result_field_priority() {
        let outcome = DispatchOutcome::from(HandlerResponse {
            success: true,
            result: Some(Value::from("r")),
            output: Some(Value::from("o")),
            ..Default::default()
        });
        assert_eq!(outcome.result, Value::from("r"));
        assert_eq!(outcome.rc, 0);
        assert_eq!(outcome.error_text, None);

        let outcome = DispatchOutcome::from(HandlerResponse {
            success: true,
            output: Some(Value::from("o")),
            error: Some("ignored on success".into()),
            ..Default::default()
        });
        assert_eq!(outcome.result, Value::from("o"));
        assert_eq!(outcome.error_text, None);
    }

    #[test]
    fn test_error_field_priority() {
        let outcome = DispatchOutcome::from(HandlerResponse {
            success: false,
            error: Some("boom".into()),
            error_message: Some("other".into()),
            ..Default::default()
        });
        assert_eq!(outcome.rc, 1);
        assert_eq!(outcome.error_text.as_deref(), Some("boom"));

        let outcome = DispatchOutcome::from(HandlerResponse {
            success: false,
            error_message: Some("other".into()),
            error_code: Some(42),
            ..Default::default()
        });
        assert_eq!(outcome.rc, 42);
        assert_eq!(outcome.error_text.as_deref(), Some("other"));
    }

    #[test]
    fn test_failure_code_is_at_least_one() {
        let outcome = DispatchOutcome::from(HandlerResponse::failed("x").with_code(0));
        assert_eq!(outcome.rc, 1);
        let outcome = DispatchOutcome::from(HandlerResponse::failed("x").with_code(-5));
        assert_eq!(outcome.rc, 1);
        let outcome = DispatchOutcome::from(HandlerResponse {
            success: false,
            ..Default::default()
        });
        assert_eq!(outcome.error_text.as_deref(), Some("command failed"));
    }

    #[tokio::test]
    async fn test_handler_error_becomes_failure() {
        let mut mock = MockAddressHandler::new();
        mock.expect_invoke()
            .times(1)
            .returning(|_, _| Err(HandlerError::Failed("exploded".into())));
        let outcome = dispatch(
            &target(Arc::new(mock)),
            &AddressCall::Command("go".into()),
            &SourceContext::default(),
            None,
        )
        .await
        .unwrap();
        assert_eq!(outcome, DispatchOutcome::failure("exploded"));
    }

    #[tokio::test]
    async fn test_timeout() {
        struct Slow;
        #[async_trait::async_trait]
        impl crate::address::AddressHandler for Slow {
            async fn invoke(
                &self,
                _call: &AddressCall,
                _context: &SourceContext,
            ) -> Result<HandlerResponse, HandlerError> {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(HandlerResponse::ok("late"))
            }
        }

        let result = dispatch(
            &target(Arc::new(Slow)),
            &AddressCall::Command("wait".into()),
            &SourceContext::default(),
            Some(Duration::from_millis(20)),
        )
        .await;
        assert_eq!(
            result,
            Err(DispatchError::Timeout {
                target: "TEST".into(),
                millis: 20
            })
        );
    }

    #[tokio::test]
    async fn test_sync_handler_is_awaited() {
        let handler = handler_fn(|_, _| Ok(HandlerResponse::ok(5)));
        let outcome = dispatch(
            &target(handler),
            &AddressCall::Command("x".into()),
            &SourceContext::default(),
            Some(Duration::from_secs(1)),
        )
        .await
        .unwrap();
        assert_eq!(outcome.result, Value::from(5));
    }
}
