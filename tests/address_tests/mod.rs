use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use rexxkit::{
    address::{
        handler_fn, AddressCall, AddressHandler, HandlerError, HandlerResponse,
        MockAddressHandler, SourceContext, TargetMetadata,
    },
    eval::ErrorKind,
    InterpreterSession, InterpreterState, Value,
};
use serde_json::json;

use crate::support::{config, run_with};

/// Answers commands with their text and methods with `name:key`.
fn echo() -> Arc<dyn AddressHandler> {
    handler_fn(|call, _| match call {
        AddressCall::Command(text) => Ok(HandlerResponse::ok(text.clone())),
        AddressCall::Method { name, params } => {
            let key = params.get("key").map(Value::to_string).unwrap_or_default();
            Ok(HandlerResponse::ok(format!("{}:{}", name, key)))
        }
    })
}

fn with_target(name: &str, handler: Arc<dyn AddressHandler>) -> rexxkit::SessionBuilder {
    InterpreterSession::builder().with_address_handler(name, handler, TargetMetadata::default())
}

#[tokio::test]
async fn test_commands_route_to_current_environment() {
    let mut mock = MockAddressHandler::new();
    mock.expect_invoke()
        .withf(|_, context| context.address == "CALC" && !context.interpolated)
        .times(3)
        .returning(|call, _| match call {
            AddressCall::Command(text) => Ok(HandlerResponse::ok(text.to_uppercase())),
            other => Err(HandlerError::Unsupported(other.describe())),
        });
    let source = r#"
ADDRESS calc
'first'
'second'
'third'
SAY RESULT RC
"#;
    let run = run_with(with_target("calc", Arc::new(mock)), source).await;
    assert_eq!(run.output, vec!["THIRD 0"]);
    assert_eq!(run.outcome.variable("ERRORTEXT"), None);
}

#[tokio::test]
async fn test_failed_command_halts_the_script() {
    let failing = handler_fn(|_, _| {
        Ok(HandlerResponse::from_value(Value::from_json(
            json!({"success": false, "error": "boom"}),
        )))
    });
    let run = run_with(with_target("svc", failing), "ADDRESS svc\n'go'\nSAY 'unreachable'").await;
    assert!(run.output.is_empty());
    let InterpreterState::Error { kind, message, .. } = &run.outcome.state else {
        panic!("expected a dispatch error, got {:?}", run.outcome.state);
    };
    assert_eq!(*kind, ErrorKind::Dispatch);
    assert_eq!(message, "SVC failed with RC 1: boom");
    assert_eq!(run.outcome.variable("RC"), Some(&Value::from(1)));
    assert_eq!(run.outcome.variable("ERRORTEXT"), Some(&Value::from("boom")));
}

#[tokio::test]
async fn test_failures_can_be_inspected_without_halting() {
    let handler = handler_fn(|call, _| match call {
        AddressCall::Command(text) if text == "go" => Ok(HandlerResponse::from_value(
            Value::from_json(json!({"success": false, "error": "boom"})),
        )),
        _ => Ok(HandlerResponse::ok("fine")),
    });
    let source = r#"
ADDRESS svc
'go'
SAY RC ERRORTEXT
'again'
SAY RC RESULT ERRORTEXT
"#;
    let builder =
        with_target("svc", handler).with_config(config(|c| c.halt_on_dispatch_failure = false));
    let run = run_with(builder, source).await;
    assert_eq!(run.output, vec!["1 boom", "0 fine ERRORTEXT"]);
    assert_eq!(run.outcome.exit_status(), 0);
}

#[tokio::test]
async fn test_error_code_reaches_the_trap() {
    let handler = handler_fn(|_, _| Ok(HandlerResponse::failed("nope").with_code(42)));
    let source = r#"
SIGNAL ON ERROR
ADDRESS svc
'fail'
EXIT
error:
SAY RC ERRORTEXT
"#;
    let run = run_with(with_target("svc", handler), source).await;
    assert_eq!(run.output, vec!["42 nope"]);
    assert_eq!(run.outcome.exit_status(), 0);
}

#[tokio::test]
async fn test_method_calls() {
    let source = r#"
ADDRESS kv
LET r = lookup key='abc'
SAY r
s = lookup(key='xyz')
SAY s RC
"#;
    let run = run_with(with_target("kv", echo()), source).await;
    assert_eq!(run.output, vec!["lookup:abc", "lookup:xyz 0"]);
}

#[tokio::test]
async fn test_interpolation_when_the_target_asks_for_it() {
    let source = r#"
user.name = 'Ada'
ADDRESS plain
'hello {user.name}'
SAY RESULT
ADDRESS echo
'hello {user.name} and {nobody}'
SAY RESULT
"#;
    let builder = with_target("plain", echo()).with_address_handler(
        "echo",
        echo(),
        TargetMetadata::interpolating(),
    );
    let run = run_with(builder, source).await;
    assert_eq!(
        run.output,
        vec!["hello {user.name}", "hello Ada and {nobody}"]
    );
}

#[tokio::test]
async fn test_address_forms() {
    let source = r#"
ADDRESS echo 'once'
SAY RESULT '[' || ADDRESS() || ']'
ADDRESS first
ADDRESS second
ADDRESS
SAY ADDRESS()
"#;
    let run = run_with(with_target("echo", echo()), source).await;
    assert_eq!(run.output, vec!["once []", "FIRST"]);
}

#[tokio::test]
async fn test_heredoc_command_is_sent_raw() {
    let source = r#"
ADDRESS echo
<<SQL
select *
  from t
SQL
SAY RESULT
"#;
    let run = run_with(with_target("echo", echo()), source).await;
    assert_eq!(run.output, vec!["select *\n  from t"]);
}

#[tokio::test]
async fn test_unknown_environment() {
    let run = run_with(InterpreterSession::builder(), "ADDRESS nowhere\n'x'").await;
    let InterpreterState::Error { kind, .. } = &run.outcome.state else {
        panic!("expected an error");
    };
    assert_eq!(*kind, ErrorKind::Dispatch);
    assert_eq!(run.outcome.variable("RC"), Some(&Value::from(1)));
    assert_eq!(
        run.outcome.variable("ERRORTEXT"),
        Some(&Value::from("no ADDRESS environment named NOWHERE"))
    );
}

struct Slow;

#[async_trait]
impl AddressHandler for Slow {
    async fn invoke(
        &self,
        _call: &AddressCall,
        _context: &SourceContext,
    ) -> Result<HandlerResponse, HandlerError> {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok(HandlerResponse::ok("late"))
    }
}

#[tokio::test]
async fn test_dispatch_timeout_is_not_trappable() {
    let source = r#"
SIGNAL ON ERROR
ADDRESS slow
'wait'
EXIT
error:
SAY 'trapped'
"#;
    let builder = with_target("slow", Arc::new(Slow))
        .with_config(config(|c| c.dispatch_timeout = Some(Duration::from_millis(20))));
    let run = run_with(builder, source).await;
    assert!(run.output.is_empty());
    let InterpreterState::Error { kind, message, .. } = &run.outcome.state else {
        panic!("expected a timeout");
    };
    assert_eq!(*kind, ErrorKind::Timeout);
    assert_eq!(message, "ADDRESS SLOW timed out after 20ms");
    assert_eq!(run.outcome.variable("RC"), Some(&Value::from(1)));
}
