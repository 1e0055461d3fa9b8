use pretty_assertions::assert_eq;
use rexxkit::{
    functions::FunctionEntry, InterpreterSession, InterpreterState, Value,
};

use crate::support::{run, run_with};

#[tokio::test]
async fn test_function_and_call_forms() {
    let source = r#"
SAY add(2, 3)
CALL add 4, 5
SAY RESULT
EXIT

add:
  PARSE ARG a, b
  RETURN a + b
"#;
    let run = run(source).await;
    assert_eq!(run.output, vec!["5", "9"]);
}

#[tokio::test]
async fn test_recursive_function() {
    let source = r#"
SAY fact(5)
EXIT
fact:
  PARSE ARG n
  IF n <= 1 THEN RETURN 1
  RETURN n * fact(n - 1)
"#;
    let run = run(source).await;
    assert_eq!(run.output, vec!["120"]);
}

#[tokio::test]
async fn test_frames_are_isolated_unless_exposed() {
    let source = r#"
count = 10
secret = 'outer'
list.1 = 'a'
CALL bump
SAY count secret list.1 list.2
EXIT

bump:
  PROCEDURE EXPOSE count list.
  count = count + 1
  secret = 'inner'
  list.2 = 'b'
  RETURN
"#;
    let run = run(source).await;
    assert_eq!(run.output, vec!["11 outer a b"]);
    assert_eq!(run.outcome.variable("RESULT"), None);
}

#[tokio::test]
async fn test_arg_intrinsics_and_upper_arg() {
    let source = r#"
CALL show 'a', 'b'
SAY RESULT
EXIT
show:
  ARG first
  RETURN ARG() first ARG(2) ARG(3, 'E')
"#;
    let run = run(source).await;
    assert_eq!(run.output, vec!["2 A b false"]);
}

#[tokio::test]
async fn test_named_arguments_bind_as_variables() {
    let source = r#"
SAY greet(name='Ada', greeting='Hi')
EXIT
greet:
  RETURN greeting name
"#;
    let run = run(source).await;
    assert_eq!(run.output, vec!["Hi Ada"]);
}

#[tokio::test]
async fn test_routine_settings_are_restored() {
    let source = r#"
ADDRESS first
CALL switch
SAY ADDRESS()
SAY 1 / 3
EXIT
switch:
  ADDRESS second
  NUMERIC DIGITS 2
  RETURN
"#;
    let run = run(source).await;
    assert_eq!(run.output, vec!["FIRST", "0.333333333"]);
}

#[tokio::test]
async fn test_signal_on_error() {
    let source = r#"
SIGNAL ON ERROR
x = 1 / 0
SAY 'not reached'
EXIT

error:
  SAY 'trapped' RC SIGL ERRORTEXT
  EXIT 4
"#;
    let run = run(source).await;
    assert_eq!(run.output, vec!["trapped 1 3 division by zero"]);
    assert_eq!(run.outcome.exit_status(), 4);
}

#[tokio::test]
async fn test_call_on_error_resumes() {
    let source = r#"
CALL ON ERROR NAME handler
DO i = 1 TO 2
  x = i / 0
  SAY 'after' i RC
END
SIGNAL OFF ERROR
y = 1 / 0
SAY 'unreachable'
EXIT

handler:
  SAY 'handled' SIGL
  RETURN
"#;
    let run = run(source).await;
    assert_eq!(
        run.output,
        vec!["handled 4", "after 1 1", "handled 4", "after 2 1"]
    );
    let InterpreterState::Error { location, .. } = &run.outcome.state else {
        panic!("expected the untrapped division to fail");
    };
    assert_eq!(location.map(|l| l.line), Some(8));
}

#[tokio::test]
async fn test_failing_trap_handler_is_not_retrapped() {
    let source = r#"
CALL ON ERROR NAME handler
x = 1 / 0
EXIT

handler:
  SAY 'handler'
  y = nosuch(1)
  RETURN
"#;
    let run = run(source).await;
    assert_eq!(run.output, vec!["handler"]);
    let InterpreterState::Error { message, location, .. } = &run.outcome.state else {
        panic!("expected an error");
    };
    assert_eq!(message, "unknown function NOSUCH");
    assert_eq!(location.map(|l| l.line), Some(8));
}

#[tokio::test]
async fn test_host_function() {
    let builder = InterpreterSession::builder().with_function(
        "twice",
        FunctionEntry::native(|args| {
            let text = args.get(0).map(Value::to_string).unwrap_or_default();
            Ok(Value::from(format!("{}{}", text, text)))
        }),
    );
    let run = run_with(builder, "SAY twice('ab')").await;
    assert_eq!(run.output, vec!["abab"]);
}
