use pretty_assertions::assert_eq;
use rexxkit::{InterpreterSession, InterpreterState};

use crate::support::run;

fn error_message(state: &InterpreterState) -> &str {
    match state {
        InterpreterState::Error { message, .. } => message,
        other => panic!("expected an error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_if_forms() {
    let source = r#"
x = 5
IF x > 3 THEN
  SAY 'big'
ELSE
  SAY 'small'
ENDIF
IF x < 3 THEN SAY 'no'
ELSE IF x = 5 THEN SAY 'five'
IF \(x = 5) THEN SAY 'not five'
"#;
    let run = run(source).await;
    assert_eq!(run.output, vec!["big", "five"]);
}

#[tokio::test]
async fn test_nested_single_line_if_in_block_if() {
    let source = r#"
DO a = 1 TO 2
  IF a = 1 THEN
    IF a = 2 THEN SAY 'inner'
  ELSE
    SAY 'outer else' a
  ENDIF
END
"#;
    let run = run(source).await;
    assert_eq!(run.outcome.state, InterpreterState::Exited(0));
    assert_eq!(run.output, vec!["outer else 2"]);
}

#[tokio::test]
async fn test_do_range_keeps_last_value() {
    let source = r#"
total = 0
DO i = 1 TO 5
  total = total + i
END
SAY total i
"#;
    let run = run(source).await;
    assert_eq!(run.output, vec!["15 5"]);
}

#[tokio::test]
async fn test_do_range_by_step() {
    let source = r#"
DO i = 10 TO 1 BY -3
  SAY i
END
DO j = 1 BY 2 TO 6
  SAY j
END j
"#;
    let run = run(source).await;
    assert_eq!(run.output, vec!["10", "7", "4", "1", "1", "3", "5"]);
}

#[tokio::test]
async fn test_do_range_that_never_runs() {
    let run = run("i = 'unset'\nDO i = 5 TO 1\n  SAY i\nEND\nSAY i").await;
    assert_eq!(run.output, vec!["unset"]);
}

#[tokio::test]
async fn test_do_by_zero_is_rejected() {
    let run = run("DO i = 1 TO 3 BY 0\nEND").await;
    assert_eq!(error_message(&run.outcome.state), "invalid DO loop: BY must not be zero");
}

#[tokio::test]
async fn test_do_repeat_and_conditions() {
    let source = r#"
DO 3
  SAY 'x'
END
n = 0
DO WHILE n < 3
  n = n + 1
END
DO UNTIL n >= 5
  n = n + 1
END
SAY n
DO UNTIL 1
  SAY 'once'
END
"#;
    let run = run(source).await;
    assert_eq!(run.output, vec!["x", "x", "x", "5", "once"]);
}

#[tokio::test]
async fn test_do_over_stem_and_collections() {
    let source = r#"
fruit.1 = 'apple'
fruit.2 = 'pear'
fruit.4 = 'skipped'
DO f OVER fruit.
  SAY f
END
SAY fruit.0
items = <<JSON
[1, 2, 3]
JSON
sum = 0
DO n OVER items
  sum = sum + n
END
SAY sum
"#;
    let run = run(source).await;
    assert_eq!(run.output, vec!["apple", "pear", "2", "6"]);
}

#[tokio::test]
async fn test_leave_and_iterate() {
    let source = r#"
DO i = 1 TO 10
  IF i = 2 THEN ITERATE
  IF i = 4 THEN LEAVE
  SAY i
END
DO FOREVER
  SAY 'forever'
  LEAVE
END
DO outer = 1 TO 3
  DO inner = 1 TO 3
    IF inner = 2 THEN ITERATE outer
    IF outer = 3 THEN LEAVE outer
    SAY outer inner
  END
END
"#;
    let run = run(source).await;
    assert_eq!(run.output, vec!["1", "3", "forever", "1 1", "2 1"]);
}

#[tokio::test]
async fn test_leave_outside_loop() {
    let run = run("SAY 'a'\nLEAVE").await;
    assert_eq!(run.output, vec!["a"]);
    assert_eq!(
        error_message(&run.outcome.state),
        "LEAVE is not inside a matching loop"
    );
}

#[tokio::test]
async fn test_select_picks_first_true_branch() {
    let source = r#"
DO x = 1 TO 4
  SELECT
    WHEN x = 1 THEN SAY 'one'
    WHEN x = 2 | x = 3 THEN
      SAY 'two or three'
    WHEN x = 3 THEN SAY 'never'
    OTHERWISE
      SAY 'many'
  END
END
"#;
    let run = run(source).await;
    assert_eq!(
        run.output,
        vec!["one", "two or three", "two or three", "many"]
    );
}

#[tokio::test]
async fn test_select_without_match() {
    let run = run("x = 3\nSELECT\n  WHEN x = 1 THEN SAY 'one'\nEND").await;
    let InterpreterState::Error { location, .. } = &run.outcome.state else {
        panic!("expected an error");
    };
    assert_eq!(error_message(&run.outcome.state), "no branch selected in SELECT");
    assert_eq!(location.map(|l| l.line), Some(2));
}

#[tokio::test]
async fn test_exit_code_and_value() {
    let run = run("SAY 'bye'\nEXIT 3\nSAY 'after'").await;
    assert_eq!(run.output, vec!["bye"]);
    assert_eq!(run.outcome.exit_status(), 3);

    let run = crate::support::run("EXIT 'done'").await;
    assert_eq!(run.outcome.exit_status(), 0);
    assert_eq!(run.outcome.result.map(|v| v.to_string()), Some("done".into()));
}

#[tokio::test]
async fn test_signal_jumps_to_label() {
    let source = r#"
SIGNAL skip
SAY 'skipped'
skip:
SAY 'landed'
"#;
    let run = run(source).await;
    assert_eq!(run.output, vec!["landed"]);
}

#[tokio::test]
async fn test_unbalanced_blocks_are_syntax_errors() {
    let session = InterpreterSession::new().unwrap();
    let error = session
        .execute("DO i = 1 TO 3\n  SAY i\n")
        .await
        .unwrap_err();
    let rexxkit::Error::Syntax(error) = error else {
        panic!("expected a syntax error, got {:?}", error);
    };
    assert!(error.message.contains("DO at 1:1 has no matching END"), "{}", error.message);
    assert_eq!(error.origin, "<script>");

    let error = session
        .execute("x = 1\nIF x THEN\n  SAY x\n")
        .await
        .unwrap_err();
    assert!(error.to_string().contains("no matching ENDIF"), "{}", error);
}
