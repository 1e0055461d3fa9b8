use pretty_assertions::assert_eq;
use rexxkit::{eval::ErrorKind, InterpreterSession, InterpreterState, Value};

use crate::support::{config, run, run_with};

#[tokio::test]
async fn test_arithmetic_precedence() {
    let run = run("SAY 10 + 3 * 4\nSAY (10 + 3) * 4\nSAY -2 ** 2\nSAY 7 / 2").await;
    assert_eq!(run.output, vec!["22", "52", "4", "3.5"]);
}

#[tokio::test]
async fn test_numeric_string_comparison() {
    let source = r#"
a = '007.50'
IF a = 7.5 THEN SAY 'equal'
IF 'abc' = 'ABC' THEN SAY 'same'; ELSE SAY 'different'
IF ' 3 ' == 3.0 THEN SAY 'padded'
"#;
    let run = run(source).await;
    assert_eq!(run.output, vec!["equal", "different", "padded"]);
}

#[tokio::test]
async fn test_concatenation_forms() {
    let source = r#"
name = 'World'
SAY 'Hello,' name || '!'
SAY 'n=' || 2 + 3
"#;
    let run = run(source).await;
    assert_eq!(run.output, vec!["Hello, World!", "n=5"]);
}

#[tokio::test]
async fn test_unset_symbol_is_its_own_name() {
    let run = run("SAY hello\nx = 1\nDROP x\nSAY x").await;
    assert_eq!(run.output, vec!["HELLO", "X"]);
}

#[tokio::test]
async fn test_strict_variables() {
    let run = run_with(
        InterpreterSession::builder().with_config(config(|c| c.strict_variables = true)),
        "SAY 'before'\nSAY missing",
    )
    .await;
    assert_eq!(run.output, vec!["before"]);
    let InterpreterState::Error {
        kind,
        message,
        location,
    } = &run.outcome.state
    else {
        panic!("expected an error, got {:?}", run.outcome.state);
    };
    assert_eq!(*kind, ErrorKind::Evaluation);
    assert!(message.contains("MISSING"), "{}", message);
    assert_eq!(location.map(|l| l.line), Some(2));
}

#[tokio::test]
async fn test_stems_and_compound_tails() {
    let source = r#"
i = 3
arr.i = 'three'
SAY arr.3
arr. = 'none'
SAY arr.3 arr.7
"#;
    let run = run(source).await;
    assert_eq!(run.output, vec!["three", "none none"]);
}

#[tokio::test]
async fn test_numeric_digits() {
    let run = run("SAY 1 / 3\nNUMERIC DIGITS 4\nSAY 1 / 3").await;
    assert_eq!(run.output, vec!["0.333333333", "0.3333"]);
}

#[tokio::test]
async fn test_extreme_exponents_finish_quickly() {
    let source = "SAY '1e999999999' = 1\nSAY LENGTH(7 ** 99999999)\nSAY 7 ** 99999999\nSAY 1e999999999 * 10";
    let run = tokio::time::timeout(std::time::Duration::from_secs(10), run(source))
        .await
        .expect("arithmetic on huge exponents hung");
    assert_eq!(run.output, vec!["0", "20", "1.43326879E+84509803"]);
    let InterpreterState::Error { kind, message, .. } = &run.outcome.state else {
        panic!("expected an overflow");
    };
    assert_eq!(*kind, ErrorKind::Evaluation);
    assert!(message.contains("overflow"), "{}", message);
}

#[tokio::test]
async fn test_division_by_zero_is_located() {
    let run = run("x = 1\ny = x / 0\nSAY 'unreachable'").await;
    assert!(run.output.is_empty());
    let InterpreterState::Error {
        message, location, ..
    } = &run.outcome.state
    else {
        panic!("expected an error");
    };
    assert_eq!(message, "division by zero");
    assert_eq!(location.map(|l| l.line), Some(2));
    assert_eq!(run.outcome.exit_status(), 1);
}

#[tokio::test]
async fn test_heredoc_json_and_raw_text() {
    let source = r#"
data = <<JSON
{"name": "widget", "tags": ["a", "b"]}
JSON
SAY data
text = <<EOT
line one
line two
EOT
SAY text
"#;
    let run = run(source).await;
    assert_eq!(
        run.output,
        vec![
            r#"{"name":"widget","tags":["a","b"]}"#.to_string(),
            "line one\nline two".to_string(),
        ]
    );
    assert!(matches!(run.outcome.variable("DATA"), Some(Value::Map(_))));
}

#[tokio::test]
async fn test_builtin_functions() {
    let source = r#"
SAY LENGTH('abc') UPPER('x') SUBSTR('abcdef', 2, 3)
SAY WORDS('the quick fox') WORD('the quick fox', 2)
SAY MAX(3, 9, 4) ABS(-2.5) DATATYPE('12')
"#;
    let run = run(source).await;
    assert_eq!(run.output, vec!["3 X bcd", "3 quick", "9 2.5 NUM"]);
}

#[tokio::test]
async fn test_unknown_function() {
    let run = run("SAY nosuch(1)").await;
    let InterpreterState::Error { message, .. } = &run.outcome.state else {
        panic!("expected an error");
    };
    assert_eq!(message, "unknown function NOSUCH");
}
