use std::sync::Arc;

use pretty_assertions::assert_eq;
use rexxkit::{
    checkpoint::ChannelSink,
    eval::ErrorKind,
    event::event_bus::Event,
    output::BufferSink,
    InterpreterSession, InterpreterState,
};
use serde_json::json;

use crate::support::run_with;

#[tokio::test]
async fn test_records_arrive_in_order() {
    let (sink, mut receiver) = ChannelSink::new();
    let builder = InterpreterSession::builder().with_checkpoint_sink(Arc::new(sink));
    let source = r#"
CHECKPOINT('start', 'begin')
CHECKPOINT('half', 21 * 2, 50)
CHECKPOINT 'done', 'ok', 100
"#;
    let run = run_with(builder, source).await;
    assert_eq!(run.outcome.exit_status(), 0, "{:?}", run.outcome.state);

    let mut records = Vec::new();
    while let Ok(record) = receiver.try_recv() {
        records.push(record);
    }
    let summary: Vec<_> = records
        .iter()
        .map(|r| (r.sequence, r.key.as_str(), r.value.clone(), r.progress))
        .collect();
    assert_eq!(
        summary,
        vec![
            (1, "start", json!("begin"), None),
            (2, "half", json!(42), Some(50.0)),
            (3, "done", json!("ok"), Some(100.0)),
        ]
    );
    let execution_id = run.outcome.execution_id.to_string();
    assert!(records.iter().all(|r| r.execution_id == execution_id));
}

#[tokio::test]
async fn test_sequence_restarts_per_execution() {
    let (sink, mut receiver) = ChannelSink::new();
    let session = InterpreterSession::builder()
        .with_checkpoint_sink(Arc::new(sink))
        .with_output(Arc::new(BufferSink::new()))
        .build()
        .unwrap();
    let first = session.execute("CHECKPOINT('a', 1)").await.unwrap();
    let second = session.execute("CHECKPOINT('b', 2)").await.unwrap();
    assert_ne!(first.execution_id, second.execution_id);

    let a = receiver.try_recv().unwrap();
    let b = receiver.try_recv().unwrap();
    assert_eq!((a.sequence, a.key.as_str()), (1, "a"));
    assert_eq!((b.sequence, b.key.as_str()), (1, "b"));
    assert_eq!(b.execution_id, second.execution_id.to_string());
}

#[tokio::test]
async fn test_progress_out_of_range() {
    let (sink, mut receiver) = ChannelSink::new();
    let builder = InterpreterSession::builder().with_checkpoint_sink(Arc::new(sink));
    let run = run_with(builder, "CHECKPOINT('k', 'v', 150)\nSAY 'unreachable'").await;
    assert!(run.output.is_empty());
    match &run.outcome.state {
        InterpreterState::Error { kind, message, .. } => {
            assert_eq!(*kind, ErrorKind::Evaluation);
            assert!(message.contains("150"), "{}", message);
        }
        other => panic!("expected an error, got {:?}", other),
    }
    assert!(receiver.try_recv().is_err());
}

#[tokio::test]
async fn test_default_sink_publishes_on_the_event_bus() {
    let session = InterpreterSession::builder()
        .with_output(Arc::new(BufferSink::new()))
        .build()
        .unwrap();
    let (mut events, _errors) = session.event_bus().subscribe();
    let outcome = session
        .execute("CHECKPOINT('rows', '{\"count\": 3}')")
        .await
        .unwrap();

    let mut checkpoints = Vec::new();
    while let Some(event) = events.try_recv() {
        if let Event::Checkpoint(record) = event {
            checkpoints.push(record);
        }
    }
    assert_eq!(checkpoints.len(), 1);
    assert_eq!(checkpoints[0].key, "rows");
    assert_eq!(checkpoints[0].value, json!("{\"count\": 3}"));
    assert_eq!(checkpoints[0].execution_id, outcome.execution_id.to_string());
}
