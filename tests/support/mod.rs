use std::sync::Arc;

use rexxkit::{
    config::SessionConfig, output::BufferSink, ExecutionOutcome, InterpreterSession,
    SessionBuilder,
};

pub struct Run {
    pub outcome: ExecutionOutcome,
    pub output: Vec<String>,
}

pub async fn run(source: &str) -> Run {
    run_with(InterpreterSession::builder(), source).await
}

pub async fn run_with(builder: SessionBuilder, source: &str) -> Run {
    let output = Arc::new(BufferSink::new());
    let session = builder
        .with_output(output.clone())
        .build()
        .expect("session");
    let outcome = session.execute(source).await.expect("script parses");
    Run {
        outcome,
        output: output.lines(),
    }
}

pub fn config(update: impl FnOnce(&mut SessionConfig)) -> SessionConfig {
    let mut config = SessionConfig::default();
    update(&mut config);
    config
}
