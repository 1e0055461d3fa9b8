use clap::Parser;
use rexxkit::{
    checkpoint::{CheckpointError, CheckpointRecord, CheckpointSink},
    config::{self, SessionConfig},
    Error, InternalResult, InterpreterSession, InterpreterState,
};
use std::{io::Write, path::PathBuf, sync::Arc};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Script to run
    script: PathBuf,

    /// Path to a session config file (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

/// CHECKPOINT records as JSON lines on stderr, for a parent process to read.
struct StderrSink;

impl CheckpointSink for StderrSink {
    fn publish(&self, record: CheckpointRecord) -> Result<(), CheckpointError> {
        let mut stderr = std::io::stderr().lock();
        writeln!(stderr, "{}", record.to_json_line())
            .map_err(|e| CheckpointError::SinkClosed(e.to_string()))
    }
}

async fn run(cli: &Cli) -> InternalResult<i32> {
    let config: SessionConfig = match &cli.config {
        Some(path) => config::from_file(path)?,
        None => SessionConfig::default(),
    };
    debug!("config: {:?}", config);

    let session = InterpreterSession::builder()
        .with_config(config)
        .with_checkpoint_sink(Arc::new(StderrSink))
        .build()?;

    let outcome = session.execute_file(&cli.script).await?;
    if let InterpreterState::Error {
        message, location, ..
    } = &outcome.state
    {
        match location {
            Some(span) => eprintln!("{}:{}: {}", cli.script.display(), span, message),
            None => eprintln!("{}: {}", cli.script.display(), message),
        }
        if let Some(rc) = outcome.variable("RC") {
            eprintln!("  RC = {}", rc);
        }
        if let Some(text) = outcome.variable("ERRORTEXT") {
            eprintln!("  ERRORTEXT = {}", text);
        }
    }
    Ok(outcome.exit_status())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match run(&cli).await {
        Ok(status) => std::process::exit(status),
        Err(e) => std::process::exit(report(&e)),
    }
}

/// Prints a failure that kept the script from running and returns the exit status.
fn report(error: &Error) -> i32 {
    match error {
        Error::Syntax(e) => eprintln!("{}", e),
        e => eprintln!("Error: {}", e),
    }
    1
}
