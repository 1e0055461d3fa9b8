use thiserror::Error;

use crate::address::DispatchError;
use crate::checkpoint::CheckpointError;
use crate::eval::RuntimeError;
use crate::event::event_bus::EventError;
use crate::library::ResolutionError;
use crate::tokenizer::token::TokenizerError;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Syntax error: {0}")]
    Syntax(#[from] SyntaxError),
    #[error("Tokenizer error: {0}")]
    Tokenizer(#[from] TokenizerError),
    #[error("Runtime error: {0}")]
    Runtime(#[from] RuntimeError),
    #[error("Dispatch error: {0}")]
    Dispatch(#[from] DispatchError),
    #[error("Resolution error: {0}")]
    Resolution(#[from] ResolutionError),
    #[error("Checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),
    #[error("Event error: {0}")]
    Event(#[from] EventError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Config error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type InternalResult<T> = Result<T, Error>;

impl Error {
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Error::Internal(message.into())
    }
}

/// A script rejected before execution. `origin` is the file name, or `<script>` for source
/// handed over as a string.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{origin}:{line}:{column}: {message}")]
pub struct SyntaxError {
    pub origin: String,
    pub message: String,
    pub line: usize,
    pub column: usize,
}
