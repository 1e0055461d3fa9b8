//! # Core parser definitions
//!
//! The [`Parser`] trait and [`ParseError`]. Positions are token indices into the
//! preprocessed stream; [`crate::error::SyntaxError`] maps them back to line and column.

use thiserror::Error;

/// Takes an input slice and a start position, returns the new position and the output.
pub trait Parser<I, O> {
    fn parse(&self, input: &[I], pos: usize) -> ParseResult<O>;
}

pub type ParseResult<O> = Result<(usize, O), ParseError>;

/// `Failure` is committed: combinators stop backtracking and hand it straight up, the way
/// nom treats `Err::Failure`. Every other variant lets an alternative be tried.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("unexpected end of input: {message}")]
    UnexpectedEOF {
        message: String,
        position: usize,
        context: Option<String>,
    },
    #[error("expected {expected}, found {found}")]
    Unexpected {
        expected: String,
        found: String,
        position: usize,
        context: Option<String>,
    },
    #[error("no alternative matched")]
    NoAlternative {
        position: usize,
        context: Option<String>,
    },
    #[error("{message}")]
    Failure {
        message: String,
        position: usize,
        context: Option<String>,
    },
}

impl ParseError {
    pub fn failure(message: impl Into<String>, position: usize) -> Self {
        ParseError::Failure {
            message: message.into(),
            position,
            context: None,
        }
    }

    pub fn eof(message: impl Into<String>, position: usize) -> Self {
        ParseError::UnexpectedEOF {
            message: message.into(),
            position,
            context: None,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, ParseError::Failure { .. })
    }

    pub fn with_context(self, ctx: &str) -> Self {
        let extend = |context: Option<String>| match context {
            Some(c) => Some(format!("{} -> {}", c, ctx)),
            None => Some(ctx.to_string()),
        };
        match self {
            ParseError::UnexpectedEOF {
                message,
                position,
                context,
            } => ParseError::UnexpectedEOF {
                message,
                position,
                context: extend(context),
            },
            ParseError::Unexpected {
                expected,
                found,
                position,
                context,
            } => ParseError::Unexpected {
                expected,
                found,
                position,
                context: extend(context),
            },
            ParseError::NoAlternative { position, context } => ParseError::NoAlternative {
                position,
                context: extend(context),
            },
            ParseError::Failure {
                message,
                position,
                context,
            } => ParseError::Failure {
                message,
                position,
                context: extend(context),
            },
        }
    }

    /// Turns a recoverable error into a committed one carrying `message`.
    pub fn commit(self, message: &str) -> Self {
        if self.is_failure() {
            self
        } else {
            ParseError::failure(message, self.get_position())
        }
    }

    pub fn get_position(&self) -> usize {
        match self {
            ParseError::UnexpectedEOF { position, .. } => *position,
            ParseError::Unexpected { position, .. } => *position,
            ParseError::NoAlternative { position, .. } => *position,
            ParseError::Failure { position, .. } => *position,
        }
    }

    pub fn message(&self) -> String {
        self.to_string()
    }
}
