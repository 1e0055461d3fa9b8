//! # Execution engine
//!
//! Tree-walks a parsed [`Program`](crate::ast::Program) against a stack of variable frames.
//!
//! * [`value`] and [`numeric`] hold the data model and the numeric-string arithmetic
//! * [`context`] owns frames, the current ADDRESS environment and the trap setting
//! * [`evaluator`] runs clauses, dispatches calls and fires traps
//!
//! EXIT and RETURN travel as control signals. They never appear as an [`EvalError`].

pub mod context;
pub mod evaluator;
mod expression;
pub mod numeric;
mod statement;
pub mod value;

use strum_macros::Display;
use thiserror::Error;
use uuid::Uuid;

use crate::ast::Span;
use crate::library::ResolutionError;

pub use context::{ExecutionContext, Frame, Trap};
pub use evaluator::Evaluator;
pub use value::{Value, ValueMap};

/// Calls nested deeper than this fail instead of exhausting the stack.
pub const MAX_CALL_DEPTH: usize = 256;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    #[error("variable {name} is not set")]
    UndefinedVariable { name: String },
    #[error("division by zero")]
    DivisionByZero,
    #[error("bad arithmetic operand: '{value}' is not a number")]
    NotNumeric { value: String },
    #[error("'{value}' is not a logical value")]
    NotLogical { value: String },
    #[error("invalid operand for {operator}: {message}")]
    InvalidOperand { operator: String, message: String },
    #[error("arithmetic overflow: exponent {magnitude} is out of range")]
    Overflow { magnitude: i64 },
    #[error("unknown function {name}")]
    UnknownFunction { name: String },
    #[error("label {name} not found")]
    UnknownLabel { name: String },
    #[error("{function}: {message}")]
    Function { function: String, message: String },
    #[error("no branch selected in SELECT")]
    NoBranchSelected,
    #[error("invalid DO loop: {0}")]
    InvalidLoop(String),
    #[error("{clause} is not inside a matching loop")]
    NotInLoop { clause: String },
    #[error("{target} failed with RC {rc}: {message}")]
    Dispatch {
        target: String,
        rc: i64,
        message: String,
    },
    #[error(transparent)]
    Resolution(#[from] ResolutionError),
    #[error("{operation} timed out after {millis}ms")]
    Timeout { operation: String, millis: u64 },
    #[error("invalid checkpoint: {0}")]
    Checkpoint(String),
    #[error("call depth exceeds {0}")]
    RecursionLimit(usize),
    #[error("internal error: {0}")]
    Internal(String),
}

/// Coarse classification reported in [`InterpreterState::Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ErrorKind {
    Evaluation,
    Dispatch,
    Resolution,
    Timeout,
}

impl EvalError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EvalError::Dispatch { .. } => ErrorKind::Dispatch,
            EvalError::Resolution(_) => ErrorKind::Resolution,
            EvalError::Timeout { .. } => ErrorKind::Timeout,
            _ => ErrorKind::Evaluation,
        }
    }

    /// Resolution and timeout failures always surface, whatever trap is armed.
    pub fn is_trappable(&self) -> bool {
        !matches!(
            self,
            EvalError::Resolution(_)
                | EvalError::Timeout { .. }
                | EvalError::RecursionLimit(_)
                | EvalError::Internal(_)
        )
    }

    /// RC reported to an error trap.
    pub fn return_code(&self) -> i64 {
        match self {
            EvalError::Dispatch { rc, .. } => *rc,
            _ => 1,
        }
    }

    /// ERRORTEXT reported to an error trap.
    pub fn error_text(&self) -> String {
        match self {
            EvalError::Dispatch { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

pub type EvalResult<T> = Result<T, EvalError>;

/// An unhandled runtime failure, located at the innermost clause that raised it.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{}", display_runtime(.error, .location))]
pub struct RuntimeError {
    pub error: EvalError,
    pub location: Option<Span>,
}

fn display_runtime(error: &EvalError, location: &Option<Span>) -> String {
    match location {
        Some(span) => format!("{} at {}", error, span),
        None => error.to_string(),
    }
}

impl RuntimeError {
    pub fn kind(&self) -> ErrorKind {
        self.error.kind()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum InterpreterState {
    Running,
    Exited(i32),
    Error {
        kind: ErrorKind,
        message: String,
        location: Option<Span>,
    },
}

impl InterpreterState {
    pub fn is_running(&self) -> bool {
        matches!(self, InterpreterState::Running)
    }
}

/// What a finished run leaves behind.
#[derive(Debug, Clone)]
pub struct ExecutionOutcome {
    pub execution_id: Uuid,
    pub state: InterpreterState,
    /// Value given to `EXIT` (or a top-level `RETURN`).
    pub result: Option<Value>,
    /// The top-level variable pool at the end of the run.
    pub variables: ValueMap,
}

impl ExecutionOutcome {
    /// Process exit status: the EXIT code, 0 for normal completion and 1 for an error.
    pub fn exit_status(&self) -> i32 {
        match &self.state {
            InterpreterState::Running => 0,
            InterpreterState::Exited(code) => *code,
            InterpreterState::Error { .. } => 1,
        }
    }

    pub fn variable(&self, name: &str) -> Option<&Value> {
        self.variables.get(&name.to_uppercase())
    }

    pub fn is_error(&self) -> bool {
        matches!(self.state, InterpreterState::Error { .. })
    }
}
