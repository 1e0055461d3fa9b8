//! # rexxkit: an embeddable REXX-style interpreter
//!
//! Scripts are line-oriented, dynamically typed and built on numeric strings. The interpreter
//! hosts them and plugs them into three outward-facing protocols:
//!
//! - ADDRESS: command strings and method calls routed to named handlers ([`address`])
//! - REQUIRE: function and handler libraries loaded through a resolver chain ([`library`])
//! - CHECKPOINT: ordered progress records handed to a sink ([`checkpoint`])
//!
//! ## Processing pipeline
//!
//! ```text
//! Source → Tokenizer → Preprocessor → Analyzer → Program → Evaluator
//! ```
//!
//! ### Stage 1: Tokenization
//!
//! The [`tokenizer`] turns source text into positioned tokens: quoted strings, numbers,
//! symbols, operators, comments and HEREDOC blocks with their own terminator tag.
//!
//! ### Stage 2: Preprocessing
//!
//! The [`preprocessor`] drops comments and blanks, joins continued lines and collapses runs
//! of line breaks and semicolons into single clause separators. Token spans still record
//! where the blanks were, which is what decides juxtaposition concatenation.
//!
//! ### Stage 3: Parsing
//!
//! The [`analyzer`] builds the [`ast::Program`], checking that every DO, IF and SELECT finds
//! its END and reporting line and column when one does not.
//!
//! ### Stage 4: Evaluation
//!
//! The [`eval`] module walks the program against an [`eval::ExecutionContext`]: the frame
//! stack, the active ADDRESS environment and the armed error trap.
//!
//! ## Sessions
//!
//! An [`session::InterpreterSession`] owns everything shared between runs: handler and
//! function registries, the library cache, the parsed-file cache, the event bus and the
//! output and checkpoint sinks.
//!
//! ```rust,no_run
//! # async fn example() -> rexxkit::InternalResult<()> {
//! let session = rexxkit::session::InterpreterSession::new()?;
//! let outcome = session.execute("say 'hello' 1 + 2").await?;
//! assert_eq!(outcome.exit_status(), 0);
//! # Ok(())
//! # }
//! ```

pub mod address;
pub mod analyzer;
pub mod ast;
pub mod ast_registry;
pub mod checkpoint;
pub mod config;
pub mod error;
pub mod eval;
pub mod event;
pub mod functions;
pub mod interpolation;
pub mod library;
pub mod output;
pub mod preprocessor;
pub mod session;
pub mod timestamp;
pub mod tokenizer;

// Re-exports
pub use error::*;
pub use eval::{ExecutionOutcome, InterpreterState, RuntimeError, Value, ValueMap};
pub use session::{InterpreterSession, SessionBuilder};

#[cfg(test)]
mod tests {
    use tracing_subscriber::{EnvFilter, FmtSubscriber};

    #[ctor::ctor]
    fn init_tests() {
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(EnvFilter::from_default_env())
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    }
}
