//! Statement and expression parsers over the preprocessed token stream.
//!
//! Expression levels are built from the combinators in [`super::prelude`]. Clause and block
//! parsing is written by hand on top of the same [`Parser`](super::Parser) contract, since
//! block nesting needs lookahead over terminators that the combinators do not model.

pub mod common;
pub use common::*;

mod control;
pub mod expression;
mod program;
mod statement;

pub use program::parse_program;

#[cfg(test)]
mod tests;
