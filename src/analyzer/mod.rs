//! # Analyzer
//!
//! Parser-combinator front end. [`core`] defines the [`Parser`] trait, [`combinators`] and
//! [`prelude`] supply the building blocks, and [`parsers`] holds the grammar for clauses and
//! expressions over preprocessed [`crate::tokenizer::token::TokenSpan`]s.

pub mod combinators;
pub mod core;
pub mod parsers;
pub mod prelude;

pub use core::ParseError;
pub use core::ParseResult;
pub use core::Parser;
pub use parsers::parse_program;
