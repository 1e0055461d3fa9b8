//! # Tokenizer
//!
//! Turns script source into a flat stream of [`token::TokenSpan`]s. Every token keeps its
//! byte range and line/column so the parser can report positions and detect abuttal
//! (two operands written with no blank between them).
//!
//! Whitespace, comments and newlines are emitted as tokens; the
//! [`crate::preprocessor::TokenPreprocessor`] decides which of them the parser sees.

pub mod comment;
pub mod heredoc;
pub mod keyword;
pub mod literal;
pub mod symbol;
pub mod token;
pub mod whitespace;
