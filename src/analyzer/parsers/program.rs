use super::{super::core::*, control::parse_body};
use crate::ast::Program;
use crate::tokenizer::token::TokenSpan;

/// Parses a whole preprocessed token stream into a [`Program`].
pub fn parse_program(input: &[TokenSpan]) -> Result<Program, ParseError> {
    let (pos, statements) = parse_body(input, 0, &[])?;
    debug_assert_eq!(pos, input.len());
    Ok(Program::new(statements))
}
