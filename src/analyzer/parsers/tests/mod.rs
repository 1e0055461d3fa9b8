
use crate::analyzer::core::ParseError;
use crate::ast::{Program, StatementKind};
use crate::preprocessor::{Preprocessor, TokenPreprocessor};
use crate::tokenizer::token::{TokenSpan, Tokenizer};

pub(super) fn spans(source: &str) -> Vec<TokenSpan> {
    TokenPreprocessor::default().process(Tokenizer::new().tokenize(source).unwrap())
}

pub(super) fn program(source: &str) -> Result<Program, ParseError> {
    super::parse_program(&spans(source))
}

pub(super) fn kinds(source: &str) -> Vec<StatementKind> {
    program(source)
        .unwrap()
        .statements
        .into_iter()
        .map(|s| s.kind)
        .collect()
}

pub(super) fn error(source: &str) -> String {
    program(source).unwrap_err().to_string()
}
