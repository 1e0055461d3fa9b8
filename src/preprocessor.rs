//! # Token preprocessing
//!
//! Sits between the tokenizer and the parser:
//!
//! ```text
//! Source → Tokenizer → TokenPreprocessor → Parser → Evaluator
//! ```
//!
//! * comments and blanks are dropped (spans still record where blanks were)
//! * a newline after a trailing `,` is a continuation and is dropped
//! * newlines inside parentheses are dropped
//! * runs of terminators (newline or `;`) collapse into one

use crate::tokenizer::{
    symbol::Delimiter,
    token::{Token, TokenSpan},
};

pub trait Preprocessor<T, U = T> {
    fn process(&self, input: T) -> U;
}

#[derive(Debug, Default, Clone)]
pub struct TokenPreprocessor {}

impl TokenPreprocessor {
    pub fn new() -> Self {
        Self {}
    }
}

impl Preprocessor<Vec<TokenSpan>> for TokenPreprocessor {
    fn process(&self, input: Vec<TokenSpan>) -> Vec<TokenSpan> {
        let mut output: Vec<TokenSpan> = Vec::with_capacity(input.len());
        let mut depth = 0usize;

        for span in input {
            match &span.token {
                Token::Comment { .. } | Token::Whitespace(_) => continue,
                Token::Delimiter(Delimiter::OpenParen) => depth += 1,
                Token::Delimiter(Delimiter::CloseParen) => depth = depth.saturating_sub(1),
                token if token.is_terminator() => {
                    let continued = matches!(
                        (token, output.last().map(|s| &s.token)),
                        (Token::Newline, Some(Token::Delimiter(Delimiter::Comma)))
                    );
                    let redundant = output.last().map_or(true, |s| s.token.is_terminator());
                    if (token.is_newline() && depth > 0) || continued || redundant {
                        continue;
                    }
                }
                _ => {}
            }
            output.push(span);
        }

        output
    }
}
