use super::super::{core::*, prelude::*};
use crate::tokenizer::{
    keyword::Keyword,
    literal::Literal,
    symbol::{Delimiter, Operator},
    token::{Span, Token, TokenSpan},
};

pub fn parse_keyword(keyword: Keyword) -> impl Parser<TokenSpan, ()> {
    with_context(
        satisfy(move |span: &TokenSpan| span.token.is_keyword(keyword).then_some(())),
        keyword.as_ref().to_string(),
    )
}

/// Any symbol that is not a sub-keyword closing an expression.
pub fn parse_symbol() -> impl Parser<TokenSpan, String> {
    with_context(
        satisfy(|span: &TokenSpan| match &span.token {
            Token::Symbol(name) if !ends_expression(&span.token) => Some(name.clone()),
            _ => None,
        }),
        "symbol",
    )
}

pub fn parse_operator(operator: Operator) -> impl Parser<TokenSpan, ()> {
    satisfy(move |span: &TokenSpan| (span.token == Token::Operator(operator)).then_some(()))
}

pub fn parse_delimiter(delimiter: Delimiter) -> impl Parser<TokenSpan, ()> {
    satisfy(move |span: &TokenSpan| (span.token == Token::Delimiter(delimiter)).then_some(()))
}

pub fn parse_comma() -> impl Parser<TokenSpan, ()> {
    with_context(parse_delimiter(Delimiter::Comma), "comma")
}

pub fn parse_open_paren() -> impl Parser<TokenSpan, ()> {
    parse_delimiter(Delimiter::OpenParen)
}

pub fn parse_close_paren() -> impl Parser<TokenSpan, ()> {
    parse_delimiter(Delimiter::CloseParen)
}

pub fn parse_string() -> impl Parser<TokenSpan, String> {
    satisfy(|span: &TokenSpan| match &span.token {
        Token::Literal(Literal::String(s)) => Some(s.clone()),
        _ => None,
    })
}

/// A name written as a symbol or as a quoted string (`ADDRESS "my-env"`).
pub fn parse_name() -> impl Parser<TokenSpan, String> {
    choice(vec![Box::new(parse_symbol()), Box::new(parse_string())])
}

pub fn ends_expression(token: &Token) -> bool {
    token.keyword().is_some_and(|k| k.ends_expression())
}

pub fn peek(input: &[TokenSpan], pos: usize) -> Option<&Token> {
    input.get(pos).map(|span| &span.token)
}

pub fn at_keyword(input: &[TokenSpan], pos: usize, keyword: Keyword) -> bool {
    peek(input, pos).is_some_and(|t| t.is_keyword(keyword))
}

/// End of clause: a terminator or the end of input.
pub fn at_clause_end(input: &[TokenSpan], pos: usize) -> bool {
    peek(input, pos).map_or(true, |t| t.is_terminator())
}

pub fn skip_terminators(input: &[TokenSpan], mut pos: usize) -> usize {
    while peek(input, pos).is_some_and(|t| t.is_terminator()) {
        pos += 1;
    }
    pos
}

/// Location used in messages; past the end it points just after the last token.
pub fn span_at(input: &[TokenSpan], pos: usize) -> Span {
    match input.get(pos) {
        Some(span) => span.span(),
        None => input
            .last()
            .map(|last| Span {
                start: last.end,
                end: last.end,
                line: last.line,
                column: last.column + (last.end - last.start),
            })
            .unwrap_or(Span {
                start: 0,
                end: 0,
                line: 1,
                column: 1,
            }),
    }
}

pub fn describe_at(input: &[TokenSpan], pos: usize) -> String {
    peek(input, pos)
        .map(Token::describe)
        .unwrap_or_else(|| "end of input".to_string())
}
