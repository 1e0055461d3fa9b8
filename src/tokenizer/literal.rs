use nom::{
    branch::alt,
    bytes::complete::{is_not, tag},
    character::complete::{char, digit0, digit1, one_of},
    combinator::{map, opt, recognize, value},
    error::context,
    multi::many0,
    sequence::{delimited, pair, tuple},
};

use super::token::{ParserResult, Token};

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    String(String),
    /// Kept as written so `7.50` still prints as `7.50`.
    Number(String),
    Heredoc {
        tag: String,
        content: String,
    },
}

fn quoted(quote: char) -> impl FnMut(&str) -> ParserResult<String> {
    let doubled: &'static str = if quote == '"' { "\"\"" } else { "''" };
    let single: &'static str = if quote == '"' { "\"" } else { "'" };
    let stop: &'static str = if quote == '"' { "\"\n\r" } else { "'\n\r" };
    move |input: &str| {
        delimited(
            char(quote),
            map(
                many0(alt((is_not(stop), value(single, tag(doubled))))),
                |parts: Vec<&str>| parts.concat(),
            ),
            char(quote),
        )(input)
    }
}

#[tracing::instrument(level = "trace", skip(input))]
fn parse_string_literal(input: &str) -> ParserResult<Literal> {
    context(
        "string literal",
        map(alt((quoted('"'), quoted('\''))), Literal::String),
    )(input)
}

#[tracing::instrument(level = "trace", skip(input))]
fn parse_number_literal(input: &str) -> ParserResult<Literal> {
    context(
        "number literal",
        map(
            recognize(pair(
                alt((
                    recognize(pair(digit1, opt(pair(char('.'), digit0)))),
                    recognize(pair(char('.'), digit1)),
                )),
                opt(tuple((one_of("eE"), opt(one_of("+-")), digit1))),
            )),
            |s: &str| Literal::Number(s.to_string()),
        ),
    )(input)
}

#[tracing::instrument(level = "trace", skip(input))]
pub fn parse_literal(input: &str) -> ParserResult<Token> {
    context(
        "literal",
        map(
            alt((parse_string_literal, parse_number_literal)),
            Token::Literal,
        ),
    )(input)
}
