//! Operators and delimiters. Multi-character operators are listed before their prefixes
//! so `**` is never read as two `*`.

use strum_macros::{AsRefStr, Display, EnumString};

use nom::{
    branch::alt,
    bytes::complete::tag,
    combinator::{map, value},
    error::context,
};

use super::token::{ParserResult, Token};

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, Display, AsRefStr)]
pub enum Operator {
    #[strum(serialize = "**")]
    Power,
    #[strum(serialize = "*")]
    Multiply,
    /// Remainder (`//`)
    #[strum(serialize = "//")]
    Remainder,
    #[strum(serialize = "/")]
    Divide,
    /// Integer division (`%`)
    #[strum(serialize = "%")]
    IntDivide,
    #[strum(serialize = "+")]
    Plus,
    #[strum(serialize = "-")]
    Minus,
    #[strum(serialize = "||")]
    Concat,
    #[strum(serialize = "|")]
    Or,
    #[strum(serialize = "&&")]
    Xor,
    #[strum(serialize = "&")]
    And,
    #[strum(serialize = "==")]
    EqualEqual,
    #[strum(serialize = "=")]
    Equal,
    #[strum(to_string = "\\=", serialize = "!=", serialize = "<>")]
    NotEqual,
    #[strum(serialize = "<=")]
    LessEqual,
    #[strum(serialize = ">=")]
    GreaterEqual,
    #[strum(serialize = "<")]
    Less,
    #[strum(serialize = ">")]
    Greater,
    #[strum(to_string = "\\", serialize = "!")]
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, Display, AsRefStr)]
pub enum Delimiter {
    #[strum(serialize = "(")]
    OpenParen,
    #[strum(serialize = ")")]
    CloseParen,
    #[strum(serialize = ",")]
    Comma,
    #[strum(serialize = ";")]
    Semicolon,
    #[strum(serialize = ":")]
    Colon,
}

#[tracing::instrument(level = "trace", skip(input))]
pub fn parse_operator(input: &str) -> ParserResult<Token> {
    context(
        "operator",
        map(
            alt((
                alt((
                    value(Operator::Power, tag("**")),
                    value(Operator::Multiply, tag("*")),
                    value(Operator::Remainder, tag("//")),
                    value(Operator::Divide, tag("/")),
                    value(Operator::IntDivide, tag("%")),
                    value(Operator::Plus, tag("+")),
                    value(Operator::Minus, tag("-")),
                    value(Operator::Concat, tag("||")),
                    value(Operator::Or, tag("|")),
                    value(Operator::Xor, tag("&&")),
                    value(Operator::And, tag("&")),
                )),
                alt((
                    value(Operator::EqualEqual, tag("==")),
                    value(Operator::Equal, tag("=")),
                    value(Operator::NotEqual, tag("\\=")),
                    value(Operator::NotEqual, tag("!=")),
                    value(Operator::NotEqual, tag("<>")),
                    value(Operator::LessEqual, tag("<=")),
                    value(Operator::GreaterEqual, tag(">=")),
                    value(Operator::Less, tag("<")),
                    value(Operator::Greater, tag(">")),
                    value(Operator::Not, tag("\\")),
                    value(Operator::Not, tag("!")),
                )),
            )),
            Token::Operator,
        ),
    )(input)
}

#[tracing::instrument(level = "trace", skip(input))]
pub fn parse_delimiter(input: &str) -> ParserResult<Token> {
    context(
        "delimiter",
        map(
            alt((
                value(Delimiter::OpenParen, tag("(")),
                value(Delimiter::CloseParen, tag(")")),
                value(Delimiter::Comma, tag(",")),
                value(Delimiter::Semicolon, tag(";")),
                value(Delimiter::Colon, tag(":")),
            )),
            Token::Delimiter,
        ),
    )(input)
}
