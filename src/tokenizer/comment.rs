use nom::{
    branch::alt,
    bytes::complete::{tag, take_until},
    character::complete::not_line_ending,
    combinator::map,
    error::context,
    sequence::{delimited, preceded},
};

use super::token::{CommentType, ParserResult, Token};

#[tracing::instrument(level = "trace", skip(input))]
pub fn parse_line_comment(input: &str) -> ParserResult<Token> {
    context(
        "line comment",
        map(preceded(tag("--"), not_line_ending), |content: &str| {
            Token::Comment {
                content: content.trim().to_string(),
                comment_type: CommentType::Line,
            }
        }),
    )(input)
}

#[tracing::instrument(level = "trace", skip(input))]
pub fn parse_block_comment(input: &str) -> ParserResult<Token> {
    context(
        "block comment",
        map(
            delimited(tag("/*"), take_until("*/"), tag("*/")),
            |content: &str| Token::Comment {
                content: content.to_string(),
                comment_type: CommentType::Block,
            },
        ),
    )(input)
}

#[tracing::instrument(level = "trace", skip(input))]
pub fn parse_comment(input: &str) -> ParserResult<Token> {
    context("comment", alt((parse_block_comment, parse_line_comment)))(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_comment() {
        let (rest, token) = parse_comment("-- note here\nSAY 1").unwrap();
        assert_eq!(rest, "\nSAY 1");
        assert_eq!(
            token,
            Token::Comment {
                content: "note here".to_string(),
                comment_type: CommentType::Line,
            }
        );
    }

    #[test]
    fn test_block_comment_spans_lines() {
        let (rest, token) = parse_comment("/* one\ntwo */x").unwrap();
        assert_eq!(rest, "x");
        assert_eq!(
            token,
            Token::Comment {
                content: " one\ntwo ".to_string(),
                comment_type: CommentType::Block,
            }
        );
    }

    #[test]
    fn test_unterminated_block_comment() {
        assert!(parse_comment("/* never closed").is_err());
    }
}
