//! HEREDOC blocks: `<<TAG` at the end of a line opens the block, and the first later line
//! whose trimmed text equals `TAG` closes it. Everything in between is kept verbatim.

use nom::{
    bytes::complete::{tag, take_while, take_while1},
    character::complete::line_ending,
    combinator::recognize,
    error::{context, ContextError, ErrorKind, ParseError, VerboseError},
    sequence::{pair, preceded, terminated},
};

use super::{
    literal::Literal,
    token::{ParserResult, Token},
};

fn heredoc_opening(input: &str) -> ParserResult<&str> {
    context(
        "heredoc opening",
        terminated(
            preceded(
                tag("<<"),
                recognize(pair(
                    take_while1(|c: char| c.is_alphabetic() || c == '_'),
                    take_while(|c: char| c.is_alphanumeric() || c == '_'),
                )),
            ),
            pair(take_while(|c| c == ' ' || c == '\t'), line_ending),
        ),
    )(input)
}

/// Once the opening line matched, a missing terminator is a hard failure rather than
/// a reason to try the `<` operator.
#[tracing::instrument(level = "trace", skip(input))]
pub fn parse_heredoc(input: &str) -> ParserResult<Token> {
    let (body, tag_name) = heredoc_opening(input)?;

    let mut offset = 0;
    for line in body.split_inclusive('\n') {
        let text = line.trim_end_matches(&['\n', '\r'][..]);
        if text.trim() == tag_name {
            let content = body[..offset].trim_end_matches(&['\n', '\r'][..]).to_string();
            let rest = &body[offset + text.len()..];
            return Ok((
                rest,
                Token::Literal(Literal::Heredoc {
                    tag: tag_name.to_string(),
                    content,
                }),
            ));
        }
        offset += line.len();
    }

    let error = VerboseError::from_error_kind(input, ErrorKind::TakeUntil);
    Err(nom::Err::Failure(VerboseError::add_context(
        input,
        "invalid HEREDOC: missing terminator",
        error,
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heredoc_block() {
        let input = "<<JSON\n{\"a\":1}\nJSON\nSAY 1";
        let (rest, token) = parse_heredoc(input).unwrap();
        assert_eq!(rest, "\nSAY 1");
        assert_eq!(
            token,
            Token::Literal(Literal::Heredoc {
                tag: "JSON".to_string(),
                content: "{\"a\":1}".to_string(),
            })
        );
    }

    #[test]
    fn test_heredoc_keeps_inner_lines() {
        let input = "<<EOF\nkey=value\n  indented\nEOF";
        let (rest, token) = parse_heredoc(input).unwrap();
        assert_eq!(rest, "");
        assert_eq!(
            token,
            Token::Literal(Literal::Heredoc {
                tag: "EOF".to_string(),
                content: "key=value\n  indented".to_string(),
            })
        );
    }

    #[test]
    fn test_indented_terminator() {
        let (_, token) = parse_heredoc("<<END_SQL\nselect 1\n    END_SQL\n").unwrap();
        assert!(matches!(
            token,
            Token::Literal(Literal::Heredoc { ref content, .. }) if content == "select 1"
        ));
    }

    #[test]
    fn test_missing_terminator_fails_hard() {
        let result = parse_heredoc("<<TAG\nno end here\n");
        assert!(matches!(result, Err(nom::Err::Failure(_))));
    }

    #[test]
    fn test_not_a_heredoc() {
        assert!(matches!(parse_heredoc("< 3"), Err(nom::Err::Error(_))));
        assert!(matches!(parse_heredoc("<<TAG more"), Err(nom::Err::Error(_))));
    }
}
