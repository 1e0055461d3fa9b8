use nom::{
    branch::alt,
    bytes::complete::{take_while, take_while1},
    combinator::recognize,
    error::{context, VerboseError},
    sequence::pair,
    IResult,
};
use thiserror::Error;

use super::{
    comment::parse_comment,
    heredoc::parse_heredoc,
    keyword::Keyword,
    literal::{parse_literal, Literal},
    symbol::{parse_delimiter, parse_operator, Delimiter, Operator},
    whitespace::{parse_newline, parse_whitespace},
};

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Variable names, labels, function names and (contextual) keywords
    Symbol(String),
    Operator(Operator),
    Delimiter(Delimiter),
    Literal(Literal),
    // Formatting
    Whitespace(String),
    Newline,
    Comment {
        content: String,
        comment_type: CommentType,
    },
}

impl Token {
    pub fn is_comment(&self) -> bool {
        matches!(self, Token::Comment { .. })
    }

    pub fn is_whitespace(&self) -> bool {
        matches!(self, Token::Whitespace(_))
    }

    pub fn is_newline(&self) -> bool {
        matches!(self, Token::Newline)
    }

    /// Newline or `;`.
    pub fn is_terminator(&self) -> bool {
        matches!(self, Token::Newline | Token::Delimiter(Delimiter::Semicolon))
    }

    pub fn as_symbol(&self) -> Option<&str> {
        match self {
            Token::Symbol(name) => Some(name),
            _ => None,
        }
    }

    /// Case-insensitive keyword match. Keywords are never reserved by the tokenizer, so
    /// the same symbol may be a keyword at the start of a clause and a variable elsewhere.
    pub fn keyword(&self) -> Option<Keyword> {
        self.as_symbol().and_then(|s| s.parse::<Keyword>().ok())
    }

    pub fn is_keyword(&self, keyword: Keyword) -> bool {
        self.keyword() == Some(keyword)
    }

    pub fn describe(&self) -> String {
        match self {
            Token::Symbol(name) => format!("'{}'", name),
            Token::Operator(op) => format!("operator '{}'", op),
            Token::Delimiter(d) => format!("'{}'", d),
            Token::Literal(Literal::String(s)) => format!("string \"{}\"", s),
            Token::Literal(Literal::Number(n)) => format!("number {}", n),
            Token::Literal(Literal::Heredoc { tag, .. }) => format!("HEREDOC <<{}", tag),
            Token::Whitespace(_) => "whitespace".to_string(),
            Token::Newline => "end of line".to_string(),
            Token::Comment { .. } => "comment".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommentType {
    Line,  // --
    Block, // /* */
}

#[derive(Debug, Clone)]
pub struct Tokenizer {
    current_position: usize,
    current_line: usize,
    current_column: usize,
}

impl Default for Tokenizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Tokenizer {
    pub fn new() -> Self {
        Self {
            current_position: 0,
            current_line: 1,   // 1-based
            current_column: 1, // 1-based
        }
    }

    #[tracing::instrument(level = "debug", skip(self, input))]
    pub fn tokenize(&mut self, input: &str) -> TokenizerResult<Vec<TokenSpan>> {
        let mut tokens = Vec::new();
        let mut remaining = input;

        while !remaining.is_empty() {
            let start_position = self.current_position;
            let start_line = self.current_line;
            let start_column = self.current_column;

            let result = alt((
                // Formatting
                parse_whitespace,
                parse_newline,
                // Comments come before operators so `--` and `/*` win
                parse_comment,
                parse_heredoc,
                parse_literal,
                parse_operator,
                parse_delimiter,
                parse_symbol,
            ))(remaining);

            match result {
                Ok((new_remaining, token)) => {
                    let consumed = &remaining[..(remaining.len() - new_remaining.len())];
                    self.update_position(consumed);

                    tokens.push(TokenSpan {
                        token,
                        start: start_position,
                        end: self.current_position,
                        line: start_line,
                        column: start_column,
                    });

                    remaining = new_remaining;
                }
                Err(e) => {
                    let found = remaining.chars().take(20).collect::<String>();
                    let span = Span {
                        start: self.current_position,
                        end: self.current_position + 1,
                        line: self.current_line,
                        column: self.current_column,
                    };
                    let message = match e {
                        nom::Err::Incomplete(needed) => format!("incomplete input, {:?}", needed),
                        nom::Err::Error(_) => match remaining.chars().next() {
                            Some(quote @ ('"' | '\'')) => {
                                format!("unterminated string literal starting with {}", quote)
                            }
                            other => {
                                format!("unexpected character '{}'", other.unwrap_or_default())
                            }
                        },
                        nom::Err::Failure(e) => describe_failure(&e),
                    };
                    let error = TokenizerError::ParseError {
                        message,
                        found,
                        span,
                    };
                    tracing::error!("{}", error);
                    return Err(error);
                }
            }
        }

        Ok(tokens)
    }

    fn update_position(&mut self, text: &str) {
        for c in text.chars() {
            self.current_position += c.len_utf8();
            if c == '\n' {
                self.current_line += 1;
                self.current_column = 1;
            } else {
                self.current_column += 1;
            }
        }
    }
}

/// Picks the outermost context label nom recorded, falling back to a generic message.
fn describe_failure(error: &VerboseError<&str>) -> String {
    error
        .errors
        .iter()
        .rev()
        .find_map(|(_, kind)| match kind {
            nom::error::VerboseErrorKind::Context(ctx) => Some(ctx.to_string()),
            _ => None,
        })
        .unwrap_or_else(|| "unrecognized character".to_string())
}

#[derive(Debug, Clone)]
pub struct TokenSpan {
    pub token: Token,
    pub start: usize,
    pub end: usize,
    pub line: usize,
    pub column: usize,
}

impl TokenSpan {
    pub fn span(&self) -> Span {
        Span {
            start: self.start,
            end: self.end,
            line: self.line,
            column: self.column,
        }
    }

    /// True when `next` begins exactly where this token ends.
    pub fn abuts(&self, next: &TokenSpan) -> bool {
        self.end == next.start
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub line: usize,
    pub column: usize,
}

impl std::fmt::Display for Span {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

#[tracing::instrument(level = "trace", skip(input))]
pub fn parse_symbol(input: &str) -> ParserResult<Token> {
    let (input, name) = context(
        "symbol",
        recognize(pair(
            take_while1(|c: char| c.is_alphabetic() || c == '_'),
            take_while(|c: char| c.is_alphanumeric() || c == '_' || c == '.'),
        )),
    )(input)?;

    Ok((input, Token::Symbol(name.to_string())))
}

pub type ParserResult<'a, T> = IResult<&'a str, T, VerboseError<&'a str>>;

pub type TokenizerResult<T> = Result<T, TokenizerError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TokenizerError {
    #[error("{message} at {span}")]
    ParseError {
        message: String,
        found: String,
        span: Span,
    },
}

impl TokenizerError {
    pub fn span(&self) -> Span {
        match self {
            TokenizerError::ParseError { span, .. } => *span,
        }
    }
}
