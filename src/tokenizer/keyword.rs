use strum::{AsRefStr, Display, EnumIter, EnumString};

/// Clause keywords. They are matched case-insensitively against symbols by the parser and
/// are never reserved at the token level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, Display, EnumIter, AsRefStr)]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum Keyword {
    Let,
    Say,
    If,
    Then,
    Else,
    Endif,
    Do,
    End,
    To,
    By,
    While,
    Until,
    Over,
    Forever,
    Leave,
    Iterate,
    Select,
    When,
    Otherwise,
    Address,
    Require,
    As,
    Exit,
    Return,
    Call,
    Checkpoint,
    Procedure,
    Expose,
    Parse,
    Arg,
    Signal,
    On,
    Off,
    Name,
    Numeric,
    Digits,
    Drop,
    Nop,
}

impl Keyword {
    /// Sub-keywords that close an expression. They cannot be read as bare operands, which
    /// is what lets `IF x THEN` and `DO i = 1 TO n BY 2` parse without lookahead tricks.
    pub fn ends_expression(&self) -> bool {
        matches!(
            self,
            Keyword::Then
                | Keyword::Else
                | Keyword::Endif
                | Keyword::End
                | Keyword::To
                | Keyword::By
                | Keyword::While
                | Keyword::Until
                | Keyword::Over
                | Keyword::When
                | Keyword::Otherwise
                | Keyword::As
        )
    }
}
