//! # Abstract syntax tree
//!
//! The parser's output. Every [`Statement`] carries the [`Span`] of its first token so runtime
//! errors can name the clause that failed. A [`Program`] is a flat clause list plus a label
//! table; labels are positions in that list, which is what makes `CALL`, `SIGNAL` and classic
//! label fall-through work.

use std::collections::HashMap;

use strum_macros::Display;

pub use crate::tokenizer::token::Span;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Program {
    pub statements: Vec<Statement>,
    /// Uppercased label name → index of the label clause in `statements`.
    pub labels: HashMap<String, usize>,
}

impl Program {
    pub fn new(statements: Vec<Statement>) -> Self {
        let labels = statements
            .iter()
            .enumerate()
            .filter_map(|(index, statement)| match &statement.kind {
                StatementKind::Label(name) => Some((name.to_uppercase(), index)),
                _ => None,
            })
            .collect();
        Self { statements, labels }
    }

    pub fn label(&self, name: &str) -> Option<usize> {
        self.labels.get(&name.to_uppercase()).copied()
    }

    pub fn label_names(&self) -> impl Iterator<Item = &String> {
        self.labels.keys()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub kind: StatementKind,
    pub span: Span,
}

impl Statement {
    pub fn new(kind: StatementKind, span: Span) -> Self {
        Self { kind, span }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StatementKind {
    /// `LET x = e` or `x = e`. The target is the symbol as written; stems resolve at runtime.
    Assignment {
        target: String,
        value: Expression,
    },
    Say(Expression),
    If {
        condition: Expression,
        then_branch: Vec<Statement>,
        else_branch: Option<Vec<Statement>>,
    },
    Do(DoLoop),
    Select {
        whens: Vec<WhenClause>,
        otherwise: Option<Vec<Statement>>,
    },
    Address(AddressClause),
    /// A bare expression clause, sent to the current ADDRESS environment.
    Command(Expression),
    Require {
        identifier: Expression,
        alias: Option<String>,
    },
    Checkpoint {
        key: Expression,
        value: Expression,
        progress: Option<Expression>,
    },
    Exit(Option<Expression>),
    Return(Option<Expression>),
    Call {
        name: String,
        arguments: Arguments,
    },
    Label(String),
    Procedure {
        expose: Vec<String>,
    },
    /// `PARSE ARG` (`upper == false`) or `ARG` (`upper == true`)
    ParseArg {
        names: Vec<String>,
        upper: bool,
    },
    Leave(Option<String>),
    Iterate(Option<String>),
    Signal(SignalClause),
    NumericDigits(Expression),
    Drop(Vec<String>),
    Nop,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DoLoop {
    pub kind: DoKind,
    pub body: Vec<Statement>,
}

impl DoLoop {
    /// Name that `LEAVE name` / `ITERATE name` may refer to.
    pub fn control_variable(&self) -> Option<&str> {
        match &self.kind {
            DoKind::Range { variable, .. } | DoKind::Over { variable, .. } => Some(variable),
            _ => None,
        }
    }

    pub fn is_loop(&self) -> bool {
        !matches!(self.kind, DoKind::Block)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DoKind {
    /// `DO … END` grouping, not a loop
    Block,
    Forever,
    Repeat(Expression),
    Range {
        variable: String,
        start: Expression,
        end: Option<Expression>,
        step: Option<Expression>,
    },
    Over {
        variable: String,
        collection: Expression,
    },
    While(Expression),
    Until(Expression),
}

#[derive(Debug, Clone, PartialEq)]
pub struct WhenClause {
    pub condition: Expression,
    pub body: Vec<Statement>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AddressClause {
    /// `ADDRESS name`
    Switch(String),
    /// `ADDRESS name <command>`: one dispatch, environment unchanged
    Once { target: String, command: Expression },
    /// `ADDRESS` alone: back to the previous environment
    Swap,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SignalClause {
    Goto(String),
    On {
        mode: TrapMode,
        label: Option<String>,
    },
    Off,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum TrapMode {
    #[strum(serialize = "SIGNAL")]
    Signal,
    #[strum(serialize = "CALL")]
    Call,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Arguments {
    Positional(Vec<Expression>),
    Named(Vec<(String, Expression)>),
}

impl Arguments {
    pub fn empty() -> Self {
        Arguments::Positional(Vec::new())
    }

    pub fn is_named(&self) -> bool {
        matches!(self, Arguments::Named(_))
    }

    pub fn len(&self) -> usize {
        match self {
            Arguments::Positional(args) => args.len(),
            Arguments::Named(args) => args.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    String(String),
    Number(String),
    Boolean(bool),
    Heredoc {
        raw: String,
        /// Present when the block is a valid JSON object or array.
        parsed: Option<serde_json::Value>,
    },
    Symbol(String),
    Unary {
        op: UnaryOperator,
        operand: Box<Expression>,
    },
    Binary {
        op: BinaryOperator,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    Call {
        name: String,
        arguments: Arguments,
        /// Set on `LET x = f(k=v)`: when no function `f` exists, call method `f` on the
        /// current ADDRESS environment instead.
        method_fallback: bool,
    },
    /// `LET r = method k=v …`
    MethodCall {
        method: String,
        params: Vec<(String, Expression)>,
    },
}

impl Expression {
    pub fn heredoc(raw: String) -> Self {
        let parsed = serde_json::from_str::<serde_json::Value>(raw.trim())
            .ok()
            .filter(|value| value.is_object() || value.is_array());
        Expression::Heredoc { raw, parsed }
    }

    pub fn binary(op: BinaryOperator, left: Expression, right: Expression) -> Self {
        Expression::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn unary(op: UnaryOperator, operand: Expression) -> Self {
        Expression::Unary {
            op,
            operand: Box::new(operand),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum UnaryOperator {
    #[strum(serialize = "-")]
    Negate,
    #[strum(serialize = "+")]
    Plus,
    #[strum(serialize = "\\")]
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum BinaryOperator {
    #[strum(serialize = "+")]
    Add,
    #[strum(serialize = "-")]
    Subtract,
    #[strum(serialize = "*")]
    Multiply,
    #[strum(serialize = "/")]
    Divide,
    #[strum(serialize = "%")]
    IntDivide,
    #[strum(serialize = "//")]
    Remainder,
    #[strum(serialize = "**")]
    Power,
    /// `||`
    #[strum(serialize = "||")]
    Concat,
    /// Juxtaposition with a blank between operands
    #[strum(serialize = "blank")]
    BlankConcat,
    /// Juxtaposition with no blank (abuttal)
    #[strum(serialize = "abut")]
    AbutConcat,
    #[strum(serialize = "=")]
    Equal,
    #[strum(serialize = "\\=")]
    NotEqual,
    #[strum(serialize = "<")]
    Less,
    #[strum(serialize = "<=")]
    LessEqual,
    #[strum(serialize = ">")]
    Greater,
    #[strum(serialize = ">=")]
    GreaterEqual,
    #[strum(serialize = "&")]
    And,
    #[strum(serialize = "|")]
    Or,
    #[strum(serialize = "&&")]
    Xor,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_table_is_case_folded() {
        let program = Program::new(vec![
            Statement::new(StatementKind::Nop, Span::default()),
            Statement::new(StatementKind::Label("Greet".into()), Span::default()),
        ]);
        assert_eq!(program.label("GREET"), Some(1));
        assert_eq!(program.label("greet"), Some(1));
        assert_eq!(program.label("other"), None);
    }

    #[test]
    fn test_heredoc_json_detection() {
        let Expression::Heredoc { parsed, .. } = Expression::heredoc("{\"a\":1}".into()) else {
            panic!("expected heredoc");
        };
        assert_eq!(parsed, Some(serde_json::json!({"a": 1})));

        let Expression::Heredoc { parsed, .. } = Expression::heredoc("key=value".into()) else {
            panic!("expected heredoc");
        };
        assert_eq!(parsed, None);
    }
}
