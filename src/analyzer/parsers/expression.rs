use super::{
    super::{core::*, prelude::*},
    common::*,
};
use crate::ast::{Arguments, BinaryOperator, Expression, UnaryOperator};
use crate::tokenizer::{
    literal::Literal,
    symbol::{Delimiter, Operator},
    token::{Token, TokenSpan},
};

pub fn parse_expression() -> impl Parser<TokenSpan, Expression> {
    with_context(lazy(parse_logical_or), "expression")
}

fn fold_binary(first: Expression, rest: Vec<(BinaryOperator, Expression)>) -> Expression {
    rest.into_iter()
        .fold(first, |left, (op, right)| Expression::binary(op, left, right))
}

fn parse_binary_operator(
    table: &'static [(Operator, BinaryOperator)],
) -> impl Parser<TokenSpan, BinaryOperator> {
    satisfy(move |span: &TokenSpan| match &span.token {
        Token::Operator(op) => table
            .iter()
            .find(|(candidate, _)| candidate == op)
            .map(|(_, binary)| *binary),
        _ => None,
    })
}

const OR_OPERATORS: &[(Operator, BinaryOperator)] = &[
    (Operator::Or, BinaryOperator::Or),
    (Operator::Xor, BinaryOperator::Xor),
];
const AND_OPERATORS: &[(Operator, BinaryOperator)] = &[(Operator::And, BinaryOperator::And)];
const COMPARISON_OPERATORS: &[(Operator, BinaryOperator)] = &[
    (Operator::Equal, BinaryOperator::Equal),
    (Operator::EqualEqual, BinaryOperator::Equal),
    (Operator::NotEqual, BinaryOperator::NotEqual),
    (Operator::Less, BinaryOperator::Less),
    (Operator::LessEqual, BinaryOperator::LessEqual),
    (Operator::Greater, BinaryOperator::Greater),
    (Operator::GreaterEqual, BinaryOperator::GreaterEqual),
];
const ADDITIVE_OPERATORS: &[(Operator, BinaryOperator)] = &[
    (Operator::Plus, BinaryOperator::Add),
    (Operator::Minus, BinaryOperator::Subtract),
];
const MULTIPLICATIVE_OPERATORS: &[(Operator, BinaryOperator)] = &[
    (Operator::Multiply, BinaryOperator::Multiply),
    (Operator::Divide, BinaryOperator::Divide),
    (Operator::IntDivide, BinaryOperator::IntDivide),
    (Operator::Remainder, BinaryOperator::Remainder),
];
const POWER_OPERATORS: &[(Operator, BinaryOperator)] = &[(Operator::Power, BinaryOperator::Power)];

fn parse_logical_or() -> impl Parser<TokenSpan, Expression> {
    with_context(
        map(
            tuple2(
                parse_logical_and(),
                many(tuple2(
                    parse_binary_operator(OR_OPERATORS),
                    parse_logical_and(),
                )),
            ),
            |(first, rest)| fold_binary(first, rest),
        ),
        "logical or",
    )
}

fn parse_logical_and() -> impl Parser<TokenSpan, Expression> {
    with_context(
        map(
            tuple2(
                parse_comparison(),
                many(tuple2(
                    parse_binary_operator(AND_OPERATORS),
                    parse_comparison(),
                )),
            ),
            |(first, rest)| fold_binary(first, rest),
        ),
        "logical and",
    )
}

fn parse_comparison() -> impl Parser<TokenSpan, Expression> {
    with_context(
        map(
            tuple2(
                parse_concatenation(),
                many(tuple2(
                    parse_binary_operator(COMPARISON_OPERATORS),
                    parse_concatenation(),
                )),
            ),
            |(first, rest)| fold_binary(first, rest),
        ),
        "comparison",
    )
}

/// Can the token at `pos` begin a juxtaposed operand?
fn starts_operand(input: &[TokenSpan], pos: usize) -> bool {
    match peek(input, pos) {
        Some(Token::Literal(_)) => true,
        Some(token @ Token::Symbol(_)) => !ends_expression(token),
        Some(Token::Delimiter(Delimiter::OpenParen)) => true,
        _ => false,
    }
}

/// `||` and juxtaposition. With a blank between the operands the result gets exactly one
/// space; written flush together (abuttal) it gets none.
fn parse_concatenation() -> impl Parser<TokenSpan, Expression> {
    with_context(
        from_fn(|input: &[TokenSpan], pos: usize| {
            let additive = parse_additive();
            let (mut pos, mut left) = additive.parse(input, pos)?;
            loop {
                if peek(input, pos) == Some(&Token::Operator(Operator::Concat)) {
                    let (next, right) = additive
                        .parse(input, pos + 1)
                        .map_err(|e| e.commit("expected an operand after '||'"))?;
                    left = Expression::binary(BinaryOperator::Concat, left, right);
                    pos = next;
                } else if pos > 0 && starts_operand(input, pos) {
                    let op = if input[pos - 1].abuts(&input[pos]) {
                        BinaryOperator::AbutConcat
                    } else {
                        BinaryOperator::BlankConcat
                    };
                    match additive.parse(input, pos) {
                        Ok((next, right)) => {
                            left = Expression::binary(op, left, right);
                            pos = next;
                        }
                        Err(e) if e.is_failure() => return Err(e),
                        Err(_) => break,
                    }
                } else {
                    break;
                }
            }
            Ok((pos, left))
        }),
        "concatenation",
    )
}

/// Additive level. Also the operand grammar of paren-less `method key=value` calls, where
/// juxtaposition would swallow the next key.
pub fn parse_additive() -> impl Parser<TokenSpan, Expression> {
    with_context(
        map(
            tuple2(
                parse_multiplicative(),
                many(tuple2(
                    parse_binary_operator(ADDITIVE_OPERATORS),
                    parse_multiplicative(),
                )),
            ),
            |(first, rest)| fold_binary(first, rest),
        ),
        "additive",
    )
}

fn parse_multiplicative() -> impl Parser<TokenSpan, Expression> {
    with_context(
        map(
            tuple2(
                parse_power(),
                many(tuple2(
                    parse_binary_operator(MULTIPLICATIVE_OPERATORS),
                    parse_power(),
                )),
            ),
            |(first, rest)| fold_binary(first, rest),
        ),
        "multiplicative",
    )
}

fn parse_power() -> impl Parser<TokenSpan, Expression> {
    with_context(
        map(
            tuple2(
                parse_unary(),
                many(tuple2(
                    parse_binary_operator(POWER_OPERATORS),
                    parse_unary(),
                )),
            ),
            |(first, rest)| fold_binary(first, rest),
        ),
        "power",
    )
}

fn parse_unary_operator() -> impl Parser<TokenSpan, UnaryOperator> {
    satisfy(|span: &TokenSpan| match span.token {
        Token::Operator(Operator::Minus) => Some(UnaryOperator::Negate),
        Token::Operator(Operator::Plus) => Some(UnaryOperator::Plus),
        Token::Operator(Operator::Not) => Some(UnaryOperator::Not),
        _ => None,
    })
}

/// Prefix operators bind tighter than any binary operator, `**` included.
fn parse_unary() -> impl Parser<TokenSpan, Expression> {
    with_context(
        choice(vec![
            Box::new(map(
                tuple2(parse_unary_operator(), lazy(parse_unary)),
                |(op, operand)| Expression::unary(op, operand),
            )),
            Box::new(parse_primary()),
        ]),
        "unary",
    )
}

fn parse_primary() -> impl Parser<TokenSpan, Expression> {
    with_context(
        choice(vec![
            Box::new(parse_literal()),
            Box::new(parse_parenthesized()),
            Box::new(parse_function_call()),
            Box::new(parse_boolean()),
            Box::new(map(parse_symbol(), Expression::Symbol)),
        ]),
        "primary",
    )
}

fn parse_literal() -> impl Parser<TokenSpan, Expression> {
    satisfy(|span: &TokenSpan| match &span.token {
        Token::Literal(Literal::String(s)) => Some(Expression::String(s.clone())),
        Token::Literal(Literal::Number(n)) => Some(Expression::Number(n.clone())),
        Token::Literal(Literal::Heredoc { content, .. }) => {
            Some(Expression::heredoc(content.clone()))
        }
        _ => None,
    })
}

fn parse_boolean() -> impl Parser<TokenSpan, Expression> {
    satisfy(|span: &TokenSpan| match &span.token {
        Token::Symbol(s) if s.eq_ignore_ascii_case("true") => Some(Expression::Boolean(true)),
        Token::Symbol(s) if s.eq_ignore_ascii_case("false") => Some(Expression::Boolean(false)),
        _ => None,
    })
}

fn parse_parenthesized() -> impl Parser<TokenSpan, Expression> {
    from_fn(|input: &[TokenSpan], pos: usize| {
        let (pos, _) = parse_open_paren().parse(input, pos)?;
        let (pos, expression) = parse_expression()
            .parse(input, pos)
            .map_err(|e| e.commit("expected an expression after '('"))?;
        let (pos, _) = parse_close_paren().parse(input, pos).map_err(|_| {
            ParseError::failure(
                format!(
                    "expected ')' at {}, found {}",
                    span_at(input, pos),
                    describe_at(input, pos)
                ),
                pos,
            )
        })?;
        Ok((pos, expression))
    })
}

/// `name(args)`: the parenthesis must touch the name, `name (x)` is concatenation.
fn parse_function_call() -> impl Parser<TokenSpan, Expression> {
    from_fn(|input: &[TokenSpan], pos: usize| {
        let (after_name, name) = parse_symbol().parse(input, pos)?;
        let touches_paren = peek(input, after_name) == Some(&Token::Delimiter(Delimiter::OpenParen))
            && input[pos].abuts(&input[after_name]);
        if !touches_paren {
            return Err(ParseError::Unexpected {
                expected: "'('".to_string(),
                found: describe_at(input, after_name),
                position: after_name,
                context: None,
            });
        }
        let (pos, arguments) = parse_call_arguments(input, after_name + 1)?;
        Ok((
            pos,
            Expression::Call {
                name,
                arguments,
                method_fallback: false,
            },
        ))
    })
}

fn looks_named(input: &[TokenSpan], pos: usize) -> bool {
    matches!(peek(input, pos), Some(Token::Symbol(_)))
        && peek(input, pos + 1) == Some(&Token::Operator(Operator::Equal))
}

/// `key = expression`
pub fn parse_named_argument() -> impl Parser<TokenSpan, (String, Expression)> {
    from_fn(|input: &[TokenSpan], pos: usize| {
        if !looks_named(input, pos) {
            return Err(ParseError::Unexpected {
                expected: "key=value".to_string(),
                found: describe_at(input, pos),
                position: pos,
                context: None,
            });
        }
        let (next, key) = parse_symbol().parse(input, pos)?;
        let (next, _) = parse_operator(Operator::Equal).parse(input, next)?;
        let (next, value) = parse_expression()
            .parse(input, next)
            .map_err(|e| e.commit(&format!("expected a value for '{}'", key)))?;
        Ok((next, (key, value)))
    })
}

/// Positional arguments.
fn parse_positional_argument() -> impl Parser<TokenSpan, Expression> {
    from_fn(|input: &[TokenSpan], pos: usize| {
        if looks_named(input, pos) {
            return Err(ParseError::failure(
                format!(
                    "cannot mix positional and named arguments at {}",
                    span_at(input, pos)
                ),
                pos,
            ));
        }
        parse_expression().parse(input, pos)
    })
}

/// Argument list after the opening parenthesis, up to and including `)`. The convention is
/// decided by the first argument: `key=value` makes the whole call named.
pub fn parse_call_arguments(input: &[TokenSpan], pos: usize) -> ParseResult<Arguments> {
    let (pos, arguments) = parse_argument_list(input, pos)?;
    let (pos, _) = parse_close_paren().parse(input, pos).map_err(|_| {
        ParseError::failure(
            format!(
                "expected ')' or ',' in argument list at {}, found {}",
                span_at(input, pos),
                describe_at(input, pos)
            ),
            pos,
        )
    })?;
    Ok((pos, arguments))
}

/// Comma-separated arguments with no surrounding parentheses (`CALL name a, b`).
pub fn parse_argument_list(input: &[TokenSpan], pos: usize) -> ParseResult<Arguments> {
    if looks_named(input, pos) {
        let (pos, named) = separated_list(parse_named_argument_only(), parse_comma())
            .parse(input, pos)?;
        Ok((pos, Arguments::Named(named)))
    } else {
        let (pos, positional) =
            separated_list(parse_positional_argument(), parse_comma()).parse(input, pos)?;
        Ok((pos, Arguments::Positional(positional)))
    }
}

fn parse_named_argument_only() -> impl Parser<TokenSpan, (String, Expression)> {
    from_fn(|input: &[TokenSpan], pos: usize| {
        if !looks_named(input, pos) {
            return Err(ParseError::failure(
                format!(
                    "cannot mix positional and named arguments at {}",
                    span_at(input, pos)
                ),
                pos,
            ));
        }
        parse_named_argument().parse(input, pos)
    })
}

/// Paren-less method call parameters: `key=value key2=value2`, values at additive level.
pub fn parse_method_params(
    input: &[TokenSpan],
    mut pos: usize,
) -> ParseResult<Vec<(String, Expression)>> {
    let mut params = Vec::new();
    while looks_named(input, pos) {
        let (next, key) = parse_symbol().parse(input, pos)?;
        let (next, value) = parse_additive()
            .parse(input, next + 1)
            .map_err(|e| e.commit(&format!("expected a value for '{}'", key)))?;
        params.push((key, value));
        pos = next;
    }
    Ok((pos, params))
}

/// `method key=value …` at `pos`?
pub fn looks_like_method_call(input: &[TokenSpan], pos: usize) -> bool {
    matches!(peek(input, pos), Some(token @ Token::Symbol(_)) if !ends_expression(token))
        && looks_named(input, pos + 1)
}
