//! Block statements and the clause-list loop they share.

use super::{
    super::core::*,
    common::*,
    expression::parse_expression,
    statement::parse_clause,
};
use crate::ast::{DoKind, DoLoop, Expression, Statement, StatementKind, WhenClause};
use crate::tokenizer::{
    keyword::Keyword,
    symbol::{Delimiter, Operator},
    token::{Token, TokenSpan},
};

/// Is there a `stop` keyword at `pos`? `end = 1` and `end:` are still an assignment and a label.
fn at_stop(input: &[TokenSpan], pos: usize, stops: &[Keyword]) -> bool {
    let is_stop = peek(input, pos)
        .and_then(Token::keyword)
        .is_some_and(|k| stops.contains(&k));
    is_stop
        && !matches!(
            peek(input, pos + 1),
            Some(Token::Operator(Operator::Equal)) | Some(Token::Delimiter(Delimiter::Colon))
        )
}

/// Clauses up to one of `stops` or the end of input. The stop token itself is not consumed.
pub fn parse_body(
    input: &[TokenSpan],
    pos: usize,
    stops: &[Keyword],
) -> ParseResult<Vec<Statement>> {
    let mut statements = Vec::new();
    let mut pos = pos;
    loop {
        pos = skip_terminators(input, pos);
        if pos >= input.len() || at_stop(input, pos, stops) {
            return Ok((pos, statements));
        }
        let (next, statement) = parse_clause(input, pos, stops)?;
        statements.push(statement);
        pos = next;
        if !at_clause_end(input, pos) && !at_stop(input, pos, stops) {
            return Err(ParseError::failure(
                format!(
                    "unexpected {} at {}, expected end of clause",
                    describe_at(input, pos),
                    span_at(input, pos)
                ),
                pos,
            ));
        }
    }
}

fn parse_condition(input: &[TokenSpan], pos: usize, clause: &str) -> ParseResult<Expression> {
    parse_expression().parse(input, pos).map_err(|e| {
        e.commit(&format!(
            "invalid {} condition at {}",
            clause,
            span_at(input, pos)
        ))
    })
}

fn expect_keyword(
    input: &[TokenSpan],
    pos: usize,
    keyword: Keyword,
    message: impl FnOnce() -> String,
) -> ParseResult<()> {
    parse_keyword(keyword)
        .parse(input, pos)
        .map_err(|_| ParseError::failure(message(), pos))
}

/// `IF` in all its forms. The flag reports whether an `ENDIF` was consumed, so an
/// `ELSE IF` chain can share the outer one.
///
/// A single-clause `IF` takes an `ELSE` from the next line unless the enclosing body
/// itself stops at `ELSE`. There the `ELSE` belongs to the enclosing block `IF`.
pub fn parse_if(
    input: &[TokenSpan],
    pos: usize,
    stops: &[Keyword],
) -> ParseResult<(StatementKind, bool)> {
    let at = span_at(input, pos);
    let (pos, condition) = parse_condition(input, pos + 1, "IF")?;
    let (pos, _) = expect_keyword(input, pos, Keyword::Then, || {
        format!(
            "expected THEN after IF condition at {}, found {}",
            span_at(input, pos),
            describe_at(input, pos)
        )
    })?;
    let missing_endif = || format!("IF at {} has no matching ENDIF", at);

    if at_clause_end(input, pos) {
        let (pos, then_branch) = parse_body(input, pos, &[Keyword::Else, Keyword::Endif])?;
        let (pos, else_branch) = if at_keyword(input, pos, Keyword::Else) {
            let (pos, (else_branch, closed)) = parse_else(input, pos, &[])?;
            if closed {
                return Ok((
                    pos,
                    (
                        StatementKind::If {
                            condition,
                            then_branch,
                            else_branch: Some(else_branch),
                        },
                        true,
                    ),
                ));
            }
            (skip_terminators(input, pos), Some(else_branch))
        } else {
            (pos, None)
        };
        let (pos, _) = expect_keyword(input, pos, Keyword::Endif, missing_endif)?;
        return Ok((
            pos,
            (
                StatementKind::If {
                    condition,
                    then_branch,
                    else_branch,
                },
                true,
            ),
        ));
    }

    let (pos, then_clause) = parse_clause(input, pos, stops)?;
    let then_branch = vec![then_clause];
    let else_at = if at_keyword(input, pos, Keyword::Else) {
        Some(pos)
    } else if stops.contains(&Keyword::Else) {
        None
    } else {
        let next = skip_terminators(input, pos);
        at_keyword(input, next, Keyword::Else).then_some(next)
    };
    match else_at {
        Some(else_pos) => {
            let (pos, (else_branch, closed)) = parse_else(input, else_pos, stops)?;
            Ok((
                pos,
                (
                    StatementKind::If {
                        condition,
                        then_branch,
                        else_branch: Some(else_branch),
                    },
                    closed,
                ),
            ))
        }
        None => Ok((
            pos,
            (
                StatementKind::If {
                    condition,
                    then_branch,
                    else_branch: None,
                },
                false,
            ),
        )),
    }
}

/// `ELSE` at `pos`. Returns the branch and whether an `ENDIF` was consumed.
fn parse_else(
    input: &[TokenSpan],
    pos: usize,
    stops: &[Keyword],
) -> ParseResult<(Vec<Statement>, bool)> {
    let at = span_at(input, pos);
    let pos = pos + 1;
    if at_keyword(input, pos, Keyword::If) {
        let span = span_at(input, pos);
        let (next, (kind, closed)) = parse_if(input, pos, stops)?;
        return Ok((next, (vec![Statement::new(kind, span)], closed)));
    }
    if at_clause_end(input, pos) {
        let (pos, body) = parse_body(input, pos, &[Keyword::Endif])?;
        let (pos, _) = expect_keyword(input, pos, Keyword::Endif, || {
            format!("ELSE at {} has no matching ENDIF", at)
        })?;
        return Ok((pos, (body, true)));
    }
    let (next, clause) = parse_clause(input, pos, stops)?;
    Ok((next, (vec![clause], false)))
}

pub fn parse_do(input: &[TokenSpan], pos: usize) -> ParseResult<StatementKind> {
    let at = span_at(input, pos);
    let (pos, kind) = parse_do_header(input, pos + 1)?;
    if !at_clause_end(input, pos) {
        return Err(ParseError::failure(
            format!(
                "unexpected {} after DO at {}",
                describe_at(input, pos),
                at
            ),
            pos,
        ));
    }
    let (pos, body) = parse_body(input, pos, &[Keyword::End])?;
    let (pos, _) = expect_keyword(input, pos, Keyword::End, || {
        format!("DO at {} has no matching END", at)
    })?;
    let do_loop = DoLoop { kind, body };
    let (pos, _) = parse_end_name(input, pos, do_loop.control_variable())?;
    Ok((pos, StatementKind::Do(do_loop)))
}

/// Optional `END name`, which must repeat the loop's control variable.
fn parse_end_name(input: &[TokenSpan], pos: usize, variable: Option<&str>) -> ParseResult<()> {
    let Some(Token::Symbol(name)) = peek(input, pos) else {
        return Ok((pos, ()));
    };
    if ends_expression(&input[pos].token) {
        return Ok((pos, ()));
    }
    match variable {
        Some(variable) if variable.eq_ignore_ascii_case(name) => Ok((pos + 1, ())),
        _ => Err(ParseError::failure(
            format!(
                "END {} at {} does not match the enclosing DO",
                name,
                span_at(input, pos)
            ),
            pos,
        )),
    }
}

fn parse_do_header(input: &[TokenSpan], pos: usize) -> ParseResult<DoKind> {
    if at_clause_end(input, pos) {
        return Ok((pos, DoKind::Block));
    }
    if at_keyword(input, pos, Keyword::Forever) {
        return Ok((pos + 1, DoKind::Forever));
    }
    if at_keyword(input, pos, Keyword::While) {
        let (pos, condition) = parse_condition(input, pos + 1, "WHILE")?;
        return Ok((pos, DoKind::While(condition)));
    }
    if at_keyword(input, pos, Keyword::Until) {
        let (pos, condition) = parse_condition(input, pos + 1, "UNTIL")?;
        return Ok((pos, DoKind::Until(condition)));
    }
    if let Some(Token::Symbol(variable)) = peek(input, pos) {
        if at_keyword(input, pos + 1, Keyword::Over) {
            let (next, collection) = parse_condition(input, pos + 2, "OVER")?;
            return Ok((
                next,
                DoKind::Over {
                    variable: variable.clone(),
                    collection,
                },
            ));
        }
        if peek(input, pos + 1) == Some(&Token::Operator(Operator::Equal)) {
            return parse_range(input, pos + 2, variable.clone());
        }
    }
    let (pos, count) = parse_condition(input, pos, "DO count")?;
    Ok((pos, DoKind::Repeat(count)))
}

/// `start [TO end] [BY step]`, TO and BY in either order.
fn parse_range(input: &[TokenSpan], pos: usize, variable: String) -> ParseResult<DoKind> {
    let (mut pos, start) = parse_condition(input, pos, "DO start")?;
    let mut end = None;
    let mut step = None;
    loop {
        if end.is_none() && at_keyword(input, pos, Keyword::To) {
            let (next, value) = parse_condition(input, pos + 1, "TO")?;
            end = Some(value);
            pos = next;
        } else if step.is_none() && at_keyword(input, pos, Keyword::By) {
            let (next, value) = parse_condition(input, pos + 1, "BY")?;
            step = Some(value);
            pos = next;
        } else {
            break;
        }
    }
    Ok((
        pos,
        DoKind::Range {
            variable,
            start,
            end,
            step,
        },
    ))
}

pub fn parse_select(input: &[TokenSpan], pos: usize) -> ParseResult<StatementKind> {
    let at = span_at(input, pos);
    let mut pos = skip_terminators(input, pos + 1);
    let mut whens = Vec::new();
    let stops = [Keyword::When, Keyword::Otherwise, Keyword::End];

    while at_stop(input, pos, &[Keyword::When]) {
        let (next, condition) = parse_condition(input, pos + 1, "WHEN")?;
        let (next, _) = expect_keyword(input, next, Keyword::Then, || {
            format!(
                "expected THEN after WHEN condition at {}, found {}",
                span_at(input, next),
                describe_at(input, next)
            )
        })?;
        let (next, body) = parse_body(input, next, &stops)?;
        whens.push(WhenClause { condition, body });
        pos = skip_terminators(input, next);
    }
    if whens.is_empty() {
        return Err(ParseError::failure(
            format!("SELECT at {} has no WHEN clause", at),
            pos,
        ));
    }

    let (pos, otherwise) = if at_stop(input, pos, &[Keyword::Otherwise]) {
        let (next, body) = parse_body(input, pos + 1, &[Keyword::End])?;
        (next, Some(body))
    } else {
        (pos, None)
    };
    let (pos, _) = expect_keyword(input, pos, Keyword::End, || {
        format!("SELECT at {} has no matching END", at)
    })?;
    Ok((pos, StatementKind::Select { whens, otherwise }))
}
