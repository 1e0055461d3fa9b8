//! Single clauses. Block statements (IF, DO, SELECT) live in [`super::control`]; this module
//! owns clause dispatch on the leading token.

use super::{
    super::{core::*, prelude::*},
    common::*,
    control::{parse_do, parse_if, parse_select},
    expression::*,
};
use crate::ast::{
    AddressClause, Arguments, Expression, SignalClause, Statement, StatementKind, TrapMode,
};
use crate::tokenizer::{
    keyword::Keyword,
    symbol::{Delimiter, Operator},
    token::{Token, TokenSpan},
};

/// Parses one clause starting at `pos`. Terminators are left for the caller.
/// One clause inside a body that ends at one of `stops`.
pub fn parse_clause(
    input: &[TokenSpan],
    pos: usize,
    stops: &[Keyword],
) -> ParseResult<Statement> {
    let span = span_at(input, pos);
    let Some(token) = peek(input, pos) else {
        return Err(ParseError::eof("expected a clause", pos));
    };

    if let Token::Symbol(name) = token {
        match peek(input, pos + 1) {
            Some(Token::Delimiter(Delimiter::Colon)) => {
                return Ok((pos + 2, Statement::new(StatementKind::Label(name.clone()), span)));
            }
            Some(Token::Operator(Operator::Equal)) => {
                let (next, kind) = parse_assignment_tail(input, pos)?;
                return Ok((next, Statement::new(kind, span)));
            }
            _ => {}
        }
    }

    let (next, kind) = match token.keyword() {
        Some(Keyword::Let) => parse_assignment_tail(input, pos + 1),
        Some(Keyword::Say) => parse_say(input, pos + 1),
        Some(Keyword::If) => parse_if(input, pos, stops).map(|(next, (kind, _))| (next, kind)),
        Some(Keyword::Do) => parse_do(input, pos),
        Some(Keyword::Select) => parse_select(input, pos),
        Some(Keyword::Address) => parse_address(input, pos + 1),
        Some(Keyword::Require) => parse_require(input, pos + 1),
        Some(Keyword::Checkpoint) => parse_checkpoint(input, pos + 1),
        Some(Keyword::Exit) => parse_optional_expression(input, pos + 1, "EXIT")
            .map(|(next, value)| (next, StatementKind::Exit(value))),
        Some(Keyword::Return) => parse_optional_expression(input, pos + 1, "RETURN")
            .map(|(next, value)| (next, StatementKind::Return(value))),
        Some(Keyword::Call) => parse_call(input, pos + 1),
        Some(Keyword::Procedure) => parse_procedure(input, pos + 1),
        Some(Keyword::Parse) if at_keyword(input, pos + 1, Keyword::Arg) => {
            parse_arg_names(input, pos + 2, false)
        }
        Some(Keyword::Arg) => parse_arg_names(input, pos + 1, true),
        Some(Keyword::Leave) => parse_loop_target(input, pos + 1)
            .map(|(next, name)| (next, StatementKind::Leave(name))),
        Some(Keyword::Iterate) => parse_loop_target(input, pos + 1)
            .map(|(next, name)| (next, StatementKind::Iterate(name))),
        Some(Keyword::Signal) => parse_signal(input, pos + 1),
        Some(Keyword::Numeric) => parse_numeric(input, pos + 1),
        Some(Keyword::Drop) => parse_drop(input, pos + 1),
        Some(Keyword::Nop) => Ok((pos + 1, StatementKind::Nop)),
        Some(keyword) if keyword.ends_expression() => Err(orphan(keyword, input, pos)),
        _ => parse_command(input, pos),
    }?;
    Ok((next, Statement::new(kind, span)))
}

fn orphan(keyword: Keyword, input: &[TokenSpan], pos: usize) -> ParseError {
    let at = span_at(input, pos);
    let message = match keyword {
        Keyword::End => format!("END at {} has no matching DO or SELECT", at),
        Keyword::Endif => format!("ENDIF at {} has no matching IF", at),
        Keyword::Else => format!("ELSE at {} has no matching IF", at),
        Keyword::Then => format!("THEN at {} has no matching IF or WHEN", at),
        Keyword::When => format!("WHEN at {} outside SELECT", at),
        Keyword::Otherwise => format!("OTHERWISE at {} outside SELECT", at),
        other => format!("unexpected {} at {}", other, at),
    };
    ParseError::failure(message, pos)
}

/// Commits a clause-level error with a message naming the clause and where it broke.
fn invalid<'a>(clause: &str, input: &'a [TokenSpan]) -> impl Fn(ParseError) -> ParseError + 'a {
    let clause = clause.to_string();
    move |error: ParseError| {
        if error.is_failure() {
            return error;
        }
        let pos = error.get_position();
        ParseError::failure(
            format!(
                "invalid {} clause at {}: unexpected {}",
                clause,
                span_at(input, pos),
                describe_at(input, pos)
            ),
            pos,
        )
    }
}

/// `name = value` with `pos` at the target name.
fn parse_assignment_tail(input: &[TokenSpan], pos: usize) -> ParseResult<StatementKind> {
    let (pos, target) = parse_symbol()
        .parse(input, pos)
        .map_err(invalid("assignment", input))?;
    let (pos, _) = parse_operator(Operator::Equal)
        .parse(input, pos)
        .map_err(invalid("assignment", input))?;
    let (pos, value) = parse_assigned_value(input, pos).map_err(invalid("assignment", input))?;
    Ok((pos, StatementKind::Assignment { target, value }))
}

fn parse_assigned_value(input: &[TokenSpan], pos: usize) -> ParseResult<Expression> {
    if looks_like_method_call(input, pos) {
        let (next, method) = parse_symbol().parse(input, pos)?;
        let (next, params) = parse_method_params(input, next)?;
        return Ok((next, Expression::MethodCall { method, params }));
    }
    let (next, value) = parse_expression().parse(input, pos)?;
    let value = match value {
        Expression::Call {
            name,
            arguments: arguments @ Arguments::Named(_),
            ..
        } => Expression::Call {
            name,
            arguments,
            method_fallback: true,
        },
        other => other,
    };
    Ok((next, value))
}

fn parse_say(input: &[TokenSpan], pos: usize) -> ParseResult<StatementKind> {
    let (pos, value) = parse_optional_expression(input, pos, "SAY")?;
    Ok((
        pos,
        StatementKind::Say(value.unwrap_or_else(|| Expression::String(String::new()))),
    ))
}

fn parse_optional_expression(
    input: &[TokenSpan],
    pos: usize,
    clause: &str,
) -> ParseResult<Option<Expression>> {
    if at_clause_end(input, pos) || peek(input, pos).is_some_and(ends_expression) {
        return Ok((pos, None));
    }
    let (pos, value) = parse_expression()
        .parse(input, pos)
        .map_err(invalid(clause, input))?;
    Ok((pos, Some(value)))
}

fn parse_command(input: &[TokenSpan], pos: usize) -> ParseResult<StatementKind> {
    let (pos, command) = parse_expression()
        .parse(input, pos)
        .map_err(invalid("command", input))?;
    Ok((pos, StatementKind::Command(command)))
}

fn parse_address(input: &[TokenSpan], pos: usize) -> ParseResult<StatementKind> {
    if at_clause_end(input, pos) || peek(input, pos).is_some_and(ends_expression) {
        return Ok((pos, StatementKind::Address(AddressClause::Swap)));
    }
    let (pos, target) = parse_name()
        .parse(input, pos)
        .map_err(invalid("ADDRESS", input))?;
    if at_clause_end(input, pos) || peek(input, pos).is_some_and(ends_expression) {
        return Ok((pos, StatementKind::Address(AddressClause::Switch(target))));
    }
    let (pos, command) = parse_expression()
        .parse(input, pos)
        .map_err(invalid("ADDRESS", input))?;
    Ok((
        pos,
        StatementKind::Address(AddressClause::Once { target, command }),
    ))
}

fn parse_require(input: &[TokenSpan], pos: usize) -> ParseResult<StatementKind> {
    let (pos, identifier) = parse_expression()
        .parse(input, pos)
        .map_err(invalid("REQUIRE", input))?;
    let (pos, alias) = optional(preceded(parse_keyword(Keyword::As), parse_name()))
        .parse(input, pos)
        .map_err(invalid("REQUIRE", input))?;
    if alias.is_none() && at_keyword(input, pos, Keyword::As) {
        return Err(invalid("REQUIRE", input)(ParseError::eof("alias", pos + 1)));
    }
    Ok((pos, StatementKind::Require { identifier, alias }))
}

/// `CHECKPOINT(key, value[, progress])`, parentheses optional.
fn parse_checkpoint(input: &[TokenSpan], pos: usize) -> ParseResult<StatementKind> {
    let start = pos;
    let (pos, arguments) = if peek(input, pos) == Some(&Token::Delimiter(Delimiter::OpenParen)) {
        parse_call_arguments(input, pos + 1)
    } else {
        parse_argument_list(input, pos)
    }
    .map_err(invalid("CHECKPOINT", input))?;

    let Arguments::Positional(mut args) = arguments else {
        return Err(ParseError::failure(
            format!(
                "CHECKPOINT at {} takes positional arguments (key, value[, progress])",
                span_at(input, start)
            ),
            start,
        ));
    };
    if !(2..=3).contains(&args.len()) {
        return Err(ParseError::failure(
            format!(
                "CHECKPOINT at {} expects 2 or 3 arguments, found {}",
                span_at(input, start),
                args.len()
            ),
            start,
        ));
    }
    let progress = (args.len() == 3).then(|| args.remove(2));
    let value = args.remove(1);
    let key = args.remove(0);
    Ok((
        pos,
        StatementKind::Checkpoint {
            key,
            value,
            progress,
        },
    ))
}

/// `CALL name [args]` or `CALL ON|OFF ERROR …`.
fn parse_call(input: &[TokenSpan], pos: usize) -> ParseResult<StatementKind> {
    if at_trap(input, pos, Keyword::On) {
        return parse_trap(input, pos + 1, TrapMode::Call);
    }
    if at_trap(input, pos, Keyword::Off) {
        return parse_trap_off(input, pos + 1);
    }
    let (pos, name) = parse_name()
        .parse(input, pos)
        .map_err(invalid("CALL", input))?;
    let (pos, arguments) = if peek(input, pos) == Some(&Token::Delimiter(Delimiter::OpenParen))
        && input[pos - 1].abuts(&input[pos])
    {
        parse_call_arguments(input, pos + 1)
    } else {
        parse_argument_list(input, pos)
    }
    .map_err(invalid("CALL", input))?;
    Ok((pos, StatementKind::Call { name, arguments }))
}

/// `ON ERROR` / `OFF ERROR` after CALL or SIGNAL. Anything else is a routine or label name.
fn at_trap(input: &[TokenSpan], pos: usize, switch: Keyword) -> bool {
    at_keyword(input, pos, switch)
        && peek(input, pos + 1)
            .and_then(Token::as_symbol)
            .is_some_and(|s| s.eq_ignore_ascii_case("ERROR"))
}

fn parse_procedure(input: &[TokenSpan], pos: usize) -> ParseResult<StatementKind> {
    if !at_keyword(input, pos, Keyword::Expose) {
        return Ok((pos, StatementKind::Procedure { expose: Vec::new() }));
    }
    let (pos, expose) = many(parse_symbol()).parse(input, pos + 1)?;
    if expose.is_empty() {
        return Err(invalid("PROCEDURE EXPOSE", input)(ParseError::eof(
            "names",
            pos,
        )));
    }
    Ok((pos, StatementKind::Procedure { expose }))
}

/// `PARSE ARG a, b` / `ARG a b`. Commas between names are optional.
fn parse_arg_names(input: &[TokenSpan], pos: usize, upper: bool) -> ParseResult<StatementKind> {
    let name_or_comma = choice(vec![
        Box::new(map(parse_symbol(), Some)),
        Box::new(map(parse_comma(), |_| None)),
    ]);
    let (pos, names) = many(name_or_comma).parse(input, pos)?;
    Ok((
        pos,
        StatementKind::ParseArg {
            names: names.into_iter().flatten().collect(),
            upper,
        },
    ))
}

fn parse_loop_target(input: &[TokenSpan], pos: usize) -> ParseResult<Option<String>> {
    optional(parse_symbol()).parse(input, pos)
}

/// `SIGNAL label`, `SIGNAL ON ERROR [NAME label]`, `SIGNAL OFF ERROR`.
fn parse_signal(input: &[TokenSpan], pos: usize) -> ParseResult<StatementKind> {
    if at_keyword(input, pos, Keyword::On) && !at_clause_end(input, pos + 1) {
        return parse_trap(input, pos + 1, TrapMode::Signal);
    }
    if at_keyword(input, pos, Keyword::Off) && !at_clause_end(input, pos + 1) {
        return parse_trap_off(input, pos + 1);
    }
    let (pos, label) = parse_name()
        .parse(input, pos)
        .map_err(invalid("SIGNAL", input))?;
    Ok((pos, StatementKind::Signal(SignalClause::Goto(label))))
}

fn parse_condition_name(input: &[TokenSpan], pos: usize) -> ParseResult<()> {
    match peek(input, pos).and_then(Token::as_symbol) {
        Some(condition) if condition.eq_ignore_ascii_case("ERROR") => Ok((pos + 1, ())),
        _ => Err(ParseError::failure(
            format!(
                "unsupported condition {} at {}; only ERROR can be trapped",
                describe_at(input, pos),
                span_at(input, pos)
            ),
            pos,
        )),
    }
}

fn parse_trap(input: &[TokenSpan], pos: usize, mode: TrapMode) -> ParseResult<StatementKind> {
    let (pos, _) = parse_condition_name(input, pos)?;
    let (pos, label) = optional(preceded(parse_keyword(Keyword::Name), parse_name()))
        .parse(input, pos)
        .map_err(invalid("trap", input))?;
    Ok((pos, StatementKind::Signal(SignalClause::On { mode, label })))
}

fn parse_trap_off(input: &[TokenSpan], pos: usize) -> ParseResult<StatementKind> {
    let (pos, _) = parse_condition_name(input, pos)?;
    Ok((pos, StatementKind::Signal(SignalClause::Off)))
}

fn parse_numeric(input: &[TokenSpan], pos: usize) -> ParseResult<StatementKind> {
    let (pos, _) = parse_keyword(Keyword::Digits)
        .parse(input, pos)
        .map_err(invalid("NUMERIC", input))?;
    let (pos, digits) = parse_expression()
        .parse(input, pos)
        .map_err(invalid("NUMERIC DIGITS", input))?;
    Ok((pos, StatementKind::NumericDigits(digits)))
}

fn parse_drop(input: &[TokenSpan], pos: usize) -> ParseResult<StatementKind> {
    let (next, names) = many(parse_symbol()).parse(input, pos)?;
    if names.is_empty() {
        return Err(invalid("DROP", input)(ParseError::eof("names", pos)));
    }
    Ok((next, StatementKind::Drop(names)))
}
