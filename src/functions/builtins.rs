//! String, number and JSON functions installed in every session.

use std::cmp::Ordering;

use bigdecimal::{BigDecimal, Signed};

use super::{CallArgs, FunctionEntry, FunctionRegistry};
use crate::eval::{numeric, EvalError, Value};

type Builtin = fn(&CallArgs) -> Result<Value, EvalError>;

const BUILTINS: &[(&str, Builtin)] = &[
    ("LENGTH", length),
    ("UPPER", upper),
    ("LOWER", lower),
    ("SUBSTR", substr),
    ("POS", pos),
    ("STRIP", strip),
    ("WORDS", words),
    ("WORD", word),
    ("ABS", abs),
    ("MAX", max),
    ("MIN", min),
    ("DATATYPE", datatype),
    ("JSON_PARSE", json_parse),
    ("JSON_STRINGIFY", json_stringify),
];

pub fn install(registry: &FunctionRegistry) {
    for (name, f) in BUILTINS {
        registry.insert(name, FunctionEntry::native(*f));
    }
}

fn failure(function: &str, message: impl Into<String>) -> EvalError {
    EvalError::Function {
        function: function.to_string(),
        message: message.into(),
    }
}

fn required<'a>(args: &'a CallArgs, index: usize, function: &str) -> Result<&'a Value, EvalError> {
    args.get(index)
        .ok_or_else(|| failure(function, format!("argument {} is required", index + 1)))
}

fn string_arg(args: &CallArgs, index: usize, function: &str) -> Result<String, EvalError> {
    required(args, index, function).map(Value::to_string)
}

fn number_arg(args: &CallArgs, index: usize, function: &str) -> Result<BigDecimal, EvalError> {
    let value = required(args, index, function)?;
    value.to_number().ok_or_else(|| EvalError::NotNumeric {
        value: value.to_string(),
    })
}

/// Optional non-negative whole-number argument.
fn count_arg(args: &CallArgs, index: usize, function: &str) -> Result<Option<usize>, EvalError> {
    if args.get(index).map_or(true, Value::is_null) {
        return Ok(None);
    }
    let n = number_arg(args, index, function)?;
    if !numeric::is_whole(&n) || n.is_negative() {
        return Err(failure(
            function,
            format!("argument {} must be a non-negative whole number", index + 1),
        ));
    }
    numeric::to_whole_i64(&n)
        .and_then(|n| usize::try_from(n).ok())
        .map(Some)
        .ok_or_else(|| failure(function, format!("argument {} is out of range", index + 1)))
}

fn length(args: &CallArgs) -> Result<Value, EvalError> {
    Ok(Value::from(string_arg(args, 0, "LENGTH")?.chars().count()))
}

fn upper(args: &CallArgs) -> Result<Value, EvalError> {
    Ok(Value::from(string_arg(args, 0, "UPPER")?.to_uppercase()))
}

fn lower(args: &CallArgs) -> Result<Value, EvalError> {
    Ok(Value::from(string_arg(args, 0, "LOWER")?.to_lowercase()))
}

/// `SUBSTR(string, start[, length[, pad]])`, 1-based.
fn substr(args: &CallArgs) -> Result<Value, EvalError> {
    let text: Vec<char> = string_arg(args, 0, "SUBSTR")?.chars().collect();
    let start = count_arg(args, 1, "SUBSTR")?.unwrap_or(1);
    if start == 0 {
        return Err(failure("SUBSTR", "start must be at least 1"));
    }
    let available = text.len().saturating_sub(start - 1);
    let length = count_arg(args, 2, "SUBSTR")?.unwrap_or(available);
    let pad = match args.get(3) {
        Some(value) => value.to_string().chars().next().unwrap_or(' '),
        None => ' ',
    };
    let taken: String = text
        .iter()
        .skip(start - 1)
        .take(length)
        .copied()
        .chain(std::iter::repeat(pad))
        .take(length)
        .collect();
    Ok(Value::from(taken))
}

/// `POS(needle, haystack[, start])`: 1-based position, 0 when absent.
fn pos(args: &CallArgs) -> Result<Value, EvalError> {
    let needle = string_arg(args, 0, "POS")?;
    let haystack: Vec<char> = string_arg(args, 1, "POS")?.chars().collect();
    let start = count_arg(args, 2, "POS")?.unwrap_or(1).max(1);
    let needle: Vec<char> = needle.chars().collect();
    if needle.is_empty() || start > haystack.len() {
        return Ok(Value::from(0));
    }
    let found = haystack[start - 1..]
        .windows(needle.len())
        .position(|window| window == needle.as_slice())
        .map_or(0, |index| index + start);
    Ok(Value::from(found))
}

/// `STRIP(string[, B|L|T[, char]])`
fn strip(args: &CallArgs) -> Result<Value, EvalError> {
    let text = string_arg(args, 0, "STRIP")?;
    let option = match args.get(1) {
        Some(value) => value.to_string().to_uppercase(),
        None => "B".to_string(),
    };
    let pad = match args.get(2) {
        Some(value) => value.to_string().chars().next().unwrap_or(' '),
        None => ' ',
    };
    let stripped = match option.chars().next() {
        Some('B') | None => text.trim_matches(pad),
        Some('L') => text.trim_start_matches(pad),
        Some('T') => text.trim_end_matches(pad),
        Some(other) => return Err(failure("STRIP", format!("invalid option '{}'", other))),
    };
    Ok(Value::from(stripped))
}

fn words(args: &CallArgs) -> Result<Value, EvalError> {
    Ok(Value::from(
        string_arg(args, 0, "WORDS")?.split_whitespace().count(),
    ))
}

/// `WORD(string, n)`: the nth blank-delimited word, or "".
fn word(args: &CallArgs) -> Result<Value, EvalError> {
    let text = string_arg(args, 0, "WORD")?;
    let n = count_arg(args, 1, "WORD")?
        .filter(|n| *n > 0)
        .ok_or_else(|| failure("WORD", "word number must be at least 1"))?;
    Ok(Value::from(
        text.split_whitespace().nth(n - 1).unwrap_or_default(),
    ))
}

fn abs(args: &CallArgs) -> Result<Value, EvalError> {
    Ok(Value::from(number_arg(args, 0, "ABS")?.abs()))
}

fn extreme(args: &CallArgs, function: &str, keep: Ordering) -> Result<Value, EvalError> {
    if args.is_empty() {
        return Err(failure(function, "at least one argument is required"));
    }
    let mut best = number_arg(args, 0, function)?;
    for index in 1..args.len() {
        let candidate = number_arg(args, index, function)?;
        if candidate.cmp(&best) == keep {
            best = candidate;
        }
    }
    Ok(Value::from(best))
}

fn max(args: &CallArgs) -> Result<Value, EvalError> {
    extreme(args, "MAX", Ordering::Greater)
}

fn min(args: &CallArgs) -> Result<Value, EvalError> {
    extreme(args, "MIN", Ordering::Less)
}

/// `DATATYPE(string)` is NUM or CHAR. `DATATYPE(string, type)` tests one of
/// A(lphanumeric), L(ower), M(ixed), N(umber), U(pper), W(hole) and returns 1 or 0.
fn datatype(args: &CallArgs) -> Result<Value, EvalError> {
    let text = string_arg(args, 0, "DATATYPE")?;
    let Some(kind) = args.get(1) else {
        let name = if numeric::is_numeric(&text) { "NUM" } else { "CHAR" };
        return Ok(Value::from(name));
    };
    let kind = kind.to_string().to_uppercase();
    let non_empty = !text.is_empty();
    let matches = match kind.chars().next() {
        Some('A') => non_empty && text.chars().all(|c| c.is_ascii_alphanumeric()),
        Some('L') => non_empty && text.chars().all(|c| c.is_ascii_lowercase()),
        Some('U') => non_empty && text.chars().all(|c| c.is_ascii_uppercase()),
        Some('M') => non_empty && text.chars().all(|c| c.is_ascii_alphabetic()),
        Some('N') => numeric::is_numeric(&text),
        Some('W') => numeric::parse_number(&text).map_or(false, |n| numeric::is_whole(&n)),
        _ => return Err(failure("DATATYPE", format!("invalid type '{}'", kind))),
    };
    Ok(Value::from(i32::from(matches)))
}

fn json_parse(args: &CallArgs) -> Result<Value, EvalError> {
    let text = string_arg(args, 0, "JSON_PARSE")?;
    serde_json::from_str::<serde_json::Value>(&text)
        .map(Value::from_json)
        .map_err(|e| failure("JSON_PARSE", e.to_string()))
}

fn json_stringify(args: &CallArgs) -> Result<Value, EvalError> {
    let value = required(args, 0, "JSON_STRINGIFY")?;
    Ok(Value::from(value.to_json().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(f: Builtin, args: Vec<Value>) -> Result<Value, EvalError> {
        f(&CallArgs::Positional(args))
    }

    fn s(text: &str) -> Value {
        Value::from(text)
    }

    #[test]
    fn test_string_functions() {
        assert_eq!(call(length, vec![s("hello")]).unwrap(), Value::from(5));
        assert_eq!(call(upper, vec![s("abc")]).unwrap(), s("ABC"));
        assert_eq!(call(lower, vec![s("ABC")]).unwrap(), s("abc"));
        assert_eq!(call(words, vec![s("  a b   c ")]).unwrap(), Value::from(3));
        assert_eq!(call(word, vec![s("a b c"), Value::from(2)]).unwrap(), s("b"));
        assert_eq!(call(word, vec![s("a b c"), Value::from(9)]).unwrap(), s(""));
    }

    #[test]
    fn test_substr() {
        assert_eq!(call(substr, vec![s("abcdef"), Value::from(3)]).unwrap(), s("cdef"));
        assert_eq!(
            call(substr, vec![s("abcdef"), Value::from(2), Value::from(3)]).unwrap(),
            s("bcd")
        );
        assert_eq!(
            call(substr, vec![s("ab"), Value::from(1), Value::from(4), s(".")]).unwrap(),
            s("ab..")
        );
        assert!(call(substr, vec![s("ab"), Value::from(0)]).is_err());
    }

    #[test]
    fn test_pos_and_strip() {
        assert_eq!(call(pos, vec![s("lo"), s("hello")]).unwrap(), Value::from(4));
        assert_eq!(call(pos, vec![s("z"), s("hello")]).unwrap(), Value::from(0));
        assert_eq!(
            call(pos, vec![s("l"), s("hello"), Value::from(4)]).unwrap(),
            Value::from(4)
        );
        assert_eq!(call(strip, vec![s("  x  ")]).unwrap(), s("x"));
        assert_eq!(call(strip, vec![s("  x  "), s("L")]).unwrap(), s("x  "));
        assert_eq!(call(strip, vec![s("00120"), s("T"), s("0")]).unwrap(), s("0012"));
    }

    #[test]
    fn test_numeric_functions() {
        assert_eq!(call(abs, vec![s("-4.5")]).unwrap(), Value::from(s("4.5").to_number().unwrap()));
        assert_eq!(
            call(max, vec![Value::from(3), s("10"), s(" 7 ")]).unwrap(),
            Value::from(10)
        );
        assert_eq!(
            call(min, vec![Value::from(3), s("-1"), s("7")]).unwrap(),
            Value::from(-1)
        );
        assert_eq!(
            call(max, vec![s("a")]),
            Err(EvalError::NotNumeric { value: "a".into() })
        );
    }

    #[test]
    fn test_datatype() {
        assert_eq!(call(datatype, vec![s(" 12 ")]).unwrap(), s("NUM"));
        assert_eq!(call(datatype, vec![s("abc")]).unwrap(), s("CHAR"));
        assert_eq!(call(datatype, vec![s("12"), s("W")]).unwrap(), Value::from(1));
        assert_eq!(call(datatype, vec![s("1.5"), s("W")]).unwrap(), Value::from(0));
        assert_eq!(call(datatype, vec![s("ABC"), s("U")]).unwrap(), Value::from(1));
    }

    #[test]
    fn test_json_functions() {
        let parsed = call(json_parse, vec![s(r#"{"a":[1,2]}"#)]).unwrap();
        let Value::Map(map) = &parsed else {
            panic!("expected map");
        };
        assert_eq!(
            map.get("a"),
            Some(&Value::Array(vec![Value::from(1), Value::from(2)]))
        );
        assert_eq!(
            call(json_stringify, vec![parsed]).unwrap(),
            s(r#"{"a":[1,2]}"#)
        );
        assert!(call(json_parse, vec![s("{")]).is_err());
    }

    #[test]
    fn test_missing_argument() {
        assert_eq!(
            call(length, vec![]),
            Err(EvalError::Function {
                function: "LENGTH".into(),
                message: "argument 1 is required".into()
            })
        );
    }
}
