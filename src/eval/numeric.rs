//! Numeric-string arithmetic over [`BigDecimal`].
//!
//! A string is numeric when, after trimming blanks, it reads as an optional sign followed by
//! digits with at most one decimal point and an optional exponent. Every arithmetic result is
//! rounded half-up to `NUMERIC DIGITS` significant digits. Below that limit results keep the
//! scale the operands imply (`1.50 + 1` is `2.50`). Division also drops trailing zeros.
//!
//! Nothing here expands a number to its plain digits unless the plain form fits in
//! `NUMERIC DIGITS` places. Larger and smaller values stay in exponent form and are shown
//! as `1.5E+12`.

use std::cmp::Ordering;
use std::num::NonZeroU64;
use std::str::FromStr;

use bigdecimal::{BigDecimal, RoundingMode, ToPrimitive, Zero};

use super::EvalError;

pub const DEFAULT_DIGITS: u64 = 9;

/// Largest power of ten a number may carry, in either direction.
pub const MAX_EXPONENT: i64 = 999_999_999;

/// Plain display allows at most this many zeros between the point and the first digit.
const MAX_LEADING_ZEROS: i64 = 2 * DEFAULT_DIGITS as i64;

pub fn parse_number(text: &str) -> Option<BigDecimal> {
    let trimmed = text.trim();
    let (sign, rest) = match trimmed.as_bytes().first() {
        Some(b'-') => ("-", trimmed[1..].trim_start()),
        Some(b'+') => ("", trimmed[1..].trim_start()),
        _ => ("", trimmed),
    };
    let (mantissa, exponent) = match rest.find(['e', 'E']) {
        Some(index) => (&rest[..index], Some(&rest[index + 1..])),
        None => (rest, None),
    };

    let mut digits = 0;
    let mut points = 0;
    for c in mantissa.chars() {
        match c {
            '0'..='9' => digits += 1,
            '.' => points += 1,
            _ => return None,
        }
    }
    if digits == 0 || points > 1 {
        return None;
    }
    if let Some(exponent) = exponent {
        let unsigned = exponent.strip_prefix(['+', '-']).unwrap_or(exponent);
        if unsigned.is_empty() || !unsigned.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
    }
    let n = BigDecimal::from_str(&format!("{}{}", sign, rest)).ok()?;
    if n.is_zero() {
        // `0E-9999` keeps no more places than were written
        let written = mantissa.find('.').map_or(0, |point| mantissa.len() - point - 1);
        let scale = n.fractional_digit_count().clamp(0, written as i64);
        return Some(BigDecimal::new(0.into(), scale));
    }
    in_range(&n).then(|| tidy(n, DEFAULT_DIGITS))
}

pub fn is_numeric(text: &str) -> bool {
    parse_number(text).is_some()
}

/// Power of ten of the leading digit: 0 for `1.5`, 3 for `1200`, -2 for `0.012`.
pub fn magnitude(n: &BigDecimal) -> i64 {
    if n.is_zero() {
        return 0;
    }
    n.digits() as i64 - 1 - n.fractional_digit_count()
}

fn in_range(n: &BigDecimal) -> bool {
    magnitude(n).abs() <= MAX_EXPONENT
}

fn checked(n: BigDecimal, digits: u64) -> Result<BigDecimal, EvalError> {
    let n = limit(&n, digits);
    if !in_range(&n) {
        return Err(EvalError::Overflow {
            magnitude: magnitude(&n),
        });
    }
    Ok(tidy(n, digits))
}

/// Folds a negative scale (`1E+3`) back to a plain integer when it fits in `digits` places.
pub fn tidy(n: BigDecimal, digits: u64) -> BigDecimal {
    let scale = n.fractional_digit_count();
    if scale >= 0 {
        n
    } else if n.is_zero() {
        BigDecimal::zero()
    } else if magnitude(&n) < digits as i64 {
        n.with_scale(0)
    } else {
        n
    }
}

/// Rounds half-up to `digits` significant digits. Shorter numbers are returned unchanged.
pub fn limit(n: &BigDecimal, digits: u64) -> BigDecimal {
    let digits = NonZeroU64::new(digits).unwrap_or(NonZeroU64::MIN);
    let mut n = n.clone();
    // a carry (`9.99` to `10.0`) can leave one digit too many
    while n.digits() > digits.get() {
        n = n.with_precision_round(digits, RoundingMode::HalfUp);
    }
    n
}

/// Plain decimal text, or `d.dddE+x` for values whose plain form was not kept.
pub fn format(n: &BigDecimal) -> String {
    let (int, scale) = n.as_bigint_and_exponent();
    let negative = *n < BigDecimal::zero();
    let digits = int.magnitude().to_string();
    let exponent = magnitude(n);
    let body = if int.is_zero() {
        if scale > 0 {
            format!("0.{}", "0".repeat(scale as usize))
        } else {
            digits
        }
    } else if scale < 0 || exponent < -MAX_LEADING_ZEROS {
        let (first, rest) = digits.split_at(1);
        let sign = if exponent < 0 { '-' } else { '+' };
        if rest.is_empty() {
            format!("{}E{}{}", first, sign, exponent.abs())
        } else {
            format!("{}.{}E{}{}", first, rest, sign, exponent.abs())
        }
    } else if scale == 0 {
        digits
    } else {
        let scale = scale as usize;
        let padded = if digits.len() <= scale {
            format!("{}{}", "0".repeat(scale + 1 - digits.len()), digits)
        } else {
            digits
        };
        let (whole, fraction) = padded.split_at(padded.len() - scale);
        format!("{}.{}", whole, fraction)
    };
    if negative {
        format!("-{}", body)
    } else {
        body
    }
}

/// True for whole numbers, without building `10^scale` for tiny values.
pub fn is_whole(n: &BigDecimal) -> bool {
    let scale = n.fractional_digit_count();
    if scale <= 0 || n.is_zero() {
        return true;
    }
    if scale as u64 >= n.digits() {
        return false;
    }
    n.is_integer()
}

pub fn to_whole_i64(n: &BigDecimal) -> Option<i64> {
    if !is_whole(n) || magnitude(n) > 18 {
        return None;
    }
    n.to_i64()
}

pub fn to_f64(n: &BigDecimal) -> Option<f64> {
    match magnitude(n) {
        m if m > 308 => None,
        m if m < -400 => Some(0.0),
        _ => n.to_f64(),
    }
}

/// Replaces an operand that lies wholly below the rounding position of the other with a
/// single digit of the same sign just past that position. The rounded sum is unchanged.
fn negligible(small: &BigDecimal, large: &BigDecimal, digits: u64) -> Option<BigDecimal> {
    if small.is_zero() || large.is_zero() {
        return None;
    }
    let floor = (magnitude(large) - digits as i64 - 2).min(-large.fractional_digit_count() - 1);
    if magnitude(small) >= floor {
        return None;
    }
    let unit = if *small < BigDecimal::zero() { -1 } else { 1 };
    Some(BigDecimal::new(unit.into(), -floor))
}

fn aligned(a: &BigDecimal, b: &BigDecimal, digits: u64) -> (BigDecimal, BigDecimal) {
    if let Some(b) = negligible(b, a, digits) {
        (a.clone(), b)
    } else if let Some(a) = negligible(a, b, digits) {
        (a, b.clone())
    } else {
        (a.clone(), b.clone())
    }
}

pub fn add(a: &BigDecimal, b: &BigDecimal, digits: u64) -> Result<BigDecimal, EvalError> {
    if a.is_zero() {
        return checked(b.clone(), digits);
    }
    if b.is_zero() {
        return checked(a.clone(), digits);
    }
    let (a, b) = aligned(a, b, digits);
    checked(a + b, digits)
}

pub fn subtract(a: &BigDecimal, b: &BigDecimal, digits: u64) -> Result<BigDecimal, EvalError> {
    add(a, &-b, digits)
}

pub fn multiply(a: &BigDecimal, b: &BigDecimal, digits: u64) -> Result<BigDecimal, EvalError> {
    if a.is_zero() || b.is_zero() {
        return Ok(BigDecimal::zero());
    }
    let magnitude = magnitude(a) + magnitude(b);
    if magnitude.abs() > MAX_EXPONENT + 1 {
        return Err(EvalError::Overflow { magnitude });
    }
    checked(a * b, digits)
}

pub fn divide(a: &BigDecimal, b: &BigDecimal, digits: u64) -> Result<BigDecimal, EvalError> {
    if b.is_zero() {
        return Err(EvalError::DivisionByZero);
    }
    let magnitude = magnitude(a) - magnitude(b);
    if magnitude.abs() > MAX_EXPONENT + 1 {
        return Err(EvalError::Overflow { magnitude });
    }
    round(&(a / b), digits)
}

/// `%`: quotient truncated toward zero. The whole quotient must fit in `digits` places.
pub fn integer_divide(a: &BigDecimal, b: &BigDecimal, digits: u64) -> Result<BigDecimal, EvalError> {
    if b.is_zero() {
        return Err(EvalError::DivisionByZero);
    }
    if a.is_zero() || magnitude(a) < magnitude(b) - 1 {
        return Ok(BigDecimal::zero());
    }
    let quotient = a / b;
    if magnitude(&quotient) >= digits as i64 {
        return Err(EvalError::InvalidOperand {
            operator: "%".into(),
            message: format!("integer quotient needs more than {} digits", digits),
        });
    }
    Ok(truncate(&quotient))
}

/// `//`: remainder with the sign of the dividend.
pub fn remainder(a: &BigDecimal, b: &BigDecimal, digits: u64) -> Result<BigDecimal, EvalError> {
    let quotient = integer_divide(a, b, digits)?;
    if quotient.is_zero() {
        return checked(a.clone(), digits);
    }
    checked(a - &quotient * b, digits)
}

/// `**` with a whole exponent. Each step is rounded to a few guard digits past `digits`.
pub fn power(base: &BigDecimal, exponent: &BigDecimal, digits: u64) -> Result<BigDecimal, EvalError> {
    if !is_whole(exponent) {
        return Err(EvalError::InvalidOperand {
            operator: "**".into(),
            message: format!("exponent {} is not a whole number", format(exponent)),
        });
    }
    let exp = to_whole_i64(exponent)
        .filter(|e| e.abs() <= MAX_EXPONENT)
        .ok_or_else(|| EvalError::InvalidOperand {
            operator: "**".into(),
            message: "exponent out of range".into(),
        })?;
    if base.is_zero() {
        return match exp.cmp(&0) {
            Ordering::Less => Err(EvalError::DivisionByZero),
            Ordering::Equal => Ok(BigDecimal::from(1)),
            Ordering::Greater => Ok(BigDecimal::zero()),
        };
    }
    let working = digits + exp.unsigned_abs().to_string().len() as u64 + 1;
    let mut result = BigDecimal::from(1);
    let mut square = base.clone();
    let mut remaining = exp.unsigned_abs();
    while remaining > 0 {
        if remaining & 1 == 1 {
            result = multiply(&result, &square, working)?;
        }
        remaining >>= 1;
        if remaining > 0 {
            square = multiply(&square, &square, working)?;
        }
    }
    if exp < 0 {
        return divide(&BigDecimal::from(1), &result, digits);
    }
    checked(result, digits)
}

/// Rounds to `digits` significant digits and drops trailing fractional zeros.
pub fn round(n: &BigDecimal, digits: u64) -> Result<BigDecimal, EvalError> {
    checked(limit(n, digits).normalized(), digits)
}

pub fn truncate(n: &BigDecimal) -> BigDecimal {
    n.with_scale_round(0, RoundingMode::Down)
}

/// Compares two values numerically when both are numeric, otherwise as strings.
pub fn compare(left: &str, right: &str) -> Ordering {
    match (parse_number(left), parse_number(right)) {
        (Some(l), Some(r)) => l.cmp(&r),
        _ => left.cmp(right),
    }
}
