use std::cmp::Ordering;

use async_recursion::async_recursion;
use bigdecimal::BigDecimal;

use super::context::ExecutionContext;
use super::evaluator::{Evaluator, Flow};
use super::{numeric, EvalError, EvalResult, Value, ValueMap};
use crate::address::AddressCall;
use crate::ast::{BinaryOperator, Expression, UnaryOperator};

impl Evaluator {
    /// Both operands of a binary operator are always evaluated, left first.
    #[async_recursion]
    pub(crate) async fn eval(&self, expression: &Expression, ctx: &mut ExecutionContext) -> Flow<Value> {
        match expression {
            Expression::String(text) => Ok(Value::from(text.as_str())),
            Expression::Number(text) => Ok(numeric::parse_number(text)
                .map(Value::Number)
                .unwrap_or_else(|| Value::from(text.as_str()))),
            Expression::Boolean(b) => Ok(Value::Boolean(*b)),
            Expression::Heredoc { raw, parsed } => Ok(match parsed {
                Some(json) => Value::from_json(json.clone()),
                None => Value::from(raw.as_str()),
            }),
            Expression::Symbol(name) => Ok(ctx.value_of(name)?),
            Expression::Unary { op, operand } => {
                let value = self.eval(operand, ctx).await?;
                Ok(unary(*op, &value)?)
            }
            Expression::Binary { op, left, right } => {
                let left = self.eval(left, ctx).await?;
                let right = self.eval(right, ctx).await?;
                Ok(binary(*op, &left, &right, ctx.digits)?)
            }
            Expression::Call {
                name,
                arguments,
                method_fallback,
            } => Ok(self
                .call_named(name, arguments, *method_fallback, ctx)
                .await?
                .unwrap_or_default()),
            Expression::MethodCall { method, params } => {
                let mut values = ValueMap::new();
                for (key, expression) in params {
                    let value = self.eval(expression, ctx).await?;
                    values.insert(key.clone(), value);
                }
                let call = AddressCall::Method {
                    name: method.clone(),
                    params: values,
                };
                let target = ctx.address().map(str::to_string);
                let outcome = self.dispatch_to(target.as_deref(), call, ctx).await?;
                Ok(outcome.result)
            }
        }
    }
}

fn number(operator: impl ToString, value: &Value) -> EvalResult<BigDecimal> {
    value.to_number().ok_or_else(|| EvalError::InvalidOperand {
        operator: operator.to_string(),
        message: format!("'{}' is not numeric", value),
    })
}

fn logical(operator: impl ToString, value: &Value) -> EvalResult<bool> {
    value.to_logical().ok_or_else(|| EvalError::InvalidOperand {
        operator: operator.to_string(),
        message: format!("'{}' is not a logical value", value),
    })
}

pub(crate) fn unary(op: UnaryOperator, value: &Value) -> EvalResult<Value> {
    match op {
        UnaryOperator::Negate => Ok(Value::Number(-number(op, value)?)),
        UnaryOperator::Plus => Ok(Value::Number(number(op, value)?)),
        UnaryOperator::Not => Ok(Value::Boolean(!logical(op, value)?)),
    }
}

/// Numeric when both sides are numeric strings, exact string ordering otherwise.
pub(crate) fn compare_values(left: &Value, right: &Value) -> Ordering {
    match (left.to_number(), right.to_number()) {
        (Some(l), Some(r)) => l.cmp(&r),
        _ => left.to_string().cmp(&right.to_string()),
    }
}

pub(crate) fn binary(op: BinaryOperator, left: &Value, right: &Value, digits: u64) -> EvalResult<Value> {
    use BinaryOperator::*;

    let value = match op {
        Add => Value::Number(numeric::add(&number(op, left)?, &number(op, right)?, digits)?),
        Subtract => Value::Number(numeric::subtract(&number(op, left)?, &number(op, right)?, digits)?),
        Multiply => Value::Number(numeric::multiply(&number(op, left)?, &number(op, right)?, digits)?),
        Divide => Value::Number(numeric::divide(&number(op, left)?, &number(op, right)?, digits)?),
        IntDivide => Value::Number(numeric::integer_divide(&number(op, left)?, &number(op, right)?, digits)?),
        Remainder => Value::Number(numeric::remainder(&number(op, left)?, &number(op, right)?, digits)?),
        Power => Value::Number(numeric::power(&number(op, left)?, &number(op, right)?, digits)?),
        Concat | AbutConcat => Value::String(format!("{}{}", left, right)),
        BlankConcat => Value::String(format!("{} {}", left, right)),
        Equal => Value::Boolean(compare_values(left, right) == Ordering::Equal),
        NotEqual => Value::Boolean(compare_values(left, right) != Ordering::Equal),
        Less => Value::Boolean(compare_values(left, right) == Ordering::Less),
        LessEqual => Value::Boolean(compare_values(left, right) != Ordering::Greater),
        Greater => Value::Boolean(compare_values(left, right) == Ordering::Greater),
        GreaterEqual => Value::Boolean(compare_values(left, right) != Ordering::Less),
        And => Value::Boolean(logical(op, left)? && logical(op, right)?),
        Or => Value::Boolean(logical(op, left)? | logical(op, right)?),
        Xor => Value::Boolean(logical(op, left)? ^ logical(op, right)?),
    };
    Ok(value)
}
