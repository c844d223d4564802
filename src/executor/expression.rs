use std::cmp::Ordering;

use crate::catalog::Affinity;
use crate::parser::ast::{BinaryOp, UnaryOp};
use crate::planner::{like_to_regex, BoundExpr, LikePattern, ScalarFunction};
use crate::types::{error::ExecError, Value};

pub struct ExprEvaluator;

impl ExprEvaluator {
    /// Three-valued truth of a predicate result. NULL is unknown; numbers are
    /// true when non-zero. Text and blobs cannot be used as conditions.
    pub fn to_boolean(value: &Value) -> Result<Option<bool>, ExecError> {
        match value {
            Value::Null => Ok(None),
            Value::Integer(i) => Ok(Some(*i != 0)),
            Value::Real(r) => Ok(Some(*r != 0.0)),
            other => Err(ExecError::TypeMismatch(format!(
                "{} value used as a condition",
                other.type_name()
            ))),
        }
    }

    /// True only when the predicate evaluates to a non-zero number.
    pub fn is_truthy(predicate: &BoundExpr, row: &[Value]) -> Result<bool, ExecError> {
        Ok(Self::to_boolean(&Self::evaluate(predicate, row)?)? == Some(true))
    }

    pub fn evaluate(expr: &BoundExpr, row: &[Value]) -> Result<Value, ExecError> {
        match expr {
            BoundExpr::Column(index) => row.get(*index).cloned().ok_or_else(|| {
                ExecError::InvalidArgument(format!("column {} is out of range", index))
            }),
            BoundExpr::Literal(value) => Ok(value.clone()),
            BoundExpr::Unary { op, expr } => {
                Self::evaluate_unary_op(*op, Self::evaluate(expr, row)?)
            }
            BoundExpr::Binary { left, op, right } => match op {
                BinaryOp::And | BinaryOp::Or => Self::evaluate_logical(left, *op, right, row),
                op => {
                    let left = Self::evaluate(left, row)?;
                    let right = Self::evaluate(right, row)?;
                    Self::evaluate_binary_op(&left, *op, &right)
                }
            },
            BoundExpr::IsNull { expr, negated } => {
                Ok(Value::from(Self::evaluate(expr, row)?.is_null() != *negated))
            }
            BoundExpr::Between {
                expr,
                low,
                high,
                negated,
            } => {
                let value = Self::evaluate(expr, row)?;
                let low = Self::evaluate(low, row)?;
                let high = Self::evaluate(high, row)?;
                let above = compare(&value, &low, |o| o != Ordering::Less);
                let below = compare(&value, &high, |o| o != Ordering::Greater);
                Ok(negate_if(and(above, below), *negated))
            }
            BoundExpr::InList {
                expr,
                list,
                negated,
            } => {
                let value = Self::evaluate(expr, row)?;
                if value.is_null() {
                    return Ok(Value::Null);
                }
                let mut saw_null = false;
                for item in list {
                    let item = Self::evaluate(item, row)?;
                    if item.is_null() {
                        saw_null = true;
                    } else if item == value {
                        return Ok(Value::from(!*negated));
                    }
                }
                if saw_null {
                    Ok(Value::Null)
                } else {
                    Ok(Value::from(*negated))
                }
            }
            BoundExpr::Like {
                expr,
                pattern,
                negated,
            } => {
                let value = Self::evaluate(expr, row)?;
                if value.is_null() {
                    return Ok(Value::Null);
                }
                let matched = match pattern {
                    LikePattern::Compiled(regex) => regex.is_match(&value.to_text()),
                    LikePattern::Dynamic(pattern) => match Self::evaluate(pattern, row)? {
                        Value::Null => return Ok(Value::Null),
                        pattern => like_to_regex(&pattern.to_text())?.is_match(&value.to_text()),
                    },
                };
                Ok(Value::from(matched != *negated))
            }
            BoundExpr::Case {
                operand,
                branches,
                else_result,
            } => {
                let operand = operand
                    .as_ref()
                    .map(|e| Self::evaluate(e, row))
                    .transpose()?;
                for (when, then) in branches {
                    let when = Self::evaluate(when, row)?;
                    let hit = match &operand {
                        Some(operand) => !operand.is_null() && !when.is_null() && *operand == when,
                        None => Self::to_boolean(&when)? == Some(true),
                    };
                    if hit {
                        return Self::evaluate(then, row);
                    }
                }
                match else_result {
                    Some(e) => Self::evaluate(e, row),
                    None => Ok(Value::Null),
                }
            }
            BoundExpr::Cast { expr, affinity } => {
                Ok(Caster::cast(Self::evaluate(expr, row)?, *affinity))
            }
            BoundExpr::Function { function, args } => {
                let args = args
                    .iter()
                    .map(|e| Self::evaluate(e, row))
                    .collect::<Result<Vec<_>, _>>()?;
                evaluate_function(*function, args)
            }
        }
    }

    fn evaluate_unary_op(op: UnaryOp, value: Value) -> Result<Value, ExecError> {
        match (op, value) {
            (_, Value::Null) => Ok(Value::Null),
            (UnaryOp::Not, value) => Ok(negate_if(Self::to_boolean(&value)?, true)),
            (UnaryOp::Plus, value @ (Value::Integer(_) | Value::Real(_))) => Ok(value),
            (UnaryOp::Minus, Value::Integer(i)) => Ok(i
                .checked_neg()
                .map_or(Value::Real(-(i as f64)), Value::Integer)),
            (UnaryOp::Minus, Value::Real(r)) => Ok(Value::Real(-r)),
            (_, value) => Err(ExecError::TypeMismatch(format!(
                "cannot apply unary operator to {}",
                value.type_name()
            ))),
        }
    }

    // AND/OR skip the right operand once the left decides the result.
    fn evaluate_logical(
        left: &BoundExpr,
        op: BinaryOp,
        right: &BoundExpr,
        row: &[Value],
    ) -> Result<Value, ExecError> {
        let left = Self::to_boolean(&Self::evaluate(left, row)?)?;
        let short_circuit = match op {
            BinaryOp::And => Some(false),
            _ => Some(true),
        };
        if left == short_circuit {
            return Ok(truth(left));
        }
        let right = Self::to_boolean(&Self::evaluate(right, row)?)?;
        Ok(match op {
            BinaryOp::And => truth(and(left, right)),
            _ => truth(or(left, right)),
        })
    }

    pub fn evaluate_binary_op(left: &Value, op: BinaryOp, right: &Value) -> Result<Value, ExecError> {
        match op {
            BinaryOp::Eq => Ok(truth(compare(left, right, |o| o == Ordering::Equal))),
            BinaryOp::NotEq => Ok(truth(compare(left, right, |o| o != Ordering::Equal))),
            BinaryOp::Lt => Ok(truth(compare(left, right, |o| o == Ordering::Less))),
            BinaryOp::LtEq => Ok(truth(compare(left, right, |o| o != Ordering::Greater))),
            BinaryOp::Gt => Ok(truth(compare(left, right, |o| o == Ordering::Greater))),
            BinaryOp::GtEq => Ok(truth(compare(left, right, |o| o != Ordering::Less))),
            BinaryOp::And | BinaryOp::Or => {
                let l = Self::to_boolean(left)?;
                let r = Self::to_boolean(right)?;
                Ok(truth(if op == BinaryOp::And { and(l, r) } else { or(l, r) }))
            }
            BinaryOp::Concat => {
                if left.is_null() || right.is_null() {
                    return Ok(Value::Null);
                }
                Ok(Value::Text(left.to_text() + &right.to_text()))
            }
            BinaryOp::Plus
            | BinaryOp::Minus
            | BinaryOp::Multiply
            | BinaryOp::Divide
            | BinaryOp::Modulo => BinaryOpEvaluator::arithmetic(left, op, right),
        }
    }
}

fn compare(left: &Value, right: &Value, test: impl Fn(Ordering) -> bool) -> Option<bool> {
    if left.is_null() || right.is_null() {
        return None;
    }
    Some(test(left.cmp(right)))
}

fn truth(value: Option<bool>) -> Value {
    value.map_or(Value::Null, Value::from)
}

fn negate_if(value: Option<bool>, negate: bool) -> Value {
    truth(value.map(|b| b != negate))
}

fn and(left: Option<bool>, right: Option<bool>) -> Option<bool> {
    match (left, right) {
        (Some(false), _) | (_, Some(false)) => Some(false),
        (Some(true), Some(true)) => Some(true),
        _ => None,
    }
}

fn or(left: Option<bool>, right: Option<bool>) -> Option<bool> {
    match (left, right) {
        (Some(true), _) | (_, Some(true)) => Some(true),
        (Some(false), Some(false)) => Some(false),
        _ => None,
    }
}

struct BinaryOpEvaluator;

impl BinaryOpEvaluator {
    fn arithmetic(left: &Value, op: BinaryOp, right: &Value) -> Result<Value, ExecError> {
        match (left, right) {
            (Value::Null, _) | (_, Value::Null) => Ok(Value::Null),
            (Value::Integer(l), Value::Integer(r)) => Ok(Self::integer(*l, op, *r)),
            (l @ (Value::Integer(_) | Value::Real(_)), r @ (Value::Integer(_) | Value::Real(_))) => {
                match (l.as_f64(), r.as_f64()) {
                    (Some(l), Some(r)) => Ok(Self::real(l, op, r)),
                    _ => Ok(Value::Null),
                }
            }
            (l, r) => Err(ExecError::TypeMismatch(format!(
                "cannot apply {} to {} and {}",
                op.symbol(),
                l.type_name(),
                r.type_name()
            ))),
        }
    }

    // Overflowing integer results are recomputed as reals.
    fn integer(l: i64, op: BinaryOp, r: i64) -> Value {
        let checked = match op {
            BinaryOp::Plus => l.checked_add(r),
            BinaryOp::Minus => l.checked_sub(r),
            BinaryOp::Multiply => l.checked_mul(r),
            BinaryOp::Divide if r == 0 => return Value::Null,
            BinaryOp::Divide => l.checked_div(r),
            BinaryOp::Modulo if r == 0 => return Value::Null,
            BinaryOp::Modulo => Some(l.checked_rem(r).unwrap_or(0)),
            _ => None,
        };
        checked.map_or_else(|| Self::real(l as f64, op, r as f64), Value::Integer)
    }

    fn real(l: f64, op: BinaryOp, r: f64) -> Value {
        match op {
            BinaryOp::Plus => Value::Real(l + r),
            BinaryOp::Minus => Value::Real(l - r),
            BinaryOp::Multiply => Value::Real(l * r),
            BinaryOp::Divide if r == 0.0 => Value::Null,
            BinaryOp::Divide => Value::Real(l / r),
            BinaryOp::Modulo => {
                let (l, r) = (l as i64, r as i64);
                if r == 0 {
                    Value::Null
                } else {
                    Value::Real(l.checked_rem(r).unwrap_or(0) as f64)
                }
            }
            _ => Value::Null,
        }
    }
}

pub struct Caster;

impl Caster {
    pub fn cast(value: Value, affinity: Affinity) -> Value {
        if value.is_null() {
            return value;
        }
        match affinity {
            Affinity::Integer => match value {
                Value::Real(r) => Value::Integer(r as i64),
                Value::Text(_) | Value::Blob(_) => Value::Integer(integer_prefix(&value.to_text())),
                other => other,
            },
            Affinity::Real => match value {
                Value::Integer(i) => Value::Real(i as f64),
                Value::Text(_) | Value::Blob(_) => Value::Real(real_prefix(&value.to_text())),
                other => other,
            },
            Affinity::Numeric => match value {
                Value::Text(_) | Value::Blob(_) => {
                    let text = value.to_text();
                    let text = text.trim();
                    if let Ok(i) = text.parse::<i64>() {
                        Value::Integer(i)
                    } else {
                        let r = real_prefix(text);
                        if r.fract() == 0.0 && r.abs() < 9.2e18 {
                            Value::Integer(r as i64)
                        } else {
                            Value::Real(r)
                        }
                    }
                }
                other => other,
            },
            Affinity::Text => Value::Text(value.to_text()),
            Affinity::Blob => match value {
                Value::Blob(b) => Value::Blob(b),
                other => Value::Blob(other.to_text().into_bytes()),
            },
        }
    }
}

// Longest leading integer, or 0 when the text does not start with one.
fn integer_prefix(text: &str) -> i64 {
    let text = text.trim_start();
    let end = text
        .char_indices()
        .take_while(|(i, c)| c.is_ascii_digit() || (*i == 0 && (*c == '-' || *c == '+')))
        .map(|(i, c)| i + c.len_utf8())
        .last()
        .unwrap_or(0);
    text[..end].parse().unwrap_or(0)
}

// Longest leading prefix that parses as a real, or 0.0.
fn real_prefix(text: &str) -> f64 {
    let text = text.trim_start();
    (1..=text.len())
        .rev()
        .filter(|end| text.is_char_boundary(*end))
        .find_map(|end| {
            let candidate = &text[..end];
            // "inf" and "nan" parse in Rust but are not numeric literals here.
            if candidate.chars().any(|c| c.is_ascii_alphabetic() && c != 'e' && c != 'E') {
                return None;
            }
            candidate.parse::<f64>().ok()
        })
        .unwrap_or(0.0)
}

fn text_arg(value: &Value) -> Option<String> {
    (!value.is_null()).then(|| value.to_text())
}

fn evaluate_function(function: ScalarFunction, mut args: Vec<Value>) -> Result<Value, ExecError> {
    let null_in = |args: &[Value]| args.iter().any(Value::is_null);

    Ok(match function {
        ScalarFunction::Coalesce | ScalarFunction::IfNull => args
            .into_iter()
            .find(|v| !v.is_null())
            .unwrap_or(Value::Null),
        ScalarFunction::Typeof => Value::Text(args[0].type_name().to_string()),
        ScalarFunction::Min | ScalarFunction::Max => {
            if null_in(&args) {
                return Ok(Value::Null);
            }
            let pick = if function == ScalarFunction::Min {
                args.into_iter().min()
            } else {
                args.into_iter().max()
            };
            pick.unwrap_or(Value::Null)
        }
        _ if null_in(&args) => Value::Null,
        ScalarFunction::Abs => match args.swap_remove(0) {
            Value::Integer(i) => i.checked_abs().map_or(Value::Real((i as f64).abs()), Value::Integer),
            Value::Real(r) => Value::Real(r.abs()),
            other => {
                return Err(ExecError::TypeMismatch(format!(
                    "abs() of {} value",
                    other.type_name()
                )))
            }
        },
        ScalarFunction::Length => match &args[0] {
            Value::Blob(bytes) => Value::Integer(bytes.len() as i64),
            other => Value::Integer(other.to_text().chars().count() as i64),
        },
        ScalarFunction::Lower => Value::Text(args[0].to_text().to_ascii_lowercase()),
        ScalarFunction::Upper => Value::Text(args[0].to_text().to_ascii_uppercase()),
        ScalarFunction::Trim | ScalarFunction::LTrim | ScalarFunction::RTrim => {
            let text = args[0].to_text();
            let set: Vec<char> = args
                .get(1)
                .and_then(text_arg)
                .map_or_else(|| vec![' '], |s| s.chars().collect());
            let trimmed = match function {
                ScalarFunction::LTrim => text.trim_start_matches(set.as_slice()),
                ScalarFunction::RTrim => text.trim_end_matches(set.as_slice()),
                _ => text.trim_matches(set.as_slice()),
            };
            Value::Text(trimmed.to_string())
        }
        ScalarFunction::Round => {
            let digits = match args.get(1) {
                Some(d) => d.as_i64().unwrap_or(0).clamp(0, 15),
                None => 0,
            };
            let x = match &args[0] {
                Value::Integer(i) => *i as f64,
                Value::Real(r) => *r,
                other => real_prefix(&other.to_text()),
            };
            let scale = 10f64.powi(digits as i32);
            Value::Real((x * scale).round() / scale)
        }
        ScalarFunction::Substr => {
            let start = args[1].as_i64().unwrap_or(0);
            let length = args.get(2).map(|l| l.as_i64().unwrap_or(0));
            match &args[0] {
                Value::Blob(bytes) => {
                    let (from, to) = substr_range(bytes.len(), start, length);
                    Value::Blob(bytes[from..to].to_vec())
                }
                other => {
                    let chars: Vec<char> = other.to_text().chars().collect();
                    let (from, to) = substr_range(chars.len(), start, length);
                    Value::Text(chars[from..to].iter().collect())
                }
            }
        }
        ScalarFunction::Replace => {
            let text = args[0].to_text();
            let from = args[1].to_text();
            if from.is_empty() {
                Value::Text(text)
            } else {
                Value::Text(text.replace(&from, &args[2].to_text()))
            }
        }
    })
}

/// Resolves SUBSTR's 1-based, possibly negative, start and length into a
/// half-open index range over `len` items.
fn substr_range(len: usize, start: i64, length: Option<i64>) -> (usize, usize) {
    let len = len as i64;
    let mut p1 = start;
    let (mut p2, negative) = match length {
        Some(l) if l < 0 => (l.saturating_neg(), true),
        Some(l) => (l, false),
        None => (len.max(1) * 2, false),
    };

    if p1 < 0 {
        p1 += len;
        if p1 < 0 {
            p2 = (p2 + p1).max(0);
            p1 = 0;
        }
    } else if p1 > 0 {
        p1 -= 1;
    } else if p2 > 0 {
        p2 -= 1;
    }
    if negative {
        p1 -= p2;
        if p1 < 0 {
            p2 += p1;
            p1 = 0;
        }
    }
    let p1 = p1.min(len);
    let p2 = p2.clamp(0, len - p1);
    (p1 as usize, (p1 + p2) as usize)
}
