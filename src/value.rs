//! Runtime values and operator dispatch.
//!
//! Every binary operator is a free function matching exhaustively over the
//! pair of operand kinds.  A legal pair produces a [`Value`]; anything else
//! yields a [`TypeError`], which the interpreter attaches to the operator
//! token.  Equality is the exception: it is total and never fails.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use thiserror::Error;

use crate::class::{LoxClass, LoxInstance};
use crate::function::{LoxFunction, NativeFunction};

#[derive(Clone)]
pub enum Value {
    Nil,
    Bool(bool),
    Number(f64),
    String(String),
    Function(Rc<LoxFunction>),
    Native(Rc<NativeFunction>),
    Class(Rc<LoxClass>),
    Instance(Rc<RefCell<LoxInstance>>),
}

/// An operator was applied to operand kinds it does not support.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct TypeError {
    pub message: String,
}

impl TypeError {
    fn binary(verb: &str, left: &Value, right: &Value) -> Self {
        TypeError {
            message: format!(
                "{} types `{}` and `{}`",
                verb,
                left.type_name(),
                right.type_name()
            ),
        }
    }
}

pub type OpResult = std::result::Result<Value, TypeError>;

impl Value {
    /// `nil` and `false` are falsy; everything else is truthy.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Nil | Value::Bool(false))
    }

    /// Kind name used in diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Function(_) | Value::Native(_) => "function",
            Value::Class(_) => "class",
            Value::Instance(_) => "instance",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),

            Value::Bool(b) => write!(f, "{}", b),

            Value::Number(n) => write!(f, "{}", format_number(*n)),

            Value::String(s) => write!(f, "{}", s),

            Value::Function(function) => write!(f, "<fn {}>", function.name()),

            Value::Native(native) => write!(f, "<native fn {}>", native.name),

            Value::Class(class) => write!(f, "{}", class.name),

            Value::Instance(instance) => write!(f, "{} instance", instance.borrow().class().name),
        }
    }
}

// Closures and instances can reach themselves through their environments,
// so Debug stays shallow.
impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "Nil"),
            Value::Bool(b) => write!(f, "Bool({})", b),
            Value::Number(n) => write!(f, "Number({})", n),
            Value::String(s) => write!(f, "String({:?})", s),
            other => write!(f, "{}", other),
        }
    }
}

/// Integral numbers print without a fractional part: `3`, not `3.0`.
/// Magnitudes from 1e15 up use exponent form (`1e300`); non-finite values
/// print as `Infinity`, `-Infinity` and `NaN`.
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_string();
    }
    if n.is_infinite() {
        let sign: &str = if n < 0.0 { "-" } else { "" };
        return format!("{}Infinity", sign);
    }
    if n.abs() >= 1e15 {
        return format!("{:e}", n);
    }

    if n.fract() == 0.0 {
        let mut buf: itoa::Buffer = itoa::Buffer::new();
        let printed: &str = buf.format(n as i64);
        if n == 0.0 && n.is_sign_negative() {
            format!("-{}", printed)
        } else {
            printed.to_string()
        }
    } else {
        n.to_string()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Operators
// ─────────────────────────────────────────────────────────────────────────────

pub fn add(left: &Value, right: &Value) -> OpResult {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),
        (Value::String(a), Value::String(b)) => Ok(Value::String(format!("{}{}", a, b))),
        (Value::Bool(a), Value::Bool(b)) => Ok(Value::Bool(*a || *b)),
        (Value::Number(a), Value::String(b)) => {
            Ok(Value::String(format!("{}{}", format_number(*a), b)))
        }
        (Value::String(a), Value::Number(b)) => {
            Ok(Value::String(format!("{}{}", a, format_number(*b))))
        }
        _ => Err(TypeError::binary("Unaddable", left, right)),
    }
}

pub fn subtract(left: &Value, right: &Value) -> OpResult {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a - b)),
        _ => Err(TypeError::binary("Unsubtractable", left, right)),
    }
}

pub fn divide(left: &Value, right: &Value) -> OpResult {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a / b)),
        _ => Err(TypeError::binary("Undivisible", left, right)),
    }
}

pub fn modulo(left: &Value, right: &Value) -> OpResult {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a % b)),
        _ => Err(TypeError::binary("Unmoduloable", left, right)),
    }
}

pub fn multiply(left: &Value, right: &Value) -> OpResult {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a * b)),
        (Value::Bool(a), Value::Bool(b)) => Ok(Value::Bool(*a && *b)),
        (Value::Number(a), Value::Bool(b)) => Ok(Value::Number(a * if *b { 1.0 } else { 0.0 })),
        (Value::String(s), Value::Number(n)) | (Value::Number(n), Value::String(s)) => {
            repeat(s, *n).ok_or_else(|| TypeError {
                message: format!("String repetition count {} is too large", format_number(*n)),
            })
        }
        _ => Err(TypeError::binary("Unmultipliable", left, right)),
    }
}

/// Longest string, in bytes, that a repetition may build.
pub const MAX_REPEAT_LEN: usize = 1 << 30;

/// `s` repeated `n` times, `n` truncated toward zero.  Negative, NaN and
/// infinite counts repeat zero times.  `None` if the result would exceed
/// [`MAX_REPEAT_LEN`] or cannot be allocated.
fn repeat(s: &str, n: f64) -> Option<Value> {
    let count: usize = if n.is_finite() && n >= 1.0 {
        n.trunc().min(usize::MAX as f64) as usize
    } else {
        0
    };

    let total: usize = s.len().checked_mul(count)?;
    if total > MAX_REPEAT_LEN {
        return None;
    }
    if total == 0 {
        return Some(Value::String(String::new()));
    }

    let mut out = String::new();
    out.try_reserve_exact(total).ok()?;
    for _ in 0..count {
        out.push_str(s);
    }

    Some(Value::String(out))
}

fn compare(op: impl Fn(f64, f64) -> bool, left: &Value, right: &Value) -> OpResult {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => Ok(Value::Bool(op(*a, *b))),
        _ => Err(TypeError::binary("Incomparable", left, right)),
    }
}

pub fn greater(left: &Value, right: &Value) -> OpResult {
    compare(|a, b| a > b, left, right)
}

pub fn greater_equal(left: &Value, right: &Value) -> OpResult {
    compare(|a, b| a >= b, left, right)
}

pub fn less(left: &Value, right: &Value) -> OpResult {
    compare(|a, b| a < b, left, right)
}

pub fn less_equal(left: &Value, right: &Value) -> OpResult {
    compare(|a, b| a <= b, left, right)
}

/// Total equality.  Reference kinds compare by identity.
pub fn is_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Nil, Value::Nil) => true,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::Number(a), Value::Number(b)) => a == b,
        (Value::String(a), Value::String(b)) => a == b,
        (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
        (Value::Native(a), Value::Native(b)) => Rc::ptr_eq(a, b),
        (Value::Class(a), Value::Class(b)) => Rc::ptr_eq(a, b),
        (Value::Instance(a), Value::Instance(b)) => Rc::ptr_eq(a, b),
        _ => false,
    }
}

pub fn negate(operand: &Value) -> OpResult {
    match operand {
        Value::Number(n) => Ok(Value::Number(-n)),
        _ => Err(TypeError {
            message: format!("Unnegatable type `{}`", operand.type_name()),
        }),
    }
}

/// `!value` is defined for every kind.
pub fn invert(operand: &Value) -> Value {
    Value::Bool(!operand.is_truthy())
}
