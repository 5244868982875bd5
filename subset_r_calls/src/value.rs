//! Dynamic Value type handed through call resolution
//!
//! The call core never inspects values beyond what dispatch needs (the class
//! vector) and what argument forwarding needs (`...` bundles and the missing
//! sentinel). Storage and vector semantics belong to the evaluator.

use std::fmt;
use std::rc::Rc;

use crate::args::ArgsBundle;
use crate::function::Function;

/// Dynamic value type
#[derive(Debug, Clone)]
pub enum Value {
    // ========== Scalars ==========
    /// The NULL object
    Null,
    /// Logical scalar
    Logical(bool),
    /// Integer scalar
    Integer(i64),
    /// Double scalar
    Double(f64),
    /// Character scalar
    Str(String),

    // ========== Language objects ==========
    /// A closure or native function
    Function(Function),
    /// A collected rest bundle, the value bound to `...`
    Args(ArgsBundle),
    /// A value carrying an explicit class attribute
    Object {
        /// Class attribute, most specific first
        class: Vec<String>,
        /// Underlying value
        value: Box<Value>,
    },

    // ========== Sentinels ==========
    /// Missing-argument sentinel: nothing was supplied and no default applies
    Missing,
}

impl Value {
    /// Build a character value
    pub fn str<S: Into<String>>(s: S) -> Self {
        Value::Str(s.into())
    }

    /// Attach a class attribute to a value
    pub fn with_class<I, S>(value: Value, class: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Value::Object {
            class: class.into_iter().map(Into::into).collect(),
            value: Box::new(value),
        }
    }

    /// Get the type name of this value (`typeof`)
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "NULL",
            Value::Logical(_) => "logical",
            Value::Integer(_) => "integer",
            Value::Double(_) => "double",
            Value::Str(_) => "character",
            Value::Function(f) if f.is_native() => "builtin",
            Value::Function(_) => "closure",
            Value::Args(_) => "...",
            Value::Object { value, .. } => value.type_name(),
            Value::Missing => "symbol",
        }
    }

    /// Class vector used for generic dispatch.
    ///
    /// An explicit class attribute wins; otherwise the implicit class is
    /// derived from the type, with numeric types also dispatching on
    /// `numeric`.
    pub fn implicit_class(&self) -> Vec<String> {
        let implicit: &[&str] = match self {
            Value::Object { class, .. } => return class.clone(),
            Value::Null => &["NULL"],
            Value::Logical(_) => &["logical"],
            Value::Integer(_) => &["integer", "numeric"],
            Value::Double(_) => &["double", "numeric"],
            Value::Str(_) => &["character"],
            Value::Function(_) => &["function"],
            Value::Args(_) => &["..."],
            Value::Missing => &["name"],
        };
        implicit.iter().map(|c| c.to_string()).collect()
    }

    /// Check if this value is the missing-argument sentinel
    pub fn is_missing(&self) -> bool {
        matches!(self, Value::Missing)
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Missing, Value::Missing) => true,
            (Value::Logical(a), Value::Logical(b)) => a == b,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Double(a), Value::Double(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            // Functions compare by identity, never by structure
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::Args(a), Value::Args(b)) => a == b,
            (
                Value::Object {
                    class: ca,
                    value: va,
                },
                Value::Object {
                    class: cb,
                    value: vb,
                },
            ) => ca == cb && va == vb,
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Logical(true) => write!(f, "TRUE"),
            Value::Logical(false) => write!(f, "FALSE"),
            Value::Integer(v) => write!(f, "{}L", v),
            Value::Double(v) => write!(f, "{}", v),
            Value::Str(s) => write!(f, "\"{}\"", s),
            Value::Function(func) => write!(f, "<function {}>", func.name()),
            Value::Args(b) => write!(f, "<... of length {}>", b.len()),
            Value::Object { value, .. } => write!(f, "{}", value),
            Value::Missing => Ok(()),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Logical(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}
