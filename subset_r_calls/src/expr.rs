//! Expressions stored in deferred values and default arguments.
//!
//! The call core only stores and renders these; interpreting them is the
//! evaluator's job (see [`crate::eval::Evaluator`]).

use std::fmt;

use crate::value::Value;

/// Symbol naming the rest parameter and its forwarded bundle.
pub const DOTS: &str = "...";

/// An unevaluated expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A literal value
    Constant(Value),
    /// A variable reference
    Symbol(String),
    /// A function call `function(args)`
    Call {
        function: Box<Expr>,
        args: Vec<CallArg>,
    },
    /// An empty argument slot, as in `f(1, )`
    Missing,
}

/// One argument expression at a call site, with its optional name.
#[derive(Debug, Clone, PartialEq)]
pub struct CallArg {
    pub name: Option<String>,
    pub value: Expr,
}

impl CallArg {
    pub fn positional(value: Expr) -> Self {
        Self { name: None, value }
    }

    pub fn named<S: Into<String>>(name: S, value: Expr) -> Self {
        Self {
            name: Some(name.into()),
            value,
        }
    }

    /// `...` forwarded in argument position.
    pub fn dots() -> Self {
        Self::positional(Expr::symbol(DOTS))
    }
}

impl Expr {
    pub fn constant<V: Into<Value>>(value: V) -> Self {
        Expr::Constant(value.into())
    }

    pub fn symbol<S: Into<String>>(name: S) -> Self {
        Expr::Symbol(name.into())
    }

    /// Call of a function by name.
    pub fn call<S: Into<String>>(name: S, args: Vec<CallArg>) -> Self {
        Expr::Call {
            function: Box::new(Expr::symbol(name)),
            args,
        }
    }

    /// Whether this is the `...` symbol.
    pub fn is_dots(&self) -> bool {
        matches!(self, Expr::Symbol(name) if name == DOTS)
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Constant(v) => write!(f, "{}", v),
            Expr::Symbol(name) => write!(f, "{}", name),
            Expr::Call { function, args } => {
                write!(f, "{}(", function)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ")")
            }
            Expr::Missing => Ok(()),
        }
    }
}

impl fmt::Display for CallArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{} = {}", name, self.value),
            None => write!(f, "{}", self.value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_call_rendering() {
        let call = Expr::call(
            "f",
            vec![
                CallArg::positional(Expr::constant(1.0)),
                CallArg::named("y", Expr::symbol("x")),
                CallArg::dots(),
            ],
        );
        assert_eq!(format!("{}", call), "f(1, y = x, ...)");
    }

    #[test]
    fn test_is_dots() {
        assert!(Expr::symbol("...").is_dots());
        assert!(!Expr::symbol("x").is_dots());
        assert!(!Expr::Missing.is_dots());
    }
}
