//! Deferred argument values.
//!
//! A [`Promise`] pairs an expression with the environment it must be
//! evaluated in. It moves once from unevaluated to evaluated; forcing it
//! again returns the memoised value without touching the evaluator.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::env::Env;
use crate::error::{CallError, CallResult};
use crate::eval::Evaluator;
use crate::expr::Expr;
use crate::value::Value;

/// Where the expression of a deferred value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromiseKind {
    /// Supplied at the call site, evaluated in the caller's environment
    Supplied,
    /// A formal's default, evaluated in the callee's environment
    Default,
}

/// Evaluation policy chosen for a bound slot when the call is matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EvalPolicy {
    /// Wrap in a deferred value, forced on first read
    Promised,
    /// Evaluate before the callee runs
    Eager,
}

enum PromiseState {
    Unevaluated { expr: Expr, env: Env },
    Forcing { expr: Expr },
    Evaluated { expr: Expr, value: Value },
}

pub struct Promise {
    kind: PromiseKind,
    state: RefCell<PromiseState>,
}

impl Promise {
    pub fn supplied(expr: Expr, env: Env) -> Rc<Self> {
        Rc::new(Self {
            kind: PromiseKind::Supplied,
            state: RefCell::new(PromiseState::Unevaluated { expr, env }),
        })
    }

    pub fn default_arg(expr: Expr, env: Env) -> Rc<Self> {
        Rc::new(Self {
            kind: PromiseKind::Default,
            state: RefCell::new(PromiseState::Unevaluated { expr, env }),
        })
    }

    /// A deferred value that is already evaluated, keeping its source
    /// expression for diagnostics.
    pub fn evaluated(expr: Expr, value: Value) -> Rc<Self> {
        Rc::new(Self {
            kind: PromiseKind::Supplied,
            state: RefCell::new(PromiseState::Evaluated { expr, value }),
        })
    }

    pub fn kind(&self) -> PromiseKind {
        self.kind
    }

    pub fn is_evaluated(&self) -> bool {
        matches!(&*self.state.borrow(), PromiseState::Evaluated { .. })
    }

    /// The memoised value, if forced.
    pub fn value(&self) -> Option<Value> {
        match &*self.state.borrow() {
            PromiseState::Evaluated { value, .. } => Some(value.clone()),
            _ => None,
        }
    }

    pub fn expr(&self) -> Expr {
        match &*self.state.borrow() {
            PromiseState::Unevaluated { expr, .. }
            | PromiseState::Forcing { expr }
            | PromiseState::Evaluated { expr, .. } => expr.clone(),
        }
    }

    /// Evaluate the expression once and memoise the result.
    ///
    /// Re-entering a promise that is being forced is a `RecursiveDefault`
    /// error. If evaluation fails the promise goes back to unevaluated, so a
    /// later read retries.
    pub fn force(&self, evaluator: &mut dyn Evaluator) -> CallResult<Value> {
        let (expr, env) = {
            let mut state = self.state.borrow_mut();
            match &*state {
                PromiseState::Evaluated { value, .. } => return Ok(value.clone()),
                PromiseState::Forcing { expr } => {
                    return Err(CallError::RecursiveDefault {
                        expr: expr.to_string(),
                    })
                }
                PromiseState::Unevaluated { expr, .. } => {
                    let forcing = PromiseState::Forcing { expr: expr.clone() };
                    match std::mem::replace(&mut *state, forcing) {
                        PromiseState::Unevaluated { expr, env } => (expr, env),
                        _ => unreachable!("state checked above"),
                    }
                }
            }
        };

        // The borrow is released here: the evaluator may read this promise again.
        let result = evaluator.eval(&expr, &env);
        let mut state = self.state.borrow_mut();
        match result {
            Ok(value) => {
                *state = PromiseState::Evaluated {
                    expr,
                    value: value.clone(),
                };
                Ok(value)
            }
            Err(err) => {
                *state = PromiseState::Unevaluated { expr, env };
                Err(err)
            }
        }
    }

    /// Point an unevaluated default at the callee frame. Evaluated promises
    /// are left alone.
    pub(crate) fn rebind_env(&self, frame: &Env) {
        if let PromiseState::Unevaluated { env, .. } = &mut *self.state.borrow_mut() {
            *env = Rc::clone(frame);
        }
    }

    /// Environment the expression will be evaluated in, while unevaluated.
    pub fn env(&self) -> Option<Env> {
        match &*self.state.borrow() {
            PromiseState::Unevaluated { env, .. } => Some(Rc::clone(env)),
            _ => None,
        }
    }
}

impl fmt::Debug for Promise {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match &*self.state.borrow() {
            PromiseState::Unevaluated { .. } => "unevaluated".to_string(),
            PromiseState::Forcing { .. } => "forcing".to_string(),
            PromiseState::Evaluated { value, .. } => format!("evaluated({:?})", value),
        };
        f.debug_struct("Promise")
            .field("kind", &self.kind)
            .field("expr", &self.expr().to_string())
            .field("state", &state)
            .finish()
    }
}

/// A bound argument: either a plain value or a deferred one.
#[derive(Debug, Clone)]
pub enum ArgValue {
    Value(Value),
    Promise(Rc<Promise>),
}

impl ArgValue {
    /// Value of the argument, forcing a deferred one.
    pub fn force(&self, evaluator: &mut dyn Evaluator) -> CallResult<Value> {
        match self {
            ArgValue::Value(v) => Ok(v.clone()),
            ArgValue::Promise(p) => p.force(evaluator),
        }
    }

    /// Whether this is the missing sentinel (deferred values never are).
    pub fn is_missing(&self) -> bool {
        matches!(self, ArgValue::Value(Value::Missing))
    }

    pub fn as_promise(&self) -> Option<&Rc<Promise>> {
        match self {
            ArgValue::Promise(p) => Some(p),
            ArgValue::Value(_) => None,
        }
    }

    /// Source-like rendering for diagnostics.
    pub fn describe(&self) -> String {
        match self {
            ArgValue::Value(v) => v.to_string(),
            ArgValue::Promise(p) => p.expr().to_string(),
        }
    }
}

impl PartialEq for ArgValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ArgValue::Value(a), ArgValue::Value(b)) => a == b,
            (ArgValue::Promise(a), ArgValue::Promise(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::{Environment, Lookup};

    /// Evaluates constants and symbols, counting every call.
    struct CountingEvaluator {
        calls: usize,
    }

    impl Evaluator for CountingEvaluator {
        fn eval(&mut self, expr: &Expr, env: &Env) -> CallResult<Value> {
            self.calls += 1;
            match expr {
                Expr::Constant(v) => Ok(v.clone()),
                Expr::Symbol(name) => match env.lookup(name) {
                    Lookup::Value(v) => Ok(v),
                    Lookup::Deferred(p) => p.force(self),
                    Lookup::NotFound => Err(CallError::UndefinedVariable { name: name.clone() }),
                },
                _ => Err(CallError::eval("unsupported")),
            }
        }
    }

    #[test]
    fn test_force_evaluates_once() {
        let env = Environment::root("global");
        env.define("x", Value::Integer(7));
        let promise = Promise::supplied(Expr::symbol("x"), Rc::clone(&env));
        let mut ev = CountingEvaluator { calls: 0 };

        assert!(!promise.is_evaluated());
        assert_eq!(promise.force(&mut ev).unwrap(), Value::Integer(7));
        assert_eq!(promise.force(&mut ev).unwrap(), Value::Integer(7));
        assert_eq!(ev.calls, 1);
        assert!(promise.is_evaluated());
        assert!(promise.env().is_none());
    }

    #[test]
    fn test_evaluated_promise_never_calls_evaluator() {
        let promise = Promise::evaluated(Expr::symbol("x"), Value::Integer(3));
        let mut ev = CountingEvaluator { calls: 0 };

        assert_eq!(promise.kind(), PromiseKind::Supplied);
        assert!(promise.is_evaluated());
        assert_eq!(promise.value(), Some(Value::Integer(3)));
        assert_eq!(promise.force(&mut ev).unwrap(), Value::Integer(3));
        assert_eq!(ev.calls, 0);
        assert_eq!(promise.expr(), Expr::symbol("x"));
    }

    #[test]
    fn test_kind_records_origin() {
        let env = Environment::root("global");
        let supplied = Promise::supplied(Expr::constant(1i64), Rc::clone(&env));
        let default = Promise::default_arg(Expr::constant(1i64), env);
        assert_eq!(supplied.kind(), PromiseKind::Supplied);
        assert_eq!(default.kind(), PromiseKind::Default);
    }

    #[test]
    fn test_memoised_value_survives_rebinding() {
        let env = Environment::root("global");
        env.define("x", Value::Integer(1));
        let promise = Promise::supplied(Expr::symbol("x"), Rc::clone(&env));
        let mut ev = CountingEvaluator { calls: 0 };

        promise.force(&mut ev).unwrap();
        env.define("x", Value::Integer(2));
        assert_eq!(promise.force(&mut ev).unwrap(), Value::Integer(1));
    }

    #[test]
    fn test_self_reference_is_recursive_default() {
        let env = Environment::root("frame");
        let promise = Promise::default_arg(Expr::symbol("x"), Rc::clone(&env));
        env.define_deferred("x", Rc::clone(&promise));
        let mut ev = CountingEvaluator { calls: 0 };

        let err = promise.force(&mut ev).unwrap_err();
        assert!(matches!(err, CallError::RecursiveDefault { .. }), "{:?}", err);
        // Failure leaves the promise retryable
        assert!(!promise.is_evaluated());
        assert!(promise.env().is_some());
    }

    #[test]
    fn test_failed_force_can_be_retried() {
        let env = Environment::root("global");
        let promise = Promise::supplied(Expr::symbol("late"), Rc::clone(&env));
        let mut ev = CountingEvaluator { calls: 0 };

        assert!(promise.force(&mut ev).is_err());
        env.define("late", Value::str("now"));
        assert_eq!(promise.force(&mut ev).unwrap(), Value::str("now"));
    }

    #[test]
    fn test_rebind_only_touches_unevaluated() {
        let outer = Environment::root("outer");
        outer.define("v", Value::Integer(1));
        let frame = Environment::root("frame");
        frame.define("v", Value::Integer(2));

        let promise = Promise::default_arg(Expr::symbol("v"), Rc::clone(&outer));
        promise.rebind_env(&frame);
        let mut ev = CountingEvaluator { calls: 0 };
        assert_eq!(promise.force(&mut ev).unwrap(), Value::Integer(2));

        promise.rebind_env(&outer);
        assert_eq!(promise.force(&mut ev).unwrap(), Value::Integer(2));
    }

    #[test]
    fn test_arg_value_identity() {
        let env = Environment::root("global");
        let p = Promise::supplied(Expr::constant(1.0), env);
        let a = ArgValue::Promise(Rc::clone(&p));
        let b = ArgValue::Promise(p);
        assert_eq!(a, b);
        assert!(ArgValue::Value(Value::Missing).is_missing());
        assert_eq!(a.describe(), "1");
    }
}
