//! Boundary to the expression evaluator.

use crate::env::Env;
use crate::error::CallResult;
use crate::expr::Expr;
use crate::value::Value;

/// The one service call resolution needs from the interpreter: evaluate an
/// expression in an environment.
///
/// Memoisation is not the evaluator's concern; [`crate::promise::Promise::force`]
/// calls this at most once per deferred value.
pub trait Evaluator {
    fn eval(&mut self, expr: &Expr, env: &Env) -> CallResult<Value>;
}
