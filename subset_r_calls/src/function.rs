//! Callable objects.

use std::fmt;
use std::rc::Rc;

use crate::env::Env;
use crate::error::CallResult;
use crate::expr::Expr;
use crate::formals::{FormalParameter, FormalParameters};
use crate::promise::EvalPolicy;

/// Shared handle to a function. Identity is `Rc::ptr_eq`.
pub type Function = Rc<FunctionDef>;

/// How a function body is run.
#[derive(Debug, Clone)]
pub enum FunctionKind {
    /// Interpreted closure: arguments stay deferred until read
    Closure { body: Expr },
    /// Native function: `eager[i]` asks for position `i` to be evaluated
    /// before the call. Positions past the end are deferred.
    Native { eager: Vec<bool> },
}

pub struct FunctionDef {
    name: String,
    formals: Rc<FormalParameters>,
    env: Env,
    kind: FunctionKind,
}

impl FunctionDef {
    /// Build a closure defined in `env`.
    pub fn closure<S: Into<String>>(
        name: S,
        formals: Vec<FormalParameter>,
        body: Expr,
        env: &Env,
    ) -> CallResult<Function> {
        Ok(Rc::new(Self {
            name: name.into(),
            formals: Rc::new(FormalParameters::new(formals)?),
            env: Rc::clone(env),
            kind: FunctionKind::Closure { body },
        }))
    }

    /// Build a native function. `eager` marks the formals evaluated before
    /// the call.
    pub fn native<S: Into<String>>(
        name: S,
        formals: Vec<FormalParameter>,
        eager: Vec<bool>,
        env: &Env,
    ) -> CallResult<Function> {
        Ok(Rc::new(Self {
            name: name.into(),
            formals: Rc::new(FormalParameters::new(formals)?),
            env: Rc::clone(env),
            kind: FunctionKind::Native { eager },
        }))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn formals(&self) -> &Rc<FormalParameters> {
        &self.formals
    }

    /// The defining environment: callee frames are its children and default
    /// arguments resolve through it.
    pub fn env(&self) -> &Env {
        &self.env
    }

    pub fn kind(&self) -> &FunctionKind {
        &self.kind
    }

    /// Body expression of a closure.
    pub fn body(&self) -> Option<&Expr> {
        match &self.kind {
            FunctionKind::Closure { body } => Some(body),
            FunctionKind::Native { .. } => None,
        }
    }

    pub fn is_native(&self) -> bool {
        matches!(self.kind, FunctionKind::Native { .. })
    }

    /// Evaluation policy for formal `index`.
    pub fn eval_policy(&self, index: usize) -> EvalPolicy {
        match &self.kind {
            FunctionKind::Native { eager } if eager.get(index).copied().unwrap_or(false) => {
                EvalPolicy::Eager
            }
            _ => EvalPolicy::Promised,
        }
    }
}

impl fmt::Debug for FunctionDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionDef")
            .field("name", &self.name)
            .field("formals", &self.formals.names())
            .field("env", &self.env.name())
            .field("native", &self.is_native())
            .finish()
    }
}
