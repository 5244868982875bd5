//! Binding a call: from call-site arguments to a callee frame.
//!
//! [`bind_call`] is the entry point the evaluator uses for direct calls:
//! flatten the supplied list, compute the argument permutation, and bind the
//! current values through it. [`MatchedArguments::enter_frame`] then creates
//! the callee's environment.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

use std::rc::Rc;

use crate::args::{flatten_supplied, ArgsBundle, Supplied, SuppliedArg};
use crate::config::CallConfig;
use crate::dispatch::DispatchContext;
use crate::env::{Env, Environment, Lookup};
use crate::error::{CallError, CallResult};
use crate::eval::Evaluator;
use crate::expr::{CallArg, DOTS};
use crate::formals::FormalParameters;
use crate::function::Function;
use crate::matcher::MatchPermutation;
use crate::promise::ArgValue;
use crate::value::Value;

/// The value bound to one formal.
#[derive(Debug, Clone, PartialEq)]
pub enum BoundSlot {
    /// A supplied argument, with the name it carried at the call site
    Supplied { name: Option<String>, value: ArgValue },
    /// The formal's default
    Default(ArgValue),
    /// Nothing supplied, no default
    Missing,
    /// The rest bundle
    Rest(ArgsBundle),
}

impl BoundSlot {
    /// The bound value, for slots that hold a single one.
    pub fn value(&self) -> Option<&ArgValue> {
        match self {
            BoundSlot::Supplied { value, .. } | BoundSlot::Default(value) => Some(value),
            BoundSlot::Missing | BoundSlot::Rest(_) => None,
        }
    }

    pub fn is_missing(&self) -> bool {
        match self {
            BoundSlot::Missing => true,
            BoundSlot::Supplied { value, .. } => value.is_missing(),
            _ => false,
        }
    }
}

/// A match result: one bound slot per formal, in declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchedArguments {
    formals: Rc<FormalParameters>,
    slots: Vec<BoundSlot>,
}

impl MatchedArguments {
    pub(crate) fn new(formals: Rc<FormalParameters>, slots: Vec<BoundSlot>) -> Self {
        debug_assert_eq!(formals.len(), slots.len());
        Self { formals, slots }
    }

    pub fn formals(&self) -> &FormalParameters {
        &self.formals
    }

    pub fn slots(&self) -> &[BoundSlot] {
        &self.slots
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&BoundSlot> {
        self.slots.get(index)
    }

    /// Slot of the formal called `name`.
    pub fn by_name(&self, name: &str) -> Option<&BoundSlot> {
        self.formals
            .position_of(name)
            .and_then(|i| self.slots.get(i))
    }

    /// The rest bundle, if the callee declares a rest formal.
    pub fn rest(&self) -> Option<&ArgsBundle> {
        self.slots.iter().find_map(|s| match s {
            BoundSlot::Rest(bundle) => Some(bundle),
            _ => None,
        })
    }

    /// Read the formal called `name`, forcing a deferred value.
    pub fn value_of(&self, name: &str, evaluator: &mut dyn Evaluator) -> CallResult<Value> {
        let slot = self
            .by_name(name)
            .ok_or_else(|| CallError::UndefinedVariable {
                name: name.to_string(),
            })?;
        let value = match slot {
            BoundSlot::Supplied { value, .. } | BoundSlot::Default(value) => value.force(evaluator)?,
            BoundSlot::Missing => Value::Missing,
            BoundSlot::Rest(bundle) => return Ok(Value::Args(bundle.clone())),
        };
        if value.is_missing() {
            return Err(CallError::missing_argument(name));
        }
        Ok(value)
    }

    /// Turn the match back into a supplied list in formal order, each
    /// argument keeping the name it had at the call site.
    ///
    /// Defaults and missing slots are dropped: a method re-matched from this
    /// list sees only what the caller actually supplied. The rest bundle is
    /// passed as an expansion so its names survive.
    pub fn to_supplied(&self) -> Vec<SuppliedArg> {
        let mut supplied = Vec::with_capacity(self.slots.len());
        for slot in &self.slots {
            match slot {
                BoundSlot::Supplied { name, value } => {
                    supplied.push(SuppliedArg::from_arg_value(name.clone(), value.clone()))
                }
                BoundSlot::Rest(bundle) => supplied.push(SuppliedArg::expand(bundle.clone())),
                BoundSlot::Default(_) | BoundSlot::Missing => {}
            }
        }
        supplied
    }

    /// Create the callee frame and bind every named formal in it.
    ///
    /// The frame is a child of the callee's defining environment. Deferred
    /// defaults are re-targeted at the frame so they can see other formals.
    pub fn enter_frame(self, callee: &Function, caller_env: &Env) -> CallFrame {
        let env = Environment::new_child(callee.env(), callee.name());
        for (formal, slot) in self.formals.iter().zip(&self.slots) {
            let Some(name) = formal.name() else { continue };
            match slot {
                BoundSlot::Supplied { value, .. } => bind_value(&env, name, value),
                BoundSlot::Default(value) => {
                    if let ArgValue::Promise(promise) = value {
                        promise.rebind_env(&env);
                    }
                    bind_value(&env, name, value);
                }
                BoundSlot::Missing => env.define(name, Value::Missing),
                BoundSlot::Rest(bundle) => env.define(DOTS, Value::Args(bundle.clone())),
            }
        }
        CallFrame {
            env,
            caller: Rc::clone(caller_env),
            function: Rc::clone(callee),
            arguments: self,
            dispatch: None,
        }
    }
}

fn bind_value(env: &Env, name: &str, value: &ArgValue) {
    match value {
        ArgValue::Value(v) => env.define(name, v.clone()),
        ArgValue::Promise(p) => env.define_deferred(name, Rc::clone(p)),
    }
}

/// An entered call: the callee's environment plus what it was called with.
#[derive(Debug)]
pub struct CallFrame {
    /// The callee's local environment
    pub env: Env,
    /// Environment the call was made from
    pub caller: Env,
    pub function: Function,
    pub arguments: MatchedArguments,
    /// Set when the function was reached through generic dispatch
    pub dispatch: Option<DispatchContext>,
}

impl CallFrame {
    pub fn with_dispatch(mut self, context: DispatchContext) -> Self {
        self.dispatch = Some(context);
        self
    }
}

/// Bind `supplied` to `callee` with the process-wide configuration.
pub fn bind_call(
    callee: &Function,
    supplied: &[SuppliedArg],
    caller_env: &Env,
    evaluator: &mut dyn Evaluator,
) -> CallResult<MatchedArguments> {
    bind_call_with(callee, supplied, caller_env, evaluator, CallConfig::global())
}

/// Bind `supplied` to `callee`.
pub fn bind_call_with(
    callee: &Function,
    supplied: &[SuppliedArg],
    caller_env: &Env,
    evaluator: &mut dyn Evaluator,
    config: &CallConfig,
) -> CallResult<MatchedArguments> {
    let flat = flatten_supplied(supplied);
    let permutation = MatchPermutation::compute(callee, &flat, config)?;
    permutation.apply(callee, flat, caller_env, evaluator)
}

/// Convert call-site argument expressions into a supplied list. A `...`
/// argument becomes an expansion of the caller's rest bundle.
pub fn supplied_from_call(args: &[CallArg], caller_env: &Env) -> CallResult<Vec<SuppliedArg>> {
    args.iter()
        .map(|arg| {
            if arg.value.is_dots() {
                match caller_env.lookup(DOTS) {
                    Lookup::Value(Value::Args(bundle)) => Ok(SuppliedArg::expand(bundle)),
                    _ => Err(CallError::eval("'...' used in an incorrect context")),
                }
            } else {
                Ok(SuppliedArg {
                    name: arg.name.clone(),
                    value: Supplied::Expr(arg.value.clone()),
                })
            }
        })
        .collect()
}
