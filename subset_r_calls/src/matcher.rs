//! Argument matching.
//!
//! Maps a flattened supplied argument list onto a callee's formals in five
//! steps: exact names, unique-prefix names, positions, rest collection and
//! defaults. The result is a value-free [`MatchPermutation`] that can be
//! stored in a call-site cache and re-applied to later calls of the same
//! shape.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

use std::rc::Rc;

use crate::args::{ArgSource, ArgsBundle, FlatArg};
use crate::call::{BoundSlot, MatchedArguments};
use crate::config::CallConfig;
use crate::env::Env;
use crate::error::{CallError, CallResult};
use crate::eval::Evaluator;
use crate::expr::Expr;
use crate::formals::FormalParameters;
use crate::function::Function;
use crate::promise::{ArgValue, EvalPolicy, Promise};
use crate::value::Value;

/// Where a formal's value comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotSource {
    /// Index into the flattened supplied list
    Supplied(usize),
    /// The formal's default expression
    Default,
    /// Nothing supplied and no default
    Missing,
    /// Leftover supplied indices, in call order
    Rest(Vec<usize>),
}

/// Value-free result of matching one call shape against one callee.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchPermutation {
    slots: Vec<SlotSource>,
    policies: Vec<EvalPolicy>,
}

/// Match `args` against `formals`, producing one [`SlotSource`] per formal.
pub fn match_slots(
    formals: &FormalParameters,
    args: &[FlatArg],
    config: &CallConfig,
) -> CallResult<Vec<SlotSource>> {
    let n = formals.len();
    let mut bound: Vec<Option<usize>> = vec![None; n];
    let mut used = vec![false; args.len()];

    // Pass 1: exact names
    for (si, arg) in args.iter().enumerate() {
        let Some(name) = arg.name() else { continue };
        if let Some(fi) = formals.exact_position(name) {
            if bound[fi].is_some() {
                return Err(CallError::multiple_match(name));
            }
            bound[fi] = Some(si);
            used[si] = true;
        }
    }

    // Pass 2: unique prefixes over formals left unbound by pass 1
    if config.partial_matching {
        let exact_bound: Vec<bool> = bound.iter().map(Option::is_some).collect();
        for (si, arg) in args.iter().enumerate() {
            if used[si] {
                continue;
            }
            let Some(name) = arg.name() else { continue };
            let candidates: Vec<(usize, &str)> = formals
                .partial_candidates()
                .filter(|(fi, formal)| !exact_bound[*fi] && formal.starts_with(name))
                .collect();
            match candidates.as_slice() {
                [] => {}
                [(fi, formal)] => {
                    if bound[*fi].is_some() {
                        return Err(CallError::multiple_match(*formal));
                    }
                    bound[*fi] = Some(si);
                    used[si] = true;
                }
                _ => return Err(CallError::ambiguous_argument(si)),
            }
        }
    }

    // Pass 3: positions, up to the rest formal
    let stop = formals.rest_index().unwrap_or(n);
    let mut fi = 0;
    for (si, arg) in args.iter().enumerate() {
        if used[si] || arg.name().is_some() || arg.is_placeholder() {
            continue;
        }
        while fi < stop && bound[fi].is_some() {
            fi += 1;
        }
        if fi >= stop {
            break;
        }
        bound[fi] = Some(si);
        used[si] = true;
        fi += 1;
    }

    // Pass 4: leftovers
    let leftovers: Vec<usize> = (0..args.len())
        .filter(|&si| !used[si] && !args[si].is_placeholder())
        .collect();
    if formals.rest_index().is_none() && !leftovers.is_empty() {
        return Err(CallError::unused_arguments(
            leftovers.iter().map(|&si| args[si].describe()).collect(),
        ));
    }

    // Pass 5: defaults
    let mut leftovers = Some(leftovers);
    let slots = formals
        .iter()
        .zip(bound)
        .map(|(formal, bound)| match bound {
            Some(si) => SlotSource::Supplied(si),
            None if formal.is_rest => SlotSource::Rest(leftovers.take().unwrap_or_default()),
            None if formal.default.is_some() => SlotSource::Default,
            None => SlotSource::Missing,
        })
        .collect();
    Ok(slots)
}

impl MatchPermutation {
    /// Match `args` against `callee` and record its per-formal evaluation
    /// policy.
    pub fn compute(callee: &Function, args: &[FlatArg], config: &CallConfig) -> CallResult<Self> {
        let slots = match_slots(callee.formals(), args, config)?;
        let policies = (0..slots.len()).map(|i| callee.eval_policy(i)).collect();
        tracing::trace!(
            callee = callee.name(),
            supplied = args.len(),
            "computed argument permutation"
        );
        Ok(Self { slots, policies })
    }

    pub fn slots(&self) -> &[SlotSource] {
        &self.slots
    }

    pub fn policies(&self) -> &[EvalPolicy] {
        &self.policies
    }

    /// Bind the current call's values through this template.
    ///
    /// Supplied expressions become deferred values in `caller_env`, defaults
    /// deferred values in the callee's defining environment. Eager positions
    /// are evaluated here, before the callee runs.
    ///
    /// # Panics
    ///
    /// Panics if the template refers to a supplied argument `args` does not
    /// have, which means it is applied to a call of a different shape.
    pub fn apply(
        &self,
        callee: &Function,
        args: Vec<FlatArg>,
        caller_env: &Env,
        evaluator: &mut dyn Evaluator,
    ) -> CallResult<MatchedArguments> {
        let mut args: Vec<Option<FlatArg>> = args.into_iter().map(Some).collect();
        let mut take = |si: usize| -> (Option<String>, ArgSource) {
            match args.get_mut(si).and_then(Option::take) {
                Some(FlatArg::Arg { name, value }) => (name, value),
                other => panic!(
                    "argument permutation for '{}' refers to supplied argument {} but found {:?}",
                    callee.name(),
                    si,
                    other
                ),
            }
        };

        let mut slots = Vec::with_capacity(self.slots.len());
        for (fi, (source, policy)) in self.slots.iter().zip(&self.policies).enumerate() {
            let slot = match source {
                SlotSource::Supplied(si) => {
                    let (name, value) = take(*si);
                    BoundSlot::Supplied {
                        name,
                        value: materialize(value, *policy, caller_env, evaluator)?,
                    }
                }
                SlotSource::Default => {
                    let default = callee
                        .formals()
                        .get(fi)
                        .and_then(|f| f.default.clone())
                        .unwrap_or(Expr::Missing);
                    let value = match policy {
                        EvalPolicy::Promised => {
                            ArgValue::Promise(Promise::default_arg(default, Rc::clone(callee.env())))
                        }
                        EvalPolicy::Eager => ArgValue::Value(evaluator.eval(&default, callee.env())?),
                    };
                    BoundSlot::Default(value)
                }
                SlotSource::Missing => BoundSlot::Missing,
                SlotSource::Rest(indices) => {
                    let mut pairs = Vec::with_capacity(indices.len());
                    for si in indices {
                        let (name, value) = take(*si);
                        let name = name.filter(|n| !n.is_empty());
                        pairs.push((name, materialize(value, *policy, caller_env, evaluator)?));
                    }
                    BoundSlot::Rest(ArgsBundle::from_pairs(pairs))
                }
            };
            slots.push(slot);
        }
        Ok(MatchedArguments::new(Rc::clone(callee.formals()), slots))
    }
}

/// Wrap one supplied source according to its slot's policy.
fn materialize(
    source: ArgSource,
    policy: EvalPolicy,
    caller_env: &Env,
    evaluator: &mut dyn Evaluator,
) -> CallResult<ArgValue> {
    match (source, policy) {
        (ArgSource::Expr(Expr::Missing), _) => Ok(ArgValue::Value(Value::Missing)),
        (ArgSource::Expr(expr), EvalPolicy::Promised) => {
            Ok(ArgValue::Promise(Promise::supplied(expr, Rc::clone(caller_env))))
        }
        (ArgSource::Expr(expr), EvalPolicy::Eager) => {
            Ok(ArgValue::Value(evaluator.eval(&expr, caller_env)?))
        }
        (ArgSource::Value(value), _) => Ok(ArgValue::Value(value)),
        (ArgSource::Promise(promise), EvalPolicy::Promised) => Ok(ArgValue::Promise(promise)),
        (ArgSource::Promise(promise), EvalPolicy::Eager) => {
            Ok(ArgValue::Value(promise.force(evaluator)?))
        }
    }
}
