//! Per-call-site resolution caches.
//!
//! Each call site owns one cache holding at most one entry: the last
//! successful resolution and the argument permutation it produced. An entry
//! is reused only for a call of the same shape against the same callee; for
//! generic calls the method lookups it depended on are re-read on every call
//! and must give identical answers. Anything else discards the entry and
//! resolves from scratch.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

use std::rc::Rc;

use crate::args::{flatten_supplied, CallShape, SuppliedArg};
use crate::call::MatchedArguments;
use crate::config::CallConfig;
use crate::dispatch::{resolve_generic, ClassVector, DispatchContext, DispatchTarget, DispatchedCall};
use crate::env::Env;
use crate::error::CallResult;
use crate::eval::Evaluator;
use crate::function::Function;
use crate::matcher::MatchPermutation;

/// Hit and miss counters of one call site.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Misses that replaced an existing entry
    pub respecializations: u64,
}

#[derive(Debug)]
struct CallSiteEntry {
    callee: Function,
    shape: CallShape,
    config: CallConfig,
    permutation: MatchPermutation,
}

/// Cache for a direct call site.
#[derive(Debug, Default)]
pub struct CallSiteCache {
    entry: Option<CallSiteEntry>,
    stats: CacheStats,
}

impl CallSiteCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `supplied` to `callee`, reusing the cached permutation when the
    /// callee is the same function and the call has the same shape.
    pub fn bind(
        &mut self,
        callee: &Function,
        supplied: &[SuppliedArg],
        caller_env: &Env,
        evaluator: &mut dyn Evaluator,
        config: &CallConfig,
    ) -> CallResult<MatchedArguments> {
        let shape = CallShape::of(supplied);
        let flat = flatten_supplied(supplied);

        if let Some(entry) = &self.entry {
            if Rc::ptr_eq(&entry.callee, callee) && entry.shape == shape && entry.config == *config
            {
                self.stats.hits += 1;
                tracing::trace!(callee = callee.name(), "call site cache hit");
                return entry.permutation.apply(callee, flat, caller_env, evaluator);
            }
        }

        let replaced = self.entry.take().is_some();
        self.stats.misses += 1;
        if replaced {
            self.stats.respecializations += 1;
            tracing::debug!(callee = callee.name(), "re-specializing call site");
        }
        let permutation = MatchPermutation::compute(callee, &flat, config)?;
        let arguments = permutation.apply(callee, flat, caller_env, evaluator)?;
        self.entry = Some(CallSiteEntry {
            callee: Rc::clone(callee),
            shape,
            config: *config,
            permutation,
        });
        Ok(arguments)
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    pub fn is_populated(&self) -> bool {
        self.entry.is_some()
    }

    /// The cached permutation, if any.
    pub fn permutation(&self) -> Option<&MatchPermutation> {
        self.entry.as_ref().map(|e| &e.permutation)
    }

    pub fn invalidate(&mut self) {
        self.entry = None;
    }
}

#[derive(Debug)]
struct DispatchSiteEntry {
    generic: String,
    shape: CallShape,
    classes: ClassVector,
    def_env: Option<Env>,
    config: CallConfig,
    target: DispatchTarget,
    permutation: MatchPermutation,
}

impl DispatchSiteEntry {
    fn matches(
        &self,
        generic: &str,
        shape: &CallShape,
        classes: &ClassVector,
        def_env: Option<&Env>,
        config: &CallConfig,
    ) -> bool {
        let same_def_env = match (&self.def_env, def_env) {
            (Some(a), Some(b)) => Rc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        };
        self.generic == generic
            && self.shape == *shape
            && self.classes == *classes
            && same_def_env
            && self.config == *config
    }
}

/// Cache for a generic call site.
#[derive(Debug, Default)]
pub struct DispatchSiteCache {
    entry: Option<DispatchSiteEntry>,
    stats: CacheStats,
}

impl DispatchSiteCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Dispatch `generic` on `classes` with the generic's matched
    /// arguments, reusing the cached method and permutation while they are
    /// still valid.
    pub fn dispatch(
        &mut self,
        generic: &str,
        classes: &ClassVector,
        generic_args: &MatchedArguments,
        caller_env: &Env,
        def_env: Option<&Env>,
        evaluator: &mut dyn Evaluator,
        config: &CallConfig,
    ) -> CallResult<DispatchedCall> {
        let supplied = generic_args.to_supplied();
        let shape = CallShape::of(&supplied);

        if let Some(entry) = &self.entry {
            if entry.matches(generic, &shape, classes, def_env, config)
                && entry.target.trace.still_valid(caller_env, def_env, evaluator)
            {
                self.stats.hits += 1;
                tracing::trace!(generic, method = %entry.target.method_name, "dispatch cache hit");
                let arguments = entry.permutation.apply(
                    &entry.target.function,
                    flatten_supplied(&supplied),
                    caller_env,
                    evaluator,
                )?;
                let target = entry.target.clone();
                let context = DispatchContext::for_target(generic, &target, caller_env, def_env);
                return Ok(DispatchedCall {
                    target,
                    arguments,
                    context,
                });
            }
        }

        let replaced = self.entry.take().is_some();
        self.stats.misses += 1;
        if replaced {
            self.stats.respecializations += 1;
            tracing::debug!(generic, "re-specializing dispatch call site");
        }
        let target = resolve_generic(generic, classes, caller_env, def_env, evaluator, config)?;
        let flat = flatten_supplied(&supplied);
        let permutation = MatchPermutation::compute(&target.function, &flat, config)?;
        let arguments = permutation.apply(&target.function, flat, caller_env, evaluator)?;
        let context = DispatchContext::for_target(generic, &target, caller_env, def_env);
        self.entry = Some(DispatchSiteEntry {
            generic: generic.to_string(),
            shape,
            classes: classes.clone(),
            def_env: def_env.cloned(),
            config: *config,
            target: target.clone(),
            permutation,
        });
        Ok(DispatchedCall {
            target,
            arguments,
            context,
        })
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    pub fn is_populated(&self) -> bool {
        self.entry.is_some()
    }

    /// The cached method, if any.
    pub fn target(&self) -> Option<&DispatchTarget> {
        self.entry.as_ref().map(|e| &e.target)
    }

    pub fn invalidate(&mut self) {
        self.entry = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::Environment;
    use crate::error::CallError;
    use crate::expr::Expr;
    use crate::formals::FormalParameter;
    use crate::function::FunctionDef;
    use crate::value::Value;

    struct ConstEvaluator;

    impl Evaluator for ConstEvaluator {
        fn eval(&mut self, expr: &Expr, _env: &Env) -> CallResult<Value> {
            match expr {
                Expr::Constant(v) => Ok(v.clone()),
                other => Err(CallError::eval(format!("cannot evaluate {}", other))),
            }
        }
    }

    fn closure(env: &Env, name: &str, formals: Vec<FormalParameter>) -> Function {
        FunctionDef::closure(name, formals, Expr::Missing, env).unwrap()
    }

    #[test]
    fn test_same_shape_hits() {
        let global = Environment::root("global");
        let f = closure(
            &global,
            "f",
            vec![FormalParameter::required("a"), FormalParameter::required("b")],
        );
        let mut cache = CallSiteCache::new();
        let config = CallConfig::default();
        for v in 0..3i64 {
            let supplied = [
                SuppliedArg::named("b", Expr::constant(v)),
                SuppliedArg::positional(Expr::constant(v + 1)),
            ];
            cache
                .bind(&f, &supplied, &global, &mut ConstEvaluator, &config)
                .unwrap();
        }
        assert_eq!(
            cache.stats(),
            CacheStats {
                hits: 2,
                misses: 1,
                respecializations: 0
            }
        );
    }

    #[test]
    fn test_structurally_equal_callee_is_a_miss() {
        let global = Environment::root("global");
        let formals = || vec![FormalParameter::required("a")];
        let f = closure(&global, "f", formals());
        let g = closure(&global, "f", formals());
        let mut cache = CallSiteCache::new();
        let config = CallConfig::default();
        let supplied = [SuppliedArg::positional(Expr::constant(1i64))];

        cache.bind(&f, &supplied, &global, &mut ConstEvaluator, &config).unwrap();
        cache.bind(&g, &supplied, &global, &mut ConstEvaluator, &config).unwrap();
        assert_eq!(cache.stats().misses, 2);
        assert_eq!(cache.stats().respecializations, 1);
    }

    #[test]
    fn test_failed_resolution_leaves_cache_empty() {
        let global = Environment::root("global");
        let f = closure(&global, "f", vec![FormalParameter::required("a")]);
        let mut cache = CallSiteCache::new();
        let config = CallConfig::default();

        cache
            .bind(&f, &[SuppliedArg::positional(Expr::constant(1i64))], &global, &mut ConstEvaluator, &config)
            .unwrap();
        let err = cache
            .bind(
                &f,
                &[
                    SuppliedArg::positional(Expr::constant(1i64)),
                    SuppliedArg::positional(Expr::constant(2i64)),
                ],
                &global,
                &mut ConstEvaluator,
                &config,
            )
            .unwrap_err();
        assert!(err.is_argument_error());
        assert!(!cache.is_populated());
    }

    #[test]
    fn test_invalidate_forces_full_resolution() {
        let global = Environment::root("global");
        let f = closure(&global, "f", vec![FormalParameter::required("a")]);
        let mut cache = CallSiteCache::new();
        let config = CallConfig::default();
        let supplied = [SuppliedArg::positional(Expr::constant(1i64))];

        cache.bind(&f, &supplied, &global, &mut ConstEvaluator, &config).unwrap();
        cache.invalidate();
        assert!(!cache.is_populated());
        cache.bind(&f, &supplied, &global, &mut ConstEvaluator, &config).unwrap();
        assert_eq!(cache.stats().misses, 2);
        assert_eq!(cache.stats().respecializations, 0);
    }
}
