//! Generic dispatch
//!
//! A generic call `f(x, ...)` picks the method `f.<class>` for the first
//! class of `x` that has one, falling back to `f.default`. For each class the
//! caller's environment chain is searched before the generic's defining
//! chain, so a caller can shadow one method while other classes still fall
//! through to the generic's own.
//!
//! ## Debug Logging
//!
//! Set `SUBSET_R_DISPATCH_DEBUG=1` (or `dispatch_debug = true` in the
//! `[call]` table) to trace every candidate lookup.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

use std::rc::Rc;

use crate::args::SuppliedArg;
use crate::call::{bind_call_with, BoundSlot, CallFrame, MatchedArguments};
use crate::config::CallConfig;
use crate::env::Env;
use crate::error::{CallError, CallResult};
use crate::eval::Evaluator;
use crate::formals::FormalParameters;
use crate::function::Function;
use crate::value::Value;

/// Class name of the fallback method.
pub const DEFAULT_CLASS: &str = "default";

/// Dispatch classes, most specific first.
///
/// `previous` is set on a vector produced by dropping a prefix of another
/// one, and holds the full vector dispatch started from. It is carried
/// unchanged through further suffixes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct ClassVector {
    classes: Vec<String>,
    previous: Option<Vec<String>>,
}

impl ClassVector {
    pub fn new<I, S>(classes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            classes: classes.into_iter().map(Into::into).collect(),
            previous: None,
        }
    }

    /// Dispatch classes of a value.
    pub fn of(value: &Value) -> Self {
        Self::new(value.implicit_class())
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn previous(&self) -> Option<&[String]> {
        self.previous.as_deref()
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Classes from `start` on, remembering the original vector as
    /// `previous`.
    pub fn suffix(&self, start: usize) -> Self {
        Self {
            classes: self.classes.get(start..).unwrap_or_default().to_vec(),
            previous: Some(self.original().to_vec()),
        }
    }

    /// The vector dispatch started from.
    pub fn original(&self) -> &[String] {
        self.previous.as_deref().unwrap_or(&self.classes)
    }
}

/// Which environment chain a method lookup read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LookupScope {
    /// The environment the generic was called from
    Caller,
    /// The generic's defining environment
    Definition,
}

impl LookupScope {
    fn env<'a>(self, caller_env: &'a Env, def_env: Option<&'a Env>) -> Option<&'a Env> {
        match self {
            LookupScope::Caller => Some(caller_env),
            LookupScope::Definition => def_env,
        }
    }
}

/// Every binding read made while resolving a method: the names that were
/// not found and the one that was.
///
/// A resolution is still valid while re-reading the same names in the same
/// scopes gives the same answers, with the hit yielding the identical
/// function.
#[derive(Debug, Clone, Default)]
pub struct LookupTrace {
    misses: Vec<(String, LookupScope)>,
    hit: Option<(String, LookupScope, Function)>,
}

impl LookupTrace {
    pub fn misses(&self) -> &[(String, LookupScope)] {
        &self.misses
    }

    pub fn hit(&self) -> Option<(&str, LookupScope, &Function)> {
        self.hit
            .as_ref()
            .map(|(name, scope, f)| (name.as_str(), *scope, f))
    }

    /// Re-read every recorded binding. Lookup errors count as changes.
    pub fn still_valid(
        &self,
        caller_env: &Env,
        def_env: Option<&Env>,
        evaluator: &mut dyn Evaluator,
    ) -> bool {
        for (name, scope) in &self.misses {
            let Some(env) = scope.env(caller_env, def_env) else {
                return false;
            };
            match env.lookup_function(name, evaluator) {
                Ok(None) => {}
                Ok(Some(_)) | Err(_) => return false,
            }
        }
        match &self.hit {
            Some((name, scope, function)) => {
                let Some(env) = scope.env(caller_env, def_env) else {
                    return false;
                };
                matches!(
                    env.lookup_function(name, evaluator),
                    Ok(Some(found)) if Rc::ptr_eq(&found, function)
                )
            }
            None => true,
        }
    }
}

/// A resolved method.
#[derive(Debug, Clone)]
pub struct DispatchTarget {
    pub function: Function,
    /// Binding name the method was found under, e.g. `print.data.frame`
    pub method_name: String,
    /// Position in the searched class vector; `None` for the default method
    pub class_index: Option<usize>,
    /// Classes from the matched one on; empty for the default method
    pub classes: ClassVector,
    pub scope: LookupScope,
    pub trace: LookupTrace,
}

impl DispatchTarget {
    pub fn is_default(&self) -> bool {
        self.class_index.is_none()
    }

    /// Class vector a "next method" call resumes from.
    pub fn residual_classes(&self) -> &ClassVector {
        &self.classes
    }
}

/// Dispatch state recorded on a method's frame.
#[derive(Debug, Clone)]
pub struct DispatchContext {
    pub generic: String,
    /// Classes from the current method's class on
    pub classes: ClassVector,
    /// Environment the generic was called from
    pub call_env: Env,
    /// The generic's defining environment
    pub def_env: Option<Env>,
    pub is_default: bool,
}

impl DispatchContext {
    pub(crate) fn for_target(
        generic: &str,
        target: &DispatchTarget,
        call_env: &Env,
        def_env: Option<&Env>,
    ) -> Self {
        Self {
            generic: generic.to_string(),
            classes: target.classes.clone(),
            call_env: Rc::clone(call_env),
            def_env: def_env.cloned(),
            is_default: target.is_default(),
        }
    }
}

/// A resolved method with arguments re-matched against its formals.
#[derive(Debug)]
pub struct DispatchedCall {
    pub target: DispatchTarget,
    pub arguments: MatchedArguments,
    pub context: DispatchContext,
}

impl DispatchedCall {
    /// Enter the method, recording the dispatch context on its frame.
    pub fn enter(self) -> CallFrame {
        let DispatchedCall {
            target,
            arguments,
            context,
        } = self;
        let caller = Rc::clone(&context.call_env);
        arguments
            .enter_frame(&target.function, &caller)
            .with_dispatch(context)
    }
}

fn lookup_method(
    method_name: &str,
    caller_env: &Env,
    def_env: Option<&Env>,
    trace: &mut LookupTrace,
    evaluator: &mut dyn Evaluator,
    config: &CallConfig,
) -> CallResult<Option<(Function, LookupScope)>> {
    for scope in [LookupScope::Caller, LookupScope::Definition] {
        let Some(env) = scope.env(caller_env, def_env) else {
            continue;
        };
        let found = env.lookup_function(method_name, evaluator)?;
        if config.dispatch_debug {
            tracing::debug!(
                method = method_name,
                scope = ?scope,
                env = env.name(),
                found = found.is_some(),
                "dispatch candidate"
            );
        }
        match found {
            Some(function) => {
                trace.hit = Some((method_name.to_string(), scope, Rc::clone(&function)));
                return Ok(Some((function, scope)));
            }
            None => trace.misses.push((method_name.to_string(), scope)),
        }
    }
    Ok(None)
}

/// Resolve `generic` for `classes`.
///
/// Tries `generic.<class>` for each class in order and then
/// `generic.default`, each name first in `caller_env` and then in
/// `def_env`.
pub fn resolve_generic(
    generic: &str,
    classes: &ClassVector,
    caller_env: &Env,
    def_env: Option<&Env>,
    evaluator: &mut dyn Evaluator,
    config: &CallConfig,
) -> CallResult<DispatchTarget> {
    let mut trace = LookupTrace::default();
    let n = classes.len();
    for i in 0..=n {
        let class = classes
            .classes
            .get(i)
            .map(String::as_str)
            .unwrap_or(DEFAULT_CLASS);
        let method_name = format!("{}.{}", generic, class);
        let Some((function, scope)) =
            lookup_method(&method_name, caller_env, def_env, &mut trace, evaluator, config)?
        else {
            continue;
        };

        let (class_index, matched) = if i == n {
            (
                None,
                ClassVector {
                    classes: Vec::new(),
                    previous: Some(classes.original().to_vec()),
                },
            )
        } else if i == 0 {
            (Some(0), classes.clone())
        } else {
            (Some(i), classes.suffix(i))
        };
        tracing::debug!(
            generic,
            method = %method_name,
            scope = ?scope,
            "resolved generic call"
        );
        return Ok(DispatchTarget {
            function,
            method_name,
            class_index,
            classes: matched,
            scope,
            trace,
        });
    }
    Err(CallError::no_applicable_method(generic, classes.classes()))
}

/// Resolve `generic` and re-match the generic's arguments against the
/// chosen method's formals.
pub fn dispatch_generic(
    generic: &str,
    classes: &ClassVector,
    generic_args: &MatchedArguments,
    caller_env: &Env,
    def_env: Option<&Env>,
    evaluator: &mut dyn Evaluator,
    config: &CallConfig,
) -> CallResult<DispatchedCall> {
    let target = resolve_generic(generic, classes, caller_env, def_env, evaluator, config)?;
    let arguments = bind_call_with(
        &target.function,
        &generic_args.to_supplied(),
        caller_env,
        evaluator,
        config,
    )?;
    let context = DispatchContext::for_target(generic, &target, caller_env, def_env);
    Ok(DispatchedCall {
        target,
        arguments,
        context,
    })
}

/// Resolve the next applicable method after the one `context` describes.
pub fn resolve_next(
    context: &DispatchContext,
    evaluator: &mut dyn Evaluator,
    config: &CallConfig,
) -> CallResult<DispatchTarget> {
    if context.is_default {
        return Err(CallError::no_applicable_method(
            &context.generic,
            context.classes.previous().unwrap_or_default(),
        ));
    }
    resolve_generic(
        &context.generic,
        &context.classes.suffix(1),
        &context.call_env,
        context.def_env.as_ref(),
        evaluator,
        config,
    )
}

/// Call the next applicable method from inside `current`.
///
/// The current method's arguments are passed on. `overrides` replace them:
/// a named override replaces the argument of that name, and unnamed
/// overrides take the current method's remaining formals in order. The
/// merged list is re-matched against the next method.
pub fn dispatch_next(
    current: &CallFrame,
    overrides: &[SuppliedArg],
    evaluator: &mut dyn Evaluator,
    config: &CallConfig,
) -> CallResult<DispatchedCall> {
    let context = current
        .dispatch
        .as_ref()
        .ok_or_else(|| CallError::eval("NextMethod called from outside a method dispatch"))?;
    let target = resolve_next(context, evaluator, config)?;
    let supplied = merge_overrides(&current.arguments, overrides);
    let arguments = bind_call_with(&target.function, &supplied, &current.env, evaluator, config)?;
    let context = DispatchContext::for_target(
        &context.generic,
        &target,
        &context.call_env,
        context.def_env.as_ref(),
    );
    Ok(DispatchedCall {
        target,
        arguments,
        context,
    })
}

struct Inherited {
    formal: Option<usize>,
    arg: SuppliedArg,
}

impl Inherited {
    /// Whether a named override called `name` replaces this entry.
    fn answers_to(&self, name: &str, formals: &FormalParameters) -> bool {
        match self.arg.name.as_deref() {
            Some(own) => own == name,
            None => self.formal.and_then(|fi| formals.get(fi)).and_then(|f| f.name()) == Some(name),
        }
    }
}

/// Merge override arguments over a method's matched arguments.
///
/// Named overrides are placed first. Unnamed overrides then take, in order,
/// the formals before the rest formal that no named override claimed;
/// unnamed overrides beyond those are appended.
fn merge_overrides(inherited: &MatchedArguments, overrides: &[SuppliedArg]) -> Vec<SuppliedArg> {
    let formals = inherited.formals();
    let mut entries: Vec<Inherited> = Vec::new();
    for (i, slot) in inherited.slots().iter().enumerate() {
        match slot {
            BoundSlot::Supplied { name, value } => entries.push(Inherited {
                formal: Some(i),
                arg: SuppliedArg::from_arg_value(name.clone(), value.clone()),
            }),
            BoundSlot::Rest(bundle) => {
                for (name, value) in bundle.iter() {
                    entries.push(Inherited {
                        formal: None,
                        arg: SuppliedArg::from_arg_value(name.map(str::to_string), value.clone()),
                    });
                }
            }
            BoundSlot::Default(_) | BoundSlot::Missing => {}
        }
    }

    let positional_end = formals.rest_index().unwrap_or(formals.len());
    let mut claimed = vec![false; positional_end];
    for arg in overrides {
        let Some(name) = arg.name.as_deref() else { continue };
        if let Some(fi) = formals.position_of(name).filter(|&fi| fi < positional_end) {
            claimed[fi] = true;
        }
        match entries.iter_mut().find(|e| e.answers_to(name, formals)) {
            Some(entry) => entry.arg = arg.clone(),
            None => entries.push(Inherited {
                formal: None,
                arg: arg.clone(),
            }),
        }
    }

    let mut open = (0..positional_end).filter(|&fi| !claimed[fi]);
    for arg in overrides.iter().filter(|a| a.name.is_none()) {
        let formal = open
            .next()
            .and_then(|fi| formals.get(fi).and_then(|f| f.name()).map(|n| (fi, n)));
        match formal {
            Some((fi, fname)) => match entries.iter_mut().find(|e| e.formal == Some(fi)) {
                Some(entry) => entry.arg.value = arg.value.clone(),
                None => entries.push(Inherited {
                    formal: Some(fi),
                    arg: SuppliedArg {
                        name: Some(fname.to_string()),
                        value: arg.value.clone(),
                    },
                }),
            },
            None => entries.push(Inherited {
                formal: None,
                arg: arg.clone(),
            }),
        }
    }
    entries.into_iter().map(|e| e.arg).collect()
}
