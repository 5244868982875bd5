//! Call resolution for a lazily evaluated R subset
//!
//! This crate binds call-site arguments to a callee's formals and resolves
//! generic calls to methods. It includes:
//!
//! - Argument matching by exact name, unique prefix and position, with rest
//!   collection and defaults
//! - Deferred argument values evaluated at most once
//! - `name.class` generic dispatch with `default` fallback and next-method
//!   chaining
//! - Per-call-site caches that reuse a resolution while it stays valid
//!
//! Expressions are evaluated by the host through the [`eval::Evaluator`]
//! trait; the crate never interprets function bodies itself.

#![deny(clippy::print_stderr)]

pub mod args;
pub mod cache;
pub mod call;
pub mod config;
pub mod dispatch;
pub mod env;
pub mod error;
pub mod eval;
pub mod expr;
pub mod formals;
pub mod function;
pub mod matcher;
pub mod promise;
pub mod value;

/// Prelude module for convenient imports
///
/// # Example
/// ```
/// use subset_r_calls::prelude::*;
/// ```
pub mod prelude {
    pub use super::args::{flatten_supplied, ArgsBundle, CallShape, Supplied, SuppliedArg};
    pub use super::cache::{CacheStats, CallSiteCache, DispatchSiteCache};
    pub use super::call::{bind_call, bind_call_with, supplied_from_call, BoundSlot, CallFrame, MatchedArguments};
    pub use super::config::CallConfig;
    pub use super::dispatch::{
        dispatch_generic, dispatch_next, resolve_generic, resolve_next, ClassVector,
        DispatchContext, DispatchTarget, DispatchedCall,
    };
    pub use super::env::{Env, Environment, Lookup};
    pub use super::error::{CallError, CallResult};
    pub use super::eval::Evaluator;
    pub use super::expr::{CallArg, Expr};
    pub use super::formals::{FormalParameter, FormalParameters};
    pub use super::function::{Function, FunctionDef};
    pub use super::matcher::{match_slots, MatchPermutation, SlotSource};
    pub use super::promise::{ArgValue, EvalPolicy, Promise};
    pub use super::value::Value;
}

pub use prelude::*;
