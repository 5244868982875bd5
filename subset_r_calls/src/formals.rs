//! Formal parameter lists.
//!
//! A [`FormalParameters`] list is immutable once built and shared between a
//! function and every cached match template that refers to it.

use std::collections::HashSet;

use crate::error::{CallError, CallResult};
use crate::expr::{Expr, DOTS};

/// One declared parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct FormalParameter {
    /// Parameter name; `None` only for unnamed native parameters
    pub name: Option<String>,
    /// Default value expression, evaluated lazily in the callee frame
    pub default: Option<Expr>,
    /// Whether this is the rest parameter `...`
    pub is_rest: bool,
}

impl FormalParameter {
    pub fn required<S: Into<String>>(name: S) -> Self {
        Self {
            name: Some(name.into()),
            default: None,
            is_rest: false,
        }
    }

    pub fn with_default<S: Into<String>>(name: S, default: Expr) -> Self {
        Self {
            name: Some(name.into()),
            default: Some(default),
            is_rest: false,
        }
    }

    /// The rest parameter `...`.
    pub fn rest() -> Self {
        Self {
            name: Some(DOTS.to_string()),
            default: None,
            is_rest: true,
        }
    }

    /// A parameter reachable only by position.
    pub fn unnamed() -> Self {
        Self {
            name: None,
            default: None,
            is_rest: false,
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Name used in diagnostics and frame bindings.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("")
    }
}

/// Ordered, validated list of formals.
#[derive(Debug, Clone, PartialEq)]
pub struct FormalParameters {
    params: Vec<FormalParameter>,
    rest_index: Option<usize>,
}

impl FormalParameters {
    /// Validate and build a formal list: at most one rest parameter and no
    /// duplicate names.
    pub fn new(params: Vec<FormalParameter>) -> CallResult<Self> {
        let mut rest_index = None;
        let mut seen = HashSet::new();
        for (i, param) in params.iter().enumerate() {
            if param.is_rest {
                if rest_index.is_some() {
                    return Err(CallError::invalid_formals(
                        "more than one rest parameter '...'",
                    ));
                }
                rest_index = Some(i);
            }
            if let Some(name) = &param.name {
                if !seen.insert(name.as_str()) {
                    return Err(CallError::invalid_formals(format!(
                        "repeated formal argument '{}'",
                        name
                    )));
                }
            }
        }
        Ok(Self { params, rest_index })
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&FormalParameter> {
        self.params.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FormalParameter> {
        self.params.iter()
    }

    /// Position of the rest parameter, if any.
    pub fn rest_index(&self) -> Option<usize> {
        self.rest_index
    }

    pub fn names(&self) -> Vec<Option<&str>> {
        self.params.iter().map(|p| p.name()).collect()
    }

    /// Position of the formal called `name`, the rest parameter included.
    pub fn position_of(&self, name: &str) -> Option<usize> {
        self.params.iter().position(|p| p.name() == Some(name))
    }

    /// Position of a formal an argument called `name` can match exactly.
    /// The rest parameter never matches by name.
    pub fn exact_position(&self, name: &str) -> Option<usize> {
        self.params
            .iter()
            .position(|p| !p.is_rest && p.name() == Some(name))
    }

    /// Formals a partial name may match: named, before the rest parameter.
    pub fn partial_candidates(&self) -> impl Iterator<Item = (usize, &str)> {
        let end = self.rest_index.unwrap_or(self.params.len());
        self.params[..end]
            .iter()
            .enumerate()
            .filter_map(|(i, p)| p.name().map(|n| (i, n)))
    }
}

impl Default for FormalParameters {
    fn default() -> Self {
        Self {
            params: Vec::new(),
            rest_index: None,
        }
    }
}
