//! Lexical environments.
//!
//! Environments are reference-counted scopes with a parent link. Method
//! lookup for dispatch walks these chains; cached resolutions are
//! re-validated by re-reading bindings and comparing function identity, so
//! environments carry no listener or version state.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::error::CallResult;
use crate::eval::Evaluator;
use crate::function::Function;
use crate::promise::Promise;
use crate::value::Value;

/// Shared handle to an environment.
pub type Env = Rc<Environment>;

/// What a name is bound to inside one environment.
#[derive(Debug, Clone)]
pub enum Binding {
    Value(Value),
    Deferred(Rc<Promise>),
}

/// Result of looking a name up along an environment chain.
#[derive(Debug, Clone)]
pub enum Lookup {
    NotFound,
    Value(Value),
    Deferred(Rc<Promise>),
}

pub struct Environment {
    name: String,
    bindings: RefCell<HashMap<String, Binding>>,
    parent: Option<Env>,
}

impl Environment {
    /// A root environment with no parent.
    pub fn root<S: Into<String>>(name: S) -> Env {
        Rc::new(Self {
            name: name.into(),
            bindings: RefCell::new(HashMap::new()),
            parent: None,
        })
    }

    /// A fresh scope enclosed by `parent`.
    pub fn new_child<S: Into<String>>(parent: &Env, name: S) -> Env {
        Rc::new(Self {
            name: name.into(),
            bindings: RefCell::new(HashMap::new()),
            parent: Some(Rc::clone(parent)),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Bind (or rebind) `name` to a value in this scope.
    pub fn define<S: Into<String>>(&self, name: S, value: Value) {
        self.bindings
            .borrow_mut()
            .insert(name.into(), Binding::Value(value));
    }

    /// Bind `name` to a deferred value in this scope.
    pub fn define_deferred<S: Into<String>>(&self, name: S, promise: Rc<Promise>) {
        self.bindings
            .borrow_mut()
            .insert(name.into(), Binding::Deferred(promise));
    }

    /// Remove a binding from this scope only.
    pub fn remove(&self, name: &str) -> Option<Binding> {
        self.bindings.borrow_mut().remove(name)
    }

    pub fn get_local(&self, name: &str) -> Option<Binding> {
        self.bindings.borrow().get(name).cloned()
    }

    /// Names bound in this scope, sorted.
    pub fn local_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.bindings.borrow().keys().cloned().collect();
        names.sort();
        names
    }

    /// Walk the chain from this scope outwards and return the first binding.
    pub fn lookup(&self, name: &str) -> Lookup {
        let mut current = Some(self);
        while let Some(env) = current {
            if let Some(binding) = env.get_local(name) {
                return match binding {
                    Binding::Value(v) => Lookup::Value(v),
                    Binding::Deferred(p) => Lookup::Deferred(p),
                };
            }
            current = env.parent.as_deref();
        }
        Lookup::NotFound
    }

    /// Function lookup: walk the chain skipping bindings that are not
    /// functions. Deferred bindings are forced to find out what they hold.
    pub fn lookup_function(
        &self,
        name: &str,
        evaluator: &mut dyn Evaluator,
    ) -> CallResult<Option<Function>> {
        let mut current = Some(self);
        while let Some(env) = current {
            match env.get_local(name) {
                Some(Binding::Value(Value::Function(f))) => return Ok(Some(f)),
                Some(Binding::Deferred(promise)) => {
                    if let Value::Function(f) = promise.force(evaluator)? {
                        return Ok(Some(f));
                    }
                }
                _ => {}
            }
            current = env.parent.as_deref();
        }
        Ok(None)
    }

    /// Whether `other` is this environment or one of its ancestors.
    pub fn is_within(&self, other: &Env) -> bool {
        let mut current = Some(self);
        while let Some(env) = current {
            if std::ptr::eq(env, Rc::as_ptr(other)) {
                return true;
            }
            current = env.parent.as_deref();
        }
        false
    }
}

// Bindings can hold closures whose environment is this one, so Debug only
// prints names to stay finite.
impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Environment")
            .field("name", &self.name)
            .field("bindings", &self.local_names())
            .field("parent", &self.parent.as_ref().map(|p| p.name.clone()))
            .finish()
    }
}
