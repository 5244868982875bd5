//! Shared helpers for integration tests
// This helper module is consumed selectively by several integration test files.
// Keep these utilities available without forcing every helper to be referenced
// in each individual test target.
#![allow(dead_code)]

use std::collections::HashMap;
use std::rc::Rc;

use subset_r_calls::prelude::*;

/// Tiny reference interpreter driving the call core.
///
/// Understands constants, symbols and calls. Closure bodies are evaluated in
/// their frame; a handful of natives live in the base environment:
/// `{`, `list`, `paste`, `identity` and `tick` (counts its calls). `UseMethod`,
/// `NextMethod` and `missing` are handled as special forms.
pub struct TestEvaluator {
    pub config: CallConfig,
    /// Every `eval` invocation
    pub evaluations: usize,
    /// Calls of the `tick` native
    pub ticks: usize,
    /// Names of the closures entered, in order
    pub calls: Vec<String>,
    /// One dispatch cache per generic name, when enabled
    pub dispatch_caches: Option<HashMap<String, DispatchSiteCache>>,
    frames: Vec<Rc<CallFrame>>,
}

impl TestEvaluator {
    pub fn new() -> Self {
        Self {
            config: CallConfig::default(),
            evaluations: 0,
            ticks: 0,
            calls: Vec::new(),
            dispatch_caches: None,
            frames: Vec::new(),
        }
    }

    pub fn with_dispatch_cache(mut self) -> Self {
        self.dispatch_caches = Some(HashMap::new());
        self
    }

    /// Run an entered frame: evaluate a closure body or a native.
    pub fn invoke(&mut self, frame: CallFrame) -> CallResult<Value> {
        let frame = Rc::new(frame);
        match frame.function.body().cloned() {
            Some(body) => {
                self.calls.push(frame.function.name().to_string());
                self.frames.push(Rc::clone(&frame));
                let result = self.eval(&body, &frame.env);
                self.frames.pop();
                result
            }
            None => self.call_native(&frame),
        }
    }

    fn eval_call(&mut self, function: &Expr, args: &[CallArg], env: &Env) -> CallResult<Value> {
        let name = match function {
            Expr::Symbol(name) => name.as_str(),
            other => return Err(CallError::eval(format!("cannot call {}", other))),
        };
        match name {
            "UseMethod" => return self.use_method(args, env),
            "NextMethod" => return self.next_method(args, env),
            "missing" => return self.missing(args, env),
            _ => {}
        }
        let callee = env
            .lookup_function(name, self)?
            .ok_or_else(|| CallError::NotAFunction {
                name: name.to_string(),
            })?;
        let supplied = supplied_from_call(args, env)?;
        let config = self.config;
        let matched = bind_call_with(&callee, &supplied, env, self, &config)?;
        self.invoke(matched.enter_frame(&callee, env))
    }

    fn call_native(&mut self, frame: &CallFrame) -> CallResult<Value> {
        let rest = frame.arguments.rest().cloned().unwrap_or_default();
        let mut values = Vec::with_capacity(rest.len());
        for (_, value) in rest.iter() {
            values.push(value.force(self)?);
        }
        match frame.function.name() {
            "{" => Ok(values.pop().unwrap_or(Value::Null)),
            "list" => Ok(Value::Args(ArgsBundle::from_pairs(
                rest.iter()
                    .zip(values)
                    .map(|((name, _), v)| (name.map(str::to_string), ArgValue::Value(v))),
            ))),
            "paste" => Ok(Value::Str(
                values
                    .iter()
                    .map(|v| match v {
                        Value::Str(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .collect::<Vec<_>>()
                    .join(" "),
            )),
            "identity" => frame.arguments.value_of("x", self),
            "tick" => {
                self.ticks += 1;
                Ok(Value::Integer(self.ticks as i64))
            }
            other => Err(CallError::eval(format!("unknown native {}", other))),
        }
    }

    fn current_frame(&self, env: &Env) -> CallResult<Rc<CallFrame>> {
        self.frames
            .iter()
            .rev()
            .find(|f| Rc::ptr_eq(&f.env, env))
            .cloned()
            .ok_or_else(|| CallError::eval("called from outside a function"))
    }

    /// Value of the first formal of a generic's frame.
    fn dispatch_object(&mut self, frame: &CallFrame) -> CallResult<Value> {
        let first = frame
            .arguments
            .formals()
            .get(0)
            .ok_or_else(|| CallError::eval("generic has no argument to dispatch on"))?;
        if first.is_rest {
            let rest = frame.arguments.rest().cloned().unwrap_or_default();
            return match rest.get(0) {
                Some(value) => value.force(self),
                None => Ok(Value::Null),
            };
        }
        let name = first.display_name().to_string();
        frame.arguments.value_of(&name, self)
    }

    fn use_method(&mut self, args: &[CallArg], env: &Env) -> CallResult<Value> {
        let generic = match args.first().map(|a| &a.value) {
            Some(Expr::Constant(Value::Str(s))) => s.clone(),
            _ => return Err(CallError::eval("'UseMethod' needs a generic name")),
        };
        let frame = self.current_frame(env)?;
        let object = match args.get(1) {
            Some(arg) => self.eval(&arg.value, env)?,
            None => self.dispatch_object(&frame)?,
        };
        let classes = ClassVector::of(&object);
        let def_env = Rc::clone(frame.function.env());
        let config = self.config;

        let dispatched = match self.dispatch_caches.take() {
            Some(mut caches) => {
                let cache = caches.entry(generic.clone()).or_default();
                let result = cache.dispatch(
                    &generic,
                    &classes,
                    &frame.arguments,
                    &frame.caller,
                    Some(&def_env),
                    self,
                    &config,
                );
                self.dispatch_caches = Some(caches);
                result?
            }
            None => dispatch_generic(
                &generic,
                &classes,
                &frame.arguments,
                &frame.caller,
                Some(&def_env),
                self,
                &config,
            )?,
        };
        self.invoke(dispatched.enter())
    }

    fn next_method(&mut self, args: &[CallArg], env: &Env) -> CallResult<Value> {
        let frame = self.current_frame(env)?;
        let overrides = supplied_from_call(args, env)?;
        let config = self.config;
        let dispatched = dispatch_next(&frame, &overrides, self, &config)?;
        self.invoke(dispatched.enter())
    }

    fn missing(&mut self, args: &[CallArg], env: &Env) -> CallResult<Value> {
        let name = match args.first().map(|a| &a.value) {
            Some(Expr::Symbol(name)) => name,
            _ => return Err(CallError::eval("'missing' needs a symbol")),
        };
        let frame = self.current_frame(env)?;
        let missing = match frame.arguments.by_name(name) {
            Some(BoundSlot::Default(_)) => true,
            Some(slot) => slot.is_missing(),
            None => return Err(CallError::eval(format!("'missing' on non-argument {}", name))),
        };
        Ok(Value::Logical(missing))
    }
}

impl Default for TestEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl Evaluator for TestEvaluator {
    fn eval(&mut self, expr: &Expr, env: &Env) -> CallResult<Value> {
        self.evaluations += 1;
        match expr {
            Expr::Constant(v) => Ok(v.clone()),
            Expr::Missing => Ok(Value::Missing),
            Expr::Symbol(name) => {
                let value = match env.lookup(name) {
                    Lookup::NotFound => {
                        return Err(CallError::UndefinedVariable { name: name.clone() })
                    }
                    Lookup::Value(v) => v,
                    Lookup::Deferred(promise) => promise.force(self)?,
                };
                if value.is_missing() {
                    return Err(CallError::missing_argument(name.as_str()));
                }
                Ok(value)
            }
            Expr::Call { function, args } => self.eval_call(function, args, env),
        }
    }
}

/// Base and global environments plus an evaluator.
pub struct Session {
    pub base: Env,
    pub global: Env,
    pub ev: TestEvaluator,
}

impl Session {
    pub fn new() -> Self {
        Self::with_evaluator(TestEvaluator::new())
    }

    pub fn with_evaluator(ev: TestEvaluator) -> Self {
        let base = Environment::root("base");
        for (name, formals, eager) in [
            ("{", vec![FormalParameter::rest()], vec![true]),
            ("list", vec![FormalParameter::rest()], vec![true]),
            ("paste", vec![FormalParameter::rest()], vec![true]),
            ("identity", vec![FormalParameter::required("x")], vec![true]),
            ("tick", vec![], vec![]),
        ] {
            let f = FunctionDef::native(name, formals, eager, &base).unwrap();
            base.define(name, Value::Function(f));
        }
        let global = Environment::new_child(&base, "global");
        Self { base, global, ev }
    }

    /// Define a closure in the global environment.
    pub fn define(&self, name: &str, formals: Vec<FormalParameter>, body: Expr) -> Function {
        define_in(&self.global, name, formals, body)
    }

    /// Evaluate in the global environment.
    pub fn run(&mut self, expr: Expr) -> CallResult<Value> {
        let global = Rc::clone(&self.global);
        self.ev.eval(&expr, &global)
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

/// Define a closure in `env` and bind it there.
pub fn define_in(env: &Env, name: &str, formals: Vec<FormalParameter>, body: Expr) -> Function {
    let f = FunctionDef::closure(name, formals, body, env).unwrap();
    env.define(name, Value::Function(Rc::clone(&f)));
    f
}

pub fn sym(name: &str) -> Expr {
    Expr::symbol(name)
}

pub fn int(v: i64) -> Expr {
    Expr::constant(v)
}

pub fn text(s: &str) -> Expr {
    Expr::constant(s)
}

pub fn call(name: &str, args: Vec<CallArg>) -> Expr {
    Expr::call(name, args)
}

pub fn pos(value: Expr) -> CallArg {
    CallArg::positional(value)
}

pub fn named(name: &str, value: Expr) -> CallArg {
    CallArg::named(name, value)
}

pub fn dots() -> CallArg {
    CallArg::dots()
}

/// `{ e1; e2; ... }`
pub fn block(exprs: Vec<Expr>) -> Expr {
    call("{", exprs.into_iter().map(pos).collect())
}

pub fn req(name: &str) -> FormalParameter {
    FormalParameter::required(name)
}

pub fn opt(name: &str, default: Expr) -> FormalParameter {
    FormalParameter::with_default(name, default)
}

pub fn rest() -> FormalParameter {
    FormalParameter::rest()
}

/// An object carrying the class attribute `classes`.
pub fn object(classes: &[&str]) -> Expr {
    Expr::Constant(Value::with_class(Value::Null, classes.iter().copied()))
}

/// Render a value, showing bundles as `list(name = value, ...)`.
pub fn show(value: &Value) -> String {
    match value {
        Value::Args(bundle) => {
            let items: Vec<String> = bundle
                .iter()
                .map(|(name, v)| {
                    let v = match v {
                        ArgValue::Value(v) => show(v),
                        ArgValue::Promise(p) => format!("<promise {}>", p.expr()),
                    };
                    match name {
                        Some(n) => format!("{} = {}", n, v),
                        None => v,
                    }
                })
                .collect();
            format!("list({})", items.join(", "))
        }
        other => other.to_string(),
    }
}
