//! Supplied arguments, rest bundles and call shapes.
//!
//! A call site hands the matcher a list of [`SuppliedArg`]s. Some of them
//! are rest expansions (`f(...)` forwarding the caller's `...`), which are
//! spliced in place by [`flatten_supplied`] before matching, keeping every
//! element's name.

use std::rc::Rc;

use crate::expr::Expr;
use crate::promise::{ArgValue, Promise};
use crate::value::Value;

/// The value side of a supplied argument.
#[derive(Debug, Clone)]
pub enum Supplied {
    /// Unevaluated expression, deferred in the caller's environment
    Expr(Expr),
    /// Already evaluated value
    Value(Value),
    /// Deferred value created by an earlier match, forwarded as is
    Promise(Rc<Promise>),
    /// A collected rest bundle to splice in place
    Expand(ArgsBundle),
}

/// One argument at a call site.
#[derive(Debug, Clone)]
pub struct SuppliedArg {
    /// Name given at the call site; ignored for [`Supplied::Expand`]
    pub name: Option<String>,
    pub value: Supplied,
}

impl SuppliedArg {
    pub fn positional(expr: Expr) -> Self {
        Self {
            name: None,
            value: Supplied::Expr(expr),
        }
    }

    pub fn named<S: Into<String>>(name: S, expr: Expr) -> Self {
        Self {
            name: Some(name.into()),
            value: Supplied::Expr(expr),
        }
    }

    pub fn value(value: Value) -> Self {
        Self {
            name: None,
            value: Supplied::Value(value),
        }
    }

    pub fn named_value<S: Into<String>>(name: S, value: Value) -> Self {
        Self {
            name: Some(name.into()),
            value: Supplied::Value(value),
        }
    }

    pub fn promise(name: Option<String>, promise: Rc<Promise>) -> Self {
        Self {
            name,
            value: Supplied::Promise(promise),
        }
    }

    pub fn expand(bundle: ArgsBundle) -> Self {
        Self {
            name: None,
            value: Supplied::Expand(bundle),
        }
    }

    /// A supplied argument carrying an already matched value.
    pub fn from_arg_value(name: Option<String>, value: ArgValue) -> Self {
        match value {
            ArgValue::Value(v) => Self {
                name,
                value: Supplied::Value(v),
            },
            ArgValue::Promise(p) => Self::promise(name, p),
        }
    }
}

/// Collected rest arguments: the value of `...` inside a callee.
///
/// `names` is `None` when no element was ever named. Otherwise it has one
/// entry per value and `""` marks an element that was explicitly unnamed.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ArgsBundle {
    values: Vec<ArgValue>,
    names: Option<Vec<String>>,
}

impl ArgsBundle {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a bundle from `(name, value)` pairs in order.
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (Option<String>, ArgValue)>,
    {
        let mut values = Vec::new();
        let mut names = Vec::new();
        let mut any_named = false;
        for (name, value) in pairs {
            any_named |= name.is_some();
            names.push(name.unwrap_or_default());
            values.push(value);
        }
        Self {
            values,
            names: any_named.then_some(names),
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[ArgValue] {
        &self.values
    }

    /// Raw name slots, `None` if the bundle never had names.
    pub fn names(&self) -> Option<&[String]> {
        self.names.as_deref()
    }

    /// Name of element `index`; the empty-name marker reads as `None`.
    pub fn name(&self, index: usize) -> Option<&str> {
        self.names
            .as_ref()
            .and_then(|names| names.get(index))
            .map(String::as_str)
            .filter(|n| !n.is_empty())
    }

    pub fn get(&self, index: usize) -> Option<&ArgValue> {
        self.values.get(index)
    }

    /// Elements with their names, in order.
    pub fn iter(&self) -> impl Iterator<Item = (Option<&str>, &ArgValue)> + '_ {
        self.values
            .iter()
            .enumerate()
            .map(move |(i, v)| (self.name(i), v))
    }

    pub fn signature(&self) -> ArgumentsSignature {
        ArgumentsSignature {
            names: (0..self.len())
                .map(|i| self.name(i).map(str::to_string))
                .collect(),
        }
    }
}

/// Value of a flattened argument.
#[derive(Debug, Clone)]
pub enum ArgSource {
    Expr(Expr),
    Value(Value),
    Promise(Rc<Promise>),
}

impl ArgSource {
    fn describe(&self) -> String {
        match self {
            ArgSource::Expr(e) => e.to_string(),
            ArgSource::Value(v) => v.to_string(),
            ArgSource::Promise(p) => p.expr().to_string(),
        }
    }
}

impl From<ArgValue> for ArgSource {
    fn from(value: ArgValue) -> Self {
        match value {
            ArgValue::Value(v) => ArgSource::Value(v),
            ArgValue::Promise(p) => ArgSource::Promise(p),
        }
    }
}

/// One matcher input after rest expansions are spliced.
#[derive(Debug, Clone)]
pub enum FlatArg {
    Arg { name: Option<String>, value: ArgSource },
    /// An expansion of an empty rest bundle: binds nothing, never unused
    Placeholder,
}

impl FlatArg {
    /// Name used for matching. Empty names count as unnamed.
    pub fn name(&self) -> Option<&str> {
        match self {
            FlatArg::Arg { name, .. } => name.as_deref().filter(|n| !n.is_empty()),
            FlatArg::Placeholder => None,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self, FlatArg::Placeholder)
    }

    /// Rendering used by unused-argument diagnostics.
    pub fn describe(&self) -> String {
        match self {
            FlatArg::Arg { value, .. } => match self.name() {
                Some(name) => format!("{} = {}", name, value.describe()),
                None => value.describe(),
            },
            FlatArg::Placeholder => "...".to_string(),
        }
    }
}

/// Splice every rest expansion into the supplied list, keeping names and
/// order. An empty expansion leaves a [`FlatArg::Placeholder`].
pub fn flatten_supplied(supplied: &[SuppliedArg]) -> Vec<FlatArg> {
    let mut flat = Vec::with_capacity(supplied.len());
    for arg in supplied {
        match &arg.value {
            Supplied::Expand(bundle) if bundle.is_empty() => flat.push(FlatArg::Placeholder),
            Supplied::Expand(bundle) => {
                for (name, value) in bundle.iter() {
                    flat.push(FlatArg::Arg {
                        name: name.map(str::to_string),
                        value: value.clone().into(),
                    });
                }
            }
            Supplied::Expr(e) => flat.push(FlatArg::Arg {
                name: arg.name.clone(),
                value: ArgSource::Expr(e.clone()),
            }),
            Supplied::Value(v) => flat.push(FlatArg::Arg {
                name: arg.name.clone(),
                value: ArgSource::Value(v.clone()),
            }),
            Supplied::Promise(p) => flat.push(FlatArg::Arg {
                name: arg.name.clone(),
                value: ArgSource::Promise(Rc::clone(p)),
            }),
        }
    }
    flat
}

/// Names of a sequence of arguments, in order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct ArgumentsSignature {
    pub names: Vec<Option<String>>,
}

impl ArgumentsSignature {
    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// One position of a call shape.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ShapeEntry {
    /// Ordinary argument with its call-site name
    Arg(Option<String>),
    /// Rest expansion with the signature of the spliced bundle
    Expand(ArgumentsSignature),
}

/// Shape of a call: argument count, names and rest-expansion descriptors.
///
/// Two calls with equal shapes flatten to argument lists with equal names at
/// equal positions, so they match to the same permutation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct CallShape {
    pub entries: Vec<ShapeEntry>,
}

impl CallShape {
    pub fn of(supplied: &[SuppliedArg]) -> Self {
        let entries = supplied
            .iter()
            .map(|arg| match &arg.value {
                Supplied::Expand(bundle) => ShapeEntry::Expand(bundle.signature()),
                _ => ShapeEntry::Arg(arg.name.clone()),
            })
            .collect();
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn has_expansion(&self) -> bool {
        self.entries
            .iter()
            .any(|e| matches!(e, ShapeEntry::Expand(_)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn bundle(pairs: &[(Option<&str>, i64)]) -> ArgsBundle {
        ArgsBundle::from_pairs(
            pairs
                .iter()
                .map(|(n, v)| (n.map(str::to_string), ArgValue::Value(Value::Integer(*v)))),
        )
    }

    #[test]
    fn test_bundle_without_names_has_no_name_slots() {
        let b = bundle(&[(None, 1), (None, 2)]);
        assert_eq!(b.names(), None);
        assert_eq!(b.name(0), None);
    }

    #[test]
    fn test_bundle_marks_unnamed_with_empty_string() {
        let b = bundle(&[(Some("y"), 2), (None, 3)]);
        assert_eq!(b.names(), Some(&["y".to_string(), String::new()][..]));
        assert_eq!(b.name(0), Some("y"));
        assert_eq!(b.name(1), None);
    }

    #[test]
    fn test_flatten_splices_in_place() {
        let supplied = vec![
            SuppliedArg::positional(Expr::symbol("a")),
            SuppliedArg::expand(bundle(&[(Some("y"), 2), (None, 3)])),
            SuppliedArg::named("z", Expr::symbol("b")),
        ];
        let flat = flatten_supplied(&supplied);
        let names: Vec<_> = flat.iter().map(|a| a.name()).collect();
        assert_eq!(names, vec![None, Some("y"), None, Some("z")]);
        let rendered: Vec<_> = flat.iter().map(FlatArg::describe).collect();
        assert_eq!(rendered, vec!["a", "y = 2L", "3L", "z = b"]);
    }

    #[test]
    fn test_empty_expansion_is_placeholder() {
        let flat = flatten_supplied(&[SuppliedArg::expand(ArgsBundle::empty())]);
        assert_eq!(flat.len(), 1);
        assert!(flat[0].is_placeholder());
    }

    #[test]
    fn test_shape_distinguishes_expansion_signatures() {
        let a = CallShape::of(&[SuppliedArg::expand(bundle(&[(Some("y"), 1)]))]);
        let b = CallShape::of(&[SuppliedArg::expand(bundle(&[(None, 1)]))]);
        let c = CallShape::of(&[SuppliedArg::expand(bundle(&[(Some("y"), 7)]))]);
        assert_ne!(a, b);
        assert_eq!(a, c);
        assert!(a.has_expansion());
    }
}
