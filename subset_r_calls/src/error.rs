//! Error types for argument matching and generic dispatch
//!
//! Every variant here is a user-diagnosable language error: it propagates up
//! the call stack like any other condition raised by the evaluator. Internal
//! invariant violations are not represented here; they panic.

use thiserror::Error;

/// Call resolution error type
///
/// The display strings reproduce the diagnostics users see for the
/// corresponding condition.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CallError {
    /// A named supplied argument hit a formal that is already bound
    #[error("formal argument \"{formal}\" matched by multiple actual arguments")]
    MultipleMatch {
        /// Name of the formal matched twice
        formal: String,
    },

    /// A partial name is a prefix of more than one unbound formal
    #[error("argument {index} matches multiple formal arguments")]
    AmbiguousArgument {
        /// 1-based position of the supplied argument
        index: usize,
    },

    /// Exactly one supplied argument could not be bound
    #[error("unused argument ({arg})")]
    UnusedArgument {
        /// Source rendering of the leftover argument
        arg: String,
    },

    /// Several supplied arguments could not be bound
    #[error("unused arguments ({})", .args.join(", "))]
    UnusedArguments {
        /// Source rendering of every leftover argument, in call order
        args: Vec<String>,
    },

    /// Dispatch exhausted every class and the `default` method
    #[error("no applicable method for '{generic}' applied to an object of class \"{}\"", format_class_vector(.classes))]
    NoApplicableMethod {
        /// Generic function name
        generic: String,
        /// Class vector that was searched
        classes: Vec<String>,
    },

    /// A deferred value was re-entered while it was being forced
    #[error("promise already under evaluation: recursive default argument reference or earlier problems? ({expr})")]
    RecursiveDefault {
        /// Source rendering of the expression being forced
        expr: String,
    },

    /// A formal bound to the missing sentinel was read
    #[error("argument \"{name}\" is missing, with no default")]
    MissingArgument {
        /// Formal name
        name: String,
    },

    /// A name used in call position is not bound to a function
    #[error("could not find function \"{name}\"")]
    NotAFunction {
        /// Name looked up
        name: String,
    },

    /// A variable is not bound anywhere on the environment chain
    #[error("object '{name}' not found")]
    UndefinedVariable {
        /// Name looked up
        name: String,
    },

    /// A formal parameter list violates its construction rules
    #[error("invalid formal argument list: {reason}")]
    InvalidFormals {
        /// What is wrong with the list
        reason: String,
    },

    /// Configuration text could not be parsed
    #[error("invalid call configuration: {message}")]
    Config {
        /// Parser message
        message: String,
    },

    /// Error raised by the evaluator while forcing an argument
    #[error("{message}")]
    Eval {
        /// Evaluator message
        message: String,
    },
}

/// Render a class vector the way dispatch diagnostics print it: a single
/// class bare, several as `c('a', 'b')`.
pub fn format_class_vector(classes: &[String]) -> String {
    match classes {
        [single] => single.clone(),
        _ => format!(
            "c({})",
            classes
                .iter()
                .map(|c| format!("'{}'", c))
                .collect::<Vec<_>>()
                .join(", ")
        ),
    }
}

impl CallError {
    /// Create a multiple-match error
    pub fn multiple_match<S: Into<String>>(formal: S) -> Self {
        CallError::MultipleMatch {
            formal: formal.into(),
        }
    }

    /// Create an ambiguous-argument error from a 0-based supplied index
    pub fn ambiguous_argument(supplied_index: usize) -> Self {
        CallError::AmbiguousArgument {
            index: supplied_index + 1,
        }
    }

    /// Create the singular or plural unused-argument error for `args`
    pub fn unused_arguments(mut args: Vec<String>) -> Self {
        if args.len() == 1 {
            CallError::UnusedArgument {
                arg: args.remove(0),
            }
        } else {
            CallError::UnusedArguments { args }
        }
    }

    /// Create a no-applicable-method error
    pub fn no_applicable_method<S: Into<String>>(generic: S, classes: &[String]) -> Self {
        CallError::NoApplicableMethod {
            generic: generic.into(),
            classes: classes.to_vec(),
        }
    }

    /// Create a missing-argument error
    pub fn missing_argument<S: Into<String>>(name: S) -> Self {
        CallError::MissingArgument { name: name.into() }
    }

    /// Create an invalid-formals error
    pub fn invalid_formals<S: Into<String>>(reason: S) -> Self {
        CallError::InvalidFormals {
            reason: reason.into(),
        }
    }

    /// Create an evaluator error
    pub fn eval<S: Into<String>>(message: S) -> Self {
        CallError::Eval {
            message: message.into(),
        }
    }

    /// Whether this error comes out of argument matching
    pub fn is_argument_error(&self) -> bool {
        matches!(
            self,
            CallError::MultipleMatch { .. }
                | CallError::AmbiguousArgument { .. }
                | CallError::UnusedArgument { .. }
                | CallError::UnusedArguments { .. }
        )
    }
}

/// Result type alias for call resolution operations
pub type CallResult<T> = Result<T, CallError>;
