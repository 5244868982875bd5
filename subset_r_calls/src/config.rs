//! Call-resolution configuration.
//!
//! Configuration lives in a `[call]` table:
//!
//! ```toml
//! [call]
//! partial_matching = true
//! dispatch_debug = false
//! ```
//!
//! Set `SUBSET_R_DISPATCH_DEBUG=1` to turn on per-candidate dispatch
//! tracing regardless of the file.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::error::{CallError, CallResult};

/// Environment variable enabling dispatch lookup tracing.
pub const DISPATCH_DEBUG_ENV: &str = "SUBSET_R_DISPATCH_DEBUG";

static DISPATCH_DEBUG: Lazy<bool> = Lazy::new(|| std::env::var(DISPATCH_DEBUG_ENV).is_ok());

static GLOBAL: Lazy<CallConfig> = Lazy::new(CallConfig::from_env);

/// Check if dispatch debug tracing is enabled via the environment.
pub fn dispatch_debug_enabled() -> bool {
    *DISPATCH_DEBUG
}

/// Knobs for argument matching and dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct CallConfig {
    /// Run the unique-prefix name pass after exact names
    pub partial_matching: bool,
    /// Emit a trace event for every dispatch candidate looked up
    pub dispatch_debug: bool,
}

impl Default for CallConfig {
    fn default() -> Self {
        Self {
            partial_matching: true,
            dispatch_debug: false,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    call: CallConfig,
}

impl CallConfig {
    /// Parse the `[call]` table of a TOML document. Missing keys keep
    /// their defaults.
    pub fn from_toml_str(text: &str) -> CallResult<Self> {
        let file: ConfigFile = toml::from_str(text).map_err(|e| CallError::Config {
            message: e.to_string(),
        })?;
        Ok(file.call)
    }

    /// Defaults with the environment switches applied.
    pub fn from_env() -> Self {
        Self::default().with_env()
    }

    /// Apply the environment switches on top of this configuration.
    pub fn with_env(mut self) -> Self {
        self.dispatch_debug |= dispatch_debug_enabled();
        self
    }

    /// Process-wide configuration used by the convenience entry points.
    pub fn global() -> &'static CallConfig {
        &GLOBAL
    }
}
