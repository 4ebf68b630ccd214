//! # Error Types for the Agent Runtime Core
//!
//! This module defines every error the runtime can produce, with enough
//! context attached for a caller (or a plugin's `onError` hook) to decide
//! whether to retry, surface the failure to a user, or self-correct.
//!
//! ## Design Philosophy
//!
//! - **Explicit Error Handling**: every fallible operation returns `Result<T>`
//! - **No Silent Failures**: errors are propagated explicitly, never logged-and-swallowed
//!   except where the propagation policy in `execution` explicitly calls for isolation
//! - **Rich Context**: each variant carries a `context` bag of arbitrary JSON values
//! - **Easy Conversion**: `#[from]` for the handful of upstream error types this crate
//!   actually produces on its own (JSON parsing of tool arguments)
//!
//! ## Usage
//!
//! ```
//! use agent_runtime_core::{Error, Result};
//!
//! fn example() -> Result<()> {
//!     if false {
//!         return Err(Error::configuration("aiProviders must not be empty"));
//!     }
//!     Ok(())
//! }
//! ```

use std::collections::HashMap;
use thiserror::Error;

/// Type alias for `Result<T, Error>` used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// A bag of structured context attached to an [`Error`].
///
/// Values are arbitrary JSON so callers can attach tool names, provider
/// names, durations, or nested data without the error type needing to know
/// about every caller's bookkeeping needs in advance.
pub type ErrorContext = HashMap<String, serde_json::Value>;

/// Comprehensive error type covering every failure mode described by the
/// error taxonomy: configuration, validation, tool execution, provider,
/// plugin, module, and cancellation errors.
///
/// Each variant stores a `message`, and a `context` map. Use the convenience
/// constructors (`Error::configuration`, `Error::tool_execution`, …) rather
/// than the enum variants directly — they make `context` easy to build
/// incrementally with `.with_context(...)`.
#[derive(Error, Debug)]
pub enum Error {
    /// Construction or validation failure: missing `name`, empty `aiProviders`,
    /// missing `defaultModel`, duplicate provider names, or `defaultModel.provider`
    /// absent from the registered providers. Also raised by `Module` registration
    /// when a dependency cycle is detected.
    #[error("configuration error: {message}")]
    Configuration {
        message: String,
        context: ErrorContext,
    },

    /// Tool parameter or input validation failure: missing required key, type
    /// mismatch, unknown key in strict mode, or a failed `enum` constraint.
    #[error("validation error: {message}")]
    Validation {
        message: String,
        context: ErrorContext,
    },

    /// A tool was missing, not allow-listed, rejected by the validator, or threw
    /// while executing. Carries the tool name in `context["toolName"]`.
    #[error("tool execution error ({tool_name}): {message}")]
    ToolExecution {
        tool_name: String,
        message: String,
        context: ErrorContext,
    },

    /// The active provider's transport or protocol failed. Aborts the current
    /// turn; history rolls forward only for messages appended before the call.
    #[error("provider error ({provider_name}): {message}")]
    Provider {
        provider_name: String,
        message: String,
        context: ErrorContext,
    },

    /// A plugin hook failed. Non-fatal by policy: the pipeline logs it, counts
    /// it against the plugin, and never re-throws it into the turn.
    #[error("plugin error ({plugin_name}): {message}")]
    Plugin {
        plugin_name: String,
        message: String,
        context: ErrorContext,
    },

    /// A module failed during `initialize`, `execute`, or `dispose`.
    #[error("module error ({module_name}): {message}")]
    Module {
        module_name: String,
        message: String,
        context: ErrorContext,
    },

    /// The caller cancelled the turn via its cancellation signal.
    #[error("turn cancelled: {message}")]
    Cancellation {
        message: String,
        context: ErrorContext,
    },

    /// A tool's `argumentsJSON` (or any other JSON this crate parses) failed
    /// to parse. Automatically convertible via `?` from `serde_json::Error`.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a configuration error with no extra context.
    pub fn configuration(message: impl Into<String>) -> Self {
        Error::Configuration {
            message: message.into(),
            context: ErrorContext::new(),
        }
    }

    /// Create a validation error with no extra context.
    pub fn validation(message: impl Into<String>) -> Self {
        Error::Validation {
            message: message.into(),
            context: ErrorContext::new(),
        }
    }

    /// Create a tool execution error for the named tool.
    pub fn tool_execution(tool_name: impl Into<String>, message: impl Into<String>) -> Self {
        Error::ToolExecution {
            tool_name: tool_name.into(),
            message: message.into(),
            context: ErrorContext::new(),
        }
    }

    /// Create a provider error for the named provider.
    pub fn provider(provider_name: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Provider {
            provider_name: provider_name.into(),
            message: message.into(),
            context: ErrorContext::new(),
        }
    }

    /// Create a plugin error for the named plugin.
    pub fn plugin(plugin_name: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Plugin {
            plugin_name: plugin_name.into(),
            message: message.into(),
            context: ErrorContext::new(),
        }
    }

    /// Create a module error for the named module.
    pub fn module(module_name: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Module {
            module_name: module_name.into(),
            message: message.into(),
            context: ErrorContext::new(),
        }
    }

    /// Create a cancellation error.
    pub fn cancellation(message: impl Into<String>) -> Self {
        Error::Cancellation {
            message: message.into(),
            context: ErrorContext::new(),
        }
    }

    /// Attach a single context key/value, building incrementally. A no-op on
    /// the `Json` variant, which has no context slot of its own.
    ///
    /// ```
    /// use agent_runtime_core::Error;
    /// let err = Error::tool_execution("add", "missing parameter")
    ///     .with_context("argumentsJSON", serde_json::json!("{\"a\":1}"));
    /// assert!(matches!(err, Error::ToolExecution { .. }));
    /// ```
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        if let Some(ctx) = self.context_mut() {
            ctx.insert(key.into(), value.into());
        }
        self
    }

    fn context_mut(&mut self) -> Option<&mut ErrorContext> {
        match self {
            Error::Configuration { context, .. }
            | Error::Validation { context, .. }
            | Error::ToolExecution { context, .. }
            | Error::Provider { context, .. }
            | Error::Plugin { context, .. }
            | Error::Module { context, .. }
            | Error::Cancellation { context, .. } => Some(context),
            Error::Json(_) => None,
        }
    }

    /// The error kind as a short machine-readable tag, useful for metrics or
    /// `onError` hook dispatch without matching on the full enum.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Configuration { .. } => "ConfigurationError",
            Error::Validation { .. } => "ValidationError",
            Error::ToolExecution { .. } => "ToolExecutionError",
            Error::Provider { .. } => "ProviderError",
            Error::Plugin { .. } => "PluginError",
            Error::Module { .. } => "ModuleError",
            Error::Cancellation { .. } => "CancellationError",
            Error::Json(_) => "ValidationError",
        }
    }

    /// Whether this error, per the propagation policy, aborts the
    /// current turn rather than being recorded and continued past.
    pub fn aborts_turn(&self) -> bool {
        matches!(
            self,
            Error::Configuration { .. } | Error::Provider { .. } | Error::Cancellation { .. }
        )
    }
}
