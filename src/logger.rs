//! Structured logging facade.
//!
//! Wraps the `log` crate (already the teacher's chosen facade, exercised in
//! its own `debug_logging_test.rs`) with a thin `Logger` that attaches a
//! fixed component name to every line, so call sites don't repeat it. No
//! backend is bundled — integrators install `env_logger`, `fern`, or
//! whatever sink they already use; this crate only ever calls the facade
//! macros, never `println!`.

use std::fmt;

/// The five levels spec §6 lets `AgentConfig.logging` select between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
    Silent,
}

impl Default for LogLevel {
    fn default() -> Self {
        LogLevel::Info
    }
}

/// A small per-component wrapper over `log`'s global macros. Cheap to
/// clone (it's just a `String`); agents create one per subsystem
/// (`Logger::new("execution")`, `Logger::new("plugin-pipeline")`, …) so log
/// lines are easy to filter by component without a full tracing span
/// hierarchy.
#[derive(Debug, Clone)]
pub struct Logger {
    component: String,
    level: LogLevel,
}

impl Logger {
    pub fn new(component: impl Into<String>) -> Self {
        Logger {
            component: component.into(),
            level: LogLevel::default(),
        }
    }

    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    pub fn debug(&self, message: impl fmt::Display) {
        if self.level <= LogLevel::Debug {
            log::debug!("[{}] {}", self.component, message);
        }
    }

    pub fn info(&self, message: impl fmt::Display) {
        if self.level <= LogLevel::Info {
            log::info!("[{}] {}", self.component, message);
        }
    }

    pub fn warn(&self, message: impl fmt::Display) {
        if self.level <= LogLevel::Warn {
            log::warn!("[{}] {}", self.component, message);
        }
    }

    pub fn error(&self, message: impl fmt::Display) {
        if self.level <= LogLevel::Error {
            log::error!("[{}] {}", self.component, message);
        }
    }
}
