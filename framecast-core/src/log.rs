//! Injectable logging capability.
//!
//! Every component takes an `Arc<dyn Logger>` at construction instead of
//! reaching for a process-wide singleton. [`TracingLogger`] forwards to
//! `tracing`; [`NullLogger`] discards everything and is the default.

use std::fmt;
use std::sync::Arc;

/// Log severity, lowest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Level {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Warning => "WARNING",
            Level::Error => "ERROR",
            Level::Critical => "CRITICAL",
        };
        f.write_str(s)
    }
}

/// Logging sink shared by the engine's components.
pub trait Logger: Send + Sync {
    fn log(&self, level: Level, message: &str);

    fn debug(&self, message: &str) {
        self.log(Level::Debug, message);
    }

    fn info(&self, message: &str) {
        self.log(Level::Info, message);
    }

    fn warning(&self, message: &str) {
        self.log(Level::Warning, message);
    }

    fn error(&self, message: &str) {
        self.log(Level::Error, message);
    }

    fn critical(&self, message: &str) {
        self.log(Level::Critical, message);
    }
}

/// Shared logger handle.
pub type SharedLogger = Arc<dyn Logger>;

// ── NullLogger ───────────────────────────────────────────────────

/// Discards every message.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullLogger;

impl Logger for NullLogger {
    fn log(&self, _level: Level, _message: &str) {}
}

// ── TracingLogger ────────────────────────────────────────────────

/// Forwards messages to the `tracing` macros, tagged with a component
/// name so subscribers can filter per component.
#[derive(Debug, Clone)]
pub struct TracingLogger {
    component: &'static str,
}

impl TracingLogger {
    pub fn new(component: &'static str) -> Self {
        Self { component }
    }

    pub fn component(&self) -> &'static str {
        self.component
    }
}

impl Logger for TracingLogger {
    fn log(&self, level: Level, message: &str) {
        let component = self.component;
        match level {
            Level::Debug => tracing::debug!(component, "{message}"),
            Level::Info => tracing::info!(component, "{message}"),
            Level::Warning => tracing::warn!(component, "{message}"),
            Level::Error => tracing::error!(component, "{message}"),
            Level::Critical => tracing::error!(component, critical = true, "{message}"),
        }
    }
}

/// A logger that drops everything.
pub fn null() -> SharedLogger {
    Arc::new(NullLogger)
}

/// A `tracing`-backed logger for `component`.
pub fn tracing_logger(component: &'static str) -> SharedLogger {
    Arc::new(TracingLogger::new(component))
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;

    use super::*;

    /// Records messages so tests can assert on surfaced warnings.
    #[derive(Default)]
    pub struct RecordingLogger {
        pub entries: Mutex<Vec<(Level, String)>>,
    }

    impl RecordingLogger {
        pub fn count(&self, level: Level) -> usize {
            self.entries
                .lock()
                .map(|e| e.iter().filter(|(l, _)| *l == level).count())
                .unwrap_or(0)
        }
    }

    impl Logger for RecordingLogger {
        fn log(&self, level: Level, message: &str) {
            if let Ok(mut entries) = self.entries.lock() {
                entries.push((level, message.to_string()));
            }
        }
    }
}
