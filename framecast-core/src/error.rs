//! Domain-specific error types for framecast.
//!
//! Configuration-time and per-frame failures are typed and returned to
//! the caller; nothing in the engine panics on bad input.

use std::io;

use thiserror::Error;

// ── PipelineError ────────────────────────────────────────────────

/// Result alias for every [`Pipeline`](crate::pipeline::Pipeline) operation.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Failure of a pipeline operation.
///
/// `Ok(_)` plays the role of the `Success` code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineError {
    /// An index was outside `[0, size)`.
    #[error("index {index} out of range (pipeline has {size} filters)")]
    IndexOutOfRange { index: usize, size: usize },

    /// The operation needs at least one filter.
    #[error("pipeline is empty")]
    EmptyPipeline,

    /// A filter faulted or produced an empty frame.
    #[error("filter '{name}' failed: {reason}")]
    InvalidFilter { name: String, reason: String },

    /// The frame handed to `process` was empty.
    #[error("input frame is empty")]
    InvalidInput,

    /// The filter list lock was poisoned.
    #[error("failed to acquire pipeline lock")]
    ThreadLockFailed,
}

/// Coarse classification for request-facing layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// The caller asked for something invalid.
    ClientError,
    /// The requested thing does not exist.
    NotFound,
    /// The engine itself is in a bad state.
    Internal,
}

impl Severity {
    /// HTTP status code equivalent.
    pub const fn http_status(self) -> u16 {
        match self {
            Severity::ClientError => 400,
            Severity::NotFound => 404,
            Severity::Internal => 500,
        }
    }
}

impl PipelineError {
    /// Severity class of this error.
    pub fn severity(&self) -> Severity {
        match self {
            PipelineError::IndexOutOfRange { .. }
            | PipelineError::InvalidFilter { .. }
            | PipelineError::InvalidInput => Severity::ClientError,
            PipelineError::EmptyPipeline => Severity::NotFound,
            PipelineError::ThreadLockFailed => Severity::Internal,
        }
    }

    /// Short name of the error kind, stable across message changes.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::IndexOutOfRange { .. } => "IndexOutOfRange",
            PipelineError::EmptyPipeline => "EmptyPipeline",
            PipelineError::InvalidFilter { .. } => "InvalidFilter",
            PipelineError::InvalidInput => "InvalidInput",
            PipelineError::ThreadLockFailed => "ThreadLockFailed",
        }
    }
}

// ── FilterError ──────────────────────────────────────────────────

/// Failure reported by a single filter's `apply`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterError {
    /// The filter cannot handle this pixel layout.
    #[error("unsupported pixel format: {0}")]
    UnsupportedFormat(String),

    /// The filter produced an empty frame.
    #[error("filter produced an empty frame")]
    EmptyOutput,

    /// The filter's state lock was poisoned by an earlier panic.
    #[error("filter state is poisoned")]
    Poisoned,

    /// Implementation-specific failure.
    #[error("{0}")]
    Failed(String),

    /// The filter panicked while processing.
    #[error("filter panicked: {0}")]
    Panicked(String),
}

// ── ParameterError ───────────────────────────────────────────────

/// Structured rejection of a `set_parameter` call.
///
/// The prior value is always retained when this is returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParameterError {
    #[error("unknown parameter '{name}' for filter '{filter}'")]
    Unknown { filter: String, name: String },

    #[error("parameter '{name}' expects {expected}")]
    InvalidType { name: String, expected: &'static str },

    #[error("parameter '{name}' out of range: {value}")]
    OutOfRange { name: String, value: String },

    #[error("invalid lookup table: {0}")]
    InvalidTable(String),

    #[error("filter state is poisoned")]
    Poisoned,
}

// ── SourceError ──────────────────────────────────────────────────

/// Failure of a [`FrameSource`](crate::source::FrameSource) call.
#[derive(Debug, Error)]
pub enum SourceError {
    /// `read_frame` was called before `open` or after `close`.
    #[error("source is not opened")]
    NotOpened,

    /// The source has no more frames.
    #[error("end of stream")]
    EndOfStream,

    /// The source could not be opened.
    #[error("failed to open source: {0}")]
    Open(String),

    #[error("source I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("failed to decode frame: {0}")]
    Decode(String),
}

// ── EncodeError ──────────────────────────────────────────────────

/// Failure of [`FrameEncoder::encode`](crate::encoder::FrameEncoder::encode).
#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("cannot encode an empty frame")]
    EmptyFrame,

    #[error("image encoding failed: {0}")]
    Image(#[from] image::ImageError),
}

// ── FramecastError ───────────────────────────────────────────────

/// Error for component lifecycle operations (start / stop / setup).
#[derive(Debug, Error)]
pub enum FramecastError {
    /// `start` was called on a component that is already running.
    #[error("already running")]
    AlreadyRunning,

    /// The frame source failed to open.
    #[error("source failed to open: {0}")]
    SourceOpen(#[source] SourceError),

    /// The broadcast listener could not bind.
    #[error("failed to bind port {port}: {source}")]
    Bind {
        port: u16,
        #[source]
        source: io::Error,
    },

    /// The server runtime or thread could not be created.
    #[error("runtime error: {0}")]
    Runtime(#[from] io::Error),

    /// Frame dimensions and buffer length disagree.
    #[error("invalid frame: {0}")]
    InvalidFrame(String),

    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("parameter error: {0}")]
    Parameter(#[from] ParameterError),

    /// A worker thread panicked and could not be joined cleanly.
    #[error("{0} thread panicked")]
    ThreadPanicked(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_maps_to_http_status() {
        let e = PipelineError::IndexOutOfRange { index: 4, size: 2 };
        assert_eq!(e.severity().http_status(), 400);
        assert_eq!(PipelineError::InvalidInput.severity().http_status(), 400);
        assert_eq!(PipelineError::EmptyPipeline.severity().http_status(), 404);
        assert_eq!(PipelineError::ThreadLockFailed.severity().http_status(), 500);
    }

    #[test]
    fn error_display_messages() {
        let e = PipelineError::IndexOutOfRange { index: 7, size: 3 };
        assert!(e.to_string().contains('7'));
        assert!(e.to_string().contains('3'));

        let e = PipelineError::InvalidFilter {
            name: "lut".into(),
            reason: "boom".into(),
        };
        assert!(e.to_string().contains("lut"));
        assert_eq!(e.kind(), "InvalidFilter");
    }

    #[test]
    fn from_pipeline_error() {
        let e: FramecastError = PipelineError::EmptyPipeline.into();
        assert!(matches!(e, FramecastError::Pipeline(PipelineError::EmptyPipeline)));
    }

    #[test]
    fn from_io() {
        let io_err = io::Error::new(io::ErrorKind::UnexpectedEof, "gone");
        let e: SourceError = io_err.into();
        assert!(matches!(e, SourceError::Io(_)));
    }
}
