//! # framecast-core
//!
//! Real-time frame processing engine.
//!
//! This crate contains:
//! - **Frames**: `Frame`, `PixelFormat`: owned pixel buffers with value semantics
//! - **Filters**: `Filter`, `FilterKind`, `CustomFilter`: grayscale, resize and LUT remap
//! - **Pipeline**: `Pipeline`: ordered, thread-safe filter chain with fail-fast processing
//! - **Sources**: `FrameSource` plus still-image, in-memory and test-pattern sources
//! - **Controller**: `FrameController`: paced acquisition/processing loop on a worker thread
//! - **Encoder**: `FrameEncoder`: deterministic JPEG compression
//! - **Server**: `BroadcastServer`: WebSocket fan-out of encoded frames
//! - **Logging**: `Logger`: injectable logging capability backed by `tracing`
//! - **Error**: `PipelineError`, `FramecastError`: typed, `thiserror`-based errors

pub mod controller;
pub mod encoder;
pub mod error;
pub mod filter;
pub mod frame;
pub mod log;
pub mod pipeline;
pub mod server;
pub mod source;

// ── Re-exports for ergonomic usage ───────────────────────────────

pub use controller::{ControllerStats, DeliveredFrame, FrameController, FramePacer, FrameSlot};
pub use encoder::FrameEncoder;
pub use error::{
    EncodeError, FilterError, FramecastError, ParameterError, PipelineError, PipelineResult,
    Severity, SourceError,
};
pub use filter::{
    CustomFilter, Filter, FilterKind, GrayscaleFilter, LutFilter, LutKind, ResizeFilter,
    ResizeMode, SharedFilter,
};
pub use frame::{Frame, PixelFormat};
pub use log::{Level, Logger, NullLogger, SharedLogger, TracingLogger};
pub use pipeline::{Pipeline, ProcessedFrame, StageTiming};
pub use server::{BroadcastServer, ClientRegistry, FrameSender};
pub use source::{FrameSource, ImageSource, MemorySource, TestPatternSource};
