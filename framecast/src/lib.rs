//! # framecast: frame streaming service
//!
//! Reads frames from a still image or a synthetic pattern, runs them
//! through a configurable filter pipeline, JPEG-encodes the result and
//! pushes it to every connected WebSocket client.
//!
//! ## Modules
//!
//! - **config**: TOML configuration with per-section defaults.
//! - **service**: `StreamService`, which wires source, controller and server.
//! - **console**: line-oriented commands for live pipeline edits on stdin.

pub mod config;
pub mod console;
pub mod service;
