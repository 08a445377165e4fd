//! Stream service lifecycle.
//!
//! Wires the configured source, filter pipeline, controller, encoder and
//! broadcast server together, and starts and stops them in order.

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

use tracing::{info, warn};

use framecast_core::{
    BroadcastServer, ControllerStats, FrameController, FrameEncoder, FramecastError, Pipeline,
};
use framecast_core::log;

use crate::config::StreamConfig;

// ── ServiceStatus ────────────────────────────────────────────────

/// Point-in-time view of a running service.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceStatus {
    pub running: bool,
    pub clients: usize,
    pub filters: usize,
    pub stats: ControllerStats,
}

impl fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = &self.stats;
        write!(
            f,
            "{} | {} frames ({} failed, {} dropped) | {:.1} fps | avg {:.2} ms | {} clients | {} filters",
            if self.running { "running" } else { "idle" },
            s.frames_delivered,
            s.frames_failed,
            s.dropped_frames,
            s.throughput_fps,
            s.avg_processing.as_secs_f64() * 1000.0,
            self.clients,
            self.filters,
        )
    }
}

// ── StreamService ────────────────────────────────────────────────

/// The top-level framecast service.
///
/// The pipeline is shared, so filters can be edited through
/// [`pipeline`](Self::pipeline) while frames flow.
pub struct StreamService {
    config: StreamConfig,
    pipeline: Arc<Pipeline>,
    controller: FrameController,
    server: Option<BroadcastServer>,
}

impl StreamService {
    /// Build every component from `config`. Nothing is started yet.
    pub fn new(config: StreamConfig) -> Result<Self, FramecastError> {
        let pipeline = Arc::new(
            Pipeline::new(config.processing.pipeline_name.clone())
                .with_logger(log::tracing_logger("pipeline")),
        );
        for filter in config.build_filters()? {
            pipeline.add_filter(filter)?;
        }

        let server = config.network.enabled.then(|| {
            BroadcastServer::new()
                .with_bind_address(config.network.bind_address)
                .with_client_queue(config.network.client_queue)
                .with_logger(log::tracing_logger("server"))
        });

        let mut controller = FrameController::new(Arc::clone(&pipeline))
            .with_logger(log::tracing_logger("controller"));

        match (&server, config.encoder.enabled) {
            (Some(server), true) => {
                controller.set_encoder(FrameEncoder::new(config.encoder.quality));
                let sender = server.sender();
                controller.set_encoded_frame_callback(move |jpeg| {
                    sender.send_frame(jpeg);
                });
            }
            (None, true) => warn!("encoder enabled without network output; frames will not be encoded"),
            _ => {}
        }

        Ok(Self {
            config,
            pipeline,
            controller,
            server,
        })
    }

    pub fn pipeline(&self) -> &Arc<Pipeline> {
        &self.pipeline
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// Start the server, then the controller.
    ///
    /// If the controller cannot start the server is stopped again.
    pub fn start(&mut self) -> Result<(), FramecastError> {
        if self.controller.is_running() {
            return Err(FramecastError::AlreadyRunning);
        }

        if let Some(server) = self.server.as_mut().filter(|s| !s.is_running()) {
            server.start(self.config.network.port)?;
        }
        info!(
            "pipeline '{}' with {} filters",
            self.pipeline.name(),
            self.pipeline.size()
        );

        let source = self.config.source.build();
        if let Err(e) = self.controller.start(source, self.config.processing.target_fps) {
            if let Some(server) = self.server.as_mut() {
                let _ = server.stop();
            }
            return Err(e);
        }
        Ok(())
    }

    /// Stop the controller, then the server. Reports the first failure.
    pub fn stop(&mut self) -> Result<(), FramecastError> {
        let controller = self.controller.stop();
        let server = match self.server.as_mut() {
            Some(server) => server.stop(),
            None => Ok(()),
        };
        controller.and(server)
    }

    /// Whether frames are currently being produced.
    pub fn is_running(&self) -> bool {
        self.controller.is_running()
    }

    /// Address the broadcast server is bound to, while it runs.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.server.as_ref().and_then(BroadcastServer::local_addr)
    }

    pub fn status(&self) -> ServiceStatus {
        ServiceStatus {
            running: self.controller.is_running(),
            clients: self.server.as_ref().map_or(0, BroadcastServer::client_count),
            filters: self.pipeline.size(),
            stats: self.controller.stats(),
        }
    }
}

impl Drop for StreamService {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            warn!("stream service did not stop cleanly: {e}");
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────
