//! Acquisition, processing and dispatch loop.
//!
//! [`FrameController`] owns one worker thread per run. Each iteration
//! reads a frame from the [`FrameSource`], runs it through the shared
//! [`Pipeline`], hands both frames to the registered callbacks, optionally
//! JPEG-encodes the result, and then waits for the next slot chosen by the
//! [`FramePacer`]. Exactly one frame is in flight; a slow callback delays
//! the next read.
//!
//! Stopping is cooperative: [`stop`](FrameController::stop) clears the
//! running flag, which the worker checks once per iteration, then joins
//! the thread and closes the source. A source whose `read_frame` never
//! returns therefore blocks `stop`.

pub mod pacer;
pub mod slot;

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use bytes::Bytes;

use crate::encoder::FrameEncoder;
use crate::error::{FramecastError, PipelineError, SourceError};
use crate::frame::Frame;
use crate::log::{self, SharedLogger};
use crate::pipeline::Pipeline;
use crate::source::FrameSource;

pub use pacer::{FramePacer, Pace};
pub use slot::{DeliveredFrame, FrameSlot};

/// Receives `(original, processed, frame_id)` for every delivered frame.
pub type FrameCallback = Arc<dyn Fn(&Frame, &Frame, u64) + Send + Sync>;

/// Receives the JPEG bytes of every successfully encoded frame.
pub type EncodedFrameCallback = Arc<dyn Fn(Bytes) + Send + Sync>;

/// Longest single sleep between checks of the running flag.
const SLEEP_SLICE: Duration = Duration::from_millis(50);

// ── ControllerStats ──────────────────────────────────────────────

/// Counters for the current (or last) run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControllerStats {
    /// Frames that reached the callbacks.
    pub frames_delivered: u64,
    /// Frames dropped because the pipeline failed.
    pub frames_failed: u64,
    /// Pacing slots missed under overload.
    pub dropped_frames: u64,
    /// Mean pipeline time per delivered frame.
    pub avg_processing: Duration,
    /// Wall-clock time since the run started (until it ended).
    pub elapsed: Duration,
    /// `frames_delivered / elapsed`.
    pub throughput_fps: f64,
}

#[derive(Debug, Default)]
struct Counters {
    acquired: AtomicU64,
    delivered: AtomicU64,
    failed: AtomicU64,
    dropped: AtomicU64,
    processing_nanos: AtomicU64,
    window: Mutex<(Option<Instant>, Option<Instant>)>,
}

impl Counters {
    fn reset(&self, now: Instant) {
        for c in [
            &self.acquired,
            &self.delivered,
            &self.failed,
            &self.dropped,
            &self.processing_nanos,
        ] {
            c.store(0, Ordering::Relaxed);
        }
        if let Ok(mut w) = self.window.lock() {
            *w = (Some(now), None);
        }
    }

    fn finish(&self, now: Instant) {
        if let Ok(mut w) = self.window.lock() {
            w.1 = Some(now);
        }
    }

    fn elapsed(&self) -> Duration {
        match self.window.lock().map(|w| *w) {
            Ok((Some(start), Some(end))) => end.saturating_duration_since(start),
            Ok((Some(start), None)) => start.elapsed(),
            _ => Duration::ZERO,
        }
    }

    fn snapshot(&self) -> ControllerStats {
        let delivered = self.delivered.load(Ordering::Relaxed);
        let nanos = self.processing_nanos.load(Ordering::Relaxed);
        let elapsed = self.elapsed();
        let avg_processing = if delivered == 0 {
            Duration::ZERO
        } else {
            Duration::from_nanos(nanos / delivered)
        };
        let secs = elapsed.as_secs_f64();
        ControllerStats {
            frames_delivered: delivered,
            frames_failed: self.failed.load(Ordering::Relaxed),
            dropped_frames: self.dropped.load(Ordering::Relaxed),
            avg_processing,
            elapsed,
            throughput_fps: if secs > 0.0 { delivered as f64 / secs } else { 0.0 },
        }
    }
}

// ── FrameController ──────────────────────────────────────────────

/// Drives a [`FrameSource`] through a [`Pipeline`] on a dedicated thread.
///
/// Callbacks, encoder and frame slot are captured when
/// [`start`](Self::start) is called and apply to that run only.
pub struct FrameController {
    pipeline: Arc<Pipeline>,
    running: Arc<AtomicBool>,
    counters: Arc<Counters>,
    worker: Option<JoinHandle<Box<dyn FrameSource>>>,
    frame_callback: Option<FrameCallback>,
    encoded_callback: Option<EncodedFrameCallback>,
    encoder: Option<FrameEncoder>,
    slot: Option<Arc<FrameSlot>>,
    logger: SharedLogger,
}

impl FrameController {
    pub fn new(pipeline: Arc<Pipeline>) -> Self {
        Self {
            pipeline,
            running: Arc::new(AtomicBool::new(false)),
            counters: Arc::new(Counters::default()),
            worker: None,
            frame_callback: None,
            encoded_callback: None,
            encoder: None,
            slot: None,
            logger: log::null(),
        }
    }

    pub fn with_logger(mut self, logger: SharedLogger) -> Self {
        self.logger = logger;
        self
    }

    pub fn pipeline(&self) -> &Arc<Pipeline> {
        &self.pipeline
    }

    /// Called on the worker thread for every delivered frame.
    ///
    /// The callback must not call [`stop`](Self::stop) on this controller.
    pub fn set_frame_callback<F>(&mut self, callback: F)
    where
        F: Fn(&Frame, &Frame, u64) + Send + Sync + 'static,
    {
        self.frame_callback = Some(Arc::new(callback));
    }

    /// Called with the JPEG bytes of each processed frame. Needs an
    /// encoder set through [`set_encoder`](Self::set_encoder).
    pub fn set_encoded_frame_callback<F>(&mut self, callback: F)
    where
        F: Fn(Bytes) + Send + Sync + 'static,
    {
        self.encoded_callback = Some(Arc::new(callback));
    }

    pub fn set_encoder(&mut self, encoder: FrameEncoder) {
        self.encoder = Some(encoder);
    }

    /// Publish every delivered pair into `slot` for a polling consumer.
    pub fn set_frame_slot(&mut self, slot: Arc<FrameSlot>) {
        self.slot = Some(slot);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Frames acquired from the source in the current run.
    pub fn frame_count(&self) -> u64 {
        self.counters.acquired.load(Ordering::Relaxed)
    }

    pub fn dropped_frames(&self) -> u64 {
        self.counters.dropped.load(Ordering::Relaxed)
    }

    pub fn stats(&self) -> ControllerStats {
        self.counters.snapshot()
    }

    /// Open `source` and start the worker.
    ///
    /// `target_fps <= 0` runs as fast as the source and pipeline allow.
    pub fn start(
        &mut self,
        mut source: Box<dyn FrameSource>,
        target_fps: f64,
    ) -> Result<(), FramecastError> {
        if self.is_running() {
            return Err(FramecastError::AlreadyRunning);
        }
        // A previous run that ended on its own still needs joining.
        self.reap()?;

        if let Err(e) = source.open() {
            self.logger
                .critical(&format!("failed to open source {}: {e}", source.name()));
            return Err(FramecastError::SourceOpen(e));
        }

        self.logger.info(&format!(
            "starting {} ({}x{}) at {}",
            source.name(),
            source.width(),
            source.height(),
            if target_fps > 0.0 {
                format!("{target_fps} fps")
            } else {
                "max rate".to_string()
            }
        ));

        self.counters.reset(Instant::now());
        self.running.store(true, Ordering::Release);

        let worker = Worker {
            source,
            pipeline: Arc::clone(&self.pipeline),
            running: Arc::clone(&self.running),
            counters: Arc::clone(&self.counters),
            frame_callback: self.frame_callback.clone(),
            encoded: self.encoder.zip(self.encoded_callback.clone()),
            slot: self.slot.clone(),
            logger: Arc::clone(&self.logger),
            target_fps,
        };

        let handle = thread::Builder::new()
            .name("framecast-controller".into())
            .spawn(move || worker.run())
            .map_err(|e| {
                self.running.store(false, Ordering::Release);
                FramecastError::Runtime(e)
            })?;
        self.worker = Some(handle);
        Ok(())
    }

    /// Stop the worker, wait for it to exit and close the source.
    ///
    /// Returns immediately when nothing is running.
    pub fn stop(&mut self) -> Result<(), FramecastError> {
        self.running.store(false, Ordering::Release);
        self.reap()
    }

    fn reap(&mut self) -> Result<(), FramecastError> {
        let Some(handle) = self.worker.take() else {
            return Ok(());
        };
        match handle.join() {
            Ok(mut source) => {
                source.close();
                self.logger.info(&format!("closed {}", source.name()));
                Ok(())
            }
            Err(_) => {
                self.logger.critical("controller worker panicked");
                Err(FramecastError::ThreadPanicked("controller"))
            }
        }
    }
}

impl Drop for FrameController {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

// ── Worker ───────────────────────────────────────────────────────

/// Marks the run as stopped when the worker exits, including by panic.
struct StopOnExit {
    running: Arc<AtomicBool>,
    counters: Arc<Counters>,
}

impl Drop for StopOnExit {
    fn drop(&mut self) {
        if thread::panicking() {
            self.counters.finish(Instant::now());
        }
        self.running.store(false, Ordering::Release);
    }
}

struct Worker {
    source: Box<dyn FrameSource>,
    pipeline: Arc<Pipeline>,
    running: Arc<AtomicBool>,
    counters: Arc<Counters>,
    frame_callback: Option<FrameCallback>,
    encoded: Option<(FrameEncoder, EncodedFrameCallback)>,
    slot: Option<Arc<FrameSlot>>,
    logger: SharedLogger,
    target_fps: f64,
}

impl Worker {
    /// Run until stopped or the source ends; hands the source back.
    fn run(mut self) -> Box<dyn FrameSource> {
        let _stopped = StopOnExit {
            running: Arc::clone(&self.running),
            counters: Arc::clone(&self.counters),
        };
        let mut pacer = FramePacer::new(self.target_fps, Instant::now());

        while self.running.load(Ordering::Acquire) {
            let frame = match self.source.read_frame() {
                Ok(frame) => frame,
                Err(SourceError::EndOfStream) => {
                    self.logger
                        .info(&format!("{}: end of stream", self.source.name()));
                    break;
                }
                Err(e) => {
                    self.logger
                        .warning(&format!("{}: read failed: {e}", self.source.name()));
                    break;
                }
            };

            let id = self.counters.acquired.fetch_add(1, Ordering::Relaxed);
            self.deliver(frame, id);

            match pacer.advance(Instant::now()) {
                Pace::Sleep(wait) => self.sleep(wait),
                Pace::CaughtUp { missed } => {
                    self.counters.dropped.fetch_add(missed, Ordering::Relaxed);
                    self.logger
                        .debug(&format!("pacing behind, skipped {missed} slots"));
                }
                Pace::Unbounded | Pace::Behind => {}
            }
        }

        self.running.store(false, Ordering::Release);
        self.counters.finish(Instant::now());

        let stats = self.counters.snapshot();
        self.logger.info(&format!(
            "stopped: {} delivered, {} failed, {} dropped, avg {:.2} ms, {:.1} fps",
            stats.frames_delivered,
            stats.frames_failed,
            stats.dropped_frames,
            stats.avg_processing.as_secs_f64() * 1000.0,
            stats.throughput_fps
        ));
        self.source
    }

    fn deliver(&self, original: Frame, id: u64) {
        let started = Instant::now();
        let processed = match self.pipeline.process(&original) {
            Ok(frame) => frame,
            Err(PipelineError::EmptyPipeline) => original.clone(),
            Err(e) => {
                self.counters.failed.fetch_add(1, Ordering::Relaxed);
                self.logger
                    .warning(&format!("frame {id} dropped: {e}"));
                return;
            }
        };
        let nanos = u64::try_from(started.elapsed().as_nanos()).unwrap_or(u64::MAX);
        self.counters
            .processing_nanos
            .fetch_add(nanos, Ordering::Relaxed);
        self.counters.delivered.fetch_add(1, Ordering::Relaxed);

        if let Some(slot) = &self.slot {
            slot.publish(&original, &processed, id);
        }

        if let Some(callback) = &self.frame_callback {
            let outcome =
                panic::catch_unwind(AssertUnwindSafe(|| callback(&original, &processed, id)));
            if outcome.is_err() {
                self.logger
                    .error(&format!("frame callback panicked on frame {id}"));
            }
        }

        if let Some((encoder, callback)) = &self.encoded {
            match encoder.encode(&processed) {
                Ok(bytes) => {
                    if panic::catch_unwind(AssertUnwindSafe(|| callback(bytes))).is_err() {
                        self.logger
                            .error(&format!("encoded-frame callback panicked on frame {id}"));
                    }
                }
                Err(e) => self
                    .logger
                    .debug(&format!("frame {id} not encoded: {e}")),
            }
        }
    }

    /// Sleep for `wait`, waking early if the controller is stopped.
    fn sleep(&self, wait: Duration) {
        let deadline = Instant::now() + wait;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() || !self.running.load(Ordering::Acquire) {
                return;
            }
            thread::sleep(remaining.min(SLEEP_SLICE));
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────
