//! Ordered, thread-safe filter chain.
//!
//! The filter list sits behind one mutex. `process` copies the list under
//! the lock and releases it before any filter runs, so reconfiguration
//! never waits on a slow frame and a single `process` call never observes
//! a half-applied edit.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::error::{FilterError, PipelineError, PipelineResult};
use crate::filter::SharedFilter;
use crate::frame::Frame;
use crate::log::{self, SharedLogger};

/// Timing of one stage of a `process` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageTiming {
    pub name: String,
    pub elapsed: Duration,
    /// The filter (or the whole pipeline) was disabled.
    pub skipped: bool,
}

/// Output of [`Pipeline::process_timed`].
#[derive(Debug, Clone)]
pub struct ProcessedFrame {
    pub frame: Frame,
    pub stages: Vec<StageTiming>,
}

impl ProcessedFrame {
    /// Total time spent inside filters.
    pub fn total_elapsed(&self) -> Duration {
        self.stages.iter().map(|s| s.elapsed).sum()
    }
}

/// An ordered list of shared filters applied one after another.
pub struct Pipeline {
    name: String,
    filters: Mutex<Vec<SharedFilter>>,
    active: AtomicBool,
    logger: SharedLogger,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new("default")
    }
}

impl Pipeline {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            filters: Mutex::new(Vec::new()),
            active: AtomicBool::new(true),
            logger: log::null(),
        }
    }

    pub fn with_logger(mut self, logger: SharedLogger) -> Self {
        self.logger = logger;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// An inactive pipeline skips every stage without touching the
    /// filters' own enabled flags.
    pub fn set_active(&self, active: bool) {
        self.active.store(active, Ordering::Release);
    }

    // ── Configuration ────────────────────────────────────────────

    /// Append a filter.
    pub fn add_filter(&self, filter: SharedFilter) -> PipelineResult<()> {
        let mut filters = self.lock()?;
        self.logger
            .info(&format!("{}: added filter '{}' at {}", self.name, filter.name(), filters.len()));
        filters.push(filter);
        Ok(())
    }

    /// Remove and return the filter at `index`.
    pub fn remove_filter(&self, index: usize) -> PipelineResult<SharedFilter> {
        let mut filters = self.lock()?;
        check_index(index, filters.len())?;
        let removed = filters.remove(index);
        self.logger
            .info(&format!("{}: removed filter '{}' from {index}", self.name, removed.name()));
        Ok(removed)
    }

    /// Remove every filter. Fails on an already-empty pipeline.
    pub fn clear(&self) -> PipelineResult<()> {
        let mut filters = self.lock()?;
        if filters.is_empty() {
            return Err(PipelineError::EmptyPipeline);
        }
        let count = filters.len();
        filters.clear();
        self.logger
            .info(&format!("{}: cleared {count} filters", self.name));
        Ok(())
    }

    /// Relocate the filter at `from` to `to`, shifting the range between.
    pub fn move_filter(&self, from: usize, to: usize) -> PipelineResult<()> {
        let mut filters = self.lock()?;
        if filters.is_empty() {
            return Err(PipelineError::EmptyPipeline);
        }
        check_index(from, filters.len())?;
        check_index(to, filters.len())?;
        if from == to {
            return Ok(());
        }
        if from < to {
            filters[from..=to].rotate_left(1);
        } else {
            filters[to..=from].rotate_right(1);
        }
        self.logger
            .debug(&format!("{}: moved filter {from} -> {to}", self.name));
        Ok(())
    }

    pub fn set_filter_enabled(&self, index: usize, enabled: bool) -> PipelineResult<()> {
        let filters = self.lock()?;
        check_index(index, filters.len())?;
        filters[index].set_enabled(enabled);
        self.logger.debug(&format!(
            "{}: filter '{}' {}",
            self.name,
            filters[index].name(),
            if enabled { "enabled" } else { "disabled" }
        ));
        Ok(())
    }

    // ── Accessors ────────────────────────────────────────────────

    /// Handles to every filter, in order.
    pub fn filters(&self) -> PipelineResult<Vec<SharedFilter>> {
        let filters = self.lock()?;
        if filters.is_empty() {
            return Err(PipelineError::EmptyPipeline);
        }
        Ok(filters.clone())
    }

    pub fn filter(&self, index: usize) -> PipelineResult<SharedFilter> {
        let filters = self.lock()?;
        check_index(index, filters.len())?;
        Ok(SharedFilter::clone(&filters[index]))
    }

    /// Number of filters; zero if the lock is poisoned.
    pub fn size(&self) -> usize {
        self.lock().map(|f| f.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    // ── Processing ───────────────────────────────────────────────

    /// Run `input` through every enabled filter.
    pub fn process(&self, input: &Frame) -> PipelineResult<Frame> {
        self.process_timed(input).map(|p| p.frame)
    }

    /// Like [`process`](Self::process), also reporting per-stage timings.
    ///
    /// The first failing stage aborts the call; no partial output is
    /// returned. A panic inside a filter is contained here and reported
    /// as [`PipelineError::InvalidFilter`].
    pub fn process_timed(&self, input: &Frame) -> PipelineResult<ProcessedFrame> {
        if input.is_empty() {
            return Err(PipelineError::InvalidInput);
        }

        let snapshot = self.lock()?.clone();
        if snapshot.is_empty() {
            return Err(PipelineError::EmptyPipeline);
        }

        let active = self.is_active();
        let mut current = input.clone();
        let mut stages = Vec::with_capacity(snapshot.len());

        for filter in &snapshot {
            if !active || !filter.is_enabled() {
                self.logger
                    .debug(&format!("{}: skipping disabled filter '{}'", self.name, filter.name()));
                stages.push(StageTiming {
                    name: filter.name().to_string(),
                    elapsed: Duration::ZERO,
                    skipped: true,
                });
                continue;
            }

            let started = Instant::now();
            let result = panic::catch_unwind(AssertUnwindSafe(|| filter.apply(&current)))
                .unwrap_or_else(|payload| Err(FilterError::Panicked(panic_message(payload.as_ref()))));
            let elapsed = started.elapsed();

            match result {
                Ok(frame) => {
                    self.logger.debug(&format!(
                        "{}: '{}' took {:.3} ms",
                        self.name,
                        filter.name(),
                        elapsed.as_secs_f64() * 1000.0
                    ));
                    stages.push(StageTiming {
                        name: filter.name().to_string(),
                        elapsed,
                        skipped: false,
                    });
                    current = frame;
                }
                Err(e) => {
                    self.logger
                        .error(&format!("{}: filter '{}' failed: {e}", self.name, filter.name()));
                    return Err(PipelineError::InvalidFilter {
                        name: filter.name().to_string(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        Ok(ProcessedFrame {
            frame: current,
            stages,
        })
    }

    fn lock(&self) -> PipelineResult<MutexGuard<'_, Vec<SharedFilter>>> {
        self.filters
            .lock()
            .map_err(|_| PipelineError::ThreadLockFailed)
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("name", &self.name)
            .field("size", &self.size())
            .field("active", &self.is_active())
            .finish()
    }
}

fn check_index(index: usize, size: usize) -> PipelineResult<()> {
    if index >= size {
        return Err(PipelineError::IndexOutOfRange { index, size });
    }
    Ok(())
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Weak};

    use super::*;
    use crate::filter::{CustomFilter, Filter, GrayscaleFilter, LutFilter, LutKind, ResizeFilter};
    use crate::frame::PixelFormat;

    struct Faulty;

    impl CustomFilter for Faulty {
        fn name(&self) -> &str {
            "faulty"
        }

        fn apply(&mut self, _input: &Frame) -> Result<Frame, FilterError> {
            Err(FilterError::Failed("always fails".into()))
        }
    }

    struct Panicky;

    impl CustomFilter for Panicky {
        fn name(&self) -> &str {
            "panicky"
        }

        fn apply(&mut self, _input: &Frame) -> Result<Frame, FilterError> {
            panic!("boom")
        }
    }

    /// Adds a filter to its own pipeline while running.
    struct Grower(Weak<Pipeline>);

    impl CustomFilter for Grower {
        fn name(&self) -> &str {
            "grower"
        }

        fn apply(&mut self, input: &Frame) -> Result<Frame, FilterError> {
            if let Some(p) = self.0.upgrade() {
                p.add_filter(Filter::new(LutFilter::new(LutKind::Invert)).shared())
                    .map_err(|e| FilterError::Failed(e.to_string()))?;
            }
            Ok(input.clone())
        }
    }

    fn lut(kind: LutKind) -> SharedFilter {
        Filter::new(LutFilter::new(kind)).shared()
    }

    fn named(pipeline: &Pipeline) -> Vec<String> {
        pipeline
            .filters()
            .map(|fs| fs.iter().map(|f| f.name().to_string()).collect())
            .unwrap_or_default()
    }

    fn gray(v: u8) -> Frame {
        Frame::filled(4, 4, PixelFormat::Gray8, &[v])
    }

    #[test]
    fn empty_pipeline_policy() {
        let p = Pipeline::new("p");
        assert_eq!(p.process(&gray(1)), Err(PipelineError::EmptyPipeline));
        assert_eq!(p.clear(), Err(PipelineError::EmptyPipeline));
        assert_eq!(p.move_filter(0, 0), Err(PipelineError::EmptyPipeline));
        assert_eq!(p.filters().unwrap_err(), PipelineError::EmptyPipeline);
    }

    #[test]
    fn empty_input_is_invalid() {
        let p = Pipeline::new("p");
        p.add_filter(lut(LutKind::Invert)).unwrap();
        assert_eq!(p.process(&Frame::empty()), Err(PipelineError::InvalidInput));
    }

    #[test]
    fn out_of_range_indices() {
        let p = Pipeline::new("p");
        p.add_filter(lut(LutKind::Invert)).unwrap();
        let oob = PipelineError::IndexOutOfRange { index: 1, size: 1 };
        assert_eq!(p.remove_filter(1).unwrap_err(), oob);
        assert_eq!(p.filter(1).unwrap_err(), oob);
        assert_eq!(p.set_filter_enabled(1, false).unwrap_err(), oob);
        assert_eq!(p.move_filter(0, 1).unwrap_err(), oob);
        assert_eq!(p.size(), 1);
    }

    #[test]
    fn move_rotates_range() {
        let p = Pipeline::new("p");
        p.add_filter(Filter::new(GrayscaleFilter::new()).shared()).unwrap();
        p.add_filter(Filter::new(ResizeFilter::new(2, 2).unwrap()).shared())
            .unwrap();
        p.add_filter(lut(LutKind::Invert)).unwrap();

        p.move_filter(1, 1).unwrap();
        assert_eq!(named(&p), ["grayscale", "resize", "lut"]);

        p.move_filter(0, 2).unwrap();
        assert_eq!(named(&p), ["resize", "lut", "grayscale"]);

        p.move_filter(2, 0).unwrap();
        assert_eq!(named(&p), ["grayscale", "resize", "lut"]);
    }

    #[test]
    fn remove_shifts_and_clear_empties() {
        let p = Pipeline::new("p");
        p.add_filter(Filter::new(GrayscaleFilter::new()).shared()).unwrap();
        p.add_filter(lut(LutKind::Invert)).unwrap();
        let removed = p.remove_filter(0).unwrap();
        assert_eq!(removed.name(), "grayscale");
        assert_eq!(p.filter(0).unwrap().name(), "lut");
        p.clear().unwrap();
        assert!(p.is_empty());
    }

    #[test]
    fn disabled_filter_matches_removed_filter() {
        let input = Frame::filled(6, 4, PixelFormat::Rgb8, &[30, 60, 90]);

        let with_disabled = Pipeline::new("a");
        with_disabled
            .add_filter(Filter::new(GrayscaleFilter::new()).shared())
            .unwrap();
        with_disabled.add_filter(lut(LutKind::Invert)).unwrap();
        with_disabled.set_filter_enabled(1, false).unwrap();

        let without = Pipeline::new("b");
        without
            .add_filter(Filter::new(GrayscaleFilter::new()).shared())
            .unwrap();

        assert_eq!(
            with_disabled.process(&input).unwrap(),
            without.process(&input).unwrap()
        );
    }

    #[test]
    fn faulting_filter_aborts_then_pipeline_recovers() {
        let p = Pipeline::new("p");
        p.add_filter(lut(LutKind::Invert)).unwrap();
        p.add_filter(Filter::custom(Faulty).shared()).unwrap();

        match p.process(&gray(10)) {
            Err(PipelineError::InvalidFilter { name, .. }) => assert_eq!(name, "faulty"),
            other => panic!("expected InvalidFilter, got {other:?}"),
        }

        p.remove_filter(1).unwrap();
        assert_eq!(p.process(&gray(10)).unwrap(), gray(245));
    }

    #[test]
    fn panics_are_contained() {
        let p = Pipeline::new("p");
        p.add_filter(Filter::custom(Panicky).shared()).unwrap();
        let err = p.process(&gray(1)).unwrap_err();
        assert_eq!(err.kind(), "InvalidFilter");
        assert!(err.to_string().contains("boom"));

        // The pipeline lock itself is untouched.
        p.add_filter(lut(LutKind::Identity)).unwrap();
        assert_eq!(p.size(), 2);
    }

    #[test]
    fn inactive_pipeline_copies_input() {
        let p = Pipeline::new("p");
        p.add_filter(lut(LutKind::Invert)).unwrap();
        p.set_active(false);
        let out = p.process_timed(&gray(3)).unwrap();
        assert_eq!(out.frame, gray(3));
        assert!(out.stages.iter().all(|s| s.skipped));
        assert!(p.filter(0).unwrap().is_enabled());
    }

    #[test]
    fn timings_cover_every_stage() {
        let p = Pipeline::new("p");
        p.add_filter(lut(LutKind::Invert)).unwrap();
        p.add_filter(lut(LutKind::Invert)).unwrap();
        p.set_filter_enabled(0, false).unwrap();
        let out = p.process_timed(&gray(3)).unwrap();
        assert_eq!(out.stages.len(), 2);
        assert!(out.stages[0].skipped);
        assert!(!out.stages[1].skipped);
        assert_eq!(out.frame, gray(252));
        assert!(out.total_elapsed() >= out.stages[1].elapsed);
    }

    #[test]
    fn process_runs_on_a_snapshot() {
        let p = Arc::new(Pipeline::new("p"));
        p.add_filter(Filter::custom(Grower(Arc::downgrade(&p))).shared())
            .unwrap();

        // The invert added mid-run is not applied to this frame.
        assert_eq!(p.process(&gray(7)).unwrap(), gray(7));
        assert_eq!(p.size(), 2);
    }

    #[test]
    fn shared_filter_edits_are_visible() {
        let p = Pipeline::new("p");
        let f = lut(LutKind::Identity);
        p.add_filter(SharedFilter::clone(&f)).unwrap();
        f.set_parameter("lut_type", &serde_json::json!("invert"))
            .unwrap();
        assert_eq!(p.process(&gray(0)).unwrap(), gray(255));
    }
}
