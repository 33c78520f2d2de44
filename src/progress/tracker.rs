//! Session-scoped progress tracking for a streaming parse.
//!
//! The tracker is cosmetic: it observes the stream, it never owns it. Every
//! anomaly inside the tracker (out-of-order lifecycle calls, a sink that
//! fails to render) is logged and absorbed so the surrounding parse can
//! never fail because of its progress display.
//!
//! Lifecycle is `Idle -> Running -> Finished`, driven by `start`, the
//! per-chunk `update_*` calls, and `finish`/`abort`. `Finished` is
//! terminal; a new session needs a new tracker.

use crate::detector::{DetectedTask, IncrementalTaskDetector};
use crate::progress::estimator::{ParsePhase, ProgressEstimator};
use crate::tasks::Priority;
use crate::tokens::estimate_tokens;
use anyhow::Result;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::warn;

/// Structural marker that ends the task array in the response schema.
/// Seeing it means the model has moved on to the closing metadata section.
const END_OF_TASKS_MARKER: &str = "\"metadata\"";

/// Data for one status-line render.
#[derive(Debug, Clone)]
pub struct StatusLine {
    pub percent: u8,
    pub phase: ParsePhase,
    pub tasks_detected: usize,
    pub expected_tasks: usize,
    pub tokens_out: usize,
    pub elapsed: Duration,
}

/// Render target for the tracker.
///
/// Implementations may do anything from full terminal drawing to nothing
/// at all; the tracker behaves identically either way. Errors returned
/// here are logged by the tracker and never propagated.
pub trait DisplaySink {
    fn render_status(&self, line: &StatusLine) -> Result<()>;
    fn render_task_completed(&self, task: &DetectedTask) -> Result<()>;
    fn render_finish(&self, success: bool, message: &str) -> Result<()>;
}

/// Headless sink for non-interactive runs and tests.
#[derive(Debug, Default)]
pub struct NullSink;

impl DisplaySink for NullSink {
    fn render_status(&self, _line: &StatusLine) -> Result<()> {
        Ok(())
    }
    fn render_task_completed(&self, _task: &DetectedTask) -> Result<()> {
        Ok(())
    }
    fn render_finish(&self, _success: bool, _message: &str) -> Result<()> {
        Ok(())
    }
}

/// Per-priority task tally.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PriorityCounts {
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

impl PriorityCounts {
    fn record(&mut self, priority: Priority) {
        match priority {
            Priority::High => self.high += 1,
            Priority::Medium => self.medium += 1,
            Priority::Low => self.low += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.high + self.medium + self.low
    }
}

/// Session context supplied at `start` and echoed into the summary.
#[derive(Debug, Clone, Default)]
pub struct SessionMeta {
    /// Where the resulting task file will be written.
    pub output_path: Option<PathBuf>,
    /// Verb for the summary line, e.g. "generated" or "appended".
    pub action_verb: String,
    /// Whether this run is re-parsing after a previous failure.
    pub recovery_mode: bool,
}

/// Consolidated result of one finished session.
#[derive(Debug, Clone)]
pub struct ParseSummary {
    pub total_tasks: usize,
    pub elapsed_seconds: f64,
    pub priority_counts: PriorityCounts,
    pub tokens_in: usize,
    pub tokens_out: usize,
    pub recovery_mode: bool,
    pub output_path: Option<PathBuf>,
    pub action_verb: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TrackerState {
    Idle,
    Running,
    Finished,
}

/// Mutable state of the active session. Exists only between `start` and
/// `finish`/`abort`.
#[derive(Debug)]
struct Session {
    started_at: Instant,
    meta: SessionMeta,
    completed: usize,
    priority_counts: PriorityCounts,
    tokens_in: usize,
    exact_tokens_out: usize,
    heuristic_tokens_out: usize,
    has_exact_counts: bool,
    end_marker_seen: bool,
}

impl Session {
    /// Exact provider counts win over the heuristic whenever present.
    fn tokens_out(&self) -> usize {
        if self.has_exact_counts {
            self.exact_tokens_out
        } else {
            self.heuristic_tokens_out
        }
    }
}

/// Orchestrates detection, estimation, and rendering for one parse session.
pub struct ProgressTracker {
    state: TrackerState,
    sink: Box<dyn DisplaySink>,
    detector: IncrementalTaskDetector,
    estimator: ProgressEstimator,
    session: Option<Session>,
    collected: Vec<DetectedTask>,
}

impl ProgressTracker {
    /// Create an idle tracker. `expected_tasks` and the session's total
    /// token estimate seed the estimator; both are best guesses.
    pub fn new(
        sink: Box<dyn DisplaySink>,
        expected_tasks: usize,
        estimated_total_tokens: usize,
    ) -> Self {
        Self {
            state: TrackerState::Idle,
            sink,
            detector: IncrementalTaskDetector::new(),
            estimator: ProgressEstimator::new(expected_tasks, estimated_total_tokens),
            session: None,
            collected: Vec::new(),
        }
    }

    /// Replace the default estimator, e.g. with configured threshold and
    /// step settings.
    pub fn with_estimator(mut self, estimator: ProgressEstimator) -> Self {
        self.estimator = estimator;
        self
    }

    pub fn is_running(&self) -> bool {
        self.state == TrackerState::Running
    }

    /// Tasks detected so far, in detection order.
    pub fn detected_tasks(&self) -> &[DetectedTask] {
        &self.collected
    }

    /// Begin the session. Warns and no-ops if already running or finished.
    pub fn start(&mut self, meta: SessionMeta) {
        if self.state != TrackerState::Idle {
            warn!(state = ?self.state, "start() called on a non-idle tracker; ignoring");
            return;
        }
        self.state = TrackerState::Running;
        self.session = Some(Session {
            started_at: Instant::now(),
            meta,
            completed: 0,
            priority_counts: PriorityCounts::default(),
            tokens_in: 0,
            exact_tokens_out: 0,
            heuristic_tokens_out: 0,
            has_exact_counts: false,
            end_marker_seen: false,
        });
        let line = self.status_line(0, ParsePhase::Analyzing, 0);
        self.render_status(&line);
    }

    /// Record a detected task: counters, priority tally, completion render.
    pub fn tick(&mut self, task: &DetectedTask) {
        let Some(session) = self.running_session("tick") else {
            return;
        };
        session.completed += 1;
        session.priority_counts.record(task.priority);
        if let Err(e) = self.sink.render_task_completed(task) {
            warn!(error = %e, task_id = task.id, "display sink failed to render task");
        }
    }

    /// Accumulate exact token counts from provider usage events. These
    /// override the heuristic estimate for the rest of the session.
    pub fn update_tokens(&mut self, delta_in: usize, delta_out: usize) {
        let Some(session) = self.running_session("update_tokens") else {
            return;
        };
        session.tokens_in += delta_in;
        session.exact_tokens_out += delta_out;
        session.has_exact_counts = true;
    }

    /// Feed a raw text delta from the stream: updates the token heuristic,
    /// runs detection, ticks new tasks, and renders a fresh status line.
    pub fn update_streamed_text(&mut self, chunk: &str) {
        let Some(session) = self.running_session("update_streamed_text") else {
            return;
        };
        session.heuristic_tokens_out += estimate_tokens(chunk);
        if !session.end_marker_seen && chunk.contains(END_OF_TASKS_MARKER) {
            session.end_marker_seen = true;
        }

        let new_tasks = self.detector.feed(chunk);
        if let Some(max_id) = self.detector.max_detected_id() {
            self.estimator.revise_expected(max_id as usize);
        }
        for task in &new_tasks {
            self.tick(task);
        }
        self.collected.extend(new_tasks);

        let session = self.session.as_ref().expect("running session");
        let sample = self.estimator.estimate(
            session.tokens_out(),
            self.detector.detected_count(),
            session.end_marker_seen,
        );
        let line = self.status_line(sample.percent, sample.phase, sample.token_count);
        self.render_status(&line);
    }

    /// End the session. On success the final status renders exactly 100%.
    ///
    /// Returns the consolidated summary the first time it is called; later
    /// calls warn, change nothing, and return `None`.
    pub fn finish(&mut self, success: bool) -> Option<ParseSummary> {
        if self.state != TrackerState::Running {
            warn!(state = ?self.state, "finish() called on a non-running tracker; ignoring");
            return None;
        }
        self.state = TrackerState::Finished;
        let session = self.session.take().expect("running session");

        if success {
            let line = StatusLine {
                percent: 100,
                phase: ParsePhase::Finalizing,
                tasks_detected: session.completed,
                expected_tasks: self.estimator.expected_tasks(),
                tokens_out: session.tokens_out(),
                elapsed: session.started_at.elapsed(),
            };
            self.render_status(&line);
        }

        let message = if success {
            format!("{} tasks {}", session.completed, verb_or_default(&session.meta))
        } else {
            "parse failed".to_string()
        };
        if let Err(e) = self.sink.render_finish(success, &message) {
            warn!(error = %e, "display sink failed to render finish");
        }

        Some(ParseSummary {
            total_tasks: session.completed,
            elapsed_seconds: session.started_at.elapsed().as_secs_f64(),
            priority_counts: session.priority_counts,
            tokens_in: session.tokens_in,
            tokens_out: session.tokens_out(),
            recovery_mode: session.meta.recovery_mode,
            output_path: session.meta.output_path.clone(),
            action_verb: verb_or_default(&session.meta),
        })
    }

    /// Cancel the session (user interrupt, stream error): clears any
    /// partially-rendered state and finishes without a success summary.
    pub fn abort(&mut self, reason: &str) {
        if self.state != TrackerState::Running {
            return;
        }
        self.state = TrackerState::Finished;
        self.session = None;
        if let Err(e) = self.sink.render_finish(false, reason) {
            warn!(error = %e, "display sink failed to render abort");
        }
    }

    fn running_session(&mut self, op: &str) -> Option<&mut Session> {
        if self.state != TrackerState::Running {
            warn!(state = ?self.state, op, "tracker call outside running session; ignoring");
            return None;
        }
        self.session.as_mut()
    }

    fn status_line(&self, percent: u8, phase: ParsePhase, tokens_out: usize) -> StatusLine {
        let session = self.session.as_ref().expect("active session");
        StatusLine {
            percent,
            phase,
            tasks_detected: session.completed,
            expected_tasks: self.estimator.expected_tasks(),
            tokens_out,
            elapsed: session.started_at.elapsed(),
        }
    }

    fn render_status(&self, line: &StatusLine) {
        if let Err(e) = self.sink.render_status(line) {
            warn!(error = %e, "display sink failed to render status");
        }
    }
}

fn verb_or_default(meta: &SessionMeta) -> String {
    if meta.action_verb.is_empty() {
        "generated".to_string()
    } else {
        meta.action_verb.clone()
    }
}
