//! Streaming parse progress: estimation and session tracking.
//!
//! `estimator` turns raw stream observations (tokens seen, tasks detected,
//! structural markers) into a smoothed completion percentage. `tracker`
//! owns the start/tick/finish session lifecycle and drives a display sink.

pub mod estimator;
pub mod tracker;

pub use estimator::{ParsePhase, ProgressEstimator, ProgressSample};
pub use tracker::{
    DisplaySink, NullSink, ParseSummary, PriorityCounts, ProgressTracker, SessionMeta, StatusLine,
};
