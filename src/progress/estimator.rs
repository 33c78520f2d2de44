//! Completion percentage estimation for a streaming parse.
//!
//! The true total is unknowable mid-stream: the task count is a request
//! parameter the model may exceed, and token totals are heuristic until the
//! provider's final usage event. The estimator blends what it has through
//! three phases and smooths the output so the bar never moves backward and
//! never visibly jumps.
//!
//! Phase bands:
//! - analyzing (no tasks yet): 1-24%, token ramp
//! - generating: 25-90%, weighted across expected tasks
//! - finalizing (all tasks seen or end marker observed): 90-99%, token fill
//!
//! 100% is never produced here; the tracker forces it at `finish`.

use serde::Serialize;

/// Percent ceiling of the analyzing phase.
const ANALYZING_CEILING: f64 = 24.0;

/// Start of the generating band.
const GENERATING_FLOOR: f64 = 25.0;

/// Start of the finalizing band (and end of generating).
const FINALIZING_FLOOR: f64 = 90.0;

/// Highest percent reportable before the session finishes.
const RUNNING_CEILING: u8 = 99;

/// Default token count over which the analyzing ramp saturates.
pub const DEFAULT_TOKEN_THRESHOLD: usize = 1500;

/// Default maximum percent increase between consecutive samples.
pub const DEFAULT_MAX_STEP: u8 = 3;

/// Weight of the first expected task relative to the last. Earlier tasks
/// carry less of the band so the first detection isn't a huge jump and the
/// last detection isn't left with a huge remainder.
const FIRST_TASK_WEIGHT: f64 = 0.5;

/// Coarse stage of the generation process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParsePhase {
    Analyzing,
    Generating,
    Finalizing,
}

impl std::fmt::Display for ParsePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParsePhase::Analyzing => write!(f, "analyzing"),
            ParsePhase::Generating => write!(f, "generating"),
            ParsePhase::Finalizing => write!(f, "finalizing"),
        }
    }
}

/// One smoothed progress reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressSample {
    /// 0-99 while the session runs; the tracker forces 100 at finish.
    pub percent: u8,
    pub token_count: usize,
    pub tasks_detected: usize,
    pub phase: ParsePhase,
}

/// Stateful per-session estimator.
///
/// State is limited to what the smoothing invariants require: the last
/// returned percent (monotonicity), the possibly-revised expected task
/// count, and the token level at which finalizing began.
#[derive(Debug)]
pub struct ProgressEstimator {
    expected_tasks: usize,
    estimated_total_tokens: usize,
    token_threshold: usize,
    max_step: u8,
    last_percent: u8,
    finalizing_entry_tokens: Option<usize>,
}

impl ProgressEstimator {
    /// Create an estimator for a session expecting `expected_tasks` tasks
    /// and roughly `estimated_total_tokens` output tokens. The token total
    /// is fixed for the session; the task count may be revised upward.
    pub fn new(expected_tasks: usize, estimated_total_tokens: usize) -> Self {
        Self {
            expected_tasks: expected_tasks.max(1),
            estimated_total_tokens: estimated_total_tokens.max(1),
            token_threshold: DEFAULT_TOKEN_THRESHOLD,
            max_step: DEFAULT_MAX_STEP,
            last_percent: 0,
            finalizing_entry_tokens: None,
        }
    }

    pub fn with_token_threshold(mut self, threshold: usize) -> Self {
        self.token_threshold = threshold.max(1);
        self
    }

    pub fn with_max_step(mut self, max_step: u8) -> Self {
        self.max_step = max_step.max(1);
        self
    }

    pub fn expected_tasks(&self) -> usize {
        self.expected_tasks
    }

    /// Revise the expected task count upward. Never shrinks, so progress
    /// already shown cannot regress.
    pub fn revise_expected(&mut self, observed: usize) {
        if observed > self.expected_tasks {
            self.expected_tasks = observed;
        }
    }

    /// Produce the next smoothed sample.
    ///
    /// Guarantees, regardless of the inputs: the percent is never below the
    /// previous sample's, never more than `max_step` above it, and never
    /// above 99.
    pub fn estimate(
        &mut self,
        tokens_seen: usize,
        tasks_detected: usize,
        end_marker_seen: bool,
    ) -> ProgressSample {
        self.revise_expected(tasks_detected);

        let finalizing =
            end_marker_seen || (tasks_detected > 0 && tasks_detected >= self.expected_tasks);
        let phase = if finalizing {
            ParsePhase::Finalizing
        } else if tasks_detected > 0 {
            ParsePhase::Generating
        } else {
            ParsePhase::Analyzing
        };

        let raw = match phase {
            ParsePhase::Analyzing => self.analyzing_percent(tokens_seen),
            ParsePhase::Generating => self.generating_percent(tasks_detected),
            ParsePhase::Finalizing => self.finalizing_percent(tokens_seen),
        };

        let stepped = raw
            .min(self.last_percent.saturating_add(self.max_step))
            .max(self.last_percent)
            .min(RUNNING_CEILING);
        self.last_percent = stepped;

        ProgressSample {
            percent: stepped,
            token_count: tokens_seen,
            tasks_detected,
            phase,
        }
    }

    /// Token ramp toward the analyzing ceiling, clamped to [1, 24].
    fn analyzing_percent(&self, tokens_seen: usize) -> u8 {
        let ramp = tokens_seen as f64 / self.token_threshold as f64;
        (ramp * ANALYZING_CEILING).clamp(1.0, ANALYZING_CEILING) as u8
    }

    /// Distribute the generating band across expected tasks with a linear
    /// weight ramp: the first task carries half the weight of the last.
    fn generating_percent(&self, tasks_detected: usize) -> u8 {
        let n = self.expected_tasks;
        let done = tasks_detected.min(n);

        let weight = |i: usize| -> f64 {
            if n <= 1 {
                1.0
            } else {
                FIRST_TASK_WEIGHT + (1.0 - FIRST_TASK_WEIGHT) * i as f64 / (n - 1) as f64
            }
        };

        let total: f64 = (0..n).map(weight).sum();
        let completed: f64 = (0..done).map(weight).sum();
        let band = FINALIZING_FLOOR - GENERATING_FLOOR;

        (GENERATING_FLOOR + band * completed / total) as u8
    }

    /// Fill the finalizing band by how much of the remaining token budget
    /// has been consumed since finalizing began.
    fn finalizing_percent(&mut self, tokens_seen: usize) -> u8 {
        let entry = *self.finalizing_entry_tokens.get_or_insert(tokens_seen);
        let budget = self.estimated_total_tokens.saturating_sub(entry).max(1);
        let consumed = tokens_seen.saturating_sub(entry);
        let fill = (consumed as f64 / budget as f64).min(1.0);

        (FINALIZING_FLOOR + fill * (RUNNING_CEILING as f64 - FINALIZING_FLOOR)) as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Drive the estimator through a sample sequence and return percents.
    fn run(estimator: &mut ProgressEstimator, steps: &[(usize, usize, bool)]) -> Vec<u8> {
        steps
            .iter()
            .map(|&(tokens, tasks, marker)| estimator.estimate(tokens, tasks, marker).percent)
            .collect()
    }

    #[test]
    fn test_analyzing_ramps_with_tokens() {
        let mut estimator = ProgressEstimator::new(5, 4000);
        let percents = run(
            &mut estimator,
            &[(0, 0, false), (100, 0, false), (400, 0, false), (800, 0, false)],
        );
        assert_eq!(percents[0], 1);
        for pair in percents.windows(2) {
            assert!(pair[1] >= pair[0]);
        }
        assert!(*percents.last().unwrap() <= 24);
    }

    #[test]
    fn test_phase_transitions() {
        let mut estimator = ProgressEstimator::new(3, 4000);
        assert_eq!(estimator.estimate(100, 0, false).phase, ParsePhase::Analyzing);
        assert_eq!(estimator.estimate(500, 1, false).phase, ParsePhase::Generating);
        assert_eq!(estimator.estimate(900, 3, false).phase, ParsePhase::Finalizing);
    }

    #[test]
    fn test_end_marker_forces_finalizing() {
        let mut estimator = ProgressEstimator::new(10, 4000);
        let sample = estimator.estimate(500, 2, true);
        assert_eq!(sample.phase, ParsePhase::Finalizing);
    }

    #[test]
    fn test_monotonic_and_step_bounded() {
        let mut estimator = ProgressEstimator::new(5, 4000);
        // Deliberately erratic inputs: token counts jump, task counts leap.
        let percents = run(
            &mut estimator,
            &[
                (10, 0, false),
                (3000, 0, false),
                (3100, 4, false),
                (3200, 4, false),
                (200, 1, false), // inputs regress; output must not
                (3900, 5, false),
                (4000, 5, true),
            ],
        );
        for pair in percents.windows(2) {
            assert!(pair[1] >= pair[0], "regression: {:?}", percents);
            assert!(
                pair[1] - pair[0] <= DEFAULT_MAX_STEP,
                "step too large: {:?}",
                percents
            );
        }
    }

    #[test]
    fn test_never_exceeds_99_while_running() {
        let mut estimator = ProgressEstimator::new(1, 100);
        let mut last = 0;
        for i in 0..200 {
            last = estimator.estimate(i * 100, 1, true).percent;
        }
        assert_eq!(last, 99);
    }

    #[test]
    fn test_first_task_is_not_a_huge_jump() {
        let mut estimator = ProgressEstimator::new(10, 8000);
        estimator.estimate(1400, 0, false);
        let before = estimator.estimate(1500, 0, false).percent;
        let after = estimator.estimate(1600, 1, false).percent;
        assert!(after - before <= DEFAULT_MAX_STEP);
    }

    #[test]
    fn test_expected_count_revises_upward_without_regression() {
        let mut estimator = ProgressEstimator::new(5, 4000);
        // Reach a healthy percent with 5/5 tasks.
        let mut last = 0;
        for i in 1..40 {
            last = estimator.estimate(i * 100, 5, false).percent;
        }
        // A sixth task appears; expected revises to 6, percent holds.
        estimator.revise_expected(6);
        let sample = estimator.estimate(4000, 6, false);
        assert_eq!(estimator.expected_tasks(), 6);
        assert!(sample.percent >= last);
    }

    #[test]
    fn test_revise_expected_never_shrinks() {
        let mut estimator = ProgressEstimator::new(8, 4000);
        estimator.revise_expected(3);
        assert_eq!(estimator.expected_tasks(), 8);
    }

    #[test]
    fn test_later_tasks_carry_more_weight() {
        // With the step cap effectively disabled, raw band shares are
        // visible: each successive task detection moves the bar further
        // than the previous one.
        let mut estimator = ProgressEstimator::new(5, 4000).with_max_step(100);
        let percents = run(
            &mut estimator,
            &[(100, 1, false), (200, 2, false), (300, 3, false), (400, 4, false)],
        );
        let deltas: Vec<i32> = percents
            .windows(2)
            .map(|p| p[1] as i32 - p[0] as i32)
            .collect();
        for pair in deltas.windows(2) {
            assert!(pair[1] > pair[0], "weights not increasing: {:?}", percents);
        }
        // The fifth of five tasks crosses into the finalizing band.
        assert!(estimator.estimate(500, 5, false).percent >= 90);
    }

    #[test]
    fn test_full_session_ends_at_99() {
        let mut estimator = ProgressEstimator::new(5, 3000);
        let mut last = 0;
        let mut tasks = 0;
        for i in 1..=300 {
            if i % 40 == 0 && tasks < 5 {
                tasks += 1;
            }
            last = estimator
                .estimate(i * 10, tasks, i > 250)
                .percent;
        }
        assert_eq!(last, 99);
    }
}
