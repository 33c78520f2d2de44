//! Terminal rendering for the parse tracker, via `indicatif`.
//!
//! One progress bar carries the live status line (percent, phase, task and
//! token tallies, elapsed time); completed tasks are printed above it as
//! they arrive. All cursor handling stays inside `indicatif`; the tracker
//! knows nothing about terminal control sequences.

use crate::detector::DetectedTask;
use crate::progress::{DisplaySink, StatusLine};
use crate::tasks::Priority;
use crate::ui::icons::{CHECK, CROSS};
use anyhow::Result;
use console::style;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::time::Duration;

/// Interactive sink: a spinner-decorated percent bar plus one printed line
/// per completed task.
pub struct ConsoleSink {
    multi: MultiProgress,
    status_bar: ProgressBar,
}

impl ConsoleSink {
    /// Create the sink and start the 100 ms spinner tick. The tick is
    /// stopped by `render_finish`, which every tracker exit path calls.
    pub fn new() -> Self {
        let multi = MultiProgress::new();

        let style = ProgressStyle::default_bar()
            .template("{prefix:.bold.dim} {spinner} [{bar:30.cyan/blue}] {pos}% {msg}")
            .expect("progress bar template is a valid static string")
            .progress_chars("█▓▒░");

        let status_bar = multi.add(ProgressBar::new(100));
        status_bar.set_style(style);
        status_bar.set_prefix("Parsing");
        status_bar.enable_steady_tick(Duration::from_millis(100));

        Self { multi, status_bar }
    }

    /// Print a line via `MultiProgress`, falling back to `eprintln!` if the
    /// rich UI fails, so task completions are never silently lost.
    fn print_line(&self, msg: impl AsRef<str>) {
        if self.multi.println(msg.as_ref()).is_err() {
            eprintln!("{}", msg.as_ref());
        }
    }
}

impl Default for ConsoleSink {
    fn default() -> Self {
        Self::new()
    }
}

impl DisplaySink for ConsoleSink {
    fn render_status(&self, line: &StatusLine) -> Result<()> {
        self.status_bar.set_position(line.percent as u64);
        self.status_bar.set_message(format!(
            "{} {} tasks {}/{} {} {} tok {} {}",
            style(line.phase).cyan(),
            style("·").dim(),
            line.tasks_detected,
            line.expected_tasks,
            style("·").dim(),
            line.tokens_out,
            style("·").dim(),
            style(format_elapsed(line.elapsed)).dim(),
        ));
        Ok(())
    }

    fn render_task_completed(&self, task: &DetectedTask) -> Result<()> {
        let priority = match task.priority {
            Priority::High => style("high").red(),
            Priority::Medium => style("medium").yellow(),
            Priority::Low => style("low").dim(),
        };
        self.print_line(format!(
            "  {} Task {}: {} ({})",
            CHECK,
            style(task.id).cyan(),
            task.title,
            priority
        ));
        Ok(())
    }

    fn render_finish(&self, success: bool, message: &str) -> Result<()> {
        if success {
            self.status_bar
                .finish_with_message(format!("{} {}", CHECK, style(message).green().bold()));
        } else {
            self.status_bar
                .abandon_with_message(format!("{} {}", CROSS, style(message).red().bold()));
        }
        Ok(())
    }
}

/// Format a duration as `Xs` or `Xm Ys` past the minute mark.
fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    if secs >= 60 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}s", secs)
    }
}
