//! The `parse-prd` command: stream a PRD breakdown from the provider with
//! live progress, then persist the detected tasks.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use taskmaster::config::AppConfig;
use taskmaster::progress::{
    DisplaySink, NullSink, ParseSummary, ProgressEstimator, ProgressTracker, SessionMeta,
};
use taskmaster::prompts;
use taskmaster::provider::{LlmClient, StreamEvent};
use taskmaster::tasks::{Task, TaskFile, TaskStore, validate_dependencies};
use taskmaster::ui::ConsoleSink;

/// Baseline output tokens for a session before any tasks.
const SESSION_BASE_TOKENS: usize = 800;

/// Rough output tokens each requested task adds.
const TOKENS_PER_TASK: usize = 150;

pub async fn cmd_parse_prd(
    config: &AppConfig,
    prd_path: &Path,
    num_tasks: Option<usize>,
    output: Option<PathBuf>,
    headless: bool,
    force: bool,
) -> Result<()> {
    let prd = std::fs::read_to_string(prd_path)
        .with_context(|| format!("Failed to read PRD file: {}", prd_path.display()))?;
    if prd.trim().is_empty() {
        anyhow::bail!("PRD file is empty: {}", prd_path.display());
    }

    let store = TaskStore::new(output.unwrap_or_else(|| config.tasks_file()));
    let recovery_mode = store.exists();
    if recovery_mode && !force && !config.yes {
        let confirm = dialoguer::Confirm::new()
            .with_prompt(format!(
                "{} already exists. Overwrite it?",
                store.path().display()
            ))
            .default(false)
            .interact()
            .unwrap_or(false);
        if !confirm {
            println!("Parse cancelled");
            return Ok(());
        }
    }

    let client = LlmClient::from_env(config.provider_config())?;
    let num_tasks = num_tasks.unwrap_or(config.toml.parse.default_num_tasks);
    let estimated_tokens = SESSION_BASE_TOKENS + TOKENS_PER_TASK * num_tasks;

    let sink: Box<dyn DisplaySink> = if headless {
        Box::new(NullSink)
    } else {
        Box::new(ConsoleSink::new())
    };
    let estimator = ProgressEstimator::new(num_tasks, estimated_tokens)
        .with_token_threshold(config.toml.parse.token_threshold)
        .with_max_step(config.toml.parse.max_step);
    let mut tracker =
        ProgressTracker::new(sink, num_tasks, estimated_tokens).with_estimator(estimator);

    tracker.start(SessionMeta {
        output_path: Some(store.path().to_path_buf()),
        action_verb: if recovery_mode { "regenerated" } else { "generated" }.to_string(),
        recovery_mode,
    });

    let system = prompts::parse_prd_system();
    let user = prompts::parse_prd_user(&prd, num_tasks);

    let streamed = client
        .stream_completion(&system, &user, |event| match event {
            StreamEvent::TextDelta(text) => tracker.update_streamed_text(&text),
            StreamEvent::Usage {
                input_tokens,
                output_tokens,
            } => tracker.update_tokens(input_tokens, output_tokens),
            StreamEvent::Stop => {}
        })
        .await;

    if let Err(e) = streamed {
        tracker.abort(&format!("parse failed: {}", e));
        return Err(e.into());
    }

    let tasks: Vec<Task> = tracker
        .detected_tasks()
        .iter()
        .cloned()
        .map(Task::from)
        .collect();

    if tasks.is_empty() {
        tracker.abort("no tasks found in the response");
        anyhow::bail!("The model produced no parseable tasks. Try again or adjust the PRD.");
    }

    if let Err(e) = validate_dependencies(&tasks) {
        // Save anyway; a bad dependency edge shouldn't discard the parse.
        eprintln!(
            "{} {}",
            console::style("warning:").yellow().bold(),
            console::style(format!("dependency validation failed: {}", e)).yellow()
        );
    }

    let mut file = TaskFile::default();
    file.meta.project_name = config.toml.project.name.clone();
    file.meta.source = Some(prd_path.display().to_string());
    file.tasks = tasks;
    store.save(&file)?;

    if let Some(summary) = tracker.finish(true) {
        print_summary(&summary);
    }
    Ok(())
}

fn print_summary(summary: &ParseSummary) {
    println!();
    println!(
        "{}{} tasks {} in {:.1}s",
        taskmaster::ui::icons::SPARKLE,
        summary.total_tasks,
        summary.action_verb,
        summary.elapsed_seconds
    );
    println!(
        "Priorities: {} high, {} medium, {} low",
        summary.priority_counts.high, summary.priority_counts.medium, summary.priority_counts.low
    );
    if summary.tokens_in > 0 || summary.tokens_out > 0 {
        println!(
            "Tokens: {} in, {} out",
            summary.tokens_in, summary.tokens_out
        );
    }
    if let Some(ref path) = summary.output_path {
        println!("Saved to {}", path.display());
    }
    println!();
    println!("Next steps:");
    println!("  1. Run `taskmaster list` to review the tasks");
    println!("  2. Run `taskmaster next` to pick the first one up");
}
