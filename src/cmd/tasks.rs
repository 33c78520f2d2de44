//! Task listing, status changes, and next-task selection.

use anyhow::Result;
use console::style;

use taskmaster::config::AppConfig;
use taskmaster::errors::StoreError;
use taskmaster::tasks::{Task, TaskStatus, TaskStore};

pub fn cmd_list(config: &AppConfig, status_filter: Option<&str>) -> Result<()> {
    let store = TaskStore::new(config.tasks_file());
    if !store.exists() {
        println!();
        println!("No tasks found. Run 'taskmaster parse-prd <prd>' first.");
        println!();
        return Ok(());
    }
    let file = store.load()?;

    let filter: Option<TaskStatus> = match status_filter {
        Some(s) => Some(s.parse()?),
        None => None,
    };

    println!();
    println!("Tasks loaded from: {}", store.path().display());
    if let Some(ref source) = file.meta.source {
        println!("Parsed from: {}", source);
    }
    println!();
    println!(
        "{:<6} {:<12} {:<10} {:<12} Title",
        "ID", "Status", "Priority", "Deps"
    );
    println!(
        "{:<6} {:<12} {:<10} {:<12} -----",
        "----", "------------", "--------", "----"
    );

    let mut shown = 0;
    for task in &file.tasks {
        if let Some(wanted) = filter
            && task.status != wanted
        {
            continue;
        }
        shown += 1;

        let deps = if task.dependencies.is_empty() {
            "-".to_string()
        } else {
            task.dependencies
                .iter()
                .map(|d| d.to_string())
                .collect::<Vec<_>>()
                .join(",")
        };
        println!(
            "{:<6} {:<12} {:<10} {:<12} {}",
            task.id,
            styled_status(task.status),
            task.priority,
            deps,
            task.title
        );

        for subtask in &task.subtasks {
            println!(
                "  {:<4} {:<12} {:<10} {:<12} {}",
                format!("{}.{}", task.id, subtask.id),
                styled_status(subtask.status),
                "",
                "",
                style(&subtask.title).dim()
            );
        }
    }

    println!();
    if filter.is_some() {
        println!("{} of {} tasks shown", shown, file.tasks.len());
    } else {
        let done = file
            .tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Done)
            .count();
        println!("{} tasks ({} done)", file.tasks.len(), done);
    }
    println!();
    Ok(())
}

pub fn cmd_set_status(config: &AppConfig, id: u64, status: &str) -> Result<()> {
    let status: TaskStatus = status.parse()?;

    let store = TaskStore::new(config.tasks_file());
    if !store.exists() {
        return Err(StoreError::NoTaskFile {
            path: store.path().to_path_buf(),
        }
        .into());
    }
    let mut file = store.load()?;

    let task = file.find_task_mut(id).ok_or_else(|| StoreError::TaskNotFound {
        id,
        path: store.path().to_path_buf(),
    })?;
    task.status = status;
    store.save(&file)?;

    println!("Task {} set to {}", id, status);

    if status.is_terminal()
        && let Some(next) = file.next_task()
    {
        println!("Next up: task {} - {}", next.id, next.title);
    }
    Ok(())
}

pub fn cmd_next(config: &AppConfig) -> Result<()> {
    let store = TaskStore::new(config.tasks_file());
    if !store.exists() {
        return Err(StoreError::NoTaskFile {
            path: store.path().to_path_buf(),
        }
        .into());
    }
    let file = store.load()?;

    println!();
    match file.next_task() {
        Some(task) => print_task(task),
        None => {
            let pending = file
                .tasks
                .iter()
                .filter(|t| t.status == TaskStatus::Pending)
                .count();
            if pending == 0 {
                println!("All tasks are done or in progress. Nothing to pick up.");
            } else {
                println!(
                    "{} pending tasks, but all are blocked by unfinished dependencies.",
                    pending
                );
            }
        }
    }
    println!();
    Ok(())
}

fn print_task(task: &Task) {
    println!(
        "Task {}: {} ({})",
        style(task.id).cyan().bold(),
        style(&task.title).bold(),
        task.priority
    );
    if let Some(ref description) = task.description {
        println!("  {}", description);
    }
    if !task.dependencies.is_empty() {
        let deps = task
            .dependencies
            .iter()
            .map(|d| d.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        println!("  Depends on: {}", deps);
    }
    if !task.subtasks.is_empty() {
        println!("  Subtasks:");
        for subtask in &task.subtasks {
            println!("    {}.{} {}", task.id, subtask.id, subtask.title);
        }
    }
    println!();
    println!(
        "Run `taskmaster set-status {} in_progress` to start it.",
        task.id
    );
}

fn styled_status(status: TaskStatus) -> String {
    let text = status.to_string();
    match status {
        TaskStatus::Done => style(text).green().to_string(),
        TaskStatus::InProgress => style(text).cyan().to_string(),
        TaskStatus::Cancelled | TaskStatus::Deferred => style(text).dim().to_string(),
        TaskStatus::Pending => text,
    }
}
