//! The `expand` command: break one task into subtasks via a non-streaming
//! provider call.

use anyhow::{Context, Result};
use serde::Deserialize;

use taskmaster::config::AppConfig;
use taskmaster::errors::{ProviderError, StoreError};
use taskmaster::prompts;
use taskmaster::provider::{LlmClient, extract_json_payload};
use taskmaster::tasks::{Subtask, TaskStatus, TaskStore};

/// Shape of the model's expansion response.
#[derive(Debug, Deserialize)]
struct ExpandResponse {
    #[serde(default)]
    subtasks: Vec<SubtaskCandidate>,
}

#[derive(Debug, Deserialize)]
struct SubtaskCandidate {
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: Option<String>,
}

pub async fn cmd_expand(
    config: &AppConfig,
    id: u64,
    num_subtasks: usize,
    force: bool,
) -> Result<()> {
    let store = TaskStore::new(config.tasks_file());
    if !store.exists() {
        return Err(StoreError::NoTaskFile {
            path: store.path().to_path_buf(),
        }
        .into());
    }
    let mut file = store.load()?;

    let task = file.find_task(id).ok_or_else(|| StoreError::TaskNotFound {
        id,
        path: store.path().to_path_buf(),
    })?;
    let title = task.title.clone();
    let description = task.description.clone();
    let existing = task.subtasks.len();

    if existing > 0 && !force && !config.yes {
        let confirm = dialoguer::Confirm::new()
            .with_prompt(format!(
                "Task {} already has {} subtasks. Replace them?",
                id, existing
            ))
            .default(false)
            .interact()
            .unwrap_or(false);
        if !confirm {
            println!("Expand cancelled");
            return Ok(());
        }
    }

    println!("Expanding task {}: {}", id, title);

    let client = LlmClient::from_env(config.provider_config())?;
    let system = prompts::expand_system();
    let user = prompts::expand_user(&title, description.as_deref(), num_subtasks);
    let response = client.complete(&system, &user).await?;

    let payload = extract_json_payload(&response).ok_or(ProviderError::EmptyResponse)?;
    let parsed: ExpandResponse =
        serde_json::from_str(&payload).context("Failed to parse subtask response")?;

    let subtasks: Vec<Subtask> = parsed
        .subtasks
        .into_iter()
        .filter(|c| !c.title.trim().is_empty())
        .enumerate()
        .map(|(i, c)| Subtask {
            id: i as u64 + 1,
            title: c.title,
            description: c.description,
            status: TaskStatus::Pending,
        })
        .collect();

    if subtasks.is_empty() {
        return Err(ProviderError::EmptyResponse.into());
    }

    let count = subtasks.len();
    let task = file
        .find_task_mut(id)
        .expect("task present; checked above");
    task.subtasks = subtasks;
    store.save(&file)?;

    println!("Task {} expanded into {} subtasks:", id, count);
    for subtask in &file.find_task(id).expect("task present").subtasks {
        println!("  {}.{} {}", id, subtask.id, subtask.title);
    }
    Ok(())
}
