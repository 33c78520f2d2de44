//! Core types for the task list.
//!
//! These types define the shape persisted in `.taskmaster/tasks.json` and
//! shared by every command.

use crate::detector::DetectedTask;
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Task priority as emitted by the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

impl Priority {
    /// Sort weight: lower runs first.
    pub fn weight(&self) -> u8 {
        match self {
            Priority::High => 0,
            Priority::Medium => 1,
            Priority::Low => 2,
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Priority::High => write!(f, "high"),
            Priority::Medium => write!(f, "medium"),
            Priority::Low => write!(f, "low"),
        }
    }
}

impl std::str::FromStr for Priority {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "high" => Ok(Priority::High),
            "medium" => Ok(Priority::Medium),
            "low" => Ok(Priority::Low),
            _ => anyhow::bail!("Invalid priority '{}'. Valid values: high, medium, low", s),
        }
    }
}

/// Lifecycle status of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Waiting to be worked on.
    #[default]
    Pending,
    /// Currently being worked on.
    InProgress,
    /// Completed.
    Done,
    /// Postponed indefinitely.
    Deferred,
    /// Abandoned.
    Cancelled,
}

impl TaskStatus {
    /// Whether the task no longer blocks its dependents.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Cancelled)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::Pending => write!(f, "pending"),
            TaskStatus::InProgress => write!(f, "in_progress"),
            TaskStatus::Done => write!(f, "done"),
            TaskStatus::Deferred => write!(f, "deferred"),
            TaskStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "pending" => Ok(TaskStatus::Pending),
            "in_progress" => Ok(TaskStatus::InProgress),
            "done" => Ok(TaskStatus::Done),
            "deferred" => Ok(TaskStatus::Deferred),
            "cancelled" => Ok(TaskStatus::Cancelled),
            _ => anyhow::bail!(
                "Invalid status '{}'. Valid values: pending, in_progress, done, deferred, cancelled",
                s
            ),
        }
    }
}

/// A subtask created by expanding a parent task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subtask {
    /// 1-based index within the parent task.
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: TaskStatus,
}

/// A single tracked task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Unique identifier, assigned by the model during parsing.
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Implementation notes, filled in by `expand`.
    #[serde(default)]
    pub details: Option<String>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub status: TaskStatus,
    /// Ids of tasks that must be done first.
    #[serde(default)]
    pub dependencies: Vec<u64>,
    #[serde(default)]
    pub subtasks: Vec<Subtask>,
}

impl Task {
    pub fn new(id: u64, title: &str) -> Self {
        Self {
            id,
            title: title.to_string(),
            description: None,
            details: None,
            priority: Priority::default(),
            status: TaskStatus::default(),
            dependencies: Vec::new(),
            subtasks: Vec::new(),
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_dependencies(mut self, dependencies: Vec<u64>) -> Self {
        self.dependencies = dependencies;
        self
    }

    /// Whether this task can be started given the full task list.
    pub fn is_workable(&self, all: &[Task]) -> bool {
        self.status == TaskStatus::Pending
            && self.dependencies.iter().all(|dep| {
                all.iter()
                    .find(|t| t.id == *dep)
                    .is_some_and(|t| t.status.is_terminal())
            })
    }
}

impl From<DetectedTask> for Task {
    fn from(detected: DetectedTask) -> Self {
        Self {
            id: detected.id,
            title: detected.title,
            description: detected.description,
            details: None,
            priority: detected.priority,
            status: TaskStatus::Pending,
            dependencies: detected.dependencies,
            subtasks: Vec::new(),
        }
    }
}

/// Metadata block persisted alongside the task list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskFileMeta {
    #[serde(default)]
    pub project_name: Option<String>,
    pub generated_at: DateTime<Utc>,
    /// Path of the PRD this list was parsed from.
    #[serde(default)]
    pub source: Option<String>,
}

impl Default for TaskFileMeta {
    fn default() -> Self {
        Self {
            project_name: None,
            generated_at: Utc::now(),
            source: None,
        }
    }
}

/// The persisted `tasks.json` document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskFile {
    #[serde(default)]
    pub meta: TaskFileMeta,
    #[serde(default)]
    pub tasks: Vec<Task>,
}

impl TaskFile {
    pub fn find_task(&self, id: u64) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn find_task_mut(&mut self, id: u64) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|t| t.id == id)
    }

    /// Pick the next workable task: pending, all dependencies terminal,
    /// highest priority first, then lowest id.
    pub fn next_task(&self) -> Option<&Task> {
        self.tasks
            .iter()
            .filter(|t| t.is_workable(&self.tasks))
            .min_by_key(|t| (t.priority.weight(), t.id))
    }
}

/// Validate the dependency graph of a task list.
///
/// Checks:
/// - All task ids are unique
/// - All dependencies reference known task ids
/// - No task depends on itself
/// - No circular dependencies
pub fn validate_dependencies(tasks: &[Task]) -> Result<()> {
    use std::collections::{HashMap, HashSet};

    let mut ids: HashSet<u64> = HashSet::new();
    for task in tasks {
        if !ids.insert(task.id) {
            anyhow::bail!("Duplicate task id: {}", task.id);
        }
    }

    for task in tasks {
        for dep in &task.dependencies {
            if !ids.contains(dep) {
                anyhow::bail!("Task {} depends on unknown task {}", task.id, dep);
            }
            if *dep == task.id {
                anyhow::bail!("Task {} depends on itself", task.id);
            }
        }
    }

    // Iterative resolution - if no progress can be made, there's a cycle.
    let dep_map: HashMap<u64, &[u64]> = tasks
        .iter()
        .map(|t| (t.id, t.dependencies.as_slice()))
        .collect();

    let mut resolved: HashSet<u64> = HashSet::new();
    let mut pending: Vec<u64> = tasks.iter().map(|t| t.id).collect();

    while !pending.is_empty() {
        let mut made_progress = false;
        pending.retain(|id| {
            let deps = dep_map.get(id).copied().unwrap_or(&[]);
            if deps.iter().all(|d| resolved.contains(d)) {
                resolved.insert(*id);
                made_progress = true;
                false
            } else {
                true
            }
        });

        if !made_progress {
            anyhow::bail!("Circular dependency detected involving tasks: {:?}", pending);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(id: u64, deps: Vec<u64>) -> Task {
        Task::new(id, &format!("Task {}", id)).with_dependencies(deps)
    }

    // =========================================
    // validate_dependencies tests
    // =========================================

    #[test]
    fn test_validate_valid_chain() {
        let tasks = vec![task(1, vec![]), task(2, vec![1]), task(3, vec![1, 2])];
        assert!(validate_dependencies(&tasks).is_ok());
    }

    #[test]
    fn test_validate_duplicate_id() {
        let tasks = vec![task(1, vec![]), task(1, vec![])];
        let err = validate_dependencies(&tasks).unwrap_err();
        assert!(err.to_string().contains("Duplicate"));
    }

    #[test]
    fn test_validate_unknown_dependency() {
        let tasks = vec![task(1, vec![99])];
        let err = validate_dependencies(&tasks).unwrap_err();
        assert!(err.to_string().contains("unknown task"));
    }

    #[test]
    fn test_validate_self_dependency() {
        let tasks = vec![task(1, vec![1])];
        let err = validate_dependencies(&tasks).unwrap_err();
        assert!(err.to_string().contains("depends on itself"));
    }

    #[test]
    fn test_validate_cycle() {
        let tasks = vec![task(1, vec![2]), task(2, vec![1])];
        let err = validate_dependencies(&tasks).unwrap_err();
        assert!(err.to_string().contains("Circular"));
    }

    // =========================================
    // next_task tests
    // =========================================

    #[test]
    fn test_next_task_respects_dependencies() {
        let mut file = TaskFile::default();
        file.tasks = vec![task(1, vec![]), task(2, vec![1])];

        assert_eq!(file.next_task().unwrap().id, 1);

        file.find_task_mut(1).unwrap().status = TaskStatus::Done;
        assert_eq!(file.next_task().unwrap().id, 2);
    }

    #[test]
    fn test_next_task_prefers_high_priority() {
        let mut file = TaskFile::default();
        file.tasks = vec![
            task(1, vec![]).with_priority(Priority::Low),
            task(2, vec![]).with_priority(Priority::High),
            task(3, vec![]).with_priority(Priority::High),
        ];
        // High priority wins; ties break on lowest id.
        assert_eq!(file.next_task().unwrap().id, 2);
    }

    #[test]
    fn test_next_task_none_when_all_blocked() {
        let mut file = TaskFile::default();
        file.tasks = vec![task(1, vec![]), task(2, vec![1])];
        file.find_task_mut(1).unwrap().status = TaskStatus::InProgress;
        assert!(file.next_task().is_none());
    }

    #[test]
    fn test_cancelled_dependency_unblocks() {
        let mut file = TaskFile::default();
        file.tasks = vec![task(1, vec![]), task(2, vec![1])];
        file.find_task_mut(1).unwrap().status = TaskStatus::Cancelled;
        assert_eq!(file.next_task().unwrap().id, 2);
    }

    // =========================================
    // Enum round-trip tests
    // =========================================

    #[test]
    fn test_priority_parse_and_display() {
        assert_eq!("HIGH".parse::<Priority>().unwrap(), Priority::High);
        assert_eq!(Priority::Low.to_string(), "low");
        assert!("urgent".parse::<Priority>().is_err());
    }

    #[test]
    fn test_status_parse_accepts_dashes() {
        assert_eq!(
            "in-progress".parse::<TaskStatus>().unwrap(),
            TaskStatus::InProgress
        );
        assert!("finished".parse::<TaskStatus>().is_err());
    }

    #[test]
    fn test_task_serde_round_trip() {
        let original = Task::new(1, "Round trip")
            .with_priority(Priority::High)
            .with_dependencies(vec![2, 3]);
        let json = serde_json::to_string(&original).unwrap();
        let parsed: Task = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, original);
    }

    #[test]
    fn test_detected_task_conversion() {
        let detected = crate::detector::DetectedTask {
            id: 4,
            title: "From stream".to_string(),
            priority: Priority::High,
            description: Some("desc".to_string()),
            dependencies: vec![1],
        };
        let task: Task = detected.into();
        assert_eq!(task.id, 4);
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.dependencies, vec![1]);
    }
}
