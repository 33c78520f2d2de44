//! Prompt builders for provider calls.
//!
//! The parse-prd system prompt pins down the exact streaming contract the
//! incremental detector relies on: one JSON object per task, each with
//! `id`, `title` and `priority`, followed by a trailing `"metadata"` object
//! that doubles as the end-of-tasks marker.

/// System prompt for PRD parsing.
pub fn parse_prd_system() -> String {
    r#"You are a technical project planner. You convert product requirements
documents into a flat list of implementation tasks.

Output a single JSON object and nothing else. Do not wrap it in a code
fence. The object has this shape:

{
  "tasks": [
    {
      "id": 1,
      "title": "Short imperative title",
      "priority": "high",
      "description": "One or two sentences of detail",
      "dependencies": []
    }
  ],
  "metadata": {
    "total_tasks": 1,
    "source": "prd"
  }
}

Rules:
1. Task ids start at 1 and increase without gaps
2. Every task has a non-empty title and a priority of high, medium or low
3. dependencies lists ids of tasks that must finish first; only reference
   earlier ids
4. Emit each task object completely before starting the next
5. Emit the "metadata" object last, after the tasks array closes"#
        .to_string()
}

/// User prompt for PRD parsing.
pub fn parse_prd_user(prd: &str, num_tasks: usize) -> String {
    format!(
        r#"Break the following PRD into approximately {} implementation tasks.

## PRD
{}"#,
        num_tasks, prd
    )
}

/// System prompt for task expansion.
pub fn expand_system() -> String {
    r#"You are a technical project planner. You break one implementation task
into concrete subtasks.

Output a single JSON object and nothing else:

{
  "subtasks": [
    {"id": 1, "title": "Short imperative title", "description": "Detail"}
  ]
}

Rules:
1. Subtask ids start at 1
2. Every subtask has a non-empty title
3. Subtasks together cover the parent task completely"#
        .to_string()
}

/// User prompt for task expansion.
pub fn expand_user(title: &str, description: Option<&str>, num_subtasks: usize) -> String {
    let detail = description
        .map(|d| format!("\n\n## DETAIL\n{}", d))
        .unwrap_or_default();
    format!(
        r#"Break the following task into approximately {} subtasks.

## TASK
{}{}"#,
        num_subtasks, title, detail
    )
}
