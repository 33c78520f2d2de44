//! Incremental task detection inside a streaming LLM response.
//!
//! The provider streams the task-list JSON token by token, so at any moment
//! the accumulated text is an incomplete document. This module finds task
//! objects that are already complete inside that partial document and emits
//! each one exactly once, as soon as it becomes parseable.
//!
//! Detection uses an explicit character scanner rather than a regex: it
//! tracks string literals (so braces inside descriptions don't confuse it)
//! and matches innermost balanced `{...}` spans. Task objects in the target
//! schema are flat - arrays like `dependencies` are fine, nested objects are
//! not - so the innermost-object rule is exactly the task shape.

use crate::tasks::Priority;
use serde::Deserialize;

/// A task recognized inside the partial stream.
///
/// Immutable once detected; the detector guarantees at most one emission
/// per id for its lifetime.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectedTask {
    pub id: u64,
    pub title: String,
    pub priority: Priority,
    pub description: Option<String>,
    pub dependencies: Vec<u64>,
}

/// Candidate shape parsed from a balanced object span.
///
/// Unknown fields are tolerated - the model may emit `details`,
/// `test_strategy`, or anything else alongside the core fields.
#[derive(Debug, Deserialize)]
struct RawCandidate {
    id: u64,
    #[serde(default)]
    title: String,
    #[serde(default)]
    priority: Option<Priority>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    dependencies: Vec<u64>,
}

/// Scans a growing stream buffer for newly-completed task objects.
///
/// Owns the unconsumed buffer tail and the set of already-emitted ids.
/// Not shared across sessions; create a fresh detector per stream.
#[derive(Debug, Default)]
pub struct IncrementalTaskDetector {
    buffer: String,
    seen_ids: std::collections::HashSet<u64>,
}

impl IncrementalTaskDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a stream chunk and return the tasks that became complete.
    ///
    /// Parse failures on balanced spans are expected (the span may be a
    /// metadata object or a shape we don't recognize) and are skipped
    /// silently. A trailing partial object is kept in the buffer for the
    /// next call. Repeated ids are never re-emitted.
    pub fn feed(&mut self, chunk: &str) -> Vec<DetectedTask> {
        self.buffer.push_str(chunk);
        self.scan()
    }

    /// Number of ids emitted so far.
    pub fn detected_count(&self) -> usize {
        self.seen_ids.len()
    }

    /// Highest id emitted so far, if any. Used by the progress estimator
    /// to revise the expected task count upward.
    pub fn max_detected_id(&self) -> Option<u64> {
        self.seen_ids.iter().copied().max()
    }

    #[cfg(test)]
    fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    fn scan(&mut self) -> Vec<DetectedTask> {
        let mut found = Vec::new();

        // Innermost-object scan: every '{' restarts the candidate, so a
        // wrapper like `{"tasks": [` never captures its children.
        let mut start: Option<usize> = None;
        let mut in_string = false;
        let mut string_start = 0usize;
        let mut escaped = false;

        for (i, ch) in self.buffer.char_indices() {
            if in_string {
                if escaped {
                    escaped = false;
                } else if ch == '\\' {
                    escaped = true;
                } else if ch == '"' {
                    in_string = false;
                }
                continue;
            }
            match ch {
                '"' => {
                    in_string = true;
                    string_start = i;
                }
                '{' => start = Some(i),
                '}' => {
                    if let Some(s) = start.take() {
                        let span = &self.buffer[s..=i];
                        if let Some(task) = self.try_candidate(span) {
                            self.seen_ids.insert(task.id);
                            found.push(task);
                        }
                    }
                }
                _ => {}
            }
        }

        // Keep only the open tail: an unclosed candidate object, or an
        // unclosed string literal that might be hiding future braces.
        let cut = match (start, in_string) {
            (Some(s), _) => s,
            (None, true) => string_start,
            (None, false) => self.buffer.len(),
        };
        self.buffer.drain(..cut);

        found
    }

    /// Parse one balanced span into a task, applying the emission rules:
    /// positive id, non-empty title, priority present, id not seen before.
    ///
    /// A complete object without a priority is withheld rather than emitted
    /// with a misleading default; if the model restates it later with a
    /// priority, it is emitted then.
    fn try_candidate(&self, span: &str) -> Option<DetectedTask> {
        let raw: RawCandidate = serde_json::from_str(span).ok()?;
        if raw.id == 0 || raw.title.trim().is_empty() {
            return None;
        }
        let priority = raw.priority?;
        if self.seen_ids.contains(&raw.id) {
            return None;
        }
        Some(DetectedTask {
            id: raw.id,
            title: raw.title,
            priority,
            description: raw.description,
            dependencies: raw.dependencies,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed_all(detector: &mut IncrementalTaskDetector, chunks: &[&str]) -> Vec<DetectedTask> {
        chunks
            .iter()
            .flat_map(|c| detector.feed(c))
            .collect()
    }

    #[test]
    fn test_split_object_across_two_chunks() {
        let mut detector = IncrementalTaskDetector::new();

        let first = detector.feed(r#"{"id": 1, "ti"#);
        assert!(first.is_empty());

        let second =
            detector.feed(r#"tle": "Setup repo", "priority": "high"}{"id": 2, "title": "Write"#);
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].id, 1);
        assert_eq!(second[0].title, "Setup repo");
        assert_eq!(second[0].priority, Priority::High);
    }

    #[test]
    fn test_repeated_id_emitted_once() {
        let mut detector = IncrementalTaskDetector::new();
        let task = r#"{"id": 3, "title": "Repeat me", "priority": "low"}"#;
        let tasks = feed_all(&mut detector, &[task, " some text ", task, task]);
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].id, 3);
    }

    #[test]
    fn test_repeated_id_within_one_chunk_emitted_once() {
        let mut detector = IncrementalTaskDetector::new();
        let tasks = detector.feed(
            r#"{"id": 3, "title": "Repeat me", "priority": "low"}
               {"id": 3, "title": "Repeat me", "priority": "low"}"#,
        );
        assert_eq!(tasks.len(), 1);
    }

    #[test]
    fn test_out_of_order_ids_detected_individually() {
        let mut detector = IncrementalTaskDetector::new();
        let tasks = detector.feed(
            r#"{"id": 5, "title": "Fifth", "priority": "medium"}
               {"id": 2, "title": "Second", "priority": "high"}"#,
        );
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].id, 5);
        assert_eq!(tasks[1].id, 2);
        assert_eq!(detector.max_detected_id(), Some(5));
    }

    #[test]
    fn test_dependencies_array_inside_object() {
        let mut detector = IncrementalTaskDetector::new();
        let tasks = detector.feed(
            r#"{"id": 4, "title": "Wire it up", "priority": "medium", "dependencies": [1, 2]}"#,
        );
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].dependencies, vec![1, 2]);
    }

    #[test]
    fn test_braces_inside_string_values_ignored() {
        let mut detector = IncrementalTaskDetector::new();
        let tasks = detector.feed(
            r#"{"id": 7, "title": "Template engine", "priority": "low",
                "description": "Support {var} and {{escaped}} syntax"}"#,
        );
        assert_eq!(tasks.len(), 1);
        assert_eq!(
            tasks[0].description.as_deref(),
            Some("Support {var} and {{escaped}} syntax")
        );
    }

    #[test]
    fn test_escaped_quote_inside_string() {
        let mut detector = IncrementalTaskDetector::new();
        let tasks = detector
            .feed(r#"{"id": 8, "title": "Handle \"quoted\" text", "priority": "high"}"#);
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].title, r#"Handle "quoted" text"#);
    }

    #[test]
    fn test_wrapper_and_metadata_objects_skipped() {
        let mut detector = IncrementalTaskDetector::new();
        let tasks = detector.feed(
            r#"{"tasks": [{"id": 1, "title": "Only task", "priority": "high"}],
                "metadata": {"projectName": "demo", "totalTasks": 1}}"#,
        );
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].id, 1);
    }

    #[test]
    fn test_missing_priority_withheld_until_restated() {
        let mut detector = IncrementalTaskDetector::new();

        let without = detector.feed(r#"{"id": 9, "title": "No priority yet"}"#);
        assert!(without.is_empty());

        // Model restates the task with its priority filled in.
        let with = detector.feed(r#"{"id": 9, "title": "No priority yet", "priority": "medium"}"#);
        assert_eq!(with.len(), 1);
        assert_eq!(with[0].priority, Priority::Medium);
    }

    #[test]
    fn test_zero_and_missing_id_rejected() {
        let mut detector = IncrementalTaskDetector::new();
        let tasks = detector.feed(
            r#"{"id": 0, "title": "Bad id", "priority": "low"}
               {"title": "No id", "priority": "low"}"#,
        );
        assert!(tasks.is_empty());
    }

    #[test]
    fn test_empty_title_rejected() {
        let mut detector = IncrementalTaskDetector::new();
        let tasks = detector.feed(r#"{"id": 11, "title": "  ", "priority": "low"}"#);
        assert!(tasks.is_empty());
    }

    #[test]
    fn test_buffer_truncated_after_consumption() {
        let mut detector = IncrementalTaskDetector::new();
        detector.feed(r#"{"id": 1, "title": "Done", "priority": "high"}"#);
        assert_eq!(detector.buffered_len(), 0);

        // A trailing partial object is retained, nothing more.
        detector.feed(r#"{"id": 2, "title": "Parti"#);
        assert_eq!(detector.buffered_len(), r#"{"id": 2, "title": "Parti"#.len());
    }

    #[test]
    fn test_plain_text_between_objects_does_not_accumulate() {
        let mut detector = IncrementalTaskDetector::new();
        detector.feed("Here is some narration from the model with no json at all. ");
        assert_eq!(detector.buffered_len(), 0);
    }

    #[test]
    fn test_detected_count_tracks_unique_ids() {
        let mut detector = IncrementalTaskDetector::new();
        feed_all(
            &mut detector,
            &[
                r#"{"id": 1, "title": "A", "priority": "high"}"#,
                r#"{"id": 2, "title": "B", "priority": "low"}"#,
                r#"{"id": 1, "title": "A again", "priority": "high"}"#,
            ],
        );
        assert_eq!(detector.detected_count(), 2);
    }
}
