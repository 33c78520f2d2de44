//! Typed error hierarchy for taskmaster.
//!
//! Two top-level enums cover the two fallible subsystems:
//! - `ProviderError` — LLM API call and stream failures
//! - `StoreError` — task file persistence failures
//!
//! The streaming parse tracker deliberately has no error type: it absorbs
//! and logs every anomaly so it can never fail the parse it decorates.

use thiserror::Error;

/// Errors from the LLM provider client.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("No API key found. Set TASKMASTER_API_KEY or add it to .env")]
    MissingApiKey,

    #[error("Request to provider failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Provider returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Stream ended unexpectedly: {0}")]
    StreamInterrupted(String),

    #[error("Provider response contained no usable JSON payload")]
    EmptyResponse,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Errors from task list persistence.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Task {id} not found in {path}")]
    TaskNotFound { id: u64, path: std::path::PathBuf },

    #[error("No task file at {path}. Run 'taskmaster parse-prd' first")]
    NoTaskFile { path: std::path::PathBuf },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_api_carries_status() {
        let err = ProviderError::Api {
            status: 429,
            message: "rate limited".to_string(),
        };
        match &err {
            ProviderError::Api { status, .. } => assert_eq!(*status, 429),
            _ => panic!("Expected Api variant"),
        }
        assert!(err.to_string().contains("429"));
    }

    #[test]
    fn store_error_task_not_found_names_id() {
        let err = StoreError::TaskNotFound {
            id: 7,
            path: std::path::PathBuf::from("tasks.json"),
        };
        assert!(err.to_string().contains('7'));
    }

    #[test]
    fn all_error_types_implement_std_error_trait() {
        fn assert_std_error<E: std::error::Error>(_: &E) {}
        assert_std_error(&ProviderError::MissingApiKey);
        assert_std_error(&StoreError::NoTaskFile {
            path: std::path::PathBuf::from("x"),
        });
    }
}
