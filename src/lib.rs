//! Library core of the taskmaster CLI.
//!
//! The centerpiece is the streaming parse pipeline: `provider` delivers raw
//! text deltas from the LLM, `detector` pulls complete task objects out of
//! the partial JSON, and `progress` turns both into a live estimate that a
//! `ui` sink renders. `tasks` persists the result.

pub mod config;
pub mod detector;
pub mod errors;
pub mod progress;
pub mod prompts;
pub mod provider;
pub mod tasks;
pub mod tokens;
pub mod ui;
