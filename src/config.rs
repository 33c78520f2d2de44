//! Configuration system for taskmaster.
//!
//! Reads from `.taskmaster/taskmaster.toml` inside the project directory.
//! Settings layer as file → environment → CLI flags.
//!
//! # Configuration File Format
//!
//! ```toml
//! [project]
//! name = "my-project"
//!
//! [model]
//! name = "claude-sonnet-4-20250514"
//! base_url = "https://api.anthropic.com"
//! max_tokens = 8192
//! temperature = 0.2
//!
//! [parse]
//! default_num_tasks = 10
//! token_threshold = 1500
//! max_step = 3
//! ```

use crate::provider::ProviderConfig;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Project-level settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectSection {
    /// Project name (optional, defaults to directory name)
    #[serde(default)]
    pub name: Option<String>,
}

/// Model settings for provider calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSection {
    /// Model identifier sent to the provider
    #[serde(default = "default_model_name")]
    pub name: String,
    /// Provider base URL
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Response token ceiling
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

fn default_model_name() -> String {
    "claude-sonnet-4-20250514".to_string()
}

fn default_base_url() -> String {
    "https://api.anthropic.com".to_string()
}

fn default_max_tokens() -> u32 {
    8192
}

fn default_temperature() -> f32 {
    0.2
}

impl Default for ModelSection {
    fn default() -> Self {
        Self {
            name: default_model_name(),
            base_url: default_base_url(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
        }
    }
}

/// Settings for the streaming parse and its progress estimation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParseSection {
    /// How many tasks to request when the CLI doesn't say
    #[serde(default = "default_num_tasks")]
    pub default_num_tasks: usize,
    /// Token count treated as a full analysis phase
    #[serde(default = "default_token_threshold")]
    pub token_threshold: usize,
    /// Maximum percent jump per progress update
    #[serde(default = "default_max_step")]
    pub max_step: u8,
}

fn default_num_tasks() -> usize {
    10
}

fn default_token_threshold() -> usize {
    1500
}

fn default_max_step() -> u8 {
    3
}

impl Default for ParseSection {
    fn default() -> Self {
        Self {
            default_num_tasks: default_num_tasks(),
            token_threshold: default_token_threshold(),
            max_step: default_max_step(),
        }
    }
}

/// The complete taskmaster.toml structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskmasterToml {
    /// Project-level settings
    #[serde(default)]
    pub project: ProjectSection,
    /// Model settings
    #[serde(default)]
    pub model: ModelSection,
    /// Parse and progress settings
    #[serde(default)]
    pub parse: ParseSection,
}

impl TaskmasterToml {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse taskmaster.toml")
    }

    /// Load from the default location (.taskmaster/taskmaster.toml).
    /// Returns defaults if the file doesn't exist.
    pub fn load_or_default(taskmaster_dir: &Path) -> Result<Self> {
        let config_path = taskmaster_dir.join("taskmaster.toml");
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content =
            toml::to_string_pretty(self).context("Failed to serialize taskmaster.toml")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Model name, with `TASKMASTER_MODEL` taking precedence over the file.
    pub fn model_name(&self) -> String {
        std::env::var("TASKMASTER_MODEL").unwrap_or_else(|_| self.model.name.clone())
    }

    /// Validate the configuration and return any warnings.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.model.max_tokens == 0 {
            warnings.push("model.max_tokens is 0; the provider will reject requests".to_string());
        }
        if !(0.0..=1.0).contains(&self.model.temperature) {
            warnings.push(format!(
                "model.temperature {} is outside the usual 0.0-1.0 range",
                self.model.temperature
            ));
        }
        if self.parse.default_num_tasks == 0 {
            warnings
                .push("parse.default_num_tasks is 0; parse-prd would request no tasks".to_string());
        }
        if self.parse.max_step == 0 {
            warnings.push("parse.max_step is 0; the progress bar would never advance".to_string());
        }

        warnings
    }
}

/// Runtime configuration merging taskmaster.toml with CLI flags.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Path to the project directory
    pub project_dir: PathBuf,
    /// Path to the .taskmaster directory
    pub taskmaster_dir: PathBuf,
    /// Parsed taskmaster.toml
    pub toml: TaskmasterToml,
    /// CLI override: verbose mode
    pub verbose: bool,
    /// CLI override: skip confirmation prompts
    pub yes: bool,
}

impl AppConfig {
    /// Create an AppConfig from a project directory.
    pub fn new(project_dir: PathBuf) -> Result<Self> {
        let project_dir = project_dir
            .canonicalize()
            .context("Failed to resolve project directory")?;
        let taskmaster_dir = project_dir.join(".taskmaster");
        let toml = TaskmasterToml::load_or_default(&taskmaster_dir)?;

        Ok(Self {
            project_dir,
            taskmaster_dir,
            toml,
            verbose: false,
            yes: false,
        })
    }

    /// Create AppConfig with CLI overrides applied.
    pub fn with_cli_args(project_dir: PathBuf, verbose: bool, yes: bool) -> Result<Self> {
        let mut config = Self::new(project_dir)?;
        config.verbose = verbose;
        config.yes = yes;
        Ok(config)
    }

    /// Get path to the config file.
    pub fn config_file(&self) -> PathBuf {
        self.taskmaster_dir.join("taskmaster.toml")
    }

    /// Get path to the task list file.
    pub fn tasks_file(&self) -> PathBuf {
        self.taskmaster_dir.join("tasks.json")
    }

    /// Build provider settings from the model section.
    pub fn provider_config(&self) -> ProviderConfig {
        ProviderConfig {
            model: self.toml.model_name(),
            base_url: self.toml.model.base_url.clone(),
            max_tokens: self.toml.model.max_tokens,
            temperature: self.toml.model.temperature,
        }
    }

    /// Validate configuration and return warnings.
    pub fn validate(&self) -> Vec<String> {
        self.toml.validate()
    }
}
