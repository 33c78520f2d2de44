//! Project initialization command.

use anyhow::{Context, Result};
use std::path::Path;

use taskmaster::config::TaskmasterToml;

pub fn cmd_init(project_dir: &Path) -> Result<()> {
    let taskmaster_dir = project_dir.join(".taskmaster");
    let config_path = taskmaster_dir.join("taskmaster.toml");
    let already = config_path.exists();

    std::fs::create_dir_all(&taskmaster_dir).with_context(|| {
        format!(
            "Failed to create taskmaster directory: {}",
            taskmaster_dir.display()
        )
    })?;

    if !already {
        let mut toml = TaskmasterToml::default();
        toml.project.name = project_dir
            .file_name()
            .map(|n| n.to_string_lossy().to_string());
        toml.save(&config_path)?;

        println!(
            "Initialized taskmaster project at {}",
            taskmaster_dir.display()
        );
        println!();
        println!("Created:");
        println!("  .taskmaster/");
        println!("  └── taskmaster.toml   # Model and parse settings");
        println!();
        println!("Next steps:");
        println!("  1. Set TASKMASTER_API_KEY (or add it to .env)");
        println!("  2. Run `taskmaster parse-prd <prd.md>` to generate tasks");
        println!("  3. Run `taskmaster list` to review them");
    } else {
        println!(
            "Taskmaster project already initialized at {}",
            taskmaster_dir.display()
        );
    }

    Ok(())
}
