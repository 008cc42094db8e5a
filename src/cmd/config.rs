//! Configuration view and validation commands: `taskorder config`.

use std::path::Path;

use anyhow::{Context, Result};
use console::style;
use taskorder::config::TaskorderToml;

use super::super::ConfigCommands;

pub fn cmd_config(
    config: &TaskorderToml,
    explicit_path: Option<&Path>,
    command: Option<ConfigCommands>,
) -> Result<()> {
    let config_path = explicit_path
        .map(Path::to_path_buf)
        .unwrap_or_else(TaskorderToml::default_path);

    match command {
        None | Some(ConfigCommands::Show) => {
            if config_path.exists() {
                println!("Config file: {}", config_path.display());
            } else {
                println!(
                    "No taskorder.toml at {}; using defaults",
                    config_path.display()
                );
            }
            println!();
            let mut shown = config.clone();
            if shown.remote.token.is_some() {
                shown.remote.token = Some("(redacted)".to_string());
            }
            let rendered =
                toml::to_string_pretty(&shown).context("Failed to render configuration")?;
            println!("{}", rendered.trim_end());
            println!();

            println!("{}", style("Effective values (with env overrides):").bold());
            println!("  port = {}", config.port());
            println!(
                "  remote_url = {}",
                config.remote_url().as_deref().unwrap_or("(not set)")
            );
            println!(
                "  remote_token = {}",
                if config.remote_token().is_some() {
                    "(set)"
                } else {
                    "(not set)"
                }
            );
        }
        Some(ConfigCommands::Validate) => {
            let problems = config.validate();
            if problems.is_empty() {
                println!("Configuration is valid.");
            } else {
                println!("{}", style("Configuration problems:").yellow());
                for problem in &problems {
                    println!("  - {}", problem);
                }
                anyhow::bail!("{} configuration problem(s)", problems.len());
            }
        }
        Some(ConfigCommands::Init) => {
            if config_path.exists() {
                println!("taskorder.toml already exists at {}", config_path.display());
                println!("Delete it first if you want to recreate it.");
                return Ok(());
            }
            TaskorderToml::default().save(&config_path)?;
            println!("Created taskorder.toml at {}", config_path.display());
        }
    }

    Ok(())
}
