//! Tracing subscriber setup for the CLI and the board server.
//!
//! Output goes to stderr so command output on stdout stays clean. When a
//! log directory is configured, a second layer writes daily-rotated files
//! through a non-blocking writer; keep the returned guard alive until exit.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::LoggingSection;

/// Log file name prefix inside the log directory.
pub const LOG_FILENAME: &str = "taskorder.log";

#[derive(Debug, Clone, PartialEq)]
pub struct LogConfig {
    /// Filter directive used when `RUST_LOG` is unset.
    pub level: String,
    pub json: bool,
    pub dir: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            dir: None,
        }
    }
}

impl LogConfig {
    /// `verbose` raises the level to debug.
    pub fn from_section(section: &LoggingSection, verbose: bool) -> Self {
        Self {
            level: if verbose {
                "debug".to_string()
            } else {
                section.level.clone()
            },
            json: section.json,
            dir: section.dir.as_deref().map(expand_home),
        }
    }
}

/// Expand a leading `~` to the home directory.
pub fn expand_home(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| path.to_path_buf()),
        Err(_) => path.to_path_buf(),
    }
}

/// `RUST_LOG` wins; an unparsable level falls back to `info`.
pub fn build_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global subscriber. Fails if one is already installed.
pub fn init_logging(config: &LogConfig) -> Result<Option<WorkerGuard>> {
    let (file_writer, guard) = match &config.dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
            let appender = tracing_appender::rolling::daily(dir, LOG_FILENAME);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(writer), Some(guard))
        }
        None => (None, None),
    };

    let registry = tracing_subscriber::registry().with(build_filter(&config.level));

    let installed = if config.json {
        let stderr_layer = fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(true);
        let file_layer = file_writer.map(|w| fmt::layer().json().with_writer(w).with_ansi(false));
        registry.with(stderr_layer).with(file_layer).try_init()
    } else {
        let stderr_layer = fmt::layer().with_writer(std::io::stderr).with_target(false);
        let file_layer = file_writer.map(|w| fmt::layer().with_writer(w).with_ansi(false));
        registry.with(stderr_layer).with(file_layer).try_init()
    };
    installed.context("Failed to install tracing subscriber")?;

    Ok(guard)
}
