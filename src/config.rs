//! Configuration for taskorder, read from `.taskorder/taskorder.toml`.
//!
//! Values are layered file → environment → CLI flags. Every section is
//! optional; a missing file yields the defaults below.
//!
//! # Configuration File Format
//!
//! ```toml
//! [ordering]
//! default_key = 100000.0
//! append_gap = 100.0
//! renumber_step = 1000.0
//! rekey_epsilon = 1e-6
//!
//! [server]
//! port = 3142
//! db_path = ".taskorder/board.db"
//!
//! [remote]
//! base_url = "https://tables.example.com"
//! sort_field = "Sort Order"
//! page_size = 100
//!
//! [logging]
//! level = "info"
//! json = false
//! dir = ".taskorder/logs"
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::ordering::key::{APPEND_GAP, DEFAULT_KEY, RENUMBER_STEP};
use crate::ordering::OrderingPolicy;

/// Directory holding the config file and the default database.
pub const CONFIG_DIR: &str = ".taskorder";
pub const CONFIG_FILE: &str = "taskorder.toml";

pub const ENV_REMOTE_URL: &str = "TASKORDER_REMOTE_URL";
pub const ENV_REMOTE_TOKEN: &str = "TASKORDER_REMOTE_TOKEN";
pub const ENV_PORT: &str = "TASKORDER_PORT";

/// Key assignment tunables.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderingSection {
    #[serde(default = "default_key")]
    pub default_key: f64,
    #[serde(default = "default_append_gap")]
    pub append_gap: f64,
    #[serde(default = "default_renumber_step")]
    pub renumber_step: f64,
    /// Neighbour gap below which a move renumbers the collection.
    #[serde(default = "default_rekey_epsilon")]
    pub rekey_epsilon: f64,
}

fn default_key() -> f64 {
    DEFAULT_KEY
}

fn default_append_gap() -> f64 {
    APPEND_GAP
}

fn default_renumber_step() -> f64 {
    RENUMBER_STEP
}

fn default_rekey_epsilon() -> f64 {
    1e-6
}

impl Default for OrderingSection {
    fn default() -> Self {
        Self {
            default_key: default_key(),
            append_gap: default_append_gap(),
            renumber_step: default_renumber_step(),
            rekey_epsilon: default_rekey_epsilon(),
        }
    }
}

impl OrderingSection {
    /// Values that would produce keys out of list order.
    pub fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if !self.default_key.is_finite() {
            problems.push(format!("default_key {} is not finite", self.default_key));
        }
        if !(self.append_gap > 0.0 && self.append_gap.is_finite()) {
            problems.push(format!("append_gap {} must be positive", self.append_gap));
        }
        if !(self.renumber_step > 0.0 && self.renumber_step.is_finite()) {
            problems.push(format!(
                "renumber_step {} must be positive",
                self.renumber_step
            ));
        }
        if !(self.rekey_epsilon >= 0.0 && self.rekey_epsilon.is_finite()) {
            problems.push(format!(
                "rekey_epsilon {} must not be negative",
                self.rekey_epsilon
            ));
        }
        problems
    }

    pub fn to_policy(&self) -> Result<OrderingPolicy> {
        let problems = self.problems();
        if !problems.is_empty() {
            anyhow::bail!("Invalid [ordering] settings: {}", problems.join("; "));
        }
        Ok(OrderingPolicy {
            default_key: self.default_key,
            append_gap: self.append_gap,
            renumber_step: self.renumber_step,
            rekey_epsilon: self.rekey_epsilon,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerSection {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
}

fn default_port() -> u16 {
    3142
}

fn default_db_path() -> PathBuf {
    PathBuf::from(CONFIG_DIR).join("board.db")
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            port: default_port(),
            db_path: default_db_path(),
        }
    }
}

/// Hosted-table backend. The collection name is the table id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RemoteSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Prefer `TASKORDER_REMOTE_TOKEN` over storing this in the file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default = "default_sort_field")]
    pub sort_field: String,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_sort_field() -> String {
    "Sort Order".to_string()
}

fn default_page_size() -> usize {
    100
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for RemoteSection {
    fn default() -> Self {
        Self {
            base_url: None,
            token: None,
            sort_field: default_sort_field(),
            page_size: default_page_size(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingSection {
    /// Filter used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
    /// Also write daily-rotated log files here.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
            dir: None,
        }
    }
}

/// Root of `taskorder.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TaskorderToml {
    #[serde(default)]
    pub ordering: OrderingSection,
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub remote: RemoteSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

impl TaskorderToml {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse taskorder.toml")
    }

    /// Load `taskorder.toml` from `config_dir`, or defaults if it is absent.
    pub fn load_or_default(config_dir: &Path) -> Result<Self> {
        let config_path = config_dir.join(CONFIG_FILE);
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// An explicit path must exist; otherwise fall back to the default
    /// location under the current directory.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => Self::load(path),
            None => Self::load_or_default(Path::new(CONFIG_DIR)),
        }
    }

    pub fn default_path() -> PathBuf {
        PathBuf::from(CONFIG_DIR).join(CONFIG_FILE)
    }

    /// Save configuration to a TOML file, creating its directory.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let content =
            toml::to_string_pretty(self).context("Failed to serialize taskorder.toml")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    pub fn policy(&self) -> Result<OrderingPolicy> {
        self.ordering.to_policy()
    }

    /// Server port; `TASKORDER_PORT` overrides the file.
    pub fn port(&self) -> u16 {
        std::env::var(ENV_PORT)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(self.server.port)
    }

    /// Remote base URL; `TASKORDER_REMOTE_URL` overrides the file.
    pub fn remote_url(&self) -> Option<String> {
        std::env::var(ENV_REMOTE_URL)
            .ok()
            .filter(|v| !v.is_empty())
            .or_else(|| self.remote.base_url.clone())
    }

    /// Remote API token; `TASKORDER_REMOTE_TOKEN` overrides the file.
    pub fn remote_token(&self) -> Option<String> {
        std::env::var(ENV_REMOTE_TOKEN)
            .ok()
            .filter(|v| !v.is_empty())
            .or_else(|| self.remote.token.clone())
    }

    /// Every problem in the configuration. Commands other than `config`
    /// refuse to run while this is non-empty.
    pub fn validate(&self) -> Vec<String> {
        let mut problems = self.ordering.problems();
        if self.remote.page_size == 0 {
            problems.push("remote page_size must be at least 1".to_string());
        }
        problems
    }

    /// Fail with every problem listed.
    pub fn ensure_valid(&self) -> Result<()> {
        let problems = self.validate();
        if !problems.is_empty() {
            anyhow::bail!("Invalid configuration: {}", problems.join("; "));
        }
        Ok(())
    }
}
