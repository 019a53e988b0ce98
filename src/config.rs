use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::orchestration::ConflictStrategy;
use crate::{elog_debug, Error, Result};

/// Default assumed duration of one task when estimating plans.
pub const DEFAULT_TASK_DURATION_SECS: u64 = 30;

/// Default number of finished runs kept in history.
pub const DEFAULT_HISTORY_LIMIT: usize = 50;

/// Per-agent overrides of the built-in capability table.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct AgentOverride {
    pub complexity_threshold: Option<u8>,
    pub max_concurrent: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default = "default_task_duration")]
    pub average_task_duration_secs: u64,
    /// Deadline applied to workflows that do not declare their own timeout.
    pub default_timeout_secs: Option<u64>,
    #[serde(default = "default_true")]
    pub enforce_agent_concurrency: bool,
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
    #[serde(default)]
    pub conflict_strategy: ConflictStrategy,
    pub state_file: Option<String>,
    /// Keyed by agent name, e.g. `[agents.security-auditor]`.
    #[serde(default)]
    pub agents: BTreeMap<String, AgentOverride>,
}

fn default_task_duration() -> u64 {
    DEFAULT_TASK_DURATION_SECS
}

fn default_true() -> bool {
    true
}

fn default_history_limit() -> usize {
    DEFAULT_HISTORY_LIMIT
}

impl Default for Config {
    fn default() -> Self {
        Self {
            average_task_duration_secs: DEFAULT_TASK_DURATION_SECS,
            default_timeout_secs: None,
            enforce_agent_concurrency: true,
            history_limit: DEFAULT_HISTORY_LIMIT,
            conflict_strategy: ConflictStrategy::default(),
            state_file: None,
            agents: BTreeMap::new(),
        }
    }
}

impl Config {
    pub fn ensemble_dir() -> Result<PathBuf> {
        Ok(dirs::home_dir().ok_or(Error::NoHomeDir)?.join(".ensemble"))
    }

    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::ensemble_dir()?.join("ensemble.toml"))
    }

    /// Where the file-backed state store writes, honoring `state_file`.
    pub fn state_path(&self) -> Result<PathBuf> {
        match &self.state_file {
            Some(path) => Ok(expand_tilde(path)),
            None => Ok(Self::ensemble_dir()?.join("state.json")),
        }
    }

    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        elog_debug!("Config::load path={}", path.display());
        if !path.exists() {
            elog_debug!("Config file not found, using defaults");
            return Ok(Self::default());
        }
        let config: Self = toml::from_str(&fs::read_to_string(path)?)?;
        elog_debug!(
            "Config loaded: task_duration={}s, timeout={:?}, enforce_concurrency={}, agents={}",
            config.average_task_duration_secs,
            config.default_timeout_secs,
            config.enforce_agent_concurrency,
            config.agents.len()
        );
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            if !dir.exists() {
                elog_debug!("Creating config directory: {}", dir.display());
                fs::create_dir_all(dir)?;
            }
        }
        fs::write(path, toml::to_string_pretty(self)?)?;
        elog_debug!("Config saved to {}", path.display());
        Ok(())
    }
}

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}
