use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::{wlog_debug, Error, Result};

fn default_parallel() -> bool {
    true
}

fn default_workers() -> usize {
    4
}

/// Runner settings, read from `~/.weft/weft.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Run independent tasks concurrently. `false` means a pool of one.
    #[serde(default = "default_parallel")]
    pub parallel: bool,
    /// Outer pool size for independent tasks.
    #[serde(default = "default_workers")]
    pub max_workers: usize,
    /// Inner pool size for one task's subtasks.
    #[serde(default = "default_workers")]
    pub max_subtask_workers: usize,
    /// Directory handed to workers through their context.
    pub output_dir: Option<String>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            parallel: default_parallel(),
            max_workers: default_workers(),
            max_subtask_workers: default_workers(),
            output_dir: None,
        }
    }
}

impl RunnerConfig {
    pub fn weft_dir() -> Result<PathBuf> {
        Ok(dirs::home_dir().ok_or(Error::NoHomeDir)?.join(".weft"))
    }

    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::weft_dir()?.join("weft.toml"))
    }

    /// Pool size the outer scheduler should use.
    pub fn effective_workers(&self) -> usize {
        if self.parallel {
            self.max_workers.max(1)
        } else {
            1
        }
    }

    pub fn output_dir(&self) -> Option<PathBuf> {
        self.output_dir.as_deref().map(expand_tilde)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_workers == 0 {
            return Err(Error::InvalidConfig(
                "max_workers must be at least 1".to_string(),
            ));
        }
        if self.max_subtask_workers == 0 {
            return Err(Error::InvalidConfig(
                "max_subtask_workers must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        wlog_debug!("RunnerConfig::load path={}", path.display());
        if !path.exists() {
            wlog_debug!("Config file not found, using defaults");
            return Ok(Self::default());
        }
        let config = Self::from_toml_str(&fs::read_to_string(path)?)?;
        wlog_debug!(
            "Config loaded: parallel={}, max_workers={}, max_subtask_workers={}, output_dir={:?}",
            config.parallel,
            config.max_workers,
            config.max_subtask_workers,
            config.output_dir
        );
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            if !dir.exists() {
                wlog_debug!("Creating config directory: {}", dir.display());
                fs::create_dir_all(dir)?;
            }
        }
        fs::write(path, toml::to_string_pretty(self)?)?;
        wlog_debug!("Config saved to {}", path.display());
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
