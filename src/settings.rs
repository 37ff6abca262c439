//! Settings loaded from `settings.toml` in the user's config directory

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::bridge::ExecutionContext;
use crate::host::CommandRunner;

/// Errors that can occur while loading settings
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid settings in {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// User settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Whether process operations run locally or go through a privileged endpoint
    pub context: ExecutionContext,

    /// Working directory for spawned commands
    #[serde(skip_serializing_if = "Option::is_none")]
    pub working_directory: Option<PathBuf>,

    /// Extra environment variables for spawned commands
    pub env: BTreeMap<String, String>,

    /// Debug logging
    pub verbose: bool,

    /// `tracing` filter directives, used when `RUST_LOG` is unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_filter: Option<String>,
}

impl Settings {
    /// Default settings file location
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("procbridge").join("settings.toml"))
    }

    /// Load from the default location, falling back to defaults when there is no file
    pub fn load() -> Result<Self, SettingsError> {
        match Self::default_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    /// Load from `path`. A missing file yields defaults; a malformed one is an error.
    pub fn load_from(path: &Path) -> Result<Self, SettingsError> {
        if !path.exists() {
            tracing::debug!("No settings file at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Command runner configured with these settings
    pub fn command_runner(&self) -> CommandRunner {
        let mut runner = CommandRunner::new();
        if let Some(dir) = &self.working_directory {
            runner = runner.with_working_directory(dir);
        }
        for (k, v) in &self.env {
            runner = runner.with_env(k, v);
        }
        runner
    }
}
