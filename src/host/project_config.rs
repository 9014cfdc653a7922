//! On-disk project configuration: `<root>/.codecore/project.toml`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    pub language: String,
    pub server_command: Vec<String>,
    #[serde(default)]
    pub ignored_paths: Vec<String>,
    #[serde(default)]
    pub read_timeout_ms: Option<u64>,
    #[serde(default)]
    pub tool_timeout_ms: Option<u64>,
    #[serde(default)]
    pub cross_file_wait_seconds: Option<f64>,
}

impl ProjectConfig {
    pub fn config_path(root: &Path) -> PathBuf {
        root.join(".codecore").join("project.toml")
    }

    pub fn load(root: &Path) -> Result<Self, CoreError> {
        let path = Self::config_path(root);
        let text = std::fs::read_to_string(&path)
            .map_err(|e| CoreError::ConfigError(format!("reading {}: {e}", path.display())))?;
        toml::from_str(&text).map_err(|e| CoreError::ConfigError(format!("parsing {}: {e}", path.display())))
    }

    /// Finds the nearest ancestor of `start` (inclusive) containing
    /// `.codecore/project.toml`.
    pub fn discover_root(start: &Path) -> Option<PathBuf> {
        let mut current = Some(start);
        while let Some(dir) = current {
            if Self::config_path(dir).is_file() {
                return Some(dir.to_path_buf());
            }
            current = dir.parent();
        }
        None
    }

    pub fn read_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.read_timeout_ms.unwrap_or(crate::lsp_handler::DEFAULT_REQUEST_TIMEOUT.as_millis() as u64))
    }

    pub fn tool_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.tool_timeout_ms.unwrap_or(240_000))
    }

    /// Per-language policy value rather than a single global constant;
    /// Swift servers in particular need a much longer window before
    /// cross-file definition/reference results are complete.
    pub fn cross_file_wait(&self) -> f64 {
        self.cross_file_wait_seconds.unwrap_or_else(|| default_cross_file_wait(&self.language))
    }
}

fn default_cross_file_wait(language: &str) -> f64 {
    match language {
        "swift" => 8.0,
        _ => 2.0,
    }
}

/// Validates the configuration's timeout relationship: the LSP per-request
/// timeout must be at least 5s smaller than the tool timeout, and the tool
/// timeout must be at least 10s.
pub fn validate_timeouts(read_timeout: std::time::Duration, tool_timeout: std::time::Duration) -> Result<(), CoreError> {
    if tool_timeout < std::time::Duration::from_secs(10) {
        return Err(CoreError::ConfigError(
            "tool timeout must be at least 10 seconds".into(),
        ));
    }
    if read_timeout + std::time::Duration::from_secs(5) > tool_timeout {
        return Err(CoreError::ConfigError(
            "LSP request timeout must be at least 5 seconds smaller than the tool timeout".into(),
        ));
    }
    Ok(())
}

pub fn env_for_language(_language: &str) -> HashMap<String, String> {
    std::env::vars().collect()
}
