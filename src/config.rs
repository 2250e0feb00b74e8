// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Configuration persistence for rollout-dash
//!
//! All rollout-dash data is stored under ~/.rollout-dash/:
//! - ~/.rollout-dash/config.json - server, session and polling settings
//! - ~/.rollout-dash/log/ - rotating log files
//! - ~/.rollout-dash/history - REPL command history

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::dashboard::poller::{
    DEFAULT_MAX_POLL_ATTEMPTS, DEFAULT_MAX_POLL_DURATION, DEFAULT_POLL_INTERVAL,
};
use crate::dashboard::{PollSettings, RestartMode};

/// Backend address used when nothing is configured
pub const DEFAULT_SERVER_URL: &str = "http://localhost:8080";

/// Get the base rollout-dash directory (~/.rollout-dash/)
pub fn base_dir() -> Result<PathBuf> {
    dirs::home_dir()
        .map(|p| p.join(".rollout-dash"))
        .context("Could not determine home directory")
}

fn default_server_url() -> String {
    DEFAULT_SERVER_URL.to_string()
}

/// rollout-dash configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Dashboard backend base URL
    #[serde(default = "default_server_url")]
    pub server_url: String,
    /// Session token obtained by `login`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_token: Option<String>,
    /// User reported by the backend at login
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    /// Namespace preselected in interactive mode
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_namespace: Option<String>,
    #[serde(default)]
    pub poll: PollConfig,
    #[serde(default)]
    pub restart_mode: RestartMode,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            session_token: None,
            user: None,
            default_namespace: None,
            poll: PollConfig::default(),
            restart_mode: RestartMode::default(),
        }
    }
}

/// Rollout polling settings, in whole seconds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    pub interval_secs: u64,
    pub max_duration_secs: u64,
    pub max_attempts: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_secs: DEFAULT_POLL_INTERVAL.as_secs(),
            max_duration_secs: DEFAULT_MAX_POLL_DURATION.as_secs(),
            max_attempts: DEFAULT_MAX_POLL_ATTEMPTS,
        }
    }
}

impl PollConfig {
    /// Convert to poller settings; zero values are raised to one
    pub fn settings(&self) -> PollSettings {
        PollSettings {
            interval: Duration::from_secs(self.interval_secs.max(1)),
            max_duration: Duration::from_secs(self.max_duration_secs.max(1)),
            max_attempts: self.max_attempts.max(1),
        }
    }
}

impl Config {
    /// Load config from disk, or return default if not found
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load config from a specific file, or return default if it is missing
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            let config: Config = serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    /// Save config to disk
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let content = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Get the config file path (~/.rollout-dash/config.json)
    pub fn config_path() -> Result<PathBuf> {
        Ok(base_dir()?.join("config.json"))
    }

    /// Remember a fresh session
    pub fn set_session(&mut self, token: String, user: String) {
        self.session_token = Some(token);
        self.user = Some(user);
    }

    /// Forget the current session
    pub fn clear_session(&mut self) {
        self.session_token = None;
        self.user = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.server_url, DEFAULT_SERVER_URL);
        assert!(config.session_token.is_none());
        assert_eq!(config.restart_mode, RestartMode::Sequential);
        assert_eq!(config.poll.settings(), PollSettings::default());
    }

    #[test]
    fn test_config_deserialize_empty() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_config_deserialize_partial_poll() {
        let json = r#"{
            "server_url": "https://dash.example.com",
            "poll": {"interval_secs": 2},
            "restart_mode": "concurrent"
        }"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.server_url, "https://dash.example.com");
        assert_eq!(config.poll.interval_secs, 2);
        assert_eq!(config.poll.max_duration_secs, 120);
        assert_eq!(config.poll.max_attempts, 24);
        assert_eq!(config.restart_mode, RestartMode::Concurrent);
    }

    #[test]
    fn test_poll_settings_clamp_zero() {
        let poll = PollConfig {
            interval_secs: 0,
            max_duration_secs: 0,
            max_attempts: 0,
        };
        let settings = poll.settings();
        assert_eq!(settings.interval, Duration::from_secs(1));
        assert_eq!(settings.max_duration, Duration::from_secs(1));
        assert_eq!(settings.max_attempts, 1);
    }

    #[test]
    fn test_session_not_serialized_when_absent() {
        let mut config = Config::default();
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("session_token"));

        config.set_session("42".to_string(), "ops".to_string());
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"session_token\":\"42\""));

        config.clear_session();
        assert!(config.user.is_none());
    }

    #[test]
    fn test_load_missing_file_is_default() {
        let temp_dir = TempDir::new().unwrap();
        let config = Config::load_from(&temp_dir.path().join("missing.json")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_config_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nested").join("config.json");

        let mut config = Config {
            default_namespace: Some("prod".to_string()),
            ..Default::default()
        };
        config.set_session("token".to_string(), "admin".to_string());
        config.save_to(&config_path).unwrap();

        let loaded = Config::load_from(&config_path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_invalid_file_fails() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.json");
        fs::write(&config_path, "not json").unwrap();

        let err = Config::load_from(&config_path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }
}
