// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 beacon contributors

//! Election configuration.
//!
//! Supports both programmatic and file-based (TOML) configuration.

use crate::error::ElectionError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Election manager configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElectionConfig {
    /// Coordination-store endpoints. Unused by embedded backends.
    #[serde(default)]
    pub urls: Vec<String>,

    /// Session timeout in seconds.
    #[serde(default = "default_session_timeout_secs")]
    pub session_timeout_secs: u64,

    /// Seconds to wait between reconnection attempts after a session
    /// loss.
    #[serde(default = "default_reconnection_timeout_secs")]
    pub reconnection_timeout_secs: u64,

    /// Cluster membership polling cadence in milliseconds.
    #[serde(default = "default_cluster_change_check_ms")]
    pub cluster_change_check_ms: u64,

    /// Path of the ephemeral node holding the master's name.
    #[serde(default = "default_election_node_path")]
    pub election_node_path: String,

    /// Path of the persistent parent of the ephemeral slave entries.
    #[serde(default = "default_slave_nodes_path")]
    pub slave_nodes_path: String,

    /// Overrides the OS hostname as this node's identity. Required
    /// when several nodes share a host.
    #[serde(default)]
    pub node_name: Option<String>,
}

fn default_session_timeout_secs() -> u64 {
    10
}

fn default_reconnection_timeout_secs() -> u64 {
    5
}

fn default_cluster_change_check_ms() -> u64 {
    1000
}

fn default_election_node_path() -> String {
    "/election/master".to_string()
}

fn default_slave_nodes_path() -> String {
    "/election/slaves".to_string()
}

impl Default for ElectionConfig {
    fn default() -> Self {
        Self {
            urls: Vec::new(),
            session_timeout_secs: default_session_timeout_secs(),
            reconnection_timeout_secs: default_reconnection_timeout_secs(),
            cluster_change_check_ms: default_cluster_change_check_ms(),
            election_node_path: default_election_node_path(),
            slave_nodes_path: default_slave_nodes_path(),
            node_name: None,
        }
    }
}

impl ElectionConfig {
    pub fn session_timeout(&self) -> Duration {
        Duration::from_secs(self.session_timeout_secs)
    }

    pub fn reconnection_timeout(&self) -> Duration {
        Duration::from_secs(self.reconnection_timeout_secs)
    }

    pub fn cluster_change_check(&self) -> Duration {
        Duration::from_millis(self.cluster_change_check_ms)
    }

    /// Validate field contents.
    pub fn validate(&self) -> Result<(), ElectionError> {
        for path in [&self.election_node_path, &self.slave_nodes_path] {
            if !path.starts_with('/') || path.len() < 2 || path.ends_with('/') {
                return Err(ElectionError::InvalidConfig(format!(
                    "'{path}' is not a valid store path"
                )));
            }
        }
        if self.election_node_path == self.slave_nodes_path {
            return Err(ElectionError::InvalidConfig(
                "election_node_path and slave_nodes_path must differ".to_string(),
            ));
        }
        if self.session_timeout_secs == 0 {
            return Err(ElectionError::InvalidConfig(
                "session_timeout_secs must be positive".to_string(),
            ));
        }
        if self.reconnection_timeout_secs == 0 {
            return Err(ElectionError::InvalidConfig(
                "reconnection_timeout_secs must be positive".to_string(),
            ));
        }
        if self.cluster_change_check_ms == 0 {
            return Err(ElectionError::InvalidConfig(
                "cluster_change_check_ms must be positive".to_string(),
            ));
        }
        if let Some(name) = &self.node_name {
            if name.is_empty() || name.contains('/') {
                return Err(ElectionError::InvalidConfig(format!(
                    "'{name}' is not a valid node name"
                )));
            }
        }
        Ok(())
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ElectionError> {
        let config: Self =
            toml::from_str(content).map_err(|e| ElectionError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ElectionError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ElectionError::InvalidConfig(e.to_string()))?;
        Self::from_toml(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL_TOML: &str = r#"
urls = ["zk-1:2181", "zk-2:2181"]
session_timeout_secs = 30
reconnection_timeout_secs = 3
cluster_change_check_ms = 250
election_node_path = "/cluster/master"
slave_nodes_path = "/cluster/slaves"
node_name = "node-1"
"#;

    #[test]
    fn test_config_defaults() {
        let config = ElectionConfig::default();

        assert!(config.urls.is_empty());
        assert_eq!(config.session_timeout(), Duration::from_secs(10));
        assert_eq!(config.reconnection_timeout(), Duration::from_secs(5));
        assert_eq!(config.cluster_change_check(), Duration::from_millis(1000));
        assert_eq!(config.election_node_path, "/election/master");
        assert_eq!(config.slave_nodes_path, "/election/slaves");
        assert!(config.node_name.is_none());
        config.validate().expect("defaults are valid");
    }

    #[test]
    fn test_config_parse_all_fields() {
        let config = ElectionConfig::from_toml(FULL_TOML).expect("parse full toml");

        assert_eq!(config.urls, vec!["zk-1:2181", "zk-2:2181"]);
        assert_eq!(config.session_timeout_secs, 30);
        assert_eq!(config.reconnection_timeout_secs, 3);
        assert_eq!(config.cluster_change_check_ms, 250);
        assert_eq!(config.election_node_path, "/cluster/master");
        assert_eq!(config.slave_nodes_path, "/cluster/slaves");
        assert_eq!(config.node_name.as_deref(), Some("node-1"));
    }

    #[test]
    fn test_config_rejects_relative_path() {
        let config = ElectionConfig {
            election_node_path: "master".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ElectionError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_config_rejects_equal_paths() {
        let config = ElectionConfig {
            election_node_path: "/same".to_string(),
            slave_nodes_path: "/same".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ElectionError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_config_rejects_zero_poll_interval() {
        let config = ElectionConfig {
            cluster_change_check_ms: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ElectionError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_config_rejects_node_name_with_slash() {
        let config = ElectionConfig {
            node_name: Some("a/b".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ElectionError::InvalidConfig(_))
        ));
    }
}
