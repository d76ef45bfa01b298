// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 beacon contributors

//! Pipeline configuration.
//!
//! Supports both programmatic and file-based (TOML) configuration.

use crate::error::TimelineError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// HTTP transport configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpTransportConfig {
    /// URL path on the backend that receives batches (e.g. "/api/put").
    pub service_endpoint: String,

    /// HTTP verb used for batch requests.
    #[serde(default = "default_method")]
    pub method: String,

    /// Per-request deadline in milliseconds.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Flush cadence in milliseconds.
    #[serde(default = "default_batch_send_interval_ms")]
    pub batch_send_interval_ms: u64,

    /// Maximum number of queued points.
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,

    /// Response status treated as a successful delivery.
    #[serde(default = "default_expected_response_status")]
    pub expected_response_status: u16,
}

fn default_method() -> String {
    "POST".to_string()
}

fn default_request_timeout_ms() -> u64 {
    5000
}

fn default_batch_send_interval_ms() -> u64 {
    1000
}

fn default_buffer_size() -> usize {
    1000
}

fn default_expected_response_status() -> u16 {
    200
}

impl HttpTransportConfig {
    /// Configuration with defaults for everything but the endpoint.
    pub fn new(service_endpoint: impl Into<String>) -> Self {
        Self {
            service_endpoint: service_endpoint.into(),
            method: default_method(),
            request_timeout_ms: default_request_timeout_ms(),
            batch_send_interval_ms: default_batch_send_interval_ms(),
            buffer_size: default_buffer_size(),
            expected_response_status: default_expected_response_status(),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn batch_send_interval(&self) -> Duration {
        Duration::from_millis(self.batch_send_interval_ms)
    }

    /// Validate field contents.
    pub fn validate(&self) -> Result<(), TimelineError> {
        if self.service_endpoint.is_empty() || !self.service_endpoint.starts_with('/') {
            return Err(TimelineError::InvalidConfig(format!(
                "service_endpoint must be a URL path, got '{}'",
                self.service_endpoint
            )));
        }
        if self.method.is_empty() {
            return Err(TimelineError::InvalidConfig(
                "method must not be empty".to_string(),
            ));
        }
        if self.request_timeout_ms == 0 {
            return Err(TimelineError::InvalidConfig(
                "request_timeout_ms must be positive".to_string(),
            ));
        }
        if self.batch_send_interval_ms == 0 {
            return Err(TimelineError::InvalidConfig(
                "batch_send_interval_ms must be positive".to_string(),
            ));
        }
        if self.buffer_size == 0 {
            return Err(TimelineError::InvalidConfig(
                "buffer_size must be positive".to_string(),
            ));
        }
        if !(100..=599).contains(&self.expected_response_status) {
            return Err(TimelineError::InvalidConfig(format!(
                "expected_response_status {} is not a valid HTTP status",
                self.expected_response_status
            )));
        }
        Ok(())
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, TimelineError> {
        let config: Self =
            toml::from_str(content).map_err(|e| TimelineError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, TimelineError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| TimelineError::InvalidConfig(e.to_string()))?;
        Self::from_toml(&content)
    }
}

/// Address of the timeseries backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Backend {
    /// Backend host name or address.
    pub host: String,
    /// Backend TCP port.
    pub port: u16,
}

impl Backend {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    pub fn validate(&self) -> Result<(), TimelineError> {
        if self.host.is_empty() {
            return Err(TimelineError::InvalidConfig(
                "backend host must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Base URL of the backend.
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}
