// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 beacon contributors

//! Time-series point shapes.
//!
//! Wire format (one JSON object per point):
//! ```text
//! NumberPoint: { "metric": str, "timestamp": int, "value": number, "tags": { str: str } }
//! TextPoint:   { "metric": str, "timestamp": int, "text":  str,    "tags": { str: str } }
//! ```
//!
//! `metric` and `timestamp` are required in every emitted serialization.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Common header shared by every point shape.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Metric name. Must not be empty when emitted.
    pub metric: String,
    /// Unix timestamp in seconds.
    pub timestamp: i64,
    /// Key/value tag set. May be empty.
    #[serde(default)]
    pub tags: HashMap<String, String>,
}

impl Point {
    /// Create a header with an empty tag set.
    pub fn new(metric: impl Into<String>, timestamp: i64) -> Self {
        Self {
            metric: metric.into(),
            timestamp,
            tags: HashMap::new(),
        }
    }

    /// Add one tag.
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }
}

/// A point carrying a numeric observation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NumberPoint {
    /// Common header.
    #[serde(flatten)]
    pub point: Point,
    /// Observed value.
    pub value: f64,
}

impl NumberPoint {
    pub fn new(point: Point, value: f64) -> Self {
        Self { point, value }
    }
}

/// A point carrying a textual observation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TextPoint {
    /// Common header.
    #[serde(flatten)]
    pub point: Point,
    /// Observed text. May be empty.
    pub text: String,
}

impl TextPoint {
    pub fn new(point: Point, text: impl Into<String>) -> Self {
        Self {
            point,
            text: text.into(),
        }
    }
}

/// The two concrete point shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PointKind {
    Number,
    Text,
}

impl PointKind {
    /// Serialized field names of this kind, in wire order.
    pub fn fields(&self) -> &'static [&'static str] {
        match self {
            PointKind::Number => &["metric", "timestamp", "tags", "value"],
            PointKind::Text => &["metric", "timestamp", "tags", "text"],
        }
    }

    /// Whether `name` is a serialized field of this kind.
    pub fn has_field(&self, name: &str) -> bool {
        self.fields().contains(&name)
    }
}

impl fmt::Display for PointKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PointKind::Number => write!(f, "number"),
            PointKind::Text => write!(f, "text"),
        }
    }
}
