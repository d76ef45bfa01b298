// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 beacon contributors

//! Per-point JSON mapping templates.
//!
//! A template is a fully populated prototype point plus the set of
//! field names the caller promises to override on every send. At send
//! time the supplied parameters must match the variable-field set
//! exactly; the resolved point is the prototype with those fields
//! overwritten.

use crate::error::TimelineError;
use crate::point::{NumberPoint, PointKind, TextPoint};
use serde_json::{Map, Value};
use std::collections::{BTreeSet, HashMap};
use tracing::debug;

/// A value supplied for one variable field of a template.
///
/// The tagged-variant replacement for a dynamically-typed
/// `name, value, name, value, ...` parameter list: each field of a
/// point kind accepts exactly one variant.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    /// 64-bit signed integer (`timestamp`).
    Integer(i64),
    /// 64-bit floating point (`value`).
    Float(f64),
    /// UTF-8 string (`metric`, `text`).
    Text(String),
    /// String-to-string tag mapping (`tags`).
    Tags(HashMap<String, String>),
}

impl ParamValue {
    fn type_name(&self) -> &'static str {
        match self {
            ParamValue::Integer(_) => "integer",
            ParamValue::Float(_) => "float",
            ParamValue::Text(_) => "text",
            ParamValue::Tags(_) => "tag map",
        }
    }

    fn to_json(&self) -> Value {
        match self {
            ParamValue::Integer(v) => Value::from(*v),
            ParamValue::Float(v) => Value::from(*v),
            ParamValue::Text(v) => Value::from(v.clone()),
            ParamValue::Tags(map) => {
                let mut object = Map::with_capacity(map.len());
                for (key, value) in map {
                    object.insert(key.clone(), Value::from(value.clone()));
                }
                Value::Object(object)
            }
        }
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Integer(v)
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Float(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Text(v.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        ParamValue::Text(v)
    }
}

impl From<HashMap<String, String>> for ParamValue {
    fn from(v: HashMap<String, String>) -> Self {
        ParamValue::Tags(v)
    }
}

/// The variant a field accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldType {
    Integer,
    Float,
    Text,
    Tags,
}

impl FieldType {
    fn name(&self) -> &'static str {
        match self {
            FieldType::Integer => "integer",
            FieldType::Float => "float",
            FieldType::Text => "text",
            FieldType::Tags => "tag map",
        }
    }

    fn accepts(&self, value: &ParamValue) -> bool {
        matches!(
            (self, value),
            (FieldType::Integer, ParamValue::Integer(_))
                | (FieldType::Float, ParamValue::Float(_))
                | (FieldType::Text, ParamValue::Text(_))
                | (FieldType::Tags, ParamValue::Tags(_))
        )
    }
}

/// Type of a known field. Callers must have validated the name first.
fn field_type(name: &str) -> FieldType {
    match name {
        "timestamp" => FieldType::Integer,
        "value" => FieldType::Float,
        "tags" => FieldType::Tags,
        _ => FieldType::Text,
    }
}

/// A prototype point plus its declared variable-field set.
#[derive(Debug, Clone, PartialEq)]
pub struct PointTemplate {
    kind: PointKind,
    prototype: Map<String, Value>,
    variable: BTreeSet<String>,
}

impl PointTemplate {
    /// Template for numeric points.
    pub fn number(prototype: &NumberPoint, variable: &[&str]) -> Result<Self, TimelineError> {
        let value = serde_json::to_value(prototype)
            .map_err(|e| TimelineError::InvalidParameters(e.to_string()))?;
        Self::build(PointKind::Number, value, variable)
    }

    /// Template for textual points.
    pub fn text(prototype: &TextPoint, variable: &[&str]) -> Result<Self, TimelineError> {
        let value = serde_json::to_value(prototype)
            .map_err(|e| TimelineError::InvalidParameters(e.to_string()))?;
        Self::build(PointKind::Text, value, variable)
    }

    /// The default template for a kind: an empty prototype with every
    /// field variable, so each send must supply the full point.
    pub(crate) fn canonical(kind: PointKind) -> Self {
        let prototype = match kind {
            PointKind::Number => serde_json::to_value(NumberPoint::default()),
            PointKind::Text => serde_json::to_value(TextPoint::default()),
        };
        let Ok(Value::Object(prototype)) = prototype else {
            // Default points serialize to plain objects.
            unreachable!("default point serialization");
        };
        Self {
            kind,
            prototype,
            variable: kind.fields().iter().map(|f| f.to_string()).collect(),
        }
    }

    fn build(kind: PointKind, prototype: Value, variable: &[&str]) -> Result<Self, TimelineError> {
        let Value::Object(prototype) = prototype else {
            return Err(TimelineError::InvalidParameters(
                "prototype did not serialize to an object".to_string(),
            ));
        };

        let mut set = BTreeSet::new();
        for name in variable {
            if !kind.has_field(name) {
                return Err(TimelineError::InvalidField {
                    kind,
                    field: name.to_string(),
                });
            }
            set.insert(name.to_string());
        }

        // A fixed metric has to be usable as-is on every send.
        if !set.contains("metric") {
            let fixed_metric = prototype.get("metric").and_then(Value::as_str).unwrap_or("");
            if fixed_metric.is_empty() {
                return Err(TimelineError::InvalidParameters(
                    "prototype metric must not be empty when fixed".to_string(),
                ));
            }
        }

        Ok(Self {
            kind,
            prototype,
            variable: set,
        })
    }

    pub fn kind(&self) -> PointKind {
        self.kind
    }

    /// Declared variable-field names, sorted.
    pub fn variable_fields(&self) -> impl Iterator<Item = &str> {
        self.variable.iter().map(String::as_str)
    }

    /// Resolve one send against this template.
    ///
    /// The supplied names must equal the variable-field set exactly and
    /// every value must match its field type.
    pub(crate) fn resolve(&self, params: &[(&str, ParamValue)]) -> Result<Value, TimelineError> {
        let mut supplied = BTreeSet::new();
        for (name, _) in params {
            if !supplied.insert(name.to_string()) {
                return Err(TimelineError::InvalidParameters(format!(
                    "duplicate parameter '{name}'"
                )));
            }
        }

        if supplied != self.variable {
            let missing: Vec<&String> = self.variable.difference(&supplied).collect();
            let extra: Vec<&String> = supplied.difference(&self.variable).collect();
            return Err(TimelineError::InvalidParameters(format!(
                "parameter names do not match the template (missing: {missing:?}, unexpected: {extra:?})"
            )));
        }

        let mut object = self.prototype.clone();
        for (name, value) in params {
            let expected = field_type(name);
            if !expected.accepts(value) {
                return Err(TimelineError::InvalidParameters(format!(
                    "field '{}' expects {}, got {}",
                    name,
                    expected.name(),
                    value.type_name()
                )));
            }
            object.insert(name.to_string(), value.to_json());
        }

        let metric = object.get("metric").and_then(Value::as_str).unwrap_or("");
        if metric.is_empty() {
            return Err(TimelineError::InvalidParameters(
                "metric must not be empty".to_string(),
            ));
        }

        Ok(Value::Object(object))
    }
}

/// The active template per point kind.
///
/// One template is active per kind at a time; registering a different
/// template before start replaces the previous one.
#[derive(Debug, Default)]
pub(crate) struct TemplateRegistry {
    number: Option<PointTemplate>,
    text: Option<PointTemplate>,
}

impl TemplateRegistry {
    pub fn register(&mut self, template: PointTemplate) -> Result<(), TimelineError> {
        let kind = template.kind();
        let slot = match kind {
            PointKind::Number => &mut self.number,
            PointKind::Text => &mut self.text,
        };
        if slot.as_ref() == Some(&template) {
            return Err(TimelineError::Duplicate(kind));
        }
        if slot.is_some() {
            debug!(%kind, "replacing the registered mapping template");
        }
        *slot = Some(template);
        Ok(())
    }

    pub fn resolve(
        &self,
        kind: PointKind,
        params: &[(&str, ParamValue)],
    ) -> Result<Value, TimelineError> {
        let slot = match kind {
            PointKind::Number => &self.number,
            PointKind::Text => &self.text,
        };
        match slot {
            Some(template) => template.resolve(params),
            None => PointTemplate::canonical(kind).resolve(params),
        }
    }
}
