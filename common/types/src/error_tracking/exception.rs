use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error_tracking::{StackFrame, Stacktrace};

fn default_mechanism_type() -> String {
    "generic".to_string()
}

// How an exception was captured, and how it relates to the other exceptions
// on the same event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mechanism {
    #[serde(rename = "type", default = "default_mechanism_type")]
    pub mechanism_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub handled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exception_id: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_exception_group: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub synthetic: Option<bool>,
}

impl Mechanism {
    pub fn new(mechanism_type: impl Into<String>, handled: bool) -> Self {
        Self {
            mechanism_type: mechanism_type.into(),
            handled: Some(handled),
            data: None,
            exception_id: None,
            parent_id: None,
            source: None,
            is_exception_group: None,
            synthetic: None,
        }
    }

    pub fn generic() -> Self {
        Self::new(default_mechanism_type(), true)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Exception {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub exception_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mechanism: Option<Mechanism>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub module: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stacktrace: Option<Stacktrace>,
}

impl Exception {
    pub fn new(exception_type: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            exception_type: Some(exception_type.into()),
            value: Some(value.into()),
            ..Default::default()
        }
    }

    pub fn frames(&self) -> &[StackFrame] {
        self.stacktrace
            .as_ref()
            .map(|s| s.frames.as_slice())
            .unwrap_or_default()
    }

    pub fn frames_mut(&mut self) -> impl Iterator<Item = &mut StackFrame> {
        self.stacktrace
            .iter_mut()
            .flat_map(|s| s.frames.iter_mut())
    }

    pub fn parent_id(&self) -> Option<usize> {
        self.mechanism.as_ref().and_then(|m| m.parent_id)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExceptionValues {
    #[serde(default)]
    pub values: Vec<Exception>,
}

impl ExceptionValues {
    pub fn new(values: Vec<Exception>) -> Self {
        Self { values }
    }
}
