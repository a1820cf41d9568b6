use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error_tracking::{Exception, ExceptionValues, StackFrame};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Transaction,
    Profile,
    ReplayEvent,
    Feedback,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Fatal,
    Error,
    Warning,
    Log,
    Info,
    Debug,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebugImage {
    #[serde(rename = "type")]
    pub image_type: String,
    pub code_file: String,
    pub debug_id: String,
}

impl DebugImage {
    pub fn sourcemap(code_file: impl Into<String>, debug_id: impl Into<String>) -> Self {
        Self {
            image_type: "sourcemap".to_string(),
            code_file: code_file.into(),
            debug_id: debug_id.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DebugMeta {
    #[serde(default)]
    pub images: Vec<DebugImage>,
}

// An error, message or typed (transaction, profile, ...) event, in the shape
// we hand to the transport
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub event_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<Level>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exception: Option<ExceptionValues>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub event_type: Option<EventType>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub contexts: BTreeMap<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub breadcrumbs: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug_meta: Option<DebugMeta>,
    #[serde(flatten)]
    // A catch-all for everything we don't model, so a round trip through us loses nothing
    pub other: HashMap<String, Value>,
}

impl Event {
    pub fn from_message(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Default::default()
        }
    }

    pub fn from_exceptions(values: Vec<Exception>) -> Self {
        Self {
            exception: Some(ExceptionValues::new(values)),
            ..Default::default()
        }
    }

    /// Error and message events are the ones without an explicit type.
    pub fn is_error_event(&self) -> bool {
        self.event_type.is_none()
    }

    pub fn exceptions(&self) -> &[Exception] {
        self.exception
            .as_ref()
            .map(|e| e.values.as_slice())
            .unwrap_or_default()
    }

    pub fn exceptions_mut(&mut self) -> impl Iterator<Item = &mut Exception> {
        self.exception.iter_mut().flat_map(|e| e.values.iter_mut())
    }

    pub fn frames_mut(&mut self) -> impl Iterator<Item = &mut StackFrame> {
        self.exceptions_mut().flat_map(|e| e.frames_mut())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_json_diff::assert_json_eq;
    use serde_json::json;

    #[test]
    fn test_event_round_trip_keeps_unknown_fields() {
        let raw = json!({
            "event_id": "abc",
            "message": "hello",
            "type": "transaction",
            "transaction": "GET /",
            "tags": { "a": "b" },
            "release": "1.0.0",
            "sdk": { "name": "snare" },
        });

        let event: Event = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(event.event_type, Some(EventType::Transaction));
        assert!(!event.is_error_event());
        assert_eq!(event.other.get("release"), Some(&json!("1.0.0")));

        assert_json_eq!(serde_json::to_value(&event).unwrap(), raw);
    }

    #[test]
    fn test_unknown_event_type_is_other() {
        let event: Event = serde_json::from_value(json!({ "type": "check_in" })).unwrap();
        assert_eq!(event.event_type, Some(EventType::Other));
    }

    #[test]
    fn test_replay_event_type_name() {
        let event: Event = serde_json::from_value(json!({ "type": "replay_event" })).unwrap();
        assert_eq!(event.event_type, Some(EventType::ReplayEvent));
    }

    #[test]
    fn test_frames_mut_walks_every_exception() {
        let mut first = Exception::new("Error", "a");
        first.stacktrace = Some(crate::error_tracking::Stacktrace::new(vec![
            StackFrame::new("a.js", "a"),
        ]));
        let mut second = Exception::new("Error", "b");
        second.stacktrace = Some(crate::error_tracking::Stacktrace::new(vec![
            StackFrame::new("b.js", "b"),
            StackFrame::new("c.js", "c"),
        ]));
        let mut event = Event::from_exceptions(vec![first, Exception::default(), second]);

        assert_eq!(event.frames_mut().count(), 3);
    }
}
