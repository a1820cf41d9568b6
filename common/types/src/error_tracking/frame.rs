use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// A single call-site. Frames in a stacktrace are ordered oldest call first, so the
// frame the fault happened in is always the last one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StackFrame {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub module: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub abs_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lineno: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub colno: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub in_app: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_line: Option<String>, // The line of code the frame points at
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pre_context: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_context: Option<Vec<String>>,
    // Client-local annotations, removed again before an event leaves the process
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub module_metadata: Option<Map<String, Value>>,
}

impl StackFrame {
    pub fn new(filename: impl Into<String>, function: impl Into<String>) -> Self {
        Self {
            filename: Some(filename.into()),
            function: Some(function.into()),
            ..Default::default()
        }
    }

    pub fn with_location(mut self, lineno: u32, colno: u32) -> Self {
        self.lineno = Some(lineno);
        self.colno = Some(colno);
        self
    }

    /// All source lines known for this frame: pre-context, the context line, post-context.
    pub fn context_lines(&self) -> impl Iterator<Item = &str> {
        self.pre_context
            .iter()
            .flatten()
            .chain(self.context_line.iter())
            .chain(self.post_context.iter().flatten())
            .map(String::as_str)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Stacktrace {
    #[serde(default)]
    pub frames: Vec<StackFrame>,
}

impl Stacktrace {
    pub fn new(frames: Vec<StackFrame>) -> Self {
        Self { frames }
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_frame_skips_absent_fields() {
        let frame = StackFrame::new("/path/to/file.js", "myFunction").with_location(10, 5);
        let serialized = serde_json::to_value(&frame).unwrap();
        assert_eq!(
            serialized,
            json!({
                "filename": "/path/to/file.js",
                "function": "myFunction",
                "lineno": 10,
                "colno": 5,
            })
        );
    }

    #[test]
    fn test_stacktrace_without_frames_deserializes() {
        let stacktrace: Stacktrace = serde_json::from_str("{}").unwrap();
        assert!(stacktrace.is_empty());
    }

    #[test]
    fn test_context_lines_order() {
        let frame = StackFrame {
            context_line: Some("b".to_string()),
            pre_context: Some(vec!["a".to_string()]),
            post_context: Some(vec!["c".to_string()]),
            ..Default::default()
        };
        assert_eq!(frame.context_lines().collect::<Vec<_>>(), vec!["a", "b", "c"]);
    }
}
