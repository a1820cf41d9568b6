use std::collections::HashMap;

use common_types::error_tracking::Mechanism;
use serde_json::{Map, Value};

// An error as seen at the capture call, with everything it links to spelled out as
// an explicit tree so nothing downstream has to sniff shapes again.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CapturedError {
    pub name: String,
    pub message: String,
    pub stack: Option<String>,
    pub frames_to_pop: Option<usize>,
    pub cause: Option<Box<CapturedError>>,
    pub links: HashMap<String, CapturedError>, // Other linked errors, by the property they hang off
    pub errors: Option<Vec<CapturedError>>,    // Set for exception groups
    pub mechanism: Option<Mechanism>,
    pub fetch_url_host: Option<String>, // Host of the failed request, for network errors
}

impl CapturedError {
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
            ..Default::default()
        }
    }

    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }

    pub fn with_frames_to_pop(mut self, frames_to_pop: usize) -> Self {
        self.frames_to_pop = Some(frames_to_pop);
        self
    }

    pub fn with_cause(mut self, cause: CapturedError) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    pub fn with_link(mut self, key: impl Into<String>, linked: CapturedError) -> Self {
        self.links.insert(key.into(), linked);
        self
    }

    pub fn with_errors(mut self, errors: Vec<CapturedError>) -> Self {
        self.errors = Some(errors);
        self
    }

    pub fn with_mechanism(mut self, mechanism: Mechanism) -> Self {
        self.mechanism = Some(mechanism);
        self
    }

    /// The error linked under `key`. `"cause"` is the standard cause chain, anything
    /// else is looked up in the named links.
    pub fn link(&self, key: &str) -> Option<&CapturedError> {
        if key == "cause" {
            return self.cause.as_deref();
        }
        self.links.get(key)
    }

    pub fn is_exception_group(&self) -> bool {
        self.errors.is_some()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CapturedInput {
    Error(CapturedError),
    DomError {
        name: Option<String>,
        message: String,
        code: Option<u32>,
    },
    Object(Map<String, Value>),
    Message(String),
}

impl From<CapturedError> for CapturedInput {
    fn from(err: CapturedError) -> Self {
        CapturedInput::Error(err)
    }
}

impl From<&str> for CapturedInput {
    fn from(message: &str) -> Self {
        CapturedInput::Message(message.to_string())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Attachment {
    pub filename: String,
    pub data: Vec<u8>,
    pub content_type: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventHint {
    pub original_exception: Option<CapturedInput>,
    pub synthetic_exception: Option<CapturedError>, // Created at the capture call, for a stack when the input has none
    pub event_id: Option<String>,
    pub attachments: Vec<Attachment>,
    pub mechanism: Option<Mechanism>,
}

impl EventHint {
    pub fn from_error(err: CapturedError) -> Self {
        Self {
            original_exception: Some(CapturedInput::Error(err)),
            ..Default::default()
        }
    }

    /// The original exception, if it was an actual error.
    pub fn original_error(&self) -> Option<&CapturedError> {
        match &self.original_exception {
            Some(CapturedInput::Error(err)) => Some(err),
            _ => None,
        }
    }
}
