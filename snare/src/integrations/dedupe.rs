use std::sync::Mutex;

use async_trait::async_trait;
use common_types::{
    error_tracking::{Exception, StackFrame},
    Event,
};
use tracing::warn;

use crate::{
    capture::EventHint, client::Client, error::IntegrationError, event_utils::event_description,
    event_utils::first_exception, pipeline::Integration,
};

pub const DEDUPE: &str = "Dedupe";

/// Drops an error event that is a repeat of the one right before it.
#[derive(Debug, Default)]
pub struct Dedupe {
    previous: Mutex<Option<Event>>,
}

impl Dedupe {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Integration for Dedupe {
    fn name(&self) -> &'static str {
        DEDUPE
    }

    async fn process_event(
        &self,
        event: Event,
        _hint: &EventHint,
        _client: &dyn Client,
    ) -> Result<Option<Event>, IntegrationError> {
        // Typed events are never deduplicated, and don't count as "previous"
        if !event.is_error_event() {
            return Ok(Some(event));
        }

        let mut previous = self.previous.lock().unwrap();
        if previous
            .as_ref()
            .is_some_and(|previous| is_duplicate(&event, previous))
        {
            warn!(
                event = %event_description(&event),
                "Event dropped due to being a duplicate of previously captured event"
            );
            return Ok(None);
        }

        *previous = Some(event.clone());
        Ok(Some(event))
    }
}

pub fn is_duplicate(current: &Event, previous: &Event) -> bool {
    is_same_message_event(current, previous) || is_same_exception_event(current, previous)
}

fn is_same_message_event(current: &Event, previous: &Event) -> bool {
    let (Some(current_message), Some(previous_message)) =
        (current.message.as_deref(), previous.message.as_deref())
    else {
        return false;
    };

    current_message == previous_message
        && is_same_fingerprint(current, previous)
        && is_same_stacktrace(current, previous)
}

fn is_same_exception_event(current: &Event, previous: &Event) -> bool {
    let (Some(current_exception), Some(previous_exception)) =
        (first_exception(current), first_exception(previous))
    else {
        return false;
    };

    current_exception.exception_type == previous_exception.exception_type
        && current_exception.value == previous_exception.value
        && is_same_fingerprint(current, previous)
        && is_same_stacktrace(current, previous)
}

fn is_same_fingerprint(current: &Event, previous: &Event) -> bool {
    match (&current.fingerprint, &previous.fingerprint) {
        (None, None) => true,
        (Some(a), Some(b)) => a.join("") == b.join(""),
        _ => false,
    }
}

// Frames of every exception, or None for events without any exceptions at all
fn frames(event: &Event) -> Option<Vec<&StackFrame>> {
    event
        .exception
        .as_ref()
        .map(|e| e.values.iter().flat_map(Exception::frames).collect())
}

fn is_same_stacktrace(current: &Event, previous: &Event) -> bool {
    match (frames(current), frames(previous)) {
        (None, None) => true,
        (Some(a), Some(b)) => {
            a.len() == b.len()
                && a.iter().zip(b.iter()).all(|(a, b)| {
                    a.filename == b.filename
                        && a.lineno == b.lineno
                        && a.colno == b.colno
                        && a.function == b.function
                })
        }
        _ => false,
    }
}
