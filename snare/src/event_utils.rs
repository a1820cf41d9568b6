use common_types::{error_tracking::Exception, Event};

pub fn first_exception(event: &Event) -> Option<&Exception> {
    event.exceptions().first()
}

/// Short human readable description of an event, for log lines.
pub fn event_description(event: &Event) -> String {
    if let Some(message) = event.message.as_deref().filter(|m| !m.is_empty()) {
        return message.to_string();
    }

    let event_id = Some(event.event_id.as_str()).filter(|id| !id.is_empty());

    let description = match first_exception(event) {
        Some(Exception {
            exception_type: Some(t),
            value: Some(v),
            ..
        }) if !t.is_empty() && !v.is_empty() => Some(format!("{t}: {v}")),
        Some(exception) => exception
            .exception_type
            .as_deref()
            .filter(|t| !t.is_empty())
            .or(exception.value.as_deref().filter(|v| !v.is_empty()))
            .or(event_id)
            .map(str::to_string),
        None => event_id.map(str::to_string),
    };

    description.unwrap_or_else(|| "<unknown>".to_string())
}

/// Every string an error event could reasonably be identified by: its message, and
/// the value (bare and prefixed with the type) of the last exception.
pub fn possible_event_messages(event: &Event) -> Vec<String> {
    let mut messages = Vec::new();

    if let Some(message) = event.message.as_deref().filter(|m| !m.is_empty()) {
        messages.push(message.to_string());
    }

    if let Some(last) = event.exceptions().last() {
        if let Some(value) = last.value.as_deref().filter(|v| !v.is_empty()) {
            messages.push(value.to_string());
            if let Some(t) = last.exception_type.as_deref().filter(|t| !t.is_empty()) {
                messages.push(format!("{t}: {value}"));
            }
        }
    }

    messages
}

/// Truncates to `max_length` chars, marking the cut with `...`.
pub fn truncate(value: &str, max_length: usize) -> String {
    match value.char_indices().nth(max_length) {
        Some((idx, _)) => format!("{}...", &value[..idx]),
        None => value.to_string(),
    }
}
