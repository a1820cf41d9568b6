use common_types::{
    error_tracking::{Exception, ExceptionValues, Mechanism, Stacktrace},
    Event, Level,
};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::{
    capture::{CapturedError, CapturedInput, EventHint},
    event_utils::truncate,
    stack::StackParser,
};

const UNRECOVERABLE_ERROR: &str = "Unrecoverable error caught";
const OBJECT_KEYS_MAX_LENGTH: usize = 40;

fn synthetic_mechanism() -> Mechanism {
    Mechanism {
        synthetic: Some(true),
        ..Mechanism::generic()
    }
}

pub fn exception_from_error(parser: &StackParser, err: &CapturedError) -> Exception {
    let frames = parser.parse_error(err);

    let exception_type = Some(err.name.clone()).filter(|n| !n.is_empty());
    let mut value = match &err.fetch_url_host {
        Some(host) => format!("{} ({host})", err.message),
        None => err.message.clone(),
    };
    if exception_type.is_none() && value.is_empty() {
        value = UNRECOVERABLE_ERROR.to_string();
    }

    Exception {
        exception_type,
        value: Some(value),
        stacktrace: (!frames.is_empty()).then(|| Stacktrace::new(frames)),
        ..Default::default()
    }
}

/// Builds the event for a `capture_exception` call, whatever was thrown.
pub fn event_from_unknown_input(
    parser: &StackParser,
    input: &CapturedInput,
    hint: &EventHint,
    attach_stacktrace: bool,
) -> Event {
    let synthetic = hint.synthetic_exception.as_ref();

    let mut event = match input {
        CapturedInput::Error(err) => Event::from_exceptions(vec![exception_from_error(parser, err)]),
        CapturedInput::DomError {
            name,
            message,
            code,
        } => {
            let name = name.as_deref().unwrap_or("DOMException");
            let value = if message.is_empty() {
                name.to_string()
            } else {
                format!("{name}: {message}")
            };

            let mut event = event_from_string(parser, &value, synthetic, attach_stacktrace);
            add_exception_type_value(&mut event, &value, Some(name));
            if let Some(code) = code {
                event
                    .tags
                    .insert("DOMException.code".to_string(), Value::String(code.to_string()));
            }
            event
        }
        CapturedInput::Object(object) => event_from_plain_object(parser, object, synthetic),
        CapturedInput::Message(message) => {
            let mut event = event_from_string(parser, message, synthetic, attach_stacktrace);
            add_exception_type_value(&mut event, message, None);
            add_exception_mechanism(&mut event, synthetic_mechanism());
            event
        }
    };

    let mechanism = hint.mechanism.clone().unwrap_or_else(Mechanism::generic);
    add_exception_mechanism(&mut event, mechanism);
    event.level = Some(Level::Error);
    stamp(&mut event, hint);
    event
}

/// Builds the event for a `capture_message` call.
pub fn event_from_message(
    parser: &StackParser,
    message: &str,
    level: Level,
    hint: &EventHint,
    attach_stacktrace: bool,
) -> Event {
    let mut event = event_from_string(
        parser,
        message,
        hint.synthetic_exception.as_ref(),
        attach_stacktrace,
    );
    event.level = Some(level);
    stamp(&mut event, hint);
    event
}

fn stamp(event: &mut Event, hint: &EventHint) {
    event.event_id = hint
        .event_id
        .clone()
        .unwrap_or_else(|| Uuid::new_v4().simple().to_string());
    event.timestamp = Some(chrono::Utc::now().timestamp_millis() as f64 / 1000.0);
}

fn event_from_string(
    parser: &StackParser,
    message: &str,
    synthetic: Option<&CapturedError>,
    attach_stacktrace: bool,
) -> Event {
    let mut event = Event::from_message(message);

    if let Some(synthetic) = synthetic.filter(|_| attach_stacktrace) {
        let frames = parser.parse_error(synthetic);
        if !frames.is_empty() {
            event.exception = Some(ExceptionValues::new(vec![Exception {
                value: Some(message.to_string()),
                stacktrace: Some(Stacktrace::new(frames)),
                mechanism: Some(synthetic_mechanism()),
                ..Default::default()
            }]));
        }
    }

    event
}

fn event_from_plain_object(
    parser: &StackParser,
    object: &Map<String, Value>,
    synthetic: Option<&CapturedError>,
) -> Event {
    let value = format!(
        "Object captured as exception with keys: {}",
        keys_for_message(object, OBJECT_KEYS_MAX_LENGTH)
    );

    let frames = synthetic
        .map(|s| parser.parse_error(s))
        .unwrap_or_default();

    let mut event = Event::from_exceptions(vec![Exception {
        exception_type: Some("Error".to_string()),
        value: Some(value),
        stacktrace: (!frames.is_empty()).then(|| Stacktrace::new(frames)),
        mechanism: Some(synthetic_mechanism()),
        ..Default::default()
    }]);
    event
        .extra
        .insert("__serialized__".to_string(), Value::Object(object.clone()));
    event
}

// As many sorted keys as fit in `max_length`, or the first one truncated
fn keys_for_message(object: &Map<String, Value>, max_length: usize) -> String {
    let mut keys: Vec<&str> = object.keys().map(String::as_str).collect();
    keys.sort_unstable();

    let Some(first) = keys.first() else {
        return "[object has no keys]".to_string();
    };
    if first.chars().count() >= max_length {
        return truncate(first, max_length);
    }

    for included in (1..=keys.len()).rev() {
        let serialized = keys[..included].join(", ");
        if serialized.chars().count() > max_length {
            continue;
        }
        if included == keys.len() {
            return serialized;
        }
        return truncate(&serialized, max_length);
    }

    String::new()
}

fn add_exception_type_value(event: &mut Event, value: &str, exception_type: Option<&str>) {
    let values = &mut event.exception.get_or_insert_with(Default::default).values;
    if values.is_empty() {
        values.push(Exception::default());
    }
    let first = &mut values[0];

    if first.value.as_deref().unwrap_or_default().is_empty() {
        first.value = Some(value.to_string());
    }
    if first.exception_type.as_deref().unwrap_or_default().is_empty() {
        first.exception_type = Some(exception_type.unwrap_or("Error").to_string());
    }
}

// Fields of the mechanism passed in win over the ones already on the first
// exception. `data` is merged key by key.
fn add_exception_mechanism(event: &mut Event, mechanism: Mechanism) {
    let Some(first) = event.exceptions_mut().next() else {
        return;
    };

    first.mechanism = Some(match first.mechanism.take() {
        None => mechanism,
        Some(current) => Mechanism {
            mechanism_type: mechanism.mechanism_type,
            handled: mechanism.handled.or(current.handled),
            data: merge_data(current.data, mechanism.data),
            exception_id: mechanism.exception_id.or(current.exception_id),
            parent_id: mechanism.parent_id.or(current.parent_id),
            source: mechanism.source.or(current.source),
            is_exception_group: mechanism.is_exception_group.or(current.is_exception_group),
            synthetic: mechanism.synthetic.or(current.synthetic),
        },
    });
}

fn merge_data(
    current: Option<Map<String, Value>>,
    incoming: Option<Map<String, Value>>,
) -> Option<Map<String, Value>> {
    match (current, incoming) {
        (Some(mut current), Some(incoming)) => {
            current.extend(incoming);
            Some(current)
        }
        (current, incoming) => incoming.or(current),
    }
}
