use common_types::{
    error_tracking::{Exception, Mechanism},
    Event,
};
use tracing::debug;

use crate::{
    capture::{CapturedError, EventHint},
    event_utils::truncate,
    metric_consts::LINKED_EXCEPTIONS_ADDED,
    stack::StackParser,
};

pub const DEFAULT_MAX_VALUE_LENGTH: usize = 250;

// One pending visit: a linked error, the node it hangs off, and where it was found
struct Visit<'a> {
    error: &'a CapturedError,
    parent: usize,
    source: String,
    from_group: bool,
}

/// Expands the causes and group members of the event's original error into extra
/// exceptions on the event, linked to each other through their mechanisms.
///
/// Linked errors are walked depth first, the `key` link before any group members,
/// and each one is prepended to the exception list, so the original error stays last.
/// The original error takes the id of its position in the incoming list and linked
/// errors are numbered after every incoming exception, so ids stay contiguous. At
/// most `limit` exceptions are added. Returns how many were.
pub fn apply_aggregate_errors_to_event<F>(
    exception_from_error: F,
    parser: &StackParser,
    key: &str,
    limit: usize,
    max_value_length: usize,
    event: &mut Event,
    hint: &EventHint,
) -> usize
where
    F: Fn(&StackParser, &CapturedError) -> Exception,
{
    let Some(original) = hint.original_error() else {
        return 0;
    };
    let Some(values) = event.exception.as_mut().map(|e| &mut e.values) else {
        return 0;
    };
    let Some(root) = values.pop() else {
        return 0;
    };

    // nodes[0] is the original error, the rest are linked errors in discovery order
    let mut nodes = vec![root];
    let mut ids = vec![values.len()];
    let mut pending = Vec::new();
    push_children(&mut pending, original, 0, key);

    while let Some(visit) = pending.pop() {
        // The original list, root included, counts towards the cap
        if values.len() + nodes.len() >= limit + 1 {
            debug!(limit, "linked error limit reached");
            break;
        }

        let exception_id = values.len() + nodes.len();
        let parent_id = ids[visit.parent];

        let parent = &mut nodes[visit.parent];
        let mut mechanism = parent.mechanism.take().unwrap_or_else(Mechanism::generic);
        mechanism.exception_id = Some(parent_id);
        if visit.from_group {
            mechanism.is_exception_group = Some(true);
        }
        parent.mechanism = Some(mechanism);

        let mut child = exception_from_error(parser, visit.error);
        let mut mechanism = child
            .mechanism
            .take()
            .or_else(|| visit.error.mechanism.clone())
            .unwrap_or_else(Mechanism::generic);
        mechanism.mechanism_type = "chained".to_string();
        mechanism.handled = mechanism.handled.or(Some(true));
        mechanism.source = Some(visit.source);
        mechanism.exception_id = Some(exception_id);
        mechanism.parent_id = Some(parent_id);
        child.mechanism = Some(mechanism);

        nodes.push(child);
        ids.push(exception_id);
        push_children(&mut pending, visit.error, nodes.len() - 1, key);
    }

    let added = nodes.len() - 1;
    let root = nodes.remove(0);

    let mut expanded: Vec<Exception> = nodes.into_iter().rev().collect();
    expanded.append(values);
    expanded.push(root);

    for exception in expanded.iter_mut() {
        if let Some(value) = exception.value.as_mut() {
            *value = truncate(value, max_value_length);
        }
    }

    *values = expanded;

    metrics::counter!(LINKED_EXCEPTIONS_ADDED).increment(added as u64);
    added
}

// Pushed in reverse, so the worklist pops the link first, then errors[0], errors[1], ...
fn push_children<'a>(pending: &mut Vec<Visit<'a>>, error: &'a CapturedError, parent: usize, key: &str) {
    if let Some(errors) = &error.errors {
        for (i, child) in errors.iter().enumerate().rev() {
            pending.push(Visit {
                error: child,
                parent,
                source: format!("errors[{i}]"),
                from_group: true,
            });
        }
    }

    if let Some(linked) = error.link(key) {
        pending.push(Visit {
            error: linked,
            parent,
            source: key.to_string(),
            from_group: false,
        });
    }
}
