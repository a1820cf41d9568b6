use std::sync::{LazyLock, OnceLock};

use async_trait::async_trait;
use common_types::{error_tracking::StackFrame, Event, EventType};
use regex::Regex;
use tracing::warn;

use crate::{
    capture::EventHint,
    client::Client,
    config::ClientOptions,
    error::IntegrationError,
    event_utils::{event_description, first_exception, possible_event_messages},
    patterns::{string_matches_some_pattern, StringPattern},
    pipeline::Integration,
};

pub const EVENT_FILTERS: &str = "EventFilters";
pub const INBOUND_FILTERS: &str = "InboundFilters";

// Errors that are known noise: browser CORS artifacts, extension and webview junk
static DEFAULT_IGNORE_ERRORS: LazyLock<Vec<StringPattern>> = LazyLock::new(|| {
    let regex = |re: &str| StringPattern::Regex(Regex::new(re).unwrap());
    vec![
        regex(r"^Script error\.?$"),
        regex(r"^Javascript error: Script error\.? on line 0$"),
        regex(r"^ResizeObserver loop completed with undelivered notifications.$"),
        regex(r"^Cannot redefine property: googletag$"),
        regex(r"^Can't find variable: gmo$"),
        regex(r"^undefined is not an object \(evaluating 'a\.[A-Z]'\)$"),
        StringPattern::substring(r#"can't redefine non-configurable property "solana""#),
        StringPattern::substring(
            "vv().getRestrictions is not a function. (In 'vv().getRestrictions(1,a)', 'vv().getRestrictions' is undefined)",
        ),
        StringPattern::substring("Can't find variable: _AutofillCallbackHandler"),
        regex(r"^Non-Error promise rejection captured with value: Object Not Found Matching Id:\d+, MethodName:simulateEvent, ParamCount:\d+$"),
        regex(r"^Java exception was raised during method invocation$"),
    ]
});

const INTERNAL_ERROR_TYPE: &str = "SentryError";
const GENERIC_ERROR_TYPE: &str = "Error";

#[derive(Debug, Clone, Default)]
pub struct EventFiltersOptions {
    pub allow_urls: Vec<StringPattern>,
    pub deny_urls: Vec<StringPattern>,
    pub ignore_errors: Vec<StringPattern>,
    pub ignore_transactions: Vec<StringPattern>,
    pub ignore_internal: Option<bool>, // Defaults to true
    pub disable_error_defaults: bool,
}

#[derive(Debug)]
struct MergedOptions {
    allow_urls: Vec<StringPattern>,
    deny_urls: Vec<StringPattern>,
    ignore_errors: Vec<StringPattern>,
    ignore_transactions: Vec<StringPattern>,
    ignore_internal: bool,
}

impl MergedOptions {
    fn new(own: &EventFiltersOptions, client: &ClientOptions) -> Self {
        let concat = |a: &[StringPattern], b: &[StringPattern]| [a, b].concat();

        let mut ignore_errors = concat(&own.ignore_errors, &client.ignore_errors);
        if !own.disable_error_defaults && !client.disable_error_defaults {
            ignore_errors.extend(DEFAULT_IGNORE_ERRORS.iter().cloned());
        }

        Self {
            allow_urls: concat(&own.allow_urls, &client.allow_urls),
            deny_urls: concat(&own.deny_urls, &client.deny_urls),
            ignore_errors,
            ignore_transactions: concat(&own.ignore_transactions, &client.ignore_transactions),
            ignore_internal: own.ignore_internal.unwrap_or(true),
        }
    }
}

/// Drops known noise, internal errors, and anything the user asked to ignore.
#[derive(Debug)]
pub struct EventFilters {
    name: &'static str,
    options: EventFiltersOptions,
    merged: OnceLock<MergedOptions>,
}

impl EventFilters {
    pub fn new(options: EventFiltersOptions) -> Self {
        Self {
            name: EVENT_FILTERS,
            options,
            merged: OnceLock::new(),
        }
    }

    /// The same filters, installed under their old name.
    pub fn inbound_filters(options: EventFiltersOptions) -> Self {
        Self {
            name: INBOUND_FILTERS,
            ..Self::new(options)
        }
    }

    fn merged_options(&self, client: &ClientOptions) -> &MergedOptions {
        self.merged
            .get_or_init(|| MergedOptions::new(&self.options, client))
    }
}

impl Default for EventFilters {
    fn default() -> Self {
        Self::new(EventFiltersOptions::default())
    }
}

#[async_trait]
impl Integration for EventFilters {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn process_event(
        &self,
        event: Event,
        _hint: &EventHint,
        client: &dyn Client,
    ) -> Result<Option<Event>, IntegrationError> {
        let options = self.merged_options(client.options());
        if should_drop_event(&event, options) {
            return Ok(None);
        }
        Ok(Some(event))
    }
}

fn should_drop_event(event: &Event, options: &MergedOptions) -> bool {
    if options.ignore_internal && is_internal_error(event) {
        warn!(
            event = %event_description(event),
            "Event dropped due to being an internal error"
        );
        return true;
    }
    if is_ignored_error(event, &options.ignore_errors) {
        warn!(
            event = %event_description(event),
            "Event dropped due to being matched by `ignore_errors`"
        );
        return true;
    }
    if is_useless_error(event) {
        warn!(
            event = %event_description(event),
            "Event dropped due to not having an error message, error type or stacktrace"
        );
        return true;
    }
    if is_ignored_transaction(event, &options.ignore_transactions) {
        warn!(
            event = %event_description(event),
            "Event dropped due to being matched by `ignore_transactions`"
        );
        return true;
    }
    if is_denied_url(event, &options.deny_urls) {
        warn!(
            event = %event_description(event),
            url = ?event_filter_url(event),
            "Event dropped due to being matched by `deny_urls`"
        );
        return true;
    }
    if !is_allowed_url(event, &options.allow_urls) {
        warn!(
            event = %event_description(event),
            url = ?event_filter_url(event),
            "Event dropped due to not being matched by `allow_urls`"
        );
        return true;
    }
    false
}

fn is_internal_error(event: &Event) -> bool {
    first_exception(event).and_then(|e| e.exception_type.as_deref()) == Some(INTERNAL_ERROR_TYPE)
}

fn is_ignored_error(event: &Event, ignore_errors: &[StringPattern]) -> bool {
    if !event.is_error_event() || ignore_errors.is_empty() {
        return false;
    }

    possible_event_messages(event)
        .iter()
        .any(|message| string_matches_some_pattern(message, ignore_errors, false))
}

fn is_ignored_transaction(event: &Event, ignore_transactions: &[StringPattern]) -> bool {
    if event.event_type != Some(EventType::Transaction) || ignore_transactions.is_empty() {
        return false;
    }

    event
        .transaction
        .as_deref()
        .filter(|name| !name.is_empty())
        .is_some_and(|name| string_matches_some_pattern(name, ignore_transactions, false))
}

// A missing url is never denied...
fn is_denied_url(event: &Event, deny_urls: &[StringPattern]) -> bool {
    if deny_urls.is_empty() {
        return false;
    }
    event_filter_url(event).is_some_and(|url| string_matches_some_pattern(url, deny_urls, false))
}

// ...and always allowed
fn is_allowed_url(event: &Event, allow_urls: &[StringPattern]) -> bool {
    if allow_urls.is_empty() {
        return true;
    }
    event_filter_url(event).map_or(true, |url| string_matches_some_pattern(url, allow_urls, false))
}

fn is_useless_error(event: &Event) -> bool {
    if !event.is_error_event() {
        return false;
    }

    let values = event.exceptions();
    if values.is_empty() {
        return false;
    }

    let has_message = event.message.as_deref().is_some_and(|m| !m.is_empty());
    let has_useful_value = values.iter().any(|value| {
        value.stacktrace.is_some()
            || value
                .exception_type
                .as_deref()
                .is_some_and(|t| !t.is_empty() && t != GENERIC_ERROR_TYPE)
            || value.value.as_deref().is_some_and(|v| !v.is_empty())
    });

    !has_message && !has_useful_value
}

fn last_valid_url(frames: &[StackFrame]) -> Option<&str> {
    frames
        .iter()
        .rev()
        .find(|f| !matches!(f.filename.as_deref(), Some("<anonymous>" | "[native code]")))
        .and_then(|f| f.filename.as_deref())
}

/// The filename the event is attributed to: the innermost real frame of the root
/// exception, i.e. the last exception without a parent that has frames.
pub fn event_filter_url(event: &Event) -> Option<&str> {
    let root = event
        .exceptions()
        .iter()
        .rev()
        .find(|e| e.parent_id().is_none() && !e.frames().is_empty())?;

    last_valid_url(root.frames())
}

#[cfg(test)]
mod tests {
    use common_types::error_tracking::{Exception, Mechanism, Stacktrace};

    use super::*;
    use crate::client::BasicClient;

    fn exception_event(exception_type: &str, value: &str) -> Event {
        Event::from_exceptions(vec![Exception::new(exception_type, value)])
    }

    fn event_with_url(filename: &str) -> Event {
        Event::from_exceptions(vec![Exception {
            stacktrace: Some(Stacktrace::new(vec![
                StackFrame::new("https://example.com/app.js", "outer"),
                StackFrame::new(filename, "inner"),
            ])),
            ..Exception::new("Error", "boom")
        }])
    }

    fn transaction(name: &str) -> Event {
        Event {
            event_type: Some(EventType::Transaction),
            transaction: Some(name.to_string()),
            ..Default::default()
        }
    }

    async fn run(filters: &EventFilters, client_options: ClientOptions, event: Event) -> Option<Event> {
        let client = BasicClient::new(client_options);
        filters
            .process_event(event, &EventHint::default(), &client)
            .await
            .unwrap()
    }

    async fn run_with(options: EventFiltersOptions, event: Event) -> Option<Event> {
        run(&EventFilters::new(options), ClientOptions::default(), event).await
    }

    #[tokio::test]
    async fn test_ignore_errors_substring() {
        let options = EventFiltersOptions {
            ignore_errors: vec!["capture".into()],
            ..Default::default()
        };
        assert_eq!(run_with(options, Event::from_message("captureMessage")).await, None);
    }

    #[tokio::test]
    async fn test_ignore_errors_matches_type_and_value() {
        let options = EventFiltersOptions {
            ignore_errors: vec![StringPattern::regex(r"^SyntaxError: unidentified \?$").unwrap()],
            ..Default::default()
        };
        let event = exception_event("SyntaxError", "unidentified ?");
        assert_eq!(run_with(options.clone(), event).await, None);

        let event = exception_event("SyntaxError", "something else");
        assert!(run_with(options, event).await.is_some());
    }

    #[tokio::test]
    async fn test_ignore_errors_from_client_options() {
        let client_options = ClientOptions {
            ignore_errors: vec!["boom".into()],
            ..Default::default()
        };
        let result = run(
            &EventFilters::default(),
            client_options,
            exception_event("Error", "boom"),
        )
        .await;
        assert_eq!(result, None);
    }

    #[tokio::test]
    async fn test_ignore_errors_skips_typed_events() {
        let options = EventFiltersOptions {
            ignore_errors: vec!["GET".into()],
            ..Default::default()
        };
        let mut event = transaction("GET /");
        event.message = Some("GET /".to_string());
        assert!(run_with(options, event).await.is_some());
    }

    #[tokio::test]
    async fn test_default_ignore_errors() {
        assert_eq!(
            run_with(Default::default(), exception_event("Error", "Script error.")).await,
            None
        );
        assert_eq!(
            run_with(
                Default::default(),
                Event::from_message("Can't find variable: _AutofillCallbackHandler")
            )
            .await,
            None
        );

        let options = EventFiltersOptions {
            disable_error_defaults: true,
            ..Default::default()
        };
        assert!(run_with(options, exception_event("Error", "Script error."))
            .await
            .is_some());
    }

    #[tokio::test]
    async fn test_internal_errors() {
        let event = exception_event(INTERNAL_ERROR_TYPE, "oops");
        assert_eq!(run_with(Default::default(), event.clone()).await, None);

        let options = EventFiltersOptions {
            ignore_internal: Some(false),
            ..Default::default()
        };
        assert!(run_with(options, event).await.is_some());
    }

    #[tokio::test]
    async fn test_useless_errors() {
        let useless = Event::from_exceptions(vec![Exception {
            exception_type: Some("Error".to_string()),
            ..Default::default()
        }]);
        assert_eq!(run_with(Default::default(), useless.clone()).await, None);

        let mut with_message = useless.clone();
        with_message.message = Some("something".to_string());
        assert!(run_with(Default::default(), with_message).await.is_some());

        let mut with_stack = useless.clone();
        with_stack.exceptions_mut().next().unwrap().stacktrace = Some(Stacktrace::default());
        assert!(run_with(Default::default(), with_stack).await.is_some());

        let custom_type = Event::from_exceptions(vec![Exception {
            exception_type: Some("TypeError".to_string()),
            ..Default::default()
        }]);
        assert!(run_with(Default::default(), custom_type).await.is_some());
    }

    #[tokio::test]
    async fn test_ignore_transactions() {
        let options = EventFiltersOptions {
            ignore_transactions: vec!["/health".into()],
            ..Default::default()
        };
        assert_eq!(run_with(options.clone(), transaction("GET /health")).await, None);
        assert!(run_with(options, transaction("GET /users")).await.is_some());
    }

    #[tokio::test]
    async fn test_deny_wins_over_allow() {
        let options = EventFiltersOptions {
            allow_urls: vec!["https://awesome-analytics.io".into()],
            deny_urls: vec!["https://awesome-analytics.io".into()],
            ..Default::default()
        };
        let event = event_with_url("https://awesome-analytics.io/some/file.js");
        assert_eq!(run_with(options, event).await, None);
    }

    #[tokio::test]
    async fn test_allow_urls() {
        let options = EventFiltersOptions {
            allow_urls: vec![StringPattern::regex(r"^https://my-app\.com").unwrap()],
            ..Default::default()
        };

        let allowed = event_with_url("https://my-app.com/app.js");
        assert!(run_with(options.clone(), allowed).await.is_some());

        let other = event_with_url("https://cdn.other.com/lib.js");
        assert_eq!(run_with(options.clone(), other).await, None);

        // No url to check means the event is let through
        assert!(run_with(options, exception_event("TypeError", "no frames"))
            .await
            .is_some());
    }

    #[tokio::test]
    async fn test_deny_urls_without_url() {
        let options = EventFiltersOptions {
            deny_urls: vec!["https://".into()],
            ..Default::default()
        };
        assert!(run_with(options, exception_event("TypeError", "no frames"))
            .await
            .is_some());
    }

    #[tokio::test]
    async fn test_passing_event_is_unchanged() {
        let filters = EventFilters::default();
        let event = event_with_url("https://my-app.com/app.js");

        let once = run(&filters, ClientOptions::default(), event.clone()).await;
        let twice = run(&filters, ClientOptions::default(), once.clone().unwrap()).await;

        assert_eq!(once.as_ref(), Some(&event));
        assert_eq!(twice, once);
    }

    #[test]
    fn test_filter_url_skips_placeholder_frames() {
        let event = Event::from_exceptions(vec![Exception {
            stacktrace: Some(Stacktrace::new(vec![
                StackFrame::new("https://example.com/real.js", "a"),
                StackFrame::new("[native code]", "b"),
                StackFrame::new("<anonymous>", "c"),
            ])),
            ..Default::default()
        }]);
        assert_eq!(event_filter_url(&event), Some("https://example.com/real.js"));
    }

    #[test]
    fn test_filter_url_stops_at_frame_without_filename() {
        let event = Event::from_exceptions(vec![Exception {
            stacktrace: Some(Stacktrace::new(vec![
                StackFrame::new("https://example.com/real.js", "a"),
                StackFrame::default(),
            ])),
            ..Default::default()
        }]);
        assert_eq!(event_filter_url(&event), None);
    }

    #[test]
    fn test_filter_url_uses_root_exception() {
        let frames = |filename: &str| Some(Stacktrace::new(vec![StackFrame::new(filename, "f")]));
        let event = Event::from_exceptions(vec![
            Exception {
                stacktrace: frames("https://linked.com/a.js"),
                mechanism: Some(Mechanism {
                    parent_id: Some(0),
                    ..Mechanism::new("chained", true)
                }),
                ..Default::default()
            },
            Exception {
                stacktrace: frames("https://root.com/a.js"),
                ..Default::default()
            },
            Exception {
                stacktrace: Some(Stacktrace::default()),
                ..Default::default()
            },
        ]);
        assert_eq!(event_filter_url(&event), Some("https://root.com/a.js"));
    }

    #[test]
    fn test_inbound_filters_name() {
        assert_eq!(EventFilters::default().name(), EVENT_FILTERS);
        assert_eq!(
            EventFilters::inbound_filters(Default::default()).name(),
            INBOUND_FILTERS
        );
    }
}
