use async_trait::async_trait;
use common_types::Event;

use crate::{
    aggregate::apply_aggregate_errors_to_event, capture::EventHint, client::Client,
    error::IntegrationError, exception::exception_from_error, pipeline::Integration,
};

pub const LINKED_ERRORS: &str = "LinkedErrors";
pub const DEFAULT_KEY: &str = "cause";
pub const DEFAULT_LIMIT: usize = 5;

/// Expands the original error's causes (or whatever `key` links to) and exception
/// group members into the event. Anything left unset comes from the client options.
#[derive(Debug, Clone, Default)]
pub struct LinkedErrors {
    pub key: Option<String>,
    pub limit: Option<usize>,
}

impl LinkedErrors {
    pub fn new(key: impl Into<String>, limit: usize) -> Self {
        Self {
            key: Some(key.into()),
            limit: Some(limit),
        }
    }
}

#[async_trait]
impl Integration for LinkedErrors {
    fn name(&self) -> &'static str {
        LINKED_ERRORS
    }

    async fn process_event(
        &self,
        mut event: Event,
        hint: &EventHint,
        client: &dyn Client,
    ) -> Result<Option<Event>, IntegrationError> {
        let options = client.options();
        let key = self.key.as_deref().unwrap_or(&options.linked_errors_key);
        let limit = self.limit.unwrap_or(options.linked_errors_limit);

        apply_aggregate_errors_to_event(
            exception_from_error,
            &options.stack_parser,
            key,
            limit,
            options.max_value_length,
            &mut event,
            hint,
        );

        Ok(Some(event))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{capture::CapturedError, client::BasicClient, config::ClientOptions};

    fn chain(depth: usize) -> CapturedError {
        let mut err = CapturedError::new("Error", "deepest");
        for i in 0..depth {
            err = CapturedError::new("Error", format!("level {i}")).with_cause(err);
        }
        err
    }

    async fn run(integration: LinkedErrors, options: ClientOptions, err: CapturedError) -> Event {
        let client = BasicClient::new(options);
        let parser = client.options().stack_parser.clone();
        let event = Event::from_exceptions(vec![exception_from_error(&parser, &err)]);

        integration
            .process_event(event, &EventHint::from_error(err), &client)
            .await
            .unwrap()
            .unwrap()
    }

    #[tokio::test]
    async fn test_defaults_come_from_client_options() {
        let event = run(LinkedErrors::default(), ClientOptions::default(), chain(10)).await;
        assert_eq!(event.exceptions().len(), DEFAULT_LIMIT + 1);

        let options = ClientOptions {
            linked_errors_limit: 2,
            ..Default::default()
        };
        let event = run(LinkedErrors::default(), options, chain(10)).await;
        assert_eq!(event.exceptions().len(), 3);
    }

    #[tokio::test]
    async fn test_own_options_win() {
        let options = ClientOptions {
            linked_errors_limit: 2,
            ..Default::default()
        };
        let event = run(LinkedErrors::new("cause", 8), options, chain(10)).await;
        assert_eq!(event.exceptions().len(), 9);
    }

    #[tokio::test]
    async fn test_custom_key() {
        let err = CapturedError::new("Error", "root")
            .with_cause(CapturedError::new("Error", "ignored"))
            .with_link("reason", CapturedError::new("Error", "linked"));

        let event = run(LinkedErrors::new("reason", 5), ClientOptions::default(), err).await;

        let values: Vec<_> = event
            .exceptions()
            .iter()
            .map(|e| e.value.as_deref().unwrap())
            .collect();
        assert_eq!(values, vec!["linked", "root"]);
    }
}
