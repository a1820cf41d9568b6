use common_types::Event;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Config error: {0}")]
    ConfigError(#[from] envconfig::Error),
    #[error("Invalid pattern {0}: {1}")]
    InvalidPattern(String, #[source] regex::Error),
}

// Never fatal. A failing stage hands back the event it was given, and the driver
// logs the failure and passes that event on.
#[derive(Debug, Error)]
pub enum IntegrationError {
    #[error("Integration {stage} failed: {reason}")]
    Failed {
        stage: &'static str,
        reason: String,
        event: Box<Event>,
    },
}

impl IntegrationError {
    pub fn failed(stage: &'static str, reason: impl Into<String>, event: Event) -> Self {
        Self::Failed {
            stage,
            reason: reason.into(),
            event: Box::new(event),
        }
    }

    pub fn into_event(self) -> Event {
        match self {
            Self::Failed { event, .. } => *event,
        }
    }
}
