use std::sync::Arc;

use async_trait::async_trait;
use common_types::Event;
use tracing::{debug, error};

use crate::{
    annotate::{apply_debug_meta, FrameAnnotator},
    capture::EventHint,
    client::{Client, ClientHooks},
    error::IntegrationError,
    metric_consts::{EVENTS_DROPPED, EVENTS_PROCESSED, STAGE_FAILURES},
};

/// A named stage in the event pipeline. A stage returns the (possibly modified)
/// event to pass on, or `None` to drop it.
#[async_trait]
pub trait Integration: Send + Sync {
    fn name(&self) -> &'static str;

    // Called once, when the integration is installed on a client
    fn setup(&self, _hooks: &ClientHooks) {}

    async fn process_event(
        &self,
        event: Event,
        hint: &EventHint,
        client: &dyn Client,
    ) -> Result<Option<Event>, IntegrationError>;
}

#[derive(Default, Clone)]
pub struct EventPipeline {
    integrations: Vec<Arc<dyn Integration>>,
}

impl EventPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a stage. Names are unique, and the first registration of a name wins,
    /// so this returns false (and drops the stage) if the name is already taken.
    pub fn add(&mut self, integration: Arc<dyn Integration>) -> bool {
        let name = integration.name();
        if self.integrations.iter().any(|i| i.name() == name) {
            debug!(integration = name, "integration already installed, skipping");
            return false;
        }
        self.integrations.push(integration);
        true
    }

    pub fn with(mut self, integration: impl Integration + 'static) -> Self {
        self.add(Arc::new(integration));
        self
    }

    pub fn setup(&self, hooks: &ClientHooks) {
        for integration in &self.integrations {
            integration.setup(hooks);
        }
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.integrations.iter().map(|i| i.name()).collect()
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Integration>> {
        self.integrations.iter().find(|i| i.name() == name)
    }

    /// Runs every stage in order, stopping at the first one that drops the event.
    /// A stage that fails is logged and skipped over, with the event it handed back
    /// in its error passed on.
    pub async fn run(&self, event: Event, hint: &EventHint, client: &dyn Client) -> Option<Event> {
        let mut event = event;

        for integration in &self.integrations {
            let name = integration.name();

            match integration.process_event(event, hint, client).await {
                Ok(Some(next)) => event = next,
                Ok(None) => {
                    debug!(integration = name, "event dropped");
                    metrics::counter!(EVENTS_DROPPED, "stage" => name).increment(1);
                    return None;
                }
                Err(e) => {
                    error!(integration = name, "integration failed: {}", e);
                    metrics::counter!(STAGE_FAILURES, "stage" => name).increment(1);
                    event = e.into_event();
                }
            }
        }

        metrics::counter!(EVENTS_PROCESSED).increment(1);
        Some(event)
    }
}

impl std::fmt::Debug for EventPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventPipeline")
            .field("integrations", &self.names())
            .finish()
    }
}

/// Takes a freshly captured event the whole way to transport-ready: frame metadata
/// and debug ids attached, every stage run, debug ids moved to debug images, and the
/// client's last hooks applied.
pub async fn prepare_event(
    pipeline: &EventPipeline,
    annotator: &FrameAnnotator,
    mut event: Event,
    hint: &EventHint,
    client: &dyn Client,
) -> Option<Event> {
    client.hooks().emit_apply_frame_metadata(&mut event);
    annotator.apply_debug_ids(&mut event);

    let mut event = pipeline.run(event, hint, client).await?;

    apply_debug_meta(&mut event);
    client.hooks().emit_before_envelope(&mut event);
    Some(event)
}
