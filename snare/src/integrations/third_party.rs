use std::sync::Arc;

use async_trait::async_trait;
use common_types::{
    error_tracking::{StackFrame, BUNDLER_PLUGIN_APP_KEY_PREFIX},
    Event,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::{
    annotate::{strip_metadata_from_stack_frames, FrameAnnotator},
    capture::EventHint,
    client::{Client, ClientHooks},
    error::IntegrationError,
    event_utils::event_description,
    pipeline::Integration,
};

pub const THIRD_PARTY_ERRORS_FILTER: &str = "ThirdPartyErrorsFilter";
pub const THIRD_PARTY_TAG: &str = "third_party_code";

// The call our own callback wrapper makes, as it appears in its source
const INTERNAL_WRAPPER_CALL: &str = "fn.apply(this, wrappedArguments)";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ThirdPartyBehaviour {
    DropErrorIfContainsThirdPartyFrames,
    DropErrorIfExclusivelyContainsThirdPartyFrames,
    ApplyTagIfContainsThirdPartyFrames,
    ApplyTagIfExclusivelyContainsThirdPartyFrames,
}

impl ThirdPartyBehaviour {
    fn drops(&self) -> bool {
        matches!(
            self,
            Self::DropErrorIfContainsThirdPartyFrames
                | Self::DropErrorIfExclusivelyContainsThirdPartyFrames
        )
    }

    fn exclusive(&self) -> bool {
        matches!(
            self,
            Self::DropErrorIfExclusivelyContainsThirdPartyFrames
                | Self::ApplyTagIfExclusivelyContainsThirdPartyFrames
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThirdPartyErrorsFilterOptions {
    pub filter_keys: Vec<String>, // The application keys our own bundles were built with
    pub behaviour: ThirdPartyBehaviour,
    #[serde(default)]
    pub ignore_sentry_internal_frames: bool,
}

/// Classifies frames as first or third party by the application keys the bundler
/// embedded in their module metadata, then drops or tags the event.
pub struct ThirdPartyErrorsFilter {
    options: ThirdPartyErrorsFilterOptions,
    annotator: Arc<FrameAnnotator>,
}

impl ThirdPartyErrorsFilter {
    pub fn new(options: ThirdPartyErrorsFilterOptions, annotator: Arc<FrameAnnotator>) -> Self {
        Self { options, annotator }
    }

    fn is_third_party(&self, keys: &[String]) -> bool {
        !keys.iter().any(|k| self.options.filter_keys.contains(k))
    }
}

fn is_internal_wrapper_frame(frame: &StackFrame, index: usize) -> bool {
    // Only ever the outermost call
    if index != 0 {
        return false;
    }

    let (Some(filename), Some(_)) = (frame.filename.as_deref(), frame.context_line.as_deref())
    else {
        return false;
    };
    if !filename.contains("sentry") || !filename.contains("helpers") {
        return false;
    }

    frame
        .context_lines()
        .any(|line| line.contains(INTERNAL_WRAPPER_CALL))
}

fn bundle_keys(frame: &StackFrame) -> Vec<String> {
    frame
        .module_metadata
        .iter()
        .flat_map(|m| m.keys())
        .filter_map(|k| k.strip_prefix(BUNDLER_PLUGIN_APP_KEY_PREFIX))
        .map(str::to_string)
        .collect()
}

// The bundle keys of every frame that has a filename, across every exception
fn bundle_keys_for_frames(event: &Event, ignore_internal_frames: bool) -> Vec<Vec<String>> {
    event
        .exceptions()
        .iter()
        .flat_map(|e| e.frames())
        .enumerate()
        .filter(|(_, f)| f.filename.is_some())
        .filter(|(i, f)| !(ignore_internal_frames && is_internal_wrapper_frame(f, *i)))
        .map(|(_, f)| bundle_keys(f))
        .collect()
}

#[async_trait]
impl Integration for ThirdPartyErrorsFilter {
    fn name(&self) -> &'static str {
        THIRD_PARTY_ERRORS_FILTER
    }

    fn setup(&self, hooks: &ClientHooks) {
        hooks.on_before_envelope(strip_metadata_from_stack_frames);

        let annotator = self.annotator.clone();
        hooks.on_apply_frame_metadata(move |event| {
            if event.is_error_event() {
                annotator.add_metadata_to_stack_frames(event);
            }
        });
    }

    async fn process_event(
        &self,
        mut event: Event,
        _hint: &EventHint,
        _client: &dyn Client,
    ) -> Result<Option<Event>, IntegrationError> {
        let frame_keys =
            bundle_keys_for_frames(&event, self.options.ignore_sentry_internal_frames);
        // Nothing to classify, so never third party, even when exclusive
        if frame_keys.is_empty() {
            return Ok(Some(event));
        }

        let behaviour = self.options.behaviour;
        let matched = if behaviour.exclusive() {
            frame_keys.iter().all(|keys| self.is_third_party(keys))
        } else {
            frame_keys.iter().any(|keys| self.is_third_party(keys))
        };

        if !matched {
            return Ok(Some(event));
        }

        if behaviour.drops() {
            warn!(
                event = %event_description(&event),
                ?behaviour,
                "Event dropped due to third party frames"
            );
            return Ok(None);
        }

        event
            .tags
            .insert(THIRD_PARTY_TAG.to_string(), Value::Bool(true));
        Ok(Some(event))
    }
}
