pub mod aggregate;
pub mod annotate;
pub mod capture;
pub mod client;
pub mod config;
pub mod error;
pub mod event_utils;
pub mod exception;
pub mod integrations;
pub mod metric_consts;
pub mod patterns;
pub mod pipeline;
pub mod stack;

pub use annotate::{FrameAnnotator, InMemoryRegistry, ModuleRegistry};
pub use capture::{CapturedError, CapturedInput, EventHint};
pub use client::{BasicClient, Client, ClientHooks};
pub use config::{ClientOptions, Config};
pub use error::{Error, IntegrationError};
pub use pipeline::{prepare_event, EventPipeline, Integration};
pub use stack::{browser_stack_parser, default_stack_parser, StackParser};

/// The integrations every client gets unless it opts out. Filters run before linked
/// errors are expanded, and deduplication sees the final content.
pub fn default_pipeline() -> EventPipeline {
    EventPipeline::new()
        .with(integrations::EventFilters::default())
        .with(integrations::LinkedErrors::default())
        .with(integrations::Dedupe::new())
}
