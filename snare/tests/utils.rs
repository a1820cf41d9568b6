use std::sync::Arc;

use common_types::error_tracking::{
    Exception, StackFrame, Stacktrace, BUNDLER_PLUGIN_APP_KEY_PREFIX,
};
use common_types::Event;
use mockall::mock;
use serde_json::{Map, Value};
use snare::{
    annotate::{FrameAnnotator, ModuleRegistry},
    default_stack_parser, BasicClient, ClientOptions,
};

mock! {
    pub(crate) Registry {}

    impl ModuleRegistry for Registry {
        fn debug_ids(&self) -> Vec<(String, String)>;
        fn metadata(&self) -> Vec<(String, Map<String, Value>)>;
        fn version(&self) -> u64;
    }
}

// The raw stack a bundler-injected snippet captures from inside `filename`
#[allow(dead_code)]
pub(crate) fn registration_stack(filename: &str) -> String {
    format!(
        "Error\n    at Object.<anonymous> ({filename}:1:1)\n    at Module._compile (node:internal/modules/cjs/loader:1364:14)"
    )
}

#[allow(dead_code)]
pub(crate) fn app_key_metadata(key: &str) -> Map<String, Value> {
    Map::from_iter([(
        format!("{BUNDLER_PLUGIN_APP_KEY_PREFIX}{key}"),
        Value::Bool(true),
    )])
}

#[allow(dead_code)]
pub(crate) fn annotator_for(registry: MockRegistry) -> Arc<FrameAnnotator> {
    Arc::new(FrameAnnotator::new(
        Arc::new(registry),
        default_stack_parser(),
    ))
}

#[allow(dead_code)]
pub(crate) fn client() -> BasicClient {
    BasicClient::new(ClientOptions::default())
}

#[allow(dead_code)]
pub(crate) fn exception_event(frames: Vec<StackFrame>) -> Event {
    Event::from_exceptions(vec![Exception {
        stacktrace: Some(Stacktrace::new(frames)),
        ..Exception::new("TypeError", "Cannot read properties of undefined")
    }])
}
