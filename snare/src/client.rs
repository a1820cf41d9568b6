use std::sync::RwLock;

use common_types::Event;

use crate::config::ClientOptions;

pub type EventHook = Box<dyn Fn(&mut Event) + Send + Sync>;

/// Callbacks stages register at setup time, run in registration order.
#[derive(Default)]
pub struct ClientHooks {
    before_envelope: RwLock<Vec<EventHook>>,
    apply_frame_metadata: RwLock<Vec<EventHook>>,
}

impl ClientHooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs on the final event, right before it is handed to the transport.
    pub fn on_before_envelope(&self, hook: impl Fn(&mut Event) + Send + Sync + 'static) {
        self.before_envelope.write().unwrap().push(Box::new(hook));
    }

    /// Runs before any stage sees the event.
    pub fn on_apply_frame_metadata(&self, hook: impl Fn(&mut Event) + Send + Sync + 'static) {
        self.apply_frame_metadata.write().unwrap().push(Box::new(hook));
    }

    pub fn emit_before_envelope(&self, event: &mut Event) {
        for hook in self.before_envelope.read().unwrap().iter() {
            hook(event);
        }
    }

    pub fn emit_apply_frame_metadata(&self, event: &mut Event) {
        for hook in self.apply_frame_metadata.read().unwrap().iter() {
            hook(event);
        }
    }
}

impl std::fmt::Debug for ClientHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientHooks")
            .field("before_envelope", &self.before_envelope.read().unwrap().len())
            .field(
                "apply_frame_metadata",
                &self.apply_frame_metadata.read().unwrap().len(),
            )
            .finish()
    }
}

pub trait Client: Send + Sync {
    fn options(&self) -> &ClientOptions;

    fn hooks(&self) -> &ClientHooks;
}

#[derive(Debug, Default)]
pub struct BasicClient {
    options: ClientOptions,
    hooks: ClientHooks,
}

impl BasicClient {
    pub fn new(options: ClientOptions) -> Self {
        Self {
            options,
            hooks: ClientHooks::default(),
        }
    }
}

impl Client for BasicClient {
    fn options(&self) -> &ClientOptions {
        &self.options
    }

    fn hooks(&self) -> &ClientHooks {
        &self.hooks
    }
}
