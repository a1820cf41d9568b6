mod event;

// Events
pub use event::DebugImage;
pub use event::DebugMeta;
pub use event::Event;
pub use event::EventType;
pub use event::Level;

// Error tracking types are exported directly
pub mod error_tracking;
