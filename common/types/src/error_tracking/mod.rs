mod exception;
mod frame;

pub use exception::*;
pub use frame::*;

/// Prefix the bundler plugin puts in front of application keys in module metadata.
pub const BUNDLER_PLUGIN_APP_KEY_PREFIX: &str = "_sentryBundlerPluginAppKey:";

/// Placeholder used for frames whose function name could not be determined.
pub const UNKNOWN_FUNCTION: &str = "?";
