use envconfig::Envconfig;

use crate::{
    aggregate::DEFAULT_MAX_VALUE_LENGTH,
    error::Error,
    integrations::linked_errors::{DEFAULT_KEY, DEFAULT_LIMIT},
    patterns::{PatternList, StringPattern},
    stack::{default_stack_parser, StackParser},
};

// Pattern lists are comma separated, and an entry wrapped in slashes is a regex
#[derive(Envconfig, Clone)]
pub struct Config {
    #[envconfig(from = "SNARE_IGNORE_ERRORS", default = "")]
    pub ignore_errors: PatternList,

    #[envconfig(from = "SNARE_IGNORE_TRANSACTIONS", default = "")]
    pub ignore_transactions: PatternList,

    #[envconfig(from = "SNARE_DENY_URLS", default = "")]
    pub deny_urls: PatternList,

    #[envconfig(from = "SNARE_ALLOW_URLS", default = "")]
    pub allow_urls: PatternList,

    #[envconfig(from = "SNARE_DISABLE_ERROR_DEFAULTS", default = "false")]
    pub disable_error_defaults: bool,

    #[envconfig(from = "SNARE_LINKED_ERRORS_KEY", default = "cause")]
    pub linked_errors_key: String,

    #[envconfig(from = "SNARE_LINKED_ERRORS_LIMIT", default = "5")]
    pub linked_errors_limit: usize,

    #[envconfig(from = "SNARE_MAX_VALUE_LENGTH", default = "250")]
    pub max_value_length: usize,

    #[envconfig(from = "SNARE_ATTACH_STACKTRACE", default = "false")]
    pub attach_stacktrace: bool,
}

impl Config {
    pub fn init_with_defaults() -> Result<Self, envconfig::Error> {
        Self::init_from_env()
    }
}

/// The client configuration every stage reads from. Immutable once the client is built.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub ignore_errors: Vec<StringPattern>,
    pub ignore_transactions: Vec<StringPattern>,
    pub deny_urls: Vec<StringPattern>,
    pub allow_urls: Vec<StringPattern>,
    pub disable_error_defaults: bool,
    pub linked_errors_key: String,
    pub linked_errors_limit: usize,
    pub max_value_length: usize,
    pub attach_stacktrace: bool,
    pub stack_parser: StackParser,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            ignore_errors: Vec::new(),
            ignore_transactions: Vec::new(),
            deny_urls: Vec::new(),
            allow_urls: Vec::new(),
            disable_error_defaults: false,
            linked_errors_key: DEFAULT_KEY.to_string(),
            linked_errors_limit: DEFAULT_LIMIT,
            max_value_length: DEFAULT_MAX_VALUE_LENGTH,
            attach_stacktrace: false,
            stack_parser: default_stack_parser(),
        }
    }
}

impl ClientOptions {
    pub fn from_env() -> Result<Self, Error> {
        Ok(Config::init_with_defaults()?.into())
    }

    pub fn with_stack_parser(mut self, stack_parser: StackParser) -> Self {
        self.stack_parser = stack_parser;
        self
    }
}

impl From<Config> for ClientOptions {
    fn from(config: Config) -> Self {
        Self {
            ignore_errors: config.ignore_errors.into(),
            ignore_transactions: config.ignore_transactions.into(),
            deny_urls: config.deny_urls.into(),
            allow_urls: config.allow_urls.into(),
            disable_error_defaults: config.disable_error_defaults,
            linked_errors_key: config.linked_errors_key,
            linked_errors_limit: config.linked_errors_limit,
            max_value_length: config.max_value_length,
            attach_stacktrace: config.attach_stacktrace,
            stack_parser: default_stack_parser(),
        }
    }
}
