pub const EVENTS_PROCESSED: &str = "snare_events_processed";
pub const EVENTS_DROPPED: &str = "snare_events_dropped";
pub const STAGE_FAILURES: &str = "snare_stage_failures";
pub const STACK_LINES_TRUNCATED: &str = "snare_stack_lines_truncated";
pub const DEBUG_ID_CACHE_REBUILDS: &str = "snare_debug_id_cache_rebuilds";
pub const METADATA_CACHE_REBUILDS: &str = "snare_metadata_cache_rebuilds";
pub const LINKED_EXCEPTIONS_ADDED: &str = "snare_linked_exceptions_added";
