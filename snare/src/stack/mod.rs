use std::sync::{Arc, LazyLock};

use common_types::error_tracking::{StackFrame, UNKNOWN_FUNCTION};
use regex::Regex;

use crate::{capture::CapturedError, metric_consts::STACK_LINES_TRUNCATED};

pub mod browser;
pub mod node;

pub use browser::{ChromeStackLineParser, GeckoStackLineParser};
pub use node::{filename_is_in_app, NodeStackLineParser};

/// The most frames we ever put on a wire stacktrace.
pub const STACKTRACE_FRAME_LIMIT: usize = 50;

// Lines longer than this are cut before any regex sees them, so pathological
// input can't make the line parsers do unbounded work.
const MAX_LINE_LENGTH: usize = 1024;

static WEBPACK_ERROR_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\(error: (.*)\)").unwrap());
static ERROR_HEADER_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\S*Error: ").unwrap());
static STRIP_TOP_FRAME_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"captureMessage|captureException").unwrap());
static STRIP_BOTTOM_FRAME_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"sentryWrapped").unwrap());

/// Turns a single line of a runtime-specific stack string into a frame.
///
/// Parsers are tried in ascending priority order, and the first one to return a
/// frame for a line wins.
pub trait StackLineParser: Send + Sync {
    fn priority(&self) -> u32;

    fn parse_line(&self, line: &str) -> Option<StackFrame>;
}

impl<F> StackLineParser for (u32, F)
where
    F: Fn(&str) -> Option<StackFrame> + Send + Sync,
{
    fn priority(&self) -> u32 {
        self.0
    }

    fn parse_line(&self, line: &str) -> Option<StackFrame> {
        (self.1)(line)
    }
}

#[derive(Clone)]
pub struct StackParser {
    parsers: Vec<Arc<dyn StackLineParser>>,
}

impl StackParser {
    pub fn new(mut parsers: Vec<Arc<dyn StackLineParser>>) -> Self {
        // Stable, so parsers sharing a priority keep their registration order
        parsers.sort_by_key(|p| p.priority());
        Self { parsers }
    }

    /// Parses a full stack string into frames ordered oldest call first, with
    /// internal frames stripped and at most [`STACKTRACE_FRAME_LIMIT`] frames kept.
    pub fn parse(&self, stack: &str, skip_first_lines: usize, frames_to_pop: usize) -> Vec<StackFrame> {
        let mut frames = Vec::new();

        for line in stack.split('\n').skip(skip_first_lines) {
            let line = truncate_line(line);
            let cleaned = WEBPACK_ERROR_REGEX.replace(line, "$1");

            // The header of an error (`TypeError: foo`) is already captured as the exception type/value
            if ERROR_HEADER_REGEX.is_match(&cleaned) {
                continue;
            }

            if let Some(frame) = self.parsers.iter().find_map(|p| p.parse_line(&cleaned)) {
                frames.push(frame);
            }

            if frames.len() >= STACKTRACE_FRAME_LIMIT + frames_to_pop {
                break;
            }
        }

        let frames = frames.into_iter().skip(frames_to_pop).collect();
        strip_frames_and_reverse(frames)
    }

    pub fn parse_error(&self, error: &CapturedError) -> Vec<StackFrame> {
        let Some(stack) = &error.stack else {
            return Vec::new();
        };
        self.parse(stack, 1, error.frames_to_pop.unwrap_or_default())
    }

    pub fn is_empty(&self) -> bool {
        self.parsers.is_empty()
    }
}

impl std::fmt::Debug for StackParser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let priorities: Vec<u32> = self.parsers.iter().map(|p| p.priority()).collect();
        f.debug_struct("StackParser")
            .field("priorities", &priorities)
            .finish()
    }
}

/// Node-style stack strings only.
pub fn default_stack_parser() -> StackParser {
    StackParser::new(vec![Arc::new(NodeStackLineParser::default())])
}

/// Chrome/V8 first, then Gecko/Safari.
pub fn browser_stack_parser() -> StackParser {
    StackParser::new(vec![
        Arc::new(ChromeStackLineParser),
        Arc::new(GeckoStackLineParser),
    ])
}

fn truncate_line(line: &str) -> &str {
    match line.char_indices().nth(MAX_LINE_LENGTH) {
        Some((idx, _)) => {
            metrics::counter!(STACK_LINES_TRUNCATED).increment(1);
            &line[..idx]
        }
        None => line,
    }
}

fn function_matches(frame: Option<&StackFrame>, re: &Regex) -> bool {
    frame
        .and_then(|f| f.function.as_deref())
        .is_some_and(|f| re.is_match(f))
}

/// Takes frames in parse order (newest call first) and returns them oldest call
/// first, dropping the SDK's own wrapper and capture frames.
///
/// The outermost frame is dropped if it is the SDK's callback wrapper, and up to
/// two innermost frames are dropped if they are capture calls. The frame limit is
/// applied after stripping, so the frames closest to the fault are the ones kept.
pub fn strip_frames_and_reverse(mut frames: Vec<StackFrame>) -> Vec<StackFrame> {
    if frames.is_empty() {
        return frames;
    }

    if function_matches(frames.last(), &STRIP_BOTTOM_FRAME_REGEX) {
        frames.pop();
    }

    frames.reverse();

    if function_matches(frames.last(), &STRIP_TOP_FRAME_REGEX) {
        frames.pop();
        if function_matches(frames.last(), &STRIP_TOP_FRAME_REGEX) {
            frames.pop();
        }
    }

    let fallback_filename = frames.last().and_then(|f| f.filename.clone());

    frames.truncate(STACKTRACE_FRAME_LIMIT);
    for frame in frames.iter_mut() {
        if frame.filename.is_none() {
            frame.filename = fallback_filename.clone();
        }
        if frame.function.is_none() {
            frame.function = Some(UNKNOWN_FUNCTION.to_string());
        }
    }

    frames
}
