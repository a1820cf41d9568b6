use std::sync::LazyLock;

use common_types::error_tracking::{StackFrame, UNKNOWN_FUNCTION};
use regex::Regex;

use super::StackLineParser;

pub const CHROME_PARSER_PRIORITY: u32 = 30;
pub const GECKO_PARSER_PRIORITY: u32 = 50;

// Chrome frames without a function name: `at http://host/app.js:1:2`
static CHROME_NO_FN_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*at (\S+?)(?::(\d+))(?::(\d+))\s*$").unwrap());
static CHROME_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*at (?:(.+?\)(?: \[.+\])?|.*?) ?\((?:address at )?)?(?:async )?((?:<anonymous>|[-a-z]+:|.*bundle|/)?.*?)(?::(\d+))?(?::(\d+))?\)?\s*$").unwrap()
});
static CHROME_EVAL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\((\S*)(?::(\d+))(?::(\d+))\)").unwrap());

static GECKO_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(.*?)(?:\((.*?)\))?(?:^|@)?((?:[-a-z]+)?:/.*?|\[native code\]|[^@]*(?:bundle|\d+\.js)|/[\w\-. /=]+)(?::(\d+))?(?::(\d+))?\s*$").unwrap()
});
static GECKO_EVAL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\S+) line (\d+)(?: > eval line \d+)* > eval").unwrap()
});

fn create_frame(
    filename: Option<String>,
    function: &str,
    lineno: Option<u32>,
    colno: Option<u32>,
) -> StackFrame {
    let function = if function == "<anonymous>" {
        UNKNOWN_FUNCTION
    } else {
        function
    };

    StackFrame {
        filename,
        function: Some(function.to_string()),
        in_app: Some(true),
        lineno,
        colno,
        ..Default::default()
    }
}

fn parse_number(m: Option<regex::Match<'_>>) -> Option<u32> {
    m.and_then(|m| m.as_str().parse().ok())
}

// Safari reports extension frames as `fn@safari-extension://...` glued together
// in the function position, so split them back apart.
fn extract_safari_extension_details(function: String, filename: String) -> (String, String) {
    let is_extension = function.contains("safari-extension");
    let is_web_extension = function.contains("safari-web-extension");

    if !is_extension && !is_web_extension {
        return (function, filename);
    }

    let function = match function.find('@') {
        Some(idx) => function[..idx].to_string(),
        None => UNKNOWN_FUNCTION.to_string(),
    };
    let prefix = if is_extension {
        "safari-extension"
    } else {
        "safari-web-extension"
    };

    (function, format!("{prefix}:{filename}"))
}

pub fn chrome_line_parser(line: &str) -> Option<StackFrame> {
    if let Some(caps) = CHROME_NO_FN_REGEX.captures(line) {
        return Some(create_frame(
            Some(caps[1].to_string()),
            UNKNOWN_FUNCTION,
            parse_number(caps.get(2)),
            parse_number(caps.get(3)),
        ));
    }

    let caps = CHROME_REGEX.captures(line)?;

    let mut filename = caps.get(2).map(|m| m.as_str().to_string());
    let mut lineno = parse_number(caps.get(3));
    let mut colno = parse_number(caps.get(4));

    if filename.as_deref().is_some_and(|f| f.starts_with("eval")) {
        if let Some(sub) = filename.as_deref().and_then(|f| CHROME_EVAL_REGEX.captures(f)) {
            let eval_filename = sub[1].to_string();
            lineno = parse_number(sub.get(2));
            colno = parse_number(sub.get(3));
            filename = Some(eval_filename);
        }
    }

    let function = caps
        .get(1)
        .map(|m| m.as_str())
        .filter(|f| !f.is_empty())
        .unwrap_or(UNKNOWN_FUNCTION)
        .to_string();
    let (function, filename) =
        extract_safari_extension_details(function, filename.unwrap_or_default());

    Some(create_frame(
        Some(filename).filter(|f| !f.is_empty()),
        &function,
        lineno,
        colno,
    ))
}

pub fn gecko_line_parser(line: &str) -> Option<StackFrame> {
    let caps = GECKO_REGEX.captures(line)?;

    let mut function = caps.get(1).map(|m| m.as_str()).filter(|f| !f.is_empty());
    let mut filename = caps.get(3).map(|m| m.as_str().to_string());
    let mut lineno = parse_number(caps.get(4));
    let mut colno = parse_number(caps.get(5));

    let is_eval = filename.as_deref().is_some_and(|f| f.contains(" > eval"));
    if is_eval {
        if let Some(sub) = filename.as_deref().and_then(|f| GECKO_EVAL_REGEX.captures(f)) {
            function = Some(function.unwrap_or("eval"));
            let eval_filename = sub[1].to_string();
            lineno = parse_number(sub.get(2));
            colno = None;
            filename = Some(eval_filename);
        }
    }

    let function = function.unwrap_or(UNKNOWN_FUNCTION).to_string();
    let (function, filename) =
        extract_safari_extension_details(function, filename.unwrap_or_default());

    Some(create_frame(
        Some(filename).filter(|f| !f.is_empty()),
        &function,
        lineno,
        colno,
    ))
}

/// Chrome and other V8-based browsers.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChromeStackLineParser;

impl StackLineParser for ChromeStackLineParser {
    fn priority(&self) -> u32 {
        CHROME_PARSER_PRIORITY
    }

    fn parse_line(&self, line: &str) -> Option<StackFrame> {
        chrome_line_parser(line)
    }
}

/// Firefox and Safari.
#[derive(Debug, Clone, Copy, Default)]
pub struct GeckoStackLineParser;

impl StackLineParser for GeckoStackLineParser {
    fn priority(&self) -> u32 {
        GECKO_PARSER_PRIORITY
    }

    fn parse_line(&self, line: &str) -> Option<StackFrame> {
        gecko_line_parser(line)
    }
}
