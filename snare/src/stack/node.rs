use std::sync::{Arc, LazyLock};

use common_types::error_tracking::{StackFrame, UNKNOWN_FUNCTION};
use percent_encoding::percent_decode_str;
use regex::Regex;

use super::StackLineParser;

pub const NODE_PARSER_PRIORITY: u32 = 90;

static FILENAME_MATCH: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\s*[-]{4,}$").unwrap());
static FULL_MATCH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"at (?:async )?(?:(.+?)\s+\()?(?:(.+):(\d+):(\d+)?|([^)]+))\)?").unwrap()
});
static DATA_URI_MATCH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"at (?:async )?(.+?) \(data:(.*?),").unwrap());
static WINDOWS_DRIVE_MATCH: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"/[A-Z]:").unwrap());
static DRIVE_PREFIX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Z]:").unwrap());
static SCHEME_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z]([a-zA-Z0-9.\-+])*://").unwrap());
// Escapes of the reserved URI characters `#$&+,/:;=?@`
static RESERVED_ESCAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"%(?:2[346BCFbcf]|3[ABDFabdf]|40)").unwrap());

pub type ModuleResolver = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Parses V8/Node `at fn (file:line:col)` lines.
#[derive(Clone, Default)]
pub struct NodeStackLineParser {
    get_module: Option<ModuleResolver>,
}

impl NodeStackLineParser {
    pub fn with_module_resolver(get_module: ModuleResolver) -> Self {
        Self {
            get_module: Some(get_module),
        }
    }
}

impl StackLineParser for NodeStackLineParser {
    fn priority(&self) -> u32 {
        NODE_PARSER_PRIORITY
    }

    fn parse_line(&self, line: &str) -> Option<StackFrame> {
        node_line_parser(line, self.get_module.as_deref())
    }
}

pub fn node_line_parser(
    line: &str,
    get_module: Option<&(dyn Fn(&str) -> Option<String> + Send + Sync)>,
) -> Option<StackFrame> {
    if let Some(caps) = DATA_URI_MATCH.captures(line) {
        return Some(StackFrame {
            filename: Some(format!("<data:{}>", &caps[2])),
            function: Some(caps[1].to_string()),
            ..Default::default()
        });
    }

    if let Some(caps) = FULL_MATCH.captures(line) {
        let (function, method_name, type_name) = split_function_name(caps.get(1).map(|m| m.as_str()));

        let function = match function {
            Some(f) => f,
            None => {
                let method_name = method_name.unwrap_or_else(|| UNKNOWN_FUNCTION.to_string());
                match type_name {
                    Some(t) => format!("{t}.{method_name}"),
                    None => method_name,
                }
            }
        };

        let mut filename = caps
            .get(2)
            .map(|m| m.as_str())
            .map(|f| f.strip_prefix("file://").unwrap_or(f).to_string());
        let bare_location = caps.get(5).map(|m| m.as_str());
        let is_native = bare_location == Some("native");

        if let Some(f) = filename.as_mut() {
            if WINDOWS_DRIVE_MATCH.is_match(f) {
                f.remove(0);
            }
        }

        if filename.is_none() && !is_native {
            filename = bare_location.map(str::to_string);
        }

        let module = match (get_module, filename.as_deref()) {
            (Some(get_module), Some(f)) => get_module(f),
            _ => None,
        };
        let in_app = filename_is_in_app(filename.as_deref(), is_native);

        return Some(StackFrame {
            filename: filename.map(|f| decode_filename(&f)),
            in_app: Some(in_app),
            module,
            lineno: caps.get(3).and_then(|m| m.as_str().parse().ok()),
            colno: caps.get(4).and_then(|m| m.as_str().parse().ok()),
            function: Some(function),
            ..Default::default()
        });
    }

    if FILENAME_MATCH.is_match(line) {
        return Some(StackFrame {
            filename: Some(line.to_string()),
            ..Default::default()
        });
    }

    None
}

// Splits "Type.method" names the way V8 prints them. Returns the function name to
// keep as-is, or else the method and type names to rebuild it from.
fn split_function_name(raw: Option<&str>) -> (Option<String>, Option<String>, Option<String>) {
    let Some(mut function) = raw.map(str::to_string) else {
        return (None, None, None);
    };

    let mut method_start = function.rfind('.');
    if let Some(idx) = method_start {
        if idx > 0 && function.as_bytes()[idx - 1] == b'.' {
            method_start = Some(idx - 1);
        }
    }

    let (mut object, method) = match method_start {
        Some(idx) if idx > 0 => (
            Some(function[..idx].to_string()),
            Some(function[idx + 1..].to_string()),
        ),
        _ => (None, None),
    };

    if let Some(obj) = object.as_mut() {
        if let Some(object_end) = obj.find(".Module").filter(|i| *i > 0) {
            function = function[object_end + 1..].to_string();
            obj.truncate(object_end);
        }
    }

    let (mut type_name, mut method_name) = (None, None);
    let mut function = Some(function);
    if let Some(method) = method.filter(|m| !m.is_empty()) {
        type_name = object;
        if method == "<anonymous>" {
            function = None;
        } else {
            method_name = Some(method);
        }
    }

    (function, method_name, type_name)
}

// Decodes escapes the way a URI decoder does: reserved characters stay escaped.
// Malformed input is kept as it is.
fn decode_filename(filename: &str) -> String {
    let mut decoded = String::with_capacity(filename.len());
    let mut last = 0;
    for reserved in RESERVED_ESCAPE.find_iter(filename) {
        let Ok(part) = percent_decode_str(&filename[last..reserved.start()]).decode_utf8() else {
            return filename.to_string();
        };
        decoded.push_str(&part);
        decoded.push_str(reserved.as_str());
        last = reserved.end();
    }

    match percent_decode_str(&filename[last..]).decode_utf8() {
        Ok(part) => {
            decoded.push_str(&part);
            decoded
        }
        Err(_) => filename.to_string(),
    }
}

/// Whether a frame with this filename belongs to the application rather than a
/// runtime internal or a dependency.
pub fn filename_is_in_app(filename: Option<&str>, is_native: bool) -> bool {
    let Some(filename) = filename else {
        return false;
    };

    let is_internal = is_native
        || (!filename.starts_with('/')
            && !DRIVE_PREFIX.is_match(filename)
            && !filename.starts_with('.')
            && !SCHEME_PREFIX.is_match(filename));

    !is_internal && !filename.contains("node_modules/")
}
