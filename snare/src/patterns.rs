use std::str::FromStr;

use regex::Regex;

use crate::error::Error;

/// A user supplied filter: either a plain substring or a regular expression.
#[derive(Debug, Clone)]
pub enum StringPattern {
    Substring(String),
    Regex(Regex),
}

impl StringPattern {
    pub fn substring(s: impl Into<String>) -> Self {
        StringPattern::Substring(s.into())
    }

    pub fn regex(re: &str) -> Result<Self, Error> {
        Regex::new(re)
            .map(StringPattern::Regex)
            .map_err(|e| Error::InvalidPattern(re.to_string(), e))
    }

    /// With `require_exact_match`, a substring pattern has to equal the whole value.
    /// Regexes are always tested as-is.
    pub fn matches(&self, value: &str, require_exact_match: bool) -> bool {
        match self {
            StringPattern::Substring(s) if require_exact_match => value == s,
            StringPattern::Substring(s) => value.contains(s.as_str()),
            StringPattern::Regex(re) => re.is_match(value),
        }
    }
}

impl From<&str> for StringPattern {
    fn from(s: &str) -> Self {
        StringPattern::Substring(s.to_string())
    }
}

impl From<Regex> for StringPattern {
    fn from(re: Regex) -> Self {
        StringPattern::Regex(re)
    }
}

// `/.../` is a regex, anything else a substring
impl FromStr for StringPattern {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.strip_prefix('/').and_then(|rest| rest.strip_suffix('/')) {
            Some(re) if s.len() > 1 => StringPattern::regex(re),
            _ => Ok(StringPattern::substring(s)),
        }
    }
}

pub fn string_matches_some_pattern(
    value: &str,
    patterns: &[StringPattern],
    require_exact_match: bool,
) -> bool {
    patterns
        .iter()
        .any(|p| p.matches(value, require_exact_match))
}

/// A comma separated list of patterns, as read from the environment.
#[derive(Debug, Clone, Default)]
pub struct PatternList(pub Vec<StringPattern>);

impl FromStr for PatternList {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(StringPattern::from_str)
            .collect::<Result<Vec<_>, _>>()
            .map(PatternList)
    }
}

impl From<PatternList> for Vec<StringPattern> {
    fn from(list: PatternList) -> Self {
        list.0
    }
}
