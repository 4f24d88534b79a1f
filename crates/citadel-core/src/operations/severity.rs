//! Deciding whether a narration error is fatal.
//!
//! An explicit marker from the server always wins: `"fatal": true|false` on
//! the line, or a `"code"` listed in [`FatalPolicy::with_fatal_codes`].
//! Without a marker the error text is matched against a pattern, by default
//! `not found` (case-insensitive).

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::error::ConfigError;

/// Pattern used when none is configured.
pub const DEFAULT_FATAL_PATTERN: &str = "(?i)not found";

static DEFAULT_FATAL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(DEFAULT_FATAL_PATTERN).unwrap());

/// Rule deciding which narration errors end a stream.
#[derive(Debug, Clone)]
pub struct FatalPolicy {
    pattern: Option<Regex>,
    fatal_codes: Vec<String>,
}

impl Default for FatalPolicy {
    fn default() -> Self {
        Self {
            pattern: Some(DEFAULT_FATAL_REGEX.clone()),
            fatal_codes: Vec::new(),
        }
    }
}

impl FatalPolicy {
    /// Match error text against `pattern` instead of the default.
    pub fn with_pattern(pattern: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            pattern: Some(Regex::new(pattern)?),
            fatal_codes: Vec::new(),
        })
    }

    /// Only honor explicit server markers; never look at the text.
    pub fn explicit_only() -> Self {
        Self {
            pattern: None,
            fatal_codes: Vec::new(),
        }
    }

    /// Treat lines whose `code` field is one of `codes` as fatal.
    pub fn with_fatal_codes<I, S>(mut self, codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fatal_codes.extend(codes.into_iter().map(Into::into));
        self
    }

    /// Is the error `message`, carried by line `raw`, a hard failure?
    pub fn is_fatal(&self, raw: &Value, message: &str) -> bool {
        if let Some(flag) = raw.get("fatal").and_then(Value::as_bool) {
            return flag;
        }

        let code = match raw.get("code") {
            Some(Value::String(code)) => Some(code.clone()),
            Some(Value::Number(code)) => Some(code.to_string()),
            _ => None,
        };
        if let Some(code) = code {
            if self.fatal_codes.iter().any(|c| *c == code) {
                return true;
            }
        }

        self.pattern
            .as_ref()
            .is_some_and(|pattern| pattern.is_match(message))
    }
}
