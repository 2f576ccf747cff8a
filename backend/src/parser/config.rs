//! Parse configuration value.

use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;

/// Options controlling how text is split into rows and fields.
///
/// This is a plain value: every parse reads its own copy, so a configuration
/// can be shared freely across threads and reused between parses.
///
/// # Example
/// ```
/// use csvfetch::ParseConfiguration;
///
/// let config = ParseConfiguration::default()
///     .with_delimiter(';')
///     .with_sanitize_fields(true)
///     .with_trim_whitespace(true);
///
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ParseConfiguration {
    /// Field separator. Must not be `"` or a row terminator.
    pub delimiter: char,

    /// Collapse doubled quotes (`""`) inside quoted fields to a single quote.
    pub sanitize_fields: bool,

    /// Strip leading and trailing ASCII whitespace from every field.
    pub trim_whitespace: bool,

    /// A backslash before the delimiter, a quote, a row terminator or another
    /// backslash escapes that character.
    pub recognize_backslash_escapes: bool,

    /// A field starting with `#` starts a comment running to the end of line.
    pub recognize_comments: bool,

    /// A quoted field may be prefixed by `=` (spreadsheet "exact value").
    pub recognize_leading_equal_sign: bool,
}

impl Default for ParseConfiguration {
    fn default() -> Self {
        Self {
            delimiter: ',',
            sanitize_fields: false,
            trim_whitespace: false,
            recognize_backslash_escapes: false,
            recognize_comments: false,
            recognize_leading_equal_sign: false,
        }
    }
}

impl ParseConfiguration {
    pub fn with_delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn with_sanitize_fields(mut self, yes: bool) -> Self {
        self.sanitize_fields = yes;
        self
    }

    pub fn with_trim_whitespace(mut self, yes: bool) -> Self {
        self.trim_whitespace = yes;
        self
    }

    pub fn with_backslash_escapes(mut self, yes: bool) -> Self {
        self.recognize_backslash_escapes = yes;
        self
    }

    pub fn with_comments(mut self, yes: bool) -> Self {
        self.recognize_comments = yes;
        self
    }

    pub fn with_leading_equal_sign(mut self, yes: bool) -> Self {
        self.recognize_leading_equal_sign = yes;
        self
    }

    /// Check the configuration before scanning.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        match self.delimiter {
            '"' => Err(ConfigurationError::DelimiterIsQuote),
            c @ ('\n' | '\r') => Err(ConfigurationError::DelimiterIsNewline(c)),
            _ => Ok(()),
        }
    }
}
