//! Text tokenization for search indexing and queries.
//!
//! The same [`Tokenizer`] is applied to indexed field values and to query
//! strings, so both sides always agree on what a token is.

use crate::config::SearchConfig;
use crate::error::{Result, SearchError};
use regex::Regex;

/// Splits text into normalized tokens.
///
/// By default text is lower-cased and split on runs of non-alphanumeric
/// characters. A separator pattern replaces the split rule; `case_sensitive`
/// keeps the original case.
#[derive(Debug, Clone, Default)]
pub struct Tokenizer {
    /// Custom separator pattern, if configured
    separator: Option<Regex>,
    case_sensitive: bool,
}

impl Tokenizer {
    /// Build the tokenizer described by a configuration.
    pub fn from_config(config: &SearchConfig) -> Result<Self> {
        let separator = config
            .tokenize_pattern
            .as_deref()
            .map(|pattern| {
                Regex::new(pattern).map_err(|e| {
                    SearchError::config(format!("invalid tokenize_pattern '{}': {}", pattern, e))
                })
            })
            .transpose()?;

        Ok(Self {
            separator,
            case_sensitive: config.case_sensitive,
        })
    }

    /// Tokenizes text, preserving left-to-right order and duplicates.
    pub fn tokenize(&self, text: &str) -> Vec<String> {
        let normalized = if self.case_sensitive {
            text.to_string()
        } else {
            text.to_lowercase()
        };

        match &self.separator {
            Some(separator) => separator
                .split(&normalized)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect(),
            None => split_alphanumeric(&normalized),
        }
    }
}

/// Tokenizes text with the default rules: lower-case, split on non-alphanumeric runs.
pub fn tokenize(text: &str) -> Vec<String> {
    split_alphanumeric(&text.to_lowercase())
}

fn split_alphanumeric(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
