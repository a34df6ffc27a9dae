//! Engine configuration loaded from code, TOML text or a TOML file.

use crate::error::{Result, SearchError};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Which execution backend the facade builds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackendKind {
    /// Synchronous work inside the calling context.
    #[default]
    Inline,
    /// Background worker pool.
    Delegated,
}

/// How a new collection is assigned to a worker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DispatchPolicy {
    #[default]
    RoundRobin,
    /// Worker with the fewest pending requests; ties go round-robin.
    LeastBusy,
}

/// How a query token is compared with index tokens.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TokenMatch {
    /// Index token starts with the query token.
    #[default]
    Prefix,
    /// Index token equals the query token.
    Exact,
    /// Index token contains the query token.
    Substring,
}

/// How the contributions of several query tokens are combined.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchMode {
    /// A record matches if any query token matches it.
    #[default]
    Any,
    /// A record matches only if every query token matches it.
    All,
}

/// Top-level configuration for a [`crate::SearchApi`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SearchConfig {
    pub backend: BackendKind,
    /// Number of background workers for the delegated backend.
    pub workers: usize,
    pub dispatch: DispatchPolicy,
    /// Deadline for a single delegated request, in milliseconds.
    pub request_timeout_ms: u64,
    /// Field holding each record's identifier.
    pub id_field: String,
    pub token_match: TokenMatch,
    pub match_mode: MatchMode,
    pub case_sensitive: bool,
    /// Separator regex replacing the default non-alphanumeric split.
    pub tokenize_pattern: Option<String>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Inline,
            workers: 2,
            dispatch: DispatchPolicy::RoundRobin,
            request_timeout_ms: 5_000,
            id_field: "id".to_string(),
            token_match: TokenMatch::Prefix,
            match_mode: MatchMode::Any,
            case_sensitive: false,
            tokenize_pattern: None,
        }
    }
}

impl SearchConfig {
    /// Configuration for the delegated backend with `workers` workers.
    pub fn delegated(workers: usize) -> Self {
        Self {
            backend: BackendKind::Delegated,
            workers,
            ..Self::default()
        }
    }

    /// Parse a configuration from TOML text. Missing keys take their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)
            .map_err(|e| SearchError::config(format!("failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            SearchError::config(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&text)
    }

    /// Check invariants serde cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(SearchError::config("workers must be at least 1"));
        }
        if self.id_field.is_empty() {
            return Err(SearchError::config("id_field must not be empty"));
        }
        if let Some(pattern) = &self.tokenize_pattern {
            regex::Regex::new(pattern).map_err(|e| {
                SearchError::config(format!("invalid tokenize_pattern '{}': {}", pattern, e))
            })?;
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}
