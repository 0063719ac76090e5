//! Resolution configuration loading and validation

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{AuthzError, Result};

/// Which resolver owns a scope when several registered prefixes match it
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrefixPrecedence {
    /// The longest matching prefix wins; ties go to the earliest registration
    #[default]
    LongestMatch,
    /// The earliest registered matching prefix wins
    FirstRegistered,
}

/// Scope resolution configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolutionConfig {
    /// Rewrite attribute scopes (names, uids) into id scopes before evaluation
    pub attribute_resolution: bool,

    /// Evaluate the keyword-resolved tree when no attribute resolver owns a
    /// scope, instead of failing the check
    pub fallback_on_missing_resolver: bool,

    /// Resolver selection when prefixes overlap
    pub prefix_precedence: PrefixPrecedence,

    /// Upper bound for a single resolver call, in milliseconds
    pub resolver_timeout_ms: Option<u64>,

    /// Maximum number of scopes one attribute scope may resolve to
    pub max_fan_out: Option<usize>,
}

impl Default for ResolutionConfig {
    fn default() -> Self {
        Self {
            attribute_resolution: true,
            fallback_on_missing_resolver: true,
            prefix_precedence: PrefixPrecedence::LongestMatch,
            resolver_timeout_ms: None,
            max_fan_out: None,
        }
    }
}

impl ResolutionConfig {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            AuthzError::InvalidConfig(format!(
                "failed to read {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;

        Self::from_toml_str(&contents)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: ResolutionConfig = toml::from_str(contents)
            .map_err(|e| AuthzError::InvalidConfig(format!("failed to parse configuration: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.resolver_timeout_ms == Some(0) {
            return Err(AuthzError::InvalidConfig(
                "resolver_timeout_ms must be greater than zero".to_string(),
            ));
        }

        if self.max_fan_out == Some(0) {
            return Err(AuthzError::InvalidConfig(
                "max_fan_out must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }

    /// Per-call resolver timeout
    pub fn resolver_timeout(&self) -> Option<Duration> {
        self.resolver_timeout_ms.map(Duration::from_millis)
    }
}
