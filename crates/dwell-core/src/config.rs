//! Engine configuration
//!
//! All settings have defaults; a TOML file only needs the keys it changes.
//!
//! ```toml
//! page_size = 100
//! execution_budget_ms = 10000
//!
//! [retry]
//! max_attempts = 5
//!
//! [vocabulary]
//! funnel_stages = ["Invite", "Matched"]
//! ```

use crate::error::ConfigError;
use crate::retry::RetryPolicy;
use dwell_timeline::StatusVocabulary;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Retry settings as written in configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    /// Total attempts per page, including the first
    pub max_attempts: u32,
    /// First backoff delay
    pub initial_delay_ms: u64,
    /// Backoff ceiling
    pub max_delay_ms: u64,
    /// Backoff growth factor
    pub backoff_multiplier: f64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 200,
            max_delay_ms: 2_000,
            backoff_multiplier: 2.0,
        }
    }
}

impl RetrySettings {
    /// Runtime policy
    #[must_use]
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            initial_delay: Duration::from_millis(self.initial_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            backoff_multiplier: self.backoff_multiplier,
        }
    }
}

/// Orchestrator configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Records requested per page
    pub page_size: usize,
    /// Wall-clock budget per request
    pub execution_budget_ms: u64,
    /// Page retry settings
    pub retry: RetrySettings,
    /// Apply the interest filter to retrieved records
    pub grouping_filter_enabled: bool,
    /// Default minimum total days for a ranked bottleneck
    pub min_bottleneck_days: i64,
    /// Keep only the top `n` bottlenecks
    pub top_bottleneck_limit: Option<usize>,
    /// Reconstruct timelines on the rayon pool
    pub parallel_reconstruction: bool,
    /// Status vocabulary
    pub vocabulary: StatusVocabulary,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            page_size: 200,
            execution_budget_ms: 25_000,
            retry: RetrySettings::default(),
            grouping_filter_enabled: false,
            min_bottleneck_days: 0,
            top_bottleneck_limit: None,
            parallel_reconstruction: true,
            vocabulary: StatusVocabulary::default(),
        }
    }
}

impl EngineConfig {
    /// Parse and validate TOML
    ///
    /// # Errors
    /// Returns `ConfigError` if parsing or validation fails
    pub fn from_toml_str(toml: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(toml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load, parse and validate a TOML file
    ///
    /// # Errors
    /// Returns `ConfigError` if the file cannot be read, parsed or validated
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let toml = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&toml)
    }

    /// Reject values the orchestrator cannot run with
    ///
    /// # Errors
    /// Returns `ConfigError::Invalid` naming the offending key
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.page_size == 0 {
            return Err(ConfigError::Invalid("page_size must be positive".to_string()));
        }
        if self.execution_budget_ms == 0 {
            return Err(ConfigError::Invalid(
                "execution_budget_ms must be positive".to_string(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }
        if !(self.retry.backoff_multiplier.is_finite() && self.retry.backoff_multiplier >= 1.0) {
            return Err(ConfigError::Invalid(
                "retry.backoff_multiplier must be a finite number >= 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Request budget
    #[inline]
    #[must_use]
    pub fn execution_budget(&self) -> Duration {
        Duration::from_millis(self.execution_budget_ms)
    }

    /// With page size
    #[inline]
    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    /// With request budget
    #[inline]
    #[must_use]
    pub fn with_execution_budget(mut self, budget: Duration) -> Self {
        self.execution_budget_ms = u64::try_from(budget.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// With retry settings
    #[inline]
    #[must_use]
    pub fn with_retry(mut self, retry: RetrySettings) -> Self {
        self.retry = retry;
        self
    }

    /// With interest filtering switched on or off
    #[inline]
    #[must_use]
    pub fn with_grouping_filter(mut self, enabled: bool) -> Self {
        self.grouping_filter_enabled = enabled;
        self
    }

    /// With default bottleneck threshold
    #[inline]
    #[must_use]
    pub fn with_min_bottleneck_days(mut self, days: i64) -> Self {
        self.min_bottleneck_days = days;
        self
    }

    /// With bottleneck limit
    #[inline]
    #[must_use]
    pub fn with_top_bottleneck_limit(mut self, limit: usize) -> Self {
        self.top_bottleneck_limit = Some(limit);
        self
    }

    /// With parallel reconstruction switched on or off
    #[inline]
    #[must_use]
    pub fn with_parallel_reconstruction(mut self, enabled: bool) -> Self {
        self.parallel_reconstruction = enabled;
        self
    }

    /// With vocabulary
    #[inline]
    #[must_use]
    pub fn with_vocabulary(mut self, vocabulary: StatusVocabulary) -> Self {
        self.vocabulary = vocabulary;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dwell_timeline::StatusLabel;

    #[test]
    fn defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.page_size, 200);
        assert_eq!(config.execution_budget(), Duration::from_secs(25));
        assert_eq!(config.retry.policy(), RetryPolicy::default());
        assert!(!config.grouping_filter_enabled);
        assert!(config.parallel_reconstruction);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = EngineConfig::from_toml_str(
            r#"
            page_size = 50
            top_bottleneck_limit = 5

            [retry]
            max_attempts = 4

            [vocabulary]
            funnel_stages = ["Invite", "Matched"]
            "#,
        )
        .unwrap();

        assert_eq!(config.page_size, 50);
        assert_eq!(config.top_bottleneck_limit, Some(5));
        assert_eq!(config.retry.max_attempts, 4);
        assert_eq!(config.retry.initial_delay_ms, 200);
        assert_eq!(
            config.vocabulary.funnel_stages,
            vec![StatusLabel::from("Invite"), StatusLabel::from("Matched")]
        );
        assert_eq!(config.vocabulary.start_label, StatusLabel::from("Start"));
    }

    #[test]
    fn rejects_zero_values() {
        assert!(matches!(
            EngineConfig::from_toml_str("page_size = 0"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            EngineConfig::from_toml_str("execution_budget_ms = 0"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            EngineConfig::from_toml_str("[retry]\nmax_attempts = 0"),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn rejects_malformed_toml() {
        assert!(matches!(
            EngineConfig::from_toml_str("page_size = \"many\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn loads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dwell.toml");
        std::fs::write(&path, "execution_budget_ms = 1500\n").unwrap();

        let config = EngineConfig::from_toml_file(&path).unwrap();
        assert_eq!(config.execution_budget(), Duration::from_millis(1500));

        let missing = EngineConfig::from_toml_file(dir.path().join("absent.toml"));
        assert!(matches!(missing, Err(ConfigError::Io { .. })));
    }
}
