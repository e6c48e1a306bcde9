//! Workflow configuration
//!
//! Every field has a default, so a TOML file only needs the keys it changes:
//!
//! ```toml
//! require_independent_verification = true
//!
//! [similarity]
//! top_k = 5
//! recurrence_threshold = 0.2
//!
//! [index]
//! refresh_interval_ms = 2000
//! ```

use rca_similarity::IndexConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Longest accepted look-back window, in days
pub const MAX_WINDOW_DAYS: u32 = 36_500;

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("cannot read config {path}: {source}")]
    Io {
        /// Config path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// File is not valid TOML for this schema
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is out of range
    #[error("invalid config value {field}: {reason}")]
    Invalid {
        /// Offending key
        field: &'static str,
        /// What is wrong
        reason: String,
    },
}

/// Recurrence search settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimilaritySettings {
    /// Default number of candidates returned
    pub top_k: usize,
    /// Minimum cosine score flagged as a likely recurrence
    pub recurrence_threshold: f64,
    /// Drop English stop words before weighting
    pub remove_stop_words: bool,
    /// Add adjacent-term bigrams to the vocabulary
    pub include_bigrams: bool,
}

impl Default for SimilaritySettings {
    fn default() -> Self {
        Self {
            top_k: 5,
            recurrence_threshold: 0.2,
            remove_stop_words: true,
            include_bigrams: false,
        }
    }
}

impl SimilaritySettings {
    /// Tokenization options for the index
    #[inline]
    #[must_use]
    pub fn index_config(&self) -> IndexConfig {
        IndexConfig {
            remove_stop_words: self.remove_stop_words,
            include_bigrams: self.include_bigrams,
        }
    }
}

/// Index maintenance settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexSettings {
    /// Rebuild a stale index when a query arrives
    pub rebuild_on_read: bool,
    /// Background refresh period; `0` disables the refresher
    pub refresh_interval_ms: u64,
    /// Cached query results
    pub query_cache_capacity: u64,
    /// Lifetime of a cached query result
    pub query_cache_ttl_secs: u64,
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            rebuild_on_read: true,
            refresh_interval_ms: 2000,
            query_cache_capacity: 256,
            query_cache_ttl_secs: 300,
        }
    }
}

impl IndexSettings {
    /// Background refresh period, if enabled
    #[must_use]
    pub fn refresh_interval(&self) -> Option<Duration> {
        (self.refresh_interval_ms > 0).then(|| Duration::from_millis(self.refresh_interval_ms))
    }
}

/// Orchestrator configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    /// Recurrence search
    pub similarity: SimilaritySettings,
    /// Index maintenance
    pub index: IndexSettings,
    /// Verifier must differ from the action owner and every evidence submitter
    pub require_independent_verification: bool,
    /// Window for the "recent incidents" KPI
    pub recent_incident_window_days: u32,
    /// Default look-back of the audit view
    pub audit_window_days: u32,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            similarity: SimilaritySettings::default(),
            index: IndexSettings::default(),
            require_independent_verification: true,
            recent_incident_window_days: 30,
            audit_window_days: 183,
        }
    }
}

impl WorkflowConfig {
    /// Parse and validate TOML text
    ///
    /// # Errors
    /// Returns [`ConfigError::Parse`] or [`ConfigError::Invalid`].
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file
    ///
    /// # Errors
    /// Returns [`ConfigError::Io`] when the file cannot be read, otherwise as
    /// [`WorkflowConfig::from_toml_str`].
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Check value ranges
    ///
    /// # Errors
    /// Returns [`ConfigError::Invalid`] for the first out-of-range value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.similarity.top_k == 0 {
            return Err(ConfigError::Invalid {
                field: "similarity.top_k",
                reason: "must be at least 1".to_string(),
            });
        }
        let threshold = self.similarity.recurrence_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(ConfigError::Invalid {
                field: "similarity.recurrence_threshold",
                reason: format!("{threshold} is outside [0, 1]"),
            });
        }
        for (field, days) in [
            ("recent_incident_window_days", self.recent_incident_window_days),
            ("audit_window_days", self.audit_window_days),
        ] {
            if days > MAX_WINDOW_DAYS {
                return Err(ConfigError::Invalid {
                    field,
                    reason: format!("{days} exceeds the maximum of {MAX_WINDOW_DAYS} days"),
                });
            }
        }
        if self.index.query_cache_capacity == 0 {
            return Err(ConfigError::Invalid {
                field: "index.query_cache_capacity",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// With default candidate count
    #[inline]
    #[must_use]
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.similarity.top_k = top_k;
        self
    }

    /// With likely-recurrence threshold
    #[inline]
    #[must_use]
    pub fn with_recurrence_threshold(mut self, threshold: f64) -> Self {
        self.similarity.recurrence_threshold = threshold;
        self
    }

    /// With or without the independent-verifier rule
    #[inline]
    #[must_use]
    pub fn with_independent_verification(mut self, required: bool) -> Self {
        self.require_independent_verification = required;
        self
    }

    /// With or without rebuild-on-read
    #[inline]
    #[must_use]
    pub fn with_rebuild_on_read(mut self, enabled: bool) -> Self {
        self.index.rebuild_on_read = enabled;
        self
    }

    /// With background refresh period in milliseconds (`0` disables)
    #[inline]
    #[must_use]
    pub fn with_refresh_interval_ms(mut self, interval_ms: u64) -> Self {
        self.index.refresh_interval_ms = interval_ms;
        self
    }
}
