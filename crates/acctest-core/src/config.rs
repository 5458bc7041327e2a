//! Harness configuration
//!
//! Loaded from TOML, then overridden from the environment. Every field has a
//! default so an empty file is a valid configuration.

use crate::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Overrides `max_parallel`
pub const ENV_PARALLELISM: &str = "ACCTEST_PARALLELISM";
/// Overrides `cleanup_timeout_secs`
pub const ENV_CLEANUP_TIMEOUT: &str = "ACCTEST_CLEANUP_TIMEOUT_SECS";
/// Overrides the primary location
pub const ENV_LOCATION: &str = "ARM_TEST_LOCATION";
/// Overrides the secondary location
pub const ENV_LOCATION_ALT: &str = "ARM_TEST_LOCATION_ALT";

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("reading {path}: {source}")]
    Io {
        /// File path
        path: String,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// TOML did not parse
    #[error("parsing configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is out of range
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// What the destroy check does with a transient lookup error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransientOnDestroy {
    /// Best-effort cleanup check: a failed read counts as absent (logged)
    #[default]
    TreatAsAbsent,
    /// A failed read fails the check
    Fail,
}

/// How many instances the destroy check evaluates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DestroyCheckMode {
    /// Evaluate every instance and report all failures
    #[default]
    CheckAll,
    /// Return on the first failing instance
    StopAtFirst,
}

/// Destroy check policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DestroyPolicy {
    /// Transient error handling
    pub on_transient: TransientOnDestroy,
    /// Instance coverage
    pub mode: DestroyCheckMode,
    /// Consecutive not-found reads required before absence is confirmed
    pub absence_confirmations: u32,
    /// Delay between confirmation reads, in milliseconds
    pub confirmation_delay_ms: u64,
}

impl DestroyPolicy {
    /// Delay between confirmation reads
    #[inline]
    #[must_use]
    pub fn confirmation_delay(&self) -> Duration {
        Duration::from_millis(self.confirmation_delay_ms)
    }
}

impl Default for DestroyPolicy {
    fn default() -> Self {
        Self {
            on_transient: TransientOnDestroy::default(),
            mode: DestroyCheckMode::default(),
            absence_confirmations: 2,
            confirmation_delay_ms: 5_000,
        }
    }
}

/// Test locations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocationConfig {
    /// Primary location
    pub primary: String,
    /// Secondary location
    pub secondary: String,
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            primary: "westeurope".to_string(),
            secondary: "northeurope".to_string(),
        }
    }
}

/// Harness configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Maximum scenarios running at once
    pub max_parallel: usize,
    /// Bound on teardown per scenario, in seconds
    pub cleanup_timeout_secs: u64,
    /// Re-plan after every apply and fail on pending changes
    pub plan_after_apply: bool,
    /// Retry policy wrapped around existence lookups
    pub existence_retry: RetryPolicy,
    /// Destroy check policy
    pub destroy: DestroyPolicy,
    /// Test locations
    pub locations: LocationConfig,
    /// Environment variables every scenario requires
    pub required_env: Vec<String>,
}

impl HarnessConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from TOML text
    ///
    /// # Errors
    /// `ConfigError::Parse` for malformed TOML, `ConfigError::Invalid` for
    /// out-of-range values.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file
    ///
    /// # Errors
    /// `ConfigError::Io` when the file cannot be read, otherwise as
    /// [`HarnessConfig::from_toml_str`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Apply overrides from the process environment
    ///
    /// # Errors
    /// `ConfigError::Invalid` when an override does not parse.
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary lookup
    ///
    /// # Errors
    /// `ConfigError::Invalid` when an override does not parse.
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(ENV_PARALLELISM) {
            self.max_parallel = raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::Invalid(format!("{ENV_PARALLELISM}={raw:?}")))?;
        }
        if let Some(raw) = lookup(ENV_CLEANUP_TIMEOUT) {
            self.cleanup_timeout_secs = raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::Invalid(format!("{ENV_CLEANUP_TIMEOUT}={raw:?}")))?;
        }
        if let Some(location) = lookup(ENV_LOCATION) {
            self.locations.primary = location;
        }
        if let Some(location) = lookup(ENV_LOCATION_ALT) {
            self.locations.secondary = location;
        }
        self.validate()?;
        Ok(self)
    }

    /// Check value ranges
    ///
    /// # Errors
    /// `ConfigError::Invalid` naming the offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_parallel == 0 {
            return Err(ConfigError::Invalid("max_parallel must be at least 1".into()));
        }
        if self.destroy.absence_confirmations == 0 {
            return Err(ConfigError::Invalid(
                "destroy.absence_confirmations must be at least 1".into(),
            ));
        }
        if self.existence_retry.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "existence_retry.max_attempts must be at least 1".into(),
            ));
        }
        if self.locations.primary.trim().is_empty() || self.locations.secondary.trim().is_empty() {
            return Err(ConfigError::Invalid("locations must not be empty".into()));
        }
        Ok(())
    }

    /// Cleanup bound
    #[inline]
    #[must_use]
    pub fn cleanup_timeout(&self) -> Duration {
        Duration::from_secs(self.cleanup_timeout_secs)
    }

    /// With parallelism bound
    #[inline]
    #[must_use]
    pub fn with_max_parallel(mut self, max: usize) -> Self {
        self.max_parallel = max;
        self
    }

    /// With cleanup bound
    #[inline]
    #[must_use]
    pub fn with_cleanup_timeout(mut self, timeout: Duration) -> Self {
        self.cleanup_timeout_secs = timeout.as_secs();
        self
    }

    /// With destroy policy
    #[inline]
    #[must_use]
    pub fn with_destroy_policy(mut self, policy: DestroyPolicy) -> Self {
        self.destroy = policy;
        self
    }

    /// With existence retry policy
    #[inline]
    #[must_use]
    pub fn with_existence_retry(mut self, policy: RetryPolicy) -> Self {
        self.existence_retry = policy;
        self
    }

    /// With required environment variables
    #[inline]
    #[must_use]
    pub fn with_required_env(mut self, vars: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.required_env = vars.into_iter().map(Into::into).collect();
        self
    }
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            max_parallel: 4,
            cleanup_timeout_secs: 1_800,
            plan_after_apply: true,
            existence_retry: RetryPolicy::none(),
            destroy: DestroyPolicy::default(),
            locations: LocationConfig::default(),
            required_env: Vec::new(),
        }
    }
}
