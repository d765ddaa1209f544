//! Runtime configuration.

use crate::error::{ConfigError, ConfigResult};

/// Configuration for a transaction runtime.
#[derive(Debug, Clone)]
pub struct Config {
    /// Whether panics raised inside a transaction body become defects.
    ///
    /// When disabled the panic unwinds through the commit loop into the
    /// caller and nothing is committed.
    pub catch_panics: bool,

    /// Number of stale-journal conflicts after which a transaction logs a contention warning.
    pub contention_warn_threshold: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            catch_panics: true,
            contention_warn_threshold: 64,
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether panics in transaction bodies are caught as defects.
    #[must_use]
    pub const fn catch_panics(mut self, value: bool) -> Self {
        self.catch_panics = value;
        self
    }

    /// Sets the contention warning threshold.
    #[must_use]
    pub const fn contention_warn_threshold(mut self, conflicts: u32) -> Self {
        self.contention_warn_threshold = conflicts;
        self
    }

    /// Checks that the configuration is usable.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.contention_warn_threshold == 0 {
            return Err(ConfigError::invalid_threshold(
                self.contention_warn_threshold,
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert!(config.catch_panics);
        assert_eq!(config.contention_warn_threshold, 64);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn builder_pattern() {
        let config = Config::new()
            .catch_panics(false)
            .contention_warn_threshold(8);

        assert!(!config.catch_panics);
        assert_eq!(config.contention_warn_threshold, 8);
    }

    #[test]
    fn zero_threshold_rejected() {
        let config = Config::new().contention_warn_threshold(0);
        assert_eq!(
            config.validate(),
            Err(ConfigError::InvalidThreshold { value: 0 })
        );
    }
}
