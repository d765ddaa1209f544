//! Transaction runtime: configuration, statistics and fiber creation.

use crate::config::Config;
use crate::error::ConfigResult;
use crate::fiber::Fiber;
use crate::stats::StmStats;
use std::sync::{Arc, OnceLock};
use tracing::debug;

struct RuntimeInner {
    config: Config,
    stats: StmStats,
}

/// Shared state for the fibers that commit transactions.
///
/// Runtimes are cheap to clone; clones share configuration and statistics.
/// Refs are not owned by a runtime and may be used from any of them, since
/// all commits in the process serialize on the same critical section.
///
/// ```rust,ignore
/// use stmkit_core::{Config, Runtime, TRef};
///
/// let runtime = Runtime::new(Config::new().contention_warn_threshold(16))?;
/// let counter = TRef::new(0);
/// runtime.fiber().commit_blocking(counter.update(|n| n + 1))?;
/// assert_eq!(runtime.stats().commits(), 1);
/// ```
#[derive(Clone)]
pub struct Runtime {
    inner: Arc<RuntimeInner>,
}

impl Runtime {
    /// Creates a runtime after validating `config`.
    pub fn new(config: Config) -> ConfigResult<Self> {
        config.validate()?;
        debug!(
            catch_panics = config.catch_panics,
            contention_warn_threshold = config.contention_warn_threshold,
            "runtime created"
        );
        Ok(Self {
            inner: Arc::new(RuntimeInner {
                config,
                stats: StmStats::new(),
            }),
        })
    }

    /// Returns the process-wide runtime with the default configuration.
    ///
    /// Used by [`Stm::commit`](crate::Stm::commit) and
    /// [`Stm::commit_blocking`](crate::Stm::commit_blocking).
    pub fn global() -> &'static Runtime {
        static GLOBAL: OnceLock<Runtime> = OnceLock::new();
        GLOBAL.get_or_init(Runtime::default)
    }

    /// Returns the runtime configuration.
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Returns the runtime statistics.
    pub fn stats(&self) -> &StmStats {
        &self.inner.stats
    }

    /// Starts a new fiber bound to this runtime.
    pub fn fiber(&self) -> Fiber {
        Fiber::new(self.clone())
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self {
            inner: Arc::new(RuntimeInner {
                config: Config::default(),
                stats: StmStats::new(),
            }),
        }
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("config", &self.inner.config)
            .field("stats", &self.inner.stats.snapshot())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConfigError;

    #[test]
    fn new_rejects_invalid_config() {
        let result = Runtime::new(Config::new().contention_warn_threshold(0));
        assert!(matches!(
            result,
            Err(ConfigError::InvalidThreshold { value: 0 })
        ));
    }

    #[test]
    fn clones_share_stats() {
        let runtime = Runtime::new(Config::default()).unwrap();
        let clone = runtime.clone();
        runtime.stats().record_commit();
        assert_eq!(clone.stats().commits(), 1);
    }

    #[test]
    fn global_is_a_singleton() {
        let a = Runtime::global();
        let b = Runtime::global();
        assert!(Arc::ptr_eq(&a.inner, &b.inner));
        assert!(a.config().catch_panics);
    }

    #[test]
    fn fibers_get_distinct_ids() {
        let runtime = Runtime::default();
        assert_ne!(runtime.fiber().id(), runtime.fiber().id());
    }
}
