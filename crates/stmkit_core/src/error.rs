//! Error types for stmkit.

use crate::types::FiberId;
use std::any::Any;
use std::fmt;
use thiserror::Error;

/// Outcome of committing a transaction.
///
/// `Ok` carries the transaction's value, `Err` explains why it did not
/// produce one.
pub type Exit<A, E> = Result<A, Cause<E>>;

/// Why a committed transaction did not produce a value.
///
/// Only outcomes computed against a journal that was still valid at commit
/// time are ever reported here.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Cause<E> {
    /// Typed, recoverable failure raised with `Stm::fail`.
    #[error("transaction failed: {0}")]
    Fail(E),

    /// Unexpected fault raised with `Stm::die` or a caught panic.
    #[error("transaction died: {0}")]
    Die(Defect),

    /// The fiber running the transaction was interrupted.
    #[error("transaction interrupted by {0}")]
    Interrupt(FiberId),
}

impl<E> Cause<E> {
    /// Returns true for a typed failure.
    pub fn is_fail(&self) -> bool {
        matches!(self, Self::Fail(_))
    }

    /// Returns true for a defect.
    pub fn is_die(&self) -> bool {
        matches!(self, Self::Die(_))
    }

    /// Returns true for an interruption.
    pub fn is_interrupt(&self) -> bool {
        matches!(self, Self::Interrupt(_))
    }

    /// Returns the typed failure, if any.
    pub fn failure(&self) -> Option<&E> {
        match self {
            Self::Fail(e) => Some(e),
            _ => None,
        }
    }

    /// Returns the interrupting fiber, if any.
    pub fn interruptor(&self) -> Option<FiberId> {
        match self {
            Self::Interrupt(by) => Some(*by),
            _ => None,
        }
    }

    /// Maps the typed failure, leaving defects and interrupts untouched.
    pub fn map<E2>(self, f: impl FnOnce(E) -> E2) -> Cause<E2> {
        match self {
            Self::Fail(e) => Cause::Fail(f(e)),
            Self::Die(d) => Cause::Die(d),
            Self::Interrupt(by) => Cause::Interrupt(by),
        }
    }
}

/// An unexpected fault that is not part of a transaction's typed error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Defect {
    message: String,
}

impl Defect {
    /// Creates a defect with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Creates a defect from a panic payload.
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic payload".to_string()
        };
        Self { message }
    }

    /// Returns the defect message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for Defect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for Defect {}

/// Result type for configuration checks.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors raised when building a runtime from an invalid configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// The contention warning threshold must be at least one attempt.
    #[error("invalid contention threshold: {value} (must be at least 1)")]
    InvalidThreshold {
        /// The rejected value.
        value: u32,
    },
}

impl ConfigError {
    /// Creates an invalid threshold error.
    pub fn invalid_threshold(value: u32) -> Self {
        Self::InvalidThreshold { value }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cause_predicates() {
        let fail: Cause<&str> = Cause::Fail("boom");
        assert!(fail.is_fail());
        assert_eq!(fail.failure(), Some(&"boom"));

        let die: Cause<&str> = Cause::Die(Defect::new("bad"));
        assert!(die.is_die());
        assert!(die.failure().is_none());

        let by = FiberId::next();
        let interrupt: Cause<&str> = Cause::Interrupt(by);
        assert!(interrupt.is_interrupt());
        assert_eq!(interrupt.interruptor(), Some(by));
    }

    #[test]
    fn cause_map_only_touches_failures() {
        let fail: Cause<i32> = Cause::Fail(2);
        assert_eq!(fail.map(|n| n * 10), Cause::Fail(20));

        let die: Cause<i32> = Cause::Die(Defect::new("x"));
        assert_eq!(die.map(|n| n * 10), Cause::Die(Defect::new("x")));
    }

    #[test]
    fn defect_from_panic_payloads() {
        assert_eq!(Defect::from_panic(Box::new("static")).message(), "static");
        assert_eq!(
            Defect::from_panic(Box::new(String::from("owned"))).message(),
            "owned"
        );
        assert_eq!(
            Defect::from_panic(Box::new(17_u8)).message(),
            "unknown panic payload"
        );
    }

    #[test]
    fn error_display() {
        let err: Cause<String> = Cause::Fail("insufficient funds".into());
        assert_eq!(err.to_string(), "transaction failed: insufficient funds");

        let err = ConfigError::invalid_threshold(0);
        assert!(err.to_string().contains('0'));
    }
}
