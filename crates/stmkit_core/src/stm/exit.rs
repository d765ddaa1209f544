//! Outcome of evaluating a transaction body once.

use crate::error::Defect;
use crate::types::FiberId;

/// Result of a single evaluation of a transaction body.
///
/// `Retry` is a control signal consumed by the commit loop; callers of
/// `commit` never observe it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TExit<A, E> {
    /// The body produced a value.
    Succeed(A),
    /// The body failed with a typed error.
    Fail(E),
    /// The body hit a defect.
    Die(Defect),
    /// The body interrupted its own fiber.
    Interrupt(FiberId),
    /// The body asked to be re-run once a touched ref changes.
    Retry,
}

impl<A, E> TExit<A, E> {
    /// Maps a successful value.
    pub fn map<B>(self, f: impl FnOnce(A) -> B) -> TExit<B, E> {
        match self {
            Self::Succeed(a) => TExit::Succeed(f(a)),
            Self::Fail(e) => TExit::Fail(e),
            Self::Die(d) => TExit::Die(d),
            Self::Interrupt(by) => TExit::Interrupt(by),
            Self::Retry => TExit::Retry,
        }
    }

    /// Maps a typed failure.
    pub fn map_err<E2>(self, f: impl FnOnce(E) -> E2) -> TExit<A, E2> {
        match self {
            Self::Succeed(a) => TExit::Succeed(a),
            Self::Fail(e) => TExit::Fail(f(e)),
            Self::Die(d) => TExit::Die(d),
            Self::Interrupt(by) => TExit::Interrupt(by),
            Self::Retry => TExit::Retry,
        }
    }

    /// Splits off a successful value, passing every other outcome through.
    pub(crate) fn into_result<B>(self) -> Result<A, TExit<B, E>> {
        match self {
            Self::Succeed(a) => Ok(a),
            Self::Fail(e) => Err(TExit::Fail(e)),
            Self::Die(d) => Err(TExit::Die(d)),
            Self::Interrupt(by) => Err(TExit::Interrupt(by)),
            Self::Retry => Err(TExit::Retry),
        }
    }

    /// Returns true for the retry signal.
    pub fn is_retry(&self) -> bool {
        matches!(self, Self::Retry)
    }
}

impl<A, E> From<Result<A, E>> for TExit<A, E> {
    fn from(result: Result<A, E>) -> Self {
        match result {
            Ok(a) => Self::Succeed(a),
            Err(e) => Self::Fail(e),
        }
    }
}
