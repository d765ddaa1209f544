//! # stmkit Core
//!
//! Software transactional memory for fiber-based runtimes.
//!
//! This crate provides:
//! - Transactional references ([`TRef`]) with identity-versioned snapshots
//! - Per-attempt journals and an optimistic commit protocol
//! - Composable transaction descriptions ([`Stm`]) with blocking `retry`
//! - Fibers that commit transactions from async tasks or OS threads
//! - A counting [`Semaphore`] built entirely on transactional refs
//!
//! ```rust,ignore
//! use stmkit_core::{Stm, TRef};
//!
//! let counter = TRef::new(0);
//! let increment: Stm<i32> = counter.update_and_get(|n| n + 1);
//! assert_eq!(increment.commit().await, Ok(1));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod atomically;
mod config;
mod error;
mod fiber;
mod runtime;
mod semaphore;
mod stats;
mod stm;
mod tref;
mod txn;
mod types;
mod versioned;
mod wake;

pub use atomically::Atomically;
pub use config::Config;
pub use error::{Cause, ConfigError, ConfigResult, Defect, Exit};
pub use fiber::{Fiber, FiberHandle};
pub use runtime::Runtime;
pub use semaphore::{Semaphore, SemaphorePermit};
pub use stats::{StatsSnapshot, StmStats};
pub use stm::{Stm, TExit, Txn};
pub use tref::TRef;
pub use txn::{Entry, Journal};
pub use types::{FiberId, TRefId, TxnId};
pub use versioned::Versioned;
pub use wake::{WakeCallback, WakeHandle};
