//! # stmkit Testkit
//!
//! Test utilities for stmkit.
//!
//! This crate provides:
//! - Tracing setup and transactional fixtures
//! - Property-based test generators using proptest
//! - Stress testing utilities
//!
//! ## Usage
//!
//! ```rust,ignore
//! use stmkit_testkit::prelude::*;
//!
//! #[test]
//! fn transfers_preserve_total() {
//!     init_tracing();
//!     let accounts = Accounts::new(4, 100);
//!     accounts.transfer(0, 1, 30).commit_blocking().unwrap();
//!     assert_eq!(accounts.total().commit_blocking(), Ok(400));
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod stress;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::stress::*;
}

pub use fixtures::*;
pub use generators::*;
pub use stress::*;
