//! Benchmark helpers for stmkit.

pub mod utils;
