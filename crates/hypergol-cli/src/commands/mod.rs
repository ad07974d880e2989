//! CLI command implementations.

use std::time::{SystemTime, UNIX_EPOCH};

pub mod search;
pub mod shell;
pub mod sweep;

/// Seed derived from the wall clock, in nanoseconds.
pub fn time_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or_default()
}
