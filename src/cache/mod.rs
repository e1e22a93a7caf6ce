//! Client-side cache for analysis API responses.
//!
//! This module provides:
//! - Deterministic request keys (`endpoint` + sorted parameters)
//! - A fixed TTL per entry with lazy expiry on read
//! - Maintenance: sweep of expired entries and aggregate statistics
//! - A cache-first fetch helper for request handlers

mod clock;
mod entry;
mod key;
mod response_cache;

#[cfg(test)]
pub use clock::ManualClock;
pub use clock::{Clock, SystemClock};
pub use entry::{CacheResult, DEFAULT_TTL_MS};
pub use key::Parameters;
pub use response_cache::ResponseCache;
