//! Background cache repopulation
//!
//! Logical-expiry reads hand rebuilds to a [`RebuildExecutor`] so the caller
//! returns the stale value immediately. The executor is owned by (or injected
//! into) each client; there is no process-wide pool.

mod executor;

pub use executor::{rebuild_pool, InlineExecutor, RebuildExecutor, RebuildJob};
