//! Cache-aside client and its supporting pieces
//!
//! | Strategy | On miss | On stale | Blocks caller |
//! |----------|---------|----------|---------------|
//! | [`CacheClient::read_pass_through`] | load inline, negative-cache absence | n/a (physical TTL) | only on the load |
//! | [`CacheClient::read_with_logical_expiry`] | return `None` (pre-warmed keys) | serve stale, rebuild in background | never |
//! | [`CacheClient::read_with_mutex`] | one caller loads under the lock, others retry | n/a (physical TTL) | until loaded or attempts exhausted |
//!
//! A key must be read with a single family of strategies: pass-through and
//! mutex reads store the raw value, logical-expiry reads store an envelope.

mod client;
pub mod codec;
mod metrics;
pub mod ports;

pub use client::{CacheClient, CacheClientBuilder};
pub use metrics::CacheStats;
