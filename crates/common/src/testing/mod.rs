//! Testing utilities and helpers
//!
//! - **[`async_utils`]**: polling and timeout helpers for background work
//!
//! Mock time lives in [`crate::time::MockClock`].

pub mod async_utils;

pub use async_utils::{poll_until, timeout_ok};
