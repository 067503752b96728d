//! Time abstractions
//!
//! The cache compares logical expiry timestamps and physical TTL deadlines
//! against a [`Clock`], so tests can move time forward without sleeping.

mod clock;

pub use clock::{Clock, MockClock, SystemClock};
