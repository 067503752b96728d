//! # cacheaside Domain
//!
//! Domain types shared by every cacheaside crate.
//!
//! This crate contains:
//! - Cache keys and the stored-value vocabulary (null marker, lock prefix)
//! - The [`CacheError`] type and [`Result`] alias
//! - Configuration structures
//! - Default constants
//!
//! ## Architecture
//! - No dependencies on other cacheaside crates
//! - Only external dependencies allowed

pub mod config;
pub mod constants;
pub mod errors;
pub mod types;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;
