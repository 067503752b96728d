//! Configuration loading
//!
//! Settings types live in `cacheaside-domain`; this module reads them from
//! files and the environment.

pub mod loader;

pub use loader::{apply_env_overrides, load, load_from_env, load_from_file, discover_config_path};
