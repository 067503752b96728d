//! Configuration loader
//!
//! Loads [`Config`] from an optional file plus environment overrides.
//!
//! ## Loading Strategy
//! 1. Read `.env` from the working directory, if present
//! 2. Probe the standard locations for a config file; start from its
//!    contents, or from the defaults if none exists
//! 3. Override individual fields from `CACHEASIDE_*` environment variables
//! 4. Validate the result
//!
//! ## Environment Variables
//! - `CACHEASIDE_NULL_TTL_SECS`: TTL of null markers
//! - `CACHEASIDE_LOCK_TTL_SECS`: TTL of rebuild locks
//! - `CACHEASIDE_RETRY_INTERVAL_MS`: sleep between mutex lock attempts
//! - `CACHEASIDE_MAX_LOCK_ATTEMPTS`: mutex lock attempts before giving up
//! - `CACHEASIDE_REBUILD_WORKERS`: rebuild worker count
//! - `CACHEASIDE_REBUILD_QUEUE`: rebuild queue capacity
//! - `CACHEASIDE_REDIS_URL`: switches the store to Redis at this URL
//! - `CACHEASIDE_LOG_LEVEL`: default log filter
//! - `CACHEASIDE_LOG_JSON`: JSON log output (true/false)
//!
//! ## File Locations
//! The loader looks for the following names, in order, in the working
//! directory, its parent and grandparent, then next to the executable:
//! `cacheaside.toml`, `cacheaside.json`, `config.toml`, `config.json`.

use std::env::VarError;
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use cacheaside_domain::{CacheError, Config, Result, StoreSettings};

const CONFIG_FILE_NAMES: [&str; 4] =
    ["cacheaside.toml", "cacheaside.json", "config.toml", "config.json"];

/// Load configuration from the first config file found plus the environment
///
/// # Errors
/// Returns `CacheError::Config` if the file cannot be read or parsed, an
/// environment variable holds an invalid value, or validation fails.
pub fn load() -> Result<Config> {
    match dotenvy::dotenv() {
        Ok(path) => tracing::debug!(path = %path.display(), "config.dotenv_loaded"),
        Err(err) => tracing::trace!(error = %err, "config.dotenv_skipped"),
    }

    let mut config = match discover_config_path() {
        Some(path) => read_config(&path)?,
        None => {
            tracing::debug!("config.no_file_found");
            Config::default()
        }
    };
    apply_env_overrides(&mut config)?;
    config.validate()?;

    tracing::info!(
        store = store_label(&config.store),
        rebuild_workers = config.cache.rebuild_workers,
        "config.loaded"
    );
    Ok(config)
}

/// Load configuration from defaults plus environment variables only
///
/// # Errors
/// Returns `CacheError::Config` if a variable holds an invalid value or
/// validation fails.
pub fn load_from_env() -> Result<Config> {
    let mut config = Config::default();
    apply_env_overrides(&mut config)?;
    config.validate()?;
    Ok(config)
}

/// Load configuration from a file
///
/// If `path` is `None`, searches the standard locations (see
/// [`discover_config_path`]). Format is detected by extension. Fields the file
/// omits keep their defaults; the environment is not consulted.
///
/// # Errors
/// Returns `CacheError::Config` if:
/// - File not found (when path is specified)
/// - No config file found (when path is `None`)
/// - File format is invalid
/// - Validation fails
pub fn load_from_file(path: Option<PathBuf>) -> Result<Config> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(CacheError::Config(format!("Config file not found: {}", p.display())));
            }
            p
        }
        None => discover_config_path().ok_or_else(|| {
            CacheError::Config("No config file found in any of the standard locations".to_string())
        })?,
    };

    let config = read_config(&config_path)?;
    config.validate()?;
    Ok(config)
}

fn read_config(path: &Path) -> Result<Config> {
    tracing::info!(path = %path.display(), "config.reading_file");

    let contents = std::fs::read_to_string(path)
        .map_err(|e| CacheError::Config(format!("Failed to read config file: {e}")))?;

    parse_config(&contents, path)
}

/// Parse configuration, detecting the format from the file extension
fn parse_config(contents: &str, path: &Path) -> Result<Config> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match extension {
        "toml" => {
            toml::from_str(contents).map_err(|e| CacheError::Config(format!("Invalid TOML format: {e}")))
        }
        "json" => serde_json::from_str(contents)
            .map_err(|e| CacheError::Config(format!("Invalid JSON format: {e}"))),
        _ => Err(CacheError::Config(format!("Unsupported config format: {extension}"))),
    }
}

/// Probe the standard locations for a configuration file
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn discover_config_path() -> Option<PathBuf> {
    let mut bases = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        bases.extend(cwd.ancestors().take(3).map(Path::to_path_buf));
    }
    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            bases.push(exe_dir.to_path_buf());
        }
    }

    bases.iter().find_map(|base| find_in_dir(base))
}

fn find_in_dir(dir: &Path) -> Option<PathBuf> {
    CONFIG_FILE_NAMES.iter().map(|name| dir.join(name)).find(|path| path.is_file())
}

/// Override fields of `config` from `CACHEASIDE_*` environment variables
///
/// Unset variables leave the field untouched.
///
/// # Errors
/// Returns `CacheError::Config` naming the first variable that fails to parse.
pub fn apply_env_overrides(config: &mut Config) -> Result<()> {
    let cache = &mut config.cache;
    if let Some(secs) = env_parse("CACHEASIDE_NULL_TTL_SECS")? {
        cache.null_ttl_secs = secs;
    }
    if let Some(secs) = env_parse("CACHEASIDE_LOCK_TTL_SECS")? {
        cache.lock_ttl_secs = secs;
    }
    if let Some(millis) = env_parse("CACHEASIDE_RETRY_INTERVAL_MS")? {
        cache.retry_interval_ms = millis;
    }
    if let Some(attempts) = env_parse("CACHEASIDE_MAX_LOCK_ATTEMPTS")? {
        cache.max_lock_attempts = attempts;
    }
    if let Some(workers) = env_parse("CACHEASIDE_REBUILD_WORKERS")? {
        cache.rebuild_workers = workers;
    }
    if let Some(capacity) = env_parse("CACHEASIDE_REBUILD_QUEUE")? {
        cache.rebuild_queue_capacity = capacity;
    }

    if let Some(url) = env_string("CACHEASIDE_REDIS_URL")? {
        config.store = StoreSettings::Redis { url };
    }

    if let Some(level) = env_string("CACHEASIDE_LOG_LEVEL")? {
        config.logging.level = level;
    }
    config.logging.json = env_bool("CACHEASIDE_LOG_JSON", config.logging.json);

    Ok(())
}

fn store_label(store: &StoreSettings) -> &'static str {
    match store {
        StoreSettings::Memory => "memory",
        StoreSettings::Redis { .. } => "redis",
    }
}

/// Read an optional environment variable
///
/// # Errors
/// Returns `CacheError::Config` if the value is not valid unicode.
fn env_string(key: &str) -> Result<Option<String>> {
    match std::env::var(key) {
        Ok(value) => Ok(Some(value)),
        Err(VarError::NotPresent) => Ok(None),
        Err(VarError::NotUnicode(_)) => {
            Err(CacheError::Config(format!("Environment variable {key} is not valid unicode")))
        }
    }
}

/// Parse an optional environment variable
fn env_parse<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: Display,
{
    env_string(key)?
        .map(|raw| {
            raw.trim().parse::<T>().map_err(|e| CacheError::Config(format!("Invalid {key}: {e}")))
        })
        .transpose()
}

/// Parse boolean from environment variable
///
/// Accepts: `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive)
fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}
