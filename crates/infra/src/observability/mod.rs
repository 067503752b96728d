//! Tracing subscriber setup
//!
//! Every crate in the workspace logs through `tracing` with dotted event
//! names (`lock.acquired`, `cache.logical.rebuild_submitted`) and structured
//! fields. This module installs the process-wide subscriber that renders
//! them.

use std::io::IsTerminal;

use cacheaside_domain::LoggingSettings;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

/// Install a global subscriber writing to stdout
///
/// `RUST_LOG` takes precedence over `settings.level`. Output is JSON lines
/// when `settings.json` is set and human-readable otherwise, with ANSI
/// colours only on a terminal.
///
/// Returns `false` if a global subscriber was already installed, in which
/// case the existing one stays in place.
pub fn init_tracing(settings: &LoggingSettings) -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&settings.level));
    let registry = tracing_subscriber::registry();

    let installed = if settings.json {
        let layer = fmt::layer().json().with_target(true).with_filter(filter);
        registry.with(layer).try_init().is_ok()
    } else {
        let use_ansi = std::io::stdout().is_terminal();
        let layer = fmt::layer().with_target(true).with_ansi(use_ansi).with_filter(filter);
        registry.with(layer).try_init().is_ok()
    };

    if installed {
        tracing::info!(level = %settings.level, json = settings.json, "observability.tracing_initialized");
    } else {
        tracing::debug!("observability.tracing_already_initialized");
    }
    installed
}
