// SPDX-License-Identifier: CEPL-1.0
#![deny(unsafe_op_in_unsafe_fn)]
pub mod config;

use serde::Deserialize;

/// Logging switches read from the `[log]` table of the config file.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Default filter directive; `RUST_LOG` wins when set.
    pub level: String,
    pub timestamp: bool,
    pub show_level: bool,
    pub source_location: bool,
    pub colors: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            level: "info".to_owned(),
            timestamp: false,
            show_level: true,
            source_location: true,
            colors: true,
        }
    }
}

pub fn init_tracing(cfg: &LogConfig) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cfg.level));
    let builder = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(cfg.show_level)
        .with_file(cfg.source_location)
        .with_line_number(cfg.source_location)
        .with_ansi(cfg.colors);

    // The timer is part of the subscriber type, so each arm installs its own.
    let _ = if cfg.timestamp {
        builder.compact().try_init()
    } else {
        builder.without_time().compact().try_init()
    };
}
