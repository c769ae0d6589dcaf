//! `tracing` subscriber setup for applications embedding the container.
//!
//! The container itself only emits events; installing a subscriber is up to
//! the application. [`init_logging`] is a ready-made one: an [`EnvFilter`]
//! read from `CONTAINER_LOG` (falling back to the configured level) and a
//! human-readable or JSON formatter.

use once_cell::sync::OnceCell;
use tracing::{debug, Level};
use tracing_subscriber::{fmt, fmt::format::FmtSpan, prelude::*, EnvFilter, Registry};

/// Environment variable holding filter directives, e.g. `container=debug`
pub const LOG_ENV_VAR: &str = "CONTAINER_LOG";

static INITIALIZED: OnceCell<()> = OnceCell::new();

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Used when `CONTAINER_LOG` is unset or invalid
    pub level: Level,
    pub json_output: bool,
    pub color_output: bool,
    pub include_line_numbers: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            json_output: false,
            color_output: true,
            include_line_numbers: false,
        }
    }
}

impl LoggingConfig {
    pub fn production() -> Self {
        Self {
            level: Level::INFO,
            json_output: true,
            color_output: false,
            include_line_numbers: false,
        }
    }

    pub fn development() -> Self {
        Self {
            level: Level::DEBUG,
            json_output: false,
            color_output: true,
            include_line_numbers: true,
        }
    }
}

fn env_filter(level: Level) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV_VAR)
        .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_lowercase()))
}

/// Install the global subscriber.
///
/// Calling it again, or after another subscriber was installed, is a no-op.
pub fn init_logging(config: LoggingConfig) -> anyhow::Result<()> {
    if INITIALIZED.get().is_some() {
        return Ok(());
    }

    let filter = env_filter(config.level);
    let result = if config.json_output {
        let json_layer = fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(false)
            .with_target(true)
            .with_line_number(config.include_line_numbers);
        Registry::default().with(filter).with(json_layer).try_init()
    } else {
        let fmt_layer = fmt::layer()
            .with_target(true)
            .with_thread_names(true)
            .with_line_number(config.include_line_numbers)
            .with_ansi(config.color_output)
            .with_span_events(FmtSpan::CLOSE);
        Registry::default().with(filter).with(fmt_layer).try_init()
    };

    if let Err(error) = result {
        debug!(error = %error, "global subscriber already installed");
    }
    let _ = INITIALIZED.set(());
    Ok(())
}
