//! Tracing subscriber setup driven by [`LoggingConfig`].

use std::io::IsTerminal;

use anyhow::{Context, Result};
use tracing::Level;
use tracing::warn;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{LogFormat, LoggingConfig};

pub const LOG_FILE_NAME: &str = "server.log";

/// Unknown level names fall back to info.
pub fn effective_level(level: &str) -> Level {
    level.trim().parse().unwrap_or(Level::INFO)
}

fn default_filter(level: Level) -> String {
    let level = level.as_str().to_ascii_lowercase();
    format!("simple_fileserver={level},tower_http={level}")
}

/// Install the global subscriber.
///
/// Returns the writer guard, which must live as long as logging is wanted.
/// Returns `None` when logging is disabled.
pub fn init_logging(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    if !config.enabled {
        return Ok(None);
    }

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(effective_level(&config.level))));

    let mut file_error = None;
    let appender = if config.to_file {
        match RollingFileAppender::builder()
            .rotation(Rotation::NEVER)
            .filename_prefix(LOG_FILE_NAME)
            .build(&config.log_dir)
        {
            Ok(appender) => Some(appender),
            Err(e) => {
                file_error = Some(e);
                None
            }
        }
    } else {
        None
    };

    let to_file = appender.is_some();
    let (writer, guard) = match appender {
        Some(appender) => tracing_appender::non_blocking(appender),
        None => tracing_appender::non_blocking(std::io::stderr()),
    };

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(writer)
        .with_ansi(!to_file && std::io::stderr().is_terminal());

    match config.format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer.json())
            .try_init(),
        LogFormat::Text => tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init(),
    }
    .context("installing tracing subscriber")?;

    if let Some(e) = file_error {
        warn!(
            "Failed to open log file in {}, logging to stderr: {}",
            config.log_dir.display(),
            e
        );
    }

    Ok(Some(guard))
}
