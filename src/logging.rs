//! Logging initialization.
//!
//! Initialized exactly once, before any I/O begins. The filter is derived
//! from the `preset` table: the most verbose enabled level wins, `FATAL`
//! folds into ERROR (tracing has no fatal level), and `preset.debug` forces
//! DEBUG. With `preset.log_file` set, records append to that file without
//! ANSI escapes; otherwise they go to the console.

use crate::config::{LogLevel, Preset};
use std::{fs::OpenOptions, sync::Arc};
use thiserror::Error;
use tracing::Level;

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("failed to open log file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to install logger: {0}")]
    Init(String),
}

/// Installs the global tracing subscriber from the `preset` section.
pub fn init(preset: &Preset) -> Result<(), LoggingError> {
    let level = if preset.debug {
        Level::DEBUG
    } else {
        max_enabled_level(&preset.log_levels)
    };

    match &preset.log_file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            tracing_subscriber::fmt()
                .with_max_level(level)
                .with_writer(Arc::new(file))
                .with_ansi(false)
                .try_init()
                .map_err(|err| LoggingError::Init(err.to_string()))
        }
        None => tracing_subscriber::fmt()
            .with_max_level(level)
            .try_init()
            .map_err(|err| LoggingError::Init(err.to_string())),
    }
}

fn max_enabled_level(levels: &[LogLevel]) -> Level {
    if levels.contains(&LogLevel::Debug) {
        Level::DEBUG
    } else if levels.contains(&LogLevel::Info) {
        Level::INFO
    } else if levels.contains(&LogLevel::Warn) {
        Level::WARN
    } else {
        Level::ERROR
    }
}
