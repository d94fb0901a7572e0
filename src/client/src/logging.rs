use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    fmt::{self, time::SystemTime},
    prelude::*,
    EnvFilter,
};

const DEFAULT_LOG_FILE: &str = "arcu.log";

#[derive(Debug, Clone, Default)]
pub struct LoggingOptions {
    /// Production builds only emit errors unless `RUST_LOG` says otherwise.
    pub production: bool,
    /// Also write logs to this file.
    pub log_file: Option<PathBuf>,
}

pub fn default_directive(production: bool) -> &'static str {
    if production {
        "error"
    } else {
        "debug"
    }
}

fn file_appender(path: &Path) -> Result<RollingFileAppender> {
    let directory = path.parent().unwrap_or_else(|| Path::new("."));
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| DEFAULT_LOG_FILE.to_string());

    RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(file_name)
        .build(directory)
        .with_context(|| format!("Failed to open log file {:?}", path))
}

pub fn setup_logging(options: &LoggingOptions) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(options.production)));

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_level(true)
        .with_timer(SystemTime)
        .with_writer(std::io::stderr);

    let file_layer = match &options.log_file {
        Some(path) => Some(
            fmt::layer()
                .with_file(true)
                .with_line_number(true)
                .with_thread_ids(true)
                .with_thread_names(true)
                .with_target(true)
                .with_level(true)
                .with_ansi(false)
                .with_timer(SystemTime)
                .with_writer(file_appender(path)?),
        ),
        None => None,
    };

    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer);

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    match &options.log_file {
        Some(path) => tracing::info!("Logging system initialized. Writing to {:?}", path),
        None => tracing::info!("Logging system initialized"),
    }

    Ok(())
}
