use std::path::Path;
use std::sync::OnceLock;

use anyhow::{Context, Result};
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, Registry};

use crate::config::{LogFormat, LoggingConfig};

static FILE_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Install the global subscriber: stdout in the configured format, plus a
/// non-ANSI copy to the log file when one is configured.
pub fn init(config: &LoggingConfig, debug: bool) -> Result<()> {
    let filter = build_filter(&config.level, debug);
    let registry = Registry::default().with(filter);

    let file_writer = match &config.file {
        Some(path) => {
            let (writer, guard) = build_file_writer(path)?;
            let _ = FILE_GUARD.set(guard);
            Some(writer)
        }
        None => None,
    };

    let installed = match config.format {
        LogFormat::Json => {
            let stdout_layer = tracing_subscriber::fmt::layer()
                .json()
                .with_span_events(FmtSpan::CLOSE);
            let file_layer = file_writer.map(|writer| {
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_ansi(false)
                    .with_writer(writer)
            });
            registry.with(stdout_layer).with(file_layer).try_init()
        }
        LogFormat::Pretty => {
            let stdout_layer = tracing_subscriber::fmt::layer().pretty();
            let file_layer = file_writer.map(|writer| {
                tracing_subscriber::fmt::layer()
                    .pretty()
                    .with_ansi(false)
                    .with_writer(writer)
            });
            registry.with(stdout_layer).with(file_layer).try_init()
        }
        LogFormat::Compact => {
            let stdout_layer = tracing_subscriber::fmt::layer().compact();
            let file_layer = file_writer.map(|writer| {
                tracing_subscriber::fmt::layer()
                    .compact()
                    .with_ansi(false)
                    .with_writer(writer)
            });
            registry.with(stdout_layer).with(file_layer).try_init()
        }
    };
    installed.context("Failed to install tracing subscriber")
}

/// `RUST_LOG` wins; otherwise the configured level for our crates and
/// tower_http, `warn` for everything else.
pub fn default_directive(level: &str, debug: bool) -> String {
    let level = if debug { "debug" } else { level };
    format!("timedate={level},timedate_origin={level},tower_http={level},warn")
}

fn build_filter(level: &str, debug: bool) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(level, debug)))
}

fn build_file_writer(path: &Path) -> Result<(NonBlocking, WorkerGuard)> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let file_name = path
        .file_name()
        .with_context(|| format!("Log file path has no file name: {:?}", path))?;

    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create log directory: {:?}", dir))?;

    let appender = RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(file_name.to_string_lossy())
        .build(dir)
        .with_context(|| format!("Failed to open log file: {:?}", path))?;
    Ok(tracing_appender::non_blocking(appender))
}
