//! Logging setup.
//!
//! One-shot commands log to stderr. The interactive shell owns the
//! terminal, so its logs go to a rolling file under `.playdeck-logs/`
//! instead (non-blocking appender; the guard is leaked to keep the writer
//! alive for the process lifetime).

use std::path::Path;

use anyhow::{Context, Result};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const LOG_DIR: &str = ".playdeck-logs";
const LOG_FILE_PREFIX: &str = "playdeck-cli";

fn default_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,playdeck_cli=info"))
}

/// Stderr logging for one-shot commands.
pub(crate) fn init_stderr() {
    tracing_subscriber::fmt()
        .with_env_filter(default_filter())
        .with_writer(std::io::stderr)
        .init();
}

/// File logging for the interactive shell.
pub(crate) fn init_file() -> Result<()> {
    let log_dir = Path::new(LOG_DIR);
    if !log_dir.exists() {
        std::fs::create_dir_all(log_dir).with_context(|| format!("create {LOG_DIR}"))?;
    }

    let appender = RollingFileAppender::new(Rotation::DAILY, LOG_DIR, LOG_FILE_PREFIX);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    Box::leak(Box::new(guard));

    let layer = fmt::layer().with_writer(writer).with_ansi(false);
    tracing_subscriber::registry()
        .with(default_filter())
        .with(layer)
        .init();

    tracing::info!(dir = LOG_DIR, "interactive shell logging to file");
    Ok(())
}
