//! File logging for the terminal UI.
//!
//! The terminal is owned by ratatui, so nothing may be written to stdout or
//! stderr while the app runs. Logs go to `{dir}/storefront-chat.log`; the
//! directory defaults to `{data_local_dir}/storefront`.
//!
//! Default level is `storefront_core=info,storefront_tui=info` when
//! `RUST_LOG` is not set.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const LOG_FILE: &str = "storefront-chat.log";
const DEFAULT_FILTER: &str = "storefront_core=info,storefront_tui=info";

pub fn default_log_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|p| p.join("storefront"))
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Install the global subscriber. Keep the returned guard alive until exit
/// or buffered lines are lost.
pub fn init(log_dir: Option<&Path>) -> Result<WorkerGuard> {
    let dir = log_dir.map(Path::to_path_buf).unwrap_or_else(default_log_dir);
    std::fs::create_dir_all(&dir)
        .map_err(|e| anyhow!("Failed to create log dir {:?}: {}", dir, e))?;

    let file_appender = tracing_appender::rolling::never(&dir, LOG_FILE);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_target(true),
        )
        .try_init()
        .map_err(|e| anyhow!("Failed to install log subscriber: {}", e))?;

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_init_writes_to_log_dir() {
        let dir = TempDir::new().unwrap();
        let log_dir = dir.path().join("logs");

        let guard = init(Some(&log_dir)).unwrap();
        tracing::info!(target: "storefront_tui", "log smoke test");
        drop(guard);

        let written = std::fs::read_to_string(log_dir.join(LOG_FILE)).unwrap();
        assert!(written.contains("log smoke test"));
    }
}
