use std::fs::{create_dir_all, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

const DEFAULT_FILTER: &str = "info";
const LOG_FILE_NAME: &str = "run.log";

/// `<data dir>/audiosearch/logs`.
pub fn default_log_dir() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("audiosearch").join("logs"))
}

/// Install the global subscriber: stderr always, plus an append-only
/// `run.log` in `log_dir` when one is given and can be opened.
/// `RUST_LOG` overrides the default `info` filter. Calling this twice is harmless.
pub fn init_logger(log_dir: Option<&Path>) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let file_layer = log_dir.and_then(open_log_file).map(|file| {
        fmt::layer()
            .with_ansi(false)
            .with_writer(Mutex::new(file))
    });

    let result = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .try_init();

    if result.is_ok() {
        if let Some(dir) = log_dir {
            tracing::debug!("[logger] file logger ready: {}", dir.join(LOG_FILE_NAME).display());
        }
    }
}

fn open_log_file(dir: &Path) -> Option<std::fs::File> {
    if create_dir_all(dir).is_err() {
        return None;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join(LOG_FILE_NAME))
        .ok()
}
