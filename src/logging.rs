//! Tracing setup: console output, plus an optional log file.

use std::fs::{self, File, OpenOptions};
use std::path::Path;
use std::sync::Mutex;

use bdaysync_core::Settings;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{EnvFilter, fmt};

/// Install the global subscriber, reporting a failure on stderr.
///
/// `RUST_LOG` wins when set; otherwise `LOG_LEVEL` (or debug when `DEBUG` is
/// on) with the HTTP stack held at warn.
pub fn init(settings: &Settings) {
    if let Err(e) = install(settings) {
        eprintln!("bdaysync: cannot install the log subscriber: {e}");
    }
}

fn install(settings: &Settings) -> Result<(), TryInitError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives(settings)));

    let file_layer = if settings.log_to_file {
        match open_log_file(&settings.log_file) {
            Ok(file) => Some(fmt::layer().with_ansi(false).with_writer(Mutex::new(file))),
            Err(e) => {
                eprintln!(
                    "bdaysync: cannot write log file {}: {e}; logging to the console only",
                    settings.log_file.display()
                );
                None
            }
        }
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .with(file_layer)
        .try_init()
}

fn default_directives(settings: &Settings) -> String {
    if settings.debug {
        return "debug,hyper=info,rustls=info".to_string();
    }
    let level = settings.log_level.trim().to_ascii_lowercase();
    let level = match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => level,
        "warning" => "warn".to_string(),
        _ => "info".to_string(),
    };
    format!("{level},hyper=warn,hyper_util=warn,rustls=warn")
}

fn open_log_file(path: &Path) -> std::io::Result<File> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}
