//! Tracing configuration and log routing.
//!
//! Logs go to stdout through a compact formatter and to a file. `RUSTY_DOCS_LOG_FILE` selects a
//! file to append to; without it, logs land in `logs/rusty-docs.log`.
use std::io;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

const LOG_FILE_ENV: &str = "RUSTY_DOCS_LOG_FILE";
const DEFAULT_LOG_DIR: &str = "logs";
const DEFAULT_LOG_FILE: &str = "rusty-docs.log";

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Where file logs are written.
#[derive(Debug, Clone, PartialEq, Eq)]
enum LogTarget {
    /// Append to an explicit file.
    Append(PathBuf),
    /// Write `file` inside `dir`, creating the directory when missing.
    Directory { dir: PathBuf, file: String },
}

impl LogTarget {
    fn resolve(explicit: Option<String>) -> Self {
        match explicit.filter(|value| !value.trim().is_empty()) {
            Some(path) => Self::Append(PathBuf::from(path)),
            None => Self::Directory {
                dir: PathBuf::from(DEFAULT_LOG_DIR),
                file: DEFAULT_LOG_FILE.to_string(),
            },
        }
    }

    fn open(&self) -> io::Result<(NonBlocking, WorkerGuard)> {
        match self {
            Self::Append(path) => {
                let file = std::fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)?;
                Ok(tracing_appender::non_blocking(file))
            }
            Self::Directory { dir, file } => {
                std::fs::create_dir_all(dir)?;
                let appender = tracing_appender::rolling::never(dir, file);
                Ok(tracing_appender::non_blocking(appender))
            }
        }
    }

    fn display(&self) -> PathBuf {
        match self {
            Self::Append(path) => path.clone(),
            Self::Directory { dir, file } => Path::new(dir).join(file),
        }
    }
}

/// Configure tracing subscribers for stdout and file logging.
///
/// Filtering follows `RUST_LOG` and defaults to `info`. When the log file cannot be opened,
/// only stdout logging is installed. Calling this more than once has no effect.
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stdout_layer = fmt::layer().with_target(false).compact();
    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer);

    let target = LogTarget::resolve(std::env::var(LOG_FILE_ENV).ok());
    let installed = match target.open() {
        Ok((writer, guard)) => {
            let _ = LOG_GUARD.set(guard);
            let file_layer = fmt::layer()
                .with_writer(writer)
                .with_target(true)
                .with_ansi(false)
                .compact();
            registry.with(file_layer).try_init()
        }
        Err(err) => {
            eprintln!("Failed to open log file {}: {err}", target.display().display());
            registry.try_init()
        }
    };

    if installed.is_ok() {
        tracing::debug!(log_file = %target.display().display(), "Tracing initialized");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_path_is_appended_to() {
        assert_eq!(
            LogTarget::resolve(Some("/tmp/docs.log".into())),
            LogTarget::Append(PathBuf::from("/tmp/docs.log"))
        );
    }

    #[test]
    fn blank_or_missing_path_falls_back_to_logs_directory() {
        let expected = LogTarget::Directory {
            dir: PathBuf::from("logs"),
            file: "rusty-docs.log".into(),
        };
        assert_eq!(LogTarget::resolve(None), expected);
        assert_eq!(LogTarget::resolve(Some("  ".into())), expected);
        assert_eq!(expected.display(), PathBuf::from("logs/rusty-docs.log"));
    }
}
