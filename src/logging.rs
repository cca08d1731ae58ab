use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const LOG_FILE_NAME: &str = "presence-sync.log";
const KEEP_DAYS: u64 = 7;

/// Install console and daily-rolling file logging for `app_name`.
///
/// Keep the returned guard alive for as long as logs should be flushed. If a
/// global subscriber is already installed, the existing one stays in place.
pub fn init_logging(app_name: &str) -> WorkerGuard {
    let log_dir = log_directory(app_name);

    let file_appender = tracing_appender::rolling::daily(&log_dir, LOG_FILE_NAME);
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,hyper=warn,reqwest=warn"));

    let console_layer = fmt::layer().with_target(true).with_thread_ids(false);

    let file_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false)
        .with_writer(file_writer);

    if let Err(e) = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
    {
        tracing::debug!("Logging already initialized: {}", e);
        return guard;
    }

    tracing::info!("Logging initialized, log directory: {}", log_dir.display());
    tracing::info!("presence-sync version: {}", env!("CARGO_PKG_VERSION"));

    let removed = cleanup_old_logs(&log_dir, KEEP_DAYS);
    if removed > 0 {
        tracing::debug!("Removed {} old log files", removed);
    }

    guard
}

fn log_directory(app_name: &str) -> PathBuf {
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(app_name)
        .join("logs");

    if let Err(e) = std::fs::create_dir_all(&log_dir) {
        eprintln!("Warning: Failed to create log directory: {}", e);
    }

    log_dir
}

/// Remove rotated log files older than `keep_days`. The un-suffixed file and
/// unrelated files are never touched. Returns how many files were removed.
fn cleanup_old_logs(log_dir: &Path, keep_days: u64) -> usize {
    let Some(cutoff) =
        SystemTime::now().checked_sub(Duration::from_secs(keep_days * 24 * 60 * 60))
    else {
        return 0;
    };

    let entries = match std::fs::read_dir(log_dir) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!("Failed to read log directory for cleanup: {}", e);
            return 0;
        }
    };

    let mut removed = 0;
    for entry in entries.flatten() {
        let path = entry.path();
        let rotated = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|name| name.starts_with(LOG_FILE_NAME) && name != LOG_FILE_NAME);
        if !rotated {
            continue;
        }

        let Ok(modified) = entry.metadata().and_then(|m| m.modified()) else {
            continue;
        };

        if modified < cutoff {
            match std::fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) => tracing::warn!("Failed to remove old log file {:?}: {}", path, e),
            }
        }
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_logs_are_kept() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(LOG_FILE_NAME), "current").unwrap();
        std::fs::write(dir.path().join(format!("{LOG_FILE_NAME}.2026-10-17")), "old").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "other").unwrap();

        assert_eq!(cleanup_old_logs(dir.path(), KEEP_DAYS), 0);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 3);
    }

    #[test]
    fn zero_day_retention_removes_rotated_files_only() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(LOG_FILE_NAME), "current").unwrap();
        std::fs::write(dir.path().join(format!("{LOG_FILE_NAME}.2026-10-17")), "old").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "other").unwrap();
        std::thread::sleep(Duration::from_millis(20));

        assert_eq!(cleanup_old_logs(dir.path(), 0), 1);
        assert!(dir.path().join(LOG_FILE_NAME).exists());
        assert!(dir.path().join("notes.txt").exists());
    }

    #[test]
    fn missing_directory_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(cleanup_old_logs(&dir.path().join("absent"), KEEP_DAYS), 0);
    }
}
