//! Logging infrastructure.
//!
//! Writes structured logs to a daily-rotated file in the platform state
//! directory. The terminal belongs to the form, so nothing goes to stdout.

use std::fs;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::prelude::*;

const LOG_FILE_PREFIX: &str = "prompt-optimizer";

/// Result of initializing the logging system.
pub struct LoggingContext {
    /// Guard that must be held for the application lifetime to ensure logs are flushed.
    pub _guard: WorkerGuard,
    pub session_id: String,
    pub log_directory: PathBuf,
}

/// Error that occurred during logging initialization.
#[derive(Debug)]
pub struct LoggingError {
    pub message: String,
}

impl std::fmt::Display for LoggingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Generates a 6-character random hex session ID.
pub fn generate_session_id() -> String {
    use rand::Rng;
    let mut rng = rand::rng();
    let bytes: [u8; 3] = rng.random();
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Initializes the logging system.
///
/// `default_level` is used when `RUST_LOG` is unset or unparsable.
/// The returned `WorkerGuard` must be held for the application lifetime.
pub fn init(default_level: &str) -> Result<LoggingContext, LoggingError> {
    let session_id = generate_session_id();

    let project_dirs = ProjectDirs::from("dev", "prompt-optimizer", "prompt-optimizer")
        .ok_or_else(|| LoggingError {
            message: "Failed to determine platform directories".to_string(),
        })?;

    // macOS: ~/Library/Logs/prompt-optimizer/
    // Linux: ~/.local/state/prompt-optimizer/
    // Windows: %LocalAppData%\prompt-optimizer\
    let log_dir = if cfg!(target_os = "macos") {
        dirs::home_dir().map(|home| home.join("Library").join("Logs").join(LOG_FILE_PREFIX))
    } else {
        project_dirs
            .state_dir()
            .map(PathBuf::from)
            .or_else(|| Some(project_dirs.data_local_dir().to_path_buf()))
    }
    .ok_or_else(|| LoggingError {
        message: "Failed to determine log directory".to_string(),
    })?;

    fs::create_dir_all(&log_dir).map_err(|e| LoggingError {
        message: format!("Failed to create log directory: {}", e),
    })?;

    let file_appender = tracing_appender::rolling::daily(&log_dir, LOG_FILE_PREFIX);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_span_events(FmtSpan::NONE)
        .with_target(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| LoggingError {
            message: format!("Failed to install log subscriber: {}", e),
        })?;

    info!(session_id = %session_id, "session_start");

    Ok(LoggingContext {
        _guard: guard,
        session_id,
        log_directory: log_dir,
    })
}

/// Deletes `prompt-optimizer.*` log files older than the retention period.
///
/// Errors are logged at WARN level but never prevent startup.
pub fn cleanup_old_logs(log_dir: &Path) -> u32 {
    use std::time::{Duration, SystemTime};
    use tracing::{debug, warn};

    const RETENTION_DAYS: u64 = 7;
    let retention_duration = Duration::from_secs(RETENTION_DAYS * 24 * 60 * 60);

    let entries = match fs::read_dir(log_dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(error = %e, "Failed to read log directory for cleanup");
            return 0;
        }
    };

    let now = SystemTime::now();
    let mut deleted_count = 0u32;
    let prefix = format!("{}.", LOG_FILE_PREFIX);

    for entry in entries.filter_map(Result::ok) {
        let path = entry.path();

        let file_name = match path.file_name().and_then(|n| n.to_str()) {
            Some(name) if name.starts_with(&prefix) => name.to_string(),
            _ => continue,
        };

        let modified = match fs::metadata(&path).and_then(|m| m.modified()) {
            Ok(t) => t,
            Err(e) => {
                warn!(file = %file_name, error = %e, "Failed to read modification time for log file");
                continue;
            }
        };

        // Files dated in the future are left alone.
        let Ok(age) = now.duration_since(modified) else {
            continue;
        };

        if age > retention_duration {
            match fs::remove_file(&path) {
                Ok(()) => {
                    debug!(file = %file_name, age_days = age.as_secs() / 86400, "Deleted old log file");
                    deleted_count += 1;
                }
                Err(e) => {
                    warn!(file = %file_name, error = %e, "Failed to delete old log file");
                }
            }
        }
    }

    if deleted_count > 0 {
        debug!(count = deleted_count, "Log cleanup completed");
    }
    deleted_count
}
