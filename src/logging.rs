//! TTN Relay Logging System
//!
//! Structured logging with configurable levels and output formats, built on
//! `tracing`. Server mode can write to a daily-rotated file instead of stdout.

use std::io;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer, Registry,
};

/// Logging configuration options
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Minimum log level to output
    pub level: Level,
    /// Enable colored output
    pub color: bool,
    /// Show timestamps
    pub show_timestamps: bool,
    /// Show target/module name
    pub show_target: bool,
    /// Enable JSON format for machine parsing
    pub json_format: bool,
    /// Enable span events for tracing
    pub enable_spans: bool,
    /// Output to a rolling file instead of stdout
    pub file_output: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            color: true,
            show_timestamps: false,
            show_target: false,
            json_format: false,
            enable_spans: false,
            file_output: None,
        }
    }
}

impl LoggingConfig {
    /// Background server writing to a file: no color, targets and timestamps on
    pub fn for_file(log_file: PathBuf, level: Level, json_format: bool) -> Self {
        Self {
            level,
            color: false,
            show_timestamps: true,
            show_target: true,
            json_format,
            enable_spans: false,
            file_output: Some(log_file),
        }
    }

    /// Create config from CLI arguments
    pub fn from_args(quiet: bool, verbose: bool, json: bool) -> Self {
        let level = if verbose {
            Level::DEBUG
        } else if quiet {
            Level::ERROR
        } else {
            Level::INFO
        };

        Self {
            level,
            color: !quiet && !json && io::stdout().is_terminal(),
            show_timestamps: true,
            show_target: verbose,
            json_format: json,
            enable_spans: verbose,
            file_output: None,
        }
    }

    fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "ttn_relay={level},tower_http={level}",
                level = self.level
            ))
        })
    }
}

/// Directory holding `log_file`; a bare file name lives in the working directory
pub fn log_dir(log_file: &Path) -> &Path {
    match log_file.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    }
}

/// Initialize the logging system
pub fn init_logging(config: LoggingConfig) -> io::Result<()> {
    let registry = Registry::default().with(config.env_filter());

    if let Some(log_file) = &config.file_output {
        let dir = log_dir(log_file);
        let name = log_file.file_name().ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "Invalid log file name")
        })?;
        std::fs::create_dir_all(dir)?;
        let file_appender = tracing_appender::rolling::daily(dir, name);

        if config.json_format {
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(config.enable_spans)
                .with_span_events(FmtSpan::CLOSE)
                .with_writer(file_appender)
                .with_subscriber(registry)
                .init();
        } else {
            fmt::layer()
                .with_target(config.show_target)
                .with_level(true)
                .with_ansi(false)
                .with_timer(fmt::time::ChronoUtc::rfc_3339())
                .with_writer(file_appender)
                .with_subscriber(registry)
                .init();
        }
    } else if config.json_format {
        tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(config.enable_spans)
            .with_span_events(FmtSpan::CLOSE)
            .with_writer(io::stdout)
            .with_subscriber(registry)
            .init();
    } else {
        let fmt_layer = fmt::layer()
            .with_target(config.show_target)
            .with_level(true)
            .with_ansi(config.color)
            .with_writer(io::stdout);

        if config.show_timestamps {
            fmt_layer
                .with_timer(fmt::time::ChronoUtc::rfc_3339())
                .with_subscriber(registry)
                .init();
        } else {
            fmt_layer.with_subscriber(registry).init();
        }
    }

    Ok(())
}

/// Clean up old log files based on retention policy
///
/// Only removes rotated files, i.e. names containing `.log.` followed by a
/// date suffix (`relay.log.2025-11-22`). The active file is left alone.
pub fn cleanup_old_logs(log_dir: &Path, retention_days: u32) -> io::Result<usize> {
    use std::fs;
    use std::time::{Duration, SystemTime};

    if !log_dir.exists() {
        return Ok(0);
    }

    let now = SystemTime::now();
    let retention = Duration::from_secs(u64::from(retention_days) * 24 * 60 * 60);
    let mut cleaned = 0;

    for entry in fs::read_dir(log_dir)? {
        let entry = entry?;
        let path = entry.path();

        let name = entry.file_name();
        if !name.to_string_lossy().contains(".log.") || !path.is_file() {
            continue;
        }

        let modified = entry.metadata()?.modified()?;
        let Ok(age) = now.duration_since(modified) else {
            continue;
        };

        if age > retention {
            match fs::remove_file(&path) {
                Ok(()) => {
                    cleaned += 1;
                    tracing::info!(
                        "Cleaned up old log file: {} (age: {} days)",
                        path.display(),
                        age.as_secs() / 86400
                    );
                },
                Err(e) => {
                    tracing::warn!("Failed to remove old log file {}: {}", path.display(), e);
                },
            }
        }
    }

    Ok(cleaned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, SystemTime};

    #[test]
    fn test_from_args_levels() {
        assert_eq!(LoggingConfig::from_args(false, true, false).level, Level::DEBUG);
        assert_eq!(LoggingConfig::from_args(true, false, false).level, Level::ERROR);
        assert_eq!(LoggingConfig::from_args(false, false, false).level, Level::INFO);
    }

    #[test]
    fn test_json_disables_color() {
        let config = LoggingConfig::from_args(false, false, true);
        assert!(config.json_format);
        assert!(!config.color);
    }

    #[test]
    fn test_file_config_keeps_level_and_format() {
        let config = LoggingConfig::for_file(PathBuf::from("relay.log"), Level::DEBUG, true);
        assert_eq!(config.level, Level::DEBUG);
        assert!(config.json_format);
        assert!(!config.color);
        assert!(config.show_target);
    }

    #[test]
    fn test_log_dir_of_bare_file_name_is_cwd() {
        assert_eq!(log_dir(Path::new("relay.log")), Path::new("."));
        assert_eq!(
            log_dir(Path::new("/var/log/relay.log")),
            Path::new("/var/log")
        );
    }

    #[test]
    fn test_cleanup_missing_dir_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        assert_eq!(cleanup_old_logs(&missing, 7).unwrap(), 0);
    }

    #[test]
    fn test_cleanup_removes_only_old_rotated_files() {
        let dir = tempfile::tempdir().unwrap();
        let active = dir.path().join("relay.log");
        let rotated_old = dir.path().join("relay.log.2020-01-01");
        let rotated_new = dir.path().join("relay.log.2099-01-01");
        for path in [&active, &rotated_old, &rotated_new] {
            std::fs::write(path, "line\n").unwrap();
        }

        let old = SystemTime::now() - Duration::from_secs(30 * 24 * 60 * 60);
        std::fs::File::options()
            .write(true)
            .open(&rotated_old)
            .unwrap()
            .set_modified(old)
            .unwrap();

        let removed = cleanup_old_logs(dir.path(), 7).unwrap();

        assert_eq!(removed, 1);
        assert!(active.exists());
        assert!(!rotated_old.exists());
        assert!(rotated_new.exists());
    }
}
