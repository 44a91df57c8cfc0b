//! logging.rs — tracing subscriber setup for the bot and the CLI.
//!
//! One global subscriber: a console layer and, unless disabled, a daily
//! rotated `bot.log`. Filter precedence is `RUST_LOG`, then
//! `VIDEO_BOT_LOG_LEVEL`, then `[logging].level` from the config.

use std::path::PathBuf;
use std::sync::{Once, OnceLock};

use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;

/// HTTP client internals stay at warn unless RUST_LOG asks for them.
const QUIET_DEPENDENCIES: &str = "hyper=warn,hyper_util=warn,h2=warn,reqwest=warn,rustls=warn";

static INIT_LOGGING: Once = Once::new();
static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

fn resolve_log_dir(cfg: &LoggingConfig) -> PathBuf {
    match cfg.dir.as_deref().filter(|d| !d.is_empty()) {
        Some(dir) => PathBuf::from(dir),
        None => dirs::data_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("video-analytics-bot")
            .join("logs"),
    }
}

fn filter_directives(rust_log: Option<String>, level_var: Option<String>, configured: &str) -> String {
    if let Some(directives) = rust_log.filter(|d| !d.trim().is_empty()) {
        return directives;
    }
    let level = level_var
        .filter(|l| !l.trim().is_empty())
        .unwrap_or_else(|| configured.to_string());
    format!("{},{}", level.trim(), QUIET_DEPENDENCIES)
}

fn open_log_file(cfg: &LoggingConfig) -> Option<(RollingFileAppender, PathBuf)> {
    let log_dir = resolve_log_dir(cfg);
    if let Err(err) = std::fs::create_dir_all(&log_dir) {
        eprintln!(
            "[logging][WARN] cannot create {}: {} (console only)",
            log_dir.display(),
            err
        );
        return None;
    }
    Some((RollingFileAppender::new(Rotation::DAILY, &log_dir, "bot.log"), log_dir))
}

/// Install the global subscriber. Later calls are no-ops.
pub fn init_logging(cfg: &LoggingConfig) {
    INIT_LOGGING.call_once(|| {
        let directives = filter_directives(
            std::env::var("RUST_LOG").ok(),
            std::env::var("VIDEO_BOT_LOG_LEVEL").ok(),
            &cfg.level,
        );
        let filter = EnvFilter::try_new(&directives).unwrap_or_else(|err| {
            eprintln!("[logging][WARN] bad filter {directives:?}: {err}, using info");
            EnvFilter::new("info")
        });

        let console = fmt::layer()
            .with_target(true)
            .with_ansi(true)
            .with_timer(UtcTime::rfc_3339());

        let file = if cfg.file { open_log_file(cfg) } else { None };
        let log_dir = file.as_ref().map(|(_, dir)| dir.clone());
        let file_layer = file.map(|(appender, _)| {
            let (writer, guard) = tracing_appender::non_blocking(appender);
            LOG_GUARD.set(guard).ok();
            fmt::layer()
                .with_ansi(false)
                .with_target(true)
                .with_timer(UtcTime::rfc_3339())
                .with_writer(writer)
        });

        if tracing_subscriber::registry()
            .with(filter)
            .with(console)
            .with(file_layer)
            .try_init()
            .is_err()
        {
            // a subscriber was already installed elsewhere (tests)
            return;
        }

        match log_dir {
            Some(dir) => info!(filter = %directives, "logging to console and {}", dir.join("bot.log").display()),
            None => info!(filter = %directives, "logging to console only"),
        }
    });
}
