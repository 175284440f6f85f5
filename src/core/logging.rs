//! Logging initialization and startup diagnostics
//!
//! Call sites use the `log` macros. `init_logger` forwards those records
//! into a tracing-subscriber registry: stderr always, plus an
//! append-only file when `log_file` is set.

use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::sync::Mutex;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::core::config::Config;
use crate::core::utils::format_mib;

/// Initialize logging for console and (optionally) file output.
///
/// `RUST_LOG`, when set, overrides `level`.
///
/// # Errors
/// Fails when the level directive is invalid, the log file cannot be
/// opened, or a logger was already installed.
pub fn init_logger(level: &str, log_file: Option<&str>) -> Result<()> {
    let filter = match std::env::var("RUST_LOG") {
        Ok(directives) if !directives.trim().is_empty() => EnvFilter::try_new(directives),
        _ => EnvFilter::try_new(default_directives(level)),
    }
    .with_context(|| format!("Invalid log level '{}'", level))?;

    let file_layer = match log_file {
        Some(path) => {
            let expanded = shellexpand::tilde(path).into_owned();
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&expanded)
                .with_context(|| format!("Failed to open log file {}", expanded))?;
            Some(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
        }
        None => None,
    };

    tracing_log::LogTracer::init().context("Failed to install log bridge")?;
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(true))
        .with(file_layer)
        .try_init()
        .context("Failed to initialize logger")?;

    Ok(())
}

/// Configured level for this crate, with chatty HTTP internals kept at `warn`.
fn default_directives(level: &str) -> String {
    format!("{level},hyper=warn,reqwest=warn,h2=warn,rustls=warn")
}

/// Logs the effective configuration at startup. Never logs the token.
pub fn log_startup_summary(config: &Config) {
    log::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    log::info!("🎵 tunefetch {}", env!("CARGO_PKG_VERSION"));
    log::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    log::info!("yt-dlp: {} | ffmpeg: {}", config.ytdl_bin, config.ffmpeg_bin);
    log::info!("Scratch root: {}", config.scratch_root_path().display());
    log::info!(
        "Workers: {} | fetch timeout: {}s | attempts: {}",
        config.max_concurrent_jobs,
        config.fetch_timeout_secs,
        config.fetch_attempts
    );
    log::info!(
        "Search: {} results | ceiling: {}s{}",
        config.search_results,
        config.duration_ceiling_secs,
        if config.reject_overlong { " (strict)" } else { "" }
    );
    log::info!(
        "Upload limit: {} | oversize policy: {} | bitrate: {} kbps",
        format_mib(config.max_upload_bytes),
        config.oversize_policy,
        config.audio_bitrate_kbps
    );

    match config.cookies_path() {
        Some(path) if path.exists() => log::info!("✅ Cookies file: {}", path.display()),
        Some(path) => log::warn!("⚠️  Cookies file {} not found, continuing without it", path.display()),
        None => log::info!("Cookies: not configured"),
    }
    if let Some(api) = &config.bot_api_url {
        log::info!("Local Bot API server: {}", api);
    }
}
