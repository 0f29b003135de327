//! Logging infrastructure for anime-explorer.
//!
//! Console output goes to stderr so command output on stdout stays clean.
//! File output rotates daily and is written off-thread; keep the returned
//! [`LogGuard`] alive until the process exits or buffered lines are lost.

use crate::config::Config;
use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing::{Level, Subscriber};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    registry::LookupSpan,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

/// Crates whose events follow the configured level
const OWN_CRATES: &[&str] = &["anime_explorer", "shared"];

/// Noisy dependencies capped at `warn`
const QUIET_CRATES: &[&str] = &["hyper", "reqwest", "h2", "rustls"];

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub log_dir: PathBuf,
    /// Prefix of the rolling log files
    pub component: String,
    pub default_level: Level,
    pub console: bool,
    pub file: bool,
    /// JSON lines in the log file instead of text
    pub json_format: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from("data/logs"),
            component: "anime-explorer".to_string(),
            default_level: Level::INFO,
            console: true,
            file: true,
            json_format: false,
        }
    }
}

impl LogConfig {
    /// Build from the `[logging]` section; `verbose` forces DEBUG
    pub fn from_config(config: &Config, component: &str, verbose: bool) -> Self {
        Self {
            log_dir: config.log_dir(),
            component: component.to_string(),
            default_level: if verbose {
                Level::DEBUG
            } else {
                config.log_level()
            },
            console: config.logging.console,
            file: config.logging.file,
            json_format: config.logging.json_format,
        }
    }

    /// Filter directives used when `RUST_LOG` is not set
    pub fn default_directives(&self) -> String {
        let own = OWN_CRATES
            .iter()
            .map(|krate| format!("{}={}", krate, self.default_level));
        let quiet = QUIET_CRATES.iter().map(|krate| format!("{}=warn", krate));

        own.chain(quiet).collect::<Vec<_>>().join(",")
    }
}

/// Flushes the file writer when dropped
pub struct LogGuard {
    _file: Option<WorkerGuard>,
}

/// Install the global subscriber
pub fn init(config: LogConfig) -> Result<LogGuard> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.default_directives()));

    let mut layers = Vec::new();
    let mut file_guard = None;

    if config.console {
        layers.push(console_layer());
    }

    if config.file {
        std::fs::create_dir_all(&config.log_dir).with_context(|| {
            format!("Failed to create log directory: {}", config.log_dir.display())
        })?;

        let appender = tracing_appender::rolling::daily(&config.log_dir, &config.component);
        let (writer, guard) = tracing_appender::non_blocking(appender);
        file_guard = Some(guard);

        let layer = if config.json_format {
            fmt::layer()
                .json()
                .with_target(true)
                .with_current_span(true)
                .with_span_list(false)
                .with_writer(writer)
                .boxed()
        } else {
            fmt::layer()
                .with_target(true)
                .with_ansi(false)
                .with_writer(writer)
                .boxed()
        };
        layers.push(layer);
    }

    tracing_subscriber::registry()
        .with(env_filter)
        .with(layers)
        .try_init()
        .context("Failed to initialize tracing subscriber")?;

    tracing::debug!(
        component = %config.component,
        log_dir = %config.log_dir.display(),
        file = config.file,
        "Logging initialized"
    );

    Ok(LogGuard { _file: file_guard })
}

fn console_layer<S>() -> Box<dyn Layer<S> + Send + Sync>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fmt::layer()
        .with_target(false)
        .with_span_events(FmtSpan::NONE)
        .with_writer(std::io::stderr)
        .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directives() {
        let config = LogConfig {
            default_level: Level::DEBUG,
            ..Default::default()
        };

        let directives = config.default_directives();
        assert!(directives.starts_with("anime_explorer=DEBUG,shared=DEBUG"));
        assert!(directives.contains("reqwest=warn"));
        assert!(EnvFilter::try_new(&directives).is_ok());
    }

    #[test]
    fn test_from_config() {
        let mut config = Config::default();
        config.logging.default_level = "warn".to_string();
        config.logging.json_format = true;

        let quiet = LogConfig::from_config(&config, "anime-explorer", false);
        assert_eq!(quiet.default_level, Level::WARN);
        assert!(quiet.json_format);
        assert_eq!(quiet.log_dir, config.log_dir());

        let verbose = LogConfig::from_config(&config, "anime-explorer", true);
        assert_eq!(verbose.default_level, Level::DEBUG);
    }
}
