//! Structured logging for Planeta.
//!
//! Installs a `tracing` subscriber with a console layer and, in debug builds,
//! a JSON file layer for post-mortem analysis of LOD passes. The level comes
//! from `RUST_LOG` when set, otherwise from the loaded [`Config`].

use std::fs::File;
use std::path::Path;

use planeta_config::Config;
use tracing::Subscriber;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Filter used when neither `RUST_LOG` nor the config names a level.
pub const DEFAULT_FILTER: &str = "info";

/// Name of the JSON log written under `log_dir` in debug builds.
pub const LOG_FILE_NAME: &str = "planeta.log";

/// Initialize the global tracing subscriber.
///
/// * `log_dir` - Directory for the JSON log file (debug builds only)
/// * `debug_build` - Whether to enable file logging
/// * `config` - Supplies `debug.log_level` when `RUST_LOG` is unset
///
/// ```no_run
/// use planeta_config::Config;
/// use planeta_log::init_logging;
///
/// let config = Config::default();
/// init_logging(Some(std::path::Path::new("./logs")), true, Some(&config));
/// ```
pub fn init_logging(log_dir: Option<&Path>, debug_build: bool, config: Option<&Config>) {
    let filter_str = filter_string(config);
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&filter_str));

    let console_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(true)
        .with_level(true)
        .with_timer(fmt::time::uptime());

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer);

    if debug_build
        && let Some(log_dir) = log_dir
        && std::fs::create_dir_all(log_dir).is_ok()
        && let Ok(log_file) = File::create(log_dir.join(LOG_FILE_NAME))
    {
        subscriber.with(file_layer(log_file)).init();
        return;
    }

    subscriber.init();
}

/// Create an `EnvFilter` with the default filter string.
pub fn default_env_filter() -> EnvFilter {
    EnvFilter::new(DEFAULT_FILTER)
}

fn filter_string(config: Option<&Config>) -> String {
    match config {
        Some(config) if !config.debug.log_level.is_empty() => config.debug.log_level.clone(),
        _ => DEFAULT_FILTER.to_string(),
    }
}

/// JSON lines without ANSI codes, timestamped from startup.
fn file_layer<S>(file: File) -> impl Layer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fmt::layer()
        .with_writer(file)
        .with_ansi(false)
        .with_target(true)
        .with_timer(fmt::time::uptime())
        .json()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_log_level() {
        let filter = default_env_filter();
        assert!(format!("{filter}").contains("info"));
    }

    #[test]
    fn test_filter_from_config() {
        assert_eq!(filter_string(None), DEFAULT_FILTER);

        let mut config = Config::default();
        config.debug.log_level = "warn,planeta_chunk=trace".to_string();
        assert_eq!(filter_string(Some(&config)), "warn,planeta_chunk=trace");

        config.debug.log_level.clear();
        assert_eq!(filter_string(Some(&config)), DEFAULT_FILTER);
    }

    #[test]
    fn test_env_filter_parsing() {
        let valid_filters = [
            "info",
            "debug,planeta_chunk=trace",
            "warn,planeta_skeleton=debug,planeta_chunk=trace",
            "error",
        ];
        for filter_str in &valid_filters {
            let result = EnvFilter::try_from(*filter_str);
            assert!(result.is_ok(), "Failed to parse filter: {filter_str}");
        }
    }

    #[test]
    fn test_file_layer_writes_json_lines() {
        let temp_dir = tempfile::tempdir().unwrap();
        let log_path = temp_dir.path().join(LOG_FILE_NAME);
        let file = File::create(&log_path).unwrap();

        let subscriber = tracing_subscriber::registry().with(file_layer(file));
        tracing::subscriber::with_default(subscriber, || {
            tracing::info!(chunks = 3, "pass done");
        });

        let contents = std::fs::read_to_string(&log_path).unwrap();
        let line = contents.lines().next().unwrap();
        let value: serde_json::Value = serde_json::from_str(line).unwrap();
        assert_eq!(value["level"], "INFO");
        assert_eq!(value["fields"]["message"], "pass done");
        assert_eq!(value["fields"]["chunks"], 3);
    }
}
