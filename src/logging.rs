use crate::config::LoggingConfig;
use std::fs::OpenOptions;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Local wall-clock timestamps with milliseconds
struct LocalTimer;

impl tracing_subscriber::fmt::time::FormatTime for LocalTimer {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"))
    }
}

/// Filter used when `RUST_LOG` is unset. The HTTP stack stays at warn so a
/// `debug` level shows poll traffic without per-connection noise.
fn default_directives(level: &str) -> String {
    format!("{},hyper=warn,tower_http=warn", level.trim().to_lowercase())
}

/// Install the global subscriber.
///
/// The console gets a compact view. The optional log file gets the full
/// format: every line carries the `poll` / `command` span with its
/// `target_id`, so one script's history can be grepped out of it.
pub fn init_logging(log_config: &LoggingConfig) -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(&log_config.level)));

    let file_layer = match &log_config.file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            Some(
                fmt::layer()
                    .with_writer(file)
                    .with_ansi(false)
                    .with_timer(LocalTimer)
                    .with_target(false)
                    .with_thread_ids(true),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(true)
                .with_timer(LocalTimer)
                .compact(),
        )
        .with(file_layer)
        .try_init()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directives_keep_http_stack_quiet() {
        assert_eq!(default_directives(" DEBUG "), "debug,hyper=warn,tower_http=warn");
        assert!(EnvFilter::try_new(default_directives("info")).is_ok());
    }
}
