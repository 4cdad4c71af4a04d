/*!
 * Logging Module
 * Centralized logging configuration and request logging middleware
 */
pub mod config;
pub mod middleware;

pub use config::{Environment, LoggingConfig};

use std::io;
use tracing_appender::{non_blocking, non_blocking::WorkerGuard, rolling};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Initialize the logging system.
///
/// The returned guards flush the background writers when dropped, so the
/// caller holds them for the lifetime of the process.
pub fn init(config: &LoggingConfig) -> Vec<WorkerGuard> {
    if let Err(e) = std::fs::create_dir_all(&config.log_dir) {
        eprintln!(
            "Failed to create log directory {}: {}",
            config.log_dir.display(),
            e
        );
    }

    // All logs
    let file_appender = rolling::daily(&config.log_dir, "app.log");
    let (file_writer, file_guard) = non_blocking(file_appender);

    // Errors only
    let error_appender = rolling::daily(&config.log_dir, "error.log");
    let (error_writer, error_guard) = non_blocking(error_appender);

    let (console_writer, console_guard) = non_blocking(io::stdout());

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.filter_directives()));

    let subscriber = tracing_subscriber::registry().with(env_filter);

    let result = if config.is_production() {
        let file_layer = fmt::layer()
            .json()
            .with_writer(file_writer)
            .with_target(true)
            .with_thread_ids(true)
            .with_thread_names(true)
            .with_file(true)
            .with_line_number(true);

        let error_layer = fmt::layer()
            .json()
            .with_writer(error_writer)
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .with_filter(tracing_subscriber::filter::LevelFilter::ERROR);

        let console_layer = fmt::layer()
            .json()
            .with_writer(console_writer)
            .with_target(false);

        subscriber
            .with(file_layer)
            .with(error_layer)
            .with(console_layer)
            .try_init()
    } else {
        let file_layer = fmt::layer()
            .with_writer(file_writer)
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .with_ansi(false);

        let error_layer = fmt::layer()
            .json()
            .with_writer(error_writer)
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .with_filter(tracing_subscriber::filter::LevelFilter::ERROR);

        let console_layer = fmt::layer()
            .with_writer(console_writer)
            .with_target(true)
            .pretty();

        subscriber
            .with(file_layer)
            .with(error_layer)
            .with(console_layer)
            .try_init()
    };

    if let Err(e) = result {
        eprintln!("Logging already initialized: {}", e);
    }

    tracing::info!(
        log_dir = %config.log_dir.display(),
        "Logging initialized for {} environment",
        config.environment
    );

    vec![file_guard, error_guard, console_guard]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(environment: Environment) -> LoggingConfig {
        LoggingConfig {
            environment,
            log_dir: std::env::temp_dir().join(format!("site-backend-logs-{}", uuid::Uuid::new_v4())),
            level: "debug".to_string(),
        }
    }

    #[test]
    fn test_init_builds_both_environments() {
        // Only the first call installs the global subscriber; the second
        // must still build its layer stack and hand back its guards.
        for environment in [Environment::Development, Environment::Production] {
            let config = config(environment);
            let guards = init(&config);
            assert_eq!(guards.len(), 3);
            assert!(config.log_dir.exists());
            drop(guards);
            let _ = std::fs::remove_dir_all(&config.log_dir);
        }
    }
}
