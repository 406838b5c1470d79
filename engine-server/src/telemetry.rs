use anyhow::{Context, Result};
use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry,
};

use crate::config::{LogFormat, LoggingConfig};

/// Initialize the tracing subscriber for logging and telemetry
pub fn init_telemetry(config: &LoggingConfig) -> Result<()> {
    // Parse the log level from config
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .context("Invalid log level configuration")?;

    // Create the base registry
    let registry = Registry::default().with(env_filter);

    // Configure the formatter based on the selected format
    match config.format {
        LogFormat::Pretty => {
            let fmt_layer = fmt::layer()
                .pretty()
                .with_target(true)
                .with_thread_ids(true)
                .with_thread_names(true)
                .with_file(true)
                .with_line_number(true);

            registry.with(fmt_layer).init();
        }
        LogFormat::Json => {
            let fmt_layer = fmt::layer()
                .json()
                .with_target(true)
                .with_thread_ids(true)
                .with_thread_names(true)
                .with_file(true)
                .with_line_number(true)
                .with_span_list(true)
                .flatten_event(true);

            registry.with(fmt_layer).init();
        }
        LogFormat::Compact => {
            let fmt_layer = fmt::layer()
                .compact()
                .with_target(true)
                .with_thread_ids(false)
                .with_thread_names(false)
                .with_file(false)
                .with_line_number(false);

            registry.with(fmt_layer).init();
        }
    }

    tracing::info!(
        log_level = %config.level,
        log_format = ?config.format,
        "Telemetry initialized"
    );

    Ok(())
}

/// Span for a single dispatcher worker's pass over a task, keyed by the ids
/// that matter for cross-referencing logs with a specific group or subtree.
#[macro_export]
macro_rules! task_span {
    ($task_id:expr) => {
        tracing::info_span!("task", task_id = %$task_id)
    };
    ($task_id:expr, $($key:expr => $value:expr),*) => {
        tracing::info_span!("task", task_id = %$task_id, $($key = $value),*)
    };
}

/// Log startup information once the dispatcher is about to run.
pub fn log_startup_info(config: &crate::config::Config) {
    tracing::info!(
        default_task_timeout_secs = config.dispatch.default_task_timeout_secs,
        queue_poll_interval_ms = config.dispatch.queue_poll_interval_ms,
        default_max_parallelism = config.groups.default_max_parallelism,
        "engine-server starting up"
    );
}

/// Log server shutdown information
#[allow(dead_code)]
pub fn log_shutdown_info() {
    tracing::info!("engine-server shutting down gracefully");
}

/// Log configuration validation
pub fn log_config_validation(config: &crate::config::Config) {
    match config.validate() {
        Ok(()) => {
            tracing::info!("Configuration validation passed");
        }
        Err(e) => {
            tracing::error!(error = %e, "Configuration validation failed");
        }
    }
}

/// Error reporting helper
#[allow(dead_code)]
pub fn report_error(error: &anyhow::Error, context: &str) {
    tracing::error!(
        error = %error,
        context = context,
        "Operation failed"
    );

    // Log the error chain
    let mut current = error.source();
    let mut depth = 1;
    while let Some(err) = current {
        tracing::error!(
            error = %err,
            depth = depth,
            "Error cause"
        );
        current = err.source();
        depth += 1;
    }
}

/// Performance monitoring helper
#[allow(dead_code)]
pub struct PerformanceTimer {
    start: std::time::Instant,
    operation: String,
}

impl PerformanceTimer {
    #[allow(dead_code)]
    pub fn new(operation: impl Into<String>) -> Self {
        let operation = operation.into();
        tracing::debug!(operation = %operation, "Starting performance timer");
        Self {
            start: std::time::Instant::now(),
            operation,
        }
    }

    #[allow(dead_code)]
    pub fn finish(self) {
        let duration = self.start.elapsed();
        tracing::info!(
            operation = %self.operation,
            duration_ms = duration.as_millis(),
            "Operation completed"
        );

        if duration.as_millis() > 1000 {
            tracing::warn!(
                operation = %self.operation,
                duration_ms = duration.as_millis(),
                "Slow operation detected"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_performance_timer() {
        let timer = PerformanceTimer::new("test_operation");
        std::thread::sleep(Duration::from_millis(10));
        timer.finish();
        // This test mainly ensures the timer doesn't panic
    }

    #[test]
    fn test_log_startup_and_validation_dont_panic() {
        let config = crate::config::Config::default();
        log_startup_info(&config);
        log_config_validation(&config);
    }

    #[test]
    fn test_init_telemetry_config_shapes() {
        let configs = vec![
            LoggingConfig { level: "info".to_string(), format: LogFormat::Pretty },
            LoggingConfig { level: "debug".to_string(), format: LogFormat::Json },
            LoggingConfig { level: "warn".to_string(), format: LogFormat::Compact },
        ];

        for config in configs {
            // Tracing can only be initialized once per process, so this just
            // exercises the configuration shape, not actual subscriber init.
            assert!(matches!(config.format, LogFormat::Pretty | LogFormat::Json | LogFormat::Compact));
        }
    }
}
