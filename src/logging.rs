use time::UtcOffset;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt::time::OffsetTime, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer,
    Registry,
};

use crate::{config::LoggingConfig, errors::InitializationError, MonitorError};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Install the global subscriber. Keep the returned guard alive for as long
/// as file logging should be flushed.
pub fn setup_logging(config: &LoggingConfig) -> Result<Option<WorkerGuard>, MonitorError> {
    // Validate logging config before proceeding
    config.validate()?;

    let timer = OffsetTime::new(
        UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC),
        time::format_description::well_known::Rfc3339,
    );

    // RUST_LOG wins over the configured level
    let env_filter = EnvFilter::builder()
        .with_default_directive(config.get_level_filter().into())
        .from_env_lossy();

    let console: BoxedLayer = if config.is_json() {
        tracing_subscriber::fmt::layer()
            .json()
            .with_target(false)
            .with_thread_ids(config.thread_ids)
            .with_thread_names(config.thread_names)
            .with_file(config.include_location)
            .with_line_number(config.include_location)
            .with_timer(timer.clone())
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_thread_ids(config.thread_ids)
            .with_thread_names(config.thread_names)
            .with_file(config.include_location)
            .with_line_number(config.include_location)
            .with_level(true)
            .with_timer(timer.clone())
            .boxed()
    };

    let (file, guard): (Option<BoxedLayer>, _) = if config.file_enabled {
        let appender = tracing_appender::rolling::daily(&config.log_dir, "mikrotik-monitor.log");
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_target(false)
            .with_timer(timer)
            .with_writer(writer)
            .boxed();
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    Registry::default()
        .with(console.and_then(file).with_filter(env_filter))
        .try_init()
        .map_err(|e| {
            MonitorError::Init(InitializationError::logging(format!(
                "Failed to initialize logging: {}",
                e
            )))
        })?;

    Ok(guard)
}
