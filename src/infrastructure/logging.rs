use crate::domain::settings::LogSettings;
use std::str::FromStr;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::Rotation;
use tracing_subscriber::{fmt, prelude::*, EnvFilter, Layer, Registry};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

pub struct LoggingGuard {
    // Dropping the guard flushes the file writer
    _guards: Vec<WorkerGuard>,
}

fn rotation_from(name: &str) -> Rotation {
    match name.to_lowercase().as_str() {
        "hourly" => Rotation::HOURLY,
        "minutely" => Rotation::MINUTELY,
        "never" => Rotation::NEVER,
        _ => Rotation::DAILY,
    }
}

/// RUST_LOG wins over the configured level.
fn level_filter(settings: &LogSettings) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::from_str(&settings.level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

fn console_layer(settings: &LogSettings) -> BoxedLayer {
    let layer = fmt::layer()
        .with_writer(std::io::stdout)
        .with_file(settings.show_file_line)
        .with_line_number(settings.show_file_line)
        .with_thread_ids(settings.show_thread_ids)
        .with_target(settings.show_target)
        .with_ansi(settings.ansi_colors);

    if settings.compact_console {
        layer.compact().boxed()
    } else {
        layer.boxed()
    }
}

fn file_layer(settings: &LogSettings) -> (BoxedLayer, WorkerGuard) {
    let appender = tracing_appender::rolling::RollingFileAppender::new(
        rotation_from(&settings.rotation),
        &settings.log_dir,
        &settings.file_name_prefix,
    );
    let (non_blocking, guard) = tracing_appender::non_blocking(appender);
    let layer = fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_file(settings.show_file_line)
        .with_line_number(settings.show_file_line)
        .with_thread_ids(settings.show_thread_ids)
        .with_target(settings.show_target)
        .boxed();
    (layer, guard)
}

pub fn init_logger(settings: &LogSettings) -> anyhow::Result<LoggingGuard> {
    let mut guards = Vec::new();
    let mut layers: Vec<BoxedLayer> = Vec::new();

    if settings.console_logging_enabled {
        layers.push(console_layer(settings));
    }
    if settings.file_logging_enabled {
        let (layer, guard) = file_layer(settings);
        layers.push(layer);
        guards.push(guard);
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(level_filter(settings))
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to install tracing subscriber: {}", e))?;

    tracing::info!(
        "Logging initialized (level {}, file logging {}, compact console {})",
        settings.level,
        settings.file_logging_enabled,
        settings.compact_console
    );

    Ok(LoggingGuard { _guards: guards })
}
