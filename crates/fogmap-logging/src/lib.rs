//! Structured logging for fogmap
//!
//! One place to install the global `tracing` subscriber for binaries and
//! long-running hosts. Library crates only emit events; they never install
//! a subscriber themselves.
//!
//! # Features
//!
//! - **JSON Lines**: one object per event on the console (default) or in files
//! - **Pretty / Compact Console**: human-readable output for development
//! - **File Rotation**: Daily/hourly log rotation via tracing-appender
//! - **RUST_LOG**: Overrides the configured levels when set
//!
//! # Quick Start
//!
//! ```ignore
//! use fogmap_logging::{FogmapSubscriberBuilder, LogConfig};
//!
//! // Colored console output, tile store at trace
//! let _guard = FogmapSubscriberBuilder::new()
//!     .with_config(LogConfig::development())
//!     .init()?;
//! ```

pub mod config;

pub use config::{ConsoleConfig, ConsoleFormat, FileConfig, JsonConfig, LogConfig, RotationStrategy};

use std::fs::{self, File};

use thiserror::Error;
use tracing::Subscriber;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{EnvFilter, Layer, Registry, layer::SubscriberExt, util::SubscriberInitExt};

/// Errors raised while installing the subscriber
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("failed to prepare log file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid filter directives: {0}")]
    Filter(String),

    #[error("a global subscriber is already installed")]
    AlreadyInitialized,
}

type BoxedLayer<S> = Box<dyn Layer<S> + Send + Sync + 'static>;

/// Builder for configuring and initializing the fogmap logging subscriber
///
/// Starts from [`LogConfig::default`]: JSON lines on the console at `info`.
#[derive(Debug, Default)]
pub struct FogmapSubscriberBuilder {
    config: LogConfig,
}

impl FogmapSubscriberBuilder {
    /// Create a new subscriber builder with default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a specific configuration
    pub fn with_config(mut self, config: LogConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the default log level
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.config.default_level = level.into();
        self
    }

    /// Enable or disable console output
    pub fn with_console(mut self, enabled: bool) -> Self {
        self.config.console.enabled = enabled;
        self
    }

    /// Configure file output
    pub fn with_file_output(mut self, config: FileConfig) -> Self {
        self.config.file = Some(config);
        self
    }

    pub fn config(&self) -> &LogConfig {
        &self.config
    }

    /// The filter to install: `RUST_LOG` when set, the config otherwise
    fn env_filter(&self) -> Result<EnvFilter, LoggingError> {
        match EnvFilter::try_from_default_env() {
            Ok(filter) => Ok(filter),
            Err(_) => EnvFilter::try_new(self.config.filter_directives())
                .map_err(|e| LoggingError::Filter(e.to_string())),
        }
    }

    fn console_layer<S>(&self) -> Option<BoxedLayer<S>>
    where
        S: Subscriber + for<'a> LookupSpan<'a>,
    {
        let console = &self.config.console;
        if !console.enabled {
            return None;
        }
        let layer = match console.format {
            ConsoleFormat::Pretty => tracing_subscriber::fmt::layer()
                .pretty()
                .with_ansi(console.ansi)
                .boxed(),
            ConsoleFormat::Compact => tracing_subscriber::fmt::layer()
                .compact()
                .with_ansi(console.ansi)
                .with_target(true)
                .boxed(),
            ConsoleFormat::Json => {
                let json = &self.config.json;
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(json.span_list)
                    .flatten_event(json.flatten_events)
                    .with_file(json.source_location)
                    .with_line_number(json.source_location)
                    .boxed()
            }
        };
        Some(layer)
    }

    fn file_layer<S>(&self, writer: NonBlocking) -> BoxedLayer<S>
    where
        S: Subscriber + for<'a> LookupSpan<'a>,
    {
        let json = &self.config.json;
        tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(json.span_list)
            .flatten_event(json.flatten_events)
            .with_file(json.source_location)
            .with_line_number(json.source_location)
            .with_writer(writer)
            .boxed()
    }

    /// Initialize the subscriber globally
    ///
    /// Returns a guard that must be kept alive for the duration of the
    /// program when file output is enabled; dropping it flushes the file.
    pub fn init(self) -> Result<Option<WorkerGuard>, LoggingError> {
        let env_filter = self.env_filter()?;

        let mut layers: Vec<BoxedLayer<Registry>> = Vec::new();
        let mut guard = None;

        if let Some(console) = self.console_layer() {
            layers.push(console);
        }
        if let Some(file_config) = &self.config.file {
            let (writer, file_guard) = file_writer(file_config)?;
            layers.push(self.file_layer(writer));
            guard = Some(file_guard);
        }

        Registry::default()
            .with(layers)
            .with(env_filter)
            .try_init()
            .map_err(|_| LoggingError::AlreadyInitialized)?;

        Ok(guard)
    }
}

/// Open the file sink; `Never` truncates a single file, the others append
/// to rotating files
fn file_writer(config: &FileConfig) -> Result<(NonBlocking, WorkerGuard), LoggingError> {
    fs::create_dir_all(&config.directory)?;

    let (writer, guard) = match config.rotation {
        RotationStrategy::Never => {
            let path = config.directory.join(format!("{}.log", config.prefix));
            tracing_appender::non_blocking(File::create(path)?)
        }
        RotationStrategy::Daily => tracing_appender::non_blocking(RollingFileAppender::new(
            Rotation::DAILY,
            &config.directory,
            &config.prefix,
        )),
        RotationStrategy::Hourly => tracing_appender::non_blocking(RollingFileAppender::new(
            Rotation::HOURLY,
            &config.directory,
            &config.prefix,
        )),
    };
    Ok((writer, guard))
}

/// Install [`LogConfig::development`] globally
pub fn init_development() -> Result<(), LoggingError> {
    FogmapSubscriberBuilder::new()
        .with_config(LogConfig::development())
        .init()
        .map(|_| ())
}

/// Initialize logging for testing (minimal output); ignores a subscriber
/// that is already installed
pub fn init_testing() {
    let _ = FogmapSubscriberBuilder::new()
        .with_config(LogConfig::testing())
        .init();
}
