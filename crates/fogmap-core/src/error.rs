//! Error types for fogmap

use thiserror::Error;

/// Top-level error type for fogmap
#[derive(Debug, Error)]
pub enum FogmapError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Location error: {0}")]
    Location(#[from] LocationError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid tile id: {0}")]
    InvalidTileId(String),
}

/// Errors related to durable tile storage
#[derive(Debug, Error)]
pub enum StorageError {
    /// I/O error during storage operations
    #[error("Storage I/O error: {0}")]
    Io(String),

    /// Underlying database error
    #[error("Database error: {0}")]
    Database(String),

    /// Error during serialization
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Error during deserialization
    #[error("Deserialization error: {0}")]
    Deserialization(String),
}

impl StorageError {
    /// Create a new I/O error
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io(message.into())
    }

    /// Create a new database error
    pub fn database(message: impl Into<String>) -> Self {
        Self::Database(message.into())
    }

    /// Create a new Serialization error
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization(message.into())
    }

    /// Create a new Deserialization error
    pub fn deserialization(message: impl Into<String>) -> Self {
        Self::Deserialization(message.into())
    }
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::Io(err.to_string())
    }
}

/// Errors related to the device location service
#[derive(Debug, Error)]
pub enum LocationError {
    #[error("Location permission not granted")]
    PermissionDenied,

    #[error("Location unavailable: {0}")]
    Unavailable(String),

    #[error("Location service does not support {0}")]
    Unsupported(&'static str),
}

/// Errors in discovery configuration values
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{field} must be greater than zero")]
    MustBePositive { field: &'static str },

    #[error("tile_zoom {0} is out of range (0..=30)")]
    ZoomOutOfRange(u8),

    #[error("save_max_wait_ms ({max_wait_ms}) is shorter than save_debounce_ms ({debounce_ms})")]
    MaxWaitBelowDebounce { max_wait_ms: u64, debounce_ms: u64 },

    #[error("storage_key_prefix must not be empty")]
    EmptyKeyPrefix,
}

/// Result type alias using FogmapError
pub type FogmapResult<T> = Result<T, FogmapError>;
