//! Error types for formrelay.
//!
//! This module defines the error type shared by the front-end, relay and
//! collector, with enough context to tell which file or socket failed.

use std::net::SocketAddr;
use std::path::PathBuf;
use thiserror::Error;

/// The main error type for formrelay operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === Network Errors ===
    /// Failed to bind a listening socket.
    #[error("failed to bind {component} on {addr}: {source}")]
    Bind {
        /// Which component tried to bind.
        component: &'static str,
        /// Address that could not be bound.
        addr: SocketAddr,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A relay datagram could not be sent.
    #[error("failed to relay submission to {addr}: {source}")]
    RelaySend {
        /// Destination of the datagram.
        addr: SocketAddr,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Receiving a datagram failed.
    #[error("failed to receive datagram: {0}")]
    Receive(#[source] std::io::Error),

    // === Storage Errors ===
    /// The persisted log exists but does not hold a JSON array of entries.
    #[error("persisted log at {path} is corrupted: {source}")]
    CorruptLog {
        /// Path to the log file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: serde_json::Error,
    },

    /// The persisted log could not be read.
    #[error("failed to read persisted log at {path}: {source}")]
    LogRead {
        /// Path to the log file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The persisted log could not be written.
    #[error("failed to write persisted log at {path}: {source}")]
    LogWrite {
        /// Path to the log file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === I/O Errors ===
    /// File system operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to create a required directory.
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreate {
        /// Path that couldn't be created.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === Serialization Errors ===
    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Generic Errors ===
    /// An internal error occurred (bug).
    #[error("internal error: {0}")]
    Internal(String),
}

/// A specialized Result type for formrelay operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Create a configuration validation error.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            message: message.into(),
        }
    }

    /// Create a new internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Check if this error should stop the component that hit it.
    ///
    /// A corrupted log can't be appended to without losing history, and a
    /// socket that failed to bind leaves nothing to loop over. Everything
    /// else is a per-iteration failure.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::CorruptLog { .. } | Self::Bind { .. })
    }
}
