//! Error types for the application.

use thiserror::Error;

/// Top-level application error.
#[derive(Debug, Error)]
#[allow(dead_code)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),

    #[error("Recorder error: {0}")]
    Recorder(#[from] RecorderError),

    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),
}

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    IoError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {message}")]
    ParseError { message: String },

    #[error("Config validation failed: {message}")]
    ValidationError { message: String },
}

/// Protocol-related errors (telnet stream handling).
///
/// The stream filter itself never fails (malformed negotiation is dropped,
/// undecodable bytes degrade to lossy decoding); these errors cover the
/// transport around it.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Outbound command is not valid UTF-8: {message}")]
    #[allow(dead_code)]
    InvalidCommand { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Ticker scheduler errors.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("Ticker {rule_id} has non-positive interval {interval}s")]
    InvalidInterval { rule_id: u64, interval: f64 },

    #[error("Ticker {rule_id} is not running")]
    #[allow(dead_code)]
    NotRunning { rule_id: u64 },
}

/// Session recorder errors.
///
/// All recorder failures are recoverable: failing to log a line is never
/// fatal to displaying or processing that line.
#[derive(Debug, Error)]
pub enum RecorderError {
    #[error("Failed to open log file '{path}': {source}")]
    OpenFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to append to log file '{path}': {source}")]
    WriteFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to rotate log file '{path}': {source}")]
    RotateFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid search pattern '{pattern}': {message}")]
    InvalidSearchPattern { pattern: String, message: String },
}

/// Connection-related errors.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("Failed to connect to {host}:{port}: {source}")]
    ConnectFailed {
        host: String,
        port: u16,
        #[source]
        source: std::io::Error,
    },

    #[error("Connection closed by remote")]
    #[allow(dead_code)]
    ConnectionClosed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using AppError.
#[allow(dead_code)]
pub type Result<T> = std::result::Result<T, AppError>;

/// Result type alias for recorder operations.
pub type RecorderResult<T> = std::result::Result<T, RecorderError>;

/// Result type alias for scheduler operations.
pub type SchedulerResult<T> = std::result::Result<T, SchedulerError>;
