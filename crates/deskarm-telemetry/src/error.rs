//! Error types for the telemetry bridge.

use thiserror::Error;

/// Errors from the MQTT telemetry bridge.
#[derive(Error, Debug)]
pub enum TelemetryError {
    /// Connection failed.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// MQTT error.
    #[error("MQTT error: {0}")]
    MqttError(String),

    /// Timeout error.
    #[error("timeout: {0}")]
    Timeout(String),

    /// Configuration rejected.
    #[error("invalid telemetry configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for telemetry operations.
pub type Result<T> = std::result::Result<T, TelemetryError>;
