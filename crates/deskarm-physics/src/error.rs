//! Error types for the physics shadow.

use deskarm_kinematics::ChainError;
use thiserror::Error;

/// Errors that can occur while building or stepping the physics world.
#[derive(Error, Debug)]
pub enum PhysicsError {
    /// Shadow creation without segment extents.
    #[error("no segment geometry for joint {0}")]
    GeometryMissing(String),

    /// Chain construction failed.
    #[error("chain construction failed: {0}")]
    Chain(#[from] ChainError),

    /// Missing joint.
    #[error("joint not found: {0}")]
    MissingJoint(String),

    /// Body handle not registered with the world.
    #[error("body not found: {0}")]
    MissingBody(String),

    /// Body request is inconsistent with its kind.
    #[error("invalid body {name}: {reason}")]
    InvalidBody {
        /// Body name.
        name: String,
        /// Reason for rejection.
        reason: String,
    },

    /// A step was requested while another one is running.
    #[error("world is already stepping")]
    StepInProgress,

    /// Configuration rejected.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Configuration file unreadable.
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file malformed.
    #[error("failed to parse configuration: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Result type for physics operations.
pub type Result<T> = std::result::Result<T, PhysicsError>;
