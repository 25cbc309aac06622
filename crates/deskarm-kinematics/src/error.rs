//! Error types for chain construction and angle ingestion.

use thiserror::Error;

/// Errors raised while building an [`ArmChain`](crate::ArmChain).
///
/// All of these are fatal at startup: the chain must be complete before the
/// first tick.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ChainError {
    /// Referenced parent joint is not in the arena.
    #[error("parent joint {0} not found")]
    ParentNotFound(usize),

    /// A joint with this name already exists.
    #[error("duplicate joint name: {0}")]
    DuplicateJoint(String),

    /// Segment length is negative or not finite.
    #[error("invalid length {value} for joint {name}")]
    InvalidLength {
        /// Joint being built.
        name: String,
        /// Offending value.
        value: f32,
    },

    /// The chain already carries a gripper.
    #[error("chain already has a gripper")]
    GripperExists,

    /// Named joint lookup failed.
    #[error("joint not found: {0}")]
    JointNotFound(String),
}

/// Errors raised while ingesting telemetry.
///
/// These never reach the tick loop; the receiving side logs and drops them.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AngleError {
    /// Joint name outside the fixed enumeration.
    #[error("unrecognized joint name: {0}")]
    UnknownJoint(String),

    /// Payload did not parse as a finite number.
    #[error("invalid angle {payload:?} for {joint}")]
    InvalidAngle {
        /// Target joint.
        joint: String,
        /// Raw payload.
        payload: String,
    },
}
