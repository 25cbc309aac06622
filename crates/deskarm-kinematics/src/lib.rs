#![warn(missing_docs)]

//! Kinematic rig for the deskarm simulator.
//!
//! This crate owns the visual side of the arm:
//!
//! - A joint arena built root to leaf from link lengths
//! - Forward kinematics driven by a per-tick angle snapshot
//! - Two-finger gripper actuation
//! - A lock-free angle store that telemetry writes into
//!
//! # Example
//!
//! ```
//! use deskarm_kinematics::{apply_angles, build_arm, AngleState, ArmDimensions, JointName};
//! use nalgebra::Isometry3;
//!
//! let mut chain = build_arm(&ArmDimensions::default(), Isometry3::identity()).unwrap();
//! let angles = AngleState::new();
//! angles.receive("elbow", "45");
//! apply_angles(&mut chain, &angles.snapshot());
//!
//! let elbow = chain.find("elbow").unwrap();
//! assert_eq!(chain.joint(elbow).unwrap().angle(), 45.0);
//! assert_eq!(angles.get(JointName::Elbow), 45.0);
//! ```

mod angles;
mod chain;
mod error;
mod fk;
mod gripper;
mod layout;

pub use angles::{AngleSnapshot, AngleState, JointName};
pub use chain::{
    ArmChain, Axis, ChainBuilder, Drive, Joint, JointId, JointPose, JointRole, Pose, Segment,
};
pub use error::{AngleError, ChainError};
pub use fk::apply_angles;
pub use gripper::{
    set_openness, Finger, Gripper, GripperState, FINGER_DEPTH, FINGER_FORWARD_OFFSET,
    FINGER_HALF_THICKNESS, FINGER_HEIGHT, FINGER_THICKNESS, MAX_OPENNESS,
};
pub use layout::{build_arm, ArmDimensions, BASE_ANGLE_OFFSET_DEG};
