//! Standard six-joint desk arm built from link lengths.

use nalgebra::{Isometry3, Vector3};
use serde::{Deserialize, Serialize};

use crate::angles::JointName;
use crate::chain::{ArmChain, Axis, ChainBuilder, Drive};
use crate::error::ChainError;

/// Fixed turntable offset in degrees.
pub const BASE_ANGLE_OFFSET_DEG: f32 = 90.0;

/// Physical link lengths (meters) and the scene scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArmDimensions {
    /// Scene units per meter.
    pub units_per_meter: f32,
    /// Shoulder link (m).
    pub shoulder: f32,
    /// Elbow link (m).
    pub elbow: f32,
    /// Wrist twist link (m). Zero on the stock arm.
    pub wrist0: f32,
    /// Wrist pitch link (m).
    pub wrist1: f32,
    /// Wrist roll link (m).
    pub wrist2: f32,
    /// Base box width (units).
    pub base_width: f32,
    /// Base box height (m).
    pub base_height: f32,
    /// Base box depth (units).
    pub base_depth: f32,
}

impl Default for ArmDimensions {
    fn default() -> Self {
        Self {
            units_per_meter: 10.0,
            shoulder: 0.381,
            elbow: 0.254,
            wrist0: 0.0,
            wrist1: 0.0254,
            wrist2: 0.0635,
            base_width: 1.4,
            base_height: 0.1016,
            base_depth: 1.4,
        }
    }
}

impl ArmDimensions {
    /// Convert meters to scene units.
    pub fn to_units(&self, meters: f32) -> f32 {
        meters * self.units_per_meter
    }

    /// Base box extents in scene units.
    pub fn base_extents(&self) -> Vector3<f32> {
        Vector3::new(self.base_width, self.to_units(self.base_height), self.base_depth)
    }

    /// Link lengths in scene units, shoulder first.
    pub fn link_lengths(&self) -> [f32; 5] {
        [
            self.to_units(self.shoulder),
            self.to_units(self.elbow),
            self.to_units(self.wrist0),
            self.to_units(self.wrist1),
            self.to_units(self.wrist2),
        ]
    }
}

/// Build the stock arm with its base centred at `mount`.
///
/// | joint | axis | drive |
/// |---|---|---|
/// | base | vertical | base + 90° |
/// | shoulder | lateral | shoulder |
/// | elbow | lateral | elbow |
/// | wrist | vertical | wrist |
/// | wrist2 | lateral | -wrist2 |
/// | wrist3 | vertical | wrist3 |
///
/// followed by the gripper frame.
pub fn build_arm(dims: &ArmDimensions, mount: Isometry3<f32>) -> Result<ArmChain, ChainError> {
    let [shoulder_len, elbow_len, wrist0_len, wrist1_len, wrist2_len] = dims.link_lengths();

    let mut b = ChainBuilder::new("base", dims.base_extents(), mount, Axis::Vertical);
    let base = b.root();
    b.set_drive(base, Drive::offset(JointName::Base, BASE_ANGLE_OFFSET_DEG))?;

    let shoulder = b.build_joint(base, "shoulder", 0.0, shoulder_len, Axis::Lateral)?;
    b.set_drive(shoulder, Drive::direct(JointName::Shoulder))?;

    let elbow = b.build_joint(shoulder, "elbow", shoulder_len, elbow_len, Axis::Lateral)?;
    b.set_drive(elbow, Drive::direct(JointName::Elbow))?;

    let wrist = b.build_joint(elbow, "wrist", elbow_len, wrist0_len, Axis::Vertical)?;
    b.set_drive(wrist, Drive::direct(JointName::Wrist))?;

    let wrist2 = b.build_joint(wrist, "wrist2", wrist0_len, wrist1_len, Axis::Lateral)?;
    b.set_drive(wrist2, Drive::inverted(JointName::Wrist2))?;

    let wrist3 = b.build_joint(wrist2, "wrist3", wrist1_len, wrist2_len, Axis::Vertical)?;
    b.set_drive(wrist3, Drive::direct(JointName::Wrist3))?;

    b.build_gripper(wrist3, wrist2_len)?;

    Ok(b.finish())
}
