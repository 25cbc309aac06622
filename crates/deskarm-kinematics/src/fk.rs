//! Per-tick forward kinematics.

use crate::angles::{AngleSnapshot, JointName};
use crate::chain::ArmChain;
use crate::gripper::set_openness;

/// Apply one snapshot of angles to the chain, base to end-effector.
///
/// Each driven joint rotates about its own axis relative to its parent; the
/// global transforms are then recomposed in arena order. The `hand` field goes
/// to the gripper instead of a joint. Applying the same snapshot twice yields
/// the same transforms.
pub fn apply_angles(chain: &mut ArmChain, angles: &AngleSnapshot) {
    for joint in chain.joints_mut() {
        if let Some(drive) = joint.drive {
            joint.set_angle(drive.resolve(angles.get(drive.source)));
        }
    }

    if let Some(gripper) = chain.gripper_mut() {
        set_openness(&mut gripper.state, angles.get(JointName::Hand) as f32);
    }

    chain.update_globals();
    tracing::trace!(?angles, "applied joint angles");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{build_arm, ArmDimensions};
    use nalgebra::{Isometry3, Vector3};

    fn arm() -> ArmChain {
        build_arm(&ArmDimensions::default(), Isometry3::identity()).unwrap()
    }

    #[test]
    fn test_apply_is_idempotent() {
        let mut chain = arm();
        let angles = AngleSnapshot {
            base: 30.0,
            shoulder: -45.0,
            elbow: 60.0,
            wrist: 10.0,
            wrist2: 25.0,
            wrist3: -80.0,
            hand: 40.0,
        };
        apply_angles(&mut chain, &angles);
        let first: Vec<_> = chain.joints().iter().map(|j| *j.global_transform()).collect();
        let grip = *chain.gripper().unwrap();

        apply_angles(&mut chain, &angles);
        let second: Vec<_> = chain.joints().iter().map(|j| *j.global_transform()).collect();
        assert_eq!(first, second);
        assert_eq!(grip, *chain.gripper().unwrap());
    }

    #[test]
    fn test_base_offset_adds_ninety() {
        let mut chain = arm();
        let angles = AngleSnapshot {
            base: 90.0,
            ..Default::default()
        };
        apply_angles(&mut chain, &angles);

        let base = chain.joint(chain.root()).unwrap();
        assert_eq!(base.angle(), 180.0);
        let rotation = base.local_transform().rotation;
        assert!((rotation.angle() - std::f32::consts::PI).abs() < 1e-5);
        let axis = rotation.axis().unwrap();
        assert!((axis.y.abs() - 1.0).abs() < 1e-5);

        // Descendants stay at rest relative to the base.
        for joint in chain.joints().iter().skip(1) {
            assert_eq!(joint.angle(), 0.0);
            assert_eq!(joint.local_transform().rotation, nalgebra::UnitQuaternion::identity());
        }
    }

    #[test]
    fn test_wrist2_sign_inverted() {
        let mut chain = arm();
        let angles = AngleSnapshot {
            wrist2: 30.0,
            ..Default::default()
        };
        apply_angles(&mut chain, &angles);
        let wrist2 = chain.find("wrist2").unwrap();
        assert_eq!(chain.joint(wrist2).unwrap().angle(), -30.0);
    }

    #[test]
    fn test_hand_routes_to_gripper() {
        let mut chain = arm();
        let angles = AngleSnapshot {
            hand: 45.0,
            ..Default::default()
        };
        apply_angles(&mut chain, &angles);
        assert_eq!(chain.gripper().unwrap().state.openness(), 45.0);
    }

    #[test]
    fn test_shoulder_swings_end_effector() {
        let mut chain = arm();
        apply_angles(&mut chain, &AngleSnapshot::default());
        let upright = chain.end_effector().unwrap().translation.vector;

        let angles = AngleSnapshot {
            shoulder: 90.0,
            ..Default::default()
        };
        apply_angles(&mut chain, &angles);
        let swung = chain.end_effector().unwrap().translation.vector;

        // Rotating about the shoulder keeps the distance to the shoulder pivot.
        let shoulder = chain.find("shoulder").unwrap();
        let pivot: Vector3<f32> = chain.joint(shoulder).unwrap().global_transform().translation.vector;
        assert!(((upright - pivot).norm() - (swung - pivot).norm()).abs() < 1e-4);
        assert!(swung.y < upright.y);
    }
}
