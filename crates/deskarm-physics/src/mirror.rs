//! Kinematic shadow bodies that follow the arm chain.
//!
//! Every segment of the chain gets a massless kinematic body in the physics
//! world. Once per tick, after forward kinematics, [`KinematicBodyMirror::sync_all`]
//! overwrites each shadow's pose with its driver's global transform. The
//! engine never moves a shadow on its own.

use deskarm_kinematics::{ArmChain, Finger, Gripper, JointId, Segment};
use nalgebra::Isometry3;
use rapier3d::dynamics::RigidBodyHandle;

use crate::error::{PhysicsError, Result};
use crate::world::{BodyRequest, PhysicsWorld};

/// What a shadow follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShadowDriver {
    /// A joint's global transform.
    Joint(JointId),
    /// One gripper finger.
    Finger(Finger),
}

/// A kinematic body bound to a chain element.
#[derive(Debug, Clone, PartialEq)]
pub struct RigidBodyShadow {
    /// Body name, equal to the joint or finger label.
    pub name: String,
    /// Driver.
    pub driver: ShadowDriver,
    /// Body in the world.
    pub body: RigidBodyHandle,
}

/// Owns the joint → shadow bindings.
#[derive(Debug, Clone, Default)]
pub struct KinematicBodyMirror {
    shadows: Vec<RigidBodyShadow>,
}

impl KinematicBodyMirror {
    /// Empty mirror.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a shadow for `joint` shaped like `segment`.
    ///
    /// # Errors
    ///
    /// [`PhysicsError::GeometryMissing`] when `segment` is `None`, as for the
    /// gripper frame.
    pub fn create_shadow(
        &mut self,
        world: &mut PhysicsWorld,
        chain: &ArmChain,
        joint: JointId,
        segment: Option<&Segment>,
    ) -> Result<RigidBodyHandle> {
        let j = chain
            .joint(joint)
            .ok_or_else(|| PhysicsError::MissingJoint(format!("#{}", joint.0)))?;
        let segment = segment.ok_or_else(|| PhysicsError::GeometryMissing(j.name.clone()))?;

        let body = world.insert_body(BodyRequest::kinematic(
            j.name.clone(),
            segment.half_extents(),
            segment.center_offset(),
            *j.global_transform(),
        ))?;
        self.shadows.push(RigidBodyShadow {
            name: j.name.clone(),
            driver: ShadowDriver::Joint(joint),
            body,
        });
        Ok(body)
    }

    /// Create both finger shadows.
    pub fn create_finger_shadows(
        &mut self,
        world: &mut PhysicsWorld,
        chain: &ArmChain,
    ) -> Result<[RigidBodyHandle; 2]> {
        if chain.gripper().is_none() {
            return Err(PhysicsError::MissingJoint("gripper".to_string()));
        }
        let half_extents = Gripper::finger_extents() / 2.0;
        let mut bodies = Vec::with_capacity(2);
        for finger in Finger::BOTH {
            let pose = chain
                .finger_global(finger)
                .ok_or_else(|| PhysicsError::MissingJoint("gripper".to_string()))?;
            let body = world.insert_body(BodyRequest::kinematic(
                finger.label(),
                half_extents,
                Isometry3::identity(),
                pose,
            ))?;
            self.shadows.push(RigidBodyShadow {
                name: finger.label().to_string(),
                driver: ShadowDriver::Finger(finger),
                body,
            });
            bodies.push(body);
        }
        Ok([bodies[0], bodies[1]])
    }

    /// Shadow every segment-carrying joint plus the fingers.
    ///
    /// The base box is mirrored too. Joints without a segment (the gripper
    /// frame) are skipped.
    pub fn mirror_chain(&mut self, world: &mut PhysicsWorld, chain: &ArmChain) -> Result<()> {
        for (i, joint) in chain.joints().iter().enumerate() {
            if joint.segment.is_none() {
                continue;
            }
            self.create_shadow(world, chain, JointId(i), joint.segment.as_ref())?;
        }
        if chain.gripper().is_some() {
            self.create_finger_shadows(world, chain)?;
        }
        tracing::info!(shadows = self.shadows.len(), "mirrored arm chain");
        Ok(())
    }

    /// Overwrite every shadow pose with its driver's global transform.
    pub fn sync_all(&self, world: &mut PhysicsWorld, chain: &ArmChain) -> Result<()> {
        for shadow in &self.shadows {
            let pose = driver_pose(chain, shadow.driver)
                .ok_or_else(|| PhysicsError::MissingJoint(shadow.name.clone()))?;
            world.set_kinematic_pose(shadow.body, pose)?;
        }
        Ok(())
    }

    /// Largest pose difference between any shadow and its driver.
    pub fn max_deviation(&self, world: &PhysicsWorld, chain: &ArmChain) -> f32 {
        self.shadows
            .iter()
            .filter_map(|s| Some(pose_deviation(&world.pose(s.body)?, &driver_pose(chain, s.driver)?)))
            .fold(0.0, f32::max)
    }

    /// Bound shadows in creation order.
    pub fn shadows(&self) -> &[RigidBodyShadow] {
        &self.shadows
    }

    /// Shadow by name.
    pub fn shadow(&self, name: &str) -> Option<&RigidBodyShadow> {
        self.shadows.iter().find(|s| s.name == name)
    }
}

/// Current global pose of a shadow driver.
pub fn driver_pose(chain: &ArmChain, driver: ShadowDriver) -> Option<Isometry3<f32>> {
    match driver {
        ShadowDriver::Joint(id) => chain.joint(id).map(|j| *j.global_transform()),
        ShadowDriver::Finger(finger) => chain.finger_global(finger),
    }
}

/// Distance between two poses: the larger of the translation gap and the
/// quaternion component gap (sign-insensitive).
pub fn pose_deviation(a: &Isometry3<f32>, b: &Isometry3<f32>) -> f32 {
    let translation = (a.translation.vector - b.translation.vector).norm();
    let qa = a.rotation.coords;
    let qb = b.rotation.coords;
    let rotation = (qa - qb).norm().min((qa + qb).norm());
    translation.max(rotation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use deskarm_kinematics::{apply_angles, build_arm, AngleSnapshot, ArmDimensions};
    use nalgebra::{UnitQuaternion, Vector3};

    fn rig() -> (PhysicsWorld, ArmChain, KinematicBodyMirror) {
        let mut world = PhysicsWorld::default();
        let chain = build_arm(&ArmDimensions::default(), Isometry3::translation(0.0, 1.0, 0.0)).unwrap();
        let mut mirror = KinematicBodyMirror::new();
        mirror.mirror_chain(&mut world, &chain).unwrap();
        (world, chain, mirror)
    }

    #[test]
    fn test_mirror_creates_expected_shadows() {
        let (_, _, mirror) = rig();
        let names: Vec<_> = mirror.shadows().iter().map(|s| s.name.as_str()).collect();
        assert_eq!(
            names,
            [
                "base",
                "shoulder",
                "elbow",
                "wrist",
                "wrist2",
                "wrist3",
                "finger_left",
                "finger_right"
            ]
        );
        assert!(mirror.shadow("gripper").is_none());
    }

    #[test]
    fn test_gripper_frame_has_no_geometry() {
        let (mut world, chain, mut mirror) = rig();
        let frame = chain.gripper().unwrap().frame;
        let err = mirror.create_shadow(&mut world, &chain, frame, None).unwrap_err();
        assert!(matches!(err, PhysicsError::GeometryMissing(name) if name == "gripper"));
    }

    #[test]
    fn test_sync_all_matches_chain() {
        let (mut world, mut chain, mirror) = rig();
        let angles = AngleSnapshot {
            base: 30.0,
            shoulder: -45.0,
            elbow: 60.0,
            wrist2: 20.0,
            hand: 70.0,
            ..Default::default()
        };
        apply_angles(&mut chain, &angles);
        assert!(mirror.max_deviation(&world, &chain) > 1e-3);

        mirror.sync_all(&mut world, &chain).unwrap();
        assert_eq!(mirror.max_deviation(&world, &chain), 0.0);
    }

    #[test]
    fn test_pose_deviation_sign_insensitive() {
        let q = UnitQuaternion::from_axis_angle(&Vector3::y_axis(), 0.7);
        let a = Isometry3::from_parts(Vector3::new(1.0, 2.0, 3.0).into(), q);
        let flipped = UnitQuaternion::new_unchecked(-q.into_inner());
        let b = Isometry3::from_parts(Vector3::new(1.0, 2.0, 3.0).into(), flipped);
        assert_eq!(pose_deviation(&a, &b), 0.0);
        let c = Isometry3::translation(1.0, 2.0, 3.5);
        assert!((pose_deviation(&Isometry3::translation(1.0, 2.0, 3.0), &c) - 0.5).abs() < 1e-6);
    }
}
