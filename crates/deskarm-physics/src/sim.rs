//! The per-frame tick: step, kinematics, shadow sync, render output.

use std::sync::Arc;

use deskarm_kinematics::{apply_angles, build_arm, AngleState, ArmChain, Finger, JointPose, Pose};
use nalgebra::{Isometry3, Translation3};
use serde::{Deserialize, Serialize};

use crate::config::SimConfig;
use crate::error::{PhysicsError, Result};
use crate::events::CollisionReport;
use crate::mirror::KinematicBodyMirror;
use crate::objects::DynamicObject;
use crate::stepper::PhysicsStepper;
use crate::world::PhysicsWorld;

/// A named world-space pose.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedPose {
    /// Body name.
    pub name: String,
    /// World pose.
    pub pose: Pose,
}

/// Everything the renderer needs for one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderFrame {
    /// Joint local transforms, root first.
    pub joints: Vec<JointPose>,
    /// End-effector pose.
    pub hand: Pose,
    /// Finger shadow poses.
    pub fingers: Vec<NamedPose>,
    /// Dynamic object visuals.
    pub objects: Vec<NamedPose>,
}

/// Result of one [`Simulation::tick`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickReport {
    /// Ticks completed, counting this one.
    pub tick: u64,
    /// Object/shadow contacts from the physics step.
    pub collisions: Vec<CollisionReport>,
    /// Frame to draw.
    pub frame: RenderFrame,
}

/// The arm rig: chain, physics world and the angle store telemetry feeds.
pub struct Simulation {
    config: SimConfig,
    angles: Arc<AngleState>,
    chain: ArmChain,
    world: PhysicsWorld,
    mirror: KinematicBodyMirror,
    objects: Vec<DynamicObject>,
    stepper: PhysicsStepper,
    tick: u64,
}

impl Simulation {
    /// Build the chain, mirror it into a fresh world and spawn the objects.
    ///
    /// Any failure here is fatal: the rig must be complete before the first
    /// tick.
    pub fn new(config: SimConfig, angles: Arc<AngleState>) -> Result<Self> {
        config.validate()?;

        let mut world = PhysicsWorld::new(config.scene.gravity());
        world.set_contact_materials(config.scene.contact_table());
        world.insert_ground(config.scene.ground_height)?;

        let mount = config.scene.base_mount(&config.arm);
        let chain = build_arm(&config.arm, mount)?;

        let mut mirror = KinematicBodyMirror::new();
        mirror.mirror_chain(&mut world, &chain)?;

        let objects = config
            .scene
            .objects
            .iter()
            .map(|o| DynamicObject::spawn(&mut world, o, config.arm.units_per_meter))
            .collect::<Result<Vec<_>>>()?;

        let stepper = PhysicsStepper::new(config.scene.dt)?;

        tracing::info!(
            joints = chain.len(),
            shadows = mirror.shadows().len(),
            objects = objects.len(),
            "simulation ready"
        );
        Ok(Self {
            config,
            angles,
            chain,
            world,
            mirror,
            objects,
            stepper,
            tick: 0,
        })
    }

    /// Run one frame: physics step, forward kinematics from a fresh angle
    /// snapshot, then shadow sync.
    pub fn tick(&mut self) -> Result<TickReport> {
        let collisions =
            self.stepper
                .step(&mut self.world, &mut self.objects, &self.mirror, &self.chain)?;

        let snapshot = self.angles.snapshot();
        apply_angles(&mut self.chain, &snapshot);
        self.mirror.sync_all(&mut self.world, &self.chain)?;

        self.tick += 1;
        tracing::trace!(tick = self.tick, collisions = collisions.len(), "tick");
        Ok(TickReport {
            tick: self.tick,
            collisions,
            frame: self.render_frame()?,
        })
    }

    /// End-effector pose: midway between the finger shadows, oriented like
    /// the gripper frame.
    pub fn snapshot_pose(&self) -> Result<Isometry3<f32>> {
        let left = self.finger_pose(Finger::Left)?;
        let right = self.finger_pose(Finger::Right)?;
        let mid = (left.translation.vector + right.translation.vector) / 2.0;
        Ok(Isometry3::from_parts(Translation3::from(mid), left.rotation))
    }

    fn finger_pose(&self, finger: Finger) -> Result<Isometry3<f32>> {
        let shadow = self
            .mirror
            .shadow(finger.label())
            .ok_or_else(|| PhysicsError::MissingBody(finger.label().to_string()))?;
        self.world
            .pose(shadow.body)
            .ok_or_else(|| PhysicsError::MissingBody(shadow.name.clone()))
    }

    /// Current frame without stepping.
    pub fn render_frame(&self) -> Result<RenderFrame> {
        let fingers = Finger::BOTH
            .iter()
            .map(|&f| {
                Ok(NamedPose {
                    name: f.label().to_string(),
                    pose: Pose::from(&self.finger_pose(f)?),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let objects = self
            .objects
            .iter()
            .map(|o| NamedPose {
                name: o.name.clone(),
                pose: Pose::from(o.visual()),
            })
            .collect();
        Ok(RenderFrame {
            joints: self.chain.local_transforms(),
            hand: Pose::from(&self.snapshot_pose()?),
            fingers,
            objects,
        })
    }

    /// Shared angle store.
    pub fn angles(&self) -> &Arc<AngleState> {
        &self.angles
    }

    /// The arm chain.
    pub fn chain(&self) -> &ArmChain {
        &self.chain
    }

    /// The physics world.
    pub fn world(&self) -> &PhysicsWorld {
        &self.world
    }

    /// Shadow bindings.
    pub fn mirror(&self) -> &KinematicBodyMirror {
        &self.mirror
    }

    /// Dynamic objects.
    pub fn objects(&self) -> &[DynamicObject] {
        &self.objects
    }

    /// Configuration the rig was built from.
    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Ticks run so far.
    pub fn tick_count(&self) -> u64 {
        self.tick
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deskarm_kinematics::JointName;

    #[test]
    fn test_new_builds_full_rig() {
        let sim = Simulation::new(SimConfig::default(), AngleState::shared()).unwrap();
        assert_eq!(sim.mirror().shadows().len(), 8);
        assert_eq!(sim.objects().len(), 1);
        assert_eq!(sim.tick_count(), 0);
    }

    #[test]
    fn test_tick_applies_angles() {
        let angles = AngleState::shared();
        let mut sim = Simulation::new(SimConfig::default(), angles.clone()).unwrap();
        angles.set(JointName::Elbow, 45.0);
        let report = sim.tick().unwrap();
        assert_eq!(report.tick, 1);
        let elbow = sim.chain().find("elbow").unwrap();
        assert_eq!(sim.chain().joint(elbow).unwrap().angle(), 45.0);
        assert_eq!(sim.mirror().max_deviation(sim.world(), sim.chain()), 0.0);
        assert_eq!(report.frame.joints.len(), sim.chain().len());
    }

    #[test]
    fn test_hand_pose_between_fingers() {
        let angles = AngleState::shared();
        let mut sim = Simulation::new(SimConfig::default(), angles.clone()).unwrap();
        angles.set(JointName::Hand, 90.0);
        sim.tick().unwrap();

        let hand = sim.snapshot_pose().unwrap();
        let frame = sim.chain().gripper().unwrap().frame;
        let frame = sim.chain().joint(frame).unwrap().global_transform();
        let expected = frame * Isometry3::translation(0.0, deskarm_kinematics::FINGER_FORWARD_OFFSET, 0.0);
        assert!((hand.translation.vector - expected.translation.vector).norm() < 1e-5);
    }
}
