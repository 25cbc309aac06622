//! Fixed-timestep advance of the physics world.

use deskarm_kinematics::ArmChain;

use crate::error::{PhysicsError, Result};
use crate::events::CollisionReport;
use crate::mirror::{pose_deviation, KinematicBodyMirror};
use crate::objects::DynamicObject;
use crate::world::PhysicsWorld;

/// Default timestep, one display refresh at 60 Hz.
pub const FIXED_DT: f32 = 1.0 / 60.0;

/// Largest shadow drift tolerated across a step.
pub const DRIFT_TOLERANCE: f32 = 1e-6;

/// Advances the world by exactly one fixed timestep per call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhysicsStepper {
    dt: f32,
}

impl Default for PhysicsStepper {
    fn default() -> Self {
        Self { dt: FIXED_DT }
    }
}

impl PhysicsStepper {
    /// Stepper with a custom timestep.
    pub fn new(dt: f32) -> Result<Self> {
        if !(dt.is_finite() && dt > 0.0) {
            return Err(PhysicsError::InvalidConfig(format!("timestep must be positive, got {dt}")));
        }
        Ok(Self { dt })
    }

    /// Timestep in seconds.
    pub fn dt(&self) -> f32 {
        self.dt
    }

    /// Integrate one step, then copy dynamic poses into their visuals.
    ///
    /// Shadow bodies must come out exactly where they went in; any drift past
    /// [`DRIFT_TOLERANCE`] is logged as an error.
    pub fn step(
        &self,
        world: &mut PhysicsWorld,
        objects: &mut [DynamicObject],
        mirror: &KinematicBodyMirror,
        chain: &ArmChain,
    ) -> Result<Vec<CollisionReport>> {
        let before: Vec<_> = mirror
            .shadows()
            .iter()
            .map(|s| world.pose(s.body))
            .collect();

        let reports = world.integrate(self.dt)?;

        for object in objects.iter_mut() {
            object.sync_visual(world)?;
        }

        for (shadow, before) in mirror.shadows().iter().zip(before) {
            let (Some(before), Some(after)) = (before, world.pose(shadow.body)) else {
                continue;
            };
            let drift = pose_deviation(&before, &after);
            if drift > DRIFT_TOLERANCE {
                tracing::error!(shadow = %shadow.name, drift, "shadow body drifted during step");
            }
        }
        let deviation = mirror.max_deviation(world, chain);
        if deviation > DRIFT_TOLERANCE {
            tracing::error!(deviation, "shadow bodies out of sync with the chain");
        }

        for report in &reports {
            tracing::debug!(object = %report.object, shadow = %report.shadow, phase = ?report.phase, "collision");
        }
        Ok(reports)
    }
}
