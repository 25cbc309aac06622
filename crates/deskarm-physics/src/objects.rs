//! Free dynamic objects and their visual transforms.

use nalgebra::{Isometry3, Vector3};
use rapier3d::dynamics::RigidBodyHandle;
use serde::{Deserialize, Serialize};

use crate::error::{PhysicsError, Result};
use crate::world::{BodyRequest, PhysicsWorld};

/// A box object placed in the scene at startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObjectConfig {
    /// Unique name.
    pub name: String,
    /// Edge lengths in meters.
    pub size: [f32; 3],
    /// Initial centre in meters.
    pub position: [f32; 3],
    /// Mass in kg.
    pub mass: f32,
}

impl Default for ObjectConfig {
    fn default() -> Self {
        Self {
            name: "cube".to_string(),
            size: [0.1, 0.1, 0.1],
            position: [-0.1, 0.5, -0.4],
            mass: 1.0,
        }
    }
}

/// A force-integrated body paired with the transform the renderer draws.
#[derive(Debug, Clone, PartialEq)]
pub struct DynamicObject {
    /// Object name.
    pub name: String,
    /// Body in the world.
    pub body: RigidBodyHandle,
    visual: Isometry3<f32>,
}

impl DynamicObject {
    /// Insert the object into `world`, converting meters to scene units.
    pub fn spawn(world: &mut PhysicsWorld, config: &ObjectConfig, units_per_meter: f32) -> Result<Self> {
        let [sx, sy, sz] = config.size;
        let [px, py, pz] = config.position;
        let u = units_per_meter;
        let half_extents = Vector3::new(sx, sy, sz) * (u / 2.0);
        let pose = Isometry3::translation(px * u, py * u, pz * u);
        let body = world.insert_body(BodyRequest::dynamic(
            config.name.clone(),
            half_extents,
            pose,
            config.mass,
        ))?;
        tracing::info!(object = %config.name, "spawned dynamic object");
        Ok(Self {
            name: config.name.clone(),
            body,
            visual: pose,
        })
    }

    /// Copy the post-step body pose into the visual transform.
    pub fn sync_visual(&mut self, world: &PhysicsWorld) -> Result<()> {
        self.visual = world
            .pose(self.body)
            .ok_or_else(|| PhysicsError::MissingBody(self.name.clone()))?;
        Ok(())
    }

    /// Transform the renderer should draw.
    pub fn visual(&self) -> &Isometry3<f32> {
        &self.visual
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spawn_scales_to_units() {
        let mut world = PhysicsWorld::default();
        let object = DynamicObject::spawn(&mut world, &ObjectConfig::default(), 10.0).unwrap();
        let t = object.visual().translation.vector;
        assert!((t - Vector3::new(-1.0, 5.0, -4.0)).norm() < 1e-6);
    }

    #[test]
    fn test_visual_follows_body() {
        let mut world = PhysicsWorld::default();
        let mut object = DynamicObject::spawn(&mut world, &ObjectConfig::default(), 10.0).unwrap();
        for _ in 0..5 {
            world.integrate(1.0 / 60.0).unwrap();
        }
        let before = *object.visual();
        object.sync_visual(&world).unwrap();
        assert_eq!(*object.visual(), world.pose(object.body).unwrap());
        assert!(object.visual().translation.y < before.translation.y);
    }
}
