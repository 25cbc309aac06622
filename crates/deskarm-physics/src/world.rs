//! Physics world management using Rapier3d.

use std::collections::HashMap;

use nalgebra::{Isometry3, Vector3};
use rapier3d::dynamics::{
    CCDSolver, ImpulseJointSet, IntegrationParameters, IslandManager, MultibodyJointSet,
    RigidBodyBuilder, RigidBodyHandle, RigidBodySet,
};
use rapier3d::geometry::{
    BroadPhaseMultiSap, ColliderBuilder, ColliderHandle, ColliderSet, CollisionEvent, NarrowPhase,
};
use rapier3d::pipeline::{ActiveEvents, ActiveHooks, PhysicsPipeline, QueryPipeline};
use serde::{Deserialize, Serialize};

use crate::colliders::box_to_collider;
use crate::error::{PhysicsError, Result};
use crate::events::{CollisionCollector, CollisionReport, ContactPhase};
use crate::materials::{ContactMaterialTable, SurfaceMaterial};

/// How the engine treats a body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BodyKind {
    /// Integrated under gravity and contacts.
    Dynamic,
    /// Positioned by the caller, immune to forces.
    Kinematic,
    /// Never moves.
    Static,
}

/// Stepping state of the world.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorldState {
    /// Ready for the next step.
    Idle,
    /// A step is running.
    Stepping,
}

/// Everything needed to add a box body to the world.
#[derive(Debug, Clone, PartialEq)]
pub struct BodyRequest {
    /// Unique body name.
    pub name: String,
    /// Box half extents.
    pub half_extents: Vector3<f32>,
    /// Collider position relative to the body.
    pub collider_offset: Isometry3<f32>,
    /// Initial body pose.
    pub pose: Isometry3<f32>,
    /// Body kind.
    pub kind: BodyKind,
    /// Mass in kg. Must be zero unless the body is dynamic.
    pub mass: f32,
    /// Surface material.
    pub material: SurfaceMaterial,
}

impl BodyRequest {
    /// Massless kinematic robot body.
    pub fn kinematic(
        name: impl Into<String>,
        half_extents: Vector3<f32>,
        collider_offset: Isometry3<f32>,
        pose: Isometry3<f32>,
    ) -> Self {
        Self {
            name: name.into(),
            half_extents,
            collider_offset,
            pose,
            kind: BodyKind::Kinematic,
            mass: 0.0,
            material: SurfaceMaterial::Robot,
        }
    }

    /// Dynamic object body with its collider centred on the body.
    pub fn dynamic(
        name: impl Into<String>,
        half_extents: Vector3<f32>,
        pose: Isometry3<f32>,
        mass: f32,
    ) -> Self {
        Self {
            name: name.into(),
            half_extents,
            collider_offset: Isometry3::identity(),
            pose,
            kind: BodyKind::Dynamic,
            mass,
            material: SurfaceMaterial::Object,
        }
    }
}

#[derive(Debug, Clone)]
struct BodyOwner {
    name: String,
    kind: BodyKind,
}

/// Physics simulation world.
pub struct PhysicsWorld {
    // Rapier components
    pipeline: PhysicsPipeline,
    gravity: Vector3<f32>,
    integration_params: IntegrationParameters,
    islands: IslandManager,
    broad_phase: BroadPhaseMultiSap,
    narrow_phase: NarrowPhase,
    bodies: RigidBodySet,
    colliders: ColliderSet,
    impulse_joints: ImpulseJointSet,
    multibody_joints: MultibodyJointSet,
    ccd_solver: CCDSolver,
    query_pipeline: QueryPipeline,
    hooks: ContactMaterialTable,

    state: WorldState,
    name_to_body: HashMap<String, RigidBodyHandle>,
    collider_owner: HashMap<ColliderHandle, BodyOwner>,
}

impl Default for PhysicsWorld {
    fn default() -> Self {
        Self::new(Vector3::new(0.0, -9.82, 0.0))
    }
}

impl PhysicsWorld {
    /// Create an empty physics world.
    pub fn new(gravity: Vector3<f32>) -> Self {
        Self {
            pipeline: PhysicsPipeline::new(),
            gravity,
            integration_params: IntegrationParameters::default(),
            islands: IslandManager::new(),
            broad_phase: BroadPhaseMultiSap::new(),
            narrow_phase: NarrowPhase::new(),
            bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            impulse_joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            query_pipeline: QueryPipeline::new(),
            hooks: ContactMaterialTable::default(),
            state: WorldState::Idle,
            name_to_body: HashMap::new(),
            collider_owner: HashMap::new(),
        }
    }

    /// Replace the contact-material pairings.
    pub fn set_contact_materials(&mut self, table: ContactMaterialTable) {
        self.hooks = table;
    }

    /// Add a box body.
    pub fn insert_body(&mut self, request: BodyRequest) -> Result<RigidBodyHandle> {
        let BodyRequest {
            name,
            half_extents,
            collider_offset,
            pose,
            kind,
            mass,
            material,
        } = request;

        if self.name_to_body.contains_key(&name) {
            return Err(invalid(&name, "duplicate body name"));
        }
        match kind {
            BodyKind::Dynamic if !(mass.is_finite() && mass > 0.0) => {
                return Err(invalid(&name, "dynamic bodies need a positive mass"));
            }
            BodyKind::Kinematic | BodyKind::Static if mass != 0.0 => {
                return Err(invalid(&name, "only dynamic bodies carry mass"));
            }
            _ => {}
        }

        let shape = box_to_collider(half_extents, &name)?;
        let builder = match kind {
            BodyKind::Dynamic => RigidBodyBuilder::dynamic(),
            BodyKind::Kinematic => RigidBodyBuilder::kinematic_position_based(),
            BodyKind::Static => RigidBodyBuilder::fixed(),
        };
        let body_handle = self.bodies.insert(builder.position(pose).build());

        let collider = ColliderBuilder::new(shape)
            .position(collider_offset)
            .friction(material.friction())
            .restitution(material.restitution())
            .user_data(material.to_user_data())
            .active_hooks(ActiveHooks::MODIFY_SOLVER_CONTACTS)
            .active_events(ActiveEvents::COLLISION_EVENTS);
        let collider = match kind {
            BodyKind::Dynamic => collider.mass(mass),
            _ => collider.density(0.0),
        };
        let collider_handle =
            self.colliders
                .insert_with_parent(collider.build(), body_handle, &mut self.bodies);

        tracing::debug!(body = %name, ?kind, "inserted body");
        self.collider_owner
            .insert(collider_handle, BodyOwner { name: name.clone(), kind });
        self.name_to_body.insert(name, body_handle);
        Ok(body_handle)
    }

    /// Add the static ground plane with its surface at `height`.
    pub fn insert_ground(&mut self, height: f32) -> Result<RigidBodyHandle> {
        let name = "ground".to_string();
        if self.name_to_body.contains_key(&name) {
            return Err(invalid(&name, "duplicate body name"));
        }
        if !height.is_finite() {
            return Err(invalid(&name, "non-finite height"));
        }
        let body_handle = self.bodies.insert(
            RigidBodyBuilder::fixed()
                .position(Isometry3::translation(0.0, height, 0.0))
                .build(),
        );
        let material = SurfaceMaterial::Ground;
        let collider = ColliderBuilder::halfspace(Vector3::y_axis())
            .friction(material.friction())
            .restitution(material.restitution())
            .user_data(material.to_user_data())
            .active_hooks(ActiveHooks::MODIFY_SOLVER_CONTACTS)
            .build();
        let collider_handle =
            self.colliders
                .insert_with_parent(collider, body_handle, &mut self.bodies);

        self.collider_owner.insert(
            collider_handle,
            BodyOwner {
                name: name.clone(),
                kind: BodyKind::Static,
            },
        );
        self.name_to_body.insert(name, body_handle);
        Ok(body_handle)
    }

    /// Advance the simulation by `dt` seconds.
    ///
    /// Returns the contacts that started or stopped between dynamic and
    /// kinematic bodies during the step.
    ///
    /// A panic inside the pipeline leaves the world in
    /// [`WorldState::Stepping`], and every later call fails with
    /// [`PhysicsError::StepInProgress`]. Rebuild the world after that.
    pub fn integrate(&mut self, dt: f32) -> Result<Vec<CollisionReport>> {
        if self.state != WorldState::Idle {
            return Err(PhysicsError::StepInProgress);
        }
        self.state = WorldState::Stepping;
        self.integration_params.dt = dt;

        let collector = CollisionCollector::new();
        self.pipeline.step(
            &self.gravity,
            &self.integration_params,
            &mut self.islands,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.bodies,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            &mut self.ccd_solver,
            Some(&mut self.query_pipeline),
            &self.hooks,
            &collector,
        );

        self.state = WorldState::Idle;
        Ok(collector
            .drain()
            .into_iter()
            .filter_map(|event| self.report(event))
            .collect())
    }

    fn report(&self, event: CollisionEvent) -> Option<CollisionReport> {
        let a = self.collider_owner.get(&event.collider1())?;
        let b = self.collider_owner.get(&event.collider2())?;
        let (object, shadow) = match (a.kind, b.kind) {
            (BodyKind::Dynamic, BodyKind::Kinematic) => (a, b),
            (BodyKind::Kinematic, BodyKind::Dynamic) => (b, a),
            _ => {
                tracing::trace!(a = %a.name, b = %b.name, "ignoring contact");
                return None;
            }
        };
        let phase = if event.started() {
            ContactPhase::Started
        } else {
            ContactPhase::Stopped
        };
        Some(CollisionReport {
            object: object.name.clone(),
            shadow: shadow.name.clone(),
            phase,
        })
    }

    /// Current stepping state.
    pub fn state(&self) -> WorldState {
        self.state
    }

    /// Pose of a body.
    pub fn pose(&self, handle: RigidBodyHandle) -> Option<Isometry3<f32>> {
        self.bodies.get(handle).map(|b| *b.position())
    }

    /// Handle of a named body.
    pub fn handle(&self, name: &str) -> Result<RigidBodyHandle> {
        self.name_to_body
            .get(name)
            .copied()
            .ok_or_else(|| PhysicsError::MissingBody(name.to_string()))
    }

    /// Kind of a body.
    pub fn body_kind(&self, handle: RigidBodyHandle) -> Option<BodyKind> {
        let body = self.bodies.get(handle)?;
        Some(if body.is_dynamic() {
            BodyKind::Dynamic
        } else if body.is_kinematic() {
            BodyKind::Kinematic
        } else {
            BodyKind::Static
        })
    }

    /// Teleport a kinematic body. Current and next positions both change, so
    /// the following step leaves it exactly where it was put.
    pub fn set_kinematic_pose(&mut self, handle: RigidBodyHandle, pose: Isometry3<f32>) -> Result<()> {
        let body = self
            .bodies
            .get_mut(handle)
            .ok_or_else(|| PhysicsError::MissingBody(format!("{handle:?}")))?;
        if !body.is_kinematic() {
            return Err(PhysicsError::InvalidBody {
                name: format!("{handle:?}"),
                reason: "not kinematic".to_string(),
            });
        }
        body.set_position(pose, true);
        Ok(())
    }

    /// Number of bodies, ground included.
    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }
}

fn invalid(name: &str, reason: &str) -> PhysicsError {
    PhysicsError::InvalidBody {
        name: name.to_string(),
        reason: reason.to_string(),
    }
}
