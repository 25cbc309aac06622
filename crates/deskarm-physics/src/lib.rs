#![warn(missing_docs)]

//! Physics shadow for the deskarm rig using Rapier3d.
//!
//! The arm itself is purely kinematic: its pose comes from telemetry angles
//! run through forward kinematics. This crate mirrors every segment into a
//! Rapier world as a massless kinematic body so free objects on the table
//! can collide with it.
//!
//! # Features
//!
//! - Kinematic shadow bodies re-posed from the chain every tick
//! - Fixed-timestep stepping with per-step collision reports
//! - Dynamic objects with pair-specific contact materials
//! - TOML scene configuration
//!
//! # Example
//!
//! ```no_run
//! use deskarm_kinematics::{AngleState, JointName};
//! use deskarm_physics::{SimConfig, Simulation};
//!
//! let angles = AngleState::shared();
//! let mut sim = Simulation::new(SimConfig::default(), angles.clone()).unwrap();
//!
//! angles.set(JointName::Shoulder, 30.0);
//! let report = sim.tick().unwrap();
//! for hit in &report.collisions {
//!     println!("{} touched {}", hit.object, hit.shadow);
//! }
//! ```

mod colliders;
mod config;
mod error;
mod events;
mod materials;
mod mirror;
mod objects;
mod sim;
mod stepper;
mod world;

pub use colliders::{box_to_collider, clamp_half_extents, MIN_HALF_EXTENT};
pub use config::{SceneConfig, SimConfig, MAX_DT};
pub use error::{PhysicsError, Result};
pub use events::{CollisionReport, ContactPhase};
pub use materials::{ContactMaterial, ContactMaterialTable, SurfaceMaterial};
pub use mirror::{driver_pose, pose_deviation, KinematicBodyMirror, RigidBodyShadow, ShadowDriver};
pub use objects::{DynamicObject, ObjectConfig};
pub use rapier3d::dynamics::RigidBodyHandle;
pub use sim::{NamedPose, RenderFrame, Simulation, TickReport};
pub use stepper::{PhysicsStepper, DRIFT_TOLERANCE, FIXED_DT};
pub use world::{BodyKind, BodyRequest, PhysicsWorld, WorldState};
