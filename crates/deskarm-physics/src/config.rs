//! Scene configuration loaded from TOML.

use std::collections::HashSet;
use std::path::Path;

use deskarm_kinematics::ArmDimensions;
use nalgebra::{Isometry3, Vector3};
use serde::{Deserialize, Serialize};

use crate::error::{PhysicsError, Result};
use crate::materials::{ContactMaterial, ContactMaterialTable, SurfaceMaterial};
use crate::objects::ObjectConfig;
use crate::stepper::FIXED_DT;

/// Largest accepted timestep, in seconds.
pub const MAX_DT: f32 = 1.0;

/// World, table and object settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    /// Gravity in scene units per second squared.
    pub gravity: [f32; 3],
    /// Fixed timestep in seconds.
    pub dt: f32,
    /// Table width (m).
    pub table_width: f32,
    /// Table thickness (units).
    pub table_thickness: f32,
    /// Table depth (m).
    pub table_depth: f32,
    /// Height of the ground plane (units).
    pub ground_height: f32,
    /// Per-pair contact coefficients.
    pub contact_pairs: Vec<ContactMaterial>,
    /// Objects spawned at startup.
    pub objects: Vec<ObjectConfig>,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            gravity: [0.0, -9.82, 0.0],
            dt: FIXED_DT,
            table_width: 0.762,
            table_thickness: 0.5,
            table_depth: 1.4986,
            ground_height: 0.25,
            contact_pairs: vec![
                ContactMaterial {
                    a: SurfaceMaterial::Object,
                    b: SurfaceMaterial::Robot,
                    friction: 0.3,
                    restitution: 0.1,
                },
                ContactMaterial {
                    a: SurfaceMaterial::Object,
                    b: SurfaceMaterial::Ground,
                    friction: 0.3,
                    restitution: 0.1,
                },
            ],
            objects: vec![ObjectConfig::default()],
        }
    }
}

impl SceneConfig {
    /// Reject settings the world cannot be built from.
    pub fn validate(&self) -> Result<()> {
        if !(self.dt.is_finite() && self.dt > 0.0) {
            return Err(PhysicsError::InvalidConfig(format!("dt must be positive, got {}", self.dt)));
        }
        if self.dt > MAX_DT {
            return Err(PhysicsError::InvalidConfig(format!(
                "dt must be at most {MAX_DT}, got {}",
                self.dt
            )));
        }
        if self.gravity.iter().any(|g| !g.is_finite()) {
            return Err(PhysicsError::InvalidConfig("gravity must be finite".to_string()));
        }
        let mut names = HashSet::new();
        for object in &self.objects {
            if !names.insert(object.name.as_str()) {
                return Err(PhysicsError::InvalidConfig(format!(
                    "duplicate object name {}",
                    object.name
                )));
            }
            if !(object.mass.is_finite() && object.mass > 0.0) {
                return Err(PhysicsError::InvalidConfig(format!(
                    "object {} needs a positive mass",
                    object.name
                )));
            }
            if object.size.iter().any(|s| !(s.is_finite() && *s > 0.0)) {
                return Err(PhysicsError::InvalidConfig(format!(
                    "object {} needs a positive size",
                    object.name
                )));
            }
        }
        Ok(())
    }

    /// Gravity as a vector.
    pub fn gravity(&self) -> Vector3<f32> {
        Vector3::from(self.gravity)
    }

    /// Contact pairings as a lookup table.
    pub fn contact_table(&self) -> ContactMaterialTable {
        let mut table = ContactMaterialTable::default();
        for pair in &self.contact_pairs {
            table.insert(*pair);
        }
        table
    }

    /// Base box centre: resting on the table, tucked into its back-left
    /// corner.
    pub fn base_mount(&self, dims: &ArmDimensions) -> Isometry3<f32> {
        let base = dims.base_extents();
        let table_width = dims.to_units(self.table_width);
        let table_depth = dims.to_units(self.table_depth);
        Isometry3::translation(
            -table_width / 2.0 + base.x / 2.0,
            self.table_thickness / 2.0 + base.y / 2.0,
            -table_depth / 2.0 + base.z / 2.0,
        )
    }
}

/// Everything the simulation needs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Link lengths and scale.
    pub arm: ArmDimensions,
    /// World and objects.
    pub scene: SceneConfig,
}

impl SimConfig {
    /// Parse and validate a TOML document. Missing keys take defaults.
    pub fn from_toml_str(input: &str) -> Result<Self> {
        let config: Self = toml::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        tracing::info!(path = %path.as_ref().display(), "loaded configuration");
        Self::from_toml_str(&text)
    }

    /// Validate both sections.
    pub fn validate(&self) -> Result<()> {
        let units = self.arm.units_per_meter;
        if !(units.is_finite() && units > 0.0) {
            return Err(PhysicsError::InvalidConfig(format!(
                "units_per_meter must be positive, got {units}"
            )));
        }
        self.scene.validate()
    }
}
