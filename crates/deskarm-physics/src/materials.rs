//! Surface materials and per-pair contact coefficients.
//!
//! Rapier only combines per-collider coefficients, so pair-specific
//! friction/restitution is applied through a physics hook that rewrites the
//! solver contacts of every matching pair.

use rapier3d::pipeline::{ContactModificationContext, PhysicsHooks};
use serde::{Deserialize, Serialize};

/// Surface a collider is made of. Stored in the collider's user data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SurfaceMaterial {
    /// Arm shadows and the base.
    Robot,
    /// Table top.
    Ground,
    /// Free objects.
    Object,
}

impl SurfaceMaterial {
    /// Friction used when no pair is configured.
    pub fn friction(self) -> f32 {
        0.5
    }

    /// Restitution used when no pair is configured.
    pub fn restitution(self) -> f32 {
        0.1
    }

    pub(crate) fn to_user_data(self) -> u128 {
        match self {
            SurfaceMaterial::Robot => 1,
            SurfaceMaterial::Ground => 2,
            SurfaceMaterial::Object => 3,
        }
    }

    pub(crate) fn from_user_data(data: u128) -> Option<Self> {
        match data {
            1 => Some(SurfaceMaterial::Robot),
            2 => Some(SurfaceMaterial::Ground),
            3 => Some(SurfaceMaterial::Object),
            _ => None,
        }
    }
}

/// Coefficients for contacts between two materials (order-insensitive).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ContactMaterial {
    /// One side.
    pub a: SurfaceMaterial,
    /// Other side.
    pub b: SurfaceMaterial,
    /// Friction coefficient.
    pub friction: f32,
    /// Restitution coefficient.
    pub restitution: f32,
}

impl ContactMaterial {
    fn matches(&self, a: SurfaceMaterial, b: SurfaceMaterial) -> bool {
        (self.a == a && self.b == b) || (self.a == b && self.b == a)
    }
}

/// Registered contact-material pairings.
#[derive(Debug, Clone, Default)]
pub struct ContactMaterialTable {
    pairs: Vec<ContactMaterial>,
}

impl ContactMaterialTable {
    /// Add or replace a pairing.
    pub fn insert(&mut self, pair: ContactMaterial) {
        self.pairs.retain(|p| !p.matches(pair.a, pair.b));
        self.pairs.push(pair);
    }

    /// Pairing for two materials, if configured.
    pub fn lookup(&self, a: SurfaceMaterial, b: SurfaceMaterial) -> Option<&ContactMaterial> {
        self.pairs.iter().rev().find(|p| p.matches(a, b))
    }

    /// Number of pairings.
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// True when no pairing is configured.
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

impl PhysicsHooks for ContactMaterialTable {
    fn modify_solver_contacts(&self, context: &mut ContactModificationContext) {
        let material = |handle| {
            context
                .colliders
                .get(handle)
                .and_then(|c| SurfaceMaterial::from_user_data(c.user_data))
        };
        let (Some(a), Some(b)) = (material(context.collider1), material(context.collider2)) else {
            return;
        };
        let Some(pair) = self.lookup(a, b) else {
            return;
        };
        for contact in context.solver_contacts.iter_mut() {
            contact.friction = pair.friction;
            contact.restitution = pair.restitution;
        }
    }
}
