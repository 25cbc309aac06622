//! Collision shape generation from segment boxes.

use nalgebra::Vector3;
use parry3d::shape::SharedShape;

use crate::error::PhysicsError;

/// Smallest half extent handed to the physics engine.
///
/// Zero-length segments (the stock wrist twist link) still need a valid
/// cuboid.
pub const MIN_HALF_EXTENT: f32 = 1e-3;

/// Clamp every component of `half_extents` to [`MIN_HALF_EXTENT`].
pub fn clamp_half_extents(half_extents: Vector3<f32>) -> Vector3<f32> {
    half_extents.map(|v| v.max(MIN_HALF_EXTENT))
}

/// Generate a cuboid shape for a box with the given half extents.
///
/// # Arguments
///
/// * `half_extents` - Half extents in scene units
/// * `name` - Name for error messages
pub fn box_to_collider(half_extents: Vector3<f32>, name: &str) -> Result<SharedShape, PhysicsError> {
    if half_extents.iter().any(|v| !v.is_finite()) {
        return Err(PhysicsError::InvalidBody {
            name: name.to_string(),
            reason: "non-finite half extent".to_string(),
        });
    }
    let h = clamp_half_extents(half_extents);
    Ok(SharedShape::cuboid(h.x, h.y, h.z))
}

#[cfg(test)]
mod tests {
    use super::*;
    use deskarm_kinematics::Segment;

    #[test]
    fn test_box_collider() {
        let shape = box_to_collider(Vector3::new(0.5, 1.0, 0.25), "test").unwrap();
        let cuboid = shape.as_cuboid().unwrap();
        assert_eq!(cuboid.half_extents, Vector3::new(0.5, 1.0, 0.25));
    }

    #[test]
    fn test_zero_length_clamped() {
        let segment = Segment::along_y(0.25, 0.0, 0.25);
        let shape = box_to_collider(segment.half_extents(), "wrist").unwrap();
        let cuboid = shape.as_cuboid().unwrap();
        assert_eq!(cuboid.half_extents.y, MIN_HALF_EXTENT);
        assert_eq!(cuboid.half_extents.x, 0.125);
    }

    #[test]
    fn test_nan_rejected() {
        assert!(box_to_collider(Vector3::new(f32::NAN, 1.0, 1.0), "bad").is_err());
    }
}
