//! Two-finger gripper geometry and actuation.

use nalgebra::{Isometry3, Vector3};
use serde::{Deserialize, Serialize};

use crate::chain::JointId;

/// Finger thickness along the spread axis (scene units).
pub const FINGER_THICKNESS: f32 = 0.125;
/// Half of [`FINGER_THICKNESS`].
pub const FINGER_HALF_THICKNESS: f32 = FINGER_THICKNESS / 2.0;
/// Finger extent along the gripper's forward (+Y) axis.
pub const FINGER_HEIGHT: f32 = 0.25;
/// Finger extent along depth (+Z).
pub const FINGER_DEPTH: f32 = 0.25;
/// Distance from the gripper frame to the finger centres along +Y.
pub const FINGER_FORWARD_OFFSET: f32 = FINGER_HEIGHT / 2.0;
/// Fully open, in degrees.
pub const MAX_OPENNESS: f32 = 90.0;

/// Degrees of openness per unit of finger travel on each side.
const OPENNESS_PER_UNIT: f32 = 720.0;

/// One of the two fingers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Finger {
    /// Finger on the +X side of the frame.
    Left,
    /// Finger on the -X side of the frame.
    Right,
}

impl Finger {
    /// Both fingers.
    pub const BOTH: [Finger; 2] = [Finger::Left, Finger::Right];

    fn index(self) -> usize {
        match self {
            Finger::Left => 0,
            Finger::Right => 1,
        }
    }

    /// Name used for the finger's shadow body.
    pub fn label(self) -> &'static str {
        match self {
            Finger::Left => "finger_left",
            Finger::Right => "finger_right",
        }
    }
}

/// Openness and the derived finger offsets along the spread (X) axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GripperState {
    openness: f32,
    offsets: [f32; 2],
}

impl Default for GripperState {
    fn default() -> Self {
        Self::closed()
    }
}

impl GripperState {
    /// Fingers touching.
    pub fn closed() -> Self {
        let mut state = Self {
            openness: 0.0,
            offsets: [0.0; 2],
        };
        set_openness(&mut state, 0.0);
        state
    }

    /// Current openness in degrees.
    pub fn openness(&self) -> f32 {
        self.openness
    }

    /// Signed X offset of a finger centre.
    pub fn finger_offset(&self, finger: Finger) -> f32 {
        self.offsets[finger.index()]
    }

    /// `[left, right]` offsets.
    pub fn finger_offsets(&self) -> [f32; 2] {
        self.offsets
    }

    /// Centre-to-centre distance between the fingers.
    pub fn separation(&self) -> f32 {
        self.offsets[0] - self.offsets[1]
    }
}

/// Set gripper openness.
///
/// Input is clamped to `[0, 90]` (non-finite input counts as 0). Each finger
/// sits at `±(half_thickness + degrees / 720)`, so at 0 the fingers touch
/// and at 90 they are a quarter unit further apart. Nothing accumulates:
/// the result depends only on the input.
pub fn set_openness(state: &mut GripperState, angle_degrees: f32) {
    let openness = if angle_degrees.is_finite() {
        angle_degrees.clamp(0.0, MAX_OPENNESS)
    } else {
        0.0
    };
    let spread = FINGER_HALF_THICKNESS + openness / OPENNESS_PER_UNIT;
    state.openness = openness;
    state.offsets = [spread, -spread];
}

/// Gripper attached to the end of the chain.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Gripper {
    /// Frame joint the fingers hang off. It carries no segment.
    pub frame: JointId,
    /// Actuation state.
    pub state: GripperState,
}

impl Gripper {
    /// Full box extents of one finger.
    pub fn finger_extents() -> Vector3<f32> {
        Vector3::new(FINGER_THICKNESS, FINGER_HEIGHT, FINGER_DEPTH)
    }

    /// Finger pose relative to the gripper frame.
    pub fn finger_local(&self, finger: Finger) -> Isometry3<f32> {
        Isometry3::translation(self.state.finger_offset(finger), FINGER_FORWARD_OFFSET, 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closed_fingers_touch() {
        let state = GripperState::closed();
        assert_eq!(state.separation(), 2.0 * FINGER_HALF_THICKNESS);
        assert_eq!(state.separation(), FINGER_THICKNESS);
    }

    #[test]
    fn test_half_open_offsets() {
        let mut state = GripperState::closed();
        set_openness(&mut state, 45.0);
        let expected = FINGER_HALF_THICKNESS + 45.0 / 720.0;
        assert_eq!(state.finger_offsets(), [expected, -expected]);
    }

    #[test]
    fn test_fully_open_separation() {
        let mut state = GripperState::closed();
        set_openness(&mut state, 90.0);
        assert_eq!(state.separation(), 2.0 * FINGER_HALF_THICKNESS + 90.0 / 360.0);
    }

    #[test]
    fn test_clamped_and_idempotent() {
        let mut state = GripperState::closed();
        set_openness(&mut state, 200.0);
        assert_eq!(state.openness(), 90.0);
        let once = state;
        set_openness(&mut state, 200.0);
        assert_eq!(state, once);

        set_openness(&mut state, -10.0);
        assert_eq!(state, GripperState::closed());
        set_openness(&mut state, f32::NAN);
        assert_eq!(state, GripperState::closed());
    }

    #[test]
    fn test_separation_monotonic() {
        let mut state = GripperState::closed();
        let mut last = state.separation();
        for step in 0..=90 {
            set_openness(&mut state, step as f32);
            assert!(state.separation() >= last);
            last = state.separation();
        }
    }

    #[test]
    fn test_finger_local_pose() {
        let mut gripper = Gripper {
            frame: JointId(0),
            state: GripperState::closed(),
        };
        set_openness(&mut gripper.state, 90.0);
        let left = gripper.finger_local(Finger::Left).translation.vector;
        let right = gripper.finger_local(Finger::Right).translation.vector;
        assert_eq!(left.y, FINGER_FORWARD_OFFSET);
        assert_eq!(left.x, -right.x);
    }
}
