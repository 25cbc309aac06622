//! Joint arena and chain construction.
//!
//! Joints live in a flat arena addressed by [`JointId`]. Each joint stores
//! only its parent's index, and a parent always precedes its children, so a
//! single forward pass over the arena visits the chain root to leaf.

use nalgebra::{Isometry3, Translation3, Unit, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

use crate::angles::JointName;
use crate::error::ChainError;
use crate::gripper::{Finger, Gripper, GripperState};

/// Stable index of a joint in an [`ArmChain`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JointId(pub usize);

/// Position of a joint in the hierarchy, fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JointRole {
    /// The single joint without a parent.
    Root,
    /// Every other joint.
    Intermediate,
}

/// Rotation axis of a joint, in the joint's own frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    /// Up (+Y).
    Vertical,
    /// Depth (+Z).
    Lateral,
}

impl Axis {
    /// Unit vector for this axis.
    pub fn unit(self) -> Unit<Vector3<f32>> {
        match self {
            Axis::Vertical => Vector3::y_axis(),
            Axis::Lateral => Vector3::z_axis(),
        }
    }
}

/// Box geometry attached to a joint. Visual only, it has no transform of
/// its own.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    /// Full extents `[width, length, depth]`.
    pub extents: Vector3<f32>,
    /// Offset of the box centre along the joint's +Y axis.
    pub center: f32,
}

impl Segment {
    /// Segment that starts at its joint and runs `length` along +Y.
    pub fn along_y(width: f32, length: f32, depth: f32) -> Self {
        Self {
            extents: Vector3::new(width, length, depth),
            center: length / 2.0,
        }
    }

    /// Box centred on its joint.
    pub fn centered(extents: Vector3<f32>) -> Self {
        Self { extents, center: 0.0 }
    }

    /// Length along the primary axis.
    pub fn length(&self) -> f32 {
        self.extents.y
    }

    /// Half extents, as physics shapes expect them.
    pub fn half_extents(&self) -> Vector3<f32> {
        self.extents / 2.0
    }

    /// Box centre relative to the joint.
    pub fn center_offset(&self) -> Isometry3<f32> {
        Isometry3::translation(0.0, self.center, 0.0)
    }
}

/// Mapping from an [`AngleSnapshot`](crate::AngleSnapshot) field to a joint angle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Drive {
    /// Field that feeds this joint.
    pub source: JointName,
    /// `1.0` or `-1.0`.
    pub sign: f32,
    /// Fixed offset added after the sign, in degrees.
    pub offset_deg: f32,
}

impl Drive {
    /// Input passes through unchanged.
    pub fn direct(source: JointName) -> Self {
        Self {
            source,
            sign: 1.0,
            offset_deg: 0.0,
        }
    }

    /// Input is negated.
    pub fn inverted(source: JointName) -> Self {
        Self {
            sign: -1.0,
            ..Self::direct(source)
        }
    }

    /// Input plus a fixed offset.
    pub fn offset(source: JointName, offset_deg: f32) -> Self {
        Self {
            offset_deg,
            ..Self::direct(source)
        }
    }

    /// Joint angle in degrees for a raw input.
    pub fn resolve(&self, input_deg: f64) -> f32 {
        self.sign * input_deg as f32 + self.offset_deg
    }
}

/// A pivot in the chain.
#[derive(Debug, Clone, PartialEq)]
pub struct Joint {
    /// Unique name.
    pub name: String,
    /// Parent joint, `None` only for the root.
    pub parent: Option<JointId>,
    /// Root or intermediate.
    pub role: JointRole,
    /// Distance along the parent's +Y axis.
    pub offset: f32,
    /// Rotation axis.
    pub axis: Axis,
    /// Where the angle comes from, if anywhere.
    pub drive: Option<Drive>,
    /// Attached geometry.
    pub segment: Option<Segment>,
    angle: f32,
    rest: Isometry3<f32>,
    local: Isometry3<f32>,
    global: Isometry3<f32>,
}

impl Joint {
    fn new(
        name: &str,
        parent: Option<JointId>,
        role: JointRole,
        rest: Isometry3<f32>,
        offset: f32,
        axis: Axis,
        segment: Option<Segment>,
    ) -> Self {
        Self {
            name: name.to_string(),
            parent,
            role,
            offset,
            axis,
            drive: None,
            segment,
            angle: 0.0,
            rest,
            local: rest,
            global: rest,
        }
    }

    /// Current angle in degrees.
    pub fn angle(&self) -> f32 {
        self.angle
    }

    /// Rotate to `degrees` about the joint axis. Only the local transform
    /// changes; call [`ArmChain::update_globals`] afterwards.
    pub fn set_angle(&mut self, degrees: f32) {
        self.angle = degrees;
        let rotation = UnitQuaternion::from_axis_angle(&self.axis.unit(), degrees.to_radians());
        self.local = self.rest * rotation;
    }

    /// Pose relative to the parent (or to the world for the root).
    pub fn local_transform(&self) -> &Isometry3<f32> {
        &self.local
    }

    /// Composed pose in world space.
    pub fn global_transform(&self) -> &Isometry3<f32> {
        &self.global
    }
}

/// Rotation + translation, flattened for the scene graph.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    /// `[x, y, z]`.
    pub translation: [f32; 3],
    /// `[w, i, j, k]`.
    pub rotation: [f32; 4],
}

impl From<&Isometry3<f32>> for Pose {
    fn from(iso: &Isometry3<f32>) -> Self {
        let t = iso.translation.vector;
        let q = iso.rotation;
        Self {
            translation: [t.x, t.y, t.z],
            rotation: [q.w, q.i, q.j, q.k],
        }
    }
}

/// Local transform of one joint, as handed to the renderer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JointPose {
    /// Joint name.
    pub name: String,
    /// Parent name, if any.
    pub parent: Option<String>,
    /// Pose relative to the parent.
    pub local: Pose,
}

/// Ordered joints from root to end-effector.
///
/// Topology is fixed once built; only angles and gripper openness change.
#[derive(Debug, Clone)]
pub struct ArmChain {
    joints: Vec<Joint>,
    gripper: Option<Gripper>,
}

impl ArmChain {
    /// The root joint.
    pub fn root(&self) -> JointId {
        JointId(0)
    }

    /// Joints in traversal order.
    pub fn joints(&self) -> &[Joint] {
        &self.joints
    }

    /// Number of joints, including the gripper frame.
    pub fn len(&self) -> usize {
        self.joints.len()
    }

    /// True when the chain has no joints.
    pub fn is_empty(&self) -> bool {
        self.joints.is_empty()
    }

    /// Look up a joint.
    pub fn joint(&self, id: JointId) -> Option<&Joint> {
        self.joints.get(id.0)
    }

    pub(crate) fn joints_mut(&mut self) -> &mut [Joint] {
        &mut self.joints
    }

    /// Look up a joint id by name.
    pub fn find(&self, name: &str) -> Result<JointId, ChainError> {
        self.joints
            .iter()
            .position(|j| j.name == name)
            .map(JointId)
            .ok_or_else(|| ChainError::JointNotFound(name.to_string()))
    }

    /// Gripper, if one was built.
    pub fn gripper(&self) -> Option<&Gripper> {
        self.gripper.as_ref()
    }

    pub(crate) fn gripper_mut(&mut self) -> Option<&mut Gripper> {
        self.gripper.as_mut()
    }

    /// Recompose every global transform from the local ones.
    pub fn update_globals(&mut self) {
        for i in 0..self.joints.len() {
            let global = match self.joints[i].parent {
                Some(parent) => self.joints[parent.0].global * self.joints[i].local,
                None => self.joints[i].local,
            };
            self.joints[i].global = global;
        }
    }

    /// World pose of a finger centre.
    pub fn finger_global(&self, finger: Finger) -> Option<Isometry3<f32>> {
        let gripper = self.gripper.as_ref()?;
        let frame = self.joint(gripper.frame)?;
        Some(frame.global * gripper.finger_local(finger))
    }

    /// World pose of the end-effector frame.
    pub fn end_effector(&self) -> Option<&Isometry3<f32>> {
        match &self.gripper {
            Some(g) => self.joint(g.frame).map(Joint::global_transform),
            None => self.joints.last().map(Joint::global_transform),
        }
    }

    /// Per-joint local transforms for the scene graph.
    pub fn local_transforms(&self) -> Vec<JointPose> {
        self.joints
            .iter()
            .map(|j| JointPose {
                name: j.name.clone(),
                parent: j.parent.map(|p| self.joints[p.0].name.clone()),
                local: Pose::from(&j.local),
            })
            .collect()
    }
}

/// Builds an [`ArmChain`] one joint at a time.
#[derive(Debug, Clone)]
pub struct ChainBuilder {
    joints: Vec<Joint>,
    gripper: Option<Gripper>,
}

impl ChainBuilder {
    /// Start a chain whose root is a box of `extents` centred at `mount`.
    pub fn new(name: &str, extents: Vector3<f32>, mount: Isometry3<f32>, axis: Axis) -> Self {
        let root = Joint::new(
            name,
            None,
            JointRole::Root,
            mount,
            0.0,
            axis,
            Some(Segment::centered(extents)),
        );
        Self {
            joints: vec![root],
            gripper: None,
        }
    }

    /// The root joint.
    pub fn root(&self) -> JointId {
        JointId(0)
    }

    /// Append a joint under `parent`.
    ///
    /// On the root, the joint sits atop the base box: its offset is half the
    /// root height plus half the new segment length. Elsewhere it sits at the
    /// end of the previous segment. Zero-length segments are allowed.
    pub fn build_joint(
        &mut self,
        parent: JointId,
        name: &str,
        previous_segment_length: f32,
        segment_length: f32,
        axis: Axis,
    ) -> Result<JointId, ChainError> {
        check_length(name, previous_segment_length)?;
        check_length(name, segment_length)?;
        self.check_name(name)?;
        let parent_joint = self
            .joints
            .get(parent.0)
            .ok_or(ChainError::ParentNotFound(parent.0))?;

        let on_root = parent_joint.role == JointRole::Root;
        let offset = if on_root {
            let root_height = parent_joint.segment.map(|s| s.length()).unwrap_or(0.0);
            root_height / 2.0 + segment_length / 2.0
        } else {
            previous_segment_length
        };
        let depth = if on_root { 0.5 } else { 0.25 };
        let segment = Segment::along_y(0.25, segment_length, depth);

        Ok(self.push(name, parent, offset, axis, Some(segment)))
    }

    /// Set how a joint's angle is driven.
    pub fn set_drive(&mut self, id: JointId, drive: Drive) -> Result<(), ChainError> {
        let joint = self
            .joints
            .get_mut(id.0)
            .ok_or_else(|| ChainError::JointNotFound(format!("#{}", id.0)))?;
        joint.drive = Some(drive);
        Ok(())
    }

    /// Append the gripper frame at the end of `parent`'s segment.
    ///
    /// The frame carries no segment; the fingers hang off it at a fixed
    /// forward offset and start closed.
    pub fn build_gripper(
        &mut self,
        parent: JointId,
        previous_segment_length: f32,
    ) -> Result<GripperState, ChainError> {
        if self.gripper.is_some() {
            return Err(ChainError::GripperExists);
        }
        check_length("gripper", previous_segment_length)?;
        self.check_name("gripper")?;
        if parent.0 >= self.joints.len() {
            return Err(ChainError::ParentNotFound(parent.0));
        }

        let frame = self.push("gripper", parent, previous_segment_length, Axis::Vertical, None);
        let state = GripperState::closed();
        self.gripper = Some(Gripper { frame, state });
        Ok(state)
    }

    /// Freeze the topology and compose the rest pose.
    pub fn finish(self) -> ArmChain {
        let mut chain = ArmChain {
            joints: self.joints,
            gripper: self.gripper,
        };
        chain.update_globals();
        tracing::debug!(joints = chain.len(), "built arm chain");
        chain
    }

    fn push(
        &mut self,
        name: &str,
        parent: JointId,
        offset: f32,
        axis: Axis,
        segment: Option<Segment>,
    ) -> JointId {
        let rest = Isometry3::from_parts(Translation3::new(0.0, offset, 0.0), UnitQuaternion::identity());
        self.joints.push(Joint::new(
            name,
            Some(parent),
            JointRole::Intermediate,
            rest,
            offset,
            axis,
            segment,
        ));
        JointId(self.joints.len() - 1)
    }

    fn check_name(&self, name: &str) -> Result<(), ChainError> {
        if self.joints.iter().any(|j| j.name == name) {
            return Err(ChainError::DuplicateJoint(name.to_string()));
        }
        Ok(())
    }
}

fn check_length(name: &str, value: f32) -> Result<(), ChainError> {
    if !value.is_finite() || value < 0.0 {
        return Err(ChainError::InvalidLength {
            name: name.to_string(),
            value,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_builder() -> ChainBuilder {
        ChainBuilder::new(
            "base",
            Vector3::new(1.4, 1.0, 1.4),
            Isometry3::identity(),
            Axis::Vertical,
        )
    }

    #[test]
    fn test_first_joint_sits_on_base() {
        let mut b = base_builder();
        let root = b.root();
        let shoulder = b.build_joint(root, "shoulder", 0.0, 3.0, Axis::Lateral).unwrap();
        let chain = b.finish();

        let joint = chain.joint(shoulder).unwrap();
        assert_eq!(joint.offset, 0.5 + 1.5);
        assert_eq!(joint.role, JointRole::Intermediate);
        assert_eq!(joint.segment.unwrap().extents.z, 0.5);
        assert_eq!(chain.joint(root).unwrap().role, JointRole::Root);
    }

    #[test]
    fn test_later_joints_at_segment_end() {
        let mut b = base_builder();
        let root = b.root();
        let a = b.build_joint(root, "a", 0.0, 3.0, Axis::Lateral).unwrap();
        let c = b.build_joint(a, "c", 3.0, 2.0, Axis::Lateral).unwrap();
        let chain = b.finish();

        let joint = chain.joint(c).unwrap();
        assert_eq!(joint.offset, 3.0);
        assert_eq!(joint.segment.unwrap().extents.z, 0.25);
        let y = chain.joint(c).unwrap().global_transform().translation.vector.y;
        assert!((y - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_zero_length_collocates() {
        let mut b = base_builder();
        let root = b.root();
        let a = b.build_joint(root, "a", 0.0, 3.0, Axis::Lateral).unwrap();
        let w = b.build_joint(a, "w", 3.0, 0.0, Axis::Vertical).unwrap();
        let w2 = b.build_joint(w, "w2", 0.0, 1.0, Axis::Lateral).unwrap();
        let chain = b.finish();

        let pw = chain.joint(w).unwrap().global_transform().translation.vector;
        let pw2 = chain.joint(w2).unwrap().global_transform().translation.vector;
        assert_eq!(pw, pw2);
    }

    #[test]
    fn test_missing_parent_rejected() {
        let mut b = base_builder();
        let err = b.build_joint(JointId(7), "x", 0.0, 1.0, Axis::Lateral).unwrap_err();
        assert_eq!(err, ChainError::ParentNotFound(7));
    }

    #[test]
    fn test_set_drive_unknown_joint() {
        let mut b = base_builder();
        let root = b.root();
        let elbow = b.build_joint(root, "elbow", 0.0, 1.0, Axis::Lateral).unwrap();
        b.set_drive(elbow, Drive::direct(JointName::Elbow)).unwrap();

        let err = b.set_drive(JointId(9), Drive::direct(JointName::Elbow)).unwrap_err();
        assert_eq!(err, ChainError::JointNotFound("#9".to_string()));

        let chain = b.finish();
        assert_eq!(chain.joint(elbow).unwrap().drive, Some(Drive::direct(JointName::Elbow)));
    }

    #[test]
    fn test_duplicate_and_bad_length_rejected() {
        let mut b = base_builder();
        let root = b.root();
        b.build_joint(root, "a", 0.0, 1.0, Axis::Lateral).unwrap();
        assert!(matches!(
            b.build_joint(root, "a", 0.0, 1.0, Axis::Lateral),
            Err(ChainError::DuplicateJoint(_))
        ));
        assert!(matches!(
            b.build_joint(root, "b", 0.0, -1.0, Axis::Lateral),
            Err(ChainError::InvalidLength { .. })
        ));
    }

    #[test]
    fn test_gripper_frame_has_no_segment() {
        let mut b = base_builder();
        let root = b.root();
        let a = b.build_joint(root, "a", 0.0, 2.0, Axis::Lateral).unwrap();
        let state = b.build_gripper(a, 2.0).unwrap();
        assert_eq!(state, GripperState::closed());
        assert_eq!(b.build_gripper(a, 2.0), Err(ChainError::GripperExists));

        let chain = b.finish();
        let gripper = chain.gripper().unwrap();
        let frame = chain.joint(gripper.frame).unwrap();
        assert!(frame.segment.is_none());
        assert_eq!(frame.offset, 2.0);
    }

    #[test]
    fn test_parents_precede_children() {
        let mut b = base_builder();
        let root = b.root();
        let a = b.build_joint(root, "a", 0.0, 1.0, Axis::Lateral).unwrap();
        b.build_joint(a, "b", 1.0, 1.0, Axis::Lateral).unwrap();
        let chain = b.finish();
        for (i, joint) in chain.joints().iter().enumerate() {
            if let Some(parent) = joint.parent {
                assert!(parent.0 < i);
            }
        }
    }

    #[test]
    fn test_drive_resolve() {
        assert_eq!(Drive::offset(JointName::Base, 90.0).resolve(90.0), 180.0);
        assert_eq!(Drive::inverted(JointName::Wrist2).resolve(30.0), -30.0);
        assert_eq!(Drive::direct(JointName::Elbow).resolve(12.5), 12.5);
    }
}
