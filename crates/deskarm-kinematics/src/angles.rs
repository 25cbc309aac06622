//! Shared per-joint angle state fed by telemetry.
//!
//! Writers store one scalar at a time; the tick loop reads a full
//! [`AngleSnapshot`] once per tick. Each field is an atomic `f64` so no lock
//! is needed: the last write before the read wins.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::AngleError;

/// Controllable joints, in chain order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JointName {
    /// Turntable under the arm.
    Base,
    /// First lateral pivot.
    Shoulder,
    /// Second lateral pivot.
    Elbow,
    /// Wrist twist.
    Wrist,
    /// Wrist pitch.
    Wrist2,
    /// Wrist roll.
    Wrist3,
    /// Gripper openness.
    Hand,
}

impl JointName {
    /// Every joint, base first.
    pub const ALL: [JointName; 7] = [
        JointName::Base,
        JointName::Shoulder,
        JointName::Elbow,
        JointName::Wrist,
        JointName::Wrist2,
        JointName::Wrist3,
        JointName::Hand,
    ];

    /// Wire name used by telemetry.
    pub fn as_str(self) -> &'static str {
        match self {
            JointName::Base => "base",
            JointName::Shoulder => "shoulder",
            JointName::Elbow => "elbow",
            JointName::Wrist => "wrist",
            JointName::Wrist2 => "wrist2",
            JointName::Wrist3 => "wrist3",
            JointName::Hand => "hand",
        }
    }

    /// Accepted range in degrees.
    pub fn range(self) -> (f64, f64) {
        match self {
            JointName::Hand => (0.0, 90.0),
            _ => (-180.0, 180.0),
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for JointName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JointName {
    type Err = AngleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JointName::ALL
            .into_iter()
            .find(|joint| joint.as_str() == s)
            .ok_or_else(|| AngleError::UnknownJoint(s.to_string()))
    }
}

/// Immutable copy of every angle, taken once per tick.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AngleSnapshot {
    /// Base turntable (degrees).
    pub base: f64,
    /// Shoulder (degrees).
    pub shoulder: f64,
    /// Elbow (degrees).
    pub elbow: f64,
    /// Wrist twist (degrees).
    pub wrist: f64,
    /// Wrist pitch (degrees).
    pub wrist2: f64,
    /// Wrist roll (degrees).
    pub wrist3: f64,
    /// Gripper openness (degrees, 0..=90).
    pub hand: f64,
}

impl AngleSnapshot {
    /// Value for one joint.
    pub fn get(&self, joint: JointName) -> f64 {
        match joint {
            JointName::Base => self.base,
            JointName::Shoulder => self.shoulder,
            JointName::Elbow => self.elbow,
            JointName::Wrist => self.wrist,
            JointName::Wrist2 => self.wrist2,
            JointName::Wrist3 => self.wrist3,
            JointName::Hand => self.hand,
        }
    }

    /// Copy with one joint replaced.
    pub fn with(mut self, joint: JointName, degrees: f64) -> Self {
        let slot = match joint {
            JointName::Base => &mut self.base,
            JointName::Shoulder => &mut self.shoulder,
            JointName::Elbow => &mut self.elbow,
            JointName::Wrist => &mut self.wrist,
            JointName::Wrist2 => &mut self.wrist2,
            JointName::Wrist3 => &mut self.wrist3,
            JointName::Hand => &mut self.hand,
        };
        *slot = degrees;
        self
    }
}

/// Latest-value-wins angle store shared between telemetry and the tick loop.
#[derive(Debug, Default)]
pub struct AngleState {
    fields: [AtomicU64; 7],
}

impl AngleState {
    /// All joints at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// New state behind an `Arc`, ready to hand to a telemetry writer.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Store a value, clamped to the joint's range. Non-finite values are dropped.
    pub fn set(&self, joint: JointName, degrees: f64) {
        if !degrees.is_finite() {
            tracing::debug!(%joint, degrees, "dropping non-finite angle");
            return;
        }
        let (lo, hi) = joint.range();
        let value = degrees.clamp(lo, hi);
        self.fields[joint.index()].store(value.to_bits(), Ordering::Relaxed);
    }

    /// Current value of one joint.
    pub fn get(&self, joint: JointName) -> f64 {
        f64::from_bits(self.fields[joint.index()].load(Ordering::Relaxed))
    }

    /// Parse a telemetry `(jointName, angleValue)` pair and store it.
    ///
    /// Returns `Ok(None)` when the joint name is outside the enumeration;
    /// such names are ignored rather than treated as errors.
    pub fn ingest(&self, joint_name: &str, payload: &str) -> Result<Option<JointName>, AngleError> {
        let joint = match joint_name.parse::<JointName>() {
            Ok(joint) => joint,
            Err(_) => return Ok(None),
        };

        let value = payload
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| AngleError::InvalidAngle {
                joint: joint_name.to_string(),
                payload: payload.to_string(),
            })?;

        self.set(joint, value);
        Ok(Some(joint))
    }

    /// Infallible form of [`ingest`](Self::ingest) for telemetry callbacks.
    pub fn receive(&self, joint_name: &str, payload: &str) -> Option<JointName> {
        match self.ingest(joint_name, payload) {
            Ok(Some(joint)) => Some(joint),
            Ok(None) => {
                tracing::trace!(joint_name, "ignoring unrecognized joint");
                None
            }
            Err(e) => {
                tracing::debug!("discarding telemetry: {e}");
                None
            }
        }
    }

    /// Read every field once.
    pub fn snapshot(&self) -> AngleSnapshot {
        AngleSnapshot {
            base: self.get(JointName::Base),
            shoulder: self.get(JointName::Shoulder),
            elbow: self.get(JointName::Elbow),
            wrist: self.get(JointName::Wrist),
            wrist2: self.get(JointName::Wrist2),
            wrist3: self.get(JointName::Wrist3),
            hand: self.get(JointName::Hand),
        }
    }

    /// Overwrite every field from a snapshot.
    pub fn load(&self, snapshot: &AngleSnapshot) {
        for joint in JointName::ALL {
            self.set(joint, snapshot.get(joint));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ingest_numeric() {
        let state = AngleState::new();
        assert_eq!(state.ingest("elbow", "42.5"), Ok(Some(JointName::Elbow)));
        assert_eq!(state.get(JointName::Elbow), 42.5);
        assert_eq!(state.ingest("wrist2", " -17 "), Ok(Some(JointName::Wrist2)));
        assert_eq!(state.get(JointName::Wrist2), -17.0);
    }

    #[test]
    fn test_invalid_payload_leaves_state() {
        let state = AngleState::new();
        state.set(JointName::Elbow, 30.0);

        let err = state.ingest("elbow", "abc").unwrap_err();
        assert!(matches!(err, AngleError::InvalidAngle { .. }));
        assert_eq!(state.get(JointName::Elbow), 30.0);

        // The callback form swallows the error.
        assert_eq!(state.receive("elbow", "abc"), None);
        assert_eq!(state.receive("elbow", "NaN"), None);
        assert_eq!(state.get(JointName::Elbow), 30.0);
    }

    #[test]
    fn test_unknown_joint_ignored() {
        let state = AngleState::new();
        assert_eq!(state.ingest("tail", "10"), Ok(None));
        assert_eq!(state.snapshot(), AngleSnapshot::default());
    }

    #[test]
    fn test_values_clamped_to_range() {
        let state = AngleState::new();
        state.set(JointName::Hand, 120.0);
        assert_eq!(state.get(JointName::Hand), 90.0);
        state.set(JointName::Hand, -5.0);
        assert_eq!(state.get(JointName::Hand), 0.0);
        state.set(JointName::Base, 270.0);
        assert_eq!(state.get(JointName::Base), 180.0);
    }

    #[test]
    fn test_last_write_wins() {
        let state = AngleState::shared();
        let writer = Arc::clone(&state);
        let handle = std::thread::spawn(move || {
            for v in 0..=100 {
                writer.set(JointName::Shoulder, v as f64);
            }
        });
        handle.join().unwrap();
        assert_eq!(state.snapshot().shoulder, 100.0);
    }

    #[test]
    fn test_snapshot_with() {
        let snap = AngleSnapshot::default().with(JointName::Wrist3, 12.0);
        assert_eq!(snap.get(JointName::Wrist3), 12.0);
        assert_eq!(snap.get(JointName::Wrist), 0.0);
    }
}
