//! Collision event collection for a single step.

use std::sync::Mutex;

use rapier3d::dynamics::RigidBodySet;
use rapier3d::geometry::{ColliderSet, CollisionEvent, ContactPair};
use rapier3d::math::Real;
use rapier3d::pipeline::EventHandler;
use serde::{Deserialize, Serialize};

/// Whether a contact began or ended during the step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContactPhase {
    /// Colliders started touching.
    Started,
    /// Colliders separated (or one was removed).
    Stopped,
}

/// Contact between a dynamic object and an arm shadow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollisionReport {
    /// Dynamic object name.
    pub object: String,
    /// Shadow body name.
    pub shadow: String,
    /// Began or ended.
    pub phase: ContactPhase,
}

/// Buffers raw collision events emitted during one pipeline step.
#[derive(Debug, Default)]
pub(crate) struct CollisionCollector {
    events: Mutex<Vec<CollisionEvent>>,
}

impl CollisionCollector {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Take every buffered event.
    pub(crate) fn drain(&self) -> Vec<CollisionEvent> {
        let mut events = self.events.lock().unwrap_or_else(|p| p.into_inner());
        std::mem::take(&mut *events)
    }
}

impl EventHandler for CollisionCollector {
    fn handle_collision_event(
        &self,
        _bodies: &RigidBodySet,
        _colliders: &ColliderSet,
        event: CollisionEvent,
        _contact_pair: Option<&ContactPair>,
    ) {
        let mut events = self.events.lock().unwrap_or_else(|p| p.into_inner());
        events.push(event);
    }

    fn handle_contact_force_event(
        &self,
        _dt: Real,
        _bodies: &RigidBodySet,
        _colliders: &ColliderSet,
        _contact_pair: &ContactPair,
        _total_force_magnitude: Real,
    ) {
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rapier3d::geometry::{ColliderHandle, CollisionEventFlags};

    #[test]
    fn test_drain_empties_buffer() {
        let collector = CollisionCollector::new();
        let event = CollisionEvent::Started(
            ColliderHandle::from_raw_parts(0, 0),
            ColliderHandle::from_raw_parts(1, 0),
            CollisionEventFlags::empty(),
        );
        collector.handle_collision_event(
            &RigidBodySet::new(),
            &ColliderSet::new(),
            event,
            None,
        );
        assert_eq!(collector.drain(), vec![event]);
        assert!(collector.drain().is_empty());
    }
}
