//! Read-only access to body state during a solve pass.
//!
//! The host engine owns every body. For the duration of one constraint
//! pass it hands the joints a snapshot; joints only read from it, so one
//! snapshot can be shared by every thread of a parallel pass.

use hashbrown::HashMap;
use sim_types::{BodyId, Pose, RigidBodyState};
use tracing::warn;

/// Source of body poses and velocities for one solve pass.
pub trait BodyStates {
    /// State of `id`, or `None` if the host does not know the body.
    fn body_state(&self, id: BodyId) -> Option<RigidBodyState>;

    /// State of `id`, treating an unknown body as the static world.
    fn state_or_world(&self, id: BodyId) -> RigidBodyState {
        self.body_state(id).unwrap_or_else(|| {
            warn!(body = %id, "body missing from snapshot, treating it as the static world");
            RigidBodyState::default()
        })
    }

    /// World pose of `id` (identity for unknown bodies).
    fn pose_of(&self, id: BodyId) -> Pose {
        self.state_or_world(id).pose
    }
}

impl BodyStates for HashMap<BodyId, RigidBodyState> {
    fn body_state(&self, id: BodyId) -> Option<RigidBodyState> {
        self.get(&id).copied()
    }
}

impl<B: BodyStates + ?Sized> BodyStates for &B {
    fn body_state(&self, id: BodyId) -> Option<RigidBodyState> {
        (**self).body_state(id)
    }
}

/// An owned snapshot of body states, built up front for a pass.
///
/// # Example
///
/// ```
/// use sim_gear::{BodySnapshot, BodyStates};
/// use sim_types::{BodyId, Pose, RigidBodyState};
/// use nalgebra::Vector3;
///
/// let snapshot = BodySnapshot::new()
///     .with_body(BodyId::new(1), RigidBodyState::at_rest(Pose::identity()))
///     .with_body(
///         BodyId::new(2),
///         RigidBodyState::spinning(Pose::identity(), Vector3::new(0.0, 0.0, 3.0)),
///     );
///
/// assert_eq!(snapshot.len(), 2);
/// assert_eq!(snapshot.state_or_world(BodyId::new(2)).twist.angular.z, 3.0);
/// ```
#[derive(Debug, Clone, Default)]
pub struct BodySnapshot {
    states: HashMap<BodyId, RigidBodyState>,
}

impl BodySnapshot {
    /// Create an empty snapshot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a body.
    #[must_use]
    pub fn with_body(mut self, id: BodyId, state: RigidBodyState) -> Self {
        self.states.insert(id, state);
        self
    }

    /// Add or replace a body in place.
    pub fn insert(&mut self, id: BodyId, state: RigidBodyState) {
        self.states.insert(id, state);
    }

    /// Mutable access to a body already in the snapshot.
    pub fn get_mut(&mut self, id: BodyId) -> Option<&mut RigidBodyState> {
        self.states.get_mut(&id)
    }

    /// Number of bodies.
    #[must_use]
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// Check if the snapshot is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

impl BodyStates for BodySnapshot {
    fn body_state(&self, id: BodyId) -> Option<RigidBodyState> {
        self.states.get(&id).copied()
    }
}

impl FromIterator<(BodyId, RigidBodyState)> for BodySnapshot {
    fn from_iter<I: IntoIterator<Item = (BodyId, RigidBodyState)>>(iter: I) -> Self {
        Self {
            states: iter.into_iter().collect(),
        }
    }
}
