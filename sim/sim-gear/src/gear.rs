//! Two-body gear constraint.
//!
//! # Constraint Formulation
//!
//! Each body carries an attachment frame grown from its pin axis. Every step
//! the frames are carried into world space and the row is built from their
//! `up` and `right` axes:
//!
//! ```text
//! a0 = up0 × (right0 · ratio)      (= ratio · pin0)
//! a1 = up1 × right1                (= pin1)
//! ω0 · a0 + ω1 · a1 = 0
//! ```
//!
//! Only one row is produced; the gear leaves the other five relative
//! degrees of freedom to whatever else connects the bodies.

use nalgebra::Vector3;
use sim_types::BodyId;
use tracing::{debug, trace};

use crate::bodies::BodyStates;
use crate::error::{BodyRole, GearError};
use crate::frame::AttachmentFrame;
use crate::joint::{JointKind, JointRecord};
use crate::persist::{
    FormatVersion, ScalarSink, ScalarSource, read_frame, read_real, write_frame, write_real,
};
use crate::row::{ConstraintRowSink, DEFAULT_VELOCITY_CORRECTION, GearRow};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A gear coupling the spin of a child body to the spin of a parent body.
///
/// # Example
///
/// ```
/// use sim_gear::{BodySnapshot, GearConstraint, RowBuffer};
/// use sim_types::{BodyId, Pose, RigidBodyState};
/// use nalgebra::Vector3;
///
/// let bodies = BodySnapshot::new()
///     .with_body(BodyId::new(1), RigidBodyState::spinning(Pose::identity(), Vector3::new(0.0, 0.0, 4.0)))
///     .with_body(BodyId::new(2), RigidBodyState::at_rest(Pose::identity()));
///
/// let gear = GearConstraint::new(
///     2.0,
///     Vector3::z(),
///     Vector3::z(),
///     BodyId::new(1),
///     BodyId::new(2),
///     &bodies,
/// )?;
///
/// let mut rows = RowBuffer::new();
/// gear.submit_rows(&bodies, &mut rows, 0.01, 0);
/// assert_eq!(rows.len(), 1);
/// # Ok::<(), sim_gear::GearError>(())
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GearConstraint {
    /// Driven body (body 0).
    child: BodyId,
    /// Driving body (body 1).
    parent: BodyId,
    /// Child spin per unit of parent spin enters the row scaled by this.
    gear_ratio: f64,
    /// Child attachment frame in child-local space.
    local_frame0: AttachmentFrame,
    /// Parent attachment frame in parent-local space.
    local_frame1: AttachmentFrame,
    /// Fraction of the velocity error removed per step.
    velocity_correction: f64,
}

impl GearConstraint {
    /// Create a gear between `child` and `parent`.
    ///
    /// The pins are world-space directions. Each is completed into an
    /// orthonormal frame and frozen in its body's local space using the
    /// poses `bodies` reports now.
    ///
    /// # Errors
    ///
    /// - [`GearError::InvalidRatio`] if `gear_ratio` is not finite
    /// - [`GearError::DegenerateAxis`] if either pin is zero-length or not finite
    pub fn new<B: BodyStates + ?Sized>(
        gear_ratio: f64,
        child_pin: Vector3<f64>,
        parent_pin: Vector3<f64>,
        child: BodyId,
        parent: BodyId,
        bodies: &B,
    ) -> Result<Self, GearError> {
        if !gear_ratio.is_finite() {
            return Err(GearError::InvalidRatio(gear_ratio));
        }

        let pin_frame0 = AttachmentFrame::from_pin(&child_pin, BodyRole::Child)?;
        let pin_frame1 = AttachmentFrame::from_pin(&parent_pin, BodyRole::Parent)?;

        let local_frame0 = pin_frame0
            .to_local(&bodies.pose_of(child))
            .without_translation();
        let local_frame1 = pin_frame1
            .to_local(&bodies.pose_of(parent))
            .without_translation();

        debug!(%child, %parent, gear_ratio, "gear constraint created");

        Ok(Self {
            child,
            parent,
            gear_ratio,
            local_frame0,
            local_frame1,
            velocity_correction: DEFAULT_VELOCITY_CORRECTION,
        })
    }

    /// Rebuild a gear from frames already in body-local space.
    ///
    /// # Errors
    ///
    /// Returns [`GearError::InvalidRatio`] if `gear_ratio` is not finite.
    pub fn from_local_frames(
        gear_ratio: f64,
        child: BodyId,
        parent: BodyId,
        local_frame0: AttachmentFrame,
        local_frame1: AttachmentFrame,
    ) -> Result<Self, GearError> {
        if !gear_ratio.is_finite() {
            return Err(GearError::InvalidRatio(gear_ratio));
        }
        Ok(Self {
            child,
            parent,
            gear_ratio,
            local_frame0,
            local_frame1,
            velocity_correction: DEFAULT_VELOCITY_CORRECTION,
        })
    }

    /// Set the velocity-error correction factor (clamped to `[0, 1]`).
    ///
    /// A `NaN` or infinite factor has no place in that range and restores
    /// [`DEFAULT_VELOCITY_CORRECTION`] instead.
    #[must_use]
    pub fn with_velocity_correction(mut self, factor: f64) -> Self {
        self.velocity_correction = if factor.is_finite() {
            factor.clamp(0.0, 1.0)
        } else {
            DEFAULT_VELOCITY_CORRECTION
        };
        self
    }

    /// Get the child body ID.
    #[must_use]
    pub fn child(&self) -> BodyId {
        self.child
    }

    /// Get the parent body ID.
    #[must_use]
    pub fn parent(&self) -> BodyId {
        self.parent
    }

    /// Get the gear ratio.
    #[must_use]
    pub fn gear_ratio(&self) -> f64 {
        self.gear_ratio
    }

    /// Get the velocity-error correction factor.
    #[must_use]
    pub fn velocity_correction(&self) -> f64 {
        self.velocity_correction
    }

    /// Child attachment frame in child-local space.
    #[must_use]
    pub fn local_frame0(&self) -> &AttachmentFrame {
        &self.local_frame0
    }

    /// Parent attachment frame in parent-local space.
    #[must_use]
    pub fn local_frame1(&self) -> &AttachmentFrame {
        &self.local_frame1
    }

    /// Number of rows submitted per step.
    #[must_use]
    pub fn dof(&self) -> usize {
        1
    }

    /// Both attachment frames carried into world space.
    #[must_use]
    pub fn global_frames<B: BodyStates + ?Sized>(
        &self,
        bodies: &B,
    ) -> (AttachmentFrame, AttachmentFrame) {
        (
            self.local_frame0.to_world(&bodies.pose_of(self.child)),
            self.local_frame1.to_world(&bodies.pose_of(self.parent)),
        )
    }

    /// Child-side angular sensitivity for a world child frame.
    pub(crate) fn child_direction(&self, frame0: &AttachmentFrame) -> Vector3<f64> {
        frame0.up().cross(&(frame0.right() * self.gear_ratio))
    }

    /// Build the row from already-resolved sensitivity directions and the
    /// bodies' angular velocities.
    pub(crate) fn row_from_directions(
        &self,
        dir0_cross: Vector3<f64>,
        dir1_cross: Vector3<f64>,
        omega0: &Vector3<f64>,
        omega1: &Vector3<f64>,
        timestep: f64,
    ) -> GearRow {
        GearRow::derive(
            dir0_cross,
            dir1_cross,
            omega0,
            omega1,
            timestep,
            self.velocity_correction,
        )
    }

    /// Derive this step's row without submitting it.
    ///
    /// Each body is looked up once.
    #[must_use]
    pub fn compute_row<B: BodyStates + ?Sized>(&self, bodies: &B, timestep: f64) -> GearRow {
        let child = bodies.state_or_world(self.child);
        let parent = bodies.state_or_world(self.parent);
        let frame0 = self.local_frame0.to_world(&child.pose);
        let frame1 = self.local_frame1.to_world(&parent.pose);

        let dir0_cross = self.child_direction(&frame0);
        let dir1_cross = frame1.up().cross(&frame1.right());

        self.row_from_directions(
            dir0_cross,
            dir1_cross,
            &child.twist.angular,
            &parent.twist.angular,
            timestep,
        )
    }

    /// Submit this step's row to `sink`.
    ///
    /// Exactly one row is appended and its acceleration set.
    pub fn submit_rows<B, S>(&self, bodies: &B, sink: &mut S, timestep: f64, thread_index: usize)
    where
        B: BodyStates + ?Sized,
        S: ConstraintRowSink + ?Sized,
    {
        let row = self.compute_row(bodies, timestep);
        trace!(
            child = %self.child,
            parent = %self.parent,
            thread_index,
            jacobian0 = ?row.jacobian0.to_array(),
            jacobian1 = ?row.jacobian1.to_array(),
            relative_omega = row.relative_omega,
            acceleration = row.acceleration,
            "gear row"
        );
        row.submit(sink);
    }

    /// Describe the joint for tooling.
    #[must_use]
    pub fn info(&self) -> JointRecord {
        let mut record = JointRecord::unconstrained(
            JointKind::Gear,
            self.child,
            self.parent,
            self.local_frame0,
            self.local_frame1,
        );
        record.extra_parameters[0] = self.gear_ratio;
        record
    }

    /// Check that every field has a slot in `version`.
    ///
    /// The legacy layout has no correction factor, so only the default
    /// factor can be stored in it.
    ///
    /// # Errors
    ///
    /// Returns [`GearError::Unsupported`] for a custom correction factor in
    /// [`FormatVersion::Legacy`].
    #[allow(clippy::float_cmp)]
    pub fn check_format(&self, version: FormatVersion) -> Result<(), GearError> {
        if !version.persists_velocity_correction()
            && self.velocity_correction != DEFAULT_VELOCITY_CORRECTION
        {
            return Err(GearError::Unsupported {
                kind: JointKind::Gear,
                operation: "custom velocity correction",
                version,
            });
        }
        Ok(())
    }

    /// Write the gear's fields: both local frames, the ratio, then (extended
    /// layout only) the correction factor.
    ///
    /// Nothing is written when [`check_format`](Self::check_format) fails.
    ///
    /// # Errors
    ///
    /// - [`GearError::Unsupported`] if a field cannot be stored in `version`
    /// - [`GearError::Io`] if the sink fails
    pub fn serialize<W: ScalarSink + ?Sized>(
        &self,
        sink: &mut W,
        version: FormatVersion,
    ) -> Result<(), GearError> {
        self.check_format(version)?;
        write_frame(sink, version, &self.local_frame0)?;
        write_frame(sink, version, &self.local_frame1)?;
        write_real(sink, version, self.gear_ratio)?;
        if version.persists_velocity_correction() {
            write_real(sink, version, self.velocity_correction)?;
        }
        Ok(())
    }

    /// Read a gear written by [`serialize`](Self::serialize).
    ///
    /// # Errors
    ///
    /// Returns [`GearError::Io`] on a short stream and
    /// [`GearError::Corrupt`] if the decoded values are unusable.
    pub fn deserialize<R: ScalarSource + ?Sized>(
        child: BodyId,
        parent: BodyId,
        source: &mut R,
        version: FormatVersion,
    ) -> Result<Self, GearError> {
        let local_frame0 = read_frame(source, version)?;
        let local_frame1 = read_frame(source, version)?;
        let gear_ratio = read_real(source, version)?;
        if !gear_ratio.is_finite() {
            return Err(GearError::corrupt(format!(
                "gear ratio {gear_ratio} is not finite"
            )));
        }
        let gear = Self::from_local_frames(gear_ratio, child, parent, local_frame0, local_frame1)?;

        if !version.persists_velocity_correction() {
            return Ok(gear);
        }
        let factor = read_real(source, version)?;
        if !(0.0..=1.0).contains(&factor) {
            return Err(GearError::corrupt(format!(
                "velocity correction {factor} is outside [0, 1]"
            )));
        }
        Ok(gear.with_velocity_correction(factor))
    }
}
