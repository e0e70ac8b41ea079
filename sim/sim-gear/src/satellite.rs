//! Satellite gear: a gear measured against a carrier body.
//!
//! In a planetary train the satellite spins about an axis carried by the
//! carrier. The parent side of the row is therefore not read from the
//! parent body's current orientation. Instead, the parent attachment frame
//! is frozen relative to the reference (carrier) body when the joint is
//! built, and re-applied to the carrier's current pose every step:
//!
//! ```text
//! relative  = reference⁻¹ · frame1              (once, at construction)
//! effective = reference_now · relative           (every step)
//! a1        = (effective.front · side) × effective.right
//! ```
//!
//! With `front × right = -up`, the parent sensitivity is `-side · up`: it
//! is orthogonal to the carrier-side pin instead of parallel to it. The
//! side flag picks which of the two mounting orientations is modelled.

use nalgebra::{Isometry3, Vector3};
use sim_types::BodyId;
use tracing::{debug, trace};

use crate::bodies::BodyStates;
use crate::error::GearError;
use crate::frame::AttachmentFrame;
use crate::gear::GearConstraint;
use crate::joint::{JointKind, JointRecord};
use crate::persist::{FormatVersion, ScalarSink, ScalarSource, read_frame, write_frame};
use crate::row::{ConstraintRowSink, GearRow};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A gear whose parent side is measured in a carrier's frame.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SatelliteGearConstraint {
    /// Ratio, bodies and local frames shared with the plain gear.
    gear: GearConstraint,
    /// Carrier body, or `None` for the world.
    reference: Option<BodyId>,
    /// Parent world frame relative to the carrier at construction.
    reference_relative: AttachmentFrame,
    /// `+1.0` or `-1.0`.
    side: f64,
}

/// Map any side value onto `+1` (strictly positive input) or `-1`.
#[must_use]
pub fn normalize_side(side: f64) -> f64 {
    if side > 0.0 { 1.0 } else { -1.0 }
}

impl SatelliteGearConstraint {
    /// Create a satellite gear.
    ///
    /// Arguments are those of [`GearConstraint::new`] plus the carrier
    /// `reference` body (optional) and the mounting `side`.
    ///
    /// # Errors
    ///
    /// Same as [`GearConstraint::new`].
    #[allow(clippy::too_many_arguments)]
    pub fn new<B: BodyStates + ?Sized>(
        gear_ratio: f64,
        child_pin: Vector3<f64>,
        parent_pin: Vector3<f64>,
        child: BodyId,
        parent: BodyId,
        reference: Option<BodyId>,
        side: f64,
        bodies: &B,
    ) -> Result<Self, GearError> {
        let gear = GearConstraint::new(gear_ratio, child_pin, parent_pin, child, parent, bodies)?;

        let (_, frame1) = gear.global_frames(bodies);
        let reference_world = reference_world(reference, bodies);
        let reference_relative = frame1.relative_to(&reference_world);
        let side = normalize_side(side);

        debug!(
            %child,
            %parent,
            reference = ?reference,
            side,
            "satellite gear constraint created"
        );

        Ok(Self {
            gear,
            reference,
            reference_relative,
            side,
        })
    }

    /// Rebuild a satellite gear from persisted parts.
    #[must_use]
    pub fn from_parts(
        gear: GearConstraint,
        reference: Option<BodyId>,
        reference_relative: AttachmentFrame,
        side: f64,
    ) -> Self {
        Self {
            gear,
            reference,
            reference_relative,
            side: normalize_side(side),
        }
    }

    /// Set the velocity-error correction factor (clamped to `[0, 1]`).
    #[must_use]
    pub fn with_velocity_correction(mut self, factor: f64) -> Self {
        self.gear = self.gear.with_velocity_correction(factor);
        self
    }

    /// The plain gear this satellite extends.
    #[must_use]
    pub fn gear(&self) -> &GearConstraint {
        &self.gear
    }

    /// Get the carrier body, if any.
    #[must_use]
    pub fn reference(&self) -> Option<BodyId> {
        self.reference
    }

    /// Parent frame frozen relative to the carrier.
    #[must_use]
    pub fn reference_relative(&self) -> &AttachmentFrame {
        &self.reference_relative
    }

    /// Get the mounting side, `+1.0` or `-1.0`.
    #[must_use]
    pub fn side(&self) -> f64 {
        self.side
    }

    /// The parent frame the row is measured against this step.
    #[must_use]
    pub fn effective_parent_frame<B: BodyStates + ?Sized>(&self, bodies: &B) -> AttachmentFrame {
        match self.reference {
            Some(_) => self
                .reference_relative
                .on_top_of(&reference_world(self.reference, bodies)),
            None => self.reference_relative,
        }
    }

    /// Derive this step's row without submitting it.
    ///
    /// The child, parent and carrier are each looked up once.
    #[must_use]
    pub fn compute_row<B: BodyStates + ?Sized>(&self, bodies: &B, timestep: f64) -> GearRow {
        let child = bodies.state_or_world(self.gear.child());
        let parent = bodies.state_or_world(self.gear.parent());
        let frame0 = self.gear.local_frame0().to_world(&child.pose);
        let frame1 = self.effective_parent_frame(bodies);

        let dir0_cross = self.gear.child_direction(&frame0);
        let dir1_cross = (frame1.front() * self.side).cross(&frame1.right());

        self.gear.row_from_directions(
            dir0_cross,
            dir1_cross,
            &child.twist.angular,
            &parent.twist.angular,
            timestep,
        )
    }

    /// Submit this step's row to `sink`.
    pub fn submit_rows<B, S>(&self, bodies: &B, sink: &mut S, timestep: f64, thread_index: usize)
    where
        B: BodyStates + ?Sized,
        S: ConstraintRowSink + ?Sized,
    {
        let row = self.compute_row(bodies, timestep);
        trace!(
            child = %self.gear.child(),
            parent = %self.gear.parent(),
            thread_index,
            side = self.side,
            jacobian0 = ?row.jacobian0.to_array(),
            jacobian1 = ?row.jacobian1.to_array(),
            relative_omega = row.relative_omega,
            acceleration = row.acceleration,
            "satellite gear row"
        );
        row.submit(sink);
    }

    /// Describe the joint for tooling.
    #[must_use]
    pub fn info(&self) -> JointRecord {
        let mut record = self.gear.info();
        record.kind = JointKind::SatelliteGear;
        record.extra_parameters[0] = self.gear.gear_ratio();
        record.extra_parameters[1] = self.side;
        record
    }

    /// Check that the satellite can be stored in `version`.
    ///
    /// # Errors
    ///
    /// Returns [`GearError::Unsupported`] for [`FormatVersion::Legacy`].
    pub fn check_format(&self, version: FormatVersion) -> Result<(), GearError> {
        if !version.persists_reference_frames() {
            return Err(GearError::Unsupported {
                kind: JointKind::SatelliteGear,
                operation: "serialize",
                version,
            });
        }
        self.gear.check_format(version)
    }

    /// Write the satellite gear's fields.
    ///
    /// The legacy layout has no slot for the carrier, so it is refused
    /// before anything is written.
    ///
    /// # Errors
    ///
    /// - [`GearError::Unsupported`] for [`FormatVersion::Legacy`]
    /// - [`GearError::Io`] if the sink fails
    pub fn serialize<W: ScalarSink + ?Sized>(
        &self,
        sink: &mut W,
        version: FormatVersion,
    ) -> Result<(), GearError> {
        self.check_format(version)?;
        self.gear.serialize(sink, version)?;
        // `side` is always ±1, so f32 is exact.
        #[allow(clippy::cast_possible_truncation)]
        sink.write_f32(self.side as f32)?;
        match self.reference {
            Some(id) => {
                sink.write_u8(1)?;
                sink.write_u64(id.raw())?;
            }
            None => sink.write_u8(0)?,
        }
        write_frame(sink, version, &self.reference_relative)?;
        Ok(())
    }

    /// Read a satellite gear written by [`serialize`](Self::serialize).
    ///
    /// # Errors
    ///
    /// - [`GearError::Unsupported`] for [`FormatVersion::Legacy`]
    /// - [`GearError::Io`] / [`GearError::Corrupt`] on bad input
    pub fn deserialize<R: ScalarSource + ?Sized>(
        child: BodyId,
        parent: BodyId,
        source: &mut R,
        version: FormatVersion,
    ) -> Result<Self, GearError> {
        if !version.persists_reference_frames() {
            return Err(GearError::Unsupported {
                kind: JointKind::SatelliteGear,
                operation: "deserialize",
                version,
            });
        }

        let gear = GearConstraint::deserialize(child, parent, source, version)?;
        let side = f64::from(source.read_f32()?);
        let reference = match source.read_u8()? {
            0 => None,
            1 => Some(BodyId::new(source.read_u64()?)),
            flag => {
                return Err(GearError::corrupt(format!(
                    "reference presence flag must be 0 or 1, got {flag}"
                )));
            }
        };
        let reference_relative = read_frame(source, version)?;

        Ok(Self::from_parts(gear, reference, reference_relative, side))
    }
}

/// Current world transform of the carrier, identity when there is none.
fn reference_world<B: BodyStates + ?Sized>(
    reference: Option<BodyId>,
    bodies: &B,
) -> Isometry3<f64> {
    reference.map_or_else(Isometry3::identity, |id| bodies.pose_of(id).to_isometry())
}
