//! Joint kinds, descriptive records and the closed set of gear joints.
//!
//! The host holds gear joints as [`GearJoint`] values and dispatches to
//! the concrete variant with a `match`.

use sim_types::BodyId;

use crate::bodies::BodyStates;
use crate::error::GearError;
use crate::frame::AttachmentFrame;
use crate::gear::GearConstraint;
use crate::persist::{FormatVersion, ScalarSink, ScalarSource};
use crate::row::{ConstraintRowSink, GearRow};
use crate::satellite::SatelliteGearConstraint;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Stand-in for "no limit" in [`JointRecord`] ranges.
pub const LARGE_VALUE: f64 = 1.0e20;

/// Number of slots in [`JointRecord::extra_parameters`].
pub const EXTRA_PARAMETER_COUNT: usize = 16;

/// Kind of gear joint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum JointKind {
    /// Plain two-body gear.
    Gear,
    /// Gear measured against a carrier body.
    SatelliteGear,
}

impl JointKind {
    /// Name used in records and logs.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Gear => "gear",
            Self::SatelliteGear => "satellite_gear",
        }
    }

    /// Tag byte written to record headers.
    #[must_use]
    pub const fn tag(self) -> u8 {
        match self {
            Self::Gear => 1,
            Self::SatelliteGear => 2,
        }
    }

    /// Parse a header tag byte.
    ///
    /// # Errors
    ///
    /// Returns [`GearError::UnknownKind`] for unknown tags.
    pub fn from_tag(tag: u8) -> Result<Self, GearError> {
        match tag {
            1 => Ok(Self::Gear),
            2 => Ok(Self::SatelliteGear),
            other => Err(GearError::UnknownKind(other)),
        }
    }
}

impl std::fmt::Display for JointKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Descriptive snapshot of a joint for tooling and editors.
///
/// Gears constrain no range of motion, so every limit is ±[`LARGE_VALUE`].
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct JointRecord {
    /// Joint kind.
    pub kind: JointKind,
    /// Child body.
    pub child: BodyId,
    /// Parent body.
    pub parent: BodyId,
    /// Lower linear limits.
    pub min_linear_dof: [f64; 3],
    /// Upper linear limits.
    pub max_linear_dof: [f64; 3],
    /// Lower angular limits.
    pub min_angular_dof: [f64; 3],
    /// Upper angular limits.
    pub max_angular_dof: [f64; 3],
    /// Child attachment frame, child-local.
    pub attachment_frame0: AttachmentFrame,
    /// Parent attachment frame, parent-local.
    pub attachment_frame1: AttachmentFrame,
    /// Kind-specific parameters. Slot 0 is the gear ratio; satellites put
    /// their side in slot 1.
    pub extra_parameters: [f64; EXTRA_PARAMETER_COUNT],
}

impl JointRecord {
    /// A record with unbounded limits and zeroed extras.
    #[must_use]
    pub fn unconstrained(
        kind: JointKind,
        child: BodyId,
        parent: BodyId,
        attachment_frame0: AttachmentFrame,
        attachment_frame1: AttachmentFrame,
    ) -> Self {
        Self {
            kind,
            child,
            parent,
            min_linear_dof: [-LARGE_VALUE; 3],
            max_linear_dof: [LARGE_VALUE; 3],
            min_angular_dof: [-LARGE_VALUE; 3],
            max_angular_dof: [LARGE_VALUE; 3],
            attachment_frame0,
            attachment_frame1,
            extra_parameters: [0.0; EXTRA_PARAMETER_COUNT],
        }
    }
}

/// A gear joint of either kind.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum GearJoint {
    /// Plain gear.
    Gear(GearConstraint),
    /// Satellite gear.
    Satellite(SatelliteGearConstraint),
}

impl GearJoint {
    /// Kind of the wrapped joint.
    #[must_use]
    pub fn kind(&self) -> JointKind {
        match self {
            Self::Gear(_) => JointKind::Gear,
            Self::Satellite(_) => JointKind::SatelliteGear,
        }
    }

    /// The shared gear data of either variant.
    #[must_use]
    pub fn gear(&self) -> &GearConstraint {
        match self {
            Self::Gear(g) => g,
            Self::Satellite(s) => s.gear(),
        }
    }

    /// Get the child body ID.
    #[must_use]
    pub fn child(&self) -> BodyId {
        self.gear().child()
    }

    /// Get the parent body ID.
    #[must_use]
    pub fn parent(&self) -> BodyId {
        self.gear().parent()
    }

    /// Number of rows submitted per step.
    #[must_use]
    pub fn dof(&self) -> usize {
        self.gear().dof()
    }

    /// Derive this step's row without submitting it.
    #[must_use]
    pub fn compute_row<B: BodyStates + ?Sized>(&self, bodies: &B, timestep: f64) -> GearRow {
        match self {
            Self::Gear(g) => g.compute_row(bodies, timestep),
            Self::Satellite(s) => s.compute_row(bodies, timestep),
        }
    }

    /// Submit this step's row to `sink`.
    pub fn submit_rows<B, S>(&self, bodies: &B, sink: &mut S, timestep: f64, thread_index: usize)
    where
        B: BodyStates + ?Sized,
        S: ConstraintRowSink + ?Sized,
    {
        match self {
            Self::Gear(g) => g.submit_rows(bodies, sink, timestep, thread_index),
            Self::Satellite(s) => s.submit_rows(bodies, sink, timestep, thread_index),
        }
    }

    /// Describe the joint for tooling.
    #[must_use]
    pub fn info(&self) -> JointRecord {
        match self {
            Self::Gear(g) => g.info(),
            Self::Satellite(s) => s.info(),
        }
    }

    /// Check that the joint can be stored in `version`.
    ///
    /// # Errors
    ///
    /// See [`GearConstraint::check_format`] and
    /// [`SatelliteGearConstraint::check_format`].
    pub fn check_format(&self, version: FormatVersion) -> Result<(), GearError> {
        match self {
            Self::Gear(g) => g.check_format(version),
            Self::Satellite(s) => s.check_format(version),
        }
    }

    /// Write the joint's fields (no header).
    ///
    /// # Errors
    ///
    /// See [`GearConstraint::serialize`] and
    /// [`SatelliteGearConstraint::serialize`].
    pub fn serialize<W: ScalarSink + ?Sized>(
        &self,
        sink: &mut W,
        version: FormatVersion,
    ) -> Result<(), GearError> {
        match self {
            Self::Gear(g) => g.serialize(sink, version),
            Self::Satellite(s) => s.serialize(sink, version),
        }
    }

    /// Read a joint of `kind` written by [`serialize`](Self::serialize).
    ///
    /// # Errors
    ///
    /// See [`GearConstraint::deserialize`] and
    /// [`SatelliteGearConstraint::deserialize`].
    pub fn deserialize<R: ScalarSource + ?Sized>(
        kind: JointKind,
        child: BodyId,
        parent: BodyId,
        source: &mut R,
        version: FormatVersion,
    ) -> Result<Self, GearError> {
        Ok(match kind {
            JointKind::Gear => {
                Self::Gear(GearConstraint::deserialize(child, parent, source, version)?)
            }
            JointKind::SatelliteGear => Self::Satellite(SatelliteGearConstraint::deserialize(
                child, parent, source, version,
            )?),
        })
    }
}

impl From<GearConstraint> for GearJoint {
    fn from(gear: GearConstraint) -> Self {
        Self::Gear(gear)
    }
}

impl From<SatelliteGearConstraint> for GearJoint {
    fn from(satellite: SatelliteGearConstraint) -> Self {
        Self::Satellite(satellite)
    }
}
