//! Error types for gear construction and persistence.

use thiserror::Error;

use crate::joint::JointKind;
use crate::persist::FormatVersion;

/// Which side of a gear pair a value belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyRole {
    /// The driven body (body 0).
    Child,
    /// The driving body (body 1).
    Parent,
}

impl std::fmt::Display for BodyRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Child => f.write_str("child"),
            Self::Parent => f.write_str("parent"),
        }
    }
}

/// Errors raised while building, saving or loading gear joints.
///
/// Row submission itself never fails.
#[derive(Debug, Error)]
pub enum GearError {
    /// A pin axis had zero length or non-finite components.
    #[error("degenerate {role} pin axis {axis:?}: basis completion needs a non-zero finite vector")]
    DegenerateAxis {
        /// Which body the axis belongs to.
        role: BodyRole,
        /// The rejected axis.
        axis: [f64; 3],
    },

    /// The gear ratio was `NaN` or infinite.
    #[error("invalid gear ratio: {0} (must be finite)")]
    InvalidRatio(f64),

    /// The operation has no defined representation in this format.
    #[error("{operation} is not supported for {kind} joints in the {version} format")]
    Unsupported {
        /// Joint kind the operation was attempted on.
        kind: JointKind,
        /// Name of the operation.
        operation: &'static str,
        /// Format version requested.
        version: FormatVersion,
    },

    /// Record did not start with the expected magic bytes.
    #[error("invalid joint record magic: {0:?}")]
    InvalidMagic([u8; 4]),

    /// Record version is not one this crate reads.
    #[error("unsupported joint record version: {0}")]
    UnsupportedVersion(u32),

    /// Record kind tag does not name a known joint kind.
    #[error("unknown joint kind tag: {0}")]
    UnknownKind(u8),

    /// Decoded values are not usable (non-finite or non-normalizable frame).
    #[error("corrupt joint record: {reason}")]
    Corrupt {
        /// What was wrong with the data.
        reason: String,
    },

    /// The underlying stream failed.
    #[error("stream error: {0}")]
    Io(#[from] std::io::Error),
}

impl GearError {
    /// Create a corrupt-record error.
    #[must_use]
    pub fn corrupt(reason: impl Into<String>) -> Self {
        Self::Corrupt {
            reason: reason.into(),
        }
    }

    /// Check if this error marks an unimplemented persistence path.
    #[must_use]
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::Unsupported { .. })
    }

    /// Check if this error was raised while validating construction inputs.
    #[must_use]
    pub fn is_precondition(&self) -> bool {
        matches!(self, Self::DegenerateAxis { .. } | Self::InvalidRatio(_))
    }
}
