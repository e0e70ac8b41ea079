//! Flat scalar persistence for gear joints.
//!
//! Joints write themselves as a sequence of typed little-endian scalars.
//! The order of fields is the compatibility contract: the writer and the
//! matching reader walk the same fields in declaration order.
//!
//! # Record Format
//!
//! A standalone joint record is:
//!
//! 1. **Magic bytes**: `GEAR` (4 bytes)
//! 2. **Version**: `u32` (see [`FormatVersion`])
//! 3. **Kind**: `u8` (see [`JointKind::tag`])
//! 4. **Child**, **Parent**: `u64` body handles
//! 5. **Joint fields**, written by the joint itself:
//!
//! ```text
//! frame0, frame1                  quat (i, j, k, w) + translation (x, y, z), real
//! gear_ratio                      real
//! velocity_correction             real  extended only
//! side                            f32   satellite, extended only
//! has_reference, reference_id     u8, u64 (only when has_reference == 1)
//! reference_relative              frame
//! ```
//!
//! "real" is `f32` in [`FormatVersion::Legacy`] and `f64` in
//! [`FormatVersion::Extended`].

use std::io::{Read, Write};

use nalgebra::{Isometry3, Quaternion, Translation3, UnitQuaternion, Vector3};
use sim_types::BodyId;
use tracing::debug;

use crate::error::GearError;
use crate::frame::AttachmentFrame;
use crate::joint::{GearJoint, JointKind};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Magic bytes identifying a joint record.
pub const RECORD_MAGIC: [u8; 4] = *b"GEAR";

/// Header size in bytes (magic + version + kind + two body handles).
pub const RECORD_HEADER_SIZE: usize = 4 + 4 + 1 + 8 + 8;

/// Quaternions further than this from unit length are rejected on load.
const MAX_QUATERNION_DRIFT: f64 = 1.0e-3;

/// Layout revision of the persisted scalar stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum FormatVersion {
    /// Single-precision layout of the first record revision. Satellite
    /// gears cannot be stored in it.
    Legacy,
    /// Double-precision layout that also stores the velocity-correction
    /// factor and a satellite's carrier and frozen relative frame.
    #[default]
    Extended,
}

impl FormatVersion {
    /// Version number written to record headers.
    #[must_use]
    pub const fn number(self) -> u32 {
        match self {
            Self::Legacy => 1,
            Self::Extended => 2,
        }
    }

    /// Parse a header version number.
    ///
    /// # Errors
    ///
    /// Returns [`GearError::UnsupportedVersion`] for unknown numbers.
    pub fn from_number(number: u32) -> Result<Self, GearError> {
        match number {
            1 => Ok(Self::Legacy),
            2 => Ok(Self::Extended),
            other => Err(GearError::UnsupportedVersion(other)),
        }
    }

    /// Whether satellite carrier data has a place in this layout.
    #[must_use]
    pub const fn persists_reference_frames(self) -> bool {
        matches!(self, Self::Extended)
    }

    /// Whether a joint's velocity-correction factor has a place in this
    /// layout.
    #[must_use]
    pub const fn persists_velocity_correction(self) -> bool {
        matches!(self, Self::Extended)
    }
}

impl std::fmt::Display for FormatVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Legacy => f.write_str("legacy"),
            Self::Extended => f.write_str("extended"),
        }
    }
}

/// Destination for persisted scalars.
pub trait ScalarSink {
    /// Write one byte.
    fn write_u8(&mut self, value: u8) -> std::io::Result<()>;
    /// Write a `u32`.
    fn write_u32(&mut self, value: u32) -> std::io::Result<()>;
    /// Write a `u64`.
    fn write_u64(&mut self, value: u64) -> std::io::Result<()>;
    /// Write an `f32`.
    fn write_f32(&mut self, value: f32) -> std::io::Result<()>;
    /// Write an `f64`.
    fn write_f64(&mut self, value: f64) -> std::io::Result<()>;
}

/// Source of persisted scalars.
pub trait ScalarSource {
    /// Read one byte.
    fn read_u8(&mut self) -> std::io::Result<u8>;
    /// Read a `u32`.
    fn read_u32(&mut self) -> std::io::Result<u32>;
    /// Read a `u64`.
    fn read_u64(&mut self) -> std::io::Result<u64>;
    /// Read an `f32`.
    fn read_f32(&mut self) -> std::io::Result<f32>;
    /// Read an `f64`.
    fn read_f64(&mut self) -> std::io::Result<f64>;
}

impl<W: Write + ?Sized> ScalarSink for W {
    fn write_u8(&mut self, value: u8) -> std::io::Result<()> {
        self.write_all(&[value])
    }

    fn write_u32(&mut self, value: u32) -> std::io::Result<()> {
        self.write_all(&value.to_le_bytes())
    }

    fn write_u64(&mut self, value: u64) -> std::io::Result<()> {
        self.write_all(&value.to_le_bytes())
    }

    fn write_f32(&mut self, value: f32) -> std::io::Result<()> {
        self.write_all(&value.to_le_bytes())
    }

    fn write_f64(&mut self, value: f64) -> std::io::Result<()> {
        self.write_all(&value.to_le_bytes())
    }
}

impl<R: Read + ?Sized> ScalarSource for R {
    fn read_u8(&mut self) -> std::io::Result<u8> {
        let mut bytes = [0u8; 1];
        self.read_exact(&mut bytes)?;
        Ok(bytes[0])
    }

    fn read_u32(&mut self) -> std::io::Result<u32> {
        let mut bytes = [0u8; 4];
        self.read_exact(&mut bytes)?;
        Ok(u32::from_le_bytes(bytes))
    }

    fn read_u64(&mut self) -> std::io::Result<u64> {
        let mut bytes = [0u8; 8];
        self.read_exact(&mut bytes)?;
        Ok(u64::from_le_bytes(bytes))
    }

    fn read_f32(&mut self) -> std::io::Result<f32> {
        let mut bytes = [0u8; 4];
        self.read_exact(&mut bytes)?;
        Ok(f32::from_le_bytes(bytes))
    }

    fn read_f64(&mut self) -> std::io::Result<f64> {
        let mut bytes = [0u8; 8];
        self.read_exact(&mut bytes)?;
        Ok(f64::from_le_bytes(bytes))
    }
}

/// Write a real at the precision `version` uses.
///
/// # Errors
///
/// Returns [`GearError::Io`] if the sink fails.
#[allow(clippy::cast_possible_truncation)]
pub fn write_real<W: ScalarSink + ?Sized>(
    sink: &mut W,
    version: FormatVersion,
    value: f64,
) -> Result<(), GearError> {
    match version {
        FormatVersion::Legacy => sink.write_f32(value as f32)?,
        FormatVersion::Extended => sink.write_f64(value)?,
    }
    Ok(())
}

/// Read a real at the precision `version` uses.
///
/// # Errors
///
/// Returns [`GearError::Io`] on a short stream.
pub fn read_real<R: ScalarSource + ?Sized>(
    source: &mut R,
    version: FormatVersion,
) -> Result<f64, GearError> {
    Ok(match version {
        FormatVersion::Legacy => f64::from(source.read_f32()?),
        FormatVersion::Extended => source.read_f64()?,
    })
}

/// Write a frame as quaternion `(i, j, k, w)` then translation `(x, y, z)`.
///
/// # Errors
///
/// Returns [`GearError::Io`] if the sink fails.
pub fn write_frame<W: ScalarSink + ?Sized>(
    sink: &mut W,
    version: FormatVersion,
    frame: &AttachmentFrame,
) -> Result<(), GearError> {
    let q = frame.rotation().quaternion();
    for value in [q.i, q.j, q.k, q.w] {
        write_real(sink, version, value)?;
    }
    let t = frame.translation();
    for value in [t.x, t.y, t.z] {
        write_real(sink, version, value)?;
    }
    Ok(())
}

/// Read a frame written by [`write_frame`].
///
/// The quaternion is renormalized, which absorbs single-precision rounding.
///
/// # Errors
///
/// - [`GearError::Io`] on a short stream
/// - [`GearError::Corrupt`] for non-finite values or a non-unit quaternion
pub fn read_frame<R: ScalarSource + ?Sized>(
    source: &mut R,
    version: FormatVersion,
) -> Result<AttachmentFrame, GearError> {
    let mut values = [0.0; 7];
    for value in &mut values {
        *value = read_real(source, version)?;
    }
    if values.iter().any(|v| !v.is_finite()) {
        return Err(GearError::corrupt("frame contains non-finite values"));
    }

    let [i, j, k, w, x, y, z] = values;
    let quaternion = Quaternion::new(w, i, j, k);
    let norm = quaternion.norm();
    if (norm - 1.0).abs() > MAX_QUATERNION_DRIFT {
        return Err(GearError::corrupt(format!(
            "frame rotation is not a unit quaternion (norm {norm})"
        )));
    }

    let rotation = UnitQuaternion::from_quaternion(quaternion);
    let translation = Translation3::from(Vector3::new(x, y, z));
    Ok(AttachmentFrame::from_isometry(Isometry3::from_parts(
        translation,
        rotation,
    )))
}

/// Header of a standalone joint record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    /// Layout of the joint fields that follow.
    pub version: FormatVersion,
    /// Which joint variant follows.
    pub kind: JointKind,
    /// Child body handle.
    pub child: BodyId,
    /// Parent body handle.
    pub parent: BodyId,
}

impl RecordHeader {
    fn write_to<W: ScalarSink + ?Sized>(&self, sink: &mut W) -> Result<(), GearError> {
        for byte in RECORD_MAGIC {
            sink.write_u8(byte)?;
        }
        sink.write_u32(self.version.number())?;
        sink.write_u8(self.kind.tag())?;
        sink.write_u64(self.child.raw())?;
        sink.write_u64(self.parent.raw())?;
        Ok(())
    }

    fn read_from<R: ScalarSource + ?Sized>(source: &mut R) -> Result<Self, GearError> {
        let mut magic = [0u8; 4];
        for byte in &mut magic {
            *byte = source.read_u8()?;
        }
        if magic != RECORD_MAGIC {
            return Err(GearError::InvalidMagic(magic));
        }

        let version = FormatVersion::from_number(source.read_u32()?)?;
        let kind = JointKind::from_tag(source.read_u8()?)?;
        let child = BodyId::new(source.read_u64()?);
        let parent = BodyId::new(source.read_u64()?);

        Ok(Self {
            version,
            kind,
            child,
            parent,
        })
    }
}

/// Save a joint as a standalone record.
///
/// # Errors
///
/// - [`GearError::Unsupported`] if the joint cannot be stored in `version`
/// - [`GearError::Io`] if the writer fails
pub fn save_joint<W: Write + ?Sized>(
    joint: &GearJoint,
    writer: &mut W,
    version: FormatVersion,
) -> Result<(), GearError> {
    // Check before the header so an unsupported joint leaves no bytes behind.
    joint.check_format(version)?;

    let header = RecordHeader {
        version,
        kind: joint.kind(),
        child: joint.child(),
        parent: joint.parent(),
    };
    header.write_to(writer)?;
    joint.serialize(writer, version)?;

    debug!(kind = %header.kind, %version, "joint record saved");
    Ok(())
}

/// Load a joint record written by [`save_joint`].
///
/// # Errors
///
/// - [`GearError::InvalidMagic`], [`GearError::UnsupportedVersion`],
///   [`GearError::UnknownKind`] for a bad header
/// - [`GearError::Unsupported`] for a satellite in the legacy layout
/// - [`GearError::Io`] / [`GearError::Corrupt`] for bad joint fields
pub fn load_joint<R: Read + ?Sized>(reader: &mut R) -> Result<GearJoint, GearError> {
    let header = RecordHeader::read_from(reader)?;
    let joint = GearJoint::deserialize(
        header.kind,
        header.child,
        header.parent,
        reader,
        header.version,
    )?;

    debug!(kind = %header.kind, version = %header.version, "joint record loaded");
    Ok(joint)
}

/// Save a joint record into a new byte vector.
///
/// # Errors
///
/// Same as [`save_joint`].
pub fn save_joint_to_bytes(joint: &GearJoint, version: FormatVersion) -> Result<Vec<u8>, GearError> {
    let mut bytes = Vec::with_capacity(RECORD_HEADER_SIZE + 128);
    save_joint(joint, &mut bytes, version)?;
    Ok(bytes)
}

/// Load a joint record from a byte slice.
///
/// # Errors
///
/// Same as [`load_joint`].
pub fn load_joint_from_bytes(bytes: &[u8]) -> Result<GearJoint, GearError> {
    let mut reader = bytes;
    load_joint(&mut reader)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use crate::error::BodyRole;
    use approx::assert_relative_eq;

    #[test]
    fn test_version_numbers() {
        assert_eq!(FormatVersion::Legacy.number(), 1);
        assert_eq!(FormatVersion::from_number(2).unwrap(), FormatVersion::Extended);
        assert!(matches!(
            FormatVersion::from_number(9),
            Err(GearError::UnsupportedVersion(9))
        ));
        assert_eq!(FormatVersion::default(), FormatVersion::Extended);
    }

    #[test]
    fn test_real_width_follows_version() {
        let mut legacy: Vec<u8> = Vec::new();
        write_real(&mut legacy, FormatVersion::Legacy, 2.0).unwrap();
        assert_eq!(legacy, 2.0f32.to_le_bytes().to_vec());

        let mut extended: Vec<u8> = Vec::new();
        write_real(&mut extended, FormatVersion::Extended, 2.0).unwrap();
        assert_eq!(extended.len(), 8);
    }

    #[test]
    fn test_frame_roundtrip_legacy() {
        let frame =
            AttachmentFrame::from_pin(&Vector3::new(1.0, 2.0, -0.5), BodyRole::Child).unwrap();

        let mut bytes: Vec<u8> = Vec::new();
        write_frame(&mut bytes, FormatVersion::Legacy, &frame).unwrap();
        assert_eq!(bytes.len(), 7 * 4);

        let restored = read_frame(&mut bytes.as_slice(), FormatVersion::Legacy).unwrap();
        assert_relative_eq!(restored.front(), frame.front(), epsilon = 1e-6);
        assert_relative_eq!(restored.up(), frame.up(), epsilon = 1e-6);
    }

    #[test]
    fn test_zero_quaternion_is_corrupt() {
        let mut bytes: Vec<u8> = Vec::new();
        for _ in 0..7 {
            bytes.write_f64(0.0).unwrap();
        }
        let err = read_frame(&mut bytes.as_slice(), FormatVersion::Extended).unwrap_err();
        assert!(matches!(err, GearError::Corrupt { .. }));
    }

    #[test]
    fn test_short_stream_is_io_error() {
        let bytes = [0u8; 3];
        let err = read_real(&mut bytes.as_slice(), FormatVersion::Extended).unwrap_err();
        assert!(matches!(err, GearError::Io(_)));
    }

    #[test]
    fn test_header_roundtrip() {
        let header = RecordHeader {
            version: FormatVersion::Legacy,
            kind: JointKind::Gear,
            child: BodyId::new(11),
            parent: BodyId::new(12),
        };
        let mut bytes: Vec<u8> = Vec::new();
        header.write_to(&mut bytes).unwrap();
        assert_eq!(bytes.len(), RECORD_HEADER_SIZE);

        let restored = RecordHeader::read_from(&mut bytes.as_slice()).unwrap();
        assert_eq!(restored, header);
    }

    #[test]
    fn test_bad_magic() {
        let mut bytes = b"NOPE".to_vec();
        bytes.extend_from_slice(&[0u8; 21]);
        assert!(matches!(
            load_joint_from_bytes(&bytes),
            Err(GearError::InvalidMagic(m)) if &m == b"NOPE"
        ));
    }
}
