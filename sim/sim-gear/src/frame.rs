//! Attachment frames and pin-axis basis completion.
//!
//! An attachment frame is an orthonormal rigid transform fixed in a body's
//! local space. Its three basis columns are named after the pin they are
//! grown from:
//!
//! ```text
//! column 0  front   the pin axis itself (normalized)
//! column 1  up
//! column 2  right   front × up
//! ```
//!
//! Frames compose in nalgebra's column-vector convention, so a local frame
//! is carried into world space as `body_pose · local`.

use nalgebra::{Isometry3, Matrix3, Rotation3, Translation3, UnitQuaternion, Vector3};
use sim_types::Pose;

use crate::error::{BodyRole, GearError};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Above this `|front.z|` the helper vector is built from `(y, z)`.
const AXIS_SWITCH_THRESHOLD: f64 = 0.577;

/// An orthonormal frame attached to a body.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AttachmentFrame(Isometry3<f64>);

impl Default for AttachmentFrame {
    fn default() -> Self {
        Self::identity()
    }
}

impl AttachmentFrame {
    /// Identity frame: front = +X, up = +Y, right = +Z.
    #[must_use]
    pub fn identity() -> Self {
        Self(Isometry3::identity())
    }

    /// Wrap an existing rigid transform.
    #[must_use]
    pub const fn from_isometry(iso: Isometry3<f64>) -> Self {
        Self(iso)
    }

    /// Complete an orthonormal basis around `pin`.
    ///
    /// The result has `front` equal to the normalized pin and no
    /// translation. The construction is deterministic: the same pin always
    /// yields the same `up` and `right`.
    ///
    /// # Errors
    ///
    /// Returns [`GearError::DegenerateAxis`] if `pin` is exactly zero or has
    /// non-finite components. Any other magnitude is accepted.
    pub fn from_pin(pin: &Vector3<f64>, role: BodyRole) -> Result<Self, GearError> {
        // Normalize through the largest component so the length can neither
        // overflow nor underflow for any finite non-zero pin.
        let largest = pin.amax();
        if !pin.iter().all(|c| c.is_finite()) || largest == 0.0 {
            return Err(GearError::DegenerateAxis {
                role,
                axis: [pin.x, pin.y, pin.z],
            });
        }

        let front = pin.map(|c| c / largest).normalize();
        let helper = if front.z.abs() > AXIS_SWITCH_THRESHOLD {
            Vector3::new(-front.y, front.z, 0.0)
        } else {
            Vector3::new(-front.y, front.x, 0.0)
        };
        let right = front.cross(&helper).normalize();
        let up = right.cross(&front);

        let basis = Matrix3::from_columns(&[front, up, right]);
        let rotation = UnitQuaternion::from_rotation_matrix(
            &Rotation3::from_matrix_unchecked(basis),
        );
        Ok(Self(Isometry3::from_parts(Translation3::identity(), rotation)))
    }

    /// Rotation part of the frame.
    #[must_use]
    pub fn rotation(&self) -> &UnitQuaternion<f64> {
        &self.0.rotation
    }

    /// Translation part of the frame.
    #[must_use]
    pub fn translation(&self) -> Vector3<f64> {
        self.0.translation.vector
    }

    /// First basis axis (the pin direction).
    #[must_use]
    pub fn front(&self) -> Vector3<f64> {
        self.0.rotation * Vector3::x()
    }

    /// Second basis axis.
    #[must_use]
    pub fn up(&self) -> Vector3<f64> {
        self.0.rotation * Vector3::y()
    }

    /// Third basis axis, `front × up`.
    #[must_use]
    pub fn right(&self) -> Vector3<f64> {
        self.0.rotation * Vector3::z()
    }

    /// Same orientation with the translation cleared.
    #[must_use]
    pub fn without_translation(&self) -> Self {
        Self(Isometry3::from_parts(Translation3::identity(), self.0.rotation))
    }

    /// Express a world-space frame in the local space of a body at `body`.
    #[must_use]
    pub fn to_local(&self, body: &Pose) -> Self {
        Self(body.to_isometry().inverse() * self.0)
    }

    /// Carry a body-local frame into world space for a body at `body`.
    #[must_use]
    pub fn to_world(&self, body: &Pose) -> Self {
        Self(body.to_isometry() * self.0)
    }

    /// Frame of `self` relative to `reference`: `reference⁻¹ · self`.
    #[must_use]
    pub fn relative_to(&self, reference: &Isometry3<f64>) -> Self {
        Self(reference.inverse() * self.0)
    }

    /// Re-apply a relative frame on top of `reference`: `reference · self`.
    #[must_use]
    pub fn on_top_of(&self, reference: &Isometry3<f64>) -> Self {
        Self(reference * self.0)
    }
}
