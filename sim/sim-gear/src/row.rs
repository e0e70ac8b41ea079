//! Constraint rows and the solver sink that receives them.
//!
//! A row couples two bodies through one 6-component Jacobian each
//! (3 linear + 3 angular) and a target relative acceleration. Gear rows are
//! purely rotational, so their linear half is always zero.
//!
//! # Bias Acceleration
//!
//! The row removes the current constraint-velocity error over one step,
//! damped to avoid overshoot:
//!
//! ```text
//! ω_rel   = ω0 · a0 + ω1 · a1
//! accel   = -β · ω_rel / dt        (β = 0.5 by default)
//! ```
//!
//! A non-positive `dt` substitutes `1 / dt = 1`, so the solver never sees a
//! non-finite target.

use nalgebra::Vector3;
use tracing::warn;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Default damping of the velocity-error correction.
pub const DEFAULT_VELOCITY_CORRECTION: f64 = 0.5;

/// One body's half of a constraint row.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Jacobian {
    /// Sensitivity to the body's linear velocity.
    pub linear: Vector3<f64>,
    /// Sensitivity to the body's angular velocity.
    pub angular: Vector3<f64>,
}

impl Jacobian {
    /// A Jacobian with no linear part.
    #[must_use]
    pub fn angular(angular: Vector3<f64>) -> Self {
        Self {
            linear: Vector3::zeros(),
            angular,
        }
    }

    /// Flatten to `[lx, ly, lz, ax, ay, az]`.
    #[must_use]
    pub fn to_array(&self) -> [f64; 6] {
        [
            self.linear.x,
            self.linear.y,
            self.linear.z,
            self.angular.x,
            self.angular.y,
            self.angular.z,
        ]
    }
}

/// The solver side of row submission.
///
/// Calls always come in pairs: one `add_general_row` followed by one
/// `set_row_acceleration` for that row. Implementations need not be
/// reentrant; each joint submits to its sink synchronously.
pub trait ConstraintRowSink {
    /// Append a two-body row.
    fn add_general_row(&mut self, jacobian0: &Jacobian, jacobian1: &Jacobian);

    /// Set the target relative acceleration of the most recent row.
    fn set_row_acceleration(&mut self, acceleration: f64);
}

impl<S: ConstraintRowSink + ?Sized> ConstraintRowSink for &mut S {
    fn add_general_row(&mut self, jacobian0: &Jacobian, jacobian1: &Jacobian) {
        (**self).add_general_row(jacobian0, jacobian1);
    }

    fn set_row_acceleration(&mut self, acceleration: f64) {
        (**self).set_row_acceleration(acceleration);
    }
}

/// A row as recorded by [`RowBuffer`].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ConstraintRow {
    /// Child-side Jacobian.
    pub jacobian0: Jacobian,
    /// Parent-side Jacobian.
    pub jacobian1: Jacobian,
    /// Target relative acceleration.
    pub acceleration: f64,
}

/// A sink that records rows, for hosts that gather rows before solving.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RowBuffer {
    rows: Vec<ConstraintRow>,
}

impl RowBuffer {
    /// Create an empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorded rows, in submission order.
    #[must_use]
    pub fn rows(&self) -> &[ConstraintRow] {
        &self.rows
    }

    /// The most recent row.
    #[must_use]
    pub fn last(&self) -> Option<&ConstraintRow> {
        self.rows.last()
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Check if no row was submitted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl ConstraintRowSink for RowBuffer {
    fn add_general_row(&mut self, jacobian0: &Jacobian, jacobian1: &Jacobian) {
        self.rows.push(ConstraintRow {
            jacobian0: *jacobian0,
            jacobian1: *jacobian1,
            acceleration: 0.0,
        });
    }

    fn set_row_acceleration(&mut self, acceleration: f64) {
        match self.rows.last_mut() {
            Some(row) => row.acceleration = acceleration,
            None => warn!(acceleration, "row acceleration set before any row was added"),
        }
    }
}

/// The single row a gear joint derives for one step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GearRow {
    /// Child-side Jacobian.
    pub jacobian0: Jacobian,
    /// Parent-side Jacobian.
    pub jacobian1: Jacobian,
    /// Current constraint-velocity error.
    pub relative_omega: f64,
    /// Bias acceleration handed to the solver.
    pub acceleration: f64,
}

impl GearRow {
    /// Derive the row from the two angular sensitivity directions.
    ///
    /// `omega0` and `omega1` are the bodies' world angular velocities.
    #[must_use]
    pub fn derive(
        dir0_cross: Vector3<f64>,
        dir1_cross: Vector3<f64>,
        omega0: &Vector3<f64>,
        omega1: &Vector3<f64>,
        timestep: f64,
        velocity_correction: f64,
    ) -> Self {
        let jacobian0 = Jacobian::angular(dir0_cross);
        let jacobian1 = Jacobian::angular(dir1_cross);

        let relative_omega = omega0.dot(&dir0_cross) + omega1.dot(&dir1_cross);
        let acceleration = -velocity_correction * relative_omega * inverse_timestep(timestep);

        Self {
            jacobian0,
            jacobian1,
            relative_omega,
            acceleration,
        }
    }

    /// Hand the row to the solver: one append, then its acceleration.
    pub fn submit<S: ConstraintRowSink + ?Sized>(&self, sink: &mut S) {
        sink.add_general_row(&self.jacobian0, &self.jacobian1);
        sink.set_row_acceleration(self.acceleration);
    }
}

/// `1 / timestep`, or `1` when the step is not positive.
#[must_use]
pub fn inverse_timestep(timestep: f64) -> f64 {
    if timestep > 0.0 { 1.0 / timestep } else { 1.0 }
}
