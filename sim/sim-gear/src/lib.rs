//! Gear constraints for iterative rigid body solvers.
//!
//! A gear couples the spin of two bodies about their pin axes so that
//!
//! ```text
//! ratio · ω_child · pin_child + ω_parent · pin_parent = 0
//! ```
//!
//! Each step a gear derives exactly one constraint row (two angular
//! Jacobians and a bias acceleration) and hands it to the host solver
//! through [`ConstraintRowSink`]. The crate never integrates bodies or
//! solves the system itself.
//!
//! # Joint Types
//!
//! - [`GearConstraint`]: Plain two-body gear
//! - [`SatelliteGearConstraint`]: Gear whose parent side is measured in a
//!   carrier body's frame (planetary trains)
//! - [`GearJoint`]: Either of the above, for hosts that store joints in one
//!   collection
//!
//! # Bias Acceleration
//!
//! ```text
//! accel = -β · (ω0 · a0 + ω1 · a1) / dt
//! ```
//!
//! `β` defaults to [`DEFAULT_VELOCITY_CORRECTION`]; a non-positive `dt` is
//! treated as `1 / dt = 1`.
//!
//! # Persistence
//!
//! Joints write a flat little-endian scalar stream through [`ScalarSink`]
//! and read it back through [`ScalarSource`]. [`save_joint`] and
//! [`load_joint`] wrap that stream in a self-describing record. The
//! [`FormatVersion::Legacy`] layout cannot hold satellite gears or a
//! non-default velocity correction.
//!
//! # Example
//!
//! ```
//! use sim_gear::{BodySnapshot, GearConstraint, GearJoint, ParallelConfig, submit_rows_parallel};
//! use sim_types::{BodyId, Pose, RigidBodyState};
//! use nalgebra::Vector3;
//!
//! let bodies = BodySnapshot::new()
//!     .with_body(
//!         BodyId::new(1),
//!         RigidBodyState::spinning(Pose::identity(), Vector3::new(0.0, 0.0, 4.0)),
//!     )
//!     .with_body(BodyId::new(2), RigidBodyState::at_rest(Pose::identity()));
//!
//! let joints: Vec<GearJoint> = vec![
//!     GearConstraint::new(2.0, Vector3::z(), Vector3::z(), BodyId::new(1), BodyId::new(2), &bodies)?
//!         .into(),
//! ];
//!
//! let rows = submit_rows_parallel(&joints, &bodies, 0.01, &ParallelConfig::default());
//! let row = rows[0].rows()[0];
//! assert!((row.acceleration + 400.0).abs() < 1e-9);
//! # Ok::<(), sim_gear::GearError>(())
//! ```
//!
//! # Layer 0 Crate
//!
//! This crate has no Bevy dependencies. Body state comes in through the
//! [`BodyStates`] trait, so any engine can drive it.

#![doc(html_root_url = "https://docs.rs/sim-gear/0.1.0")]
#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![warn(missing_docs)]
#![allow(clippy::missing_const_for_fn)]

mod bodies;
mod config;
mod error;
mod frame;
mod gear;
mod joint;
mod parallel;
mod persist;
mod row;
mod satellite;

pub use bodies::{BodySnapshot, BodyStates};
pub use config::ParallelConfig;
pub use error::{BodyRole, GearError};
pub use frame::AttachmentFrame;
pub use gear::GearConstraint;
pub use joint::{EXTRA_PARAMETER_COUNT, GearJoint, JointKind, JointRecord, LARGE_VALUE};
pub use parallel::{submit_rows_parallel, submit_rows_sequential};
pub use persist::{
    FormatVersion, RECORD_HEADER_SIZE, RECORD_MAGIC, RecordHeader, ScalarSink, ScalarSource,
    load_joint, load_joint_from_bytes, read_frame, read_real, save_joint, save_joint_to_bytes,
    write_frame, write_real,
};
pub use row::{
    ConstraintRow, ConstraintRowSink, DEFAULT_VELOCITY_CORRECTION, GearRow, Jacobian, RowBuffer,
    inverse_timestep,
};
pub use satellite::{SatelliteGearConstraint, normalize_side};

// Re-export the body handle so hosts need only this crate for the common path.
pub use sim_types::BodyId;

/// Result alias for gear operations.
pub type Result<T> = std::result::Result<T, GearError>;
