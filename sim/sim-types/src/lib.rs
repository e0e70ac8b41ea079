//! Core types for rigid body state.
//!
//! - [`BodyId`] - Opaque handle to a body owned by the host engine
//! - [`Pose`] - World position and orientation
//! - [`Twist`] - Linear and angular velocity
//! - [`RigidBodyState`] - Pose plus twist, the snapshot a solver pass reads
//!
//! These types are **pure data**. They carry no integration or solving
//! logic; constraint crates read them and the host engine produces them.
//!
//! # Layer 0
//!
//! This is a Layer 0 crate with **zero Bevy dependencies**.
//!
//! # Coordinate System
//!
//! - X: right
//! - Y: forward
//! - Z: up
//! - Right-handed
//!
//! # Example
//!
//! ```
//! use sim_types::{Pose, RigidBodyState};
//! use nalgebra::{Point3, Vector3};
//!
//! let state = RigidBodyState::spinning(
//!     Pose::from_position(Point3::new(0.0, 0.0, 1.0)),
//!     Vector3::new(0.0, 0.0, 2.0),
//! );
//!
//! assert_eq!(state.pose.position.z, 1.0);
//! assert!(state.twist.linear.norm() < 1e-10);
//! ```

#![doc(html_root_url = "https://docs.rs/sim-types/0.7.0")]
#![deny(clippy::unwrap_used, clippy::expect_used)]
#![warn(missing_docs)]
#![allow(clippy::missing_const_for_fn)]

mod body;

pub use body::{BodyId, Pose, RigidBodyState, Twist};

// Re-export math types for convenience
pub use nalgebra::{Isometry3, Point3, UnitQuaternion, Vector3};
