//! Row derivation scenarios for plain and satellite gears.

#![allow(clippy::unwrap_used, clippy::float_cmp)]

use std::cell::RefCell;

use approx::assert_relative_eq;
use nalgebra::{Point3, UnitQuaternion, Vector3};
use sim_gear::{
    BodyId, BodySnapshot, BodyStates, ConstraintRowSink, GearConstraint, GearError, GearJoint, Jacobian,
    RowBuffer, SatelliteGearConstraint,
};
use sim_types::{Pose, RigidBodyState};

const CHILD: BodyId = BodyId::new(10);
const PARENT: BodyId = BodyId::new(20);
const CARRIER: BodyId = BodyId::new(30);

fn two_bodies(omega0: Vector3<f64>, omega1: Vector3<f64>) -> BodySnapshot {
    BodySnapshot::new()
        .with_body(CHILD, RigidBodyState::spinning(Pose::identity(), omega0))
        .with_body(PARENT, RigidBodyState::spinning(Pose::identity(), omega1))
}

/// Records every call so the call order can be checked.
#[derive(Default)]
struct CallLog {
    calls: Vec<&'static str>,
    accelerations: Vec<f64>,
}

impl ConstraintRowSink for CallLog {
    fn add_general_row(&mut self, _jacobian0: &Jacobian, _jacobian1: &Jacobian) {
        self.calls.push("add_general_row");
    }

    fn set_row_acceleration(&mut self, acceleration: f64) {
        self.calls.push("set_row_acceleration");
        self.accelerations.push(acceleration);
    }
}

#[test]
fn coincident_bodies_at_rest_give_zero_bias() {
    let bodies = two_bodies(Vector3::zeros(), Vector3::zeros());
    let gear = GearConstraint::new(2.0, Vector3::z(), Vector3::z(), CHILD, PARENT, &bodies).unwrap();

    let mut rows = RowBuffer::new();
    gear.submit_rows(&bodies, &mut rows, 0.01, 0);

    assert_eq!(rows.len(), 1);
    assert_eq!(rows.rows()[0].acceleration, 0.0);
}

#[test]
fn spinning_child_is_decelerated() {
    let bodies = two_bodies(Vector3::new(0.0, 0.0, 4.0), Vector3::zeros());
    let gear = GearConstraint::new(2.0, Vector3::z(), Vector3::z(), CHILD, PARENT, &bodies).unwrap();

    let row = gear.compute_row(&bodies, 0.01);

    // ratio · ω0 = 8, removed at half strength over 0.01 s.
    assert_relative_eq!(row.relative_omega, 8.0, epsilon = 1e-12);
    assert_relative_eq!(row.acceleration, -400.0, epsilon = 1e-9);
    assert!(row.acceleration * row.relative_omega < 0.0);
}

#[test]
fn jacobians_are_purely_angular() {
    let bodies = two_bodies(Vector3::zeros(), Vector3::zeros());
    let gear = GearConstraint::new(3.0, Vector3::new(1.0, 1.0, 0.0), Vector3::y(), CHILD, PARENT, &bodies)
        .unwrap();

    let row = gear.compute_row(&bodies, 0.01);
    assert_eq!(row.jacobian0.linear, Vector3::zeros());
    assert_eq!(row.jacobian1.linear, Vector3::zeros());

    let pin0 = Vector3::new(1.0, 1.0, 0.0).normalize();
    assert_relative_eq!(row.jacobian0.angular, pin0 * 3.0, epsilon = 1e-12);
    assert_relative_eq!(row.jacobian1.angular, Vector3::y(), epsilon = 1e-12);
}

#[test]
fn equal_and_opposite_spin_has_no_error() {
    // Aligned pins, opposite spins.
    let bodies = two_bodies(Vector3::new(0.0, 0.0, 4.0), Vector3::new(0.0, 0.0, -4.0));
    let gear = GearConstraint::new(1.0, Vector3::z(), Vector3::z(), CHILD, PARENT, &bodies).unwrap();
    assert_relative_eq!(gear.compute_row(&bodies, 0.01).relative_omega, 0.0, epsilon = 1e-12);

    // Antiparallel pins: the same world spin reads as opposite spins.
    let bodies = two_bodies(Vector3::new(0.0, 0.0, 4.0), Vector3::new(0.0, 0.0, 4.0));
    let gear = GearConstraint::new(1.0, Vector3::z(), -Vector3::z(), CHILD, PARENT, &bodies).unwrap();
    assert_relative_eq!(gear.compute_row(&bodies, 0.01).relative_omega, 0.0, epsilon = 1e-12);
}

#[test]
fn row_follows_body_rotation() {
    let bodies = two_bodies(Vector3::zeros(), Vector3::zeros());
    let gear = GearConstraint::new(1.0, Vector3::z(), Vector3::z(), CHILD, PARENT, &bodies).unwrap();

    let tilt = UnitQuaternion::from_axis_angle(&Vector3::x_axis(), std::f64::consts::FRAC_PI_2);
    let moved = BodySnapshot::new()
        .with_body(CHILD, RigidBodyState::at_rest(Pose::from_rotation(tilt)))
        .with_body(PARENT, RigidBodyState::at_rest(Pose::identity()));

    // Child's local Z now points along world -Y.
    let row = gear.compute_row(&moved, 0.01);
    assert_relative_eq!(row.jacobian0.angular, -Vector3::y(), epsilon = 1e-12);
    assert_relative_eq!(row.jacobian1.angular, Vector3::z(), epsilon = 1e-12);
}

#[test]
fn translation_does_not_change_the_row() {
    let bodies = two_bodies(Vector3::new(1.0, 2.0, 3.0), Vector3::new(-1.0, 0.5, 0.0));
    let gear = GearConstraint::new(1.5, Vector3::x(), Vector3::z(), CHILD, PARENT, &bodies).unwrap();
    let at_origin = gear.compute_row(&bodies, 0.02);

    let shifted = BodySnapshot::new()
        .with_body(
            CHILD,
            RigidBodyState::spinning(
                Pose::from_position(Point3::new(5.0, -3.0, 2.0)),
                Vector3::new(1.0, 2.0, 3.0),
            ),
        )
        .with_body(
            PARENT,
            RigidBodyState::spinning(
                Pose::from_position(Point3::new(-7.0, 0.0, 1.0)),
                Vector3::new(-1.0, 0.5, 0.0),
            ),
        );
    let moved = gear.compute_row(&shifted, 0.02);

    assert_relative_eq!(moved.acceleration, at_origin.acceleration, epsilon = 1e-12);
    assert_relative_eq!(moved.jacobian0.angular, at_origin.jacobian0.angular, epsilon = 1e-12);
}

#[test]
fn submission_is_one_add_then_one_acceleration() {
    let bodies = two_bodies(Vector3::new(0.0, 0.0, 1.0), Vector3::zeros());
    let joints: Vec<GearJoint> = vec![
        GearConstraint::new(1.0, Vector3::z(), Vector3::z(), CHILD, PARENT, &bodies)
            .unwrap()
            .into(),
        SatelliteGearConstraint::new(
            1.0,
            Vector3::z(),
            Vector3::z(),
            CHILD,
            PARENT,
            None,
            1.0,
            &bodies,
        )
        .unwrap()
        .into(),
    ];

    for joint in &joints {
        let mut log = CallLog::default();
        joint.submit_rows(&bodies, &mut log, 0.1, 0);
        assert_eq!(log.calls, ["add_general_row", "set_row_acceleration"]);
        assert_relative_eq!(log.accelerations[0], -5.0, epsilon = 1e-12);
    }
}

#[test]
fn missing_bodies_act_as_static_world() {
    let bodies = BodySnapshot::new()
        .with_body(CHILD, RigidBodyState::spinning(Pose::identity(), Vector3::new(0.0, 0.0, 2.0)));
    let gear = GearConstraint::new(1.0, Vector3::z(), Vector3::z(), CHILD, PARENT, &bodies).unwrap();

    let row = gear.compute_row(&bodies, 0.5);
    assert_relative_eq!(row.relative_omega, 2.0, epsilon = 1e-12);
    assert_relative_eq!(row.acceleration, -2.0, epsilon = 1e-12);
}

#[test]
fn degenerate_inputs_are_rejected() {
    let bodies = two_bodies(Vector3::zeros(), Vector3::zeros());

    let err = GearConstraint::new(1.0, Vector3::zeros(), Vector3::z(), CHILD, PARENT, &bodies)
        .unwrap_err();
    assert!(matches!(err, GearError::DegenerateAxis { .. }));
    assert!(err.is_precondition());

    let err = GearConstraint::new(f64::NAN, Vector3::z(), Vector3::z(), CHILD, PARENT, &bodies)
        .unwrap_err();
    assert!(matches!(err, GearError::InvalidRatio(_)));

    let err = SatelliteGearConstraint::new(
        1.0,
        Vector3::z(),
        Vector3::new(f64::INFINITY, 0.0, 0.0),
        CHILD,
        PARENT,
        Some(CARRIER),
        1.0,
        &bodies,
    )
    .unwrap_err();
    assert!(matches!(err, GearError::DegenerateAxis { .. }));
}

#[test]
fn satellite_tracks_spinning_carrier() {
    let mut bodies = BodySnapshot::new()
        .with_body(CHILD, RigidBodyState::at_rest(Pose::identity()))
        .with_body(PARENT, RigidBodyState::at_rest(Pose::identity()))
        .with_body(CARRIER, RigidBodyState::at_rest(Pose::identity()));

    let satellite = SatelliteGearConstraint::new(
        1.0,
        Vector3::z(),
        Vector3::z(),
        CHILD,
        PARENT,
        Some(CARRIER),
        1.0,
        &bodies,
    )
    .unwrap();
    let before = satellite.compute_row(&bodies, 0.01);

    let half_turn = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), std::f64::consts::PI);
    if let Some(carrier) = bodies.get_mut(CARRIER) {
        carrier.pose.rotation = half_turn;
    }
    let after = satellite.compute_row(&bodies, 0.01);

    assert_relative_eq!(after.jacobian1.angular, -before.jacobian1.angular, epsilon = 1e-12);
    assert_relative_eq!(after.jacobian0.angular, before.jacobian0.angular, epsilon = 1e-12);
}

/// Forwards to a snapshot and records every body lookup.
struct CountingBodies {
    inner: BodySnapshot,
    lookups: RefCell<Vec<BodyId>>,
}

impl CountingBodies {
    fn new(inner: BodySnapshot) -> Self {
        Self {
            inner,
            lookups: RefCell::new(Vec::new()),
        }
    }

    fn take_lookups(&self) -> Vec<BodyId> {
        let mut lookups = self.lookups.take();
        lookups.sort();
        lookups
    }
}

impl BodyStates for CountingBodies {
    fn body_state(&self, id: BodyId) -> Option<RigidBodyState> {
        self.lookups.borrow_mut().push(id);
        self.inner.body_state(id)
    }
}

#[test]
fn each_body_is_looked_up_once_per_row() {
    // PARENT is deliberately missing: it still resolves to the world once.
    let bodies = CountingBodies::new(
        BodySnapshot::new()
            .with_body(CHILD, RigidBodyState::spinning(Pose::identity(), Vector3::z()))
            .with_body(CARRIER, RigidBodyState::at_rest(Pose::identity())),
    );

    let gear = GearConstraint::new(1.0, Vector3::z(), Vector3::z(), CHILD, PARENT, &bodies).unwrap();
    let satellite = SatelliteGearConstraint::new(
        1.0,
        Vector3::z(),
        Vector3::z(),
        CHILD,
        PARENT,
        Some(CARRIER),
        1.0,
        &bodies,
    )
    .unwrap();
    bodies.take_lookups();

    let _ = gear.compute_row(&bodies, 0.01);
    assert_eq!(bodies.take_lookups(), vec![CHILD, PARENT]);

    let mut rows = RowBuffer::new();
    satellite.submit_rows(&bodies, &mut rows, 0.01, 0);
    assert_eq!(bodies.take_lookups(), vec![CHILD, PARENT, CARRIER]);
}
