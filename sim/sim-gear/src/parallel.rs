//! Parallel row submission using rayon.
//!
//! Every joint writes into its own [`RowBuffer`], so the pass needs no
//! locking: the body snapshot is shared read-only and each buffer has a
//! single writer. The returned buffers are in joint order regardless of
//! which thread produced them.
//!
//! Small batches fall back to the calling thread (see
//! [`ParallelConfig::min_joints_for_parallel`]).

use rayon::prelude::*;
use tracing::debug;

use crate::bodies::BodyStates;
use crate::config::ParallelConfig;
use crate::joint::GearJoint;
use crate::row::RowBuffer;

/// Submit every joint's row, one buffer per joint.
///
/// The thread index handed to each joint is rayon's index for the worker
/// thread, or `0` on the calling thread.
pub fn submit_rows_parallel<B>(
    joints: &[GearJoint],
    bodies: &B,
    timestep: f64,
    config: &ParallelConfig,
) -> Vec<RowBuffer>
where
    B: BodyStates + Sync + ?Sized,
{
    if !config.use_parallel(joints.len()) {
        return submit_rows_sequential(joints, bodies, timestep);
    }

    debug!(joints = joints.len(), "submitting gear rows in parallel");
    joints
        .par_iter()
        .map(|joint| {
            let thread_index = rayon::current_thread_index().unwrap_or(0);
            let mut buffer = RowBuffer::new();
            joint.submit_rows(bodies, &mut buffer, timestep, thread_index);
            buffer
        })
        .collect()
}

/// Submit every joint's row on the calling thread.
pub fn submit_rows_sequential<B>(joints: &[GearJoint], bodies: &B, timestep: f64) -> Vec<RowBuffer>
where
    B: BodyStates + ?Sized,
{
    joints
        .iter()
        .map(|joint| {
            let mut buffer = RowBuffer::new();
            joint.submit_rows(bodies, &mut buffer, timestep, 0);
            buffer
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::bodies::BodySnapshot;
    use crate::gear::GearConstraint;
    use nalgebra::Vector3;
    use sim_types::{BodyId, Pose, RigidBodyState};

    fn chain(count: u64) -> (BodySnapshot, Vec<GearJoint>) {
        let mut bodies = BodySnapshot::new();
        for i in 0..=count {
            #[allow(clippy::cast_precision_loss)]
            let omega = Vector3::new(0.0, 0.0, i as f64);
            bodies.insert(BodyId::new(i), RigidBodyState::spinning(Pose::identity(), omega));
        }
        let joints = (0..count)
            .map(|i| {
                GearConstraint::new(
                    1.5,
                    Vector3::z(),
                    Vector3::z(),
                    BodyId::new(i + 1),
                    BodyId::new(i),
                    &bodies,
                )
                .unwrap()
                .into()
            })
            .collect();
        (bodies, joints)
    }

    #[test]
    fn test_empty_batch() {
        let bodies = BodySnapshot::new();
        let rows = submit_rows_parallel(&[], &bodies, 0.01, &ParallelConfig::default());
        assert!(rows.is_empty());
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let (bodies, joints) = chain(64);
        let parallel = submit_rows_parallel(
            &joints,
            &bodies,
            0.01,
            &ParallelConfig::default().with_min_joints(1),
        );
        let sequential = submit_rows_parallel(&joints, &bodies, 0.01, &ParallelConfig::sequential());

        assert_eq!(parallel.len(), joints.len());
        assert_eq!(parallel, sequential);
        assert!(parallel.iter().all(|buffer| buffer.len() == 1));
    }
}
