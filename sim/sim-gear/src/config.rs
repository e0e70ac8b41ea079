//! Configuration for batched row submission.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Controls how [`submit_rows_parallel`](crate::submit_rows_parallel)
/// spreads joints across threads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ParallelConfig {
    /// Submit rows from the rayon pool.
    ///
    /// Joints are read-only during submission, so the result is identical
    /// either way; this only trades thread overhead for throughput.
    pub parallel_rows: bool,

    /// Minimum number of joints before the pool is used.
    ///
    /// A gear row costs a handful of cross products, so small batches are
    /// faster on the calling thread.
    pub min_joints_for_parallel: usize,
}

impl Default for ParallelConfig {
    fn default() -> Self {
        Self {
            parallel_rows: true,
            min_joints_for_parallel: 32,
        }
    }
}

impl ParallelConfig {
    /// Always submit on the calling thread.
    #[must_use]
    pub const fn sequential() -> Self {
        Self {
            parallel_rows: false,
            min_joints_for_parallel: usize::MAX,
        }
    }

    /// Set the minimum batch size for parallel submission.
    #[must_use]
    pub const fn with_min_joints(mut self, min_joints: usize) -> Self {
        self.min_joints_for_parallel = min_joints;
        self
    }

    /// Whether a batch of `joint_count` joints goes to the pool.
    #[must_use]
    pub const fn use_parallel(&self, joint_count: usize) -> bool {
        self.parallel_rows && joint_count >= self.min_joints_for_parallel
    }
}
