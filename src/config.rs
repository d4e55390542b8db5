use std::sync::atomic::{AtomicUsize, Ordering};

// Default heuristic value; flattening a geometry is cheap, so only large batches
// are worth spreading over the rayon pool.
const DEFAULT_PARALLEL_THRESHOLD: usize = 64;

static PARALLEL_THRESHOLD: AtomicUsize = AtomicUsize::new(DEFAULT_PARALLEL_THRESHOLD);

/// Number of geometries at or above which per-geometry flattening runs in parallel.
pub fn get_parallel_threshold() -> usize {
    PARALLEL_THRESHOLD.load(Ordering::Relaxed)
}

pub fn set_parallel_threshold(val: usize) {
    PARALLEL_THRESHOLD.store(val, Ordering::Relaxed);
}

/// What to do with a geometry that has no atoms.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EmptyGeometryPolicy {
    /// Fail the whole batch with `EmptyGeometry`.
    #[default]
    Reject,
    /// Drop it and number the remaining geometries contiguously.
    Skip,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchOptions {
    pub empty_geometry: EmptyGeometryPolicy,
    pub parallel: bool,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            empty_geometry: EmptyGeometryPolicy::Reject,
            parallel: true,
        }
    }
}
