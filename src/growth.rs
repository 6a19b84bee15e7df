//! Chunk capacity growth policies

use std::fmt::Debug;

/// Decides the capacity of freshly allocated chunks.
///
/// Recycled chunks keep whatever capacity they had; the policy is only
/// consulted when a store has to allocate.
pub trait GrowthPolicy: Debug + Send + Sync {
    /// Capacity of the first chunk of an empty store
    fn initial_capacity(&self, init_capacity: usize, max_capacity: usize) -> usize {
        init_capacity.min(max_capacity)
    }

    /// Capacity of the chunk following one with `prev_capacity`
    fn next_capacity(&self, prev_capacity: usize, max_capacity: usize) -> usize;
}

/// Double the previous capacity, capped at the maximum
#[derive(Clone, Copy, Debug, Default)]
pub struct Doubling;

impl GrowthPolicy for Doubling {
    fn next_capacity(&self, prev_capacity: usize, max_capacity: usize) -> usize {
        prev_capacity.saturating_mul(2).clamp(1, max_capacity.max(1))
    }
}

/// Keep every chunk at the initial capacity
#[derive(Clone, Copy, Debug)]
pub struct Fixed {
    pub capacity: usize,
}

impl GrowthPolicy for Fixed {
    fn initial_capacity(&self, _init_capacity: usize, max_capacity: usize) -> usize {
        self.capacity.min(max_capacity)
    }

    fn next_capacity(&self, _prev_capacity: usize, max_capacity: usize) -> usize {
        self.capacity.min(max_capacity)
    }
}
