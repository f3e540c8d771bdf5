//! No-repeat tip selection
//!
//! Tips are drawn from a shuffled working pool. Every tip in the store is
//! drawn exactly once per pass; an empty pool is refilled with a fresh
//! permutation of the whole store before the next draw.

use std::sync::Arc;

use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use crate::tips::{Tip, TipStore};

/// A tip drawn from the pool
#[derive(Debug, Clone, Copy)]
pub struct Selection<'a> {
    /// Position of the tip in the store
    pub index: usize,
    /// The tip itself
    pub tip: &'a Tip,
}

/// Draws tips without repeats until the pool runs dry
pub struct TipSelector<R = StdRng> {
    store: Arc<TipStore>,
    pool: Vec<usize>,
    rng: R,
}

impl TipSelector<StdRng> {
    /// Create a selector seeded from OS entropy
    #[must_use]
    pub fn new(store: Arc<TipStore>) -> Self {
        Self::with_rng(store, StdRng::from_entropy())
    }
}

impl<R: Rng> TipSelector<R> {
    /// Create a selector with an explicit RNG
    ///
    /// The pool starts empty, so the first draw performs the first shuffle.
    #[must_use]
    pub const fn with_rng(store: Arc<TipStore>, rng: R) -> Self {
        Self {
            store,
            pool: Vec::new(),
            rng,
        }
    }

    /// Draw the next tip, refilling the pool first if it is empty
    pub fn next(&mut self) -> Selection<'_> {
        if self.pool.is_empty() {
            self.refill();
        }

        let slot = self.rng.gen_range(0..self.pool.len());
        let index = self.pool.swap_remove(slot);

        tracing::debug!(index, remaining = self.pool.len(), "selected tip");

        Selection {
            index,
            // Pool entries always index into the store they were built from
            tip: &self.store.as_slice()[index],
        }
    }

    /// Put a drawn tip back into the current pass
    ///
    /// Ignores indices outside the store and tips already in the pool.
    pub fn restore(&mut self, index: usize) {
        if index < self.store.len() && !self.pool.contains(&index) {
            self.pool.push(index);
        }
    }

    /// Tips left in the current pass
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.pool.len()
    }

    /// Indices still waiting in the current pass
    #[must_use]
    pub fn pool(&self) -> &[usize] {
        &self.pool
    }

    /// The backing store
    #[must_use]
    pub fn store(&self) -> &TipStore {
        &self.store
    }

    fn refill(&mut self) {
        self.pool = (0..self.store.len()).collect();
        self.pool.shuffle(&mut self.rng);
        tracing::debug!(size = self.pool.len(), "reshuffled tip pool");
    }
}
