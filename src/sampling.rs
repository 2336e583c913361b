//! Random product sampling for prompts

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::sync::Mutex;

use crate::product::Product;

/// Draws the subset of products shown to the model for one query.
///
/// Each call draws afresh, so repeated identical queries see different
/// subsets. Construct with [`Sampler::seeded`] for reproducible draws.
pub struct Sampler {
    rng: Mutex<StdRng>,
}

impl Sampler {
    pub fn from_entropy() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    /// Up to `size` distinct products in random order
    pub fn sample(&self, products: &[Product], size: usize) -> Vec<Product> {
        let amount = size.min(products.len());
        let mut indices: Vec<usize> = (0..products.len()).collect();
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        let (picked, _) = indices.partial_shuffle(&mut *rng, amount);
        picked.iter().map(|&i| products[i].clone()).collect()
    }
}

impl Default for Sampler {
    fn default() -> Self {
        Self::from_entropy()
    }
}
