use rand::Rng;
use rand_distr::{Distribution, Uniform};

use super::ParamGen;
use crate::error::{NomadErr, Result};

/// A parameter generator that follows a certain probabilistic distribution.
pub struct RandParamGen<'r, R: Rng, D: Distribution<f64>> {
    rng: &'r mut R,
    distribution: D,
    remaining: usize,
}

impl<'r, R: Rng, D: Distribution<f64>> RandParamGen<'r, R, D> {
    /// Creates a new `RandParamGen` parameter generator.
    ///
    /// # Arguments
    /// * `rng` - A random number generator.
    /// * `distribution` - The distribution to sample the random numbers from.
    /// * `limit` - The maximum amount of numbers to generate.
    pub fn new(rng: &'r mut R, distribution: D, limit: usize) -> Self {
        Self {
            rng,
            distribution,
            remaining: limit,
        }
    }
}

impl<'r, R: Rng> RandParamGen<'r, R, Uniform<f64>> {
    /// Creates a new `RandParamGen` parameter generator with a uniform distribution.
    ///
    /// # Arguments
    /// * `rng` - A random number generator.
    /// * `limit` - The maximum amount of numbers to generate.
    /// * `low` - The inclusive lower limit.
    /// * `high` - The exclusive upper limit.
    ///
    /// # Returns
    /// A `Configuration` error if the range is empty or not finite.
    pub fn uniform(rng: &'r mut R, limit: usize, low: f64, high: f64) -> Result<Self> {
        let distribution = Uniform::new(low, high)
            .map_err(|e| NomadErr::Configuration(format!("uniform [{low}, {high}): {e}")))?;

        Ok(Self::new(rng, distribution, limit))
    }

    /// Creates a generator for embedding vectors of length `width`, drawing
    /// from `[0, 1/sqrt(width))`.
    ///
    /// # Arguments
    /// * `rng` - A random number generator.
    /// * `limit` - The maximum amount of numbers to generate.
    /// * `width` - The embedding dimension.
    pub fn embedding(rng: &'r mut R, limit: usize, width: usize) -> Result<Self> {
        let high = 1. / (width as f64).sqrt();
        Self::uniform(rng, limit, 0., high)
    }
}

impl<R: Rng, D: Distribution<f64>> ParamGen for RandParamGen<'_, R, D> {
    fn sample(&mut self, mut n: usize) -> Option<Vec<f64>> {
        if self.remaining == 0 {
            return None;
        }

        n = n.min(self.remaining);
        self.remaining -= n;

        let sample = (0..n)
            .map(|_| self.distribution.sample(&mut *self.rng))
            .collect();

        Some(sample)
    }
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;

    #[test]
    fn embedding_values_stay_in_range() {
        const WIDTH: usize = 4;
        let mut rng = StdRng::seed_from_u64(42);

        let mut param_gen = RandParamGen::embedding(&mut rng, 1000, WIDTH).unwrap();
        let sample = param_gen.sample(1000).unwrap();

        assert_eq!(sample.len(), 1000);
        assert!(sample.iter().all(|&v| (0. ..0.5).contains(&v)));
        assert!(param_gen.sample(1).is_none());
    }

    #[test]
    fn same_seed_same_values() {
        let mut a = StdRng::seed_from_u64(3);
        let mut b = StdRng::seed_from_u64(3);

        let x = RandParamGen::embedding(&mut a, 8, 2).unwrap().sample(8);
        let y = RandParamGen::embedding(&mut b, 8, 2).unwrap().sample(8);
        assert_eq!(x, y);
    }

    #[test]
    fn empty_range_is_rejected() {
        let mut rng = StdRng::seed_from_u64(0);
        let err = RandParamGen::uniform(&mut rng, 1, 1., 1.).err().unwrap();
        assert!(matches!(err, NomadErr::Configuration(_)));
    }
}
