//! a discrete random sampler over weighted values

use error::Error;
use rand::{self, Rng};
use rand::distributions::{IndependentSample, Range};

/// draws values at random, each with probability proportional to its weight
#[derive(Clone, Debug)]
pub struct WeightedSampler {
    // (value, running total of weights up to and including this value)
    cumulative: Vec<(i64, f64)>,
    total: f64,
}

impl WeightedSampler {
    /// create a sampler from `(value, weight)` pairs
    ///
    /// weights need not sum to 1, they are normalized by their total
    pub fn new(weights: Vec<(i64, f64)>) -> Result<WeightedSampler, Error> {
        if weights.is_empty() {
            return Err(Error::InvalidArgument("sampler needs at least one value"));
        }
        let mut total = 0.0;
        let mut cumulative = Vec::with_capacity(weights.len());
        for (value, weight) in weights {
            if !weight.is_finite() || weight < 0.0 {
                return Err(Error::InvalidArgument("sampler weights must be finite and non-negative"));
            }
            if weight > 0.0 {
                total += weight;
                cumulative.push((value, total));
            }
        }
        if total <= 0.0 || !total.is_finite() {
            return Err(Error::InvalidArgument("sampler weights must have a positive total"));
        }
        Ok(WeightedSampler {
            cumulative: cumulative,
            total: total,
        })
    }

    /// the sum of all weights
    pub fn total(&self) -> f64 {
        self.total
    }

    /// draw a value using the thread-local generator
    pub fn sample(&self) -> i64 {
        self.sample_with(&mut rand::thread_rng())
    }

    /// draw a value using `rng`
    pub fn sample_with<R: Rng>(&self, rng: &mut R) -> i64 {
        let draw = Range::new(0.0, self.total).ind_sample(rng);
        for &(value, upto) in &self.cumulative {
            if draw < upto {
                return value;
            }
        }
        // rounding in the running total can leave the draw just past the end
        self.cumulative[self.cumulative.len() - 1].0
    }
}

#[cfg(test)]
mod tests {
    use super::WeightedSampler;
    use common::is_between;
    use fnv::FnvHashMap;
    use rand;

    fn frequencies(sampler: &WeightedSampler, draws: usize) -> FnvHashMap<i64, f64> {
        let mut rng = rand::thread_rng();
        let mut counts = FnvHashMap::default();
        for _ in 0..draws {
            *counts.entry(sampler.sample_with(&mut rng)).or_insert(0.0) += 1.0;
        }
        for v in counts.values_mut() {
            *v /= draws as f64;
        }
        counts
    }

    #[test]
    fn rejects_bad_weights() {
        assert!(WeightedSampler::new(vec![]).is_err());
        assert!(WeightedSampler::new(vec![(1, -0.5), (2, 1.0)]).is_err());
        assert!(WeightedSampler::new(vec![(1, ::std::f64::NAN)]).is_err());
        assert!(WeightedSampler::new(vec![(1, ::std::f64::INFINITY)]).is_err());
        assert!(WeightedSampler::new(vec![(1, 0.0), (2, 0.0)]).is_err());
        assert!(WeightedSampler::new(vec![(1, 0.0), (2, 0.1)]).is_ok());
    }

    #[test]
    fn single_value() {
        let sampler = WeightedSampler::new(vec![(42, 0.3)]).unwrap();
        for _ in 0..100 {
            assert_eq!(sampler.sample(), 42);
        }
    }

    #[test]
    fn zero_weight_is_never_drawn() {
        let sampler = WeightedSampler::new(vec![(1, 0.0), (2, 1.0), (3, 0.0)]).unwrap();
        let freq = frequencies(&sampler, 10_000);
        assert_eq!(freq.len(), 1);
        assert_eq!(freq.get(&2), Some(&1.0));
    }

    #[test]
    fn follows_weights() {
        let sampler = WeightedSampler::new(vec![(-1, 0.01), (2, 0.3), (3, 0.58), (4, 0.1), (5, 0.01)])
            .unwrap();
        assert!(is_between(sampler.total(), 0.999, 1.001));
        let freq = frequencies(&sampler, 1_000_000);
        for &(value, weight) in &[(-1, 0.01), (2, 0.3), (3, 0.58), (4, 0.1), (5, 0.01)] {
            let seen = freq.get(&value).cloned().unwrap_or(0.0);
            if !is_between(seen, weight * 0.9, weight * 1.1) {
                panic!("value: {} frequency: {} outside of range", value, seen);
            }
        }
    }

    #[test]
    fn unnormalized_weights() {
        let sampler = WeightedSampler::new(vec![(10, 1.0), (20, 3.0)]).unwrap();
        let freq = frequencies(&sampler, 100_000);
        let seen = freq.get(&20).cloned().unwrap_or(0.0);
        assert!(is_between(seen, 0.7, 0.8), "frequency: {}", seen);
    }
}
