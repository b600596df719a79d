//! Random draws used by the count model.

use crate::error::{BenchError, Result};
use crate::params::{rank_order, ParameterTable};
use crate::simulate::constants::DISPERSION_WINDOW;
use rand::seq::SliceRandom;
use rand::Rng;
use rand_distr::{Distribution, Gamma, Poisson};

/// Draw from NB(mean, dispersion) as a Gamma–Poisson mixture.
///
/// Variance is `mean + dispersion * mean^2`; a non-positive dispersion
/// degenerates to Poisson(mean).
pub fn negative_binomial<R: Rng + ?Sized>(rng: &mut R, mean: f64, dispersion: f64) -> Result<u64> {
    if !(mean > 0.0) || !mean.is_finite() {
        return Ok(0);
    }
    let lambda = if dispersion > 0.0 {
        let gamma = Gamma::new(1.0 / dispersion, mean * dispersion)
            .map_err(|e| BenchError::Numerical(format!("gamma({}, {}): {}", mean, dispersion, e)))?;
        gamma.sample(rng)
    } else {
        mean
    };
    if !(lambda > 0.0) {
        return Ok(0);
    }
    let poisson = Poisson::new(lambda)
        .map_err(|e| BenchError::Numerical(format!("poisson({}): {}", lambda, e)))?;
    let draw: f64 = poisson.sample(rng);
    Ok(draw.max(0.0).round() as u64)
}

/// Sample `n` distinct indices from `0..len` in random order.
pub fn sample_indices<R: Rng + ?Sized>(rng: &mut R, len: usize, n: usize) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..len).collect();
    let (chosen, _) = indices.partial_shuffle(rng, n.min(len));
    chosen.to_vec()
}

/// Scatter `values` (ascending by their own mean) onto `targets` by mean rank:
/// the target with the r-th smallest mean receives `values[r]`.
pub fn assign_by_rank(targets: &[f64], values: &[f64]) -> Vec<f64> {
    let mut out = vec![0.0; targets.len()];
    for (rank, &target_idx) in rank_order(targets).iter().enumerate() {
        out[target_idx] = values[rank.min(values.len().saturating_sub(1))];
    }
    out
}

/// Dispersions of one group stratum, sorted by mean for window lookups.
#[derive(Debug, Clone)]
pub struct DispersionPool {
    means: Vec<f64>,
    dispersions: Vec<f64>,
}

impl DispersionPool {
    pub fn new(table: &ParameterTable) -> Result<Self> {
        if table.is_empty() {
            return Err(BenchError::EmptyData("dispersion stratum has no genes".to_string()));
        }
        let params = table.params();
        let order = rank_order(&table.means());
        Ok(Self {
            means: order.iter().map(|&i| params[i].mean).collect(),
            dispersions: order.iter().map(|&i| params[i].dispersion).collect(),
        })
    }

    /// Draw a dispersion for a gene of the given mean.
    ///
    /// Picks uniformly among stratum genes whose mean lies strictly within
    /// `DISPERSION_WINDOW` of `mean`; if there are none, takes the gene with
    /// the closest mean (the smaller mean on ties) without consuming randomness.
    pub fn draw<R: Rng + ?Sized>(&self, rng: &mut R, mean: f64) -> f64 {
        let lo = self.means.partition_point(|&m| m <= mean - DISPERSION_WINDOW);
        let hi = self.means.partition_point(|&m| m < mean + DISPERSION_WINDOW);
        if lo < hi {
            return self.dispersions[rng.gen_range(lo..hi)];
        }

        let idx = self.means.partition_point(|&m| m < mean);
        let closest = match (idx.checked_sub(1), self.means.get(idx)) {
            (Some(prev), Some(&next)) => {
                if (mean - self.means[prev]).abs() <= (next - mean).abs() {
                    prev
                } else {
                    idx
                }
            }
            (Some(prev), None) => prev,
            (None, _) => idx,
        };
        self.dispersions[closest]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::GeneParams;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    fn pool() -> DispersionPool {
        let table = ParameterTable::new(
            vec!["a".into(), "b".into(), "c".into()],
            vec![
                GeneParams::new(500.0, 0.3),
                GeneParams::new(10.0, 0.1),
                GeneParams::new(25.0, 0.2),
            ],
        )
        .unwrap();
        DispersionPool::new(&table).unwrap()
    }

    #[test]
    fn test_negative_binomial_moments() {
        let mut rng = ChaCha20Rng::seed_from_u64(7);
        let n = 20_000;
        let draws: Vec<f64> = (0..n)
            .map(|_| negative_binomial(&mut rng, 50.0, 0.2).unwrap() as f64)
            .collect();
        let mean = draws.iter().sum::<f64>() / n as f64;
        let var = draws.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
        // variance = 50 + 0.2 * 2500 = 550
        assert!((mean - 50.0).abs() < 1.5, "mean {}", mean);
        assert!((var - 550.0).abs() < 60.0, "variance {}", var);
    }

    #[test]
    fn test_negative_binomial_degenerate() {
        let mut rng = ChaCha20Rng::seed_from_u64(1);
        assert_eq!(negative_binomial(&mut rng, 0.0, 0.5).unwrap(), 0);
        assert_eq!(negative_binomial(&mut rng, f64::NAN, 0.5).unwrap(), 0);
        let draw = negative_binomial(&mut rng, 10.0, 0.0).unwrap();
        assert!(draw < 40);
    }

    #[test]
    fn test_sample_indices_distinct() {
        let mut rng = ChaCha20Rng::seed_from_u64(3);
        let mut picked = sample_indices(&mut rng, 100, 40);
        assert_eq!(picked.len(), 40);
        picked.sort_unstable();
        picked.dedup();
        assert_eq!(picked.len(), 40);
    }

    #[test]
    fn test_assign_by_rank() {
        let out = assign_by_rank(&[30.0, 10.0, 20.0], &[0.1, 0.2, 0.3]);
        assert_eq!(out, vec![0.3, 0.1, 0.2]);
    }

    #[test]
    fn test_pool_window_and_fallback() {
        let pool = pool();
        let mut rng = ChaCha20Rng::seed_from_u64(11);
        // 10 and 25 are inside (0, 40)
        for _ in 0..20 {
            let d = pool.draw(&mut rng, 20.0);
            assert!(d == 0.1 || d == 0.2);
        }
        // nothing within the window around 200; 25 is closer than 500
        assert_eq!(pool.draw(&mut rng, 200.0), 0.2);
        assert_eq!(pool.draw(&mut rng, 1000.0), 0.3);
    }
}
