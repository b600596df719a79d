//! Outlier injection applied to a simulated count matrix after the base draw.
//!
//! Cells are visited sample by sample (all genes of sample 1, then sample 2,
//! ...) so the random stream consumed by each mode is fixed by the matrix
//! shape alone.

use crate::condition::OutlierMode;
use crate::params::rank_order;
use crate::simulate::constants::{
    DISPERSED_FACTOR, DISPERSED_PERCENT, DOWNWEIGHT_FACTOR, DOWNWEIGHT_GENE_FRACTION,
    ONE_SAMPLE_FACTOR_RANGE, ONE_SAMPLE_PERCENT,
};
use rand::Rng;

/// Cells changed by an injection, as (gene, sample) pairs.
pub type Injected = Vec<(usize, usize)>;

/// Apply `mode` to `counts` (genes × samples, treatment samples first).
///
/// `random_percent` is the replacement percentage of [`OutlierMode::Randomized`].
pub fn inject<R: Rng + ?Sized>(
    rng: &mut R,
    counts: &mut [Vec<u64>],
    nsample: usize,
    mode: OutlierMode,
    random_percent: f64,
) -> Injected {
    match mode {
        OutlierMode::None => Vec::new(),
        OutlierMode::Dispersed => inject_dispersed(rng, counts),
        OutlierMode::Randomized => inject_randomized(rng, counts, random_percent),
        OutlierMode::OneSample => inject_one_sample(rng, counts, nsample),
        OutlierMode::DownweightedLow => downweight_low_counts(counts),
    }
}

fn n_samples(counts: &[Vec<u64>]) -> usize {
    counts.first().map(Vec::len).unwrap_or(0)
}

fn scale(count: u64, factor: f64) -> u64 {
    (count as f64 * factor).round().max(0.0) as u64
}

fn inject_dispersed<R: Rng + ?Sized>(rng: &mut R, counts: &mut [Vec<u64>]) -> Injected {
    let mut injected = Vec::new();
    for sample in 0..n_samples(counts) {
        for (gene, row) in counts.iter_mut().enumerate() {
            if rng.gen::<f64>() * 100.0 < DISPERSED_PERCENT {
                row[sample] = scale(row[sample], DISPERSED_FACTOR);
                injected.push((gene, sample));
            }
        }
    }
    injected
}

fn inject_randomized<R: Rng + ?Sized>(rng: &mut R, counts: &mut [Vec<u64>], percent: f64) -> Injected {
    let n_cols = n_samples(counts);
    let snapshot: Vec<u64> = counts.iter().flat_map(|row| row.iter().copied()).collect();
    if snapshot.is_empty() {
        return Vec::new();
    }

    let mut injected = Vec::new();
    for sample in 0..n_cols {
        for (gene, row) in counts.iter_mut().enumerate() {
            if rng.gen::<f64>() * 100.0 < percent {
                row[sample] = snapshot[rng.gen_range(0..snapshot.len())];
                injected.push((gene, sample));
            }
        }
    }
    injected
}

fn inject_one_sample<R: Rng + ?Sized>(rng: &mut R, counts: &mut [Vec<u64>], nsample: usize) -> Injected {
    if nsample == 0 || n_samples(counts) < 2 * nsample {
        return Vec::new();
    }
    let treatment = rng.gen_range(0..nsample);
    let control = nsample + rng.gen_range(0..nsample);
    let (low, high) = ONE_SAMPLE_FACTOR_RANGE;

    let mut injected = Vec::new();
    for sample in [treatment, control] {
        for (gene, row) in counts.iter_mut().enumerate() {
            if rng.gen::<f64>() * 100.0 < ONE_SAMPLE_PERCENT {
                let factor = rng.gen_range(low..high);
                row[sample] = scale(row[sample], factor);
                injected.push((gene, sample));
            }
        }
    }
    injected
}

/// Halve (floor) the counts of the lowest-mean genes; no randomness.
fn downweight_low_counts(counts: &mut [Vec<u64>]) -> Injected {
    let means: Vec<f64> = counts
        .iter()
        .map(|row| row.iter().sum::<u64>() as f64 / row.len().max(1) as f64)
        .collect();
    let n_low = (counts.len() as f64 * DOWNWEIGHT_GENE_FRACTION).round() as usize;

    let mut injected = Vec::new();
    for &gene in rank_order(&means).iter().take(n_low) {
        for (sample, cell) in counts[gene].iter_mut().enumerate() {
            *cell = (*cell as f64 * DOWNWEIGHT_FACTOR).floor() as u64;
            injected.push((gene, sample));
        }
    }
    injected
}
