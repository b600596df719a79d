//! Synthetic count generation with planted ground truth.
//!
//! Genes are sampled from an empirical cohort, a fraction is made
//! differentially expressed by scaling the treatment mean, counts are drawn
//! from negative binomials and finally one outlier pattern is injected.

use crate::condition::{DispType, OutlierMode, SimulSource};
use crate::data::{CountMatrix, Dataset, Label};
use crate::error::{BenchError, Result};
use crate::params::{rank_order, ParameterStore, SourceParameters};
use crate::simulate::constants::{
    FIXED_FOLD_DOWN, FIXED_FOLD_UP_HIGH, FIXED_FOLD_UP_LOW, FOLD_OFFSET_LARGE, FOLD_OFFSET_MEDIUM,
    FOLD_OFFSET_SMALL, RANDOMIZED_PERCENT, SAMPLE_SCALE_RANGE,
};
use crate::simulate::outlier::inject;
use crate::simulate::sampling::{assign_by_rank, negative_binomial, sample_indices, DispersionPool};
use crate::tree::ConditionKey;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use rand_distr::Exp1;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Simulation switches that are not design axes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationOptions {
    /// Scale each sample's means by a factor drawn from U(0.7, 1.3).
    pub random_sampling: bool,
    /// Use fixed fold changes instead of Exp(1)-based ones (KIRC only).
    pub fixed_fold: bool,
    /// Percentage of cells replaced in `R` mode.
    pub random_outlier_percent: f64,
    /// Number of simulated genes; defaults per source when absent.
    pub n_genes: Option<usize>,
}

impl Default for SimulationOptions {
    fn default() -> Self {
        Self {
            random_sampling: true,
            fixed_fold: false,
            random_outlier_percent: RANDOMIZED_PERCENT,
            n_genes: None,
        }
    }
}

/// Full design of one simulated replicate.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationDesign {
    pub source: SimulSource,
    pub disp_type: DispType,
    pub n_genes: usize,
    /// Samples per group.
    pub nsample: usize,
    /// Percent of genes planted as DE, in (0, 100].
    pub pde: f64,
    /// Fraction of DE genes that are up-regulated, in [0, 1].
    pub frac_up: f64,
    pub outlier_mode: OutlierMode,
    pub random_sampling: bool,
    pub fixed_fold: bool,
    pub random_outlier_percent: f64,
}

impl SimulationDesign {
    /// Design of a tree leaf.
    pub fn from_condition(key: &ConditionKey, options: &SimulationOptions) -> Self {
        Self {
            source: key.simul_data,
            disp_type: key.disp_type,
            n_genes: options.n_genes.unwrap_or_else(|| key.simul_data.default_n_genes()),
            nsample: key.nsample,
            pde: key.pde,
            frac_up: key.frac_up,
            outlier_mode: key.outlier_mode,
            random_sampling: options.random_sampling,
            fixed_fold: options.fixed_fold,
            random_outlier_percent: options.random_outlier_percent,
        }
    }

    fn invalid(&self, reason: impl Into<String>) -> BenchError {
        BenchError::InvalidDesign {
            key_path: format!(
                "{}/{}/upFrac{}/{}spc/{}/{}DE",
                self.source, self.disp_type, self.frac_up, self.nsample, self.outlier_mode, self.pde
            ),
            reason: reason.into(),
        }
    }

    /// Check value ranges before any randomness is consumed.
    pub fn validate(&self) -> Result<()> {
        if self.n_genes == 0 {
            return Err(self.invalid("n_genes must be positive"));
        }
        if self.nsample == 0 {
            return Err(self.invalid("nsample must be positive"));
        }
        if !(self.pde > 0.0 && self.pde <= 100.0) {
            return Err(self.invalid("pde must lie in (0, 100]"));
        }
        if !(0.0..=1.0).contains(&self.frac_up) {
            return Err(self.invalid("frac_up must lie in [0, 1]"));
        }
        if !(0.0..=100.0).contains(&self.random_outlier_percent) {
            return Err(self.invalid("random_outlier_percent must lie in [0, 100]"));
        }
        if self.fixed_fold && self.source != SimulSource::Kirc {
            return Err(self.invalid("fixed fold changes require the KIRC source"));
        }
        Ok(())
    }

    /// Number of (up, down) genes planted.
    pub fn de_split(&self) -> (usize, usize) {
        if self.fixed_fold {
            let n_de = n_de_genes(self.n_genes, self.pde);
            let n_up = round_half_up(2.0 * n_de as f64 / 3.0).min(n_de);
            (n_up, n_de - n_up)
        } else {
            de_gene_counts(self.n_genes, self.pde, self.frac_up)
        }
    }

    fn fold_offset(&self) -> f64 {
        if self.nsample <= 3 {
            FOLD_OFFSET_SMALL
        } else if self.nsample <= 5 {
            FOLD_OFFSET_MEDIUM
        } else {
            FOLD_OFFSET_LARGE
        }
    }
}

fn round_half_up(x: f64) -> usize {
    (x + 0.5).floor().max(0.0) as usize
}

/// Number of DE genes: `round(pde / 100 * n_genes)`, halves rounded up.
pub fn n_de_genes(n_genes: usize, pde: f64) -> usize {
    round_half_up(pde * n_genes as f64 / 100.0).min(n_genes)
}

/// Number of (up, down) DE genes; `n_up = round(n_de * frac_up)`, halves rounded up.
pub fn de_gene_counts(n_genes: usize, pde: f64, frac_up: f64) -> (usize, usize) {
    let n_de = n_de_genes(n_genes, pde);
    let n_up = round_half_up(n_de as f64 * frac_up).min(n_de);
    (n_up, n_de - n_up)
}

/// Simulated counts and planted labels.
#[derive(Debug, Clone)]
pub struct Simulated {
    /// Counts (genes × samples), treatment samples first.
    pub counts: CountMatrix,
    pub labels: Vec<Label>,
    /// Cells changed by outlier injection, as (gene, sample).
    pub injected: Vec<(usize, usize)>,
}

/// Per-group means and dispersions of the simulated genes.
struct GeneModel {
    control_mean: Vec<f64>,
    treatment_mean: Vec<f64>,
    control_disp: Vec<f64>,
    treatment_disp: Vec<f64>,
}

/// Simulate one replicate.
///
/// A pure function of `(params, design, rng state)`.
pub fn simulate<R: Rng + ?Sized>(
    params: &SourceParameters<'_>,
    design: &SimulationDesign,
    rng: &mut R,
) -> Result<Simulated> {
    design.validate()?;
    if params.source != design.source {
        return Err(design.invalid(format!(
            "parameters are for {}, design asks for {}",
            params.source, design.source
        )));
    }

    let model = build_gene_model(params, design, rng)?;
    let (n_up, n_down) = design.de_split();
    let nsample = design.nsample;

    let (low, high) = SAMPLE_SCALE_RANGE;
    let draw_scales = |rng: &mut R| -> Vec<f64> {
        if design.random_sampling {
            (0..nsample).map(|_| rng.gen_range(low..high)).collect()
        } else {
            vec![1.0; nsample]
        }
    };
    let treatment_scale = draw_scales(rng);
    let control_scale = draw_scales(rng);

    let mut rows = Vec::with_capacity(design.n_genes);
    for gene in 0..design.n_genes {
        let mut row = Vec::with_capacity(2 * nsample);
        for &scale in &treatment_scale {
            row.push(negative_binomial(
                rng,
                model.treatment_mean[gene] * scale,
                model.treatment_disp[gene],
            )?);
        }
        for &scale in &control_scale {
            row.push(negative_binomial(
                rng,
                model.control_mean[gene] * scale,
                model.control_disp[gene],
            )?);
        }
        rows.push(row);
    }

    let injected = inject(
        rng,
        &mut rows,
        nsample,
        design.outlier_mode,
        design.random_outlier_percent,
    );

    let labels: Vec<Label> = (0..design.n_genes)
        .map(|gene| {
            if gene < n_up {
                Label::Up
            } else if gene < n_up + n_down {
                Label::Down
            } else {
                Label::NotSignificant
            }
        })
        .collect();

    let counts = CountMatrix::from_rows(
        &rows,
        Dataset::gene_names(design.n_genes),
        Dataset::sample_names(nsample),
    )?;

    debug!(
        source = %design.source,
        genes = design.n_genes,
        up = n_up,
        down = n_down,
        injected = injected.len(),
        "simulated replicate"
    );

    Ok(Simulated {
        counts,
        labels,
        injected,
    })
}

fn build_gene_model<R: Rng + ?Sized>(
    params: &SourceParameters<'_>,
    design: &SimulationDesign,
    rng: &mut R,
) -> Result<GeneModel> {
    let n_genes = design.n_genes;
    let mean_table = params.means.total();
    if n_genes > mean_table.len() {
        return Err(design.invalid(format!(
            "{} genes requested but {} has {}",
            n_genes,
            params.means.cohort().name(),
            mean_table.len()
        )));
    }

    let genes = sample_indices(rng, mean_table.len(), n_genes);
    let control_mean: Vec<f64> = genes.iter().map(|&g| mean_table.params()[g].mean).collect();
    let mut treatment_mean = control_mean.clone();

    // Cross sources also sample genes of the dispersion cohort; their means
    // carry the DE shift and rank-match dispersions onto the simulated genes.
    let disp_table = params.dispersions.total();
    let sub_genes = if design.source.is_cross() {
        if n_genes > disp_table.len() {
            return Err(design.invalid(format!(
                "{} genes requested but {} has {}",
                n_genes,
                params.dispersions.cohort().name(),
                disp_table.len()
            )));
        }
        Some(sample_indices(rng, disp_table.len(), n_genes))
    } else {
        None
    };
    let sub_control_mean: Option<Vec<f64>> = sub_genes
        .as_ref()
        .map(|idx| idx.iter().map(|&g| disp_table.params()[g].mean).collect());
    let mut sub_treatment_mean = sub_control_mean.clone();

    let factors = fold_factors(design, rng);
    for (gene, &factor) in factors.iter().enumerate() {
        treatment_mean[gene] *= factor;
        if let Some(sub) = sub_treatment_mean.as_mut() {
            sub[gene] *= factor;
        }
    }

    let (control_disp, treatment_disp) = match design.disp_type {
        DispType::Same => {
            let disp = match (&sub_genes, &sub_control_mean) {
                (Some(sub), Some(sub_mean)) => {
                    let sorted: Vec<f64> = rank_order(sub_mean)
                        .iter()
                        .map(|&i| disp_table.params()[sub[i]].dispersion)
                        .collect();
                    assign_by_rank(&control_mean, &sorted)
                }
                _ => genes.iter().map(|&g| disp_table.params()[g].dispersion).collect(),
            };
            (disp.clone(), disp)
        }
        DispType::Different => {
            let control_pool = DispersionPool::new(params.dispersions.control())?;
            let treatment_pool = DispersionPool::new(params.dispersions.treatment())?;
            match (&sub_control_mean, &sub_treatment_mean) {
                (Some(sub_control), Some(sub_treatment)) => {
                    let control = pooled_by_rank(rng, &control_pool, sub_control, &control_mean);
                    let treatment = pooled_by_rank(rng, &treatment_pool, sub_treatment, &treatment_mean);
                    (control, treatment)
                }
                _ => {
                    let control: Vec<f64> = control_mean.iter().map(|&m| control_pool.draw(rng, m)).collect();
                    let treatment: Vec<f64> = control_mean.iter().map(|&m| treatment_pool.draw(rng, m)).collect();
                    (control, treatment)
                }
            }
        }
    };

    Ok(GeneModel {
        control_mean,
        treatment_mean,
        control_disp,
        treatment_disp,
    })
}

/// Draw dispersions for `lookup_means` in ascending order, then hand them to
/// `targets` by mean rank.
fn pooled_by_rank<R: Rng + ?Sized>(
    rng: &mut R,
    pool: &DispersionPool,
    lookup_means: &[f64],
    targets: &[f64],
) -> Vec<f64> {
    let sorted: Vec<f64> = rank_order(lookup_means)
        .iter()
        .map(|&i| pool.draw(rng, lookup_means[i]))
        .collect();
    assign_by_rank(targets, &sorted)
}

/// Multiplicative treatment-mean factor per gene (1 for non-DE genes).
fn fold_factors<R: Rng + ?Sized>(design: &SimulationDesign, rng: &mut R) -> Vec<f64> {
    let mut factors = vec![1.0; design.n_genes];
    let (n_up, n_down) = design.de_split();
    let n_de = n_up + n_down;

    if design.fixed_fold {
        let one_third = round_half_up(n_de as f64 / 3.0).min(n_up);
        for (gene, factor) in factors.iter_mut().enumerate().take(n_de) {
            *factor = if gene < one_third {
                FIXED_FOLD_UP_LOW
            } else if gene < n_up {
                FIXED_FOLD_UP_HIGH
            } else {
                1.0 / FIXED_FOLD_DOWN
            };
        }
        return factors;
    }

    let offset = design.fold_offset();
    let up: Vec<f64> = (0..n_up).map(|_| rng.sample::<f64, _>(Exp1) + offset).collect();
    let down: Vec<f64> = (0..n_down).map(|_| rng.sample::<f64, _>(Exp1) + offset).collect();
    for (gene, fold) in up.into_iter().enumerate() {
        factors[gene] = fold;
    }
    for (i, fold) in down.into_iter().enumerate() {
        factors[n_up + i] = 1.0 / fold;
    }
    factors
}

/// Simulate the dataset of one leaf from its seed.
pub fn simulate_dataset(
    store: &ParameterStore,
    condition: &ConditionKey,
    seed: u64,
    options: &SimulationOptions,
) -> Result<Dataset> {
    let params = store.for_source(condition.simul_data)?;
    let design = SimulationDesign::from_condition(condition, options);
    let mut rng = ChaCha20Rng::seed_from_u64(seed);
    let simulated = simulate(&params, &design, &mut rng)?;
    Dataset::new(*condition, seed, simulated.counts, simulated.labels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{Cohort, CohortParameters, GeneParams, ParameterTable};

    fn cohort(cohort: Cohort, n: usize, scale: f64) -> CohortParameters {
        let ids: Vec<String> = (0..n).map(|i| format!("{}{}", cohort.prefix(), i)).collect();
        let table = |shift: f64| {
            ParameterTable::new(
                ids.clone(),
                (0..n)
                    .map(|i| GeneParams::new(scale * (5.0 + i as f64 * 3.0) + shift, 0.05 + (i % 7) as f64 * 0.02))
                    .collect(),
            )
            .unwrap()
        };
        CohortParameters::new(cohort, table(0.0), table(2.0), table(-1.0)).unwrap()
    }

    fn store() -> ParameterStore {
        ParameterStore::new()
            .with_cohort(cohort(Cohort::Kirc, 400, 1.0))
            .with_cohort(cohort(Cohort::Bottomly, 300, 2.0))
    }

    fn design(source: SimulSource) -> SimulationDesign {
        SimulationDesign {
            source,
            disp_type: DispType::Same,
            n_genes: 200,
            nsample: 3,
            pde: 10.0,
            frac_up: 0.5,
            outlier_mode: OutlierMode::None,
            random_sampling: true,
            fixed_fold: false,
            random_outlier_percent: 5.0,
        }
    }

    fn run(design: &SimulationDesign, seed: u64) -> Simulated {
        let store = store();
        let params = store.for_source(design.source).unwrap();
        let mut rng = ChaCha20Rng::seed_from_u64(seed);
        simulate(&params, design, &mut rng).unwrap()
    }

    #[test]
    fn test_de_counts_rounding() {
        assert_eq!(n_de_genes(10_000, 10.0), 1000);
        assert_eq!(n_de_genes(200, 0.27), 1); // 0.54 -> 1
        assert_eq!(de_gene_counts(200, 10.0, 0.0), (0, 20));
        assert_eq!(de_gene_counts(200, 10.0, 1.0), (20, 0));
        assert_eq!(de_gene_counts(200, 10.0, 0.5), (10, 10));
        // 15 * 0.5 = 7.5 rounds up
        assert_eq!(de_gene_counts(150, 10.0, 0.5), (8, 7));
    }

    #[test]
    fn test_shape_and_labels() {
        let d = design(SimulSource::Kirc);
        let sim = run(&d, 42);
        assert_eq!(sim.counts.n_genes(), 200);
        assert_eq!(sim.counts.n_samples(), 6);
        assert_eq!(sim.counts.sample_ids()[0], "TRT-1");
        assert_eq!(sim.counts.sample_ids()[3], "CTRL-1");
        assert_eq!(sim.labels.iter().filter(|l| **l == Label::Up).count(), 10);
        assert_eq!(sim.labels.iter().filter(|l| **l == Label::Down).count(), 10);
        assert!(sim.injected.is_empty());
    }

    #[test]
    fn test_same_seed_same_counts() {
        for source in SimulSource::all() {
            let mut d = design(source);
            d.disp_type = DispType::Different;
            let a = run(&d, 9);
            let b = run(&d, 9);
            assert_eq!(a.counts, b.counts, "{}", source);
            let c = run(&d, 10);
            assert_ne!(a.counts, c.counts, "{}", source);
        }
    }

    #[test]
    fn test_up_genes_shift_treatment() {
        let mut d = design(SimulSource::Kirc);
        d.pde = 50.0;
        d.frac_up = 1.0;
        d.nsample = 10;
        d.random_sampling = false;
        let sim = run(&d, 5);
        let (mut trt, mut ctrl) = (0u64, 0u64);
        for gene in 0..100 {
            let row = sim.counts.row_dense(gene);
            trt += row[..10].iter().sum::<u64>();
            ctrl += row[10..].iter().sum::<u64>();
        }
        // fold changes are at least 1.2
        assert!(trt as f64 > 1.15 * ctrl as f64, "trt {} ctrl {}", trt, ctrl);
    }

    #[test]
    fn test_fixed_fold_requires_kirc() {
        let mut d = design(SimulSource::Bottomly);
        d.fixed_fold = true;
        let store = store();
        let params = store.for_source(SimulSource::Bottomly).unwrap();
        let mut rng = ChaCha20Rng::seed_from_u64(1);
        let err = simulate(&params, &d, &mut rng).unwrap_err();
        assert!(matches!(err, BenchError::InvalidDesign { .. }));

        let mut d = design(SimulSource::Kirc);
        d.fixed_fold = true;
        d.pde = 15.0; // 30 DE genes, 20 up
        assert_eq!(d.de_split(), (20, 10));
        let sim = run(&d, 1);
        assert_eq!(sim.labels.iter().filter(|l| **l == Label::Up).count(), 20);
    }

    #[test]
    fn test_too_many_genes() {
        let mut d = design(SimulSource::Bottomly);
        d.n_genes = 1000;
        let store = store();
        let params = store.for_source(SimulSource::Bottomly).unwrap();
        let mut rng = ChaCha20Rng::seed_from_u64(1);
        assert!(matches!(
            simulate(&params, &d, &mut rng),
            Err(BenchError::InvalidDesign { .. })
        ));
    }

    #[test]
    fn test_invalid_ranges() {
        let mut d = design(SimulSource::Kirc);
        d.pde = 0.0;
        assert!(d.validate().is_err());
        d.pde = 100.0;
        assert!(d.validate().is_ok());
        d.frac_up = 1.5;
        assert!(d.validate().is_err());
    }
}
