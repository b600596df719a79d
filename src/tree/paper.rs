//! Paper → Figure → Plot → DataPool composition tree.
//!
//! Building the tree only enumerates keys and derives seeds. Simulation and
//! scoring are separate traversals, so a tree rebuilt from the same
//! condition can resume scoring from datasets already on disk.

use crate::condition::{Condition, DispType, OutlierMode, SimulSource, MIN_NREP, MIN_NSAMPLE};
use crate::data::Dataset;
use crate::error::{BenchError, Result};
use crate::params::ParameterStore;
use crate::report::ResultSet;
use crate::score::{AnalysisRunner, BenchResult, MethodOutput, RunRequest};
use crate::simulate::{simulate_dataset, SimulationOptions};
use crate::tree::{ConditionKey, DataPool, LeafKey, Replicate};
use rayon::prelude::*;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

fn ensure_unique<I: IntoIterator<Item = String>>(paths: I) -> Result<()> {
    let mut seen = BTreeSet::new();
    for path in paths {
        if !seen.insert(path.clone()) {
            return Err(BenchError::DuplicateLeafKey(path));
        }
    }
    Ok(())
}

fn invalid(key_path: String, reason: impl Into<String>) -> BenchError {
    BenchError::InvalidDesign {
        key_path,
        reason: reason.into(),
    }
}

/// Plot: one (nsample, outlier_mode) under a figure, with a pool per pde.
#[derive(Debug, Clone, PartialEq)]
pub struct Plot {
    pub nsample: usize,
    pub outlier_mode: OutlierMode,
    pub pool: DataPool,
}

impl Plot {
    /// Build the pools of every `pde` for the figure axes in `figure`.
    pub fn new(
        figure: &Figure,
        nsample: usize,
        outlier_mode: OutlierMode,
        pdes: &[f64],
        nrep: usize,
        global_seed: u64,
    ) -> Result<Self> {
        let path = format!("{}/{}spc/{}", figure.key_path(), nsample, outlier_mode);
        if nsample < MIN_NSAMPLE {
            return Err(invalid(path, format!("nsample must be at least {}", MIN_NSAMPLE)));
        }

        let mut leaves = Vec::with_capacity(pdes.len());
        for &pde in pdes {
            let leaf_path = format!("{}/{}DE", path, pde);
            if !(pde > 0.0 && pde <= 100.0) {
                return Err(invalid(leaf_path, "pde must lie in (0, 100]"));
            }
            let condition = ConditionKey {
                simul_data: figure.simul_data,
                disp_type: figure.disp_type,
                frac_up: figure.frac_up,
                nsample,
                outlier_mode,
                pde,
            };
            leaves.push(DataPool::leaf(condition, nrep, global_seed));
        }
        ensure_unique(pdes.iter().map(|pde| format!("{}/{}DE", path, pde)))?;

        Ok(Self {
            nsample,
            outlier_mode,
            pool: DataPool::branch("pde", leaves),
        })
    }
}

/// Figure: one (simul_data, disp_type, frac_up) combination.
#[derive(Debug, Clone, PartialEq)]
pub struct Figure {
    pub simul_data: SimulSource,
    pub disp_type: DispType,
    pub frac_up: f64,
    pub plots: Vec<Plot>,
}

impl Figure {
    /// Figure with the plots of every (nsample, outlier_mode) in `condition`.
    pub fn new(simul_data: SimulSource, disp_type: DispType, frac_up: f64, condition: &Condition) -> Result<Self> {
        let mut figure = Self {
            simul_data,
            disp_type,
            frac_up,
            plots: Vec::new(),
        };
        if !(0.0..=1.0).contains(&frac_up) {
            return Err(invalid(figure.key_path(), "frac_up must lie in [0, 1]"));
        }
        if condition.simulation.fixed_fold && simul_data != SimulSource::Kirc {
            return Err(invalid(figure.key_path(), "fixed fold changes are only defined for KIRC"));
        }

        for &nsample in &condition.nsample {
            for &outlier_mode in &condition.outlier_mode {
                let plot = Plot::new(&figure, nsample, outlier_mode, &condition.pde, condition.nrep, condition.seed)?;
                figure.plots.push(plot);
            }
        }
        ensure_unique(
            figure
                .plots
                .iter()
                .map(|p| format!("{}/{}spc/{}", figure.key_path(), p.nsample, p.outlier_mode)),
        )?;
        Ok(figure)
    }

    /// `{simul_data}/{disp_type}/upFrac{frac_up}`.
    pub fn key_path(&self) -> String {
        format!("{}/{}/upFrac{}", self.simul_data, self.disp_type, self.frac_up)
    }

    pub fn replicates(&self) -> Vec<&Replicate> {
        self.plots.iter().flat_map(|p| p.pool.replicates()).collect()
    }
}

/// Counts of one `generate_datasets` traversal.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerationSummary {
    pub generated: usize,
    pub paths: Vec<PathBuf>,
}

/// Counts of one `score_results` traversal.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScoringSummary {
    /// (leaf, method) pairs with metric values.
    pub scored: usize,
    /// (leaf, method) pairs that failed or could not be joined.
    pub failed: usize,
}

/// Root of the tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Paper {
    pub nrep: usize,
    pub seed: u64,
    pub figures: Vec<Figure>,
}

impl Paper {
    /// Enumerate every axis combination of `condition`.
    ///
    /// Fails with `InvalidDesign` or `DuplicateLeafKey` before anything is
    /// simulated.
    pub fn new(condition: &Condition) -> Result<Self> {
        condition.validate()?;
        let mut figures = Vec::new();
        for &simul_data in &condition.simul_data {
            for &disp_type in &condition.disp_type {
                for &frac_up in &condition.frac_up {
                    figures.push(Figure::new(simul_data, disp_type, frac_up, condition)?);
                }
            }
        }
        let paper = Self::from_figures(condition.nrep, condition.seed, figures)?;
        info!(
            figures = paper.figures.len(),
            leaves = paper.n_leaves(),
            nrep = paper.nrep,
            "built paper"
        );
        Ok(paper)
    }

    /// Assemble a paper from hand-built figures, checking key uniqueness.
    pub fn from_figures(nrep: usize, seed: u64, figures: Vec<Figure>) -> Result<Self> {
        if nrep < MIN_NREP {
            return Err(invalid("nrep".to_string(), format!("nrep must be at least {}", MIN_NREP)));
        }
        ensure_unique(figures.iter().map(Figure::key_path))?;
        let paper = Self { nrep, seed, figures };
        ensure_unique(paper.replicates().iter().map(|r| r.key.to_string()))?;
        Ok(paper)
    }

    pub fn replicates(&self) -> Vec<&Replicate> {
        self.figures.iter().flat_map(Figure::replicates).collect()
    }

    pub fn replicates_mut(&mut self) -> Vec<&mut Replicate> {
        self.figures
            .iter_mut()
            .flat_map(|f| f.plots.iter_mut())
            .flat_map(|p| p.pool.replicates_mut())
            .collect()
    }

    pub fn leaf_keys(&self) -> Vec<LeafKey> {
        self.replicates().iter().map(|r| r.key).collect()
    }

    pub fn n_leaves(&self) -> usize {
        self.replicates().len()
    }

    pub fn sources(&self) -> Vec<SimulSource> {
        let set: BTreeSet<SimulSource> = self.figures.iter().map(|f| f.simul_data).collect();
        set.into_iter().collect()
    }

    /// Simulate and persist every leaf dataset under `root`.
    ///
    /// Leaves run in parallel; each file is complete on disk before its path
    /// is recorded.
    pub fn generate_datasets(
        &mut self,
        store: &ParameterStore,
        root: &Path,
        options: &SimulationOptions,
    ) -> Result<GenerationSummary> {
        for source in self.sources() {
            store.for_source(source)?;
        }

        let mut replicates = self.replicates_mut();
        info!(leaves = replicates.len(), root = %root.display(), "generating datasets");
        let paths = replicates
            .par_iter_mut()
            .map(|rep| -> Result<PathBuf> {
                let dataset = simulate_dataset(store, &rep.key.condition, rep.seed, options)?;
                let path = dataset.write_to(root)?;
                debug!(leaf = %rep.key, seed = rep.seed, path = %path.display(), "dataset written");
                rep.dataset_path = Some(path.clone());
                Ok(path)
            })
            .collect::<Result<Vec<PathBuf>>>()?;

        info!(generated = paths.len(), "datasets ready");
        Ok(GenerationSummary {
            generated: paths.len(),
            paths,
        })
    }

    /// Attach datasets already persisted under `root`; returns how many exist.
    pub fn locate_datasets(&mut self, root: &Path) -> usize {
        let mut found = 0;
        for rep in self.replicates_mut() {
            let path = root.join(rep.key.condition.dataset_path(rep.seed));
            if path.is_file() {
                rep.dataset_path = Some(path);
                found += 1;
            }
        }
        info!(found, root = %root.display(), "located datasets");
        found
    }

    /// Seed leaves with results from an earlier run; returns how many matched.
    pub fn attach_results(&mut self, results: &ResultSet) -> usize {
        let mut attached = 0;
        for rep in self.replicates_mut() {
            if let Some(result) = results.get(&rep.key) {
                rep.result = Some(result.clone());
                attached += 1;
            }
        }
        info!(attached, "attached earlier results");
        attached
    }

    /// Obtain and score every method output for every leaf.
    ///
    /// Methods that already hold a scored outcome on the leaf are kept and
    /// their runner is not invoked again.
    ///
    /// Runner and join failures are recorded on the leaf's result and never
    /// stop other leaves.
    pub fn score_results(&mut self, runner: &dyn AnalysisRunner, condition: &Condition) -> ScoringSummary {
        let mut replicates = self.replicates_mut();
        info!(
            leaves = replicates.len(),
            methods = condition.method_type.len(),
            "scoring results"
        );

        let counts: Vec<(usize, usize)> = replicates
            .par_iter_mut()
            .map(|rep| {
                let result = score_replicate(rep, runner, condition);
                let failed = result.failures().count();
                let scored = result.methods.len() - failed;
                rep.result = Some(result);
                (scored, failed)
            })
            .collect();

        let summary = ScoringSummary {
            scored: counts.iter().map(|c| c.0).sum(),
            failed: counts.iter().map(|c| c.1).sum(),
        };
        info!(scored = summary.scored, failed = summary.failed, "scoring finished");
        summary
    }

    /// Results accumulated so far.
    pub fn results(&self) -> Vec<&BenchResult> {
        self.replicates().into_iter().filter_map(|r| r.result.as_ref()).collect()
    }
}

fn score_replicate(rep: &Replicate, runner: &dyn AnalysisRunner, condition: &Condition) -> BenchResult {
    let mut result = rep
        .result
        .clone()
        .filter(|r| r.seed == rep.seed)
        .unwrap_or_else(|| BenchResult::new(rep.key, rep.seed));
    let pending: Vec<(&String, &PathBuf)> = condition
        .method_type
        .iter()
        .filter(|(method, _)| !result.is_scored(method))
        .collect();
    if pending.is_empty() {
        debug!(leaf = %rep.key, "all methods already scored");
        return result;
    }
    let fail_all = |result: &mut BenchResult, reason: &str| {
        for (method, _) in &pending {
            result.mark_failed(method, reason);
        }
    };

    let Some(dataset_path) = rep.dataset_path.as_deref() else {
        warn!(leaf = %rep.key, "no dataset for leaf");
        fail_all(&mut result, "dataset not generated");
        return result;
    };
    let dataset = match Dataset::from_tsv(dataset_path) {
        Ok(dataset) if dataset.seed == rep.seed => dataset,
        Ok(dataset) => {
            fail_all(&mut result, &format!("dataset seed {} does not match leaf", dataset.seed));
            return result;
        }
        Err(e) => {
            warn!(leaf = %rep.key, error = %e, "could not read dataset");
            fail_all(&mut result, &e.to_string());
            return result;
        }
    };

    let leaf = rep.key.to_string();
    for &(method, output_dir) in &pending {
        let request = RunRequest {
            leaf: &leaf,
            dataset: dataset_path,
            method,
            output_dir,
        };
        let output = runner
            .run(&request)
            .and_then(|path| MethodOutput::from_path(path, &condition.scoring));
        match output {
            Ok(output) => {
                result.score_method(method, &dataset, &output, &condition.scoring, &condition.metrics_type);
            }
            Err(e) => {
                warn!(leaf = %leaf, method = %method, error = %e, "method output unavailable");
                result.mark_failed(method, e.to_string());
            }
        }
    }
    result
}
