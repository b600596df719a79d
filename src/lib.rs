//! Synthetic RNA-seq Differential Expression Benchmark Library
//!
//! This library simulates RNA-seq count datasets with planted ground truth
//! and scores the output of differential expression (DE) methods against it.
//!
//! # Overview
//!
//! The library is organized into composable modules:
//!
//! - **params**: Empirical per-gene (mean, dispersion) tables per reference cohort
//! - **simulate**: Negative-binomial count simulation with DE genes and outliers
//! - **data**: Core data structures (CountMatrix, Dataset, Label)
//! - **condition**: Condition files (design axes, scoring options)
//! - **tree**: Paper → Figure → Plot → DataPool composition tree and seed derivation
//! - **score**: Method outputs, external runners and per-leaf results
//! - **metrics**: AUC, TPR, FDR, cutoff, F1 and Cohen's kappa
//! - **report**: Aggregation of results into summaries
//!
//! # Example
//!
//! ```no_run
//! use debench::prelude::*;
//! use std::path::Path;
//!
//! let condition = Condition::from_file("condition.yaml").unwrap();
//! let mut paper = Paper::new(&condition).unwrap();
//!
//! let store = ParameterStore::load("params", &paper.sources()).unwrap();
//! paper
//!     .generate_datasets(&store, Path::new("datasets"), &condition.simulation)
//!     .unwrap();
//!
//! let runner = TemplateLocator::new(condition.scoring.result_template.clone());
//! paper.score_results(&runner, &condition);
//!
//! let results = ResultSet::from_paper(&paper);
//! let report = Report::for_paper(&paper, &results, &condition.metrics_type);
//! println!("{}", report.to_json().unwrap());
//! ```

pub mod condition;
pub mod data;
pub mod error;
pub mod metrics;
pub mod params;
pub mod report;
pub mod score;
pub mod simulate;
pub mod tree;

/// Convenient re-exports for common usage.
pub mod prelude {
    pub use crate::condition::{
        Condition, DispType, MissingGenes, OutlierMode, ScoringOptions, SimulSource,
    };
    pub use crate::data::{CountMatrix, Dataset, Label};
    pub use crate::error::{BenchError, Result};
    pub use crate::metrics::{
        auc, cutoff, evaluate, f1_score, fdr, kappa, tpr, Confusion, Evaluation, Metric,
        MetricValue,
    };
    pub use crate::params::{
        Cohort, CohortParameters, GeneParams, ParameterStore, ParameterTable, ParameterView,
        Stratify,
    };
    pub use crate::report::{FailedLeaf, Report, ResultSet, SummaryRow};
    pub use crate::score::{
        AnalysisRunner, BenchResult, CommandRunner, MethodOutcome, MethodOutput, RunRequest,
        TemplateLocator,
    };
    pub use crate::simulate::{
        de_gene_counts, simulate, simulate_dataset, SimulationDesign, SimulationOptions,
    };
    pub use crate::tree::{
        derive_seed, ConditionKey, DataPool, Figure, LeafKey, Paper, Plot, Replicate,
    };
}
