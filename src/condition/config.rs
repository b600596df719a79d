//! Condition file: which axis combinations to simulate and how to
//! score the methods run on them.

use crate::condition::{DispType, OutlierMode, SimulSource};
use crate::error::{BenchError, Result};
use crate::metrics::Metric;
use crate::simulate::SimulationOptions;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Default fractions of DE genes that are up-regulated.
pub const DEFAULT_FRAC_UP: [f64; 3] = [0.5, 0.7, 0.9];
/// Default samples per group.
pub const DEFAULT_NSAMPLE: [usize; 2] = [3, 10];
/// Default percentages of DE genes.
pub const DEFAULT_PDE: [f64; 5] = [0.27, 5.0, 10.0, 30.0, 60.0];
/// Default replicates per leaf condition.
pub const DEFAULT_NREP: usize = 50;
/// Default global seed.
pub const DEFAULT_SEED: u64 = 368_697_996;

/// Minimum replicates per leaf and samples per group.
pub const MIN_NREP: usize = 3;
pub const MIN_NSAMPLE: usize = 3;

/// How truth genes absent from a method's output are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingGenes {
    /// Fail the (leaf, method) with `UnmatchedGeneId`.
    #[default]
    Fail,
    /// Treat missing genes as not called with score +inf.
    NotCalled,
}

/// How method outputs are located and read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringOptions {
    /// Scores at or below this value are called DE.
    pub de_score_threshold: f64,
    pub gene_column: String,
    pub score_column: String,
    /// Column echoing the planted label, cross-checked when present.
    pub label_column: String,
    /// Optional column with `up` / `dn` / `ns` calls.
    pub call_column: Option<String>,
    /// Results path template; `{dir}`, `{stem}` and `{method}` are substituted.
    pub result_template: String,
    pub delimiter: char,
    pub missing_genes: MissingGenes,
    /// Argument template of an external command run per (dataset, method).
    ///
    /// Placeholders: `{dataset}`, `{output}`, `{method}`, `{dir}`, `{stem}`.
    /// Without a command, outputs are expected to exist already.
    pub command: Option<Vec<String>>,
    /// Seconds before a running command is killed.
    pub timeout_secs: u64,
}

impl Default for ScoringOptions {
    fn default() -> Self {
        Self {
            de_score_threshold: 0.05,
            gene_column: "Gene_ID".to_string(),
            score_column: "pvalue".to_string(),
            label_column: "Description".to_string(),
            call_column: None,
            result_template: "{dir}/{stem}.tsv".to_string(),
            delimiter: '\t',
            missing_genes: MissingGenes::Fail,
            command: None,
            timeout_secs: 3600,
        }
    }
}

/// A full condition file.
///
/// Every axis accepts a single value or a list. Missing keys take the
/// defaults of a complete benchmark.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Condition {
    #[serde(deserialize_with = "one_or_many")]
    pub simul_data: Vec<SimulSource>,
    #[serde(deserialize_with = "one_or_many")]
    pub disp_type: Vec<DispType>,
    #[serde(deserialize_with = "one_or_many")]
    pub frac_up: Vec<f64>,
    #[serde(deserialize_with = "one_or_many")]
    pub nsample: Vec<usize>,
    #[serde(deserialize_with = "one_or_many")]
    pub outlier_mode: Vec<OutlierMode>,
    #[serde(deserialize_with = "one_or_many")]
    pub pde: Vec<f64>,
    #[serde(deserialize_with = "one_or_many")]
    pub metrics_type: Vec<Metric>,
    /// Method name → folder holding (or receiving) its outputs.
    pub method_type: BTreeMap<String, PathBuf>,
    pub nrep: usize,
    pub seed: u64,
    pub simulation: SimulationOptions,
    pub scoring: ScoringOptions,
}

impl Default for Condition {
    fn default() -> Self {
        Self {
            simul_data: SimulSource::all(),
            disp_type: DispType::all(),
            frac_up: DEFAULT_FRAC_UP.to_vec(),
            nsample: DEFAULT_NSAMPLE.to_vec(),
            outlier_mode: OutlierMode::all(),
            pde: DEFAULT_PDE.to_vec(),
            metrics_type: Metric::all(),
            method_type: BTreeMap::new(),
            nrep: DEFAULT_NREP,
            seed: DEFAULT_SEED,
            simulation: SimulationOptions::default(),
            scoring: ScoringOptions::default(),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

fn one_or_many<'de, D, T>(deserializer: D) -> std::result::Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(value) => vec![value],
        OneOrMany::Many(values) => values,
    })
}

/// Index pair of the first value equal to an earlier one.
fn first_repeat(values: &[f64]) -> Option<(usize, usize)> {
    values
        .iter()
        .enumerate()
        .find_map(|(j, v)| values[..j].iter().position(|u| u == v).map(|i| (i, j)))
}

fn invalid(key_path: impl Into<String>, reason: impl Into<String>) -> BenchError {
    BenchError::InvalidDesign {
        key_path: key_path.into(),
        reason: reason.into(),
    }
}

impl Condition {
    /// Load from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let condition: Self = serde_yaml::from_str(yaml)?;
        condition.validate()?;
        Ok(condition)
    }

    /// Load from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml(&text)
    }

    /// Save to a YAML string.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(BenchError::from)
    }

    /// Check axis values against their documented ranges.
    ///
    /// Errors name the offending key path, e.g. `nsample[1]`.
    pub fn validate(&self) -> Result<()> {
        let non_empty = [
            ("simul_data", self.simul_data.is_empty()),
            ("disp_type", self.disp_type.is_empty()),
            ("frac_up", self.frac_up.is_empty()),
            ("nsample", self.nsample.is_empty()),
            ("outlier_mode", self.outlier_mode.is_empty()),
            ("pde", self.pde.is_empty()),
        ];
        for (key, empty) in non_empty {
            if empty {
                return Err(invalid(key, "at least one value is required"));
            }
        }

        for (i, &frac_up) in self.frac_up.iter().enumerate() {
            // -0.0 would name a different dataset than 0.0 for the same key
            if !(frac_up.is_sign_positive() && frac_up <= 1.0) {
                return Err(invalid(format!("frac_up[{}]", i), format!("{} is outside [0, 1]", frac_up)));
            }
        }
        for (i, &nsample) in self.nsample.iter().enumerate() {
            if nsample < MIN_NSAMPLE {
                return Err(invalid(
                    format!("nsample[{}]", i),
                    format!("{} is below {}", nsample, MIN_NSAMPLE),
                ));
            }
        }
        for (i, &pde) in self.pde.iter().enumerate() {
            if !(pde > 0.0 && pde <= 100.0) {
                return Err(invalid(format!("pde[{}]", i), format!("{} is outside (0, 100]", pde)));
            }
        }
        for (key, values) in [("frac_up", &self.frac_up), ("pde", &self.pde)] {
            if let Some((i, j)) = first_repeat(values) {
                return Err(invalid(format!("{}[{}]", key, j), format!("repeats {}[{}]", key, i)));
            }
        }
        if self.nrep < MIN_NREP {
            return Err(invalid("nrep", format!("{} is below {}", self.nrep, MIN_NREP)));
        }

        if self.simulation.fixed_fold {
            if let Some(source) = self.simul_data.iter().find(|s| **s != SimulSource::Kirc) {
                return Err(invalid(
                    format!("simulation.fixed_fold/{}", source),
                    "fixed fold changes are only defined for KIRC",
                ));
            }
        }
        if !(0.0..=100.0).contains(&self.simulation.random_outlier_percent) {
            return Err(invalid(
                "simulation.random_outlier_percent",
                "must lie in [0, 100]",
            ));
        }
        if self.simulation.n_genes == Some(0) {
            return Err(invalid("simulation.n_genes", "must be positive"));
        }
        if !self.scoring.de_score_threshold.is_finite() {
            return Err(invalid("scoring.de_score_threshold", "must be finite"));
        }
        if self.scoring.timeout_secs == 0 {
            return Err(invalid("scoring.timeout_secs", "must be positive"));
        }
        if matches!(&self.scoring.command, Some(args) if args.is_empty()) {
            return Err(invalid("scoring.command", "needs a program"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let condition = Condition::default();
        assert_eq!(condition.simul_data.len(), 4);
        assert_eq!(condition.outlier_mode.len(), 5);
        assert_eq!(condition.pde, vec![0.27, 5.0, 10.0, 30.0, 60.0]);
        assert_eq!(condition.nrep, 50);
        assert_eq!(condition.seed, 368697996);
        assert_eq!(condition.scoring.score_column, "pvalue");
        assert!(condition.validate().is_ok());
    }

    #[test]
    fn test_from_yaml_partial() {
        let yaml = r#"
simul_data: KIRC
disp_type: [same]
frac_up: 0.5
nsample: [5]
outlier_mode: [none, OS]
pde: 10
metrics_type: [auc, fdr]
method_type:
  deseq2: out/deseq2
nrep: 3
seed: 42
scoring:
  de_score_threshold: 0.1
  call_column: call
"#;
        let condition = Condition::from_yaml(yaml).unwrap();
        assert_eq!(condition.simul_data, vec![SimulSource::Kirc]);
        assert_eq!(condition.outlier_mode, vec![OutlierMode::None, OutlierMode::OneSample]);
        assert_eq!(condition.pde, vec![10.0]);
        assert_eq!(condition.method_type["deseq2"], PathBuf::from("out/deseq2"));
        assert_eq!(condition.scoring.call_column.as_deref(), Some("call"));
        assert_eq!(condition.scoring.gene_column, "Gene_ID");
        assert!(condition.simulation.random_sampling);
    }

    #[test]
    fn test_yaml_round_trip() {
        let condition = Condition::default();
        let yaml = condition.to_yaml().unwrap();
        assert_eq!(Condition::from_yaml(&yaml).unwrap(), condition);
    }

    #[test]
    fn test_invalid_values_name_key_path() {
        let err = Condition::from_yaml("nsample: [3, 2]").unwrap_err();
        match err {
            BenchError::InvalidDesign { key_path, .. } => assert_eq!(key_path, "nsample[1]"),
            other => panic!("unexpected {:?}", other),
        }
        assert!(Condition::from_yaml("pde: [0]").is_err());
        assert!(Condition::from_yaml("pde: [100]").is_ok());
        assert!(Condition::from_yaml("frac_up: [1.2]").is_err());
        assert!(Condition::from_yaml("nrep: 2").is_err());
        assert!(Condition::from_yaml("outlier_mode: [X]").is_err());
    }

    #[test]
    fn test_repeated_axis_values_rejected() {
        let err = Condition::from_yaml("frac_up: [0.0, 0.5, -0.0]").unwrap_err();
        match err {
            BenchError::InvalidDesign { key_path, .. } => assert_eq!(key_path, "frac_up[2]"),
            other => panic!("unexpected {:?}", other),
        }
        assert!(Condition::from_yaml("frac_up: [-0.0]").is_err());
        assert!(Condition::from_yaml("pde: [10, 10.0]").is_err());
        assert!(Condition::from_yaml("frac_up: [0.0, 1.0]").is_ok());
    }

    #[test]
    fn test_fixed_fold_only_for_kirc() {
        let yaml = "simul_data: [KIRC, Bottomly]\nsimulation:\n  fixed_fold: true\n";
        assert!(matches!(
            Condition::from_yaml(yaml),
            Err(BenchError::InvalidDesign { .. })
        ));
        let yaml = "simul_data: KIRC\nsimulation:\n  fixed_fold: true\n";
        assert!(Condition::from_yaml(yaml).is_ok());
    }
}
