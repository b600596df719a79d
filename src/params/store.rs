//! Empirical per-gene mean/dispersion tables estimated from the reference cohorts.

use crate::condition::SimulSource;
use crate::error::{BenchError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Real RNA-seq cohort a parameter table was estimated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Cohort {
    /// KIRC: cancer (treatment) vs normal (control).
    Kirc,
    /// Bottomly: strain C (treatment) vs strain D (control).
    Bottomly,
}

impl Cohort {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Kirc => "KIRC",
            Self::Bottomly => "Bottomly",
        }
    }

    /// Column prefix used by the estimator output.
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Kirc => "k",
            Self::Bottomly => "b",
        }
    }

    /// Stratum label of the treatment group.
    pub fn treatment_stratum(&self) -> &'static str {
        match self {
            Self::Kirc => "cancer",
            Self::Bottomly => "C",
        }
    }

    /// Stratum label of the control group.
    pub fn control_stratum(&self) -> &'static str {
        match self {
            Self::Kirc => "normal",
            Self::Bottomly => "D",
        }
    }

    /// File name of the cohort's table inside a parameter directory.
    pub fn file_name(&self) -> String {
        format!("{}_params.csv", self.prefix())
    }
}

/// Mean and negative-binomial dispersion of one gene.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeneParams {
    pub mean: f64,
    pub dispersion: f64,
}

impl GeneParams {
    pub fn new(mean: f64, dispersion: f64) -> Self {
        Self { mean, dispersion }
    }
}

/// Gene-indexed (mean, dispersion) pairs for a single stratum.
#[derive(Debug, Clone)]
pub struct ParameterTable {
    gene_ids: Vec<String>,
    params: Vec<GeneParams>,
    index: HashMap<String, usize>,
}

impl ParameterTable {
    /// Create a table from parallel gene and parameter vectors.
    pub fn new(gene_ids: Vec<String>, params: Vec<GeneParams>) -> Result<Self> {
        if gene_ids.len() != params.len() {
            return Err(BenchError::DimensionMismatch {
                expected: gene_ids.len(),
                actual: params.len(),
            });
        }
        let index = gene_ids
            .iter()
            .enumerate()
            .map(|(i, id)| (id.clone(), i))
            .collect::<HashMap<_, _>>();
        if index.len() != gene_ids.len() {
            return Err(BenchError::InvalidParameter(
                "parameter table contains duplicated gene identifiers".to_string(),
            ));
        }
        Ok(Self {
            gene_ids,
            params,
            index,
        })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.gene_ids.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.gene_ids.is_empty()
    }

    #[inline]
    pub fn gene_ids(&self) -> &[String] {
        &self.gene_ids
    }

    #[inline]
    pub fn params(&self) -> &[GeneParams] {
        &self.params
    }

    /// Parameters of a gene by identifier.
    pub fn get(&self, gene_id: &str) -> Option<GeneParams> {
        self.index.get(gene_id).map(|&i| self.params[i])
    }

    /// Iterate over (gene_id, params) in table order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, GeneParams)> + '_ {
        self.gene_ids
            .iter()
            .map(String::as_str)
            .zip(self.params.iter().copied())
    }

    /// Gene means in table order.
    pub fn means(&self) -> Vec<f64> {
        self.params.iter().map(|p| p.mean).collect()
    }

    /// Ordered gene → parameter mapping.
    pub fn to_map(&self) -> BTreeMap<String, GeneParams> {
        self.iter().map(|(id, p)| (id.to_string(), p)).collect()
    }

    /// Replace dispersions with those of `other`, matching genes by the rank of
    /// their means. Used to build the cross sources.
    fn with_rank_matched_dispersions(&self, other: &ParameterTable) -> Result<Self> {
        if other.is_empty() {
            return Err(BenchError::EmptyData(
                "dispersion table has no genes".to_string(),
            ));
        }
        let own_order = rank_order(&self.means());
        let other_order = rank_order(&other.means());
        let n_self = self.len();
        let n_other = other.len();

        let mut params = self.params.clone();
        for (rank, &gene_idx) in own_order.iter().enumerate() {
            let other_rank = rank * n_other / n_self.max(1);
            let other_idx = other_order[other_rank.min(n_other - 1)];
            params[gene_idx].dispersion = other.params[other_idx].dispersion;
        }
        Self::new(self.gene_ids.clone(), params)
    }
}

/// Indices that sort `values` ascending; ties keep their original order.
pub(crate) fn rank_order(values: &[f64]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));
    order
}

/// Grouping of the returned parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stratify {
    /// Separate tables for the treatment and control groups.
    PerSubgroup,
    /// One table estimated from all samples.
    Pooled,
}

/// Parameters returned by [`ParameterStore::get`].
#[derive(Debug, Clone)]
pub enum ParameterView {
    Pooled(ParameterTable),
    PerSubgroup {
        treatment: ParameterTable,
        control: ParameterTable,
    },
}

/// All strata of one cohort's estimated parameters.
#[derive(Debug, Clone)]
pub struct CohortParameters {
    cohort: Cohort,
    total: ParameterTable,
    treatment: ParameterTable,
    control: ParameterTable,
}

impl CohortParameters {
    /// Assemble cohort parameters; the three strata must cover the same genes.
    pub fn new(
        cohort: Cohort,
        total: ParameterTable,
        treatment: ParameterTable,
        control: ParameterTable,
    ) -> Result<Self> {
        if total.is_empty() {
            return Err(BenchError::EmptyData(format!(
                "{} parameter table has no genes",
                cohort.name()
            )));
        }
        for stratum in [&treatment, &control] {
            if stratum.gene_ids() != total.gene_ids() {
                return Err(BenchError::InvalidParameter(format!(
                    "{} strata do not share the same gene universe",
                    cohort.name()
                )));
            }
        }
        Ok(Self {
            cohort,
            total,
            treatment,
            control,
        })
    }

    /// Read the estimator's CSV for a cohort.
    ///
    /// The first column holds gene identifiers; the remaining columns are
    /// `<prefix>_<stratum>_mean` and `<prefix>_<stratum>_disp` for the
    /// `total`, treatment and control strata.
    ///
    /// Any failure to find or parse the table is a `MissingParameterFile`.
    pub fn from_csv<P: AsRef<Path>>(path: P, cohort: Cohort) -> Result<Self> {
        let path = path.as_ref();
        let unreadable = |reason: String| BenchError::MissingParameterFile {
            source_name: cohort.name().to_string(),
            path: path.to_path_buf(),
            reason,
        };
        if !path.is_file() {
            return Err(unreadable("file not found".to_string()));
        }
        Self::read_csv(path, cohort).map_err(|e| unreadable(e.to_string()))
    }

    fn read_csv(path: &Path, cohort: Cohort) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new().has_headers(true).from_path(path)?;
        let headers = reader.headers()?.clone();
        let column = |stratum: &str, field: &str| -> Result<usize> {
            let name = format!("{}_{}_{}", cohort.prefix(), stratum, field);
            headers
                .iter()
                .position(|h| h == name)
                .ok_or(BenchError::MissingColumn(name))
        };
        let strata = [
            "total",
            cohort.treatment_stratum(),
            cohort.control_stratum(),
        ];
        let mut columns = Vec::with_capacity(strata.len());
        for stratum in strata {
            columns.push((column(stratum, "mean")?, column(stratum, "disp")?));
        }

        let mut gene_ids = Vec::new();
        let mut values: Vec<Vec<GeneParams>> = vec![Vec::new(); strata.len()];
        for (row_idx, record) in reader.records().enumerate() {
            let record = record?;
            let gene_id = record
                .get(0)
                .ok_or_else(|| BenchError::EmptyData(format!("row {} has no gene id", row_idx)))?;
            gene_ids.push(gene_id.to_string());
            for (stratum_idx, &(mean_col, disp_col)) in columns.iter().enumerate() {
                let mean = parse_field(&record, mean_col, row_idx)?;
                let dispersion = parse_field(&record, disp_col, row_idx)?;
                values[stratum_idx].push(GeneParams::new(mean, dispersion));
            }
        }

        let mut tables = values
            .into_iter()
            .map(|params| ParameterTable::new(gene_ids.clone(), params));
        let (Some(total), Some(treatment), Some(control)) =
            (tables.next(), tables.next(), tables.next())
        else {
            return Err(BenchError::EmptyData("missing strata".to_string()));
        };

        debug!(cohort = cohort.name(), genes = gene_ids.len(), path = %path.display(), "loaded parameter table");
        Self::new(cohort, total?, treatment?, control?)
    }

    #[inline]
    pub fn cohort(&self) -> Cohort {
        self.cohort
    }

    #[inline]
    pub fn total(&self) -> &ParameterTable {
        &self.total
    }

    #[inline]
    pub fn treatment(&self) -> &ParameterTable {
        &self.treatment
    }

    #[inline]
    pub fn control(&self) -> &ParameterTable {
        &self.control
    }

    #[inline]
    pub fn n_genes(&self) -> usize {
        self.total.len()
    }
}

fn parse_field(record: &csv::StringRecord, col: usize, row: usize) -> Result<f64> {
    let raw = record.get(col).unwrap_or("").trim();
    let value: f64 = raw.parse().map_err(|_| {
        BenchError::InvalidParameter(format!(
            "non-numeric parameter '{}' at row {}, column {}",
            raw, row, col
        ))
    })?;
    if !value.is_finite() || value < 0.0 {
        return Err(BenchError::InvalidParameter(format!(
            "parameter {} at row {}, column {} must be finite and non-negative",
            raw, row, col
        )));
    }
    Ok(value)
}

/// Parameters the simulator needs for one reference source.
#[derive(Debug, Clone, Copy)]
pub struct SourceParameters<'a> {
    pub source: SimulSource,
    /// Cohort whose pooled means define the simulated genes.
    pub means: &'a CohortParameters,
    /// Cohort providing pooled and per-group dispersions.
    pub dispersions: &'a CohortParameters,
}

/// Read-only store of cohort parameter tables.
#[derive(Debug, Clone, Default)]
pub struct ParameterStore {
    cohorts: BTreeMap<Cohort, CohortParameters>,
    directory: Option<PathBuf>,
}

impl ParameterStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add in-memory cohort parameters.
    pub fn with_cohort(mut self, params: CohortParameters) -> Self {
        self.cohorts.insert(params.cohort(), params);
        self
    }

    /// Load every cohort needed by `sources` from `dir`.
    ///
    /// Fails with `MissingParameterFile` before anything is simulated when a
    /// required table is absent.
    pub fn load<P: AsRef<Path>>(dir: P, sources: &[SimulSource]) -> Result<Self> {
        let dir = dir.as_ref();
        let mut needed: Vec<Cohort> = sources
            .iter()
            .flat_map(|s| [s.mean_cohort(), s.dispersion_cohort()])
            .collect();
        needed.sort();
        needed.dedup();

        let mut store = Self {
            cohorts: BTreeMap::new(),
            directory: Some(dir.to_path_buf()),
        };
        for cohort in needed {
            let params = CohortParameters::from_csv(dir.join(cohort.file_name()), cohort)?;
            info!(cohort = cohort.name(), genes = params.n_genes(), "parameter table ready");
            store.cohorts.insert(cohort, params);
        }
        Ok(store)
    }

    /// Cohort parameters, or `MissingParameterFile` if not loaded.
    pub fn cohort(&self, cohort: Cohort) -> Result<&CohortParameters> {
        self.cohorts
            .get(&cohort)
            .ok_or_else(|| BenchError::MissingParameterFile {
                source_name: cohort.name().to_string(),
                path: self
                    .directory
                    .as_ref()
                    .map(|d| d.join(cohort.file_name()))
                    .unwrap_or_else(|| PathBuf::from(cohort.file_name())),
                reason: "cohort not loaded".to_string(),
            })
    }

    /// Parameters needed to simulate from `source`.
    pub fn for_source(&self, source: SimulSource) -> Result<SourceParameters<'_>> {
        Ok(SourceParameters {
            source,
            means: self.cohort(source.mean_cohort())?,
            dispersions: self.cohort(source.dispersion_cohort())?,
        })
    }

    /// Gene → (mean, dispersion) for a source and stratification.
    ///
    /// Cross sources keep the mean cohort's genes and means and take each
    /// gene's dispersion from the dispersion cohort's gene of equal mean rank.
    pub fn get(&self, source: SimulSource, stratify: Stratify) -> Result<ParameterView> {
        let params = self.for_source(source)?;
        let combine = |means: &ParameterTable, disps: &ParameterTable| -> Result<ParameterTable> {
            if source.is_cross() {
                means.with_rank_matched_dispersions(disps)
            } else {
                Ok(means.clone())
            }
        };
        match stratify {
            Stratify::Pooled => Ok(ParameterView::Pooled(combine(
                params.means.total(),
                params.dispersions.total(),
            )?)),
            Stratify::PerSubgroup => Ok(ParameterView::PerSubgroup {
                treatment: combine(params.means.treatment(), params.dispersions.treatment())?,
                control: combine(params.means.control(), params.dispersions.control())?,
            }),
        }
    }
}
