//! Aggregated metric summaries per (figure, plot, pde, method, metric).

use crate::error::Result;
use crate::metrics::Metric;
use crate::report::ResultSet;
use crate::tree::{ConditionKey, Paper};
use serde::{Deserialize, Serialize};
use statrs::statistics::{Data, Median, Statistics};
use std::collections::BTreeMap;
use std::io::Write;

/// Summary of one metric over the replicates of a leaf pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryRow {
    pub condition: ConditionKey,
    pub method: String,
    pub metric: Metric,
    /// Replicates with a defined value.
    pub n: usize,
    /// Replicates whose value is undefined.
    pub n_undefined: usize,
    pub mean: Option<f64>,
    /// Sample standard deviation; absent with fewer than two values.
    pub sd: Option<f64>,
    pub median: Option<f64>,
}

/// A (leaf, method) without metric values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedLeaf {
    pub leaf: String,
    pub method: String,
    pub reason: String,
}

/// Best-effort aggregate of a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub rows: Vec<SummaryRow>,
    pub failed: Vec<FailedLeaf>,
    /// Leaves of the tree that have no result at all.
    pub missing: Vec<String>,
    /// Leaf keys that were reported more than once while merging.
    pub duplicates: Vec<String>,
}

fn summarize(values: &[f64]) -> (Option<f64>, Option<f64>, Option<f64>) {
    if values.is_empty() {
        return (None, None, None);
    }
    let mean = values.iter().mean();
    let sd = if values.len() > 1 {
        Some(values.iter().std_dev())
    } else {
        None
    };
    let median = Data::new(values.to_vec()).median();
    (Some(mean), sd, Some(median))
}

impl Report {
    /// Aggregate a result set over the requested metrics.
    pub fn build(results: &ResultSet, metrics: &[Metric]) -> Self {
        type Group = (ConditionKey, String, Metric);
        let mut groups: BTreeMap<Group, (Vec<f64>, usize)> = BTreeMap::new();
        let mut failed = Vec::new();

        for result in results.iter() {
            for (method, outcome) in &result.methods {
                if let Some(reason) = outcome.reason() {
                    failed.push(FailedLeaf {
                        leaf: result.key.to_string(),
                        method: method.clone(),
                        reason: reason.to_string(),
                    });
                }
                if outcome.is_failed() {
                    continue;
                }
                for &metric in metrics {
                    let entry = groups
                        .entry((result.key.condition, method.clone(), metric))
                        .or_default();
                    match outcome.metric(metric).and_then(|v| v.value()) {
                        Some(v) => entry.0.push(v),
                        None => entry.1 += 1,
                    }
                }
            }
        }

        let rows = groups
            .into_iter()
            .map(|((condition, method, metric), (values, n_undefined))| {
                let (mean, sd, median) = summarize(&values);
                SummaryRow {
                    condition,
                    method,
                    metric,
                    n: values.len(),
                    n_undefined,
                    mean,
                    sd,
                    median,
                }
            })
            .collect();

        Self {
            rows,
            failed,
            missing: Vec::new(),
            duplicates: results.duplicates().iter().map(|k| k.to_string()).collect(),
        }
    }

    /// Aggregate and list the paper's leaves that have no result.
    pub fn for_paper(paper: &Paper, results: &ResultSet, metrics: &[Metric]) -> Self {
        let mut report = Self::build(results, metrics);
        report.missing = paper
            .leaf_keys()
            .into_iter()
            .filter(|k| results.get(k).is_none())
            .map(|k| k.to_string())
            .collect();
        report
    }

    pub fn row(&self, condition: &ConditionKey, method: &str, metric: Metric) -> Option<&SummaryRow> {
        self.rows
            .iter()
            .find(|r| &r.condition == condition && r.method == method && r.metric == metric)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Summary table; absent statistics print as `NaN`.
    pub fn write_tsv<W: Write>(&self, mut writer: W) -> Result<()> {
        let fmt = |v: Option<f64>| v.map_or_else(|| "NaN".to_string(), |v| v.to_string());
        writeln!(
            writer,
            "simul_data\tdisp_type\tfrac_up\tnsample\toutlier_mode\tpde\tmethod\tmetric\tn\tn_undefined\tmean\tsd\tmedian"
        )?;
        for row in &self.rows {
            let c = &row.condition;
            writeln!(
                writer,
                "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
                c.simul_data,
                c.disp_type,
                c.frac_up,
                c.nsample,
                c.outlier_mode,
                c.pde,
                row.method,
                row.metric,
                row.n,
                row.n_undefined,
                fmt(row.mean),
                fmt(row.sd),
                fmt(row.median)
            )?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Failed and missing leaves, one per line.
    pub fn write_failures<W: Write>(&self, mut writer: W) -> Result<()> {
        writeln!(writer, "leaf\tmethod\treason")?;
        for f in &self.failed {
            writeln!(writer, "{}\t{}\t{}", f.leaf, f.method, f.reason)?;
        }
        for leaf in &self.missing {
            writeln!(writer, "{}\t*\tno result", leaf)?;
        }
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::{DispType, OutlierMode, SimulSource};
    use crate::metrics::MetricValue;
    use crate::score::{BenchResult, MethodOutcome};
    use crate::tree::LeafKey;

    fn condition() -> ConditionKey {
        ConditionKey {
            simul_data: SimulSource::Bottomly,
            disp_type: DispType::Different,
            frac_up: 0.7,
            nsample: 3,
            outlier_mode: OutlierMode::Randomized,
            pde: 30.0,
        }
    }

    fn scored(rep: usize, tpr: MetricValue) -> BenchResult {
        let key = LeafKey::new(condition(), rep);
        let mut result = BenchResult::new(key, key.seed(5));
        result.methods.insert(
            "edgeR".to_string(),
            MethodOutcome::Scored {
                metrics: [(Metric::Tpr, tpr)].into_iter().collect(),
                confusion: Default::default(),
            },
        );
        result
    }

    #[test]
    fn test_summary_statistics() {
        let mut set = ResultSet::new();
        set.insert(scored(0, MetricValue::Value(0.2)));
        set.insert(scored(1, MetricValue::Value(0.4)));
        set.insert(scored(2, MetricValue::Value(0.9)));
        set.insert(scored(3, MetricValue::undefined("no DE genes in truth")));

        let report = Report::build(&set, &[Metric::Tpr]);
        let row = report.row(&condition(), "edgeR", Metric::Tpr).unwrap();
        assert_eq!(row.n, 3);
        assert_eq!(row.n_undefined, 1);
        assert!((row.mean.unwrap() - 0.5).abs() < 1e-12);
        assert!((row.median.unwrap() - 0.4).abs() < 1e-12);
        // sample sd of 0.2, 0.4, 0.9
        let sd = ((0.09 + 0.01 + 0.16) / 2.0f64).sqrt();
        assert!((row.sd.unwrap() - sd).abs() < 1e-12);
        assert!(report.failed.is_empty());
    }

    #[test]
    fn test_failures_listed_not_averaged() {
        let mut set = ResultSet::new();
        set.insert(scored(0, MetricValue::Value(0.5)));
        let mut failed = scored(1, MetricValue::Value(0.0));
        failed.mark_failed("edgeR", "exited with 1");
        set.insert(failed);

        let report = Report::build(&set, &[Metric::Tpr]);
        let row = report.row(&condition(), "edgeR", Metric::Tpr).unwrap();
        assert_eq!(row.n, 1);
        assert_eq!(row.sd, None);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].reason, "exited with 1");

        let mut buf = Vec::new();
        report.write_tsv(&mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.lines().nth(1).unwrap().ends_with("\tedgeR\ttpr\t1\t0\t0.5\tNaN\t0.5"));
    }
}
