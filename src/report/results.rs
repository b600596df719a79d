//! Result sets keyed by leaf, merged without double counting.

use crate::error::Result;
use crate::metrics::Metric;
use crate::score::{BenchResult, MethodOutcome};
use crate::tree::{LeafKey, Paper};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;
use tracing::warn;

/// Leaf results, at most one per leaf key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    results: BTreeMap<LeafKey, BenchResult>,
    duplicates: Vec<LeafKey>,
}

impl ResultSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Results accumulated in a paper.
    pub fn from_paper(paper: &Paper) -> Self {
        let mut set = Self::new();
        for result in paper.results() {
            set.insert(result.clone());
        }
        set
    }

    /// Insert a result. A second result for the same leaf is reported as a
    /// duplicate; per method, a scored outcome replaces an unscored or
    /// failed one and otherwise the first is kept. Returns whether anything
    /// changed.
    pub fn insert(&mut self, result: BenchResult) -> bool {
        match self.results.get_mut(&result.key) {
            Some(kept) => {
                warn!(leaf = %result.key, "duplicate result for leaf");
                self.duplicates.push(result.key);
                kept.absorb(result)
            }
            None => {
                self.results.insert(result.key, result);
                true
            }
        }
    }

    /// Replace the result of a leaf without reporting a duplicate. For
    /// results that were built on top of the stored one.
    pub fn update(&mut self, result: BenchResult) {
        self.results.insert(result.key, result);
    }

    /// Merge another partial set into this one.
    pub fn merge(&mut self, other: ResultSet) {
        self.duplicates.extend(other.duplicates);
        for result in other.results.into_values() {
            self.insert(result);
        }
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn get(&self, key: &LeafKey) -> Option<&BenchResult> {
        self.results.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &BenchResult> + '_ {
        self.results.values()
    }

    /// Leaf keys seen more than once.
    pub fn duplicates(&self) -> &[LeafKey] {
        &self.duplicates
    }

    pub fn to_json(&self) -> Result<String> {
        let results: Vec<&BenchResult> = self.results.values().collect();
        Ok(serde_json::to_string_pretty(&results)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let results: Vec<BenchResult> = serde_json::from_str(json)?;
        let mut set = Self::new();
        for result in results {
            set.insert(result);
        }
        Ok(set)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// One row per (leaf, method, metric); undefined values print as `NaN`
    /// with their reason.
    pub fn write_tsv<W: Write>(&self, mut writer: W, metrics: &[Metric]) -> Result<()> {
        writeln!(writer, "leaf\tseed\tmethod\tmetric\tvalue\treason")?;
        for result in self.results.values() {
            for (method, outcome) in &result.methods {
                for &metric in metrics {
                    let (value, reason) = match (outcome, outcome.metric(metric)) {
                        (_, Some(v)) => (v.to_string(), v.reason().unwrap_or("").to_string()),
                        (MethodOutcome::Failed { reason }, None) => ("NaN".to_string(), reason.clone()),
                        (_, None) => ("NaN".to_string(), "metric not computed".to_string()),
                    };
                    writeln!(
                        writer,
                        "{}\t{}\t{}\t{}\t{}\t{}",
                        result.key, result.seed, method, metric, value, reason
                    )?;
                }
            }
        }
        writer.flush()?;
        Ok(())
    }
}
