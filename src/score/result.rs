//! Scoring method outputs against a dataset's planted truth.

use crate::condition::{MissingGenes, ScoringOptions};
use crate::data::{Dataset, Label};
use crate::error::{BenchError, Result};
use crate::metrics::{evaluate, Confusion, Evaluation, Metric, MetricValue};
use crate::score::MethodOutput;
use crate::tree::LeafKey;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

/// Truth, scores and calls aligned to the dataset's gene order.
#[derive(Debug, Clone, PartialEq)]
pub struct Joined {
    pub truth: Vec<bool>,
    pub scores: Vec<f64>,
    pub called: Vec<bool>,
    /// Whether the output carried its own calls.
    pub has_calls: bool,
    /// Genes whose echoed label disagrees with the planted one.
    pub label_mismatches: usize,
}

impl Joined {
    pub fn evaluation(&self) -> Evaluation<'_> {
        Evaluation {
            truth: &self.truth,
            scores: &self.scores,
            called: &self.called,
            has_calls: self.has_calls,
        }
    }
}

/// Align a method output with the dataset genes.
///
/// A gene is called iff its call (when present) is not `ns` and its score is
/// at or below `de_score_threshold`.
pub fn join(dataset: &Dataset, output: &MethodOutput, options: &ScoringOptions) -> Result<Joined> {
    let n = dataset.n_genes();
    let mut joined = Joined {
        truth: Vec::with_capacity(n),
        scores: Vec::with_capacity(n),
        called: Vec::with_capacity(n),
        has_calls: output.has_calls(),
        label_mismatches: 0,
    };
    let threshold = options.de_score_threshold;

    for (gene_id, &label) in dataset.counts.gene_ids().iter().zip(&dataset.labels) {
        joined.truth.push(label.is_de());
        match output.get(gene_id) {
            Some(gene) => {
                let call_allows = gene.call.map_or(true, |c| c != Label::NotSignificant);
                joined.scores.push(gene.score);
                joined.called.push(call_allows && gene.score <= threshold);
                if gene.label.is_some_and(|echoed| echoed != label) {
                    joined.label_mismatches += 1;
                }
            }
            None => match options.missing_genes {
                MissingGenes::Fail => return Err(BenchError::UnmatchedGeneId(gene_id.clone())),
                MissingGenes::NotCalled => {
                    joined.scores.push(f64::INFINITY);
                    joined.called.push(false);
                }
            },
        }
    }
    Ok(joined)
}

/// Outcome of one method on one leaf.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MethodOutcome {
    Scored {
        metrics: BTreeMap<Metric, MetricValue>,
        confusion: Confusion,
    },
    /// Scoring could not join the output; every metric is undefined.
    Unscored {
        metrics: BTreeMap<Metric, MetricValue>,
        reason: String,
    },
    /// The runner failed or timed out.
    Failed { reason: String },
}

impl MethodOutcome {
    pub fn metric(&self, metric: Metric) -> Option<&MetricValue> {
        match self {
            Self::Scored { metrics, .. } | Self::Unscored { metrics, .. } => metrics.get(&metric),
            Self::Failed { .. } => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    pub fn is_scored(&self) -> bool {
        matches!(self, Self::Scored { .. })
    }

    /// Scored beats unscored beats failed when two runs disagree.
    pub fn precedence(&self) -> u8 {
        match self {
            Self::Scored { .. } => 2,
            Self::Unscored { .. } => 1,
            Self::Failed { .. } => 0,
        }
    }

    /// Failure or degradation reason, if any.
    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Scored { .. } => None,
            Self::Unscored { reason, .. } | Self::Failed { reason } => Some(reason),
        }
    }
}

/// Metric values of every method on one leaf.
///
/// Shares its seed with the dataset it scores and can be recomputed from
/// the persisted dataset alone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchResult {
    pub key: LeafKey,
    pub seed: u64,
    pub methods: BTreeMap<String, MethodOutcome>,
}

impl BenchResult {
    pub fn new(key: LeafKey, seed: u64) -> Self {
        Self {
            key,
            seed,
            methods: BTreeMap::new(),
        }
    }

    /// Score one method output and record it.
    pub fn score_method(
        &mut self,
        method: &str,
        dataset: &Dataset,
        output: &MethodOutput,
        options: &ScoringOptions,
        metrics: &[Metric],
    ) -> &MethodOutcome {
        let outcome = match join(dataset, output, options) {
            Ok(joined) => {
                if joined.label_mismatches > 0 {
                    warn!(
                        leaf = %self.key,
                        method,
                        mismatches = joined.label_mismatches,
                        "method output labels disagree with the dataset"
                    );
                }
                let input = joined.evaluation();
                MethodOutcome::Scored {
                    metrics: metrics.iter().map(|&m| (m, evaluate(m, &input))).collect(),
                    confusion: input.confusion(),
                }
            }
            Err(e) => {
                let reason = e.to_string();
                warn!(leaf = %self.key, method, %reason, "method output not scored");
                MethodOutcome::Unscored {
                    metrics: metrics
                        .iter()
                        .map(|&m| (m, MetricValue::undefined(reason.clone())))
                        .collect(),
                    reason,
                }
            }
        };
        self.methods.insert(method.to_string(), outcome);
        &self.methods[method]
    }

    /// Record a runner failure for `method`.
    pub fn mark_failed(&mut self, method: &str, reason: impl Into<String>) {
        self.methods.insert(
            method.to_string(),
            MethodOutcome::Failed {
                reason: reason.into(),
            },
        );
    }

    pub fn metric(&self, method: &str, metric: Metric) -> Option<&MetricValue> {
        self.methods.get(method).and_then(|o| o.metric(metric))
    }

    /// Whether `method` already has a scored outcome.
    pub fn is_scored(&self, method: &str) -> bool {
        self.methods.get(method).is_some_and(MethodOutcome::is_scored)
    }

    /// Fold another result for the same leaf in, keeping the higher-precedence
    /// outcome per method. Returns whether anything changed.
    pub fn absorb(&mut self, other: BenchResult) -> bool {
        let mut changed = false;
        for (method, outcome) in other.methods {
            let replace = self
                .methods
                .get(&method)
                .map_or(true, |kept| outcome.precedence() > kept.precedence());
            if replace {
                self.methods.insert(method, outcome);
                changed = true;
            }
        }
        changed
    }

    /// Methods that failed or could not be scored.
    pub fn failures(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.methods
            .iter()
            .filter_map(|(name, outcome)| outcome.reason().map(|r| (name.as_str(), r)))
    }
}
