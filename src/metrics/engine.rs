//! Pure metric functions over (truth, score, call) vectors.
//!
//! Conventions shared by every metric:
//! - truth collapses up/down into DE vs non-DE;
//! - smaller scores are stronger evidence, NaN ranks as +inf;
//! - a gene at exactly the threshold is called.

use crate::metrics::{Metric, MetricValue, CUTOFF_FDR_TARGET};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// 2×2 table of binary calls against binary truth.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Confusion {
    pub true_positives: usize,
    pub false_positives: usize,
    pub false_negatives: usize,
    pub true_negatives: usize,
}

impl Confusion {
    pub fn from_calls(truth: &[bool], called: &[bool]) -> Self {
        let mut table = Self::default();
        for (&is_de, &is_called) in truth.iter().zip(called) {
            match (is_de, is_called) {
                (true, true) => table.true_positives += 1,
                (false, true) => table.false_positives += 1,
                (true, false) => table.false_negatives += 1,
                (false, false) => table.true_negatives += 1,
            }
        }
        table
    }

    pub fn total(&self) -> usize {
        self.true_positives + self.false_positives + self.false_negatives + self.true_negatives
    }

    pub fn n_called(&self) -> usize {
        self.true_positives + self.false_positives
    }

    pub fn n_de(&self) -> usize {
        self.true_positives + self.false_negatives
    }
}

/// NaN maps to +inf so missing evidence ranks last.
#[inline]
fn rank_score(score: f64) -> f64 {
    if score.is_nan() {
        f64::INFINITY
    } else {
        score
    }
}

fn ascending(a: f64, b: f64) -> Ordering {
    a.total_cmp(&b)
}

/// Area under the ROC curve (Mann–Whitney, ties averaged).
pub fn auc(truth: &[bool], scores: &[f64]) -> MetricValue {
    let n_pos = truth.iter().filter(|&&t| t).count();
    let n_neg = truth.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return MetricValue::undefined("truth has a single class");
    }

    let mut order: Vec<(f64, bool)> = scores
        .iter()
        .zip(truth)
        .map(|(&s, &t)| (rank_score(s), t))
        .collect();
    order.sort_by(|a, b| ascending(a.0, b.0));
    if order.first().map(|f| f.0) == order.last().map(|l| l.0) {
        return MetricValue::undefined("all scores tie");
    }

    // Rank sum of DE genes, with tied groups sharing their mean rank.
    let mut rank_sum_pos = 0.0;
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && order[j + 1].0 == order[i].0 {
            j += 1;
        }
        let mean_rank = (i + j) as f64 / 2.0 + 1.0;
        let pos_in_group = order[i..=j].iter().filter(|g| g.1).count();
        rank_sum_pos += mean_rank * pos_in_group as f64;
        i = j + 1;
    }

    // U counts (DE, non-DE) pairs where the DE gene scores worse.
    let u_worse = rank_sum_pos - (n_pos * (n_pos + 1)) as f64 / 2.0;
    MetricValue::Value(1.0 - u_worse / (n_pos as f64 * n_neg as f64))
}

/// True positive rate: TP / #DE.
pub fn tpr(truth: &[bool], called: &[bool]) -> MetricValue {
    let table = Confusion::from_calls(truth, called);
    if table.n_de() == 0 {
        return MetricValue::undefined("no DE genes in truth");
    }
    MetricValue::Value(table.true_positives as f64 / table.n_de() as f64)
}

/// False discovery rate: FP / #called, 0 when nothing is called.
pub fn fdr(truth: &[bool], called: &[bool]) -> MetricValue {
    let table = Confusion::from_calls(truth, called);
    if table.n_called() == 0 {
        return MetricValue::Value(0.0);
    }
    MetricValue::Value(table.false_positives as f64 / table.n_called() as f64)
}

/// F1 = 2TP / (2TP + FP + FN), 0 when there are no true positives.
pub fn f1_score(truth: &[bool], called: &[bool]) -> MetricValue {
    let table = Confusion::from_calls(truth, called);
    if table.true_positives == 0 {
        return MetricValue::Value(0.0);
    }
    let tp2 = 2.0 * table.true_positives as f64;
    MetricValue::Value(tp2 / (tp2 + (table.false_positives + table.false_negatives) as f64))
}

/// Cohen's kappa between calls and truth.
pub fn kappa(truth: &[bool], called: &[bool]) -> MetricValue {
    let table = Confusion::from_calls(truth, called);
    let n = table.total();
    if n == 0 {
        return MetricValue::undefined("no genes");
    }
    let n = n as f64;
    let observed = (table.true_positives + table.true_negatives) as f64 / n;
    let called_rate = table.n_called() as f64 / n;
    let de_rate = table.n_de() as f64 / n;
    let expected = called_rate * de_rate + (1.0 - called_rate) * (1.0 - de_rate);
    if (1.0 - expected).abs() < f64::EPSILON {
        return MetricValue::undefined("chance agreement is 1");
    }
    MetricValue::Value((observed - expected) / (1.0 - expected))
}

/// First distinct score, scanning upwards, at which the FDR of
/// `score <= s` exceeds `target`; the smallest score if it never does.
/// Non-finite scores are never reached by the scan.
pub fn cutoff(truth: &[bool], scores: &[f64], target: f64) -> MetricValue {
    let mut order: Vec<(f64, bool)> = scores
        .iter()
        .zip(truth)
        .filter(|(s, _)| s.is_finite())
        .map(|(&s, &t)| (s, t))
        .collect();
    if order.is_empty() {
        return MetricValue::undefined("no finite scores");
    }
    order.sort_by(|a, b| ascending(a.0, b.0));

    let (mut called, mut false_pos) = (0usize, 0usize);
    let mut i = 0;
    while i < order.len() {
        let score = order[i].0;
        while i < order.len() && order[i].0 == score {
            called += 1;
            if !order[i].1 {
                false_pos += 1;
            }
            i += 1;
        }
        if false_pos as f64 / called as f64 > target {
            return MetricValue::Value(score);
        }
    }
    MetricValue::Value(order[0].0)
}

/// Joined per-gene inputs of one (dataset, method) pair.
#[derive(Debug, Clone, Copy)]
pub struct Evaluation<'a> {
    /// DE (up or down) in the planted truth.
    pub truth: &'a [bool],
    pub scores: &'a [f64],
    /// Thresholded calls.
    pub called: &'a [bool],
    /// Whether the method reported its own per-gene calls.
    pub has_calls: bool,
}

impl<'a> Evaluation<'a> {
    pub fn confusion(&self) -> Confusion {
        Confusion::from_calls(self.truth, self.called)
    }
}

/// Compute one metric.
pub fn evaluate(metric: Metric, input: &Evaluation<'_>) -> MetricValue {
    if input.truth.is_empty() {
        return MetricValue::undefined("no genes to score");
    }
    match metric {
        Metric::Auc if input.has_calls && !input.called.contains(&true) => {
            MetricValue::undefined("no gene called DE")
        }
        Metric::Auc => auc(input.truth, input.scores),
        Metric::Tpr => tpr(input.truth, input.called),
        Metric::Fdr => fdr(input.truth, input.called),
        Metric::Cutoff => cutoff(input.truth, input.scores, CUTOFF_FDR_TARGET),
        Metric::F1Score => f1_score(input.truth, input.called),
        Metric::Kappa => kappa(input.truth, input.called),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha20Rng;

    fn approx(v: MetricValue, expected: f64) {
        let got = v.value().unwrap();
        assert!((got - expected).abs() < 1e-12, "got {}, expected {}", got, expected);
    }

    #[test]
    fn test_auc_perfect_and_inverted() {
        let truth = [true, true, false, false];
        approx(auc(&truth, &[0.01, 0.02, 0.5, 0.9]), 1.0);
        approx(auc(&truth, &[0.5, 0.9, 0.01, 0.02]), 0.0);
    }

    #[test]
    fn test_auc_ties_averaged() {
        // one of four pairs tied, the rest correct
        let truth = [true, true, false, false];
        approx(auc(&truth, &[0.1, 0.3, 0.3, 0.5]), 0.875);
    }

    #[test]
    fn test_auc_nan_ranks_last() {
        let truth = [true, false, false];
        approx(auc(&truth, &[0.2, f64::NAN, 0.4]), 1.0);
        approx(auc(&[false, true, true], &[0.2, f64::NAN, 0.4]), 0.0);
    }

    #[test]
    fn test_auc_degenerate() {
        assert!(!auc(&[true, true], &[0.1, 0.2]).is_defined());
        assert!(!auc(&[true, false], &[0.3, 0.3]).is_defined());
    }

    #[test]
    fn test_rates_without_calls() {
        let truth = [true, false, true, false];
        let none = [false; 4];
        approx(fdr(&truth, &none), 0.0);
        approx(tpr(&truth, &none), 0.0);
        approx(f1_score(&truth, &none), 0.0);
        approx(kappa(&truth, &none), 0.0);
    }

    #[test]
    fn test_tpr_without_de_is_undefined() {
        let truth = [false; 5];
        let called = [true, false, false, false, false];
        assert_eq!(
            tpr(&truth, &called).reason(),
            Some("no DE genes in truth")
        );
        approx(fdr(&truth, &called), 1.0);
    }

    #[test]
    fn test_counts_based_metrics() {
        // TP=2 FP=1 FN=1 TN=2
        let truth = [true, true, true, false, false, false];
        let called = [true, true, false, true, false, false];
        approx(tpr(&truth, &called), 2.0 / 3.0);
        approx(fdr(&truth, &called), 1.0 / 3.0);
        approx(f1_score(&truth, &called), 4.0 / 6.0);
        // po = 4/6, pe = 0.5
        approx(kappa(&truth, &called), 1.0 / 3.0);
    }

    #[test]
    fn test_kappa_perfect_and_chance() {
        let truth = [true, false, true, false, false];
        approx(kappa(&truth, &truth), 1.0);
        assert!(!kappa(&[true; 3], &[true; 3]).is_defined());

        let mut rng = ChaCha20Rng::seed_from_u64(17);
        let truth: Vec<bool> = (0..20_000).map(|_| rng.gen_bool(0.2)).collect();
        let called: Vec<bool> = (0..20_000).map(|_| rng.gen_bool(0.3)).collect();
        let k = kappa(&truth, &called).value().unwrap();
        assert!(k.abs() < 0.03, "kappa {}", k);
    }

    #[test]
    fn test_cutoff() {
        let truth = [true, true, false, true, false];
        // FDR: 0/1, 0/2, 1/3 > 0.05 at 0.03
        approx(cutoff(&truth, &[0.01, 0.02, 0.03, 0.04, 0.5], 0.05), 0.03);
        approx(cutoff(&[true, true], &[0.2, 0.1], 0.05), 0.1);
        assert!(!cutoff(&[true], &[f64::NAN], 0.05).is_defined());
    }

    #[test]
    fn test_cutoff_skips_infinite_scores() {
        // only the unreported non-DE genes would push FDR over the target
        let truth = [true, true, false, false];
        let scores = [0.01, 0.02, f64::INFINITY, f64::INFINITY];
        approx(cutoff(&truth, &scores, 0.05), 0.01);
        assert!(!cutoff(&[false], &[f64::INFINITY], 0.05).is_defined());
    }

    #[test]
    fn test_cutoff_tied_scores_enter_together() {
        // at 0.01 both genes enter: FDR 1/2
        approx(cutoff(&[true, false, true], &[0.01, 0.01, 0.02], 0.05), 0.01);
    }

    #[test]
    fn test_evaluate_dispatch() {
        let truth = [true, false];
        let scores = [0.01, 0.9];
        let called = [true, false];
        let input = Evaluation {
            truth: &truth,
            scores: &scores,
            called: &called,
            has_calls: true,
        };
        for metric in Metric::all() {
            assert!(evaluate(metric, &input).is_defined(), "{}", metric);
        }
        assert_eq!(input.confusion().true_negatives, 1);
    }

    #[test]
    fn test_auc_flagged_when_calls_are_all_ns() {
        let truth = [true, true, false, false];
        let scores = [0.2, 0.3, 0.6, 0.9];
        let called = [false; 4];
        let mut input = Evaluation {
            truth: &truth,
            scores: &scores,
            called: &called,
            has_calls: true,
        };
        assert_eq!(evaluate(Metric::Auc, &input).reason(), Some("no gene called DE"));

        // Without a call column the ranking alone is scored.
        input.has_calls = false;
        approx(evaluate(Metric::Auc, &input), 1.0);
    }
}
