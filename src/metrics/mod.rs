//! Classification metrics comparing method calls with planted truth.

pub mod engine;

pub use engine::{auc, cutoff, evaluate, f1_score, fdr, kappa, tpr, Confusion, Evaluation};

use crate::error::BenchError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Target FDR used by the `cutoff` metric.
pub const CUTOFF_FDR_TARGET: f64 = 0.05;

/// Metrics a condition can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    Auc,
    Tpr,
    Fdr,
    Cutoff,
    #[serde(rename = "f1score")]
    F1Score,
    Kappa,
}

impl Metric {
    pub fn all() -> Vec<Self> {
        vec![
            Self::Auc,
            Self::Tpr,
            Self::Fdr,
            Self::Cutoff,
            Self::F1Score,
            Self::Kappa,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Auc => "auc",
            Self::Tpr => "tpr",
            Self::Fdr => "fdr",
            Self::Cutoff => "cutoff",
            Self::F1Score => "f1score",
            Self::Kappa => "kappa",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Metric {
    type Err = BenchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .into_iter()
            .find(|m| m.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| BenchError::InvalidParameter(format!("unknown metric '{}'", s)))
    }
}

/// A metric outcome; degenerate inputs are recorded, never coerced to a number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricValue {
    Value(f64),
    Undefined { reason: String },
}

impl MetricValue {
    pub fn undefined(reason: impl Into<String>) -> Self {
        Self::Undefined {
            reason: reason.into(),
        }
    }

    /// The numeric value, if defined.
    pub fn value(&self) -> Option<f64> {
        match self {
            Self::Value(v) => Some(*v),
            Self::Undefined { .. } => None,
        }
    }

    pub fn is_defined(&self) -> bool {
        matches!(self, Self::Value(_))
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Value(_) => None,
            Self::Undefined { reason } => Some(reason),
        }
    }
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(v) => write!(f, "{}", v),
            Self::Undefined { .. } => f.write_str("NaN"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_names() {
        for metric in Metric::all() {
            assert_eq!(metric.name().parse::<Metric>().unwrap(), metric);
        }
        let parsed: Vec<Metric> = serde_yaml::from_str("[auc, f1score, kappa]").unwrap();
        assert_eq!(parsed, vec![Metric::Auc, Metric::F1Score, Metric::Kappa]);
        assert!("precision".parse::<Metric>().is_err());
    }

    #[test]
    fn test_undefined_value() {
        let v = MetricValue::undefined("single class");
        assert!(!v.is_defined());
        assert_eq!(v.to_string(), "NaN");
        assert_eq!(v.reason(), Some("single class"));
        assert_eq!(MetricValue::Value(0.25).value(), Some(0.25));
    }
}
