//! Design axes shared by condition files, the simulator and the
//! composition tree.

use crate::error::{BenchError, Result};
use crate::params::Cohort;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Reference source the simulation parameters are drawn from.
///
/// The two cross sources combine the means of one cohort with the
/// dispersions of the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SimulSource {
    /// Kidney renal clear cell carcinoma cohort (cancer vs normal).
    #[serde(rename = "KIRC")]
    Kirc,
    /// Bottomly mouse strain cohort (C vs D).
    #[serde(rename = "Bottomly")]
    Bottomly,
    /// KIRC means with Bottomly dispersions.
    #[serde(rename = "mKdB")]
    MeanKircDispBottomly,
    /// Bottomly means with KIRC dispersions.
    #[serde(rename = "mBdK")]
    MeanBottomlyDispKirc,
}

impl SimulSource {
    /// Get all sources in canonical order.
    pub fn all() -> Vec<Self> {
        vec![
            Self::Kirc,
            Self::Bottomly,
            Self::MeanKircDispBottomly,
            Self::MeanBottomlyDispKirc,
        ]
    }

    /// Name used in file paths and seed keys.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Kirc => "KIRC",
            Self::Bottomly => "Bottomly",
            Self::MeanKircDispBottomly => "mKdB",
            Self::MeanBottomlyDispKirc => "mBdK",
        }
    }

    /// Cohort whose pooled means define the simulated genes.
    pub fn mean_cohort(&self) -> Cohort {
        match self {
            Self::Kirc | Self::MeanKircDispBottomly => Cohort::Kirc,
            Self::Bottomly | Self::MeanBottomlyDispKirc => Cohort::Bottomly,
        }
    }

    /// Cohort whose dispersions are used.
    pub fn dispersion_cohort(&self) -> Cohort {
        match self {
            Self::Kirc | Self::MeanBottomlyDispKirc => Cohort::Kirc,
            Self::Bottomly | Self::MeanKircDispBottomly => Cohort::Bottomly,
        }
    }

    /// Whether means and dispersions come from different cohorts.
    pub fn is_cross(&self) -> bool {
        self.mean_cohort() != self.dispersion_cohort()
    }

    /// Default number of simulated genes.
    pub fn default_n_genes(&self) -> usize {
        match self {
            Self::Kirc => 10_000,
            _ => 5_000,
        }
    }
}

impl fmt::Display for SimulSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SimulSource {
    type Err = BenchError;

    fn from_str(s: &str) -> Result<Self> {
        Self::all()
            .into_iter()
            .find(|source| source.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| BenchError::InvalidParameter(format!("unknown simul_data '{}'", s)))
    }
}

/// How group dispersions are assigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DispType {
    /// Pooled dispersion shared by both groups.
    Same,
    /// Each group draws its own dispersion from its stratum.
    Different,
}

impl DispType {
    /// Get all dispersion types.
    pub fn all() -> Vec<Self> {
        vec![Self::Same, Self::Different]
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Same => "same",
            Self::Different => "different",
        }
    }
}

impl fmt::Display for DispType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DispType {
    type Err = BenchError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "same" => Ok(Self::Same),
            "different" => Ok(Self::Different),
            _ => Err(BenchError::InvalidParameter(format!("unknown disp_type '{}'", s))),
        }
    }
}

/// Outlier corruption applied after the base draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum OutlierMode {
    /// No injection.
    #[serde(rename = "none")]
    None,
    /// A fixed fraction of cells inflated by a fixed factor.
    #[serde(rename = "D")]
    Dispersed,
    /// A fraction of cells replaced by values resampled from the matrix.
    #[serde(rename = "R")]
    Randomized,
    /// Inflation restricted to one sample per group.
    #[serde(rename = "OS")]
    OneSample,
    /// Deterministic down-weighting of the lowest-count genes.
    #[serde(rename = "DL")]
    DownweightedLow,
}

impl OutlierMode {
    /// Get all outlier modes.
    pub fn all() -> Vec<Self> {
        vec![
            Self::None,
            Self::Dispersed,
            Self::Randomized,
            Self::OneSample,
            Self::DownweightedLow,
        ]
    }

    /// Short code used in file paths and seed keys.
    pub fn code(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Dispersed => "D",
            Self::Randomized => "R",
            Self::OneSample => "OS",
            Self::DownweightedLow => "DL",
        }
    }
}

impl fmt::Display for OutlierMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for OutlierMode {
    type Err = BenchError;

    fn from_str(s: &str) -> Result<Self> {
        Self::all()
            .into_iter()
            .find(|mode| mode.code().eq_ignore_ascii_case(s))
            .ok_or_else(|| BenchError::InvalidParameter(format!("unknown outlier_mode '{}'", s)))
    }
}
