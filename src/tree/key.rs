//! Leaf keys, dataset file naming and per-leaf seed derivation.

use crate::condition::{DispType, OutlierMode, SimulSource};
use crate::error::{BenchError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Every design axis of a leaf except the replicate index.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ConditionKey {
    pub simul_data: SimulSource,
    pub disp_type: DispType,
    pub frac_up: f64,
    pub nsample: usize,
    pub outlier_mode: OutlierMode,
    pub pde: f64,
}

impl ConditionKey {
    /// Directory and file-name stem:
    /// `{simul_data}_{disp_type}_upFrac{frac_up}_{nsample}spc_{outlier_mode}_{pde}DE`.
    pub fn stem(&self) -> String {
        format!(
            "{}_{}_upFrac{}_{}spc_{}_{}DE",
            self.simul_data, self.disp_type, self.frac_up, self.nsample, self.outlier_mode, self.pde
        )
    }

    /// File name of a replicate dataset with the given seed.
    pub fn dataset_file_name(&self, seed: u64) -> String {
        format!("{}_rep{}.tsv", self.stem(), seed)
    }

    /// Relative path of a replicate dataset: `{stem}/{stem}_rep{seed}.tsv`.
    pub fn dataset_path(&self, seed: u64) -> PathBuf {
        PathBuf::from(self.stem()).join(self.dataset_file_name(seed))
    }

    /// Recover the condition and seed from a dataset file path.
    pub fn parse_dataset_path<P: AsRef<Path>>(path: P) -> Result<(Self, u64)> {
        let path = path.as_ref();
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| BenchError::InvalidParameter(format!("no file stem in {:?}", path)))?;
        let caps = stem_pattern().captures(stem).ok_or_else(|| {
            BenchError::InvalidParameter(format!("'{}' is not a dataset file name", stem))
        })?;

        let parse_f64 = |s: &str| -> Result<f64> {
            s.parse()
                .map_err(|_| BenchError::InvalidParameter(format!("bad number '{}' in '{}'", s, stem)))
        };
        let key = Self {
            simul_data: caps[1].parse()?,
            disp_type: caps[2].parse()?,
            frac_up: parse_f64(&caps[3])?,
            nsample: caps[4]
                .parse()
                .map_err(|_| BenchError::InvalidParameter(format!("bad nsample in '{}'", stem)))?,
            outlier_mode: caps[5].parse()?,
            pde: parse_f64(&caps[6])?,
        };
        let seed = caps[7]
            .parse()
            .map_err(|_| BenchError::InvalidParameter(format!("bad seed in '{}'", stem)))?;
        Ok((key, seed))
    }

    fn canonical_fields(&self) -> String {
        format!(
            "simul_data={}|disp_type={}|frac_up={}|nsample={}|outlier_mode={}|pde={}",
            self.simul_data, self.disp_type, self.frac_up, self.nsample, self.outlier_mode, self.pde
        )
    }

    fn ordering_tuple(&self) -> (SimulSource, DispType, u64, usize, OutlierMode, u64) {
        (
            self.simul_data,
            self.disp_type,
            canonical_bits(self.frac_up),
            self.nsample,
            self.outlier_mode,
            canonical_bits(self.pde),
        )
    }
}

fn stem_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"^(KIRC|Bottomly|mKdB|mBdK)_(same|different)_upFrac([0-9.eE+-]+)_(\d+)spc_(none|D|R|OS|DL)_([0-9.eE+-]+)DE_rep(\d+)$",
        )
        .expect("dataset stem pattern is valid")
    })
}

// -0.0 and 0.0 compare equal; so must their bits.
fn canonical_bits(x: f64) -> u64 {
    if x == 0.0 {
        0
    } else {
        x.to_bits()
    }
}

impl PartialEq for ConditionKey {
    fn eq(&self, other: &Self) -> bool {
        self.ordering_tuple() == other.ordering_tuple()
    }
}

impl Eq for ConditionKey {}

impl Hash for ConditionKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.ordering_tuple().hash(state);
    }
}

impl PartialOrd for ConditionKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ConditionKey {
    // Axis values are validated non-negative, where bit order matches numeric order.
    fn cmp(&self, other: &Self) -> Ordering {
        self.ordering_tuple().cmp(&other.ordering_tuple())
    }
}

impl fmt::Display for ConditionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.stem())
    }
}

/// Full key of one leaf: condition axes plus replicate index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LeafKey {
    pub condition: ConditionKey,
    pub replicate: usize,
}

impl LeafKey {
    pub fn new(condition: ConditionKey, replicate: usize) -> Self {
        Self {
            condition,
            replicate,
        }
    }

    /// Canonical string hashed by [`derive_seed`].
    pub fn canonical(&self, global_seed: u64) -> String {
        format!(
            "seed={}|{}|rep={}",
            global_seed,
            self.condition.canonical_fields(),
            self.replicate
        )
    }

    /// Seed of this leaf under `global_seed`.
    pub fn seed(&self, global_seed: u64) -> u64 {
        derive_seed(global_seed, self)
    }
}

impl fmt::Display for LeafKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.condition.stem(), self.replicate)
    }
}

/// Derive a leaf seed: the first eight bytes (little-endian) of the SHA-256
/// digest of [`LeafKey::canonical`].
///
/// Depends only on the global seed and the key, never on traversal order.
pub fn derive_seed(global_seed: u64, key: &LeafKey) -> u64 {
    let digest = Sha256::digest(key.canonical(global_seed).as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(bytes)
}
