//! Condition files and their design axes.

mod axes;
mod config;

pub use axes::{DispType, OutlierMode, SimulSource};
pub use config::{
    Condition, MissingGenes, ScoringOptions, DEFAULT_FRAC_UP, DEFAULT_NREP, DEFAULT_NSAMPLE,
    DEFAULT_PDE, DEFAULT_SEED, MIN_NREP, MIN_NSAMPLE,
};
