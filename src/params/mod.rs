//! Empirical simulation priors.
//!
//! Per-gene mean and dispersion tables are estimated offline from the two
//! reference cohorts and consumed here as read-only lookup tables.

mod store;

pub(crate) use store::rank_order;
pub use store::{
    Cohort, CohortParameters, GeneParams, ParameterStore, ParameterTable, ParameterView,
    SourceParameters, Stratify,
};
