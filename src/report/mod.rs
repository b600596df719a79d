//! Aggregation of leaf results into reports.

mod results;
mod summary;

pub use results::ResultSet;
pub use summary::{FailedLeaf, Report, SummaryRow};
