//! Data structures for simulated RNA-seq benchmarks.

mod count_matrix;
mod dataset;

pub use count_matrix::CountMatrix;
pub use dataset::{Dataset, Label, GENE_SYMBOL_PREFIX};
