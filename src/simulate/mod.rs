//! Synthetic RNA-seq count simulation.

pub mod constants;
pub mod generate;
pub mod outlier;
pub mod sampling;

pub use generate::{
    de_gene_counts, n_de_genes, simulate, simulate_dataset, SimulationDesign, SimulationOptions,
    Simulated,
};
pub use outlier::inject;
pub use sampling::{negative_binomial, DispersionPool};
