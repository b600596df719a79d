//! Shared fixtures: small parameter tables written in the estimator's CSV layout.

use std::fmt::Write as _;
use std::path::Path;

fn cohort_csv(prefix: &str, treatment: &str, control: &str, n_genes: usize, scale: f64) -> String {
    let mut csv = String::new();
    let _ = writeln!(
        csv,
        "gene,{p}_total_mean,{p}_total_disp,{p}_{t}_mean,{p}_{t}_disp,{p}_{c}_mean,{p}_{c}_disp",
        p = prefix,
        t = treatment,
        c = control
    );
    for i in 0..n_genes {
        let mean = scale * (3.0 + ((i * 37) % 1500) as f64);
        let disp = 0.02 + (i % 13) as f64 * 0.03;
        let _ = writeln!(
            csv,
            "{}{},{},{},{},{},{},{}",
            prefix,
            i,
            mean,
            disp,
            mean * 1.05,
            disp * 0.9,
            mean * 0.95,
            disp * 1.1
        );
    }
    csv
}

/// Write `k_params.csv` and `b_params.csv` into `dir`.
pub fn write_params(dir: &Path, n_genes: usize) {
    std::fs::write(
        dir.join("k_params.csv"),
        cohort_csv("k", "cancer", "normal", n_genes, 1.0),
    )
    .unwrap();
    std::fs::write(
        dir.join("b_params.csv"),
        cohort_csv("b", "C", "D", n_genes, 0.5),
    )
    .unwrap();
}
