//! Fixed empirical constants of the count model.
//!
//! These values determine the simulated data bit for bit; changing any of
//! them changes every dataset produced from a given seed.

/// Half-width of the mean window used when borrowing a dispersion from a
/// group stratum (`disp_type = different`).
pub const DISPERSION_WINDOW: f64 = 20.0;

/// Offset added to the Exp(1) fold change for 3 samples per group or fewer.
pub const FOLD_OFFSET_SMALL: f64 = 1.5;
/// Offset added to the Exp(1) fold change for 4 or 5 samples per group.
pub const FOLD_OFFSET_MEDIUM: f64 = 1.3;
/// Offset added to the Exp(1) fold change for larger designs.
pub const FOLD_OFFSET_LARGE: f64 = 1.2;

/// Fixed fold changes (KIRC only): first third up, second third up, rest down.
pub const FIXED_FOLD_UP_LOW: f64 = 1.15;
pub const FIXED_FOLD_UP_HIGH: f64 = 1.3;
pub const FIXED_FOLD_DOWN: f64 = 1.6;

/// Per-sample library scale factors drawn uniformly from this range.
pub const SAMPLE_SCALE_RANGE: (f64, f64) = (0.7, 1.3);

/// `D`: percentage of cells inflated.
pub const DISPERSED_PERCENT: f64 = 5.0;
/// `D`: multiplicative inflation factor.
pub const DISPERSED_FACTOR: f64 = 5.0;

/// `R`: default percentage of cells replaced by resampled values.
pub const RANDOMIZED_PERCENT: f64 = 5.0;

/// `OS`: percentage of genes inflated inside the chosen sample.
pub const ONE_SAMPLE_PERCENT: f64 = 5.0;
/// `OS`: inflation factor range.
pub const ONE_SAMPLE_FACTOR_RANGE: (f64, f64) = (5.0, 10.0);

/// `DL`: fraction of genes (lowest mean count) that are down-weighted.
pub const DOWNWEIGHT_GENE_FRACTION: f64 = 0.10;
/// `DL`: weight applied to the selected genes' counts (floored).
pub const DOWNWEIGHT_FACTOR: f64 = 0.5;
