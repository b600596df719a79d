//! Composition tree over the design axes, with seed derivation.

mod key;
mod paper;
mod pool;

pub use key::{derive_seed, ConditionKey, LeafKey};
pub use paper::{Figure, GenerationSummary, Paper, Plot, ScoringSummary};
pub use pool::{DataPool, Replicate};
