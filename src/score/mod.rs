//! Method outputs, runners and per-leaf scoring.

pub mod output;
pub mod result;
pub mod runner;

pub use output::{MethodOutput, OutputGene};
pub use result::{join, BenchResult, Joined, MethodOutcome};
pub use runner::{
    render_template, runner_from_options, AnalysisRunner, CommandRunner, RunRequest,
    TemplateLocator,
};
