//! debench - synthetic RNA-seq differential expression benchmark CLI
//!
//! Generates keyed synthetic datasets from a condition file and scores
//! method outputs against their planted truth.

use clap::{Parser, Subcommand};
use debench::condition::Condition;
use debench::error::{BenchError, Result};
use debench::params::ParameterStore;
use debench::report::{Report, ResultSet};
use debench::score::runner_from_options;
use debench::tree::Paper;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Synthetic RNA-seq differential expression benchmark
#[derive(Parser)]
#[command(name = "debench")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Simulate and write every dataset of a condition file
    Generate {
        /// Condition YAML; defaults are used for missing keys
        #[arg(short, long)]
        condition: Option<PathBuf>,

        /// Directory with k_params.csv / b_params.csv
        #[arg(short, long)]
        params: PathBuf,

        /// Output root for dataset folders
        #[arg(short, long)]
        output: PathBuf,

        /// Override the global seed
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Score method outputs for datasets already generated
    Score {
        /// Condition YAML with method_type and scoring options
        #[arg(short, long)]
        condition: PathBuf,

        /// Root the datasets were generated under
        #[arg(short, long)]
        datasets: PathBuf,

        /// Directory for the report files
        #[arg(short, long)]
        output: PathBuf,

        /// Earlier results.json files to resume from (scored outcomes are kept)
        #[arg(long)]
        merge: Vec<PathBuf>,
    },

    /// Write an example condition file
    Example {
        /// Output path for the YAML
        #[arg(short, long)]
        output: PathBuf,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Generate {
            condition,
            params,
            output,
            seed,
        } => cmd_generate(condition.as_deref(), &params, &output, seed),

        Commands::Score {
            condition,
            datasets,
            output,
            merge,
        } => cmd_score(&condition, &datasets, &output, &merge),

        Commands::Example { output } => cmd_example(&output),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(if e.is_fatal() { 2 } else { 1 });
    }
}

fn load_condition(path: Option<&Path>) -> Result<Condition> {
    match path {
        Some(path) => {
            info!(path = %path.display(), "loading condition");
            Condition::from_file(path)
        }
        None => Ok(Condition::default()),
    }
}

/// Simulate every leaf of the condition
fn cmd_generate(condition_path: Option<&Path>, params_dir: &Path, output: &Path, seed: Option<u64>) -> Result<()> {
    let mut condition = load_condition(condition_path)?;
    if let Some(seed) = seed {
        condition.seed = seed;
    }

    let mut paper = Paper::new(&condition)?;
    let store = ParameterStore::load(params_dir, &paper.sources())?;
    let summary = paper.generate_datasets(&store, output, &condition.simulation)?;

    // Record the exact condition next to the datasets so scoring can rebuild the tree.
    std::fs::create_dir_all(output)?;
    std::fs::write(output.join("condition.yaml"), condition.to_yaml()?)?;
    eprintln!("Wrote {} datasets under {:?}", summary.generated, output);
    Ok(())
}

/// Score all leaves and write the report files
fn cmd_score(condition_path: &Path, datasets: &Path, output: &Path, merge: &[PathBuf]) -> Result<()> {
    let condition = load_condition(Some(condition_path))?;
    if condition.method_type.is_empty() {
        return Err(BenchError::InvalidParameter(
            "condition has no method_type entries to score".to_string(),
        ));
    }

    let mut paper = Paper::new(&condition)?;
    let found = paper.locate_datasets(datasets);
    if found < paper.n_leaves() {
        eprintln!("{} of {} datasets found under {:?}", found, paper.n_leaves(), datasets);
    }

    // Earlier results seed the tree so scored methods are not run again.
    let mut results = ResultSet::new();
    for path in merge {
        results.merge(ResultSet::load(path)?);
    }
    paper.attach_results(&results);

    let runner = runner_from_options(&condition.scoring)?;
    let summary = paper.score_results(runner.as_ref(), &condition);
    for result in paper.results() {
        results.update(result.clone());
    }

    let report = Report::for_paper(&paper, &results, &condition.metrics_type);

    std::fs::create_dir_all(output)?;
    results.save(output.join("results.json"))?;
    results.write_tsv(File::create(output.join("results.tsv"))?, &condition.metrics_type)?;
    report.write_tsv(File::create(output.join("report.tsv"))?)?;
    report.write_failures(File::create(output.join("failures.tsv"))?)?;
    std::fs::write(output.join("report.json"), report.to_json()?)?;

    eprintln!(
        "Scored {} (leaf, method) pairs, {} failed; report in {:?}",
        summary.scored, summary.failed, output
    );
    Ok(())
}

/// Write an example condition
fn cmd_example(output: &Path) -> Result<()> {
    let mut condition = Condition::default();
    condition.simul_data.truncate(1);
    condition.nsample = vec![3];
    condition.nrep = 3;
    condition
        .method_type
        .insert("deseq2".to_string(), PathBuf::from("results/deseq2"));
    condition.validate()?;

    let yaml = condition.to_yaml()?;
    std::fs::write(output, &yaml)?;
    eprintln!("Wrote example condition to {:?}", output);
    eprintln!();
    eprintln!("Contents:");
    println!("{}", yaml);
    Ok(())
}
