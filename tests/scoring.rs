//! Integration tests for scoring method outputs and reporting.

mod common;

use debench::prelude::*;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;

/// Write a method results table for `dataset` with the given per-gene score.
fn write_output(dataset: &Dataset, path: &Path, score: impl Fn(Label) -> f64) {
    let mut table = String::from("Gene_ID\tGene_Symbol\tDescription\tpvalue\n");
    for (gene_id, &label) in dataset.counts.gene_ids().iter().zip(&dataset.labels) {
        let _ = writeln!(table, "{}\tLOC{}\t{}\t{}", gene_id, gene_id, label, score(label));
    }
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, table).unwrap();
}

fn condition(methods: &Path) -> Condition {
    let mut method_type = BTreeMap::new();
    method_type.insert("oracle".to_string(), methods.join("oracle"));
    method_type.insert("null".to_string(), methods.join("null"));
    method_type.insert("absent".to_string(), methods.join("absent"));
    Condition {
        simul_data: vec![SimulSource::Bottomly],
        disp_type: vec![DispType::Same],
        frac_up: vec![0.5],
        nsample: vec![3],
        outlier_mode: vec![OutlierMode::None],
        pde: vec![10.0, 30.0],
        nrep: 3,
        seed: 7,
        method_type,
        simulation: SimulationOptions {
            n_genes: Some(400),
            ..SimulationOptions::default()
        },
        ..Condition::default()
    }
}

struct Run {
    _dirs: Vec<TempDir>,
    condition: Condition,
    paper: Paper,
    datasets: PathBuf,
}

/// Generate datasets and write outputs for the oracle and null methods.
fn prepare() -> Run {
    let params = TempDir::new().unwrap();
    let datasets = TempDir::new().unwrap();
    let methods = TempDir::new().unwrap();
    common::write_params(params.path(), 600);

    let condition = condition(methods.path());
    let store = ParameterStore::load(params.path(), &[SimulSource::Bottomly]).unwrap();
    let mut paper = Paper::new(&condition).unwrap();
    let summary = paper
        .generate_datasets(&store, datasets.path(), &condition.simulation)
        .unwrap();

    for path in &summary.paths {
        let dataset = Dataset::from_tsv(path).unwrap();
        let stem = path.file_stem().unwrap().to_string_lossy().into_owned();
        write_output(
            &dataset,
            &methods.path().join("oracle").join(format!("{}.tsv", stem)),
            |label| if label.is_de() { 0.001 } else { 0.5 },
        );
        write_output(
            &dataset,
            &methods.path().join("null").join(format!("{}.tsv", stem)),
            |_| 1.0,
        );
    }

    let datasets_path = datasets.path().to_path_buf();
    Run {
        _dirs: vec![params, datasets, methods],
        condition,
        paper,
        datasets: datasets_path,
    }
}

#[test]
fn test_end_to_end_scores() {
    let mut run = prepare();
    let runner = TemplateLocator::new(run.condition.scoring.result_template.clone());
    let summary = run.paper.score_results(&runner, &run.condition);

    // 6 leaves × 3 methods; "absent" never has outputs
    assert_eq!(summary.scored, 12);
    assert_eq!(summary.failed, 6);

    let results = ResultSet::from_paper(&run.paper);
    assert_eq!(results.len(), 6);
    for result in results.iter() {
        for metric in [Metric::Auc, Metric::Tpr, Metric::F1Score, Metric::Kappa] {
            assert_eq!(result.metric("oracle", metric).unwrap().value(), Some(1.0), "{}", metric);
        }
        assert_eq!(result.metric("oracle", Metric::Fdr).unwrap().value(), Some(0.0));
        assert_eq!(result.metric("oracle", Metric::Cutoff).unwrap().value(), Some(0.5));

        // every gene not significant
        assert!(!result.metric("null", Metric::Auc).unwrap().is_defined());
        for metric in [Metric::Tpr, Metric::Fdr, Metric::F1Score, Metric::Kappa] {
            assert_eq!(result.metric("null", metric).unwrap().value(), Some(0.0), "{}", metric);
        }
        assert!(result.methods["absent"].is_failed());
    }

    let report = Report::for_paper(&run.paper, &results, &run.condition.metrics_type);
    assert_eq!(report.failed.len(), 6);
    assert!(report.missing.is_empty());
    let leaf = run.paper.leaf_keys()[0].condition;
    let auc = report.row(&leaf, "oracle", Metric::Auc).unwrap();
    assert_eq!((auc.n, auc.mean), (3, Some(1.0)));
    let null_auc = report.row(&leaf, "null", Metric::Auc).unwrap();
    assert_eq!((null_auc.n, null_auc.n_undefined), (0, 3));
    assert!(report.row(&leaf, "absent", Metric::Auc).is_none());
}

#[test]
fn test_rebuilt_tree_resumes_from_disk() {
    let run = prepare();
    let mut rebuilt = Paper::new(&run.condition).unwrap();
    assert_eq!(rebuilt.locate_datasets(&run.datasets), rebuilt.n_leaves());

    let runner = TemplateLocator::new(run.condition.scoring.result_template.clone());
    rebuilt.score_results(&runner, &run.condition);

    let mut original = run.paper.clone();
    original.score_results(&runner, &run.condition);
    assert_eq!(
        ResultSet::from_paper(&rebuilt),
        ResultSet::from_paper(&original)
    );
}

#[test]
fn test_partial_results_merge_without_double_counting() {
    let mut run = prepare();
    let runner = TemplateLocator::new(run.condition.scoring.result_template.clone());
    run.paper.score_results(&runner, &run.condition);
    let all: Vec<BenchResult> = run.paper.results().into_iter().cloned().collect();

    let mut first = ResultSet::new();
    let mut second = ResultSet::new();
    for (i, result) in all.iter().enumerate() {
        if i < 4 {
            first.insert(result.clone());
        }
        if i >= 2 {
            second.insert(result.clone());
        }
    }
    first.merge(second);
    assert_eq!(first.len(), 6);
    assert_eq!(first.duplicates().len(), 2);

    let report = Report::build(&first, &[Metric::Auc]);
    let leaf = all[0].key.condition;
    assert_eq!(report.row(&leaf, "oracle", Metric::Auc).unwrap().n, 3);
    assert_eq!(report.duplicates.len(), 2);
}

#[test]
fn test_missing_genes_policy() {
    let mut run = prepare();
    let oracle_dir = run.condition.method_type["oracle"].clone();

    // Drop the last gene from every oracle output.
    for entry in std::fs::read_dir(&oracle_dir).unwrap() {
        let path = entry.unwrap().path();
        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        std::fs::write(&path, lines[..lines.len() - 1].join("\n") + "\n").unwrap();
    }

    let runner = TemplateLocator::new(run.condition.scoring.result_template.clone());
    run.paper.score_results(&runner, &run.condition);
    for result in run.paper.results() {
        match &result.methods["oracle"] {
            MethodOutcome::Unscored { reason, .. } => assert!(reason.contains("400")),
            other => panic!("unexpected {:?}", other),
        }
    }

    run.condition.scoring.missing_genes = MissingGenes::NotCalled;
    run.paper.score_results(&runner, &run.condition);
    for result in run.paper.results() {
        assert!(result.metric("oracle", Metric::Fdr).unwrap().is_defined());
    }
}

/// Counts how often each leaf's outputs are requested.
struct CountingRunner {
    inner: TemplateLocator,
    calls: AtomicUsize,
}

impl AnalysisRunner for CountingRunner {
    fn run(&self, request: &RunRequest<'_>) -> Result<PathBuf> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.run(request)
    }
}

#[test]
fn test_resume_rescores_only_unscored_methods() {
    let run = prepare();
    let oracle_dir = run.condition.method_type["oracle"].clone();
    let hidden = oracle_dir.with_file_name("oracle_hidden");
    std::fs::rename(&oracle_dir, &hidden).unwrap();

    let runner = TemplateLocator::new(run.condition.scoring.result_template.clone());
    let mut first = run.paper.clone();
    first.score_results(&runner, &run.condition);
    let earlier = ResultSet::from_paper(&first);
    assert!(earlier.iter().all(|r| r.methods["oracle"].is_failed()));

    std::fs::rename(&hidden, &oracle_dir).unwrap();
    let mut resumed = Paper::new(&run.condition).unwrap();
    resumed.locate_datasets(&run.datasets);
    assert_eq!(resumed.attach_results(&earlier), 6);

    let counting = CountingRunner {
        inner: runner,
        calls: AtomicUsize::new(0),
    };
    resumed.score_results(&counting, &run.condition);
    // "null" was scored on every leaf and is not asked for again
    assert_eq!(counting.calls.load(Ordering::SeqCst), 12);

    let mut results = earlier.clone();
    for result in resumed.results() {
        results.update(result.clone());
    }
    assert!(results.duplicates().is_empty());
    for result in results.iter() {
        assert_eq!(result.metric("oracle", Metric::Auc).unwrap().value(), Some(1.0));
        assert!(result.methods["null"].is_scored());
        assert!(result.methods["absent"].is_failed());
    }
}
