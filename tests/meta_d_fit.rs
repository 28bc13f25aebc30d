use std::io::Write;

use nalgebra::DVector;

use dmc_metad::app::{EvalJob, evaluate_batch, evaluate_file};
use dmc_metad::data::{SimulationConfig, count_trials, expected_counts, simulate_trials, trials2counts};
use dmc_metad::domain::{
    ConfidenceSource, CountOptions, EvalConfig, FitOptions, FitResult, LabelValue, RatingCounts,
};
use dmc_metad::fit::{MetaDFitter, MetaDModel, TypeOne, fit_meta_d_mle};
use dmc_metad::io::{read_evaluation_json, write_evaluation_json};
use dmc_metad::math::StandardNormal;

/// Confidence carries no information about correctness on either side.
fn uninformative_counts() -> RatingCounts {
    RatingCounts::new(
        vec![187.5, 187.5, 187.5, 187.5, 62.5, 62.5, 62.5, 62.5],
        vec![62.5, 62.5, 62.5, 62.5, 187.5, 187.5, 187.5, 187.5],
    )
    .unwrap()
}

#[test]
fn ideal_simulated_observer_has_m_ratio_near_one() {
    let config = SimulationConfig {
        n_trials: 20_000,
        d_prime: 1.5,
        criteria: vec![-1.5, -1.0, -0.5, 0.0, 0.5, 1.0, 1.5],
        confidence_noise: 0.0,
        seed: 42,
    };
    let trials = simulate_trials(&config).unwrap();
    let counts = count_trials(&trials, 4).unwrap().padded(0.125);
    let fit = MetaDFitter::default().fit(&counts, 0.0, 0.0).unwrap();
    assert!(fit.m_ratio > 0.8, "m_ratio {} ({:?})", fit.m_ratio, fit.status);
}

#[test]
fn uninformative_confidence_pulls_meta_d_well_below_d() {
    let counts = uninformative_counts();
    let fit = fit_meta_d_mle(&counts.nr_s1, &counts.nr_s2, 0.0, 0.0).unwrap();
    assert!(fit.da > 1.0);
    assert!(fit.meta_da < 0.5 * fit.da, "meta_da {} da {}", fit.meta_da, fit.da);
}

fn solution_diffs(counts: &RatingCounts, fit: &FitResult, beta: f64) -> DVector<f64> {
    let link = StandardNormal;
    let options = FitOptions::default();
    let one = TypeOne::estimate(&link, counts, options.s);
    let model = MetaDModel::new(&link, counts, options.s, one.d1, one.t1c1, options.constant_criterion, beta);

    let s1 = &fit.s1_units;
    let mut x = vec![s1.meta_d1];
    x.extend(s1.t2c1_rs1.iter().chain(s1.t2c1_rs2.iter()).map(|c| c - s1.meta_c1));
    model.idealization_diffs(&DVector::from_vec(x))
}

#[test]
fn fits_satisfy_the_idealization_constraint() {
    let counts = expected_counts(1.2, &[-1.2, -0.6, -0.1, 0.3, 0.9], 600.0).unwrap();
    for beta in [0.0, 0.5, 2.0] {
        let fit = MetaDFitter::default().fit(&counts, beta, 0.0).unwrap();
        assert_eq!(fit.beta, beta);
        assert!(fit.success, "beta {beta}: status {:?}", fit.status);
        let diffs = solution_diffs(&counts, &fit, beta);
        assert!(diffs.iter().all(|d| *d >= beta - 1e-5), "beta {beta}: diffs {diffs}");
    }
}

#[test]
fn binding_beta_costs_loss() {
    let counts = expected_counts(1.2, &[-1.2, -0.6, -0.1, 0.3, 0.9], 600.0).unwrap();
    let fitter = MetaDFitter::default();
    let free = fitter.fit(&counts, 0.0, 0.0).unwrap();
    let bound = fitter.fit(&counts, 2.0, 0.0).unwrap();
    assert!(free.success && bound.success);

    // Some diff of the beta-0 solution sits below 2, so the bound binds.
    let diffs = solution_diffs(&counts, &free, 0.0);
    assert!(diffs.iter().any(|d| *d < 2.0), "diffs {diffs}");
    assert!(bound.loss > free.loss, "beta 2: {} vs beta 0: {}", bound.loss, free.loss);
}

#[test]
fn four_rating_fit_recovers_generating_criteria() {
    let criteria = [-1.5, -1.0, -0.5, 0.0, 0.5, 1.0, 1.5];
    let counts = expected_counts(1.5, &criteria, 1000.0).unwrap();
    let fit = MetaDFitter::default().fit(&counts, 0.0, 0.0).unwrap();
    assert!(fit.success, "status {:?}", fit.status);
    assert!(fit.loss <= fit.loss_trace[0]);

    let units = &fit.s1_units;
    for (got, want) in units.t2c1_rs1.iter().zip([-1.5, -1.0, -0.5]) {
        assert!((got - want).abs() < 1e-2, "rS1 {:?}", units.t2c1_rs1);
    }
    for (got, want) in units.t2c1_rs2.iter().zip([0.5, 1.0, 1.5]) {
        assert!((got - want).abs() < 1e-2, "rS2 {:?}", units.t2c1_rs2);
    }
}

#[test]
fn batch_fits_keep_input_order() {
    let tables = vec![
        expected_counts(1.5, &[-1.0, -0.5, 0.0, 0.5, 1.0], 500.0).unwrap(),
        uninformative_counts(),
    ];
    let fitter = MetaDFitter::default();
    let results = fitter.fit_batch(&tables, 0.0, 0.0);
    assert_eq!(results.len(), 2);
    let first = results[0].as_ref().unwrap();
    let second = results[1].as_ref().unwrap();
    assert_eq!(first.t2ca_rs1.len(), 2);
    assert_eq!(second.t2ca_rs1.len(), 3);
}

#[test]
fn count_builder_pads_from_trial_sequences() {
    let stim: Vec<LabelValue> = [0, 0, 1, 1].iter().map(|&v| LabelValue::Int(v)).collect();
    let counts = trials2counts(&stim, &stim, &[2, 1, 2, 1], 2, CountOptions::default()).unwrap();
    assert_eq!(counts.nr_s1, vec![1.25, 1.25, 0.25, 0.25]);
    assert_eq!(counts.nr_s2, vec![0.25, 0.25, 1.25, 1.25]);
}

fn write_records(dir: &std::path::Path, name: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    let mut file = std::fs::File::create(&path).unwrap();
    for i in 0..240 {
        let label = i % 2;
        let correct = i % 4 != 0;
        let answer = if correct { label } else { 1 - label };
        let prob = if correct { 0.55 + 0.045 * (i % 10) as f64 } else { 0.1 + 0.08 * (i % 5) as f64 };
        writeln!(file, r#"{{"idx": {i}, "answer": {answer}, "label": {label}, "prob": {prob}}}"#).unwrap();
    }
    path
}

#[test]
fn evaluation_round_trips_through_json() {
    let dir = tempfile::tempdir().unwrap();
    let records = write_records(dir.path(), "verbal.jsonl");
    let config = EvalConfig::default();

    let evaluation = evaluate_file(&records, ConfidenceSource::Verbal, &config).unwrap();
    assert_eq!(evaluation.n_trials, 240);
    assert!((evaluation.accuracy.unwrap() - 0.75).abs() < 1e-12);

    let out = dir.path().join("eval.json");
    write_evaluation_json(&out, &evaluation, &config).unwrap();
    let doc = read_evaluation_json(&out).unwrap();
    assert_eq!(doc.tool, "dmc-metad");
    assert_eq!(doc.config, config);
    assert_eq!(doc.evaluation.counts, evaluation.counts);
    assert_eq!(doc.evaluation.ratings, evaluation.ratings);
    assert_eq!(doc.evaluation.fit.status, evaluation.fit.status);
}

#[test]
fn batch_evaluation_reports_missing_files_per_job() {
    let dir = tempfile::tempdir().unwrap();
    let good = write_records(dir.path(), "good.jsonl");
    let jobs = vec![
        EvalJob {
            path: good,
            source: ConfidenceSource::Verbal,
        },
        EvalJob {
            path: dir.path().join("missing.jsonl"),
            source: ConfidenceSource::Verbal,
        },
    ];
    let results = evaluate_batch(&jobs, &EvalConfig::default());
    assert!(results[0].is_ok());
    assert!(results[1].is_err());
}
