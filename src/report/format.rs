//! Plain-text summaries of evaluations.
//!
//! Formatting lives here so the fitting code stays free of presentation.

use crate::domain::{Evaluation, FitResult, RateCurves, RatingCounts};

/// Format the full evaluation summary (inputs, fit diagnostics, estimates).
pub fn format_evaluation(evaluation: &Evaluation) -> String {
    let fit = &evaluation.fit;
    let mut out = String::new();

    out.push_str("=== dmc-metad - meta-d' evaluation ===\n");
    if let Some(source) = &evaluation.source {
        out.push_str(&format!("Source: {source}\n"));
    }
    out.push_str(&format!(
        "Trials: n={} | accuracy={}\n",
        evaluation.n_trials,
        evaluation
            .accuracy
            .map(|a| format!("{a:.4}"))
            .unwrap_or_else(|| "n/a".to_string())
    ));

    out.push_str("\nCounts:\n");
    out.push_str(&format_counts(&evaluation.counts));

    out.push('\n');
    out.push_str(&format_fit(fit));
    out
}

/// Format the estimates and solver diagnostics of one fit.
pub fn format_fit(fit: &FitResult) -> String {
    let mut out = String::new();

    out.push_str("Solver:\n");
    out.push_str(&format!(
        "- status={:?} success={} iterations={} loss={:.6e} violation={:.3e}\n",
        fit.status, fit.success, fit.iterations, fit.loss, fit.constraint_violation
    ));
    out.push_str(&format!("- beta={} p={}\n", fit.beta, fit.p));

    out.push_str("\nEstimates (RMS units):\n");
    out.push_str(&format!("- da     : {:.4}\n", fit.da));
    out.push_str(&format!("- meta_da: {:.4}\n", fit.meta_da));
    out.push_str(&format!("- M_diff : {:.4}\n", fit.m_diff));
    out.push_str(&format!("- M_ratio: {:.4}\n", fit.m_ratio));
    out.push_str(&format!("- meta_ca: {:.4}\n", fit.meta_ca));
    out.push_str(&format!("- t2ca_rS1: {}\n", fmt_vec(&fit.t2ca_rs1)));
    out.push_str(&format!("- t2ca_rS2: {}\n", fmt_vec(&fit.t2ca_rs2)));

    out.push_str("\nType-2 curves (observed / estimated):\n");
    out.push_str(&format_curves(&fit.rates.observed, &fit.rates.estimated));
    out
}

fn format_counts(counts: &RatingCounts) -> String {
    format!(
        "- nR_S1: {}\n- nR_S2: {}\n",
        fmt_vec(&counts.nr_s1),
        fmt_vec(&counts.nr_s2)
    )
}

fn format_curves(observed: &RateCurves, estimated: &RateCurves) -> String {
    let rows = [
        ("HR2_rS1", &observed.hr2_rs1, &estimated.hr2_rs1),
        ("FAR2_rS1", &observed.far2_rs1, &estimated.far2_rs1),
        ("HR2_rS2", &observed.hr2_rs2, &estimated.hr2_rs2),
        ("FAR2_rS2", &observed.far2_rs2, &estimated.far2_rs2),
    ];
    let mut out = String::new();
    for (name, obs, est) in rows {
        out.push_str(&format!("{name:<9} {} / {}\n", fmt_vec(obs), fmt_vec(est)));
    }
    out
}

fn fmt_vec(v: &[f64]) -> String {
    let parts: Vec<String> = v.iter().map(|x| format!("{x:.4}")).collect();
    format!("[{}]", parts.join(", "))
}
