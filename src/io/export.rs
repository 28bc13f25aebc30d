//! Evaluation exports.
//!
//! - evaluation JSON: fit, counts, accuracy and the configuration used
//! - count-table CSV: one row per rating cell, easy to load in spreadsheets

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::domain::{EvalConfig, Evaluation, EvaluationFile, RatingCounts};
use crate::error::DmcError;

const TOOL_NAME: &str = "dmc-metad";

/// Write an evaluation JSON file.
///
/// Non-finite numbers (e.g. `m_ratio` when `da = 0`) are written as `null`.
pub fn write_evaluation_json(path: &Path, evaluation: &Evaluation, config: &EvalConfig) -> Result<(), DmcError> {
    let file = File::create(path).map_err(|e| DmcError::io(path, e))?;
    let doc = EvaluationFile {
        tool: TOOL_NAME.to_string(),
        config: config.clone(),
        evaluation: evaluation.clone(),
    };
    let mut out = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut out, &doc)
        .map_err(|e| DmcError::Json(format!("failed to write '{}': {e}", path.display())))?;
    out.flush().map_err(|e| DmcError::io(path, e))
}

/// Read an evaluation JSON file.
pub fn read_evaluation_json(path: &Path) -> Result<EvaluationFile, DmcError> {
    let file = File::open(path).map_err(|e| DmcError::io(path, e))?;
    serde_json::from_reader(std::io::BufReader::new(file))
        .map_err(|e| DmcError::Json(format!("invalid evaluation JSON '{}': {e}", path.display())))
}

/// Write the count table as CSV: `response,rating,nr_s1,nr_s2`.
///
/// Rows follow the canonical cell order.
pub fn write_counts_csv(path: &Path, counts: &RatingCounts) -> Result<(), DmcError> {
    let file = File::create(path).map_err(|e| DmcError::io(path, e))?;
    let mut out = BufWriter::new(file);
    let n = counts.n_ratings();

    writeln!(out, "response,rating,nr_s1,nr_s2").map_err(|e| DmcError::io(path, e))?;
    for i in 0..2 * n {
        let (response, rating) = if i < n { ("S1", n - i) } else { ("S2", i - n + 1) };
        writeln!(
            out,
            "{},{},{:.6},{:.6}",
            response, rating, counts.nr_s1[i], counts.nr_s2[i]
        )
        .map_err(|e| DmcError::io(path, e))?;
    }
    out.flush().map_err(|e| DmcError::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_csv_lists_cells_in_canonical_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("counts.csv");
        let counts = RatingCounts::new(vec![5.0, 3.0, 2.0, 1.0], vec![1.0, 2.0, 3.0, 6.0]).unwrap();
        write_counts_csv(&path, &counts).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 5);
        assert_eq!(lines[1], "S1,2,5.000000,1.000000");
        assert_eq!(lines[4], "S2,2,1.000000,6.000000");
    }

    #[test]
    fn reading_garbage_is_a_json_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("eval.json");
        std::fs::write(&path, "{ nope").unwrap();
        assert!(matches!(read_evaluation_json(&path), Err(DmcError::Json(_))));
    }
}
