//! Line-delimited JSON result files.
//!
//! One JSON object per line. Blank lines are skipped; anything else that is
//! not valid JSON is an error naming the offending line.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use serde_json::Value;

use crate::data::{ExtractedTrials, extract_trials};
use crate::domain::ConfidenceSource;
use crate::error::DmcError;

/// Parse every non-blank line as JSON, keeping 1-based line numbers.
pub fn read_jsonl(path: &Path) -> Result<Vec<(usize, Value)>, DmcError> {
    let file = File::open(path).map_err(|e| DmcError::io(path, e))?;
    let reader = BufReader::new(file);

    let mut out = Vec::new();
    for (i, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| DmcError::io(path, e))?;
        if line.trim().is_empty() {
            continue;
        }
        let value: Value = serde_json::from_str(&line).map_err(|e| {
            DmcError::Json(format!("'{}' line {}: {e}", path.display(), i + 1))
        })?;
        out.push((i + 1, value));
    }
    Ok(out)
}

/// Read a result file and extract one trial per usable record.
pub fn read_trials(path: &Path, source: ConfidenceSource) -> Result<ExtractedTrials, DmcError> {
    let records = read_jsonl(path)?;
    extract_trials(source, records.iter().map(|(line, v)| (*line, v)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn reads_records_and_skips_blank_lines() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"idx": 0, "answer": 1, "label": 1, "prob": 0.8}}"#).unwrap();
        writeln!(file).unwrap();
        writeln!(file, r#"{{"idx": 1, "answer": 0, "label": 1, "prob": 0.3}}"#).unwrap();

        let records = read_jsonl(file.path()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].0, 3);

        let trials = read_trials(file.path(), ConfidenceSource::Verbal).unwrap();
        assert_eq!(trials.probs, vec![0.8, 0.3]);
    }

    #[test]
    fn malformed_line_reports_its_number() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"answer": 1, "label": 1, "prob": 0.8}}"#).unwrap();
        writeln!(file, "not json").unwrap();
        match read_jsonl(file.path()) {
            Err(DmcError::Json(msg)) => assert!(msg.contains("line 2"), "{msg}"),
            other => panic!("expected JSON error, got {other:?}"),
        }
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_jsonl(&dir.path().join("absent.jsonl"));
        assert!(matches!(err, Err(DmcError::Io { .. })));
    }
}
