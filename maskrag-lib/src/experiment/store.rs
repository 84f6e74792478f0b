//! Result file persistence
//!
//! Rows are written with one fixed schema. Reading goes through [`Table`],
//! which keeps raw string records and looks fields up by header name, so files
//! written by older runners with slightly different columns still load.

use std::fs;
use std::path::Path;

use csv::StringRecord;
use tracing::{info, warn};

use crate::experiment::ResultRow;
use crate::Result;

/// Column holding the predicted answer, followed by its legacy name.
pub const ANSWER_COLUMNS: &[&str] = &["model_answer", "generated_answer"];

/// Write a batch of rows as CSV, creating parent directories.
///
/// Returns `false` without touching the filesystem when `rows` is empty.
pub fn write_results(path: impl AsRef<Path>, rows: &[ResultRow]) -> Result<bool> {
    let path = path.as_ref();
    if rows.is_empty() {
        warn!(path = %path.display(), "no results to save");
        return Ok(false);
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut writer = csv::Writer::from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;

    info!(path = %path.display(), rows = rows.len(), "saved results");
    Ok(true)
}

/// A CSV file as a header plus raw records.
#[derive(Debug, Clone, Default)]
pub struct Table {
    pub headers: StringRecord,
    pub records: Vec<StringRecord>,
}

impl Table {
    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_path(path)?;

        let headers = reader.headers()?.clone();
        let records = reader.records().collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(Self { headers, records })
    }

    /// Write the table, creating parent directories.
    pub fn write(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut writer = csv::Writer::from_path(path)?;
        writer.write_record(&self.headers)?;
        for record in &self.records {
            writer.write_record(record)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// A table with the same header and the given records.
    pub fn with_records(&self, records: Vec<StringRecord>) -> Self {
        Self {
            headers: self.headers.clone(),
            records,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h.trim() == name)
    }

    /// Value of `name` in `record`, if the column exists.
    pub fn get<'r>(&self, record: &'r StringRecord, name: &str) -> Option<&'r str> {
        self.column(name).and_then(|i| record.get(i))
    }

    /// First non-empty value among `names`, in order.
    pub fn get_first<'r>(&self, record: &'r StringRecord, names: &[&str]) -> Option<&'r str> {
        names
            .iter()
            .filter_map(|name| self.get(record, name))
            .find(|value| !value.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anonymize::Strategy;
    use crate::retrieval::RetrievalMethod;

    fn row(question: &str, answer: &str) -> ResultRow {
        ResultRow {
            anonymization_strategy: Strategy::ContextAware,
            retrieval_method: RetrievalMethod::SparseBm25,
            question: question.to_string(),
            ground_truth: "Paris".to_string(),
            retrieved_context_snippet: "The capital is Paris, \"obviously\".".to_string(),
            predicted_answer: answer.to_string(),
        }
    }

    #[test]
    fn test_write_uses_unified_schema() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("results.csv");

        assert!(write_results(&path, &[row("q1", "Paris"), row("q2", "")]).unwrap());

        let content = fs::read_to_string(&path).unwrap();
        let header = content.lines().next().unwrap();
        assert_eq!(
            header,
            "anonymization_strategy,retrieval_method,question,ground_truth,retrieved_context_snippet,model_answer"
        );
        assert!(content.contains("ContextAware,sparse_bm25,q1,Paris,"));
    }

    #[test]
    fn test_written_rows_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.csv");
        let rows = vec![row("q1", "Paris"), row("q2", "Lyon")];
        write_results(&path, &rows).unwrap();

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let back: Vec<ResultRow> = reader.deserialize().map(|r| r.unwrap()).collect();
        assert_eq!(back, rows);
    }

    #[test]
    fn test_empty_rows_not_written() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.csv");
        assert!(!write_results(&path, &[]).unwrap());
        assert!(!path.exists());
    }

    #[test]
    fn test_table_field_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("legacy.csv");
        fs::write(
            &path,
            "question,model_answer,generated_answer\nq1,,Rome\nq2,Paris,Lyon\n",
        )
        .unwrap();

        let table = Table::read(&path).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.get_first(&table.records[0], ANSWER_COLUMNS), Some("Rome"));
        assert_eq!(table.get_first(&table.records[1], ANSWER_COLUMNS), Some("Paris"));
        assert_eq!(table.get(&table.records[0], "missing"), None);
        assert!(table.has_column("question"));
    }

    #[test]
    fn test_table_round_trip_keeps_headers() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src.csv");
        let dst = dir.path().join("out").join("dst.csv");
        fs::write(&src, "a,b\n1,2\n3,4\n").unwrap();

        let table = Table::read(&src).unwrap();
        table.with_records(vec![table.records[1].clone()]).write(&dst).unwrap();

        assert_eq!(fs::read_to_string(&dst).unwrap(), "a,b\n3,4\n");
    }

    #[test]
    fn test_read_missing_file_errors() {
        assert!(Table::read("/nonexistent/results.csv").is_err());
    }
}
