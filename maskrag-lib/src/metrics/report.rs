//! Summary report over result directories
//!
//! Every `*.csv` under the plain and indexed result directories becomes one or
//! more summary rows, one per (architecture, anonymization) pair. Files that
//! cannot be read are logged and skipped, so a single broken file never hides
//! the rest of the table.

use std::collections::BTreeMap;
use std::fmt::{self, Write as _};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use tracing::{error, info, warn};

use crate::anonymize::Strategy;
use crate::experiment::Table;
use crate::metrics::{compute_metrics, EvalRow, Scores};
use crate::retrieval::RetrievalMethod;
use crate::Result;

/// Retrieval architecture a summary row is reported under.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Architecture {
    SparseBm25,
    DenseExact,
    DenseIndexed,
    /// A method label with no known architecture, reported verbatim
    Other(String),
}

impl Architecture {
    /// Classify a `retrieval_method` label.
    pub fn from_method_label(label: &str) -> Self {
        if let Ok(method) = RetrievalMethod::from_str(label) {
            return method.into();
        }

        let lowered = label.to_lowercase();
        if lowered.contains("numpy") || lowered.contains("exact") {
            Self::DenseExact
        } else if lowered.contains("bm25") {
            Self::SparseBm25
        } else {
            Self::Other(label.to_string())
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::SparseBm25 => "Sparse (BM25)",
            Self::DenseExact => "Dense (Exact)",
            Self::DenseIndexed => "Dense (Indexed)",
            Self::Other(label) => label,
        }
    }

    fn rank(&self) -> usize {
        match self {
            Self::SparseBm25 => 0,
            Self::DenseExact => 1,
            Self::DenseIndexed => 2,
            Self::Other(_) => 3,
        }
    }
}

impl From<RetrievalMethod> for Architecture {
    fn from(method: RetrievalMethod) -> Self {
        match method {
            RetrievalMethod::DenseExact => Self::DenseExact,
            RetrievalMethod::SparseBm25 => Self::SparseBm25,
            RetrievalMethod::DenseIndexed => Self::DenseIndexed,
        }
    }
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Anonymization label derived from a result file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Anonymization {
    pub strategy: Strategy,
    /// The file holds only rows whose context contained PII
    pub filtered: bool,
}

impl Anonymization {
    pub fn from_file_name(name: &str) -> Self {
        Self {
            strategy: Strategy::from_file_name(name),
            filtered: name.to_lowercase().contains("filtered"),
        }
    }
}

impl fmt::Display for Anonymization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.strategy.display_name())?;
        if self.filtered {
            f.write_str(" (Filtered)")?;
        }
        Ok(())
    }
}

/// One line of the summary table.
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryRow {
    pub architecture: Architecture,
    pub anonymization: Anonymization,
    pub scores: Scores,
}

impl SummaryRow {
    fn sort_key(&self) -> (usize, &str, Anonymization) {
        (self.architecture.rank(), self.architecture.name(), self.anonymization)
    }
}

/// Column headers shared by every rendering.
pub const SUMMARY_COLUMNS: [&str; 7] = [
    "Architecture",
    "Anonymization",
    "Retrieval Recall",
    "Exact Match (EM)",
    "F1 Score",
    "Faithfulness",
    "Gap (Hallucination)",
];

/// CSV files directly inside `dir`, sorted by path. A missing directory
/// yields nothing.
pub fn discover(dir: &Path) -> Vec<PathBuf> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "cannot read results directory");
            return Vec::new();
        }
    };

    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
        })
        .collect();
    files.sort();
    files
}

/// Whether a file name marks an indexed run. Directory names are not
/// consulted; the indexed directory is flagged by the caller.
fn is_indexed_file_name(file_name: &str) -> bool {
    let lowered = file_name.to_lowercase();
    lowered.contains("faiss") || lowered.contains("indexed")
}

/// Summary rows of one result file.
///
/// `indexed` marks files of the indexed collection; they are reported as a
/// single dense-indexed group whatever their method column says. Other files
/// are partitioned by `retrieval_method`.
pub fn summarize_file(path: &Path, indexed: bool) -> Result<Vec<SummaryRow>> {
    let table = Table::read(path)?;
    if table.is_empty() {
        info!(path = %path.display(), "empty result file, skipping");
        return Ok(Vec::new());
    }

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let anonymization = Anonymization::from_file_name(&file_name);

    if indexed || is_indexed_file_name(&file_name) {
        let rows: Vec<EvalRow> = table
            .records
            .iter()
            .map(|r| EvalRow::from_record(&table, r))
            .collect();
        return Ok(vec![SummaryRow {
            architecture: Architecture::DenseIndexed,
            anonymization,
            scores: compute_metrics(&rows),
        }]);
    }

    if !table.has_column("retrieval_method") {
        warn!(path = %path.display(), "no retrieval_method column, skipping");
        return Ok(Vec::new());
    }

    let mut groups: BTreeMap<&str, Vec<EvalRow>> = BTreeMap::new();
    for record in &table.records {
        let method = table.get(record, "retrieval_method").unwrap_or_default();
        groups
            .entry(method)
            .or_default()
            .push(EvalRow::from_record(&table, record));
    }

    Ok(groups
        .into_iter()
        .map(|(method, rows)| SummaryRow {
            architecture: Architecture::from_method_label(method),
            anonymization,
            scores: compute_metrics(&rows),
        })
        .collect())
}

/// Build the sorted summary over both result collections.
pub fn summarize(plain_dir: &Path, indexed_dir: &Path) -> Vec<SummaryRow> {
    let files: Vec<(PathBuf, bool)> = discover(plain_dir)
        .into_iter()
        .map(|p| (p, false))
        .chain(discover(indexed_dir).into_iter().map(|p| (p, true)))
        .collect();

    info!(files = files.len(), "analyzing result files");

    let mut summary = Vec::new();
    for (path, indexed) in files {
        match summarize_file(&path, indexed) {
            Ok(rows) => summary.extend(rows),
            Err(e) => error!(path = %path.display(), error = %e, "failed to analyze file"),
        }
    }

    summary.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
    summary
}

fn cells(row: &SummaryRow) -> [String; 7] {
    let s = &row.scores;
    [
        row.architecture.to_string(),
        row.anonymization.to_string(),
        format!("{:.1}", s.recall),
        format!("{:.1}", s.exact_match),
        format!("{:.1}", s.f1),
        format!("{:.1}", s.faithfulness),
        format!("{:.1}", s.gap),
    ]
}

/// Fixed-width text table, labels left-aligned and numbers right-aligned.
pub fn render_text(summary: &[SummaryRow]) -> String {
    let body: Vec<[String; 7]> = summary.iter().map(cells).collect();

    let mut widths = SUMMARY_COLUMNS.map(str::len);
    for row in &body {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let line = |values: &[String]| {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| {
                if i < 2 {
                    format!("{v:<width$}", width = widths[i])
                } else {
                    format!("{v:>width$}", width = widths[i])
                }
            })
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let header: Vec<String> = SUMMARY_COLUMNS.iter().map(|c| c.to_string()).collect();
    let mut out = line(&header[..]);
    out.push('\n');
    for row in &body {
        out.push_str(&line(&row[..]));
        out.push('\n');
    }
    out
}

fn latex_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' | '%' | '$' | '#' | '_' | '{' | '}' => {
                out.push('\\');
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    out
}

/// A booktabs `tabular` fragment with one decimal per score.
pub fn render_latex(summary: &[SummaryRow]) -> String {
    let mut out = String::from("\\begin{tabular}{llrrrrr}\n\\toprule\n");

    let header: Vec<String> = SUMMARY_COLUMNS.iter().map(|c| latex_escape(c)).collect();
    // writing into a String cannot fail
    let _ = writeln!(out, "{} \\\\", header.join(" & "));
    out.push_str("\\midrule\n");

    for row in summary {
        let escaped: Vec<String> = cells(row).iter().map(|c| latex_escape(c)).collect();
        let _ = writeln!(out, "{} \\\\", escaped.join(" & "));
    }

    out.push_str("\\bottomrule\n\\end{tabular}\n");
    out
}

/// Save the summary as CSV, creating parent directories.
pub fn write_summary(path: impl AsRef<Path>, summary: &[SummaryRow]) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(SUMMARY_COLUMNS)?;
    for row in summary {
        let s = &row.scores;
        writer.write_record([
            row.architecture.name().to_string(),
            row.anonymization.to_string(),
            s.recall.to_string(),
            s.exact_match.to_string(),
            s.f1.to_string(),
            s.faithfulness.to_string(),
            s.gap.to_string(),
        ])?;
    }
    writer.flush()?;

    info!(path = %path.display(), rows = summary.len(), "saved summary");
    Ok(())
}
