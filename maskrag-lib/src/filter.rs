//! PII subset filter
//!
//! Most questions retrieve contexts without any entity in them, so their rows
//! look the same under every strategy. The filter keeps only the rows whose
//! retrieved context changed between the baseline and placeholder runs, which
//! are exactly the rows where anonymization could matter, and applies the same
//! row selection to the remaining strategies of the group.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::anonymize::Strategy;
use crate::experiment::{scenarios, Collection, Table};
use crate::Result;

const SNIPPET_COLUMN: &str = "retrieved_context_snippet";

/// Result files that share row order and are filtered together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterGroup {
    pub baseline: PathBuf,
    pub placeholder: PathBuf,
    pub others: Vec<PathBuf>,
}

/// The plain and indexed groups, with file names as the experiment plan
/// writes them plus a context-aware file produced outside the harness.
pub fn default_groups(plain_dir: &Path, indexed_dir: &Path) -> Vec<FilterGroup> {
    [(Collection::Plain, plain_dir), (Collection::Indexed, indexed_dir)]
        .into_iter()
        .map(|(collection, dir)| {
            let plan = scenarios(collection);
            let file_for = |strategy: Strategy| {
                plan.iter()
                    .find(|s| s.strategy == strategy)
                    .map(|s| dir.join(&s.file_name))
            };
            let context_aware = match collection {
                Collection::Plain => "results_04_context_aware.csv",
                Collection::Indexed => "results_context_aware_indexed.csv",
            };

            FilterGroup {
                baseline: file_for(Strategy::Baseline).unwrap_or_default(),
                placeholder: file_for(Strategy::Placeholder).unwrap_or_default(),
                others: file_for(Strategy::Faker)
                    .into_iter()
                    .chain([dir.join(context_aware)])
                    .collect(),
            }
        })
        .collect()
}

/// Where the filtered copy of `path` goes: `<stem>_filtered.<ext>`, or `path`
/// itself when it is already a filtered file.
pub fn filtered_path(path: &Path) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    if stem.contains("_filtered") {
        return path.to_path_buf();
    }

    let name = match path.extension() {
        Some(ext) => format!("{stem}_filtered.{}", ext.to_string_lossy()),
        None => format!("{stem}_filtered"),
    };
    path.with_file_name(name)
}

/// What filtering one group did.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct FilterOutcome {
    /// Positions of the kept rows, ascending
    pub selected: Vec<usize>,
    pub written: Vec<PathBuf>,
    /// Files left alone because they were missing or too short
    pub skipped: Vec<PathBuf>,
}

fn load(path: &Path) -> Result<Option<Table>> {
    if !path.exists() {
        warn!(path = %path.display(), "file not found");
        return Ok(None);
    }
    Table::read(path).map(Some)
}

fn write_subset(path: &Path, table: &Table, selected: &[usize]) -> Result<PathBuf> {
    let records = selected
        .iter()
        .filter_map(|&i| table.records.get(i).cloned())
        .collect();
    let out = filtered_path(path);
    table.with_records(records).write(&out)?;
    info!(path = %out.display(), rows = selected.len(), "saved filtered file");
    Ok(out)
}

/// Filter one group down to at most `target_rows` rows where anonymization
/// changed the retrieved context.
///
/// Returns `None` when the group cannot be filtered: the baseline or
/// placeholder file is missing, or their row counts differ.
pub fn filter_group(group: &FilterGroup, target_rows: usize) -> Result<Option<FilterOutcome>> {
    info!(baseline = %group.baseline.display(), "filtering group");

    let (Some(baseline), Some(placeholder)) = (load(&group.baseline)?, load(&group.placeholder)?)
    else {
        warn!("baseline or placeholder results missing, skipping group");
        return Ok(None);
    };

    if baseline.len() != placeholder.len() {
        warn!(
            baseline = baseline.len(),
            placeholder = placeholder.len(),
            "row count mismatch between baseline and placeholder, skipping group"
        );
        return Ok(None);
    }

    let selected: Vec<usize> = baseline
        .records
        .iter()
        .zip(&placeholder.records)
        .enumerate()
        .filter(|(_, (b, p))| baseline.get(b, SNIPPET_COLUMN) != placeholder.get(p, SNIPPET_COLUMN))
        .map(|(i, _)| i)
        .take(target_rows)
        .collect();

    info!(rows = selected.len(), "found rows with PII in context");

    let mut outcome = FilterOutcome {
        written: vec![
            write_subset(&group.baseline, &baseline, &selected)?,
            write_subset(&group.placeholder, &placeholder, &selected)?,
        ],
        ..Default::default()
    };

    for path in &group.others {
        let Some(table) = load(path)? else {
            outcome.skipped.push(path.clone());
            continue;
        };

        if table.len() != baseline.len() {
            warn!(path = %path.display(), rows = table.len(), expected = baseline.len(), "row count mismatch");
        }

        // every selected position must exist in the file
        if selected.last().is_some_and(|&max| max >= table.len()) {
            warn!(path = %path.display(), "too few rows for the selection, skipping");
            outcome.skipped.push(path.clone());
            continue;
        }

        outcome.written.push(write_subset(path, &table, &selected)?);
    }

    outcome.selected = selected;
    Ok(Some(outcome))
}
