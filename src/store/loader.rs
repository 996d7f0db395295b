//! CSV ingestion
//!
//! Each file must carry the required header columns. Rows whose time or
//! coordinates are missing or non-numeric are dropped and counted. Surviving
//! rows of all readable files are concatenated in the given file order, exact
//! duplicates are removed keeping the first, and identities are numbered in
//! the final order.

use crate::config::{Config, DEFAULT_REQUIRED_COLUMNS};
use crate::error::AnalyzerError;
use crate::types::EventTable;
use serde::Serialize;
use std::collections::HashSet;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const TIME_COLUMN: &str = "Time(ms)";
const X_COLUMN: &str = "TouchX";
const Y_COLUMN: &str = "TouchY";
const NAME_COLUMN: &str = "Layer Name";

/// A parsed row before identities are assigned
#[derive(Debug, Clone, PartialEq)]
pub struct RawRow {
    pub time_ms: i64,
    pub x: f64,
    pub y: f64,
    pub name: String,
}

impl RawRow {
    fn dedup_key(&self) -> (i64, u64, u64, &str) {
        (self.time_ms, self.x.to_bits(), self.y.to_bits(), self.name.as_str())
    }
}

/// Row accounting for one loaded file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    pub path: PathBuf,
    pub rows_read: usize,
    pub rows_kept: usize,
    pub rows_dropped: usize,
}

/// A file that could not contribute rows
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub code: String,
    pub message: String,
}

/// One file's parsed rows and report
#[derive(Debug, Clone)]
pub struct LoadedFile {
    pub report: LoadReport,
    pub rows: Vec<RawRow>,
}

/// Result of combining several files
#[derive(Debug, Clone)]
pub struct CombinedLoad {
    /// `None` when no file yielded a valid row
    pub table: Option<EventTable>,
    pub loaded: Vec<LoadReport>,
    pub skipped: Vec<SkippedFile>,
    pub duplicates_removed: usize,
}

/// CSV loader with a fixed set of required columns
#[derive(Debug, Clone)]
pub struct Loader {
    required_columns: Vec<String>,
    drop_duplicates: bool,
}

impl Default for Loader {
    fn default() -> Self {
        Self {
            required_columns: DEFAULT_REQUIRED_COLUMNS.iter().map(|c| c.to_string()).collect(),
            drop_duplicates: true,
        }
    }
}

impl Loader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            required_columns: config.required_columns.clone(),
            drop_duplicates: config.drop_duplicate_rows,
        }
    }

    /// Keep exact duplicate rows instead of collapsing them
    pub fn keep_duplicates(mut self) -> Self {
        self.drop_duplicates = false;
        self
    }

    /// Parse a single file.
    ///
    /// Fails with `MissingColumns` when a required header is absent and with
    /// `EmptyFile` when no row survives coercion.
    pub fn load_file(&self, path: &Path) -> Result<LoadedFile, AnalyzerError> {
        let file = File::open(path).map_err(|source| AnalyzerError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let csv_err = |source| AnalyzerError::Csv {
            path: path.to_path_buf(),
            source,
        };

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::Headers)
            .from_reader(file);

        let headers = reader.headers().map_err(csv_err)?.clone();
        let missing: Vec<String> = self
            .required_columns
            .iter()
            .filter(|c| !headers.iter().any(|h| h == c.as_str()))
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(AnalyzerError::MissingColumns {
                path: path.to_path_buf(),
                columns: missing,
            });
        }

        let column = |name: &str| headers.iter().position(|h| h == name);
        let (Some(time_idx), Some(x_idx), Some(y_idx), Some(name_idx)) = (
            column(TIME_COLUMN),
            column(X_COLUMN),
            column(Y_COLUMN),
            column(NAME_COLUMN),
        ) else {
            let columns = [TIME_COLUMN, X_COLUMN, Y_COLUMN, NAME_COLUMN]
                .iter()
                .filter(|c| column(c).is_none())
                .map(|c| c.to_string())
                .collect();
            return Err(AnalyzerError::MissingColumns {
                path: path.to_path_buf(),
                columns,
            });
        };

        let mut rows = Vec::new();
        let mut rows_read = 0;
        for result in reader.records() {
            let record = result.map_err(csv_err)?;
            rows_read += 1;

            let parsed = (|| {
                Some(RawRow {
                    time_ms: parse_time(record.get(time_idx)?)?,
                    x: parse_float(record.get(x_idx)?)?,
                    y: parse_float(record.get(y_idx)?)?,
                    // A blank or absent name is kept and classifies as a touch
                    name: record.get(name_idx).unwrap_or_default().trim().to_string(),
                })
            })();

            match parsed {
                Some(row) => rows.push(row),
                None => debug!("Dropping row {} of {}: non-numeric field", rows_read, path.display()),
            }
        }

        if rows.is_empty() {
            return Err(AnalyzerError::EmptyFile(path.to_path_buf()));
        }

        let report = LoadReport {
            path: path.to_path_buf(),
            rows_read,
            rows_kept: rows.len(),
            rows_dropped: rows_read - rows.len(),
        };
        if report.rows_dropped > 0 {
            warn!(
                "Dropped {} of {} rows in {}",
                report.rows_dropped,
                rows_read,
                path.display()
            );
        }
        debug!("Loaded {} ({} rows)", path.display(), report.rows_kept);

        Ok(LoadedFile { report, rows })
    }

    /// Load and concatenate `paths`; `None` signals no valid data
    pub fn load_and_combine<P: AsRef<Path>>(&self, paths: &[P]) -> Option<EventTable> {
        self.load_and_combine_detailed(paths).table
    }

    /// Like [`Loader::load_and_combine`] but also reports per-file outcomes
    pub fn load_and_combine_detailed<P: AsRef<Path>>(&self, paths: &[P]) -> CombinedLoad {
        let mut loaded = Vec::new();
        let mut skipped = Vec::new();
        let mut rows: Vec<RawRow> = Vec::new();

        for path in paths {
            let path = path.as_ref();
            match self.load_file(path) {
                Ok(file) => {
                    loaded.push(file.report);
                    rows.extend(file.rows);
                }
                Err(e) => {
                    warn!("Skipping {}: {}", path.display(), e);
                    skipped.push(SkippedFile {
                        path: path.to_path_buf(),
                        code: e.code().to_string(),
                        message: e.to_string(),
                    });
                }
            }
        }

        let before = rows.len();
        if self.drop_duplicates {
            rows = drop_exact_duplicates(rows);
        }
        let duplicates_removed = before - rows.len();

        let table = if rows.is_empty() {
            warn!("No loadable data in {} file(s)", paths.len());
            None
        } else {
            info!(
                "Combined {} file(s) into {} rows ({} duplicates removed)",
                loaded.len(),
                rows.len(),
                duplicates_removed
            );
            Some(EventTable::from_rows(
                rows.into_iter().map(|r| (r.time_ms, r.x, r.y, r.name)),
            ))
        };

        CombinedLoad {
            table,
            loaded,
            skipped,
            duplicates_removed,
        }
    }
}

/// Integer-like time: `"120"` and `"120.0"` are both accepted
fn parse_time(field: &str) -> Option<i64> {
    let field = field.trim();
    if let Ok(v) = field.parse::<i64>() {
        return Some(v);
    }
    let v = field.parse::<f64>().ok()?;
    if v.is_finite() && v.abs() < i64::MAX as f64 {
        Some(v.round() as i64)
    } else {
        None
    }
}

fn parse_float(field: &str) -> Option<f64> {
    field.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

fn drop_exact_duplicates(rows: Vec<RawRow>) -> Vec<RawRow> {
    let mut seen = HashSet::with_capacity(rows.len());
    let mut keep = vec![false; rows.len()];
    for (idx, row) in rows.iter().enumerate() {
        keep[idx] = seen.insert(row.dedup_key());
    }
    rows.into_iter()
        .zip(keep)
        .filter_map(|(row, keep)| keep.then_some(row))
        .collect()
}
