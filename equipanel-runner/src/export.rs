//! Panel export: CSV, Parquet and JSON through the polars writers.
//!
//! Every file is first written to a `.tmp` sibling. A run stages all of its
//! artifacts and then commits them together, so a failed run never leaves a
//! partial set of outputs behind.

use equipanel_core::domain::SourceTable;
use equipanel_core::Panel;
use polars::prelude::*;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to write '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("JSON write failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("frame write failed: {0}")]
    Polars(#[from] PolarsError),

    #[error("'{0}': output must end in .csv or .parquet")]
    UnsupportedFormat(PathBuf),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Csv,
    Parquet,
}

impl OutputFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()?.to_ascii_lowercase().as_str() {
            "csv" => Some(OutputFormat::Csv),
            "parquet" => Some(OutputFormat::Parquet),
            _ => None,
        }
    }
}

/// A fully written temp file waiting to be renamed onto its target.
///
/// Dropping it uncommitted deletes the temp file.
#[derive(Debug)]
pub struct StagedFile {
    tmp: PathBuf,
    target: PathBuf,
    committed: bool,
}

impl StagedFile {
    pub fn target(&self) -> &Path {
        &self.target
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        if !self.committed {
            let _ = fs::remove_file(&self.tmp);
        }
    }
}

/// Write `path`'s content to its temp sibling; `write` fills the temp file.
pub fn stage<F>(path: &Path, write: F) -> Result<StagedFile, ExportError>
where
    F: FnOnce(&Path) -> Result<(), ExportError>,
{
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| ExportError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let staged = StagedFile {
        tmp: PathBuf::from(tmp),
        target: path.to_path_buf(),
        committed: false,
    };
    write(&staged.tmp)?;
    Ok(staged)
}

/// Rename every staged file onto its target, in order.
///
/// When a rename fails, the targets already renamed by this call are removed
/// and the remaining temp files are discarded: either every target holds its
/// new content or none of the new files is left.
pub fn commit_all(staged: Vec<StagedFile>) -> Result<Vec<PathBuf>, ExportError> {
    let mut renamed: Vec<PathBuf> = Vec::with_capacity(staged.len());
    for mut file in staged {
        if let Err(source) = fs::rename(&file.tmp, &file.target) {
            for path in &renamed {
                if let Err(e) = fs::remove_file(path) {
                    warn!(path = %path.display(), error = %e, "could not roll back output");
                }
            }
            return Err(ExportError::Io {
                path: file.target.clone(),
                source,
            });
        }
        file.committed = true;
        renamed.push(file.target.clone());
    }
    Ok(renamed)
}

fn create(path: &Path) -> Result<fs::File, ExportError> {
    fs::File::create(path).map_err(|source| ExportError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn write_csv(frame: &DataFrame, path: &Path) -> Result<(), ExportError> {
    let mut frame = frame.clone();
    CsvWriter::new(create(path)?)
        .include_header(true)
        .finish(&mut frame)?;
    Ok(())
}

/// Stage the panel in the format its extension names. The entity and date
/// keys lead.
pub fn stage_panel(panel: &Panel, path: &Path) -> Result<StagedFile, ExportError> {
    match OutputFormat::from_path(path) {
        Some(OutputFormat::Csv) => stage(path, |tmp| write_csv(panel.frame(), tmp)),
        Some(OutputFormat::Parquet) => stage(path, |tmp| {
            let mut frame = panel.frame().clone();
            ParquetWriter::new(create(tmp)?).finish(&mut frame)?;
            Ok(())
        }),
        None => Err(ExportError::UnsupportedFormat(path.to_path_buf())),
    }
}

pub fn write_panel(panel: &Panel, path: &Path) -> Result<(), ExportError> {
    commit_all(vec![stage_panel(panel, path)?]).map(|_| ())
}

/// Pretty-printed JSON of any serializable value.
pub fn stage_json<T: Serialize + ?Sized>(value: &T, path: &Path) -> Result<StagedFile, ExportError> {
    let json = serde_json::to_string_pretty(value)?;
    stage(path, |tmp| {
        fs::write(tmp, json).map_err(|source| ExportError::Io {
            path: tmp.to_path_buf(),
            source,
        })
    })
}

pub fn write_json<T: Serialize + ?Sized>(value: &T, path: &Path) -> Result<(), ExportError> {
    commit_all(vec![stage_json(value, path)?]).map(|_| ())
}

/// Write a source table as CSV, the layout `loader::load_table` reads back.
pub fn write_table_csv(table: &SourceTable, path: &Path) -> Result<(), ExportError> {
    commit_all(vec![stage(path, |tmp| write_csv(table.frame(), tmp))?]).map(|_| ())
}

/// Write a source table as a JSON array of records.
pub fn write_table_json(table: &SourceTable, path: &Path) -> Result<(), ExportError> {
    let staged = stage(path, |tmp| {
        let mut frame = table.frame().clone();
        JsonWriter::new(create(tmp)?)
            .with_json_format(JsonFormat::Json)
            .finish(&mut frame)?;
        Ok(())
    })?;
    commit_all(vec![staged]).map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use equipanel_core::domain::column::date_column;

    fn sample_panel() -> Panel {
        let d = |s: &str| Some(s.parse::<NaiveDate>().unwrap());
        let frame = DataFrame::new(vec![
            Column::new("ticker".into(), ["AAA", "AAA", "BBB"]),
            date_column("date", &[d("2023-01-02"), d("2023-01-03"), d("2023-01-02")]).unwrap(),
            Column::new("alpha_rsi".into(), [Some(55.0), None, Some(40.5)]),
            Column::new("weekday".into(), [Some("Monday"), Some("Tuesday"), None]),
        ])
        .unwrap();
        Panel::new(frame, "ticker", "date").unwrap()
    }

    #[test]
    fn format_from_extension() {
        assert_eq!(OutputFormat::from_path(Path::new("a/panel.csv")), Some(OutputFormat::Csv));
        assert_eq!(OutputFormat::from_path(Path::new("panel.PARQUET")), Some(OutputFormat::Parquet));
        assert_eq!(OutputFormat::from_path(Path::new("panel")), None);
    }

    #[test]
    fn csv_has_keys_first_and_blank_missing_cells() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("panel.csv");
        write_panel(&sample_panel(), &path).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "ticker,date,alpha_rsi,weekday");
        assert!(lines[1].starts_with("AAA,2023-01-02,55"), "{}", lines[1]);
        assert!(lines[1].ends_with(",Monday"), "{}", lines[1]);
        assert_eq!(lines[2], "AAA,2023-01-03,,Tuesday");
        assert_eq!(lines[3], "BBB,2023-01-02,40.5,");
        assert!(!dir.path().join("out").join("panel.csv.tmp").exists());
    }

    #[test]
    fn parquet_roundtrip_keeps_types_and_nulls() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("panel.parquet");
        write_panel(&sample_panel(), &path).unwrap();

        let file = fs::File::open(&path).unwrap();
        let df = ParquetReader::new(file).finish().unwrap();
        assert_eq!(df.height(), 3);
        let names: Vec<&str> = df.get_column_names().iter().map(|n| n.as_str()).collect();
        assert_eq!(names, ["ticker", "date", "alpha_rsi", "weekday"]);
        assert_eq!(df.column("date").unwrap().dtype(), &DataType::Date);
        assert_eq!(df.column("alpha_rsi").unwrap().null_count(), 1);
        assert_eq!(df.column("weekday").unwrap().null_count(), 1);
    }

    #[test]
    fn unsupported_format_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("panel.xlsx");
        let err = write_panel(&sample_panel(), &path).unwrap_err();
        assert!(matches!(err, ExportError::UnsupportedFormat(_)));
        assert!(!path.exists());
    }

    #[test]
    fn json_is_written_atomically() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("feature_columns.json");
        write_json(&["alpha_rsi", "weekday"], &path).unwrap();
        let back: Vec<String> = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(back, ["alpha_rsi", "weekday"]);
        assert!(!dir.path().join("feature_columns.json.tmp").exists());
    }

    #[test]
    fn dropped_stage_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("panel.csv");
        let staged = stage_panel(&sample_panel(), &path).unwrap();
        assert!(dir.path().join("panel.csv.tmp").exists());
        drop(staged);
        assert!(!dir.path().join("panel.csv.tmp").exists());
        assert!(!path.exists());
    }

    #[test]
    fn failed_commit_rolls_back_earlier_renames() {
        let dir = tempfile::tempdir().unwrap();
        let panel_path = dir.path().join("panel.csv");
        // a non-empty directory cannot be replaced by a file
        let blocked = dir.path().join("manifest.json");
        fs::create_dir(&blocked).unwrap();
        fs::write(blocked.join("keep"), "x").unwrap();

        let staged = vec![
            stage_panel(&sample_panel(), &panel_path).unwrap(),
            stage_json(&["a"], &blocked).unwrap(),
            stage_json(&["b"], &dir.path().join("features.json")).unwrap(),
        ];
        let err = commit_all(staged).unwrap_err();
        assert!(matches!(err, ExportError::Io { ref path, .. } if *path == blocked));

        assert!(!panel_path.exists());
        assert!(!dir.path().join("features.json").exists());
        assert!(blocked.join("keep").exists());
        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().is_some_and(|x| x == "tmp"))
            .collect();
        assert!(leftovers.is_empty(), "{leftovers:?}");
    }

    #[test]
    fn table_json_is_an_array_of_records() {
        let dir = tempfile::tempdir().unwrap();
        let frame = df!("isin" => &["PL1", "PL2"], "ticker" => &["AAA", "BBB"]).unwrap();
        let path = dir.path().join("metadata.json");
        write_table_json(&SourceTable::new("metadata", frame), &path).unwrap();
        let back: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(back[1]["ticker"], "BBB");
    }
}
