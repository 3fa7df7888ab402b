//! Loading and saving experiment tables

use crate::error::{DiscoveryError, Result};
use polars::prelude::*;
use std::fs::File;
use std::path::Path;
use tracing::debug;

/// Table format, detected from the file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFormat {
    Csv,
    Tsv,
    JsonLines,
    Parquet,
}

impl TableFormat {
    /// Format for a path; unknown extensions are read as CSV
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "tsv" => TableFormat::Tsv,
            "json" | "jsonl" | "ndjson" => TableFormat::JsonLines,
            "parquet" | "pq" => TableFormat::Parquet,
            _ => TableFormat::Csv,
        }
    }
}

/// Data loader for the supported table formats
#[derive(Debug, Clone)]
pub struct DataLoader {
    /// Rows scanned to infer CSV column types
    infer_schema_length: usize,
}

impl Default for DataLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl DataLoader {
    pub fn new() -> Self {
        Self {
            infer_schema_length: 1000,
        }
    }

    /// Load a delimited text file with a header row.
    ///
    /// Empty cells become nulls, which is how unmeasured targets are marked.
    pub fn load_csv(&self, path: &Path, separator: u8) -> Result<DataFrame> {
        let file = File::open(path)?;
        CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(self.infer_schema_length))
            .with_parse_options(CsvParseOptions::default().with_separator(separator))
            .into_reader_with_file_handle(file)
            .finish()
            .map_err(|e| DiscoveryError::DataError(format!("{}: {}", path.display(), e)))
    }

    /// Load a Parquet file
    pub fn load_parquet(&self, path: &Path) -> Result<DataFrame> {
        let file = File::open(path)?;
        ParquetReader::new(file)
            .finish()
            .map_err(|e| DiscoveryError::DataError(format!("{}: {}", path.display(), e)))
    }

    /// Load a JSON file (line-delimited)
    pub fn load_json(&self, path: &Path) -> Result<DataFrame> {
        let file = File::open(path)?;
        JsonReader::new(file)
            .with_json_format(JsonFormat::JsonLines)
            .finish()
            .map_err(|e| DiscoveryError::DataError(format!("{}: {}", path.display(), e)))
    }

    /// Detect file format from extension and load
    pub fn load_auto(&self, path: &Path) -> Result<DataFrame> {
        let format = TableFormat::from_path(path);
        let df = match format {
            TableFormat::Csv => self.load_csv(path, b','),
            TableFormat::Tsv => self.load_csv(path, b'\t'),
            TableFormat::JsonLines => self.load_json(path),
            TableFormat::Parquet => self.load_parquet(path),
        }?;
        debug!(path = %path.display(), ?format, rows = df.height(), cols = df.width(), "Loaded table");
        Ok(df)
    }
}

/// Writer for result tables
pub struct DataSaver;

impl DataSaver {
    /// Save to CSV
    pub fn save_csv(df: &mut DataFrame, path: &Path) -> Result<()> {
        let mut file = File::create(path)?;
        CsvWriter::new(&mut file)
            .finish(df)
            .map_err(|e| DiscoveryError::DataError(format!("{}: {}", path.display(), e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_test_csv() -> NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(file, "water,cement,strength").unwrap();
        writeln!(file, "0.40,cem_i,41.2").unwrap();
        writeln!(file, "0.45,slag,").unwrap();
        writeln!(file, "0.50,cem_i,35.0").unwrap();
        file
    }

    #[test]
    fn test_format_detection() {
        assert_eq!(TableFormat::from_path(Path::new("a.CSV")), TableFormat::Csv);
        assert_eq!(TableFormat::from_path(Path::new("a.tsv")), TableFormat::Tsv);
        assert_eq!(TableFormat::from_path(Path::new("a.jsonl")), TableFormat::JsonLines);
        assert_eq!(TableFormat::from_path(Path::new("a.parquet")), TableFormat::Parquet);
        assert_eq!(TableFormat::from_path(Path::new("noext")), TableFormat::Csv);
    }

    #[test]
    fn test_load_csv_with_missing_target() {
        let file = create_test_csv();
        let df = DataLoader::new().load_auto(file.path()).unwrap();
        assert_eq!(df.shape(), (3, 3));
        assert_eq!(df.column("strength").unwrap().null_count(), 1);
    }

    #[test]
    fn test_save_csv_roundtrip() {
        let mut df = df!(
            "a" => &[1.0, 2.0, 3.0],
            "b" => &["x", "y", "z"],
        )
        .unwrap();

        let file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        DataSaver::save_csv(&mut df, file.path()).unwrap();

        let loaded = DataLoader::new().load_auto(file.path()).unwrap();
        assert_eq!(loaded.shape(), (3, 2));
    }

    #[test]
    fn test_missing_file() {
        let err = DataLoader::new()
            .load_auto(Path::new("/nonexistent/table.csv"))
            .unwrap_err();
        assert!(matches!(err, DiscoveryError::IoError(_)));
    }
}
