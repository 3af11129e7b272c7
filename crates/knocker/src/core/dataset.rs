//! Delimited-file datasets.
//!
//! One input file feeds one table. The file's first record is always the
//! header; it fixes both the column set and the column order. Every later
//! record is one row whose values are kept verbatim as text. Type conversion
//! is left to the database on insert.

use std::collections::HashSet;
use std::fs::File;
use std::path::{Path, PathBuf};

use csv::ReaderBuilder;
use tracing::debug;

use crate::error::{KnockerError, Result};

/// Parsed contents of one delimited file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dataset {
    /// Target table name.
    pub table: String,
    /// Column names in header order.
    pub columns: Vec<String>,
    /// Row values, each aligned with `columns`.
    pub rows: Vec<Vec<String>>,
}

impl Dataset {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

/// Reads one input file into a [`Dataset`].
///
/// Loading is deferred until the orchestrator's insert phase, so a bad file
/// aborts the surrounding transaction instead of failing before it starts.
#[derive(Debug, Clone)]
pub struct DatasetLoader {
    path: PathBuf,
    delimiter: u8,
}

impl DatasetLoader {
    pub fn new(path: impl Into<PathBuf>, delimiter: u8) -> Self {
        Self {
            path: path.into(),
            delimiter,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Target table: the file name up to its first `.`.
    pub fn table_name(&self) -> Result<String> {
        table_name_from_path(&self.path)
    }

    /// Read and parse the file.
    pub fn load(&self) -> Result<Dataset> {
        let table = self.table_name()?;
        let file = File::open(&self.path).map_err(|e| KnockerError::dataset(&self.path, e))?;

        let mut reader = ReaderBuilder::new()
            .delimiter(self.delimiter)
            .has_headers(true)
            .from_reader(file);

        let columns: Vec<String> = reader
            .headers()
            .map_err(|e| KnockerError::dataset(&self.path, format!("header: {}", e)))?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();

        validate_header(&columns).map_err(|msg| KnockerError::dataset(&self.path, msg))?;

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|e| KnockerError::dataset(&self.path, e))?;
            rows.push(record.iter().map(str::to_string).collect());
        }

        debug!(
            "Loaded {} rows x {} columns for table {} from {}",
            rows.len(),
            columns.len(),
            table,
            self.path.display()
        );

        Ok(Dataset {
            table,
            columns,
            rows,
        })
    }
}

fn validate_header(columns: &[String]) -> std::result::Result<(), String> {
    if columns.is_empty() || (columns.len() == 1 && columns[0].is_empty()) {
        return Err("file has no header".to_string());
    }

    let mut seen = HashSet::new();
    for (idx, col) in columns.iter().enumerate() {
        if col.is_empty() {
            return Err(format!("header column {} is empty", idx + 1));
        }
        if !seen.insert(col.as_str()) {
            return Err(format!("duplicate header column {:?}", col));
        }
    }

    Ok(())
}

/// Derive the target table from an input file path.
pub fn table_name_from_path(path: &Path) -> Result<String> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| KnockerError::dataset(path, "file name is not valid UTF-8"))?;

    let table = file_name.split('.').next().unwrap_or_default();
    if table.is_empty() {
        return Err(KnockerError::dataset(
            path,
            "cannot derive a table name from the file name",
        ));
    }

    Ok(table.to_string())
}

/// Collect the input files in `dir` with the given extension, sorted by name.
pub fn discover_inputs(dir: &Path, extension: &str, delimiter: u8) -> Result<Vec<DatasetLoader>> {
    if !dir.is_dir() {
        return Err(KnockerError::Config(format!(
            "input directory not found: {}",
            dir.display()
        )));
    }

    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let matches = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case(extension));
        if path.is_file() && matches {
            paths.push(path);
        }
    }
    paths.sort();

    Ok(paths
        .into_iter()
        .map(|p| DatasetLoader::new(p, delimiter))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        let mut f = File::create(&path).unwrap();
        f.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_load_header_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "users.csv", "id;name\n1;Alice\n2;Bob\n");

        let ds = DatasetLoader::new(&path, b';').load().unwrap();
        assert_eq!(ds.table, "users");
        assert_eq!(ds.columns, vec!["id", "name"]);
        assert_eq!(ds.row_count(), 2);
        assert_eq!(ds.rows[0], vec!["1", "Alice"]);
        assert_eq!(ds.rows[1], vec!["2", "Bob"]);
    }

    #[test]
    fn test_values_are_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            dir.path(),
            "prices.csv",
            "sku,amount,when\n007, 1.50 ,2024-01-01\n",
        );

        let ds = DatasetLoader::new(&path, b',').load().unwrap();
        assert_eq!(ds.rows[0], vec!["007", " 1.50 ", "2024-01-01"]);
    }

    #[test]
    fn test_header_only_is_empty_dataset() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "tags.csv", "id;label\n");

        let ds = DatasetLoader::new(&path, b';').load().unwrap();
        assert!(ds.is_empty());
        assert_eq!(ds.columns, vec!["id", "label"]);
    }

    #[test]
    fn test_quoted_fields_keep_delimiters() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "notes.csv", "id;body\n1;\"a;b\"\n");

        let ds = DatasetLoader::new(&path, b';').load().unwrap();
        assert_eq!(ds.rows[0][1], "a;b");
    }

    #[test]
    fn test_ragged_row_is_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "users.csv", "id;name\n1;Alice;extra\n");

        let err = DatasetLoader::new(&path, b';').load().unwrap_err();
        assert!(matches!(err, KnockerError::DatasetRead { .. }));
    }

    #[test]
    fn test_duplicate_header_is_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "users.csv", "id;id\n1;2\n");

        let err = DatasetLoader::new(&path, b';').load().unwrap_err();
        assert!(err.to_string().contains("duplicate header column"));
    }

    #[test]
    fn test_empty_file_is_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "users.csv", "");

        let err = DatasetLoader::new(&path, b';').load().unwrap_err();
        assert!(err.to_string().contains("no header"));
    }

    #[test]
    fn test_missing_file() {
        let err = DatasetLoader::new("/nonexistent/users.csv", b';')
            .load()
            .unwrap_err();
        assert!(matches!(err, KnockerError::DatasetRead { .. }));
    }

    #[test]
    fn test_table_name_stops_at_first_dot() {
        assert_eq!(
            table_name_from_path(Path::new("/data/users.csv")).unwrap(),
            "users"
        );
        assert_eq!(
            table_name_from_path(Path::new("orders.2024.csv")).unwrap(),
            "orders"
        );
        assert!(table_name_from_path(Path::new(".hidden.csv")).is_err());
    }

    #[test]
    fn test_discover_inputs_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "b.csv", "id\n");
        write_file(dir.path(), "a.CSV", "id\n");
        write_file(dir.path(), "readme.txt", "hello");
        std::fs::create_dir(dir.path().join("nested.csv")).unwrap();

        let inputs = discover_inputs(dir.path(), "csv", b';').unwrap();
        let names: Vec<String> = inputs.iter().map(|l| l.table_name().unwrap()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn test_discover_inputs_missing_dir() {
        let err = discover_inputs(Path::new("/definitely/not/here"), "csv", b';').unwrap_err();
        assert!(matches!(err, KnockerError::Config(_)));
    }
}
