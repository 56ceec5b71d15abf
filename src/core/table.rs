//! Row-oriented CSV tables.
//!
//! Chemistry and georeference tables are treated as opaque rows keyed by a
//! sample identifier column. Values are kept as raw strings so that a rewrite
//! only drops rows and never reformats the cells it keeps.

use std::collections::{BTreeSet, HashMap};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, StringRecord};
use tempfile::NamedTempFile;
use thiserror::Error;

/// Sample identifier ("SSN"). Compared by exact string equality.
pub type SampleId = String;

/// Set of sample identifiers, ordered for stable reporting.
pub type IdSet = BTreeSet<SampleId>;

/// Errors that can occur while reading or rewriting a table.
#[derive(Error, Debug)]
pub enum TableError {
    #[error("table not found: {0}")]
    NotFound(PathBuf),

    #[error("IO error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error in '{path}': {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("schema error: column '{column}' not found in {table}")]
    MissingColumn { table: String, column: String },

    #[error("failed to replace '{path}': {source}")]
    Persist {
        path: PathBuf,
        #[source]
        source: tempfile::PersistError,
    },
}

/// Result type for table operations.
pub type Result<T> = std::result::Result<T, TableError>;

/// An in-memory CSV table: one header record plus data rows.
#[derive(Debug, Clone, Default)]
pub struct Table {
    /// Column names, in file order.
    pub headers: StringRecord,
    /// Data rows, in file order.
    pub rows: Vec<StringRecord>,
    /// File the table was read from, if any.
    pub source_path: Option<PathBuf>,
}

impl Table {
    /// Build a table from literal headers and rows.
    pub fn from_rows<H, R>(headers: H, rows: R) -> Self
    where
        H: IntoIterator,
        H::Item: AsRef<str>,
        R: IntoIterator,
        R::Item: IntoIterator,
        <R::Item as IntoIterator>::Item: AsRef<str>,
    {
        let headers: Vec<String> = headers.into_iter().map(|h| h.as_ref().to_string()).collect();
        let rows = rows
            .into_iter()
            .map(|row| {
                let cells: Vec<String> = row.into_iter().map(|c| c.as_ref().to_string()).collect();
                StringRecord::from(cells)
            })
            .collect();

        Self {
            headers: StringRecord::from(headers),
            rows,
            source_path: None,
        }
    }

    /// Read a CSV table with a header row.
    ///
    /// # Errors
    ///
    /// Returns [`TableError::NotFound`] if `path` does not exist, and a CSV
    /// error if the file is malformed (e.g. ragged rows).
    pub fn read_csv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(TableError::NotFound(path.to_path_buf()));
        }

        let file = File::open(path).map_err(|e| TableError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .from_reader(BufReader::new(file));

        let headers = reader
            .headers()
            .map_err(|e| TableError::Csv {
                path: path.to_path_buf(),
                source: e,
            })?
            .clone();

        let mut rows = Vec::with_capacity(1024);
        for result in reader.records() {
            let record = result.map_err(|e| TableError::Csv {
                path: path.to_path_buf(),
                source: e,
            })?;
            rows.push(record);
        }

        Ok(Self {
            headers,
            rows,
            source_path: Some(path.to_path_buf()),
        })
    }

    /// Number of data rows.
    #[inline]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Human-readable name used in error messages.
    pub fn display_name(&self) -> String {
        self.source_path
            .as_ref()
            .map(|p| format!("'{}'", p.display()))
            .unwrap_or_else(|| "table".to_string())
    }

    /// Position of the column called `name`, if present.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Position of the column called `name`, or a schema error.
    pub fn require_column(&self, name: &str) -> Result<usize> {
        self.column_index(name).ok_or_else(|| TableError::MissingColumn {
            table: self.display_name(),
            column: name.to_string(),
        })
    }

    /// Substitute column names according to `renames`. Names without an
    /// entry are left untouched; substitutions are not chained.
    pub fn rename_columns(&mut self, renames: &HashMap<String, String>) {
        if renames.is_empty() {
            return;
        }
        let renamed: Vec<&str> = self
            .headers
            .iter()
            .map(|h| renames.get(h).map(String::as_str).unwrap_or(h))
            .collect();
        self.headers = StringRecord::from(renamed);
    }

    /// Values of column `idx` as an identifier set.
    pub fn identifiers(&self, idx: usize) -> IdSet {
        self.rows
            .iter()
            .map(|row| row.get(idx).unwrap_or("").to_string())
            .collect()
    }

    /// Keep only the rows whose mask entry is `true`, preserving order.
    pub fn select(&self, mask: &[bool]) -> Table {
        debug_assert_eq!(mask.len(), self.rows.len(), "mask and rows must have same length");

        let rows = self
            .rows
            .iter()
            .zip(mask)
            .filter(|(_, keep)| **keep)
            .map(|(row, _)| row.clone())
            .collect();

        Table {
            headers: self.headers.clone(),
            rows,
            source_path: self.source_path.clone(),
        }
    }

    /// Write the table as CSV, replacing `path` atomically.
    ///
    /// The data goes to a temporary file in the destination directory which
    /// is then renamed over `path`, so readers never see a half-written table.
    pub fn write_csv_atomic(&self, path: &Path) -> Result<()> {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let io_err = |e: std::io::Error| TableError::Io {
            path: path.to_path_buf(),
            source: e,
        };
        let csv_err = |e: csv::Error| TableError::Csv {
            path: path.to_path_buf(),
            source: e,
        };

        let tmp = NamedTempFile::new_in(&dir).map_err(io_err)?;
        {
            let mut writer = csv::Writer::from_writer(BufWriter::new(tmp.as_file()));
            writer.write_record(&self.headers).map_err(csv_err)?;
            for row in &self.rows {
                writer.write_record(row).map_err(csv_err)?;
            }
            writer.flush().map_err(io_err)?;
        }
        tmp.as_file().sync_all().map_err(io_err)?;

        tmp.persist(path).map_err(|e| TableError::Persist {
            path: path.to_path_buf(),
            source: e,
        })?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::Write;
    use tempfile::{tempdir, NamedTempFile};

    #[test]
    fn test_read_csv() -> Result<()> {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "SSN,pH,Clay").unwrap();
        writeln!(file, "A1,6.5,20").unwrap();
        writeln!(file, "B2,5.1,").unwrap();
        file.flush().unwrap();

        let table = Table::read_csv(file.path())?;
        assert_eq!(table.len(), 2);
        assert_eq!(table.column_index("pH"), Some(1));
        assert_eq!(&table.rows[1][0], "B2");
        assert_eq!(&table.rows[1][2], "");

        Ok(())
    }

    #[test]
    fn test_read_missing_file() {
        let dir = tempdir().unwrap();
        let result = Table::read_csv(dir.path().join("nope.csv"));
        assert!(matches!(result, Err(TableError::NotFound(_))));
    }

    #[test]
    fn test_identifiers_keep_exact_strings() {
        let table = Table::from_rows(["SSN"], [["a1"], ["A1"], [" A1"], ["A1"]]);
        let ids = table.identifiers(0);
        assert_eq!(ids.len(), 3);
        assert!(ids.contains(" A1"));
    }

    #[test]
    fn test_rename_columns() {
        let mut table = Table::from_rows(["ICRAF ID", "pH"], [["A1", "6.0"]]);
        let renames: HashMap<String, String> = [
            ("ICRAF ID".to_string(), "SSN".to_string()),
            ("Missing".to_string(), "Other".to_string()),
        ]
        .into_iter()
        .collect();

        table.rename_columns(&renames);

        assert_eq!(table.headers.iter().collect::<Vec<_>>(), vec!["SSN", "pH"]);
    }

    #[test]
    fn test_rename_is_not_chained() {
        let mut table = Table::from_rows(["a", "b"], Vec::<Vec<&str>>::new());
        let renames: HashMap<String, String> = [
            ("a".to_string(), "b".to_string()),
            ("b".to_string(), "c".to_string()),
        ]
        .into_iter()
        .collect();

        table.rename_columns(&renames);

        assert_eq!(table.headers.iter().collect::<Vec<_>>(), vec!["b", "c"]);
    }

    #[test]
    fn test_require_column_schema_error() {
        let table = Table::from_rows(["ID"], [["A1"]]);
        match table.require_column("SSN") {
            Err(TableError::MissingColumn { column, .. }) => assert_eq!(column, "SSN"),
            other => panic!("Expected MissingColumn, got {:?}", other),
        }
    }

    #[test]
    fn test_select_preserves_order() {
        let table = Table::from_rows(["SSN"], [["A"], ["B"], ["C"], ["D"]]);
        let selected = table.select(&[true, false, true, true]);
        let ids: Vec<&str> = selected.rows.iter().map(|r| &r[0]).collect();
        assert_eq!(ids, vec!["A", "C", "D"]);
    }

    #[test]
    fn test_write_csv_atomic_replaces_file() -> Result<()> {
        let dir = tempdir().unwrap();
        let path = dir.path().join("table.csv");
        fs::write(&path, "SSN,Note\nOLD,x\n").unwrap();

        let table = Table::from_rows(["SSN", "Note"], [["A1", "with, comma"], ["B2", ""]]);
        table.write_csv_atomic(&path)?;

        let back = Table::read_csv(&path)?;
        assert_eq!(back.len(), 2);
        assert_eq!(&back.rows[0][1], "with, comma");

        // Only the rewritten table remains in the directory
        let entries = fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(entries, 1);

        Ok(())
    }
}
