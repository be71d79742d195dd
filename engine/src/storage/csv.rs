//! CSV file storage.
//!
//! The whole file is read into memory on open; every successful save or
//! delete rewrites it with the delimiter that was detected.

use std::path::{Path, PathBuf};

use super::{ArrayStorage, SaveOutcome, Storage};
use crate::error::StorageResult;
use crate::filter::{Filter, Sort};
use crate::parser::parse_file_auto;
use crate::value::Row;

#[derive(Debug)]
pub struct CsvStorage {
    path: PathBuf,
    delimiter: char,
    encoding: String,
    headers: Vec<String>,
    rows: ArrayStorage,
}

impl CsvStorage {
    /// Open an existing CSV file.
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref().to_path_buf();
        let parsed = parse_file_auto(&path)?;
        log::info!(
            "opened {} ({} rows, {} columns)",
            path.display(),
            parsed.rows.len(),
            parsed.headers.len()
        );
        Ok(Self {
            rows: ArrayStorage::new(path.display().to_string(), parsed.rows),
            path,
            delimiter: parsed.delimiter,
            encoding: parsed.encoding,
            headers: parsed.headers,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn delimiter(&self) -> char {
        self.delimiter
    }

    /// Encoding detected on open; the file is always written back as UTF-8.
    pub fn encoding(&self) -> &str {
        &self.encoding
    }

    fn extend_headers(&mut self, row: &Row) {
        for field in row.keys() {
            if !self.headers.contains(field) {
                self.headers.push(field.clone());
            }
        }
    }

    fn write(&self) -> StorageResult<()> {
        let mut writer = csv::WriterBuilder::new()
            .delimiter(u8::try_from(self.delimiter).unwrap_or(b','))
            .from_path(&self.path)?;
        writer.write_record(&self.headers)?;
        for row in self.rows.rows() {
            let record: Vec<String> = self
                .headers
                .iter()
                .map(|header| row.get(header).map(|v| v.to_text()).unwrap_or_default())
                .collect();
            writer.write_record(&record)?;
        }
        writer.flush()?;
        log::debug!("wrote {} rows to {}", self.rows.rows().len(), self.path.display());
        Ok(())
    }
}

impl Storage for CsvStorage {
    fn name(&self) -> &str {
        self.rows.name()
    }

    fn load(&self, filter: &Filter, sort: &Sort) -> StorageResult<Vec<Row>> {
        self.rows.load(filter, sort)
    }

    fn save(&mut self, row: Row, filter: &Filter, keys: &[String]) -> StorageResult<SaveOutcome> {
        let outcome = self.rows.save(row, filter, keys)?;
        if outcome.changed > 0 {
            self.extend_headers(&outcome.row);
            self.write()?;
        }
        Ok(outcome)
    }

    fn delete(&mut self, filter: &Filter) -> StorageResult<usize> {
        let deleted = self.rows.delete(filter)?;
        if deleted > 0 {
            self.write()?;
        }
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{row_from_json, Value};
    use serde_json::json;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn file(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_filters_text_rows() {
        let file = file("id;title;year\n1;Alpha;1999\n2;Beta;2004\n3;Gamma;2010\n");
        let storage = CsvStorage::open(file.path()).unwrap();
        assert_eq!(storage.delimiter(), ';');

        let filter = Filter::new().between("year", Some(Value::Int(2000)), None);
        let rows = storage.load(&filter, &Sort::new()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["title"], Value::from("Beta"));
    }

    #[test]
    fn test_save_and_delete_rewrite_file() {
        let file = file("id,title\n1,Alpha\n2,Beta\n");
        let keys = vec!["id".to_string()];
        {
            let mut storage = CsvStorage::open(file.path()).unwrap();
            storage
                .save(row_from_json(json!({ "id": "2", "title": "Bravo" })), &Filter::new(), &keys)
                .unwrap();
            storage
                .save(row_from_json(json!({ "title": "Charlie", "note": "new" })), &Filter::new(), &keys)
                .unwrap();
            assert_eq!(storage.delete(&Filter::new().eq("id", 1)).unwrap(), 1);
        }

        let reopened = CsvStorage::open(file.path()).unwrap();
        assert_eq!(reopened.headers(), ["id", "title", "note"]);
        let rows = reopened.load(&Filter::new(), &Sort::new()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["title"], Value::from("Bravo"));
        assert_eq!(rows[1]["id"], Value::from("3"));
        assert_eq!(rows[1]["note"], Value::from("new"));
    }
}
