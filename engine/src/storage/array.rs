//! In-memory row storage.

use super::{key_filter, matches, sort_rows, SaveOutcome, Storage};
use crate::error::StorageResult;
use crate::filter::{Filter, Sort};
use crate::value::{rows_from_json, Row, Value};

/// Rows kept in a vector, in insertion order.
#[derive(Debug, Clone, Default)]
pub struct ArrayStorage {
    name: String,
    rows: Vec<Row>,
}

impl ArrayStorage {
    pub fn new(name: impl Into<String>, rows: Vec<Row>) -> Self {
        Self {
            name: name.into(),
            rows,
        }
    }

    /// Rows from a JSON array of objects.
    pub fn from_json(name: impl Into<String>, json: serde_json::Value) -> Self {
        Self::new(name, rows_from_json(json))
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<Row> {
        self.rows
    }

    fn position(&self, filter: &Filter) -> StorageResult<Option<usize>> {
        for (index, row) in self.rows.iter().enumerate() {
            if matches(row, filter, &self.name)? {
                return Ok(Some(index));
            }
        }
        Ok(None)
    }

    /// Next value for a single integer key.
    fn next_id(&self, key: &str) -> Value {
        let max = self
            .rows
            .iter()
            .filter_map(|row| row.get(key).and_then(Value::as_i64))
            .max()
            .unwrap_or(0);
        Value::Int(max + 1)
    }
}

impl Storage for ArrayStorage {
    fn name(&self) -> &str {
        &self.name
    }

    fn load(&self, filter: &Filter, sort: &Sort) -> StorageResult<Vec<Row>> {
        let mut rows = Vec::new();
        for row in &self.rows {
            if matches(row, filter, &self.name)? {
                rows.push(row.clone());
            }
        }
        sort_rows(&mut rows, sort);
        Ok(rows)
    }

    fn save(&mut self, row: Row, filter: &Filter, keys: &[String]) -> StorageResult<SaveOutcome> {
        let selector = if filter.is_empty() {
            key_filter(&row, keys)
        } else {
            Some(filter.clone())
        };

        if let Some(selector) = selector {
            if let Some(index) = self.position(&selector)? {
                let existing = &mut self.rows[index];
                let mut changed = 0;
                for (field, value) in row {
                    if existing.get(&field) != Some(&value) {
                        changed = 1;
                        existing.insert(field, value);
                    }
                }
                log::trace!("{}: updated row {index} (changed {changed})", self.name);
                return Ok(SaveOutcome {
                    row: existing.clone(),
                    changed,
                });
            }
        }

        let mut row = row;
        if let [key] = keys {
            if row.get(key).map_or(true, Value::is_empty) {
                let id = self.next_id(key);
                row.insert(key.clone(), id);
            }
        }
        log::trace!("{}: inserted row {}", self.name, self.rows.len());
        self.rows.push(row.clone());
        Ok(SaveOutcome { row, changed: 1 })
    }

    fn delete(&mut self, filter: &Filter) -> StorageResult<usize> {
        let mut hits = Vec::with_capacity(self.rows.len());
        for row in &self.rows {
            hits.push(matches(row, filter, &self.name)?);
        }
        let before = self.rows.len();
        let mut hits = hits.into_iter();
        self.rows.retain(|_| !hits.next().unwrap_or(false));
        Ok(before - self.rows.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::row_from_json;
    use serde_json::json;

    fn storage() -> ArrayStorage {
        ArrayStorage::from_json(
            "abc",
            json!([
                { "a": "A1", "b": "B1", "c": 10 },
                { "a": "A2", "b": "B2", "c": 20 },
                { "a": "A3", "b": "C3", "c": 30 },
                { "a": "A4", "b": "D4", "c": 40 }
            ]),
        )
    }

    #[test]
    fn test_min_max_keeps_storage_order() {
        let filter = Filter::from_json(&json!({ "c": { "min": 20, "max": 30 } })).unwrap();
        let rows = storage().load(&filter, &Sort::new()).unwrap();
        let names: Vec<String> = rows.iter().map(|r| r["a"].to_text()).collect();
        assert_eq!(names, vec!["A2", "A3"]);
    }

    #[test]
    fn test_nan_text_matches_no_number() {
        let storage = ArrayStorage::from_json("x", json!([{ "x": "NaN" }, { "x": 7 }, { "x": "7" }]));
        let rows = storage.load(&Filter::new().eq("x", 7), &Sort::new()).unwrap();
        let found: Vec<String> = rows.iter().map(|r| r["x"].to_text()).collect();
        assert_eq!(found, vec!["7", "7"]);
    }

    #[test]
    fn test_keyed_save_updates_in_place() {
        let mut storage = storage();
        let keys = vec!["a".to_string()];
        let outcome = storage
            .save(
                row_from_json(json!({ "a": "A6", "b": "D5", "c": 5 })),
                &Filter::new().eq("a", "A1"),
                &keys,
            )
            .unwrap();

        assert_eq!(outcome.changed, 1);
        assert_eq!(storage.rows().len(), 4);
        assert_eq!(storage.rows()[0]["a"], Value::from("A6"));
        assert_eq!(storage.rows()[0]["b"], Value::from("D5"));
        assert_eq!(storage.rows()[0]["c"], Value::Int(5));
    }

    #[test]
    fn test_unchanged_save_reports_zero() {
        let mut storage = storage();
        let keys = vec!["a".to_string()];
        let outcome = storage
            .save(row_from_json(json!({ "a": "A2", "b": "B2" })), &Filter::new(), &keys)
            .unwrap();
        assert_eq!(outcome.changed, 0);
        assert_eq!(outcome.row["c"], Value::Int(20));
    }

    #[test]
    fn test_insert_assigns_next_id() {
        let mut storage = ArrayStorage::from_json("t", json!([{ "id": 3, "n": "x" }]));
        let keys = vec!["id".to_string()];
        let outcome = storage
            .save(row_from_json(json!({ "id": null, "n": "y" })), &Filter::new(), &keys)
            .unwrap();
        assert_eq!(outcome.row["id"], Value::Int(4));
        assert_eq!(outcome.changed, 1);
        assert_eq!(storage.rows().len(), 2);
    }

    #[test]
    fn test_delete_counts_rows() {
        let mut storage = storage();
        let deleted = storage.delete(&Filter::new().one_of("a", vec!["A1".into(), "A3".into()])).unwrap();
        assert_eq!(deleted, 2);
        assert_eq!(storage.rows().len(), 2);
    }
}
