//! Storage collaborators.
//!
//! The model pipeline only talks to storage through [`Storage`]. Two
//! backends are carried in-tree:
//!
//! - [`ArrayStorage`]: rows held in memory
//! - [`CsvStorage`]: rows read from and written back to a CSV file
//!
//! Both evaluate filters in memory with [`matches`] and order rows with
//! [`sort_rows`].

pub mod array;
pub mod csv;

use std::cmp::Ordering;
use std::fmt;

use crate::error::{StorageError, StorageResult};
use crate::filter::{Condition, FieldTest, Filter, Sort, SortOrder};
use crate::value::{Row, Value};

pub use self::array::ArrayStorage;
pub use self::csv::CsvStorage;

/// Result of a save: the stored row and how many rows changed (0 or 1).
#[derive(Debug, Clone, PartialEq)]
pub struct SaveOutcome {
    pub row: Row,
    pub changed: usize,
}

/// Backend contract consumed by [`Model`](crate::model::Model).
pub trait Storage: fmt::Debug {
    /// Short backend name used in messages.
    fn name(&self) -> &str;

    /// Rows matching `filter`, ordered by `sort` (storage order otherwise).
    fn load(&self, filter: &Filter, sort: &Sort) -> StorageResult<Vec<Row>>;

    /// Update the row selected by `filter` (or by the values of `keys` when
    /// the filter is empty), inserting when nothing matches.
    fn save(&mut self, row: Row, filter: &Filter, keys: &[String]) -> StorageResult<SaveOutcome>;

    /// Remove every row matching `filter`; returns the count.
    fn delete(&mut self, filter: &Filter) -> StorageResult<usize>;
}

// =============================================================================
// In-memory filter evaluation
// =============================================================================

static NULL_VALUE: Value = Value::Null;

fn field_value<'a>(row: &'a Row, field: &str) -> &'a Value {
    row.get(field).unwrap_or(&NULL_VALUE)
}

fn test_value(value: &Value, test: &FieldTest) -> bool {
    match test {
        FieldTest::Equals(expected) => value.loose_eq(expected),
        FieldTest::OneOf(options) => options.iter().any(|o| value.loose_eq(o)),
        FieldTest::Like(needle) => value
            .to_text()
            .to_lowercase()
            .contains(&needle.to_lowercase()),
        FieldTest::Between { min, max } => {
            let above = min
                .as_ref()
                .map_or(true, |min| !value.is_null() && value.compare(min) != Ordering::Less);
            let below = max
                .as_ref()
                .map_or(true, |max| !value.is_null() && value.compare(max) != Ordering::Greater);
            above && below
        }
        FieldTest::Not(inner) => !test_value(value, inner),
    }
}

fn eval(row: &Row, condition: &Condition, depth: usize, backend: &str) -> StorageResult<bool> {
    match condition {
        Condition::Field { field, test } => Ok(test_value(field_value(row, field), test)),
        Condition::Raw(expression) => Err(StorageError::RawExpression {
            backend: backend.to_string(),
            expression: expression.clone(),
        }),
        Condition::Group(children) => eval_all(row, children, depth + 1, backend),
    }
}

/// Conditions at an even depth are joined by AND, at an odd depth by OR.
fn eval_all(row: &Row, conditions: &[Condition], depth: usize, backend: &str) -> StorageResult<bool> {
    if conditions.is_empty() {
        return Ok(true);
    }
    let any = depth % 2 == 1;
    for condition in conditions {
        let hit = eval(row, condition, depth, backend)?;
        if any && hit {
            return Ok(true);
        }
        if !any && !hit {
            return Ok(false);
        }
    }
    Ok(!any)
}

/// Whether `row` satisfies `filter`. Raw expressions cannot be evaluated in
/// memory and are reported as errors naming `backend`.
pub fn matches(row: &Row, filter: &Filter, backend: &str) -> StorageResult<bool> {
    eval_all(row, filter.conditions(), 0, backend)
}

/// Stable multi-key sort.
pub fn sort_rows(rows: &mut [Row], sort: &Sort) {
    if sort.is_empty() {
        return;
    }
    rows.sort_by(|a, b| {
        for (field, order) in sort {
            let ordering = field_value(a, field).compare(field_value(b, field));
            let ordering = match order {
                SortOrder::Asc => ordering,
                SortOrder::Desc => ordering.reverse(),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    })
}

/// Filter selecting a row by its key values, when every key is set.
pub fn key_filter(row: &Row, keys: &[String]) -> Option<Filter> {
    if keys.is_empty() {
        return None;
    }
    let mut filter = Filter::new();
    for key in keys {
        let value = row.get(key).filter(|v| !v.is_empty())?;
        filter = filter.eq(key.as_str(), value.clone());
    }
    Some(filter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{row_from_json, rows_from_json};
    use serde_json::json;

    fn rows() -> Vec<Row> {
        rows_from_json(json!([
            { "a": "A1", "b": "B1", "c": 10 },
            { "a": "A2", "b": "B2", "c": 20 },
            { "a": "A3", "b": "C3", "c": 30 },
            { "a": "A4", "b": "D4", "c": 40 }
        ]))
    }

    fn select(filter: &Filter) -> Vec<String> {
        rows()
            .into_iter()
            .filter(|row| matches(row, filter, "test").unwrap())
            .map(|row| row["a"].to_text())
            .collect()
    }

    #[test]
    fn test_between_is_inclusive() {
        let filter = Filter::from_json(&json!({ "c": { "min": 20, "max": 30 } })).unwrap();
        assert_eq!(select(&filter), vec!["A2", "A3"]);
    }

    #[test]
    fn test_membership_like_and_not() {
        assert_eq!(select(&Filter::new().one_of("b", vec!["B1".into(), "D4".into()])), vec!["A1", "A4"]);
        assert_eq!(select(&Filter::new().like("b", "c")), vec!["A3"]);
        assert_eq!(
            select(&Filter::new().not("c", FieldTest::Equals(Value::Int(10)))),
            vec!["A2", "A3", "A4"]
        );
    }

    #[test]
    fn test_groups_alternate_and_or() {
        // c = 10 AND (a = A1 OR b = D4)
        let filter = Filter::from_json(&json!({ "c": 10, "1": { "a": "A1", "b": "D4" } })).unwrap();
        assert_eq!(select(&filter), vec!["A1"]);

        // (a = A2 OR (c >= 30 AND b = D4))
        let filter = Filter::from_json(&json!({
            "1": { "a": "A2", "2": { "c": { "min": 30 }, "b": "D4" } }
        }))
        .unwrap();
        assert_eq!(select(&filter), vec!["A2", "A4"]);
    }

    #[test]
    fn test_raw_expression_is_an_error() {
        let row = row_from_json(json!({ "a": 1 }));
        let err = matches(&row, &Filter::new().raw("a > 0"), "array").unwrap_err();
        assert!(err.to_string().contains("a > 0"));
    }

    #[test]
    fn test_sort_is_stable_and_multi_key() {
        let mut rows = rows_from_json(json!([
            { "k": 1, "n": "x" },
            { "k": 2, "n": "y" },
            { "k": 1, "n": "z" }
        ]));
        let mut sort = Sort::new();
        sort.insert("k".into(), SortOrder::Desc);
        sort_rows(&mut rows, &sort);
        let names: Vec<String> = rows.iter().map(|r| r["n"].to_text()).collect();
        assert_eq!(names, vec!["y", "x", "z"]);
    }

    #[test]
    fn test_key_filter_requires_every_key() {
        let keys = vec!["a".to_string(), "b".to_string()];
        assert!(key_filter(&row_from_json(json!({ "a": 1 })), &keys).is_none());
        let filter = key_filter(&row_from_json(json!({ "a": 1, "b": 2 })), &keys).unwrap();
        assert_eq!(filter.fields(), vec!["a", "b"]);
    }
}
