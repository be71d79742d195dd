//! Skeleton rows that must always be present after a load.

use super::ModelTransformer;
use crate::error::ModelResult;
use crate::meta::MetaModel;
use crate::value::{Row, Value};

/// Emits one row per required row, in required order.
///
/// A loaded row matches a required row when their first `key_count` fields
/// (all fields of the required row by default) are loosely equal; required
/// fields the matched row lacks are filled in from the required row. Unmatched
/// required rows are built from the default row, which is every parent item
/// at null unless configured, overlaid with the required values. Loaded rows
/// that match no required row are dropped.
#[derive(Debug, Clone, Default)]
pub struct RequiredRowsTransformer {
    required: Vec<Row>,
    key_count: Option<usize>,
    default_row: Option<Row>,
}

impl RequiredRowsTransformer {
    pub fn new(required: Vec<Row>) -> Self {
        Self {
            required,
            ..Self::default()
        }
    }

    pub fn with_key_count(mut self, count: usize) -> Self {
        self.key_count = Some(count);
        self
    }

    pub fn with_default_row(mut self, row: Row) -> Self {
        self.default_row = Some(row);
        self
    }

    pub fn required(&self) -> &[Row] {
        &self.required
    }

    fn key_fields<'a>(&self, required: &'a Row) -> Vec<&'a String> {
        let count = self.key_count.unwrap_or(required.len());
        required.keys().take(count).collect()
    }

    fn default_row(&self, parent: &MetaModel) -> Row {
        match &self.default_row {
            Some(row) => row.clone(),
            None => parent
                .item_names()
                .into_iter()
                .filter(|name| parent.get_alias(name).is_none())
                .map(|name| (name.to_string(), Value::Null))
                .collect(),
        }
    }
}

impl ModelTransformer for RequiredRowsTransformer {
    fn transform_load(
        &mut self,
        parent: &MetaModel,
        rows: Vec<Row>,
        _is_new: bool,
        _is_post: bool,
    ) -> ModelResult<Vec<Row>> {
        let mut loaded: Vec<Option<Row>> = rows.into_iter().map(Some).collect();
        let mut output = Vec::with_capacity(self.required.len());

        for required in &self.required {
            let fields = self.key_fields(required);
            let hit = loaded.iter().position(|candidate| {
                candidate.as_ref().is_some_and(|row| {
                    fields.iter().all(|field| {
                        let expected = &required[*field];
                        row.get(*field)
                            .map_or(expected.is_null(), |value| value.loose_eq(expected))
                    })
                })
            });

            let row = match hit.and_then(|index| loaded[index].take()) {
                Some(mut row) => {
                    for (field, value) in required {
                        row.entry(field.clone()).or_insert_with(|| value.clone());
                    }
                    row
                }
                None => {
                    let mut row = self.default_row(parent);
                    for (field, value) in required {
                        row.insert(field.clone(), value.clone());
                    }
                    row
                }
            };
            output.push(row);
        }

        let dropped = loaded.iter().filter(|row| row.is_some()).count();
        if dropped > 0 {
            log::debug!("required rows: dropped {dropped} unmatched loaded rows");
        }
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{row_from_json, rows_from_json};
    use serde_json::json;

    fn parent() -> MetaModel {
        let mut meta = MetaModel::new("months");
        meta.ensure("month");
        meta.ensure("total");
        meta
    }

    fn required() -> Vec<Row> {
        rows_from_json(json!([{ "month": 1 }, { "month": 2 }, { "month": 3 }]))
    }

    #[test]
    fn test_missing_rows_filled_in_required_order() {
        let mut transformer = RequiredRowsTransformer::new(required());
        let loaded = rows_from_json(json!([
            { "month": "3", "total": 30 },
            { "month": "1", "total": 10 }
        ]));
        let rows = transformer.transform_load(&parent(), loaded, false, false).unwrap();

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0]["total"], Value::Int(10));
        assert_eq!(rows[1]["month"], Value::Int(2));
        assert_eq!(rows[1]["total"], Value::Null);
        assert_eq!(rows[2]["total"], Value::Int(30));
    }

    #[test]
    fn test_matched_row_gains_missing_required_fields() {
        let required = rows_from_json(json!([
            { "month": 1, "quarter": "Q1", "total": 0 },
            { "month": 4, "quarter": "Q2", "total": 0 }
        ]));
        let mut transformer = RequiredRowsTransformer::new(required).with_key_count(1);
        let loaded = rows_from_json(json!([{ "month": 1, "total": 10 }]));
        let rows = transformer.transform_load(&parent(), loaded, false, false).unwrap();

        assert_eq!(rows[0]["quarter"], Value::from("Q1"));
        assert_eq!(rows[0]["total"], Value::Int(10));
        assert_eq!(rows[1]["quarter"], Value::from("Q2"));
        assert_eq!(rows[1]["total"], Value::Int(0));
    }

    #[test]
    fn test_configured_default_and_key_count() {
        let mut transformer = RequiredRowsTransformer::new(rows_from_json(json!([
            { "month": 1, "label": "Jan" },
            { "month": 2, "label": "Feb" }
        ])))
        .with_key_count(1)
        .with_default_row(row_from_json(json!({ "total": 0 })));

        let loaded = rows_from_json(json!([{ "month": 1, "label": "January", "total": 5 }]));
        let rows = transformer.transform_load(&parent(), loaded, false, false).unwrap();

        assert_eq!(rows[0]["label"], Value::from("January"));
        assert_eq!(rows[1]["total"], Value::Int(0));
        assert_eq!(rows[1]["label"], Value::from("Feb"));
    }

    #[test]
    fn test_unmatched_loaded_rows_are_dropped() {
        let mut transformer = RequiredRowsTransformer::new(required());
        let loaded = rows_from_json(json!([{ "month": 13, "total": 1 }]));
        let rows = transformer.transform_load(&parent(), loaded, false, false).unwrap();
        assert_eq!(rows.len(), 3);
        assert!(rows.iter().all(|row| row["total"].is_null()));
    }
}
