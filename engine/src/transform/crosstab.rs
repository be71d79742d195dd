//! Pivot `(id, value)` rows into wide rows.

use indexmap::IndexMap;

use super::{ModelTransformer, JOIN_KEY_DELIMITER};
use crate::error::{ModelResult, TransformError, TransformResult};
use crate::meta::setting::{DATE_FORMAT, FORMAT_FUNCTION, LABEL, MULTI_OPTIONS, NO_SAVE, TYPE};
use crate::meta::{MetaModel, Setting, Settings};
use crate::value::{Row, Value};

/// Rows that agree on every field except the id and value fields collapse
/// into one row, with one `prefix + id` field per id holding the value.
///
/// The pivot fields are declared from the id field's `multiOptions`; ids
/// outside the options still become fields on the loaded rows.
#[derive(Debug, Clone)]
pub struct CrossTabTransformer {
    id_field: String,
    value_field: String,
    prefix: String,
}

impl CrossTabTransformer {
    pub fn new(id_field: impl Into<String>, value_field: impl Into<String>) -> TransformResult<Self> {
        let id_field = id_field.into();
        let value_field = value_field.into();
        if id_field.is_empty() || value_field.is_empty() {
            return Err(TransformError::MissingCrosstabFields);
        }
        Ok(Self {
            prefix: format!("{value_field}_"),
            id_field,
            value_field,
        })
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    fn pivot_name(&self, id: &Value) -> String {
        format!("{}{}", self.prefix, id.to_text())
    }

    fn options(parent: &MetaModel, field: &str) -> Vec<(String, Value)> {
        parent
            .get_value(field, MULTI_OPTIONS)
            .and_then(Value::as_map)
            .map(|options| options.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default()
    }

    /// Null for every declared pivot field.
    fn template(&self, parent: &MetaModel) -> Row {
        Self::options(parent, &self.id_field)
            .into_iter()
            .map(|(id, _)| (self.pivot_name(&Value::from(id)), Value::Null))
            .collect()
    }
}

impl ModelTransformer for CrossTabTransformer {
    fn field_info(&self, parent: &MetaModel) -> IndexMap<String, Settings> {
        let base: Settings = parent
            .get_all(&self.value_field)
            .into_iter()
            .filter(|(key, _)| [TYPE, FORMAT_FUNCTION, DATE_FORMAT].contains(&key.as_str()))
            .collect();

        Self::options(parent, &self.id_field)
            .into_iter()
            .map(|(id, label)| {
                let mut settings = base.clone();
                settings.insert(LABEL.to_string(), Setting::from(label));
                settings.insert(NO_SAVE.to_string(), Setting::from(true));
                (self.pivot_name(&Value::from(id)), settings)
            })
            .collect()
    }

    fn transform_load(
        &mut self,
        parent: &MetaModel,
        rows: Vec<Row>,
        _is_new: bool,
        _is_post: bool,
    ) -> ModelResult<Vec<Row>> {
        let template = self.template(parent);
        let mut pivoted: IndexMap<String, Row> = IndexMap::new();

        for mut row in rows {
            let id = row.shift_remove(&self.id_field).unwrap_or_default();
            let value = row.shift_remove(&self.value_field).unwrap_or_default();
            let group = row
                .values()
                .map(Value::to_text)
                .collect::<Vec<_>>()
                .join(JOIN_KEY_DELIMITER);

            let target = pivoted.entry(group).or_insert_with(|| {
                let mut wide = row;
                wide.extend(template.clone());
                wide
            });
            target.insert(self.pivot_name(&id), value);
        }

        log::trace!("crosstab on '{}': {} wide rows", self.id_field, pivoted.len());
        Ok(pivoted.into_values().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::rows_from_json;
    use serde_json::json;

    fn parent() -> MetaModel {
        let mut meta = MetaModel::new("scores");
        meta.ensure("student");
        meta.set_one("term", MULTI_OPTIONS, Value::from(json!({ "t1": "Term 1", "t2": "Term 2", "t3": "Term 3" })));
        meta.ensure("score");
        meta
    }

    #[test]
    fn test_requires_fields() {
        assert!(matches!(CrossTabTransformer::new("", "score"), Err(TransformError::MissingCrosstabFields)));
    }

    #[test]
    fn test_pivot_fields_declared_from_options() {
        let transformer = CrossTabTransformer::new("term", "score").unwrap();
        let info = transformer.field_info(&parent());
        let names: Vec<&str> = info.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["score_t1", "score_t2", "score_t3"]);
        assert_eq!(info["score_t2"]["label"], Setting::from("Term 2"));
    }

    #[test]
    fn test_rows_pivot_in_first_seen_order() {
        let mut transformer = CrossTabTransformer::new("term", "score").unwrap().with_prefix("s_");
        let rows = rows_from_json(json!([
            { "student": "bo", "term": "t1", "score": 12 },
            { "student": "al", "term": "t2", "score": 15 },
            { "student": "bo", "term": "t2", "score": 14 },
            { "student": "al", "term": "t4", "score": 9 }
        ]));
        let wide = transformer.transform_load(&parent(), rows, false, false).unwrap();

        assert_eq!(wide.len(), 2);
        assert_eq!(wide[0]["student"], Value::from("bo"));
        assert_eq!(wide[0]["s_t1"], Value::Int(12));
        assert_eq!(wide[0]["s_t2"], Value::Int(14));
        assert_eq!(wide[0]["s_t3"], Value::Null);
        assert_eq!(wide[1]["s_t1"], Value::Null);
        assert_eq!(wide[1]["s_t4"], Value::Int(9));
        assert!(!wide[0].contains_key("term"));
    }
}
