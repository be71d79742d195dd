//! Transformer pipeline.
//!
//! Transformers reshape rows on their way in and out of storage:
//!
//! - [`NestedTransformer`]: child rows embedded per parent row
//! - [`OneToManyTransformer`]: the same, batched, with diffing saves
//! - [`JoinTransformer`]: one child row flattened into its parent
//! - [`ToManyTransformer`]: one-to-many plus filter pushdown
//! - [`CrossTabTransformer`]: `(id, value)` rows pivoted into wide rows
//! - [`RequiredRowsTransformer`]: skeleton rows that must always appear
//!
//! They run in registration order. Each hook receives the parent
//! [`MetaModel`] read-only while the transformer list is detached from it.

pub mod crosstab;
pub mod join;
pub mod nested;
pub mod one_to_many;
pub mod required_rows;
pub mod to_many;

use indexmap::IndexMap;
use std::fmt;

use crate::error::{ModelResult, TransformError, TransformResult};
use crate::filter::{Condition, Filter, Sort};
use crate::meta::setting::TYPE;
use crate::meta::{BaseType, MetaModel, Setting, Settings};
use crate::model::Model;
use crate::value::{Row, Value};

pub use crosstab::CrossTabTransformer;
pub use join::JoinTransformer;
pub use nested::NestedTransformer;
pub use one_to_many::OneToManyTransformer;
pub use required_rows::RequiredRowsTransformer;
pub use to_many::ToManyTransformer;

/// Separator between values of a composite join key.
pub const JOIN_KEY_DELIMITER: &str = "\u{1f}|\u{1f}";

/// A pipeline stage over loaded and saved rows.
///
/// Every hook has a pass-through default.
pub trait ModelTransformer: fmt::Debug {
    /// Fields this transformer adds to the parent, declared at registration.
    fn field_info(&self, _parent: &MetaModel) -> IndexMap<String, Settings> {
        IndexMap::new()
    }

    fn transform_filter(&mut self, _parent: &MetaModel, filter: Filter) -> ModelResult<Filter> {
        Ok(filter)
    }

    fn transform_sort(&mut self, _parent: &MetaModel, sort: Sort) -> Sort {
        sort
    }

    fn transform_load(
        &mut self,
        _parent: &MetaModel,
        rows: Vec<Row>,
        _is_new: bool,
        _is_post: bool,
    ) -> ModelResult<Vec<Row>> {
        Ok(rows)
    }

    fn transform_row_before_save(&mut self, _parent: &MetaModel, row: Row) -> ModelResult<Row> {
        Ok(row)
    }

    fn transform_row_after_save(&mut self, _parent: &MetaModel, row: Row) -> ModelResult<Row> {
        Ok(row)
    }

    /// Sub rows changed by the last after-save hook; reading resets it.
    fn take_changed(&mut self) -> usize {
        0
    }
}

// =============================================================================
// Sub model links
// =============================================================================

/// A child model reached from parent rows through join fields.
#[derive(Debug)]
pub struct SubModelLink {
    name: String,
    model: Box<Model>,
    join: IndexMap<String, String>,
}

impl SubModelLink {
    /// `join` maps parent field names to child field names.
    pub fn new<I, P, C>(name: impl Into<String>, model: Model, join: I) -> TransformResult<Self>
    where
        I: IntoIterator<Item = (P, C)>,
        P: Into<String>,
        C: Into<String>,
    {
        let name = name.into();
        let join: IndexMap<String, String> = join
            .into_iter()
            .map(|(parent, child)| (parent.into(), child.into()))
            .collect();
        if join.is_empty() {
            return Err(TransformError::NoJoinFields(name));
        }
        Ok(Self {
            name,
            model: Box::new(model),
            join,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn model_mut(&mut self) -> &mut Model {
        &mut self.model
    }

    pub fn join(&self) -> &IndexMap<String, String> {
        &self.join
    }

    pub fn is_single_join(&self) -> bool {
        self.join.len() == 1
    }

    /// Composite key of a parent row; `None` when a join value is unset.
    pub fn parent_key(&self, row: &Row) -> Option<String> {
        join_key(row, self.join.keys())
    }

    /// Composite key of a child row, comparable with [`Self::parent_key`].
    pub fn child_key(&self, row: &Row) -> Option<String> {
        join_key(row, self.join.values())
    }

    /// Filter selecting the children of one parent row.
    pub fn child_filter(&self, parent: &Row) -> Option<Filter> {
        let mut filter = Filter::new();
        for (parent_field, child_field) in &self.join {
            let value = parent.get(parent_field).filter(|v| !v.is_empty())?;
            filter = filter.eq(child_field.as_str(), value.clone());
        }
        Some(filter)
    }

    /// Filter selecting the children of every given parent row in one load.
    pub fn batch_filter(&self, parents: &[Row]) -> Filter {
        if let Some((parent_field, child_field)) = self.join.first().filter(|_| self.is_single_join()) {
            let mut values: Vec<Value> = Vec::new();
            for row in parents {
                if let Some(value) = row.get(parent_field).filter(|v| !v.is_empty()) {
                    if !values.iter().any(|v| v.loose_eq(value)) {
                        values.push(value.clone());
                    }
                }
            }
            return Filter::new().one_of(child_field.as_str(), values);
        }

        let alternatives = parents
            .iter()
            .filter_map(|row| self.child_filter(row))
            .map(|filter| Condition::Group(filter.into_conditions()))
            .collect();
        Filter::new().group(alternatives)
    }

    /// Copy the parent's join values into a child row.
    pub fn set_join_values(&self, parent: &Row, child: &mut Row) {
        for (parent_field, child_field) in &self.join {
            let value = parent.get(parent_field).cloned().unwrap_or_default();
            child.insert(child_field.clone(), value);
        }
    }

    /// Settings declaring the embedded field on the parent.
    pub fn child_field_settings(&self) -> Settings {
        let mut settings = Settings::new();
        settings.insert(TYPE.to_string(), Setting::from(Value::from(BaseType::ChildModel)));
        settings
    }
}

/// Composite key of the values of `fields`; `None` when any is unset.
pub fn join_key<'a>(row: &Row, fields: impl Iterator<Item = &'a String>) -> Option<String> {
    let mut parts = Vec::new();
    for field in fields {
        let value = row.get(field).filter(|v| !v.is_empty())?;
        parts.push(value.to_text());
    }
    Some(parts.join(JOIN_KEY_DELIMITER))
}

/// Rows held under `field`: a list of maps, or nothing for null.
pub fn nested_rows(field: &str, value: Option<Value>) -> TransformResult<Vec<Row>> {
    match value {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::List(items)) => items
            .into_iter()
            .map(|item| match item {
                Value::Map(row) => Ok(row),
                other => Err(TransformError::NotRowList {
                    field: field.to_string(),
                    found: other.to_text(),
                }),
            })
            .collect(),
        Some(other) => Err(TransformError::NotRowList {
            field: field.to_string(),
            found: other.to_text(),
        }),
    }
}

/// Wrap rows as a list value.
pub fn rows_value(rows: Vec<Row>) -> Value {
    Value::List(rows.into_iter().map(Value::Map).collect())
}
