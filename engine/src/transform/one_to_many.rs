//! Batched one-to-many embedding with diffing saves.
//!
//! Loading collects the join values of all parent rows, loads the children
//! once and buckets them by composite join key. Saving compares the embedded
//! children with the ones currently stored for the parent:
//!
//! - in both: saved as an update
//! - only embedded: inserted
//! - only stored: deleted
//!
//! Child identity is the JSON text of the child's key fields, sorted by
//! field name. A child model without keys is identified by all its values.

use indexmap::IndexMap;
use std::collections::BTreeMap;

use super::{nested_rows, rows_value, ModelTransformer, SubModelLink};
use crate::error::{ModelResult, TransformResult};
use crate::filter::{Filter, Sort};
use crate::meta::{MetaModel, Settings};
use crate::model::Model;
use crate::storage::key_filter;
use crate::value::Row;

#[derive(Debug)]
pub struct OneToManyTransformer {
    link: SubModelLink,
    changed: usize,
}

impl OneToManyTransformer {
    pub fn new<I, P, C>(name: impl Into<String>, model: Model, join: I) -> TransformResult<Self>
    where
        I: IntoIterator<Item = (P, C)>,
        P: Into<String>,
        C: Into<String>,
    {
        Ok(Self::from_link(SubModelLink::new(name, model, join)?))
    }

    pub fn from_link(link: SubModelLink) -> Self {
        Self { link, changed: 0 }
    }

    pub fn link(&self) -> &SubModelLink {
        &self.link
    }

    pub fn link_mut(&mut self) -> &mut SubModelLink {
        &mut self.link
    }

    fn child_keys(&self) -> Vec<String> {
        self.link
            .model()
            .meta()
            .keys()
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    /// Diff identity of a child row; `None` for a child without key values.
    fn identity(keys: &[String], row: &Row) -> Option<String> {
        let projection: BTreeMap<&str, String> = if keys.is_empty() {
            row.iter().map(|(k, v)| (k.as_str(), v.to_text())).collect()
        } else {
            let mut projection = BTreeMap::new();
            for key in keys {
                let value = row.get(key).filter(|v| !v.is_empty())?;
                projection.insert(key.as_str(), value.to_text());
            }
            projection
        };
        serde_json::to_string(&projection).ok()
    }

    /// Bucket loaded children under each parent row.
    pub(super) fn embed(&mut self, mut rows: Vec<Row>, is_new: bool) -> ModelResult<Vec<Row>> {
        let name = self.link.name().to_string();
        if is_new {
            for row in rows.iter_mut() {
                row.insert(name.clone(), rows_value(Vec::new()));
            }
            return Ok(rows);
        }

        let filter = self.link.batch_filter(&rows);
        let children = if filter.fields().is_empty() {
            Vec::new()
        } else {
            self.link.model_mut().load(&filter, &Sort::new())?
        };

        let mut buckets: IndexMap<String, Vec<Row>> = IndexMap::new();
        for child in children {
            if let Some(key) = self.link.child_key(&child) {
                buckets.entry(key).or_default().push(child);
            }
        }
        log::trace!("'{}': {} child buckets for {} rows", name, buckets.len(), rows.len());

        for row in rows.iter_mut() {
            let children = self
                .link
                .parent_key(row)
                .and_then(|key| buckets.get(&key).cloned())
                .unwrap_or_default();
            row.insert(name.clone(), rows_value(children));
        }
        Ok(rows)
    }
}

impl ModelTransformer for OneToManyTransformer {
    fn field_info(&self, _parent: &MetaModel) -> IndexMap<String, Settings> {
        IndexMap::from([(self.link.name().to_string(), self.link.child_field_settings())])
    }

    fn transform_load(
        &mut self,
        _parent: &MetaModel,
        rows: Vec<Row>,
        is_new: bool,
        _is_post: bool,
    ) -> ModelResult<Vec<Row>> {
        self.embed(rows, is_new)
    }

    fn transform_row_after_save(&mut self, _parent: &MetaModel, mut row: Row) -> ModelResult<Row> {
        let name = self.link.name().to_string();
        let Some(value) = row.shift_remove(&name) else {
            return Ok(row);
        };
        let Some(filter) = self.link.child_filter(&row) else {
            row.insert(name, value);
            return Ok(row);
        };

        let keys = self.child_keys();
        let stored = self.link.model_mut().load(&filter, &Sort::new())?;
        let mut stale: IndexMap<String, Row> = stored
            .into_iter()
            .filter_map(|child| Self::identity(&keys, &child).map(|id| (id, child)))
            .collect();

        let before = self.link.model().changed();
        let mut saved = Vec::new();
        for mut child in nested_rows(&name, Some(value))? {
            self.link.set_join_values(&row, &mut child);
            if let Some(id) = Self::identity(&keys, &child) {
                stale.shift_remove(&id);
            }
            saved.push(self.link.model_mut().save(child, &Filter::new())?);
        }

        for (_, child) in stale {
            let selector = key_filter(&child, &keys).unwrap_or_else(|| {
                child
                    .iter()
                    .fold(Filter::new(), |filter, (field, value)| filter.eq(field.as_str(), value.clone()))
            });
            self.link.model_mut().delete(&selector)?;
        }
        self.changed += self.link.model().changed() - before;

        row.insert(name, rows_value(saved));
        Ok(row)
    }

    fn take_changed(&mut self) -> usize {
        std::mem::take(&mut self.changed)
    }
}
