//! Child rows embedded under a field of each parent row.

use indexmap::IndexMap;

use super::{nested_rows, rows_value, ModelTransformer, SubModelLink};
use crate::error::{ModelResult, TransformResult};
use crate::filter::{Filter, Sort};
use crate::meta::{MetaModel, Settings};
use crate::model::Model;
use crate::value::{Row, Value};

/// Loads the children of each parent row with its own filtered load, and
/// saves every embedded child after the parent. Children missing from the
/// saved list are left alone.
#[derive(Debug)]
pub struct NestedTransformer {
    link: SubModelLink,
    changed: usize,
}

impl NestedTransformer {
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
}

impl ModelTransformer for NestedTransformer {
    fn field_info(&self, _parent: &MetaModel) -> IndexMap<String, Settings> {
        IndexMap::from([(self.link.name().to_string(), self.link.child_field_settings())])
    }

    fn transform_load(
        &mut self,
        _parent: &MetaModel,
        mut rows: Vec<Row>,
        is_new: bool,
        _is_post: bool,
    ) -> ModelResult<Vec<Row>> {
        for row in rows.iter_mut() {
            let children = match self.link.child_filter(row).filter(|_| !is_new) {
                Some(filter) => self.link.model_mut().load(&filter, &Sort::new())?,
                None => Vec::new(),
            };
            row.insert(self.link.name().to_string(), rows_value(children));
        }
        Ok(rows)
    }

    fn transform_row_after_save(&mut self, _parent: &MetaModel, mut row: Row) -> ModelResult<Row> {
        let name = self.link.name().to_string();
        let Some(value) = row.shift_remove(&name) else {
            return Ok(row);
        };
        if value.is_null() {
            row.insert(name, Value::Null);
            return Ok(row);
        }

        let before = self.link.model().changed();
        let mut saved = Vec::new();
        for mut child in nested_rows(&name, Some(value))? {
            self.link.set_join_values(&row, &mut child);
            saved.push(self.link.model_mut().save(child, &Filter::new())?);
        }
        self.changed += self.link.model().changed() - before;

        row.insert(name, rows_value(saved));
        Ok(row)
    }

    fn take_changed(&mut self) -> usize {
        std::mem::take(&mut self.changed)
    }
}
