//! One child row flattened into each parent row.

use indexmap::IndexMap;
use once_cell::unsync::OnceCell;

use super::{ModelTransformer, SubModelLink};
use crate::error::{ModelResult, TransformResult};
use crate::filter::{Filter, Sort};
use crate::meta::setting::{NO_SAVE, ON_LOAD, ON_SAVE, ORDER};
use crate::meta::{MetaModel, Setting, Settings};
use crate::model::Model;
use crate::value::{Row, Value};

/// Merges the matching child row into its parent. Only child fields the
/// parent does not have are contributed; parents without a child get null
/// child fields.
///
/// With a single join field the children are loaded in one batch, otherwise
/// one load runs per parent row. Child fields are declared on the parent as
/// `no_save` and written back through the child model after the parent save.
#[derive(Debug)]
pub struct JoinTransformer {
    link: SubModelLink,
    contributed: OnceCell<Vec<String>>,
    changed: usize,
}

impl JoinTransformer {
    pub fn new<I, P, C>(name: impl Into<String>, model: Model, join: I) -> TransformResult<Self>
    where
        I: IntoIterator<Item = (P, C)>,
        P: Into<String>,
        C: Into<String>,
    {
        Ok(Self::from_link(SubModelLink::new(name, model, join)?))
    }

    pub fn from_link(link: SubModelLink) -> Self {
        Self {
            link,
            contributed: OnceCell::new(),
            changed: 0,
        }
    }

    pub fn link(&self) -> &SubModelLink {
        &self.link
    }

    /// Child field names merged into parents, in child order.
    fn child_fields(&self) -> Vec<String> {
        let meta = self.link.model().meta();
        meta.items_ordered()
            .into_iter()
            .filter(|name| meta.get_alias(name).is_none())
            .filter(|name| !self.link.join().values().any(|child| child == name))
            .map(str::to_string)
            .collect()
    }

    /// Child fields merged into parent rows. Fixed the first time the
    /// fields are declared on the parent.
    fn contributed(&self, parent: &MetaModel) -> &[String] {
        self.contributed.get_or_init(|| {
            self.child_fields()
                .into_iter()
                .filter(|name| !parent.has(name))
                .collect()
        })
    }

    fn merge(fields: &[String], row: &mut Row, child: Option<&Row>) {
        for field in fields {
            if row.contains_key(field) {
                continue;
            }
            let value = child.and_then(|c| c.get(field)).cloned().unwrap_or(Value::Null);
            row.insert(field.clone(), value);
        }
    }
}

impl ModelTransformer for JoinTransformer {
    fn field_info(&self, parent: &MetaModel) -> IndexMap<String, Settings> {
        let child = self.link.model().meta();
        self.contributed(parent)
            .iter()
            .cloned()
            .map(|name| {
                let mut settings: Settings = child
                    .get_all(&name)
                    .into_iter()
                    .filter(|(key, _)| key != ON_LOAD && key != ON_SAVE && key != ORDER)
                    .collect();
                settings.insert(NO_SAVE.to_string(), Setting::from(true));
                (name, settings)
            })
            .collect()
    }

    fn transform_load(
        &mut self,
        parent: &MetaModel,
        mut rows: Vec<Row>,
        is_new: bool,
        _is_post: bool,
    ) -> ModelResult<Vec<Row>> {
        let fields = self.contributed(parent).to_vec();

        if is_new {
            for row in rows.iter_mut() {
                Self::merge(&fields, row, None);
            }
            return Ok(rows);
        }

        if self.link.is_single_join() {
            let filter = self.link.batch_filter(&rows);
            let children = self.link.model_mut().load(&filter, &Sort::new())?;
            let mut by_key: IndexMap<String, Row> = IndexMap::new();
            for child in children {
                if let Some(key) = self.link.child_key(&child) {
                    by_key.entry(key).or_insert(child);
                }
            }
            for row in rows.iter_mut() {
                let child = self.link.parent_key(row).and_then(|key| by_key.get(&key));
                Self::merge(&fields, row, child);
            }
        } else {
            for row in rows.iter_mut() {
                let child = match self.link.child_filter(row) {
                    Some(filter) => self.link.model_mut().load_first(&filter, &Sort::new())?,
                    None => None,
                };
                Self::merge(&fields, row, child.as_ref());
            }
        }
        Ok(rows)
    }

    fn transform_row_after_save(&mut self, parent: &MetaModel, mut row: Row) -> ModelResult<Row> {
        let fields = self.contributed(parent).to_vec();
        let mut child: Row = fields
            .iter()
            .filter_map(|field| row.get(field).map(|v| (field.clone(), v.clone())))
            .collect();
        if child.values().all(Value::is_null) {
            return Ok(row);
        }
        self.link.set_join_values(&row, &mut child);

        let filter = self.link.child_filter(&row).unwrap_or_default();
        let before = self.link.model().changed();
        let saved = self.link.model_mut().save(child, &filter)?;
        self.changed += self.link.model().changed() - before;

        for field in &fields {
            if let Some(value) = saved.get(field) {
                row.insert(field.clone(), value.clone());
            }
        }
        Ok(row)
    }

    fn take_changed(&mut self) -> usize {
        std::mem::take(&mut self.changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{ArrayStorage, Storage};
    use crate::transform::one_to_many::tests::{composite_child, composite_parent};
    use crate::value::rows_from_json;
    use serde_json::json;

    fn model() -> Model {
        let mut meta = MetaModel::new("works");
        meta.ensure("id");
        meta.ensure("title");
        meta.set_keys(&["id"]);
        let works = ArrayStorage::from_json(
            "works",
            json!([
                { "id": 1, "title": "Alpha" },
                { "id": 2, "title": "Beta" }
            ]),
        );

        let mut detail_meta = MetaModel::new("details");
        detail_meta.ensure("work_id");
        detail_meta.set_one("genre", "label", "Genre");
        detail_meta.ensure("year");
        detail_meta.set_keys(&["work_id"]);
        let details = ArrayStorage::from_json("details", json!([{ "work_id": 1, "genre": "jazz", "year": 1959 }]));
        let detail = Model::new(detail_meta, Box::new(details));

        meta.add_transformer(Box::new(JoinTransformer::new("details", detail, [("id", "work_id")]).unwrap()));
        Model::new(meta, Box::new(works))
    }

    #[test]
    fn test_child_fields_declared_on_parent() {
        let model = model();
        assert!(model.meta().is("genre", "label", "Genre"));
        assert!(model.meta().is("genre", NO_SAVE, true));
        assert!(!model.meta().has("work_id"));
        assert_eq!(model.meta().storable_names(), vec!["id", "title"]);
    }

    #[test]
    fn test_missing_child_fills_nulls() {
        let mut model = model();
        let rows = model.load_all().unwrap();
        assert_eq!(rows[0]["genre"], Value::from("jazz"));
        assert_eq!(rows[0]["year"], Value::Int(1959));
        assert_eq!(rows[1]["genre"], Value::Null);
        let keys: Vec<&str> = rows[1].keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["id", "title", "genre", "year"]);
    }

    #[test]
    fn test_save_writes_child_part() {
        let mut model = model();
        let mut row = model.load_first(&Filter::new().eq("id", 2), &Sort::new()).unwrap().unwrap();
        row.insert("genre".into(), Value::from("pop"));
        model.save(row, &Filter::new()).unwrap();
        assert_eq!(model.changed(), 1);

        let reloaded = model.load_first(&Filter::new().eq("id", 2), &Sort::new()).unwrap().unwrap();
        assert_eq!(reloaded["genre"], Value::from("pop"));
        assert_eq!(reloaded["title"], Value::from("Beta"));
    }

    #[test]
    fn test_save_keeps_child_key_shared_with_parent() {
        let mut parent = MetaModel::new("works");
        parent.ensure("id");
        parent.set_keys(&["id"]);

        let mut detail_meta = MetaModel::new("details");
        detail_meta.ensure("id");
        detail_meta.ensure("work_id");
        detail_meta.ensure("genre");
        detail_meta.set_keys(&["id"]);
        let details = ArrayStorage::from_json("details", json!([{ "id": 10, "work_id": 1, "genre": "jazz" }]));
        let detail = Model::new(detail_meta, Box::new(details));

        let mut join = JoinTransformer::new("details", detail, [("id", "work_id")]).unwrap();
        let declared: Vec<String> = join.field_info(&parent).into_keys().collect();
        assert_eq!(declared, vec!["genre"]);

        let rows = join
            .transform_load(&parent, rows_from_json(json!([{ "id": 1 }])), false, false)
            .unwrap();
        assert_eq!(rows[0]["genre"], Value::from("jazz"));

        let mut row = rows[0].clone();
        row.insert("genre".into(), Value::from("bop"));
        join.transform_row_after_save(&parent, row).unwrap();
        assert_eq!(join.take_changed(), 1);

        let stored = join.link().model().storage().load(&Filter::new(), &Sort::new()).unwrap();
        assert_eq!(stored, rows_from_json(json!([{ "id": 10, "work_id": 1, "genre": "bop" }])));
    }

    #[test]
    fn test_composite_join_loads_per_row() {
        let (mut meta, storage) = composite_parent();
        let join = JoinTransformer::new("notes", composite_child(), [("pa", "a"), ("pb", "b")]).unwrap();
        assert!(!join.link().is_single_join());
        meta.add_transformer(Box::new(join));
        let mut model = Model::new(meta, Box::new(storage));

        let rows = model.load_all().unwrap();
        assert_eq!(rows[0]["nid"], Value::Int(1));
        assert_eq!(rows[0]["text"], Value::from("one-x"));
        assert_eq!(rows[1]["text"], Value::from("one-y"));
        assert_eq!(rows[2]["nid"], Value::Null);
        assert_eq!(rows[2]["text"], Value::Null);
    }
}
