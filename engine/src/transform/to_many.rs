//! One-to-many embedding that also lets parent loads filter on child fields.
//!
//! A parent filter condition on a field the child model owns (and the parent
//! does not) is evaluated against the child model first. The matching
//! children's join values then replace it as a membership condition on the
//! parent's join fields. Sort keys on child fields are dropped.

use indexmap::IndexMap;

use super::{ModelTransformer, OneToManyTransformer, SubModelLink};
use crate::error::{ModelResult, TransformResult};
use crate::filter::{Condition, Filter, Sort};
use crate::meta::{MetaModel, Settings};
use crate::model::Model;
use crate::value::{Row, Value};

#[derive(Debug)]
pub struct ToManyTransformer {
    inner: OneToManyTransformer,
}

impl ToManyTransformer {
    pub fn new<I, P, C>(name: impl Into<String>, model: Model, join: I) -> TransformResult<Self>
    where
        I: IntoIterator<Item = (P, C)>,
        P: Into<String>,
        C: Into<String>,
    {
        Ok(Self {
            inner: OneToManyTransformer::new(name, model, join)?,
        })
    }

    pub fn from_link(link: SubModelLink) -> Self {
        Self {
            inner: OneToManyTransformer::from_link(link),
        }
    }

    pub fn link(&self) -> &SubModelLink {
        self.inner.link()
    }

    fn is_child_field(&self, parent: &MetaModel, field: &str) -> bool {
        !parent.has(field) && self.link().model().meta().has(field)
    }

    /// Parent condition equivalent to the child filter.
    fn pushdown(&mut self, child_filter: &Filter) -> ModelResult<Condition> {
        let link = self.inner.link_mut();
        let children = link.model_mut().load(child_filter, &Sort::new())?;
        let join: Vec<(String, String)> = link
            .join()
            .iter()
            .map(|(p, c)| (p.clone(), c.clone()))
            .collect();

        if let [(parent_field, child_field)] = join.as_slice() {
            let mut values: Vec<Value> = Vec::new();
            for child in &children {
                if let Some(value) = child.get(child_field).filter(|v| !v.is_empty()) {
                    if !values.iter().any(|v| v.loose_eq(value)) {
                        values.push(value.clone());
                    }
                }
            }
            return Ok(Condition::Field {
                field: parent_field.clone(),
                test: crate::filter::FieldTest::OneOf(values),
            });
        }

        let alternatives: Vec<Condition> = children
            .iter()
            .filter_map(|child| {
                let mut conditions = Vec::new();
                for (parent_field, child_field) in &join {
                    let value = child.get(child_field).filter(|v| !v.is_empty())?;
                    conditions.push(Condition::Field {
                        field: parent_field.clone(),
                        test: crate::filter::FieldTest::Equals(value.clone()),
                    });
                }
                Some(Condition::Group(conditions))
            })
            .collect();
        if alternatives.is_empty() {
            // an empty membership matches nothing
            return Ok(Condition::Field {
                field: join[0].0.clone(),
                test: crate::filter::FieldTest::OneOf(Vec::new()),
            });
        }
        Ok(Condition::Group(alternatives))
    }
}

impl ModelTransformer for ToManyTransformer {
    fn field_info(&self, parent: &MetaModel) -> IndexMap<String, Settings> {
        self.inner.field_info(parent)
    }

    fn transform_filter(&mut self, parent: &MetaModel, filter: Filter) -> ModelResult<Filter> {
        let (child_filter, mut rest) = filter.partition(|field| self.is_child_field(parent, field));
        if child_filter.is_empty() {
            return Ok(rest);
        }
        log::debug!(
            "'{}': pushing [{}] down to the child model",
            self.link().name(),
            child_filter.fields().join(", ")
        );
        rest.push(self.pushdown(&child_filter)?);
        Ok(rest)
    }

    fn transform_sort(&mut self, parent: &MetaModel, sort: Sort) -> Sort {
        sort.into_iter()
            .filter(|(field, _)| !self.is_child_field(parent, field))
            .collect()
    }

    fn transform_load(
        &mut self,
        parent: &MetaModel,
        rows: Vec<Row>,
        is_new: bool,
        is_post: bool,
    ) -> ModelResult<Vec<Row>> {
        self.inner.transform_load(parent, rows, is_new, is_post)
    }

    fn transform_row_after_save(&mut self, parent: &MetaModel, row: Row) -> ModelResult<Row> {
        self.inner.transform_row_after_save(parent, row)
    }

    fn take_changed(&mut self) -> usize {
        self.inner.take_changed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::SortOrder;
    use crate::transform::one_to_many::tests::{
        child_model, composite_child, composite_parent, parent_meta, parent_storage,
    };
    use serde_json::json;

    fn model() -> Model {
        let mut meta = parent_meta();
        let transformer = ToManyTransformer::new("lines", child_model(), [("id", "parent_id")]).unwrap();
        meta.add_transformer(Box::new(transformer));
        Model::new(meta, Box::new(parent_storage()))
    }

    #[test]
    fn test_child_condition_filters_parents() {
        let mut model = model();
        let filter = Filter::from_json(&json!({ "qty": { "min": 6 } })).unwrap();
        let rows = model.load(&filter, &Sort::new()).unwrap();
        let ids: Vec<String> = rows.iter().map(|r| r["id"].to_text()).collect();
        assert_eq!(ids, vec!["1", "2"]);
    }

    #[test]
    fn test_parent_conditions_untouched() {
        let mut model = model();
        let filter = Filter::new().eq("customer", "bob").eq("qty", 9);
        let rows = model.load(&filter, &Sort::new()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["id"], Value::Int(2));
    }

    #[test]
    fn test_no_child_match_gives_no_parents() {
        let mut model = model();
        let rows = model.load(&Filter::new().eq("qty", 1000), &Sort::new()).unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn test_child_sort_keys_are_stripped() {
        let mut model = model();
        let mut sort = Sort::new();
        sort.insert("qty".into(), SortOrder::Desc);
        sort.insert("id".into(), SortOrder::Desc);
        let rows = model.load(&Filter::new(), &sort).unwrap();
        assert_eq!(rows[0]["id"], Value::Int(3));
    }

    #[test]
    fn test_composite_pushdown_matches_whole_pairs() {
        let (mut meta, storage) = composite_parent();
        let transformer = ToManyTransformer::new("notes", composite_child(), [("pa", "a"), ("pb", "b")]).unwrap();
        meta.add_transformer(Box::new(transformer));
        let mut model = Model::new(meta, Box::new(storage));

        let rows = model.load(&Filter::new().like("text", "ONE"), &Sort::new()).unwrap();
        let cells: Vec<String> = rows.iter().map(|r| format!("{}{}", r["pa"].to_text(), r["pb"].to_text())).collect();
        assert_eq!(cells, vec!["1x", "1y"]);

        // (2, x) exists only on the child side; pa = 2 and pb = x never meet in one parent
        let rows = model.load(&Filter::new().eq("text", "two-x"), &Sort::new()).unwrap();
        assert!(rows.is_empty());
    }
}
