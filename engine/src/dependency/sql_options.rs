//! Option lists fetched from a lookup and narrowed by linked row values.

use indexmap::{IndexMap, IndexSet};
use std::fmt;

use super::{Changes, Dependency, DependencyBase, Effecteds};
use crate::error::{DependencyError, DependencyResult, StorageResult};
use crate::filter::{Filter, Sort, SortOrder};
use crate::meta::setting::MULTI_OPTIONS;
use crate::meta::MetaModel;
use crate::storage::Storage;
use crate::value::{Map, Row, Value};

/// Source of `key => label` option lists.
pub trait OptionsLookup: fmt::Debug {
    fn options(&self, filter: &Filter) -> StorageResult<Map>;
}

/// Options read from a storage: one entry per row, `key_field => label_field`,
/// ordered by label.
#[derive(Debug)]
pub struct LookupOptions {
    storage: Box<dyn Storage>,
    key_field: String,
    label_field: String,
}

impl LookupOptions {
    pub fn new(storage: Box<dyn Storage>, key_field: impl Into<String>, label_field: impl Into<String>) -> Self {
        Self {
            storage,
            key_field: key_field.into(),
            label_field: label_field.into(),
        }
    }
}

impl OptionsLookup for LookupOptions {
    fn options(&self, filter: &Filter) -> StorageResult<Map> {
        let mut sort = Sort::new();
        sort.insert(self.label_field.clone(), SortOrder::Asc);
        let rows = self.storage.load(filter, &sort)?;
        Ok(rows
            .iter()
            .filter_map(|row| {
                let key = row.get(&self.key_field)?.to_text();
                let label = row.get(&self.label_field).cloned().unwrap_or_default();
                Some((key, label))
            })
            .collect())
    }
}

/// Refills one field's `multiOptions` for every row.
///
/// `links` maps row fields to lookup fields; each non-empty row value
/// narrows the lookup to the matching entries.
#[derive(Debug)]
pub struct SqlOptionsDependency {
    base: DependencyBase,
    field: String,
    links: IndexMap<String, String>,
    lookup: Box<dyn OptionsLookup>,
    empty_label: Option<String>,
}

impl SqlOptionsDependency {
    pub fn new<I, K, V>(field: impl Into<String>, links: I, lookup: Box<dyn OptionsLookup>) -> DependencyResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let field = field.into();
        if field.is_empty() {
            return Err(DependencyError::MissingConfiguration("an options field".to_string()));
        }
        let links: IndexMap<String, String> = links
            .into_iter()
            .map(|(row_field, lookup_field)| (row_field.into(), lookup_field.into()))
            .collect();
        if links.is_empty() {
            return Err(DependencyError::MissingConfiguration(format!(
                "linked fields for options of '{field}'"
            )));
        }

        let mut base = DependencyBase::new(links.keys().cloned());
        base.add_effected(field.clone(), [MULTI_OPTIONS]);
        Ok(Self {
            base,
            field,
            links,
            lookup,
            empty_label: None,
        })
    }

    /// Prepend an empty choice with this label.
    pub fn with_empty_label(mut self, label: impl Into<String>) -> Self {
        self.empty_label = Some(label.into());
        self
    }

    pub fn with_apply_on_change(mut self, enabled: bool) -> Self {
        self.base.set_apply_on_change(enabled);
        self
    }

    fn fetch(&self, filter: &Filter) -> DependencyResult<Value> {
        let mut options = Map::new();
        if let Some(label) = &self.empty_label {
            options.insert(String::new(), Value::from(label.as_str()));
        }
        options.extend(self.lookup.options(filter)?);
        Ok(Value::Map(options))
    }
}

impl Dependency for SqlOptionsDependency {
    fn depends_on(&self) -> &IndexSet<String> {
        self.base.depends_on()
    }

    fn effecteds(&self) -> &Effecteds {
        self.base.effecteds()
    }

    fn apply_on_change(&self) -> bool {
        self.base.apply_on_change()
    }

    fn apply_to_model(&self, meta: &mut MetaModel) -> DependencyResult<()> {
        if self.apply_on_change() {
            for field in self.depends_on() {
                meta.set_one(field, crate::meta::setting::SUBMIT_ON_CHANGE, true);
            }
        }
        meta.set_one(&self.field, MULTI_OPTIONS, self.fetch(&Filter::new())?);
        Ok(())
    }

    fn get_changes(&self, row: &Row, _is_new: bool) -> DependencyResult<Changes> {
        let mut filter = Filter::new();
        for (row_field, lookup_field) in &self.links {
            if let Some(value) = row.get(row_field).filter(|v| !v.is_empty()) {
                filter = filter.eq(lookup_field.as_str(), value.clone());
            }
        }

        let mut changes = Changes::new();
        changes
            .entry(self.field.clone())
            .or_default()
            .insert(MULTI_OPTIONS.to_string(), self.fetch(&filter)?);
        Ok(changes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::ArrayStorage;
    use crate::value::row_from_json;
    use serde_json::json;

    fn cities() -> Box<dyn OptionsLookup> {
        let storage = ArrayStorage::from_json(
            "cities",
            json!([
                { "id": 1, "name": "Lyon", "country": "FR" },
                { "id": 2, "name": "Berlin", "country": "DE" },
                { "id": 3, "name": "Paris", "country": "FR" }
            ]),
        );
        Box::new(LookupOptions::new(Box::new(storage), "id", "name"))
    }

    #[test]
    fn test_apply_fills_all_options() {
        let dep = SqlOptionsDependency::new("city", [("country", "country")], cities()).unwrap();
        let mut meta = MetaModel::new("people");
        meta.add_dependency(Box::new(dep)).unwrap();

        let options = meta.get_value("city", MULTI_OPTIONS).and_then(Value::as_map).unwrap();
        let labels: Vec<String> = options.values().map(Value::to_text).collect();
        assert_eq!(labels, vec!["Berlin", "Lyon", "Paris"]);
        assert!(meta.is("country", "submitOnChange", true));
    }

    #[test]
    fn test_changes_narrow_by_linked_value() {
        let dep = SqlOptionsDependency::new("city", [("country", "country")], cities())
            .unwrap()
            .with_empty_label("-");
        let changes = dep.get_changes(&row_from_json(json!({ "country": "FR" })), false).unwrap();
        let options = changes["city"][MULTI_OPTIONS].as_map().unwrap();
        let keys: Vec<&str> = options.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["", "1", "3"]);
    }

    #[test]
    fn test_requires_links() {
        let err = SqlOptionsDependency::new("city", Vec::<(String, String)>::new(), cities()).unwrap_err();
        assert!(matches!(err, DependencyError::MissingConfiguration(_)));
    }
}
