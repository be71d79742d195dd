//! The metadata store: field name to settings, plus the load/save pipeline.
//!
//! A [`MetaModel`] is created once per logical model (table, file, combined
//! query) and lives as long as that model. Type handlers, dependencies and
//! calling code keep mutating its settings; dependencies and transformers
//! are registered during setup and only read afterwards.
//!
//! # Pipeline
//!
//! ```text
//! storage rows ─▶ onLoad converters ─▶ dependencies ─▶ transformers ─▶ caller
//! caller row   ─▶ before-save hooks ─▶ onSave converters ─▶ storage
//!              ─▶ after-save hooks  ─▶ onLoad converters ─▶ caller
//! ```

pub mod base_type;
pub mod setting;

use indexmap::{IndexMap, IndexSet};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;

use crate::dependency::Dependency;
use crate::error::{DependencyError, DependencyResult, MetaModelError, MetaResult, ModelResult};
use crate::filter::{Filter, Sort};
use crate::transform::ModelTransformer;
use crate::value::{Row, Value};

pub use base_type::BaseType;
pub use setting::{settings_from_json, FieldContext, FieldFn, Setting, Settings};

use setting::{ALIAS_OF, DEFAULT, KEY, NO_SAVE, ON_LOAD, ON_SAVE, ORDER, TYPE, VALUE};

/// Default increment between implicit item orders.
pub const DEFAULT_ORDER_STEP: i64 = 10;

/// Field metadata store for one model.
pub struct MetaModel {
    name: String,
    items: IndexMap<String, Settings>,
    order_step: i64,
    track_usage: bool,
    used: RefCell<IndexSet<String>>,
    type_defaults: HashMap<BaseType, Settings>,
    dependencies: Vec<Box<dyn Dependency>>,
    transformers: Vec<Box<dyn ModelTransformer>>,
}

impl fmt::Debug for MetaModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetaModel")
            .field("name", &self.name)
            .field("items", &self.items.keys().collect::<Vec<_>>())
            .field("dependencies", &self.dependencies)
            .field("transformers", &self.transformers)
            .finish()
    }
}

impl MetaModel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            items: IndexMap::new(),
            order_step: DEFAULT_ORDER_STEP,
            track_usage: false,
            used: RefCell::new(IndexSet::new()),
            type_defaults: HashMap::new(),
            dependencies: Vec::new(),
            transformers: Vec::new(),
        }
    }

    /// Use a different increment for implicit item orders.
    pub fn with_order_step(mut self, step: i64) -> Self {
        self.order_step = step.max(1);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn order_step(&self) -> i64 {
        self.order_step
    }

    // -------------------------------------------------------------------------
    // Writing settings
    // -------------------------------------------------------------------------

    /// Merge settings into an item, creating it if needed.
    ///
    /// A `null` value removes the setting. Setting `type` injects the
    /// registered defaults for that base type without overwriting existing
    /// settings.
    pub fn set<I, K, V>(&mut self, name: &str, settings: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Setting>,
    {
        let next_order = self.next_order();
        let item = self.items.entry(name.to_string()).or_default();
        let mut new_type = None;

        for (key, setting) in settings {
            let key = key.into();
            let setting = setting.into();
            if key == TYPE {
                new_type = setting
                    .as_value()
                    .and_then(Value::as_i64)
                    .and_then(BaseType::from_code);
            }
            if setting.is_null() {
                item.shift_remove(&key);
            } else {
                item.insert(key, setting);
            }
        }

        if !item.contains_key(ORDER) {
            item.insert(ORDER.to_string(), Setting::Value(Value::Int(next_order)));
        }

        if let Some(defaults) = new_type.and_then(|t| self.type_defaults.get(&t)) {
            for (key, setting) in defaults {
                if !item.contains_key(key) {
                    item.insert(key.clone(), setting.clone());
                }
            }
        }
    }

    /// Set a single setting.
    pub fn set_one(&mut self, name: &str, key: impl Into<String>, value: impl Into<Setting>) {
        self.set(name, [(key.into(), value.into())]);
    }

    /// Make sure an item exists without changing its settings.
    pub fn ensure(&mut self, name: &str) {
        self.set(name, std::iter::empty::<(String, Setting)>());
    }

    /// Append a value to a list setting; a scalar setting becomes a list.
    pub fn append_to(&mut self, name: &str, key: &str, value: impl Into<Value>) -> MetaResult<()> {
        let value = value.into();
        let list = match self.own(name, key) {
            None => vec![value],
            Some(Setting::Value(Value::List(existing))) => {
                let mut list = existing.clone();
                list.push(value);
                list
            }
            Some(Setting::Value(existing)) => vec![existing.clone(), value],
            Some(Setting::Function(_)) => {
                return Err(MetaModelError::SettingShape {
                    field: name.to_string(),
                    setting: key.to_string(),
                    message: "a function setting cannot be appended to".to_string(),
                })
            }
        };
        self.set_one(name, key, Value::List(list));
        Ok(())
    }

    /// Set an entry of a map setting; a missing or null setting becomes a map.
    pub fn set_subkey(
        &mut self,
        name: &str,
        key: &str,
        subkey: impl Into<String>,
        value: impl Into<Value>,
    ) -> MetaResult<()> {
        let mut map = match self.own(name, key) {
            None => IndexMap::new(),
            Some(Setting::Value(Value::Map(existing))) => existing.clone(),
            Some(_) => {
                return Err(MetaModelError::SettingShape {
                    field: name.to_string(),
                    setting: key.to_string(),
                    message: "not a keyed map".to_string(),
                })
            }
        };
        map.insert(subkey.into(), value.into());
        self.set_one(name, key, Value::Map(map));
        Ok(())
    }

    /// Make `alias` defer unset lookups to `target`.
    pub fn set_alias(&mut self, alias: &str, target: &str) {
        self.set_one(alias, ALIAS_OF, target);
    }

    /// Settings injected whenever an item's `type` is set to `base`.
    pub fn set_type_defaults(&mut self, base: BaseType, settings: Settings) {
        self.type_defaults.insert(base, settings);
    }

    /// Remove one setting, returning it.
    pub fn del(&mut self, name: &str, key: &str) -> Option<Setting> {
        self.items.get_mut(name)?.shift_remove(key)
    }

    /// Remove an item entirely.
    pub fn remove(&mut self, name: &str) -> Option<Settings> {
        self.used.borrow_mut().shift_remove(name);
        self.items.shift_remove(name)
    }

    /// Flag exactly these fields as the model keys.
    pub fn set_keys(&mut self, names: &[&str]) {
        for item in self.items.values_mut() {
            item.shift_remove(KEY);
        }
        for name in names {
            self.set_one(name, KEY, true);
        }
    }

    fn next_order(&self) -> i64 {
        self.items
            .values()
            .filter_map(|item| item.get(ORDER).and_then(Setting::as_value).and_then(Value::as_i64))
            .max()
            .map_or(self.order_step, |max| max.saturating_add(self.order_step))
    }

    // -------------------------------------------------------------------------
    // Reading settings
    // -------------------------------------------------------------------------

    fn own(&self, name: &str, key: &str) -> Option<&Setting> {
        self.items.get(name)?.get(key)
    }

    fn mark_used(&self, name: &str) {
        if self.track_usage {
            self.used.borrow_mut().insert(name.to_string());
        }
    }

    /// All settings of an item, merged over its alias target's settings.
    pub fn get_all(&self, name: &str) -> Settings {
        self.mark_used(name);
        let Some(own) = self.items.get(name) else {
            return Settings::new();
        };
        match self.get_alias(name).and_then(|target| self.items.get(target)) {
            Some(target) => {
                let mut merged = target.clone();
                for (key, setting) in own {
                    merged.insert(key.clone(), setting.clone());
                }
                merged
            }
            None => own.clone(),
        }
    }

    /// A single setting, falling back to the alias target.
    pub fn get(&self, name: &str, key: &str) -> Option<&Setting> {
        self.mark_used(name);
        self.own(name, key).or_else(|| {
            let target = self.get_alias(name)?;
            self.own(target, key)
        })
    }

    /// Several settings at once, omitting the ones that are not set.
    pub fn get_many(&self, name: &str, keys: &[&str]) -> Settings {
        self.mark_used(name);
        keys.iter()
            .filter_map(|key| self.get(name, key).map(|s| (key.to_string(), s.clone())))
            .collect()
    }

    pub fn get_value(&self, name: &str, key: &str) -> Option<&Value> {
        self.get(name, key).and_then(Setting::as_value)
    }

    pub fn get_function(&self, name: &str, key: &str) -> Option<&FieldFn> {
        self.get(name, key).and_then(Setting::as_function)
    }

    pub fn get_text(&self, name: &str, key: &str) -> Option<String> {
        self.get_value(name, key).map(Value::to_text)
    }

    /// Loose check of a setting's value.
    pub fn is(&self, name: &str, key: &str, expected: impl Into<Value>) -> bool {
        let expected = expected.into();
        self.get_value(name, key).is_some_and(|v| v.loose_eq(&expected))
    }

    /// Base type of a field, when its `type` setting holds a known constant.
    pub fn base_type(&self, name: &str) -> Option<BaseType> {
        self.get_value(name, TYPE)
            .and_then(Value::as_i64)
            .and_then(BaseType::from_code)
    }

    pub fn has(&self, name: &str) -> bool {
        self.items.contains_key(name)
    }

    pub fn has_setting(&self, name: &str, key: &str) -> bool {
        self.own(name, key).is_some()
            || self
                .get_alias(name)
                .is_some_and(|target| self.own(target, key).is_some())
    }

    /// Strict lookup for callers that must not continue with a bad name.
    pub fn check_name(&self, name: &str) -> MetaResult<()> {
        if self.has(name) {
            Ok(())
        } else {
            Err(MetaModelError::UnknownField {
                field: name.to_string(),
                model: self.name.clone(),
            })
        }
    }

    /// Alias target of an item, if it is an alias.
    pub fn get_alias(&self, name: &str) -> Option<&str> {
        self.own(name, ALIAS_OF)
            .and_then(Setting::as_value)
            .and_then(Value::as_str)
    }

    /// Item names in insertion order.
    pub fn item_names(&self) -> Vec<&str> {
        self.items.keys().map(String::as_str).collect()
    }

    /// Item names sorted by `order`, ties in insertion order.
    pub fn items_ordered(&self) -> Vec<&str> {
        let mut ordered: Vec<(i64, &str)> = self
            .items
            .iter()
            .map(|(name, item)| {
                let order = item
                    .get(ORDER)
                    .and_then(Setting::as_value)
                    .and_then(Value::as_i64)
                    .unwrap_or(i64::MAX);
                (order, name.as_str())
            })
            .collect();
        ordered.sort_by_key(|(order, _)| *order);
        ordered.into_iter().map(|(_, name)| name).collect()
    }

    /// Ordered names of the items carrying a setting.
    pub fn col_names(&self, key: &str) -> Vec<&str> {
        self.items_ordered()
            .into_iter()
            .filter(|name| self.has_setting(name, key))
            .collect()
    }

    /// Ordered names of the key fields.
    pub fn keys(&self) -> Vec<&str> {
        self.items_ordered()
            .into_iter()
            .filter(|name| self.own(name, KEY).and_then(Setting::as_value).is_some_and(Value::is_truthy))
            .collect()
    }

    /// Fields the storage should persist: no aliases, child models or
    /// fields flagged `no_save`.
    pub fn storable_names(&self) -> Vec<&str> {
        self.items_ordered()
            .into_iter()
            .filter(|name| {
                self.get_alias(name).is_none()
                    && self.base_type(name) != Some(BaseType::ChildModel)
                    && !self.get_value(name, NO_SAVE).is_some_and(Value::is_truthy)
            })
            .collect()
    }

    /// A fresh row: every non-alias item at its `default` setting or null.
    pub fn new_row(&self) -> Row {
        self.items_ordered()
            .into_iter()
            .filter(|name| self.get_alias(name).is_none())
            .map(|name| {
                let value = self
                    .own(name, DEFAULT)
                    .and_then(Setting::as_value)
                    .cloned()
                    .unwrap_or_default();
                (name.to_string(), value)
            })
            .collect()
    }

    // -------------------------------------------------------------------------
    // Usage tracking
    // -------------------------------------------------------------------------

    pub fn track_usage(&mut self, enabled: bool) {
        self.track_usage = enabled;
    }

    pub fn is_tracking_usage(&self) -> bool {
        self.track_usage
    }

    /// Names read through `get*` since tracking started, in first-read order.
    pub fn used_items(&self) -> Vec<String> {
        self.used.borrow().iter().cloned().collect()
    }

    pub fn clear_used(&self) {
        self.used.borrow_mut().clear();
    }

    // -------------------------------------------------------------------------
    // Dependencies
    // -------------------------------------------------------------------------

    /// Attach a dependency; it may prepare settings of the fields it touches.
    pub fn add_dependency(&mut self, dependency: Box<dyn Dependency>) -> DependencyResult<()> {
        dependency.apply_to_model(self)?;
        log::debug!(
            "model '{}': dependency on [{}]",
            self.name,
            dependency.depends_on().iter().cloned().collect::<Vec<_>>().join(", ")
        );
        self.dependencies.push(dependency);
        Ok(())
    }

    pub fn dependencies(&self) -> &[Box<dyn Dependency>] {
        &self.dependencies
    }

    pub fn has_dependencies(&self) -> bool {
        !self.dependencies.is_empty()
    }

    /// Evaluate every dependency against `row` and merge the changes into
    /// the live settings. Later dependencies win on conflicting settings.
    pub fn process_dependencies(&mut self, row: &mut Row, is_new: bool) -> DependencyResult<()> {
        let mut pending: Vec<(String, String, Value)> = Vec::new();

        for dependency in &self.dependencies {
            let changes = dependency.get_changes(row, is_new)?;
            let effecteds = dependency.effecteds();

            for (field, settings) in changes {
                for (setting, value) in settings {
                    let declared = effecteds
                        .get(&field)
                        .is_some_and(|names| names.contains(&setting));
                    if !declared {
                        return Err(DependencyError::UndeclaredChange { field, setting });
                    }
                    if setting == VALUE {
                        row.insert(field.clone(), value);
                    } else {
                        pending.push((field.clone(), setting, value));
                    }
                }
            }
        }

        for (field, setting, value) in pending {
            self.set_one(&field, setting, value);
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Transformers
    // -------------------------------------------------------------------------

    /// Attach a transformer, declaring the fields it adds.
    pub fn add_transformer(&mut self, transformer: Box<dyn ModelTransformer>) {
        for (name, settings) in transformer.field_info(self) {
            self.set(&name, settings);
        }
        log::debug!("model '{}': transformer {:?}", self.name, transformer);
        self.transformers.push(transformer);
    }

    pub fn transformers(&self) -> &[Box<dyn ModelTransformer>] {
        &self.transformers
    }

    pub fn has_transformers(&self) -> bool {
        !self.transformers.is_empty()
    }

    /// Run `f` with the transformer list detached from the model, so each
    /// transformer can read the parent metadata. Nothing can be registered
    /// while the list is detached.
    fn with_transformers<T>(
        &mut self,
        f: impl FnOnce(&mut [Box<dyn ModelTransformer>], &MetaModel) -> T,
    ) -> T {
        let mut transformers = std::mem::take(&mut self.transformers);
        let result = f(&mut transformers, self);
        self.transformers = transformers;
        result
    }

    /// Let transformers rewrite a filter before the storage sees it.
    pub fn transform_filter(&mut self, filter: Filter) -> ModelResult<Filter> {
        self.with_transformers(|transformers, meta| {
            transformers
                .iter_mut()
                .try_fold(filter, |filter, t| t.transform_filter(meta, filter))
        })
    }

    /// Let transformers rewrite a sort before the storage sees it.
    pub fn transform_sort(&mut self, sort: Sort) -> Sort {
        self.with_transformers(|transformers, meta| {
            transformers
                .iter_mut()
                .fold(sort, |sort, t| t.transform_sort(meta, sort))
        })
    }

    /// Thread a row through every transformer's before-save hook.
    pub fn transform_row_before_save(&mut self, row: Row) -> ModelResult<Row> {
        self.with_transformers(|transformers, meta| {
            transformers
                .iter_mut()
                .try_fold(row, |row, t| t.transform_row_before_save(meta, row))
        })
    }

    /// Thread a saved row through every after-save hook; returns the row and
    /// the number of sub rows the hooks changed.
    pub fn transform_row_after_save(&mut self, row: Row) -> ModelResult<(Row, usize)> {
        self.with_transformers(|transformers, meta| {
            let mut row = row;
            let mut changed = 0;
            for transformer in transformers.iter_mut() {
                row = transformer.transform_row_after_save(meta, row)?;
                changed += transformer.take_changed();
            }
            Ok((row, changed))
        })
    }

    // -------------------------------------------------------------------------
    // Row pipeline
    // -------------------------------------------------------------------------

    fn apply_converters(&self, mut row: Row, key: &str, is_new: bool, is_post: bool) -> Row {
        for name in self.col_names(key) {
            let (Some(function), Some(value)) = (self.get_function(name, key), row.get(name)) else {
                continue;
            };
            let context = FieldContext {
                name,
                row: &row,
                is_new,
                is_post,
            };
            let converted = function.call(value, &context);
            row.insert(name.to_string(), converted);
        }
        row
    }

    /// Apply every onLoad converter to the fields present in the row.
    pub fn process_row_on_load(&self, row: Row, is_new: bool, is_post: bool) -> Row {
        self.apply_converters(row, ON_LOAD, is_new, is_post)
    }

    /// Apply every onSave converter to the fields present in the row.
    pub fn process_row_before_save(&self, row: Row, is_new: bool) -> Row {
        self.apply_converters(row, ON_SAVE, is_new, false)
    }

    /// Full after-load pipeline: type converters, dependencies, transformers.
    pub fn process_after_load(&mut self, rows: Vec<Row>, is_new: bool, is_post: bool) -> ModelResult<Vec<Row>> {
        log::trace!("model '{}': processing {} loaded rows", self.name, rows.len());

        let mut rows: Vec<Row> = rows
            .into_iter()
            .map(|row| self.process_row_on_load(row, is_new, is_post))
            .collect();

        if self.has_dependencies() {
            for row in rows.iter_mut() {
                self.process_dependencies(row, is_new)?;
            }
        }

        if self.has_transformers() {
            rows = self.with_transformers(|transformers, meta| {
                transformers
                    .iter_mut()
                    .try_fold(rows, |rows, t| t.transform_load(meta, rows, is_new, is_post))
            })?;
        }

        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn abc() -> MetaModel {
        let mut meta = MetaModel::new("abc");
        meta.set("a", [("label", "A")]);
        meta.set("b", [("label", "B")]);
        meta.set("c", [("label", "C")]);
        meta
    }

    #[test]
    fn test_set_then_get() {
        let mut meta = MetaModel::new("test");
        meta.set_one("name", "label", "Name");
        assert_eq!(meta.get_value("name", "label"), Some(&Value::from("Name")));
        assert_eq!(meta.get_value("name", "missing"), None);
        assert_eq!(meta.get_value("missing", "label"), None);
    }

    #[test]
    fn test_first_set_creates_item_without_settings() {
        let mut meta = MetaModel::new("test");
        meta.ensure("empty");
        assert!(meta.has("empty"));
        assert!(!meta.has_setting("empty", "label"));
    }

    #[test]
    fn test_del_removes_setting() {
        let mut meta = MetaModel::new("test");
        meta.set_one("x", "required", true);
        assert!(meta.has_setting("x", "required"));
        meta.del("x", "required");
        assert!(!meta.has_setting("x", "required"));
        assert!(meta.has("x"));
    }

    #[test]
    fn test_null_value_removes_setting() {
        let mut meta = MetaModel::new("test");
        meta.set_one("x", "readonly", "readonly");
        meta.set_one("x", "readonly", Value::Null);
        assert!(!meta.has_setting("x", "readonly"));
    }

    #[test]
    fn test_items_ordered_follows_first_set() {
        let mut meta = MetaModel::new("test");
        meta.set_one("z", "label", "Z");
        meta.set_one("a", "label", "A");
        meta.set_one("m", "label", "M");
        meta.set_one("z", "label", "Z again");
        assert_eq!(meta.items_ordered(), vec!["z", "a", "m"]);
    }

    #[test]
    fn test_explicit_order_overrides_position() {
        let mut meta = MetaModel::new("test");
        meta.set_one("z", "label", "Z");
        meta.set_one("a", "label", "A");
        meta.set_one("first", "order", 1);
        meta.set_one("z", "order", 100);
        assert_eq!(meta.items_ordered(), vec!["first", "a", "z"]);
    }

    #[test]
    fn test_order_step_is_configurable() {
        let mut meta = MetaModel::new("test").with_order_step(5);
        meta.ensure("a");
        meta.ensure("b");
        assert_eq!(meta.get_value("a", "order"), Some(&Value::Int(5)));
        assert_eq!(meta.get_value("b", "order"), Some(&Value::Int(10)));
    }

    #[test]
    fn test_huge_explicit_order_saturates() {
        let mut meta = MetaModel::new("test");
        meta.set_one("a", "order", i64::MAX);
        meta.ensure("b");
        assert_eq!(meta.get_value("b", "order"), Some(&Value::Int(i64::MAX)));
        assert_eq!(meta.items_ordered(), vec!["a", "b"]);
    }

    #[test]
    fn test_alias_falls_through_to_target() {
        let mut meta = MetaModel::new("test");
        meta.set("b", [("label", "Bee"), ("description", "Target")]);
        meta.set_alias("a", "b");
        meta.set_one("a", "label", "Own");

        assert_eq!(meta.get_alias("a"), Some("b"));
        assert_eq!(meta.get_alias("b"), None);
        assert_eq!(meta.get_value("a", "description"), Some(&Value::from("Target")));
        assert_eq!(meta.get_value("a", "label"), Some(&Value::from("Own")));

        let all = meta.get_all("a");
        assert_eq!(all.get("label").and_then(Setting::as_value), Some(&Value::from("Own")));
        assert_eq!(
            all.get("description").and_then(Setting::as_value),
            Some(&Value::from("Target"))
        );
        assert!(meta.has_setting("a", "description"));
    }

    #[test]
    fn test_get_many_omits_missing() {
        let meta = abc();
        let many = meta.get_many("a", &["label", "nothing"]);
        assert_eq!(many.len(), 1);
        assert!(many.contains_key("label"));
    }

    #[test]
    fn test_usage_tracking() {
        let mut meta = abc();
        meta.get("a", "label");
        assert!(meta.used_items().is_empty());

        meta.track_usage(true);
        meta.get("c", "label");
        meta.get_all("a");
        meta.get_many("c", &["label"]);
        assert_eq!(meta.used_items(), vec!["c".to_string(), "a".to_string()]);

        meta.clear_used();
        assert!(meta.used_items().is_empty());
    }

    #[test]
    fn test_append_and_subkey() {
        let mut meta = MetaModel::new("test");
        meta.append_to("x", "validators", "Digits").unwrap();
        meta.append_to("x", "validators", "Range").unwrap();
        assert_eq!(
            meta.get_value("x", "validators"),
            Some(&Value::List(vec![Value::from("Digits"), Value::from("Range")]))
        );

        meta.set_subkey("x", "multiOptions", "1", "One").unwrap();
        meta.set_subkey("x", "multiOptions", "2", "Two").unwrap();
        let options = meta.get_value("x", "multiOptions").and_then(Value::as_map).unwrap();
        assert_eq!(options.len(), 2);
        assert_eq!(options["2"], Value::from("Two"));

        assert!(meta.set_subkey("x", "validators", "k", "v").is_err());
    }

    #[test]
    fn test_type_defaults_injected() {
        let mut meta = MetaModel::new("test");
        meta.set_type_defaults(
            BaseType::Date,
            settings_from_json(json!({ "size": 10, "label": "Date" })),
        );
        meta.set(
            "when",
            [("label", Setting::from("When")), ("type", Setting::from(Value::from(BaseType::Date)))],
        );
        assert_eq!(meta.get_value("when", "size"), Some(&Value::Int(10)));
        assert_eq!(meta.get_value("when", "label"), Some(&Value::from("When")));
        assert_eq!(meta.base_type("when"), Some(BaseType::Date));
    }

    #[test]
    fn test_keys_and_storable_names() {
        let mut meta = abc();
        meta.set_keys(&["a"]);
        meta.set_one("children", "type", BaseType::ChildModel.code());
        meta.set_one("calc", "no_save", true);
        meta.set_alias("aa", "a");

        assert_eq!(meta.keys(), vec!["a"]);
        assert_eq!(meta.storable_names(), vec!["a", "b", "c"]);
        meta.set_keys(&["b", "c"]);
        assert_eq!(meta.keys(), vec!["b", "c"]);
    }

    #[test]
    fn test_check_name() {
        let meta = abc();
        assert!(meta.check_name("a").is_ok());
        let err = meta.check_name("zz").unwrap_err();
        assert!(err.to_string().contains("zz"));
        assert!(err.to_string().contains("abc"));
    }

    #[test]
    fn test_converters_applied_in_pipeline() {
        let mut meta = abc();
        meta.set_one(
            "a",
            "onLoad",
            FieldFn::new(|value, _| Value::from(value.to_text().to_lowercase())),
        );
        meta.set_one(
            "a",
            "onSave",
            FieldFn::new(|value, _| Value::from(value.to_text().to_uppercase())),
        );

        let rows = vec![crate::value::row_from_json(json!({ "a": "HELLO", "b": 1 }))];
        let loaded = meta.process_after_load(rows, false, false).unwrap();
        assert_eq!(loaded[0]["a"], Value::from("hello"));

        let saved = meta.process_row_before_save(loaded[0].clone(), false);
        assert_eq!(saved["a"], Value::from("HELLO"));
        assert_eq!(saved["b"], Value::Int(1));
    }

    #[test]
    fn test_new_row_uses_defaults() {
        let mut meta = abc();
        meta.set_one("b", "default", 5);
        let row = meta.new_row();
        assert_eq!(row["a"], Value::Null);
        assert_eq!(row["b"], Value::Int(5));
    }
}
