//! Model loader: definitions in, wired models out.
//!
//! The loader owns three registries mapping class names to factories:
//! field types (see [`TypeRegistry`]), dependencies and transformers. Each
//! factory receives its definition and a [`BuildContext`] that can open
//! storages and build sub models.
//!
//! Built-in dependency classes: `readonly`, `can_edit`, `value_switch`,
//! `sql_options`. Built-in transformer classes: `nested`, `one_to_many`,
//! `join`, `to_many`, `crosstab`, `required_rows`.

pub mod definition;

use indexmap::IndexMap;
use serde_json::Value as JsonValue;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::EngineConfig;
use crate::dependency::readonly::add_locked_fields;
use crate::dependency::{
    CanEditDependency, Dependency, DependencyBase, LookupOptions, ReadonlyDependency, SqlOptionsDependency,
    ValueSwitchDependency,
};
use crate::error::{LoaderError, LoaderResult};
use crate::filter::{sort_from_json, Filter};
use crate::meta::{settings_from_json, MetaModel};
use crate::model::Model;
use crate::storage::{ArrayStorage, CsvStorage, Storage};
use crate::transform::{
    CrossTabTransformer, JoinTransformer, ModelTransformer, NestedTransformer, OneToManyTransformer,
    RequiredRowsTransformer, SubModelLink, ToManyTransformer,
};
use crate::types::TypeRegistry;
use crate::value::{Row, Value};

pub use definition::{
    example_definition, DependencyDefinition, FieldDefinition, ModelDefinition, StorageDefinition,
    TransformerDefinition,
};

pub type DependencyFactory =
    Box<dyn Fn(&DependencyDefinition, &BuildContext<'_>) -> LoaderResult<Box<dyn Dependency>>>;

pub type TransformerFactory =
    Box<dyn Fn(&TransformerDefinition, &BuildContext<'_>) -> LoaderResult<Box<dyn ModelTransformer>>>;

// =============================================================================
// Option helpers
// =============================================================================

fn invalid(class: &str, message: impl fmt::Display) -> LoaderError {
    LoaderError::InvalidDefinition(format!("{class}: {message}"))
}

fn option_str<'a>(options: &'a serde_json::Map<String, JsonValue>, key: &str) -> Option<&'a str> {
    options.get(key).and_then(JsonValue::as_str)
}

fn required_str<'a>(class: &str, options: &'a serde_json::Map<String, JsonValue>, key: &str) -> LoaderResult<&'a str> {
    option_str(options, key).ok_or_else(|| invalid(class, format!("missing '{key}'")))
}

fn string_list(class: &str, value: &JsonValue) -> LoaderResult<Vec<String>> {
    serde_json::from_value(value.clone()).map_err(|e| invalid(class, e))
}

fn rows_option(class: &str, value: &JsonValue) -> LoaderResult<Vec<Row>> {
    let JsonValue::Array(items) = value else {
        return Err(invalid(class, "rows must be a list"));
    };
    items
        .iter()
        .map(|item| {
            Value::from(item.clone())
                .into_map()
                .ok_or_else(|| invalid(class, format!("row {item} is not an object")))
        })
        .collect()
}

// =============================================================================
// Build context
// =============================================================================

/// What factories can reach while a definition is being built.
pub struct BuildContext<'a> {
    loader: &'a ModelLoader,
    base_dir: &'a Path,
}

impl<'a> BuildContext<'a> {
    pub fn base_dir(&self) -> &Path {
        self.base_dir
    }

    /// Open the storage a definition describes.
    pub fn open_storage(&self, name: &str, definition: &StorageDefinition) -> LoaderResult<Box<dyn Storage>> {
        match definition {
            StorageDefinition::Array { rows } => Ok(Box::new(ArrayStorage::from_json(
                name,
                JsonValue::Array(rows.clone()),
            ))),
            StorageDefinition::Csv { path } => {
                let path = if path.is_absolute() {
                    path.clone()
                } else {
                    self.base_dir.join(path)
                };
                Ok(Box::new(CsvStorage::open(path)?))
            }
        }
    }

    /// Build a child model with the same registries and base directory.
    pub fn build(&self, definition: &ModelDefinition) -> LoaderResult<Model> {
        self.loader.build_in(definition, self.base_dir)
    }

    /// Link to the child model a sub-model transformer definition carries.
    pub fn link(&self, definition: &TransformerDefinition) -> LoaderResult<SubModelLink> {
        let child = definition
            .model
            .as_deref()
            .ok_or_else(|| invalid(&definition.class, "missing 'model'"))?;
        let name = definition.name.clone().unwrap_or_else(|| child.name.clone());
        Ok(SubModelLink::new(name, self.build(child)?, definition.join.clone())?)
    }
}

// =============================================================================
// Built-in factories
// =============================================================================

/// Watched and toggled fields shared by the readonly and can-edit classes.
fn toggle_base(definition: &DependencyDefinition) -> LoaderResult<DependencyBase> {
    let mut base = DependencyBase::new(definition.depends_on.clone());
    if let Some(fields) = definition.options.get("fields") {
        add_locked_fields(&mut base, string_list(&definition.class, fields)?);
    }
    if let Some(JsonValue::Object(effecteds)) = definition.options.get("effecteds") {
        for (field, settings) in effecteds {
            base.add_effected(field.clone(), string_list(&definition.class, settings)?);
        }
    }
    if let Some(enabled) = definition.apply_on_change {
        base.set_apply_on_change(enabled);
    }
    Ok(base)
}

fn readonly_factory(definition: &DependencyDefinition, _: &BuildContext<'_>) -> LoaderResult<Box<dyn Dependency>> {
    Ok(Box::new(ReadonlyDependency::from(toggle_base(definition)?)))
}

fn can_edit_factory(definition: &DependencyDefinition, _: &BuildContext<'_>) -> LoaderResult<Box<dyn Dependency>> {
    Ok(Box::new(CanEditDependency::from(toggle_base(definition)?)))
}

fn value_switch_factory(definition: &DependencyDefinition, _: &BuildContext<'_>) -> LoaderResult<Box<dyn Dependency>> {
    let switches = definition
        .options
        .get("switches")
        .ok_or_else(|| invalid(&definition.class, "missing 'switches'"))?;
    let mut dependency = ValueSwitchDependency::from_json(definition.depends_on.clone(), switches)?;
    if let Some(enabled) = definition.apply_on_change {
        dependency = dependency.with_apply_on_change(enabled);
    }
    Ok(Box::new(dependency))
}

/// Options: `field`, `links` (row field to lookup field), `lookup` with
/// `storage`, `key` and `label`, optional `empty_label`.
fn sql_options_factory(definition: &DependencyDefinition, context: &BuildContext<'_>) -> LoaderResult<Box<dyn Dependency>> {
    let class = definition.class.as_str();
    let options = &definition.options;
    let field = required_str(class, options, "field")?;
    let links: IndexMap<String, String> = match options.get("links") {
        Some(links) => serde_json::from_value(links.clone()).map_err(|e| invalid(class, e))?,
        None => definition.depends_on.iter().map(|f| (f.clone(), f.clone())).collect(),
    };

    let Some(JsonValue::Object(lookup)) = options.get("lookup") else {
        return Err(invalid(class, "missing 'lookup'"));
    };
    let storage: StorageDefinition = lookup
        .get("storage")
        .cloned()
        .map(serde_json::from_value)
        .transpose()?
        .unwrap_or_default();
    let key = required_str(class, lookup, "key")?;
    let label = option_str(lookup, "label").unwrap_or(key);

    let source = LookupOptions::new(context.open_storage(field, &storage)?, key, label);
    let mut dependency = SqlOptionsDependency::new(field, links, Box::new(source))?;
    if let Some(empty) = option_str(options, "empty_label") {
        dependency = dependency.with_empty_label(empty);
    }
    if let Some(enabled) = definition.apply_on_change {
        dependency = dependency.with_apply_on_change(enabled);
    }
    Ok(Box::new(dependency))
}

fn nested_factory(definition: &TransformerDefinition, context: &BuildContext<'_>) -> LoaderResult<Box<dyn ModelTransformer>> {
    Ok(Box::new(NestedTransformer::from_link(context.link(definition)?)))
}

fn one_to_many_factory(definition: &TransformerDefinition, context: &BuildContext<'_>) -> LoaderResult<Box<dyn ModelTransformer>> {
    Ok(Box::new(OneToManyTransformer::from_link(context.link(definition)?)))
}

fn join_factory(definition: &TransformerDefinition, context: &BuildContext<'_>) -> LoaderResult<Box<dyn ModelTransformer>> {
    Ok(Box::new(JoinTransformer::from_link(context.link(definition)?)))
}

fn to_many_factory(definition: &TransformerDefinition, context: &BuildContext<'_>) -> LoaderResult<Box<dyn ModelTransformer>> {
    Ok(Box::new(ToManyTransformer::from_link(context.link(definition)?)))
}

fn crosstab_factory(definition: &TransformerDefinition, _: &BuildContext<'_>) -> LoaderResult<Box<dyn ModelTransformer>> {
    let class = definition.class.as_str();
    let options = &definition.options;
    let mut transformer = CrossTabTransformer::new(
        option_str(options, "id_field").unwrap_or_default(),
        option_str(options, "value_field").unwrap_or_default(),
    )?;
    if let Some(prefix) = option_str(options, "prefix") {
        transformer = transformer.with_prefix(prefix);
    }
    log::trace!("{class}: pivot configured");
    Ok(Box::new(transformer))
}

fn required_rows_factory(definition: &TransformerDefinition, _: &BuildContext<'_>) -> LoaderResult<Box<dyn ModelTransformer>> {
    let class = definition.class.as_str();
    let options = &definition.options;
    let rows = match options.get("rows") {
        Some(rows) => rows_option(class, rows)?,
        None => return Err(invalid(class, "missing 'rows'")),
    };
    let mut transformer = RequiredRowsTransformer::new(rows);
    if let Some(count) = options.get("key_count").and_then(JsonValue::as_u64) {
        transformer = transformer.with_key_count(usize::try_from(count).map_err(|e| invalid(class, e))?);
    }
    if let Some(default) = options.get("default_row") {
        let row = Value::from(default.clone())
            .into_map()
            .ok_or_else(|| invalid(class, "default_row must be an object"))?;
        transformer = transformer.with_default_row(row);
    }
    Ok(Box::new(transformer))
}

// =============================================================================
// ModelLoader
// =============================================================================

/// Builds [`Model`]s from definitions.
pub struct ModelLoader {
    types: TypeRegistry,
    dependencies: IndexMap<String, DependencyFactory>,
    transformers: IndexMap<String, TransformerFactory>,
    order_step: i64,
    track_usage: bool,
}

impl fmt::Debug for ModelLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelLoader")
            .field("types", &self.types)
            .field("dependencies", &self.dependencies.keys().collect::<Vec<_>>())
            .field("transformers", &self.transformers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Default for ModelLoader {
    fn default() -> Self {
        Self::new(&EngineConfig::default())
    }
}

impl ModelLoader {
    pub fn new(config: &EngineConfig) -> Self {
        let mut loader = Self {
            types: TypeRegistry::new(config.date_formats.clone()),
            dependencies: IndexMap::new(),
            transformers: IndexMap::new(),
            order_step: config.order_step,
            track_usage: config.track_usage,
        };

        loader.register_dependency("readonly", Box::new(readonly_factory));
        loader.register_dependency("can_edit", Box::new(can_edit_factory));
        loader.register_dependency("value_switch", Box::new(value_switch_factory));
        loader.register_dependency("sql_options", Box::new(sql_options_factory));

        loader.register_transformer("nested", Box::new(nested_factory));
        loader.register_transformer("one_to_many", Box::new(one_to_many_factory));
        loader.register_transformer("join", Box::new(join_factory));
        loader.register_transformer("to_many", Box::new(to_many_factory));
        loader.register_transformer("crosstab", Box::new(crosstab_factory));
        loader.register_transformer("required_rows", Box::new(required_rows_factory));
        loader
    }

    pub fn types(&self) -> &TypeRegistry {
        &self.types
    }

    pub fn types_mut(&mut self) -> &mut TypeRegistry {
        &mut self.types
    }

    pub fn register_dependency(&mut self, class: impl Into<String>, factory: DependencyFactory) {
        self.dependencies.insert(class.into(), factory);
    }

    pub fn register_transformer(&mut self, class: impl Into<String>, factory: TransformerFactory) {
        self.transformers.insert(class.into(), factory);
    }

    pub fn dependency_classes(&self) -> Vec<&str> {
        self.dependencies.keys().map(String::as_str).collect()
    }

    pub fn transformer_classes(&self) -> Vec<&str> {
        self.transformers.keys().map(String::as_str).collect()
    }

    /// Build a model; relative CSV paths resolve against the working directory.
    pub fn build(&self, definition: &ModelDefinition) -> LoaderResult<Model> {
        self.build_in(definition, Path::new("."))
    }

    /// Read and build a definition file; relative CSV paths resolve against
    /// the file's directory.
    pub fn load_file(&self, path: impl AsRef<Path>) -> LoaderResult<Model> {
        let path = path.as_ref();
        let definition = Self::read_definition(path)?;
        let base_dir = path.parent().map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from("."));
        self.build_in(&definition, &base_dir)
    }

    pub fn read_definition(path: impl AsRef<Path>) -> LoaderResult<ModelDefinition> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    fn build_in(&self, definition: &ModelDefinition, base_dir: &Path) -> LoaderResult<Model> {
        let context = BuildContext { loader: self, base_dir };
        log::debug!("building model '{}'", definition.name);

        let mut meta = MetaModel::new(definition.name.as_str()).with_order_step(self.order_step);
        self.apply_fields(&mut meta, &definition.fields)?;
        let keys: Vec<&str> = definition.keys.iter().map(String::as_str).collect();
        meta.set_keys(&keys);

        for dependency in &definition.dependencies {
            let factory = self
                .dependencies
                .get(&dependency.class)
                .ok_or_else(|| LoaderError::UnknownDependency(dependency.class.clone()))?;
            meta.add_dependency(factory(dependency, &context)?)?;
        }

        for transformer in &definition.transformers {
            let factory = self
                .transformers
                .get(&transformer.class)
                .ok_or_else(|| LoaderError::UnknownTransformer(transformer.class.clone()))?;
            meta.add_transformer(factory(transformer, &context)?);
        }

        meta.track_usage(self.track_usage);

        let storage = context.open_storage(&definition.name, &definition.storage)?;
        let mut model = Model::new(meta, storage);
        if let Some(filter) = &definition.filter {
            model.set_filter(Filter::from_json(filter)?);
        }
        if let Some(sort) = &definition.sort {
            model.set_sort(sort_from_json(sort)?);
        }
        Ok(model)
    }

    fn apply_fields(&self, meta: &mut MetaModel, fields: &[FieldDefinition]) -> LoaderResult<()> {
        for field in fields {
            meta.set(&field.name, settings_from_json(JsonValue::Object(field.settings.clone())));

            let handler = match &field.field_type {
                Some(name) => {
                    let options = Value::from(JsonValue::Object(field.settings.clone()))
                        .into_map()
                        .unwrap_or_default();
                    Some(self.types.create(name, &options)?)
                }
                None => meta.base_type(&field.name).and_then(|base| self.types.for_base_type(base)),
            };
            if let Some(handler) = handler {
                handler.apply(meta, &field.name);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::setting::{MULTI_OPTIONS, READONLY, SUBMIT_ON_CHANGE};
    use crate::meta::BaseType;
    use serde_json::json;
    use std::io::Write;

    fn example() -> ModelDefinition {
        serde_json::from_value(example_definition()).unwrap()
    }

    #[test]
    fn test_example_builds_and_loads() {
        let mut model = ModelLoader::default().build(&example()).unwrap();
        assert_eq!(model.meta().base_type("registered"), Some(BaseType::Date));
        assert_eq!(model.meta().base_type("creators"), Some(BaseType::ChildModel));
        assert!(model.meta().is("kind", SUBMIT_ON_CHANGE, true));

        let rows = model.load_all().unwrap();
        assert_eq!(rows[0]["title"], Value::from("Blue Train"));
        assert!(matches!(rows[0]["registered"], Value::Date(_)));
        assert_eq!(rows[0]["tags"].as_list().unwrap().len(), 2);
        assert_eq!(rows[1]["creators"].as_list().unwrap().len(), 1);
    }

    #[test]
    fn test_dependencies_follow_last_row() {
        let mut model = ModelLoader::default().build(&example()).unwrap();
        model.load_all().unwrap();
        // Naima is last: unpublished song
        assert!(!model.meta().has_setting("title", READONLY));
        assert!(model.meta().is("lyrics_by", "label", "Lyricist"));
    }

    #[test]
    fn test_unknown_classes() {
        let mut definition = example();
        definition.dependencies[0].class = "bogus".into();
        assert!(matches!(
            ModelLoader::default().build(&definition),
            Err(LoaderError::UnknownDependency(name)) if name == "bogus"
        ));

        let mut definition = example();
        definition.transformers[0].class = "pivot".into();
        assert!(matches!(
            ModelLoader::default().build(&definition),
            Err(LoaderError::UnknownTransformer(_))
        ));
    }

    #[test]
    fn test_sub_model_needs_model_and_join() {
        let mut definition = example();
        definition.transformers[0].join.clear();
        assert!(matches!(ModelLoader::default().build(&definition), Err(LoaderError::Transform(_))));

        let mut definition = example();
        definition.transformers[0].model = None;
        assert!(matches!(ModelLoader::default().build(&definition), Err(LoaderError::InvalidDefinition(_))));
    }

    #[test]
    fn test_readonly_and_can_edit_share_options() {
        let definition: ModelDefinition = serde_json::from_value(json!({
            "name": "flags",
            "fields": [{ "name": "locked" }, { "name": "a" }, { "name": "b" }],
            "dependencies": [
                {
                    "class": "readonly",
                    "depends_on": ["locked"],
                    "apply_on_change": false,
                    "fields": ["a"],
                    "effecteds": { "b": ["readonly"] }
                },
                {
                    "class": "can_edit",
                    "depends_on": ["locked"],
                    "fields": ["a"],
                    "effecteds": { "b": ["readonly"] }
                }
            ]
        }))
        .unwrap();
        let model = ModelLoader::default().build(&definition).unwrap();
        let dependencies = model.meta().dependencies();
        assert_eq!(dependencies.len(), 2);
        for dependency in dependencies {
            assert_eq!(dependency.effecteds()["a"].len(), 2);
            assert_eq!(dependency.effecteds()["b"].len(), 1);
        }
        assert!(!dependencies[0].apply_on_change());
        assert!(dependencies[1].apply_on_change());

        let mut row = Row::new();
        row.insert("locked".into(), Value::from(true));
        let readonly = dependencies[0].get_changes(&row, false).unwrap();
        let can_edit = dependencies[1].get_changes(&row, false).unwrap();
        assert_eq!(readonly["a"][READONLY], Value::from(READONLY));
        assert_eq!(can_edit["a"][READONLY], Value::Null);
    }

    #[test]
    fn test_sql_options_and_required_rows() {
        let definition: ModelDefinition = serde_json::from_value(json!({
            "name": "sales",
            "fields": [
                { "name": "country" },
                { "name": "region" },
                { "name": "month" },
                { "name": "total" }
            ],
            "storage": { "kind": "array", "rows": [{ "country": "FR", "region": "idf", "month": 2, "total": 9 }] },
            "dependencies": [{
                "class": "sql_options",
                "depends_on": ["country"],
                "field": "region",
                "lookup": {
                    "storage": { "kind": "array", "rows": [
                        { "country": "FR", "code": "idf", "name": "Ile-de-France" },
                        { "country": "DE", "code": "by", "name": "Bayern" }
                    ] },
                    "key": "code",
                    "label": "name"
                }
            }],
            "transformers": [{ "class": "required_rows", "rows": [{ "month": 1 }, { "month": 2 }] }]
        }))
        .unwrap();

        let mut model = ModelLoader::default().build(&definition).unwrap();
        let rows = model.load_all().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1]["total"], Value::Int(9));

        let options = model.meta().get_value("region", MULTI_OPTIONS).and_then(Value::as_map).unwrap();
        assert_eq!(options.keys().collect::<Vec<_>>(), vec!["idf"]);
    }

    #[test]
    fn test_csv_path_relative_to_definition() {
        let dir = tempfile::tempdir().unwrap();
        let mut csv = fs::File::create(dir.path().join("works.csv")).unwrap();
        writeln!(csv, "id;title\n1;Alpha\n2;Beta").unwrap();

        let definition = json!({
            "name": "works",
            "keys": ["id"],
            "fields": [{ "name": "id" }, { "name": "title" }],
            "storage": { "kind": "csv", "path": "works.csv" },
            "filter": { "title": { "like": "bet" } }
        });
        let path = dir.path().join("works.json");
        fs::write(&path, definition.to_string()).unwrap();

        let mut model = ModelLoader::default().load_file(&path).unwrap();
        let rows = model.load_all().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["title"], Value::from("Beta"));
    }

    #[test]
    fn test_settings_order_step_and_tracking_from_config() {
        let config = EngineConfig {
            order_step: 100,
            track_usage: true,
            ..EngineConfig::default()
        };
        let model = ModelLoader::new(&config).build(&example()).unwrap();
        assert!(model.meta().is("title", "order", 200));
        assert!(model.meta().is_tracking_usage());
    }
}
