//! Field type handlers.
//!
//! A handler is unbound until [`FieldType::apply`] installs its settings on
//! one field of a [`MetaModel`]: the `type` base constant, static settings
//! such as `elementClass`, and the `onLoad` / `onSave` / `formatFunction`
//! callables. Static settings never overwrite what the field already has;
//! converters always replace earlier ones.
//!
//! Handlers are created by name through a [`TypeRegistry`], which is what
//! model definitions use.

pub mod concatenated;
pub mod date;
pub mod json;
pub mod php_format;
pub mod yes_no;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{LoaderError, LoaderResult, TypeResult};
use crate::meta::setting::{DATE_FORMAT, STORAGE_FORMAT, TYPE};
use crate::meta::{BaseType, MetaModel, Setting, Settings};
use crate::value::{Map, Value};

pub use concatenated::ConcatenatedType;
pub use date::DateType;
pub use json::JsonType;
pub use yes_no::YesNoType;

// =============================================================================
// FieldType
// =============================================================================

/// A pluggable per-field type.
pub trait FieldType: fmt::Debug {
    /// Storage-level kind installed as the `type` setting.
    fn base_type(&self) -> BaseType;

    /// Static settings; existing field settings take precedence.
    fn settings(&self) -> Settings;

    /// Callable settings installed over whatever the field had.
    fn converters(&self) -> Settings {
        Settings::new()
    }

    /// Bind the handler to a field.
    fn apply(&self, meta: &mut MetaModel, name: &str) {
        let mut install = Settings::new();
        install.insert(TYPE.to_string(), Setting::from(Value::from(self.base_type())));
        for (key, setting) in self.settings() {
            if !meta.has_setting(name, &key) {
                install.insert(key, setting);
            }
        }
        install.extend(self.converters());
        meta.set(name, install);
    }
}

// =============================================================================
// Registry
// =============================================================================

/// Default display and storage formats, in PHP `date()` notation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DateFormats {
    pub date_display: String,
    pub date_storage: String,
    pub datetime_display: String,
    pub datetime_storage: String,
    pub time_display: String,
    pub time_storage: String,
}

impl Default for DateFormats {
    fn default() -> Self {
        Self {
            date_display: "d-m-Y".into(),
            date_storage: "Y-m-d".into(),
            datetime_display: "d-m-Y H:i".into(),
            datetime_storage: "Y-m-d H:i:s".into(),
            time_display: "H:i".into(),
            time_storage: "H:i:s".into(),
        }
    }
}

impl DateFormats {
    fn for_base(&self, base: BaseType) -> (&str, &str) {
        match base {
            BaseType::DateTime => (&self.datetime_display, &self.datetime_storage),
            BaseType::Time => (&self.time_display, &self.time_storage),
            _ => (&self.date_display, &self.date_storage),
        }
    }
}

/// Builds a handler from the options a definition gives for a field.
pub type TypeFactory = Box<dyn Fn(&Map, &DateFormats) -> TypeResult<Box<dyn FieldType>>>;

/// Named type handlers.
pub struct TypeRegistry {
    factories: IndexMap<String, TypeFactory>,
    dates: DateFormats,
}

impl fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeRegistry")
            .field("names", &self.names())
            .field("dates", &self.dates)
            .finish()
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new(DateFormats::default())
    }
}

fn option_text<'a>(options: &'a Map, key: &str) -> Option<&'a str> {
    options.get(key).and_then(Value::as_str)
}

fn date_factory(base: BaseType) -> TypeFactory {
    Box::new(move |options: &Map, dates: &DateFormats| -> TypeResult<Box<dyn FieldType>> {
        let (display, storage) = dates.for_base(base);
        let display = option_text(options, DATE_FORMAT).unwrap_or(display);
        let storage = option_text(options, STORAGE_FORMAT).unwrap_or(storage);
        Ok(Box::new(DateType::with_formats(base, display, storage)?))
    })
}

fn concatenated_factory(options: &Map, _: &DateFormats) -> TypeResult<Box<dyn FieldType>> {
    Ok(Box::new(ConcatenatedType::from_options(options)))
}

fn json_factory(options: &Map, _: &DateFormats) -> TypeResult<Box<dyn FieldType>> {
    Ok(Box::new(JsonType::from_options(options)))
}

fn yes_no_factory(options: &Map, _: &DateFormats) -> TypeResult<Box<dyn FieldType>> {
    Ok(Box::new(YesNoType::from_options(options)))
}

impl TypeRegistry {
    /// Registry holding the built-in handlers.
    pub fn new(dates: DateFormats) -> Self {
        let mut registry = Self {
            factories: IndexMap::new(),
            dates,
        };
        registry.register("date", date_factory(BaseType::Date));
        registry.register("datetime", date_factory(BaseType::DateTime));
        registry.register("time", date_factory(BaseType::Time));
        registry.register("concatenated", Box::new(concatenated_factory));
        registry.register("json", Box::new(json_factory));
        registry.register("yes_no", Box::new(yes_no_factory));
        registry
    }

    /// Add or replace a handler.
    pub fn register(&mut self, name: impl Into<String>, factory: TypeFactory) {
        self.factories.insert(name.into().to_lowercase(), factory);
    }

    pub fn names(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }

    pub fn date_formats(&self) -> &DateFormats {
        &self.dates
    }

    pub fn create(&self, name: &str, options: &Map) -> LoaderResult<Box<dyn FieldType>> {
        let factory = self
            .factories
            .get(&name.to_lowercase())
            .ok_or_else(|| LoaderError::UnknownType(name.to_string()))?;
        Ok(factory(options, &self.dates)?)
    }

    /// Default handler for a base type, for fields declared only by their
    /// `type` constant. Only the temporal kinds need one.
    pub fn for_base_type(&self, base: BaseType) -> Option<Box<dyn FieldType>> {
        match base {
            BaseType::Date | BaseType::DateTime | BaseType::Time => {
                let (display, storage) = self.dates.for_base(base);
                match DateType::with_formats(base, display, storage) {
                    Ok(handler) => Some(Box::new(handler)),
                    Err(err) => {
                        log::warn!("default {} formats rejected: {err}", base.name());
                        None
                    }
                }
            }
            _ => None,
        }
    }
}
