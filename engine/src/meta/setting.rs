//! Field settings: the tagged union stored per setting name.

use indexmap::IndexMap;
use std::fmt;
use std::sync::Arc;

use crate::value::{Row, Value};

// Well-known setting names.
pub const ALIAS_OF: &str = "alias_of";
pub const ORDER: &str = "order";
pub const TYPE: &str = "type";
pub const KEY: &str = "key";
pub const LABEL: &str = "label";
pub const DEFAULT: &str = "default";
pub const MULTI_OPTIONS: &str = "multiOptions";
pub const ELEMENT_CLASS: &str = "elementClass";
pub const ON_LOAD: &str = "onLoad";
pub const ON_SAVE: &str = "onSave";
pub const FORMAT_FUNCTION: &str = "formatFunction";
pub const DATE_FORMAT: &str = "dateFormat";
pub const STORAGE_FORMAT: &str = "storageFormat";
pub const NO_SAVE: &str = "no_save";
pub const READONLY: &str = "readonly";
pub const DISABLED: &str = "disabled";
pub const SUBMIT_ON_CHANGE: &str = "submitOnChange";
pub const SEPARATOR: &str = "separator";

/// Pseudo-setting: a dependency change to `value` rewrites the row value.
pub const VALUE: &str = "value";

/// All settings of one item, in insertion order.
pub type Settings = IndexMap<String, Setting>;

/// Row context handed to onLoad/onSave/format functions.
#[derive(Debug, Clone, Copy)]
pub struct FieldContext<'a> {
    pub name: &'a str,
    pub row: &'a Row,
    pub is_new: bool,
    pub is_post: bool,
}

impl<'a> FieldContext<'a> {
    pub fn new(name: &'a str, row: &'a Row) -> Self {
        Self {
            name,
            row,
            is_new: false,
            is_post: false,
        }
    }
}

type FieldFunction = dyn Fn(&Value, &FieldContext<'_>) -> Value + Send + Sync;

/// A callable setting: converter or formatter installed by a type handler.
#[derive(Clone)]
pub struct FieldFn(Arc<FieldFunction>);

impl FieldFn {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Value, &FieldContext<'_>) -> Value + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub fn call(&self, value: &Value, context: &FieldContext<'_>) -> Value {
        (self.0)(value, context)
    }
}

impl fmt::Debug for FieldFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FieldFn(..)")
    }
}

impl PartialEq for FieldFn {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// A single setting value.
#[derive(Debug, Clone, PartialEq)]
pub enum Setting {
    Value(Value),
    Function(FieldFn),
}

impl Setting {
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Setting::Value(v) => Some(v),
            Setting::Function(_) => None,
        }
    }

    pub fn as_function(&self) -> Option<&FieldFn> {
        match self {
            Setting::Function(f) => Some(f),
            Setting::Value(_) => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Setting::Value(Value::Null))
    }
}

impl From<Value> for Setting {
    fn from(v: Value) -> Self {
        Setting::Value(v)
    }
}

impl From<serde_json::Value> for Setting {
    fn from(v: serde_json::Value) -> Self {
        Setting::Value(Value::from(v))
    }
}

impl From<FieldFn> for Setting {
    fn from(f: FieldFn) -> Self {
        Setting::Function(f)
    }
}

impl From<&str> for Setting {
    fn from(s: &str) -> Self {
        Setting::Value(Value::from(s))
    }
}

impl From<String> for Setting {
    fn from(s: String) -> Self {
        Setting::Value(Value::from(s))
    }
}

impl From<bool> for Setting {
    fn from(b: bool) -> Self {
        Setting::Value(Value::Bool(b))
    }
}

impl From<i64> for Setting {
    fn from(i: i64) -> Self {
        Setting::Value(Value::Int(i))
    }
}

impl From<i32> for Setting {
    fn from(i: i32) -> Self {
        Setting::Value(Value::from(i))
    }
}

/// Build settings from a JSON object (non-objects give no settings).
pub fn settings_from_json(json: serde_json::Value) -> Settings {
    match json {
        serde_json::Value::Object(map) => map
            .into_iter()
            .map(|(k, v)| (k, Setting::from(v)))
            .collect(),
        _ => Settings::new(),
    }
}
