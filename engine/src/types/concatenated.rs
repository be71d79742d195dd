//! Multi-value fields stored as one separated string.

use super::FieldType;
use crate::meta::setting::{ELEMENT_CLASS, ON_LOAD, ON_SAVE, SEPARATOR};
use crate::meta::{BaseType, FieldFn, Setting, Settings};
use crate::value::{Map, Value};

/// Stores a list as `a|b|c`, or `|a|b|c|` with padding so that a storage
/// `like` filter on `|b|` matches whole items only.
///
/// The display separator is installed as the `separator` setting; the
/// bridge uses it together with `multiOptions` to render the list.
#[derive(Debug, Clone)]
pub struct ConcatenatedType {
    separator: String,
    padded: bool,
    display_separator: String,
}

impl Default for ConcatenatedType {
    fn default() -> Self {
        Self {
            separator: "|".into(),
            padded: false,
            display_separator: ", ".into(),
        }
    }
}

impl ConcatenatedType {
    pub fn new(separator: impl Into<String>, padded: bool) -> Self {
        Self {
            separator: separator.into(),
            padded,
            ..Self::default()
        }
    }

    pub fn with_display_separator(mut self, separator: impl Into<String>) -> Self {
        self.display_separator = separator.into();
        self
    }

    /// Options: `storageSeparator`, `padded`, `separator` (display).
    pub fn from_options(options: &Map) -> Self {
        let mut handler = Self::default();
        if let Some(sep) = options.get("storageSeparator").and_then(Value::as_str) {
            if !sep.is_empty() {
                handler.separator = sep.to_string();
            }
        }
        if let Some(padded) = options.get("padded") {
            handler.padded = padded.is_truthy();
        }
        if let Some(sep) = options.get(SEPARATOR).and_then(Value::as_str) {
            handler.display_separator = sep.to_string();
        }
        handler
    }

    /// Stored text to a list of text items.
    pub fn split(&self, value: &Value) -> Value {
        let Value::Text(text) = value else {
            return value.clone();
        };
        let mut inner = text.as_str();
        if self.padded {
            inner = inner.strip_prefix(self.separator.as_str()).unwrap_or(inner);
            inner = inner.strip_suffix(self.separator.as_str()).unwrap_or(inner);
        }
        if inner.is_empty() {
            return Value::List(Vec::new());
        }
        Value::List(inner.split(self.separator.as_str()).map(Value::from).collect())
    }

    /// A list to stored text. Scalars pass through.
    pub fn join(&self, value: &Value) -> Value {
        let Value::List(items) = value else {
            return value.clone();
        };
        if items.is_empty() {
            return Value::from("");
        }
        let joined = items
            .iter()
            .map(Value::to_text)
            .collect::<Vec<_>>()
            .join(&self.separator);
        if self.padded {
            Value::Text(format!("{sep}{joined}{sep}", sep = self.separator))
        } else {
            Value::Text(joined)
        }
    }
}

impl FieldType for ConcatenatedType {
    fn base_type(&self) -> BaseType {
        BaseType::String
    }

    fn settings(&self) -> Settings {
        let mut settings = Settings::new();
        settings.insert(ELEMENT_CLASS.to_string(), Setting::from("MultiCheckbox"));
        settings.insert(SEPARATOR.to_string(), Setting::from(self.display_separator.as_str()));
        settings
    }

    fn converters(&self) -> Settings {
        let loader = self.clone();
        let saver = self.clone();
        let mut settings = Settings::new();
        settings.insert(ON_LOAD.to_string(), Setting::from(FieldFn::new(move |v, _| loader.split(v))));
        settings.insert(ON_SAVE.to_string(), Setting::from(FieldFn::new(move |v, _| saver.join(v))));
        settings
    }
}
