//! Structured values stored as JSON text.

use super::FieldType;
use crate::meta::setting::{ELEMENT_CLASS, FORMAT_FUNCTION, ON_LOAD, ON_SAVE};
use crate::meta::{BaseType, FieldFn, Setting, Settings};
use crate::value::{Map, Value};

#[derive(Debug, Clone)]
pub struct JsonType {
    line_separator: String,
}

impl Default for JsonType {
    fn default() -> Self {
        Self {
            line_separator: "\n".into(),
        }
    }
}

impl JsonType {
    pub fn from_options(options: &Map) -> Self {
        let mut handler = Self::default();
        if let Some(sep) = options.get("lineSeparator").and_then(Value::as_str) {
            handler.line_separator = sep.to_string();
        }
        handler
    }

    /// JSON text to a structured value. Blank text is null; text that is not
    /// a JSON object or array is left alone.
    pub fn decode(value: &Value) -> Value {
        let Value::Text(text) = value else {
            return value.clone();
        };
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Value::Null;
        }
        match serde_json::from_str::<serde_json::Value>(trimmed) {
            Ok(json @ (serde_json::Value::Object(_) | serde_json::Value::Array(_))) => Value::from(json),
            _ => value.clone(),
        }
    }

    pub fn encode(value: &Value) -> Value {
        match value {
            Value::List(_) | Value::Map(_) => Value::Text(value.to_json().to_string()),
            other => other.clone(),
        }
    }

    /// `key: value` lines for maps, comma-joined items for lists.
    pub fn display(&self, value: &Value) -> Value {
        match value {
            Value::Map(map) => Value::Text(
                map.iter()
                    .map(|(key, item)| format!("{key}: {}", self.display(item).to_text()))
                    .collect::<Vec<_>>()
                    .join(&self.line_separator),
            ),
            Value::List(items) => Value::Text(
                items
                    .iter()
                    .map(|item| self.display(item).to_text())
                    .collect::<Vec<_>>()
                    .join(", "),
            ),
            other => other.clone(),
        }
    }
}

impl FieldType for JsonType {
    fn base_type(&self) -> BaseType {
        BaseType::String
    }

    fn settings(&self) -> Settings {
        let mut settings = Settings::new();
        settings.insert(ELEMENT_CLASS.to_string(), Setting::from("Textarea"));
        settings
    }

    fn converters(&self) -> Settings {
        let display = self.clone();
        let mut settings = Settings::new();
        settings.insert(ON_LOAD.to_string(), Setting::from(FieldFn::new(|v, _| JsonType::decode(v))));
        settings.insert(ON_SAVE.to_string(), Setting::from(FieldFn::new(|v, _| JsonType::encode(v))));
        settings.insert(
            FORMAT_FUNCTION.to_string(),
            Setting::from(FieldFn::new(move |v, _| display.display(v))),
        );
        settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_encode() {
        let stored = Value::from(r#"{"role":"composer","share":50}"#);
        let loaded = JsonType::decode(&stored);
        assert_eq!(loaded.as_map().unwrap()["share"], Value::Int(50));
        assert_eq!(JsonType::decode(&JsonType::encode(&loaded)), loaded);
    }

    #[test]
    fn test_non_json_text_kept() {
        assert_eq!(JsonType::decode(&Value::from("plain")), Value::from("plain"));
        assert_eq!(JsonType::decode(&Value::from("42")), Value::from("42"));
        assert_eq!(JsonType::decode(&Value::from(" ")), Value::Null);
    }

    #[test]
    fn test_display_lines() {
        let value = Value::from(json!({ "a": 1, "b": ["x", "y"] }));
        assert_eq!(JsonType::default().display(&value), Value::from("a: 1\nb: x, y"));
    }
}
