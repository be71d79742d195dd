//! Boolean fields shown as a Yes / No choice.

use super::FieldType;
use crate::meta::setting::{ELEMENT_CLASS, MULTI_OPTIONS, ON_LOAD, SEPARATOR};
use crate::meta::{BaseType, FieldFn, Setting, Settings};
use crate::value::{Map, Value};

#[derive(Debug, Clone)]
pub struct YesNoType {
    yes: String,
    no: String,
}

impl Default for YesNoType {
    fn default() -> Self {
        Self::new("Yes", "No")
    }
}

impl YesNoType {
    pub fn new(yes: impl Into<String>, no: impl Into<String>) -> Self {
        Self {
            yes: yes.into(),
            no: no.into(),
        }
    }

    /// Options: `yes` and `no` labels.
    pub fn from_options(options: &Map) -> Self {
        let label = |key: &str, fallback: &str| {
            options
                .get(key)
                .and_then(Value::as_str)
                .unwrap_or(fallback)
                .to_string()
        };
        Self::new(label("yes", "Yes"), label("no", "No"))
    }

    /// Booleans become 1 / 0 so they match the option keys.
    fn normalize(value: &Value) -> Value {
        match value {
            Value::Bool(b) => Value::Int(i64::from(*b)),
            other => other.clone(),
        }
    }
}

impl FieldType for YesNoType {
    fn base_type(&self) -> BaseType {
        BaseType::Numeric
    }

    fn settings(&self) -> Settings {
        let mut options = Map::new();
        options.insert("1".into(), Value::from(self.yes.as_str()));
        options.insert("0".into(), Value::from(self.no.as_str()));

        let mut settings = Settings::new();
        settings.insert(ELEMENT_CLASS.to_string(), Setting::from("Radio"));
        settings.insert(MULTI_OPTIONS.to_string(), Setting::from(Value::Map(options)));
        settings.insert(SEPARATOR.to_string(), Setting::from(" "));
        settings
    }

    fn converters(&self) -> Settings {
        let mut settings = Settings::new();
        settings.insert(ON_LOAD.to_string(), Setting::from(FieldFn::new(|v, _| YesNoType::normalize(v))));
        settings
    }
}
