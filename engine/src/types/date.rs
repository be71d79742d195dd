//! Date, date-time and time fields.
//!
//! Storage holds text in the storage format; loaded rows hold chrono values.
//! The display format is both what the bridge shows and what posted form
//! values are parsed with first.

use chrono::{Local, NaiveDate, NaiveDateTime, NaiveTime};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt::Write;

use super::php_format::to_chrono;
use super::FieldType;
use crate::error::{TypeError, TypeResult};
use crate::meta::setting::{DATE_FORMAT, ELEMENT_CLASS, FORMAT_FUNCTION, ON_LOAD, ON_SAVE, STORAGE_FORMAT};
use crate::meta::{BaseType, FieldFn, Setting, Settings};
use crate::value::Value;

/// Database expressions meaning "the current moment".
static NOW_SENTINEL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(current_timestamp|current_date|current_time|now)\s*(\(\s*\))?\s*$")
        .expect("Invalid embedded sentinel pattern")
});

/// Formats tried after the configured ones.
const GENERIC_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%d",
    "%d-%m-%Y %H:%M",
    "%d-%m-%Y",
    "%d/%m/%Y",
    "%H:%M:%S",
    "%H:%M",
];

pub fn is_now_sentinel(text: &str) -> bool {
    NOW_SENTINEL.is_match(text)
}

/// A date handler in one of its three flavours.
#[derive(Debug, Clone)]
pub struct DateType {
    base: BaseType,
    display_php: String,
    storage_php: String,
    display: String,
    storage: String,
}

impl DateType {
    /// Handler with the default formats of its flavour. `base` must be one
    /// of the date, date-time or time base types.
    pub fn new(base: BaseType) -> TypeResult<Self> {
        let (display, storage) = match base {
            BaseType::Date => ("d-m-Y", "Y-m-d"),
            BaseType::DateTime => ("d-m-Y H:i", "Y-m-d H:i:s"),
            BaseType::Time => ("H:i", "H:i:s"),
            other => return Err(TypeError::UnknownBaseType(other.code())),
        };
        Self::with_formats(base, display, storage)
    }

    pub fn date() -> Self {
        Self::fixed(BaseType::Date, "d-m-Y", "%d-%m-%Y", "Y-m-d", "%Y-%m-%d")
    }

    pub fn datetime() -> Self {
        Self::fixed(BaseType::DateTime, "d-m-Y H:i", "%d-%m-%Y %H:%M", "Y-m-d H:i:s", "%Y-%m-%d %H:%M:%S")
    }

    pub fn time() -> Self {
        Self::fixed(BaseType::Time, "H:i", "%H:%M", "H:i:s", "%H:%M:%S")
    }

    fn fixed(base: BaseType, display_php: &str, display: &str, storage_php: &str, storage: &str) -> Self {
        Self {
            base,
            display_php: display_php.to_string(),
            storage_php: storage_php.to_string(),
            display: display.to_string(),
            storage: storage.to_string(),
        }
    }

    /// Handler with display and storage formats in PHP notation.
    pub fn with_formats(base: BaseType, display: &str, storage: &str) -> TypeResult<Self> {
        Ok(Self {
            base,
            display: to_chrono(display)?,
            storage: to_chrono(storage)?,
            display_php: display.to_string(),
            storage_php: storage.to_string(),
        })
    }

    pub fn display_format(&self) -> &str {
        &self.display_php
    }

    pub fn storage_format(&self) -> &str {
        &self.storage_php
    }

    fn now(&self) -> Value {
        self.shape(Local::now().naive_local())
    }

    /// Narrow a moment to this handler's flavour.
    fn shape(&self, moment: NaiveDateTime) -> Value {
        match self.base {
            BaseType::Date => Value::Date(moment.date()),
            BaseType::Time => Value::Time(moment.time()),
            _ => Value::DateTime(moment),
        }
    }

    fn moment(value: &Value) -> Option<NaiveDateTime> {
        match value {
            Value::Date(d) => Some(d.and_time(NaiveTime::MIN)),
            Value::DateTime(dt) => Some(*dt),
            Value::Time(t) => Some(NaiveDate::MIN.and_time(*t)),
            _ => None,
        }
    }

    fn parse_with(&self, text: &str, format: &str) -> Option<Value> {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, format) {
            return Some(self.shape(dt));
        }
        if let Ok(d) = NaiveDate::parse_from_str(text, format) {
            return match self.base {
                BaseType::Time => None,
                _ => Some(self.shape(d.and_time(NaiveTime::MIN))),
            };
        }
        if let Ok(t) = NaiveTime::parse_from_str(text, format) {
            return match self.base {
                BaseType::Time => Some(Value::Time(t)),
                _ => None,
            };
        }
        None
    }

    /// Turn a stored or posted value into a chrono value.
    ///
    /// Null and blank text give null, chrono values pass through, database
    /// "now" expressions give the current moment. Text is tried with the
    /// display format first when `is_post`, then the storage format, then a
    /// few generic formats. Anything unparseable comes back unchanged.
    pub fn to_date(&self, value: &Value, is_post: bool) -> Value {
        match value {
            Value::Null => Value::Null,
            Value::Date(_) | Value::DateTime(_) | Value::Time(_) => value.clone(),
            Value::Text(text) => {
                let text = text.trim();
                if text.is_empty() {
                    return Value::Null;
                }
                if is_now_sentinel(text) {
                    return self.now();
                }
                let post = is_post.then_some(self.display.as_str());
                post.into_iter()
                    .chain(std::iter::once(self.storage.as_str()))
                    .chain(GENERIC_FORMATS.iter().copied())
                    .find_map(|format| self.parse_with(text, format))
                    .unwrap_or_else(|| value.clone())
            }
            other => other.clone(),
        }
    }

    fn format_moment(moment: NaiveDateTime, format: &str) -> Option<String> {
        let mut out = String::new();
        write!(out, "{}", moment.format(format)).ok()?;
        Some(out)
    }

    /// Turn a loaded or posted value into storage text.
    pub fn to_storage_string(&self, value: &Value, is_post: bool) -> Value {
        let date = match value {
            Value::Text(text) if is_now_sentinel(text) => self.now(),
            other => self.to_date(other, is_post),
        };
        match Self::moment(&date).and_then(|moment| Self::format_moment(moment, &self.storage)) {
            Some(text) => Value::Text(text),
            None => date,
        }
    }

    /// Display text for a loaded value; other values render as text.
    pub fn to_display_string(&self, value: &Value) -> Value {
        match Self::moment(value).and_then(|moment| Self::format_moment(moment, &self.display)) {
            Some(text) => Value::Text(text),
            None => value.clone(),
        }
    }
}

impl FieldType for DateType {
    fn base_type(&self) -> BaseType {
        self.base
    }

    fn settings(&self) -> Settings {
        let element = match self.base {
            BaseType::Time => "Time",
            BaseType::DateTime => "DateTime",
            _ => "Date",
        };
        let mut settings = Settings::new();
        settings.insert(ELEMENT_CLASS.to_string(), Setting::from(element));
        settings.insert(DATE_FORMAT.to_string(), Setting::from(self.display_php.as_str()));
        settings.insert(STORAGE_FORMAT.to_string(), Setting::from(self.storage_php.as_str()));
        settings
    }

    fn converters(&self) -> Settings {
        let on_load = self.clone();
        let on_save = self.clone();
        let display = self.clone();
        let mut settings = Settings::new();
        settings.insert(
            ON_LOAD.to_string(),
            Setting::from(FieldFn::new(move |value, ctx| on_load.to_date(value, ctx.is_post))),
        );
        settings.insert(
            ON_SAVE.to_string(),
            Setting::from(FieldFn::new(move |value, ctx| on_save.to_storage_string(value, ctx.is_post))),
        );
        settings.insert(
            FORMAT_FUNCTION.to_string(),
            Setting::from(FieldFn::new(move |value, _| display.to_display_string(value))),
        );
        settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::{FieldContext, MetaModel};
    use crate::value::Row;

    #[test]
    fn test_sentinels_any_case_and_parentheses() {
        for text in ["CURRENT_TIMESTAMP", "current_date", "Now()", "NOW ( )", " current_time "] {
            assert!(is_now_sentinel(text), "{text}");
        }
        assert!(!is_now_sentinel("nowhere"));
        assert!(matches!(DateType::date().to_date(&Value::from("NOW()"), false), Value::Date(_)));
    }

    #[test]
    fn test_round_trip_for_format_pairs() {
        let cases = [
            (BaseType::Date, "d-m-Y", "Y-m-d", "2024-03-05"),
            (BaseType::Date, "d/m/Y", "d.m.Y", "05.03.2024"),
            (BaseType::Date, "j F Y", "Y/m/d", "2024/03/05"),
            (BaseType::DateTime, "d-m-Y H:i", "Y-m-d H:i:s", "2024-03-05 14:30:00"),
            (BaseType::DateTime, "d-m-Y", "Y-m-d\\TH:i:s", "2024-03-05T14:30:59"),
            (BaseType::Time, "H:i", "H:i:s", "08:05:09"),
        ];
        for (base, display, storage, stored) in cases {
            let handler = DateType::with_formats(base, display, storage).unwrap();
            let loaded = handler.to_date(&Value::from(stored), false);
            assert!(!matches!(loaded, Value::Text(_)), "{stored} did not parse");
            assert_eq!(handler.to_storage_string(&loaded, false), Value::from(stored));
        }
    }

    #[test]
    fn test_post_format_wins_when_posting() {
        let handler = DateType::with_formats(BaseType::Date, "m/d/Y", "Y-m-d").unwrap();
        let posted = handler.to_date(&Value::from("03/05/2024"), true);
        assert_eq!(posted, Value::Date(NaiveDate::from_ymd_opt(2024, 3, 5).unwrap()));
        assert_eq!(handler.to_storage_string(&Value::from("03/05/2024"), true), Value::from("2024-03-05"));
    }

    #[test]
    fn test_unparseable_and_blank_input() {
        let handler = DateType::date();
        assert_eq!(handler.to_date(&Value::from("soon"), false), Value::from("soon"));
        assert_eq!(handler.to_storage_string(&Value::from("soon"), false), Value::from("soon"));
        assert_eq!(handler.to_date(&Value::from("  "), false), Value::Null);
        assert_eq!(handler.to_date(&Value::Null, false), Value::Null);
    }

    #[test]
    fn test_apply_installs_converters() {
        let mut meta = MetaModel::new("test");
        DateType::date().apply(&mut meta, "born");
        assert_eq!(meta.base_type("born"), Some(BaseType::Date));
        assert!(meta.is("born", DATE_FORMAT, "d-m-Y"));

        let row = Row::new();
        let context = FieldContext::new("born", &row);
        let loaded = meta.get_function("born", ON_LOAD).unwrap().call(&Value::from("1990-12-31"), &context);
        let shown = meta.get_function("born", FORMAT_FUNCTION).unwrap().call(&loaded, &context);
        assert_eq!(shown, Value::from("31-12-1990"));
    }

    #[test]
    fn test_non_date_base_rejected() {
        assert!(DateType::new(BaseType::String).is_err());
        assert_eq!(DateType::new(BaseType::Time).unwrap().storage_format(), "H:i:s");
    }
}
