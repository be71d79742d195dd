//! Filters and sorts handed to storage collaborators.
//!
//! A filter is a list of conditions joined by AND. Nested groups alternate
//! the combinator by depth: a group directly inside the top level is an OR,
//! a group inside that is an AND again, and so on.
//!
//! # JSON shape
//!
//! ```text
//! { "a": "A1" }                       equality
//! { "b": ["x", "y"] }                 membership
//! { "c": { "min": 20, "max": 30 } }   between (either bound optional)
//! { "t": { "like": "foo" } }          contains
//! { "a": { "not": 1 } }               negation of any of the above
//! { "0": "raw expression" }           raw sub-expression (digit key)
//! { "1": { "a": 1, "b": 2 } }         nested group (digit key)
//! ```

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{LoaderError, LoaderResult};
use crate::value::Value;

/// Sort direction for one field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

/// Field name to direction, in priority order.
pub type Sort = IndexMap<String, SortOrder>;

/// Test applied to one field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldTest {
    Equals(Value),
    OneOf(Vec<Value>),
    Like(String),
    Between { min: Option<Value>, max: Option<Value> },
    Not(Box<FieldTest>),
}

/// One filter condition.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Field { field: String, test: FieldTest },
    Raw(String),
    Group(Vec<Condition>),
}

impl Condition {
    fn collect_fields<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Condition::Field { field, .. } => {
                if !out.contains(&field.as_str()) {
                    out.push(field);
                }
            }
            Condition::Raw(_) => {}
            Condition::Group(children) => {
                for child in children {
                    child.collect_fields(out);
                }
            }
        }
    }
}

/// Conditions joined by AND.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    conditions: Vec<Condition>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_conditions(conditions: Vec<Condition>) -> Self {
        Self { conditions }
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn into_conditions(self) -> Vec<Condition> {
        self.conditions
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn push(&mut self, condition: Condition) {
        self.conditions.push(condition);
    }

    pub fn field(mut self, field: impl Into<String>, test: FieldTest) -> Self {
        self.conditions.push(Condition::Field {
            field: field.into(),
            test,
        });
        self
    }

    pub fn eq(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.field(field, FieldTest::Equals(value.into()))
    }

    pub fn one_of(self, field: impl Into<String>, values: Vec<Value>) -> Self {
        self.field(field, FieldTest::OneOf(values))
    }

    pub fn like(self, field: impl Into<String>, needle: impl Into<String>) -> Self {
        self.field(field, FieldTest::Like(needle.into()))
    }

    pub fn between(self, field: impl Into<String>, min: Option<Value>, max: Option<Value>) -> Self {
        self.field(field, FieldTest::Between { min, max })
    }

    pub fn not(self, field: impl Into<String>, test: FieldTest) -> Self {
        self.field(field, FieldTest::Not(Box::new(test)))
    }

    pub fn raw(mut self, expression: impl Into<String>) -> Self {
        self.conditions.push(Condition::Raw(expression.into()));
        self
    }

    pub fn group(mut self, conditions: Vec<Condition>) -> Self {
        self.conditions.push(Condition::Group(conditions));
        self
    }

    /// AND another filter onto this one, keeping first-seen condition order
    /// and skipping exact duplicates.
    pub fn and(mut self, other: Filter) -> Self {
        for condition in other.conditions {
            if !self.conditions.contains(&condition) {
                self.conditions.push(condition);
            }
        }
        self
    }

    /// Field names the filter touches, in first-seen order.
    pub fn fields(&self) -> Vec<&str> {
        let mut out = Vec::new();
        for condition in &self.conditions {
            condition.collect_fields(&mut out);
        }
        out
    }

    /// Split top-level field conditions in two: those for which `belongs`
    /// holds and the rest. Groups and raw conditions stay in the rest.
    pub fn partition(self, belongs: impl Fn(&str) -> bool) -> (Filter, Filter) {
        let (matched, rest): (Vec<_>, Vec<_>) = self
            .conditions
            .into_iter()
            .partition(|c| matches!(c, Condition::Field { field, .. } if belongs(field)));
        (Filter::from_conditions(matched), Filter::from_conditions(rest))
    }

    /// Parse the PHP-array style JSON shape described in the module docs.
    pub fn from_json(json: &serde_json::Value) -> LoaderResult<Self> {
        match json {
            serde_json::Value::Null => Ok(Filter::new()),
            serde_json::Value::Object(map) => {
                let mut conditions = Vec::with_capacity(map.len());
                for (key, value) in map {
                    conditions.push(parse_condition(key, value)?);
                }
                Ok(Filter::from_conditions(conditions))
            }
            other => Err(LoaderError::InvalidDefinition(format!(
                "filter must be an object, found {other}"
            ))),
        }
    }
}

fn is_group_key(key: &str) -> bool {
    !key.is_empty() && key.chars().all(|c| c.is_ascii_digit())
}

fn parse_condition(key: &str, value: &serde_json::Value) -> LoaderResult<Condition> {
    if is_group_key(key) {
        return match value {
            serde_json::Value::String(expression) => Ok(Condition::Raw(expression.clone())),
            serde_json::Value::Object(_) => {
                Ok(Condition::Group(Filter::from_json(value)?.into_conditions()))
            }
            other => Err(LoaderError::InvalidDefinition(format!(
                "group '{key}' must be a string or an object, found {other}"
            ))),
        };
    }
    Ok(Condition::Field {
        field: key.to_string(),
        test: parse_test(value)?,
    })
}

fn parse_test(value: &serde_json::Value) -> LoaderResult<FieldTest> {
    match value {
        serde_json::Value::Array(items) => Ok(FieldTest::OneOf(
            items.iter().cloned().map(Value::from).collect(),
        )),
        serde_json::Value::Object(map) => {
            if let Some(inner) = map.get("not") {
                return Ok(FieldTest::Not(Box::new(parse_test(inner)?)));
            }
            if let Some(needle) = map.get("like") {
                return Ok(FieldTest::Like(Value::from(needle.clone()).to_text()));
            }
            if map.contains_key("min") || map.contains_key("max") {
                return Ok(FieldTest::Between {
                    min: map.get("min").cloned().map(Value::from),
                    max: map.get("max").cloned().map(Value::from),
                });
            }
            Err(LoaderError::InvalidDefinition(format!(
                "unknown field test {value}"
            )))
        }
        scalar => Ok(FieldTest::Equals(Value::from(scalar.clone()))),
    }
}

/// Parse a sort given as `{"field": "asc"|"desc"}`.
pub fn sort_from_json(json: &serde_json::Value) -> LoaderResult<Sort> {
    Ok(serde_json::from_value(json.clone())?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_php_array_shape() {
        let filter = Filter::from_json(&json!({
            "a": "A1",
            "b": ["x", "y"],
            "c": { "min": 20, "max": 30 },
            "t": { "like": "foo" },
            "d": { "not": 1 },
            "0": "LENGTH(a) > 2",
            "1": { "a": 1, "b": 2 }
        }))
        .unwrap();

        let conditions = filter.conditions();
        assert_eq!(conditions.len(), 7);
        assert_eq!(
            conditions[0],
            Condition::Field { field: "a".into(), test: FieldTest::Equals(Value::from("A1")) }
        );
        assert!(matches!(&conditions[1], Condition::Field { test: FieldTest::OneOf(v), .. } if v.len() == 2));
        assert!(matches!(
            &conditions[2],
            Condition::Field { test: FieldTest::Between { min: Some(_), max: Some(_) }, .. }
        ));
        assert!(matches!(&conditions[4], Condition::Field { test: FieldTest::Not(_), .. }));
        assert_eq!(conditions[5], Condition::Raw("LENGTH(a) > 2".into()));
        assert!(matches!(&conditions[6], Condition::Group(children) if children.len() == 2));
    }

    #[test]
    fn test_and_skips_duplicates_keeps_order() {
        let left = Filter::new().eq("a", 1).eq("b", 2);
        let right = Filter::new().eq("b", 2).eq("c", 3);
        let merged = left.and(right);
        assert_eq!(merged.fields(), vec!["a", "b", "c"]);
        assert_eq!(merged.conditions().len(), 3);
    }

    #[test]
    fn test_partition_by_field() {
        let filter = Filter::new().eq("a", 1).eq("child_x", 2).raw("1 = 1");
        let (child, rest) = filter.partition(|f| f.starts_with("child_"));
        assert_eq!(child.fields(), vec!["child_x"]);
        assert_eq!(rest.conditions().len(), 2);
    }

    #[test]
    fn test_sort_from_json() {
        let sort = sort_from_json(&json!({ "c": "desc", "a": "asc" })).unwrap();
        let keys: Vec<&String> = sort.keys().collect();
        assert_eq!(keys, vec!["c", "a"]);
        assert_eq!(sort["c"], SortOrder::Desc);
    }
}
