//! Readonly and can-edit toggling.
//!
//! Both apply the same settings; only the polarity differs. An applied
//! setting takes its own name as value (`readonly => "readonly"`), a released
//! one is nulled so the model drops it.

use indexmap::IndexSet;

use super::{Changes, Dependency, DependencyBase, Effecteds};
use crate::error::DependencyResult;
use crate::meta::setting::{DISABLED, READONLY};
use crate::value::{Row, Value};

fn toggle(effecteds: &Effecteds, apply: bool) -> Changes {
    effecteds
        .iter()
        .map(|(field, settings)| {
            let values = settings
                .iter()
                .map(|setting| {
                    let value = if apply {
                        Value::from(setting.as_str())
                    } else {
                        Value::Null
                    };
                    (setting.clone(), value)
                })
                .collect();
            (field.clone(), values)
        })
        .collect()
}

/// Register `readonly` and `disabled` as the toggled settings of each field.
pub fn add_locked_fields<I, S>(base: &mut DependencyBase, fields: I)
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    for field in fields {
        base.add_effected(field, [READONLY, DISABLED]);
    }
}

/// Makes fields readonly while any watched field is truthy.
#[derive(Debug, Clone)]
pub struct ReadonlyDependency {
    base: DependencyBase,
}

impl ReadonlyDependency {
    pub fn new<I, S>(depends_on: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            base: DependencyBase::new(depends_on),
        }
    }

    /// Toggle the given settings of `field`.
    pub fn with_effected<I, S>(mut self, field: impl Into<String>, settings: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.base.add_effected(field, settings);
        self
    }

    /// Toggle `readonly` and `disabled` on each field.
    pub fn with_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        add_locked_fields(&mut self.base, fields);
        self
    }

    pub fn with_apply_on_change(mut self, enabled: bool) -> Self {
        self.base.set_apply_on_change(enabled);
        self
    }
}

impl From<DependencyBase> for ReadonlyDependency {
    fn from(base: DependencyBase) -> Self {
        Self { base }
    }
}

impl Dependency for ReadonlyDependency {
    fn depends_on(&self) -> &IndexSet<String> {
        self.base.depends_on()
    }

    fn effecteds(&self) -> &Effecteds {
        self.base.effecteds()
    }

    fn apply_on_change(&self) -> bool {
        self.base.apply_on_change()
    }

    fn get_changes(&self, row: &Row, _is_new: bool) -> DependencyResult<Changes> {
        Ok(toggle(self.base.effecteds(), self.base.any_truthy(row)))
    }
}

/// Inverse of [`ReadonlyDependency`]: fields are editable while any watched
/// field is truthy, and locked otherwise.
#[derive(Debug, Clone)]
pub struct CanEditDependency {
    base: DependencyBase,
}

impl CanEditDependency {
    pub fn new<I, S>(depends_on: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            base: DependencyBase::new(depends_on),
        }
    }

    pub fn with_effected<I, S>(mut self, field: impl Into<String>, settings: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.base.add_effected(field, settings);
        self
    }

    pub fn with_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        add_locked_fields(&mut self.base, fields);
        self
    }

    pub fn with_apply_on_change(mut self, enabled: bool) -> Self {
        self.base.set_apply_on_change(enabled);
        self
    }
}

impl From<DependencyBase> for CanEditDependency {
    fn from(base: DependencyBase) -> Self {
        Self { base }
    }
}

impl Dependency for CanEditDependency {
    fn depends_on(&self) -> &IndexSet<String> {
        self.base.depends_on()
    }

    fn effecteds(&self) -> &Effecteds {
        self.base.effecteds()
    }

    fn apply_on_change(&self) -> bool {
        self.base.apply_on_change()
    }

    fn get_changes(&self, row: &Row, _is_new: bool) -> DependencyResult<Changes> {
        Ok(toggle(self.base.effecteds(), !self.base.any_truthy(row)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::MetaModel;
    use crate::value::row_from_json;
    use serde_json::json;

    fn readonly() -> ReadonlyDependency {
        ReadonlyDependency::new(["flag"]).with_effected("x", [READONLY, DISABLED])
    }

    #[test]
    fn test_truthy_flag_applies_settings() {
        let changes = readonly()
            .get_changes(&row_from_json(json!({ "flag": true })), false)
            .unwrap();
        assert_eq!(changes["x"]["readonly"], Value::from("readonly"));
        assert_eq!(changes["x"]["disabled"], Value::from("disabled"));
    }

    #[test]
    fn test_falsy_flag_nulls_settings() {
        for flag in [json!(false), json!(0), json!("0"), json!(""), json!(null)] {
            let changes = readonly()
                .get_changes(&row_from_json(json!({ "flag": flag })), false)
                .unwrap();
            assert_eq!(changes["x"]["readonly"], Value::Null);
            assert_eq!(changes["x"]["disabled"], Value::Null);
        }
    }

    #[test]
    fn test_missing_flag_counts_as_falsy() {
        let changes = readonly().get_changes(&Row::new(), false).unwrap();
        assert_eq!(changes["x"]["readonly"], Value::Null);
    }

    #[test]
    fn test_can_edit_is_inverse() {
        let dep = CanEditDependency::new(["flag"]).with_fields(["x"]);
        let open = dep.get_changes(&row_from_json(json!({ "flag": 1 })), false).unwrap();
        assert_eq!(open["x"]["readonly"], Value::Null);
        let locked = dep.get_changes(&row_from_json(json!({ "flag": 0 })), false).unwrap();
        assert_eq!(locked["x"]["disabled"], Value::from("disabled"));
    }

    #[test]
    fn test_model_applies_and_releases() {
        let mut meta = MetaModel::new("test");
        meta.ensure("flag");
        meta.ensure("x");
        meta.add_dependency(Box::new(readonly())).unwrap();

        let mut row = row_from_json(json!({ "flag": 1 }));
        meta.process_dependencies(&mut row, false).unwrap();
        assert!(meta.is("x", READONLY, "readonly"));

        let mut row = row_from_json(json!({ "flag": 0 }));
        meta.process_dependencies(&mut row, false).unwrap();
        assert!(!meta.has_setting("x", READONLY));
        assert!(!meta.has_setting("x", DISABLED));
    }
}
