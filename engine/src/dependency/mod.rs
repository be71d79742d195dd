//! Dependency engine.
//!
//! A dependency watches a set of fields and, given a row, computes setting
//! changes for other fields. Dependencies are configured once, attached to a
//! [`MetaModel`](crate::meta::MetaModel) and then evaluated for every loaded
//! row without keeping state between rows.
//!
//! - [`ReadonlyDependency`] / [`CanEditDependency`]: toggle settings on
//!   truthiness
//! - [`ValueSwitchDependency`]: switch table keyed by the watched values
//! - [`SqlOptionsDependency`]: option lists re-queried from a lookup

pub mod readonly;
pub mod sql_options;
pub mod value_switch;

use indexmap::{IndexMap, IndexSet};
use std::fmt;

use crate::error::DependencyResult;
use crate::meta::setting::SUBMIT_ON_CHANGE;
use crate::meta::MetaModel;
use crate::value::{Row, Value};

pub use readonly::{CanEditDependency, ReadonlyDependency};
pub use sql_options::{LookupOptions, OptionsLookup, SqlOptionsDependency};
pub use value_switch::{SwitchKey, SwitchNode, ValueSwitchDependency};

/// Field name to the setting names a dependency may change.
pub type Effecteds = IndexMap<String, IndexSet<String>>;

/// Field name to setting name to new value. `Value::Null` removes a setting.
pub type Changes = IndexMap<String, IndexMap<String, Value>>;

/// A rule computing setting changes from the current row.
pub trait Dependency: fmt::Debug {
    /// Fields whose values drive the changes.
    fn depends_on(&self) -> &IndexSet<String>;

    /// Every setting the dependency may change. Changes outside this map are
    /// rejected when the model merges them.
    fn effecteds(&self) -> &Effecteds;

    /// Changes for one row. A row that matches nothing gives no changes.
    fn get_changes(&self, row: &Row, is_new: bool) -> DependencyResult<Changes>;

    /// Whether presentation should re-evaluate when a watched field changes.
    fn apply_on_change(&self) -> bool {
        true
    }

    /// Prepare the model when the dependency is attached.
    fn apply_to_model(&self, meta: &mut MetaModel) -> DependencyResult<()> {
        if self.apply_on_change() {
            for field in self.depends_on() {
                meta.set_one(field, SUBMIT_ON_CHANGE, true);
            }
        }
        Ok(())
    }
}

/// Depends-on set and effected map shared by the concrete dependencies.
#[derive(Debug, Clone, Default)]
pub struct DependencyBase {
    depends_on: IndexSet<String>,
    effecteds: Effecteds,
    apply_on_change: bool,
}

impl DependencyBase {
    pub fn new<I, S>(depends_on: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            depends_on: depends_on.into_iter().map(Into::into).collect(),
            effecteds: Effecteds::new(),
            apply_on_change: true,
        }
    }

    pub fn depends_on(&self) -> &IndexSet<String> {
        &self.depends_on
    }

    pub fn effecteds(&self) -> &Effecteds {
        &self.effecteds
    }

    pub fn apply_on_change(&self) -> bool {
        self.apply_on_change
    }

    pub fn set_apply_on_change(&mut self, enabled: bool) {
        self.apply_on_change = enabled;
    }

    /// Declare settings of `field` as effected; repeated calls merge.
    pub fn add_effected<I, S>(&mut self, field: impl Into<String>, settings: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.effecteds
            .entry(field.into())
            .or_default()
            .extend(settings.into_iter().map(Into::into));
    }

    /// True when any watched field holds a truthy value in the row.
    pub fn any_truthy(&self, row: &Row) -> bool {
        self.depends_on
            .iter()
            .any(|field| row.get(field).is_some_and(Value::is_truthy))
    }
}

/// Merge `other` into `changes`; later settings win.
pub fn merge_changes(changes: &mut Changes, other: Changes) {
    for (field, settings) in other {
        changes.entry(field).or_default().extend(settings);
    }
}
