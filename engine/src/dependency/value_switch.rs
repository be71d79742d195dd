//! Switch tables keyed by the values of the watched fields.
//!
//! The table is a trie: one level per depends-on field, in declaration
//! order, with the changes to apply at the leaves. Null, numeric zero, the
//! string `"0"` and the empty string are four distinct keys; any other value
//! matches by its canonical text, so `20` and `"20"` reach the same branch.
//!
//! Two JSON forms are accepted:
//!
//! ```text
//! nested:  { "20": { "b": { "multiOptions": { ... } } } }
//! rules:   [ { "when": [20], "then": { "b": { "multiOptions": { ... } } } } ]
//! ```
//!
//! In the nested form the key `""` is the empty string and `"0"` the string
//! zero. Null and numeric zero can only be written in the rule form.

use indexmap::{IndexMap, IndexSet};
use once_cell::unsync::OnceCell;

use super::{Changes, Dependency, DependencyBase, Effecteds};
use crate::error::{DependencyError, DependencyResult};
use crate::value::{Row, Value};

/// A trie key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SwitchKey {
    Null,
    Zero,
    ZeroText,
    Empty,
    Value(String),
}

impl SwitchKey {
    /// Key a row value falls under.
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Null => SwitchKey::Null,
            Value::Bool(false) => SwitchKey::Zero,
            Value::Int(0) => SwitchKey::Zero,
            Value::Float(f) if *f == 0.0 => SwitchKey::Zero,
            Value::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => {
                SwitchKey::Value((*f as i64).to_string())
            }
            Value::Text(s) if s == "0" => SwitchKey::ZeroText,
            Value::Text(s) if s.is_empty() => SwitchKey::Empty,
            other => SwitchKey::Value(other.to_text()),
        }
    }

    /// Key written as a JSON object key.
    pub fn from_json_key(key: &str) -> Self {
        match key {
            "" => SwitchKey::Empty,
            "0" => SwitchKey::ZeroText,
            other => SwitchKey::Value(other.to_string()),
        }
    }
}

/// One trie level, or the changes at the bottom.
#[derive(Debug, Clone, PartialEq)]
pub enum SwitchNode {
    Branch(IndexMap<SwitchKey, SwitchNode>),
    Leaf(Changes),
}

impl SwitchNode {
    fn empty_branch() -> Self {
        SwitchNode::Branch(IndexMap::new())
    }

    fn collect_effecteds(&self, out: &mut Effecteds) {
        match self {
            SwitchNode::Branch(children) => {
                for child in children.values() {
                    child.collect_effecteds(out);
                }
            }
            SwitchNode::Leaf(changes) => {
                for (field, settings) in changes {
                    out.entry(field.clone())
                        .or_default()
                        .extend(settings.keys().cloned());
                }
            }
        }
    }
}

fn changes_from_json(json: &serde_json::Value, depth: usize) -> DependencyResult<Changes> {
    let serde_json::Value::Object(fields) = json else {
        return Err(DependencyError::MalformedSwitch {
            depth,
            message: format!("expected field changes, found {json}"),
        });
    };
    let mut changes = Changes::new();
    for (field, settings) in fields {
        let serde_json::Value::Object(settings) = settings else {
            return Err(DependencyError::MalformedSwitch {
                depth,
                message: format!("settings of '{field}' must be an object"),
            });
        };
        changes.insert(
            field.clone(),
            settings
                .iter()
                .map(|(k, v)| (k.clone(), Value::from(v.clone())))
                .collect(),
        );
    }
    Ok(changes)
}

fn node_from_json(json: &serde_json::Value, depth: usize, levels: usize) -> DependencyResult<SwitchNode> {
    if depth == levels {
        return changes_from_json(json, depth).map(SwitchNode::Leaf);
    }
    let serde_json::Value::Object(branches) = json else {
        return Err(DependencyError::MalformedSwitch {
            depth,
            message: format!("expected a switch level, found {json}"),
        });
    };
    let mut children = IndexMap::new();
    for (key, child) in branches {
        children.insert(
            SwitchKey::from_json_key(key),
            node_from_json(child, depth + 1, levels)?,
        );
    }
    Ok(SwitchNode::Branch(children))
}

/// Applies the changes found under the watched values.
#[derive(Debug)]
pub struct ValueSwitchDependency {
    base: DependencyBase,
    switches: SwitchNode,
    effecteds: OnceCell<Effecteds>,
}

impl ValueSwitchDependency {
    pub fn new<I, S>(depends_on: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            base: DependencyBase::new(depends_on),
            switches: SwitchNode::empty_branch(),
            effecteds: OnceCell::new(),
        }
    }

    /// Build from either JSON form.
    pub fn from_json<I, S>(depends_on: I, switches: &serde_json::Value) -> DependencyResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut dependency = Self::new(depends_on);
        dependency.set_switches_json(switches)?;
        Ok(dependency)
    }

    pub fn with_apply_on_change(mut self, enabled: bool) -> Self {
        self.base.set_apply_on_change(enabled);
        self
    }

    fn levels(&self) -> usize {
        self.base.depends_on().len()
    }

    pub fn switches(&self) -> &SwitchNode {
        &self.switches
    }

    /// Replace the whole table from JSON.
    pub fn set_switches_json(&mut self, json: &serde_json::Value) -> DependencyResult<()> {
        let levels = self.levels();
        let switches = match json {
            serde_json::Value::Array(rules) => {
                self.switches = SwitchNode::empty_branch();
                for (index, rule) in rules.iter().enumerate() {
                    let (Some(serde_json::Value::Array(when)), Some(then)) = (rule.get("when"), rule.get("then")) else {
                        return Err(DependencyError::MalformedSwitch {
                            depth: 0,
                            message: format!("rule {index} needs 'when' and 'then'"),
                        });
                    };
                    let keys = when.iter().cloned().map(Value::from).collect();
                    self.add_switch(keys, changes_from_json(then, levels)?)?;
                }
                return Ok(());
            }
            other => node_from_json(other, 0, levels)?,
        };
        self.switches = switches;
        self.effecteds = OnceCell::new();
        Ok(())
    }

    /// Add one branch: `values` are the watched values in depends-on order.
    pub fn add_switch(&mut self, values: Vec<Value>, changes: Changes) -> DependencyResult<()> {
        let levels = self.levels();
        if values.len() != levels {
            return Err(DependencyError::MalformedSwitch {
                depth: values.len(),
                message: format!("expected {levels} switch values, got {}", values.len()),
            });
        }

        let mut node = &mut self.switches;
        for (depth, value) in values.iter().enumerate() {
            let SwitchNode::Branch(children) = node else {
                return Err(DependencyError::MalformedSwitch {
                    depth,
                    message: "branch ends early".to_string(),
                });
            };
            let next = if depth + 1 == levels {
                SwitchNode::Leaf(Changes::new())
            } else {
                SwitchNode::empty_branch()
            };
            node = children.entry(SwitchKey::of(value)).or_insert(next);
        }

        match node {
            SwitchNode::Leaf(existing) => super::merge_changes(existing, changes),
            SwitchNode::Branch(_) => {
                return Err(DependencyError::MalformedSwitch {
                    depth: levels,
                    message: "switch without depends-on fields".to_string(),
                })
            }
        }
        self.effecteds = OnceCell::new();
        Ok(())
    }
}

impl Dependency for ValueSwitchDependency {
    fn depends_on(&self) -> &IndexSet<String> {
        self.base.depends_on()
    }

    fn effecteds(&self) -> &Effecteds {
        self.effecteds.get_or_init(|| {
            let mut effecteds = Effecteds::new();
            self.switches.collect_effecteds(&mut effecteds);
            effecteds
        })
    }

    fn apply_on_change(&self) -> bool {
        self.base.apply_on_change()
    }

    fn get_changes(&self, row: &Row, _is_new: bool) -> DependencyResult<Changes> {
        let mut node = &self.switches;
        for field in self.base.depends_on() {
            let Some(value) = row.get(field) else {
                return Ok(Changes::new());
            };
            let SwitchNode::Branch(children) = node else {
                return Ok(Changes::new());
            };
            match children.get(&SwitchKey::of(value)) {
                Some(child) => node = child,
                None => return Ok(Changes::new()),
            }
        }
        match node {
            SwitchNode::Leaf(changes) => Ok(changes.clone()),
            SwitchNode::Branch(_) => Ok(Changes::new()),
        }
    }
}
