//! Display bridge: raw row values to display values.
//!
//! The bridge reads presentation settings from the [`MetaModel`]
//! (`formatFunction`, `multiOptions`, `separator`) and applies them to the
//! rows of one load. Values can be formatted in three modes:
//!
//! - [`FormatMode::Lazy`]: `get_formatted` returns a [`LazyFormat`] thunk that
//!   formats whatever row the cursor points at when it is resolved.
//! - [`FormatMode::EagerMultiRow`]: the whole column is formatted at once.
//! - [`FormatMode::EagerSingleRow`]: only the value at the cursor.

use serde::{Deserialize, Serialize};

use crate::error::MetaResult;
use crate::meta::setting::{FORMAT_FUNCTION, MULTI_OPTIONS, SEPARATOR};
use crate::meta::{FieldContext, MetaModel};
use crate::value::{Row, Value};

/// Separator for list values when the field sets none.
pub const DEFAULT_SEPARATOR: &str = ", ";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormatMode {
    #[default]
    Lazy,
    EagerMultiRow,
    EagerSingleRow,
}

/// Position in the bridge's rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RowCursor {
    position: usize,
    len: usize,
}

impl RowCursor {
    pub fn new(len: usize) -> Self {
        Self { position: 0, len }
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn is_valid(&self) -> bool {
        self.position < self.len
    }

    /// Move to the next row; false once past the end.
    pub fn advance(&mut self) -> bool {
        if self.position < self.len {
            self.position += 1;
        }
        self.is_valid()
    }

    pub fn seek(&mut self, position: usize) {
        self.position = position.min(self.len);
    }

    pub fn reset(&mut self) {
        self.position = 0;
    }
}

/// A deferred formatted value for one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LazyFormat {
    name: String,
}

impl LazyFormat {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Format the field's value in the row the cursor points at now.
    pub fn resolve(&self, bridge: &DisplayBridge<'_>) -> Value {
        bridge.format_current(&self.name)
    }
}

/// Result of [`DisplayBridge::get_formatted`].
#[derive(Debug, Clone, PartialEq)]
pub enum Formatted {
    Lazy(LazyFormat),
    Column(Vec<Value>),
    Single(Value),
}

#[derive(Debug)]
pub struct DisplayBridge<'m> {
    meta: &'m MetaModel,
    rows: Vec<Row>,
    cursor: RowCursor,
    mode: FormatMode,
}

impl<'m> DisplayBridge<'m> {
    pub fn new(meta: &'m MetaModel, rows: Vec<Row>, mode: FormatMode) -> Self {
        Self {
            cursor: RowCursor::new(rows.len()),
            meta,
            rows,
            mode,
        }
    }

    /// Bridge over a single row, formatted eagerly.
    pub fn single(meta: &'m MetaModel, row: Row) -> Self {
        Self::new(meta, vec![row], FormatMode::EagerSingleRow)
    }

    pub fn mode(&self) -> FormatMode {
        self.mode
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn cursor(&self) -> &RowCursor {
        &self.cursor
    }

    pub fn cursor_mut(&mut self) -> &mut RowCursor {
        &mut self.cursor
    }

    pub fn current_row(&self) -> Option<&Row> {
        self.rows.get(self.cursor.position())
    }

    fn format_in(&self, name: &str, value: &Value, row: &Row) -> Value {
        if let Some(function) = self.meta.get_function(name, FORMAT_FUNCTION) {
            return function.call(value, &FieldContext::new(name, row));
        }

        let separator = self
            .meta
            .get_text(name, SEPARATOR)
            .unwrap_or_else(|| DEFAULT_SEPARATOR.to_string());
        let options = self.meta.get_value(name, MULTI_OPTIONS).and_then(Value::as_map);
        let label = |item: &Value| -> Value {
            options
                .and_then(|options| options.get(&item.to_text()))
                .cloned()
                .unwrap_or_else(|| item.clone())
        };

        match value {
            Value::List(items) => Value::Text(
                items
                    .iter()
                    .map(|item| label(item).to_text())
                    .collect::<Vec<_>>()
                    .join(&separator),
            ),
            Value::Null => Value::Null,
            scalar => label(scalar),
        }
    }

    /// Format a raw value as the field displays it, using the current row as
    /// context for format functions.
    pub fn format(&self, name: &str, value: &Value) -> Value {
        match self.current_row() {
            Some(row) => self.format_in(name, value, row),
            None => self.format_in(name, value, &Row::new()),
        }
    }

    fn format_current(&self, name: &str) -> Value {
        match self.current_row() {
            Some(row) => {
                let value = row.get(name).cloned().unwrap_or_default();
                self.format_in(name, &value, row)
            }
            None => Value::Null,
        }
    }

    /// Formatted value(s) of a field according to the bridge mode.
    pub fn get_formatted(&self, name: &str) -> MetaResult<Formatted> {
        self.meta.check_name(name)?;
        Ok(match self.mode {
            FormatMode::Lazy => Formatted::Lazy(LazyFormat { name: name.to_string() }),
            FormatMode::EagerMultiRow => Formatted::Column(
                self.rows
                    .iter()
                    .map(|row| {
                        let value = row.get(name).cloned().unwrap_or_default();
                        self.format_in(name, &value, row)
                    })
                    .collect(),
            ),
            FormatMode::EagerSingleRow => Formatted::Single(self.format_current(name)),
        })
    }

    /// The current row with every known field formatted, in field order.
    pub fn formatted_row(&self) -> Row {
        let Some(row) = self.current_row() else {
            return Row::new();
        };
        let mut names: Vec<&str> = self
            .meta
            .items_ordered()
            .into_iter()
            .filter(|name| row.contains_key(*name))
            .collect();
        names.extend(row.keys().map(String::as_str).filter(|name| !self.meta.has(name)));

        names
            .into_iter()
            .map(|name| {
                let value = row.get(name).cloned().unwrap_or_default();
                (name.to_string(), self.format_in(name, &value, row))
            })
            .collect()
    }
}
