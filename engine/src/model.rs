//! A model: metadata plus the storage it reads from and writes to.
//!
//! [`Model`] runs the full pipeline around a [`Storage`]:
//!
//! - load: transformers rewrite filter and sort, storage loads, then
//!   [`MetaModel::process_after_load`] converts, evaluates dependencies and
//!   reshapes the rows
//! - save: before-save hooks, onSave converters, storage save, after-save
//!   hooks (sub model cascades), then onLoad again on the result

use crate::error::ModelResult;
use crate::filter::{Filter, Sort};
use crate::meta::MetaModel;
use crate::storage::{key_filter, Storage};
use crate::value::Row;

#[derive(Debug)]
pub struct Model {
    meta: MetaModel,
    storage: Box<dyn Storage>,
    filter: Filter,
    sort: Sort,
    changed: usize,
}

impl Model {
    pub fn new(meta: MetaModel, storage: Box<dyn Storage>) -> Self {
        Self {
            meta,
            storage,
            filter: Filter::new(),
            sort: Sort::new(),
            changed: 0,
        }
    }

    pub fn name(&self) -> &str {
        self.meta.name()
    }

    pub fn meta(&self) -> &MetaModel {
        &self.meta
    }

    pub fn meta_mut(&mut self) -> &mut MetaModel {
        &mut self.meta
    }

    pub fn storage(&self) -> &dyn Storage {
        self.storage.as_ref()
    }

    /// Default filter, ANDed with every load and delete filter.
    pub fn filter(&self) -> &Filter {
        &self.filter
    }

    pub fn set_filter(&mut self, filter: Filter) {
        self.filter = filter;
    }

    /// Default sort, used when a load passes none.
    pub fn sort(&self) -> &Sort {
        &self.sort
    }

    pub fn set_sort(&mut self, sort: Sort) {
        self.sort = sort;
    }

    /// Rows changed by saves and deletes since creation or the last reset,
    /// sub model rows included.
    pub fn changed(&self) -> usize {
        self.changed
    }

    pub fn reset_changed(&mut self) {
        self.changed = 0;
    }

    fn keys(&self) -> Vec<String> {
        self.meta.keys().into_iter().map(str::to_string).collect()
    }

    fn effective_filter(&mut self, filter: &Filter) -> ModelResult<Filter> {
        let filter = self.filter.clone().and(filter.clone());
        self.meta.transform_filter(filter)
    }

    fn effective_sort(&mut self, sort: &Sort) -> Sort {
        let sort = if sort.is_empty() { self.sort.clone() } else { sort.clone() };
        self.meta.transform_sort(sort)
    }

    // -------------------------------------------------------------------------
    // Loading
    // -------------------------------------------------------------------------

    pub fn load(&mut self, filter: &Filter, sort: &Sort) -> ModelResult<Vec<Row>> {
        let filter = self.effective_filter(filter)?;
        let sort = self.effective_sort(sort);
        let rows = self.storage.load(&filter, &sort)?;
        log::debug!("model '{}': loaded {} rows", self.meta.name(), rows.len());
        self.meta.process_after_load(rows, false, false)
    }

    /// Load with the default filter and sort only.
    pub fn load_all(&mut self) -> ModelResult<Vec<Row>> {
        self.load(&Filter::new(), &Sort::new())
    }

    pub fn load_first(&mut self, filter: &Filter, sort: &Sort) -> ModelResult<Option<Row>> {
        Ok(self.load(filter, sort)?.into_iter().next())
    }

    /// One page of rows (pages start at 1) and the total row count.
    /// A size of 0 returns every row.
    pub fn load_page_with_count(
        &mut self,
        page: usize,
        size: usize,
        filter: &Filter,
        sort: &Sort,
    ) -> ModelResult<(Vec<Row>, usize)> {
        let rows = self.load(filter, sort)?;
        let total = rows.len();
        if size == 0 {
            return Ok((rows, total));
        }
        let start = page.saturating_sub(1).saturating_mul(size);
        Ok((rows.into_iter().skip(start).take(size).collect(), total))
    }

    /// A fresh row with defaults, run through the load pipeline as new.
    pub fn load_new(&mut self) -> ModelResult<Row> {
        let row = self.meta.new_row();
        let rows = self.meta.process_after_load(vec![row], true, false)?;
        Ok(rows.into_iter().next().unwrap_or_default())
    }

    // -------------------------------------------------------------------------
    // Saving
    // -------------------------------------------------------------------------

    /// Save one row; `filter` selects the row to update, an empty filter
    /// selects by key values. Returns the stored row as it would load.
    pub fn save(&mut self, row: Row, filter: &Filter) -> ModelResult<Row> {
        let keys = self.keys();
        let is_new = filter.is_empty() && key_filter(&row, &keys).is_none();

        let row = self.meta.transform_row_before_save(row)?;
        let converted = self.meta.process_row_before_save(row.clone(), is_new);

        let storable = self.meta.storable_names();
        let storage_row: Row = converted
            .into_iter()
            .filter(|(name, _)| !self.meta.has(name) || storable.contains(&name.as_str()))
            .collect();

        let outcome = self.storage.save(storage_row, filter, &keys)?;
        self.changed += outcome.changed;

        let mut saved = outcome.row;
        for (name, value) in row {
            if !saved.contains_key(&name) {
                saved.insert(name, value);
            }
        }

        let (saved, sub_changed) = self.meta.transform_row_after_save(saved)?;
        self.changed += sub_changed;
        log::debug!(
            "model '{}': saved row (changed {}, sub rows {})",
            self.meta.name(),
            outcome.changed,
            sub_changed
        );

        Ok(self.meta.process_row_on_load(saved, false, false))
    }

    /// Save each row selected by its own key values.
    pub fn save_all(&mut self, rows: Vec<Row>) -> ModelResult<Vec<Row>> {
        rows.into_iter().map(|row| self.save(row, &Filter::new())).collect()
    }

    /// Delete matching rows; returns the count.
    pub fn delete(&mut self, filter: &Filter) -> ModelResult<usize> {
        let filter = self.effective_filter(filter)?;
        let deleted = self.storage.delete(&filter)?;
        self.changed += deleted;
        log::debug!("model '{}': deleted {} rows", self.meta.name(), deleted);
        Ok(deleted)
    }
}
