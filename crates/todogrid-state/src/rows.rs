//! Row Store Façade — CRUD over todo rows.
//!
//! Rows are keyed by sequence ids, so a table scan yields creation order.
//! Display order is by `serialNo`.

use redb::{ReadableDatabase, ReadableTable, WriteTransaction};
use serde_json::Value;
use tracing::{debug, info};

use todogrid_core::validate::is_reserved_row_key;

use crate::error::{StateError, StateResult};
use crate::store::{StateStore, commit, decode, encode, epoch_millis, map_err, next_id, not_found};
use crate::tables::*;
use crate::types::*;

impl StateStore {
    /// Insert a row. Without an explicit `serialNo` it gets the current
    /// maximum plus one (or 1 on an empty table).
    pub fn add_row(&self, input: RowInput) -> StateResult<Row> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let row = insert_row(&txn, input)?;
        commit(txn)?;
        debug!(id = %row.id, serial_no = row.serial_no, "row stored");
        Ok(row)
    }

    /// All rows ordered by ascending `serialNo`, ties in creation order.
    pub fn list_rows(&self) -> StateResult<Vec<Row>> {
        let mut rows = self.rows_in_creation_order()?;
        // Stable sort keeps creation order among equal serial numbers.
        rows.sort_by_key(|row| row.serial_no);
        Ok(rows)
    }

    /// All rows in the order they were created.
    pub fn rows_in_creation_order(&self) -> StateResult<Vec<Row>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(TODOS).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (_, value) = entry.map_err(map_err!(Read))?;
            results.push(decode(value.value())?);
        }
        Ok(results)
    }

    /// Get a row by id.
    pub fn get_row(&self, id: &str) -> StateResult<Row> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(TODOS).map_err(map_err!(Table))?;
        match table.get(id).map_err(map_err!(Read))? {
            Some(guard) => decode(guard.value()),
            None => Err(not_found("Todo")),
        }
    }

    /// Merge `input` onto the row at `id`.
    pub fn update_row(&self, id: &str, input: RowInput) -> StateResult<Row> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let row = {
            let mut table = txn.open_table(TODOS).map_err(map_err!(Table))?;
            let mut row: Row = match table.get(id).map_err(map_err!(Read))? {
                Some(guard) => decode(guard.value())?,
                None => return Err(not_found("Todo")),
            };
            row.apply(input);
            row.updated_at = epoch_millis();
            let value = encode(&row)?;
            table.insert(id, value.as_slice()).map_err(map_err!(Write))?;
            row
        };
        commit(txn)?;
        debug!(%id, "row updated");
        Ok(row)
    }

    /// Remove the row at `id` and return it. Serial numbers of the
    /// remaining rows are left as they are; see [`crate::Reindexer`].
    pub fn delete_row(&self, id: &str) -> StateResult<Row> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let row: Row = {
            let mut table = txn.open_table(TODOS).map_err(map_err!(Table))?;
            match table.remove(id).map_err(map_err!(Write))? {
                Some(guard) => decode(guard.value())?,
                None => return Err(not_found("Todo")),
            }
        };
        commit(txn)?;
        info!(%id, serial_no = row.serial_no, "row deleted");
        Ok(row)
    }

    /// Set `field` to `value` on every row; returns the refreshed list.
    ///
    /// Not transactional with the matching schema change: callers add the
    /// column and backfill rows in two steps.
    pub fn set_field_on_all_rows(&self, field: &str, value: Value) -> StateResult<Vec<Row>> {
        check_bulk_field(field)?;
        let count = self.rewrite_all_rows(|row| {
            row.fields.insert(field.to_string(), value.clone());
        })?;
        info!(%field, count, "column set on all rows");
        self.list_rows()
    }

    /// Remove `field` from every row; returns the refreshed list.
    pub fn unset_field_on_all_rows(&self, field: &str) -> StateResult<Vec<Row>> {
        check_bulk_field(field)?;
        let count = self.rewrite_all_rows(|row| {
            row.fields.remove(field);
        })?;
        info!(%field, count, "column removed from all rows");
        self.list_rows()
    }

    /// Set one row's serial number. Returns false if the row no longer
    /// exists.
    pub fn restamp_serial(&self, id: &str, serial_no: u64) -> StateResult<bool> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(TODOS).map_err(map_err!(Table))?;
            let mut row: Row = match table.get(id).map_err(map_err!(Read))? {
                Some(guard) => decode(guard.value())?,
                None => return Ok(false),
            };
            row.serial_no = serial_no;
            row.updated_at = epoch_millis();
            let value = encode(&row)?;
            table.insert(id, value.as_slice()).map_err(map_err!(Write))?;
        }
        commit(txn)?;
        Ok(true)
    }

    /// Apply `edit` to every row in a single write transaction.
    fn rewrite_all_rows(&self, mut edit: impl FnMut(&mut Row)) -> StateResult<usize> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let count = {
            let mut table = txn.open_table(TODOS).map_err(map_err!(Table))?;
            let mut rows = Vec::new();
            for entry in table.iter().map_err(map_err!(Read))? {
                let (_, value) = entry.map_err(map_err!(Read))?;
                rows.push(decode::<Row>(value.value())?);
            }
            let now = epoch_millis();
            for row in &mut rows {
                edit(row);
                row.updated_at = now;
                let value = encode(row)?;
                table
                    .insert(row.id.as_str(), value.as_slice())
                    .map_err(map_err!(Write))?;
            }
            rows.len()
        };
        commit(txn)?;
        Ok(count)
    }
}

fn check_bulk_field(field: &str) -> StateResult<()> {
    if is_reserved_row_key(field) {
        return Err(StateError::Conflict(format!(
            "'{field}' is a reserved row attribute"
        )));
    }
    Ok(())
}

/// Insert a row inside `txn`, assigning the next serial number when none is
/// given. Shared with config seeding.
pub(crate) fn insert_row(txn: &WriteTransaction, input: RowInput) -> StateResult<Row> {
    let serial_no = match input.serial_no {
        Some(serial_no) => serial_no,
        None => max_serial_no(txn)?
            .checked_add(1)
            .ok_or_else(|| StateError::Conflict("Serial number space exhausted".to_string()))?,
    };

    let now = epoch_millis();
    let mut row = Row {
        id: next_id(txn, ROW_SEQ)?,
        serial_no,
        completed: false,
        fields: Default::default(),
        created_at: now,
        updated_at: now,
    };
    row.apply(input);

    let value = encode(&row)?;
    let mut table = txn.open_table(TODOS).map_err(map_err!(Table))?;
    table
        .insert(row.id.as_str(), value.as_slice())
        .map_err(map_err!(Write))?;
    Ok(row)
}

fn max_serial_no(txn: &WriteTransaction) -> StateResult<u64> {
    let table = txn.open_table(TODOS).map_err(map_err!(Table))?;
    let mut max = 0;
    for entry in table.iter().map_err(map_err!(Read))? {
        let (_, value) = entry.map_err(map_err!(Read))?;
        let row: Row = decode(value.value())?;
        max = max.max(row.serial_no);
    }
    Ok(max)
}
