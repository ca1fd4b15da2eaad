//! Table Schema Manager.
//!
//! Owns the active table configuration: the ordered list of columns and the
//! pinned `serialNo` column. The active config is named by an explicit
//! pointer in the `meta` table and moves to each newly created config.

use std::collections::HashSet;

use redb::{ReadableDatabase, ReadableTable, WriteTransaction};
use serde::Serialize;
use tracing::{debug, info};

use todogrid_core::validate::SERIAL_NO_FIELD;

use crate::error::{StateError, StateResult};
use crate::rows::insert_row;
use crate::store::{StateStore, commit, decode, encode, epoch_millis, map_err, next_id, not_found};
use crate::tables::*;
use crate::types::*;

/// Outcome of a duplicate-column cleanup.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DedupeReport {
    pub config_id: Option<ConfigId>,
    pub removed: Vec<Column>,
}

impl StateStore {
    /// Return the active config, seeding one on an empty store.
    ///
    /// Seeding creates a config holding only the serial-number column and,
    /// if there are no rows yet, one row with `serialNo = 1`.
    pub fn get_active_config(&self) -> StateResult<TableConfig> {
        if let Some(config) = self.read_active_config()? {
            return Ok(config);
        }
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let config = ensure_active_config(&txn)?;
        commit(txn)?;
        Ok(config)
    }

    fn read_active_config(&self) -> StateResult<Option<TableConfig>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let meta = txn.open_table(META).map_err(map_err!(Table))?;
        let Some(id) = meta
            .get(ACTIVE_CONFIG_KEY)
            .map_err(map_err!(Read))?
            .map(|guard| guard.value().to_string())
        else {
            return Ok(None);
        };
        let configs = txn.open_table(TABLE_CONFIGS).map_err(map_err!(Table))?;
        match configs.get(id.as_str()).map_err(map_err!(Read))? {
            Some(guard) => Ok(Some(decode(guard.value())?)),
            None => Ok(None),
        }
    }

    /// List all configs in creation order.
    pub fn list_configs(&self) -> StateResult<Vec<TableConfig>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(TABLE_CONFIGS).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (_, value) = entry.map_err(map_err!(Read))?;
            results.push(decode(value.value())?);
        }
        Ok(results)
    }

    /// Create a config, or fully replace the one named by `input.id`.
    ///
    /// The submitted column list is authoritative: unlisted columns are
    /// dropped. A newly created config becomes the active one.
    pub fn replace_config(&self, input: ConfigInput) -> StateResult<TableConfig> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let now = epoch_millis();

        let config = match input.id {
            Some(id) => {
                let existing = load_config(&txn, &id)?.ok_or_else(|| not_found("Table config"))?;
                TableConfig {
                    id,
                    name: input.name,
                    columns: build_columns(&txn, input.columns, &existing.columns)?,
                    created_at: existing.created_at,
                    updated_at: now,
                }
            }
            None => {
                let config = TableConfig {
                    id: next_id(&txn, CONFIG_SEQ)?,
                    name: input.name,
                    columns: build_columns(&txn, input.columns, &[])?,
                    created_at: now,
                    updated_at: now,
                };
                set_active(&txn, &config.id)?;
                config
            }
        };

        put_config(&txn, &config)?;
        commit(txn)?;
        debug!(id = %config.id, columns = config.columns.len(), "table config stored");
        Ok(config)
    }

    /// Merge top-level fields into the config at `id`.
    pub fn patch_config(&self, id: &str, patch: ConfigPatch) -> StateResult<TableConfig> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let mut config = load_config(&txn, id)?.ok_or_else(|| not_found("Table config"))?;

        if let Some(name) = patch.name {
            config.name = name;
        }
        if let Some(columns) = patch.columns {
            config.columns = build_columns(&txn, columns, &config.columns)?;
        }
        config.updated_at = epoch_millis();

        put_config(&txn, &config)?;
        commit(txn)?;
        debug!(%id, "table config updated");
        Ok(config)
    }

    /// Delete the config at `id`. Rows are left untouched.
    ///
    /// When the active config is deleted the pointer falls back to the most
    /// recently created remaining config, or is cleared.
    pub fn delete_config(&self, id: &str) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let fallback = {
            let mut table = txn.open_table(TABLE_CONFIGS).map_err(map_err!(Table))?;
            if table.remove(id).map_err(map_err!(Write))?.is_none() {
                return Err(not_found("Table config"));
            }
            table
                .last()
                .map_err(map_err!(Read))?
                .map(|(key, _)| key.value().to_string())
        };
        let was_active = {
            let mut meta = txn.open_table(META).map_err(map_err!(Table))?;
            let was_active = meta
                .get(ACTIVE_CONFIG_KEY)
                .map_err(map_err!(Read))?
                .is_some_and(|guard| guard.value() == id);
            if was_active {
                match &fallback {
                    Some(next) => {
                        meta.insert(ACTIVE_CONFIG_KEY, next.as_str())
                            .map_err(map_err!(Write))?;
                    }
                    None => {
                        meta.remove(ACTIVE_CONFIG_KEY).map_err(map_err!(Write))?;
                    }
                }
            }
            was_active
        };
        commit(txn)?;
        if was_active {
            info!(%id, active = ?fallback, "active table config deleted");
        } else {
            info!(%id, "table config deleted");
        }
        Ok(())
    }

    /// Append a column to the active config, seeding the config if needed.
    ///
    /// Fails with `Conflict` if the field key is already present. A
    /// `serialNo` column is pinned to order 0 and every other column shifts
    /// one place right.
    pub fn add_column(&self, input: ColumnInput) -> StateResult<TableConfig> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let mut config = ensure_active_config(&txn)?;

        if config.has_field(&input.field) {
            return Err(StateError::Conflict(format!(
                "Column with field '{}' already exists",
                input.field
            )));
        }

        let mut default_order = config.columns.len() as u32;
        let pin_serial = input.field == SERIAL_NO_FIELD;
        if pin_serial {
            default_order = 0;
            for column in &mut config.columns {
                column.order = column.order.saturating_add(1);
            }
        }

        let mut column = input.into_column(next_id(&txn, COLUMN_SEQ)?, default_order);
        if pin_serial {
            column.order = 0;
        }
        debug!(field = %column.field, order = column.order, "adding column");
        config.columns.push(column);
        config.updated_at = epoch_millis();

        put_config(&txn, &config)?;
        commit(txn)?;
        Ok(config)
    }

    /// Shallow-merge `patch` onto the column with `column_id`.
    pub fn update_column(&self, column_id: &str, patch: ColumnPatch) -> StateResult<TableConfig> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let mut config =
            find_config_by_column(&txn, column_id)?.ok_or_else(|| not_found("Column"))?;

        if let Some(field) = &patch.field {
            if config.columns.iter().any(|c| c.id != column_id && &c.field == field) {
                return Err(StateError::Conflict(format!(
                    "Column with field '{field}' already exists"
                )));
            }
        }

        let column = config
            .columns
            .iter_mut()
            .find(|c| c.id == column_id)
            .ok_or_else(|| not_found("Column"))?;
        column.apply(&patch);
        config.updated_at = epoch_millis();

        put_config(&txn, &config)?;
        commit(txn)?;
        debug!(%column_id, "column updated");
        Ok(config)
    }

    /// Remove the column with `column_id`. The serial-number column is
    /// protected. Remaining orders are not renumbered.
    pub fn delete_column(&self, column_id: &str) -> StateResult<TableConfig> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let mut config =
            find_config_by_column(&txn, column_id)?.ok_or_else(|| not_found("Column"))?;

        let column = config.column_by_id(column_id).ok_or_else(|| not_found("Column"))?;
        if column.is_serial() {
            return Err(StateError::Conflict("Cannot delete S.No column".to_string()));
        }

        config.columns.retain(|c| c.id != column_id);
        config.updated_at = epoch_millis();

        put_config(&txn, &config)?;
        commit(txn)?;
        debug!(%column_id, "column deleted");
        Ok(config)
    }

    /// Drop repeated field keys from the active config, keeping the first
    /// column for each.
    pub fn dedupe_columns(&self) -> StateResult<DedupeReport> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let Some(mut config) = active_config_in(&txn)? else {
            return Ok(DedupeReport::default());
        };

        let mut seen = HashSet::new();
        let (kept, removed): (Vec<Column>, Vec<Column>) = config
            .columns
            .drain(..)
            .partition(|c| seen.insert(c.field.clone()));
        config.columns = kept;

        if !removed.is_empty() {
            config.updated_at = epoch_millis();
            put_config(&txn, &config)?;
            commit(txn)?;
            info!(id = %config.id, removed = removed.len(), "duplicate columns removed");
        }

        Ok(DedupeReport {
            config_id: Some(config.id),
            removed,
        })
    }
}

// ── Transaction-scoped helpers ────────────────────────────────────

fn load_config(txn: &WriteTransaction, id: &str) -> StateResult<Option<TableConfig>> {
    let table = txn.open_table(TABLE_CONFIGS).map_err(map_err!(Table))?;
    match table.get(id).map_err(map_err!(Read))? {
        Some(guard) => Ok(Some(decode(guard.value())?)),
        None => Ok(None),
    }
}

fn put_config(txn: &WriteTransaction, config: &TableConfig) -> StateResult<()> {
    let value = encode(config)?;
    let mut table = txn.open_table(TABLE_CONFIGS).map_err(map_err!(Table))?;
    table
        .insert(config.id.as_str(), value.as_slice())
        .map_err(map_err!(Write))?;
    Ok(())
}

fn set_active(txn: &WriteTransaction, id: &str) -> StateResult<()> {
    let mut meta = txn.open_table(META).map_err(map_err!(Table))?;
    meta.insert(ACTIVE_CONFIG_KEY, id).map_err(map_err!(Write))?;
    Ok(())
}

fn active_config_in(txn: &WriteTransaction) -> StateResult<Option<TableConfig>> {
    let id = {
        let meta = txn.open_table(META).map_err(map_err!(Table))?;
        meta.get(ACTIVE_CONFIG_KEY)
            .map_err(map_err!(Read))?
            .map(|guard| guard.value().to_string())
    };
    match id {
        Some(id) => load_config(txn, &id),
        None => Ok(None),
    }
}

/// Return the active config, seeding it inside `txn` when absent.
fn ensure_active_config(txn: &WriteTransaction) -> StateResult<TableConfig> {
    if let Some(config) = active_config_in(txn)? {
        return Ok(config);
    }

    let now = epoch_millis();
    let config = TableConfig {
        id: next_id(txn, CONFIG_SEQ)?,
        name: DEFAULT_TABLE_NAME.to_string(),
        columns: vec![Column::serial(next_id(txn, COLUMN_SEQ)?)],
        created_at: now,
        updated_at: now,
    };
    put_config(txn, &config)?;
    set_active(txn, &config.id)?;

    let rows_empty = {
        let todos = txn.open_table(TODOS).map_err(map_err!(Table))?;
        todos.first().map_err(map_err!(Read))?.is_none()
    };
    if rows_empty {
        insert_row(txn, RowInput::default().with_serial(1))?;
    }

    info!(id = %config.id, seeded_row = rows_empty, "default table config created");
    Ok(config)
}

fn find_config_by_column(txn: &WriteTransaction, column_id: &str) -> StateResult<Option<TableConfig>> {
    let table = txn.open_table(TABLE_CONFIGS).map_err(map_err!(Table))?;
    for entry in table.iter().map_err(map_err!(Read))? {
        let (_, value) = entry.map_err(map_err!(Read))?;
        let config: TableConfig = decode(value.value())?;
        if config.column_by_id(column_id).is_some() {
            return Ok(Some(config));
        }
    }
    Ok(None)
}

/// Turn submitted columns into stored ones.
///
/// A supplied `_id` is kept only when it names a column of `current` (the
/// config being replaced); any other column gets a fresh id. `order`
/// defaults to list position. Repeated field keys or ids are rejected.
fn build_columns(
    txn: &WriteTransaction,
    inputs: Vec<ColumnInput>,
    current: &[Column],
) -> StateResult<Vec<Column>> {
    let mut fields = HashSet::new();
    let mut ids = HashSet::new();
    let mut columns = Vec::with_capacity(inputs.len());
    for (position, mut input) in inputs.into_iter().enumerate() {
        if !fields.insert(input.field.clone()) {
            return Err(StateError::Conflict(format!(
                "Column with field '{}' already exists",
                input.field
            )));
        }
        let id = match input.id.take() {
            Some(id) if current.iter().any(|c| c.id == id) => {
                if !ids.insert(id.clone()) {
                    return Err(StateError::Conflict(format!(
                        "Column id '{id}' is used more than once"
                    )));
                }
                id
            }
            _ => next_id(txn, COLUMN_SEQ)?,
        };
        columns.push(input.into_column(id, position as u32));
    }
    Ok(columns)
}
