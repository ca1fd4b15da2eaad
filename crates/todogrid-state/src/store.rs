//! StateStore — redb-backed document persistence for todogrid.
//!
//! Owns the database handle and the low-level helpers shared by the schema,
//! row and reindex modules: JSON encoding, id sequences and timestamps. The
//! store supports both on-disk and in-memory backends (the latter for
//! testing).

use std::path::Path;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use redb::{Database, ReadableTable, WriteTransaction};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::{StateError, StateResult};
use crate::tables::*;

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| $crate::error::StateError::$variant(e.to_string())
    };
}
pub(crate) use map_err;

/// Thread-safe document store backed by redb.
#[derive(Clone)]
pub struct StateStore {
    pub(crate) db: Arc<Database>,
}

impl StateStore {
    /// Open (or create) a persistent state store at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "state store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory state store (for testing).
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory state store opened");
        Ok(store)
    }

    /// Create all tables if they don't exist yet.
    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        // Opening a table in a write transaction creates it if absent.
        txn.open_table(TODOS).map_err(map_err!(Table))?;
        txn.open_table(TABLE_CONFIGS).map_err(map_err!(Table))?;
        txn.open_table(SEQUENCES).map_err(map_err!(Table))?;
        txn.open_table(META).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }
}

pub(crate) fn encode<T: Serialize>(value: &T) -> StateResult<Vec<u8>> {
    serde_json::to_vec(value).map_err(map_err!(Serialize))
}

pub(crate) fn decode<T: DeserializeOwned>(bytes: &[u8]) -> StateResult<T> {
    serde_json::from_slice(bytes).map_err(map_err!(Deserialize))
}

/// Allocate the next id from the named sequence.
///
/// Ids are fixed-width hex so that lexicographic key order in redb equals
/// allocation order.
pub(crate) fn next_id(txn: &WriteTransaction, sequence: &str) -> StateResult<String> {
    let mut table = txn.open_table(SEQUENCES).map_err(map_err!(Table))?;
    let current = table
        .get(sequence)
        .map_err(map_err!(Read))?
        .map(|guard| guard.value())
        .unwrap_or(0);
    let next = current + 1;
    table.insert(sequence, next).map_err(map_err!(Write))?;
    Ok(format!("{next:016x}"))
}

/// Current Unix epoch in milliseconds.
pub(crate) fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

pub(crate) fn commit(txn: WriteTransaction) -> StateResult<()> {
    txn.commit().map_err(map_err!(Transaction))
}

pub(crate) fn not_found(what: &str) -> StateError {
    StateError::NotFound(format!("{what} not found"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RowInput;

    #[test]
    fn ids_follow_allocation_order() {
        let store = StateStore::open_in_memory().unwrap();
        let txn = store.db.begin_write().unwrap();
        let a = next_id(&txn, ROW_SEQ).unwrap();
        let b = next_id(&txn, ROW_SEQ).unwrap();
        let c = next_id(&txn, CONFIG_SEQ).unwrap();
        commit(txn).unwrap();

        assert_eq!(a, "0000000000000001");
        assert!(a < b);
        // Sequences are independent.
        assert_eq!(c, "0000000000000001");
    }

    #[test]
    fn id_order_survives_hex_rollover() {
        let store = StateStore::open_in_memory().unwrap();
        let txn = store.db.begin_write().unwrap();
        let ids: Vec<String> = (0..20).map(|_| next_id(&txn, ROW_SEQ).unwrap()).collect();
        commit(txn).unwrap();

        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(ids, sorted);
    }

    #[test]
    fn dropped_transaction_rolls_back() {
        let store = StateStore::open_in_memory().unwrap();
        {
            let txn = store.db.begin_write().unwrap();
            next_id(&txn, ROW_SEQ).unwrap();
        }
        let txn = store.db.begin_write().unwrap();
        assert_eq!(next_id(&txn, ROW_SEQ).unwrap(), "0000000000000001");
    }

    #[test]
    fn persistence_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("test.redb");

        let id = {
            let store = StateStore::open(&db_path).unwrap();
            store.get_active_config().unwrap();
            store.add_row(RowInput::default()).unwrap().id
        };

        // Reopen the same database file.
        let store = StateStore::open(&db_path).unwrap();
        let rows = store.list_rows().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(store.get_row(&id).unwrap().serial_no, 2);
        assert_eq!(store.list_configs().unwrap().len(), 1);
    }
}
