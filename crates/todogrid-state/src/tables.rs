//! redb table definitions for the todogrid state store.
//!
//! Document tables use `&str` keys and `&[u8]` values (JSON). Document ids
//! are zero-padded hex sequence numbers, so key order is creation order.

use redb::TableDefinition;

/// Row documents keyed by row id.
pub const TODOS: TableDefinition<&str, &[u8]> = TableDefinition::new("todos");

/// Table configurations keyed by config id.
pub const TABLE_CONFIGS: TableDefinition<&str, &[u8]> = TableDefinition::new("tableconfigs");

/// Id counters keyed by sequence name.
pub const SEQUENCES: TableDefinition<&str, u64> = TableDefinition::new("sequences");

/// Singleton pointers (currently only the active config id).
pub const META: TableDefinition<&str, &str> = TableDefinition::new("meta");

pub const ROW_SEQ: &str = "row";
pub const CONFIG_SEQ: &str = "config";
pub const COLUMN_SEQ: &str = "column";

pub const ACTIVE_CONFIG_KEY: &str = "active_config";
