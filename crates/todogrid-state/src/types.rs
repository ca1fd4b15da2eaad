//! Domain types for the todogrid state store.
//!
//! Documents are stored as JSON and returned to API clients as-is, so the
//! wire names (`_id`, `serialNo`, `createdAt`) live here.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use todogrid_core::validate::{SERIAL_NO_FIELD, is_reserved_row_key};

/// Opaque row identifier. Ids sort in creation order.
pub type RowId = String;

/// Opaque table-config identifier.
pub type ConfigId = String;

/// Opaque column identifier, stable across column updates.
pub type ColumnId = String;

pub const DEFAULT_TABLE_NAME: &str = "Default Table";
pub const DEFAULT_COLUMN_WIDTH: u32 = 100;
pub const SERIAL_COLUMN_TITLE: &str = "S.No";
pub const SERIAL_COLUMN_WIDTH: u32 = 80;

// ── Columns ───────────────────────────────────────────────────────

/// A display column of the table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Column {
    #[serde(rename = "_id")]
    pub id: ColumnId,
    pub title: String,
    /// Row attribute name this column displays. Unique within a config.
    pub field: String,
    /// Relative display position. Gaps are allowed.
    pub order: u32,
    pub width: u32,
    pub editable: bool,
}

impl Column {
    /// The pinned serial-number column a fresh config is seeded with.
    pub(crate) fn serial(id: ColumnId) -> Self {
        Self {
            id,
            title: SERIAL_COLUMN_TITLE.to_string(),
            field: SERIAL_NO_FIELD.to_string(),
            order: 0,
            width: SERIAL_COLUMN_WIDTH,
            editable: false,
        }
    }

    pub fn is_serial(&self) -> bool {
        self.field == SERIAL_NO_FIELD
    }

    /// Shallow merge: supplied attributes overwrite, the id never changes.
    pub fn apply(&mut self, patch: &ColumnPatch) {
        if let Some(title) = &patch.title {
            self.title = title.clone();
        }
        if let Some(field) = &patch.field {
            self.field = field.clone();
        }
        if let Some(order) = patch.order {
            self.order = order;
        }
        if let Some(width) = patch.width {
            self.width = width;
        }
        if let Some(editable) = patch.editable {
            self.editable = editable;
        }
    }
}

/// A column as submitted by a client. `_id` is kept on whole-config
/// replaces and ignored when adding a single column.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ColumnInput {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ColumnId>,
    pub title: String,
    pub field: String,
    #[serde(default)]
    pub order: Option<u32>,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub editable: Option<bool>,
}

impl ColumnInput {
    pub fn new(title: &str, field: &str) -> Self {
        Self {
            id: None,
            title: title.to_string(),
            field: field.to_string(),
            order: None,
            width: None,
            editable: None,
        }
    }

    pub(crate) fn into_column(self, id: ColumnId, default_order: u32) -> Column {
        Column {
            id,
            title: self.title,
            field: self.field,
            order: self.order.unwrap_or(default_order),
            width: self.width.unwrap_or(DEFAULT_COLUMN_WIDTH),
            editable: self.editable.unwrap_or(true),
        }
    }
}

/// Partial column update.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ColumnPatch {
    pub title: Option<String>,
    pub field: Option<String>,
    pub order: Option<u32>,
    pub width: Option<u32>,
    pub editable: Option<bool>,
}

// ── Table configuration ──────────────────────────────────────────

/// Column layout of the todo table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TableConfig {
    #[serde(rename = "_id")]
    pub id: ConfigId,
    pub name: String,
    pub columns: Vec<Column>,
    /// Unix timestamp (milliseconds) when this config was created.
    pub created_at: u64,
    /// Unix timestamp (milliseconds) when this config was last updated.
    pub updated_at: u64,
}

impl TableConfig {
    pub fn column_by_field(&self, field: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.field == field)
    }

    pub fn column_by_id(&self, id: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.id == id)
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.column_by_field(field).is_some()
    }
}

/// Whole-config body for create or replace.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConfigInput {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ConfigId>,
    pub name: String,
    #[serde(default)]
    pub columns: Vec<ColumnInput>,
}

/// Top-level merge onto an existing config.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ConfigPatch {
    pub name: Option<String>,
    pub columns: Option<Vec<ColumnInput>>,
}

// ── Rows ─────────────────────────────────────────────────────────

/// A todo row. Attributes beyond the fixed ones are open-ended and keyed
/// by column field keys.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Row {
    #[serde(rename = "_id")]
    pub id: RowId,
    pub serial_no: u64,
    #[serde(default)]
    pub completed: bool,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
    pub created_at: u64,
    pub updated_at: u64,
}

impl Row {
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Merge a partial update. Server-managed keys in `input.fields` are
    /// dropped.
    pub fn apply(&mut self, input: RowInput) {
        if let Some(serial_no) = input.serial_no {
            self.serial_no = serial_no;
        }
        if let Some(completed) = input.completed {
            self.completed = completed;
        }
        for (key, value) in input.fields {
            if !is_reserved_row_key(&key) {
                self.fields.insert(key, value);
            }
        }
    }
}

/// Row body for create or partial update.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RowInput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serial_no: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl RowInput {
    pub fn with_field(mut self, key: &str, value: Value) -> Self {
        self.fields.insert(key.to_string(), value);
        self
    }

    pub fn with_serial(mut self, serial_no: u64) -> Self {
        self.serial_no = Some(serial_no);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn row_wire_shape() {
        let mut fields = Map::new();
        fields.insert("phone".to_string(), json!("555-0100"));
        let row = Row {
            id: "0000000000000001".to_string(),
            serial_no: 1,
            completed: false,
            fields,
            created_at: 10,
            updated_at: 10,
        };

        let value = serde_json::to_value(&row).unwrap();
        assert_eq!(value["_id"], "0000000000000001");
        assert_eq!(value["serialNo"], 1);
        assert_eq!(value["phone"], "555-0100");
        assert_eq!(value["createdAt"], 10);

        let back: Row = serde_json::from_value(value).unwrap();
        assert_eq!(back, row);
    }

    #[test]
    fn row_input_collects_open_fields() {
        let input: RowInput =
            serde_json::from_value(json!({"serialNo": 4, "title": "milk", "age": null})).unwrap();
        assert_eq!(input.serial_no, Some(4));
        assert_eq!(input.completed, None);
        assert_eq!(input.fields.get("title"), Some(&json!("milk")));
        assert_eq!(input.fields.get("age"), Some(&Value::Null));
    }

    #[test]
    fn row_apply_ignores_managed_keys() {
        let mut row = Row {
            id: "a".to_string(),
            serial_no: 2,
            completed: false,
            fields: Map::new(),
            created_at: 1,
            updated_at: 1,
        };
        let input: RowInput = serde_json::from_value(json!({
            "_id": "hijack",
            "createdAt": 99,
            "completed": true,
            "title": "done"
        }))
        .unwrap();

        row.apply(input);
        assert_eq!(row.id, "a");
        assert_eq!(row.created_at, 1);
        assert!(row.completed);
        assert_eq!(row.serial_no, 2);
        assert_eq!(row.get("title"), Some(&json!("done")));
        assert!(row.get("_id").is_none());
    }

    #[test]
    fn column_patch_is_shallow() {
        let mut column = ColumnInput::new("Phone", "phone").into_column("c1".to_string(), 3);
        assert_eq!(column.width, DEFAULT_COLUMN_WIDTH);
        assert!(column.editable);

        column.apply(&ColumnPatch {
            width: Some(140),
            ..Default::default()
        });
        assert_eq!(column.width, 140);
        assert_eq!(column.title, "Phone");
        assert_eq!(column.order, 3);
        assert_eq!(column.id, "c1");
    }
}
