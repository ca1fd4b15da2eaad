//! REST API handlers for the table configuration and its columns.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use serde_json::{Value, json};

use todogrid_core::validate::{validate_column, validate_partial_column, validate_table_config};
use todogrid_state::{ColumnInput, ColumnPatch, ConfigInput, ConfigPatch, TableConfig};

use crate::ApiState;
use crate::error::{ApiError, decode_body};

type Body = Result<Json<Value>, JsonRejection>;

// ── Table config ───────────────────────────────────────────────

/// GET /table-config
pub async fn get_table_config(State(state): State<ApiState>) -> Result<Json<TableConfig>, ApiError> {
    let config = state
        .store
        .get_active_config()
        .map_err(|e| ApiError::from_state("Failed to get table config", e))?;
    Ok(Json(config))
}

/// POST /table-config
///
/// Creates a config, or fully replaces the one named by `_id`.
pub async fn save_table_config(
    State(state): State<ApiState>,
    body: Body,
) -> Result<(StatusCode, Json<TableConfig>), ApiError> {
    let Json(body) = body?;
    validate_table_config(&body)?;
    let input: ConfigInput = decode_body(body)?;

    let config = state
        .store
        .replace_config(input)
        .map_err(|e| ApiError::from_state("Failed to save table config", e))?;
    Ok((StatusCode::CREATED, Json(config)))
}

/// PUT, PATCH /table-config/{id}
pub async fn update_table_config(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    body: Body,
) -> Result<Json<TableConfig>, ApiError> {
    let Json(body) = body?;
    validate_table_config(&body)?;
    let patch: ConfigPatch = decode_body(body)?;

    let config = state
        .store
        .patch_config(&id, patch)
        .map_err(|e| ApiError::from_state("Failed to update table config", e))?;
    Ok(Json(config))
}

/// DELETE /table-config/{id}
pub async fn delete_table_config(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    state
        .store
        .delete_config(&id)
        .map_err(|e| ApiError::from_state("Failed to delete table config", e))?;
    Ok(Json(json!({ "message": "Table config deleted successfully" })))
}

// ── Columns ────────────────────────────────────────────────────

/// POST /table-config/columns
pub async fn add_column(
    State(state): State<ApiState>,
    body: Body,
) -> Result<(StatusCode, Json<TableConfig>), ApiError> {
    let Json(body) = body?;
    validate_column(&body)?;
    let mut input: ColumnInput = decode_body(body)?;
    // Column ids are always server-assigned.
    input.id = None;

    let config = state
        .store
        .add_column(input)
        .map_err(|e| ApiError::from_state_conflict_as_bad_request("Failed to add column", e))?;
    Ok((StatusCode::CREATED, Json(config)))
}

/// PUT /table-config/columns/{column_id}
pub async fn update_column(
    State(state): State<ApiState>,
    Path(column_id): Path<String>,
    body: Body,
) -> Result<Json<TableConfig>, ApiError> {
    let Json(body) = body?;
    validate_partial_column(&body)?;
    let patch: ColumnPatch = decode_body(body)?;

    let config = state
        .store
        .update_column(&column_id, patch)
        .map_err(|e| ApiError::from_state("Failed to update column", e))?;
    Ok(Json(config))
}

/// DELETE /table-config/columns/{column_id}
pub async fn delete_column(
    State(state): State<ApiState>,
    Path(column_id): Path<String>,
) -> Result<Json<TableConfig>, ApiError> {
    let config = state
        .store
        .delete_column(&column_id)
        .map_err(|e| ApiError::from_state("Failed to delete column", e))?;
    Ok(Json(config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use todogrid_state::StateStore;

    fn test_state() -> ApiState {
        let store = StateStore::open_in_memory().unwrap();
        ApiState::new(store)
    }

    #[tokio::test]
    async fn get_seeds_once() {
        let state = test_state();
        let Json(first) = get_table_config(State(state.clone())).await.unwrap();
        let Json(second) = get_table_config(State(state.clone())).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(first.columns.len(), 1);
        assert_eq!(state.store.list_configs().unwrap().len(), 1);
        assert_eq!(state.store.list_rows().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn add_column_twice_conflicts() {
        let state = test_state();
        let body = json!({"title": "Phone", "field": "phone"});

        let (status, Json(config)) = add_column(State(state.clone()), Ok(Json(body.clone())))
            .await
            .unwrap();
        assert_eq!(status, StatusCode::CREATED);
        assert!(config.has_field("phone"));

        let err = add_column(State(state.clone()), Ok(Json(body))).await.unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.message, "Failed to add column: Column with field 'phone' already exists");

        let Json(after) = get_table_config(State(state)).await.unwrap();
        assert_eq!(after, config);
    }

    #[tokio::test]
    async fn add_column_ignores_client_id() {
        let state = test_state();
        let (_, Json(config)) = add_column(
            State(state),
            Ok(Json(json!({"_id": "mine", "title": "Phone", "field": "phone"}))),
        )
        .await
        .unwrap();
        assert_ne!(config.column_by_field("phone").unwrap().id, "mine");
    }

    #[tokio::test]
    async fn add_column_validates_field() {
        let state = test_state();
        let err = add_column(State(state), Ok(Json(json!({"title": "Bad", "field": "1bad"}))))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn update_and_delete_column() {
        let state = test_state();
        let (_, Json(config)) = add_column(
            State(state.clone()),
            Ok(Json(json!({"title": "Phone", "field": "phone"}))),
        )
        .await
        .unwrap();
        let phone_id = config.column_by_field("phone").unwrap().id.clone();

        let Json(config) = update_column(
            State(state.clone()),
            Path(phone_id.clone()),
            Ok(Json(json!({"width": 180}))),
        )
        .await
        .unwrap();
        assert_eq!(config.column_by_id(&phone_id).unwrap().width, 180);

        let Json(config) = delete_column(State(state), Path(phone_id.clone())).await.unwrap();
        assert!(config.column_by_id(&phone_id).is_none());
    }

    #[tokio::test]
    async fn update_column_rejects_bad_width() {
        let state = test_state();
        let err = update_column(State(state), Path("any".to_string()), Ok(Json(json!({"width": 0}))))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn serial_column_delete_is_server_error() {
        let state = test_state();
        let Json(config) = get_table_config(State(state.clone())).await.unwrap();
        let serial_id = config.columns[0].id.clone();

        let err = delete_column(State(state), Path(serial_id)).await.unwrap_err();
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.message, "Failed to delete column: Cannot delete S.No column");
    }

    #[tokio::test]
    async fn save_requires_name() {
        let state = test_state();
        let err = save_table_config(State(state), Ok(Json(json!({"columns": []}))))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.message, "Table name is required");
    }

    #[tokio::test]
    async fn save_rejects_repeated_column_ids() {
        let state = test_state();
        let err = save_table_config(
            State(state.clone()),
            Ok(Json(json!({
                "name": "Twins",
                "columns": [
                    {"_id": "x", "title": "A", "field": "a"},
                    {"_id": "x", "title": "B", "field": "b"}
                ]
            }))),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert!(state.store.list_configs().unwrap().is_empty());
    }

    #[tokio::test]
    async fn save_then_update_and_delete() {
        let state = test_state();
        let (status, Json(created)) = save_table_config(
            State(state.clone()),
            Ok(Json(json!({
                "name": "Contacts",
                "columns": [
                    {"title": "S.No", "field": "serialNo", "width": 80, "editable": false},
                    {"title": "Name", "field": "name"}
                ]
            }))),
        )
        .await
        .unwrap();
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created.columns.len(), 2);

        let Json(updated) = update_table_config(
            State(state.clone()),
            Path(created.id.clone()),
            Ok(Json(json!({"name": "People"}))),
        )
        .await
        .unwrap();
        assert_eq!(updated.name, "People");
        assert_eq!(updated.columns, created.columns);

        let Json(body) = delete_table_config(State(state.clone()), Path(created.id.clone()))
            .await
            .unwrap();
        assert_eq!(body["message"], "Table config deleted successfully");

        let err = delete_table_config(State(state), Path(created.id)).await.unwrap_err();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
    }
}
