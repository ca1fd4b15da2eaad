//! REST API handlers for todo rows.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use serde_json::{Value, json};
use tracing::info;

use todogrid_core::validate::{validate_bulk_column, validate_row};
use todogrid_state::{Row, RowInput};

use crate::ApiState;
use crate::error::{ApiError, decode_body};

type Body = Result<Json<Value>, JsonRejection>;

/// GET /todo
pub async fn list_todos(State(state): State<ApiState>) -> Result<Json<Vec<Row>>, ApiError> {
    let rows = state
        .store
        .list_rows()
        .map_err(|e| ApiError::from_state("Failed to get todos", e))?;
    Ok(Json(rows))
}

/// POST /todo
pub async fn create_todo(
    State(state): State<ApiState>,
    body: Body,
) -> Result<(StatusCode, Json<Row>), ApiError> {
    let Json(body) = body?;
    validate_row(&body)?;
    let input: RowInput = decode_body(body)?;

    let row = state
        .store
        .add_row(input)
        .map_err(|e| ApiError::from_state("Failed to add todo", e))?;
    Ok((StatusCode::CREATED, Json(row)))
}

/// GET /todo/{id}
pub async fn get_todo(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<Json<Row>, ApiError> {
    let row = state
        .store
        .get_row(&id)
        .map_err(|e| ApiError::from_state("Failed to get todo", e))?;
    Ok(Json(row))
}

/// PUT /todo/{id}
pub async fn update_todo(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    body: Body,
) -> Result<Json<Row>, ApiError> {
    let Json(body) = body?;
    validate_row(&body)?;
    let input: RowInput = decode_body(body)?;

    let row = state
        .store
        .update_row(&id, input)
        .map_err(|e| ApiError::from_state("Failed to update todo", e))?;
    Ok(Json(row))
}

/// DELETE /todo/{id}
///
/// The serial-number reindex runs before the response is sent, but its
/// failures are kept in the reindexer's dead-letter log and never fail the
/// request.
pub async fn delete_todo(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let (row, report) = state
        .reindexer
        .delete_row(&id)
        .map_err(|e| ApiError::from_state("Failed to delete todo", e))?;
    info!(%id, serial_no = row.serial_no, restamped = report.restamped, failed = report.failed, "todo deleted");
    Ok(Json(json!({ "message": "Todo deleted successfully" })))
}

/// PATCH /todo/add-column
///
/// Body: `{ "columnField": "phone", "value": <optional, default null> }`.
pub async fn add_column_to_todos(
    State(state): State<ApiState>,
    body: Body,
) -> Result<Json<Vec<Row>>, ApiError> {
    let Json(body) = body?;
    let field = validate_bulk_column(&body)?;
    let value = body.get("value").cloned().unwrap_or(Value::Null);

    let rows = state
        .store
        .set_field_on_all_rows(&field, value)
        .map_err(|e| ApiError::from_state("Failed to add column to todos", e))?;
    Ok(Json(rows))
}

/// PATCH /todo/remove-column
pub async fn remove_column_from_todos(
    State(state): State<ApiState>,
    body: Body,
) -> Result<Json<Vec<Row>>, ApiError> {
    let Json(body) = body?;
    let field = validate_bulk_column(&body)?;

    let rows = state
        .store
        .unset_field_on_all_rows(&field)
        .map_err(|e| ApiError::from_state("Failed to remove column from todos", e))?;
    Ok(Json(rows))
}
