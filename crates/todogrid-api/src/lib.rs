//! todogrid-api — REST API for todogrid.
//!
//! Provides axum route handlers for todo rows and the table configuration.
//!
//! # API Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `/todo` | List rows by serial number |
//! | POST | `/todo` | Create a row |
//! | GET | `/todo/{id}` | Get a row |
//! | PUT | `/todo/{id}` | Merge fields into a row |
//! | DELETE | `/todo/{id}` | Delete a row and reindex serial numbers |
//! | PATCH | `/todo/add-column` | Set a field on every row |
//! | PATCH | `/todo/remove-column` | Remove a field from every row |
//! | GET | `/table-config` | Get (or seed) the active config |
//! | POST | `/table-config` | Create or replace a config |
//! | PUT, PATCH | `/table-config/{id}` | Update a config |
//! | DELETE | `/table-config/{id}` | Delete a config |
//! | POST | `/table-config/columns` | Add a column |
//! | PUT | `/table-config/columns/{column_id}` | Update a column |
//! | DELETE | `/table-config/columns/{column_id}` | Delete a column |
//! | GET | `/` | Service info |

pub mod config_handlers;
pub mod error;
pub mod todo_handlers;

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, patch, post, put};
use serde_json::{Value, json};

use todogrid_state::{Reindexer, StateStore};

pub use error::ApiError;

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub store: StateStore,
    pub reindexer: Reindexer,
}

impl ApiState {
    pub fn new(store: StateStore) -> Self {
        let reindexer = Reindexer::new(store.clone());
        Self { store, reindexer }
    }
}

/// Build the complete API router over a store.
pub fn build_router(store: StateStore) -> Router {
    router(ApiState::new(store))
}

/// Build the API router from prepared state.
pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/", get(service_info))
        .route(
            "/todo",
            get(todo_handlers::list_todos).post(todo_handlers::create_todo),
        )
        .route("/todo/add-column", patch(todo_handlers::add_column_to_todos))
        .route("/todo/remove-column", patch(todo_handlers::remove_column_from_todos))
        .route(
            "/todo/{id}",
            get(todo_handlers::get_todo)
                .put(todo_handlers::update_todo)
                .delete(todo_handlers::delete_todo),
        )
        .route(
            "/table-config",
            get(config_handlers::get_table_config).post(config_handlers::save_table_config),
        )
        .route("/table-config/columns", post(config_handlers::add_column))
        .route(
            "/table-config/columns/{column_id}",
            put(config_handlers::update_column).delete(config_handlers::delete_column),
        )
        .route(
            "/table-config/{id}",
            put(config_handlers::update_table_config)
                .patch(config_handlers::update_table_config)
                .delete(config_handlers::delete_table_config),
        )
        .fallback(endpoint_not_found)
        .method_not_allowed_fallback(endpoint_not_found)
        .with_state(state)
}

/// GET /
pub async fn service_info(State(state): State<ApiState>) -> Json<Value> {
    Json(json!({
        "message": "Todo API is running",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "todos": "/todo",
            "tableConfig": "/table-config"
        },
        "reindexFailures": state.reindexer.dead_letters().len()
    }))
}

async fn endpoint_not_found() -> (StatusCode, Json<Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": "Endpoint not found" })),
    )
}
