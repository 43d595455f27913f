use axum::extract::State;
use axum::routing::{get, post};
use axum::{middleware, Json, Router};
use serde::{Deserialize, Serialize};

use super::error::ApiError;
use super::form::QueryForm;
use super::middleware::{cors_layer, request_logger};
use super::AppState;
use crate::domain::SearchQuery;

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct ProcessFormResponse {
    pub response: String,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(hello_world))
        .route("/process_form", post(process_form))
        .layer(middleware::from_fn(request_logger))
        .layer(cors_layer())
        .with_state(state)
}

async fn hello_world() -> &'static str {
    "Hello, World!"
}

/// POST /process_form - answers the submitted `query` field.
async fn process_form(
    State(state): State<AppState>,
    form: QueryForm,
) -> Result<Json<ProcessFormResponse>, ApiError> {
    let query = form.into_query()?;
    let engine = state.engine()?;

    let result = engine.query(SearchQuery::new(query)).await.map_err(|e| {
        log::error!("Query failed: {:?}", e);
        ApiError::Engine(e.to_string())
    })?;
    Ok(Json(ProcessFormResponse { response: result.response }))
}
