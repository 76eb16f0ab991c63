use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::{json, Value};

use crate::brands::BrandProfile;
use crate::error::ApiError;
use crate::state::AppState;

pub async fn root() -> Json<Value> {
    Json(json!({ "message": "BrandAI Critique API is running" }))
}

pub async fn list_brands(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "brands": state.catalog.list_keys() }))
}

pub async fn get_brand(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<BrandProfile>, ApiError> {
    state
        .catalog
        .lookup(&key)
        .cloned()
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Brand '{}' not found", key)))
}
