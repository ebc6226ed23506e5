use crate::models::{Actor, BillingConfig};
use crate::startup::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use serde_json::json;
use service_core::error::AppError;

pub async fn list_billing_configs(
    State(state): State<AppState>,
    Path(society_id): Path<String>,
    _actor: Actor,
) -> Result<impl IntoResponse, AppError> {
    let configs = state.billing.list_billing_configs(&society_id).await?;
    Ok(Json(json!({ "billing_configs": configs })))
}

pub async fn add_billing_config(
    State(state): State<AppState>,
    Path(society_id): Path<String>,
    actor: Actor,
    Json(config): Json<BillingConfig>,
) -> Result<impl IntoResponse, AppError> {
    let config = state
        .billing
        .add_billing_config(&society_id, config, &actor, Utc::now())
        .await?;
    Ok((StatusCode::CREATED, Json(config)))
}
