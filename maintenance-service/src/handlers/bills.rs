use crate::dtos::{
    BillListResponse, BillResponse, GenerateBillsRequest, GenerateBillsResponse,
    RecalculateInterestResponse, SingleBillRequest, TransitionRequest,
};
use crate::models::{Actor, BillUpdate, ListBillsFilter};
use crate::startup::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use service_core::error::AppError;
use validator::Validate;

pub async fn list_bills(
    State(state): State<AppState>,
    Path(society_id): Path<String>,
    actor: Actor,
    Query(filter): Query<ListBillsFilter>,
) -> Result<impl IntoResponse, AppError> {
    let bills = state.billing.list_bills(&society_id, filter, &actor).await?;
    Ok(Json(BillListResponse {
        total: bills.len(),
        bills: bills.into_iter().map(BillResponse::from).collect(),
    }))
}

pub async fn get_bill(
    State(state): State<AppState>,
    Path((society_id, bill_id)): Path<(String, String)>,
    actor: Actor,
) -> Result<impl IntoResponse, AppError> {
    let bill = state.billing.get_bill(&society_id, &bill_id, &actor).await?;
    Ok(Json(BillResponse::from(bill)))
}

pub async fn generate_bills(
    State(state): State<AppState>,
    Path(society_id): Path<String>,
    actor: Actor,
    Json(request): Json<GenerateBillsRequest>,
) -> Result<impl IntoResponse, AppError> {
    request.validate()?;
    let command = request.into_command()?;
    let report = state
        .billing
        .generate_bills(&society_id, command, &actor, Utc::now())
        .await?;
    Ok((StatusCode::CREATED, Json(GenerateBillsResponse::from(report))))
}

pub async fn create_single_bill(
    State(state): State<AppState>,
    Path(society_id): Path<String>,
    actor: Actor,
    Json(request): Json<SingleBillRequest>,
) -> Result<impl IntoResponse, AppError> {
    request.validate()?;
    let bill = state
        .billing
        .create_single_bill(&society_id, request.into(), &actor, Utc::now())
        .await?;
    Ok((StatusCode::CREATED, Json(BillResponse::from(bill))))
}

pub async fn update_bill(
    State(state): State<AppState>,
    Path((society_id, bill_id)): Path<(String, String)>,
    actor: Actor,
    Json(update): Json<BillUpdate>,
) -> Result<impl IntoResponse, AppError> {
    update.validate()?;
    let bill = state
        .billing
        .update_bill(&society_id, &bill_id, update, &actor, Utc::now())
        .await?;
    Ok(Json(BillResponse::from(bill)))
}

pub async fn transition_bill(
    State(state): State<AppState>,
    Path((society_id, bill_id)): Path<(String, String)>,
    actor: Actor,
    Json(request): Json<TransitionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let bill = state
        .billing
        .transition_bill(
            &society_id,
            &bill_id,
            request.status,
            request.notes,
            request.expected_version,
            &actor,
            Utc::now(),
        )
        .await?;
    Ok(Json(BillResponse::from(bill)))
}

pub async fn delete_bill(
    State(state): State<AppState>,
    Path((society_id, bill_id)): Path<(String, String)>,
    actor: Actor,
) -> Result<impl IntoResponse, AppError> {
    state
        .billing
        .delete_bill(&society_id, &bill_id, &actor, Utc::now())
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn recalculate_interest(
    State(state): State<AppState>,
    Path(society_id): Path<String>,
    actor: Actor,
) -> Result<impl IntoResponse, AppError> {
    if !actor.role.can_edit() {
        return Err(AppError::forbidden("Only society staff may recalculate interest"));
    }
    let report = state
        .billing
        .recalculate_interest(&society_id, Utc::now())
        .await?;
    Ok(Json(RecalculateInterestResponse::from(report)))
}
