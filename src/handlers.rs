//! Thin HTTP surface over the stock engine. Handlers validate nothing beyond
//! deserialization; every decision belongs to the services.

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::entities::{stock_move, stock_picking};
use crate::errors::ServiceError;
use crate::services::availability::{self, AvailabilityReport};
use crate::services::pickings::{CommitTracking, NewPicking, TransitionOutcome};
use crate::services::validation::StockCheck;
use crate::{ApiResponse, AppState};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/pickings", post(create_picking))
        .route("/pickings/:id", get(get_picking).delete(delete_picking))
        .route("/pickings/:id/ready", post(mark_ready))
        .route("/pickings/:id/commit", post(commit_picking))
        .route("/pickings/:id/cancel", post(cancel_picking))
        .route("/pickings/:id/return-to-draft", post(return_to_draft))
        .route("/pickings/:id/check", get(check_stock))
        .route("/availability", get(get_availability))
}

#[derive(Debug, Serialize)]
pub struct PickingResponse {
    pub picking: stock_picking::Model,
    pub moves: Vec<stock_move::Model>,
}

#[derive(Debug, Serialize)]
pub struct TransitionResponse {
    pub picking_id: i64,
    pub outcome: TransitionOutcome,
}

async fn create_picking(
    State(state): State<AppState>,
    Json(input): Json<NewPicking>,
) -> Result<Json<ApiResponse<PickingResponse>>, ServiceError> {
    let picking = state.pickings.create_picking(input).await?;
    let (picking, moves) = state.pickings.get_picking(picking.id).await?;
    Ok(Json(ApiResponse::success(PickingResponse {
        picking,
        moves,
    })))
}

async fn get_picking(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<PickingResponse>>, ServiceError> {
    let (picking, moves) = state.pickings.get_picking(id).await?;
    Ok(Json(ApiResponse::success(PickingResponse {
        picking,
        moves,
    })))
}

async fn delete_picking(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ServiceError> {
    state.pickings.delete_picking(id).await?;
    Ok(Json(ApiResponse::success(
        serde_json::json!({ "picking_id": id, "deleted": true }),
    )))
}

async fn mark_ready(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<TransitionResponse>>, ServiceError> {
    let outcome = state.pickings.mark_ready(id).await?;
    Ok(Json(ApiResponse::success(TransitionResponse {
        picking_id: id,
        outcome,
    })))
}

async fn commit_picking(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    tracking: Option<Json<CommitTracking>>,
) -> Result<Json<ApiResponse<TransitionResponse>>, ServiceError> {
    let tracking = tracking.map(|Json(t)| t).unwrap_or_default();
    let outcome = state.pickings.commit_picking(id, tracking).await?;
    Ok(Json(ApiResponse::success(TransitionResponse {
        picking_id: id,
        outcome,
    })))
}

async fn cancel_picking(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<TransitionResponse>>, ServiceError> {
    let outcome = state.pickings.cancel_picking(id).await?;
    Ok(Json(ApiResponse::success(TransitionResponse {
        picking_id: id,
        outcome,
    })))
}

async fn return_to_draft(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<TransitionResponse>>, ServiceError> {
    let outcome = state.pickings.return_to_draft(id).await?;
    Ok(Json(ApiResponse::success(TransitionResponse {
        picking_id: id,
        outcome,
    })))
}

async fn check_stock(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<StockCheck>>, ServiceError> {
    let check = state.pickings.check_stock(id).await?;
    Ok(Json(ApiResponse::success(check)))
}

#[derive(Debug, Deserialize)]
struct AvailabilityQuery {
    product_id: i64,
    location_id: i64,
    project_id: Option<i64>,
}

async fn get_availability(
    State(state): State<AppState>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<ApiResponse<AvailabilityReport>>, ServiceError> {
    let report = availability::get_availability(
        state.db.as_ref(),
        query.product_id,
        query.location_id,
        query.project_id,
    )
    .await?;
    Ok(Json(ApiResponse::success(report)))
}
