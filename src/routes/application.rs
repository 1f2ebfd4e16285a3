use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Json},
};
use uuid::Uuid;

use crate::{
    dto::application_dto::UpdateStatusPayload,
    error::{Error, Result},
    services::application_service::ApplicationFilter,
    utils::time,
    AppState,
};

#[axum::debug_handler]
pub async fn list_applications(
    State(state): State<AppState>,
    Query(filter): Query<ApplicationFilter>,
) -> Result<impl IntoResponse> {
    let applications = state.applications.list(&filter).await?;
    Ok(Json(applications))
}

#[axum::debug_handler]
pub async fn get_application(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let application = state
        .applications
        .get(id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Application {} not found", id)))?;
    Ok(Json(application))
}

#[axum::debug_handler]
pub async fn update_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateStatusPayload>,
) -> Result<impl IntoResponse> {
    let response = state
        .review_service
        .update_status(id, payload.status, payload.notify)
        .await?;
    Ok(Json(response))
}

#[axum::debug_handler]
pub async fn scan_duplicates(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let summary = state.duplicate_service.scan_unchecked(time::now()).await?;
    Ok(Json(summary))
}
