use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::internship_dto::{CreateInternshipPayload, InternshipView},
    error::{Error, Result},
    models::internship::Internship,
    services::internship_service::share_message,
    utils::time,
    AppState,
};

fn view(internship: Internship) -> InternshipView {
    let is_open = internship.is_open(time::now());
    InternshipView { internship, is_open }
}

#[axum::debug_handler]
pub async fn create_internship(
    State(state): State<AppState>,
    Json(payload): Json<CreateInternshipPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let internship = state.internships.create(&payload).await?;
    Ok((StatusCode::CREATED, Json(view(internship))))
}

#[axum::debug_handler]
pub async fn list_internships(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let internships = state.internships.list_active().await?;
    Ok(Json(internships.into_iter().map(view).collect::<Vec<_>>()))
}

#[axum::debug_handler]
pub async fn regenerate_secret(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let internship = state.internships.regenerate_secret(id).await?;
    Ok(Json(view(internship)))
}

#[axum::debug_handler]
pub async fn deactivate_internship(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    state.internships.deactivate(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[axum::debug_handler]
pub async fn share_internship(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let internship = state
        .internships
        .get(id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Internship {} not found", id)))?;
    Ok(Json(share_message(&internship, &state.config.whatsapp_number)))
}
