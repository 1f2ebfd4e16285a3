pub mod admin_auth;
pub mod application;
pub mod health;
pub mod internship;
pub mod webhook;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::services::ServeDir;

use crate::AppState;

/// All routes. Stored CVs under `/uploads` need the admin key like the rest
/// of the admin API. Tracing is layered on in `main`.
pub fn router(state: AppState) -> Router {
    let admin_api = Router::new()
        .route(
            "/api/internships",
            get(internship::list_internships).post(internship::create_internship),
        )
        .route(
            "/api/internships/:id",
            axum::routing::delete(internship::deactivate_internship),
        )
        .route(
            "/api/internships/:id/secret",
            post(internship::regenerate_secret),
        )
        .route("/api/internships/:id/share", get(internship::share_internship))
        .route("/api/applications", get(application::list_applications))
        .route("/api/applications/:id", get(application::get_application))
        .route(
            "/api/applications/:id/status",
            post(application::update_status),
        )
        .route("/api/duplicates/scan", post(application::scan_duplicates))
        .nest_service("/uploads", ServeDir::new(&state.config.uploads_dir))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            admin_auth::require_admin_key,
        ));

    Router::new()
        .route("/health", get(health::health))
        .route(
            "/webhook/whatsapp",
            get(webhook::verify).post(webhook::receive),
        )
        .merge(admin_api)
        .with_state(state)
}
