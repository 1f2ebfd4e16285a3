use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use subtle::ConstantTimeEq;

use crate::{error::Error, AppState};

pub const ADMIN_KEY_HEADER: &str = "x-admin-key";

/// Rejects requests whose `x-admin-key` does not match the configured key.
pub async fn require_admin_key(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, Error> {
    let Some(header) = req.headers().get(ADMIN_KEY_HEADER) else {
        return Err(Error::Unauthorized("missing_admin_key".into()));
    };
    let provided = header
        .to_str()
        .map_err(|_| Error::Unauthorized("invalid_admin_key_header".into()))?;
    let expected = state.config.admin_api_key.as_bytes();
    if ConstantTimeEq::ct_eq(provided.as_bytes(), expected).into() {
        Ok(next.run(req).await)
    } else {
        Err(Error::Unauthorized("invalid_admin_key".into()))
    }
}
