use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tracing::instrument;

use super::{
    dto::{AuthResponse, LoginRequest, RegisterRequest},
    jwt::AuthUser,
    services,
};
use crate::{error::AppResult, extract::JsonBody, state::AppState};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
}

pub fn protected_routes() -> Router<AppState> {
    Router::new().route("/protected", get(protected))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<RegisterRequest>,
) -> AppResult<(StatusCode, Json<AuthResponse>)> {
    let res = services::register(state.users.as_ref(), &state.keys, payload).await?;
    Ok((StatusCode::CREATED, Json(res)))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<LoginRequest>,
) -> AppResult<Json<AuthResponse>> {
    let res = services::login(state.users.as_ref(), &state.keys, payload).await?;
    Ok(Json(res))
}

/// Echoes the identity carried by the token; no storage access.
#[instrument(skip_all)]
pub async fn protected(AuthUser(identity): AuthUser) -> Json<Value> {
    Json(json!({
        "message": "This is a protected route",
        "user_id": identity.user_id,
        "email": identity.email,
    }))
}
