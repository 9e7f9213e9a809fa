use axum::{extract::State, routing::get, Json, Router};
use tracing::instrument;

use super::{
    dto::{MembershipInfo, ProfileResponse, UpdateProfileRequest},
    services,
};
use crate::{auth::AuthUser, error::AppResult, extract::JsonBody, state::AppState};

pub fn profile_routes() -> Router<AppState> {
    Router::new()
        .route("/profile", get(get_profile).put(update_profile))
        .route("/profile/membership", get(get_membership))
}

#[instrument(skip_all)]
pub async fn get_profile(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
) -> AppResult<Json<ProfileResponse>> {
    let user = services::get_profile(state.users.as_ref(), identity.user_id).await?;
    Ok(Json(ProfileResponse { user }))
}

#[instrument(skip_all)]
pub async fn update_profile(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    JsonBody(payload): JsonBody<UpdateProfileRequest>,
) -> AppResult<Json<ProfileResponse>> {
    let user =
        services::update_profile(state.users.as_ref(), identity.user_id, payload.into()).await?;
    Ok(Json(ProfileResponse { user }))
}

#[instrument(skip_all)]
pub async fn get_membership(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
) -> AppResult<Json<MembershipInfo>> {
    let info = services::membership(state.users.as_ref(), identity.user_id).await?;
    Ok(Json(info))
}
