use anyhow::Context;
use tracing::info;

use super::dto::MembershipInfo;
use crate::{
    error::{AppError, AppResult},
    users::{membership, repo_types::ProfileChanges, User, UserStore},
};

pub async fn get_profile(users: &dyn UserStore, user_id: i64) -> AppResult<User> {
    users
        .find_by_id(user_id)
        .await
        .context("Failed to load profile")?
        .ok_or_else(AppError::user_not_found)
}

pub async fn update_profile(
    users: &dyn UserStore,
    user_id: i64,
    changes: ProfileChanges,
) -> AppResult<User> {
    let user = users
        .update_profile(user_id, &changes)
        .await
        .context("Failed to update profile")?
        .ok_or_else(AppError::user_not_found)?;
    info!(
        user_id,
        first_name = changes.first_name.is_some(),
        last_name = changes.last_name.is_some(),
        phone = changes.phone.is_some(),
        "profile updated"
    );
    Ok(user)
}

pub async fn membership(users: &dyn UserStore, user_id: i64) -> AppResult<MembershipInfo> {
    let user = get_profile(users, user_id).await?;
    let member_since =
        membership::member_since(user.created_at).context("Failed to format member_since")?;
    Ok(MembershipInfo {
        full_name: membership::full_name(&user),
        membership_id: user.membership_id,
        member_level: user.member_level,
        points: user.points,
        member_since,
        email: user.email,
        phone: user.phone,
    })
}
