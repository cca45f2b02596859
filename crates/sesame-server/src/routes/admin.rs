use crate::{error::ApiError, state::AppState};
use axum::{
    Extension, Json,
    extract::{Path, State},
};
use sesame_auth::{AuthError, AuthorizedUser, RoleChange};
use uuid::Uuid;

fn parse_user_id(raw: &str) -> Result<Uuid, ApiError> {
    // An id we could never have issued names no user.
    Uuid::parse_str(raw).map_err(|_| AuthError::EntityNotFound("user_not_found").into())
}

pub async fn grant_role(
    State(state): State<AppState>,
    Extension(admin): Extension<AuthorizedUser>,
    Path((user_id, role)): Path<(String, String)>,
) -> Result<Json<RoleChange>, ApiError> {
    let user_id = parse_user_id(&user_id)?;
    let change = state.roles.grant(user_id, &role).await?;
    tracing::info!(admin_id = %admin.user.id, target = %user_id, role = %change.role, "admin grant");
    Ok(Json(change))
}

pub async fn revoke_role(
    State(state): State<AppState>,
    Extension(admin): Extension<AuthorizedUser>,
    Path((user_id, role)): Path<(String, String)>,
) -> Result<Json<RoleChange>, ApiError> {
    let user_id = parse_user_id(&user_id)?;
    let change = state.roles.revoke(user_id, &role).await?;
    tracing::info!(admin_id = %admin.user.id, target = %user_id, role = %change.role, "admin revoke");
    Ok(Json(change))
}
