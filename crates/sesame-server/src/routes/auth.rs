use crate::{error::ApiError, extract::ClientInfo, state::AppState};
use axum::{
    Extension, Json,
    extract::{Query, State},
};
use serde::{Deserialize, Serialize};
use sesame_auth::{AuthorizedUser, RequestContext};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct ExchangeRequest {
    #[serde(default)]
    pub id_token: String,
}

#[derive(Debug, Serialize)]
pub struct UserOut {
    pub id: Uuid,
    pub email: Option<String>,
    pub roles: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ExchangeResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub user: UserOut,
}

#[derive(Debug, Deserialize)]
pub struct RefreshParams {
    pub rotate: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    #[serde(default)]
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub access_token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

pub async fn exchange(
    State(state): State<AppState>,
    ClientInfo(meta): ClientInfo,
    Json(body): Json<ExchangeRequest>,
) -> Result<Json<ExchangeResponse>, ApiError> {
    let outcome = state
        .orchestrator
        .exchange(
            &body.id_token,
            &meta,
            &state.default_roles,
            state.single_device,
        )
        .await?;

    Ok(Json(ExchangeResponse {
        access_token: outcome.access_token,
        refresh_token: outcome.refresh_token.into_inner(),
        user: UserOut {
            id: outcome.user.id,
            email: outcome.user.email,
            roles: outcome.roles.to_vec(),
        },
    }))
}

pub async fn refresh(
    State(state): State<AppState>,
    Query(params): Query<RefreshParams>,
    ClientInfo(meta): ClientInfo,
    Json(body): Json<RefreshRequest>,
) -> Result<Json<RefreshResponse>, ApiError> {
    let outcome = state
        .orchestrator
        .refresh(&body.refresh_token, params.rotate.unwrap_or(true), &meta)
        .await?;

    Ok(Json(RefreshResponse {
        access_token: outcome.access_token,
        refresh_token: outcome.refresh_token.map(|s| s.into_inner()),
    }))
}

pub async fn logout(
    State(state): State<AppState>,
    Extension(authorized): Extension<AuthorizedUser>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let revoked = state.orchestrator.logout(authorized.user.id).await?;
    Ok(Json(serde_json::json!({ "revoked": revoked })))
}

pub async fn me(
    State(state): State<AppState>,
    Extension(authorized): Extension<AuthorizedUser>,
    Extension(ctx): Extension<Arc<RequestContext>>,
) -> Result<Json<UserOut>, ApiError> {
    // Served from the request's memoized roles, not a second query.
    let roles = state
        .roles
        .resolve_in(&ctx, authorized.user.id)
        .await?;

    Ok(Json(UserOut {
        id: authorized.user.id,
        email: authorized.user.email,
        roles: roles.to_vec(),
    }))
}
