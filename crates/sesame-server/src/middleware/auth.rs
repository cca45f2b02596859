use crate::{error::ApiError, state::AppState};
use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use sesame_auth::RequestContext;
use sesame_core::RoleSet;
use std::sync::Arc;

/// Route-level requirement: the roles a caller must hold.
#[derive(Clone)]
pub struct RoleGate {
    pub state: AppState,
    pub required: RoleSet,
}

impl RoleGate {
    pub fn new(state: AppState, required: &[&str]) -> Self {
        Self {
            state,
            required: required.iter().collect(),
        }
    }

    /// Any authenticated user.
    pub fn authenticated(state: AppState) -> Self {
        Self::new(state, &[])
    }
}

/// Axum middleware running the authorization guard.
///
/// On success the request carries the [`sesame_auth::AuthorizedUser`] and the
/// request's `Arc<RequestContext>` (holding the memoized roles) as extensions.
pub async fn enforce_roles(
    State(gate): State<RoleGate>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let ctx = Arc::new(RequestContext::new());
    let bearer = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    let authorized = gate
        .state
        .guard
        .authorize(&ctx, bearer, &gate.required)
        .await?;

    tracing::debug!(
        request_id = %ctx.id(),
        user_id = %authorized.user.id,
        path = %req.uri().path(),
        "authorized"
    );
    req.extensions_mut().insert(authorized);
    req.extensions_mut().insert(ctx);

    Ok(next.run(req).await)
}
