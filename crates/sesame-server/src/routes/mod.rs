pub mod admin;
pub mod auth;
pub mod demo;

use crate::{
    middleware::auth::{RoleGate, enforce_roles},
    state::AppState,
};
use axum::{
    Json, Router,
    middleware::from_fn_with_state,
    routing::{get, post},
};
use serde_json::json;
use tower_http::trace::TraceLayer;

/// Build the application router.
pub fn router(state: AppState) -> Router {
    let authenticated = Router::new()
        .route("/auth/logout", post(auth::logout))
        .route("/auth/me", get(auth::me))
        .route_layer(from_fn_with_state(
            RoleGate::authenticated(state.clone()),
            enforce_roles,
        ));

    let admin = Router::new()
        .route(
            "/admin/users/{id}/roles/{role}",
            post(admin::grant_role).delete(admin::revoke_role),
        )
        .route("/demo/admin-only", get(demo::admin_only))
        .route_layer(from_fn_with_state(
            RoleGate::new(state.clone(), &["admin"]),
            enforce_roles,
        ));

    let pro = Router::new()
        .route("/demo/pro-only", get(demo::pro_only))
        .route_layer(from_fn_with_state(
            RoleGate::new(state.clone(), &["pro"]),
            enforce_roles,
        ));

    Router::new()
        .route("/healthz", get(healthz))
        .route("/auth/exchange", post(auth::exchange))
        .route("/auth/refresh", post(auth::refresh))
        .merge(authenticated)
        .merge(admin)
        .merge(pro)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn healthz() -> Json<serde_json::Value> {
    Json(json!({ "ok": true, "service": "sesame-server" }))
}
