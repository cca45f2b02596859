use axum::{Extension, Json};
use serde_json::{Value, json};
use sesame_auth::AuthorizedUser;

pub async fn pro_only(Extension(user): Extension<AuthorizedUser>) -> Json<Value> {
    Json(json!({ "ok": true, "as": "pro", "user_id": user.user.id }))
}

pub async fn admin_only(Extension(user): Extension<AuthorizedUser>) -> Json<Value> {
    Json(json!({ "ok": true, "as": "admin", "user_id": user.user.id }))
}
