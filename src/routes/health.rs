use axum::{http::StatusCode, response::Json};
use serde_json::json;

use crate::auth::AuthenticatedUser;

pub async fn root() -> &'static str {
    "Backend Server is Running!"
}

pub async fn health_check() -> (StatusCode, Json<serde_json::Value>) {
    (StatusCode::OK, Json(json!({ "status": "ok" })))
}

pub async fn protected_route(user: AuthenticatedUser) -> String {
    format!(
        "✅ Welcome user {}! You have accessed a protected route.",
        user.email
    )
}
