pub mod identity;
pub mod jwt;
pub mod password;

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use axum_extra::headers::{authorization::Bearer, Authorization};
use axum_extra::TypedHeader;
use serde::{Deserialize, Serialize};

use crate::{error::AppError, state::AppState};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthenticatedUser {
    pub user_id: uuid::Uuid,
    pub email: String,
}

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<AuthenticatedUser>() {
            return Ok(user.clone());
        }

        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| {
                    AppError::unauthorized("Authentication required. No token provided.")
                })?;

        let user = state.identity.get_user(bearer.token()).await.map_err(|err| {
            tracing::debug!(error = %err, "bearer token rejected");
            AppError::unauthorized("Invalid or expired token.")
        })?;

        let authenticated = AuthenticatedUser {
            user_id: user.id,
            email: user.email,
        };
        parts.extensions.insert(authenticated.clone());
        Ok(authenticated)
    }
}
