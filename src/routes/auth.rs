use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    auth::{
        identity::{Session, UserInfo},
        AuthenticatedUser,
    },
    error::{AppError, AppResult},
    state::AppState,
};

#[derive(Deserialize)]
pub struct CredentialsRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

impl CredentialsRequest {
    fn validate(self) -> AppResult<(String, String)> {
        match (self.email, self.password) {
            (Some(email), Some(password)) if !email.trim().is_empty() && !password.is_empty() => {
                Ok((email, password))
            }
            _ => Err(AppError::bad_request("Email and password are required.")),
        }
    }
}

#[derive(Serialize)]
pub struct SignupResponse {
    pub user: UserInfo,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub session: Session,
}

pub async fn signup(
    State(state): State<AppState>,
    Json(payload): Json<CredentialsRequest>,
) -> AppResult<(StatusCode, Json<SignupResponse>)> {
    let (email, password) = payload.validate()?;

    let user = state.identity.sign_up(&email, &password).await?;
    info!(user_id = %user.id, "user signed up");

    Ok((
        StatusCode::CREATED,
        Json(SignupResponse { user: user.into() }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<CredentialsRequest>,
) -> AppResult<Json<LoginResponse>> {
    let (email, password) = payload.validate()?;

    let session = state.identity.sign_in(&email, &password).await?;

    Ok(Json(LoginResponse { session }))
}

pub async fn me(user: AuthenticatedUser) -> Json<AuthenticatedUser> {
    Json(user)
}
