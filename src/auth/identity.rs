
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use super::{jwt::JwtService, password};
use crate::models::{NewUser, User};
use crate::routes::to_iso;
use crate::store::{StoreError, StoreResult};

#[async_trait]
pub trait UserDirectory: Send + Sync + 'static {
    /// Fails with [`StoreError::Conflict`] when the email is taken.
    async fn insert_user(&self, user: NewUser) -> StoreResult<User>;

    async fn find_user(&self, user_id: Uuid) -> StoreResult<Option<User>>;

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;

    async fn list_users(&self) -> StoreResult<Vec<User>>;
}

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("User already registered")]
    EmailTaken,
    #[error("Invalid login credentials")]
    InvalidCredentials,
    #[error("invalid or expired token")]
    InvalidToken,
    #[error("identity directory error: {0}")]
    Directory(#[from] StoreError),
    #[error("credential processing failed: {0}")]
    Credential(String),
}

pub type IdentityResult<T> = Result<T, IdentityError>;

#[derive(Debug, Clone, Serialize)]
pub struct UserInfo {
    pub id: Uuid,
    pub email: String,
    pub created_at: String,
}

impl From<User> for UserInfo {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            created_at: to_iso(user.created_at),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub user: UserInfo,
}

#[derive(Clone)]
pub struct IdentityService {
    jwt: JwtService,
    directory: Arc<dyn UserDirectory>,
}

impl IdentityService {
    pub fn new(jwt: JwtService, directory: Arc<dyn UserDirectory>) -> Self {
        Self { jwt, directory }
    }

    pub fn jwt(&self) -> &JwtService {
        &self.jwt
    }

    pub async fn sign_up(&self, email: &str, password: &str) -> IdentityResult<User> {
        let email = normalize_email(email);
        let password_hash = password::hash_password(password)
            .map_err(|err| IdentityError::Credential(err.to_string()))?;

        let user = NewUser {
            id: Uuid::new_v4(),
            email,
            password_hash,
        };

        match self.directory.insert_user(user).await {
            Ok(user) => Ok(user),
            Err(StoreError::Conflict) => Err(IdentityError::EmailTaken),
            Err(err) => Err(err.into()),
        }
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> IdentityResult<Session> {
        let email = normalize_email(email);
        let user = self
            .directory
            .find_user_by_email(&email)
            .await?
            .ok_or(IdentityError::InvalidCredentials)?;

        let valid = password::verify_password(password, &user.password_hash)
            .map_err(|err| IdentityError::Credential(err.to_string()))?;
        if !valid {
            return Err(IdentityError::InvalidCredentials);
        }

        let access_token = self
            .jwt
            .generate_token(user.id, &user.email)
            .map_err(|err| IdentityError::Credential(err.to_string()))?;

        Ok(Session {
            access_token,
            token_type: "bearer".to_string(),
            expires_in: self.jwt.expires_in(),
            user: user.into(),
        })
    }

    pub async fn get_user(&self, token: &str) -> IdentityResult<User> {
        let claims = self
            .jwt
            .verify_token(token)
            .map_err(|_| IdentityError::InvalidToken)?;
        self.directory
            .find_user(claims.sub)
            .await?
            .ok_or(IdentityError::InvalidToken)
    }

    pub async fn list_users(&self) -> IdentityResult<Vec<User>> {
        Ok(self.directory.list_users().await?)
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
