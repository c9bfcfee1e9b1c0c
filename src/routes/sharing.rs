use std::collections::HashMap;

use axum::{
    extract::{Json, Path, State},
    response::Redirect,
};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use uuid::Uuid;

use super::files::{DriveItem, FolderInfo};
use super::trash::MessageResponse;
use super::{non_blank, parse_item_type, to_iso};
use crate::auth::identity::normalize_email;
use crate::models::{File, ItemType, NewPermission, ShareRole, User};
use crate::state::AppState;
use crate::storage::SHORT_SIGNED_URL_TTL;
use crate::store::StoreError;
use crate::{
    auth::AuthenticatedUser,
    error::{AppError, AppResult},
};

const PUBLIC_LINK_VALIDITY_DAYS: i64 = 365;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareRequest {
    #[serde(default)]
    pub item_id: Option<String>,
    #[serde(default)]
    pub item_type: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevokeRequest {
    #[serde(default)]
    pub item_id: Option<String>,
    #[serde(default)]
    pub item_type: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Deserialize)]
pub struct SignedUrlRequest {
    #[serde(default)]
    pub path: Option<String>,
}

#[derive(Serialize)]
pub struct GrantInfo {
    pub user_id: Uuid,
    pub email: Option<String>,
    pub role: String,
    pub created_at: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicLinkResponse {
    pub public_url: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedUrlResponse {
    pub signed_url: String,
}

fn capitalized(item_type: ItemType) -> &'static str {
    match item_type {
        ItemType::File => "File",
        ItemType::Folder => "Folder",
    }
}

fn parse_item_id(raw: &str) -> AppResult<Uuid> {
    Uuid::parse_str(raw.trim()).map_err(|_| AppError::bad_request("Invalid item ID."))
}

async fn ensure_owner(
    state: &AppState,
    user: &AuthenticatedUser,
    item_type: ItemType,
    item_id: Uuid,
) -> AppResult<()> {
    let owned = match item_type {
        ItemType::File => state
            .store
            .find_file(user.user_id, item_id)
            .await?
            .is_some(),
        ItemType::Folder => state
            .store
            .find_folder(user.user_id, item_id)
            .await?
            .is_some(),
    };

    if owned {
        Ok(())
    } else {
        Err(AppError::forbidden(format!(
            "Forbidden: You are not the owner of this {item_type}."
        )))
    }
}

async fn find_recipient(state: &AppState, email: &str) -> AppResult<User> {
    let email = normalize_email(email);
    let users = state.identity.list_users().await?;
    users
        .into_iter()
        .find(|candidate| candidate.email == email)
        .ok_or_else(|| AppError::not_found("User with that email not found."))
}

pub async fn share_item(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<ShareRequest>,
) -> AppResult<Json<MessageResponse>> {
    let (Some(item_id), Some(item_type), Some(email), Some(role)) = (
        non_blank(payload.item_id),
        non_blank(payload.item_type),
        non_blank(payload.email),
        non_blank(payload.role),
    ) else {
        return Err(AppError::bad_request(
            "Item ID, type, email, and role are required.",
        ));
    };

    let item_id = parse_item_id(&item_id)?;
    let item_type = parse_item_type(&item_type)?;
    let role: ShareRole = role
        .parse()
        .map_err(|_| AppError::bad_request("Invalid role. Use viewer or editor."))?;

    ensure_owner(&state, &user, item_type, item_id).await?;

    let recipient = find_recipient(&state, &email).await?;
    if recipient.id == user.user_id {
        return Err(AppError::bad_request("You cannot share an item with yourself."));
    }

    let grant = NewPermission::for_item(recipient.id, role, item_type, item_id);
    match state.store.insert_permission(grant).await {
        Ok(_) => {}
        Err(StoreError::Conflict) => {
            return Err(AppError::conflict(
                "Could not share item. The user may already have permission.",
            ));
        }
        Err(err) => {
            error!(error = %err, %item_id, %item_type, "error sharing item");
            return Err(AppError::internal("An unexpected error occurred."));
        }
    }

    info!(
        %item_id,
        %item_type,
        role = role.as_str(),
        owner_id = %user.user_id,
        recipient_id = %recipient.id,
        "item shared"
    );

    Ok(MessageResponse::new(format!(
        "{} shared successfully with {email}.",
        capitalized(item_type)
    )))
}

pub async fn revoke_share(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<RevokeRequest>,
) -> AppResult<Json<MessageResponse>> {
    let (Some(item_id), Some(item_type), Some(email)) = (
        non_blank(payload.item_id),
        non_blank(payload.item_type),
        non_blank(payload.email),
    ) else {
        return Err(AppError::bad_request(
            "Item ID, type, and email are required.",
        ));
    };

    let item_id = parse_item_id(&item_id)?;
    let item_type = parse_item_type(&item_type)?;

    ensure_owner(&state, &user, item_type, item_id).await?;
    let recipient = find_recipient(&state, &email).await?;

    let removed = state
        .store
        .delete_permission(recipient.id, item_type, item_id)
        .await?;
    if removed == 0 {
        return Err(AppError::not_found("Permission not found."));
    }

    info!(%item_id, %item_type, recipient_id = %recipient.id, "share revoked");
    Ok(MessageResponse::new(format!(
        "Access to {item_type} revoked for {email}."
    )))
}

pub async fn list_item_permissions(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path((item_type, id)): Path<(String, Uuid)>,
) -> AppResult<Json<Vec<GrantInfo>>> {
    let item_type = parse_item_type(&item_type)?;
    ensure_owner(&state, &user, item_type, id).await?;

    let grants = state.store.permissions_for_item(item_type, id).await?;
    let emails: HashMap<Uuid, String> = state
        .identity
        .list_users()
        .await?
        .into_iter()
        .map(|user| (user.id, user.email))
        .collect();

    let body = grants
        .into_iter()
        .map(|grant| GrantInfo {
            email: emails.get(&grant.user_id).cloned(),
            user_id: grant.user_id,
            role: grant.role,
            created_at: to_iso(grant.created_at),
        })
        .collect();

    Ok(Json(body))
}

pub async fn shared_with_me(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<Vec<DriveItem>>> {
    let opaque = |err: StoreError| {
        error!(error = %err, user_id = %user.user_id, "error fetching shared items");
        AppError::opaque("error")
    };

    let grants = state
        .store
        .permissions_for_user(user.user_id)
        .await
        .map_err(opaque)?;

    let file_ids: Vec<Uuid> = grants.iter().filter_map(|grant| grant.file_id).collect();
    let folder_ids: Vec<Uuid> = grants.iter().filter_map(|grant| grant.folder_id).collect();

    let files = if file_ids.is_empty() {
        Vec::new()
    } else {
        state.store.files_by_ids(&file_ids).await.map_err(opaque)?
    };
    let folders = if folder_ids.is_empty() {
        Vec::new()
    } else {
        state
            .store
            .folders_by_ids(&folder_ids)
            .await
            .map_err(opaque)?
    };

    let items = files
        .into_iter()
        .map(DriveItem::from)
        .chain(folders.into_iter().map(|folder| {
            DriveItem::Folder(FolderInfo {
                file_type: Some("folder"),
                ..FolderInfo::from(folder)
            })
        }))
        .collect();

    Ok(Json(items))
}

pub async fn public_link(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(file_id): Path<Uuid>,
) -> AppResult<Json<PublicLinkResponse>> {
    let file = state
        .store
        .find_file(user.user_id, file_id)
        .await?
        .ok_or_else(|| AppError::not_found("File not found or you do not have permission."))?;

    let token = state
        .identity
        .jwt()
        .generate_link_token(file.id, Duration::days(PUBLIC_LINK_VALIDITY_DAYS))
        .map_err(AppError::internal)?;

    let base = state.config.public_base_url.trim_end_matches('/');
    info!(file_id = %file.id, "public link issued");

    Ok(Json(PublicLinkResponse {
        public_url: format!("{base}/files/public/{token}"),
    }))
}

pub async fn open_public_link(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> AppResult<Redirect> {
    let claims = state
        .identity
        .jwt()
        .verify_link_token(&token)
        .map_err(|err| {
            warn!(error = %err, "public link token rejected");
            AppError::unauthorized("Invalid or expired link.")
        })?;

    let file = state
        .store
        .find_file_by_id(claims.file_id)
        .await?
        .filter(|file| file.deleted_at.is_none())
        .ok_or_else(|| AppError::not_found("File not found."))?;

    let url = state
        .storage
        .presign_get_object(&file.storage_path, SHORT_SIGNED_URL_TTL)
        .await
        .map_err(|err| {
            error!(error = %err, file_id = %file.id, "failed to presign public link");
            AppError::internal(err)
        })?;

    Ok(Redirect::temporary(&url))
}

async fn can_read(state: &AppState, user_id: Uuid, file: &File) -> AppResult<bool> {
    if file.owner_id == user_id {
        return Ok(true);
    }
    if file.deleted_at.is_some() {
        return Ok(false);
    }

    let grants = state.store.permissions_for_user(user_id).await?;
    Ok(grants.iter().any(|grant| {
        grant.file_id == Some(file.id)
            || (grant.folder_id.is_some() && grant.folder_id == file.folder_id)
    }))
}

pub async fn signed_url(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<SignedUrlRequest>,
) -> AppResult<Json<SignedUrlResponse>> {
    let Some(path) = non_blank(payload.path) else {
        return Err(AppError::bad_request("File path is required."));
    };

    let file = state
        .store
        .find_file_by_storage_path(&path)
        .await?
        .ok_or_else(|| AppError::not_found("File not found."))?;
    if !can_read(&state, user.user_id, &file).await? {
        warn!(file_id = %file.id, user_id = %user.user_id, "signed url denied");
        return Err(AppError::not_found("File not found."));
    }

    let signed_url = state
        .storage
        .presign_get_object(&file.storage_path, SHORT_SIGNED_URL_TTL)
        .await
        .map_err(|err| {
            error!(error = %err, file_id = %file.id, "failed to create signed url");
            AppError::internal(err)
        })?;

    Ok(Json(SignedUrlResponse { signed_url }))
}
