use axum::{
    extract::{Json, Multipart, Path, Query, State},
    http::StatusCode,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use uuid::Uuid;

use super::{non_blank, parse_item_type, to_iso};
use crate::models::{File, Folder, ItemType, NewFile, NewFolder};
use crate::state::AppState;
use crate::storage::storage_path;
use crate::store::DriveEntry;
use crate::{
    auth::AuthenticatedUser,
    error::{AppError, AppResult},
};

#[derive(Debug, Clone, Serialize)]
pub struct FileInfo {
    pub id: Uuid,
    pub name: String,
    pub owner_id: Uuid,
    pub folder_id: Option<Uuid>,
    pub storage_path: String,
    pub file_type: String,
    pub size: i64,
    pub created_at: String,
    pub deleted_at: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FolderInfo {
    pub id: Uuid,
    pub name: String,
    pub owner_id: Uuid,
    pub parent_folder_id: Option<Uuid>,
    pub created_at: String,
    pub deleted_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_type: Option<&'static str>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum DriveItem {
    Folder(FolderInfo),
    File(FileInfo),
}

impl From<File> for FileInfo {
    fn from(file: File) -> Self {
        Self {
            id: file.id,
            name: file.name,
            owner_id: file.owner_id,
            folder_id: file.folder_id,
            storage_path: file.storage_path,
            file_type: file.file_type,
            size: file.size,
            created_at: to_iso(file.created_at),
            deleted_at: file.deleted_at.map(to_iso),
        }
    }
}

impl From<Folder> for FolderInfo {
    fn from(folder: Folder) -> Self {
        Self {
            id: folder.id,
            name: folder.name,
            owner_id: folder.owner_id,
            parent_folder_id: folder.parent_folder_id,
            created_at: to_iso(folder.created_at),
            deleted_at: folder.deleted_at.map(to_iso),
            file_type: None,
        }
    }
}

impl From<File> for DriveItem {
    fn from(file: File) -> Self {
        DriveItem::File(file.into())
    }
}

impl From<Folder> for DriveItem {
    fn from(folder: Folder) -> Self {
        DriveItem::Folder(folder.into())
    }
}

impl From<DriveEntry> for DriveItem {
    fn from(entry: DriveEntry) -> Self {
        match entry {
            DriveEntry::Folder(folder) => folder.into(),
            DriveEntry::File(file) => file.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortBy {
    #[default]
    Name,
    #[serde(alias = "createdAt")]
    CreatedAt,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentsQuery {
    #[serde(default)]
    pub folder_id: Option<String>,
    #[serde(default)]
    pub sort_by: SortBy,
    #[serde(default)]
    pub sort_order: SortOrder,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateFolderRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub parent_folder_id: Option<String>,
}

#[derive(Deserialize)]
pub struct RenameRequest {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: Option<String>,
}

// Folders first. Stable, so equal keys keep store order.
pub fn sort_entries(entries: &mut [DriveEntry], sort_by: SortBy, sort_order: SortOrder) {
    entries.sort_by(|a, b| {
        let group = group_rank(a).cmp(&group_rank(b));
        group.then_with(|| {
            let ordering = match sort_by {
                SortBy::Name => a.name().to_lowercase().cmp(&b.name().to_lowercase()),
                SortBy::CreatedAt => a.created_at().cmp(&b.created_at()),
            };
            match sort_order {
                SortOrder::Asc => ordering,
                SortOrder::Desc => ordering.reverse(),
            }
        })
    });
}

fn group_rank(entry: &DriveEntry) -> u8 {
    match entry.item_type() {
        ItemType::Folder => 0,
        ItemType::File => 1,
    }
}

fn parse_folder_id(raw: Option<String>) -> AppResult<Option<Uuid>> {
    non_blank(raw)
        .map(|value| {
            Uuid::parse_str(&value)
                .map_err(|_| AppError::bad_request("folderId must be a valid UUID"))
        })
        .transpose()
}

async fn ensure_active_folder(
    state: &AppState,
    owner_id: Uuid,
    folder_id: Uuid,
) -> AppResult<()> {
    match state.store.find_folder(owner_id, folder_id).await? {
        Some(folder) if folder.deleted_at.is_none() => Ok(()),
        _ => Err(AppError::not_found("Folder not found.")),
    }
}

pub async fn upload_file(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    mut multipart: Multipart,
) -> AppResult<(StatusCode, Json<FileInfo>)> {
    let mut file_bytes: Option<Vec<u8>> = None;
    let mut original_name: Option<String> = None;
    let mut content_type: Option<String> = None;
    let mut folder_field: Option<String> = None;

    while let Some(field) = multipart.next_field().await.map_err(|err| {
        error!(error = %err, "invalid multipart data");
        AppError::bad_request(format!("invalid multipart data: {err}"))
    })? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                original_name = field.file_name().map(str::to_string);
                content_type = field.content_type().map(str::to_string);
                let data = field.bytes().await.map_err(|err| {
                    error!(error = %err, "failed to read file bytes");
                    AppError::bad_request(format!("failed to read file bytes: {err}"))
                })?;
                file_bytes = Some(data.to_vec());
            }
            Some("folderId") => {
                let value = field.text().await.map_err(|err| {
                    AppError::bad_request(format!("invalid folderId: {err}"))
                })?;
                folder_field = Some(value);
            }
            _ => {}
        }
    }

    let file_bytes = file_bytes.ok_or_else(|| AppError::bad_request("No file uploaded."))?;
    let original_name = non_blank(original_name).unwrap_or_else(|| "upload".to_string());
    let folder_id = parse_folder_id(folder_field)?;

    if let Some(folder_id) = folder_id {
        ensure_active_folder(&state, user.user_id, folder_id).await?;
    }

    let file_type = content_type.unwrap_or_else(|| {
        mime_guess::from_path(&original_name)
            .first_or_octet_stream()
            .to_string()
    });
    let size = file_bytes.len() as i64;
    let file_id = Uuid::new_v4();
    let path = storage_path(
        user.user_id,
        file_id,
        Utc::now().timestamp_millis(),
        &original_name,
    );

    state
        .storage
        .put_object(&path, file_bytes, &file_type)
        .await
        .map_err(|err| {
            error!(error = %err, storage_path = %path, "blob upload failed");
            AppError::internal(err)
        })?;

    let new_file = NewFile {
        id: file_id,
        name: original_name,
        owner_id: user.user_id,
        folder_id,
        storage_path: path.clone(),
        file_type,
        size,
    };

    let file = match state.store.insert_file(new_file).await {
        Ok(file) => file,
        Err(err) => {
            error!(error = %err, storage_path = %path, "metadata insert failed after blob upload");
            if let Err(cleanup) = state.storage.remove_objects(&[path.clone()]).await {
                error!(
                    error = %cleanup,
                    storage_path = %path,
                    "orphaned blob left behind; compensating removal failed"
                );
            }
            return Err(AppError::internal(format!(
                "file stored but metadata could not be saved: {err}"
            )));
        }
    };

    info!(file_id = %file.id, user_id = %user.user_id, size, "file uploaded");
    Ok((StatusCode::CREATED, Json(file.into())))
}

pub async fn list_files(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<Vec<FileInfo>>> {
    let files = state.store.list_files(user.user_id).await?;
    Ok(Json(files.into_iter().map(FileInfo::from).collect()))
}

pub async fn create_folder(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<CreateFolderRequest>,
) -> AppResult<(StatusCode, Json<FolderInfo>)> {
    let name = non_blank(payload.name)
        .ok_or_else(|| AppError::bad_request("Folder name is required."))?;

    let parent_folder_id = parse_folder_id(payload.parent_folder_id)?;
    if let Some(parent_id) = parent_folder_id {
        ensure_active_folder(&state, user.user_id, parent_id).await?;
    }

    let folder = state
        .store
        .insert_folder(NewFolder {
            id: Uuid::new_v4(),
            name,
            owner_id: user.user_id,
            parent_folder_id,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(folder.into())))
}

pub async fn list_contents(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<ContentsQuery>,
) -> AppResult<Json<Vec<DriveItem>>> {
    let folder_id = parse_folder_id(query.folder_id)?;

    let mut entries = state
        .store
        .folder_contents(user.user_id, folder_id)
        .await
        .map_err(|err| {
            error!(error = %err, "error fetching contents");
            AppError::opaque("error occur")
        })?;

    sort_entries(&mut entries, query.sort_by, query.sort_order);
    Ok(Json(entries.into_iter().map(DriveItem::from).collect()))
}

pub async fn rename_item(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path((item_type, id)): Path<(String, Uuid)>,
    Json(payload): Json<RenameRequest>,
) -> AppResult<Json<DriveItem>> {
    let name =
        non_blank(payload.name).ok_or_else(|| AppError::bad_request("New name is required."))?;
    let item_type = parse_item_type(&item_type)?;

    let renamed: Option<DriveItem> = match item_type {
        ItemType::File => state
            .store
            .rename_file(user.user_id, id, &name)
            .await
            .map(|file| file.map(DriveItem::from)),
        ItemType::Folder => state
            .store
            .rename_folder(user.user_id, id, &name)
            .await
            .map(|folder| folder.map(DriveItem::from)),
    }
    .map_err(|err| AppError::internal(format!("Failed to rename {item_type}: {err}")))?;

    match renamed {
        Some(item) => Ok(Json(item)),
        None => {
            warn!(%id, %item_type, user_id = %user.user_id, "rename matched no owned row");
            Err(AppError::not_found(format!("{item_type} not found.")))
        }
    }
}

pub async fn search(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<SearchQuery>,
) -> AppResult<Json<Vec<DriveItem>>> {
    let term =
        non_blank(query.q).ok_or_else(|| AppError::bad_request("Search query is required."))?;

    let (folders, files) = state
        .store
        .search(user.user_id, &term)
        .await
        .map_err(|err| {
            error!(error = %err, "search failed");
            AppError::opaque("error occur")
        })?;

    let results = folders
        .into_iter()
        .map(DriveItem::from)
        .chain(files.into_iter().map(DriveItem::from))
        .collect();
    Ok(Json(results))
}
