use std::collections::HashSet;

use axum::extract::{Json, Path, State};
use serde::Serialize;
use tracing::{error, info};
use uuid::Uuid;

use super::files::DriveItem;
use super::parse_item_type;
use crate::models::{File, Folder, ItemType};
use crate::state::AppState;
use crate::{
    auth::AuthenticatedUser,
    error::{AppError, AppResult},
};

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            message: message.into(),
        })
    }
}

// Roots of trashed subtrees only: the parent is absent or not itself trashed.
pub fn top_level_trash(folders: Vec<Folder>, files: Vec<File>) -> Vec<DriveItem> {
    let trashed_folder_ids: HashSet<Uuid> = folders.iter().map(|folder| folder.id).collect();
    let is_top_level = |parent: Option<Uuid>| {
        parent.map_or(true, |parent_id| !trashed_folder_ids.contains(&parent_id))
    };

    let top_folders: Vec<DriveItem> = folders
        .into_iter()
        .filter(|folder| is_top_level(folder.parent_folder_id))
        .map(DriveItem::from)
        .collect();
    let top_files = files
        .into_iter()
        .filter(|file| is_top_level(file.folder_id))
        .map(DriveItem::from);

    top_folders.into_iter().chain(top_files).collect()
}

pub async fn move_to_trash(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path((item_type, id)): Path<(String, Uuid)>,
) -> AppResult<Json<MessageResponse>> {
    let item_type = parse_item_type(&item_type)?;

    let touched = state
        .store
        .move_to_trash(user.user_id, item_type, id)
        .await
        .map_err(|err| {
            error!(error = %err, %id, %item_type, "error moving to trash");
            AppError::internal(format!("Failed to move {item_type} to trash: error"))
        })?;

    if touched == 0 {
        return Err(AppError::not_found(format!("{item_type} not found.")));
    }

    info!(%id, %item_type, touched, user_id = %user.user_id, "moved to trash");
    Ok(MessageResponse::new(format!(
        "{item_type} and its contents moved to trash."
    )))
}

pub async fn restore_item(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path((item_type, id)): Path<(String, Uuid)>,
) -> AppResult<Json<MessageResponse>> {
    let item_type = parse_item_type(&item_type)?;

    let touched = state
        .store
        .restore_from_trash(user.user_id, item_type, id)
        .await
        .map_err(|err| {
            error!(error = %err, %id, %item_type, "error restoring from trash");
            AppError::internal(format!("Failed to restore {item_type}: \"error\""))
        })?;

    if touched == 0 {
        return Err(AppError::not_found(format!("{item_type} not found in trash.")));
    }

    info!(%id, %item_type, touched, user_id = %user.user_id, "restored from trash");
    Ok(MessageResponse::new(format!(
        "{item_type} and its contents restored."
    )))
}

pub async fn list_trash(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<Vec<DriveItem>>> {
    let (folders, files) = state
        .store
        .trashed_items(user.user_id)
        .await
        .map_err(|err| {
            error!(error = %err, "error fetching trash");
            AppError::opaque("error occur")
        })?;

    Ok(Json(top_level_trash(folders, files)))
}

pub async fn delete_permanently(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path((item_type, id)): Path<(String, Uuid)>,
) -> AppResult<Json<MessageResponse>> {
    let item_type = parse_item_type(&item_type)?;

    let (blob_paths, file_ids, folder_ids) = match item_type {
        ItemType::File => {
            let file = state
                .store
                .find_file(user.user_id, id)
                .await
                .map_err(|err| {
                    error!(error = %err, %id, "permanent delete lookup failed");
                    AppError::opaque("error occur")
                })?
                .ok_or_else(|| AppError::not_found("File not found."))?;
            (vec![file.storage_path], vec![file.id], Vec::new())
        }
        ItemType::Folder => {
            let subtree = state
                .store
                .folder_subtree(user.user_id, id)
                .await
                .map_err(|err| {
                    error!(error = %err, %id, "permanent delete lookup failed");
                    AppError::opaque("error occur")
                })?
                .ok_or_else(|| AppError::not_found("Folder not found."))?;
            let (paths, ids): (Vec<String>, Vec<Uuid>) = subtree
                .files
                .into_iter()
                .map(|file| (file.storage_path, file.id))
                .unzip();
            (paths, ids, subtree.folder_ids)
        }
    };

    if !blob_paths.is_empty() {
        state
            .storage
            .remove_objects(&blob_paths)
            .await
            .map_err(|err| {
                error!(error = %err, %id, %item_type, "blob removal failed");
                AppError::opaque("error occur")
            })?;
    }

    if let Err(err) = state
        .store
        .delete_items(user.user_id, &file_ids, &folder_ids)
        .await
    {
        error!(
            error = %err,
            %id,
            %item_type,
            ?file_ids,
            ?folder_ids,
            "partial permanent delete: blobs removed but rows remain"
        );
        return Err(AppError::internal(
            "Stored data was removed but the records could not be deleted.",
        ));
    }

    info!(
        %id,
        %item_type,
        files = file_ids.len(),
        folders = folder_ids.len(),
        user_id = %user.user_id,
        "permanently deleted"
    );

    let message = match item_type {
        ItemType::File => "File permanently deleted.",
        ItemType::Folder => "Folder and contents permanently deleted.",
    };
    Ok(MessageResponse::new(message))
}
