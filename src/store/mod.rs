use async_trait::async_trait;
use chrono::NaiveDateTime;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{File, Folder, ItemType, NewFile, NewFolder, NewPermission, Permission};

pub mod pg;

pub use pg::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,
    #[error("record already exists")]
    Conflict,
    #[error("database error: {0}")]
    Database(diesel::result::Error),
    #[error("database pool error: {0}")]
    Pool(String),
    #[error("database task failed: {0}")]
    Task(String),
}

impl From<diesel::result::Error> for StoreError {
    fn from(value: diesel::result::Error) -> Self {
        use diesel::result::{DatabaseErrorKind, Error};

        match value {
            Error::NotFound => StoreError::NotFound,
            Error::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => StoreError::Conflict,
            other => StoreError::Database(other),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Clone)]
pub enum DriveEntry {
    Folder(Folder),
    File(File),
}

impl DriveEntry {
    pub fn item_type(&self) -> ItemType {
        match self {
            DriveEntry::Folder(_) => ItemType::Folder,
            DriveEntry::File(_) => ItemType::File,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            DriveEntry::Folder(folder) => &folder.name,
            DriveEntry::File(file) => &file.name,
        }
    }

    pub fn created_at(&self) -> NaiveDateTime {
        match self {
            DriveEntry::Folder(folder) => folder.created_at,
            DriveEntry::File(file) => file.created_at,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct FolderSubtree {
    // Root first, then descendants in discovery order.
    pub folder_ids: Vec<Uuid>,
    pub files: Vec<File>,
}

#[async_trait]
pub trait DriveStore: Send + Sync + 'static {
    async fn insert_file(&self, file: NewFile) -> StoreResult<File>;

    // Trashed rows included.
    async fn list_files(&self, owner_id: Uuid) -> StoreResult<Vec<File>>;

    async fn find_file(&self, owner_id: Uuid, file_id: Uuid) -> StoreResult<Option<File>>;

    async fn find_file_by_storage_path(&self, storage_path: &str) -> StoreResult<Option<File>>;

    async fn find_file_by_id(&self, file_id: Uuid) -> StoreResult<Option<File>>;

    async fn insert_folder(&self, folder: NewFolder) -> StoreResult<Folder>;

    async fn find_folder(&self, owner_id: Uuid, folder_id: Uuid) -> StoreResult<Option<Folder>>;

    async fn folder_contents(
        &self,
        owner_id: Uuid,
        folder_id: Option<Uuid>,
    ) -> StoreResult<Vec<DriveEntry>>;

    /// Returns `None` when no row matched `(id, owner)`.
    async fn rename_file(
        &self,
        owner_id: Uuid,
        file_id: Uuid,
        name: &str,
    ) -> StoreResult<Option<File>>;

    async fn rename_folder(
        &self,
        owner_id: Uuid,
        folder_id: Uuid,
        name: &str,
    ) -> StoreResult<Option<Folder>>;

    async fn search(&self, owner_id: Uuid, term: &str) -> StoreResult<(Vec<Folder>, Vec<File>)>;

    /// Trashes the item and, for folders, its subtree. Returns the rows stamped;
    /// 0 means nothing matched under the owner.
    async fn move_to_trash(&self, owner_id: Uuid, item_type: ItemType, item_id: Uuid)
        -> StoreResult<u64>;

    async fn restore_from_trash(
        &self,
        owner_id: Uuid,
        item_type: ItemType,
        item_id: Uuid,
    ) -> StoreResult<u64>;

    async fn trashed_items(&self, owner_id: Uuid) -> StoreResult<(Vec<Folder>, Vec<File>)>;

    /// `None` when the folder does not exist under the owner.
    async fn folder_subtree(
        &self,
        owner_id: Uuid,
        folder_id: Uuid,
    ) -> StoreResult<Option<FolderSubtree>>;

    async fn delete_items(
        &self,
        owner_id: Uuid,
        file_ids: &[Uuid],
        folder_ids: &[Uuid],
    ) -> StoreResult<()>;

    async fn insert_permission(&self, permission: NewPermission) -> StoreResult<Permission>;

    async fn permissions_for_user(&self, user_id: Uuid) -> StoreResult<Vec<Permission>>;

    async fn permissions_for_item(
        &self,
        item_type: ItemType,
        item_id: Uuid,
    ) -> StoreResult<Vec<Permission>>;

    /// Returns the number of grants removed.
    async fn delete_permission(
        &self,
        user_id: Uuid,
        item_type: ItemType,
        item_id: Uuid,
    ) -> StoreResult<u64>;

    async fn files_by_ids(&self, ids: &[Uuid]) -> StoreResult<Vec<File>>;

    async fn folders_by_ids(&self, ids: &[Uuid]) -> StoreResult<Vec<Folder>>;
}

pub fn ilike_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for ch in term.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('%');
    pattern
}
