use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::schema::*;

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = users)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = users)]
pub struct NewUser {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = folders)]
pub struct Folder {
    pub id: Uuid,
    pub name: String,
    pub owner_id: Uuid,
    pub parent_folder_id: Option<Uuid>,
    pub created_at: NaiveDateTime,
    pub deleted_at: Option<NaiveDateTime>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = folders)]
pub struct NewFolder {
    pub id: Uuid,
    pub name: String,
    pub owner_id: Uuid,
    pub parent_folder_id: Option<Uuid>,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = files)]
#[diesel(belongs_to(Folder, foreign_key = folder_id))]
pub struct File {
    pub id: Uuid,
    pub name: String,
    pub owner_id: Uuid,
    pub folder_id: Option<Uuid>,
    pub storage_path: String,
    pub file_type: String,
    pub size: i64,
    pub created_at: NaiveDateTime,
    pub deleted_at: Option<NaiveDateTime>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = files)]
pub struct NewFile {
    pub id: Uuid,
    pub name: String,
    pub owner_id: Uuid,
    pub folder_id: Option<Uuid>,
    pub storage_path: String,
    pub file_type: String,
    pub size: i64,
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = permissions)]
pub struct Permission {
    pub id: Uuid,
    pub user_id: Uuid,
    pub role: String,
    pub file_id: Option<Uuid>,
    pub folder_id: Option<Uuid>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = permissions)]
pub struct NewPermission {
    pub id: Uuid,
    pub user_id: Uuid,
    pub role: String,
    pub file_id: Option<Uuid>,
    pub folder_id: Option<Uuid>,
}

impl NewPermission {
    /// Builds a grant with exactly one of `file_id`/`folder_id` set.
    pub fn for_item(user_id: Uuid, role: ShareRole, item_type: ItemType, item_id: Uuid) -> Self {
        let (file_id, folder_id) = match item_type {
            ItemType::File => (Some(item_id), None),
            ItemType::Folder => (None, Some(item_id)),
        };
        Self {
            id: Uuid::new_v4(),
            user_id,
            role: role.as_str().to_string(),
            file_id,
            folder_id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemType {
    File,
    Folder,
}

impl ItemType {
    pub fn as_str(self) -> &'static str {
        match self {
            ItemType::File => "file",
            ItemType::Folder => "folder",
        }
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ItemType {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "file" => Ok(ItemType::File),
            "folder" => Ok(ItemType::Folder),
            other => Err(format!("invalid item type: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShareRole {
    Viewer,
    Editor,
}

impl ShareRole {
    pub fn as_str(self) -> &'static str {
        match self {
            ShareRole::Viewer => "viewer",
            ShareRole::Editor => "editor",
        }
    }
}

impl FromStr for ShareRole {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "viewer" => Ok(ShareRole::Viewer),
            "editor" => Ok(ShareRole::Editor),
            other => Err(format!("invalid role: {other}")),
        }
    }
}
