use async_trait::async_trait;
use chrono::NaiveDateTime;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::sql_types::{BigInt, Nullable, Text, Timestamptz, Uuid as SqlUuid};
use uuid::Uuid;

use super::{DriveEntry, DriveStore, FolderSubtree, StoreError, StoreResult};
use crate::auth::identity::UserDirectory;
use crate::db::PgPool;
use crate::models::{
    File, Folder, ItemType, NewFile, NewFolder, NewPermission, NewUser, Permission, User,
};
use crate::schema::{files, folders, permissions, users};

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn run<T, F>(&self, op: F) -> StoreResult<T>
    where
        F: FnOnce(&mut PgConnection) -> StoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool
                .get()
                .map_err(|err| StoreError::Pool(err.to_string()))?;
            op(&mut conn)
        })
        .await
        .map_err(|err| StoreError::Task(err.to_string()))?
    }
}

#[derive(QueryableByName)]
struct ContentRow {
    #[diesel(sql_type = SqlUuid)]
    id: Uuid,
    #[diesel(sql_type = Text)]
    name: String,
    #[diesel(sql_type = Text)]
    item_type: String,
    #[diesel(sql_type = SqlUuid)]
    owner_id: Uuid,
    #[diesel(sql_type = Nullable<SqlUuid>)]
    parent_id: Option<Uuid>,
    #[diesel(sql_type = Nullable<Text>)]
    storage_path: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    file_type: Option<String>,
    #[diesel(sql_type = Nullable<BigInt>)]
    size: Option<i64>,
    #[diesel(sql_type = Timestamptz)]
    created_at: NaiveDateTime,
}

impl From<ContentRow> for DriveEntry {
    fn from(row: ContentRow) -> Self {
        if row.item_type == "folder" {
            DriveEntry::Folder(Folder {
                id: row.id,
                name: row.name,
                owner_id: row.owner_id,
                parent_folder_id: row.parent_id,
                created_at: row.created_at,
                deleted_at: None,
            })
        } else {
            DriveEntry::File(File {
                id: row.id,
                name: row.name,
                owner_id: row.owner_id,
                folder_id: row.parent_id,
                storage_path: row.storage_path.unwrap_or_default(),
                file_type: row.file_type.unwrap_or_default(),
                size: row.size.unwrap_or_default(),
                created_at: row.created_at,
                deleted_at: None,
            })
        }
    }
}

#[derive(QueryableByName)]
struct Touched {
    #[diesel(sql_type = BigInt)]
    touched: i64,
}

fn call_trash_procedure(
    conn: &mut PgConnection,
    procedure: &str,
    owner_id: Uuid,
    item_type: ItemType,
    item_id: Uuid,
) -> StoreResult<u64> {
    let row: Touched = diesel::sql_query(format!("SELECT {procedure}($1, $2, $3) AS touched"))
        .bind::<SqlUuid, _>(item_id)
        .bind::<Text, _>(item_type.as_str())
        .bind::<SqlUuid, _>(owner_id)
        .get_result(conn)?;
    Ok(row.touched.max(0) as u64)
}

fn gather_descendant_folder_ids(
    conn: &mut PgConnection,
    owner_id: Uuid,
    folder_id: Uuid,
) -> StoreResult<Vec<Uuid>> {
    let mut ids = vec![folder_id];
    let mut queue = vec![folder_id];

    while let Some(current) = queue.pop() {
        let child_ids: Vec<Uuid> = folders::table
            .filter(folders::parent_folder_id.eq(current))
            .filter(folders::owner_id.eq(owner_id))
            .select(folders::id)
            .load(conn)?;
        queue.extend(child_ids.iter().copied());
        ids.extend(child_ids);
    }

    Ok(ids)
}

#[async_trait]
impl DriveStore for PgStore {
    async fn insert_file(&self, file: NewFile) -> StoreResult<File> {
        self.run(move |conn| {
            Ok(diesel::insert_into(files::table)
                .values(&file)
                .get_result(conn)?)
        })
        .await
    }

    async fn list_files(&self, owner_id: Uuid) -> StoreResult<Vec<File>> {
        self.run(move |conn| {
            Ok(files::table
                .filter(files::owner_id.eq(owner_id))
                .order(files::created_at.asc())
                .load(conn)?)
        })
        .await
    }

    async fn find_file(&self, owner_id: Uuid, file_id: Uuid) -> StoreResult<Option<File>> {
        self.run(move |conn| {
            Ok(files::table
                .filter(files::id.eq(file_id))
                .filter(files::owner_id.eq(owner_id))
                .first(conn)
                .optional()?)
        })
        .await
    }

    async fn find_file_by_storage_path(&self, storage_path: &str) -> StoreResult<Option<File>> {
        let storage_path = storage_path.to_string();
        self.run(move |conn| {
            Ok(files::table
                .filter(files::storage_path.eq(storage_path))
                .first(conn)
                .optional()?)
        })
        .await
    }

    async fn find_file_by_id(&self, file_id: Uuid) -> StoreResult<Option<File>> {
        self.run(move |conn| Ok(files::table.find(file_id).first(conn).optional()?))
            .await
    }

    async fn insert_folder(&self, folder: NewFolder) -> StoreResult<Folder> {
        self.run(move |conn| {
            Ok(diesel::insert_into(folders::table)
                .values(&folder)
                .get_result(conn)?)
        })
        .await
    }

    async fn find_folder(&self, owner_id: Uuid, folder_id: Uuid) -> StoreResult<Option<Folder>> {
        self.run(move |conn| {
            Ok(folders::table
                .filter(folders::id.eq(folder_id))
                .filter(folders::owner_id.eq(owner_id))
                .first(conn)
                .optional()?)
        })
        .await
    }

    async fn folder_contents(
        &self,
        owner_id: Uuid,
        folder_id: Option<Uuid>,
    ) -> StoreResult<Vec<DriveEntry>> {
        self.run(move |conn| {
            let rows: Vec<ContentRow> =
                diesel::sql_query("SELECT * FROM get_folder_contents($1, $2)")
                    .bind::<Nullable<SqlUuid>, _>(folder_id)
                    .bind::<SqlUuid, _>(owner_id)
                    .load(conn)?;
            Ok(rows.into_iter().map(DriveEntry::from).collect())
        })
        .await
    }

    async fn rename_file(
        &self,
        owner_id: Uuid,
        file_id: Uuid,
        name: &str,
    ) -> StoreResult<Option<File>> {
        let name = name.to_string();
        self.run(move |conn| {
            Ok(diesel::update(
                files::table
                    .filter(files::id.eq(file_id))
                    .filter(files::owner_id.eq(owner_id)),
            )
            .set(files::name.eq(name))
            .get_result(conn)
            .optional()?)
        })
        .await
    }

    async fn rename_folder(
        &self,
        owner_id: Uuid,
        folder_id: Uuid,
        name: &str,
    ) -> StoreResult<Option<Folder>> {
        let name = name.to_string();
        self.run(move |conn| {
            Ok(diesel::update(
                folders::table
                    .filter(folders::id.eq(folder_id))
                    .filter(folders::owner_id.eq(owner_id)),
            )
            .set(folders::name.eq(name))
            .get_result(conn)
            .optional()?)
        })
        .await
    }

    async fn search(&self, owner_id: Uuid, term: &str) -> StoreResult<(Vec<Folder>, Vec<File>)> {
        let pattern = super::ilike_pattern(term);
        self.run(move |conn| {
            let matched_folders: Vec<Folder> = folders::table
                .filter(folders::owner_id.eq(owner_id))
                .filter(folders::deleted_at.is_null())
                .filter(folders::name.ilike(&pattern))
                .load(conn)?;
            let matched_files: Vec<File> = files::table
                .filter(files::owner_id.eq(owner_id))
                .filter(files::deleted_at.is_null())
                .filter(files::name.ilike(&pattern))
                .load(conn)?;
            Ok((matched_folders, matched_files))
        })
        .await
    }

    async fn move_to_trash(
        &self,
        owner_id: Uuid,
        item_type: ItemType,
        item_id: Uuid,
    ) -> StoreResult<u64> {
        self.run(move |conn| {
            call_trash_procedure(conn, "move_to_trash", owner_id, item_type, item_id)
        })
        .await
    }

    async fn restore_from_trash(
        &self,
        owner_id: Uuid,
        item_type: ItemType,
        item_id: Uuid,
    ) -> StoreResult<u64> {
        self.run(move |conn| {
            call_trash_procedure(conn, "restore_from_trash", owner_id, item_type, item_id)
        })
        .await
    }

    async fn trashed_items(&self, owner_id: Uuid) -> StoreResult<(Vec<Folder>, Vec<File>)> {
        self.run(move |conn| {
            let trashed_folders: Vec<Folder> = folders::table
                .filter(folders::owner_id.eq(owner_id))
                .filter(folders::deleted_at.is_not_null())
                .order(folders::deleted_at.desc())
                .load(conn)?;
            let trashed_files: Vec<File> = files::table
                .filter(files::owner_id.eq(owner_id))
                .filter(files::deleted_at.is_not_null())
                .order(files::deleted_at.desc())
                .load(conn)?;
            Ok((trashed_folders, trashed_files))
        })
        .await
    }

    async fn folder_subtree(
        &self,
        owner_id: Uuid,
        folder_id: Uuid,
    ) -> StoreResult<Option<FolderSubtree>> {
        self.run(move |conn| {
            let root: Option<Folder> = folders::table
                .filter(folders::id.eq(folder_id))
                .filter(folders::owner_id.eq(owner_id))
                .first(conn)
                .optional()?;
            if root.is_none() {
                return Ok(None);
            }

            let folder_ids = gather_descendant_folder_ids(conn, owner_id, folder_id)?;
            let contained: Vec<File> = files::table
                .filter(files::owner_id.eq(owner_id))
                .filter(files::folder_id.eq_any(folder_ids.clone()))
                .load(conn)?;

            Ok(Some(FolderSubtree {
                folder_ids,
                files: contained,
            }))
        })
        .await
    }

    async fn delete_items(
        &self,
        owner_id: Uuid,
        file_ids: &[Uuid],
        folder_ids: &[Uuid],
    ) -> StoreResult<()> {
        let file_ids = file_ids.to_vec();
        let folder_ids = folder_ids.to_vec();
        self.run(move |conn| {
            conn.transaction::<(), StoreError, _>(|conn| {
                if !file_ids.is_empty() {
                    diesel::delete(
                        files::table
                            .filter(files::id.eq_any(file_ids.clone()))
                            .filter(files::owner_id.eq(owner_id)),
                    )
                    .execute(conn)?;
                }
                if !folder_ids.is_empty() {
                    diesel::delete(
                        folders::table
                            .filter(folders::id.eq_any(folder_ids.clone()))
                            .filter(folders::owner_id.eq(owner_id)),
                    )
                    .execute(conn)?;
                }
                Ok(())
            })
        })
        .await
    }

    async fn insert_permission(&self, permission: NewPermission) -> StoreResult<Permission> {
        self.run(move |conn| {
            Ok(diesel::insert_into(permissions::table)
                .values(&permission)
                .get_result(conn)?)
        })
        .await
    }

    async fn permissions_for_user(&self, user_id: Uuid) -> StoreResult<Vec<Permission>> {
        self.run(move |conn| {
            Ok(permissions::table
                .filter(permissions::user_id.eq(user_id))
                .order(permissions::created_at.asc())
                .load(conn)?)
        })
        .await
    }

    async fn permissions_for_item(
        &self,
        item_type: ItemType,
        item_id: Uuid,
    ) -> StoreResult<Vec<Permission>> {
        self.run(move |conn| {
            let query = permissions::table
                .order(permissions::created_at.asc())
                .into_boxed();
            let query = match item_type {
                ItemType::File => query.filter(permissions::file_id.eq(item_id)),
                ItemType::Folder => query.filter(permissions::folder_id.eq(item_id)),
            };
            Ok(query.load(conn)?)
        })
        .await
    }

    async fn delete_permission(
        &self,
        user_id: Uuid,
        item_type: ItemType,
        item_id: Uuid,
    ) -> StoreResult<u64> {
        self.run(move |conn| {
            let removed = match item_type {
                ItemType::File => diesel::delete(
                    permissions::table
                        .filter(permissions::user_id.eq(user_id))
                        .filter(permissions::file_id.eq(item_id)),
                )
                .execute(conn)?,
                ItemType::Folder => diesel::delete(
                    permissions::table
                        .filter(permissions::user_id.eq(user_id))
                        .filter(permissions::folder_id.eq(item_id)),
                )
                .execute(conn)?,
            };
            Ok(removed as u64)
        })
        .await
    }

    async fn files_by_ids(&self, ids: &[Uuid]) -> StoreResult<Vec<File>> {
        let ids = ids.to_vec();
        self.run(move |conn| Ok(files::table.filter(files::id.eq_any(ids)).load(conn)?))
            .await
    }

    async fn folders_by_ids(&self, ids: &[Uuid]) -> StoreResult<Vec<Folder>> {
        let ids = ids.to_vec();
        self.run(move |conn| Ok(folders::table.filter(folders::id.eq_any(ids)).load(conn)?))
            .await
    }
}

#[async_trait]
impl UserDirectory for PgStore {
    async fn insert_user(&self, user: NewUser) -> StoreResult<User> {
        self.run(move |conn| {
            Ok(diesel::insert_into(users::table)
                .values(&user)
                .get_result(conn)?)
        })
        .await
    }

    async fn find_user(&self, user_id: Uuid) -> StoreResult<Option<User>> {
        self.run(move |conn| Ok(users::table.find(user_id).first(conn).optional()?))
            .await
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let email = email.to_string();
        self.run(move |conn| {
            Ok(users::table
                .filter(users::email.eq(email))
                .first(conn)
                .optional()?)
        })
        .await
    }

    async fn list_users(&self) -> StoreResult<Vec<User>> {
        self.run(move |conn| Ok(users::table.order(users::created_at.asc()).load(conn)?))
            .await
    }
}
