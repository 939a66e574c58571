//! Database repository for users, playlists and items.
//!
//! [`SqliteStore`] borrows one connection and implements every collaborator
//! trait of the metrics engine, so a whole propagation cascade runs on the
//! same connection inside one transaction.

use chrono::NaiveDateTime;
use diesel::connection::{AnsiTransactionManager, TransactionManager};
use diesel::prelude::*;
use diesel::sql_types::{BigInt, Double, Integer};
use thiserror::Error;

use crate::db::schema::{items, playlists, users};
use crate::metrics::store::{
    ItemFilter, ItemSource, ItemWriter, PlaylistSource, QuotaPolicy, RepoResult, SizeAndCount,
    UnitOfWork,
};
use crate::models::{
    Item, ItemMetrics, ItemType, NewItem, NewPlaylist, ParseEnumError, Playlist, PlaylistMetrics,
    User, UserRoles,
};

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("Database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Invalid stored value: {0}")]
    InvalidEnum(#[from] ParseEnumError),

    #[error("Invalid stored data: {0}")]
    InvalidData(String),
}

// ============================================================================
// Rows
// ============================================================================

/// Database row representation for users.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = users)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct UserRow {
    pub id: i32,
    pub username: String,
    pub company_id: i32,
    pub admin_role: bool,
    pub simple_admin_role: bool,
    pub sub_admin_role: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.id,
            username: row.username,
            company_id: row.company_id,
            roles: UserRoles {
                admin_role: row.admin_role,
                simple_admin_role: row.simple_admin_role,
                sub_admin_role: row.sub_admin_role,
            },
        }
    }
}

/// Data for inserting a new user.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = users)]
pub struct NewUser<'a> {
    pub username: &'a str,
    pub company_id: i32,
    pub admin_role: bool,
    pub simple_admin_role: bool,
    pub sub_admin_role: bool,
}

impl<'a> NewUser<'a> {
    /// Create a new company administrator, exempt from playlist time limits.
    pub fn simple_admin(username: &'a str, company_id: i32) -> Self {
        Self {
            simple_admin_role: true,
            ..Self::regular(username, company_id)
        }
    }

    /// Create a new sub-admin who contributes items to other users' playlists.
    pub fn sub_admin(username: &'a str, company_id: i32) -> Self {
        Self {
            sub_admin_role: true,
            ..Self::regular(username, company_id)
        }
    }

    /// Create a new regular user without any privileges.
    pub fn regular(username: &'a str, company_id: i32) -> Self {
        Self {
            username,
            company_id,
            admin_role: false,
            simple_admin_role: false,
            sub_admin_role: false,
        }
    }
}

/// Database row representation for playlists.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = playlists)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct PlaylistRow {
    pub playlist_id: i32,
    pub uid: i32,
    pub company_id: i32,
    pub playlist_name: String,
    pub playlist_mode: String,
    pub time_limit: i64,
    pub shuffle: bool,
    pub shuffle_picking: i32,
    pub multizone: Option<String>,
    pub duration: i64,
    pub owner_duration: i64,
    pub filesize: i64,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl TryFrom<PlaylistRow> for Playlist {
    type Error = RepoError;

    fn try_from(row: PlaylistRow) -> Result<Self, Self::Error> {
        let multizone = match row.multizone.as_deref() {
            None | Some("") => Vec::new(),
            Some(json) => serde_json::from_str(json).map_err(|e| {
                RepoError::InvalidData(format!("zones of playlist {}: {}", row.playlist_id, e))
            })?,
        };

        Ok(Playlist {
            playlist_id: row.playlist_id,
            uid: row.uid,
            company_id: row.company_id,
            playlist_name: row.playlist_name,
            mode: row.playlist_mode.parse()?,
            time_limit: row.time_limit,
            shuffle: row.shuffle,
            shuffle_picking: row.shuffle_picking,
            multizone,
            duration: row.duration,
            owner_duration: row.owner_duration,
            filesize: row.filesize,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Data for inserting a new playlist.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = playlists)]
pub struct NewPlaylistRow<'a> {
    pub uid: i32,
    pub company_id: i32,
    pub playlist_name: &'a str,
    pub playlist_mode: &'a str,
    pub time_limit: i64,
    pub shuffle: bool,
    pub shuffle_picking: i32,
    pub multizone: Option<String>,
}

impl<'a> TryFrom<&'a NewPlaylist> for NewPlaylistRow<'a> {
    type Error = RepoError;

    fn try_from(playlist: &'a NewPlaylist) -> Result<Self, Self::Error> {
        let multizone = if playlist.multizone.is_empty() {
            None
        } else {
            Some(
                serde_json::to_string(&playlist.multizone)
                    .map_err(|e| RepoError::InvalidData(e.to_string()))?,
            )
        };

        Ok(Self {
            uid: playlist.uid,
            company_id: playlist.company_id,
            playlist_name: &playlist.playlist_name,
            playlist_mode: playlist.mode.as_str(),
            time_limit: playlist.time_limit,
            shuffle: playlist.shuffle,
            shuffle_picking: playlist.shuffle_picking,
            multizone,
        })
    }
}

/// Database row representation for playlist items.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = items)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct ItemRow {
    pub item_id: i32,
    pub playlist_id: i32,
    pub uid: i32,
    pub item_type: String,
    pub file_resource: String,
    pub item_name: String,
    pub item_duration: f64,
    pub item_filesize: i64,
    pub item_order: i32,
    pub disabled: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl TryFrom<ItemRow> for Item {
    type Error = RepoError;

    fn try_from(row: ItemRow) -> Result<Self, Self::Error> {
        Ok(Item {
            item_id: row.item_id,
            playlist_id: row.playlist_id,
            uid: row.uid,
            item_type: row.item_type.parse()?,
            file_resource: row.file_resource,
            item_name: row.item_name,
            item_duration: row.item_duration,
            item_filesize: row.item_filesize,
            item_order: row.item_order,
            disabled: row.disabled,
        })
    }
}

/// Data for inserting a new item.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = items)]
pub struct NewItemRow<'a> {
    pub playlist_id: i32,
    pub uid: i32,
    pub item_type: &'a str,
    pub file_resource: &'a str,
    pub item_name: &'a str,
    pub item_duration: f64,
    pub item_filesize: i64,
    pub item_order: i32,
}

/// Helper struct for size and count aggregates
#[derive(QueryableByName)]
struct SizeAndCountRow {
    #[diesel(sql_type = BigInt)]
    total_size: i64,
    #[diesel(sql_type = BigInt)]
    total_entries: i64,
}

/// Helper struct for duration sums
#[derive(QueryableByName)]
struct DurationRow {
    #[diesel(sql_type = Double)]
    total_duration: f64,
}

// ============================================================================
// Store
// ============================================================================

/// Repository over a single SQLite connection.
pub struct SqliteStore<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> SqliteStore<'c> {
    /// Create a store on top of a connection (pooled connections deref into one).
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        Self { conn }
    }

    /// Create a new user.
    pub fn create_user(&mut self, new_user: &NewUser) -> RepoResult<User> {
        let conn = &mut *self.conn;

        // Check if username already exists
        let existing = users::table
            .filter(users::username.eq(new_user.username))
            .count()
            .get_result::<i64>(conn)?;

        if existing > 0 {
            return Err(RepoError::AlreadyExists(new_user.username.to_string()));
        }

        diesel::insert_into(users::table)
            .values(new_user)
            .execute(conn)?;

        // Fetch the created user
        let user = users::table
            .filter(users::username.eq(new_user.username))
            .select(UserRow::as_select())
            .first(conn)?;

        Ok(User::from(user))
    }

    /// Find a user by ID.
    pub fn find_user_by_id(&mut self, user_id: i32) -> RepoResult<Option<User>> {
        let result = users::table
            .filter(users::id.eq(user_id))
            .select(UserRow::as_select())
            .first(&mut *self.conn)
            .optional()?;

        Ok(result.map(User::from))
    }

    /// Create a new playlist with empty aggregates.
    pub fn create_playlist(&mut self, new_playlist: &NewPlaylist) -> RepoResult<Playlist> {
        let row = NewPlaylistRow::try_from(new_playlist)?;

        let created = self.conn.transaction::<_, RepoError, _>(|conn| {
            diesel::insert_into(playlists::table)
                .values(&row)
                .execute(conn)?;

            Ok(playlists::table
                .order(playlists::playlist_id.desc())
                .select(PlaylistRow::as_select())
                .first(conn)?)
        })?;

        Playlist::try_from(created)
    }
}

impl ItemSource for SqliteStore<'_> {
    fn sum_and_count_by_playlist(&mut self, playlist_id: i32) -> RepoResult<SizeAndCount> {
        let row = diesel::sql_query(
            "SELECT COALESCE(SUM(item_filesize), 0) AS total_size, COUNT(*) AS total_entries \
             FROM items WHERE playlist_id = ?",
        )
        .bind::<Integer, _>(playlist_id)
        .get_result::<SizeAndCountRow>(&mut *self.conn)?;

        Ok(SizeAndCount {
            total_size: row.total_size,
            total_entries: row.total_entries,
        })
    }

    fn sum_duration_of_enabled_by_playlist(&mut self, playlist_id: i32) -> RepoResult<i64> {
        let row = diesel::sql_query(
            "SELECT COALESCE(SUM(ROUND(item_duration)), 0.0) AS total_duration \
             FROM items WHERE playlist_id = ? AND disabled = 0",
        )
        .bind::<Integer, _>(playlist_id)
        .get_result::<DurationRow>(&mut *self.conn)?;

        Ok(row.total_duration.round() as i64)
    }

    fn sum_duration_of_items_by_owner_and_playlist(
        &mut self,
        owner_id: i32,
        playlist_id: i32,
    ) -> RepoResult<i64> {
        let row = diesel::sql_query(
            "SELECT COALESCE(SUM(ROUND(item_duration)), 0.0) AS total_duration \
             FROM items WHERE playlist_id = ? AND uid = ?",
        )
        .bind::<Integer, _>(playlist_id)
        .bind::<Integer, _>(owner_id)
        .get_result::<DurationRow>(&mut *self.conn)?;

        Ok(row.total_duration.round() as i64)
    }

    fn find_all_items_by_playlist(&mut self, playlist_id: i32) -> RepoResult<Vec<Item>> {
        let rows = items::table
            .filter(items::playlist_id.eq(playlist_id))
            .select(ItemRow::as_select())
            .order((items::item_order.asc(), items::item_id.asc()))
            .load(&mut *self.conn)?;

        rows.into_iter().map(Item::try_from).collect()
    }

    fn find_parent_playlists_containing(&mut self, playlist_id: i32) -> RepoResult<Vec<Playlist>> {
        let nesting_playlists = items::table
            .filter(items::item_type.eq(ItemType::Playlist.as_str()))
            .filter(items::file_resource.eq(playlist_id.to_string()))
            .select(items::playlist_id);

        let rows = playlists::table
            .filter(playlists::playlist_id.eq_any(nesting_playlists))
            .select(PlaylistRow::as_select())
            .order(playlists::playlist_id.asc())
            .load(&mut *self.conn)?;

        rows.into_iter().map(Playlist::try_from).collect()
    }

    fn update_item_metrics(
        &mut self,
        filter: ItemFilter,
        metrics: ItemMetrics,
    ) -> RepoResult<usize> {
        let conn = &mut *self.conn;
        let values = (
            items::item_duration.eq(metrics.duration as f64),
            items::item_filesize.eq(metrics.filesize),
            items::updated_at.eq(diesel::dsl::now),
        );

        let updated = match filter {
            ItemFilter::Item(item_id) => {
                diesel::update(items::table.filter(items::item_id.eq(item_id)))
                    .set(values)
                    .execute(conn)?
            }
            ItemFilter::NestedPlaylist(playlist_id) => diesel::update(
                items::table
                    .filter(items::item_type.eq(ItemType::Playlist.as_str()))
                    .filter(items::file_resource.eq(playlist_id.to_string())),
            )
            .set(values)
            .execute(conn)?,
        };

        Ok(updated)
    }
}

impl ItemWriter for SqliteStore<'_> {
    fn load_item(&mut self, item_id: i32) -> RepoResult<Option<Item>> {
        let row = items::table
            .filter(items::item_id.eq(item_id))
            .select(ItemRow::as_select())
            .first(&mut *self.conn)
            .optional()?;

        row.map(Item::try_from).transpose()
    }

    fn insert_item(&mut self, item: &NewItem, duration: f64, filesize: i64) -> RepoResult<Item> {
        let created = self.conn.transaction::<_, RepoError, _>(|conn| {
            let count = items::table
                .filter(items::playlist_id.eq(item.playlist_id))
                .count()
                .get_result::<i64>(conn)?;

            let position = item
                .position
                .map(|p| p.max(0))
                .filter(|p| i64::from(*p) < count);

            let item_order = match position {
                Some(position) => {
                    // Make room at the requested position
                    diesel::update(
                        items::table
                            .filter(items::playlist_id.eq(item.playlist_id))
                            .filter(items::item_order.ge(position)),
                    )
                    .set(items::item_order.eq(items::item_order + 1))
                    .execute(conn)?;
                    position
                }
                None => count as i32,
            };

            let row = NewItemRow {
                playlist_id: item.playlist_id,
                uid: item.uid,
                item_type: item.item_type.as_str(),
                file_resource: &item.file_resource,
                item_name: &item.item_name,
                item_duration: duration,
                item_filesize: filesize,
                item_order,
            };
            diesel::insert_into(items::table).values(&row).execute(conn)?;

            Ok(items::table
                .filter(items::playlist_id.eq(item.playlist_id))
                .order(items::item_id.desc())
                .select(ItemRow::as_select())
                .first(conn)?)
        })?;

        Item::try_from(created)
    }

    fn set_item_duration(&mut self, item_id: i32, duration: f64) -> RepoResult<usize> {
        let updated = diesel::update(items::table.filter(items::item_id.eq(item_id)))
            .set((
                items::item_duration.eq(duration),
                items::updated_at.eq(diesel::dsl::now),
            ))
            .execute(&mut *self.conn)?;

        Ok(updated)
    }

    fn delete_item(&mut self, item_id: i32) -> RepoResult<bool> {
        self.conn.transaction::<_, RepoError, _>(|conn| {
            let row = items::table
                .filter(items::item_id.eq(item_id))
                .select(ItemRow::as_select())
                .first(conn)
                .optional()?;

            let Some(row) = row else {
                return Ok(false);
            };

            diesel::delete(items::table.filter(items::item_id.eq(item_id))).execute(conn)?;

            // Close the gap so positions stay dense
            diesel::update(
                items::table
                    .filter(items::playlist_id.eq(row.playlist_id))
                    .filter(items::item_order.gt(row.item_order)),
            )
            .set(items::item_order.eq(items::item_order - 1))
            .execute(conn)?;

            Ok(true)
        })
    }
}

impl PlaylistSource for SqliteStore<'_> {
    fn load_by_id(&mut self, playlist_id: i32) -> RepoResult<Option<Playlist>> {
        let row = playlists::table
            .filter(playlists::playlist_id.eq(playlist_id))
            .select(PlaylistRow::as_select())
            .first(&mut *self.conn)
            .optional()?;

        row.map(Playlist::try_from).transpose()
    }

    fn update_metrics(&mut self, playlist_id: i32, metrics: PlaylistMetrics) -> RepoResult<usize> {
        let target = playlists::table.filter(playlists::playlist_id.eq(playlist_id));
        let updated = diesel::update(target)
            .set((
                playlists::duration.eq(metrics.duration),
                playlists::owner_duration.eq(metrics.owner_duration),
                playlists::filesize.eq(metrics.filesize),
                playlists::updated_at.eq(diesel::dsl::now),
            ))
            .execute(&mut *self.conn)?;

        Ok(updated)
    }
}

impl QuotaPolicy for SqliteStore<'_> {
    fn is_exempt_from_quota(&mut self, owner_id: i32) -> RepoResult<bool> {
        // Unknown users get no exemption
        Ok(self
            .find_user_by_id(owner_id)?
            .is_some_and(|user| user.is_exempt_from_quota()))
    }
}

impl UnitOfWork for SqliteStore<'_> {
    fn begin(&mut self) -> RepoResult<()> {
        AnsiTransactionManager::begin_transaction(&mut *self.conn)?;
        Ok(())
    }

    fn commit(&mut self) -> RepoResult<()> {
        AnsiTransactionManager::commit_transaction(&mut *self.conn)?;
        Ok(())
    }

    fn rollback(&mut self) -> RepoResult<()> {
        AnsiTransactionManager::rollback_transaction(&mut *self.conn)?;
        Ok(())
    }
}
