//! SQLite entity store for linkhub.
//!
//! Holds every durable record of the system: users and their connection sets,
//! connection requests, direct messages, notifications, posts, likes, comments
//! and the event outbox. Cross-references are plain row ids, joined into
//! [`UserBrief`] projections at read time.
//!
//! The store performs single-statement reads and writes. Callers that need
//! several writes to land together wrap them in [`Storage::in_transaction`].

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, Type, ValueRef};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("already exists: {0}")]
    AlreadyExists(String),
}

/// Turn a UNIQUE constraint violation into [`StorageError::AlreadyExists`].
fn map_unique(err: rusqlite::Error, what: &str) -> StorageError {
    match &err {
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                || e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY =>
        {
            StorageError::AlreadyExists(what.to_string())
        }
        _ => StorageError::Sqlite(err),
    }
}

// ---------------------------------------------------------------------------
// Enumerated columns
// ---------------------------------------------------------------------------

/// Lifecycle state of a connection request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    Pending,
    Accepted,
}

/// What a notification is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    ConnectionRequest,
    ConnectionAccepted,
    Message,
}

/// Entity type a notification's `related_id` points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RelatedModel {
    Connection,
    Message,
}

macro_rules! text_enum {
    ($ty:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $ty {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($ty::$variant => $text),+
                }
            }
        }

        impl FromStr for $ty {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($ty::$variant),)+
                    other => Err(format!("unknown {}: {other}", stringify!($ty))),
                }
            }
        }

        impl ToSql for $ty {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.as_str()))
            }
        }

        impl FromSql for $ty {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                let text = value.as_str()?;
                text.parse()
                    .map_err(|e: String| FromSqlError::Other(e.into()))
            }
        }
    };
}

text_enum!(ConnectionStatus {
    Pending => "pending",
    Accepted => "accepted",
});

text_enum!(NotificationKind {
    ConnectionRequest => "connection_request",
    ConnectionAccepted => "connection_accepted",
    Message => "message",
});

text_enum!(RelatedModel {
    Connection => "Connection",
    Message => "Message",
});

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// One entry of a user's work history.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExperienceEntry {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub company: String,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(default)]
    pub current: bool,
    #[serde(default)]
    pub description: String,
}

/// User row. `skills` and `experience` are stored as JSON text columns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRow {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub bio: String,
    pub avatar: String,
    pub skills: Vec<String>,
    pub experience: Vec<ExperienceEntry>,
    pub created_at: u64,
}

/// Reduced user projection used wherever another entity references a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserBrief {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub avatar: String,
}

/// Connection request row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionRow {
    pub id: i64,
    pub requester_id: i64,
    pub recipient_id: i64,
    pub status: ConnectionStatus,
    pub created_at: u64,
    pub updated_at: u64,
}

impl ConnectionRow {
    pub fn involves(&self, user_id: i64) -> bool {
        self.requester_id == user_id || self.recipient_id == user_id
    }
}

/// Direct message row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageRow {
    pub id: i64,
    pub sender_id: i64,
    pub recipient_id: i64,
    pub content: String,
    pub read: bool,
    pub created_at: u64,
}

/// Notification row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationRow {
    pub id: i64,
    pub recipient_id: i64,
    pub sender_id: i64,
    pub kind: NotificationKind,
    pub content: String,
    pub read: bool,
    pub related_id: Option<i64>,
    pub related_model: Option<RelatedModel>,
    pub created_at: u64,
}

/// Post row. Likes and comments live in their own tables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostRow {
    pub id: i64,
    pub author_id: i64,
    pub content: String,
    pub image: String,
    pub created_at: u64,
    pub updated_at: u64,
}

/// Comment row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentRow {
    pub id: i64,
    pub post_id: i64,
    pub author_id: i64,
    pub text: String,
    pub created_at: u64,
}

/// Outbox row: a published domain event waiting for the notification writer.
/// Rows are deleted once the writer has handled them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboxRow {
    pub id: i64,
    pub kind: String,
    pub payload: String,
    pub created_at: u64,
}

/// Entity counts reported by the health endpoint.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StoreCounts {
    pub users: u32,
    pub connections: u32,
    pub messages: u32,
    pub notifications: u32,
    pub posts: u32,
}

// ---------------------------------------------------------------------------
// Row mappers
// ---------------------------------------------------------------------------

fn json_column<T: DeserializeOwned>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let text: String = row.get(idx)?;
    serde_json::from_str(&text)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

const USER_COLUMNS: &str = "id, name, email, bio, avatar, skills, experience, created_at";

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        bio: row.get(3)?,
        avatar: row.get(4)?,
        skills: json_column(row, 5)?,
        experience: json_column(row, 6)?,
        created_at: row.get::<_, i64>(7)? as u64,
    })
}

fn brief_from_row(row: &Row<'_>) -> rusqlite::Result<UserBrief> {
    Ok(UserBrief {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        avatar: row.get(3)?,
    })
}

const CONNECTION_COLUMNS: &str =
    "id, requester_id, recipient_id, status, created_at, updated_at";

fn connection_from_row(row: &Row<'_>) -> rusqlite::Result<ConnectionRow> {
    Ok(ConnectionRow {
        id: row.get(0)?,
        requester_id: row.get(1)?,
        recipient_id: row.get(2)?,
        status: row.get(3)?,
        created_at: row.get::<_, i64>(4)? as u64,
        updated_at: row.get::<_, i64>(5)? as u64,
    })
}

const MESSAGE_COLUMNS: &str = "id, sender_id, recipient_id, content, read, created_at";

fn message_from_row(row: &Row<'_>) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        id: row.get(0)?,
        sender_id: row.get(1)?,
        recipient_id: row.get(2)?,
        content: row.get(3)?,
        read: row.get::<_, i32>(4)? != 0,
        created_at: row.get::<_, i64>(5)? as u64,
    })
}

const NOTIFICATION_COLUMNS: &str =
    "id, recipient_id, sender_id, type, content, read, related_id, related_model, created_at";

fn notification_from_row(row: &Row<'_>) -> rusqlite::Result<NotificationRow> {
    Ok(NotificationRow {
        id: row.get(0)?,
        recipient_id: row.get(1)?,
        sender_id: row.get(2)?,
        kind: row.get(3)?,
        content: row.get(4)?,
        read: row.get::<_, i32>(5)? != 0,
        related_id: row.get(6)?,
        related_model: row.get(7)?,
        created_at: row.get::<_, i64>(8)? as u64,
    })
}

const POST_COLUMNS: &str = "id, author_id, content, image, created_at, updated_at";

fn post_from_row(row: &Row<'_>) -> rusqlite::Result<PostRow> {
    Ok(PostRow {
        id: row.get(0)?,
        author_id: row.get(1)?,
        content: row.get(2)?,
        image: row.get(3)?,
        created_at: row.get::<_, i64>(4)? as u64,
        updated_at: row.get::<_, i64>(5)? as u64,
    })
}

const COMMENT_COLUMNS: &str = "id, post_id, author_id, text, created_at";

fn comment_from_row(row: &Row<'_>) -> rusqlite::Result<CommentRow> {
    Ok(CommentRow {
        id: row.get(0)?,
        post_id: row.get(1)?,
        author_id: row.get(2)?,
        text: row.get(3)?,
        created_at: row.get::<_, i64>(4)? as u64,
    })
}

fn outbox_from_row(row: &Row<'_>) -> rusqlite::Result<OutboxRow> {
    Ok(OutboxRow {
        id: row.get(0)?,
        kind: row.get(1)?,
        payload: row.get(2)?,
        created_at: row.get::<_, i64>(3)? as u64,
    })
}

/// Narrow a SQLite count to `u32`, saturating instead of wrapping.
fn clamp_count(n: i64) -> u32 {
    u32::try_from(n.max(0)).unwrap_or(u32::MAX)
}

/// Canonical ordering of an unordered user pair.
fn ordered_pair(a: i64, b: i64) -> (i64, i64) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

// ---------------------------------------------------------------------------
// Storage handle
// ---------------------------------------------------------------------------

/// Main storage handle wrapping a SQLite connection.
pub struct Storage {
    conn: Connection,
}

impl Storage {
    /// Open or create a database at the given path. Creates schema if needed.
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        let storage = Self { conn };
        storage.create_schema()?;
        Ok(storage)
    }

    /// Create a throwaway in-memory database.
    pub fn open_in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        let storage = Self { conn };
        storage.create_schema()?;
        Ok(storage)
    }

    fn create_schema(&self) -> Result<(), StorageError> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS users (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                name        TEXT NOT NULL,
                email       TEXT NOT NULL UNIQUE,
                bio         TEXT NOT NULL DEFAULT '',
                avatar      TEXT NOT NULL DEFAULT '',
                skills      TEXT NOT NULL DEFAULT '[]',
                experience  TEXT NOT NULL DEFAULT '[]',
                created_at  INTEGER NOT NULL
            );

            -- Each user's connection set. Symmetric: (a, b) present iff (b, a) present.
            CREATE TABLE IF NOT EXISTS user_connections (
                user_id     INTEGER NOT NULL REFERENCES users(id),
                peer_id     INTEGER NOT NULL REFERENCES users(id),
                added_at    INTEGER NOT NULL,
                PRIMARY KEY (user_id, peer_id)
            );

            CREATE TABLE IF NOT EXISTS connections (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                requester_id    INTEGER NOT NULL REFERENCES users(id),
                recipient_id    INTEGER NOT NULL REFERENCES users(id),
                status          TEXT NOT NULL DEFAULT 'pending',
                user_low        INTEGER NOT NULL,
                user_high       INTEGER NOT NULL,
                created_at      INTEGER NOT NULL,
                updated_at      INTEGER NOT NULL
            );

            -- At most one connection per unordered pair.
            CREATE UNIQUE INDEX IF NOT EXISTS idx_connections_pair
                ON connections(user_low, user_high);
            CREATE INDEX IF NOT EXISTS idx_connections_recipient
                ON connections(recipient_id, status);
            CREATE INDEX IF NOT EXISTS idx_connections_requester
                ON connections(requester_id, status);

            CREATE TABLE IF NOT EXISTS messages (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                sender_id       INTEGER NOT NULL REFERENCES users(id),
                recipient_id    INTEGER NOT NULL REFERENCES users(id),
                content         TEXT NOT NULL,
                read            INTEGER NOT NULL DEFAULT 0,
                created_at      INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_messages_recipient
                ON messages(recipient_id, read);
            CREATE INDEX IF NOT EXISTS idx_messages_pair
                ON messages(sender_id, recipient_id, created_at);

            CREATE TABLE IF NOT EXISTS notifications (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                recipient_id    INTEGER NOT NULL REFERENCES users(id),
                sender_id       INTEGER NOT NULL REFERENCES users(id),
                type            TEXT NOT NULL,
                content         TEXT NOT NULL,
                read            INTEGER NOT NULL DEFAULT 0,
                related_id      INTEGER,
                related_model   TEXT,
                created_at      INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_notifications_recipient
                ON notifications(recipient_id, read, created_at);

            CREATE TABLE IF NOT EXISTS posts (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                author_id   INTEGER NOT NULL REFERENCES users(id),
                content     TEXT NOT NULL,
                image       TEXT NOT NULL DEFAULT '',
                created_at  INTEGER NOT NULL,
                updated_at  INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS post_likes (
                post_id     INTEGER NOT NULL REFERENCES posts(id),
                user_id     INTEGER NOT NULL REFERENCES users(id),
                liked_at    INTEGER NOT NULL,
                PRIMARY KEY (post_id, user_id)
            );

            CREATE TABLE IF NOT EXISTS comments (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                post_id     INTEGER NOT NULL REFERENCES posts(id),
                author_id   INTEGER NOT NULL REFERENCES users(id),
                text        TEXT NOT NULL,
                created_at  INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_comments_post
                ON comments(post_id, created_at);

            CREATE TABLE IF NOT EXISTS outbox (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                kind        TEXT NOT NULL,
                payload     TEXT NOT NULL,
                created_at  INTEGER NOT NULL
            );
            ",
        )?;
        Ok(())
    }

    /// Run `f` inside a single SQLite transaction.
    ///
    /// Commits when `f` returns `Ok`; any error rolls back every write `f`
    /// made. Not reentrant: `f` must not call `in_transaction` again.
    pub fn in_transaction<T, E>(&self, f: impl FnOnce(&Self) -> Result<T, E>) -> Result<T, E>
    where
        E: From<StorageError>,
    {
        let tx = self
            .conn
            .unchecked_transaction()
            .map_err(StorageError::from)?;
        let out = f(self)?;
        tx.commit().map_err(StorageError::from)?;
        Ok(out)
    }

    /// Raw connection access for tests that need to inject faults.
    #[cfg(test)]
    pub(crate) fn raw(&self) -> &Connection {
        &self.conn
    }

    pub fn counts(&self) -> Result<StoreCounts, StorageError> {
        let count = |table: &str| -> Result<u32, StorageError> {
            let n: i64 =
                self.conn
                    .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
                        row.get(0)
                    })?;
            Ok(clamp_count(n))
        };
        Ok(StoreCounts {
            users: count("users")?,
            connections: count("connections")?,
            messages: count("messages")?,
            notifications: count("notifications")?,
            posts: count("posts")?,
        })
    }

    // -----------------------------------------------------------------------
    // Users CRUD
    // -----------------------------------------------------------------------

    /// Insert a user. The row's `id` is ignored; the new id is returned.
    /// A duplicate email yields [`StorageError::AlreadyExists`].
    pub fn insert_user(&self, row: &UserRow) -> Result<i64, StorageError> {
        let skills = serde_json::to_string(&row.skills)?;
        let experience = serde_json::to_string(&row.experience)?;
        self.conn
            .execute(
                "INSERT INTO users (name, email, bio, avatar, skills, experience, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    row.name,
                    row.email,
                    row.bio,
                    row.avatar,
                    skills,
                    experience,
                    row.created_at as i64,
                ],
            )
            .map_err(|e| map_unique(e, "email already registered"))?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn get_user(&self, id: i64) -> Result<Option<UserRow>, StorageError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1");
        let row = self
            .conn
            .query_row(&sql, params![id], user_from_row)
            .optional()?;
        Ok(row)
    }

    pub fn user_exists(&self, id: i64) -> Result<bool, StorageError> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM users WHERE id = ?1",
            params![id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    pub fn list_users(&self) -> Result<Vec<UserRow>, StorageError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users ORDER BY id");
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], user_from_row)?;
        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    /// Overwrite the profile fields of an existing user.
    pub fn update_user(&self, row: &UserRow) -> Result<bool, StorageError> {
        let skills = serde_json::to_string(&row.skills)?;
        let experience = serde_json::to_string(&row.experience)?;
        let affected = self
            .conn
            .execute(
                "UPDATE users
                 SET name = ?1, email = ?2, bio = ?3, avatar = ?4, skills = ?5, experience = ?6
                 WHERE id = ?7",
                params![
                    row.name,
                    row.email,
                    row.bio,
                    row.avatar,
                    skills,
                    experience,
                    row.id
                ],
            )
            .map_err(|e| map_unique(e, "email already registered"))?;
        Ok(affected > 0)
    }

    pub fn get_user_brief(&self, id: i64) -> Result<Option<UserBrief>, StorageError> {
        let row = self
            .conn
            .query_row(
                "SELECT id, name, email, avatar FROM users WHERE id = ?1",
                params![id],
                brief_from_row,
            )
            .optional()?;
        Ok(row)
    }

    // -----------------------------------------------------------------------
    // Connection sets
    // -----------------------------------------------------------------------

    /// Ids in a user's connection set, ascending.
    pub fn list_user_connections(&self, user_id: i64) -> Result<Vec<i64>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT peer_id FROM user_connections WHERE user_id = ?1 ORDER BY peer_id",
        )?;
        let rows = stmt.query_map(params![user_id], |row| row.get(0))?;
        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    /// Add `peer_id` to `user_id`'s set. Set semantics: re-adding is a no-op
    /// that returns `false`.
    pub fn add_user_connection(
        &self,
        user_id: i64,
        peer_id: i64,
        now: u64,
    ) -> Result<bool, StorageError> {
        let affected = self.conn.execute(
            "INSERT OR IGNORE INTO user_connections (user_id, peer_id, added_at)
             VALUES (?1, ?2, ?3)",
            params![user_id, peer_id, now as i64],
        )?;
        Ok(affected > 0)
    }

    pub fn remove_user_connection(&self, user_id: i64, peer_id: i64) -> Result<bool, StorageError> {
        let affected = self.conn.execute(
            "DELETE FROM user_connections WHERE user_id = ?1 AND peer_id = ?2",
            params![user_id, peer_id],
        )?;
        Ok(affected > 0)
    }

    // -----------------------------------------------------------------------
    // Connections CRUD
    // -----------------------------------------------------------------------

    /// Insert a pending connection. A second row for the same unordered pair
    /// is rejected by the pair index with [`StorageError::AlreadyExists`].
    pub fn insert_connection(
        &self,
        requester_id: i64,
        recipient_id: i64,
        now: u64,
    ) -> Result<i64, StorageError> {
        let (low, high) = ordered_pair(requester_id, recipient_id);
        self.conn
            .execute(
                "INSERT INTO connections
                 (requester_id, recipient_id, status, user_low, user_high, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
                params![
                    requester_id,
                    recipient_id,
                    ConnectionStatus::Pending,
                    low,
                    high,
                    now as i64,
                ],
            )
            .map_err(|e| map_unique(e, "connection between these users"))?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn get_connection(&self, id: i64) -> Result<Option<ConnectionRow>, StorageError> {
        let sql = format!("SELECT {CONNECTION_COLUMNS} FROM connections WHERE id = ?1");
        let row = self
            .conn
            .query_row(&sql, params![id], connection_from_row)
            .optional()?;
        Ok(row)
    }

    /// Find the connection between two users in either direction, any status.
    pub fn find_connection_between(
        &self,
        a: i64,
        b: i64,
    ) -> Result<Option<ConnectionRow>, StorageError> {
        let (low, high) = ordered_pair(a, b);
        let sql = format!(
            "SELECT {CONNECTION_COLUMNS} FROM connections WHERE user_low = ?1 AND user_high = ?2"
        );
        let row = self
            .conn
            .query_row(&sql, params![low, high], connection_from_row)
            .optional()?;
        Ok(row)
    }

    pub fn update_connection_status(
        &self,
        id: i64,
        status: ConnectionStatus,
        now: u64,
    ) -> Result<bool, StorageError> {
        let affected = self.conn.execute(
            "UPDATE connections SET status = ?1, updated_at = ?2 WHERE id = ?3",
            params![status, now as i64, id],
        )?;
        Ok(affected > 0)
    }

    pub fn delete_connection(&self, id: i64) -> Result<bool, StorageError> {
        let affected = self
            .conn
            .execute("DELETE FROM connections WHERE id = ?1", params![id])?;
        Ok(affected > 0)
    }

    /// Pending requests addressed to `recipient_id`, newest first.
    pub fn list_pending_connections(
        &self,
        recipient_id: i64,
    ) -> Result<Vec<ConnectionRow>, StorageError> {
        let sql = format!(
            "SELECT {CONNECTION_COLUMNS} FROM connections
             WHERE recipient_id = ?1 AND status = ?2
             ORDER BY created_at DESC, id DESC"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(
            params![recipient_id, ConnectionStatus::Pending],
            connection_from_row,
        )?;
        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    /// Accepted connections in which `user_id` is either party.
    pub fn list_accepted_connections(
        &self,
        user_id: i64,
    ) -> Result<Vec<ConnectionRow>, StorageError> {
        let sql = format!(
            "SELECT {CONNECTION_COLUMNS} FROM connections
             WHERE (requester_id = ?1 OR recipient_id = ?1) AND status = ?2
             ORDER BY id"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(
            params![user_id, ConnectionStatus::Accepted],
            connection_from_row,
        )?;
        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    // -----------------------------------------------------------------------
    // Messages CRUD
    // -----------------------------------------------------------------------

    /// Insert a message. The row's `id` is ignored; the new id is returned.
    pub fn insert_message(&self, row: &MessageRow) -> Result<i64, StorageError> {
        self.conn.execute(
            "INSERT INTO messages (sender_id, recipient_id, content, read, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                row.sender_id,
                row.recipient_id,
                row.content,
                row.read as i32,
                row.created_at as i64,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Every message exchanged between `a` and `b`, oldest first.
    pub fn list_thread(&self, a: i64, b: i64) -> Result<Vec<MessageRow>, StorageError> {
        let sql = format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages
             WHERE (sender_id = ?1 AND recipient_id = ?2)
                OR (sender_id = ?2 AND recipient_id = ?1)
             ORDER BY created_at ASC, id ASC"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![a, b], message_from_row)?;
        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    /// Mark every unread message from `sender_id` to `reader_id` as read.
    pub fn mark_thread_read(&self, reader_id: i64, sender_id: i64) -> Result<u32, StorageError> {
        let affected = self.conn.execute(
            "UPDATE messages SET read = 1
             WHERE recipient_id = ?1 AND sender_id = ?2 AND read = 0",
            params![reader_id, sender_id],
        )?;
        Ok(u32::try_from(affected).unwrap_or(u32::MAX))
    }

    /// Distinct users that `user_id` has sent messages to or received from.
    pub fn list_conversation_peers(&self, user_id: i64) -> Result<Vec<UserBrief>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, email, avatar FROM users
             WHERE id IN (
                 SELECT recipient_id FROM messages WHERE sender_id = ?1
                 UNION
                 SELECT sender_id FROM messages WHERE recipient_id = ?1
             ) AND id != ?1
             ORDER BY id",
        )?;
        let rows = stmt.query_map(params![user_id], brief_from_row)?;
        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    pub fn count_unread_messages(&self, recipient_id: i64) -> Result<u32, StorageError> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM messages WHERE recipient_id = ?1 AND read = 0",
            params![recipient_id],
            |row| row.get(0),
        )?;
        Ok(clamp_count(count))
    }

    // -----------------------------------------------------------------------
    // Notifications CRUD
    // -----------------------------------------------------------------------

    /// Insert a notification. The row's `id` is ignored; the new id is returned.
    pub fn insert_notification(&self, row: &NotificationRow) -> Result<i64, StorageError> {
        self.conn.execute(
            "INSERT INTO notifications
             (recipient_id, sender_id, type, content, read, related_id, related_model, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                row.recipient_id,
                row.sender_id,
                row.kind,
                row.content,
                row.read as i32,
                row.related_id,
                row.related_model,
                row.created_at as i64,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn get_notification(&self, id: i64) -> Result<Option<NotificationRow>, StorageError> {
        let sql = format!("SELECT {NOTIFICATION_COLUMNS} FROM notifications WHERE id = ?1");
        let row = self
            .conn
            .query_row(&sql, params![id], notification_from_row)
            .optional()?;
        Ok(row)
    }

    /// All notifications for a recipient, newest first.
    pub fn list_notifications(
        &self,
        recipient_id: i64,
    ) -> Result<Vec<NotificationRow>, StorageError> {
        let sql = format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notifications
             WHERE recipient_id = ?1
             ORDER BY created_at DESC, id DESC"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![recipient_id], notification_from_row)?;
        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    /// Most recent unread notification of `kind` from `sender_id` to `recipient_id`.
    pub fn find_unread_notification(
        &self,
        recipient_id: i64,
        sender_id: i64,
        kind: NotificationKind,
    ) -> Result<Option<NotificationRow>, StorageError> {
        let sql = format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notifications
             WHERE recipient_id = ?1 AND sender_id = ?2 AND type = ?3 AND read = 0
             ORDER BY created_at DESC, id DESC LIMIT 1"
        );
        let row = self
            .conn
            .query_row(
                &sql,
                params![recipient_id, sender_id, kind],
                notification_from_row,
            )
            .optional()?;
        Ok(row)
    }

    pub fn mark_notification_read(&self, id: i64) -> Result<bool, StorageError> {
        let affected = self.conn.execute(
            "UPDATE notifications SET read = 1 WHERE id = ?1",
            params![id],
        )?;
        Ok(affected > 0)
    }

    /// Mark all of a recipient's notifications as read. Returns how many changed.
    pub fn mark_all_notifications_read(&self, recipient_id: i64) -> Result<u32, StorageError> {
        let affected = self.conn.execute(
            "UPDATE notifications SET read = 1 WHERE recipient_id = ?1 AND read = 0",
            params![recipient_id],
        )?;
        Ok(u32::try_from(affected).unwrap_or(u32::MAX))
    }

    pub fn count_unread_notifications(&self, recipient_id: i64) -> Result<u32, StorageError> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM notifications WHERE recipient_id = ?1 AND read = 0",
            params![recipient_id],
            |row| row.get(0),
        )?;
        Ok(clamp_count(count))
    }

    pub fn delete_notification(&self, id: i64) -> Result<bool, StorageError> {
        let affected = self
            .conn
            .execute("DELETE FROM notifications WHERE id = ?1", params![id])?;
        Ok(affected > 0)
    }

    // -----------------------------------------------------------------------
    // Posts and likes
    // -----------------------------------------------------------------------

    pub fn insert_post(&self, row: &PostRow) -> Result<i64, StorageError> {
        self.conn.execute(
            "INSERT INTO posts (author_id, content, image, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                row.author_id,
                row.content,
                row.image,
                row.created_at as i64,
                row.updated_at as i64,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn get_post(&self, id: i64) -> Result<Option<PostRow>, StorageError> {
        let sql = format!("SELECT {POST_COLUMNS} FROM posts WHERE id = ?1");
        let row = self
            .conn
            .query_row(&sql, params![id], post_from_row)
            .optional()?;
        Ok(row)
    }

    /// All posts, newest first.
    pub fn list_posts(&self) -> Result<Vec<PostRow>, StorageError> {
        let sql = format!("SELECT {POST_COLUMNS} FROM posts ORDER BY created_at DESC, id DESC");
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], post_from_row)?;
        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    pub fn update_post_content(
        &self,
        id: i64,
        content: &str,
        now: u64,
    ) -> Result<bool, StorageError> {
        let affected = self.conn.execute(
            "UPDATE posts SET content = ?1, updated_at = ?2 WHERE id = ?3",
            params![content, now as i64, id],
        )?;
        Ok(affected > 0)
    }

    /// Delete a post together with its likes and comments.
    /// Issues three statements; run it inside [`Storage::in_transaction`].
    pub fn delete_post(&self, id: i64) -> Result<bool, StorageError> {
        self.conn
            .execute("DELETE FROM post_likes WHERE post_id = ?1", params![id])?;
        self.conn
            .execute("DELETE FROM comments WHERE post_id = ?1", params![id])?;
        let affected = self
            .conn
            .execute("DELETE FROM posts WHERE id = ?1", params![id])?;
        Ok(affected > 0)
    }

    pub fn has_like(&self, post_id: i64, user_id: i64) -> Result<bool, StorageError> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM post_likes WHERE post_id = ?1 AND user_id = ?2",
            params![post_id, user_id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    pub fn insert_like(&self, post_id: i64, user_id: i64, now: u64) -> Result<bool, StorageError> {
        let affected = self.conn.execute(
            "INSERT OR IGNORE INTO post_likes (post_id, user_id, liked_at) VALUES (?1, ?2, ?3)",
            params![post_id, user_id, now as i64],
        )?;
        Ok(affected > 0)
    }

    pub fn delete_like(&self, post_id: i64, user_id: i64) -> Result<bool, StorageError> {
        let affected = self.conn.execute(
            "DELETE FROM post_likes WHERE post_id = ?1 AND user_id = ?2",
            params![post_id, user_id],
        )?;
        Ok(affected > 0)
    }

    /// Users who liked a post, in the order they liked it.
    pub fn list_likers(&self, post_id: i64) -> Result<Vec<UserBrief>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT u.id, u.name, u.email, u.avatar
             FROM post_likes l JOIN users u ON u.id = l.user_id
             WHERE l.post_id = ?1
             ORDER BY l.liked_at, l.rowid",
        )?;
        let rows = stmt.query_map(params![post_id], brief_from_row)?;
        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    // -----------------------------------------------------------------------
    // Comments
    // -----------------------------------------------------------------------

    pub fn insert_comment(&self, row: &CommentRow) -> Result<i64, StorageError> {
        self.conn.execute(
            "INSERT INTO comments (post_id, author_id, text, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![row.post_id, row.author_id, row.text, row.created_at as i64],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn get_comment(&self, id: i64) -> Result<Option<CommentRow>, StorageError> {
        let sql = format!("SELECT {COMMENT_COLUMNS} FROM comments WHERE id = ?1");
        let row = self
            .conn
            .query_row(&sql, params![id], comment_from_row)
            .optional()?;
        Ok(row)
    }

    /// Comments on a post, newest first.
    pub fn list_comments(&self, post_id: i64) -> Result<Vec<CommentRow>, StorageError> {
        let sql = format!(
            "SELECT {COMMENT_COLUMNS} FROM comments WHERE post_id = ?1
             ORDER BY created_at DESC, id DESC"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![post_id], comment_from_row)?;
        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    pub fn count_comments(&self, post_id: i64) -> Result<u32, StorageError> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM comments WHERE post_id = ?1",
            params![post_id],
            |row| row.get(0),
        )?;
        Ok(clamp_count(count))
    }

    pub fn delete_comment(&self, id: i64) -> Result<bool, StorageError> {
        let affected = self
            .conn
            .execute("DELETE FROM comments WHERE id = ?1", params![id])?;
        Ok(affected > 0)
    }

    // -----------------------------------------------------------------------
    // Outbox
    // -----------------------------------------------------------------------

    pub fn insert_outbox(&self, kind: &str, payload: &str, now: u64) -> Result<i64, StorageError> {
        self.conn.execute(
            "INSERT INTO outbox (kind, payload, created_at) VALUES (?1, ?2, ?3)",
            params![kind, payload, now as i64],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Outbox rows not yet handled, in publication order.
    pub fn list_pending_outbox(&self) -> Result<Vec<OutboxRow>, StorageError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, kind, payload, created_at FROM outbox ORDER BY id")?;
        let rows = stmt.query_map([], outbox_from_row)?;
        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    /// Remove a handled event from the outbox.
    pub fn delete_outbox(&self, id: i64) -> Result<bool, StorageError> {
        let affected = self
            .conn
            .execute("DELETE FROM outbox WHERE id = ?1", params![id])?;
        Ok(affected > 0)
    }

    pub fn count_outbox(&self) -> Result<u32, StorageError> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM outbox", [], |row| row.get(0))?;
        Ok(clamp_count(count))
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Current time as seconds since UNIX epoch.
pub fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Resolve the database path: `{data_dir}/linkhub.db`.
pub fn db_path(data_dir: &Path) -> PathBuf {
    data_dir.join("linkhub.db")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn test_storage() -> Storage {
        Storage::open_in_memory().unwrap()
    }

    fn user(name: &str) -> UserRow {
        UserRow {
            id: 0,
            name: name.to_string(),
            email: format!("{}@example.com", name.to_lowercase()),
            bio: String::new(),
            avatar: String::new(),
            skills: vec![],
            experience: vec![],
            created_at: now_secs(),
        }
    }

    #[test]
    fn test_user_crud() {
        let storage = test_storage();
        let mut alice = user("Alice");
        alice.skills = vec!["rust".to_string(), "sql".to_string()];
        alice.experience = vec![ExperienceEntry {
            title: "Engineer".to_string(),
            company: "Acme".to_string(),
            current: true,
            ..Default::default()
        }];
        let id = storage.insert_user(&alice).unwrap();

        let loaded = storage.get_user(id).unwrap().unwrap();
        assert_eq!(loaded.name, "Alice");
        assert_eq!(loaded.skills, vec!["rust", "sql"]);
        assert_eq!(loaded.experience[0].company, "Acme");
        assert!(storage.user_exists(id).unwrap());
        assert!(!storage.user_exists(id + 100).unwrap());

        let mut updated = loaded.clone();
        updated.bio = "hello".to_string();
        assert!(storage.update_user(&updated).unwrap());
        assert_eq!(storage.get_user(id).unwrap().unwrap().bio, "hello");

        let brief = storage.get_user_brief(id).unwrap().unwrap();
        assert_eq!(brief.email, "alice@example.com");
        assert_eq!(storage.list_users().unwrap().len(), 1);
    }

    #[test]
    fn test_duplicate_email_rejected() {
        let storage = test_storage();
        storage.insert_user(&user("Alice")).unwrap();
        let err = storage.insert_user(&user("Alice")).unwrap_err();
        assert!(matches!(err, StorageError::AlreadyExists(_)));
    }

    #[test]
    fn test_connection_pair_is_unique_in_both_orders() {
        let storage = test_storage();
        let a = storage.insert_user(&user("A")).unwrap();
        let b = storage.insert_user(&user("B")).unwrap();
        let now = now_secs();

        storage.insert_connection(a, b, now).unwrap();
        let err = storage.insert_connection(b, a, now).unwrap_err();
        assert!(matches!(err, StorageError::AlreadyExists(_)));
        let err = storage.insert_connection(a, b, now).unwrap_err();
        assert!(matches!(err, StorageError::AlreadyExists(_)));

        let found = storage.find_connection_between(b, a).unwrap().unwrap();
        assert_eq!(found.requester_id, a);
        assert_eq!(found.status, ConnectionStatus::Pending);
    }

    #[test]
    fn test_connection_set_has_set_semantics() {
        let storage = test_storage();
        let a = storage.insert_user(&user("A")).unwrap();
        let b = storage.insert_user(&user("B")).unwrap();
        let now = now_secs();

        assert!(storage.add_user_connection(a, b, now).unwrap());
        assert!(!storage.add_user_connection(a, b, now).unwrap());
        assert_eq!(storage.list_user_connections(a).unwrap(), vec![b]);

        assert!(storage.remove_user_connection(a, b).unwrap());
        assert!(!storage.remove_user_connection(a, b).unwrap());
        assert!(storage.list_user_connections(a).unwrap().is_empty());
    }

    #[test]
    fn test_thread_ordering_and_read_marking() {
        let storage = test_storage();
        let a = storage.insert_user(&user("A")).unwrap();
        let b = storage.insert_user(&user("B")).unwrap();
        let now = now_secs();

        for (i, (from, to)) in [(a, b), (b, a), (a, b)].into_iter().enumerate() {
            storage
                .insert_message(&MessageRow {
                    id: 0,
                    sender_id: from,
                    recipient_id: to,
                    content: format!("m{i}"),
                    read: false,
                    created_at: now,
                })
                .unwrap();
        }

        let thread = storage.list_thread(b, a).unwrap();
        let bodies: Vec<&str> = thread.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(bodies, vec!["m0", "m1", "m2"]);

        assert_eq!(storage.count_unread_messages(b).unwrap(), 2);
        assert_eq!(storage.mark_thread_read(b, a).unwrap(), 2);
        assert_eq!(storage.count_unread_messages(b).unwrap(), 0);
        assert_eq!(storage.count_unread_messages(a).unwrap(), 1);
    }

    #[test]
    fn test_notification_lookup_and_read_state() {
        let storage = test_storage();
        let a = storage.insert_user(&user("A")).unwrap();
        let b = storage.insert_user(&user("B")).unwrap();

        let row = NotificationRow {
            id: 0,
            recipient_id: b,
            sender_id: a,
            kind: NotificationKind::Message,
            content: "hi".to_string(),
            read: false,
            related_id: Some(1),
            related_model: Some(RelatedModel::Message),
            created_at: now_secs(),
        };
        let id = storage.insert_notification(&row).unwrap();

        let found = storage
            .find_unread_notification(b, a, NotificationKind::Message)
            .unwrap()
            .unwrap();
        assert_eq!(found.id, id);
        assert_eq!(found.related_model, Some(RelatedModel::Message));
        assert!(storage
            .find_unread_notification(b, a, NotificationKind::ConnectionRequest)
            .unwrap()
            .is_none());

        assert!(storage.mark_notification_read(id).unwrap());
        assert!(storage
            .find_unread_notification(b, a, NotificationKind::Message)
            .unwrap()
            .is_none());
        assert_eq!(storage.count_unread_notifications(b).unwrap(), 0);
    }

    #[test]
    fn test_transaction_rolls_back_on_error() {
        let storage = test_storage();
        let a = storage.insert_user(&user("A")).unwrap();
        let b = storage.insert_user(&user("B")).unwrap();

        let result: Result<(), StorageError> = storage.in_transaction(|s| {
            s.add_user_connection(a, b, now_secs())?;
            Err(StorageError::AlreadyExists("forced".to_string()))
        });
        assert!(result.is_err());
        assert!(storage.list_user_connections(a).unwrap().is_empty());
    }

    #[test]
    fn test_delete_post_removes_children() {
        let storage = test_storage();
        let a = storage.insert_user(&user("A")).unwrap();
        let now = now_secs();
        let post_id = storage
            .insert_post(&PostRow {
                id: 0,
                author_id: a,
                content: "hello".to_string(),
                image: String::new(),
                created_at: now,
                updated_at: now,
            })
            .unwrap();
        storage.insert_like(post_id, a, now).unwrap();
        storage
            .insert_comment(&CommentRow {
                id: 0,
                post_id,
                author_id: a,
                text: "first".to_string(),
                created_at: now,
            })
            .unwrap();

        assert!(storage
            .in_transaction(|s| s.delete_post(post_id))
            .unwrap());
        assert!(storage.get_post(post_id).unwrap().is_none());
        assert_eq!(storage.count_comments(post_id).unwrap(), 0);
        assert!(!storage.has_like(post_id, a).unwrap());
    }

    #[test]
    fn test_outbox_rows_are_deleted_when_handled() {
        let storage = test_storage();
        let id = storage
            .insert_outbox("message_sent", "{}", now_secs())
            .unwrap();
        assert_eq!(storage.list_pending_outbox().unwrap().len(), 1);
        assert!(storage.delete_outbox(id).unwrap());
        assert!(!storage.delete_outbox(id).unwrap());
        assert!(storage.list_pending_outbox().unwrap().is_empty());
        assert_eq!(storage.count_outbox().unwrap(), 0);
    }

    #[test]
    fn test_clamp_count_saturates() {
        assert_eq!(clamp_count(7), 7);
        assert_eq!(clamp_count(i64::from(u32::MAX) + 1), u32::MAX);
        assert_eq!(clamp_count(-1), 0);
    }

    #[test]
    fn test_enum_text_round_trip() {
        assert_eq!("accepted".parse::<ConnectionStatus>().unwrap(), ConnectionStatus::Accepted);
        assert_eq!(NotificationKind::ConnectionAccepted.as_str(), "connection_accepted");
        assert!("bogus".parse::<RelatedModel>().is_err());
    }
}
