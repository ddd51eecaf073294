//! Canonical entities
//!
//! One struct per row type on its home shard. An entity carries `stored` (row
//! exists), `dirty` (unsaved changes) and, where a registry mirrors it,
//! `update_registry`. Loaders reset the struct and return `Ok(false)` when no
//! row matched; [`Entity::flush`] inserts or updates. `created` and `modified`
//! are written by the database.

pub mod actions;
pub mod ciphers;
pub mod invites;
pub mod objects;
pub mod orgs;
pub mod requests;
pub mod schema;
pub mod stores;
pub mod templates;
pub mod users;

pub use actions::{Action, ActionState};
pub use ciphers::Cipher;
pub use invites::Invitation;
pub use objects::{ObjectType, StoreObject};
pub use orgs::Organization;
pub use requests::Request;
pub use stores::Store;
pub use templates::Template;
pub use users::User;

use crate::core::id;
use crate::error::{Result, VaultError};
use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::{Connection, ErrorCode};

/// Format of `CURRENT_TIMESTAMP` and of every stored expiration
pub const DB_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Shared persistence contract
pub trait Entity {
    fn is_stored(&self) -> bool;

    fn is_dirty(&self) -> bool;

    fn is_new(&self) -> bool {
        !self.is_stored()
    }

    /// Required fields present and well formed
    fn is_valid(&self) -> bool;

    /// Insert or update. Without `force` a clean entity is left alone.
    /// Returns whether a write happened.
    fn flush(&mut self, conn: &Connection, force: bool) -> Result<bool>;
}

/// Where a new row goes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Placement {
    pub group: u8,
    pub shard: u16,
}

impl Placement {
    pub fn new(group: u8, shard: u16) -> Self {
        Placement { group, shard }
    }

    /// Placement of an existing id
    pub fn of(id: u64) -> Self {
        Placement {
            group: id::shard_group(id),
            shard: id::shard(id),
        }
    }

    /// Global id for a row on this shard
    pub fn id(&self, object_type: u8, local: u32) -> u64 {
        id::make_id(self.group, object_type, self.shard, local)
    }
}

/// Column value for a global id
pub fn to_db(id: u64) -> i64 {
    id as i64
}

/// Global id from a column value
pub fn from_db(value: i64) -> u64 {
    value as u64
}

/// Parse a database timestamp as UTC
pub fn parse_time(text: &str) -> Result<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(text, DB_TIME_FORMAT)
        .map(|t| t.and_utc())
        .map_err(|e| VaultError::InvalidParameter(format!("bad timestamp '{}': {}", text, e)))
}

pub fn parse_time_opt(text: Option<String>) -> Result<Option<DateTime<Utc>>> {
    text.as_deref().map(parse_time).transpose()
}

/// Render a time the way the database stores it
pub fn format_time(time: &DateTime<Utc>) -> String {
    time.format(DB_TIME_FORMAT).to_string()
}

/// Local id of the row just inserted
pub fn inserted_local(conn: &Connection) -> Result<u32> {
    let rowid = conn.last_insert_rowid();
    u32::try_from(rowid)
        .map_err(|_| VaultError::InvalidParameter(format!("row id {} exceeds local id range", rowid)))
}

/// Turn a UNIQUE violation into [`VaultError::Conflict`]
pub fn conflict(err: rusqlite::Error, what: impl Into<String>) -> VaultError {
    match &err {
        rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation => {
            VaultError::Conflict(what.into())
        }
        _ => VaultError::Storage(err),
    }
}

/// Error for a key field changed on a stored entity
pub(crate) fn immutable(entity: &str, field: &str) -> VaultError {
    VaultError::Immutable(format!("{} {} cannot change once stored", entity, field))
}

#[cfg(test)]
pub(crate) fn test_conn() -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch(schema::SCHEMA).unwrap();
    conn
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_time_format() {
        let t = parse_time("2024-03-05 07:08:09").unwrap();
        assert_eq!((t.year(), t.month(), t.day()), (2024, 3, 5));
        assert_eq!((t.hour(), t.minute(), t.second()), (7, 8, 9));
        assert_eq!(format_time(&t), "2024-03-05 07:08:09");
        assert!(parse_time("2024-03-05T07:08:09Z").is_err());
    }

    #[test]
    fn test_db_timestamp_parses() {
        let conn = test_conn();
        let now: String = conn
            .query_row("SELECT CURRENT_TIMESTAMP", [], |r| r.get(0))
            .unwrap();
        assert!(parse_time(&now).is_ok());
    }

    #[test]
    fn test_id_column_roundtrip_high_bit() {
        let id = id::make_id(0xF, id::TYPE_USER, 0xFFF, u32::MAX);
        assert!(to_db(id) < 0);
        assert_eq!(from_db(to_db(id)), id);
    }

    #[test]
    fn test_unique_violation_is_conflict() {
        let conn = test_conn();
        conn.execute("INSERT INTO orgs (alias, id_creator) VALUES ('a', 1)", [])
            .unwrap();
        let err = conn
            .execute("INSERT INTO orgs (alias, id_creator) VALUES ('a', 1)", [])
            .unwrap_err();
        assert!(matches!(conflict(err, "alias a"), VaultError::Conflict(_)));
    }
}
