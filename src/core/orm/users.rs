//! User accounts
//!
//! `ciphertext` is the password validation blob: random bytes sealed under the
//! password hash. Opening it proves the password.

use super::{conflict, from_db, immutable, inserted_local, parse_time, to_db, Entity, Placement};
use crate::core::id::{self, TYPE_USER};
use crate::error::{Result, VaultError};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

const COLUMNS: &str = "id, username, email, name, ciphertext, id_creator, created, modified";

#[derive(Debug, Clone, Default)]
pub struct User {
    id: u64,
    username: String,
    email: String,
    name: String,
    ciphertext: Vec<u8>,
    creator: u64,
    created: Option<DateTime<Utc>>,
    modified: Option<DateTime<Utc>>,
    stored: bool,
    dirty: bool,
    update_registry: bool,
}

impl User {
    /// New unsaved user destined for `placement`
    pub fn new(placement: Placement) -> Self {
        User {
            id: placement.id(TYPE_USER, 0),
            dirty: true,
            update_registry: true,
            ..Default::default()
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Pin the local id of an unsaved user (bootstrap accounts)
    pub fn set_id(&mut self, id: u64) -> Result<u64> {
        if self.stored {
            return Err(immutable("user", "id"));
        }
        let previous = std::mem::replace(&mut self.id, id);
        self.dirty = true;
        Ok(previous)
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn set_username(&mut self, username: &str) -> String {
        let previous = std::mem::replace(&mut self.username, username.to_string());
        if previous != self.username {
            self.dirty = true;
            self.update_registry = true;
        }
        previous
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn set_email(&mut self, email: &str) -> String {
        let previous = std::mem::replace(&mut self.email, email.to_string());
        if previous != self.email {
            self.dirty = true;
            self.update_registry = true;
        }
        previous
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: &str) -> String {
        let previous = std::mem::replace(&mut self.name, name.to_string());
        if previous != self.name {
            self.dirty = true;
            self.update_registry = true;
        }
        previous
    }

    pub fn ciphertext(&self) -> &[u8] {
        &self.ciphertext
    }

    pub fn set_ciphertext(&mut self, ciphertext: Vec<u8>) -> Vec<u8> {
        let previous = std::mem::replace(&mut self.ciphertext, ciphertext);
        if previous != self.ciphertext {
            self.dirty = true;
            self.update_registry = true;
        }
        previous
    }

    pub fn creator(&self) -> u64 {
        self.creator
    }

    pub fn set_creator(&mut self, creator: u64) -> Result<u64> {
        if self.stored {
            return Err(immutable("user", "creator"));
        }
        let previous = std::mem::replace(&mut self.creator, creator);
        self.dirty = true;
        Ok(previous)
    }

    pub fn created(&self) -> Option<DateTime<Utc>> {
        self.created
    }

    pub fn modified(&self) -> Option<DateTime<Utc>> {
        self.modified
    }

    /// Registry mirror is stale
    pub fn needs_registry_update(&self) -> bool {
        self.update_registry
    }

    pub fn registry_updated(&mut self) {
        self.update_registry = false;
    }

    fn from_row(placement: Placement, row: &Row<'_>) -> Result<Self> {
        let local: i64 = row.get(0)?;
        Ok(User {
            id: placement.id(TYPE_USER, local as u32),
            username: row.get(1)?,
            email: row.get(2)?,
            name: row.get(3)?,
            ciphertext: row.get(4)?,
            creator: from_db(row.get(5)?),
            created: Some(parse_time(&row.get::<_, String>(6)?)?),
            modified: Some(parse_time(&row.get::<_, String>(7)?)?),
            stored: true,
            dirty: false,
            update_registry: false,
        })
    }

    fn load(&mut self, conn: &Connection, placement: Placement, filter: &str, arg: &dyn rusqlite::ToSql) -> Result<bool> {
        *self = User::default();
        let sql = format!("SELECT {} FROM users WHERE {} = ?1", COLUMNS, filter);
        let row = conn
            .query_row(&sql, &[arg], |row| Ok(User::from_row(placement, row)))
            .optional()?;
        match row {
            Some(user) => {
                *self = user?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn by_id(&mut self, conn: &Connection, user: u64) -> Result<bool> {
        if id::type_of(user) != TYPE_USER {
            *self = User::default();
            return Ok(false);
        }
        self.load(conn, Placement::of(user), "id", &(id::local(user) as i64))
    }

    pub fn by_username(&mut self, conn: &Connection, placement: Placement, username: &str) -> Result<bool> {
        self.load(conn, placement, "username", &username)
    }

    pub fn by_email(&mut self, conn: &Connection, placement: Placement, email: &str) -> Result<bool> {
        self.load(conn, placement, "email", &email)
    }

    /// Rows are never reused; a deleted user's local id stays retired
    pub fn delete(&mut self, conn: &Connection) -> Result<bool> {
        if !self.stored {
            return Ok(false);
        }
        let n = conn.execute("DELETE FROM users WHERE id = ?1", params![id::local(self.id) as i64])?;
        self.stored = false;
        Ok(n > 0)
    }
}

impl Entity for User {
    fn is_stored(&self) -> bool {
        self.stored
    }

    fn is_dirty(&self) -> bool {
        self.dirty
    }

    fn is_valid(&self) -> bool {
        !self.username.is_empty() && !self.email.is_empty() && !self.ciphertext.is_empty()
    }

    fn flush(&mut self, conn: &Connection, force: bool) -> Result<bool> {
        if !force && !self.dirty {
            return Ok(false);
        }
        if !self.is_valid() {
            return Err(VaultError::InvalidParameter(
                "user needs a username, email and password".to_string(),
            ));
        }
        let what = || format!("username '{}' or email '{}' already taken", self.username, self.email);

        if self.stored {
            conn.execute(
                "UPDATE users SET username = ?1, email = ?2, name = ?3, ciphertext = ?4, \
                 modified = CURRENT_TIMESTAMP WHERE id = ?5",
                params![self.username, self.email, self.name, self.ciphertext, id::local(self.id) as i64],
            )
            .map_err(|e| conflict(e, what()))?;
        } else {
            let placement = Placement::of(self.id);
            let local = id::local(self.id);
            if local != 0 {
                conn.execute(
                    "INSERT INTO users (id, username, email, name, ciphertext, id_creator) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![local as i64, self.username, self.email, self.name, self.ciphertext, to_db(self.creator)],
                )
                .map_err(|e| conflict(e, what()))?;
            } else {
                conn.execute(
                    "INSERT INTO users (username, email, name, ciphertext, id_creator) \
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![self.username, self.email, self.name, self.ciphertext, to_db(self.creator)],
                )
                .map_err(|e| conflict(e, what()))?;
            }
            self.id = placement.id(TYPE_USER, inserted_local(conn)?);
            self.stored = true;
        }
        self.dirty = false;
        Ok(true)
    }
}
