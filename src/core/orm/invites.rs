//! Invitations to join an organization or store
//!
//! Written once. The store key travels in a [`super::Cipher`] row sealed under a
//! one-time pick; `key` points at that row.

use super::{format_time, from_db, immutable, inserted_local, parse_time, to_db, Entity, Placement};
use crate::core::crypto;
use crate::core::id::{self, TYPE_INVITATION};
use crate::core::roles::RoleSet;
use crate::error::{Result, VaultError};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

const COLUMNS: &str = "id, uid, id_creator, invitee, id_object, message, id_key, expiration, roles, created";

#[derive(Debug, Clone, Default)]
pub struct Invitation {
    id: u64,
    uid: String,
    creator: u64,
    invitee: String,
    object: u64,
    message: String,
    key: u64,
    expiration: Option<DateTime<Utc>>,
    roles: RoleSet,
    created: Option<DateTime<Utc>>,
    stored: bool,
    dirty: bool,
}

/// Deterministic uid for an invitation issued at `at`
pub fn make_uid(creator: u64, object: u64, invitee: &str, at: DateTime<Utc>) -> String {
    crypto::sha1_hex(
        format!("{:x}:{:x}:{}:{}", creator, object, invitee, at.timestamp_micros()).as_bytes(),
    )
}

impl Invitation {
    /// New invitation to `object`, placed on the object's shard
    pub fn new(object: u64) -> Self {
        Invitation {
            id: Placement::of(object).id(TYPE_INVITATION, 0),
            object,
            dirty: true,
            ..Default::default()
        }
    }

    fn guard(&self, field: &str) -> Result<()> {
        if self.stored {
            return Err(immutable("invitation", field));
        }
        Ok(())
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn uid(&self) -> &str {
        &self.uid
    }

    pub fn set_uid(&mut self, uid: &str) -> Result<String> {
        self.guard("uid")?;
        self.dirty = true;
        Ok(std::mem::replace(&mut self.uid, uid.to_string()))
    }

    pub fn creator(&self) -> u64 {
        self.creator
    }

    pub fn set_creator(&mut self, creator: u64) -> Result<u64> {
        self.guard("creator")?;
        self.dirty = true;
        Ok(std::mem::replace(&mut self.creator, creator))
    }

    pub fn invitee(&self) -> &str {
        &self.invitee
    }

    pub fn set_invitee(&mut self, invitee: &str) -> Result<String> {
        self.guard("invitee")?;
        self.dirty = true;
        Ok(std::mem::replace(&mut self.invitee, invitee.to_string()))
    }

    pub fn object(&self) -> u64 {
        self.object
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn set_message(&mut self, message: &str) -> Result<String> {
        self.guard("message")?;
        self.dirty = true;
        Ok(std::mem::replace(&mut self.message, message.to_string()))
    }

    /// Cipher row holding the wrapped store key; 0 when none
    pub fn key(&self) -> u64 {
        self.key
    }

    pub fn set_key(&mut self, key: u64) -> Result<u64> {
        self.guard("key")?;
        self.dirty = true;
        Ok(std::mem::replace(&mut self.key, key))
    }

    pub fn expiration(&self) -> Option<DateTime<Utc>> {
        self.expiration
    }

    pub fn set_expiration(&mut self, expiration: DateTime<Utc>) -> Result<Option<DateTime<Utc>>> {
        self.guard("expiration")?;
        self.dirty = true;
        Ok(self.expiration.replace(expiration))
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiration.map_or(true, |e| e <= now)
    }

    pub fn roles(&self) -> &RoleSet {
        &self.roles
    }

    pub fn set_roles(&mut self, roles: RoleSet) -> Result<RoleSet> {
        self.guard("roles")?;
        self.dirty = true;
        Ok(std::mem::replace(&mut self.roles, roles))
    }

    pub fn created(&self) -> Option<DateTime<Utc>> {
        self.created
    }

    fn from_row(placement: Placement, row: &Row<'_>) -> Result<Self> {
        let local: i64 = row.get(0)?;
        Ok(Invitation {
            id: placement.id(TYPE_INVITATION, local as u32),
            uid: row.get(1)?,
            creator: from_db(row.get(2)?),
            invitee: row.get(3)?,
            object: from_db(row.get(4)?),
            message: row.get(5)?,
            key: row.get::<_, Option<i64>>(6)?.map(from_db).unwrap_or(0),
            expiration: Some(parse_time(&row.get::<_, String>(7)?)?),
            roles: RoleSet::from_csv(&row.get::<_, String>(8)?),
            created: Some(parse_time(&row.get::<_, String>(9)?)?),
            stored: true,
            dirty: false,
        })
    }

    fn load(&mut self, conn: &Connection, placement: Placement, filter: &str, arg: &dyn rusqlite::ToSql) -> Result<bool> {
        *self = Invitation::default();
        let sql = format!("SELECT {} FROM invites WHERE {} = ?1", COLUMNS, filter);
        match conn
            .query_row(&sql, &[arg], |row| Ok(Invitation::from_row(placement, row)))
            .optional()?
        {
            Some(i) => {
                *self = i?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn by_id(&mut self, conn: &Connection, invitation: u64) -> Result<bool> {
        if id::type_of(invitation) != TYPE_INVITATION {
            *self = Invitation::default();
            return Ok(false);
        }
        self.load(conn, Placement::of(invitation), "id", &(id::local(invitation) as i64))
    }

    pub fn by_uid(&mut self, conn: &Connection, placement: Placement, uid: &str) -> Result<bool> {
        self.load(conn, placement, "uid", &uid)
    }
}

impl Entity for Invitation {
    fn is_stored(&self) -> bool {
        self.stored
    }

    fn is_dirty(&self) -> bool {
        self.dirty
    }

    fn is_valid(&self) -> bool {
        !self.uid.is_empty() && !self.invitee.is_empty() && self.object != 0 && self.expiration.is_some()
    }

    fn flush(&mut self, conn: &Connection, force: bool) -> Result<bool> {
        if self.stored {
            if self.dirty || force {
                return Err(immutable("invitation", "row"));
            }
            return Ok(false);
        }
        let expiration = match (&self.expiration, self.is_valid()) {
            (Some(e), true) => format_time(e),
            _ => {
                return Err(VaultError::InvalidParameter(
                    "invitation needs a uid, invitee, object and expiration".to_string(),
                ))
            }
        };
        let key = if self.key != 0 { Some(to_db(self.key)) } else { None };
        let placement = Placement::of(self.id);
        conn.execute(
            "INSERT INTO invites (uid, id_creator, invitee, id_object, message, id_key, expiration, roles) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                self.uid,
                to_db(self.creator),
                self.invitee,
                to_db(self.object),
                self.message,
                key,
                expiration,
                self.roles.to_csv()
            ],
        )
        .map_err(|e| super::conflict(e, format!("invitation {} exists", self.uid)))?;
        self.id = placement.id(TYPE_INVITATION, inserted_local(conn)?);
        self.stored = true;
        self.dirty = false;
        Ok(true)
    }
}
