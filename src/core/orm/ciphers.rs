use super::{format_time, from_db, immutable, inserted_local, parse_time, parse_time_opt, to_db, Entity, Placement};
use crate::core::id::{self, TYPE_KEY};
use crate::error::{Result, VaultError};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

/// Wrapped key material kept apart from its owner; written once
#[derive(Debug, Clone, Default)]
pub struct Cipher {
    id: u64,
    ciphertext: Vec<u8>,
    expiration: Option<DateTime<Utc>>,
    creator: u64,
    created: Option<DateTime<Utc>>,
    stored: bool,
    dirty: bool,
}

impl Cipher {
    pub fn new(placement: Placement, ciphertext: Vec<u8>) -> Self {
        Cipher {
            id: placement.id(TYPE_KEY, 0),
            ciphertext,
            dirty: true,
            ..Default::default()
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn ciphertext(&self) -> &[u8] {
        &self.ciphertext
    }

    pub fn expiration(&self) -> Option<DateTime<Utc>> {
        self.expiration
    }

    pub fn set_expiration(&mut self, expiration: DateTime<Utc>) -> Result<Option<DateTime<Utc>>> {
        if self.stored {
            return Err(immutable("key", "expiration"));
        }
        self.dirty = true;
        Ok(self.expiration.replace(expiration))
    }

    pub fn creator(&self) -> u64 {
        self.creator
    }

    pub fn set_creator(&mut self, creator: u64) -> Result<u64> {
        if self.stored {
            return Err(immutable("key", "creator"));
        }
        self.dirty = true;
        Ok(std::mem::replace(&mut self.creator, creator))
    }

    pub fn created(&self) -> Option<DateTime<Utc>> {
        self.created
    }

    pub fn by_id(&mut self, conn: &Connection, key: u64) -> Result<bool> {
        *self = Cipher::default();
        if id::type_of(key) != TYPE_KEY {
            return Ok(false);
        }
        let row = conn
            .query_row(
                "SELECT ciphertext, expiration, id_creator, created FROM ciphers WHERE id = ?1",
                params![id::local(key) as i64],
                |row| {
                    Ok((
                        row.get::<_, Vec<u8>>(0)?,
                        row.get::<_, Option<String>>(1)?,
                        row.get::<_, i64>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                },
            )
            .optional()?;
        let Some((ciphertext, expiration, creator, created)) = row else {
            return Ok(false);
        };
        *self = Cipher {
            id: key,
            ciphertext,
            expiration: parse_time_opt(expiration)?,
            creator: from_db(creator),
            created: Some(parse_time(&created)?),
            stored: true,
            dirty: false,
        };
        Ok(true)
    }

    /// Remove once consumed
    pub fn delete(&mut self, conn: &Connection) -> Result<bool> {
        if !self.stored {
            return Ok(false);
        }
        let n = conn.execute("DELETE FROM ciphers WHERE id = ?1", params![id::local(self.id) as i64])?;
        self.stored = false;
        Ok(n > 0)
    }
}

impl Entity for Cipher {
    fn is_stored(&self) -> bool {
        self.stored
    }

    fn is_dirty(&self) -> bool {
        self.dirty
    }

    fn is_valid(&self) -> bool {
        !self.ciphertext.is_empty()
    }

    fn flush(&mut self, conn: &Connection, force: bool) -> Result<bool> {
        if self.stored {
            if self.dirty || force {
                return Err(immutable("key", "row"));
            }
            return Ok(false);
        }
        if !self.is_valid() {
            return Err(VaultError::InvalidParameter("key needs ciphertext".to_string()));
        }
        let placement = Placement::of(self.id);
        conn.execute(
            "INSERT INTO ciphers (ciphertext, expiration, id_creator) VALUES (?1, ?2, ?3)",
            params![self.ciphertext, self.expiration.as_ref().map(format_time), to_db(self.creator)],
        )?;
        self.id = placement.id(TYPE_KEY, inserted_local(conn)?);
        self.stored = true;
        self.dirty = false;
        Ok(true)
    }
}
