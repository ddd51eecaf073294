//! Object memberships (`registry_object_users`), kept on the object's shard
//!
//! The manager flags are derived from the role set on every flush, so counting
//! managers never has to parse role lists.

use crate::core::orm::{from_db, to_db};
use crate::core::roles::RoleSet;
use crate::core::state::STATE_DENY_ACCESS;
use crate::error::Result;
use rusqlite::{params, Connection, OptionalExtension, Row};

const COLUMNS: &str = "id_object, id_user, alias, state, roles, store_key";

#[derive(Debug, Clone, Default)]
pub struct Membership {
    object: u64,
    user: u64,
    alias: String,
    state: u16,
    roles: RoleSet,
    store_key: Option<Vec<u8>>,
    stored: bool,
    dirty: bool,
}

impl Membership {
    pub fn new(object: u64, user: u64) -> Self {
        Membership {
            object,
            user,
            dirty: true,
            ..Default::default()
        }
    }

    pub fn object(&self) -> u64 {
        self.object
    }

    pub fn user(&self) -> u64 {
        self.user
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    pub fn set_alias(&mut self, alias: &str) -> String {
        self.dirty = true;
        std::mem::replace(&mut self.alias, alias.to_string())
    }

    pub fn state(&self) -> u16 {
        self.state
    }

    pub fn set_state(&mut self, state: u16) -> u16 {
        let previous = std::mem::replace(&mut self.state, state);
        if previous != state {
            self.dirty = true;
        }
        previous
    }

    pub fn roles(&self) -> &RoleSet {
        &self.roles
    }

    pub fn set_roles(&mut self, roles: RoleSet) -> RoleSet {
        self.dirty = true;
        std::mem::replace(&mut self.roles, roles)
    }

    pub fn is_roles_manager(&self) -> bool {
        self.roles.is_roles_manager()
    }

    pub fn is_invitations_manager(&self) -> bool {
        self.roles.is_invitations_manager()
    }

    /// Store key sealed under the member's password hash
    pub fn store_key(&self) -> Option<&[u8]> {
        self.store_key.as_deref()
    }

    pub fn set_store_key(&mut self, key: Option<Vec<u8>>) -> Option<Vec<u8>> {
        self.dirty = true;
        std::mem::replace(&mut self.store_key, key)
    }

    pub fn is_stored(&self) -> bool {
        self.stored
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Membership {
            object: from_db(row.get(0)?),
            user: from_db(row.get(1)?),
            alias: row.get(2)?,
            state: row.get::<_, i64>(3)? as u16,
            roles: RoleSet::from_csv(&row.get::<_, String>(4)?),
            store_key: row.get(5)?,
            stored: true,
            dirty: false,
        })
    }

    pub fn load(&mut self, conn: &Connection, object: u64, user: u64) -> Result<bool> {
        let sql = format!(
            "SELECT {} FROM registry_object_users WHERE id_object = ?1 AND id_user = ?2",
            COLUMNS
        );
        match conn
            .query_row(&sql, params![to_db(object), to_db(user)], Membership::from_row)
            .optional()?
        {
            Some(m) => {
                *self = m;
                Ok(true)
            }
            None => {
                *self = Membership::default();
                Ok(false)
            }
        }
    }

    pub fn flush(&mut self, conn: &Connection, force: bool) -> Result<bool> {
        if !force && !self.dirty {
            return Ok(false);
        }
        conn.execute(
            "INSERT INTO registry_object_users \
             (id_object, id_user, alias, state, roles, mgr_roles, mgr_invites, store_key) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8) \
             ON CONFLICT (id_object, id_user) DO UPDATE SET \
             alias = excluded.alias, state = excluded.state, roles = excluded.roles, \
             mgr_roles = excluded.mgr_roles, mgr_invites = excluded.mgr_invites, \
             store_key = excluded.store_key, modified = CURRENT_TIMESTAMP",
            params![
                to_db(self.object),
                to_db(self.user),
                self.alias,
                self.state as i64,
                self.roles.to_csv(),
                self.roles.is_roles_manager(),
                self.roles.is_invitations_manager(),
                self.store_key
            ],
        )?;
        self.stored = true;
        self.dirty = false;
        Ok(true)
    }

    pub fn delete(&mut self, conn: &Connection) -> Result<bool> {
        let n = conn.execute(
            "DELETE FROM registry_object_users WHERE id_object = ?1 AND id_user = ?2",
            params![to_db(self.object), to_db(self.user)],
        )?;
        self.stored = false;
        Ok(n > 0)
    }
}

/// Every membership of `object`
pub fn list(conn: &Connection, object: u64) -> Result<Vec<Membership>> {
    let sql = format!(
        "SELECT {} FROM registry_object_users WHERE id_object = ?1 ORDER BY alias",
        COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![to_db(object)], Membership::from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

/// Active role managers of `object`, optionally ignoring one user.
/// Memberships whose state denies access do not count.
pub fn count_managers(conn: &Connection, object: u64, except: Option<u64>) -> Result<u64> {
    let n: i64 = conn.query_row(
        "SELECT COUNT(*) FROM registry_object_users \
         WHERE id_object = ?1 AND mgr_roles = 1 AND id_user <> ?2 AND (state & ?3) = 0",
        params![to_db(object), to_db(except.unwrap_or(0)), STATE_DENY_ACCESS as i64],
        |r| r.get(0),
    )?;
    Ok(n as u64)
}

/// Drop every membership of `object`
pub fn remove_all(conn: &Connection, object: u64) -> Result<usize> {
    Ok(conn.execute(
        "DELETE FROM registry_object_users WHERE id_object = ?1",
        params![to_db(object)],
    )?)
}
