use super::{conflict, from_db, immutable, inserted_local, parse_time, to_db, Entity, Placement};
use crate::core::id::{self, TYPE_ORG};
use crate::error::{Result, VaultError};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

const COLUMNS: &str = "id, alias, name, id_creator, created, modified";

/// Organization owning stores
#[derive(Debug, Clone, Default)]
pub struct Organization {
    id: u64,
    alias: String,
    name: String,
    creator: u64,
    created: Option<DateTime<Utc>>,
    modified: Option<DateTime<Utc>>,
    stored: bool,
    dirty: bool,
    update_registry: bool,
}

impl Organization {
    pub fn new(placement: Placement) -> Self {
        Organization {
            id: placement.id(TYPE_ORG, 0),
            dirty: true,
            update_registry: true,
            ..Default::default()
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn set_id(&mut self, id: u64) -> Result<u64> {
        if self.stored {
            return Err(immutable("organization", "id"));
        }
        let previous = std::mem::replace(&mut self.id, id);
        self.dirty = true;
        Ok(previous)
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    pub fn set_alias(&mut self, alias: &str) -> String {
        let previous = std::mem::replace(&mut self.alias, alias.to_string());
        if previous != self.alias {
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

    pub fn creator(&self) -> u64 {
        self.creator
    }

    pub fn set_creator(&mut self, creator: u64) -> Result<u64> {
        if self.stored {
            return Err(immutable("organization", "creator"));
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

    pub fn needs_registry_update(&self) -> bool {
        self.update_registry
    }

    pub fn registry_updated(&mut self) {
        self.update_registry = false;
    }

    fn from_row(placement: Placement, row: &Row<'_>) -> Result<Self> {
        let local: i64 = row.get(0)?;
        Ok(Organization {
            id: placement.id(TYPE_ORG, local as u32),
            alias: row.get(1)?,
            name: row.get(2)?,
            creator: from_db(row.get(3)?),
            created: Some(parse_time(&row.get::<_, String>(4)?)?),
            modified: Some(parse_time(&row.get::<_, String>(5)?)?),
            stored: true,
            dirty: false,
            update_registry: false,
        })
    }

    fn load(&mut self, conn: &Connection, placement: Placement, filter: &str, arg: &dyn rusqlite::ToSql) -> Result<bool> {
        *self = Organization::default();
        let sql = format!("SELECT {} FROM orgs WHERE {} = ?1", COLUMNS, filter);
        match conn
            .query_row(&sql, &[arg], |row| Ok(Organization::from_row(placement, row)))
            .optional()?
        {
            Some(org) => {
                *self = org?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn by_id(&mut self, conn: &Connection, org: u64) -> Result<bool> {
        if id::type_of(org) != TYPE_ORG {
            *self = Organization::default();
            return Ok(false);
        }
        self.load(conn, Placement::of(org), "id", &(id::local(org) as i64))
    }

    pub fn by_alias(&mut self, conn: &Connection, placement: Placement, alias: &str) -> Result<bool> {
        self.load(conn, placement, "alias", &alias)
    }
}

impl Entity for Organization {
    fn is_stored(&self) -> bool {
        self.stored
    }

    fn is_dirty(&self) -> bool {
        self.dirty
    }

    fn is_valid(&self) -> bool {
        !self.alias.is_empty()
    }

    fn flush(&mut self, conn: &Connection, force: bool) -> Result<bool> {
        if !force && !self.dirty {
            return Ok(false);
        }
        if !self.is_valid() {
            return Err(VaultError::InvalidParameter("organization needs an alias".to_string()));
        }
        let taken = format!("organization alias '{}' already taken", self.alias);

        if self.stored {
            conn.execute(
                "UPDATE orgs SET alias = ?1, name = ?2, modified = CURRENT_TIMESTAMP WHERE id = ?3",
                params![self.alias, self.name, id::local(self.id) as i64],
            )
            .map_err(|e| conflict(e, taken))?;
        } else {
            let placement = Placement::of(self.id);
            let local = id::local(self.id);
            let local = if local != 0 { Some(local as i64) } else { None };
            conn.execute(
                "INSERT INTO orgs (id, alias, name, id_creator) VALUES (?1, ?2, ?3, ?4)",
                params![local, self.alias, self.name, to_db(self.creator)],
            )
            .map_err(|e| conflict(e, taken))?;
            self.id = placement.id(TYPE_ORG, inserted_local(conn)?);
            self.stored = true;
        }
        self.dirty = false;
        Ok(true)
    }
}
