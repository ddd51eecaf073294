use super::{conflict, from_db, immutable, inserted_local, parse_time, to_db, Entity, Placement};
use crate::core::id::{self, TYPE_STORE};
use crate::error::{Result, VaultError};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

const COLUMNS: &str = "id, id_org, alias, name, id_creator, created, modified";

/// Encrypted object store belonging to one organization
#[derive(Debug, Clone, Default)]
pub struct Store {
    id: u64,
    org: u64,
    alias: String,
    name: String,
    creator: u64,
    created: Option<DateTime<Utc>>,
    modified: Option<DateTime<Utc>>,
    stored: bool,
    dirty: bool,
    update_registry: bool,
}

impl Store {
    pub fn new(placement: Placement) -> Self {
        Store {
            id: placement.id(TYPE_STORE, 0),
            dirty: true,
            update_registry: true,
            ..Default::default()
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn org(&self) -> u64 {
        self.org
    }

    pub fn set_org(&mut self, org: u64) -> Result<u64> {
        if self.stored {
            return Err(immutable("store", "organization"));
        }
        let previous = std::mem::replace(&mut self.org, org);
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
        }
        previous
    }

    pub fn creator(&self) -> u64 {
        self.creator
    }

    pub fn set_creator(&mut self, creator: u64) -> Result<u64> {
        if self.stored {
            return Err(immutable("store", "creator"));
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
        Ok(Store {
            id: placement.id(TYPE_STORE, local as u32),
            org: from_db(row.get(1)?),
            alias: row.get(2)?,
            name: row.get(3)?,
            creator: from_db(row.get(4)?),
            created: Some(parse_time(&row.get::<_, String>(5)?)?),
            modified: Some(parse_time(&row.get::<_, String>(6)?)?),
            stored: true,
            dirty: false,
            update_registry: false,
        })
    }

    pub fn by_id(&mut self, conn: &Connection, store: u64) -> Result<bool> {
        *self = Store::default();
        if id::type_of(store) != TYPE_STORE {
            return Ok(false);
        }
        let sql = format!("SELECT {} FROM stores WHERE id = ?1", COLUMNS);
        let placement = Placement::of(store);
        match conn
            .query_row(&sql, params![id::local(store) as i64], |row| {
                Ok(Store::from_row(placement, row))
            })
            .optional()?
        {
            Some(s) => {
                *self = s?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Store `alias` of `org` hosted on `placement`
    pub fn by_alias(&mut self, conn: &Connection, placement: Placement, org: u64, alias: &str) -> Result<bool> {
        *self = Store::default();
        let sql = format!("SELECT {} FROM stores WHERE id_org = ?1 AND alias = ?2", COLUMNS);
        match conn
            .query_row(&sql, params![to_db(org), alias], |row| {
                Ok(Store::from_row(placement, row))
            })
            .optional()?
        {
            Some(s) => {
                *self = s?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

impl Entity for Store {
    fn is_stored(&self) -> bool {
        self.stored
    }

    fn is_dirty(&self) -> bool {
        self.dirty
    }

    fn is_valid(&self) -> bool {
        self.org != 0 && !self.alias.is_empty()
    }

    fn flush(&mut self, conn: &Connection, force: bool) -> Result<bool> {
        if !force && !self.dirty {
            return Ok(false);
        }
        if !self.is_valid() {
            return Err(VaultError::InvalidParameter(
                "store needs an organization and an alias".to_string(),
            ));
        }
        let taken = format!("store alias '{}' already taken", self.alias);

        if self.stored {
            conn.execute(
                "UPDATE stores SET alias = ?1, name = ?2, modified = CURRENT_TIMESTAMP WHERE id = ?3",
                params![self.alias, self.name, id::local(self.id) as i64],
            )
            .map_err(|e| conflict(e, taken))?;
        } else {
            let placement = Placement::of(self.id);
            conn.execute(
                "INSERT INTO stores (id_org, alias, name, id_creator) VALUES (?1, ?2, ?3, ?4)",
                params![to_db(self.org), self.alias, self.name, to_db(self.creator)],
            )
            .map_err(|e| conflict(e, taken))?;
            self.id = placement.id(TYPE_STORE, inserted_local(conn)?);
            self.stored = true;
        }
        self.dirty = false;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::orm::test_conn;

    #[test]
    fn test_store_alias_is_per_org() {
        let conn = test_conn();
        let org_a = id::make_id(1, id::TYPE_ORG, 1, 1);
        let org_b = id::make_id(1, id::TYPE_ORG, 1, 2);

        let mut a = Store::new(Placement::new(1, 9));
        a.set_org(org_a).unwrap();
        a.set_alias("vault");
        a.flush(&conn, false).unwrap();

        let mut b = Store::new(Placement::new(1, 9));
        b.set_org(org_b).unwrap();
        b.set_alias("vault");
        b.flush(&conn, false).unwrap();

        let mut dup = Store::new(Placement::new(1, 9));
        dup.set_org(org_a).unwrap();
        dup.set_alias("vault");
        assert!(matches!(dup.flush(&conn, false), Err(VaultError::Conflict(_))));

        let mut loaded = Store::default();
        assert!(loaded.by_alias(&conn, Placement::new(1, 9), org_b, "vault").unwrap());
        assert_eq!(loaded.id(), b.id());
        assert!(loaded.set_org(org_a).is_err());
    }

    #[test]
    fn test_store_requires_org() {
        let conn = test_conn();
        let mut s = Store::new(Placement::new(1, 9));
        s.set_alias("x");
        assert!(s.flush(&conn, false).is_err());
    }
}
