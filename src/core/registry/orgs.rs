use crate::core::id::Ref;
use crate::core::orm::{conflict, from_db, to_db, Organization};
use crate::error::{Result, VaultError};
use rusqlite::{params, Connection, OptionalExtension, Row};

/// Global view of an organization, kept on the registry shard
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrgEntry {
    pub id: u64,
    pub alias: String,
    pub name: String,
    pub state: u16,
}

impl OrgEntry {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(OrgEntry {
            id: from_db(row.get(0)?),
            alias: row.get(1)?,
            name: row.get(2)?,
            state: row.get::<_, i64>(3)? as u16,
        })
    }
}

pub fn insert(conn: &Connection, org: &Organization, state: u16) -> Result<()> {
    conn.execute(
        "INSERT INTO registry_orgs (id, alias, name, state) VALUES (?1, ?2, ?3, ?4)",
        params![to_db(org.id()), org.alias(), org.name(), state as i64],
    )
    .map_err(|e| conflict(e, format!("organization alias '{}' already taken", org.alias())))?;
    Ok(())
}

pub fn update(conn: &Connection, org: &Organization) -> Result<()> {
    conn.execute(
        "UPDATE registry_orgs SET alias = ?1, name = ?2, modified = CURRENT_TIMESTAMP WHERE id = ?3",
        params![org.alias(), org.name(), to_db(org.id())],
    )
    .map_err(|e| conflict(e, format!("organization alias '{}' already taken", org.alias())))?;
    Ok(())
}

pub fn set_state(conn: &Connection, org: u64, state: u16) -> Result<bool> {
    let n = conn.execute(
        "UPDATE registry_orgs SET state = ?1, modified = CURRENT_TIMESTAMP WHERE id = ?2",
        params![state as i64, to_db(org)],
    )?;
    Ok(n > 0)
}

/// Look an organization up by id or alias
pub fn find(conn: &Connection, org: &Ref) -> Result<Option<OrgEntry>> {
    let sql = "SELECT id, alias, name, state FROM registry_orgs WHERE ";
    let entry = match org {
        Ref::Id(id) => conn
            .query_row(&format!("{}id = ?1", sql), params![to_db(*id)], OrgEntry::from_row)
            .optional()?,
        Ref::Alias(alias) => conn
            .query_row(&format!("{}alias = ?1", sql), params![alias], OrgEntry::from_row)
            .optional()?,
        Ref::Email(email) => {
            return Err(VaultError::InvalidParameter(format!(
                "'{}' is not an organization reference",
                email
            )))
        }
    };
    Ok(entry)
}
