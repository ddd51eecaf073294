//! Stores of an organization, kept on the organization's shard

use crate::core::orm::{conflict, from_db, to_db};
use crate::error::Result;
use rusqlite::{params, Connection, OptionalExtension, Row};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrgStoreEntry {
    pub org: u64,
    pub store: u64,
    pub alias: String,
    pub state: u16,
}

impl OrgStoreEntry {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(OrgStoreEntry {
            org: from_db(row.get(0)?),
            store: from_db(row.get(1)?),
            alias: row.get(2)?,
            state: row.get::<_, i64>(3)? as u16,
        })
    }
}

const SELECT: &str = "SELECT id_org, id_store, alias, state FROM registry_org_stores";

pub fn insert(conn: &Connection, org: u64, store: u64, alias: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO registry_org_stores (id_org, id_store, alias) VALUES (?1, ?2, ?3)",
        params![to_db(org), to_db(store), alias],
    )
    .map_err(|e| conflict(e, format!("store alias '{}' already taken", alias)))?;
    Ok(())
}

pub fn set_alias(conn: &Connection, org: u64, store: u64, alias: &str) -> Result<()> {
    conn.execute(
        "UPDATE registry_org_stores SET alias = ?1, modified = CURRENT_TIMESTAMP \
         WHERE id_org = ?2 AND id_store = ?3",
        params![alias, to_db(org), to_db(store)],
    )
    .map_err(|e| conflict(e, format!("store alias '{}' already taken", alias)))?;
    Ok(())
}

pub fn set_state(conn: &Connection, org: u64, store: u64, state: u16) -> Result<bool> {
    let n = conn.execute(
        "UPDATE registry_org_stores SET state = ?1, modified = CURRENT_TIMESTAMP \
         WHERE id_org = ?2 AND id_store = ?3",
        params![state as i64, to_db(org), to_db(store)],
    )?;
    Ok(n > 0)
}

pub fn get(conn: &Connection, org: u64, store: u64) -> Result<Option<OrgStoreEntry>> {
    let sql = format!("{} WHERE id_org = ?1 AND id_store = ?2", SELECT);
    Ok(conn
        .query_row(&sql, params![to_db(org), to_db(store)], OrgStoreEntry::from_row)
        .optional()?)
}

pub fn by_alias(conn: &Connection, org: u64, alias: &str) -> Result<Option<OrgStoreEntry>> {
    let sql = format!("{} WHERE id_org = ?1 AND alias = ?2", SELECT);
    Ok(conn
        .query_row(&sql, params![to_db(org), alias], OrgStoreEntry::from_row)
        .optional()?)
}

pub fn list(conn: &Connection, org: u64) -> Result<Vec<OrgStoreEntry>> {
    let sql = format!("{} WHERE id_org = ?1 ORDER BY alias", SELECT);
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![to_db(org)], OrgStoreEntry::from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}
