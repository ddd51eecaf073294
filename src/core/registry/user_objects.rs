//! Organizations and stores a user belongs to, kept on the user's shard

use crate::core::id;
use crate::core::orm::{from_db, to_db};
use crate::error::Result;
use rusqlite::{params, Connection, Row};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserObjectEntry {
    pub user: u64,
    pub object: u64,
    pub object_type: u8,
    pub alias: String,
    pub favorite: bool,
}

impl UserObjectEntry {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(UserObjectEntry {
            user: from_db(row.get(0)?),
            object: from_db(row.get(1)?),
            object_type: row.get::<_, i64>(2)? as u8,
            alias: row.get(3)?,
            favorite: row.get(4)?,
        })
    }
}

/// Record (or refresh the alias of) a user's link to an object
pub fn upsert(conn: &Connection, user: u64, object: u64, alias: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO registry_user_objects (id_user, id_object, type, alias) VALUES (?1, ?2, ?3, ?4) \
         ON CONFLICT (id_user, id_object) DO UPDATE SET alias = excluded.alias",
        params![to_db(user), to_db(object), id::type_of(object) as i64, alias],
    )?;
    Ok(())
}

pub fn remove(conn: &Connection, user: u64, object: u64) -> Result<bool> {
    let n = conn.execute(
        "DELETE FROM registry_user_objects WHERE id_user = ?1 AND id_object = ?2",
        params![to_db(user), to_db(object)],
    )?;
    Ok(n > 0)
}

pub fn set_favorite(conn: &Connection, user: u64, object: u64, favorite: bool) -> Result<bool> {
    let n = conn.execute(
        "UPDATE registry_user_objects SET favorite = ?1 WHERE id_user = ?2 AND id_object = ?3",
        params![favorite, to_db(user), to_db(object)],
    )?;
    Ok(n > 0)
}

/// Objects of `user`, optionally only those of one id type; favorites first
pub fn list(conn: &Connection, user: u64, object_type: Option<u8>) -> Result<Vec<UserObjectEntry>> {
    let mut stmt = conn.prepare(
        "SELECT id_user, id_object, type, alias, favorite FROM registry_user_objects \
         WHERE id_user = ?1 AND (?2 IS NULL OR type = ?2) ORDER BY favorite DESC, alias",
    )?;
    let rows = stmt.query_map(
        params![to_db(user), object_type.map(|t| t as i64)],
        UserObjectEntry::from_row,
    )?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::orm::test_conn;

    #[test]
    fn test_user_objects() {
        let conn = test_conn();
        let user = id::make_id(1, id::TYPE_USER, 1, 1);
        let org = id::make_id(1, id::TYPE_ORG, 1, 1);
        let store = id::make_id(1, id::TYPE_STORE, 1, 1);
        upsert(&conn, user, org, "acme").unwrap();
        upsert(&conn, user, store, "main").unwrap();
        upsert(&conn, user, store, "primary").unwrap();

        assert_eq!(list(&conn, user, None).unwrap().len(), 2);
        let stores = list(&conn, user, Some(id::TYPE_STORE)).unwrap();
        assert_eq!(stores.len(), 1);
        assert_eq!(stores[0].alias, "primary");

        set_favorite(&conn, user, store, true).unwrap();
        assert_eq!(list(&conn, user, None).unwrap()[0].object, store);
        assert!(remove(&conn, user, org).unwrap());
        assert!(!remove(&conn, user, org).unwrap());
    }
}
