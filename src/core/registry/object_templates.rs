//! Templates attached to a store, kept on the store's shard

use crate::core::orm::to_db;
use crate::error::Result;
use rusqlite::{params, Connection};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectTemplateEntry {
    pub template: String,
    pub title: String,
}

pub fn attach(conn: &Connection, object: u64, template: &str, title: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO registry_object_templates (id_object, template, title) VALUES (?1, ?2, ?3) \
         ON CONFLICT (id_object, template) DO UPDATE SET title = excluded.title",
        params![to_db(object), template, title],
    )?;
    Ok(())
}

pub fn detach(conn: &Connection, object: u64, template: &str) -> Result<bool> {
    let n = conn.execute(
        "DELETE FROM registry_object_templates WHERE id_object = ?1 AND template = ?2",
        params![to_db(object), template],
    )?;
    Ok(n > 0)
}

pub fn list(conn: &Connection, object: u64) -> Result<Vec<ObjectTemplateEntry>> {
    let mut stmt = conn.prepare(
        "SELECT template, title FROM registry_object_templates WHERE id_object = ?1 ORDER BY template",
    )?;
    let rows = stmt.query_map(params![to_db(object)], |row| {
        Ok(ObjectTemplateEntry {
            template: row.get(0)?,
            title: row.get(1)?,
        })
    })?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::orm::test_conn;

    #[test]
    fn test_attach_detach() {
        let conn = test_conn();
        attach(&conn, 9, "contact", "Contact").unwrap();
        attach(&conn, 9, "contact", "Contacts").unwrap();
        attach(&conn, 9, "login", "Login").unwrap();
        let list = list(&conn, 9).unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].title, "Contacts");
        assert!(detach(&conn, 9, "login").unwrap());
    }
}
