//! Store objects
//!
//! Objects live on their store's shard. `body` is already sealed under the
//! store key by the caller; the row never sees plaintext. A folder's direct
//! children go with it on delete.

use super::{from_db, immutable, inserted_local, parse_time, to_db, Entity, Placement};
use crate::core::id::{self, TYPE_OTHER};
use crate::core::query::{FieldMapper, Page, Transpiler, Value, MAX_LIMIT};
use crate::error::{Result, VaultError};
use chrono::{DateTime, Utc};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

const COLUMNS: &str =
    "id, id_store, id_parent, type, title, object, id_creator, id_modifier, created, modified";

/// Largest sealed body accepted
pub const MAX_BODY_SIZE: usize = 65_535;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ObjectType {
    Folder,
    #[default]
    Json,
}

impl ObjectType {
    pub fn as_i64(self) -> i64 {
        match self {
            ObjectType::Folder => 0,
            ObjectType::Json => 1,
        }
    }

    pub fn from_i64(v: i64) -> Result<Self> {
        match v {
            0 => Ok(ObjectType::Folder),
            1 => Ok(ObjectType::Json),
            other => Err(VaultError::InvalidParameter(format!("unknown object type {}", other))),
        }
    }

    pub fn parse(name: &str) -> Result<Self> {
        match name {
            "folder" => Ok(ObjectType::Folder),
            "json" => Ok(ObjectType::Json),
            other => Err(VaultError::InvalidParameter(format!("unknown object type '{}'", other))),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ObjectType::Folder => "folder",
            ObjectType::Json => "json",
        }
    }
}

/// Filterable object fields
pub struct ObjectFields;

impl FieldMapper for ObjectFields {
    fn map_field(&self, name: &str) -> Option<String> {
        let column = match name {
            "title" => "title",
            "type" => "type",
            "created" => "created",
            "modified" => "modified",
            _ => return None,
        };
        Some(column.to_string())
    }

    fn map_value(&self, field: &str, value: &Value) -> std::result::Result<Value, String> {
        match (field, value) {
            ("type", Value::String(s)) => ObjectType::parse(s)
                .map(|t| Value::Integer(t.as_i64()))
                .map_err(|e| e.to_string()),
            _ => Ok(value.clone()),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct StoreObject {
    id: u64,
    store: u64,
    parent: u64,
    object_type: ObjectType,
    title: String,
    body: Vec<u8>,
    creator: u64,
    modifier: u64,
    created: Option<DateTime<Utc>>,
    modified: Option<DateTime<Utc>>,
    stored: bool,
    dirty: bool,
}

impl StoreObject {
    /// New object in `store`, placed on the store's shard
    pub fn new(store: u64) -> Self {
        StoreObject {
            id: Placement::of(store).id(TYPE_OTHER, 0),
            store,
            dirty: true,
            ..Default::default()
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn store(&self) -> u64 {
        self.store
    }

    pub fn parent(&self) -> u64 {
        self.parent
    }

    /// Move under another folder of the same store; 0 is the root
    pub fn set_parent(&mut self, parent: u64) -> u64 {
        let previous = std::mem::replace(&mut self.parent, parent);
        if previous != parent {
            self.dirty = true;
        }
        previous
    }

    pub fn object_type(&self) -> ObjectType {
        self.object_type
    }

    pub fn set_object_type(&mut self, object_type: ObjectType) -> Result<ObjectType> {
        if self.stored {
            return Err(immutable("object", "type"));
        }
        let previous = std::mem::replace(&mut self.object_type, object_type);
        self.dirty = true;
        Ok(previous)
    }

    pub fn is_folder(&self) -> bool {
        self.object_type == ObjectType::Folder
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn set_title(&mut self, title: &str) -> String {
        let previous = std::mem::replace(&mut self.title, title.to_string());
        if previous != self.title {
            self.dirty = true;
        }
        previous
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn set_body(&mut self, body: Vec<u8>) -> Result<Vec<u8>> {
        if body.len() > MAX_BODY_SIZE {
            return Err(VaultError::InvalidParameter(format!(
                "object body of {} bytes exceeds {}",
                body.len(),
                MAX_BODY_SIZE
            )));
        }
        self.dirty = true;
        Ok(std::mem::replace(&mut self.body, body))
    }

    pub fn creator(&self) -> u64 {
        self.creator
    }

    pub fn set_creator(&mut self, creator: u64) -> Result<u64> {
        if self.stored {
            return Err(immutable("object", "creator"));
        }
        let previous = std::mem::replace(&mut self.creator, creator);
        self.modifier = creator;
        self.dirty = true;
        Ok(previous)
    }

    pub fn modifier(&self) -> u64 {
        self.modifier
    }

    pub fn set_modifier(&mut self, modifier: u64) -> u64 {
        self.dirty = true;
        std::mem::replace(&mut self.modifier, modifier)
    }

    pub fn created(&self) -> Option<DateTime<Utc>> {
        self.created
    }

    pub fn modified(&self) -> Option<DateTime<Utc>> {
        self.modified
    }

    fn from_row(placement: Placement, row: &Row<'_>) -> Result<Self> {
        let local: i64 = row.get(0)?;
        Ok(StoreObject {
            id: placement.id(TYPE_OTHER, local as u32),
            store: from_db(row.get(1)?),
            parent: from_db(row.get(2)?),
            object_type: ObjectType::from_i64(row.get(3)?)?,
            title: row.get(4)?,
            body: row.get::<_, Option<Vec<u8>>>(5)?.unwrap_or_default(),
            creator: from_db(row.get(6)?),
            modifier: from_db(row.get(7)?),
            created: Some(parse_time(&row.get::<_, String>(8)?)?),
            modified: Some(parse_time(&row.get::<_, String>(9)?)?),
            stored: true,
            dirty: false,
        })
    }

    pub fn by_id(&mut self, conn: &Connection, object: u64) -> Result<bool> {
        *self = StoreObject::default();
        if id::type_of(object) != TYPE_OTHER {
            return Ok(false);
        }
        let sql = format!("SELECT {} FROM objects WHERE id = ?1", COLUMNS);
        let placement = Placement::of(object);
        match conn
            .query_row(&sql, params![id::local(object) as i64], |row| {
                Ok(StoreObject::from_row(placement, row))
            })
            .optional()?
        {
            Some(o) => {
                *self = o?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Delete this object; a folder takes its direct children along.
    /// Returns the number of rows removed.
    pub fn delete(&mut self, conn: &Connection) -> Result<usize> {
        if !self.stored {
            return Ok(0);
        }
        let mut removed = 0;
        if self.is_folder() {
            removed += conn.execute(
                "DELETE FROM objects WHERE id_store = ?1 AND id_parent = ?2",
                params![to_db(self.store), to_db(self.id)],
            )?;
        }
        removed += conn.execute(
            "DELETE FROM objects WHERE id = ?1",
            params![id::local(self.id) as i64],
        )?;
        self.stored = false;
        Ok(removed)
    }

    /// Whether any object sits directly under this one
    pub fn has_children(&self, conn: &Connection) -> Result<bool> {
        let found = conn
            .query_row(
                "SELECT 1 FROM objects WHERE id_store = ?1 AND id_parent = ?2 LIMIT 1",
                params![to_db(self.store), to_db(self.id)],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Children of `parent` in `store` matching the transpiled query
    pub fn list<M: FieldMapper + ?Sized>(
        conn: &Connection,
        store: u64,
        parent: u64,
        transpiler: &mut Transpiler<'_, M>,
    ) -> Result<Page<StoreObject>> {
        let want_count = transpiler.query().count;
        let out = transpiler.transpile();
        if let Some(err) = &out.error {
            return Err(VaultError::InvalidParameter(err.clone()));
        }

        let mut args: Vec<rusqlite::types::Value> = vec![
            rusqlite::types::Value::Integer(to_db(store)),
            rusqlite::types::Value::Integer(to_db(parent)),
        ];
        args.extend(out.args.iter().cloned());
        let condition = out.where_with("id_store = ? AND id_parent = ?");

        let sql = format!("SELECT {} FROM objects{}{}", COLUMNS, condition, out.tail());
        let placement = Placement::of(store);
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(args.iter()), |row| {
            Ok(StoreObject::from_row(placement, row))
        })?;
        let mut items = Vec::new();
        for row in rows {
            items.push(row??);
        }

        let max_count = if want_count {
            let sql = format!("SELECT COUNT(*) FROM objects{}", condition);
            let n: i64 = conn.query_row(&sql, params_from_iter(args.iter()), |r| r.get(0))?;
            Some(n as u64)
        } else {
            None
        };

        Ok(Page {
            items,
            offset: out.offset,
            limit: out.limit,
            max_limit: MAX_LIMIT,
            max_count,
        })
    }
}

impl Entity for StoreObject {
    fn is_stored(&self) -> bool {
        self.stored
    }

    fn is_dirty(&self) -> bool {
        self.dirty
    }

    fn is_valid(&self) -> bool {
        self.store != 0 && !self.title.is_empty() && self.body.len() <= MAX_BODY_SIZE
    }

    fn flush(&mut self, conn: &Connection, force: bool) -> Result<bool> {
        if !force && !self.dirty {
            return Ok(false);
        }
        if !self.is_valid() {
            return Err(VaultError::InvalidParameter("object needs a store and a title".to_string()));
        }
        let body = if self.is_folder() { None } else { Some(&self.body) };
        if self.stored {
            conn.execute(
                "UPDATE objects SET id_parent = ?1, title = ?2, object = ?3, id_modifier = ?4, \
                 modified = CURRENT_TIMESTAMP WHERE id = ?5",
                params![to_db(self.parent), self.title, body, to_db(self.modifier), id::local(self.id) as i64],
            )?;
        } else {
            let placement = Placement::of(self.id);
            conn.execute(
                "INSERT INTO objects (id_store, id_parent, type, title, object, id_creator, id_modifier) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    to_db(self.store),
                    to_db(self.parent),
                    self.object_type.as_i64(),
                    self.title,
                    body,
                    to_db(self.creator),
                    to_db(self.modifier)
                ],
            )?;
            self.id = placement.id(TYPE_OTHER, inserted_local(conn)?);
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
    use crate::core::query::{Function, Query, Sort};

    const STORE: u64 = id::make_id(1, id::TYPE_STORE, 5, 1);

    fn object(conn: &Connection, parent: u64, kind: ObjectType, title: &str) -> StoreObject {
        let mut o = StoreObject::new(STORE);
        o.set_parent(parent);
        o.set_object_type(kind).unwrap();
        o.set_title(title);
        o.set_creator(7).unwrap();
        if kind == ObjectType::Json {
            o.set_body(vec![0xAA; 40]).unwrap();
        }
        o.flush(conn, false).unwrap();
        o
    }

    #[test]
    fn test_object_placed_with_store() {
        let conn = test_conn();
        let o = object(&conn, 0, ObjectType::Json, "note");
        assert_eq!(id::shard(o.id()), 5);
        assert_eq!(id::type_of(o.id()), TYPE_OTHER);

        let mut loaded = StoreObject::default();
        assert!(loaded.by_id(&conn, o.id()).unwrap());
        assert_eq!(loaded.body(), &[0xAA; 40][..]);
        assert_eq!(loaded.modifier(), 7);
    }

    #[test]
    fn test_body_size_limit() {
        let mut o = StoreObject::new(STORE);
        assert!(o.set_body(vec![0; MAX_BODY_SIZE]).is_ok());
        assert!(o.set_body(vec![0; MAX_BODY_SIZE + 1]).is_err());
    }

    #[test]
    fn test_folder_delete_takes_children() {
        let conn = test_conn();
        let mut folder = object(&conn, 0, ObjectType::Folder, "docs");
        object(&conn, folder.id(), ObjectType::Json, "a");
        object(&conn, folder.id(), ObjectType::Json, "b");
        let keep = object(&conn, 0, ObjectType::Json, "c");

        assert_eq!(folder.delete(&conn).unwrap(), 3);
        let mut probe = StoreObject::default();
        assert!(probe.by_id(&conn, keep.id()).unwrap());
        assert!(!probe.by_id(&conn, folder.id()).unwrap());
    }

    #[test]
    fn test_list_with_filter_and_count() {
        let conn = test_conn();
        let folder = object(&conn, 0, ObjectType::Folder, "docs");
        for title in ["alpha", "beta", "alphabet", "gamma"] {
            object(&conn, folder.id(), ObjectType::Json, title);
        }
        object(&conn, 0, ObjectType::Json, "alpha-root");

        let q = Query::new()
            .filter(Function::contains("title", "alpha*"))
            .sort(Sort::desc("title"))
            .with_count();
        let mut t = Transpiler::new(&ObjectFields, q);
        let page = StoreObject::list(&conn, STORE, folder.id(), &mut t).unwrap();
        let titles: Vec<_> = page.items.iter().map(|o| o.title().to_string()).collect();
        assert_eq!(titles, vec!["alphabet", "alpha"]);
        assert_eq!(page.max_count, Some(2));
        assert_eq!(page.limit, MAX_LIMIT);

        let mut t = Transpiler::new(&ObjectFields, Query::new().filter(Function::eq("type", Value::string("folder"))));
        let page = StoreObject::list(&conn, STORE, 0, &mut t).unwrap();
        assert_eq!(page.items.len(), 1);
        assert!(page.max_count.is_none());

        let mut t = Transpiler::new(&ObjectFields, Query::new().filter(Function::eq("owner", Value::Integer(1))));
        assert!(StoreObject::list(&conn, STORE, 0, &mut t).is_err());
    }
}
