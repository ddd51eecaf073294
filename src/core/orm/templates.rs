//! Versioned object templates
//!
//! Templates are global and live on the registry shard. A `(name, version)` pair
//! is written once; new revisions get a new version.

use super::{immutable, parse_time, Entity};
use crate::error::{Result, VaultError};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde_json::{json, Map, Value};

const COLUMNS: &str = "id, name, version, title, description, model, created";

/// Field every exported model carries
pub const TITLE_FIELD: &str = "__title";

#[derive(Debug, Clone, Default)]
pub struct Template {
    id: u32,
    name: String,
    version: u32,
    title: String,
    description: String,
    model: Value,
    created: Option<DateTime<Utc>>,
    stored: bool,
    dirty: bool,
}

impl Template {
    pub fn new(name: &str, version: u32) -> Self {
        Template {
            name: name.to_string(),
            version,
            model: Value::Object(Map::new()),
            dirty: true,
            ..Default::default()
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn set_title(&mut self, title: &str) -> Result<String> {
        if self.stored {
            return Err(immutable("template", "title"));
        }
        self.dirty = true;
        Ok(std::mem::replace(&mut self.title, title.to_string()))
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn set_description(&mut self, description: &str) -> Result<String> {
        if self.stored {
            return Err(immutable("template", "description"));
        }
        self.dirty = true;
        Ok(std::mem::replace(&mut self.description, description.to_string()))
    }

    pub fn model(&self) -> &Value {
        &self.model
    }

    pub fn set_model(&mut self, model: Value) -> Result<Value> {
        if self.stored {
            return Err(immutable("template", "model"));
        }
        self.dirty = true;
        Ok(std::mem::replace(&mut self.model, model))
    }

    pub fn created(&self) -> Option<DateTime<Utc>> {
        self.created
    }

    fn from_row(row: &Row<'_>) -> Result<Self> {
        let model: String = row.get(5)?;
        Ok(Template {
            id: row.get::<_, i64>(0)? as u32,
            name: row.get(1)?,
            version: row.get::<_, i64>(2)? as u32,
            title: row.get(3)?,
            description: row.get(4)?,
            model: serde_json::from_str(&model)?,
            created: Some(parse_time(&row.get::<_, String>(6)?)?),
            stored: true,
            dirty: false,
        })
    }

    fn load(&mut self, conn: &Connection, sql: &str, args: impl rusqlite::Params) -> Result<bool> {
        *self = Template::default();
        match conn
            .query_row(sql, args, |row| Ok(Template::from_row(row)))
            .optional()?
        {
            Some(t) => {
                *self = t?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn by_id(&mut self, conn: &Connection, id: u32) -> Result<bool> {
        let sql = format!("SELECT {} FROM templates WHERE id = ?1", COLUMNS);
        self.load(conn, &sql, params![id as i64])
    }

    /// Highest version of `name`
    pub fn by_name_latest(&mut self, conn: &Connection, name: &str) -> Result<bool> {
        let sql = format!(
            "SELECT {} FROM templates WHERE name = ?1 ORDER BY version DESC LIMIT 1",
            COLUMNS
        );
        self.load(conn, &sql, params![name])
    }

    /// Exact version of `name`; version 0 means the latest
    pub fn by_name_version(&mut self, conn: &Connection, name: &str, version: u32) -> Result<bool> {
        if version == 0 {
            return self.by_name_latest(conn, name);
        }
        let sql = format!("SELECT {} FROM templates WHERE name = ?1 AND version = ?2", COLUMNS);
        self.load(conn, &sql, params![name, version as i64])
    }

    /// Template as handed to clients, with the title field guaranteed in the model
    pub fn export(&self) -> Value {
        let mut model = self.model.clone();
        ensure_title_field(&mut model);
        json!({
            "name": self.name,
            "version": self.version,
            "title": self.title,
            "description": self.description,
            "model": model,
        })
    }
}

fn ensure_title_field(model: &mut Value) {
    if !model.is_object() {
        *model = Value::Object(Map::new());
    }
    let Some(obj) = model.as_object_mut() else {
        return;
    };
    let fields = obj
        .entry("fields")
        .or_insert_with(|| Value::Object(Map::new()));
    match fields {
        Value::Object(map) => {
            map.entry(TITLE_FIELD)
                .or_insert_with(|| json!({ "type": "string", "title": "Title" }));
        }
        Value::Array(list) => {
            let present = list
                .iter()
                .any(|f| f.get("name").and_then(Value::as_str) == Some(TITLE_FIELD));
            if !present {
                list.insert(0, json!({ "name": TITLE_FIELD, "type": "string", "title": "Title" }));
            }
        }
        other => {
            let mut map = Map::new();
            map.insert(
                TITLE_FIELD.to_string(),
                json!({ "type": "string", "title": "Title" }),
            );
            *other = Value::Object(map);
        }
    }
}

impl Entity for Template {
    fn is_stored(&self) -> bool {
        self.stored
    }

    fn is_dirty(&self) -> bool {
        self.dirty
    }

    fn is_valid(&self) -> bool {
        !self.name.is_empty() && self.version > 0 && !self.title.is_empty() && self.model.is_object()
    }

    fn flush(&mut self, conn: &Connection, force: bool) -> Result<bool> {
        if self.stored {
            if self.dirty || force {
                return Err(immutable("template", "row"));
            }
            return Ok(false);
        }
        if !self.is_valid() {
            return Err(VaultError::InvalidParameter(
                "template needs a name, a positive version, a title and an object model".to_string(),
            ));
        }
        conn.execute(
            "INSERT INTO templates (name, version, title, description, model) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                self.name,
                self.version as i64,
                self.title,
                self.description,
                serde_json::to_string(&self.model)?
            ],
        )
        .map_err(|e| super::conflict(e, format!("template {} v{} exists", self.name, self.version)))?;
        self.id = conn.last_insert_rowid() as u32;
        self.stored = true;
        self.dirty = false;
        Ok(true)
    }
}
