use super::{format_time, from_db, immutable, inserted_local, parse_time, parse_time_opt, to_db, Entity, Placement};
use crate::core::id::{self, TYPE_REQUEST};
use crate::core::params::Params;
use crate::error::{Result, VaultError};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

const COLUMNS: &str = "id, guid, type, id_object, parameters, properties, expiration, id_creator, created";

/// Pending user request (password reset and the like); written once
#[derive(Debug, Clone, Default)]
pub struct Request {
    id: u64,
    guid: String,
    request_type: String,
    object: u64,
    parameters: Params,
    properties: Params,
    expiration: Option<DateTime<Utc>>,
    creator: u64,
    created: Option<DateTime<Utc>>,
    stored: bool,
    dirty: bool,
}

impl Request {
    pub fn new(placement: Placement, request_type: &str) -> Self {
        Request {
            id: placement.id(TYPE_REQUEST, 0),
            guid: uuid::Uuid::new_v4().to_string(),
            request_type: request_type.to_string(),
            dirty: true,
            ..Default::default()
        }
    }

    fn guard(&self, field: &str) -> Result<()> {
        if self.stored {
            return Err(immutable("request", field));
        }
        Ok(())
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn guid(&self) -> &str {
        &self.guid
    }

    pub fn request_type(&self) -> &str {
        &self.request_type
    }

    /// Object the request is about; 0 when none
    pub fn object(&self) -> u64 {
        self.object
    }

    pub fn set_object(&mut self, object: u64) -> Result<u64> {
        self.guard("object")?;
        self.dirty = true;
        Ok(std::mem::replace(&mut self.object, object))
    }

    pub fn parameters(&self) -> &Params {
        &self.parameters
    }

    pub fn set_parameters(&mut self, parameters: Params) -> Result<Params> {
        self.guard("parameters")?;
        self.dirty = true;
        Ok(std::mem::replace(&mut self.parameters, parameters))
    }

    pub fn properties(&self) -> &Params {
        &self.properties
    }

    pub fn set_properties(&mut self, properties: Params) -> Result<Params> {
        self.guard("properties")?;
        self.dirty = true;
        Ok(std::mem::replace(&mut self.properties, properties))
    }

    pub fn expiration(&self) -> Option<DateTime<Utc>> {
        self.expiration
    }

    pub fn set_expiration(&mut self, expiration: DateTime<Utc>) -> Result<Option<DateTime<Utc>>> {
        self.guard("expiration")?;
        self.dirty = true;
        Ok(self.expiration.replace(expiration))
    }

    /// Requests without an expiration never expire
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiration.is_some_and(|e| e <= now)
    }

    pub fn creator(&self) -> u64 {
        self.creator
    }

    pub fn set_creator(&mut self, creator: u64) -> Result<u64> {
        self.guard("creator")?;
        self.dirty = true;
        Ok(std::mem::replace(&mut self.creator, creator))
    }

    pub fn created(&self) -> Option<DateTime<Utc>> {
        self.created
    }

    fn from_row(placement: Placement, row: &Row<'_>) -> Result<Self> {
        let local: i64 = row.get(0)?;
        Ok(Request {
            id: placement.id(TYPE_REQUEST, local as u32),
            guid: row.get(1)?,
            request_type: row.get(2)?,
            object: row.get::<_, Option<i64>>(3)?.map(from_db).unwrap_or(0),
            parameters: Params::from_json(&row.get::<_, String>(4)?)?,
            properties: Params::from_json(&row.get::<_, String>(5)?)?,
            expiration: parse_time_opt(row.get(6)?)?,
            creator: from_db(row.get(7)?),
            created: Some(parse_time(&row.get::<_, String>(8)?)?),
            stored: true,
            dirty: false,
        })
    }

    fn load(&mut self, conn: &Connection, placement: Placement, filter: &str, arg: &dyn rusqlite::ToSql) -> Result<bool> {
        *self = Request::default();
        let sql = format!("SELECT {} FROM requests WHERE {} = ?1", COLUMNS, filter);
        match conn
            .query_row(&sql, &[arg], |row| Ok(Request::from_row(placement, row)))
            .optional()?
        {
            Some(r) => {
                *self = r?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn by_id(&mut self, conn: &Connection, request: u64) -> Result<bool> {
        if id::type_of(request) != TYPE_REQUEST {
            *self = Request::default();
            return Ok(false);
        }
        self.load(conn, Placement::of(request), "id", &(id::local(request) as i64))
    }

    pub fn by_guid(&mut self, conn: &Connection, placement: Placement, guid: &str) -> Result<bool> {
        self.load(conn, placement, "guid", &guid)
    }
}

impl Entity for Request {
    fn is_stored(&self) -> bool {
        self.stored
    }

    fn is_dirty(&self) -> bool {
        self.dirty
    }

    fn is_valid(&self) -> bool {
        !self.guid.is_empty() && !self.request_type.is_empty()
    }

    fn flush(&mut self, conn: &Connection, force: bool) -> Result<bool> {
        if self.stored {
            if self.dirty || force {
                return Err(immutable("request", "row"));
            }
            return Ok(false);
        }
        if !self.is_valid() {
            return Err(VaultError::InvalidParameter("request needs a guid and a type".to_string()));
        }
        let object = if self.object != 0 { Some(to_db(self.object)) } else { None };
        let placement = Placement::of(self.id);
        conn.execute(
            "INSERT INTO requests (guid, type, id_object, parameters, properties, expiration, id_creator) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                self.guid,
                self.request_type,
                object,
                self.parameters.to_json()?,
                self.properties.to_json()?,
                self.expiration.as_ref().map(format_time),
                to_db(self.creator)
            ],
        )
        .map_err(|e| super::conflict(e, format!("request {} exists", self.guid)))?;
        self.id = placement.id(TYPE_REQUEST, inserted_local(conn)?);
        self.stored = true;
        self.dirty = false;
        Ok(true)
    }
}
