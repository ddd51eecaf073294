use super::{from_db, parse_time, to_db, Entity};
use crate::core::params::Params;
use crate::error::{Result, VaultError};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

const COLUMNS: &str = "guid, parent, type, parameters, properties, state, id_creator, created, modified";

/// Delivery state of an outbound action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionState {
    #[default]
    Registered,
    Queued,
    Processed,
}

impl ActionState {
    pub fn as_i64(self) -> i64 {
        match self {
            ActionState::Registered => 0,
            ActionState::Queued => 1,
            ActionState::Processed => 2,
        }
    }

    pub fn from_i64(v: i64) -> Result<Self> {
        match v {
            0 => Ok(ActionState::Registered),
            1 => Ok(ActionState::Queued),
            2 => Ok(ActionState::Processed),
            other => Err(VaultError::InvalidParameter(format!("unknown action state {}", other))),
        }
    }
}

/// Message handed to the worker queue
#[derive(Debug, Clone, Default)]
pub struct Action {
    guid: String,
    parent: Option<String>,
    action_type: String,
    parameters: Params,
    properties: Params,
    state: ActionState,
    creator: u64,
    created: Option<DateTime<Utc>>,
    modified: Option<DateTime<Utc>>,
    stored: bool,
    dirty: bool,
}

impl Action {
    /// New action; an empty `guid` gets a fresh one
    pub fn new(guid: &str, action_type: &str) -> Self {
        let guid = if guid.is_empty() {
            uuid::Uuid::new_v4().to_string()
        } else {
            guid.to_string()
        };
        Action {
            guid,
            action_type: action_type.to_string(),
            dirty: true,
            ..Default::default()
        }
    }

    pub fn guid(&self) -> &str {
        &self.guid
    }

    pub fn parent(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    pub fn set_parent(&mut self, parent: &str) -> Result<Option<String>> {
        if self.stored {
            return Err(super::immutable("action", "parent"));
        }
        self.dirty = true;
        Ok(self.parent.replace(parent.to_string()))
    }

    pub fn action_type(&self) -> &str {
        &self.action_type
    }

    pub fn parameters(&self) -> &Params {
        &self.parameters
    }

    pub fn set_parameters(&mut self, parameters: Params) -> Params {
        self.dirty = true;
        std::mem::replace(&mut self.parameters, parameters)
    }

    pub fn properties(&self) -> &Params {
        &self.properties
    }

    pub fn set_properties(&mut self, properties: Params) -> Params {
        self.dirty = true;
        std::mem::replace(&mut self.properties, properties)
    }

    pub fn state(&self) -> ActionState {
        self.state
    }

    /// Dirty only when the state actually changes
    pub fn set_state(&mut self, state: ActionState) -> ActionState {
        let previous = std::mem::replace(&mut self.state, state);
        if previous != state {
            self.dirty = true;
        }
        previous
    }

    pub fn creator(&self) -> u64 {
        self.creator
    }

    pub fn set_creator(&mut self, creator: u64) -> Result<u64> {
        if self.stored {
            return Err(super::immutable("action", "creator"));
        }
        self.dirty = true;
        Ok(std::mem::replace(&mut self.creator, creator))
    }

    pub fn created(&self) -> Option<DateTime<Utc>> {
        self.created
    }

    pub fn modified(&self) -> Option<DateTime<Utc>> {
        self.modified
    }

    fn from_row(row: &Row<'_>) -> Result<Self> {
        Ok(Action {
            guid: row.get(0)?,
            parent: row.get(1)?,
            action_type: row.get(2)?,
            parameters: Params::from_json(&row.get::<_, String>(3)?)?,
            properties: Params::from_json(&row.get::<_, String>(4)?)?,
            state: ActionState::from_i64(row.get(5)?)?,
            creator: from_db(row.get(6)?),
            created: Some(parse_time(&row.get::<_, String>(7)?)?),
            modified: Some(parse_time(&row.get::<_, String>(8)?)?),
            stored: true,
            dirty: false,
        })
    }

    pub fn by_guid(&mut self, conn: &Connection, guid: &str) -> Result<bool> {
        *self = Action::default();
        let sql = format!("SELECT {} FROM actions WHERE guid = ?1", COLUMNS);
        match conn
            .query_row(&sql, params![guid], |row| Ok(Action::from_row(row)))
            .optional()?
        {
            Some(a) => {
                *self = a?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

impl Entity for Action {
    fn is_stored(&self) -> bool {
        self.stored
    }

    fn is_dirty(&self) -> bool {
        self.dirty
    }

    fn is_valid(&self) -> bool {
        !self.guid.is_empty() && !self.action_type.is_empty()
    }

    fn flush(&mut self, conn: &Connection, force: bool) -> Result<bool> {
        if !force && !self.dirty {
            return Ok(false);
        }
        if !self.is_valid() {
            return Err(VaultError::InvalidParameter("action needs a guid and a type".to_string()));
        }
        if self.stored {
            conn.execute(
                "UPDATE actions SET parameters = ?1, properties = ?2, state = ?3, \
                 modified = CURRENT_TIMESTAMP WHERE guid = ?4",
                params![
                    self.parameters.to_json()?,
                    self.properties.to_json()?,
                    self.state.as_i64(),
                    self.guid
                ],
            )?;
        } else {
            conn.execute(
                "INSERT INTO actions (guid, parent, type, parameters, properties, state, id_creator) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    self.guid,
                    self.parent,
                    self.action_type,
                    self.parameters.to_json()?,
                    self.properties.to_json()?,
                    self.state.as_i64(),
                    to_db(self.creator)
                ],
            )
            .map_err(|e| super::conflict(e, format!("action {} exists", self.guid)))?;
            self.stored = true;
        }
        self.dirty = false;
        Ok(true)
    }
}
