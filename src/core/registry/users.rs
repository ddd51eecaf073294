use crate::core::id::Ref;
use crate::core::orm::{conflict, from_db, to_db, User};
use crate::error::Result;
use rusqlite::{params, Connection, OptionalExtension, Row};

const COLUMNS: &str = "id, username, email, name, state, ciphertext";

/// Global view of a user, kept on the registry shard
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserEntry {
    pub id: u64,
    pub username: String,
    pub email: String,
    pub name: String,
    pub state: u16,
    pub ciphertext: Vec<u8>,
}

impl UserEntry {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(UserEntry {
            id: from_db(row.get(0)?),
            username: row.get(1)?,
            email: row.get(2)?,
            name: row.get(3)?,
            state: row.get::<_, i64>(4)? as u16,
            ciphertext: row.get(5)?,
        })
    }
}

pub fn insert(conn: &Connection, user: &User, state: u16) -> Result<()> {
    conn.execute(
        "INSERT INTO registry_users (id, username, email, name, state, ciphertext) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            to_db(user.id()),
            user.username(),
            user.email(),
            user.name(),
            state as i64,
            user.ciphertext()
        ],
    )
    .map_err(|e| conflict(e, format!("username '{}' or email '{}' already taken", user.username(), user.email())))?;
    Ok(())
}

/// Mirror profile and password blob from the canonical user
pub fn update(conn: &Connection, user: &User) -> Result<()> {
    conn.execute(
        "UPDATE registry_users SET username = ?1, email = ?2, name = ?3, ciphertext = ?4, \
         modified = CURRENT_TIMESTAMP WHERE id = ?5",
        params![user.username(), user.email(), user.name(), user.ciphertext(), to_db(user.id())],
    )
    .map_err(|e| conflict(e, format!("username '{}' or email '{}' already taken", user.username(), user.email())))?;
    Ok(())
}

pub fn set_state(conn: &Connection, user: u64, state: u16) -> Result<bool> {
    let n = conn.execute(
        "UPDATE registry_users SET state = ?1, modified = CURRENT_TIMESTAMP WHERE id = ?2",
        params![state as i64, to_db(user)],
    )?;
    Ok(n > 0)
}

pub fn remove(conn: &Connection, user: u64) -> Result<bool> {
    let n = conn.execute("DELETE FROM registry_users WHERE id = ?1", params![to_db(user)])?;
    Ok(n > 0)
}

/// Look a user up by id, username or email
pub fn find(conn: &Connection, user: &Ref) -> Result<Option<UserEntry>> {
    let (filter, arg): (&str, Box<dyn rusqlite::ToSql>) = match user {
        Ref::Id(id) => ("id", Box::new(to_db(*id))),
        Ref::Alias(alias) => ("username", Box::new(alias.clone())),
        Ref::Email(email) => ("email", Box::new(email.clone())),
    };
    let sql = format!("SELECT {} FROM registry_users WHERE {} = ?1", COLUMNS, filter);
    Ok(conn.query_row(&sql, params![arg], UserEntry::from_row).optional()?)
}

pub fn username_taken(conn: &Connection, username: &str) -> Result<bool> {
    Ok(find(conn, &Ref::Alias(username.to_string()))?.is_some())
}

pub fn email_taken(conn: &Connection, email: &str) -> Result<bool> {
    Ok(find(conn, &Ref::Email(email.to_string()))?.is_some())
}
