//! Request index on the registry shard, keyed by guid

use crate::core::orm::{format_time, from_db, parse_time_opt, to_db, Request};
use crate::core::state::{STATE_CLOSED, STATE_NONE};
use crate::error::Result;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

const COLUMNS: &str = "guid, id, type, id_object, state, expiration";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestEntry {
    pub guid: String,
    pub id: u64,
    pub request_type: String,
    pub object: u64,
    pub state: u16,
    pub expiration: Option<DateTime<Utc>>,
}

fn from_row(row: &Row<'_>) -> rusqlite::Result<(String, i64, String, Option<i64>, i64, Option<String>)> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?, row.get(5)?))
}

fn entry(raw: (String, i64, String, Option<i64>, i64, Option<String>)) -> Result<RequestEntry> {
    let (guid, id, request_type, object, state, expiration) = raw;
    Ok(RequestEntry {
        guid,
        id: from_db(id),
        request_type,
        object: object.map(from_db).unwrap_or(0),
        state: state as u16,
        expiration: parse_time_opt(expiration)?,
    })
}

pub fn insert(conn: &Connection, request: &Request) -> Result<()> {
    let object = if request.object() != 0 { Some(to_db(request.object())) } else { None };
    conn.execute(
        "INSERT INTO registry_requests (guid, id, type, id_object, expiration) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            request.guid(),
            to_db(request.id()),
            request.request_type(),
            object,
            request.expiration().as_ref().map(format_time)
        ],
    )?;
    Ok(())
}

pub fn get(conn: &Connection, guid: &str) -> Result<Option<RequestEntry>> {
    let sql = format!("SELECT {} FROM registry_requests WHERE guid = ?1", COLUMNS);
    conn.query_row(&sql, params![guid], from_row)
        .optional()?
        .map(entry)
        .transpose()
}

pub fn set_state(conn: &Connection, guid: &str, state: u16) -> Result<bool> {
    let n = conn.execute(
        "UPDATE registry_requests SET state = ?1 WHERE guid = ?2",
        params![state as i64, guid],
    )?;
    Ok(n > 0)
}

/// Close open requests of `request_type` on `object` whose expiration has passed
pub fn expire_stale(conn: &Connection, request_type: &str, object: u64, now: DateTime<Utc>) -> Result<usize> {
    Ok(conn.execute(
        "UPDATE registry_requests SET state = ?1 \
         WHERE type = ?2 AND id_object = ?3 AND state = ?4 \
         AND expiration IS NOT NULL AND expiration <= ?5",
        params![
            STATE_CLOSED as i64,
            request_type,
            to_db(object),
            STATE_NONE as i64,
            format_time(&now)
        ],
    )?)
}

/// Newest open, unexpired request of `request_type` on `object`
pub fn newest_active(
    conn: &Connection,
    request_type: &str,
    object: u64,
    now: DateTime<Utc>,
) -> Result<Option<RequestEntry>> {
    let sql = format!(
        "SELECT {} FROM registry_requests \
         WHERE type = ?1 AND id_object = ?2 AND state = ?3 \
         AND (expiration IS NULL OR expiration > ?4) \
         ORDER BY created DESC, rowid DESC LIMIT 1",
        COLUMNS
    );
    conn.query_row(
        &sql,
        params![request_type, to_db(object), STATE_NONE as i64, format_time(&now)],
        from_row,
    )
    .optional()?
    .map(entry)
    .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::id;
    use crate::core::orm::{test_conn, Entity, Placement};
    use chrono::Duration;

    fn request(conn: &Connection, object: u64, expires: DateTime<Utc>) -> Request {
        let mut r = Request::new(Placement::of(object), "password:reset");
        r.set_object(object).unwrap();
        r.set_expiration(expires).unwrap();
        r.flush(conn, false).unwrap();
        insert(conn, &r).unwrap();
        r
    }

    #[test]
    fn test_newest_active_and_expiry() {
        let conn = test_conn();
        let user = id::make_id(1, id::TYPE_USER, 1, 1);
        let now = Utc::now();
        let old = request(&conn, user, now - Duration::hours(1));
        let live = request(&conn, user, now + Duration::hours(1));

        let found = newest_active(&conn, "password:reset", user, now).unwrap().unwrap();
        assert_eq!(found.guid, live.guid());

        assert_eq!(expire_stale(&conn, "password:reset", user, now).unwrap(), 1);
        assert_eq!(get(&conn, old.guid()).unwrap().unwrap().state, STATE_CLOSED);
        assert_eq!(get(&conn, live.guid()).unwrap().unwrap().state, STATE_NONE);

        set_state(&conn, live.guid(), STATE_CLOSED).unwrap();
        assert!(newest_active(&conn, "password:reset", user, now).unwrap().is_none());
    }
}
