//! Invitation index on the registry shard, keyed by uid

use crate::core::orm::{format_time, from_db, parse_time, to_db, Invitation};
use crate::error::{Result, VaultError};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InviteEntry {
    pub uid: String,
    pub id: u64,
    pub object: u64,
    pub invitee: String,
    pub state: u16,
    pub expiration: DateTime<Utc>,
}

pub fn insert(conn: &Connection, invitation: &Invitation) -> Result<()> {
    let expiration = invitation
        .expiration()
        .ok_or_else(|| VaultError::InvalidParameter("invitation has no expiration".to_string()))?;
    conn.execute(
        "INSERT INTO registry_invites (uid, id, id_object, invitee, expiration) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            invitation.uid(),
            to_db(invitation.id()),
            to_db(invitation.object()),
            invitation.invitee(),
            format_time(&expiration)
        ],
    )?;
    Ok(())
}

pub fn get(conn: &Connection, uid: &str) -> Result<Option<InviteEntry>> {
    let row = conn
        .query_row(
            "SELECT uid, id, id_object, invitee, state, expiration FROM registry_invites WHERE uid = ?1",
            params![uid],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, i64>(4)?,
                    row.get::<_, String>(5)?,
                ))
            },
        )
        .optional()?;
    row.map(|(uid, id, object, invitee, state, expiration)| {
        Ok(InviteEntry {
            uid,
            id: from_db(id),
            object: from_db(object),
            invitee,
            state: state as u16,
            expiration: parse_time(&expiration)?,
        })
    })
    .transpose()
}

pub fn set_state(conn: &Connection, uid: &str, state: u16) -> Result<bool> {
    let n = conn.execute(
        "UPDATE registry_invites SET state = ?1 WHERE uid = ?2",
        params![state as i64, uid],
    )?;
    Ok(n > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::id;
    use crate::core::orm::{test_conn, Entity};
    use crate::core::state::STATE_ACCEPTED;
    use chrono::Duration;

    #[test]
    fn test_invite_index() {
        let conn = test_conn();
        let store = id::make_id(1, id::TYPE_STORE, 1, 1);
        let mut inv = Invitation::new(store);
        inv.set_uid("u1").unwrap();
        inv.set_invitee("bob@example.com").unwrap();
        inv.set_expiration(Utc::now() + Duration::days(1)).unwrap();
        inv.flush(&conn, false).unwrap();
        insert(&conn, &inv).unwrap();

        let entry = get(&conn, "u1").unwrap().unwrap();
        assert_eq!(entry.id, inv.id());
        assert_eq!(entry.state, 0);
        set_state(&conn, "u1", STATE_ACCEPTED).unwrap();
        assert_eq!(get(&conn, "u1").unwrap().unwrap().state, STATE_ACCEPTED);
        assert!(get(&conn, "nope").unwrap().is_none());
    }
}
