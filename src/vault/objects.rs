//! Store objects
//!
//! Bodies are sealed under the store key held in the caller's store session.
//! Listing and moving work on metadata only and need no session.

use super::{Actor, Vault};
use crate::core::access::AccessRequest;
use crate::core::crypto;
use crate::core::id;
use crate::core::orm::objects::ObjectFields;
use crate::core::orm::{Entity, ObjectType, StoreObject};
use crate::core::query::{Page, Query, Transpiler};
use crate::core::roles::{
    role, CATEGORY_STORE, FUNCTION_CREATE, FUNCTION_DELETE, FUNCTION_READ, FUNCTION_READ_LIST,
    FUNCTION_UPDATE, SUBCATEGORY_OBJECT,
};
use crate::core::session::SessionStore;
use crate::core::validation;
use crate::error::{EntityKind, Result, VaultError};
use rusqlite::Connection;
use tracing::info;

fn object_role(functions: u32) -> u32 {
    role(CATEGORY_STORE | SUBCATEGORY_OBJECT, functions)
}

fn load_object(conn: &Connection, store: u64, object: u64) -> Result<StoreObject> {
    let mut entity = StoreObject::default();
    if !entity.by_id(conn, object)? || entity.store() != store {
        return Err(VaultError::not_found(EntityKind::Object, id::format_id(object)));
    }
    Ok(entity)
}

/// `parent` must be the root or a top-level folder of `store` other than `object`.
/// Folders nest one level deep so deleting a folder leaves no orphans.
fn check_parent(conn: &Connection, store: u64, object: u64, parent: u64) -> Result<()> {
    if parent == 0 {
        return Ok(());
    }
    if parent == object {
        return Err(VaultError::InvalidParameter("a folder cannot move below itself".to_string()));
    }
    let folder = load_object(conn, store, parent)?;
    if !folder.is_folder() {
        return Err(VaultError::InvalidParameter(format!(
            "{} is not a folder",
            id::format_id(parent)
        )));
    }
    if folder.parent() != 0 {
        return Err(VaultError::InvalidParameter(format!(
            "{} is not a top-level folder",
            id::format_id(parent)
        )));
    }
    Ok(())
}

fn seal_body(key: &crypto::Key, object_type: ObjectType, body: &[u8]) -> Result<Vec<u8>> {
    match object_type {
        ObjectType::Folder if body.is_empty() => Ok(Vec::new()),
        ObjectType::Folder => Err(VaultError::InvalidParameter("folders carry no body".to_string())),
        ObjectType::Json => {
            serde_json::from_slice::<serde_json::Value>(body)
                .map_err(|e| VaultError::InvalidParameter(format!("object body is not JSON: {}", e)))?;
            crypto::seal(key, body)
        }
    }
}

impl Vault {
    /// Create an object or folder under `parent` (0 for the root)
    #[allow(clippy::too_many_arguments)]
    pub fn create_object(
        &self,
        actor: &Actor,
        session: &dyn SessionStore,
        store: u64,
        parent: u64,
        object_type: ObjectType,
        title: &str,
        body: &[u8],
    ) -> Result<StoreObject> {
        self.authorize(actor, AccessRequest::to(store).roles(&[object_role(FUNCTION_CREATE)]))?;
        validation::validate_name("title", title)?;
        let opened = self.resume_token(session, store)?;
        let conn = self.router.connect(store)?;
        check_parent(&conn, store, 0, parent)?;

        let mut object = StoreObject::new(store);
        object.set_parent(parent);
        object.set_object_type(object_type)?;
        object.set_title(title);
        object.set_body(seal_body(opened.key(), object_type, body)?)?;
        object.set_creator(actor.user)?;
        object.flush(&conn, false)?;

        info!(object = %id::format_id(object.id()), store = %id::format_id(store), "object created");
        Ok(object)
    }

    /// An object with its decrypted body; folders have an empty body
    pub fn object(
        &self,
        actor: &Actor,
        session: &dyn SessionStore,
        store: u64,
        object: u64,
    ) -> Result<(StoreObject, Vec<u8>)> {
        self.authorize(actor, AccessRequest::to(store).roles(&[object_role(FUNCTION_READ)]))?;
        let opened = self.resume_token(session, store)?;
        let entity = load_object(&*self.router.connect(store)?, store, object)?;
        let body = if entity.is_folder() || entity.body().is_empty() {
            Vec::new()
        } else {
            crypto::open(opened.key(), entity.body())?
        };
        Ok((entity, body))
    }

    /// Change the title and/or body of an object
    pub fn update_object(
        &self,
        actor: &Actor,
        session: &dyn SessionStore,
        store: u64,
        object: u64,
        title: Option<&str>,
        body: Option<&[u8]>,
    ) -> Result<StoreObject> {
        self.authorize(actor, AccessRequest::to(store).roles(&[object_role(FUNCTION_UPDATE)]))?;
        let opened = self.resume_token(session, store)?;
        let conn = self.router.connect(store)?;
        let mut entity = load_object(&conn, store, object)?;

        if let Some(title) = title {
            validation::validate_name("title", title)?;
            entity.set_title(title);
        }
        if let Some(body) = body {
            entity.set_body(seal_body(opened.key(), entity.object_type(), body)?)?;
        }
        entity.set_modifier(actor.user);
        entity.flush(&conn, false)?;
        Ok(entity)
    }

    /// Move an object under another folder of the same store
    pub fn move_object(&self, actor: &Actor, store: u64, object: u64, parent: u64) -> Result<StoreObject> {
        self.authorize(actor, AccessRequest::to(store).roles(&[object_role(FUNCTION_UPDATE)]))?;
        let conn = self.router.connect(store)?;
        let mut entity = load_object(&conn, store, object)?;
        check_parent(&conn, store, object, parent)?;
        if parent != 0 && entity.is_folder() && entity.has_children(&conn)? {
            return Err(VaultError::InvalidParameter(
                "a folder with children cannot move into another folder".to_string(),
            ));
        }
        if entity.set_parent(parent) != parent {
            entity.set_modifier(actor.user);
            entity.flush(&conn, false)?;
        }
        Ok(entity)
    }

    /// Delete an object; a folder takes its direct children along.
    /// Returns the number of rows removed.
    pub fn delete_object(&self, actor: &Actor, store: u64, object: u64) -> Result<usize> {
        self.authorize(actor, AccessRequest::to(store).roles(&[object_role(FUNCTION_DELETE)]))?;
        let conn = self.router.connect(store)?;
        let mut entity = load_object(&conn, store, object)?;
        let removed = entity.delete(&conn)?;
        info!(object = %id::format_id(object), removed, "object deleted");
        Ok(removed)
    }

    /// Children of `parent` matching `query`; bodies stay sealed
    pub fn list_objects(&self, actor: &Actor, store: u64, parent: u64, query: Query) -> Result<Page<StoreObject>> {
        self.authorize(actor, AccessRequest::to(store).roles(&[object_role(FUNCTION_READ_LIST)]))?;
        let mut transpiler = Transpiler::new(&ObjectFields, query);
        StoreObject::list(&*self.router.connect(store)?, store, parent, &mut transpiler)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::orm::{test_conn, Placement};

    fn folder(conn: &Connection, store: u64, parent: u64) -> StoreObject {
        let mut f = StoreObject::new(store);
        f.set_parent(parent);
        f.set_object_type(ObjectType::Folder).unwrap();
        f.set_title("folder");
        f.set_creator(1).unwrap();
        f.flush(conn, false).unwrap();
        f
    }

    #[test]
    fn test_check_parent_refuses_cycles() {
        let conn = test_conn();
        let store = Placement::new(1, 2).id(id::TYPE_STORE, 1);
        let a = folder(&conn, store, 0);
        let b = folder(&conn, store, a.id());

        assert!(check_parent(&conn, store, b.id(), a.id()).is_ok());
        assert!(check_parent(&conn, store, a.id(), 0).is_ok());
        assert!(matches!(
            check_parent(&conn, store, 0, b.id()),
            Err(VaultError::InvalidParameter(_))
        ));
        assert!(matches!(
            check_parent(&conn, store, a.id(), b.id()),
            Err(VaultError::InvalidParameter(_))
        ));
        assert!(matches!(
            check_parent(&conn, store, a.id(), a.id()),
            Err(VaultError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_seal_body_rules() {
        let key = crypto::random_key();
        assert!(seal_body(&key, ObjectType::Folder, b"").unwrap().is_empty());
        assert!(seal_body(&key, ObjectType::Folder, b"{}").is_err());
        assert!(seal_body(&key, ObjectType::Json, b"not json").is_err());
        let sealed = seal_body(&key, ObjectType::Json, br#"{"a":1}"#).unwrap();
        assert_eq!(crypto::open(&key, &sealed).unwrap(), br#"{"a":1}"#);
    }
}
