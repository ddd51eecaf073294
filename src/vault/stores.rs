//! Stores and store sessions
//!
//! A store's data key is random and never stored in the clear. Each member
//! holds it sealed under their password hash in `registry_object_users`;
//! opening a store session unwraps it into the caller's session.

use super::{verify_password, Actor, Vault};
use crate::core::access::AccessRequest;
use crate::core::crypto;
use crate::core::id::{self, Ref, TYPE_STORE};
use crate::core::orm::{Action, Entity, Placement, Store};
use crate::core::params::Params;
use crate::core::registry::{org_stores, Membership, OrgStoreEntry};
use crate::core::roles::{
    admin_roles, role, RoleSet, CATEGORY_ORG, CATEGORY_STORE, FUNCTION_CREATE, FUNCTION_DELETE,
    FUNCTION_READ, FUNCTION_READ_LIST, FUNCTION_UPDATE, SUBCATEGORY_STORE,
};
use crate::core::router::{REGISTRY_GROUP, REGISTRY_SHARD};
use crate::core::session::{session_key, SessionStore, StoreSession};
use crate::core::state::{self, STATE_BLOCKED, STATE_DELETE};
use crate::core::validation;
use crate::error::{EntityKind, Result, VaultError};
use chrono::Utc;
use tracing::{debug, info, warn};

/// Action emitted after a store is marked deleted
pub const ACTION_CASCADE_STORE: &str = "cascade:delete:store";

#[derive(Debug, Clone, Default)]
pub struct StoreUpdate {
    pub alias: Option<String>,
    pub name: Option<String>,
}

fn require_store(store: u64) -> Result<()> {
    if id::type_of(store) != TYPE_STORE {
        return Err(VaultError::InvalidParameter(format!(
            "{} is not a store",
            id::format_id(store)
        )));
    }
    Ok(())
}

impl Vault {
    pub(super) fn load_store(&self, store: u64) -> Result<Store> {
        let mut entity = Store::default();
        if !entity.by_id(&*self.router.connect(store)?, store)? {
            return Err(VaultError::not_found(EntityKind::Store, id::format_id(store)));
        }
        Ok(entity)
    }

    /// Create a store in `org`.
    ///
    /// The creator becomes its administrator and receives the new data key
    /// sealed under their password hash, so the password is required.
    pub fn create_store(&self, actor: &Actor, org: &Ref, alias: &str, name: &str, password: &str) -> Result<Store> {
        let org = self.find_org(org)?;
        self.authorize(
            actor,
            AccessRequest::to(org.id).roles(&[role(CATEGORY_ORG | SUBCATEGORY_STORE, FUNCTION_CREATE)]),
        )?;
        let creator = self.account(actor)?;
        let hash = verify_password(&creator, password)?;
        let alias = validation::normalize_alias(alias)?;
        validation::validate_name("name", name)?;

        let org_conn = self.router.connect(org.id)?;
        if org_stores::by_alias(&org_conn, org.id, &alias)?.is_some() {
            return Err(VaultError::Conflict(format!(
                "store alias '{}' already taken in {}",
                alias, org.alias
            )));
        }

        let placement = self.placement()?;
        let mut store = Store::new(placement);
        store.set_org(org.id)?;
        store.set_alias(&alias);
        store.set_name(name);
        store.set_creator(actor.user)?;
        store.flush(&*self.router.connect_to(placement.group, placement.shard)?, false)?;
        org_stores::insert(&org_conn, org.id, store.id(), &alias)?;
        store.registry_updated();

        let key = crypto::random_key();
        let mut membership = Membership::new(store.id(), actor.user);
        membership.set_alias(&creator.username);
        membership.set_roles(RoleSet::from_roles(&admin_roles(CATEGORY_STORE)));
        membership.set_store_key(Some(crypto::seal(&hash, &key)?));
        self.join(membership, &alias)?;

        info!(store = %id::format_id(store.id()), org = %org.alias, alias = %alias, "store created");
        Ok(store)
    }

    /// Look a store up by id or by its alias inside `org`
    pub fn store(&self, actor: &Actor, org: &Ref, store: &Ref) -> Result<Store> {
        let org = self.find_org(org)?;
        let store_id = match store {
            Ref::Id(id) => *id,
            Ref::Alias(alias) => {
                org_stores::by_alias(&*self.router.connect(org.id)?, org.id, alias)?
                    .ok_or_else(|| VaultError::not_found(EntityKind::Store, alias))?
                    .store
            }
            Ref::Email(email) => {
                return Err(VaultError::InvalidParameter(format!("'{}' is not a store reference", email)))
            }
        };
        require_store(store_id)?;
        self.authorize(
            actor,
            AccessRequest::to(store_id).roles(&[role(CATEGORY_STORE | SUBCATEGORY_STORE, FUNCTION_READ)]),
        )?;
        let entity = self.load_store(store_id)?;
        if entity.org() != org.id {
            return Err(VaultError::not_found(EntityKind::Store, store));
        }
        Ok(entity)
    }

    /// Live stores of an organization, by alias
    pub fn org_stores(&self, actor: &Actor, org: &Ref) -> Result<Vec<OrgStoreEntry>> {
        let org = self.find_org(org)?;
        self.authorize(
            actor,
            AccessRequest::to(org.id).roles(&[role(CATEGORY_ORG | SUBCATEGORY_STORE, FUNCTION_READ_LIST)]),
        )?;
        let entries = org_stores::list(&*self.router.connect(org.id)?, org.id)?;
        Ok(entries
            .into_iter()
            .filter(|e| !state::has_any(e.state, STATE_DELETE))
            .collect())
    }

    pub fn update_store(&self, actor: &Actor, store: u64, update: StoreUpdate) -> Result<Store> {
        require_store(store)?;
        let grant = self.authorize(
            actor,
            AccessRequest::to(store).roles(&[role(CATEGORY_STORE | SUBCATEGORY_STORE, FUNCTION_UPDATE)]),
        )?;
        let mut entity = self.load_store(store)?;
        let org_conn = self.router.connect(grant.org)?;

        if let Some(alias) = update.alias {
            let alias = validation::normalize_alias(&alias)?;
            if alias != entity.alias() && org_stores::by_alias(&org_conn, grant.org, &alias)?.is_some() {
                return Err(VaultError::Conflict(format!("store alias '{}' already taken", alias)));
            }
            entity.set_alias(&alias);
        }
        if let Some(name) = update.name {
            validation::validate_name("name", &name)?;
            entity.set_name(&name);
        }

        entity.flush(&*self.router.connect(store)?, false)?;
        if entity.needs_registry_update() {
            org_stores::set_alias(&org_conn, grant.org, store, entity.alias())?;
            entity.registry_updated();
        }
        Ok(entity)
    }

    /// Mark a store deleted and blocked in its organization, then hand the
    /// cleanup to a worker
    pub fn delete_store(&self, actor: &Actor, store: u64) -> Result<Action> {
        require_store(store)?;
        let grant = self.authorize(
            actor,
            AccessRequest::to(store).roles(&[role(CATEGORY_STORE | SUBCATEGORY_STORE, FUNCTION_DELETE)]),
        )?;
        let org_conn = self.router.connect(grant.org)?;
        let entry = org_stores::get(&org_conn, grant.org, store)?
            .ok_or_else(|| VaultError::not_found(EntityKind::Store, id::format_id(store)))?;
        org_stores::set_state(
            &org_conn,
            grant.org,
            store,
            state::set(entry.state, STATE_DELETE | STATE_BLOCKED),
        )?;

        let mut params = Params::new();
        params.set_path("org", id::format_id(grant.org));
        params.set_path("store", id::format_id(store));
        let mut action = Action::new("", ACTION_CASCADE_STORE);
        action.set_creator(actor.user)?;
        action.set_parameters(params);
        self.emit(Placement::new(REGISTRY_GROUP, REGISTRY_SHARD), &mut action)?;

        info!(store = %entry.alias, guid = action.guid(), "store deleted");
        Ok(action)
    }

    /// Unwrap the caller's store key and keep it in `session`
    pub fn open_store_session(
        &self,
        actor: &Actor,
        session: &dyn SessionStore,
        store: u64,
        password: &str,
    ) -> Result<StoreSession> {
        require_store(store)?;
        let grant = self.authorize(actor, AccessRequest::to(store))?;
        let account = self.account(actor)?;
        let hash = verify_password(&account, password)?;
        let wrapped = grant
            .membership
            .store_key()
            .ok_or_else(|| VaultError::AccessDenied(format!("no key for store {}", id::format_id(store))))?;
        let key = crypto::open_key(&hash, wrapped)?;

        let opened = StoreSession::new(store, key, Utc::now(), self.config.session.extend_minutes);
        session.set(&session_key(store), opened.export());
        info!(store = %id::format_id(store), user = %account.username, "store session opened");
        Ok(opened)
    }

    /// Validate and extend the token held in `session` without access checks
    pub(super) fn resume_token(&self, session: &dyn SessionStore, store: u64) -> Result<StoreSession> {
        let name = session_key(store);
        let token = session
            .get(&name)
            .ok_or_else(|| VaultError::InvalidSession(format!("no session for store {}", id::format_id(store))))?;
        let (resumed, token) = match StoreSession::resume(&token, Utc::now(), self.config.session.extend_minutes) {
            Ok(resumed) => resumed,
            Err(e) => {
                debug!(store = %id::format_id(store), error = %e, "dropping store session");
                session.remove(&name);
                return Err(e);
            }
        };
        if resumed.store() != store {
            warn!(store = %id::format_id(store), "store session token names another store");
            session.remove(&name);
            return Err(VaultError::InvalidSession("token is for another store".to_string()));
        }
        session.set(&name, token);
        Ok(resumed)
    }

    /// Check the caller may still use `store` and extend its session
    pub fn resume_store_session(&self, actor: &Actor, session: &dyn SessionStore, store: u64) -> Result<StoreSession> {
        require_store(store)?;
        self.authorize(actor, AccessRequest::to(store))?;
        self.resume_token(session, store)
    }

    /// Forget the store key; returns whether a session was open
    pub fn close_store_session(&self, session: &dyn SessionStore, store: u64) -> bool {
        let closed = session.remove(&session_key(store)).is_some();
        if closed {
            info!(store = %id::format_id(store), "store session closed");
        }
        closed
    }
}
