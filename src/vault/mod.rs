//! Business operations
//!
//! Every mutating operation runs the same sequence: resolve references through
//! the registries, check access, load the canonical row from its home shard,
//! mutate, flush the canonical row, then flush the registry rows, then enqueue
//! any action. There are no cross-shard transactions; a failure between the
//! canonical and registry writes leaves the registry stale, and the registry
//! stays authoritative for access.

mod invitations;
mod members;
mod objects;
mod orgs;
mod recovery;
mod stores;
mod templates;
mod users;

pub use invitations::{Invited, ACTION_INVITATION};
pub use orgs::{OrgUpdate, ACTION_CASCADE_ORG};
pub use recovery::{ACTION_PASSWORD_RESET, REQUEST_PASSWORD_RESET};
pub use stores::{StoreUpdate, ACTION_CASCADE_STORE};
pub use users::UserUpdate;

use crate::core::access::{self, AccessRequest, Grant};
use crate::core::actions::{ActionPipeline, Publisher};
use crate::core::config::VaultConfig;
use crate::core::crypto::{self, Key};
use crate::core::id::{self, Ref, SYSTEM_ORG, TYPE_ORG, TYPE_STORE};
use crate::core::orm::{Action, Placement};
use crate::core::registry::{orgs as org_registry, users as user_registry, UserEntry};
use crate::core::roles::{self, CATEGORY_ORG, CATEGORY_STORE, CATEGORY_SYSTEM};
use crate::core::router::Router;
use crate::core::state::{self, STATE_DENY_ACCESS};
use crate::error::{EntityKind, Result, VaultError};
use std::sync::Arc;
use tracing::warn;

/// The authenticated caller of an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub user: u64,
}

impl Actor {
    pub fn new(user: u64) -> Self {
        Actor { user }
    }

    /// Caller without a session
    pub fn anonymous() -> Self {
        Actor { user: 0 }
    }

    pub fn is_anonymous(&self) -> bool {
        self.user == 0
    }
}

/// High-level entry point over a sharded deployment
pub struct Vault {
    config: VaultConfig,
    router: Router,
    publisher: Arc<dyn Publisher>,
}

impl Vault {
    /// Validate `config` and build the shard router
    pub fn new(config: VaultConfig, publisher: Arc<dyn Publisher>) -> Result<Self> {
        let router = Router::new(&config)?;
        Ok(Vault {
            config,
            router,
            publisher,
        })
    }

    pub fn config(&self) -> &VaultConfig {
        &self.config
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Create the schema on every shard
    pub fn migrate(&self) -> Result<()> {
        self.router.migrate()
    }

    /// Request/action pipeline publishing to the configured queue
    pub fn pipeline(&self) -> ActionPipeline<'_> {
        ActionPipeline::new(&self.router, self.publisher.as_ref(), &self.config.actions.queue)
    }

    /// Random shard on the data group for a new entity
    fn placement(&self) -> Result<Placement> {
        let group = self.config.data_group;
        Ok(Placement::new(group, self.router.pick_shard(group)?))
    }

    fn authorize(&self, actor: &Actor, request: AccessRequest) -> Result<Grant> {
        access::check(&self.router, actor.user, &request)
    }

    /// System membership with `role` on the system organization
    fn authorize_system(&self, actor: &Actor, role: u32) -> Result<Grant> {
        self.authorize(actor, AccessRequest::to(SYSTEM_ORG).roles(&[role]).admin())
    }

    /// Registry entry of the caller, refused when missing or blocked
    fn account(&self, actor: &Actor) -> Result<UserEntry> {
        if actor.is_anonymous() {
            return Err(VaultError::NotAuthenticated);
        }
        let registry = self.router.registry()?;
        let entry = user_registry::find(&registry, &Ref::Id(actor.user))?
            .ok_or(VaultError::NotAuthenticated)?;
        if state::has_any(entry.state, STATE_DENY_ACCESS) {
            warn!(user = %entry.username, "blocked user refused");
            return Err(access::refuse_user(format!("user {}", entry.username), entry.state));
        }
        Ok(entry)
    }

    fn find_user(&self, user: &Ref) -> Result<UserEntry> {
        let registry = self.router.registry()?;
        user_registry::find(&registry, user)?
            .ok_or_else(|| VaultError::not_found(EntityKind::User, user))
    }

    fn find_org(&self, org: &Ref) -> Result<org_registry::OrgEntry> {
        let registry = self.router.registry()?;
        org_registry::find(&registry, org)?
            .ok_or_else(|| VaultError::not_found(EntityKind::Organization, org))
    }

    /// Store and publish an action that belongs to no request.
    ///
    /// A [`VaultError::Publish`] leaves the action registered for a worker to
    /// republish; the guid is in the warning log.
    fn emit(&self, placement: Placement, action: &mut Action) -> Result<()> {
        self.pipeline().emit(placement, action)
    }
}

/// Role category of memberships in `object`
fn category_of(object: u64) -> Result<u32> {
    match id::type_of(object) {
        TYPE_ORG if object == SYSTEM_ORG => Ok(CATEGORY_SYSTEM),
        TYPE_ORG => Ok(CATEGORY_ORG),
        TYPE_STORE => Ok(CATEGORY_STORE),
        other => Err(VaultError::InvalidParameter(format!(
            "type {:#x} cannot carry memberships",
            other
        ))),
    }
}

/// Refuse roles outside `object`'s category
fn check_roles(object: u64, roles: &[u32]) -> Result<()> {
    let category = category_of(object)?;
    for r in roles {
        if !roles::role_is_valid(*r) || roles::role_category(*r) != category {
            return Err(VaultError::InvalidParameter(format!(
                "role {:#010x} is not valid for {}",
                r,
                id::format_id(object)
            )));
        }
    }
    Ok(())
}

/// Password hash, if it opens the user's validation blob
fn verify_password(entry: &UserEntry, password: &str) -> Result<Key> {
    let hash = crypto::password_hash(password);
    crypto::open(&hash, &entry.ciphertext).map_err(|_| VaultError::WrongPassword)?;
    Ok(hash)
}

/// Fresh validation blob for a password hash
fn validation_blob(hash: &Key) -> Result<Vec<u8>> {
    crypto::seal(hash, &crypto::random_key())
}

fn check_password(password: &str) -> Result<()> {
    if password.is_empty() {
        return Err(VaultError::InvalidParameter("password cannot be empty".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::roles::{role, FUNCTION_READ, SUBCATEGORY_OBJECT};

    #[test]
    fn test_category_of() {
        assert_eq!(category_of(SYSTEM_ORG).unwrap(), CATEGORY_SYSTEM);
        assert_eq!(category_of(id::make_id(1, TYPE_ORG, 3, 9)).unwrap(), CATEGORY_ORG);
        assert_eq!(category_of(id::make_id(1, TYPE_STORE, 3, 9)).unwrap(), CATEGORY_STORE);
        assert!(category_of(id::make_id(1, id::TYPE_USER, 3, 9)).is_err());
    }

    #[test]
    fn test_check_roles_category() {
        let store = id::make_id(1, TYPE_STORE, 3, 9);
        assert!(check_roles(store, &[role(CATEGORY_STORE | SUBCATEGORY_OBJECT, FUNCTION_READ)]).is_ok());
        assert!(check_roles(store, &[role(CATEGORY_ORG | SUBCATEGORY_OBJECT, FUNCTION_READ)]).is_err());
        assert!(check_roles(store, &[role(CATEGORY_STORE | SUBCATEGORY_OBJECT, 0)]).is_err());
    }

    #[test]
    fn test_password_blob() {
        let hash = crypto::password_hash("secret");
        let entry = UserEntry {
            id: 1,
            username: "alice".into(),
            email: "alice@example.com".into(),
            name: String::new(),
            state: 0,
            ciphertext: validation_blob(&hash).unwrap(),
        };
        assert_eq!(verify_password(&entry, "secret").unwrap(), hash);
        assert!(matches!(verify_password(&entry, "wrong"), Err(VaultError::WrongPassword)));
    }
}
