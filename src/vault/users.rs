//! Accounts: bootstrap, profile, passwords and blocking

use super::{check_password, validation_blob, verify_password, Actor, Vault};
use crate::core::access::AccessRequest;
use crate::core::crypto;
use crate::core::id::{self, Ref, SYSTEM_ADMIN, SYSTEM_ORG};
use crate::core::orm::{Entity, Organization, Placement, User};
use crate::core::registry::{orgs as org_registry, user_objects, users as user_registry, Membership, UserObjectEntry};
use crate::core::roles::{
    admin_roles, role, RoleSet, CATEGORY_SYSTEM, FUNCTION_CREATE, FUNCTION_DELETE, FUNCTION_UPDATE,
    SUBCATEGORY_USER,
};
use crate::core::state::{self, STATE_BLOCKED, STATE_DELETE, STATE_NONE, STATE_SYSTEM};
use crate::core::validation;
use crate::error::{EntityKind, Result, VaultError};
use tracing::{info, warn};

/// Alias of the system organization
pub const SYSTEM_ORG_ALIAS: &str = "system";

/// Profile changes; `None` leaves a field alone
#[derive(Debug, Clone, Default)]
pub struct UserUpdate {
    pub username: Option<String>,
    pub email: Option<String>,
    pub name: Option<String>,
}

impl Vault {
    /// Create the system administrator and the system organization.
    ///
    /// Both live on the registry shard with their well-known ids. Fails with
    /// [`VaultError::Conflict`] once done.
    pub fn bootstrap(&self, email: &str, username: &str, password: &str) -> Result<User> {
        let email = validation::normalize_email(email)?;
        let username = validation::normalize_alias(username)?;
        check_password(password)?;

        let registry = self.router.registry()?;
        if user_registry::find(&registry, &Ref::Id(SYSTEM_ADMIN))?.is_some() {
            return Err(VaultError::Conflict("vault is already bootstrapped".to_string()));
        }

        let hash = crypto::password_hash(password);
        let mut admin = User::new(Placement::of(SYSTEM_ADMIN));
        admin.set_id(SYSTEM_ADMIN)?;
        admin.set_username(&username);
        admin.set_email(&email);
        admin.set_name("System Administrator");
        admin.set_ciphertext(validation_blob(&hash)?);
        admin.set_creator(SYSTEM_ADMIN)?;
        admin.flush(&registry, false)?;
        user_registry::insert(&registry, &admin, STATE_NONE)?;
        admin.registry_updated();

        let mut org = Organization::new(Placement::of(SYSTEM_ORG));
        org.set_id(SYSTEM_ORG)?;
        org.set_alias(SYSTEM_ORG_ALIAS);
        org.set_name("System");
        org.set_creator(SYSTEM_ADMIN)?;
        org.flush(&registry, false)?;
        org_registry::insert(&registry, &org, STATE_SYSTEM)?;
        org.registry_updated();

        let mut membership = Membership::new(SYSTEM_ORG, SYSTEM_ADMIN);
        membership.set_alias(&username);
        membership.set_state(STATE_SYSTEM);
        membership.set_roles(RoleSet::from_roles(&admin_roles(CATEGORY_SYSTEM)));
        membership.flush(&registry, false)?;
        user_objects::upsert(&registry, SYSTEM_ADMIN, SYSTEM_ORG, SYSTEM_ORG_ALIAS)?;

        info!(username = %username, "vault bootstrapped");
        Ok(admin)
    }

    /// Canonical row of `user`
    pub(super) fn load_user(&self, user: u64) -> Result<User> {
        let mut account = User::default();
        if !account.by_id(&*self.router.connect(user)?, user)? {
            warn!(user = %id::format_id(user), "registry names a user with no canonical row");
            return Err(VaultError::not_found(EntityKind::User, id::format_id(user)));
        }
        Ok(account)
    }

    /// Create an account on a random data shard
    pub fn create_user(
        &self,
        actor: &Actor,
        email: &str,
        username: &str,
        name: &str,
        password: &str,
    ) -> Result<User> {
        self.authorize_system(actor, role(CATEGORY_SYSTEM | SUBCATEGORY_USER, FUNCTION_CREATE))?;
        let email = validation::normalize_email(email)?;
        let username = validation::normalize_alias(username)?;
        if !name.is_empty() {
            validation::validate_name("name", name)?;
        }
        check_password(password)?;

        let registry = self.router.registry()?;
        if user_registry::username_taken(&registry, &username)? {
            return Err(VaultError::Conflict(format!("username '{}' already taken", username)));
        }
        if user_registry::email_taken(&registry, &email)? {
            return Err(VaultError::Conflict(format!("email '{}' already taken", email)));
        }

        let placement = self.placement()?;
        let mut user = User::new(placement);
        user.set_username(&username);
        user.set_email(&email);
        user.set_name(name);
        user.set_ciphertext(validation_blob(&crypto::password_hash(password))?);
        user.set_creator(actor.user)?;
        user.flush(&*self.router.connect_to(placement.group, placement.shard)?, false)?;
        user_registry::insert(&registry, &user, STATE_NONE)?;
        user.registry_updated();

        info!(user = %id::format_id(user.id()), username = %username, "user created");
        Ok(user)
    }

    /// Look a user up by id, username or email
    pub fn user(&self, actor: &Actor, user: &Ref) -> Result<User> {
        self.account(actor)?;
        let entry = self.find_user(user)?;
        self.load_user(entry.id)
    }

    /// Change profile fields of `user`; others than the caller need system rights
    pub fn update_user(&self, actor: &Actor, user: &Ref, update: UserUpdate) -> Result<User> {
        let entry = self.find_user(user)?;
        if entry.id == actor.user {
            self.account(actor)?;
        } else {
            self.authorize_system(actor, role(CATEGORY_SYSTEM | SUBCATEGORY_USER, FUNCTION_UPDATE))?;
        }
        let mut account = self.load_user(entry.id)?;
        let registry = self.router.registry()?;

        if let Some(username) = update.username {
            let username = validation::normalize_alias(&username)?;
            if username != account.username() && user_registry::username_taken(&registry, &username)? {
                return Err(VaultError::Conflict(format!("username '{}' already taken", username)));
            }
            account.set_username(&username);
        }
        if let Some(email) = update.email {
            let email = validation::normalize_email(&email)?;
            if email != account.email() && user_registry::email_taken(&registry, &email)? {
                return Err(VaultError::Conflict(format!("email '{}' already taken", email)));
            }
            account.set_email(&email);
        }
        if let Some(name) = update.name {
            validation::validate_name("name", &name)?;
            account.set_name(&name);
        }

        account.flush(&*self.router.connect(entry.id)?, false)?;
        if account.needs_registry_update() {
            user_registry::update(&registry, &account)?;
            account.registry_updated();
        }
        Ok(account)
    }

    /// Whether `password` opens the validation blob of `user`
    pub fn test_password(&self, user: &Ref, password: &str) -> Result<bool> {
        let entry = self.find_user(user)?;
        Ok(verify_password(&entry, password).is_ok())
    }

    /// Change the caller's password.
    ///
    /// The validation blob and every wrapped store key are re-sealed under the
    /// new hash. Every key is opened before anything is written, so a key that
    /// fails to open leaves the account untouched.
    pub fn change_password(&self, actor: &Actor, old: &str, new: &str) -> Result<()> {
        check_password(new)?;
        let entry = self.account(actor)?;
        let old_hash = verify_password(&entry, old)?;
        let new_hash = crypto::password_hash(new);
        let secret = crypto::open(&old_hash, &entry.ciphertext)?;

        let links = user_objects::list(&*self.router.connect(actor.user)?, actor.user, None)?;
        let mut rewrapped = Vec::new();
        for link in links {
            let mut membership = Membership::default();
            if !membership.load(&*self.router.connect(link.object)?, link.object, actor.user)? {
                warn!(object = %id::format_id(link.object), "user object without membership");
                continue;
            }
            if let Some(wrapped) = membership.store_key() {
                let key = crypto::open_key(&old_hash, wrapped)?;
                membership.set_store_key(Some(crypto::seal(&new_hash, &key)?));
                rewrapped.push(membership);
            }
        }

        let mut account = self.load_user(actor.user)?;
        account.set_ciphertext(crypto::seal(&new_hash, &secret)?);
        account.flush(&*self.router.connect(actor.user)?, false)?;
        user_registry::update(&*self.router.registry()?, &account)?;
        account.registry_updated();

        for membership in &mut rewrapped {
            membership.flush(&*self.router.connect(membership.object())?, false)?;
        }
        info!(user = %entry.username, keys = rewrapped.len(), "password changed");
        Ok(())
    }

    /// Soft-delete an account: the registry marks it deleted and blocked
    pub fn delete_user(&self, actor: &Actor, user: &Ref) -> Result<()> {
        let entry = self.find_user(user)?;
        if entry.id == SYSTEM_ADMIN {
            return Err(VaultError::InvalidParameter("the system administrator cannot be deleted".to_string()));
        }
        self.authorize(
            actor,
            AccessRequest::to(SYSTEM_ORG)
                .roles(&[role(CATEGORY_SYSTEM | SUBCATEGORY_USER, FUNCTION_DELETE)])
                .not_self(entry.id)
                .admin(),
        )?;
        let marked = state::set(entry.state, STATE_DELETE | STATE_BLOCKED);
        user_registry::set_state(&*self.router.registry()?, entry.id, marked)?;
        info!(user = %entry.username, "user deleted");
        Ok(())
    }

    /// Block or unblock an account; returns the new state
    pub fn set_user_blocked(&self, actor: &Actor, user: &Ref, blocked: bool) -> Result<u16> {
        let entry = self.find_user(user)?;
        self.authorize(
            actor,
            AccessRequest::to(SYSTEM_ORG)
                .roles(&[role(CATEGORY_SYSTEM | SUBCATEGORY_USER, FUNCTION_UPDATE)])
                .not_self(entry.id)
                .admin(),
        )?;
        let next = if blocked {
            state::set(entry.state, STATE_BLOCKED)
        } else {
            state::clear(entry.state, STATE_BLOCKED)
        };
        user_registry::set_state(&*self.router.registry()?, entry.id, next)?;
        info!(user = %entry.username, blocked, "user block state changed");
        Ok(next)
    }

    /// Organizations and stores the caller belongs to, favorites first
    pub fn user_objects(&self, actor: &Actor, object_type: Option<u8>) -> Result<Vec<UserObjectEntry>> {
        self.account(actor)?;
        user_objects::list(&*self.router.connect(actor.user)?, actor.user, object_type)
    }
}
