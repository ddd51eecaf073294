//! Memberships of organizations and stores
//!
//! Both sides are written: `registry_object_users` on the object's shard and
//! `registry_user_objects` on the member's shard. Role and state changes that
//! would leave an object without a role manager are refused.

use super::{category_of, check_roles, Actor, Vault};
use crate::core::access::{self, AccessRequest};
use crate::core::id::{self, Ref, TYPE_STORE};
use crate::core::registry::{members, user_objects, Membership};
use crate::core::roles::{
    role, RoleSet, CATEGORY_SYSTEM, FUNCTION_CREATE, FUNCTION_DELETE, FUNCTION_READ_LIST,
    FUNCTION_UPDATE, SUBCATEGORY_ROLES, SUBCATEGORY_USER,
};
use crate::core::state::{self, STATE_DENY_ACCESS, STATE_SYSTEM};
use crate::error::{EntityKind, Result, VaultError};
use rusqlite::Connection;
use tracing::info;

fn load_membership(conn: &Connection, object: u64, user: u64) -> Result<Membership> {
    let mut membership = Membership::default();
    if !membership.load(conn, object, user)? {
        return Err(VaultError::not_found(
            EntityKind::Membership,
            format!("{} in {}", id::format_id(user), id::format_id(object)),
        ));
    }
    Ok(membership)
}

impl Vault {
    /// Alias shown for `object` in a member's object list
    pub(super) fn object_alias(&self, object: u64) -> Result<String> {
        if id::type_of(object) == TYPE_STORE {
            return Ok(self.load_store(object)?.alias().to_string());
        }
        Ok(self.find_org(&Ref::Id(object))?.alias)
    }

    /// Record a membership on both registry sides
    pub(super) fn join(&self, mut membership: Membership, alias: &str) -> Result<Membership> {
        membership.flush(&*self.router.connect(membership.object())?, false)?;
        user_objects::upsert(
            &*self.router.connect(membership.user())?,
            membership.user(),
            membership.object(),
            alias,
        )?;
        info!(
            object = %id::format_id(membership.object()),
            user = %id::format_id(membership.user()),
            "member joined"
        );
        Ok(membership)
    }

    /// Add `user` to `object` with `roles`.
    ///
    /// A store member added this way holds no store key; keys are handed out
    /// through invitations.
    pub fn add_member(&self, actor: &Actor, object: u64, user: &Ref, roles: &[u32]) -> Result<Membership> {
        let category = category_of(object)?;
        check_roles(object, roles)?;
        self.authorize(
            actor,
            AccessRequest::to(object).roles(&[
                role(category | SUBCATEGORY_USER, FUNCTION_CREATE),
                role(category | SUBCATEGORY_ROLES, FUNCTION_UPDATE),
            ]),
        )?;
        let member = self.find_user(user)?;
        if state::has_any(member.state, STATE_DENY_ACCESS) {
            return Err(access::refuse_user(format!("user {}", member.username), member.state));
        }

        let mut existing = Membership::default();
        if existing.load(&*self.router.connect(object)?, object, member.id)? {
            return Err(VaultError::Conflict(format!(
                "{} is already a member of {}",
                member.username,
                id::format_id(object)
            )));
        }

        let mut membership = Membership::new(object, member.id);
        membership.set_alias(&member.username);
        membership.set_roles(RoleSet::from_roles(roles));
        let alias = self.object_alias(object)?;
        self.join(membership, &alias)
    }

    /// Replace the role set of a member
    pub fn set_member_roles(&self, actor: &Actor, object: u64, user: u64, roles: &[u32]) -> Result<Membership> {
        let category = category_of(object)?;
        check_roles(object, roles)?;
        self.authorize(
            actor,
            AccessRequest::to(object).roles(&[role(category | SUBCATEGORY_ROLES, FUNCTION_UPDATE)]),
        )?;
        let conn = self.router.connect(object)?;
        let mut membership = load_membership(&conn, object, user)?;
        let next = RoleSet::from_roles(roles);
        let remains = next.is_roles_manager() && !state::has_any(membership.state(), STATE_DENY_ACCESS);
        access::guard_last_manager(&conn, object, user, remains)?;

        membership.set_roles(next);
        membership.flush(&conn, false)?;
        Ok(membership)
    }

    /// Set and clear function state bits of another member; returns the new state
    pub fn set_member_state(
        &self,
        actor: &Actor,
        object: u64,
        user: u64,
        set_bits: u16,
        clear_bits: u16,
    ) -> Result<u16> {
        let category = category_of(object)?;
        self.authorize(
            actor,
            AccessRequest::to(object)
                .roles(&[role(category | SUBCATEGORY_USER, FUNCTION_UPDATE)])
                .not_self(user),
        )?;
        let conn = self.router.connect(object)?;
        let mut membership = load_membership(&conn, object, user)?;
        let next = state::apply_user_change(membership.state(), set_bits, clear_bits)?;
        let remains = membership.is_roles_manager() && !state::has_any(next, STATE_DENY_ACCESS);
        access::guard_last_manager(&conn, object, user, remains)?;

        membership.set_state(next);
        membership.flush(&conn, false)?;
        Ok(next)
    }

    /// Set or clear the system marker on a membership; system administrators only
    pub fn set_member_system(&self, actor: &Actor, object: u64, user: u64, system: bool) -> Result<u16> {
        self.authorize_system(actor, role(CATEGORY_SYSTEM | SUBCATEGORY_USER, FUNCTION_UPDATE))?;
        let conn = self.router.connect(object)?;
        let mut membership = load_membership(&conn, object, user)?;
        let next = if system {
            state::set(membership.state(), STATE_SYSTEM)
        } else {
            state::clear(membership.state(), STATE_SYSTEM)
        };
        membership.set_state(next);
        membership.flush(&conn, false)?;
        Ok(next)
    }

    /// Remove a member from both registry sides
    pub fn remove_member(&self, actor: &Actor, object: u64, user: u64) -> Result<()> {
        let category = category_of(object)?;
        self.authorize(
            actor,
            AccessRequest::to(object).roles(&[role(category | SUBCATEGORY_USER, FUNCTION_DELETE)]),
        )?;
        let conn = self.router.connect(object)?;
        let mut membership = load_membership(&conn, object, user)?;
        access::guard_last_manager(&conn, object, user, false)?;

        membership.delete(&conn)?;
        user_objects::remove(&*self.router.connect(user)?, user, object)?;
        info!(object = %id::format_id(object), user = %id::format_id(user), "member removed");
        Ok(())
    }

    pub fn members(&self, actor: &Actor, object: u64) -> Result<Vec<Membership>> {
        let category = category_of(object)?;
        self.authorize(
            actor,
            AccessRequest::to(object).roles(&[role(category | SUBCATEGORY_USER, FUNCTION_READ_LIST)]),
        )?;
        members::list(&*self.router.connect(object)?, object)
    }

    /// Pin or unpin one of the caller's objects
    pub fn set_favorite(&self, actor: &Actor, object: u64, favorite: bool) -> Result<()> {
        self.account(actor)?;
        if !user_objects::set_favorite(&*self.router.connect(actor.user)?, actor.user, object, favorite)? {
            return Err(VaultError::not_found(EntityKind::Membership, id::format_id(object)));
        }
        Ok(())
    }
}
