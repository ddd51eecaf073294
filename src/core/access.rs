//! Access evaluation
//!
//! A request names a target organization or store, the roles it needs and
//! whether the caller may act on themselves. Evaluation walks the registries
//! only: the caller's account state, the owning organization, the store's entry
//! in its organization, then the caller's membership.

use crate::core::id::{self, Ref, TYPE_ORG, TYPE_STORE};
use crate::core::orm::Store;
use crate::core::registry::{members, org_stores, orgs, users, Membership};
use crate::core::router::Router;
use crate::core::state::{self, STATE_BLOCKED, STATE_DELETE, STATE_DENY_ACCESS, STATE_SYSTEM};
use crate::error::{EntityKind, Result, VaultError};
use rusqlite::Connection;
use tracing::debug;

/// What a caller wants to do to a target
#[derive(Debug, Clone, Default)]
pub struct AccessRequest {
    target: u64,
    roles: Vec<u32>,
    subject: Option<u64>,
    admin_required: bool,
}

impl AccessRequest {
    pub fn to(target: u64) -> Self {
        AccessRequest {
            target,
            ..Default::default()
        }
    }

    pub fn roles(mut self, roles: &[u32]) -> Self {
        self.roles.extend_from_slice(roles);
        self
    }

    /// The operation acts on `subject`, which must not be the caller
    pub fn not_self(mut self, subject: u64) -> Self {
        self.subject = Some(subject);
        self
    }

    /// Caller's membership must carry the system marker
    pub fn admin(mut self) -> Self {
        self.admin_required = true;
        self
    }

    pub fn target(&self) -> u64 {
        self.target
    }
}

/// Successful evaluation
#[derive(Debug, Clone)]
pub struct Grant {
    pub org: u64,
    pub store: Option<u64>,
    pub membership: Membership,
}

impl Grant {
    pub fn target(&self) -> u64 {
        self.store.unwrap_or(self.org)
    }
}

fn deny(reason: impl Into<String>) -> VaultError {
    let reason = reason.into();
    debug!(%reason, "access denied");
    VaultError::AccessDenied(reason)
}

fn blocked_only(state: u16) -> bool {
    state::has_any(state, STATE_BLOCKED) && !state::has_any(state, STATE_DELETE)
}

/// Refusal for a user whose account or membership `state` denies access.
///
/// A block reports [`VaultError::UserBlocked`]; deleted or inactive users are denied.
pub fn refuse_user(subject: impl Into<String>, state: u16) -> VaultError {
    let subject = subject.into();
    if blocked_only(state) {
        debug!(%subject, "user blocked");
        VaultError::UserBlocked(subject)
    } else {
        deny(format!("{} is not active", subject))
    }
}

/// Refusal for an organization or store whose `state` denies access
fn refuse_object(subject: String, state: u16) -> VaultError {
    if blocked_only(state) {
        debug!(%subject, "object blocked");
        VaultError::ObjectBlocked(subject)
    } else {
        deny(format!("{} is not active", subject))
    }
}

/// Organization owning `target`, after checking the organization is usable
pub fn owning_org(router: &Router, registry: &Connection, target: u64) -> Result<(u64, Option<u64>)> {
    match id::type_of(target) {
        TYPE_ORG => {
            check_org(registry, target)?;
            Ok((target, None))
        }
        TYPE_STORE => {
            let mut store = Store::default();
            if !store.by_id(&*router.connect(target)?, target)? {
                return Err(VaultError::not_found(EntityKind::Store, id::format_id(target)));
            }
            check_org(registry, store.org())?;
            let entry = org_stores::get(&*router.connect(store.org())?, store.org(), target)?
                .ok_or_else(|| VaultError::not_found(EntityKind::Store, id::format_id(target)))?;
            if state::has_any(entry.state, STATE_DENY_ACCESS) {
                return Err(refuse_object(format!("store {}", id::format_id(target)), entry.state));
            }
            Ok((store.org(), Some(target)))
        }
        other => Err(VaultError::InvalidParameter(format!(
            "type {:#x} cannot carry memberships",
            other
        ))),
    }
}

fn check_org(registry: &Connection, org: u64) -> Result<()> {
    let entry = orgs::find(registry, &Ref::Id(org))?
        .ok_or_else(|| VaultError::not_found(EntityKind::Organization, id::format_id(org)))?;
    let mut denied = entry.state & STATE_DENY_ACCESS;
    if org == id::SYSTEM_ORG {
        denied &= !STATE_BLOCKED;
    }
    if denied != 0 {
        return Err(refuse_object(format!("organization {}", entry.alias), denied));
    }
    Ok(())
}

/// Evaluate `request` for `user`
pub fn check(router: &Router, user: u64, request: &AccessRequest) -> Result<Grant> {
    if user == 0 {
        return Err(VaultError::NotAuthenticated);
    }
    let registry = router.registry()?;
    let account = users::find(&registry, &Ref::Id(user))?.ok_or(VaultError::NotAuthenticated)?;
    if state::has_any(account.state, STATE_DENY_ACCESS) {
        return Err(refuse_user(format!("user {}", account.username), account.state));
    }
    let (org, store) = owning_org(router, &registry, request.target)?;

    let mut membership = Membership::default();
    if !membership.load(&*router.connect(request.target)?, request.target, user)? {
        return Err(VaultError::not_found(
            EntityKind::Membership,
            format!("{} in {}", account.username, id::format_id(request.target)),
        ));
    }
    if state::has_any(membership.state(), STATE_DENY_ACCESS) {
        return Err(refuse_user(
            format!("membership of {} in {}", account.username, id::format_id(request.target)),
            membership.state(),
        ));
    }
    if request.subject == Some(user) {
        return Err(VaultError::SelfNotAllowed);
    }
    for role in &request.roles {
        if !membership.roles().has_role(*role) {
            return Err(deny(format!("missing role {:#010x}", role)));
        }
    }
    if request.admin_required && !state::has_any(membership.state(), STATE_SYSTEM) {
        return Err(deny("system membership required"));
    }
    Ok(Grant {
        org,
        store,
        membership,
    })
}

/// Refuse to strip the last role manager of `object`.
///
/// `remains_manager` says whether `user` is still a manager after the change.
pub fn guard_last_manager(conn: &Connection, object: u64, user: u64, remains_manager: bool) -> Result<()> {
    if remains_manager {
        return Ok(());
    }
    let mut current = Membership::default();
    if !current.load(conn, object, user)? || !current.is_roles_manager() {
        return Ok(());
    }
    if members::count_managers(conn, object, Some(user))? == 0 {
        return Err(VaultError::LastManager(object));
    }
    Ok(())
}
