//! Invitations
//!
//! A store invitation carries the store key sealed under the SHA-256 of a
//! random pick. The pick only travels in the `email:invitation` action, so
//! whoever accepts must have received the email.

use super::{category_of, check_roles, verify_password, Actor, Vault};
use crate::core::access::AccessRequest;
use crate::core::crypto::{self, ALPHANUMERIC};
use crate::core::id::{self, Ref, TYPE_STORE};
use crate::core::orm::invites::make_uid;
use crate::core::orm::{Action, Cipher, Entity, Invitation, Placement};
use crate::core::params::Params;
use crate::core::registry::{invites, users as user_registry, Membership};
use crate::core::roles::{
    role, RoleSet, FUNCTION_CREATE, FUNCTION_DELETE, FUNCTION_READ, FUNCTION_READ_LIST, SUBCATEGORY_INVITE,
    SUBCATEGORY_USER,
};
use crate::core::router::{REGISTRY_GROUP, REGISTRY_SHARD};
use crate::core::session::SessionStore;
use crate::core::state::{STATE_ACCEPTED, STATE_DECLINED, STATE_NONE};
use crate::core::validation;
use crate::error::{EntityKind, Result, VaultError};
use chrono::{Duration, SecondsFormat, Utc};
use rusqlite::Connection;
use tracing::info;

/// Action carrying an invitation email
pub const ACTION_INVITATION: &str = "email:invitation";

/// Days an invitation stays valid
pub const INVITATION_TTL_DAYS: i64 = 7;

const PICK_LENGTH: usize = 12;
const MAX_MESSAGE_LENGTH: usize = 1024;

/// An issued invitation and the action announcing it
#[derive(Debug, Clone)]
pub struct Invited {
    pub invitation: Invitation,
    pub action: Action,
}

fn load_invitation(conn: &Connection, entry: &invites::InviteEntry) -> Result<Invitation> {
    let mut invitation = Invitation::default();
    if !invitation.by_id(conn, entry.id)? {
        return Err(VaultError::not_found(EntityKind::Invitation, &entry.uid));
    }
    Ok(invitation)
}

impl Vault {
    /// Invite `email` to `object` with `roles`.
    ///
    /// Store invitations hand over the store key, so the caller needs an open
    /// store session; `session` is unused for organizations.
    pub fn invite(
        &self,
        actor: &Actor,
        session: &dyn SessionStore,
        object: u64,
        email: &str,
        roles: &[u32],
        message: &str,
    ) -> Result<Invited> {
        let category = category_of(object)?;
        check_roles(object, roles)?;
        self.authorize(
            actor,
            AccessRequest::to(object).roles(&[
                role(category | SUBCATEGORY_INVITE, FUNCTION_READ | FUNCTION_CREATE | FUNCTION_DELETE),
                role(category | SUBCATEGORY_USER, FUNCTION_READ_LIST),
            ]),
        )?;
        let inviter = self.account(actor)?;
        let email = validation::normalize_email(email)?;
        if message.chars().count() > MAX_MESSAGE_LENGTH {
            return Err(VaultError::InvalidParameter(format!(
                "message too long (max {} characters)",
                MAX_MESSAGE_LENGTH
            )));
        }

        let conn = self.router.connect(object)?;
        if let Some(existing) = user_registry::find(&*self.router.registry()?, &Ref::Email(email.clone()))? {
            let mut membership = Membership::default();
            if membership.load(&conn, object, existing.id)? {
                return Err(VaultError::Conflict(format!(
                    "{} is already a member of {}",
                    email,
                    id::format_id(object)
                )));
            }
        }

        let now = Utc::now();
        let expiration = now + Duration::days(INVITATION_TTL_DAYS);
        let mut pick = String::new();
        let mut key = 0;
        if id::type_of(object) == TYPE_STORE {
            let opened = self.resume_token(session, object)?;
            pick = crypto::random_string(ALPHANUMERIC, PICK_LENGTH);
            let sealed = crypto::seal(&crypto::sha256(pick.as_bytes()), opened.key())?;
            let mut cipher = Cipher::new(Placement::of(object), sealed);
            cipher.set_expiration(expiration)?;
            cipher.set_creator(actor.user)?;
            cipher.flush(&conn, false)?;
            key = cipher.id();
        }

        let mut invitation = Invitation::new(object);
        invitation.set_uid(&make_uid(actor.user, object, &email, now))?;
        invitation.set_creator(actor.user)?;
        invitation.set_invitee(&email)?;
        invitation.set_message(message)?;
        invitation.set_key(key)?;
        invitation.set_expiration(expiration)?;
        invitation.set_roles(RoleSet::from_roles(roles))?;
        invitation.flush(&conn, false)?;
        invites::insert(&*self.router.registry()?, &invitation)?;

        let mut params = Params::new();
        params.set_path("uid", invitation.uid());
        if !pick.is_empty() {
            params.set_path("pick", pick);
        }
        params.set_path("object", id::format_id(object));
        params.set_path("alias", self.object_alias(object)?);
        params.set_path("inviter", inviter.username.as_str());
        params.set_path("message", message);
        let mut props = Params::new();
        props.set_path("to", email.as_str());
        props.set_path("template", "invitation");
        props.set_path("expiration", expiration.to_rfc3339_opts(SecondsFormat::Secs, true));

        let mut action = Action::new("", ACTION_INVITATION);
        action.set_creator(actor.user)?;
        action.set_parameters(params);
        action.set_properties(props);
        self.emit(Placement::new(REGISTRY_GROUP, REGISTRY_SHARD), &mut action)?;

        info!(uid = invitation.uid(), object = %id::format_id(object), "invitation sent");
        Ok(Invited { invitation, action })
    }

    /// Accept an invitation addressed to the caller.
    ///
    /// A store key is re-sealed under the caller's password hash; a pick that
    /// does not open it counts as a wrong password.
    pub fn accept_invitation(&self, actor: &Actor, uid: &str, pick: &str, password: &str) -> Result<Membership> {
        let account = self.account(actor)?;
        let hash = verify_password(&account, password)?;
        let registry = self.router.registry()?;
        let entry = invites::get(&registry, uid)?.ok_or_else(|| VaultError::not_found(EntityKind::Invitation, uid))?;
        if entry.invitee != account.email {
            return Err(VaultError::AccessDenied("invitation is addressed to someone else".to_string()));
        }
        if entry.state != STATE_NONE {
            return Err(VaultError::Conflict(format!("invitation {} was already answered", uid)));
        }
        if entry.expiration <= Utc::now() {
            return Err(VaultError::InvitationExpired);
        }

        let conn = self.router.connect(entry.object)?;
        let invitation = load_invitation(&conn, &entry)?;
        let mut existing = Membership::default();
        if existing.load(&conn, entry.object, actor.user)? {
            return Err(VaultError::Conflict(format!(
                "{} is already a member of {}",
                account.username,
                id::format_id(entry.object)
            )));
        }

        let mut membership = Membership::new(entry.object, actor.user);
        membership.set_alias(&account.username);
        membership.set_roles(invitation.roles().clone());
        let mut cipher = Cipher::default();
        if invitation.key() != 0 {
            if !cipher.by_id(&conn, invitation.key())? {
                return Err(VaultError::not_found(EntityKind::Key, id::format_id(invitation.key())));
            }
            let key = crypto::open_key(&crypto::sha256(pick.as_bytes()), cipher.ciphertext())
                .map_err(|_| VaultError::WrongPassword)?;
            membership.set_store_key(Some(crypto::seal(&hash, &key)?));
        }

        let alias = self.object_alias(entry.object)?;
        let membership = self.join(membership, &alias)?;
        invites::set_state(&registry, uid, STATE_ACCEPTED)?;
        if invitation.key() != 0 {
            cipher.delete(&conn)?;
        }
        info!(uid, user = %account.username, "invitation accepted");
        Ok(membership)
    }

    /// Decline an invitation addressed to the caller
    pub fn decline_invitation(&self, actor: &Actor, uid: &str) -> Result<()> {
        let account = self.account(actor)?;
        let registry = self.router.registry()?;
        let entry = invites::get(&registry, uid)?.ok_or_else(|| VaultError::not_found(EntityKind::Invitation, uid))?;
        if entry.invitee != account.email {
            return Err(VaultError::AccessDenied("invitation is addressed to someone else".to_string()));
        }
        if entry.state != STATE_NONE {
            return Err(VaultError::Conflict(format!("invitation {} was already answered", uid)));
        }
        invites::set_state(&registry, uid, STATE_DECLINED)?;

        let conn = self.router.connect(entry.object)?;
        let invitation = load_invitation(&conn, &entry)?;
        if invitation.key() != 0 {
            let mut cipher = Cipher::default();
            if cipher.by_id(&conn, invitation.key())? {
                cipher.delete(&conn)?;
            }
        }
        info!(uid, user = %account.username, "invitation declined");
        Ok(())
    }
}
