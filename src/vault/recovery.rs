//! Password recovery
//!
//! A reset request is keyed by its guid, which only reaches the user through
//! the `email:password:reset` action. Resetting cannot recover wrapped store
//! keys, so every membership loses its key and store access has to be granted
//! again through invitations.

use super::{check_password, validation_blob, Vault};
use crate::core::access;
use crate::core::actions::{RequestOutcome, RequestSpec};
use crate::core::crypto;
use crate::core::id::{self, Ref};
use crate::core::orm::Entity;
use crate::core::params::Params;
use crate::core::registry::{requests, user_objects, users as user_registry, Membership};
use crate::core::state::{self, STATE_CLOSED, STATE_DENY_ACCESS, STATE_NONE};
use crate::error::{EntityKind, Result, VaultError};
use chrono::{Duration, Utc};
use tracing::{info, warn};

/// Request type of a password reset
pub const REQUEST_PASSWORD_RESET: &str = "password:reset";

/// Action carrying the reset email
pub const ACTION_PASSWORD_RESET: &str = "email:password:reset";

const RESET_TTL_HOURS: i64 = 24;

impl Vault {
    /// Open a reset request for the account registered under `email`.
    ///
    /// An open request for the same account is reused instead of mailing a
    /// second link.
    pub fn recover_password(&self, email: &str) -> Result<RequestOutcome> {
        let entry = self.find_user(&Ref::Email(email.trim().to_lowercase()))?;
        if state::has_any(entry.state, STATE_DENY_ACCESS) {
            return Err(access::refuse_user(format!("user {}", entry.username), entry.state));
        }

        let mut params = Params::new();
        params.set_path("user", id::format_id(entry.id));
        params.set_path("username", entry.username.as_str());
        let mut props = Params::new();
        props.set_path("to", entry.email.as_str());
        props.set_path("template", "password-reset");

        let outcome = self.pipeline().submit(
            RequestSpec {
                request_type: REQUEST_PASSWORD_RESET.to_string(),
                action_type: ACTION_PASSWORD_RESET.to_string(),
                object: entry.id,
                creator: entry.id,
                ttl: Duration::hours(RESET_TTL_HOURS),
                params,
                props,
            },
            Utc::now(),
        )?;
        info!(user = %entry.username, reused = outcome.is_reused(), "password reset requested");
        Ok(outcome)
    }

    /// Set a new password through an open reset request and close it
    pub fn reset_password(&self, guid: &str, password: &str) -> Result<()> {
        check_password(password)?;
        let registry = self.router.registry()?;
        let request = requests::get(&registry, guid)?
            .filter(|r| r.request_type == REQUEST_PASSWORD_RESET)
            .ok_or_else(|| VaultError::not_found(EntityKind::Request, guid))?;
        if request.state != STATE_NONE {
            return Err(VaultError::RequestExpired);
        }
        if request.expiration.is_some_and(|at| at <= Utc::now()) {
            requests::set_state(&registry, guid, STATE_CLOSED)?;
            return Err(VaultError::RequestExpired);
        }

        let user = request.object;
        let mut account = self.load_user(user)?;
        account.set_ciphertext(validation_blob(&crypto::password_hash(password))?);
        account.flush(&*self.router.connect(user)?, false)?;
        user_registry::update(&registry, &account)?;
        account.registry_updated();

        let mut cleared = 0;
        for link in user_objects::list(&*self.router.connect(user)?, user, None)? {
            let conn = self.router.connect(link.object)?;
            let mut membership = Membership::default();
            if !membership.load(&conn, link.object, user)? {
                warn!(object = %id::format_id(link.object), "user object without membership");
                continue;
            }
            if membership.set_store_key(None).is_some() {
                membership.flush(&conn, false)?;
                cleared += 1;
            }
        }

        requests::set_state(&registry, guid, STATE_CLOSED)?;
        info!(user = %account.username(), cleared, "password reset");
        Ok(())
    }
}
