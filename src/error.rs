//! Error types for vault operations
//!
//! Every layer returns a [`VaultError`] verbatim; the request harness converts it to a
//! numeric status code at the outermost boundary via [`VaultError::code`].

use crate::core::codes::{self, Code};
use thiserror::Error;

/// Vault operation result type
pub type Result<T> = std::result::Result<T, VaultError>;

/// Entity named by a [`VaultError::NotFound`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    User,
    Organization,
    Store,
    Object,
    Template,
    Invitation,
    Request,
    Action,
    Key,
    Membership,
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            EntityKind::User => "user",
            EntityKind::Organization => "organization",
            EntityKind::Store => "store",
            EntityKind::Object => "object",
            EntityKind::Template => "template",
            EntityKind::Invitation => "invitation",
            EntityKind::Request => "request",
            EntityKind::Action => "action",
            EntityKind::Key => "key",
            EntityKind::Membership => "membership",
        };
        f.write_str(name)
    }
}

/// Error taxonomy, independent of numeric codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Authorization,
    NotFound,
    Immutable,
    Conflict,
    Crypto,
    Storage,
    Publish,
}

/// Vault operation errors
#[derive(Error, Debug)]
pub enum VaultError {
    /// Input failed a format, length or type check
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Store session token could not be imported
    #[error("Invalid store session: {0}")]
    InvalidSession(String),

    /// Store session token is past its expiry
    #[error("Store session expired")]
    SessionExpired,

    /// No authenticated user on the request
    #[error("Not authenticated")]
    NotAuthenticated,

    /// Membership missing, blocked or lacking a required role
    #[error("Access denied: {0}")]
    AccessDenied(String),

    /// Caller's account or membership carries the blocked state
    #[error("User blocked: {0}")]
    UserBlocked(String),

    /// Target organization or store carries the blocked state
    #[error("Object blocked: {0}")]
    ObjectBlocked(String),

    /// Operation may not target the calling user
    #[error("Operation not allowed on self")]
    SelfNotAllowed,

    /// Operation would leave the object without a role manager
    #[error("Cannot remove the last role manager of object {0:#x}")]
    LastManager(u64),

    /// No row matched the key
    #[error("{entity} not found: {key}")]
    NotFound { entity: EntityKind, key: String },

    /// Key field of a stored entity, or any field of an immutable entity
    #[error("Immutable: {0}")]
    Immutable(String),

    /// Alias or email already in use
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invitation expired")]
    InvitationExpired,

    #[error("Request expired")]
    RequestExpired,

    /// Password hash did not open the validation blob
    #[error("Wrong password")]
    WrongPassword,

    /// AEAD integrity failure or bad key material
    #[error("Crypto error: {0}")]
    Crypto(String),

    #[error("Database error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Shard group does not exist: {0}")]
    ShardGroupMissing(u8),

    #[error("No shards for group {group} covering shard id {shard}")]
    NoShards { group: u8, shard: u16 },

    #[error("Timed out waiting for a connection to shard {group}/{shard}")]
    PoolTimeout { group: u8, shard: u16 },

    /// Broker unreachable or rejected the message
    #[error("Publish failed: {0}")]
    Publish(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl VaultError {
    /// Shorthand for a [`VaultError::NotFound`]
    pub fn not_found(entity: EntityKind, key: impl std::fmt::Display) -> Self {
        VaultError::NotFound {
            entity,
            key: key.to_string(),
        }
    }

    /// Taxonomy bucket of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            VaultError::InvalidParameter(_)
            | VaultError::InvalidSession(_)
            | VaultError::SessionExpired
            | VaultError::InvitationExpired
            | VaultError::RequestExpired => ErrorKind::Validation,
            VaultError::NotAuthenticated
            | VaultError::AccessDenied(_)
            | VaultError::UserBlocked(_)
            | VaultError::ObjectBlocked(_)
            | VaultError::SelfNotAllowed
            | VaultError::LastManager(_) => ErrorKind::Authorization,
            VaultError::NotFound { .. } => ErrorKind::NotFound,
            VaultError::Immutable(_) => ErrorKind::Immutable,
            VaultError::Conflict(_) => ErrorKind::Conflict,
            VaultError::WrongPassword | VaultError::Crypto(_) => ErrorKind::Crypto,
            VaultError::Publish(_) => ErrorKind::Publish,
            VaultError::Storage(_)
            | VaultError::ShardGroupMissing(_)
            | VaultError::NoShards { .. }
            | VaultError::PoolTimeout { .. }
            | VaultError::Config(_)
            | VaultError::Serialization(_) => ErrorKind::Storage,
        }
    }

    /// Numeric status code reported to clients
    pub fn code(&self) -> Code {
        match self {
            VaultError::InvalidParameter(_) => codes::INVALID_PARAMETER,
            VaultError::InvalidSession(_) => codes::INVALID_STORE_SESSION,
            VaultError::SessionExpired => codes::STORE_SESSION_EXPIRED,
            VaultError::NotAuthenticated => codes::NOT_AUTHENTICATED,
            VaultError::AccessDenied(_) => codes::ACCESS_DENIED,
            VaultError::UserBlocked(_) => codes::USER_BLOCKED,
            VaultError::ObjectBlocked(_) => codes::OBJECT_BLOCKED,
            VaultError::SelfNotAllowed => codes::SELF_NOT_ALLOWED,
            VaultError::LastManager(_) => codes::LAST_MANAGER,
            VaultError::NotFound { entity, .. } => match entity {
                EntityKind::User => codes::USER_NOT_FOUND,
                EntityKind::Organization => codes::ORG_NOT_FOUND,
                EntityKind::Store => codes::STORE_NOT_FOUND,
                EntityKind::Object => codes::OBJECT_NOT_FOUND,
                EntityKind::Template => codes::TEMPLATE_NOT_FOUND,
                EntityKind::Invitation => codes::INVITATION_NOT_FOUND,
                EntityKind::Request => codes::REQUEST_NOT_FOUND,
                EntityKind::Action => codes::ACTION_NOT_FOUND,
                EntityKind::Key => codes::KEY_NOT_FOUND,
                EntityKind::Membership => codes::NOT_A_MEMBER,
            },
            VaultError::Immutable(_) => codes::IMMUTABLE,
            VaultError::Conflict(_) => codes::CONFLICT,
            VaultError::InvitationExpired => codes::INVITATION_EXPIRED,
            VaultError::RequestExpired => codes::REQUEST_EXPIRED,
            VaultError::WrongPassword => codes::WRONG_PASSWORD,
            VaultError::Crypto(_) => codes::CRYPTO_FAILURE,
            VaultError::Storage(_) => codes::DATABASE_ERROR,
            VaultError::ShardGroupMissing(_) | VaultError::NoShards { .. } => codes::SHARD_ERROR,
            VaultError::PoolTimeout { .. } => codes::DATABASE_ERROR,
            VaultError::Publish(_) => codes::QUEUE_ERROR,
            VaultError::Config(_) => codes::CONFIG_ERROR,
            VaultError::Serialization(_) => codes::SERVER_ERROR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_codes_are_per_entity() {
        let user = VaultError::not_found(EntityKind::User, "alice");
        let org = VaultError::not_found(EntityKind::Organization, "acme");
        assert_ne!(user.code(), org.code());
        assert_eq!(user.kind(), ErrorKind::NotFound);
        assert!(user.code().is_object_error());
    }

    #[test]
    fn test_wrong_password_is_not_a_server_error() {
        let err = VaultError::WrongPassword;
        assert_eq!(err.kind(), ErrorKind::Crypto);
        assert!(err.code().is_object_error());
        assert!(VaultError::Crypto("tag mismatch".into()).code().is_server_error());
    }

    #[test]
    fn test_blocked_errors_have_their_own_codes() {
        let user = VaultError::UserBlocked("alice".into());
        let object = VaultError::ObjectBlocked("acme".into());
        assert_eq!(user.code(), codes::USER_BLOCKED);
        assert_eq!(object.code(), codes::OBJECT_BLOCKED);
        assert_eq!(user.kind(), ErrorKind::Authorization);
        assert_eq!(object.code().http_status(), 403);
        assert_ne!(user.code(), VaultError::AccessDenied("x".into()).code());
    }

    #[test]
    fn test_publish_error_is_server_side() {
        let err = VaultError::Publish("broker down".into());
        assert_eq!(err.kind(), ErrorKind::Publish);
        assert_eq!(err.code().http_status(), 500);
    }
}
