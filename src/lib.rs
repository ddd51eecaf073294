//! # Object Vault - Sharded, Envelope-Encrypted Object Store
//!
//! `object-vault` is the identity, access and object model of a multi-tenant
//! vault. Users belong to organizations, organizations own stores, stores hold
//! encrypted JSON objects and folders.
//!
//! - **Sharded storage**: every id carries its shard group and shard, so routing
//!   never needs a lookup
//! - **Registries**: denormalized lookup tables that answer "who is this" and
//!   "may they do that" without touching canonical rows
//! - **Envelope encryption**: each store key is wrapped once per member under a
//!   key derived from that member's password
//! - **Requests and actions**: out-of-band work (emails, cascading deletes) is
//!   persisted, then published to a broker queue
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use object_vault::{Actor, MemoryPublisher, MemorySession, ObjectType, Result, Vault, VaultConfig};
//! use std::sync::Arc;
//!
//! # fn main() -> Result<()> {
//! let config = VaultConfig::load("vault.toml")?;
//! let vault = Vault::new(config, Arc::new(MemoryPublisher::new()))?;
//! vault.migrate()?;
//!
//! let admin = vault.bootstrap("root@example.com", "root", "secret")?;
//! let admin = Actor::new(admin.id());
//!
//! let acme = vault.create_org(&admin, "acme", "Acme Corporation")?;
//! let store = vault.create_store(&admin, &acme.id().into(), "main", "Main store", "secret")?;
//!
//! // Store data needs an open store session
//! let session = MemorySession::new();
//! vault.open_store_session(&admin, &session, store.id(), "secret")?;
//! let doc = vault.create_object(&admin, &session, store.id(), 0, ObjectType::Json, "Login", b"{}")?;
//! let (_, body) = vault.object(&admin, &session, store.id(), doc.id())?;
//! assert_eq!(body, b"{}");
//! # Ok(())
//! # }
//! ```

pub mod core;
pub mod error;
mod vault;

pub use crate::core::{
    access::{AccessRequest, Grant},
    actions::{ActionMessage, ActionPipeline, MemoryPublisher, Publisher, RequestOutcome, RequestSpec},
    config::VaultConfig,
    id::{format_id, parse_id, Ref},
    orm::{ObjectType, Organization, Store, StoreObject, Template, User},
    params::Params,
    query::{Function, Page, Query, Sort, Value},
    registry::{Membership, ObjectTemplateEntry, OrgStoreEntry, UserEntry, UserObjectEntry},
    roles::RoleSet,
    session::{MemorySession, SessionStore, StoreSession},
};
pub use error::{EntityKind, ErrorKind, Result, VaultError};
pub use vault::{
    Actor, Invited, OrgUpdate, StoreUpdate, UserUpdate, Vault, ACTION_CASCADE_ORG,
    ACTION_CASCADE_STORE, ACTION_INVITATION, ACTION_PASSWORD_RESET, REQUEST_PASSWORD_RESET,
};
