//! Registries
//!
//! Denormalized lookup tables that let a request find an entity, its state and
//! a user's relationship to it without touching the canonical rows. Global
//! registries (users, organizations, invitations, requests) sit on the registry
//! shard; the others sit on the shard of the entity named first in their key.
//! Registry state is the authority for access decisions.

pub mod invites;
pub mod members;
pub mod object_templates;
pub mod org_stores;
pub mod orgs;
pub mod requests;
pub mod user_objects;
pub mod users;

pub use invites::InviteEntry;
pub use members::Membership;
pub use object_templates::ObjectTemplateEntry;
pub use org_stores::OrgStoreEntry;
pub use orgs::OrgEntry;
pub use requests::RequestEntry;
pub use user_objects::UserObjectEntry;
pub use users::UserEntry;
