//! Organizations

use super::{Actor, Vault};
use crate::core::access::AccessRequest;
use crate::core::id::{self, Ref, SYSTEM_ORG};
use crate::core::orm::{Action, Entity, Organization, Placement};
use crate::core::params::Params;
use crate::core::registry::{orgs as org_registry, user_objects, Membership};
use crate::core::roles::{
    admin_roles, role, RoleSet, CATEGORY_ORG, CATEGORY_SYSTEM, FUNCTION_CREATE, FUNCTION_DELETE,
    FUNCTION_READ, FUNCTION_UPDATE, SUBCATEGORY_ORG,
};
use crate::core::router::{REGISTRY_GROUP, REGISTRY_SHARD};
use crate::core::state::{self, STATE_BLOCKED, STATE_DELETE, STATE_NONE};
use crate::core::validation;
use crate::error::{EntityKind, Result, VaultError};
use tracing::{info, warn};

/// Action emitted after an organization is marked deleted
pub const ACTION_CASCADE_ORG: &str = "cascade:delete:org";

#[derive(Debug, Clone, Default)]
pub struct OrgUpdate {
    pub alias: Option<String>,
    pub name: Option<String>,
}

impl Vault {
    pub(super) fn load_org(&self, org: u64) -> Result<Organization> {
        let mut entity = Organization::default();
        if !entity.by_id(&*self.router.connect(org)?, org)? {
            warn!(org = %id::format_id(org), "registry names an organization with no canonical row");
            return Err(VaultError::not_found(EntityKind::Organization, id::format_id(org)));
        }
        Ok(entity)
    }

    /// Create an organization; the creator becomes its administrator
    pub fn create_org(&self, actor: &Actor, alias: &str, name: &str) -> Result<Organization> {
        self.authorize_system(actor, role(CATEGORY_SYSTEM | SUBCATEGORY_ORG, FUNCTION_CREATE))?;
        let creator = self.account(actor)?;
        let alias = validation::normalize_alias(alias)?;
        validation::validate_name("name", name)?;

        let registry = self.router.registry()?;
        if org_registry::find(&registry, &Ref::Alias(alias.clone()))?.is_some() {
            return Err(VaultError::Conflict(format!("organization alias '{}' already taken", alias)));
        }

        let placement = self.placement()?;
        let mut org = Organization::new(placement);
        org.set_alias(&alias);
        org.set_name(name);
        org.set_creator(actor.user)?;
        let conn = self.router.connect_to(placement.group, placement.shard)?;
        org.flush(&conn, false)?;
        org_registry::insert(&registry, &org, STATE_NONE)?;
        org.registry_updated();

        let mut membership = Membership::new(org.id(), actor.user);
        membership.set_alias(&creator.username);
        membership.set_roles(RoleSet::from_roles(&admin_roles(CATEGORY_ORG)));
        membership.flush(&conn, false)?;
        user_objects::upsert(&*self.router.connect(actor.user)?, actor.user, org.id(), &alias)?;

        info!(org = %id::format_id(org.id()), alias = %alias, "organization created");
        Ok(org)
    }

    pub fn org(&self, actor: &Actor, org: &Ref) -> Result<Organization> {
        let entry = self.find_org(org)?;
        self.authorize(
            actor,
            AccessRequest::to(entry.id).roles(&[role(CATEGORY_ORG | SUBCATEGORY_ORG, FUNCTION_READ)]),
        )?;
        self.load_org(entry.id)
    }

    pub fn update_org(&self, actor: &Actor, org: &Ref, update: OrgUpdate) -> Result<Organization> {
        let entry = self.find_org(org)?;
        self.authorize(
            actor,
            AccessRequest::to(entry.id).roles(&[role(CATEGORY_ORG | SUBCATEGORY_ORG, FUNCTION_UPDATE)]),
        )?;
        let mut entity = self.load_org(entry.id)?;
        let registry = self.router.registry()?;

        if let Some(alias) = update.alias {
            let alias = validation::normalize_alias(&alias)?;
            if alias != entity.alias() && org_registry::find(&registry, &Ref::Alias(alias.clone()))?.is_some() {
                return Err(VaultError::Conflict(format!("organization alias '{}' already taken", alias)));
            }
            entity.set_alias(&alias);
        }
        if let Some(name) = update.name {
            validation::validate_name("name", &name)?;
            entity.set_name(&name);
        }

        entity.flush(&*self.router.connect(entry.id)?, false)?;
        if entity.needs_registry_update() {
            org_registry::update(&registry, &entity)?;
            entity.registry_updated();
        }
        Ok(entity)
    }

    /// Mark an organization deleted and blocked, then hand the cleanup to a worker
    pub fn delete_org(&self, actor: &Actor, org: &Ref) -> Result<Action> {
        let entry = self.find_org(org)?;
        if entry.id == SYSTEM_ORG {
            return Err(VaultError::InvalidParameter("the system organization cannot be deleted".to_string()));
        }
        self.authorize(
            actor,
            AccessRequest::to(entry.id).roles(&[role(CATEGORY_ORG | SUBCATEGORY_ORG, FUNCTION_DELETE)]),
        )?;
        let marked = state::set(entry.state, STATE_DELETE | STATE_BLOCKED);
        org_registry::set_state(&*self.router.registry()?, entry.id, marked)?;

        let mut params = Params::new();
        params.set_path("org", id::format_id(entry.id));
        params.set_path("alias", entry.alias.as_str());
        let mut action = Action::new("", ACTION_CASCADE_ORG);
        action.set_creator(actor.user)?;
        action.set_parameters(params);
        self.emit(Placement::new(REGISTRY_GROUP, REGISTRY_SHARD), &mut action)?;

        info!(org = %entry.alias, guid = action.guid(), "organization deleted");
        Ok(action)
    }

    /// Block or unblock an organization; returns the new state
    pub fn set_org_blocked(&self, actor: &Actor, org: &Ref, blocked: bool) -> Result<u16> {
        let entry = self.find_org(org)?;
        if entry.id == SYSTEM_ORG {
            return Err(VaultError::InvalidParameter("the system organization cannot be blocked".to_string()));
        }
        self.authorize_system(actor, role(CATEGORY_SYSTEM | SUBCATEGORY_ORG, FUNCTION_UPDATE))?;
        let next = if blocked {
            state::set(entry.state, STATE_BLOCKED)
        } else {
            state::clear(entry.state, STATE_BLOCKED)
        };
        org_registry::set_state(&*self.router.registry()?, entry.id, next)?;
        info!(org = %entry.alias, blocked, "organization block state changed");
        Ok(next)
    }
}
