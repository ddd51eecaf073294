//! Object templates
//!
//! Templates are global, versioned and immutable; they live on the registry
//! shard. A store lists the templates it offers in `registry_object_templates`.

use super::{Actor, Vault};
use crate::core::access::AccessRequest;
use crate::core::id;
use crate::core::orm::{Entity, Template};
use crate::core::registry::{object_templates, ObjectTemplateEntry};
use crate::core::roles::{
    role, CATEGORY_STORE, CATEGORY_SYSTEM, FUNCTION_CREATE, FUNCTION_DELETE, FUNCTION_READ_LIST,
    SUBCATEGORY_TEMPLATE,
};
use crate::core::validation;
use crate::error::{EntityKind, Result, VaultError};
use serde_json::Value;
use tracing::info;

impl Vault {
    fn load_template(&self, name: &str, version: u32) -> Result<Template> {
        let mut template = Template::default();
        if !template.by_name_version(&*self.router.registry()?, name, version)? {
            return Err(VaultError::not_found(EntityKind::Template, format!("{} v{}", name, version)));
        }
        Ok(template)
    }

    /// Store the next version of template `name`
    pub fn create_template(
        &self,
        actor: &Actor,
        name: &str,
        title: &str,
        description: &str,
        model: Value,
    ) -> Result<Template> {
        self.authorize_system(actor, role(CATEGORY_SYSTEM | SUBCATEGORY_TEMPLATE, FUNCTION_CREATE))?;
        let name = validation::normalize_alias(name)?;
        validation::validate_name("title", title)?;

        let registry = self.router.registry()?;
        let mut latest = Template::default();
        let version = if latest.by_name_latest(&registry, &name)? {
            latest.version() + 1
        } else {
            1
        };

        let mut template = Template::new(&name, version);
        template.set_title(title)?;
        template.set_description(description)?;
        template.set_model(model)?;
        template.flush(&registry, false)?;
        info!(name = %name, version, "template created");
        Ok(template)
    }

    /// Template `name` at `version`; version 0 is the latest
    pub fn template(&self, actor: &Actor, name: &str, version: u32) -> Result<Template> {
        self.account(actor)?;
        self.load_template(&name.to_lowercase(), version)
    }

    /// Exported form of a template, with the title field guaranteed in its model
    pub fn export_template(&self, actor: &Actor, name: &str, version: u32) -> Result<Value> {
        Ok(self.template(actor, name, version)?.export())
    }

    /// Offer template `name` in `store`; the title defaults to the template's own
    pub fn attach_template(&self, actor: &Actor, store: u64, name: &str, title: Option<&str>) -> Result<ObjectTemplateEntry> {
        self.authorize(
            actor,
            AccessRequest::to(store).roles(&[role(CATEGORY_STORE | SUBCATEGORY_TEMPLATE, FUNCTION_CREATE)]),
        )?;
        let template = self.load_template(&name.to_lowercase(), 0)?;
        let title = match title {
            Some(title) => {
                validation::validate_name("title", title)?;
                title.to_string()
            }
            None => template.title().to_string(),
        };
        object_templates::attach(&*self.router.connect(store)?, store, template.name(), &title)?;
        info!(store = %id::format_id(store), template = template.name(), "template attached");
        Ok(ObjectTemplateEntry {
            template: template.name().to_string(),
            title,
        })
    }

    /// Stop offering template `name` in `store`; returns whether it was attached
    pub fn detach_template(&self, actor: &Actor, store: u64, name: &str) -> Result<bool> {
        self.authorize(
            actor,
            AccessRequest::to(store).roles(&[role(CATEGORY_STORE | SUBCATEGORY_TEMPLATE, FUNCTION_DELETE)]),
        )?;
        object_templates::detach(&*self.router.connect(store)?, store, &name.to_lowercase())
    }

    pub fn store_templates(&self, actor: &Actor, store: u64) -> Result<Vec<ObjectTemplateEntry>> {
        self.authorize(
            actor,
            AccessRequest::to(store).roles(&[role(CATEGORY_STORE | SUBCATEGORY_TEMPLATE, FUNCTION_READ_LIST)]),
        )?;
        object_templates::list(&*self.router.connect(store)?, store)
    }
}
