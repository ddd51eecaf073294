//! Role bitfields and role sets
//!
//! A role is a 32-bit value:
//!
//! ```text
//! bits 31..24  category      (system, org, store)
//! bits 23..16  subcategory   (conf, user, roles, invite, org, store, object, template)
//! bits 15..0   function mask (READ, LIST, CREATE, UPDATE, DELETE)
//! ```
//!
//! A [`RoleSet`] keeps one entry per (category, subcategory) pair and merges
//! function bits by union on insert.

use serde::{Deserialize, Serialize};

pub const CATEGORY_SYSTEM: u32 = 0x0100_0000;
pub const CATEGORY_ORG: u32 = 0x0200_0000;
pub const CATEGORY_STORE: u32 = 0x0300_0000;

pub const SUBCATEGORY_CONF: u32 = 0x0000_0000;
pub const SUBCATEGORY_USER: u32 = 0x0001_0000;
pub const SUBCATEGORY_ROLES: u32 = 0x0002_0000;
pub const SUBCATEGORY_INVITE: u32 = 0x0003_0000;
pub const SUBCATEGORY_ORG: u32 = 0x0004_0000;
pub const SUBCATEGORY_STORE: u32 = 0x0005_0000;
pub const SUBCATEGORY_OBJECT: u32 = 0x0006_0000;
pub const SUBCATEGORY_TEMPLATE: u32 = 0x0007_0000;

pub const FUNCTION_READ: u32 = 0x0001;
pub const FUNCTION_LIST: u32 = 0x0002;
pub const FUNCTION_CREATE: u32 = 0x0100;
pub const FUNCTION_UPDATE: u32 = 0x0200;
pub const FUNCTION_DELETE: u32 = 0x0400;
pub const FUNCTION_READ_LIST: u32 = FUNCTION_READ | FUNCTION_LIST;
pub const FUNCTION_READONLY: u32 = FUNCTION_READ_LIST;
pub const FUNCTION_MODIFY: u32 = FUNCTION_CREATE | FUNCTION_UPDATE | FUNCTION_DELETE;
pub const FUNCTION_ALL: u32 = 0xFFFF;

const MASK_CATEGORY: u32 = 0xFF00_0000;
const MASK_SUBCATEGORY: u32 = 0x00FF_0000;
const MASK_KEY: u32 = MASK_CATEGORY | MASK_SUBCATEGORY;
const MASK_FUNCTIONS: u32 = 0x0000_FFFF;

const MAX_SUBCATEGORY: u32 = SUBCATEGORY_TEMPLATE;

/// Build a role from a category (optionally or-ed with a subcategory) and a function mask
pub const fn role(category: u32, functions: u32) -> u32 {
    (category & MASK_KEY) | (functions & MASK_FUNCTIONS)
}

pub const fn role_category(r: u32) -> u32 {
    r & MASK_CATEGORY
}

pub const fn role_subcategory(r: u32) -> u32 {
    r & MASK_SUBCATEGORY
}

/// Category and subcategory together, the key a [`RoleSet`] merges on
pub const fn role_key(r: u32) -> u32 {
    r & MASK_KEY
}

pub const fn role_functions(r: u32) -> u32 {
    r & MASK_FUNCTIONS
}

/// Known category and subcategory, non-empty function mask
pub fn role_is_valid(r: u32) -> bool {
    let category = role_category(r);
    let known_category =
        category == CATEGORY_SYSTEM || category == CATEGORY_ORG || category == CATEGORY_STORE;
    known_category && role_subcategory(r) <= MAX_SUBCATEGORY && role_functions(r) != 0
}

/// True iff `to` has the category of `from` and covers all of its functions
pub const fn role_match(from: u32, to: u32) -> bool {
    role_key(from) == role_key(to) && (role_functions(to) & role_functions(from)) == role_functions(from)
}

/// Same category and identical function mask
pub const fn role_exact_match(from: u32, to: u32) -> bool {
    role_key(from) == role_key(to) && role_functions(from) == role_functions(to)
}

/// Roles granting full administration of an object's category
pub fn admin_roles(category: u32) -> Vec<u32> {
    [
        SUBCATEGORY_CONF,
        SUBCATEGORY_USER,
        SUBCATEGORY_ROLES,
        SUBCATEGORY_INVITE,
        SUBCATEGORY_ORG,
        SUBCATEGORY_STORE,
        SUBCATEGORY_OBJECT,
        SUBCATEGORY_TEMPLATE,
    ]
    .iter()
    .map(|sub| role(category | sub, FUNCTION_ALL))
    .collect()
}

/// Ordered set of roles, one entry per category/subcategory
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleSet {
    roles: Vec<u32>,
}

impl RoleSet {
    pub fn new() -> Self {
        RoleSet { roles: Vec::new() }
    }

    pub fn from_roles(roles: &[u32]) -> Self {
        let mut set = RoleSet::new();
        set.add_roles(roles);
        set
    }

    /// Parse a comma-separated list of decimal roles, discarding invalid tokens
    pub fn from_csv(csv: &str) -> Self {
        let mut set = RoleSet::new();
        for token in csv.split(',') {
            if let Ok(r) = token.trim().parse::<u32>() {
                if role_is_valid(r) {
                    set.add(r);
                }
            }
        }
        set
    }

    /// Comma-separated decimal roles in insertion order
    pub fn to_csv(&self) -> String {
        self.roles
            .iter()
            .map(|r| r.to_string())
            .collect::<Vec<_>>()
            .join(",")
    }

    pub fn roles(&self) -> &[u32] {
        &self.roles
    }

    pub fn len(&self) -> usize {
        self.roles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }

    /// Add a role, merging function bits into an existing entry of the same category.
    /// Returns false for invalid roles.
    pub fn add(&mut self, r: u32) -> bool {
        if !role_is_valid(r) {
            return false;
        }
        match self.roles.iter_mut().find(|e| role_key(**e) == role_key(r)) {
            Some(entry) => *entry |= role_functions(r),
            None => self.roles.push(r),
        }
        true
    }

    pub fn add_roles(&mut self, roles: &[u32]) {
        for r in roles {
            self.add(*r);
        }
    }

    /// Clear the function bits of `r`; drops the entry when no function remains
    pub fn remove(&mut self, r: u32) {
        if let Some(pos) = self.roles.iter().position(|e| role_key(*e) == role_key(r)) {
            let remaining = role_functions(self.roles[pos]) & !role_functions(r);
            if remaining == 0 {
                self.roles.remove(pos);
            } else {
                self.roles[pos] = role_key(r) | remaining;
            }
        }
    }

    /// Drop the entry of `r`'s category/subcategory entirely
    pub fn remove_category(&mut self, r: u32) {
        self.roles.retain(|e| role_key(*e) != role_key(r));
    }

    /// Drop the entry only if it equals `r` exactly
    pub fn remove_exact(&mut self, r: u32) {
        self.roles.retain(|e| *e != r);
    }

    pub fn remove_all(&mut self) {
        self.roles.clear();
    }

    /// True iff an entry of `r`'s category covers all of `r`'s functions
    pub fn has_role(&self, r: u32) -> bool {
        self.roles.iter().any(|e| role_match(r, *e))
    }

    pub fn has_exact_role(&self, r: u32) -> bool {
        self.roles.iter().any(|e| role_exact_match(r, *e))
    }

    pub fn has_roles(&self, roles: &[u32]) -> bool {
        roles.iter().all(|r| self.has_role(*r))
    }

    /// First entry in `category` (subcategory ignored)
    pub fn category_role(&self, category: u32) -> Option<u32> {
        self.roles
            .iter()
            .copied()
            .find(|e| role_category(*e) == role_category(category))
    }

    /// Entry for the category/subcategory pair in `key`
    pub fn subcategory_role(&self, key: u32) -> Option<u32> {
        self.roles.iter().copied().find(|e| role_key(*e) == role_key(key))
    }

    /// Categories present in this set, in insertion order
    fn categories(&self) -> Vec<u32> {
        let mut out = Vec::new();
        for r in &self.roles {
            let c = role_category(*r);
            if !out.contains(&c) {
                out.push(c);
            }
        }
        out
    }

    /// READ|LIST on users and READ|UPDATE on roles within some category
    pub fn is_roles_manager(&self) -> bool {
        self.categories().into_iter().any(|c| {
            self.has_role(role(c | SUBCATEGORY_USER, FUNCTION_READ_LIST))
                && self.has_role(role(c | SUBCATEGORY_ROLES, FUNCTION_READ | FUNCTION_UPDATE))
        })
    }

    /// READ|LIST on users and READ|CREATE|DELETE on invitations within some category
    pub fn is_invitations_manager(&self) -> bool {
        self.categories().into_iter().any(|c| {
            self.has_role(role(c | SUBCATEGORY_USER, FUNCTION_READ_LIST))
                && self.has_role(role(
                    c | SUBCATEGORY_INVITE,
                    FUNCTION_READ | FUNCTION_CREATE | FUNCTION_DELETE,
                ))
        })
    }
}

impl From<Vec<u32>> for RoleSet {
    fn from(roles: Vec<u32>) -> Self {
        RoleSet::from_roles(&roles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ORG_USER_ALL: u32 = 0x0201_FFFF;
    const ORG_ROLES_ALL: u32 = 0x0202_FFFF;

    #[test]
    fn test_role_fields() {
        let r = role(CATEGORY_STORE | SUBCATEGORY_OBJECT, FUNCTION_READ_LIST);
        assert_eq!(role_category(r), CATEGORY_STORE);
        assert_eq!(role_subcategory(r), SUBCATEGORY_OBJECT);
        assert_eq!(role_functions(r), FUNCTION_READ_LIST);
        assert!(role_is_valid(r));
    }

    #[test]
    fn test_role_validity() {
        assert!(!role_is_valid(role(CATEGORY_ORG | SUBCATEGORY_USER, 0)));
        assert!(!role_is_valid(0x0401_0001));
        assert!(!role_is_valid(0x0209_0001));
    }

    #[test]
    fn test_match() {
        let need = role(CATEGORY_ORG | SUBCATEGORY_USER, FUNCTION_READ);
        let have = role(CATEGORY_ORG | SUBCATEGORY_USER, FUNCTION_READ_LIST);
        assert!(role_match(need, have));
        assert!(!role_match(have, need));
        assert!(!role_match(need, role(CATEGORY_STORE | SUBCATEGORY_USER, FUNCTION_ALL)));
        assert!(role_exact_match(have, have));
        assert!(!role_exact_match(need, have));
    }

    #[test]
    fn test_csv_parse_and_manager_flag() {
        let set = RoleSet::from_csv("33685503,33751039");
        assert_eq!(set.roles(), &[ORG_USER_ALL, ORG_ROLES_ALL]);
        assert!(set.is_roles_manager());
        assert!(!set.is_invitations_manager());
    }

    #[test]
    fn test_csv_discards_invalid_tokens() {
        let set = RoleSet::from_csv("abc, 33685503,,0,4294967295, 99999999999");
        assert_eq!(set.roles(), &[ORG_USER_ALL]);
        assert_eq!(RoleSet::from_csv("").len(), 0);
    }

    #[test]
    fn test_csv_preserves_insertion_order() {
        let mut set = RoleSet::new();
        set.add(ORG_ROLES_ALL);
        set.add(ORG_USER_ALL);
        assert_eq!(set.to_csv(), format!("{},{}", ORG_ROLES_ALL, ORG_USER_ALL));
    }

    #[test]
    fn test_add_merges_functions() {
        let mut set = RoleSet::new();
        set.add(role(CATEGORY_ORG | SUBCATEGORY_USER, FUNCTION_READ));
        set.add(role(CATEGORY_ORG | SUBCATEGORY_USER, FUNCTION_LIST));
        assert_eq!(set.len(), 1);
        assert_eq!(
            set.roles()[0],
            role(CATEGORY_ORG | SUBCATEGORY_USER, FUNCTION_READ_LIST)
        );
    }

    #[test]
    fn test_remove_clears_bits_and_drops_empty() {
        let mut set = RoleSet::from_roles(&[role(CATEGORY_ORG | SUBCATEGORY_USER, FUNCTION_READ_LIST)]);
        set.remove(role(CATEGORY_ORG | SUBCATEGORY_USER, FUNCTION_LIST));
        assert_eq!(set.roles(), &[role(CATEGORY_ORG | SUBCATEGORY_USER, FUNCTION_READ)]);
        set.remove(role(CATEGORY_ORG | SUBCATEGORY_USER, FUNCTION_READ));
        assert!(set.is_empty());
    }

    #[test]
    fn test_remove_variants() {
        let mut set = RoleSet::from_roles(&[ORG_USER_ALL, ORG_ROLES_ALL]);
        set.remove_exact(role(CATEGORY_ORG | SUBCATEGORY_USER, FUNCTION_READ));
        assert_eq!(set.len(), 2);
        set.remove_exact(ORG_USER_ALL);
        assert_eq!(set.roles(), &[ORG_ROLES_ALL]);
        set.remove_category(role(CATEGORY_ORG | SUBCATEGORY_ROLES, FUNCTION_READ));
        assert!(set.is_empty());
        set.add_roles(&[ORG_USER_ALL, ORG_ROLES_ALL]);
        set.remove_all();
        assert!(set.is_empty());
    }

    #[test]
    fn test_lookups() {
        let set = RoleSet::from_roles(&[ORG_USER_ALL, 0x0303_FFFF]);
        assert_eq!(set.category_role(CATEGORY_STORE), Some(0x0303_FFFF));
        assert_eq!(set.subcategory_role(CATEGORY_ORG | SUBCATEGORY_USER), Some(ORG_USER_ALL));
        assert_eq!(set.subcategory_role(CATEGORY_ORG | SUBCATEGORY_ROLES), None);
        assert!(set.has_exact_role(ORG_USER_ALL));
        assert!(set.has_role(role(CATEGORY_ORG | SUBCATEGORY_USER, FUNCTION_DELETE)));
    }

    #[test]
    fn test_invitation_manager() {
        let set = RoleSet::from_roles(&[0x0301_FFFF, 0x0303_FFFF]);
        assert!(set.is_invitations_manager());
        assert!(!set.is_roles_manager());
    }

    #[test]
    fn test_manager_requires_same_category() {
        // user rights in org, roles rights in store: not a manager anywhere
        let set = RoleSet::from_roles(&[0x0201_FFFF, 0x0302_FFFF]);
        assert!(!set.is_roles_manager());
    }

    #[test]
    fn test_admin_roles_are_managers() {
        let set = RoleSet::from_roles(&admin_roles(CATEGORY_STORE));
        assert!(set.is_roles_manager());
        assert!(set.is_invitations_manager());
        assert_eq!(set.len(), 8);
    }
}
