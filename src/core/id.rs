//! Global identifier codec
//!
//! A global id is a 64-bit value that embeds everything needed to route it:
//!
//! ```text
//! bits 63..60  shard group   (4 bits)
//! bits 59..48  shard id      (12 bits)
//! bits 47..40  reserved      (zero)
//! bits 39..32  object type   (8 bits)
//! bits 31..0   local id      (32 bits, the shard-local row id)
//! ```
//!
//! Inputs are masked to their field widths before assembly, so an oversized
//! argument never bleeds into a neighbouring field. Shard routing only looks at
//! the group and shard fields.

use crate::core::validation;
use crate::error::{Result, VaultError};
use rand::Rng;

pub const TYPE_USER: u8 = 0x01;
pub const TYPE_ORG: u8 = 0x02;
pub const TYPE_STORE: u8 = 0x03;
pub const TYPE_ACTION: u8 = 0xFB;
pub const TYPE_REQUEST: u8 = 0xFC;
pub const TYPE_KEY: u8 = 0xFD;
pub const TYPE_INVITATION: u8 = 0xFE;
pub const TYPE_OTHER: u8 = 0xFF;

pub const GROUP_BITS: u32 = 4;
pub const SHARD_BITS: u32 = 12;
pub const MAX_GROUPS: u16 = 1 << GROUP_BITS;
pub const MAX_SHARDS: u16 = 1 << SHARD_BITS;

const GROUP_SHIFT: u32 = 60;
const SHARD_SHIFT: u32 = 48;
const TYPE_SHIFT: u32 = 32;
const GROUP_MASK: u64 = 0xF;
const SHARD_MASK: u64 = 0xFFF;
const TYPE_MASK: u64 = 0xFF;
const LOCAL_MASK: u64 = 0xFFFF_FFFF;

/// The global system administrator
pub const SYSTEM_ADMIN: u64 = make_id(0, TYPE_USER, 0, 1);

/// The system organization
pub const SYSTEM_ORG: u64 = make_id(0, TYPE_ORG, 0, 1);

/// Assemble a global id
pub const fn make_id(group: u8, object_type: u8, shard: u16, local: u32) -> u64 {
    ((group as u64 & GROUP_MASK) << GROUP_SHIFT)
        | ((shard as u64 & SHARD_MASK) << SHARD_SHIFT)
        | ((object_type as u64 & TYPE_MASK) << TYPE_SHIFT)
        | (local as u64 & LOCAL_MASK)
}

pub const fn shard_group(id: u64) -> u8 {
    ((id >> GROUP_SHIFT) & GROUP_MASK) as u8
}

pub const fn shard(id: u64) -> u16 {
    ((id >> SHARD_SHIFT) & SHARD_MASK) as u16
}

pub const fn type_of(id: u64) -> u8 {
    ((id >> TYPE_SHIFT) & TYPE_MASK) as u8
}

pub const fn local(id: u64) -> u32 {
    (id & LOCAL_MASK) as u32
}

/// Split an id into `(group, type, shard, local)`
pub const fn decode(id: u64) -> (u8, u8, u16, u32) {
    (shard_group(id), type_of(id), shard(id), local(id))
}

/// Uniformly random shard id in `0..4096`
pub fn random_shard_id<R: Rng + ?Sized>(rng: &mut R) -> u16 {
    rng.gen_range(0..MAX_SHARDS)
}

/// Global id with a random shard id
pub fn random_id<R: Rng + ?Sized>(rng: &mut R, group: u8, object_type: u8, local: u32) -> u64 {
    make_id(group, object_type, random_shard_id(rng), local)
}

/// Render an id as `:` followed by lowercase hex without leading zeros
pub fn format_id(id: u64) -> String {
    format!(":{:x}", id)
}

/// Parse the `:hex` form produced by [`format_id`]
pub fn parse_id(s: &str) -> Result<u64> {
    let hex = s
        .strip_prefix(':')
        .ok_or_else(|| VaultError::InvalidParameter(format!("identifier '{}' must start with ':'", s)))?;
    if hex.is_empty() || hex.len() > 16 {
        return Err(VaultError::InvalidParameter(format!("identifier '{}' has bad length", s)));
    }
    u64::from_str_radix(hex, 16)
        .map_err(|_| VaultError::InvalidParameter(format!("identifier '{}' is not hex", s)))
}

/// A reference to a user, organization or store as it arrives from a route parameter
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Ref {
    Id(u64),
    Alias(String),
    Email(String),
}

impl Ref {
    /// Normalize a route parameter: `:hex` is an id, anything with `@` is an email,
    /// everything else is an alias. Aliases and emails are lowercased.
    pub fn parse(param: &str) -> Result<Ref> {
        let param = param.trim();
        if param.is_empty() {
            return Err(VaultError::InvalidParameter("empty reference".to_string()));
        }
        if param.starts_with(':') {
            return parse_id(param).map(Ref::Id);
        }
        let lowered = param.to_lowercase();
        if lowered.contains('@') {
            validation::validate_email(&lowered)?;
            Ok(Ref::Email(lowered))
        } else {
            validation::validate_alias(&lowered)?;
            Ok(Ref::Alias(lowered))
        }
    }
}

impl From<u64> for Ref {
    fn from(id: u64) -> Self {
        Ref::Id(id)
    }
}

impl std::fmt::Display for Ref {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Ref::Id(id) => f.write_str(&format_id(*id)),
            Ref::Alias(alias) => f.write_str(alias),
            Ref::Email(email) => f.write_str(email),
        }
    }
}
