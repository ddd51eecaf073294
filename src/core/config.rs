//! Deployment configuration
//!
//! ```toml
//! data-group = 1
//!
//! [session]
//! extend-minutes = 5
//!
//! [[shard-groups]]
//! [[shard-groups.shards]]
//! range = [0, 4095]
//! connection = { database = "/var/lib/vault/registry.db", user = "vault", password = "", server = { host = "localhost", port = 3306 } }
//! ```

use crate::core::id::{MAX_GROUPS, MAX_SHARDS};
use crate::error::{Result, VaultError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

pub const DEFAULT_EXTEND_MINUTES: i64 = 5;
pub const DEFAULT_ACTION_QUEUE: &str = "q.actions.inbox";
pub const DEFAULT_DATA_GROUP: u8 = 1;

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct VaultConfig {
    /// Shard group that new users, orgs and stores are placed on
    #[serde(default = "default_data_group")]
    pub data_group: u8,

    #[serde(default)]
    pub session: SessionSettings,

    #[serde(default)]
    pub actions: ActionSettings,

    #[serde(default)]
    pub pool: PoolSettings,

    pub shard_groups: Vec<ShardGroupConfig>,
}

fn default_data_group() -> u8 {
    DEFAULT_DATA_GROUP
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SessionSettings {
    /// Minutes a store session is extended by on each use
    pub extend_minutes: i64,
}

impl Default for SessionSettings {
    fn default() -> Self {
        SessionSettings {
            extend_minutes: DEFAULT_EXTEND_MINUTES,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ActionSettings {
    /// Broker queue actions are published to
    pub queue: String,
}

impl Default for ActionSettings {
    fn default() -> Self {
        ActionSettings {
            queue: DEFAULT_ACTION_QUEUE.to_string(),
        }
    }
}

/// Per-shard connection pool limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct PoolSettings {
    pub max_open: usize,
    pub max_idle: usize,
    pub lifetime_secs: u64,
    pub acquire_timeout_secs: u64,
}

impl Default for PoolSettings {
    fn default() -> Self {
        PoolSettings {
            max_open: 10,
            max_idle: 2,
            lifetime_secs: 180,
            acquire_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShardGroupConfig {
    pub shards: Vec<ShardConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShardConfig {
    pub range: ShardRange,
    pub connection: ConnectionConfig,
}

/// Inclusive range of shard ids served by one database
///
/// Written as `[start, end]`, or `[end]` meaning `[0, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<u16>", into = "Vec<u16>")]
pub struct ShardRange {
    pub start: u16,
    pub end: u16,
}

impl ShardRange {
    pub fn new(start: u16, end: u16) -> Self {
        ShardRange { start, end }
    }

    pub fn contains(&self, shard: u16) -> bool {
        self.start <= shard && shard <= self.end
    }

    pub fn len(&self) -> u16 {
        self.end - self.start + 1
    }

    pub fn is_empty(&self) -> bool {
        false
    }
}

impl TryFrom<Vec<u16>> for ShardRange {
    type Error = String;

    fn try_from(v: Vec<u16>) -> std::result::Result<Self, Self::Error> {
        let (start, end) = match v.as_slice() {
            [end] => (0, *end),
            [start, end] => (*start, *end),
            _ => return Err(format!("range must have 1 or 2 elements, got {}", v.len())),
        };
        if start > end {
            return Err(format!("range start {} exceeds end {}", start, end));
        }
        if end >= MAX_SHARDS {
            return Err(format!("range end {} exceeds max shard id {}", end, MAX_SHARDS - 1));
        }
        Ok(ShardRange { start, end })
    }
}

impl From<ShardRange> for Vec<u16> {
    fn from(r: ShardRange) -> Self {
        vec![r.start, r.end]
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConnectionConfig {
    #[serde(default)]
    pub database: String,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub server: ServerConfig,
    /// Applied as `PRAGMA key = value` on every new connection
    #[serde(default)]
    pub options: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub port: u16,
}

impl ConnectionConfig {
    pub fn validate(&self) -> Result<()> {
        if self.database.is_empty() {
            return Err(VaultError::Config("connection is missing 'database'".to_string()));
        }
        if self.user.is_empty() {
            return Err(VaultError::Config(format!(
                "connection to '{}' is missing 'user'",
                self.database
            )));
        }
        if self.server.host.is_empty() {
            return Err(VaultError::Config(format!(
                "connection to '{}' is missing 'server.host'",
                self.database
            )));
        }
        if self.server.port == 0 {
            return Err(VaultError::Config(format!(
                "connection to '{}' has port 0",
                self.database
            )));
        }
        for key in self.options.keys() {
            if !key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                return Err(VaultError::Config(format!("invalid option name '{}'", key)));
            }
        }
        Ok(())
    }
}

impl VaultConfig {
    /// Parse TOML text
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: VaultConfig =
            toml::from_str(text).map_err(|e| VaultError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Parse JSON text
    pub fn from_json_str(text: &str) -> Result<Self> {
        let config: VaultConfig =
            serde_json::from_str(text).map_err(|e| VaultError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a `.toml` or `.json` file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| VaultError::Config(format!("{}: {}", path.display(), e)))?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_str(&text),
            _ => Self::from_toml_str(&text),
        }
    }

    /// Reject configurations the router cannot serve
    pub fn validate(&self) -> Result<()> {
        if self.shard_groups.is_empty() {
            return Err(VaultError::Config("no shard groups configured".to_string()));
        }
        if self.shard_groups.len() > MAX_GROUPS as usize {
            return Err(VaultError::Config(format!(
                "{} shard groups configured, max {}",
                self.shard_groups.len(),
                MAX_GROUPS
            )));
        }
        if self.data_group as usize >= self.shard_groups.len() {
            return Err(VaultError::Config(format!(
                "data-group {} is not configured",
                self.data_group
            )));
        }
        for (g, group) in self.shard_groups.iter().enumerate() {
            if group.shards.is_empty() {
                return Err(VaultError::Config(format!("shard group {} has no shards", g)));
            }
            for (i, a) in group.shards.iter().enumerate() {
                a.connection.validate()?;
                for b in group.shards.iter().skip(i + 1) {
                    if a.range.start <= b.range.end && b.range.start <= a.range.end {
                        return Err(VaultError::Config(format!(
                            "shard group {} has overlapping ranges",
                            g
                        )));
                    }
                }
            }
        }
        if self.session.extend_minutes <= 0 {
            return Err(VaultError::Config("session.extend-minutes must be positive".to_string()));
        }
        if self.pool.max_open == 0 {
            return Err(VaultError::Config("pool.max-open must be positive".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
data-group = 1

[session]
extend-minutes = 7

[[shard-groups]]
[[shard-groups.shards]]
range = [0]
connection = { database = "registry.db", user = "vault", server = { host = "localhost", port = 3306 } }

[[shard-groups]]
[[shard-groups.shards]]
range = [0, 2047]
connection = { database = "a.db", user = "vault", server = { host = "localhost", port = 3306 }, options = { journal_mode = "wal" } }
[[shard-groups.shards]]
range = [2048, 4095]
connection = { database = "b.db", user = "vault", server = { host = "localhost", port = 3306 } }
"#;

    #[test]
    fn test_parse_toml() {
        let config = VaultConfig::from_toml_str(SAMPLE).unwrap();
        assert_eq!(config.shard_groups.len(), 2);
        assert_eq!(config.shard_groups[0].shards[0].range, ShardRange::new(0, 0));
        assert_eq!(config.shard_groups[1].shards[1].range, ShardRange::new(2048, 4095));
        assert_eq!(config.session.extend_minutes, 7);
        assert_eq!(config.actions.queue, DEFAULT_ACTION_QUEUE);
        assert_eq!(config.pool.max_open, 10);
        assert_eq!(config.pool.max_idle, 2);
        assert_eq!(
            config.shard_groups[1].shards[0].connection.options.get("journal_mode"),
            Some(&"wal".to_string())
        );
    }

    #[test]
    fn test_parse_json() {
        let json = r#"{
            "shard-groups": [
                { "shards": [ { "range": [4095],
                    "connection": { "database": "r.db", "user": "u", "password": "p",
                                    "server": { "host": "h", "port": 1 } } } ] },
                { "shards": [ { "range": [0, 4095],
                    "connection": { "database": "d.db", "user": "u",
                                    "server": { "host": "h", "port": 1 } } } ] }
            ]
        }"#;
        let config = VaultConfig::from_json_str(json).unwrap();
        assert_eq!(config.data_group, 1);
        assert_eq!(config.shard_groups[0].shards[0].range, ShardRange::new(0, 4095));
    }

    #[test]
    fn test_range_errors() {
        assert!(ShardRange::try_from(vec![]).is_err());
        assert!(ShardRange::try_from(vec![1, 2, 3]).is_err());
        assert!(ShardRange::try_from(vec![5, 4]).is_err());
        assert!(ShardRange::try_from(vec![0, 4096]).is_err());
    }

    #[test]
    fn test_missing_connection_fields() {
        let mut conn = ConnectionConfig {
            database: "x.db".into(),
            user: "u".into(),
            server: ServerConfig { host: "h".into(), port: 1 },
            ..Default::default()
        };
        assert!(conn.validate().is_ok());
        conn.server.port = 0;
        assert!(conn.validate().is_err());
        conn.server.port = 1;
        conn.user.clear();
        assert!(conn.validate().is_err());
        conn.user = "u".into();
        conn.database.clear();
        assert!(conn.validate().is_err());
    }

    #[test]
    fn test_data_group_must_exist() {
        let text = SAMPLE.replace("data-group = 1", "data-group = 3");
        assert!(matches!(VaultConfig::from_toml_str(&text), Err(VaultError::Config(_))));
    }

    #[test]
    fn test_overlapping_ranges_rejected() {
        let text = SAMPLE.replace("range = [2048, 4095]", "range = [2000, 4095]");
        assert!(VaultConfig::from_toml_str(&text).is_err());
    }
}
