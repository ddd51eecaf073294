//! Shard router
//!
//! Maps a global id, or an explicit `(group, shard)` pair, to a database
//! connection. Each configured shard database gets its own bounded pool,
//! created on first use and kept for the life of the router.

mod pool;

pub use pool::{PooledConnection, ShardPool};

use crate::core::config::{ConnectionConfig, PoolSettings, ShardRange, VaultConfig};
use crate::core::id;
use crate::core::orm::schema;
use crate::error::{Result, VaultError};
use parking_lot::{Mutex, RwLock};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info};

/// Group and shard hosting the global registries
pub const REGISTRY_GROUP: u8 = 0;
pub const REGISTRY_SHARD: u16 = 0;

#[derive(Debug, Clone)]
struct ShardEntry {
    range: ShardRange,
    connection: ConnectionConfig,
}

/// Routes identifiers to shard connections
pub struct Router {
    groups: Vec<Vec<ShardEntry>>,
    settings: PoolSettings,
    pools: RwLock<HashMap<(u8, usize), Arc<ShardPool>>>,
    rng: Mutex<StdRng>,
}

impl Router {
    /// Build a router from a validated configuration
    pub fn new(config: &VaultConfig) -> Result<Self> {
        config.validate()?;
        let groups = config
            .shard_groups
            .iter()
            .map(|g| {
                g.shards
                    .iter()
                    .map(|s| ShardEntry {
                        range: s.range,
                        connection: s.connection.clone(),
                    })
                    .collect()
            })
            .collect();

        let seed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or_default();

        Ok(Router {
            groups,
            settings: config.pool.clone(),
            pools: RwLock::new(HashMap::new()),
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        })
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// Connection to the shard hosting `id`
    pub fn connect(&self, id: u64) -> Result<PooledConnection> {
        self.connect_to(id::shard_group(id), id::shard(id))
    }

    /// Connection to an explicit group and shard id
    pub fn connect_to(&self, group: u8, shard: u16) -> Result<PooledConnection> {
        let index = self.resolve(group, shard)?;
        self.pool(group, index).get()
    }

    /// Connection to the registry shard (group 0, shard 0)
    pub fn registry(&self) -> Result<PooledConnection> {
        self.connect_to(REGISTRY_GROUP, REGISTRY_SHARD)
    }

    /// Index of the shard entry in `group` serving `shard`
    fn resolve(&self, group: u8, shard: u16) -> Result<usize> {
        let entries = self
            .groups
            .get(group as usize)
            .ok_or(VaultError::ShardGroupMissing(group))?;
        match entries.len() {
            0 => Err(VaultError::NoShards { group, shard }),
            1 => Ok(0),
            _ => entries
                .iter()
                .position(|e| e.range.contains(shard))
                .ok_or(VaultError::NoShards { group, shard }),
        }
    }

    fn pool(&self, group: u8, index: usize) -> Arc<ShardPool> {
        if let Some(pool) = self.pools.read().get(&(group, index)) {
            return Arc::clone(pool);
        }
        let mut pools = self.pools.write();
        let pool = pools.entry((group, index)).or_insert_with(|| {
            let entry = &self.groups[group as usize][index];
            debug!(group, index, "creating shard pool");
            Arc::new(ShardPool::new(
                group,
                entry.range.start,
                entry.connection.clone(),
                &self.settings,
            ))
        });
        Arc::clone(pool)
    }

    /// Random shard id inside `group`'s configured ranges
    pub fn pick_shard(&self, group: u8) -> Result<u16> {
        let entries = self
            .groups
            .get(group as usize)
            .ok_or(VaultError::ShardGroupMissing(group))?;
        if entries.is_empty() {
            return Err(VaultError::NoShards { group, shard: 0 });
        }
        let mut rng = self.rng.lock();
        if entries.len() == 1 && entries[0].range == ShardRange::new(0, id::MAX_SHARDS - 1) {
            return Ok(id::random_shard_id(&mut *rng));
        }
        let entry = &entries[rng.gen_range(0..entries.len())];
        Ok(rng.gen_range(entry.range.start..=entry.range.end))
    }

    /// Create the schema on every configured shard
    pub fn migrate(&self) -> Result<()> {
        for (group, entries) in self.groups.iter().enumerate() {
            for (index, entry) in entries.iter().enumerate() {
                let conn = self.pool(group as u8, index).get()?;
                conn.execute_batch(schema::SCHEMA)?;
                info!(
                    group,
                    start = entry.range.start,
                    end = entry.range.end,
                    "schema applied"
                );
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::{ServerConfig, ShardConfig, ShardGroupConfig};
    use tempfile::TempDir;

    fn shard(dir: &TempDir, name: &str, start: u16, end: u16) -> ShardConfig {
        ShardConfig {
            range: ShardRange::new(start, end),
            connection: ConnectionConfig {
                database: dir.path().join(name).to_string_lossy().into_owned(),
                user: "test".into(),
                server: ServerConfig {
                    host: "localhost".into(),
                    port: 1,
                },
                ..Default::default()
            },
        }
    }

    fn config(dir: &TempDir) -> VaultConfig {
        VaultConfig {
            data_group: 1,
            session: Default::default(),
            actions: Default::default(),
            pool: Default::default(),
            shard_groups: vec![
                ShardGroupConfig {
                    shards: vec![shard(dir, "registry.db", 0, 0)],
                },
                ShardGroupConfig {
                    shards: vec![
                        shard(dir, "low.db", 0, 99),
                        shard(dir, "high.db", 100, 4095),
                    ],
                },
            ],
        }
    }

    #[test]
    fn test_resolve() {
        let dir = TempDir::new().unwrap();
        let router = Router::new(&config(&dir)).unwrap();

        assert_eq!(router.resolve(0, 0).unwrap(), 0);
        // single-shard groups skip the range check
        assert_eq!(router.resolve(0, 4000).unwrap(), 0);
        assert_eq!(router.resolve(1, 50).unwrap(), 0);
        assert_eq!(router.resolve(1, 100).unwrap(), 1);
        assert!(matches!(router.resolve(2, 0), Err(VaultError::ShardGroupMissing(2))));
    }

    #[test]
    fn test_connect_by_id_routes_to_range() {
        let dir = TempDir::new().unwrap();
        let router = Router::new(&config(&dir)).unwrap();

        let low = id::make_id(1, id::TYPE_USER, 10, 1);
        let high = id::make_id(1, id::TYPE_USER, 3000, 1);
        router.connect(low).unwrap().execute_batch("CREATE TABLE marker_low (x)").unwrap();
        router.connect(high).unwrap().execute_batch("CREATE TABLE marker_high (x)").unwrap();

        let conn = router.connect_to(1, 0).unwrap();
        let n: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE name = 'marker_low'",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(n, 1);
        let n: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE name = 'marker_high'",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(n, 0);
    }

    #[test]
    fn test_pick_shard_within_ranges() {
        let dir = TempDir::new().unwrap();
        let router = Router::new(&config(&dir)).unwrap();
        for _ in 0..200 {
            let s = router.pick_shard(1).unwrap();
            assert!(s < id::MAX_SHARDS);
            assert!(router.resolve(1, s).is_ok());
        }
        assert_eq!(router.pick_shard(0).unwrap(), 0);
    }

    #[test]
    fn test_migrate_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let router = Router::new(&config(&dir)).unwrap();
        router.migrate().unwrap();
        router.migrate().unwrap();
        let conn = router.registry().unwrap();
        let n: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE name = 'registry_users'",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(n, 1);
    }
}
