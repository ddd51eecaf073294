//! Shared fixtures: a three-database deployment in a temporary directory
//!
//! Group 0 is a single registry database. Group 1 splits its shard space over
//! two databases so placements land on different files.

#![allow(dead_code)]

use object_vault::{Actor, MemoryPublisher, Vault, VaultConfig};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

pub const ADMIN_EMAIL: &str = "root@example.com";
pub const ADMIN_PASSWORD: &str = "root-secret";

pub struct Fixture {
    pub vault: Vault,
    pub publisher: Arc<MemoryPublisher>,
    pub admin: Actor,
    _dir: TempDir,
}

fn connection(path: &Path) -> String {
    format!(
        "{{ database = '{}', user = 'vault', server = {{ host = 'localhost', port = 3306 }} }}",
        path.display()
    )
}

pub fn config(dir: &Path) -> VaultConfig {
    let text = format!(
        r#"
data-group = 1

[session]
extend-minutes = 5

[[shard-groups]]
[[shard-groups.shards]]
range = [0, 4095]
connection = {}

[[shard-groups]]
[[shard-groups.shards]]
range = [0, 2047]
connection = {}

[[shard-groups.shards]]
range = [2048, 4095]
connection = {}
"#,
        connection(&dir.join("registry.db")),
        connection(&dir.join("data-a.db")),
        connection(&dir.join("data-b.db")),
    );
    VaultConfig::from_toml_str(&text).unwrap()
}

/// Migrated and bootstrapped vault
pub fn setup() -> Fixture {
    let dir = TempDir::new().unwrap();
    let publisher = Arc::new(MemoryPublisher::new());
    let vault = Vault::new(config(dir.path()), publisher.clone()).unwrap();
    vault.migrate().unwrap();
    let admin = vault.bootstrap(ADMIN_EMAIL, "root", ADMIN_PASSWORD).unwrap();
    Fixture {
        vault,
        publisher,
        admin: Actor::new(admin.id()),
        _dir: dir,
    }
}

impl Fixture {
    /// Create a user through the system administrator
    pub fn user(&self, username: &str, password: &str) -> Actor {
        let user = self
            .vault
            .create_user(
                &self.admin,
                &format!("{}@example.com", username),
                username,
                username,
                password,
            )
            .unwrap();
        Actor::new(user.id())
    }
}
