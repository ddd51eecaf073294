//! Store sessions
//!
//! Opening a store yields its plaintext data key. The key is kept in the
//! caller's session under `_s:<store-hex>` as a token
//!
//! ```text
//! /<store-hex>/<key-hex>/<expiry-hex>/
//! ```
//!
//! where expiry is a unix timestamp in seconds. Every use extends the expiry by
//! the configured number of minutes and rewrites the token.

use crate::core::crypto::{Key, KEY_SIZE};
use crate::error::{Result, VaultError};
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;

/// Key of a store's token in the caller's session
pub fn session_key(store: u64) -> String {
    format!("_s:{:x}", store)
}

/// Opened store key with its expiry
#[derive(Clone, PartialEq, Eq)]
pub struct StoreSession {
    store: u64,
    key: Key,
    expiry: i64,
}

impl std::fmt::Debug for StoreSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreSession")
            .field("store", &format_args!("{:#x}", self.store))
            .field("expiry", &self.expiry)
            .finish_non_exhaustive()
    }
}

impl StoreSession {
    pub fn new(store: u64, key: Key, now: DateTime<Utc>, extend_minutes: i64) -> Self {
        StoreSession {
            store,
            key,
            expiry: (now + Duration::minutes(extend_minutes)).timestamp(),
        }
    }

    pub fn store(&self) -> u64 {
        self.store
    }

    pub fn key(&self) -> &Key {
        &self.key
    }

    /// Expiry as unix seconds
    pub fn expiry(&self) -> i64 {
        self.expiry
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiry <= now.timestamp()
    }

    pub fn export(&self) -> String {
        format!("/{:x}/{}/{:x}/", self.store, hex::encode(self.key), self.expiry)
    }

    /// Parse a token produced by [`StoreSession::export`]
    pub fn import(token: &str) -> Result<Self> {
        let inner = token
            .strip_prefix('/')
            .and_then(|t| t.strip_suffix('/'))
            .ok_or_else(|| VaultError::InvalidSession("token must start and end with '/'".to_string()))?;
        let parts: Vec<&str> = inner.split('/').collect();
        let [store, key, expiry] = parts.as_slice() else {
            return Err(VaultError::InvalidSession(format!(
                "token has {} parts, expected 3",
                parts.len()
            )));
        };

        let store = u64::from_str_radix(store, 16)
            .map_err(|_| VaultError::InvalidSession("bad store id".to_string()))?;
        let raw = hex::decode(key).map_err(|_| VaultError::InvalidSession("bad key encoding".to_string()))?;
        let key: Key = raw
            .as_slice()
            .try_into()
            .map_err(|_| VaultError::InvalidSession(format!("key must be {} bytes, got {}", KEY_SIZE, raw.len())))?;
        let expiry = i64::from_str_radix(expiry, 16)
            .map_err(|_| VaultError::InvalidSession("bad expiry".to_string()))?;
        if expiry <= 0 {
            return Err(VaultError::InvalidSession("expiry must be positive".to_string()));
        }
        Ok(StoreSession { store, key, expiry })
    }

    /// Validate a token at `now`, extend it and return the session with its new token
    pub fn resume(token: &str, now: DateTime<Utc>, extend_minutes: i64) -> Result<(Self, String)> {
        let mut session = StoreSession::import(token)?;
        if session.is_expired(now) {
            return Err(VaultError::SessionExpired);
        }
        session.expiry = (now + Duration::minutes(extend_minutes)).timestamp();
        let token = session.export();
        Ok((session, token))
    }
}

/// Per-caller key/value session provided by the request harness
pub trait SessionStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;

    fn set(&self, key: &str, value: String);

    fn remove(&self, key: &str) -> Option<String>;
}

/// In-process session, used by the CLI and tests
#[derive(Debug, Default)]
pub struct MemorySession {
    values: Mutex<HashMap<String, String>>,
}

impl MemorySession {
    pub fn new() -> Self {
        MemorySession::default()
    }

    pub fn len(&self) -> usize {
        self.values.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.lock().is_empty()
    }
}

impl SessionStore for MemorySession {
    fn get(&self, key: &str) -> Option<String> {
        self.values.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: String) {
        self.values.lock().insert(key.to_string(), value);
    }

    fn remove(&self, key: &str) -> Option<String> {
        self.values.lock().remove(key)
    }
}
