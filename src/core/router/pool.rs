//! Bounded connection pool for one shard
//!
//! Connections are opened lazily up to `max_open`, at most `max_idle` are kept
//! when released, and any connection older than `lifetime` is closed instead of
//! being reused. A [`PooledConnection`] returns itself to the pool on drop, so a
//! handle is released on every exit path.

use crate::core::config::{ConnectionConfig, PoolSettings};
use crate::error::{Result, VaultError};
use parking_lot::{Condvar, Mutex};
use rusqlite::{Connection, OptionalExtension};
use std::ops::Deref;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

struct IdleConnection {
    conn: Connection,
    opened: Instant,
}

struct PoolState {
    idle: Vec<IdleConnection>,
    open: usize,
}

/// Connection pool for a single shard database
pub struct ShardPool {
    group: u8,
    shard: u16,
    connection: ConnectionConfig,
    max_open: usize,
    max_idle: usize,
    lifetime: Duration,
    acquire_timeout: Duration,
    state: Mutex<PoolState>,
    available: Condvar,
}

impl ShardPool {
    /// Create an empty pool; no connection is opened until [`ShardPool::get`]
    pub fn new(group: u8, shard: u16, connection: ConnectionConfig, settings: &PoolSettings) -> Self {
        ShardPool {
            group,
            shard,
            connection,
            max_open: settings.max_open.max(1),
            max_idle: settings.max_idle,
            lifetime: Duration::from_secs(settings.lifetime_secs),
            acquire_timeout: Duration::from_secs(settings.acquire_timeout_secs),
            state: Mutex::new(PoolState {
                idle: Vec::new(),
                open: 0,
            }),
            available: Condvar::new(),
        }
    }

    /// Number of connections currently open (idle or checked out)
    pub fn open_count(&self) -> usize {
        self.state.lock().open
    }

    pub fn idle_count(&self) -> usize {
        self.state.lock().idle.len()
    }

    /// Check out a connection, waiting up to the acquire timeout when the pool is full
    pub fn get(self: &Arc<Self>) -> Result<PooledConnection> {
        let deadline = Instant::now() + self.acquire_timeout;
        let mut state = self.state.lock();
        loop {
            while let Some(idle) = state.idle.pop() {
                if idle.opened.elapsed() < self.lifetime {
                    trace!(group = self.group, shard = self.shard, "reusing idle connection");
                    return Ok(PooledConnection {
                        conn: Some(idle.conn),
                        opened: idle.opened,
                        pool: Arc::clone(self),
                    });
                }
                state.open -= 1;
            }

            if state.open < self.max_open {
                state.open += 1;
                drop(state);
                return match self.open_connection() {
                    Ok(conn) => Ok(PooledConnection {
                        conn: Some(conn),
                        opened: Instant::now(),
                        pool: Arc::clone(self),
                    }),
                    Err(e) => {
                        let mut state = self.state.lock();
                        state.open -= 1;
                        self.available.notify_one();
                        Err(e)
                    }
                };
            }

            if self.available.wait_until(&mut state, deadline).timed_out() {
                return Err(VaultError::PoolTimeout {
                    group: self.group,
                    shard: self.shard,
                });
            }
        }
    }

    fn open_connection(&self) -> Result<Connection> {
        debug!(
            group = self.group,
            shard = self.shard,
            database = %self.connection.database,
            "opening shard connection"
        );
        let conn = Connection::open(&self.connection.database)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        for (name, value) in &self.connection.options {
            // journal_mode answers with a row, most pragmas do not
            let sql = format!("PRAGMA {} = '{}'", name, value.replace('\'', "''"));
            conn.query_row(&sql, [], |_| Ok(())).optional()?;
        }
        Ok(conn)
    }

    fn release(&self, conn: Connection, opened: Instant) {
        let mut state = self.state.lock();
        if state.idle.len() < self.max_idle && opened.elapsed() < self.lifetime {
            state.idle.push(IdleConnection { conn, opened });
        } else {
            state.open -= 1;
            drop(conn);
        }
        self.available.notify_one();
    }
}

/// A checked-out connection; returned to its pool on drop
pub struct PooledConnection {
    conn: Option<Connection>,
    opened: Instant,
    pool: Arc<ShardPool>,
}

impl PooledConnection {
    /// Shard group this connection belongs to
    pub fn group(&self) -> u8 {
        self.pool.group
    }
}

impl Deref for PooledConnection {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        self.conn.as_ref().expect("connection present until drop")
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.release(conn, self.opened);
        }
    }
}
