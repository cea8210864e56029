//! Connection registry
//!
//! The pool of consumer-equivalent connections plus the set of chat names
//! in use, each behind its own lock. `register` takes the name lock and then
//! the pool lock, one after the other and never nested. The broadcaster
//! only takes the pool lock.

use std::collections::{HashMap, HashSet};

use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::connection::Outbound;
use crate::error::RelayError;
use crate::message::Message;
use crate::types::ConnectionId;

/// A registered connection
#[derive(Debug)]
pub struct PoolEntry {
    /// Display name, empty for plain consumers
    pub name: String,
    /// Remote address, for logs
    pub peer: String,
    outbound: Outbound,
}

/// Thread-safe pool of connections and chat names
#[derive(Debug, Default)]
pub struct Registry {
    pool: Mutex<HashMap<ConnectionId, PoolEntry>>,
    names: Mutex<HashSet<String>>,
}

impl Registry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection to the pool
    ///
    /// A non-empty `name` is claimed first. If it is already held the call
    /// fails with `NameTaken` and the connection is not added.
    pub async fn register(
        &self,
        id: ConnectionId,
        peer: String,
        name: String,
        outbound: Outbound,
    ) -> Result<(), RelayError> {
        if !name.is_empty() {
            let mut names = self.names.lock().await;
            if !names.insert(name.clone()) {
                return Err(RelayError::NameTaken(name));
            }
        }

        let entry = PoolEntry {
            name,
            peer,
            outbound,
        };
        self.pool.lock().await.insert(id, entry);
        Ok(())
    }

    /// Remove a connection from the pool
    ///
    /// Removing an absent connection is a no-op. A named entry also releases
    /// its name so it can be claimed again. Returns whether anything was
    /// removed.
    pub async fn remove(&self, id: ConnectionId) -> bool {
        let Some(entry) = self.pool.lock().await.remove(&id) else {
            return false;
        };
        info!(peer = %entry.peer, connection = %id, "removed connection from pool");

        if !entry.name.is_empty() {
            self.names.lock().await.remove(&entry.name);
            debug!(name = %entry.name, "released chat name");
        }
        true
    }

    /// Dispatch `msg` to every entry not excluded by its sender name
    ///
    /// Holds the pool lock for the whole pass. Each dispatch is a
    /// non-blocking enqueue on the entry's writer task. Returns the entries
    /// whose writer has already stopped; the caller removes them once the
    /// lock is released.
    pub async fn broadcast(&self, msg: &Message) -> Vec<ConnectionId> {
        let line = msg.output_string();
        let pool = self.pool.lock().await;

        let mut stale = Vec::new();
        for (id, entry) in pool.iter() {
            if msg.excludes(&entry.name) {
                continue;
            }
            if entry.outbound.send(line.clone()).is_err() {
                stale.push(*id);
            }
        }
        stale
    }

    /// Number of registered connections
    pub async fn len(&self) -> usize {
        self.pool.lock().await.len()
    }

    /// Check if no connection is registered
    pub async fn is_empty(&self) -> bool {
        self.pool.lock().await.is_empty()
    }

    /// Check if a chat name is currently claimed
    pub async fn is_name_taken(&self, name: &str) -> bool {
        self.names.lock().await.contains(name)
    }
}
