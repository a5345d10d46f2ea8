//! Who is connected, and which connection a display name routes to.

use std::collections::HashMap;

use log::debug;
use tokio::sync::mpsc;

use crate::server::protocol::ServerEvent;

/// Outbound side of one live connection.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    pub id: u64,
    tx: mpsc::UnboundedSender<ServerEvent>,
}

impl ConnectionHandle {
    pub fn new(id: u64, tx: mpsc::UnboundedSender<ServerEvent>) -> Self {
        Self { id, tx }
    }

    /// Queue an event for this connection. Returns false once the connection is gone.
    pub fn send(&self, event: ServerEvent) -> bool {
        self.tx.send(event).is_ok()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// All live connections plus the display-name routing table.
///
/// A name maps to at most one connection; the latest registration for a
/// name wins and the previous connection simply stops receiving routed
/// events. Owned by [`crate::server::GameServer`] and only mutated through
/// these methods.
#[derive(Debug, Default)]
pub struct PresenceRegistry {
    connections: HashMap<u64, ConnectionHandle>,
    names: HashMap<String, u64>,
}

impl PresenceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connect(&mut self, handle: ConnectionHandle) {
        self.connections.insert(handle.id, handle);
    }

    /// Forget a connection entirely. Returns the names it was still routing.
    pub fn disconnect(&mut self, conn_id: u64) -> Vec<String> {
        self.connections.remove(&conn_id);
        let stale: Vec<String> = self
            .names
            .iter()
            .filter(|(_, id)| **id == conn_id)
            .map(|(name, _)| name.clone())
            .collect();
        for name in &stale {
            self.names.remove(name);
        }
        stale
    }

    /// Route `name` to `conn_id`, replacing any previous connection for the
    /// name. Returns the displaced connection id, if any.
    pub fn add(&mut self, name: &str, conn_id: u64) -> Option<u64> {
        let previous = self.names.insert(name.to_string(), conn_id);
        if let Some(prev) = previous.filter(|p| *p != conn_id) {
            debug!("presence: {} moved from #{} to #{}", name, prev, conn_id);
        }
        previous.filter(|p| *p != conn_id)
    }

    /// Remove `name` only if it still routes to `conn_id`.
    pub fn remove(&mut self, name: &str, conn_id: u64) -> bool {
        match self.names.get(name) {
            Some(current) if *current == conn_id => {
                self.names.remove(name);
                true
            }
            _ => false,
        }
    }

    /// Live connection for `name`, if the name is routed and the connection is open.
    pub fn lookup(&self, name: &str) -> Option<&ConnectionHandle> {
        self.names
            .get(name)
            .and_then(|id| self.connections.get(id))
            .filter(|h| !h.is_closed())
    }

    pub fn get(&self, conn_id: u64) -> Option<&ConnectionHandle> {
        self.connections.get(&conn_id)
    }

    /// Routed display names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .names
            .iter()
            .filter(|(_, id)| self.connections.contains_key(id))
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }

    pub fn connections(&self) -> impl Iterator<Item = &ConnectionHandle> {
        self.connections.values()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Send `event` to every live connection. Returns how many accepted it.
    pub fn broadcast(&self, event: &ServerEvent) -> usize {
        self.connections
            .values()
            .filter(|h| h.send(event.clone()))
            .count()
    }
}
