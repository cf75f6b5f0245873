//! UDP session tracking for the game server
//!
//! UDP has no connections, so the server keeps its own notion of one:
//! - a `ConnectionId` per remote address, allocated on join
//! - the last time anything arrived from that address
//! - the capacity limit and idle timeout
//!
//! The game engine only ever sees `ConnectionId`s. Mapping them back to socket
//! addresses for outbound packets happens here.

use log::info;
use shared::ConnectionId;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// One remote endpoint that has joined the game.
#[derive(Debug)]
pub struct Client {
    pub id: ConnectionId,
    pub addr: SocketAddr,
    /// Last time we received any packet from this client
    pub last_seen: Instant,
}

impl Client {
    pub fn new(id: ConnectionId, addr: SocketAddr) -> Self {
        Self {
            id,
            addr,
            last_seen: Instant::now(),
        }
    }

    /// Returns true if nothing has arrived from this client within `timeout`.
    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_seen.elapsed() > timeout
    }
}

/// Connected clients, bounded by `max_clients`.
///
/// Connection ids start at 1 and are never reused while the server runs, so a
/// late packet for a dropped session can't land on a newer one.
pub struct ClientManager {
    clients: HashMap<ConnectionId, Client>,
    next_client_id: ConnectionId,
    max_clients: usize,
    timeout: Duration,
}

impl ClientManager {
    pub fn new(max_clients: usize, timeout: Duration) -> Self {
        Self {
            clients: HashMap::new(),
            next_client_id: 1,
            max_clients,
            timeout,
        }
    }

    /// Returns `None` when the server is full.
    pub fn add_client(&mut self, addr: SocketAddr) -> Option<ConnectionId> {
        if self.is_full() {
            return None;
        }

        let client_id = self.next_client_id;
        self.next_client_id += 1;

        info!("Client {} connected from {}", client_id, addr);
        self.clients.insert(client_id, Client::new(client_id, addr));

        Some(client_id)
    }

    pub fn remove_client(&mut self, client_id: ConnectionId) -> bool {
        if let Some(client) = self.clients.remove(&client_id) {
            info!("Client {} disconnected", client.id);
            true
        } else {
            false
        }
    }

    pub fn find_client_by_addr(&self, addr: SocketAddr) -> Option<ConnectionId> {
        self.clients
            .values()
            .find(|client| client.addr == addr)
            .map(|client| client.id)
    }

    pub fn addr_of(&self, client_id: ConnectionId) -> Option<SocketAddr> {
        self.clients.get(&client_id).map(|client| client.addr)
    }

    /// Marks the client as alive. Returns false for unknown ids.
    pub fn touch(&mut self, client_id: ConnectionId) -> bool {
        match self.clients.get_mut(&client_id) {
            Some(client) => {
                client.last_seen = Instant::now();
                true
            }
            None => false,
        }
    }

    /// Removes and returns every client idle for longer than the timeout.
    pub fn check_timeouts(&mut self) -> Vec<ConnectionId> {
        let timeout = self.timeout;
        let timed_out: Vec<ConnectionId> = self
            .clients
            .values()
            .filter(|client| client.is_timed_out(timeout))
            .map(|client| client.id)
            .collect();

        for client_id in &timed_out {
            self.remove_client(*client_id);
        }

        timed_out
    }

    pub fn get_client_addrs(&self) -> Vec<(ConnectionId, SocketAddr)> {
        self.clients
            .iter()
            .map(|(id, client)| (*id, client.addr))
            .collect()
    }

    fn is_full(&self) -> bool {
        self.clients.len() >= self.max_clients
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}
