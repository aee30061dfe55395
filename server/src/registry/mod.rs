//! Live set of observer connections.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use dashmap::DashMap;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

use crate::errors::ConnectionError;

pub type ConnectionId = Uuid;

/// Handle to one observer. Frames are queued here and written to the
/// socket by the connection's writer task.
#[derive(Debug)]
pub struct Connection {
    id: ConnectionId,
    open: AtomicBool,
    closed: CancellationToken,
    outbound: mpsc::Sender<String>,
}

impl Connection {
    /// Create a connection with room for `capacity` queued frames. The
    /// receiver belongs to whoever writes to the socket.
    pub fn new(capacity: usize) -> (Arc<Self>, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(capacity);
        let conn = Arc::new(Self {
            id: Uuid::new_v4(),
            open: AtomicBool::new(true),
            closed: CancellationToken::new(),
            outbound: tx,
        });
        (conn, rx)
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    /// Returns true only for the caller that flipped the flag.
    pub fn mark_closed(&self) -> bool {
        let was_open = self.open.swap(false, Ordering::AcqRel);
        self.closed.cancel();
        was_open
    }

    /// Resolves once the connection has been marked closed, from any side.
    pub async fn closed(&self) {
        self.closed.cancelled().await
    }

    /// Queue a frame without waiting. A full queue means the observer is
    /// not keeping up.
    pub fn send(&self, frame: String) -> Result<(), ConnectionError> {
        if !self.is_open() {
            return Err(ConnectionError::Closed);
        }
        self.outbound.try_send(frame).map_err(|e| {
            self.mark_closed();
            match e {
                TrySendError::Full(_) => ConnectionError::Full,
                TrySendError::Closed(_) => ConnectionError::Closed,
            }
        })
    }
}

#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: DashMap<ConnectionId, Arc<Connection>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, conn: Arc<Connection>) {
        debug!(connection = %conn.id(), "connection registered");
        self.connections.insert(conn.id(), conn);
    }

    /// Mark the connection closed and drop it. Removing twice is a no-op.
    pub fn remove(&self, id: ConnectionId) -> Option<Arc<Connection>> {
        let (_, conn) = self.connections.remove(&id)?;
        conn.mark_closed();
        debug!(connection = %id, "connection removed");
        Some(conn)
    }

    pub fn get(&self, id: ConnectionId) -> Option<Arc<Connection>> {
        self.connections.get(&id).map(|c| c.value().clone())
    }

    /// Call `f` once per open connection.
    ///
    /// Iterates over a snapshot so `f` may add or remove connections; a
    /// connection closed after the snapshot was taken is skipped.
    pub fn for_each_open<F>(&self, mut f: F)
    where
        F: FnMut(&Arc<Connection>),
    {
        let snapshot: Vec<Arc<Connection>> = self
            .connections
            .iter()
            .map(|entry| entry.value().clone())
            .collect();

        for conn in snapshot.iter().filter(|c| c.is_open()) {
            f(conn);
        }
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

#[cfg(test)]
mod registry_test;
