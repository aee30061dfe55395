use std::sync::Arc;

use fleettrack_shared::Frame;
use tracing::{debug, error, warn};

use crate::{location::LocationEvent, registry::ConnectionRegistry};

pub const BROADCAST_MESSAGE: &str = "New location received.";

/// Relays each accepted event to every open observer, the sender included.
#[derive(Debug, Clone)]
pub struct Fanout {
    registry: Arc<ConnectionRegistry>,
}

impl Fanout {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    /// Queue `event` on every open connection and return how many took it.
    ///
    /// Never waits on a socket. A connection that cannot take the frame is
    /// pruned; the others are unaffected.
    pub fn broadcast(&self, event: &LocationEvent) -> usize {
        let frame = match serde_json::to_value(event)
            .and_then(|data| serde_json::to_string(&Frame::ok_with(BROADCAST_MESSAGE, data)))
        {
            Ok(frame) => frame,
            Err(e) => {
                error!(vehicle_id = event.vehicle_id, error = %e, "cannot encode broadcast");
                return 0;
            }
        };

        let mut delivered = 0;
        let mut failed = Vec::new();
        self.registry.for_each_open(|conn| match conn.send(frame.clone()) {
            Ok(()) => delivered += 1,
            Err(e) => {
                warn!(connection = %conn.id(), error = %e, "pruning observer");
                failed.push(conn.id());
            }
        });

        for id in failed {
            self.registry.remove(id);
        }
        debug!(vehicle_id = event.vehicle_id, delivered, "location broadcast");
        delivered
    }
}

#[cfg(test)]
mod broadcast_test;
