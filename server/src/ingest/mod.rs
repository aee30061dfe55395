use std::sync::Arc;

use chrono::Utc;
use fleettrack_shared::Frame;
use tracing::{error, warn};

use crate::{
    broadcast::Fanout,
    buffer::CoalescingBuffer,
    errors::IngestError,
    location::{parse_update, LocationEvent},
    registry::{Connection, ConnectionRegistry},
};

pub const ACCEPTED_MESSAGE: &str = "Location received and pending save.";
pub const INCOMPLETE_MESSAGE: &str =
    "Incomplete data. Make sure to send vehicle_id, lat, lon, event_type and direction.";
pub const UNPARSEABLE_MESSAGE: &str = "There was an error processing the request.";

/// Entry point for every data frame an observer sends.
#[derive(Debug, Clone)]
pub struct IngestionHandler {
    buffer: Arc<CoalescingBuffer>,
    registry: Arc<ConnectionRegistry>,
    fanout: Fanout,
}

impl IngestionHandler {
    pub fn new(buffer: Arc<CoalescingBuffer>, registry: Arc<ConnectionRegistry>) -> Self {
        let fanout = Fanout::new(registry.clone());
        Self {
            buffer,
            registry,
            fanout,
        }
    }

    /// Validate, stage and relay one message, then acknowledge the sender.
    ///
    /// A rejected message only produces an error frame for `conn`. Messages
    /// from a connection already marked closed are dropped untouched.
    pub fn handle(&self, conn: &Connection, raw: &str) -> Result<(), IngestError> {
        if !conn.is_open() {
            return Err(IngestError::ConnectionClosed);
        }

        let update = match parse_update(raw) {
            Ok(update) => update,
            Err(e) => {
                self.reject(conn, &e);
                return Err(e);
            }
        };

        let event = LocationEvent::received(update, Utc::now());
        self.buffer.set(event.vehicle_id, event.clone());
        self.fanout.broadcast(&event);
        self.acknowledge(conn, Frame::ok(ACCEPTED_MESSAGE));
        Ok(())
    }

    /// Binary frames must hold UTF-8 JSON; anything else is unparseable.
    pub fn handle_bytes(&self, conn: &Connection, raw: &[u8]) -> Result<(), IngestError> {
        match std::str::from_utf8(raw) {
            Ok(text) => self.handle(conn, text),
            Err(e) => {
                if !conn.is_open() {
                    return Err(IngestError::ConnectionClosed);
                }
                let e = IngestError::Malformed(e.to_string());
                self.reject(conn, &e);
                Err(e)
            }
        }
    }

    fn reject(&self, conn: &Connection, e: &IngestError) {
        let message = if e.is_unparseable() {
            UNPARSEABLE_MESSAGE
        } else {
            INCOMPLETE_MESSAGE
        };
        self.acknowledge(conn, Frame::failure(message, Some(e.to_string())));
    }

    /// A connection that cannot take its acknowledgement is pruned like one
    /// that failed during broadcast.
    fn acknowledge(&self, conn: &Connection, frame: Frame) {
        let text = match serde_json::to_string(&frame) {
            Ok(text) => text,
            Err(e) => {
                error!(connection = %conn.id(), error = %e, "cannot encode acknowledgement");
                return;
            }
        };
        if let Err(e) = conn.send(text) {
            warn!(connection = %conn.id(), error = %e, "acknowledgement dropped, pruning observer");
            self.registry.remove(conn.id());
        }
    }
}
