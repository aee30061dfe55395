//! Live vehicle tracking: observers stream positions over websockets, every
//! accepted position is relayed to all observers at once, and a timer
//! persists only the latest position per vehicle.

pub mod broadcast;
pub mod buffer;
pub mod config;
pub mod errors;
pub mod flush;
pub mod http;
pub mod ingest;
pub mod location;
pub mod registry;
pub mod store;
pub mod ws;

#[cfg(test)]
pub(crate) mod test_utils;

pub use errors::{Error, Result};

use std::sync::Arc;

use crate::{
    buffer::CoalescingBuffer,
    config::{ServerConfig, Settings},
    flush::FlushScheduler,
    ingest::IngestionHandler,
    registry::ConnectionRegistry,
    store::LocationStore,
};

/// The wired-up components, shared by the websocket and HTTP handlers.
#[derive(Clone)]
pub struct Pipeline {
    pub registry: Arc<ConnectionRegistry>,
    pub buffer: Arc<CoalescingBuffer>,
    pub ingest: IngestionHandler,
    pub scheduler: Arc<FlushScheduler>,
    pub store: Arc<dyn LocationStore>,
    pub server: ServerConfig,
}

impl Pipeline {
    pub fn new(settings: &Settings, store: Arc<dyn LocationStore>) -> Self {
        let registry = Arc::new(ConnectionRegistry::new());
        let buffer = Arc::new(CoalescingBuffer::new());
        let ingest = IngestionHandler::new(buffer.clone(), registry.clone());
        let scheduler = FlushScheduler::new(buffer.clone(), store.clone(), settings.flush.clone());

        Self {
            registry,
            buffer,
            ingest,
            scheduler,
            store,
            server: settings.server.clone(),
        }
    }
}
