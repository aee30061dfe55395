//! Periodic drain of the coalescing buffer into the location store.
//!
//! Flushes are serialized through `gate`. The timer task awaits each flush
//! before it polls the next tick and skips ticks missed meanwhile, so two
//! batches never write the same rows at once. A manual [`FlushScheduler::flush_now`]
//! that races a timer flush waits for it.

use std::sync::Arc;

use futures_util::{stream, StreamExt};
use parking_lot::Mutex;
use tokio::{
    task::JoinHandle,
    time::{self, Instant, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    buffer::CoalescingBuffer, config::FlushConfig, errors::StoreError, location::LocationEvent,
    store::LocationStore,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushState {
    Idle,
    Draining,
    Upserting,
}

/// Outcome of one flush cycle.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FlushReport {
    pub attempted: usize,
    pub created: usize,
    pub updated: usize,
    pub failed: usize,
}

impl FlushReport {
    /// Every item of a non-empty batch was lost.
    pub fn store_unavailable(&self) -> bool {
        self.attempted > 0 && self.failed == self.attempted
    }
}

enum Upserted {
    Created,
    Updated,
}

pub struct FlushScheduler {
    buffer: Arc<CoalescingBuffer>,
    store: Arc<dyn LocationStore>,
    config: FlushConfig,
    state: Mutex<FlushState>,
    gate: tokio::sync::Mutex<()>,
    task: Mutex<Option<(CancellationToken, JoinHandle<()>)>>,
}

/// Puts the scheduler back to `Idle` even if the flush future is dropped.
struct StateGuard<'a>(&'a Mutex<FlushState>);

impl StateGuard<'_> {
    fn enter(&self, state: FlushState) {
        *self.0.lock() = state;
    }
}

impl Drop for StateGuard<'_> {
    fn drop(&mut self) {
        *self.0.lock() = FlushState::Idle;
    }
}

impl FlushScheduler {
    pub fn new(
        buffer: Arc<CoalescingBuffer>,
        store: Arc<dyn LocationStore>,
        config: FlushConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            buffer,
            store,
            config,
            state: Mutex::new(FlushState::Idle),
            gate: tokio::sync::Mutex::new(()),
            task: Mutex::new(None),
        })
    }

    pub fn state(&self) -> FlushState {
        *self.state.lock()
    }

    pub fn is_running(&self) -> bool {
        self.task.lock().is_some()
    }

    /// Spawn the timer task. Calling it while already running does nothing.
    pub fn start(self: &Arc<Self>) {
        let mut task = self.task.lock();
        if task.is_some() {
            return;
        }

        let token = CancellationToken::new();
        let handle = tokio::spawn(self.clone().run(token.clone()));
        *task = Some((token, handle));
        info!(interval = ?self.config.interval(), "flush scheduler started");
    }

    /// Stop ticking, wait for an in-flight flush, then run the final flush
    /// when `flush_on_shutdown` is set.
    pub async fn stop(&self) -> FlushReport {
        let task = self.task.lock().take();
        if let Some((token, handle)) = task {
            token.cancel();
            if let Err(e) = handle.await {
                error!(error = %e, "flush task ended abnormally");
            }
            info!("flush scheduler stopped");
        }

        if self.config.flush_on_shutdown {
            self.flush_now().await
        } else {
            let abandoned = self.buffer.len();
            if abandoned > 0 {
                warn!(abandoned, "pending locations dropped at shutdown");
            }
            FlushReport::default()
        }
    }

    async fn run(self: Arc<Self>, token: CancellationToken) {
        let period = self.config.interval();
        let mut ticker = time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                _ = ticker.tick() => {
                    self.flush_now().await;
                }
            }
        }
    }

    /// Drain the buffer and upsert every entry. One failing vehicle never
    /// affects the others, and nothing is put back into the buffer.
    pub async fn flush_now(&self) -> FlushReport {
        let _gate = self.gate.lock().await;
        let state = StateGuard(&self.state);

        state.enter(FlushState::Draining);
        let batch = self.buffer.drain();
        if batch.is_empty() {
            debug!("nothing to flush");
            return FlushReport::default();
        }

        state.enter(FlushState::Upserting);
        let mut report = FlushReport {
            attempted: batch.len(),
            ..Default::default()
        };

        let results: Vec<Result<Upserted, StoreError>> = stream::iter(batch)
            .map(|(vehicle_id, event)| async move {
                let result = self.upsert(&event).await;
                if let Err(e) = &result {
                    error!(vehicle_id, error = %e, "upsert failed, location dropped this cycle");
                }
                result
            })
            .buffer_unordered(self.config.concurrency.max(1))
            .collect()
            .await;

        for result in results {
            match result {
                Ok(Upserted::Created) => report.created += 1,
                Ok(Upserted::Updated) => report.updated += 1,
                Err(_) => report.failed += 1,
            }
        }

        if report.store_unavailable() {
            warn!(lost = report.failed, "store unavailable for a whole cycle, batch lost");
        }
        info!(
            attempted = report.attempted,
            created = report.created,
            updated = report.updated,
            failed = report.failed,
            "locations flushed"
        );
        report
    }

    async fn upsert(&self, event: &LocationEvent) -> Result<Upserted, StoreError> {
        let limit = self.config.store_timeout();
        let write = async {
            let fields = event.to_fields();
            match self.store.find_by_vehicle(event.vehicle_id).await? {
                Some(existing) => self
                    .store
                    .update(existing.location_id, fields)
                    .await
                    .map(|_| Upserted::Updated),
                None => self.store.create(fields).await.map(|_| Upserted::Created),
            }
        };

        time::timeout(limit, write)
            .await
            .map_err(|_| StoreError::Timeout(limit))?
    }
}
