//! Background replay of the offline queue.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::Notify;

use storefront_core::OperationId;
use storefront_storage::KeyValueStore;

use crate::{OfflineError, OfflineMode, OfflineQueue, QueueError, QueuedOperation};

/// Destination of replayed operations (normally the HTTP API).
#[async_trait]
pub trait OperationSink: Send + Sync {
    async fn send(&self, operation: &QueuedOperation) -> Result<(), SyncError>;

    /// Cheap connectivity probe run before each sync pass.
    async fn is_reachable(&self) -> bool {
        true
    }
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Offline(#[from] OfflineError),

    /// Worth retrying later (network failure, 5xx, throttling).
    #[error("transient sync failure: {0}")]
    Transient(String),

    /// The server refused the operation; replaying it will not help.
    #[error("operation rejected with status {status}: {message}")]
    Rejected { status: u16, message: String },

    #[error(transparent)]
    Queue(#[from] QueueError),
}

/// Outcome of one pass over the queue.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub synced: Vec<OperationId>,
    pub failed: Vec<OperationId>,
    pub rejected: Vec<OperationId>,
    /// Operations still due after this pass.
    pub remaining: usize,
}

impl SyncReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Exponential backoff between failing sync passes.
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    factor: u32,
    current: Option<Duration>,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration, factor: u32) -> Self {
        Self {
            initial,
            max: max.max(initial),
            factor: factor.max(1),
            current: None,
        }
    }

    /// Delay to wait after another consecutive failure.
    pub fn next_delay(&mut self) -> Duration {
        let delay = match self.current {
            None => self.initial,
            Some(current) => current
                .checked_mul(self.factor)
                .unwrap_or(self.max)
                .min(self.max),
        };
        self.current = Some(delay);
        delay
    }

    pub fn reset(&mut self) {
        self.current = None;
    }
}

impl Default for Backoff {
    /// 1s doubling up to 5 minutes.
    fn default() -> Self {
        Self::new(Duration::from_secs(1), Duration::from_secs(300), 2)
    }
}

/// Stops a running [`SyncWorker`]. A signal sent before the worker starts
/// waiting is not lost.
#[derive(Debug, Clone)]
pub struct ShutdownHandle(Arc<Notify>);

impl ShutdownHandle {
    pub fn shutdown(&self) {
        self.0.notify_one();
    }
}

/// Replays queued operations into an [`OperationSink`].
pub struct SyncWorker<S> {
    queue: Arc<OfflineQueue<S>>,
    sink: Arc<dyn OperationSink>,
    offline: Arc<OfflineMode>,
    interval: Duration,
    backoff: Backoff,
    shutdown: Arc<Notify>,
}

impl<S> SyncWorker<S>
where
    S: KeyValueStore + 'static,
{
    pub fn new(
        queue: Arc<OfflineQueue<S>>,
        sink: Arc<dyn OperationSink>,
        offline: Arc<OfflineMode>,
    ) -> Self {
        Self {
            queue,
            sink,
            offline,
            interval: Duration::from_secs(30),
            backoff: Backoff::default(),
            shutdown: Arc::new(Notify::new()),
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle(self.shutdown.clone())
    }

    /// Send due operations oldest first.
    ///
    /// A transient failure stops the pass so later operations are never
    /// delivered ahead of an earlier one. Rejected operations are parked and
    /// the pass continues.
    pub async fn sync_once(&self) -> Result<SyncReport, SyncError> {
        self.offline.require_online()?;

        let mut report = SyncReport::default();
        for pending in self.queue.list_pending() {
            let op = self.queue.mark_syncing(pending.id)?;

            match self.sink.send(&op).await {
                Ok(()) => {
                    if let Err(err) = self.queue.mark_synced(op.id) {
                        // Delivered but not recorded; resend under the same
                        // idempotency key next pass.
                        self.queue.requeue(op.id)?;
                        return Err(err.into());
                    }
                    tracing::debug!(operation_id = %op.id, kind = %op.kind, "operation synced");
                    report.synced.push(op.id);
                }
                Err(SyncError::Rejected { status, message }) => {
                    tracing::warn!(
                        operation_id = %op.id,
                        kind = %op.kind,
                        status,
                        "operation rejected by server: {message}"
                    );
                    self.queue
                        .mark_rejected(op.id, format!("{status}: {message}"))?;
                    report.rejected.push(op.id);
                }
                Err(err) => {
                    tracing::warn!(
                        operation_id = %op.id,
                        kind = %op.kind,
                        attempts = op.attempts,
                        error = %err,
                        "operation sync failed"
                    );
                    self.queue.mark_failed(op.id, err.to_string())?;
                    report.failed.push(op.id);
                    if matches!(err, SyncError::Offline(_)) {
                        self.offline.set_offline();
                    }
                    break;
                }
            }
        }

        report.remaining = self.queue.list_pending().len();
        if !report.synced.is_empty() || !report.failed.is_empty() {
            tracing::info!(
                tenant_id = %self.queue.tenant_id(),
                synced = report.synced.len(),
                failed = report.failed.len(),
                rejected = report.rejected.len(),
                remaining = report.remaining,
                "sync pass finished"
            );
        }
        Ok(report)
    }

    /// Run until shut down. Each tick probes connectivity, then syncs.
    pub async fn run(mut self) {
        tracing::info!(tenant_id = %self.queue.tenant_id(), "sync worker started");

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = self.shutdown.notified() => break,
                _ = ticker.tick() => {}
            }

            if !self.sink.is_reachable().await {
                tracing::debug!("skipping sync; api unreachable");
                self.offline.set_offline();
                continue;
            }
            self.offline.set_online();

            let clean = match self.sync_once().await {
                Ok(report) => report.is_clean(),
                Err(err) => {
                    tracing::warn!(error = %err, "sync pass aborted");
                    false
                }
            };
            if clean {
                self.backoff.reset();
                continue;
            }

            let delay = self.backoff.next_delay();
            tracing::debug!(?delay, "backing off before next sync attempt");
            tokio::select! {
                _ = self.shutdown.notified() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        tracing::info!("sync worker stopped");
    }

    pub fn spawn(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(self.run())
    }
}
