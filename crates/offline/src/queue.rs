//! Durable FIFO of API writes recorded while offline.
//!
//! The queue lives in a [`KeyValueStore`] under [`OFFLINE_QUEUE_KEY`] as a
//! versioned document:
//!
//! ```json
//! { "version": 1, "operations": [{ "id": "...", "kind": "order.create", ... }] }
//! ```
//!
//! Every mutation is written through before it becomes visible in memory, so
//! a failed write leaves the queue exactly as it was.

use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use storefront_core::{OperationId, TenantId};
use storefront_storage::{KeyValueStore, StorageError, load_json, save_json};

pub const OFFLINE_QUEUE_KEY: &str = "offline-operations-queue";

const QUEUE_VERSION: u32 = 1;
const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Status of a queued operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationStatus {
    Pending,
    Syncing,
    Synced,
    Failed,
}

impl OperationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationStatus::Pending => "pending",
            OperationStatus::Syncing => "syncing",
            OperationStatus::Synced => "synced",
            OperationStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An API write waiting to be replayed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedOperation {
    pub id: OperationId,
    pub tenant_id: TenantId,
    /// Logical operation name, e.g. `order.create`.
    pub kind: String,
    /// API path the payload is sent to, e.g. `/api/v1/orders`.
    pub endpoint: String,
    pub payload: Value,
    pub status: OperationStatus,
    /// Number of delivery attempts started so far.
    pub attempts: u32,
    pub created_at: DateTime<Utc>,
    pub synced_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

#[derive(Debug, Error)]
pub enum QueueError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("operation {0} not found")]
    NotFound(OperationId),

    #[error("operation {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: OperationId,
        from: OperationStatus,
        to: OperationStatus,
    },

    #[error("offline queue has version {found}; this build supports up to {supported}")]
    UnsupportedVersion { found: u32, supported: u32 },
}

#[derive(Debug, Serialize, Deserialize)]
struct PersistedQueue {
    version: u32,
    operations: Vec<QueuedOperation>,
}

/// Persisted offline operations queue for one tenant.
#[derive(Debug)]
pub struct OfflineQueue<S> {
    store: S,
    tenant_id: TenantId,
    max_attempts: u32,
    operations: Mutex<Vec<QueuedOperation>>,
}

impl<S: KeyValueStore> OfflineQueue<S> {
    /// Load the queue from `store`.
    ///
    /// Operations left in `Syncing` by an interrupted run are put back to
    /// `Pending`; the server is expected to treat replays idempotently by id.
    pub fn open(store: S, tenant_id: TenantId) -> Result<Self, QueueError> {
        let mut operations = match load_json::<PersistedQueue, _>(&store, OFFLINE_QUEUE_KEY)? {
            None => Vec::new(),
            Some(doc) if doc.version > QUEUE_VERSION => {
                return Err(QueueError::UnsupportedVersion {
                    found: doc.version,
                    supported: QUEUE_VERSION,
                });
            }
            Some(doc) => doc.operations,
        };

        let mut interrupted = 0;
        for op in operations
            .iter_mut()
            .filter(|op| op.status == OperationStatus::Syncing)
        {
            op.status = OperationStatus::Pending;
            interrupted += 1;
        }
        if interrupted > 0 {
            tracing::warn!(
                tenant_id = %tenant_id,
                interrupted,
                "resetting operations interrupted mid-sync"
            );
        }

        tracing::debug!(tenant_id = %tenant_id, len = operations.len(), "offline queue loaded");

        Ok(Self {
            store,
            tenant_id,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            operations: Mutex::new(operations),
        })
    }

    /// Failed operations with this many attempts are no longer replayed
    /// automatically; [`retry_failed`](Self::retry_failed) re-arms them.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    /// Append a new `Pending` operation.
    pub fn enqueue(
        &self,
        kind: impl Into<String>,
        endpoint: impl Into<String>,
        payload: Value,
    ) -> Result<QueuedOperation, QueueError> {
        let op = QueuedOperation {
            id: OperationId::new(),
            tenant_id: self.tenant_id,
            kind: kind.into(),
            endpoint: endpoint.into(),
            payload,
            status: OperationStatus::Pending,
            attempts: 0,
            created_at: Utc::now(),
            synced_at: None,
            error: None,
        };

        self.mutate(|ops| {
            ops.push(op.clone());
            Ok(())
        })?;

        tracing::info!(
            tenant_id = %self.tenant_id,
            operation_id = %op.id,
            kind = %op.kind,
            "operation queued for sync"
        );
        Ok(op)
    }

    pub fn get(&self, id: OperationId) -> Option<QueuedOperation> {
        self.lock().iter().find(|op| op.id == id).cloned()
    }

    /// All operations in queue order.
    pub fn list(&self) -> Vec<QueuedOperation> {
        self.lock().clone()
    }

    /// Operations due for replay, oldest first: `Pending`, plus `Failed`
    /// ones that have not exhausted their attempts.
    pub fn list_pending(&self) -> Vec<QueuedOperation> {
        self.lock()
            .iter()
            .filter(|op| self.is_due(op))
            .cloned()
            .collect()
    }

    /// Failed operations that will not be retried automatically.
    pub fn list_dead(&self) -> Vec<QueuedOperation> {
        self.lock()
            .iter()
            .filter(|op| op.status == OperationStatus::Failed && op.attempts >= self.max_attempts)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Start a delivery attempt.
    pub fn mark_syncing(&self, id: OperationId) -> Result<QueuedOperation, QueueError> {
        self.transition(
            id,
            OperationStatus::Syncing,
            |op| matches!(op.status, OperationStatus::Pending | OperationStatus::Failed),
            |op| op.attempts = op.attempts.saturating_add(1),
        )
    }

    pub fn mark_synced(&self, id: OperationId) -> Result<QueuedOperation, QueueError> {
        self.transition(
            id,
            OperationStatus::Synced,
            |op| op.status == OperationStatus::Syncing,
            |op| {
                op.synced_at = Some(Utc::now());
                op.error = None;
            },
        )
    }

    pub fn mark_failed(
        &self,
        id: OperationId,
        error: impl Into<String>,
    ) -> Result<QueuedOperation, QueueError> {
        let error = error.into();
        self.transition(
            id,
            OperationStatus::Failed,
            |op| op.status == OperationStatus::Syncing,
            |op| op.error = Some(error),
        )
    }

    /// Move a `Syncing` operation back to `Pending` after a delivery whose
    /// outcome could not be recorded, so the next pass sends it again.
    ///
    /// Applied in memory even when the write fails: a stored `Syncing`
    /// entry already reads back as `Pending` on [`OfflineQueue::open`].
    pub fn requeue(&self, id: OperationId) -> Result<QueuedOperation, QueueError> {
        let mut current = self.lock();
        let op = current
            .iter_mut()
            .find(|op| op.id == id)
            .ok_or(QueueError::NotFound(id))?;
        if op.status != OperationStatus::Syncing {
            return Err(QueueError::InvalidTransition {
                id,
                from: op.status,
                to: OperationStatus::Pending,
            });
        }
        op.status = OperationStatus::Pending;
        let requeued = op.clone();

        let doc = PersistedQueue {
            version: QUEUE_VERSION,
            operations: current.clone(),
        };
        if let Err(err) = save_json(&self.store, OFFLINE_QUEUE_KEY, &doc) {
            tracing::warn!(
                tenant_id = %self.tenant_id,
                operation_id = %id,
                error = %err,
                "requeued operation in memory only"
            );
        }
        Ok(requeued)
    }

    /// Mark a failed operation as permanently rejected; it will not be
    /// replayed until re-armed.
    pub fn mark_rejected(
        &self,
        id: OperationId,
        error: impl Into<String>,
    ) -> Result<QueuedOperation, QueueError> {
        let error = error.into();
        let max_attempts = self.max_attempts;
        self.transition(
            id,
            OperationStatus::Failed,
            |op| op.status == OperationStatus::Syncing,
            |op| {
                op.attempts = op.attempts.max(max_attempts);
                op.error = Some(error);
            },
        )
    }

    /// Move a `Failed` operation back to `Pending` with a fresh attempt budget.
    pub fn retry_failed(&self, id: OperationId) -> Result<QueuedOperation, QueueError> {
        self.transition(
            id,
            OperationStatus::Pending,
            |op| op.status == OperationStatus::Failed,
            |op| {
                op.attempts = 0;
                op.error = None;
            },
        )
    }

    /// Re-arm every `Failed` operation. Returns how many were moved.
    pub fn retry_all_failed(&self) -> Result<usize, QueueError> {
        self.mutate(|ops| {
            let mut moved = 0;
            for op in ops.iter_mut().filter(|op| op.status == OperationStatus::Failed) {
                op.status = OperationStatus::Pending;
                op.attempts = 0;
                op.error = None;
                moved += 1;
            }
            Ok(moved)
        })
    }

    /// Drop `Synced` operations synced at least `older_than` ago.
    /// Returns how many were removed.
    pub fn clear_synced(&self, older_than: Duration) -> Result<usize, QueueError> {
        let cutoff = Utc::now() - older_than;
        let removed = self.mutate(|ops| {
            let before = ops.len();
            ops.retain(|op| {
                !(op.status == OperationStatus::Synced
                    && op.synced_at.is_some_and(|at| at <= cutoff))
            });
            Ok(before - ops.len())
        })?;

        if removed > 0 {
            tracing::debug!(tenant_id = %self.tenant_id, removed, "pruned synced operations");
        }
        Ok(removed)
    }

    fn is_due(&self, op: &QueuedOperation) -> bool {
        match op.status {
            OperationStatus::Pending => true,
            OperationStatus::Failed => op.attempts < self.max_attempts,
            OperationStatus::Syncing | OperationStatus::Synced => false,
        }
    }

    fn transition(
        &self,
        id: OperationId,
        to: OperationStatus,
        allowed: impl FnOnce(&QueuedOperation) -> bool,
        update: impl FnOnce(&mut QueuedOperation),
    ) -> Result<QueuedOperation, QueueError> {
        self.mutate(|ops| {
            let op = ops
                .iter_mut()
                .find(|op| op.id == id)
                .ok_or(QueueError::NotFound(id))?;
            if !allowed(op) {
                return Err(QueueError::InvalidTransition {
                    id,
                    from: op.status,
                    to,
                });
            }
            op.status = to;
            update(op);
            Ok(op.clone())
        })
    }

    /// Apply `f` to a copy of the queue, persist it, then publish it.
    fn mutate<R>(
        &self,
        f: impl FnOnce(&mut Vec<QueuedOperation>) -> Result<R, QueueError>,
    ) -> Result<R, QueueError> {
        let mut current = self.lock();
        let mut next = current.clone();
        let out = f(&mut next)?;

        let doc = PersistedQueue {
            version: QUEUE_VERSION,
            operations: next,
        };
        if let Err(err) = save_json(&self.store, OFFLINE_QUEUE_KEY, &doc) {
            tracing::error!(
                tenant_id = %self.tenant_id,
                error = %err,
                "failed to persist offline queue"
            );
            return Err(err.into());
        }

        *current = doc.operations;
        Ok(out)
    }

    fn lock(&self) -> MutexGuard<'_, Vec<QueuedOperation>> {
        self.operations
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use storefront_storage::InMemoryStore;

    fn queue() -> OfflineQueue<InMemoryStore> {
        OfflineQueue::open(InMemoryStore::new(), TenantId::new()).unwrap()
    }

    #[test]
    fn enqueue_persists_and_lists_fifo() {
        let q = queue();
        let a = q.enqueue("order.create", "/api/v1/orders", json!({"n": 1})).unwrap();
        let b = q.enqueue("order.create", "/api/v1/orders", json!({"n": 2})).unwrap();

        let pending: Vec<_> = q.list_pending().into_iter().map(|op| op.id).collect();
        assert_eq!(pending, vec![a.id, b.id]);

        let raw = q.store.get(OFFLINE_QUEUE_KEY).unwrap().unwrap();
        let doc: Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(doc["version"], 1);
        assert_eq!(doc["operations"][0]["status"], "pending");
        assert_eq!(doc["operations"][1]["payload"]["n"], 2);
    }

    #[test]
    fn reopen_restores_queue_and_resets_interrupted_syncs() {
        let store = std::sync::Arc::new(InMemoryStore::new());
        let tenant = TenantId::new();
        let q = OfflineQueue::open(store.clone(), tenant).unwrap();
        let op = q.enqueue("order.create", "/api/v1/orders", json!({})).unwrap();
        q.mark_syncing(op.id).unwrap();
        drop(q);

        let reopened = OfflineQueue::open(store, tenant).unwrap();
        let restored = reopened.get(op.id).unwrap();
        assert_eq!(restored.status, OperationStatus::Pending);
        assert_eq!(restored.attempts, 1);
    }

    #[test]
    fn lifecycle_pending_syncing_synced() {
        let q = queue();
        let op = q.enqueue("order.create", "/api/v1/orders", json!({})).unwrap();

        let syncing = q.mark_syncing(op.id).unwrap();
        assert_eq!(syncing.status, OperationStatus::Syncing);
        assert_eq!(syncing.attempts, 1);
        assert!(q.list_pending().is_empty());

        let synced = q.mark_synced(op.id).unwrap();
        assert_eq!(synced.status, OperationStatus::Synced);
        assert!(synced.synced_at.is_some());
    }

    #[test]
    fn failed_operations_retry_until_attempts_run_out() {
        let q = queue().with_max_attempts(2);
        let op = q.enqueue("order.create", "/api/v1/orders", json!({})).unwrap();

        q.mark_syncing(op.id).unwrap();
        let failed = q.mark_failed(op.id, "timeout").unwrap();
        assert_eq!(failed.error.as_deref(), Some("timeout"));
        assert_eq!(q.list_pending().len(), 1);

        q.mark_syncing(op.id).unwrap();
        q.mark_failed(op.id, "timeout").unwrap();
        assert!(q.list_pending().is_empty());
        assert_eq!(q.list_dead().len(), 1);

        let rearmed = q.retry_failed(op.id).unwrap();
        assert_eq!(rearmed.status, OperationStatus::Pending);
        assert_eq!(rearmed.attempts, 0);
        assert!(rearmed.error.is_none());
    }

    #[test]
    fn rejected_operations_are_dead_immediately() {
        let q = queue();
        let op = q.enqueue("order.create", "/api/v1/orders", json!({})).unwrap();
        q.mark_syncing(op.id).unwrap();
        q.mark_rejected(op.id, "422 unprocessable").unwrap();

        assert!(q.list_pending().is_empty());
        assert_eq!(q.retry_all_failed().unwrap(), 1);
        assert_eq!(q.list_pending().len(), 1);
    }

    #[test]
    fn invalid_transitions_are_rejected() {
        let q = queue();
        let op = q.enqueue("order.create", "/api/v1/orders", json!({})).unwrap();

        assert!(matches!(
            q.mark_synced(op.id),
            Err(QueueError::InvalidTransition { from: OperationStatus::Pending, to: OperationStatus::Synced, .. })
        ));
        assert!(matches!(q.retry_failed(op.id), Err(QueueError::InvalidTransition { .. })));
        assert!(matches!(
            q.mark_syncing(OperationId::new()),
            Err(QueueError::NotFound(_))
        ));
    }

    #[test]
    fn requeue_returns_syncing_operations_to_pending() {
        let q = queue();
        let op = q.enqueue("order.create", "/api/v1/orders", json!({})).unwrap();
        assert!(matches!(q.requeue(op.id), Err(QueueError::InvalidTransition { .. })));

        q.mark_syncing(op.id).unwrap();
        let requeued = q.requeue(op.id).unwrap();
        assert_eq!(requeued.status, OperationStatus::Pending);
        assert_eq!(requeued.attempts, 1);
        assert_eq!(q.list_pending().len(), 1);
    }

    #[test]
    fn clear_synced_only_removes_synced() {
        let q = queue();
        let done = q.enqueue("order.create", "/api/v1/orders", json!({})).unwrap();
        let waiting = q.enqueue("order.create", "/api/v1/orders", json!({})).unwrap();
        q.mark_syncing(done.id).unwrap();
        q.mark_synced(done.id).unwrap();

        assert_eq!(q.clear_synced(Duration::hours(1)).unwrap(), 0);
        assert_eq!(q.clear_synced(Duration::zero()).unwrap(), 1);
        assert_eq!(q.len(), 1);
        assert!(q.get(waiting.id).is_some());
    }

    #[test]
    fn failed_write_leaves_queue_unchanged() {
        let q = OfflineQueue::open(InMemoryStore::with_quota(64), TenantId::new()).unwrap();
        let err = q
            .enqueue("order.create", "/api/v1/orders", json!({"big": "x".repeat(128)}))
            .unwrap_err();
        assert!(matches!(err, QueueError::Storage(StorageError::QuotaExceeded { .. })));
        assert!(q.is_empty());
    }

    #[test]
    fn newer_document_version_is_refused() {
        let store = InMemoryStore::new();
        store
            .set(OFFLINE_QUEUE_KEY, r#"{"version": 9, "operations": []}"#)
            .unwrap();
        assert!(matches!(
            OfflineQueue::open(store, TenantId::new()),
            Err(QueueError::UnsupportedVersion { found: 9, .. })
        ));
    }
}
