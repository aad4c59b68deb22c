//! Durable-write strategies.

use crate::ring_log::RingLog;
use crate::store::SubscriptionStore;
use crate::types::{ColumnValues, SubscriptionId};
use crate::worker::TaskQueue;
use std::sync::Arc;

/// How confirmed mutations reach the store.
///
/// Chosen once at construction. `update` returns the affected-row count the
/// cache acts on; store failures surface as 0, never as a panic.
pub(crate) trait WriteStrategy: Send + Sync {
    fn update(&self, id: SubscriptionId, values: ColumnValues) -> usize;
}

/// Blocks the mutating call until the store confirms the write.
pub(crate) struct DirectWrite {
    pub(crate) store: Arc<dyn SubscriptionStore>,
    pub(crate) ring: Arc<RingLog>,
}

impl WriteStrategy for DirectWrite {
    fn update(&self, id: SubscriptionId, values: ColumnValues) -> usize {
        match self.store.update_by_id(id, &values) {
            Ok(count) => count,
            Err(err) => {
                tracing::error!(%id, error = %err, "durable write failed");
                self.ring.log(format!("write failed for sub {}: {}", id, err));
                0
            }
        }
    }
}

/// Hands the write to the background queue and reports success immediately.
///
/// The cache runs ahead of the store in this mode. A write that fails once it
/// lands leaves the two divergent; the failure is logged and nothing is
/// rolled back.
pub(crate) struct QueuedWrite {
    pub(crate) store: Arc<dyn SubscriptionStore>,
    pub(crate) ring: Arc<RingLog>,
    pub(crate) queue: Arc<TaskQueue>,
}

impl WriteStrategy for QueuedWrite {
    fn update(&self, id: SubscriptionId, values: ColumnValues) -> usize {
        let store = Arc::clone(&self.store);
        let ring = Arc::clone(&self.ring);
        self.queue.run(move || match store.update_by_id(id, &values) {
            Ok(0) => {
                tracing::error!(%id, "queued write matched no row");
                ring.log(format!("queued write matched no row for sub {}", id));
            }
            Ok(_) => {}
            Err(err) => {
                tracing::error!(%id, error = %err, "queued write failed");
                ring.log(format!("queued write failed for sub {}: {}", id, err));
            }
        });
        1
    }
}
