//! Record store adapter.
//!
//! The cache persists through this trait and knows nothing about what sits
//! behind it. Implementations own row identity: `insert` assigns the new id.

use crate::error::Result;
use crate::types::{ColumnValues, SubscriptionId};

pub mod memory;

pub use memory::MemoryStore;

/// Durable storage for subscription rows.
///
/// Implementations must be safe to call from multiple threads; the cache
/// issues one full query at bootstrap and column deltas for every confirmed
/// mutation afterwards.
pub trait SubscriptionStore: Send + Sync + 'static {
    /// Read every stored row, used once at bootstrap.
    fn query_all(&self) -> Result<Vec<ColumnValues>>;

    /// Insert a new row and return its assigned identity.
    fn insert(&self, values: &ColumnValues) -> Result<SubscriptionId>;

    /// Apply a sparse column delta to one row, returning the number of rows
    /// that matched (0 when the row does not exist).
    fn update_by_id(&self, id: SubscriptionId, values: &ColumnValues) -> Result<usize>;
}
