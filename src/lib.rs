//! # Subscription Database
//!
//! An in-memory, concurrently-readable cache over a persisted table of
//! SIM subscription records, with field-level delta persistence and change
//! notification.
//!
//! ## Core Concepts
//!
//! - **Cache**: One shared-lock map serving every read as a cloned value
//! - **Deltas**: Mutations persist only the columns that actually changed
//! - **Write modes**: Blocking direct writes, or an ordered background queue
//!   that updates the cache optimistically
//! - **Bootstrap**: Mutations fail `NotReady` until the initial load lands
//! - **Listeners**: Change callbacks dispatched on a caller-supplied executor
//!
//! ## Example
//!
//! ```ignore
//! use simdb::{
//!     ChangeListener, DatabaseConfig, InlineExecutor, MemoryStore,
//!     SubscriptionDatabase, SubscriptionRecord,
//! };
//! use std::sync::Arc;
//!
//! struct Watcher;
//! impl ChangeListener for Watcher {}
//!
//! let db = SubscriptionDatabase::new(
//!     Arc::new(MemoryStore::new()),
//!     DatabaseConfig::default(),
//!     Arc::new(Watcher),
//!     Arc::new(InlineExecutor),
//! );
//!
//! let id = db.insert_record(SubscriptionRecord::new("8944000000000000001"))?;
//! db.set_display_name(id, "work SIM")?;
//! ```

pub mod database;
pub mod delta;
pub mod error;
pub mod events;
mod persist;
pub mod record;
pub mod ring_log;
pub mod store;
pub mod types;
pub mod worker;

// Re-exports
pub use database::{DatabaseConfig, SubscriptionDatabase};
pub use error::{Result, StoreError};
pub use events::{ChangeListener, Executor, InlineExecutor};
pub use record::SubscriptionRecord;
pub use ring_log::RingLog;
pub use store::{MemoryStore, SubscriptionStore};
pub use types::*;
pub use worker::TaskQueue;
