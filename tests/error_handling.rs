//! Error handling and edge case tests.

use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use simdb::{
    ChangeListener, ColumnValues, DatabaseConfig, InlineExecutor, MemoryStore, StoreError,
    SubscriptionDatabase, SubscriptionId, SubscriptionRecord, SubscriptionStore,
};
use std::sync::Arc;

struct Recording {
    events: Sender<String>,
}

impl Recording {
    fn new() -> (Arc<Self>, Receiver<String>) {
        let (tx, rx) = unbounded();
        (Arc::new(Self { events: tx }), rx)
    }
}

impl ChangeListener for Recording {
    fn on_database_loaded(&self) {
        let _ = self.events.send("loaded".into());
    }

    fn on_record_changed(&self, id: SubscriptionId) {
        let _ = self.events.send(format!("changed {}", id));
    }
}

/// Store whose bootstrap query blocks until the test opens the gate.
struct GatedStore {
    inner: MemoryStore,
    gate: Receiver<()>,
}

impl SubscriptionStore for GatedStore {
    fn query_all(&self) -> simdb::Result<Vec<ColumnValues>> {
        let _ = self.gate.recv();
        self.inner.query_all()
    }

    fn insert(&self, values: &ColumnValues) -> simdb::Result<SubscriptionId> {
        self.inner.insert(values)
    }

    fn update_by_id(&self, id: SubscriptionId, values: &ColumnValues) -> simdb::Result<usize> {
        self.inner.update_by_id(id, values)
    }
}

struct FailingStore;

impl SubscriptionStore for FailingStore {
    fn query_all(&self) -> simdb::Result<Vec<ColumnValues>> {
        Err(StoreError::Persistence("query refused".into()))
    }

    fn insert(&self, _values: &ColumnValues) -> simdb::Result<SubscriptionId> {
        Err(StoreError::Persistence("insert refused".into()))
    }

    fn update_by_id(&self, _id: SubscriptionId, _values: &ColumnValues) -> simdb::Result<usize> {
        Err(StoreError::Persistence("update refused".into()))
    }
}

fn async_config() -> DatabaseConfig {
    DatabaseConfig {
        async_persistence: true,
        ..Default::default()
    }
}

// --- Bootstrap gating ---

#[test]
fn test_mutations_fail_until_loaded() {
    let (gate_tx, gate_rx) = bounded(1);
    let store = Arc::new(GatedStore {
        inner: MemoryStore::new(),
        gate: gate_rx,
    });
    let (listener, events) = Recording::new();
    let db = SubscriptionDatabase::new(store, async_config(), listener, Arc::new(InlineExecutor));

    // The load is stuck behind the gate: reads serve the empty cache and
    // every mutation shape is refused.
    assert!(!db.is_loaded());
    assert_eq!(db.record_count(), 0);
    assert!(db.get_record(SubscriptionId(1)).is_none());
    assert!(db.get_record_by_icc_id("8944").is_none());

    let insert = db.insert_record(SubscriptionRecord::new("8944"));
    assert!(matches!(insert, Err(StoreError::NotReady)));

    let mut update = SubscriptionRecord::new("8944");
    update.id = SubscriptionId(1);
    assert!(matches!(db.update_record(update), Err(StoreError::NotReady)));
    assert!(matches!(
        db.set_display_name(SubscriptionId(1), "x"),
        Err(StoreError::NotReady)
    ));
    assert!(matches!(
        db.set_card_id(SubscriptionId(1), 2),
        Err(StoreError::NotReady)
    ));
    assert!(events.try_recv().is_err());

    // Open the gate and wait for the load to land.
    gate_tx.send(()).unwrap();
    db.flush();

    assert!(db.is_loaded());
    assert_eq!(events.recv().unwrap(), "loaded");
    assert!(db.insert_record(SubscriptionRecord::new("8944")).unwrap().is_valid());
}

#[test]
fn test_failed_bootstrap_keeps_gate_shut() {
    let (listener, events) = Recording::new();
    let db = SubscriptionDatabase::new(
        Arc::new(FailingStore),
        DatabaseConfig::default(),
        listener,
        Arc::new(InlineExecutor),
    );

    assert!(!db.is_loaded());
    assert!(events.try_recv().is_err());
    assert!(matches!(
        db.insert_record(SubscriptionRecord::new("8944")),
        Err(StoreError::NotReady)
    ));

    let mut out = Vec::new();
    db.dump(&mut out).unwrap();
    assert!(String::from_utf8(out).unwrap().contains("load failed"));
}

// --- Argument and lookup errors ---

#[test]
fn test_insert_with_identity_is_invalid_argument() {
    let (listener, _events) = Recording::new();
    let db = SubscriptionDatabase::new(
        Arc::new(MemoryStore::new()),
        DatabaseConfig::default(),
        listener,
        Arc::new(InlineExecutor),
    );

    let mut record = SubscriptionRecord::new("8944");
    record.id = SubscriptionId(3);
    assert!(matches!(
        db.insert_record(record),
        Err(StoreError::InvalidArgument(_))
    ));
}

#[test]
fn test_unknown_identity_is_not_found() {
    let (listener, _events) = Recording::new();
    let db = SubscriptionDatabase::new(
        Arc::new(MemoryStore::new()),
        DatabaseConfig::default(),
        listener,
        Arc::new(InlineExecutor),
    );

    assert!(matches!(
        db.set_display_name(SubscriptionId(9), "x"),
        Err(StoreError::NotFound(id)) if id == SubscriptionId(9)
    ));
    assert!(matches!(
        db.set_card_id(SubscriptionId::INVALID, 1),
        Err(StoreError::NotFound(_))
    ));

    let mut record = SubscriptionRecord::new("8944");
    record.id = SubscriptionId(9);
    assert!(matches!(
        db.update_record(record),
        Err(StoreError::NotFound(_))
    ));
}

// --- Persistence failures are sentinels, not errors ---

#[test]
fn test_rejected_insert_returns_invalid_id() {
    // Loads fine (empty), then refuses every write.
    struct LoadsEmptyFailsWrites;
    impl SubscriptionStore for LoadsEmptyFailsWrites {
        fn query_all(&self) -> simdb::Result<Vec<ColumnValues>> {
            Ok(Vec::new())
        }
        fn insert(&self, _values: &ColumnValues) -> simdb::Result<SubscriptionId> {
            Err(StoreError::Persistence("insert refused".into()))
        }
        fn update_by_id(&self, _id: SubscriptionId, _values: &ColumnValues) -> simdb::Result<usize> {
            Err(StoreError::Persistence("update refused".into()))
        }
    }

    let (listener, events) = Recording::new();
    let db = SubscriptionDatabase::new(
        Arc::new(LoadsEmptyFailsWrites),
        DatabaseConfig::default(),
        listener,
        Arc::new(InlineExecutor),
    );
    assert_eq!(events.recv().unwrap(), "loaded");

    let id = db.insert_record(SubscriptionRecord::new("8944")).unwrap();
    assert_eq!(id, SubscriptionId::INVALID);
    assert_eq!(db.record_count(), 0);
    assert!(events.try_recv().is_err());

    let mut out = Vec::new();
    db.dump(&mut out).unwrap();
    assert!(String::from_utf8(out).unwrap().contains("insert failed"));
}

#[test]
fn test_corrupt_rows_do_not_block_the_rest() {
    let store = Arc::new(MemoryStore::new());
    store
        .insert(&SubscriptionRecord::new("8944000000000000001").to_row())
        .unwrap();
    let mut bad = ColumnValues::new();
    bad.put(simdb::Column::IccId, 12345i64); // text column holding an integer
    store.insert(&bad).unwrap();
    store
        .insert(&SubscriptionRecord::new("8944000000000000003").to_row())
        .unwrap();

    let (listener, events) = Recording::new();
    let db = SubscriptionDatabase::new(
        Arc::clone(&store) as Arc<dyn SubscriptionStore>,
        DatabaseConfig::default(),
        listener,
        Arc::new(InlineExecutor),
    );

    assert_eq!(events.recv().unwrap(), "loaded");
    assert_eq!(db.record_count(), 2);
    assert!(db.get_record_by_icc_id("8944000000000000003").is_some());
}
