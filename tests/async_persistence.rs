//! Queued persistence mode: optimistic cache, ordered background writes.

use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use parking_lot::Mutex;
use simdb::{
    ChangeListener, Column, ColumnValue, ColumnValues, DatabaseConfig, InlineExecutor, MemoryStore,
    StoreError, SubscriptionDatabase, SubscriptionId, SubscriptionRecord, SubscriptionStore,
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

fn async_config() -> DatabaseConfig {
    DatabaseConfig {
        async_persistence: true,
        ..Default::default()
    }
}

fn async_db(store: Arc<dyn SubscriptionStore>) -> (SubscriptionDatabase, Receiver<String>) {
    let (listener, events) = Recording::new();
    let db = SubscriptionDatabase::new(store, async_config(), listener, Arc::new(InlineExecutor));
    (db, events)
}

/// Store whose updates block until the test opens the write gate.
struct BlockingWrites {
    inner: MemoryStore,
    write_gate: Receiver<()>,
}

impl SubscriptionStore for BlockingWrites {
    fn query_all(&self) -> simdb::Result<Vec<ColumnValues>> {
        self.inner.query_all()
    }

    fn insert(&self, values: &ColumnValues) -> simdb::Result<SubscriptionId> {
        self.inner.insert(values)
    }

    fn update_by_id(&self, id: SubscriptionId, values: &ColumnValues) -> simdb::Result<usize> {
        let _ = self.write_gate.recv();
        self.inner.update_by_id(id, values)
    }
}

/// Store that remembers the order updates arrive in.
struct OrderedStore {
    inner: MemoryStore,
    updates: Mutex<Vec<(SubscriptionId, ColumnValues)>>,
}

impl OrderedStore {
    fn new() -> Self {
        Self {
            inner: MemoryStore::new(),
            updates: Mutex::new(Vec::new()),
        }
    }
}

impl SubscriptionStore for OrderedStore {
    fn query_all(&self) -> simdb::Result<Vec<ColumnValues>> {
        self.inner.query_all()
    }

    fn insert(&self, values: &ColumnValues) -> simdb::Result<SubscriptionId> {
        self.inner.insert(values)
    }

    fn update_by_id(&self, id: SubscriptionId, values: &ColumnValues) -> simdb::Result<usize> {
        self.updates.lock().push((id, values.clone()));
        self.inner.update_by_id(id, values)
    }
}

#[test]
fn test_mutation_returns_before_write_lands() {
    let (gate_tx, gate_rx) = bounded(1);
    let store = Arc::new(BlockingWrites {
        inner: MemoryStore::new(),
        write_gate: gate_rx,
    });
    let (db, events) = async_db(Arc::clone(&store) as Arc<dyn SubscriptionStore>);
    db.flush();
    assert_eq!(events.recv().unwrap(), "loaded");

    let id = db.insert_record(SubscriptionRecord::new("8944")).unwrap();

    // The setter comes back while the store write is still stuck behind the
    // gate: cache new, row old.
    db.set_display_name(id, "optimistic").unwrap();
    assert_eq!(db.get_record(id).unwrap().display_name, "optimistic");
    assert_eq!(events.recv().unwrap(), format!("changed {}", id));
    let row = store.inner.row(id).unwrap();
    assert_eq!(row.get(Column::DisplayName), Some(&ColumnValue::from("")));

    gate_tx.send(()).unwrap();
    db.flush();
    let row = store.inner.row(id).unwrap();
    assert_eq!(row.get(Column::DisplayName), Some(&ColumnValue::from("optimistic")));
}

#[test]
fn test_queued_writes_apply_in_mutation_order() {
    let store = Arc::new(OrderedStore::new());
    let (db, _events) = async_db(Arc::clone(&store) as Arc<dyn SubscriptionStore>);
    db.flush();

    let first = db.insert_record(SubscriptionRecord::new("8944000000000000001")).unwrap();
    let second = db.insert_record(SubscriptionRecord::new("8944000000000000002")).unwrap();

    db.set_display_name(first, "a").unwrap();
    db.set_display_name(second, "b").unwrap();
    db.set_slot_index(first, 0).unwrap();
    db.set_display_name(first, "c").unwrap();
    db.set_slot_index(second, 1).unwrap();
    db.flush();

    let updates = store.updates.lock();
    let order: Vec<(SubscriptionId, Column)> = updates
        .iter()
        .map(|(id, values)| (*id, values.iter().next().unwrap().0))
        .collect();
    assert_eq!(
        order,
        vec![
            (first, Column::DisplayName),
            (second, Column::DisplayName),
            (first, Column::SlotIndex),
            (first, Column::DisplayName),
            (second, Column::SlotIndex),
        ]
    );

    // The last write for each column wins in the stored row.
    assert_eq!(
        store.inner.row(first).unwrap().get(Column::DisplayName),
        Some(&ColumnValue::from("c"))
    );
}

#[test]
fn test_insert_stays_synchronous() {
    let store = Arc::new(MemoryStore::new());
    let (db, _events) = async_db(Arc::clone(&store) as Arc<dyn SubscriptionStore>);
    db.flush();

    let id = db.insert_record(SubscriptionRecord::new("8944")).unwrap();
    // No flush: the row must already be durable.
    assert!(store.row(id).is_some());
}

#[test]
fn test_load_runs_on_the_queue() {
    let store = Arc::new(MemoryStore::new());
    store.insert(&SubscriptionRecord::new("8944").to_row()).unwrap();

    let (db, events) = async_db(Arc::clone(&store) as Arc<dyn SubscriptionStore>);
    db.flush();

    assert!(db.is_loaded());
    assert_eq!(events.recv().unwrap(), "loaded");
    assert_eq!(db.record_count(), 1);
    assert!(events.try_recv().is_err());
}

#[test]
fn test_failed_queued_write_leaves_cache_ahead() {
    struct FailingUpdates(MemoryStore);
    impl SubscriptionStore for FailingUpdates {
        fn query_all(&self) -> simdb::Result<Vec<ColumnValues>> {
            self.0.query_all()
        }
        fn insert(&self, values: &ColumnValues) -> simdb::Result<SubscriptionId> {
            self.0.insert(values)
        }
        fn update_by_id(&self, _id: SubscriptionId, _values: &ColumnValues) -> simdb::Result<usize> {
            Err(StoreError::Persistence("update refused".into()))
        }
    }

    let (db, events) = async_db(Arc::new(FailingUpdates(MemoryStore::new())));
    db.flush();
    assert_eq!(events.recv().unwrap(), "loaded");

    let id = db.insert_record(SubscriptionRecord::new("8944")).unwrap();
    db.set_display_name(id, "ahead").unwrap();
    db.flush();

    // The cache kept the optimistic value and the listener heard about it;
    // only the diagnostic log knows the write never landed.
    assert_eq!(db.get_record(id).unwrap().display_name, "ahead");
    assert_eq!(events.recv().unwrap(), format!("changed {}", id));
    assert_eq!(events.recv().unwrap(), format!("changed {}", id));

    let mut out = Vec::new();
    db.dump(&mut out).unwrap();
    assert!(String::from_utf8(out).unwrap().contains("queued write failed"));
}

#[test]
fn test_drop_drains_queued_writes() {
    let store = Arc::new(OrderedStore::new());
    {
        let (db, _events) = async_db(Arc::clone(&store) as Arc<dyn SubscriptionStore>);
        db.flush();
        let id = db.insert_record(SubscriptionRecord::new("8944")).unwrap();
        for i in 1..=10 {
            db.set_icon_tint(id, i).unwrap();
        }
    }

    assert_eq!(store.updates.lock().len(), 10);
    assert_eq!(
        store.inner.row(SubscriptionId(1)).unwrap().get(Column::IconTint),
        Some(&ColumnValue::Integer(10))
    );
}
