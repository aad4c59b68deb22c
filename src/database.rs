//! The subscription database: cache, write pipeline and bootstrap.

use crate::delta;
use crate::error::{Result, StoreError};
use crate::events::{ChangeListener, ChangeNotifier, Executor};
use crate::persist::{DirectWrite, QueuedWrite, WriteStrategy};
use crate::record::{join_plmns, SubscriptionRecord};
use crate::ring_log::RingLog;
use crate::store::SubscriptionStore;
use crate::types::{
    Column, ColumnValue, ColumnValues, DataRoaming, NameSource, SubscriptionId, UsageSetting,
};
use crate::worker::TaskQueue;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Database configuration.
#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    /// Queue durable writes on a background worker instead of blocking the
    /// mutating call. The cache is updated optimistically in this mode and
    /// the bootstrap load also runs on the worker.
    pub async_persistence: bool,

    /// Capacity of the in-memory diagnostic log.
    pub log_capacity: usize,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            async_persistence: false,
            log_capacity: 128,
        }
    }
}

/// State shared with tasks running on the background queue.
struct Shared {
    cache: RwLock<HashMap<SubscriptionId, SubscriptionRecord>>,
    loaded: AtomicBool,
    store: Arc<dyn SubscriptionStore>,
    notifier: ChangeNotifier,
    ring: Arc<RingLog>,
}

/// An in-memory cache over a persisted subscription table.
///
/// Reads are served from the cache under a shared lock and hand out clones.
/// Mutations take the single write lock, compute the minimal column delta,
/// persist it through the store adapter and only then replace the cache
/// entry. Until the bootstrap load has finished every mutation fails with
/// [`StoreError::NotReady`] while reads serve the empty cache.
pub struct SubscriptionDatabase {
    config: DatabaseConfig,
    shared: Arc<Shared>,
    writer: Box<dyn WriteStrategy>,
    queue: Option<Arc<TaskQueue>>,
}

impl SubscriptionDatabase {
    /// Create a database over `store` and start the bootstrap load.
    ///
    /// In direct mode the load completes before this returns; in queued mode
    /// it is the first task on the worker and the database comes back
    /// immediately, refusing mutations until the load lands.
    pub fn new(
        store: Arc<dyn SubscriptionStore>,
        config: DatabaseConfig,
        listener: Arc<dyn ChangeListener>,
        executor: Arc<dyn Executor>,
    ) -> Self {
        let ring = Arc::new(RingLog::new(config.log_capacity));
        let shared = Arc::new(Shared {
            cache: RwLock::new(HashMap::new()),
            loaded: AtomicBool::new(false),
            store: Arc::clone(&store),
            notifier: ChangeNotifier::new(listener, executor),
            ring: Arc::clone(&ring),
        });

        let (writer, queue): (Box<dyn WriteStrategy>, Option<Arc<TaskQueue>>) =
            if config.async_persistence {
                let queue = Arc::new(TaskQueue::new());
                let writer = QueuedWrite {
                    store,
                    ring: Arc::clone(&ring),
                    queue: Arc::clone(&queue),
                };
                (Box::new(writer), Some(queue))
            } else {
                (Box::new(DirectWrite { store, ring }), None)
            };

        let db = Self {
            config,
            shared,
            writer,
            queue,
        };
        db.shared.ring.log(format!(
            "created, async_persistence={}",
            db.config.async_persistence
        ));

        match &db.queue {
            Some(queue) => {
                let shared = Arc::clone(&db.shared);
                queue.run(move || shared.load());
            }
            None => db.shared.load(),
        }
        db
    }

    // --- Reads ---

    /// Look up one record by identity.
    pub fn get_record(&self, id: SubscriptionId) -> Option<SubscriptionRecord> {
        self.shared.cache.read().get(&id).cloned()
    }

    /// Look up the first record carrying `icc_id`.
    pub fn get_record_by_icc_id(&self, icc_id: &str) -> Option<SubscriptionRecord> {
        let cache = self.shared.cache.read();
        cache.values().find(|r| r.icc_id == icc_id).cloned()
    }

    /// Snapshot of every cached record, ordered by identity.
    pub fn get_all_records(&self) -> Vec<SubscriptionRecord> {
        let mut all: Vec<SubscriptionRecord> = {
            let cache = self.shared.cache.read();
            cache.values().cloned().collect()
        };
        all.sort_by_key(|r| r.id);
        all
    }

    pub fn record_count(&self) -> usize {
        self.shared.cache.read().len()
    }

    /// Whether the bootstrap load has completed.
    pub fn is_loaded(&self) -> bool {
        self.shared.loaded.load(Ordering::Acquire)
    }

    // --- Mutations ---

    /// Insert a record that has no identity yet.
    ///
    /// The insert always hits the store synchronously, queued mode included:
    /// the assigned identity has to come back before a cache entry can
    /// exist. Returns [`SubscriptionId::INVALID`] when the store refuses the
    /// row; the cache stays untouched and nothing is notified in that case.
    pub fn insert_record(&self, record: SubscriptionRecord) -> Result<SubscriptionId> {
        if record.id.is_valid() {
            return Err(StoreError::InvalidArgument(format!(
                "cannot insert record that already has identity {}",
                record.id
            )));
        }
        self.check_loaded()?;

        let values = delta::diff(None, &record);
        let mut cache = self.shared.cache.write();
        let id = match self.shared.store.insert(&values) {
            Ok(id) if id.is_valid() => id,
            Ok(id) => {
                drop(cache);
                tracing::error!(%id, "store assigned an unusable identity");
                self.shared
                    .ring
                    .log(format!("insert returned unusable id {}", id));
                return Ok(SubscriptionId::INVALID);
            }
            Err(err) => {
                drop(cache);
                tracing::error!(error = %err, "insert failed");
                self.shared.ring.log(format!("insert failed: {}", err));
                return Ok(SubscriptionId::INVALID);
            }
        };

        let mut stored = record;
        stored.id = id;
        cache.insert(id, stored);
        self.shared.notifier.record_changed(id);
        drop(cache);

        tracing::debug!(%id, "inserted subscription");
        self.shared.ring.log(format!("inserted sub {}", id));
        Ok(id)
    }

    /// Replace a record wholesale, persisting only the columns that differ.
    ///
    /// A record equal to the cached one is a successful no-op with no store
    /// traffic and no notification. A persistence failure is logged and
    /// swallowed; the cache keeps the old value.
    pub fn update_record(&self, record: SubscriptionRecord) -> Result<SubscriptionId> {
        self.check_loaded()?;

        let id = record.id;
        let mut cache = self.shared.cache.write();
        let old = match cache.get(&id) {
            Some(old) => old,
            None => return Err(StoreError::NotFound(id)),
        };
        if *old == record {
            tracing::trace!(%id, "update is a no-op");
            return Ok(id);
        }

        let values = delta::diff(Some(old), &record);
        let flipped = old.applications_enabled != record.applications_enabled;
        if self.writer.update(id, values) > 0 {
            cache.insert(id, record);
            self.shared.notifier.record_changed(id);
            if flipped {
                self.shared.notifier.applications_enabled_changed(id);
            }
            drop(cache);
            tracing::debug!(%id, "updated subscription");
        }
        Ok(id)
    }

    /// Generic write path for one column: compare, persist, install, notify.
    fn write_through<F>(
        &self,
        id: SubscriptionId,
        column: Column,
        value: ColumnValue,
        transform: F,
    ) -> Result<()>
    where
        F: FnOnce(&SubscriptionRecord) -> SubscriptionRecord,
    {
        self.check_loaded()?;

        let mut cache = self.shared.cache.write();
        let old = match cache.get(&id) {
            Some(old) => old,
            None => return Err(StoreError::NotFound(id)),
        };
        if old.column_value(column).as_ref() == Some(&value) {
            tracing::trace!(%id, column = column.name(), "value unchanged");
            return Ok(());
        }

        let new = transform(old);
        let mut values = ColumnValues::new();
        values.put(column, value);
        if self.writer.update(id, values) > 0 {
            cache.insert(id, new);
            self.shared.notifier.record_changed(id);
            // The equality check above already ruled out a no-op, so touching
            // this column always means the flag flipped.
            if column == Column::ApplicationsEnabled {
                self.shared.notifier.applications_enabled_changed(id);
            }
            drop(cache);
            tracing::trace!(%id, column = column.name(), "field updated");
        }
        Ok(())
    }

    // --- Per-field setters ---

    pub fn set_icc_id(&self, id: SubscriptionId, icc_id: impl Into<String>) -> Result<()> {
        let icc_id = icc_id.into();
        self.write_through(id, Column::IccId, ColumnValue::from(icc_id.as_str()), move |old| {
            let mut next = old.clone();
            next.icc_id = icc_id;
            next
        })
    }

    pub fn set_slot_index(&self, id: SubscriptionId, slot_index: i32) -> Result<()> {
        self.write_through(id, Column::SlotIndex, ColumnValue::from(slot_index), move |old| {
            let mut next = old.clone();
            next.slot_index = slot_index;
            next
        })
    }

    pub fn set_display_name(&self, id: SubscriptionId, name: impl Into<String>) -> Result<()> {
        let name = name.into();
        self.write_through(id, Column::DisplayName, ColumnValue::from(name.as_str()), move |old| {
            let mut next = old.clone();
            next.display_name = name;
            next
        })
    }

    pub fn set_carrier_name(&self, id: SubscriptionId, name: impl Into<String>) -> Result<()> {
        let name = name.into();
        self.write_through(id, Column::CarrierName, ColumnValue::from(name.as_str()), move |old| {
            let mut next = old.clone();
            next.carrier_name = name;
            next
        })
    }

    pub fn set_name_source(&self, id: SubscriptionId, source: NameSource) -> Result<()> {
        self.write_through(
            id,
            Column::NameSource,
            ColumnValue::Integer(source.code()),
            move |old| {
                let mut next = old.clone();
                next.name_source = source;
                next
            },
        )
    }

    pub fn set_icon_tint(&self, id: SubscriptionId, tint: i32) -> Result<()> {
        self.write_through(id, Column::IconTint, ColumnValue::from(tint), move |old| {
            let mut next = old.clone();
            next.icon_tint = tint;
            next
        })
    }

    pub fn set_number(&self, id: SubscriptionId, number: impl Into<String>) -> Result<()> {
        let number = number.into();
        self.write_through(id, Column::Number, ColumnValue::from(number.as_str()), move |old| {
            let mut next = old.clone();
            next.number = number;
            next
        })
    }

    pub fn set_data_roaming(&self, id: SubscriptionId, roaming: DataRoaming) -> Result<()> {
        self.write_through(
            id,
            Column::DataRoaming,
            ColumnValue::Integer(roaming.code()),
            move |old| {
                let mut next = old.clone();
                next.data_roaming = roaming;
                next
            },
        )
    }

    pub fn set_mcc(&self, id: SubscriptionId, mcc: impl Into<String>) -> Result<()> {
        let mcc = mcc.into();
        self.write_through(id, Column::Mcc, ColumnValue::from(mcc.as_str()), move |old| {
            let mut next = old.clone();
            next.mcc = mcc;
            next
        })
    }

    pub fn set_mnc(&self, id: SubscriptionId, mnc: impl Into<String>) -> Result<()> {
        let mnc = mnc.into();
        self.write_through(id, Column::Mnc, ColumnValue::from(mnc.as_str()), move |old| {
            let mut next = old.clone();
            next.mnc = mnc;
            next
        })
    }

    /// Set the equivalent home PLMNs; empty entries are dropped before the
    /// list is comma-joined for storage.
    pub fn set_ehplmns(&self, id: SubscriptionId, plmns: &[&str]) -> Result<()> {
        let joined = join_plmns(plmns);
        self.write_through(id, Column::Ehplmns, ColumnValue::from(joined.as_str()), move |old| {
            let mut next = old.clone();
            next.ehplmns = joined;
            next
        })
    }

    /// Set the home PLMNs; empty entries are dropped before the list is
    /// comma-joined for storage.
    pub fn set_hplmns(&self, id: SubscriptionId, plmns: &[&str]) -> Result<()> {
        let joined = join_plmns(plmns);
        self.write_through(id, Column::Hplmns, ColumnValue::from(joined.as_str()), move |old| {
            let mut next = old.clone();
            next.hplmns = joined;
            next
        })
    }

    pub fn set_embedded(&self, id: SubscriptionId, embedded: bool) -> Result<()> {
        self.write_through(id, Column::IsEmbedded, ColumnValue::from(embedded), move |old| {
            let mut next = old.clone();
            next.embedded = embedded;
            next
        })
    }

    pub fn set_card_string(&self, id: SubscriptionId, card_string: impl Into<String>) -> Result<()> {
        let card_string = card_string.into();
        self.write_through(
            id,
            Column::CardString,
            ColumnValue::from(card_string.as_str()),
            move |old| {
                let mut next = old.clone();
                next.card_string = card_string;
                next
            },
        )
    }

    pub fn set_access_rules(&self, id: SubscriptionId, rules: Vec<u8>) -> Result<()> {
        self.write_through(
            id,
            Column::AccessRules,
            ColumnValue::from(rules.as_slice()),
            move |old| {
                let mut next = old.clone();
                next.access_rules = rules;
                next
            },
        )
    }

    pub fn set_carrier_config_access_rules(&self, id: SubscriptionId, rules: Vec<u8>) -> Result<()> {
        self.write_through(
            id,
            Column::CarrierConfigAccessRules,
            ColumnValue::from(rules.as_slice()),
            move |old| {
                let mut next = old.clone();
                next.carrier_config_access_rules = rules;
                next
            },
        )
    }

    pub fn set_opportunistic(&self, id: SubscriptionId, opportunistic: bool) -> Result<()> {
        self.write_through(
            id,
            Column::IsOpportunistic,
            ColumnValue::from(opportunistic),
            move |old| {
                let mut next = old.clone();
                next.opportunistic = opportunistic;
                next
            },
        )
    }

    pub fn set_group_uuid(&self, id: SubscriptionId, uuid: impl Into<String>) -> Result<()> {
        let uuid = uuid.into();
        self.write_through(id, Column::GroupUuid, ColumnValue::from(uuid.as_str()), move |old| {
            let mut next = old.clone();
            next.group_uuid = uuid;
            next
        })
    }

    pub fn set_country_iso(&self, id: SubscriptionId, iso: impl Into<String>) -> Result<()> {
        let iso = iso.into();
        self.write_through(id, Column::CountryIso, ColumnValue::from(iso.as_str()), move |old| {
            let mut next = old.clone();
            next.country_iso = iso;
            next
        })
    }

    pub fn set_carrier_id(&self, id: SubscriptionId, carrier_id: i32) -> Result<()> {
        self.write_through(id, Column::CarrierId, ColumnValue::from(carrier_id), move |old| {
            let mut next = old.clone();
            next.carrier_id = carrier_id;
            next
        })
    }

    pub fn set_wifi_calling_enabled(&self, id: SubscriptionId, enabled: bool) -> Result<()> {
        self.write_through(
            id,
            Column::WifiCallingEnabled,
            ColumnValue::from(enabled),
            move |old| {
                let mut next = old.clone();
                next.wifi_calling_enabled = enabled;
                next
            },
        )
    }

    /// Set the applications-enabled flag. A confirmed flip delivers
    /// `on_applications_enabled_changed` right after the record-changed
    /// callback.
    pub fn set_applications_enabled(&self, id: SubscriptionId, enabled: bool) -> Result<()> {
        self.write_through(
            id,
            Column::ApplicationsEnabled,
            ColumnValue::from(enabled),
            move |old| {
                let mut next = old.clone();
                next.applications_enabled = enabled;
                next
            },
        )
    }

    pub fn set_rcs_config(&self, id: SubscriptionId, config: Vec<u8>) -> Result<()> {
        self.write_through(
            id,
            Column::RcsConfig,
            ColumnValue::from(config.as_slice()),
            move |old| {
                let mut next = old.clone();
                next.rcs_config = config;
                next
            },
        )
    }

    pub fn set_port_index(&self, id: SubscriptionId, port_index: i32) -> Result<()> {
        self.write_through(id, Column::PortIndex, ColumnValue::from(port_index), move |old| {
            let mut next = old.clone();
            next.port_index = port_index;
            next
        })
    }

    pub fn set_usage_setting(&self, id: SubscriptionId, setting: UsageSetting) -> Result<()> {
        self.write_through(
            id,
            Column::UsageSetting,
            ColumnValue::Integer(setting.code()),
            move |old| {
                let mut next = old.clone();
                next.usage_setting = setting;
                next
            },
        )
    }

    pub fn set_user_id(&self, id: SubscriptionId, user_id: i32) -> Result<()> {
        self.write_through(id, Column::UserId, ColumnValue::from(user_id), move |old| {
            let mut next = old.clone();
            next.user_id = user_id;
            next
        })
    }

    /// Set the runtime-resolved card id. The field has no backing column, so
    /// the write goes straight to the cache with no store call and no
    /// notification.
    pub fn set_card_id(&self, id: SubscriptionId, card_id: i32) -> Result<()> {
        self.check_loaded()?;

        let mut cache = self.shared.cache.write();
        let old = match cache.get(&id) {
            Some(old) => old,
            None => return Err(StoreError::NotFound(id)),
        };
        if old.card_id == card_id {
            return Ok(());
        }
        let mut next = old.clone();
        next.card_id = card_id;
        cache.insert(id, next);
        Ok(())
    }

    // --- Maintenance ---

    /// Block until every task queued so far (bootstrap load included) has
    /// run. A no-op in direct mode.
    pub fn flush(&self) {
        if let Some(queue) = &self.queue {
            queue.flush();
        }
    }

    /// Write mode, load state, cached records and the recent event log.
    pub fn dump<W: io::Write>(&self, out: &mut W) -> io::Result<()> {
        writeln!(out, "SubscriptionDatabase:")?;
        writeln!(
            out,
            " async_persistence={} loaded={}",
            self.config.async_persistence,
            self.is_loaded()
        )?;

        let records = self.get_all_records();
        writeln!(out, " {} records:", records.len())?;
        for record in &records {
            writeln!(out, "  {}", record)?;
        }

        writeln!(out, " log:")?;
        for line in self.shared.ring.lines() {
            writeln!(out, "  {}", line)?;
        }
        Ok(())
    }

    fn check_loaded(&self) -> Result<()> {
        if self.shared.loaded.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(StoreError::NotReady)
        }
    }
}

impl Shared {
    /// Bootstrap: read every stored row into the cache, then open the gate.
    ///
    /// Corrupt rows are skipped one by one; a failing query leaves the
    /// database unloaded and is only logged.
    fn load(&self) {
        let rows = match self.store.query_all() {
            Ok(rows) => rows,
            Err(err) => {
                tracing::error!(error = %err, "bootstrap query failed");
                self.ring.log(format!("load failed: {}", err));
                return;
            }
        };

        let mut records = Vec::with_capacity(rows.len());
        let mut skipped = 0usize;
        for row in &rows {
            match SubscriptionRecord::from_row(row) {
                Ok(record) => records.push(record),
                Err(err) => {
                    skipped += 1;
                    tracing::error!(error = %err, "skipping corrupt row");
                    self.ring.log(format!("skipped corrupt row: {}", err));
                }
            }
        }

        let count = records.len();
        {
            let mut cache = self.cache.write();
            cache.clear();
            for record in records {
                cache.insert(record.id, record);
            }
            self.loaded.store(true, Ordering::Release);
            self.notifier.database_loaded();
        }

        tracing::debug!(count, skipped, "database loaded");
        self.ring
            .log(format!("loaded {} records ({} skipped)", count, skipped));
    }
}
