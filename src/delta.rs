//! Minimal field-level delta computation.

use crate::record::SubscriptionRecord;
use crate::types::{Column, ColumnValues};

/// Compute the columns that must be written to move the stored row from
/// `old` to `new`.
///
/// With a prior record this is exactly the columns whose encoded values
/// differ; without one it is the full encoded row. Pure, no locking, no I/O.
pub fn diff(old: Option<&SubscriptionRecord>, new: &SubscriptionRecord) -> ColumnValues {
    let mut delta = ColumnValues::new();
    for &column in Column::ALL {
        let next = match new.column_value(column) {
            Some(value) => value,
            None => continue,
        };
        let changed = match old {
            Some(prev) => prev.column_value(column).as_ref() != Some(&next),
            None => true,
        };
        if changed {
            delta.put(column, next);
        }
    }
    delta
}
