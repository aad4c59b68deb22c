//! The immutable subscription record value.

use crate::error::{Result, StoreError};
use crate::types::{
    Column, ColumnValue, ColumnValues, DataRoaming, NameSource, SubscriptionId, UsageSetting,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One subscription as cached in memory.
///
/// A record is treated as an immutable value: mutations derive a new record
/// from the old one and replace the cache entry wholesale. All reads hand out
/// clones.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionRecord {
    /// Row identity. Assigned by the store on insert, never by the cache.
    pub id: SubscriptionId,
    /// ICC id of the SIM, the secondary lookup key.
    pub icc_id: String,
    /// Logical slot the SIM sits in, -1 when not inserted.
    pub slot_index: i32,
    pub display_name: String,
    pub carrier_name: String,
    pub name_source: NameSource,
    pub icon_tint: i32,
    pub number: String,
    pub data_roaming: DataRoaming,
    pub mcc: String,
    pub mnc: String,
    /// Equivalent home PLMNs, comma-joined.
    pub ehplmns: String,
    /// Home PLMNs, comma-joined.
    pub hplmns: String,
    pub embedded: bool,
    pub card_string: String,
    pub access_rules: Vec<u8>,
    pub carrier_config_access_rules: Vec<u8>,
    pub opportunistic: bool,
    pub group_uuid: String,
    pub country_iso: String,
    pub carrier_id: i32,
    pub wifi_calling_enabled: bool,
    /// Whether the SIM applications are enabled. Changes to this field fire
    /// their own listener callback in addition to the record-changed one.
    pub applications_enabled: bool,
    pub rcs_config: Vec<u8>,
    pub port_index: i32,
    pub usage_setting: UsageSetting,
    pub user_id: i32,
    /// Card id resolved at runtime. Cache-only: this field has no backing
    /// column and is never persisted.
    pub card_id: i32,
}

impl Default for SubscriptionRecord {
    fn default() -> Self {
        Self {
            id: SubscriptionId::INVALID,
            icc_id: String::new(),
            slot_index: -1,
            display_name: String::new(),
            carrier_name: String::new(),
            name_source: NameSource::Unknown,
            icon_tint: 0,
            number: String::new(),
            data_roaming: DataRoaming::Disabled,
            mcc: String::new(),
            mnc: String::new(),
            ehplmns: String::new(),
            hplmns: String::new(),
            embedded: false,
            card_string: String::new(),
            access_rules: Vec::new(),
            carrier_config_access_rules: Vec::new(),
            opportunistic: false,
            group_uuid: String::new(),
            country_iso: String::new(),
            carrier_id: -1,
            wifi_calling_enabled: false,
            applications_enabled: true,
            rcs_config: Vec::new(),
            port_index: 0,
            usage_setting: UsageSetting::Unknown,
            user_id: -1,
            card_id: -1,
        }
    }
}

impl SubscriptionRecord {
    /// A fresh record with no identity, ready to be inserted.
    pub fn new(icc_id: impl Into<String>) -> Self {
        Self {
            icc_id: icc_id.into(),
            ..Default::default()
        }
    }

    /// Encoded value of one column, or `None` for the key column while the
    /// record has no identity. The cache-only card id has no column and is
    /// never asked for here.
    pub fn column_value(&self, column: Column) -> Option<ColumnValue> {
        let value = match column {
            Column::SubId => {
                if !self.id.is_valid() {
                    return None;
                }
                ColumnValue::Integer(self.id.0)
            }
            Column::IccId => ColumnValue::from(self.icc_id.as_str()),
            Column::SlotIndex => ColumnValue::from(self.slot_index),
            Column::DisplayName => ColumnValue::from(self.display_name.as_str()),
            Column::CarrierName => ColumnValue::from(self.carrier_name.as_str()),
            Column::NameSource => ColumnValue::Integer(self.name_source.code()),
            Column::IconTint => ColumnValue::from(self.icon_tint),
            Column::Number => ColumnValue::from(self.number.as_str()),
            Column::DataRoaming => ColumnValue::Integer(self.data_roaming.code()),
            Column::Mcc => ColumnValue::from(self.mcc.as_str()),
            Column::Mnc => ColumnValue::from(self.mnc.as_str()),
            Column::Ehplmns => ColumnValue::from(self.ehplmns.as_str()),
            Column::Hplmns => ColumnValue::from(self.hplmns.as_str()),
            Column::IsEmbedded => ColumnValue::from(self.embedded),
            Column::CardString => ColumnValue::from(self.card_string.as_str()),
            Column::AccessRules => ColumnValue::from(self.access_rules.as_slice()),
            Column::CarrierConfigAccessRules => {
                ColumnValue::from(self.carrier_config_access_rules.as_slice())
            }
            Column::IsOpportunistic => ColumnValue::from(self.opportunistic),
            Column::GroupUuid => ColumnValue::from(self.group_uuid.as_str()),
            Column::CountryIso => ColumnValue::from(self.country_iso.as_str()),
            Column::CarrierId => ColumnValue::from(self.carrier_id),
            Column::WifiCallingEnabled => ColumnValue::from(self.wifi_calling_enabled),
            Column::ApplicationsEnabled => ColumnValue::from(self.applications_enabled),
            Column::RcsConfig => ColumnValue::from(self.rcs_config.as_slice()),
            Column::PortIndex => ColumnValue::from(self.port_index),
            Column::UsageSetting => ColumnValue::Integer(self.usage_setting.code()),
            Column::UserId => ColumnValue::from(self.user_id),
        };
        Some(value)
    }

    /// Full encoded row, every column that has a present value.
    pub fn to_row(&self) -> ColumnValues {
        let mut row = ColumnValues::new();
        for &column in Column::ALL {
            if let Some(value) = self.column_value(column) {
                row.put(column, value);
            }
        }
        row
    }

    /// Decode a stored row. Missing columns keep their defaults; a missing or
    /// invalid key column and type or code mismatches are corruption.
    pub fn from_row(values: &ColumnValues) -> Result<Self> {
        let id = match int_field(values, Column::SubId)? {
            Some(raw) if SubscriptionId(raw).is_valid() => SubscriptionId(raw),
            _ => return Err(StoreError::Corrupt("row has no valid sub_id".into())),
        };

        let mut record = SubscriptionRecord {
            id,
            ..Default::default()
        };
        if let Some(v) = text_field(values, Column::IccId)? {
            record.icc_id = v;
        }
        if let Some(v) = int_field(values, Column::SlotIndex)? {
            record.slot_index = v as i32;
        }
        if let Some(v) = text_field(values, Column::DisplayName)? {
            record.display_name = v;
        }
        if let Some(v) = text_field(values, Column::CarrierName)? {
            record.carrier_name = v;
        }
        if let Some(v) = code_field(values, Column::NameSource, NameSource::from_code)? {
            record.name_source = v;
        }
        if let Some(v) = int_field(values, Column::IconTint)? {
            record.icon_tint = v as i32;
        }
        if let Some(v) = text_field(values, Column::Number)? {
            record.number = v;
        }
        if let Some(v) = code_field(values, Column::DataRoaming, DataRoaming::from_code)? {
            record.data_roaming = v;
        }
        if let Some(v) = text_field(values, Column::Mcc)? {
            record.mcc = v;
        }
        if let Some(v) = text_field(values, Column::Mnc)? {
            record.mnc = v;
        }
        if let Some(v) = text_field(values, Column::Ehplmns)? {
            record.ehplmns = v;
        }
        if let Some(v) = text_field(values, Column::Hplmns)? {
            record.hplmns = v;
        }
        if let Some(v) = bool_field(values, Column::IsEmbedded)? {
            record.embedded = v;
        }
        if let Some(v) = text_field(values, Column::CardString)? {
            record.card_string = v;
        }
        if let Some(v) = blob_field(values, Column::AccessRules)? {
            record.access_rules = v;
        }
        if let Some(v) = blob_field(values, Column::CarrierConfigAccessRules)? {
            record.carrier_config_access_rules = v;
        }
        if let Some(v) = bool_field(values, Column::IsOpportunistic)? {
            record.opportunistic = v;
        }
        if let Some(v) = text_field(values, Column::GroupUuid)? {
            record.group_uuid = v;
        }
        if let Some(v) = text_field(values, Column::CountryIso)? {
            record.country_iso = v;
        }
        if let Some(v) = int_field(values, Column::CarrierId)? {
            record.carrier_id = v as i32;
        }
        if let Some(v) = bool_field(values, Column::WifiCallingEnabled)? {
            record.wifi_calling_enabled = v;
        }
        if let Some(v) = bool_field(values, Column::ApplicationsEnabled)? {
            record.applications_enabled = v;
        }
        if let Some(v) = blob_field(values, Column::RcsConfig)? {
            record.rcs_config = v;
        }
        if let Some(v) = int_field(values, Column::PortIndex)? {
            record.port_index = v as i32;
        }
        if let Some(v) = code_field(values, Column::UsageSetting, UsageSetting::from_code)? {
            record.usage_setting = v;
        }
        if let Some(v) = int_field(values, Column::UserId)? {
            record.user_id = v as i32;
        }
        Ok(record)
    }

    /// Equivalent home PLMNs as a list.
    pub fn ehplmn_list(&self) -> Vec<&str> {
        split_plmns(&self.ehplmns)
    }

    /// Home PLMNs as a list.
    pub fn hplmn_list(&self) -> Vec<&str> {
        split_plmns(&self.hplmns)
    }

    /// Encode the full in-memory record as JSON, runtime-only fields
    /// included. Meant for export and diagnostics, not for the store.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode a record written by [`SubscriptionRecord::to_json`].
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

impl fmt::Display for SubscriptionRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "sub {} slot {} port {} icc {:?} name {:?} carrier_id {} apps_enabled {}",
            self.id,
            self.slot_index,
            self.port_index,
            self.icc_id,
            self.display_name,
            self.carrier_id,
            self.applications_enabled,
        )
    }
}

/// Comma-join a PLMN list, dropping empty entries.
pub(crate) fn join_plmns(plmns: &[&str]) -> String {
    plmns
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(",")
}

fn split_plmns(joined: &str) -> Vec<&str> {
    joined.split(',').filter(|p| !p.is_empty()).collect()
}

fn int_field(values: &ColumnValues, column: Column) -> Result<Option<i64>> {
    match values.get(column) {
        None => Ok(None),
        Some(v) => v
            .as_integer()
            .map(Some)
            .ok_or_else(|| StoreError::Corrupt(format!("{} is not an integer", column.name()))),
    }
}

fn text_field(values: &ColumnValues, column: Column) -> Result<Option<String>> {
    match values.get(column) {
        None => Ok(None),
        Some(v) => v
            .as_text()
            .map(|s| Some(s.to_string()))
            .ok_or_else(|| StoreError::Corrupt(format!("{} is not text", column.name()))),
    }
}

fn blob_field(values: &ColumnValues, column: Column) -> Result<Option<Vec<u8>>> {
    match values.get(column) {
        None => Ok(None),
        Some(v) => v
            .as_blob()
            .map(|b| Some(b.to_vec()))
            .ok_or_else(|| StoreError::Corrupt(format!("{} is not a blob", column.name()))),
    }
}

fn bool_field(values: &ColumnValues, column: Column) -> Result<Option<bool>> {
    Ok(int_field(values, column)?.map(|v| v != 0))
}

fn code_field<T>(
    values: &ColumnValues,
    column: Column,
    decode: fn(i64) -> Option<T>,
) -> Result<Option<T>> {
    match int_field(values, column)? {
        None => Ok(None),
        Some(raw) => decode(raw)
            .map(Some)
            .ok_or_else(|| StoreError::Corrupt(format!("bad {} code: {}", column.name(), raw))),
    }
}
