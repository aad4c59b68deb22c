//! Core types for the subscription database.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Unique identifier for a subscription row.
///
/// Valid identities are strictly positive and assigned by the record store;
/// [`SubscriptionId::INVALID`] marks a record that has not been inserted yet.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SubscriptionId(pub i64);

impl SubscriptionId {
    /// Sentinel for "no identity assigned".
    pub const INVALID: SubscriptionId = SubscriptionId(-1);

    /// Whether this identity refers to a real row.
    pub fn is_valid(self) -> bool {
        self.0 > 0
    }
}

impl Default for SubscriptionId {
    fn default() -> Self {
        SubscriptionId::INVALID
    }
}

impl fmt::Debug for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SubId({})", self.0)
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Persisted columns of the subscription table, in canonical order.
///
/// The derived `Ord` follows declaration order, which is the order deltas and
/// rows iterate in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Column {
    SubId,
    IccId,
    SlotIndex,
    DisplayName,
    CarrierName,
    NameSource,
    IconTint,
    Number,
    DataRoaming,
    Mcc,
    Mnc,
    Ehplmns,
    Hplmns,
    IsEmbedded,
    CardString,
    AccessRules,
    CarrierConfigAccessRules,
    IsOpportunistic,
    GroupUuid,
    CountryIso,
    CarrierId,
    WifiCallingEnabled,
    ApplicationsEnabled,
    RcsConfig,
    PortIndex,
    UsageSetting,
    UserId,
}

impl Column {
    /// Every persisted column, in canonical order.
    pub const ALL: &'static [Column] = &[
        Column::SubId,
        Column::IccId,
        Column::SlotIndex,
        Column::DisplayName,
        Column::CarrierName,
        Column::NameSource,
        Column::IconTint,
        Column::Number,
        Column::DataRoaming,
        Column::Mcc,
        Column::Mnc,
        Column::Ehplmns,
        Column::Hplmns,
        Column::IsEmbedded,
        Column::CardString,
        Column::AccessRules,
        Column::CarrierConfigAccessRules,
        Column::IsOpportunistic,
        Column::GroupUuid,
        Column::CountryIso,
        Column::CarrierId,
        Column::WifiCallingEnabled,
        Column::ApplicationsEnabled,
        Column::RcsConfig,
        Column::PortIndex,
        Column::UsageSetting,
        Column::UserId,
    ];

    /// Column name as it appears in the backing table.
    pub fn name(self) -> &'static str {
        match self {
            Column::SubId => "sub_id",
            Column::IccId => "icc_id",
            Column::SlotIndex => "slot_index",
            Column::DisplayName => "display_name",
            Column::CarrierName => "carrier_name",
            Column::NameSource => "name_source",
            Column::IconTint => "icon_tint",
            Column::Number => "number",
            Column::DataRoaming => "data_roaming",
            Column::Mcc => "mcc",
            Column::Mnc => "mnc",
            Column::Ehplmns => "ehplmns",
            Column::Hplmns => "hplmns",
            Column::IsEmbedded => "is_embedded",
            Column::CardString => "card_string",
            Column::AccessRules => "access_rules",
            Column::CarrierConfigAccessRules => "carrier_config_access_rules",
            Column::IsOpportunistic => "is_opportunistic",
            Column::GroupUuid => "group_uuid",
            Column::CountryIso => "country_iso",
            Column::CarrierId => "carrier_id",
            Column::WifiCallingEnabled => "wifi_calling_enabled",
            Column::ApplicationsEnabled => "applications_enabled",
            Column::RcsConfig => "rcs_config",
            Column::PortIndex => "port_index",
            Column::UsageSetting => "usage_setting",
            Column::UserId => "user_id",
        }
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single column value as stored in the backing table.
///
/// Booleans and domain enums are encoded as integers, matching the table
/// schema.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnValue {
    Integer(i64),
    Text(String),
    Blob(Vec<u8>),
}

impl ColumnValue {
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            ColumnValue::Integer(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ColumnValue::Text(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_blob(&self) -> Option<&[u8]> {
        match self {
            ColumnValue::Blob(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Debug for ColumnValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnValue::Integer(v) => write!(f, "Integer({})", v),
            ColumnValue::Text(v) => write!(f, "Text({:?})", v),
            ColumnValue::Blob(v) => write!(f, "Blob({})", hex::encode(v)),
        }
    }
}

impl From<i64> for ColumnValue {
    fn from(v: i64) -> Self {
        ColumnValue::Integer(v)
    }
}

impl From<i32> for ColumnValue {
    fn from(v: i32) -> Self {
        ColumnValue::Integer(v as i64)
    }
}

impl From<bool> for ColumnValue {
    fn from(v: bool) -> Self {
        ColumnValue::Integer(if v { 1 } else { 0 })
    }
}

impl From<&str> for ColumnValue {
    fn from(v: &str) -> Self {
        ColumnValue::Text(v.to_string())
    }
}

impl From<String> for ColumnValue {
    fn from(v: String) -> Self {
        ColumnValue::Text(v)
    }
}

impl From<&[u8]> for ColumnValue {
    fn from(v: &[u8]) -> Self {
        ColumnValue::Blob(v.to_vec())
    }
}

impl From<Vec<u8>> for ColumnValue {
    fn from(v: Vec<u8>) -> Self {
        ColumnValue::Blob(v)
    }
}

/// An ordered column-to-value map.
///
/// Used for full rows, insert payloads and sparse update deltas alike.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ColumnValues {
    values: BTreeMap<Column, ColumnValue>,
}

impl ColumnValues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a column, replacing any previous value.
    pub fn put(&mut self, column: Column, value: impl Into<ColumnValue>) {
        self.values.insert(column, value.into());
    }

    pub fn get(&self, column: Column) -> Option<&ColumnValue> {
        self.values.get(&column)
    }

    pub fn contains(&self, column: Column) -> bool {
        self.values.contains_key(&column)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate in canonical column order.
    pub fn iter(&self) -> impl Iterator<Item = (Column, &ColumnValue)> {
        self.values.iter().map(|(c, v)| (*c, v))
    }

    /// Overlay `other` onto `self`, column by column.
    pub fn merge(&mut self, other: &ColumnValues) {
        for (column, value) in other.iter() {
            self.values.insert(column, value.clone());
        }
    }
}

/// Origin of a subscription's display name.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum NameSource {
    #[default]
    Unknown,
    CarrierId,
    Sim,
    User,
    Carrier,
}

impl NameSource {
    pub fn code(self) -> i64 {
        match self {
            NameSource::Unknown => -1,
            NameSource::CarrierId => 0,
            NameSource::Sim => 1,
            NameSource::User => 2,
            NameSource::Carrier => 3,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            -1 => Some(NameSource::Unknown),
            0 => Some(NameSource::CarrierId),
            1 => Some(NameSource::Sim),
            2 => Some(NameSource::User),
            3 => Some(NameSource::Carrier),
            _ => None,
        }
    }
}

/// Data roaming policy for a subscription.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataRoaming {
    #[default]
    Disabled,
    Enabled,
}

impl DataRoaming {
    pub fn code(self) -> i64 {
        match self {
            DataRoaming::Disabled => 0,
            DataRoaming::Enabled => 1,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(DataRoaming::Disabled),
            1 => Some(DataRoaming::Enabled),
            _ => None,
        }
    }
}

/// Voice/data usage preference for a subscription.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum UsageSetting {
    #[default]
    Unknown,
    Default,
    VoiceCentric,
    DataCentric,
}

impl UsageSetting {
    pub fn code(self) -> i64 {
        match self {
            UsageSetting::Unknown => -1,
            UsageSetting::Default => 0,
            UsageSetting::VoiceCentric => 1,
            UsageSetting::DataCentric => 2,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            -1 => Some(UsageSetting::Unknown),
            0 => Some(UsageSetting::Default),
            1 => Some(UsageSetting::VoiceCentric),
            2 => Some(UsageSetting::DataCentric),
            _ => None,
        }
    }
}
