//! Wire and row types for the two provider calls (registry listing, table
//! scan) and the normalized reading row the dashboard renders.
//!
//! Notes
//! - Wire types keep every field optional: the store is schemaless and a
//!   malformed item must never fail a whole page. Normalization into
//!   [`Reading`] is where missing fields are rejected.
//! - Timestamps are integer epoch milliseconds throughout.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Fields requested from the store on every scan. Bounds payload size to
/// what the dashboard actually renders.
pub const SCAN_PROJECTION: [&str; 6] = [
    "sample_time",
    "device_id",
    "readings.reading_time",
    "readings.power",
    "readings.rms_current",
    "readings.watt_hours",
];

/// Continuation key returned by the store's scan call. Opaque: round-tripped
/// back as `exclusiveStartKey` without inspection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScanKey(pub Value);

/// One page of the registry listing call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingPage {
    #[serde(default)]
    pub things: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_token: Option<String>,
}

/// Inclusive time predicate over `sample_time`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TimeFilter {
    /// `sample_time >= stop`
    Gte(i64),
    /// `start <= sample_time <= end`
    Between(i64, i64),
}

impl TimeFilter {
    pub fn matches(&self, sample_time: i64) -> bool {
        match *self {
            TimeFilter::Gte(stop) => sample_time >= stop,
            TimeFilter::Between(start, end) => sample_time >= start && sample_time <= end,
        }
    }
}

/// Body of the store scan call. One request is reused across pages with only
/// `exclusive_start_key` advancing.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanRequest {
    pub filter: TimeFilter,
    pub projection: &'static [&'static str],
    pub consistent_read: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exclusive_start_key: Option<ScanKey>,
}

impl ScanRequest {
    pub fn new(filter: TimeFilter) -> Self {
        ScanRequest {
            filter,
            projection: &SCAN_PROJECTION,
            consistent_read: true,
            exclusive_start_key: None,
        }
    }
}

/// One page of the store scan call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanPage {
    #[serde(default)]
    pub items: Vec<RawReadingItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_evaluated_key: Option<ScanKey>,
    #[serde(default)]
    pub count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consumed_capacity_units: Option<f64>,
}

/// A reading item as stored: `sample_time` and `device_id` at the top level,
/// measurements nested under a `readings` group.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawReadingItem {
    #[serde(default, deserialize_with = "lenient_millis")]
    pub sample_time: Option<i64>,
    #[serde(default)]
    pub device_id: Option<String>,
    #[serde(default)]
    pub readings: Option<RawMeasurements>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawMeasurements {
    #[serde(default, deserialize_with = "lenient_millis")]
    pub reading_time: Option<i64>,
    #[serde(default)]
    pub power: Option<f64>,
    #[serde(default)]
    pub rms_current: Option<f64>,
    #[serde(default)]
    pub watt_hours: Option<f64>,
}

/// Decode an epoch-millisecond field, yielding `None` for absent or
/// non-integer values instead of failing the surrounding item.
fn lenient_millis<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(Value::as_i64))
}

/// Normalized reading row: measurement fields promoted to top level, the
/// `readings.` prefix stripped.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reading {
    pub device_id: String,
    pub sample_time: i64,
    pub reading_time: i64,
    pub power: f64,
    pub rms_current: f64,
    pub watt_hours: f64,
}

impl Reading {
    /// Flatten a wire item into a row. `None` when any required field is
    /// absent; the item is unusable for windowing or rollups.
    pub fn from_raw(item: &RawReadingItem) -> Option<Reading> {
        let measurements = item.readings.as_ref()?;
        Some(Reading {
            device_id: item.device_id.clone()?,
            sample_time: item.sample_time?,
            reading_time: measurements.reading_time?,
            power: measurements.power?,
            rms_current: measurements.rms_current?,
            watt_hours: measurements.watt_hours?,
        })
    }
}
