//! In-memory provider backend with synthetic readings, for running the
//! service without any cloud endpoints (`FAKE_DATA=1`).
//!
//! Generates two days of per-device samples following a rough household load
//! curve: a nightly baseline, a morning bump, and an evening peak, with
//! seeded random variation so runs are reproducible.

use crate::models::telemetry::{ListingPage, RawMeasurements, RawReadingItem, ScanKey, ScanPage, ScanRequest};
use crate::registry::{RegistryApi, RegistryError, LISTING_PAGE_SIZE};
use crate::store::{ScanApi, StoreError};
use crate::utils::now_millis;
use chrono::{TimeZone, Timelike, Utc};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::f64::consts::PI;
use std::rc::Rc;

const DEVICE_NAMES: [&str; 4] = ["plug-kitchen", "plug-office", "heatpump-cellar", "washer-basement"];
const HISTORY_HOURS: i64 = 48;
const STEP_MILLIS: i64 = 30_000;
const PAGE_SIZE: usize = 500;
const MAINS_VOLTAGE: f64 = 230.0;

/// Implements both provider seams over a fixed, pre-generated item set.
/// Cloning shares the items.
#[derive(Clone)]
pub struct FakeProvider {
    group: String,
    table: String,
    items: Rc<Vec<RawReadingItem>>,
}

impl FakeProvider {
    pub fn generate(group: impl Into<String>, table: impl Into<String>) -> Self {
        let mut rng = SmallRng::seed_from_u64(0x00de_ca0e_ea15_7a75);
        let end = now_millis();
        let start = end - HISTORY_HOURS * 3_600_000;

        let mut items = Vec::new();
        let mut ts = start;
        while ts <= end {
            for (index, device) in DEVICE_NAMES.iter().enumerate() {
                let power = device_power(&mut rng, ts, index);
                let watt_hours = power * (STEP_MILLIS as f64 / 3_600_000.0);
                items.push(RawReadingItem {
                    sample_time: Some(ts),
                    device_id: Some(device.to_string()),
                    readings: Some(RawMeasurements {
                        reading_time: Some(ts - rng.random_range(50..400)),
                        power: Some(power),
                        rms_current: Some(power / MAINS_VOLTAGE),
                        watt_hours: Some(watt_hours),
                    }),
                });
            }
            ts += STEP_MILLIS;
        }

        FakeProvider {
            group: group.into(),
            table: table.into(),
            items: Rc::new(items),
        }
    }
}

/// Wattage for one device at one instant: per-device baseline plus a daily
/// sinusoid peaking in the evening, with random jitter.
fn device_power(rng: &mut SmallRng, ts: i64, device_index: usize) -> f64 {
    let hour = Utc
        .timestamp_millis_opt(ts)
        .single()
        .map(|dt| dt.hour() as f64 + dt.minute() as f64 / 60.0)
        .unwrap_or(12.0);

    let baseline = 15.0 + 10.0 * device_index as f64;
    // Peak around 19:00, trough around 07:00.
    let daily = 60.0 * (1.0 + ((hour - 13.0) * PI / 12.0).sin()) / 2.0;
    let jitter = rng.random_range(-5.0..=5.0);
    (baseline + daily + jitter).max(0.0)
}

impl RegistryApi for FakeProvider {
    fn list_page(&self, group: &str, next_token: Option<&str>) -> Result<ListingPage, RegistryError> {
        if group != self.group {
            return Ok(ListingPage::default());
        }
        let offset = match next_token {
            None => 0,
            Some(token) => token
                .parse::<usize>()
                .map_err(|_| RegistryError::Unavailable(format!("bad continuation token: {}", token)))?,
        };
        let things: Vec<String> = DEVICE_NAMES
            .iter()
            .skip(offset)
            .take(LISTING_PAGE_SIZE as usize)
            .map(|s| s.to_string())
            .collect();
        let next = offset + things.len();
        Ok(ListingPage {
            things,
            next_token: (next < DEVICE_NAMES.len()).then(|| next.to_string()),
        })
    }
}

impl ScanApi for FakeProvider {
    fn describe_table(&self, table: &str) -> Result<(), StoreError> {
        if table == self.table {
            Ok(())
        } else {
            Err(StoreError::TableNotFound(table.to_string()))
        }
    }

    fn scan_page(&self, _table: &str, request: &ScanRequest) -> Result<ScanPage, StoreError> {
        let matching: Vec<&RawReadingItem> = self
            .items
            .iter()
            .filter(|i| i.sample_time.is_some_and(|ts| request.filter.matches(ts)))
            .collect();
        let offset = match &request.exclusive_start_key {
            None => 0,
            Some(key) => key.0["offset"].as_u64().ok_or_else(|| StoreError::ScanFailed {
                code: "decode".to_string(),
                message: "bad continuation key".to_string(),
            })? as usize,
        };

        let page: Vec<RawReadingItem> = matching.iter().skip(offset).take(PAGE_SIZE).map(|i| (*i).clone()).collect();
        let next_offset = offset + page.len();
        let last_evaluated_key = (next_offset < matching.len())
            .then(|| ScanKey(serde_json::json!({ "offset": next_offset })));
        let consumed = page_capacity_units(&page);

        Ok(ScanPage {
            count: page.len() as u64,
            items: page,
            last_evaluated_key,
            consumed_capacity_units: Some(consumed),
        })
    }
}

// Rough DynamoDB-style accounting: half a unit per 4 KB of consistent read.
fn page_capacity_units(page: &[RawReadingItem]) -> f64 {
    let bytes: usize = page.iter().map(|i| serde_json::to_string(i).map(|s| s.len()).unwrap_or(0)).sum();
    (bytes as f64 / 4096.0).max(0.5)
}
