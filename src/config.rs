//! Minimal runtime configuration helpers.
//! Defaults match the dashboard deployment (2 s refresh, 24 h realtime window).

use std::time::Duration;

pub const DEFAULT_TABLE_NAME: &str = "device_energy-first";
pub const DEFAULT_THING_GROUP: &str = "device_energy_sensors";
pub const DEFAULT_POLL_SECS: u64 = 2;
pub const DEFAULT_PAST_HOURS: u32 = 24;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the device registry listing endpoint.
    pub registry_url: String,
    /// Base URL of the reading store endpoint.
    pub store_url: String,
    pub table_name: String,
    pub thing_group: String,
    /// Optional static bearer token attached to provider calls.
    pub api_token: Option<String>,
    /// Dashboard refresh cadence.
    pub poll_interval: Duration,
    /// Realtime window queried on each refresh.
    pub past_hours: u32,
    /// Upper bound on any single provider request; expiry surfaces as a
    /// failed scan.
    pub request_timeout: Duration,
    /// Serve synthetic in-memory readings instead of calling the providers.
    pub fake_data: bool,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        let fake_data = std::env::var("FAKE_DATA")
            .ok()
            .map(|s| matches!(s.as_str(), "1" | "true" | "TRUE"))
            .unwrap_or(false);

        let registry_url = match std::env::var("REGISTRY_URL") {
            Ok(v) if !v.trim().is_empty() => v.trim().to_string(),
            _ if fake_data => String::new(),
            _ => return Err("Missing REGISTRY_URL (or set FAKE_DATA=1 for synthetic data)".to_string()),
        };
        let store_url = match std::env::var("STORE_URL") {
            Ok(v) if !v.trim().is_empty() => v.trim().to_string(),
            _ if fake_data => String::new(),
            _ => return Err("Missing STORE_URL (or set FAKE_DATA=1 for synthetic data)".to_string()),
        };

        let table_name = std::env::var("TABLE_NAME")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_TABLE_NAME.to_string());
        let thing_group = std::env::var("THING_GROUP")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_THING_GROUP.to_string());

        let api_token = std::env::var("API_TOKEN").ok().filter(|s| !s.trim().is_empty());

        let poll_secs = std::env::var("POLL_INTERVAL_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_POLL_SECS);

        let past_hours = std::env::var("PAST_HOURS")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(DEFAULT_PAST_HOURS);

        let timeout_secs = std::env::var("REQUEST_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS);

        Ok(Config {
            registry_url,
            store_url,
            table_name,
            thing_group,
            api_token,
            poll_interval: Duration::from_secs(poll_secs),
            past_hours,
            request_timeout: Duration::from_secs(timeout_secs),
            fake_data,
        })
    }
}
