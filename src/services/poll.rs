//! Steady-cadence poll loop standing in for the dashboard's refresh timer.
//!
//! A failed tick degrades to a logged warning (the dashboard renders blank),
//! it never kills the loop.

use crate::registry::RegistryApi;
use crate::services::aggregation::AggregationService;
use crate::store::ScanApi;
use log::{info, warn};
use std::thread;
use std::time::{Duration, Instant};

pub fn run_loop<S: ScanApi, R: RegistryApi>(
    service: &AggregationService<S, R>,
    group: &str,
    interval: Duration,
    past_hours: u32,
) {
    loop {
        let tick_start = Instant::now();

        if let Err(e) = tick(service, group, past_hours) {
            warn!("Refresh tick failed: {}", e);
        }

        // Maintain steady cadence
        let elapsed = tick_start.elapsed();
        if elapsed < interval {
            thread::sleep(interval - elapsed);
        }
    }
}

fn tick<S: ScanApi, R: RegistryApi>(
    service: &AggregationService<S, R>,
    group: &str,
    past_hours: u32,
) -> Result<(), String> {
    let devices = service
        .device_list(group)
        .map_err(|e| format!("device listing failed: {}", e))?;
    let readings = service
        .readings_in_past_hours(past_hours)
        .map_err(|e| format!("window query failed: {}", e))?;
    let kwh = service
        .realtime_energy_kwh(past_hours)
        .map_err(|e| format!("energy rollup failed: {}", e))?;

    info!(
        "Refresh: {} device(s), {} reading(s) in past {}h ({} skipped), {:.3} kWh",
        devices.len(),
        readings.rows.len(),
        past_hours,
        readings.skipped,
        kwh
    );
    Ok(())
}
