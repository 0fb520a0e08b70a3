//! Reading store access: a handle bound to one verified table, plus the two
//! time-filtered scan operations the dashboard is built on.
//!
//! The store has no secondary index on time, so both operations are filtered
//! full scans paginated with a continuation key. Scans are fully
//! materializing: every page is fetched before anything is returned, and a
//! failed page abandons the whole scan so callers never observe a partial,
//! time-skewed result.

use crate::models::telemetry::{RawReadingItem, ScanPage, ScanRequest, TimeFilter};
use core::fmt;
use log::info;
use std::error::Error;
use std::fmt::{Display, Formatter};

#[derive(Debug)]
pub enum StoreError {
    /// The named table does not exist. Fatal at startup.
    TableNotFound(String),
    /// Table existence could not be verified for another reason.
    TableAccess { code: String, message: String },
    /// `start_ms > end_ms`; a caller precondition violation, raised before
    /// any provider call.
    InvalidWindow { start_ms: i64, end_ms: i64 },
    /// The scan failed mid-flight; pages already fetched were discarded.
    ScanFailed { code: String, message: String },
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::TableNotFound(table) => write!(f, "table {} not found", table),
            StoreError::TableAccess { code, message } => {
                write!(f, "table access failed ({}): {}", code, message)
            }
            StoreError::InvalidWindow { start_ms, end_ms } => {
                write!(f, "invalid window: start {} is after end {}", start_ms, end_ms)
            }
            StoreError::ScanFailed { code, message } => write!(f, "scan failed ({}): {}", code, message),
        }
    }
}

impl Error for StoreError {}

/// The two provider calls the store depends on. The seam where tests
/// substitute an in-memory table.
pub trait ScanApi {
    /// Verify `table` exists; [`StoreError::TableNotFound`] when absent.
    fn describe_table(&self, table: &str) -> Result<(), StoreError>;
    /// Fetch one page of a filtered scan with strongly consistent reads.
    fn scan_page(&self, table: &str, request: &ScanRequest) -> Result<ScanPage, StoreError>;
}

/// Per-scan observability counters. Informational only; never affects the
/// result.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ScanMetrics {
    pub items: usize,
    pub pages: usize,
    pub consumed_capacity_units: f64,
}

/// All pages of one scan, concatenated, with the metrics annotation.
#[derive(Debug, Clone, Default)]
pub struct ScanOutcome {
    pub items: Vec<RawReadingItem>,
    pub metrics: ScanMetrics,
}

pub struct ReadingStore<S: ScanApi> {
    api: S,
    table: String,
}

impl<S: ScanApi> ReadingStore<S> {
    /// Verify the table exists once, then return a handle bound to it.
    pub fn bind(api: S, table: impl Into<String>) -> Result<Self, StoreError> {
        let table = table.into();
        api.describe_table(&table)?;
        Ok(ReadingStore { api, table })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    #[cfg(test)]
    pub(crate) fn api(&self) -> &S {
        &self.api
    }

    /// All readings with `sample_time >= stop_time_ms`.
    pub fn scan_since(&self, stop_time_ms: i64) -> Result<ScanOutcome, StoreError> {
        self.scan_all(TimeFilter::Gte(stop_time_ms))
    }

    /// All readings with `sample_time` in `[start_ms, end_ms]`, both ends
    /// inclusive.
    pub fn scan_between(&self, start_ms: i64, end_ms: i64) -> Result<ScanOutcome, StoreError> {
        if start_ms > end_ms {
            return Err(StoreError::InvalidWindow { start_ms, end_ms });
        }
        self.scan_all(TimeFilter::Between(start_ms, end_ms))
    }

    fn scan_all(&self, filter: TimeFilter) -> Result<ScanOutcome, StoreError> {
        let mut request = ScanRequest::new(filter);
        let mut items = Vec::new();
        let mut metrics = ScanMetrics::default();

        loop {
            let page = self.api.scan_page(&self.table, &request)?;
            metrics.pages += 1;
            if let Some(units) = page.consumed_capacity_units {
                metrics.consumed_capacity_units += units;
            }
            items.extend(page.items);
            match page.last_evaluated_key {
                Some(key) => request.exclusive_start_key = Some(key),
                None => break,
            }
        }

        metrics.items = items.len();
        info!(
            "Scan of {} returned {} item(s) over {} page(s), consuming {} unit(s)",
            self.table, metrics.items, metrics.pages, metrics.consumed_capacity_units
        );
        Ok(ScanOutcome { items, metrics })
    }
}
