//! Time helpers for window and calendar-day queries.
//!
//! Calendar dates are interpreted in the system-local timezone, matching the
//! dashboard's date pickers. This is the one timezone decision in the whole
//! service; every epoch-millisecond bound derives from it.

use chrono::{DateTime, Duration, Local, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};

pub const MILLIS_PER_HOUR: i64 = 3_600_000;

/// Current instant as epoch milliseconds.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Epoch-ms cutoff for a "past N hours" window ending now.
/// `past_hours = 0` yields the current instant.
pub fn past_hours_stop_millis(past_hours: u32) -> i64 {
    now_millis() - i64::from(past_hours) * MILLIS_PER_HOUR
}

/// Epoch-ms bounds of `date` in local time: its midnight and the last
/// millisecond before the next midnight.
pub fn date_bounds(date: NaiveDate) -> (i64, i64) {
    let next = date.succ_opt().expect("date within chrono range");
    (start_of_day_millis(date), start_of_day_millis(next) - 1)
}

/// Epoch-ms instant of `date`'s local midnight.
pub fn start_of_day_millis(date: NaiveDate) -> i64 {
    resolve_local(date.and_time(NaiveTime::MIN)).timestamp_millis()
}

fn resolve_local(naive: NaiveDateTime) -> DateTime<Local> {
    match Local.from_local_datetime(&naive) {
        LocalResult::Single(dt) => dt,
        // DST fold: take the earlier of the two instants.
        LocalResult::Ambiguous(earliest, _) => earliest,
        // DST gap (midnight skipped): probe forward for the first valid
        // local time on that date.
        LocalResult::None => {
            let mut probe = naive;
            loop {
                probe += Duration::minutes(15);
                match Local.from_local_datetime(&probe) {
                    LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => break dt,
                    LocalResult::None => continue,
                }
            }
        }
    }
}
