//! Model run timestamp resolution
//!
//! Works out which model run to download: either an explicit `YYYYMMDDHH` run
//! given by the user, or the most recent run that should already be published,
//! derived from the model's publication delay and run interval.

use chrono::{DateTime, Duration, TimeZone, Timelike, Utc};

use crate::constants::runs::RUN_TIMESTAMP_LEN;
use crate::errors::{RequestError, RequestResult};

/// Source of the current time
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock frozen at a given instant, for tests and reproducible runs
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Resolve the model run to download
///
/// With an explicit run, it must be exactly ten ASCII digits forming a valid
/// UTC date and hour. Without one, the latest run published at
/// `clock.now() - publication_delay_minutes` is returned, with the hour floored
/// to a multiple of `run_interval_hours`.
pub fn resolve_run_timestamp(
    explicit_run: Option<&str>,
    publication_delay_minutes: u32,
    run_interval_hours: u32,
    clock: &dyn Clock,
) -> RequestResult<DateTime<Utc>> {
    if let Some(value) = explicit_run {
        return parse_run_timestamp(value);
    }

    if run_interval_hours == 0 {
        return Err(RequestError::InvalidRunInterval {
            hours: run_interval_hours,
        });
    }

    let available = clock.now() - Duration::minutes(i64::from(publication_delay_minutes));
    let hour = available.hour() - available.hour() % run_interval_hours;

    available
        .date_naive()
        .and_hms_opt(hour, 0, 0)
        .map(|naive| Utc.from_utc_datetime(&naive))
        .ok_or_else(|| RequestError::InvalidTimestampFormat {
            value: available.to_rfc3339(),
        })
}

/// Parse an explicit `YYYYMMDDHH` run
pub fn parse_run_timestamp(value: &str) -> RequestResult<DateTime<Utc>> {
    let invalid = || RequestError::InvalidTimestampFormat {
        value: value.to_string(),
    };

    if value.len() != RUN_TIMESTAMP_LEN || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }

    // All ASCII digits, so byte slicing is safe
    let number = |range: std::ops::Range<usize>| {
        value[range].parse::<u32>().map_err(|_| invalid())
    };
    let year = number(0..4)? as i32;
    let month = number(4..6)?;
    let day = number(6..8)?;
    let hour = number(8..10)?;

    Utc.with_ymd_and_hms(year, month, day, hour, 0, 0)
        .single()
        .ok_or_else(invalid)
}

/// Format a run as `YYYYMMDDHH`
pub fn format_run_timestamp(run: DateTime<Utc>) -> String {
    run.format("%Y%m%d%H").to_string()
}
