use crate::error::{GlucoRsError, Result};
use chrono::{DateTime, Duration, LocalResult, NaiveDate, SecondsFormat, TimeZone};
use chrono_tz::Tz;

/// The local calendar day a report covers, as a half-open interval
/// `[start, end)` between two local midnights.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvaluationWindow {
    pub start: DateTime<Tz>,
    pub end: DateTime<Tz>,
}

impl EvaluationWindow {
    /// The full local day before `now`.
    pub fn previous_day(now: DateTime<Tz>) -> Result<Self> {
        let yesterday = now
            .date_naive()
            .pred_opt()
            .ok_or_else(|| GlucoRsError::Internal(format!("no day before {}", now)))?;
        Self::for_date(yesterday, now.timezone())
    }

    /// The window covering local `date` in `tz`.
    pub fn for_date(date: NaiveDate, tz: Tz) -> Result<Self> {
        let next = date
            .succ_opt()
            .ok_or_else(|| GlucoRsError::Internal(format!("no day after {}", date)))?;
        Ok(Self {
            start: local_midnight(date, tz)?,
            end: local_midnight(next, tz)?,
        })
    }

    pub fn start_ms(&self) -> i64 {
        self.start.timestamp_millis()
    }

    pub fn end_ms(&self) -> i64 {
        self.end.timestamp_millis()
    }

    pub fn start_iso(&self) -> String {
        self.start.to_rfc3339_opts(SecondsFormat::Secs, false)
    }

    pub fn end_iso(&self) -> String {
        self.end.to_rfc3339_opts(SecondsFormat::Secs, false)
    }

    /// Local date the window covers
    pub fn report_date(&self) -> NaiveDate {
        self.start.date_naive()
    }
}

/// Start of `date` in `tz`.
///
/// Ambiguous midnights resolve to the earlier instant; a midnight skipped by
/// a DST jump resolves to the first minute that exists.
fn local_midnight(date: NaiveDate, tz: Tz) -> Result<DateTime<Tz>> {
    let midnight = date.and_time(chrono::NaiveTime::MIN);
    match tz.from_local_datetime(&midnight) {
        LocalResult::Single(dt) => Ok(dt),
        LocalResult::Ambiguous(earliest, _) => Ok(earliest),
        LocalResult::None => (1..=180)
            .map(|minutes| midnight + Duration::minutes(minutes))
            .find_map(|candidate| tz.from_local_datetime(&candidate).earliest())
            .ok_or_else(|| {
                GlucoRsError::Internal(format!("no valid local start of day for {} in {}", date, tz))
            }),
    }
}
