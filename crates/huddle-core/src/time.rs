//! Message time labels.

use chrono::{FixedOffset, Local, TimeZone, Timelike};

/// Formats message timestamps as 12-hour clock labels such as `오후 3:05`.
///
/// The hour has no leading zero, minutes are zero-padded, and both midnight
/// and noon render as hour 12.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeLabels {
    am: String,
    pm: String,
    offset: Option<FixedOffset>,
}

impl Default for TimeLabels {
    fn default() -> Self {
        Self {
            am: "오전".to_string(),
            pm: "오후".to_string(),
            offset: None,
        }
    }
}

impl TimeLabels {
    #[must_use]
    pub fn new(am: impl Into<String>, pm: impl Into<String>) -> Self {
        Self {
            am: am.into(),
            pm: pm.into(),
            offset: None,
        }
    }

    /// Render in a fixed UTC offset instead of the local zone.
    ///
    /// Offsets outside +-24h are ignored.
    #[must_use]
    pub fn with_utc_offset_minutes(mut self, minutes: i32) -> Self {
        self.offset = minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt);
        self
    }

    /// Label for `timestamp_millis` in the configured zone.
    ///
    /// Returns `None` if the timestamp is out of range.
    #[must_use]
    pub fn label(&self, timestamp_millis: i64) -> Option<String> {
        match self.offset {
            Some(offset) => self.label_in(timestamp_millis, &offset),
            None => self.label_in(timestamp_millis, &Local),
        }
    }

    /// Label for `timestamp_millis` in an explicit zone.
    #[must_use]
    pub fn label_in<Tz: TimeZone>(&self, timestamp_millis: i64, tz: &Tz) -> Option<String> {
        let time = tz.timestamp_millis_opt(timestamp_millis).single()?;
        let (is_pm, hour) = time.hour12();
        let marker = if is_pm { &self.pm } else { &self.am };
        Some(format!("{marker} {hour}:{:02}", time.minute()))
    }
}
