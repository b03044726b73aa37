use chrono::{DateTime, Datelike, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};

/// Timestamp as carried by the timeline broadcast message
///
/// Months are zero-based (January = 0) to stay compatible with existing
/// listeners. A stamp with every field at `-1` means "no active timeline".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineStamp {
    #[serde(rename = "Day")]
    pub day: i32,
    #[serde(rename = "Month")]
    pub month: i32,
    #[serde(rename = "Year")]
    pub year: i32,
    #[serde(rename = "Hour")]
    pub hour: i32,
    #[serde(rename = "Minute")]
    pub minute: i32,
    #[serde(rename = "Second")]
    pub second: i32,
}

impl TimelineStamp {
    pub const INVALID: TimelineStamp = TimelineStamp {
        day: -1,
        month: -1,
        year: -1,
        hour: -1,
        minute: -1,
        second: -1,
    };

    pub fn from_datetime(time: DateTime<Utc>) -> Self {
        Self {
            day: time.day() as i32,
            month: time.month0() as i32,
            year: time.year(),
            hour: time.hour() as i32,
            minute: time.minute() as i32,
            second: time.second() as i32,
        }
    }

    /// Sentinel for `None`
    pub fn from_optional(time: Option<DateTime<Utc>>) -> Self {
        time.map(Self::from_datetime).unwrap_or(Self::INVALID)
    }

    pub fn is_valid(&self) -> bool {
        self.to_datetime().is_some()
    }

    /// Back to an instant; `None` for the sentinel or impossible dates
    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        let fields = [self.day, self.month, self.hour, self.minute, self.second];
        if fields.iter().any(|f| *f < 0) {
            return None;
        }
        Utc.with_ymd_and_hms(
            self.year,
            self.month as u32 + 1,
            self.day as u32,
            self.hour as u32,
            self.minute as u32,
            self.second as u32,
        )
        .single()
    }
}
