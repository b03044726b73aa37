//! Reference time formatting

use chrono::{DateTime, FixedOffset, Local, Offset, Utc};

/// Zone in which a reference time is rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DisplayZone {
    #[default]
    Utc,
    /// System local time
    Local,
    /// An explicit offset, mostly useful for tests and remote consumers
    Fixed(FixedOffset),
}

impl DisplayZone {
    /// Offset of this zone at the given instant
    pub fn offset_at(&self, time: DateTime<Utc>) -> FixedOffset {
        match self {
            DisplayZone::Utc => Utc.fix(),
            DisplayZone::Local => time.with_timezone(&Local).offset().fix(),
            DisplayZone::Fixed(offset) => *offset,
        }
    }
}

const WEEKDAY_DATE_TIME: &str = "%a %m/%d/%Y %H:%M";

/// `2021-12-15 10:00 UTC`
pub fn format_compact_utc(time: DateTime<Utc>) -> String {
    time.format("%Y-%m-%d %H:%M UTC").to_string()
}

/// Weekday, date and hour-minute in the requested zone
///
/// Reference times are stored as UTC. For anything but [`DisplayZone::Utc`]
/// the instant is moved into the target offset first and a zone qualifier is
/// appended, e.g. `Wed 12/15/2021 12:00 UTC+02:00`.
pub fn format_time(time: DateTime<Utc>, zone: DisplayZone) -> String {
    match zone {
        DisplayZone::Utc => time.format(WEEKDAY_DATE_TIME).to_string(),
        zone => {
            let offset = zone.offset_at(time);
            let shifted = time.with_timezone(&offset);
            format!("{} {}", shifted.format(WEEKDAY_DATE_TIME), zone_qualifier(offset))
        }
    }
}

/// `UTC` for a zero offset, `UTC+hh:mm` / `UTC-hh:mm` otherwise
pub fn zone_qualifier(offset: FixedOffset) -> String {
    let secs = offset.local_minus_utc();
    if secs == 0 {
        return "UTC".to_string();
    }
    let sign = if secs < 0 { '-' } else { '+' };
    let secs = secs.unsigned_abs();
    format!("UTC{}{:02}:{:02}", sign, secs / 3600, (secs % 3600) / 60)
}
