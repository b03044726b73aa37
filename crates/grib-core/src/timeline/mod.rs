use chrono::{DateTime, Utc};
use thiserror::Error;

mod engine;
mod format;
mod position;
mod subscriber;

pub use engine::{Bracket, TimelineIndex};
pub use format::{format_compact_utc, format_time, zone_qualifier, DisplayZone};
pub use position::TimelineStamp;
pub use subscriber::{TimelineContext, TimelineListener, TimelineListeners};

/// Anything the timeline can order by reference time
pub trait Timestamped {
    fn reference_time(&self) -> DateTime<Utc>;
}

impl Timestamped for DateTime<Utc> {
    fn reference_time(&self) -> DateTime<Utc> {
        *self
    }
}

impl<T: Timestamped + ?Sized> Timestamped for std::sync::Arc<T> {
    fn reference_time(&self) -> DateTime<Utc> {
        (**self).reference_time()
    }
}

/// Why a timeline selection was refused
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TimelineError {
    #[error("no forecast file loaded")]
    NotLoaded,

    #[error("index {index} out of range for {count} steps")]
    OutOfRange { index: i64, count: usize },
}
