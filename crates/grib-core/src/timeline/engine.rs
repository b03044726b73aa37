//! Time-ordered record index with a current selection

use chrono::{DateTime, Utc};

use super::{Timestamped, TimelineError};

/// Ordered forecast steps plus the current selection
///
/// Records are kept ascending by reference time with at most one record per
/// time. The selection is either empty or a valid index; no method leaves it
/// pointing past the end.
#[derive(Debug, Clone)]
pub struct TimelineIndex<R> {
    records: Vec<R>,
    current: Option<usize>,
    loaded: bool,
}

/// Two neighbouring steps around a point in time
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bracket {
    pub before: usize,
    pub after: usize,
    /// Position between `before` (0.0) and `after` (1.0)
    pub weight: f64,
}

impl<R> Default for TimelineIndex<R> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            current: None,
            loaded: false,
        }
    }
}

impl<R: Timestamped> TimelineIndex<R> {
    /// Create an index with nothing loaded
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the records. Input order does not matter; later duplicates of a
    /// reference time are dropped. The selection is cleared.
    ///
    /// Returns the number of dropped duplicates.
    pub fn load(&mut self, mut records: Vec<R>) -> usize {
        records.sort_by_key(|r| r.reference_time());
        let before = records.len();
        records.dedup_by(|later, earlier| later.reference_time() == earlier.reference_time());

        self.records = records;
        self.current = None;
        self.loaded = true;
        before - self.records.len()
    }

    /// Drop all records and forget the file
    pub fn unload(&mut self) {
        self.records.clear();
        self.current = None;
        self.loaded = false;
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn step_count(&self) -> usize {
        self.records.len()
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current
    }

    pub fn records(&self) -> &[R] {
        &self.records
    }

    pub fn get(&self, index: usize) -> Option<&R> {
        self.records.get(index)
    }

    pub fn current(&self) -> Option<&R> {
        self.current.and_then(|idx| self.records.get(idx))
    }

    pub fn time_at(&self, index: usize) -> Option<DateTime<Utc>> {
        self.records.get(index).map(Timestamped::reference_time)
    }

    /// First and last reference time
    pub fn time_range(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        let first = self.records.first()?.reference_time();
        let last = self.records.last()?.reference_time();
        Some((first, last))
    }

    /// Select a step. Fails without touching the selection when nothing is
    /// loaded or the index is outside `[0, step_count())`.
    pub fn select(&mut self, index: i64) -> Result<usize, TimelineError> {
        if !self.loaded {
            return Err(TimelineError::NotLoaded);
        }
        let count = self.records.len();
        if index < 0 || index as u64 >= count as u64 {
            return Err(TimelineError::OutOfRange { index, count });
        }

        let index = index as usize;
        self.current = Some(index);
        Ok(index)
    }

    /// Step closest to `now`; ties go to the earlier step
    pub fn nearest_to(&self, now: DateTime<Utc>) -> Option<usize> {
        self.records
            .iter()
            .enumerate()
            .min_by_key(|(_, r)| (r.reference_time() - now).num_seconds().unsigned_abs())
            .map(|(idx, _)| idx)
    }

    /// Select the step closest to `now`. Leaves the selection untouched when empty.
    pub fn select_nearest(&mut self, now: DateTime<Utc>) -> Option<usize> {
        let idx = self.nearest_to(now)?;
        self.current = Some(idx);
        Some(idx)
    }

    /// Select the first step, if any
    pub fn select_first(&mut self) -> Option<usize> {
        if self.records.is_empty() {
            return None;
        }
        self.current = Some(0);
        self.current
    }

    /// Advance one step. At the end, wraps to the start in loop mode and
    /// otherwise stays put and returns `None`.
    pub fn step_forward(&mut self, loop_mode: bool) -> Option<usize> {
        let count = self.records.len();
        if count == 0 {
            return None;
        }

        let next = match self.current {
            None => 0,
            Some(idx) if idx + 1 < count => idx + 1,
            Some(_) if loop_mode => 0,
            Some(_) => return None,
        };
        self.current = Some(next);
        Some(next)
    }

    /// Go back one step, stopping at the first
    pub fn step_back(&mut self) -> Option<usize> {
        match self.current {
            Some(idx) if idx > 0 => {
                self.current = Some(idx - 1);
                self.current
            }
            _ => None,
        }
    }

    /// Steps surrounding `time`. An exact hit returns the same step twice
    /// with weight 0. Times outside the covered range give `None`.
    pub fn bracket(&self, time: DateTime<Utc>) -> Option<Bracket> {
        let (first, last) = self.time_range()?;
        if time < first || time > last {
            return None;
        }

        let after = self.records.partition_point(|r| r.reference_time() < time);
        let after_time = self.records[after].reference_time();
        if after_time == time {
            return Some(Bracket { before: after, after, weight: 0.0 });
        }

        let before = after - 1;
        let before_time = self.records[before].reference_time();
        let span = (after_time - before_time).num_milliseconds() as f64;
        let offset = (time - before_time).num_milliseconds() as f64;
        Some(Bracket {
            before,
            after,
            weight: offset / span,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn hours(base: DateTime<Utc>, hs: &[i64]) -> Vec<DateTime<Utc>> {
        hs.iter().map(|h| base + Duration::hours(*h)).collect()
    }

    fn base() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2021, 12, 15, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_load_sorts_and_dedups() {
        let mut timeline = TimelineIndex::new();
        let dropped = timeline.load(hours(base(), &[6, 0, 3, 3, 9]));
        assert_eq!(dropped, 1);
        assert_eq!(timeline.step_count(), 4);
        assert_eq!(timeline.time_at(0), Some(base()));
        assert_eq!(timeline.time_at(3), Some(base() + Duration::hours(9)));
        assert_eq!(timeline.current_index(), None);
    }

    #[test]
    fn test_select_bounds() {
        let mut timeline = TimelineIndex::new();
        timeline.load(hours(base(), &[0, 1, 2, 3, 4]));

        assert_eq!(timeline.select(4), Ok(4));
        assert_eq!(timeline.current_index(), Some(4));

        assert_eq!(timeline.select(5), Err(TimelineError::OutOfRange { index: 5, count: 5 }));
        assert_eq!(timeline.select(-1), Err(TimelineError::OutOfRange { index: -1, count: 5 }));
        assert_eq!(timeline.current_index(), Some(4));
    }

    #[test]
    fn test_select_without_data() {
        let mut timeline: TimelineIndex<DateTime<Utc>> = TimelineIndex::new();
        assert_eq!(timeline.select(0), Err(TimelineError::NotLoaded));

        timeline.load(Vec::new());
        assert_eq!(timeline.select(0), Err(TimelineError::OutOfRange { index: 0, count: 0 }));
        assert_eq!(timeline.current_index(), None);
    }

    #[test]
    fn test_nearest_prefers_earlier_on_tie() {
        let mut timeline = TimelineIndex::new();
        timeline.load(hours(base(), &[0, 6, 12]));
        assert_eq!(timeline.select_nearest(base() + Duration::hours(3)), Some(0));
        assert_eq!(timeline.select_nearest(base() + Duration::hours(10)), Some(2));
        assert_eq!(timeline.select_nearest(base() - Duration::days(3)), Some(0));
    }

    #[test]
    fn test_stepping() {
        let mut timeline = TimelineIndex::new();
        timeline.load(hours(base(), &[0, 1, 2]));
        assert_eq!(timeline.step_forward(false), Some(0));
        assert_eq!(timeline.step_forward(false), Some(1));
        assert_eq!(timeline.step_forward(false), Some(2));
        assert_eq!(timeline.step_forward(false), None);
        assert_eq!(timeline.current_index(), Some(2));
        assert_eq!(timeline.step_forward(true), Some(0));
        assert_eq!(timeline.step_back(), None);
    }

    #[test]
    fn test_bracket() {
        let mut timeline = TimelineIndex::new();
        timeline.load(hours(base(), &[0, 6, 12]));

        let exact = timeline.bracket(base() + Duration::hours(6)).unwrap();
        assert_eq!((exact.before, exact.after), (1, 1));

        let mid = timeline.bracket(base() + Duration::hours(9)).unwrap();
        assert_eq!((mid.before, mid.after), (1, 2));
        assert!((mid.weight - 0.5).abs() < 1e-9);

        assert!(timeline.bracket(base() + Duration::hours(13)).is_none());
        assert!(timeline.bracket(base() - Duration::seconds(1)).is_none());
    }
}
