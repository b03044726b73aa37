//! The loaded forecast file

use std::sync::Arc;

use ahash::AHashSet;
use grib_core::{FieldCatalog, FieldKind, Timestamped};
use tracing::debug;

use crate::records::ForecastRecordSet;

/// Record sets decoded from one source, plus the union of their fields
#[derive(Debug, Clone)]
pub struct DataSet {
    source: String,
    records: Vec<Arc<ForecastRecordSet>>,
    fields: AHashSet<FieldKind>,
}

impl DataSet {
    pub fn new(source: impl Into<String>, records: Vec<ForecastRecordSet>) -> Self {
        let mut fields = AHashSet::new();
        for record in &records {
            fields.extend(record.field_kinds());
        }
        let source = source.into();
        debug!(source = %source, records = records.len(), fields = fields.len(), "data set assembled");
        Self {
            source,
            records: records.into_iter().map(Arc::new).collect(),
            fields,
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn records(&self) -> &[Arc<ForecastRecordSet>] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Earliest reference time, used to seed the timeline
    pub fn first_time(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        self.records.iter().map(|r| r.reference_time()).min()
    }
}

impl FieldCatalog for DataSet {
    fn contains(&self, field: FieldKind) -> bool {
        self.fields.contains(&field)
    }
}

/// What the core currently holds
///
/// Accessors must treat `Loading` exactly like `Empty`: a data set that is
/// still being replaced is never read.
#[derive(Debug, Clone, Default)]
pub enum DataSlot {
    #[default]
    Empty,
    Loading,
    Ready(Arc<DataSet>),
}

impl DataSlot {
    pub fn ready(&self) -> Option<&Arc<DataSet>> {
        match self {
            DataSlot::Ready(data) => Some(data),
            DataSlot::Empty | DataSlot::Loading => None,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.ready().is_some()
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, DataSlot::Loading)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::RegularGrid;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_catalog_is_union_of_records() {
        let grid = || RegularGrid::uniform((0.0, 0.0), (1.0, 1.0), (1, 1), 1.0);
        let t = |h| Utc.with_ymd_and_hms(2024, 1, 1, h, 0, 0).unwrap();
        let data = DataSet::new(
            "test.grb2",
            vec![
                ForecastRecordSet::new(t(6)).with_field(FieldKind::WaveHeight, grid()),
                ForecastRecordSet::new(t(0)).with_field(FieldKind::Pressure, grid()),
            ],
        );
        assert!(data.contains(FieldKind::WaveHeight));
        assert!(data.contains(FieldKind::Pressure));
        assert!(!data.contains(FieldKind::Cape));
        assert_eq!(data.first_time(), Some(t(0)));
    }

    #[test]
    fn test_loading_reads_as_empty() {
        assert!(DataSlot::Loading.ready().is_none());
        assert!(DataSlot::Empty.ready().is_none());
        let ready = DataSlot::Ready(Arc::new(DataSet::new("x", Vec::new())));
        assert!(ready.is_ready());
    }
}
