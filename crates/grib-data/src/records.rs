//! One forecast time slice

use std::sync::Arc;

use ahash::AHashMap;
use chrono::{DateTime, Utc};
use grib_core::{FieldCatalog, FieldKind, Timestamped};

use crate::grid::RegularGrid;

/// Decoded fields valid at one reference time
///
/// Produced by the decoder collaborator. Field values are in base SI units
/// (m/s, Pa, K, m, mm) except for ratios and reflectivity, which are passed
/// through as decoded.
#[derive(Debug, Clone)]
pub struct ForecastRecordSet {
    reference_time: DateTime<Utc>,
    fields: AHashMap<FieldKind, Arc<RegularGrid>>,
}

impl ForecastRecordSet {
    pub fn new(reference_time: DateTime<Utc>) -> Self {
        Self {
            reference_time,
            fields: AHashMap::new(),
        }
    }

    pub fn with_field(mut self, kind: FieldKind, grid: RegularGrid) -> Self {
        self.insert(kind, grid);
        self
    }

    /// Add or replace a field
    pub fn insert(&mut self, kind: FieldKind, grid: RegularGrid) {
        self.fields.insert(kind, Arc::new(grid));
    }

    pub fn field(&self, kind: FieldKind) -> Option<&Arc<RegularGrid>> {
        self.fields.get(&kind)
    }

    pub fn field_kinds(&self) -> impl Iterator<Item = FieldKind> + '_ {
        self.fields.keys().copied()
    }

    /// Sample one field at a position
    pub fn sample(&self, kind: FieldKind, lat: f64, lon: f64) -> Option<f64> {
        self.field(kind)?.sample(lat, lon)
    }
}

impl Timestamped for ForecastRecordSet {
    fn reference_time(&self) -> DateTime<Utc> {
        self.reference_time
    }
}

impl FieldCatalog for ForecastRecordSet {
    fn contains(&self, field: FieldKind) -> bool {
        self.fields.contains_key(&field)
    }
}
