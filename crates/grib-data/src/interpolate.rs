//! Sampling between forecast steps and vector decomposition

use grib_core::timeline::Bracket;
use grib_core::FieldKind;
use serde::{Deserialize, Serialize};

use crate::records::ForecastRecordSet;

/// Meteorological vectors report where they come from, currents where
/// they flow to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DirectionConvention {
    From,
    To,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VectorSample {
    /// Base units (m/s)
    pub magnitude: f64,
    /// Degrees in `[0, 360)`, clockwise from north
    pub direction: f64,
}

impl VectorSample {
    pub fn from_components(u: f64, v: f64, convention: DirectionConvention) -> Self {
        let magnitude = u.hypot(v);
        let radians = match convention {
            DirectionConvention::From => (-u).atan2(-v),
            DirectionConvention::To => u.atan2(v),
        };
        Self {
            magnitude,
            direction: radians.to_degrees().rem_euclid(360.0),
        }
    }
}

/// Scalar value at a position, linearly blended between the bracketing steps
pub fn scalar_at(
    records: &[impl AsRef<ForecastRecordSet>],
    bracket: Bracket,
    field: FieldKind,
    lat: f64,
    lon: f64,
) -> Option<f64> {
    let before = records.get(bracket.before)?.as_ref().sample(field, lat, lon)?;
    if bracket.before == bracket.after {
        return Some(before);
    }
    let after = records.get(bracket.after)?.as_ref().sample(field, lat, lon)?;
    Some(before + (after - before) * bracket.weight)
}

/// Vector value blended per component, then decomposed
pub fn vector_at(
    records: &[impl AsRef<ForecastRecordSet>],
    bracket: Bracket,
    components: (FieldKind, FieldKind),
    convention: DirectionConvention,
    lat: f64,
    lon: f64,
) -> Option<VectorSample> {
    let u = scalar_at(records, bracket, components.0, lat, lon)?;
    let v = scalar_at(records, bracket, components.1, lat, lon)?;
    Some(VectorSample::from_components(u, v, convention))
}

impl AsRef<ForecastRecordSet> for ForecastRecordSet {
    fn as_ref(&self) -> &ForecastRecordSet {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::RegularGrid;
    use chrono::{TimeZone, Utc};

    fn uniform(value: f64) -> RegularGrid {
        RegularGrid::uniform((0.0, 0.0), (1.0, 1.0), (2, 2), value)
    }

    fn records() -> Vec<ForecastRecordSet> {
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let t1 = Utc.with_ymd_and_hms(2024, 1, 1, 6, 0, 0).unwrap();
        vec![
            ForecastRecordSet::new(t0)
                .with_field(FieldKind::AirTemp, uniform(280.0))
                .with_field(FieldKind::WindU, uniform(0.0))
                .with_field(FieldKind::WindV, uniform(-10.0)),
            ForecastRecordSet::new(t1)
                .with_field(FieldKind::AirTemp, uniform(290.0))
                .with_field(FieldKind::WindU, uniform(0.0))
                .with_field(FieldKind::WindV, uniform(-20.0)),
        ]
    }

    #[test]
    fn test_directions() {
        // Wind blowing towards the south comes from the north
        let north = VectorSample::from_components(0.0, -5.0, DirectionConvention::From);
        assert!(north.direction.abs() < 1e-9);
        assert!((north.magnitude - 5.0).abs() < 1e-9);

        // Current flowing east
        let east = VectorSample::from_components(1.0, 0.0, DirectionConvention::To);
        assert!((east.direction - 90.0).abs() < 1e-9);
    }

    #[test]
    fn test_scalar_blend() {
        let records = records();
        let mid = Bracket { before: 0, after: 1, weight: 0.5 };
        assert_eq!(scalar_at(&records, mid, FieldKind::AirTemp, 0.5, 0.5), Some(285.0));

        let exact = Bracket { before: 1, after: 1, weight: 0.0 };
        assert_eq!(scalar_at(&records, exact, FieldKind::AirTemp, 0.5, 0.5), Some(290.0));
        assert_eq!(scalar_at(&records, exact, FieldKind::SeaTemp, 0.5, 0.5), None);
    }

    #[test]
    fn test_vector_blend_per_component() {
        let records = records();
        let bracket = Bracket { before: 0, after: 1, weight: 0.5 };
        let wind = vector_at(&records, bracket, (FieldKind::WindU, FieldKind::WindV), DirectionConvention::From, 0.0, 0.0).unwrap();
        assert!((wind.magnitude - 15.0).abs() < 1e-9);
        assert!(wind.direction.abs() < 1e-9);
    }
}
