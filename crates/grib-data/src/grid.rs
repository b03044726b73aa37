//! Regular latitude/longitude grids

use serde::{Deserialize, Serialize};

use crate::DataError;

/// Values on a regular lat/lon grid, row-major from `lat0`/`lon0`
///
/// Missing points are stored as NaN.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegularGrid {
    lat0: f64,
    lon0: f64,
    dlat: f64,
    dlon: f64,
    nlat: usize,
    nlon: usize,
    values: Vec<f64>,
}

impl RegularGrid {
    pub fn new(
        origin: (f64, f64),
        spacing: (f64, f64),
        shape: (usize, usize),
        values: Vec<f64>,
    ) -> Result<Self, DataError> {
        let (nlat, nlon) = shape;
        let expected = nlat * nlon;
        if values.len() != expected {
            return Err(DataError::GridShape {
                expected,
                actual: values.len(),
            });
        }
        let valid = |d: f64| d.is_finite() && d > 0.0;
        if !valid(spacing.0) || !valid(spacing.1) {
            return Err(DataError::GridSpacing);
        }
        Ok(Self {
            lat0: origin.0,
            lon0: origin.1,
            dlat: spacing.0,
            dlon: spacing.1,
            nlat,
            nlon,
            values,
        })
    }

    /// Same value everywhere, mostly for tests
    pub fn uniform(origin: (f64, f64), spacing: (f64, f64), shape: (usize, usize), value: f64) -> Self {
        Self {
            lat0: origin.0,
            lon0: origin.1,
            dlat: spacing.0.abs().max(f64::MIN_POSITIVE),
            dlon: spacing.1.abs().max(f64::MIN_POSITIVE),
            nlat: shape.0,
            nlon: shape.1,
            values: vec![value; shape.0 * shape.1],
        }
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.nlat, self.nlon)
    }

    fn at(&self, row: usize, col: usize) -> f64 {
        self.values[row * self.nlon + col]
    }

    /// Bilinear sample; `None` outside the grid or next to a missing point
    pub fn sample(&self, lat: f64, lon: f64) -> Option<f64> {
        if self.nlat == 0 || self.nlon == 0 || !lat.is_finite() || !lon.is_finite() {
            return None;
        }
        let y = (lat - self.lat0) / self.dlat;
        let x = (normalize_lon(lon, self.lon0) - self.lon0) / self.dlon;
        let max_y = (self.nlat - 1) as f64;
        let max_x = (self.nlon - 1) as f64;
        if !(0.0..=max_y).contains(&y) || !(0.0..=max_x).contains(&x) {
            return None;
        }

        let row = (y.floor() as usize).min(self.nlat.saturating_sub(2));
        let col = (x.floor() as usize).min(self.nlon.saturating_sub(2));
        let next_row = (row + 1).min(self.nlat - 1);
        let next_col = (col + 1).min(self.nlon - 1);
        let fy = y - row as f64;
        let fx = x - col as f64;

        let corners = [
            self.at(row, col),
            self.at(row, next_col),
            self.at(next_row, col),
            self.at(next_row, next_col),
        ];
        if corners.iter().any(|v| v.is_nan()) {
            return None;
        }

        let bottom = corners[0] + (corners[1] - corners[0]) * fx;
        let top = corners[2] + (corners[3] - corners[2]) * fx;
        Some(bottom + (top - bottom) * fy)
    }
}

// Bring lon into [lon0, lon0 + 360)
fn normalize_lon(lon: f64, lon0: f64) -> f64 {
    (lon - lon0).rem_euclid(360.0) + lon0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp() -> RegularGrid {
        // 3x3, value = row * 10 + col
        let values = (0..3).flat_map(|r| (0..3).map(move |c| (r * 10 + c) as f64)).collect();
        RegularGrid::new((0.0, 0.0), (1.0, 1.0), (3, 3), values).unwrap()
    }

    #[test]
    fn test_shape_checked() {
        let err = RegularGrid::new((0.0, 0.0), (1.0, 1.0), (2, 2), vec![0.0; 3]);
        assert!(matches!(err, Err(DataError::GridShape { expected: 4, actual: 3 })));
        assert!(RegularGrid::new((0.0, 0.0), (0.0, 1.0), (1, 1), vec![0.0]).is_err());
        assert!(matches!(
            RegularGrid::new((0.0, 0.0), (f64::NAN, 1.0), (1, 1), vec![0.0]),
            Err(DataError::GridSpacing)
        ));
        assert!(RegularGrid::new((0.0, 0.0), (1.0, f64::INFINITY), (1, 1), vec![0.0]).is_err());
    }

    #[test]
    fn test_bilinear() {
        let grid = ramp();
        assert_eq!(grid.sample(0.0, 0.0), Some(0.0));
        assert_eq!(grid.sample(2.0, 2.0), Some(22.0));
        assert!((grid.sample(0.5, 0.5).unwrap() - 5.5).abs() < 1e-9);
        assert_eq!(grid.sample(3.0, 0.0), None);
        assert_eq!(grid.sample(-0.1, 0.0), None);
    }

    #[test]
    fn test_longitude_wraps() {
        let grid = ramp();
        assert_eq!(grid.sample(1.0, 361.0), Some(11.0));
        assert_eq!(grid.sample(1.0, -359.0), Some(11.0));
        assert_eq!(grid.sample(1.0, 1.0 + 360.0 * 1000.0), Some(11.0));
    }

    #[test]
    fn test_huge_longitude_returns() {
        let grid = ramp();
        for lon in [1e20, -1e20, f64::MAX, f64::MIN] {
            if let Some(v) = grid.sample(1.0, lon) {
                assert!(v.is_finite());
            }
        }
    }

    #[test]
    fn test_missing_point() {
        let mut values = vec![1.0; 4];
        values[3] = f64::NAN;
        let grid = RegularGrid::new((0.0, 0.0), (1.0, 1.0), (2, 2), values).unwrap();
        assert_eq!(grid.sample(0.0, 0.0), None);
    }
}
