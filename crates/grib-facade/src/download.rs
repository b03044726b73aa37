//! Download collaborator contract
//!
//! Fetching and retrying is the collaborator's business. Progress comes back
//! through [`crate::PluginHost::notify_download_progress`].

use serde::{Deserialize, Serialize};

use crate::FacadeError;

/// Bounding box of a requested forecast, degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DownloadArea {
    pub lat_min: f64,
    pub lon_min: f64,
    pub lat_max: f64,
    pub lon_max: f64,
}

impl DownloadArea {
    pub fn new(lat_min: f64, lon_min: f64, lat_max: f64, lon_max: f64) -> Self {
        Self {
            lat_min,
            lon_min,
            lat_max,
            lon_max,
        }
    }

    /// Latitudes ordered and inside `[-90, 90]`
    pub fn is_valid(&self) -> bool {
        self.lat_min <= self.lat_max && self.lat_min >= -90.0 && self.lat_max <= 90.0
    }
}

pub trait Downloader: Send + Sync {
    /// Start fetching `hours` of forecast for `area`; returns immediately
    fn start(&self, area: DownloadArea, hours: i32) -> Result<(), FacadeError>;

    fn is_downloading(&self) -> bool;

    /// No-op when idle
    fn cancel(&self);
}
