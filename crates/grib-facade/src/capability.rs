//! What the facade may ask of the plugin core

use chrono::{DateTime, Utc};
use grib_core::{DisplayFlag, DisplayZone, IsoBarVisibility, LayerError, LayerId, LayerUnit, SettingsStore, TimelineError};
use grib_data::VectorSample;

use crate::download::DownloadArea;
use crate::FacadeError;

/// Outcome of an accepted layer mutation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LayerUpdate {
    /// The targeted layer's stored value changed
    pub changed: bool,
    /// Other layers switched off to keep a single overlay map plotted
    pub hidden: Vec<LayerId>,
}

/// Operations of the plugin core reachable from [`crate::GribApi`]
///
/// Mutators return whether the stored value changed so the facade can
/// decide which channel to fire. Layer mutators also report the layers
/// they switched off on the way. Layer ids arrive unvalidated as `i32` and
/// are checked here, in one place.
pub trait GribCapability: Send + Sync {
    /// Enabled flag and numeric parameter, shared with the facade
    fn settings(&self) -> SettingsStore;

    // Whole overlay

    fn set_visible(&self, visible: bool) -> bool;
    fn is_visible(&self) -> bool;

    fn set_overlay_transparency(&self, percent: i32) -> bool;
    fn overlay_transparency(&self) -> i32;

    fn set_loop_mode(&self, on: bool) -> bool;
    fn loop_mode(&self) -> bool;

    fn set_playback_speed(&self, updates_per_second: i32) -> bool;
    fn playback_speed(&self) -> i32;

    fn set_symbol_spacing(&self, pixels: i32) -> bool;
    fn symbol_spacing(&self) -> i32;

    // Downloads

    fn start_world_download(&self, area: DownloadArea, hours: i32) -> Result<(), FacadeError>;
    fn is_downloading(&self) -> bool;
    fn cancel_download(&self);

    // Timeline

    fn step_count(&self) -> usize;
    fn current_index(&self) -> Option<usize>;
    fn set_time_index(&self, index: i64) -> Result<usize, TimelineError>;
    /// Select the step nearest to the clock. Without data this is a no-op
    /// that still succeeds.
    fn set_to_nearest_now(&self) -> bool;
    fn time_string(&self, index: usize, zone: DisplayZone) -> Option<String>;
    fn current_time_string(&self, zone: DisplayZone) -> Option<String>;
    fn current_time_compact(&self) -> Option<String>;

    // Layer matrix

    fn set_layer_visible(&self, layer: i32, visible: bool) -> Result<LayerUpdate, LayerError>;
    fn is_layer_visible(&self, layer: i32) -> bool;
    fn is_layer_available(&self, layer: i32) -> bool;
    fn set_display_flag(&self, layer: i32, flag: DisplayFlag, on: bool) -> Result<LayerUpdate, LayerError>;
    fn display_flag(&self, layer: i32, flag: DisplayFlag) -> bool;
    fn set_iso_bar_visibility(&self, layer: i32, mode: IsoBarVisibility) -> Result<LayerUpdate, LayerError>;
    fn iso_bar_visibility(&self, layer: i32) -> IsoBarVisibility;
    fn set_abbreviated_numbers(&self, layer: i32, on: bool) -> Result<LayerUpdate, LayerError>;
    fn abbreviated_numbers(&self, layer: i32) -> bool;

    /// Reload unit preferences and remap preference-driven layers; returns
    /// the layers whose unit changed
    fn sync_units(&self) -> Vec<LayerId>;

    // Values

    /// Value at the current step, formatted in the layer's unit, or `"--"`
    fn layer_value_at_point(&self, layer: i32, lat: f64, lon: f64) -> String;

    fn has_active_file(&self) -> bool;
    fn time_at(&self, index: usize) -> Option<DateTime<Utc>>;
    fn time_range(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)>;
    /// Base-unit scalar of a layer at one step
    fn scalar_value_at(&self, layer: LayerId, index: usize, lat: f64, lon: f64) -> Option<f64>;
    fn vector_value_at(&self, layer: LayerId, index: usize, lat: f64, lon: f64) -> Option<VectorSample>;
    fn layer_unit(&self, layer: LayerId) -> LayerUnit;
}
