//! Consumer-facing operation surface
//!
//! [`GribApi`] is what a consumer gets after resolving a published handle.
//! It forwards to the core through [`GribCapability`], holds the core only
//! weakly and answers with neutral defaults once the core is gone: `false`,
//! `-1`, empty strings or [`UNAVAILABLE`].
//!
//! Indices and layer ids are `i32` on this surface, with `-1` meaning "no
//! index". Invalid layer ids make setters return `false` and getters return
//! their default; the rejection is logged by the core.

use std::sync::{Arc, Weak};

use chrono::{DateTime, Utc};
use grib_core::events::{CursorPosition, DataChange, DownloadProgress, FormatChange, LayerStateChange};
use grib_core::state::Settings;
use grib_core::{CallbackRegistry, DisplayFlag, DisplayZone, IsoBarVisibility, LayerError, LayerId, LayerUnit, UNAVAILABLE};
use grib_data::VectorSample;
use tracing::{debug, warn};

use crate::capability::{GribCapability, LayerUpdate};
use crate::download::DownloadArea;
use crate::plugin::GribCore;
use crate::{API_VERSION_MAJOR, API_VERSION_MINOR};

const DEFAULT_PARAMETER: i32 = 50;
const DEFAULT_TRANSPARENCY: i32 = 50;
const DEFAULT_PLAYBACK_SPEED: i32 = 4;
const DEFAULT_SYMBOL_SPACING: i32 = grib_core::layers::DEFAULT_SYMBOL_SPACING;
const NO_INDEX: i32 = -1;

pub struct GribApi {
    core: Weak<dyn GribCapability>,
    state_changed: CallbackRegistry<()>,
    data_changed: CallbackRegistry<DataChange>,
    layer_state_changed: CallbackRegistry<LayerStateChange>,
    format_state_changed: CallbackRegistry<FormatChange>,
    download_progress: CallbackRegistry<DownloadProgress>,
    cursor_position: CallbackRegistry<CursorPosition>,
}

impl GribApi {
    pub fn new(core: &Arc<dyn GribCapability>) -> Self {
        Self::with_weak(Arc::downgrade(core))
    }

    /// A facade with no core behind it; every call returns its default
    pub fn detached() -> Self {
        let core: Weak<dyn GribCapability> = Weak::<GribCore>::new();
        Self::with_weak(core)
    }

    fn with_weak(core: Weak<dyn GribCapability>) -> Self {
        Self {
            core,
            state_changed: CallbackRegistry::new("state_changed"),
            data_changed: CallbackRegistry::new("data_changed"),
            layer_state_changed: CallbackRegistry::new("layer_state_changed"),
            format_state_changed: CallbackRegistry::new("format_state_changed"),
            download_progress: CallbackRegistry::new("download_progress"),
            cursor_position: CallbackRegistry::new("cursor_position"),
        }
    }

    fn core(&self) -> Option<Arc<dyn GribCapability>> {
        let core = self.core.upgrade();
        if core.is_none() {
            debug!("facade call after the core was dropped");
        }
        core
    }

    fn with_core<T>(&self, default: T, f: impl FnOnce(&dyn GribCapability) -> T) -> T {
        match self.core() {
            Some(core) => f(core.as_ref()),
            None => default,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.core.strong_count() > 0
    }

    /// `(major, minor)` of this operation surface
    pub fn version(&self) -> (i32, i32) {
        (API_VERSION_MAJOR, API_VERSION_MINOR)
    }

    // Channels

    /// Fired when enabled, parameter or overlay visibility changed
    pub fn state_changed(&self) -> &CallbackRegistry<()> {
        &self.state_changed
    }

    pub fn data_changed(&self) -> &CallbackRegistry<DataChange> {
        &self.data_changed
    }

    pub fn layer_state_changed(&self) -> &CallbackRegistry<LayerStateChange> {
        &self.layer_state_changed
    }

    pub fn format_state_changed(&self) -> &CallbackRegistry<FormatChange> {
        &self.format_state_changed
    }

    pub fn download_progress(&self) -> &CallbackRegistry<DownloadProgress> {
        &self.download_progress
    }

    pub fn cursor_position(&self) -> &CallbackRegistry<CursorPosition> {
        &self.cursor_position
    }

    pub(crate) fn notify_data_changed(&self, change: DataChange) {
        self.data_changed.notify_all(&change);
    }

    pub(crate) fn notify_download_progress(&self, progress: DownloadProgress) {
        self.download_progress.notify_all(&progress);
    }

    pub(crate) fn notify_cursor_position(&self, position: CursorPosition) {
        self.cursor_position.notify_all(&position);
    }

    pub(crate) fn clear_callbacks(&self) {
        self.state_changed.clear();
        self.data_changed.clear();
        self.layer_state_changed.clear();
        self.format_state_changed.clear();
        self.download_progress.clear();
        self.cursor_position.clear();
    }

    fn state_if(&self, changed: bool) -> bool {
        if changed {
            self.state_changed.notify_all(&());
        }
        changed
    }

    // Settings

    pub fn set_enabled(&self, enabled: bool) {
        let changed = self.with_core(false, |core| core.settings().set_enabled(enabled));
        self.state_if(changed);
    }

    pub fn is_enabled(&self) -> bool {
        self.with_core(false, |core| core.settings().is_enabled())
    }

    /// Clamped to `[0, 100]`
    pub fn set_parameter(&self, value: i32) {
        let changed = self.with_core(false, |core| core.settings().set_parameter(value));
        self.state_if(changed);
    }

    pub fn parameter(&self) -> i32 {
        self.with_core(DEFAULT_PARAMETER, |core| core.settings().parameter())
    }

    pub fn settings(&self) -> Settings {
        self.with_core(Settings::default(), |core| core.settings().snapshot())
    }

    // Overlay

    pub fn set_visible(&self, visible: bool) {
        let changed = self.with_core(false, |core| core.set_visible(visible));
        self.state_if(changed);
    }

    pub fn is_visible(&self) -> bool {
        self.with_core(false, |core| core.is_visible())
    }

    /// Percent in `[0, 100]`, clamped
    pub fn set_overlay_transparency(&self, percent: i32) {
        self.with_core(false, |core| core.set_overlay_transparency(percent));
    }

    pub fn overlay_transparency(&self) -> i32 {
        self.with_core(DEFAULT_TRANSPARENCY, |core| core.overlay_transparency())
    }

    pub fn set_loop_mode(&self, on: bool) {
        self.with_core(false, |core| core.set_loop_mode(on));
    }

    pub fn loop_mode(&self) -> bool {
        self.with_core(false, |core| core.loop_mode())
    }

    /// Updates per second, at least 1
    pub fn set_playback_speed(&self, speed: i32) {
        self.with_core(false, |core| core.set_playback_speed(speed));
    }

    pub fn playback_speed(&self) -> i32 {
        self.with_core(DEFAULT_PLAYBACK_SPEED, |core| core.playback_speed())
    }

    pub fn set_symbol_spacing(&self, pixels: i32) {
        self.with_core(false, |core| core.set_symbol_spacing(pixels));
    }

    pub fn symbol_spacing(&self) -> i32 {
        self.with_core(DEFAULT_SYMBOL_SPACING, |core| core.symbol_spacing())
    }

    // Downloads

    /// Returns whether the download was handed to the collaborator
    pub fn start_world_download(&self, lat_min: f64, lon_min: f64, lat_max: f64, lon_max: f64, hours: i32) -> bool {
        let area = DownloadArea::new(lat_min, lon_min, lat_max, lon_max);
        self.with_core(false, |core| match core.start_world_download(area, hours) {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "world download not started");
                false
            }
        })
    }

    pub fn is_downloading(&self) -> bool {
        self.with_core(false, |core| core.is_downloading())
    }

    pub fn cancel_download(&self) {
        self.with_core((), |core| core.cancel_download());
    }

    // Timeline

    pub fn step_count(&self) -> i32 {
        self.with_core(0, |core| core.step_count() as i32)
    }

    /// `-1` when nothing is selected or no data is loaded
    pub fn current_index(&self) -> i32 {
        self.with_core(NO_INDEX, |core| core.current_index().map_or(NO_INDEX, |idx| idx as i32))
    }

    /// False, and no change, without data or for an index outside
    /// `[0, step_count())`
    pub fn set_index(&self, index: i32) -> bool {
        self.with_core(false, |core| core.set_time_index(index as i64).is_ok())
    }

    /// Always true while the plugin core is alive, even with nothing loaded
    pub fn set_to_nearest_now(&self) -> bool {
        self.with_core(false, |core| core.set_to_nearest_now())
    }

    /// Reference time of a step, UTC or system local; empty when invalid
    pub fn time_string(&self, index: i32, local: bool) -> String {
        self.time_string_in(index, if local { DisplayZone::Local } else { DisplayZone::Utc })
    }

    pub fn time_string_in(&self, index: i32, zone: DisplayZone) -> String {
        let Ok(index) = usize::try_from(index) else {
            return String::new();
        };
        self.with_core(String::new(), |core| core.time_string(index, zone).unwrap_or_default())
    }

    pub fn current_time_string(&self, local: bool) -> String {
        let zone = if local { DisplayZone::Local } else { DisplayZone::Utc };
        self.with_core(String::new(), |core| core.current_time_string(zone).unwrap_or_default())
    }

    /// e.g. `2021-12-15 10:00 UTC`
    pub fn current_time_compact(&self) -> String {
        self.with_core(String::new(), |core| core.current_time_compact().unwrap_or_default())
    }

    // Layers

    /// Fire layer-state-changed for the target if it changed and for every
    /// layer switched off alongside it
    fn layer_changed(&self, layer: i32, result: Option<Result<LayerUpdate, LayerError>>) -> bool {
        match result {
            Some(Ok(update)) => {
                let target = LayerId::from_index(layer).filter(|_| update.changed);
                for layer in target.into_iter().chain(update.hidden) {
                    self.layer_state_changed.notify_all(&LayerStateChange { layer });
                }
                true
            }
            Some(Err(_)) | None => false,
        }
    }

    fn set_flag(&self, layer: i32, flag: DisplayFlag, on: bool) -> bool {
        let result = self.core().map(|core| core.set_display_flag(layer, flag, on));
        self.layer_changed(layer, result)
    }

    fn flag(&self, layer: i32, flag: DisplayFlag) -> bool {
        self.with_core(false, |core| core.display_flag(layer, flag))
    }

    pub fn set_layer_visible(&self, layer: i32, visible: bool) -> bool {
        let result = self.core().map(|core| core.set_layer_visible(layer, visible));
        self.layer_changed(layer, result)
    }

    pub fn is_layer_visible(&self, layer: i32) -> bool {
        self.with_core(false, |core| core.is_layer_visible(layer))
    }

    pub fn set_barbed_arrows(&self, layer: i32, on: bool) -> bool {
        self.set_flag(layer, DisplayFlag::BarbedArrows, on)
    }

    pub fn is_barbed_arrows_visible(&self, layer: i32) -> bool {
        self.flag(layer, DisplayFlag::BarbedArrows)
    }

    pub fn set_iso_bars(&self, layer: i32, on: bool) -> bool {
        self.set_flag(layer, DisplayFlag::IsoBars, on)
    }

    pub fn is_iso_bars_visible(&self, layer: i32) -> bool {
        self.flag(layer, DisplayFlag::IsoBars)
    }

    pub fn set_numbers(&self, layer: i32, on: bool) -> bool {
        self.set_flag(layer, DisplayFlag::Numbers, on)
    }

    pub fn are_numbers_visible(&self, layer: i32) -> bool {
        self.flag(layer, DisplayFlag::Numbers)
    }

    pub fn set_overlay_map(&self, layer: i32, on: bool) -> bool {
        self.set_flag(layer, DisplayFlag::OverlayMap, on)
    }

    pub fn is_overlay_map_visible(&self, layer: i32) -> bool {
        self.flag(layer, DisplayFlag::OverlayMap)
    }

    pub fn set_direction_arrows(&self, layer: i32, on: bool) -> bool {
        self.set_flag(layer, DisplayFlag::DirectionArrows, on)
    }

    pub fn are_direction_arrows_visible(&self, layer: i32) -> bool {
        self.flag(layer, DisplayFlag::DirectionArrows)
    }

    pub fn set_particles(&self, layer: i32, on: bool) -> bool {
        self.set_flag(layer, DisplayFlag::Particles, on)
    }

    pub fn are_particles_visible(&self, layer: i32) -> bool {
        self.flag(layer, DisplayFlag::Particles)
    }

    /// `true` selects the minimal iso-bar mode
    pub fn set_iso_bar_visibility(&self, layer: i32, minimal: bool) -> bool {
        let mode = IsoBarVisibility::from(minimal);
        let result = self.core().map(|core| core.set_iso_bar_visibility(layer, mode));
        self.layer_changed(layer, result)
    }

    pub fn iso_bar_visibility(&self, layer: i32) -> bool {
        self.with_core(false, |core| core.iso_bar_visibility(layer).into())
    }

    pub fn set_abbreviated_numbers(&self, layer: i32, on: bool) -> bool {
        let result = self.core().map(|core| core.set_abbreviated_numbers(layer, on));
        let changed = matches!(&result, Some(Ok(update)) if update.changed);
        let accepted = self.layer_changed(layer, result);
        if changed {
            if let Some(layer) = LayerId::from_index(layer) {
                self.format_state_changed.notify_all(&FormatChange::Numbers(layer));
            }
        }
        accepted
    }

    pub fn abbreviated_numbers(&self, layer: i32) -> bool {
        self.with_core(false, |core| core.abbreviated_numbers(layer))
    }

    /// Whether the loaded data holds the fields the layer draws from
    pub fn is_available(&self, layer: i32) -> bool {
        self.with_core(false, |core| core.is_layer_available(layer))
    }

    /// Reload host unit preferences onto the layers
    pub fn sync_units(&self) {
        if self.core().map(|core| core.sync_units()).is_some() {
            self.format_state_changed.notify_all(&FormatChange::Units);
        }
    }

    // Values

    /// Formatted value at the current step, or `"--"`
    pub fn layer_value_at_point(&self, layer: i32, lat: f64, lon: f64) -> String {
        self.with_core(UNAVAILABLE.to_string(), |core| core.layer_value_at_point(layer, lat, lon))
    }

    pub fn has_active_file(&self) -> bool {
        self.with_core(false, |core| core.has_active_file())
    }

    pub fn time_at(&self, index: i32) -> Option<DateTime<Utc>> {
        let index = usize::try_from(index).ok()?;
        self.core()?.time_at(index)
    }

    pub fn time_range(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        self.core()?.time_range()
    }

    /// Base-unit value of a layer at a step; vector layers give their magnitude
    pub fn scalar_value_at(&self, layer: i32, index: i32, lat: f64, lon: f64) -> Option<f64> {
        let layer = LayerId::from_index(layer)?;
        let index = usize::try_from(index).ok()?;
        self.core()?.scalar_value_at(layer, index, lat, lon)
    }

    pub fn vector_value_at(&self, layer: i32, index: i32, lat: f64, lon: f64) -> Option<VectorSample> {
        let layer = LayerId::from_index(layer)?;
        let index = usize::try_from(index).ok()?;
        self.core()?.vector_value_at(layer, index, lat, lon)
    }

    pub fn layer_unit(&self, layer: i32) -> Option<LayerUnit> {
        let layer = LayerId::from_index(layer)?;
        Some(self.core()?.layer_unit(layer))
    }

    pub fn is_vector_layer(&self, layer: i32) -> bool {
        LayerId::from_index(layer).is_some_and(|id| id.is_vector())
    }

    pub fn layer_display_name(&self, layer: i32) -> String {
        LayerId::from_index(layer)
            .map(|id| id.display_name().to_string())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::tests::{fixture, sample_data};
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter() -> (Arc<AtomicUsize>, impl Fn() -> usize) {
        let count = Arc::new(AtomicUsize::new(0));
        let reader = count.clone();
        (count, move || reader.load(Ordering::SeqCst))
    }

    fn facade_for(core: &Arc<GribCore>) -> GribApi {
        let core: Arc<dyn GribCapability> = core.clone();
        GribApi::new(&core)
    }

    #[test]
    fn test_parameter_clamps_and_notifies_once() {
        let f = fixture();
        let api = facade_for(&f.core);
        let (count, fired) = counter();
        api.state_changed().register(move |_| {
            count.fetch_add(1, Ordering::SeqCst);
        });

        api.set_parameter(250);
        assert_eq!(api.parameter(), 100);
        api.set_parameter(101);
        assert_eq!(fired(), 1);

        api.set_parameter(-5);
        assert_eq!(api.parameter(), 0);
        assert_eq!(fired(), 2);

        api.set_enabled(true);
        api.set_enabled(true);
        assert!(api.is_enabled());
        assert_eq!(fired(), 3);
    }

    #[test]
    fn test_fresh_facade_defaults() {
        let f = fixture();
        let api = facade_for(&f.core);
        assert_eq!(api.step_count(), 0);
        assert_eq!(api.current_index(), -1);
        assert_eq!(api.layer_value_at_point(0, 10.0, 20.0), UNAVAILABLE);
        assert!(!api.set_index(0));
        assert!(api.set_to_nearest_now());
        assert_eq!(api.current_index(), -1);
        assert_eq!(api.time_string(0, false), "");
        for layer in 0..13 {
            assert!(!api.is_available(layer));
        }
    }

    #[test]
    fn test_detached_facade_defaults() {
        let api = GribApi::detached();
        assert!(!api.is_connected());
        assert!(!api.is_enabled());
        assert_eq!(api.parameter(), 50);
        assert_eq!(api.overlay_transparency(), 50);
        assert_eq!(api.playback_speed(), 4);
        assert_eq!(api.symbol_spacing(), 50);
        assert_eq!(api.current_index(), -1);
        assert_eq!(api.layer_value_at_point(0, 10.0, 20.0), UNAVAILABLE);
        assert!(!api.set_layer_visible(0, true));
        assert!(!api.set_to_nearest_now());
        assert_eq!(api.version(), (1, 16));
    }

    #[test]
    fn test_facade_outlives_core() {
        let f = fixture();
        let api = facade_for(&f.core);
        api.set_parameter(70);
        assert_eq!(api.parameter(), 70);

        drop(f);
        assert!(!api.is_connected());
        assert_eq!(api.parameter(), 50);
    }

    #[test]
    fn test_timeline_through_facade() {
        let f = fixture();
        let api = facade_for(&f.core);
        f.core.load_data(sample_data());

        assert_eq!(api.step_count(), 5);
        assert!(api.set_index(4));
        assert_eq!(api.current_index(), 4);
        assert!(!api.set_index(5));
        assert_eq!(api.current_index(), 4);
        assert_eq!(api.time_string(0, false), "Wed 12/15/2021 00:00");
        assert_eq!(api.current_time_compact(), "2021-12-15 12:00 UTC");
        assert!(api.time_at(-1).is_none());
    }

    #[test]
    fn test_layer_mutators_validate_and_notify() {
        let f = fixture();
        let api = facade_for(&f.core);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        api.layer_state_changed().register(move |change: &LayerStateChange| {
            sink.lock().push(change.layer);
        });

        assert!(api.set_numbers(2, true));
        assert!(api.are_numbers_visible(2));
        assert!(api.set_numbers(2, true));
        assert!(!api.set_numbers(13, true));
        assert!(!api.set_numbers(-1, true));
        assert!(!api.are_numbers_visible(13));

        assert_eq!(*seen.lock(), vec![LayerId::Pressure]);
    }

    #[test]
    fn test_abbreviated_numbers_fires_format_change() {
        let f = fixture();
        let api = facade_for(&f.core);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        api.format_state_changed().register(move |change: &FormatChange| {
            sink.lock().push(*change);
        });

        assert!(api.set_abbreviated_numbers(0, true));
        assert!(api.abbreviated_numbers(0));
        api.sync_units();
        assert_eq!(*seen.lock(), vec![FormatChange::Numbers(LayerId::Wind), FormatChange::Units]);
    }

    #[test]
    fn test_one_overlay_map_at_a_time() {
        let f = fixture();
        let api = facade_for(&f.core);
        let wind = LayerId::Wind as i32;
        let pressure = LayerId::Pressure as i32;

        api.set_layer_visible(wind, true);
        api.set_overlay_map(wind, true);
        api.set_layer_visible(pressure, true);

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        api.layer_state_changed().register(move |change: &LayerStateChange| {
            sink.lock().push(change.layer);
        });
        api.set_overlay_map(pressure, true);

        assert!(api.is_layer_visible(pressure));
        assert!(!api.is_layer_visible(wind));
        assert_eq!(*seen.lock(), vec![LayerId::Pressure, LayerId::Wind]);
    }

    #[test]
    fn test_switched_off_overlay_layer_is_notified() {
        let f = fixture();
        let api = facade_for(&f.core);
        let cloud = LayerId::Cloud as i32;
        let air = LayerId::AirTemperature as i32;
        api.set_layer_visible(cloud, true);

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        api.layer_state_changed().register(move |change: &LayerStateChange| {
            sink.lock().push(change.layer);
        });
        api.set_layer_visible(air, true);

        assert!(!api.is_layer_visible(cloud));
        assert_eq!(*seen.lock(), vec![LayerId::AirTemperature, LayerId::Cloud]);
    }

    #[test]
    fn test_meteogram_access() {
        let f = fixture();
        let api = facade_for(&f.core);
        f.core.load_data(sample_data());

        assert!(api.has_active_file());
        assert!(api.is_vector_layer(0));
        assert!(!api.is_vector_layer(1));
        assert_eq!(api.layer_display_name(1), LayerId::WindGust.display_name());
        assert_eq!(api.layer_display_name(42), "");
        assert_eq!(api.scalar_value_at(1, 0, 10.0, 20.0), Some(15.0));
        assert_eq!(api.vector_value_at(0, 1, 10.0, 20.0).map(|s| s.magnitude), Some(12.0));
        assert!(api.layer_unit(99).is_none());
    }
}
