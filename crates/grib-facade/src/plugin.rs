//! The plugin core context object
//!
//! [`GribCore`] owns the settings, the forecast timeline, the layer matrix and
//! the loaded data. It is created by [`crate::PluginHost`] and reached by the
//! facade only through [`GribCapability`].
//!
//! Locks are never held across a collaborator call: every mutator finishes
//! its state change, releases the lock, then talks to the renderer, the
//! config store and the timeline listeners.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use grib_core::events::DataChange;
use grib_core::timeline::{format_compact_utc, format_time, TimelineListeners};
use grib_core::{
    DisplayFlag, DisplayZone, FieldKind, IsoBarVisibility, LayerError, LayerId, LayerUnit, LayerVisibilityMatrix,
    OverlayRenderer, OverlaySettings, ReadoutSync, SettingsStore, TimelineContext, TimelineError, TimelineIndex,
    TimelineListener, UNAVAILABLE,
};
use grib_data::config::{self, ConfigStore, PersistedSettings};
use grib_data::interpolate::{scalar_at, vector_at};
use grib_data::{DataSet, DataSlot, DirectionConvention, ForecastRecordSet, VectorSample};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::capability::{GribCapability, LayerUpdate};
use crate::clock::{Clock, SystemClock};
use crate::download::{DownloadArea, Downloader};
use crate::messages::ValueLookup;
use crate::FacadeError;

/// Step selected after a data set is loaded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StartOption {
    FirstForecast,
    #[default]
    NearestNow,
}

/// Collaborators handed to the core
pub struct CoreDeps {
    pub renderer: Arc<dyn OverlayRenderer>,
    pub config: Arc<dyn ConfigStore>,
    pub clock: Arc<dyn Clock>,
    pub downloader: Option<Arc<dyn Downloader>>,
    pub start_option: StartOption,
}

impl CoreDeps {
    pub fn new(renderer: Arc<dyn OverlayRenderer>, config: Arc<dyn ConfigStore>) -> Self {
        Self {
            renderer,
            config,
            clock: Arc::new(SystemClock),
            downloader: None,
            start_option: StartOption::default(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_downloader(mut self, downloader: Arc<dyn Downloader>) -> Self {
        self.downloader = Some(downloader);
        self
    }

    pub fn with_start_option(mut self, start_option: StartOption) -> Self {
        self.start_option = start_option;
        self
    }
}

pub struct GribCore {
    settings: SettingsStore,
    persisted: RwLock<PersistedSettings>,
    overlay: RwLock<OverlaySettings>,
    overlay_shown: RwLock<bool>,
    timeline: RwLock<TimelineIndex<Arc<ForecastRecordSet>>>,
    matrix: RwLock<LayerVisibilityMatrix>,
    data: RwLock<DataSlot>,
    readout: ReadoutSync,
    listeners: TimelineListeners,
    deps: CoreDeps,
}

fn context_at(timeline: &TimelineIndex<Arc<ForecastRecordSet>>, index: usize) -> Option<TimelineContext> {
    Some(TimelineContext {
        index,
        time: timeline.time_at(index)?,
        step_count: timeline.step_count(),
    })
}

fn convention(layer: LayerId) -> DirectionConvention {
    match layer {
        LayerId::Current => DirectionConvention::To,
        _ => DirectionConvention::From,
    }
}

impl GribCore {
    /// Build the core from persisted state
    pub fn new(deps: CoreDeps) -> Self {
        let store = deps.config.as_ref();
        let persisted = PersistedSettings::load(store);
        let overlay = config::load_overlay(store);
        let prefs = config::load_unit_preferences(store);

        let mut matrix = LayerVisibilityMatrix::new();
        config::load_layers(store, &mut matrix);
        matrix.apply_unit_preferences(&prefs);

        let readout = ReadoutSync::new();
        readout.refresh_all(&matrix);

        debug!(enabled = persisted.settings.enabled, parameter = persisted.settings.parameter, "core created");
        Self {
            settings: SettingsStore::new(persisted.settings),
            persisted: RwLock::new(persisted),
            overlay: RwLock::new(overlay),
            overlay_shown: RwLock::new(false),
            timeline: RwLock::new(TimelineIndex::new()),
            matrix: RwLock::new(matrix),
            data: RwLock::new(DataSlot::Empty),
            readout,
            listeners: TimelineListeners::new(),
            deps,
        }
    }

    pub fn add_timeline_listener(&self, listener: &Arc<dyn TimelineListener>) {
        self.listeners.add(listener);
    }

    pub fn readout(&self) -> &ReadoutSync {
        &self.readout
    }

    pub fn overlay_settings(&self) -> OverlaySettings {
        *self.overlay.read()
    }

    pub fn persisted(&self) -> PersistedSettings {
        self.persisted.read().clone()
    }

    /// Context of the selected step, `None` without one
    pub fn timeline_context(&self) -> Option<TimelineContext> {
        let timeline = self.timeline.read();
        context_at(&timeline, timeline.current_index()?)
    }

    // Data lifecycle

    /// A replacement is on its way: hide the current data until it arrives
    pub fn begin_loading(&self) {
        *self.data.write() = DataSlot::Loading;
        self.timeline.write().unload();
        self.readout.clear_values();
        self.deps.renderer.invalidate_all();
        debug!("data loading started");
    }

    /// Attach a decoded data set and select the start step
    pub fn load_data(&self, data: DataSet) -> DataChange {
        let now = self.deps.clock.now();
        let data = Arc::new(data);

        let (dropped, context) = {
            let mut timeline = self.timeline.write();
            let dropped = timeline.load(data.records().to_vec());
            let selected = match self.deps.start_option {
                StartOption::FirstForecast => timeline.select_first(),
                StartOption::NearestNow => timeline.select_nearest(now),
            };
            (dropped, selected.and_then(|idx| context_at(&timeline, idx)))
        };
        if dropped > 0 {
            warn!(source = data.source(), dropped, "duplicate reference times dropped");
        }

        let step_count = data.len() - dropped;
        info!(source = data.source(), steps = step_count, "forecast data loaded");
        *self.data.write() = DataSlot::Ready(data);

        self.readout.refresh_all(&self.matrix.read());
        self.deps.renderer.invalidate_all();
        match context {
            Some(context) => self.timeline_moved(context),
            None => self.deps.renderer.request_refresh(),
        }

        DataChange {
            step_count,
            has_active_file: true,
        }
    }

    pub fn clear_data(&self) -> DataChange {
        *self.data.write() = DataSlot::Empty;
        self.timeline.write().unload();
        self.readout.clear_values();
        self.deps.renderer.invalidate_all();
        self.deps.renderer.request_refresh();
        info!("forecast data cleared");
        DataChange {
            step_count: 0,
            has_active_file: false,
        }
    }

    /// Refresh the readout rows for a new cursor position
    pub fn update_cursor(&self, lat: f64, lon: f64) {
        let rows = self.readout.shown_rows();
        let values: Vec<(LayerId, String)> = rows
            .into_iter()
            .map(|layer| (layer, self.layer_value_at_point(layer as i32, lat, lon)))
            .collect();
        self.readout.update_values(values);
    }

    /// Write everything back to the config store
    pub fn save_config(&self) -> Result<(), FacadeError> {
        let store = self.deps.config.as_ref();
        let persisted = {
            let mut persisted = self.persisted.write();
            persisted.settings = self.settings.snapshot();
            persisted.clone()
        };
        let overlay = *self.overlay.read();
        let matrix = self.matrix.read().clone();

        persisted.save(store);
        config::save_overlay(store, &overlay);
        config::save_layers(store, &matrix);
        store.flush()?;
        debug!("configuration saved");
        Ok(())
    }

    fn timeline_moved(&self, context: TimelineContext) {
        self.deps.renderer.timeline_changed(&context);
        self.listeners.notify(&context);
    }

    fn ready_data(&self) -> Option<Arc<DataSet>> {
        self.data.read().ready().cloned()
    }

    fn record_at(&self, index: usize) -> Option<Arc<ForecastRecordSet>> {
        self.ready_data()?;
        self.timeline.read().get(index).cloned()
    }

    /// Apply a layer mutation, then reconcile, persist and invalidate
    fn mutate_layer<F>(&self, layer: i32, operation: &str, apply: F) -> Result<LayerUpdate, LayerError>
    where
        F: FnOnce(&mut LayerVisibilityMatrix) -> Result<bool, LayerError>,
    {
        let (id, changed, hidden, snapshot) = {
            let mut matrix = self.matrix.write();
            let id = matrix.resolve(layer, operation)?;
            let changed = apply(&mut matrix)?;
            let hidden = self.readout.resolve_display_conflicts(id, &mut matrix);
            (id, changed, hidden, matrix.clone())
        };

        let store = self.deps.config.as_ref();
        config::save_layer(store, &snapshot, id);
        for other in &hidden {
            config::save_layer(store, &snapshot, *other);
        }
        if let Err(e) = store.flush() {
            error!(layer = %id, error = %e, "failed to persist layer");
        }

        self.deps.renderer.invalidate_layer(id);
        for other in &hidden {
            self.deps.renderer.invalidate_layer(*other);
        }
        self.deps.renderer.request_refresh();
        debug!(layer = %id, operation, changed, hidden = hidden.len(), "layer updated");
        Ok(LayerUpdate { changed, hidden })
    }

    fn update_overlay<F>(&self, apply: F) -> bool
    where
        F: FnOnce(&mut OverlaySettings),
    {
        let (changed, overlay) = {
            let mut overlay = self.overlay.write();
            let before = *overlay;
            apply(&mut overlay);
            (*overlay != before, *overlay)
        };
        if changed {
            let store = self.deps.config.as_ref();
            config::save_overlay(store, &overlay);
            if let Err(e) = store.flush() {
                error!(error = %e, "failed to persist overlay settings");
            }
            self.deps.renderer.request_refresh();
        }
        changed
    }

    fn downloader(&self) -> Result<&Arc<dyn Downloader>, FacadeError> {
        self.deps.downloader.as_ref().ok_or(FacadeError::NoDownloader)
    }
}

impl GribCapability for GribCore {
    fn settings(&self) -> SettingsStore {
        self.settings.clone()
    }

    fn set_visible(&self, visible: bool) -> bool {
        let changed = std::mem::replace(&mut *self.overlay_shown.write(), visible) != visible;
        if changed {
            self.deps.renderer.request_refresh();
        }
        changed
    }

    fn is_visible(&self) -> bool {
        *self.overlay_shown.read()
    }

    fn set_overlay_transparency(&self, percent: i32) -> bool {
        self.update_overlay(|overlay| overlay.set_transparency_percent(percent))
    }

    fn overlay_transparency(&self) -> i32 {
        self.overlay.read().transparency_percent()
    }

    fn set_loop_mode(&self, on: bool) -> bool {
        self.update_overlay(|overlay| overlay.loop_mode = on)
    }

    fn loop_mode(&self) -> bool {
        self.overlay.read().loop_mode
    }

    fn set_playback_speed(&self, updates_per_second: i32) -> bool {
        self.update_overlay(|overlay| overlay.set_updates_per_second(updates_per_second))
    }

    fn playback_speed(&self) -> i32 {
        self.overlay.read().updates_per_second
    }

    fn set_symbol_spacing(&self, pixels: i32) -> bool {
        let (changed, snapshot) = {
            let mut matrix = self.matrix.write();
            (matrix.set_symbol_spacing(pixels), matrix.clone())
        };
        if changed {
            let store = self.deps.config.as_ref();
            for layer in [LayerId::Wind, LayerId::WindGust, LayerId::Wave, LayerId::Current] {
                config::save_layer(store, &snapshot, layer);
                self.deps.renderer.invalidate_layer(layer);
            }
            if let Err(e) = store.flush() {
                error!(error = %e, "failed to persist symbol spacing");
            }
            self.deps.renderer.request_refresh();
        }
        changed
    }

    fn symbol_spacing(&self) -> i32 {
        self.matrix.read().symbol_spacing()
    }

    fn start_world_download(&self, area: DownloadArea, hours: i32) -> Result<(), FacadeError> {
        let downloader = self.downloader()?;
        if !area.is_valid() || hours <= 0 {
            warn!(?area, hours, "start_world_download: invalid request");
            return Err(FacadeError::Download(format!("invalid area or duration ({hours} h)")));
        }
        info!(?area, hours, "world download requested");
        downloader.start(area, hours)
    }

    fn is_downloading(&self) -> bool {
        self.deps.downloader.as_ref().map(|d| d.is_downloading()).unwrap_or(false)
    }

    fn cancel_download(&self) {
        if let Some(downloader) = &self.deps.downloader {
            downloader.cancel();
        }
    }

    fn step_count(&self) -> usize {
        if self.ready_data().is_none() {
            return 0;
        }
        self.timeline.read().step_count()
    }

    fn current_index(&self) -> Option<usize> {
        self.ready_data()?;
        self.timeline.read().current_index()
    }

    fn set_time_index(&self, index: i64) -> Result<usize, TimelineError> {
        let selected = {
            let mut timeline = self.timeline.write();
            timeline
                .select(index)
                .map(|idx| (idx, context_at(&timeline, idx)))
        };
        match selected {
            Ok((idx, context)) => {
                if let Some(context) = context {
                    self.timeline_moved(context);
                }
                Ok(idx)
            }
            Err(e) => {
                warn!(index, error = %e, "set_time_index rejected");
                Err(e)
            }
        }
    }

    fn set_to_nearest_now(&self) -> bool {
        let now = self.deps.clock.now();
        let context = {
            let mut timeline = self.timeline.write();
            timeline
                .select_nearest(now)
                .and_then(|idx| context_at(&timeline, idx))
        };
        match context {
            Some(context) => {
                self.timeline_moved(context);
                true
            }
            None => {
                debug!("set_to_nearest_now without data, nothing to select");
                true
            }
        }
    }

    fn time_string(&self, index: usize, zone: DisplayZone) -> Option<String> {
        self.time_at(index).map(|time| format_time(time, zone))
    }

    fn current_time_string(&self, zone: DisplayZone) -> Option<String> {
        self.time_string(self.current_index()?, zone)
    }

    fn current_time_compact(&self) -> Option<String> {
        self.time_at(self.current_index()?).map(format_compact_utc)
    }

    fn set_layer_visible(&self, layer: i32, visible: bool) -> Result<LayerUpdate, LayerError> {
        self.mutate_layer(layer, "set_layer_visible", |matrix| matrix.set_visible(layer, visible))
    }

    fn is_layer_visible(&self, layer: i32) -> bool {
        self.matrix.read().is_visible(layer)
    }

    fn is_layer_available(&self, layer: i32) -> bool {
        let data = self.ready_data();
        let catalog = data.as_deref().map(|d| d as &dyn grib_core::FieldCatalog);
        self.matrix.read().is_available(layer, catalog)
    }

    fn set_display_flag(&self, layer: i32, flag: DisplayFlag, on: bool) -> Result<LayerUpdate, LayerError> {
        self.mutate_layer(layer, flag.config_key(), |matrix| matrix.set_flag(layer, flag, on))
    }

    fn display_flag(&self, layer: i32, flag: DisplayFlag) -> bool {
        self.matrix.read().flag(layer, flag)
    }

    fn set_iso_bar_visibility(&self, layer: i32, mode: IsoBarVisibility) -> Result<LayerUpdate, LayerError> {
        self.mutate_layer(layer, "set_iso_bar_visibility", |matrix| {
            matrix.set_iso_bar_visibility(layer, mode)
        })
    }

    fn iso_bar_visibility(&self, layer: i32) -> IsoBarVisibility {
        self.matrix.read().iso_bar_visibility(layer)
    }

    fn set_abbreviated_numbers(&self, layer: i32, on: bool) -> Result<LayerUpdate, LayerError> {
        self.mutate_layer(layer, "set_abbreviated_numbers", |matrix| {
            matrix.set_abbreviated_numbers(layer, on)
        })
    }

    fn abbreviated_numbers(&self, layer: i32) -> bool {
        self.matrix.read().abbreviated_numbers(layer)
    }

    fn sync_units(&self) -> Vec<LayerId> {
        let store = self.deps.config.as_ref();
        let prefs = config::load_unit_preferences(store);
        let (changed, snapshot) = {
            let mut matrix = self.matrix.write();
            (matrix.apply_unit_preferences(&prefs), matrix.clone())
        };
        if !changed.is_empty() {
            for layer in &changed {
                config::save_layer(store, &snapshot, *layer);
            }
            if let Err(e) = store.flush() {
                error!(error = %e, "failed to persist layer units");
            }
            self.deps.renderer.invalidate_all();
            self.deps.renderer.request_refresh();
        }
        info!(changed = changed.len(), "unit preferences synced");
        changed
    }

    fn layer_value_at_point(&self, layer: i32, lat: f64, lon: f64) -> String {
        let Some(id) = LayerId::from_index(layer) else {
            warn!(layer, "layer_value_at_point: invalid layer id");
            return UNAVAILABLE.to_string();
        };
        let Some(index) = self.current_index() else {
            return UNAVAILABLE.to_string();
        };
        match self.scalar_value_at(id, index, lat, lon) {
            Some(value) => self.layer_unit(id).format(value),
            None => UNAVAILABLE.to_string(),
        }
    }

    fn has_active_file(&self) -> bool {
        self.ready_data().is_some()
    }

    fn time_at(&self, index: usize) -> Option<DateTime<Utc>> {
        self.ready_data()?;
        self.timeline.read().time_at(index)
    }

    fn time_range(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        self.ready_data()?;
        self.timeline.read().time_range()
    }

    /// Vector layers report their magnitude
    fn scalar_value_at(&self, layer: LayerId, index: usize, lat: f64, lon: f64) -> Option<f64> {
        if layer.is_vector() {
            return self.vector_value_at(layer, index, lat, lon).map(|s| s.magnitude);
        }
        let record = self.record_at(index)?;
        record.sample(layer.scalar_field()?, lat, lon)
    }

    fn vector_value_at(&self, layer: LayerId, index: usize, lat: f64, lon: f64) -> Option<VectorSample> {
        let (u, v) = layer.vector_components()?;
        let record = self.record_at(index)?;
        let u = record.sample(u, lat, lon)?;
        let v = record.sample(v, lat, lon)?;
        Some(VectorSample::from_components(u, v, convention(layer)))
    }

    fn layer_unit(&self, layer: LayerId) -> LayerUnit {
        self.matrix.read().unit(layer)
    }
}

impl ValueLookup for GribCore {
    fn vector_at_time(&self, layer: LayerId, time: DateTime<Utc>, lat: f64, lon: f64) -> Option<VectorSample> {
        let components = layer.vector_components()?;
        self.ready_data()?;
        let timeline = self.timeline.read();
        let bracket = timeline.bracket(time)?;
        vector_at(timeline.records(), bracket, components, convention(layer), lat, lon)
    }

    fn scalar_at_time(&self, field: FieldKind, time: DateTime<Utc>, lat: f64, lon: f64) -> Option<f64> {
        self.ready_data()?;
        let timeline = self.timeline.read();
        let bracket = timeline.bracket(time)?;
        scalar_at(timeline.records(), bracket, field, lat, lon)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use chrono::{Duration, TimeZone};
    use grib_data::{MemoryConfig, RegularGrid, RenderCache};

    pub(crate) fn base_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2021, 12, 15, 0, 0, 0).unwrap()
    }

    fn grid(value: f64) -> RegularGrid {
        RegularGrid::uniform((0.0, 0.0), (1.0, 1.0), (31, 31), value)
    }

    /// Five steps, three hours apart, with wind from the north growing 2 m/s
    /// per step and a gust field on every step
    pub(crate) fn sample_data() -> DataSet {
        let records = (0..5)
            .map(|step| {
                ForecastRecordSet::new(base_time() + Duration::hours(3 * step))
                    .with_field(FieldKind::WindU, grid(0.0))
                    .with_field(FieldKind::WindV, grid(-(10.0 + 2.0 * step as f64)))
                    .with_field(FieldKind::Gust, grid(15.0))
            })
            .collect();
        DataSet::new("sample", records)
    }

    pub(crate) struct Fixture {
        pub core: Arc<GribCore>,
        pub renderer: Arc<RenderCache>,
        pub config: Arc<MemoryConfig>,
        pub clock: Arc<FixedClock>,
    }

    pub(crate) fn fixture() -> Fixture {
        let renderer = Arc::new(RenderCache::new());
        let config = Arc::new(MemoryConfig::new());
        let clock = Arc::new(FixedClock::new(base_time() + Duration::hours(7)));
        let deps = CoreDeps::new(renderer.clone(), config.clone()).with_clock(clock.clone());
        Fixture {
            core: Arc::new(GribCore::new(deps)),
            renderer,
            config,
            clock,
        }
    }

    #[test]
    fn test_empty_core_returns_placeholders() {
        let f = fixture();
        assert_eq!(f.core.step_count(), 0);
        assert_eq!(f.core.current_index(), None);
        assert!(!f.core.has_active_file());
        assert_eq!(f.core.layer_value_at_point(LayerId::Wind as i32, 10.0, 20.0), UNAVAILABLE);
        assert!(!f.core.is_layer_available(LayerId::Wind as i32));
        assert!(matches!(f.core.set_time_index(0), Err(TimelineError::NotLoaded)));
    }

    #[test]
    fn test_nearest_now_without_data_is_noop() {
        let f = fixture();
        let refreshes = f.renderer.refresh_count();
        assert!(f.core.set_to_nearest_now());
        assert_eq!(f.core.current_index(), None);
        assert_eq!(f.renderer.refresh_count(), refreshes);
        assert!(f.renderer.last_timeline().is_none());
    }

    #[test]
    fn test_load_selects_nearest_step() {
        let f = fixture();
        let change = f.core.load_data(sample_data());
        assert_eq!(change.step_count, 5);
        assert!(change.has_active_file);

        // 07:00 is nearest to the 06:00 step
        assert_eq!(f.core.current_index(), Some(2));
        assert_eq!(f.renderer.last_timeline().map(|c| c.index), Some(2));
        assert!(f.core.is_layer_available(LayerId::Wind as i32));
        assert!(!f.core.is_layer_available(LayerId::Current as i32));
    }

    #[test]
    fn test_set_time_index_bounds() {
        let f = fixture();
        f.core.load_data(sample_data());

        assert_eq!(f.core.set_time_index(4).unwrap(), 4);
        assert_eq!(f.core.current_index(), Some(4));
        assert!(f.core.set_time_index(5).is_err());
        assert!(f.core.set_time_index(-1).is_err());
        assert_eq!(f.core.current_index(), Some(4));
        assert_eq!(f.renderer.last_timeline().map(|c| c.index), Some(4));
    }

    #[test]
    fn test_loading_hides_data() {
        let f = fixture();
        f.core.load_data(sample_data());
        f.core.begin_loading();
        assert_eq!(f.core.step_count(), 0);
        assert!(f.core.time_range().is_none());
        assert_eq!(f.core.layer_value_at_point(0, 10.0, 20.0), UNAVAILABLE);
    }

    #[test]
    fn test_layer_value_formats_in_layer_unit() {
        let f = fixture();
        f.core.load_data(sample_data());
        f.core.set_time_index(0).unwrap();

        // 10 m/s in knots
        assert_eq!(f.core.layer_value_at_point(LayerId::Wind as i32, 10.0, 20.0), "19.4 kts");
        assert_eq!(f.core.layer_value_at_point(LayerId::Wind as i32, 60.0, 20.0), UNAVAILABLE);
        assert_eq!(f.core.layer_value_at_point(99, 10.0, 20.0), UNAVAILABLE);

        let wind = f.core.vector_value_at(LayerId::Wind, 0, 10.0, 20.0).unwrap();
        assert!((wind.direction - 0.0).abs() < 1e-9);
    }

    #[test]
    fn test_layer_mutator_persists_and_invalidates() {
        let f = fixture();
        let gen = f.renderer.generation(LayerId::Pressure);

        assert!(f.core.set_display_flag(LayerId::Pressure as i32, DisplayFlag::Numbers, true).unwrap().changed);
        assert!(f.core.display_flag(LayerId::Pressure as i32, DisplayFlag::Numbers));
        assert!(f.renderer.generation(LayerId::Pressure) > gen);
        assert_eq!(f.config.read("/PlugIns/GRIB/Pressure/Numbers").as_deref(), Some("1"));

        assert!(f.core.set_layer_visible(LAYER_OUT_OF_RANGE, true).is_err());
        assert!(!f.core.is_layer_visible(LAYER_OUT_OF_RANGE));
    }

    const LAYER_OUT_OF_RANGE: i32 = 13;

    #[test]
    fn test_interpolated_lookup() {
        let f = fixture();
        f.core.load_data(sample_data());

        // Halfway between 10 and 12 m/s
        let time = base_time() + Duration::minutes(90);
        let wind = f.core.vector_at_time(LayerId::Wind, time, 10.0, 20.0).unwrap();
        assert!((wind.magnitude - 11.0).abs() < 1e-9);
        assert_eq!(f.core.scalar_at_time(FieldKind::Gust, time, 10.0, 20.0), Some(15.0));
        assert!(f.core.vector_at_time(LayerId::Wind, base_time() - Duration::hours(1), 10.0, 20.0).is_none());
    }

    #[test]
    fn test_overlay_settings() {
        let f = fixture();
        assert_eq!(f.core.overlay_transparency(), 50);
        assert_eq!(f.core.playback_speed(), 4);
        assert!(f.core.set_overlay_transparency(150));
        assert_eq!(f.core.overlay_transparency(), 100);
        assert!(!f.core.set_overlay_transparency(100));

        assert!(f.core.set_playback_speed(0));
        assert_eq!(f.core.playback_speed(), 1);
        assert!(f.core.set_symbol_spacing(80));
        assert_eq!(f.core.symbol_spacing(), 80);
    }

    #[test]
    fn test_sync_units_follows_preferences() {
        let f = fixture();
        // External 3 is m/s for speeds
        f.config.write("/Settings/Units/WindSpeed", "3");
        let changed = f.core.sync_units();
        assert_eq!(changed, vec![LayerId::Wind, LayerId::WindGust]);
        assert_eq!(f.core.layer_unit(LayerId::Wind).label(), "m/s");
        assert_eq!(f.core.layer_unit(LayerId::Current).label(), "kts");
    }

    #[test]
    fn test_nearest_now_follows_clock() {
        let f = fixture();
        f.core.load_data(sample_data());
        f.clock.set(base_time() + Duration::hours(11));
        assert!(f.core.set_to_nearest_now());
        assert_eq!(f.core.current_index(), Some(4));
    }

    #[test]
    fn test_download_without_collaborator() {
        let f = fixture();
        let area = DownloadArea::new(0.0, 0.0, 10.0, 10.0);
        assert!(matches!(f.core.start_world_download(area, 24), Err(FacadeError::NoDownloader)));
        assert!(!f.core.is_downloading());
        f.core.cancel_download();
    }
}
