//! Key/value configuration collaborator and the persisted settings block

use ahash::AHashMap;
use grib_core::layers::{DisplayFlag, IsoBarVisibility, LayerId, LayerVisibilityMatrix};
use grib_core::{OverlaySettings, Settings, UnitPreferences};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::DataError;

pub const SECTION: &str = "/PlugIns/GRIB";
pub const UNITS_SECTION: &str = "/Settings/Units";
pub const DIRECTORY_KEY: &str = "/Directories/GRIBDirectory";

/// Flat key/value store the host persists for us
///
/// Values are strings; the typed helpers fall back to the given default
/// when a key is missing or does not parse.
pub trait ConfigStore: Send + Sync {
    fn read(&self, key: &str) -> Option<String>;

    fn write(&self, key: &str, value: &str);

    /// Commit pending writes
    fn flush(&self) -> Result<(), DataError> {
        Ok(())
    }

    fn read_bool(&self, key: &str, default: bool) -> bool {
        match self.read(key).as_deref() {
            Some("1") | Some("true") => true,
            Some("0") | Some("false") => false,
            Some(other) => {
                warn!(key, value = other, "unreadable bool, using default");
                default
            }
            None => default,
        }
    }

    fn read_i32(&self, key: &str, default: i32) -> i32 {
        self.read(key)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(default)
    }

    fn read_f64(&self, key: &str, default: f64) -> f64 {
        self.read(key)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(default)
    }

    fn read_string(&self, key: &str, default: &str) -> String {
        self.read(key).unwrap_or_else(|| default.to_string())
    }

    fn write_bool(&self, key: &str, value: bool) {
        self.write(key, if value { "1" } else { "0" });
    }

    fn write_i32(&self, key: &str, value: i32) {
        self.write(key, &value.to_string());
    }

    fn write_f64(&self, key: &str, value: f64) {
        self.write(key, &value.to_string());
    }
}

/// In-process store, also usable as a JSON snapshot
#[derive(Debug, Default)]
pub struct MemoryConfig {
    values: RwLock<AHashMap<String, String>>,
}

impl MemoryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(json: &str) -> Result<Self, DataError> {
        let values: AHashMap<String, String> = serde_json::from_str(json)?;
        Ok(Self {
            values: RwLock::new(values),
        })
    }

    /// Snapshot with sorted keys
    pub fn to_json(&self) -> Result<String, DataError> {
        let values = self.values.read();
        let sorted: std::collections::BTreeMap<_, _> = values.iter().collect();
        Ok(serde_json::to_string_pretty(&sorted)?)
    }

    pub fn len(&self) -> usize {
        self.values.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ConfigStore for MemoryConfig {
    fn read(&self, key: &str) -> Option<String> {
        self.values.read().get(key).cloned()
    }

    fn write(&self, key: &str, value: &str) {
        self.values.write().insert(key.to_string(), value.to_string());
    }
}

fn key(name: &str) -> String {
    format!("{SECTION}/{name}")
}

fn layer_key(layer: LayerId, name: &str) -> String {
    format!("{SECTION}/{}/{name}", layer.config_name())
}

/// Top-level preference block with the host's documented defaults
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedSettings {
    pub settings: Settings,
    pub load_last_open_file: i32,
    pub open_file_option: i32,
    pub use_hi_def: bool,
    pub use_gradual_colors: bool,
    pub draw_barbed_arrow_head: bool,
    pub zoom_to_center_at_init: bool,
    pub show_icon: bool,
    pub copy_first_cumulative_record: bool,
    pub copy_missing_wave_record: bool,
    pub ctrl_bar_size: (i32, i32),
    pub ctrl_bar_pos: (i32, i32),
    pub cursor_data_pos: (i32, i32),
    /// 0..=3, anything else resets to 0
    pub cursor_data_display_style: i32,
    pub grib_directory: String,
}

impl Default for PersistedSettings {
    fn default() -> Self {
        Self {
            settings: Settings::default(),
            load_last_open_file: 0,
            open_file_option: 1,
            use_hi_def: false,
            use_gradual_colors: false,
            draw_barbed_arrow_head: true,
            zoom_to_center_at_init: true,
            show_icon: true,
            copy_first_cumulative_record: true,
            copy_missing_wave_record: true,
            ctrl_bar_size: (1400, 800),
            ctrl_bar_pos: (20, 60),
            cursor_data_pos: (20, 170),
            cursor_data_display_style: 0,
            grib_directory: String::new(),
        }
    }
}

impl PersistedSettings {
    pub fn load(store: &dyn ConfigStore) -> Self {
        let d = Self::default();
        let mut style = store.read_i32(&key("GribCursorDataDisplayStyle"), d.cursor_data_display_style);
        if !(0..=3).contains(&style) {
            debug!(style, "cursor data display style out of range, reset");
            style = 0;
        }

        Self {
            settings: Settings {
                enabled: store.read_bool(&key("Enabled"), d.settings.enabled),
                parameter: store
                    .read_i32(&key("Parameter"), d.settings.parameter)
                    .clamp(grib_core::state::PARAMETER_MIN, grib_core::state::PARAMETER_MAX),
            },
            load_last_open_file: store.read_i32(&key("LoadLastOpenFile"), d.load_last_open_file),
            open_file_option: store.read_i32(&key("OpenFileOption"), d.open_file_option),
            use_hi_def: store.read_bool(&key("GRIBUseHiDef"), d.use_hi_def),
            use_gradual_colors: store.read_bool(&key("GRIBUseGradualColors"), d.use_gradual_colors),
            draw_barbed_arrow_head: store.read_bool(&key("DrawBarbedArrowHead"), d.draw_barbed_arrow_head),
            zoom_to_center_at_init: store.read_bool(&key("ZoomToCenterAtInit"), d.zoom_to_center_at_init),
            show_icon: store.read_bool(&key("ShowGRIBIcon"), d.show_icon),
            copy_first_cumulative_record: store
                .read_bool(&key("CopyFirstCumulativeRecord"), d.copy_first_cumulative_record),
            copy_missing_wave_record: store.read_bool(&key("CopyMissingWaveRecord"), d.copy_missing_wave_record),
            ctrl_bar_size: (
                store.read_i32(&key("GRIBCtrlBarSizeX"), d.ctrl_bar_size.0),
                store.read_i32(&key("GRIBCtrlBarSizeY"), d.ctrl_bar_size.1),
            ),
            ctrl_bar_pos: (
                store.read_i32(&key("GRIBCtrlBarPosX"), d.ctrl_bar_pos.0),
                store.read_i32(&key("GRIBCtrlBarPosY"), d.ctrl_bar_pos.1),
            ),
            cursor_data_pos: (
                store.read_i32(&key("GRIBCursorDataPosX"), d.cursor_data_pos.0),
                store.read_i32(&key("GRIBCursorDataPosY"), d.cursor_data_pos.1),
            ),
            cursor_data_display_style: style,
            grib_directory: store.read_string(DIRECTORY_KEY, &d.grib_directory),
        }
    }

    pub fn save(&self, store: &dyn ConfigStore) {
        store.write_bool(&key("Enabled"), self.settings.enabled);
        store.write_i32(&key("Parameter"), self.settings.parameter);
        store.write_i32(&key("LoadLastOpenFile"), self.load_last_open_file);
        store.write_i32(&key("OpenFileOption"), self.open_file_option);
        store.write_bool(&key("GRIBUseHiDef"), self.use_hi_def);
        store.write_bool(&key("GRIBUseGradualColors"), self.use_gradual_colors);
        store.write_bool(&key("DrawBarbedArrowHead"), self.draw_barbed_arrow_head);
        store.write_bool(&key("ZoomToCenterAtInit"), self.zoom_to_center_at_init);
        store.write_bool(&key("ShowGRIBIcon"), self.show_icon);
        store.write_bool(&key("CopyFirstCumulativeRecord"), self.copy_first_cumulative_record);
        store.write_bool(&key("CopyMissingWaveRecord"), self.copy_missing_wave_record);
        store.write_i32(&key("GRIBCtrlBarSizeX"), self.ctrl_bar_size.0);
        store.write_i32(&key("GRIBCtrlBarSizeY"), self.ctrl_bar_size.1);
        store.write_i32(&key("GRIBCtrlBarPosX"), self.ctrl_bar_pos.0);
        store.write_i32(&key("GRIBCtrlBarPosY"), self.ctrl_bar_pos.1);
        store.write_i32(&key("GRIBCursorDataPosX"), self.cursor_data_pos.0);
        store.write_i32(&key("GRIBCursorDataPosY"), self.cursor_data_pos.1);
        store.write_i32(&key("GribCursorDataDisplayStyle"), self.cursor_data_display_style);
        store.write(DIRECTORY_KEY, &self.grib_directory);
    }
}

/// Read every layer entry, keeping matrix defaults for missing keys
pub fn load_layers(store: &dyn ConfigStore, matrix: &mut LayerVisibilityMatrix) {
    for layer in LayerId::ALL {
        let entry = matrix.entry_mut(layer);
        entry.visible = store.read_bool(&layer_key(layer, "Visible"), entry.visible);
        entry.barbed_arrows = store.read_bool(&layer_key(layer, "BarbedArrows"), entry.barbed_arrows);
        entry.iso_bars = store.read_bool(&layer_key(layer, "IsoBars"), entry.iso_bars);
        entry.numbers = store.read_bool(&layer_key(layer, "Numbers"), entry.numbers);
        entry.overlay_map = store.read_bool(&layer_key(layer, "OverlayMap"), entry.overlay_map);
        entry.direction_arrows = store.read_bool(&layer_key(layer, "DirectionArrows"), entry.direction_arrows);
        entry.particles = store.read_bool(&layer_key(layer, "Particles"), entry.particles);
        entry.iso_bar_visibility = IsoBarVisibility::from(
            store.read_bool(&layer_key(layer, "IsoBarVisibility"), entry.iso_bar_visibility.into()),
        );
        entry.abbreviated_numbers = store.read_bool(&layer_key(layer, "AbbrNumbers"), entry.abbreviated_numbers);

        let ordinal = store.read_i32(&layer_key(layer, "Units"), entry.unit.ordinal());
        entry.unit = entry.unit.with_ordinal(ordinal).unwrap_or(entry.unit);

        entry.barb_spacing = store.read_i32(&layer_key(layer, "BarbedArrowSpacing"), entry.barb_spacing);
        entry.arrow_spacing = store.read_i32(&layer_key(layer, "DirectionArrowSpacing"), entry.arrow_spacing);
        entry.particle_density = store.read_f64(&layer_key(layer, "ParticleDensity"), entry.particle_density);
    }
}

pub fn save_layer(store: &dyn ConfigStore, matrix: &LayerVisibilityMatrix, layer: LayerId) {
    let entry = matrix.entry(layer);
    store.write_bool(&layer_key(layer, "Visible"), entry.visible);
    for flag in DisplayFlag::ALL {
        store.write_bool(&layer_key(layer, flag.config_key()), entry.flag(flag));
    }
    store.write_bool(&layer_key(layer, "IsoBarVisibility"), entry.iso_bar_visibility.into());
    store.write_bool(&layer_key(layer, "AbbrNumbers"), entry.abbreviated_numbers);
    store.write_i32(&layer_key(layer, "Units"), entry.unit.ordinal());
    store.write_i32(&layer_key(layer, "BarbedArrowSpacing"), entry.barb_spacing);
    store.write_i32(&layer_key(layer, "DirectionArrowSpacing"), entry.arrow_spacing);
    store.write_f64(&layer_key(layer, "ParticleDensity"), entry.particle_density);
}

pub fn save_layers(store: &dyn ConfigStore, matrix: &LayerVisibilityMatrix) {
    for layer in LayerId::ALL {
        save_layer(store, matrix, layer);
    }
}

pub fn load_overlay(store: &dyn ConfigStore) -> OverlaySettings {
    let d = OverlaySettings::default();
    let mut overlay = OverlaySettings {
        overlay_alpha: store
            .read_i32(&key("OverlayTransparency"), d.overlay_alpha)
            .clamp(0, grib_core::state::OVERLAY_ALPHA_MAX),
        loop_mode: store.read_bool(&key("LoopMode"), d.loop_mode),
        updates_per_second: d.updates_per_second,
    };
    overlay.set_updates_per_second(store.read_i32(&key("UpdatesPerSecond"), d.updates_per_second));
    overlay
}

pub fn save_overlay(store: &dyn ConfigStore, overlay: &OverlaySettings) {
    store.write_i32(&key("OverlayTransparency"), overlay.overlay_alpha);
    store.write_bool(&key("LoopMode"), overlay.loop_mode);
    store.write_i32(&key("UpdatesPerSecond"), overlay.updates_per_second);
}

/// Host unit preferences; missing keys read as ordinal 0
pub fn load_unit_preferences(store: &dyn ConfigStore) -> UnitPreferences {
    let read = |name: &str| store.read_i32(&format!("{UNITS_SECTION}/{name}"), 0);
    UnitPreferences {
        wind_speed: read("WindSpeed"),
        speed: read("Speed"),
        depth: read("Depth"),
        temperature: read("Temperature"),
        pressure: read("Pressure"),
        rainfall: read("Rainfall"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use grib_core::units::{LayerUnit, SpeedUnit};

    #[test]
    fn test_defaults_when_empty() {
        let store = MemoryConfig::new();
        let loaded = PersistedSettings::load(&store);
        assert_eq!(loaded, PersistedSettings::default());
        assert_eq!(loaded.settings.parameter, 50);
        assert_eq!(loaded.ctrl_bar_size, (1400, 800));
        assert_eq!(loaded.cursor_data_pos, (20, 170));
    }

    #[test]
    fn test_display_style_reset() {
        let store = MemoryConfig::new();
        store.write("/PlugIns/GRIB/GribCursorDataDisplayStyle", "7");
        assert_eq!(PersistedSettings::load(&store).cursor_data_display_style, 0);
        store.write("/PlugIns/GRIB/GribCursorDataDisplayStyle", "3");
        assert_eq!(PersistedSettings::load(&store).cursor_data_display_style, 3);
    }

    #[test]
    fn test_save_then_load() {
        let store = MemoryConfig::new();
        let mut settings = PersistedSettings::default();
        settings.settings.enabled = true;
        settings.settings.parameter = 77;
        settings.grib_directory = "/data/grib".into();
        settings.save(&store);

        assert_eq!(store.read("/PlugIns/GRIB/Enabled").as_deref(), Some("1"));
        assert_eq!(PersistedSettings::load(&store), settings);
    }

    #[test]
    fn test_layers_persist() {
        let store = MemoryConfig::new();
        let mut matrix = LayerVisibilityMatrix::new();
        matrix.set_flag(LayerId::Wave as i32, DisplayFlag::Particles, true).unwrap();
        matrix.set_unit(LayerId::Wind, LayerUnit::Speed(SpeedUnit::Beaufort)).unwrap();
        save_layers(&store, &matrix);

        assert_eq!(store.read("/PlugIns/GRIB/Waves/Particles").as_deref(), Some("1"));

        let mut restored = LayerVisibilityMatrix::new();
        load_layers(&store, &mut restored);
        assert_eq!(restored, matrix);
    }

    #[test]
    fn test_unit_preferences_and_json_snapshot() {
        let store = MemoryConfig::from_json(r#"{"/Settings/Units/WindSpeed": "3", "/Settings/Units/Depth": "junk"}"#).unwrap();
        let prefs = load_unit_preferences(&store);
        assert_eq!(prefs.wind_speed, 3);
        assert_eq!(prefs.depth, 0);
        assert!(store.to_json().unwrap().contains("WindSpeed"));
    }

    #[test]
    fn test_overlay_speed_minimum() {
        let store = MemoryConfig::new();
        store.write_i32("/PlugIns/GRIB/UpdatesPerSecond", 0);
        assert_eq!(load_overlay(&store).updates_per_second, 1);
    }
}
