//! Fixed-size per-layer display table

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use super::{DisplayFlag, FieldCatalog, IsoBarVisibility, LayerId, LAYER_COUNT};
use crate::units::{density_for_spacing, LayerUnit, UnitPreferences};

/// Symbol spacing in pixels before the user changes it
pub const DEFAULT_SYMBOL_SPACING: i32 = 50;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LayerError {
    #[error("invalid layer id {0}")]
    InvalidLayer(i32),

    #[error("unit {unit:?} does not apply to layer {layer}")]
    UnitMismatch { layer: LayerId, unit: LayerUnit },
}

/// Display state of one layer
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LayerEntry {
    /// Layer is plotted at all
    pub visible: bool,
    pub barbed_arrows: bool,
    pub iso_bars: bool,
    pub numbers: bool,
    pub overlay_map: bool,
    pub direction_arrows: bool,
    pub particles: bool,
    pub iso_bar_visibility: IsoBarVisibility,
    pub abbreviated_numbers: bool,
    pub unit: LayerUnit,
    pub barb_spacing: i32,
    pub arrow_spacing: i32,
    pub particle_density: f64,
}

impl LayerEntry {
    pub fn defaults_for(layer: LayerId) -> Self {
        let vector_arrows = matches!(layer, LayerId::Wave | LayerId::Current);
        Self {
            visible: matches!(layer, LayerId::Wind | LayerId::Pressure),
            barbed_arrows: layer == LayerId::Wind,
            iso_bars: layer == LayerId::Pressure,
            numbers: false,
            overlay_map: !matches!(layer, LayerId::Wind | LayerId::Pressure),
            direction_arrows: vector_arrows,
            particles: false,
            iso_bar_visibility: IsoBarVisibility::Standard,
            abbreviated_numbers: false,
            unit: layer.default_unit(),
            barb_spacing: DEFAULT_SYMBOL_SPACING,
            arrow_spacing: DEFAULT_SYMBOL_SPACING,
            particle_density: density_for_spacing(DEFAULT_SYMBOL_SPACING),
        }
    }

    pub fn flag(&self, flag: DisplayFlag) -> bool {
        match flag {
            DisplayFlag::BarbedArrows => self.barbed_arrows,
            DisplayFlag::IsoBars => self.iso_bars,
            DisplayFlag::Numbers => self.numbers,
            DisplayFlag::OverlayMap => self.overlay_map,
            DisplayFlag::DirectionArrows => self.direction_arrows,
            DisplayFlag::Particles => self.particles,
        }
    }

    fn flag_mut(&mut self, flag: DisplayFlag) -> &mut bool {
        match flag {
            DisplayFlag::BarbedArrows => &mut self.barbed_arrows,
            DisplayFlag::IsoBars => &mut self.iso_bars,
            DisplayFlag::Numbers => &mut self.numbers,
            DisplayFlag::OverlayMap => &mut self.overlay_map,
            DisplayFlag::DirectionArrows => &mut self.direction_arrows,
            DisplayFlag::Particles => &mut self.particles,
        }
    }

    /// At least one of the six toggles is on
    pub fn any_display(&self) -> bool {
        DisplayFlag::ALL.iter().any(|flag| self.flag(*flag))
    }
}

/// One [`LayerEntry`] per [`LayerId`], indexed by id
///
/// Operations take the raw id from the facade boundary. Invalid ids log a
/// warning and yield `false` (getters) or [`LayerError::InvalidLayer`]
/// (setters); nothing is written. Setters report whether the stored value
/// changed.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerVisibilityMatrix {
    entries: [LayerEntry; LAYER_COUNT],
}

impl Default for LayerVisibilityMatrix {
    fn default() -> Self {
        Self {
            entries: std::array::from_fn(|idx| LayerEntry::defaults_for(LayerId::ALL[idx])),
        }
    }
}

impl LayerVisibilityMatrix {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate a raw id, logging on failure
    pub fn resolve(&self, layer: i32, operation: &str) -> Result<LayerId, LayerError> {
        LayerId::from_index(layer).ok_or_else(|| {
            warn!(layer, operation, "invalid layer id");
            LayerError::InvalidLayer(layer)
        })
    }

    pub fn entry(&self, layer: LayerId) -> &LayerEntry {
        &self.entries[layer.index()]
    }

    pub fn entry_mut(&mut self, layer: LayerId) -> &mut LayerEntry {
        &mut self.entries[layer.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = (LayerId, &LayerEntry)> {
        LayerId::ALL.iter().copied().zip(self.entries.iter())
    }

    pub fn is_visible(&self, layer: i32) -> bool {
        self.read(layer, "is_visible", |entry| entry.visible)
    }

    pub fn set_visible(&mut self, layer: i32, visible: bool) -> Result<bool, LayerError> {
        self.write(layer, "set_visible", |entry| replace(&mut entry.visible, visible))
    }

    pub fn flag(&self, layer: i32, flag: DisplayFlag) -> bool {
        self.read(layer, flag.config_key(), |entry| entry.flag(flag))
    }

    pub fn set_flag(&mut self, layer: i32, flag: DisplayFlag, on: bool) -> Result<bool, LayerError> {
        self.write(layer, flag.config_key(), |entry| replace(entry.flag_mut(flag), on))
    }

    pub fn iso_bar_visibility(&self, layer: i32) -> IsoBarVisibility {
        LayerId::from_index(layer)
            .map(|id| self.entry(id).iso_bar_visibility)
            .unwrap_or_else(|| {
                warn!(layer, "iso_bar_visibility: invalid layer id");
                IsoBarVisibility::Standard
            })
    }

    pub fn set_iso_bar_visibility(&mut self, layer: i32, mode: IsoBarVisibility) -> Result<bool, LayerError> {
        self.write(layer, "set_iso_bar_visibility", |entry| replace(&mut entry.iso_bar_visibility, mode))
    }

    pub fn abbreviated_numbers(&self, layer: i32) -> bool {
        self.read(layer, "abbreviated_numbers", |entry| entry.abbreviated_numbers)
    }

    pub fn set_abbreviated_numbers(&mut self, layer: i32, on: bool) -> Result<bool, LayerError> {
        self.write(layer, "set_abbreviated_numbers", |entry| replace(&mut entry.abbreviated_numbers, on))
    }

    pub fn unit(&self, layer: LayerId) -> LayerUnit {
        self.entry(layer).unit
    }

    /// Change a layer's unit; the unit must measure the layer's quantity
    pub fn set_unit(&mut self, layer: LayerId, unit: LayerUnit) -> Result<bool, LayerError> {
        if std::mem::discriminant(&unit) != std::mem::discriminant(&layer.default_unit()) {
            return Err(LayerError::UnitMismatch { layer, unit });
        }
        Ok(replace(&mut self.entry_mut(layer).unit, unit))
    }

    /// Re-derive units of every preference-driven layer. Returns the layers
    /// whose unit changed.
    pub fn apply_unit_preferences(&mut self, prefs: &UnitPreferences) -> Vec<LayerId> {
        let mut changed = Vec::new();
        for layer in LayerId::ALL {
            if !layer.follows_unit_preferences() {
                continue;
            }
            let Some(quantity) = layer.quantity() else {
                continue;
            };
            let wind = matches!(layer, LayerId::Wind | LayerId::WindGust);
            let ordinal = prefs.internal(quantity, wind);
            let current = self.unit(layer);
            if let Some(unit) = current.with_ordinal(ordinal) {
                if replace(&mut self.entry_mut(layer).unit, unit) {
                    changed.push(layer);
                }
            }
        }
        debug!(changed = changed.len(), "unit preferences applied");
        changed
    }

    /// Whether the loaded data holds every field the layer needs
    ///
    /// Display toggles are not consulted. Without data nothing is available.
    pub fn is_available(&self, layer: i32, catalog: Option<&dyn FieldCatalog>) -> bool {
        let Ok(id) = self.resolve(layer, "is_available") else {
            return false;
        };
        match catalog {
            Some(catalog) => id.required_fields().iter().all(|field| catalog.contains(*field)),
            None => false,
        }
    }

    /// Barb spacing of the wind layer, which stands in for the global value
    pub fn symbol_spacing(&self) -> i32 {
        self.entry(LayerId::Wind).barb_spacing
    }

    /// Apply one spacing to every symbol-drawing layer. Returns whether
    /// anything changed.
    pub fn set_symbol_spacing(&mut self, pixels: i32) -> bool {
        let density = density_for_spacing(pixels);
        let mut changed = false;

        let wind = self.entry_mut(LayerId::Wind);
        changed |= replace(&mut wind.barb_spacing, pixels);
        changed |= replace_f64(&mut wind.particle_density, density);

        changed |= replace(&mut self.entry_mut(LayerId::WindGust).barb_spacing, pixels);
        changed |= replace(&mut self.entry_mut(LayerId::Wave).arrow_spacing, pixels);

        let current = self.entry_mut(LayerId::Current);
        changed |= replace(&mut current.arrow_spacing, pixels);
        changed |= replace_f64(&mut current.particle_density, density);

        changed
    }

    fn read(&self, layer: i32, operation: &str, get: impl FnOnce(&LayerEntry) -> bool) -> bool {
        match self.resolve(layer, operation) {
            Ok(id) => get(self.entry(id)),
            Err(_) => false,
        }
    }

    fn write(
        &mut self,
        layer: i32,
        operation: &str,
        set: impl FnOnce(&mut LayerEntry) -> bool,
    ) -> Result<bool, LayerError> {
        let id = self.resolve(layer, operation)?;
        Ok(set(self.entry_mut(id)))
    }
}

fn replace<T: PartialEq>(slot: &mut T, value: T) -> bool {
    if *slot == value {
        return false;
    }
    *slot = value;
    true
}

fn replace_f64(slot: &mut f64, value: f64) -> bool {
    if (*slot - value).abs() < f64::EPSILON {
        return false;
    }
    *slot = value;
    true
}
