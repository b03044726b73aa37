//! Layer catalogue and per-layer display state

mod matrix;

use serde::{Deserialize, Serialize};

use crate::units::{
    HeightUnit, LayerUnit, PressureUnit, Quantity, RainfallUnit, SpeedUnit, TemperatureUnit,
};

pub use matrix::{LayerEntry, LayerError, LayerVisibilityMatrix, DEFAULT_SYMBOL_SPACING};

pub const LAYER_COUNT: usize = 13;

/// One physical-quantity visualization channel
///
/// Discriminants are the ids used on the facade boundary and in persisted
/// settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(i32)]
pub enum LayerId {
    Wind = 0,
    WindGust = 1,
    Pressure = 2,
    Wave = 3,
    Current = 4,
    Precipitation = 5,
    Cloud = 6,
    AirTemperature = 7,
    SeaTemperature = 8,
    Cape = 9,
    CompositeReflectivity = 10,
    GeoAltitude = 11,
    RelativeHumidity = 12,
}

impl LayerId {
    pub const ALL: [LayerId; LAYER_COUNT] = [
        LayerId::Wind,
        LayerId::WindGust,
        LayerId::Pressure,
        LayerId::Wave,
        LayerId::Current,
        LayerId::Precipitation,
        LayerId::Cloud,
        LayerId::AirTemperature,
        LayerId::SeaTemperature,
        LayerId::Cape,
        LayerId::CompositeReflectivity,
        LayerId::GeoAltitude,
        LayerId::RelativeHumidity,
    ];

    /// `None` outside `[0, LAYER_COUNT)`
    pub fn from_index(index: i32) -> Option<LayerId> {
        usize::try_from(index).ok().and_then(|idx| Self::ALL.get(idx).copied())
    }

    pub fn index(&self) -> usize {
        *self as usize
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            LayerId::Wind => "Wind",
            LayerId::WindGust => "Wind Gust",
            LayerId::Pressure => "Pressure",
            LayerId::Wave => "Waves",
            LayerId::Current => "Current",
            LayerId::Precipitation => "Rainfall",
            LayerId::Cloud => "Cloud Cover",
            LayerId::AirTemperature => "Air Temperature",
            LayerId::SeaTemperature => "Sea Temperature",
            LayerId::Cape => "CAPE",
            LayerId::CompositeReflectivity => "Composite Reflectivity",
            LayerId::GeoAltitude => "Geopotential Height",
            LayerId::RelativeHumidity => "Relative Humidity",
        }
    }

    /// Key segment used for persisted per-layer settings
    pub fn config_name(&self) -> &'static str {
        match self {
            LayerId::Wind => "Wind",
            LayerId::WindGust => "WindGust",
            LayerId::Pressure => "Pressure",
            LayerId::Wave => "Waves",
            LayerId::Current => "Current",
            LayerId::Precipitation => "Rainfall",
            LayerId::Cloud => "CloudCover",
            LayerId::AirTemperature => "AirTemperature",
            LayerId::SeaTemperature => "SeaTemperature",
            LayerId::Cape => "CAPE",
            LayerId::CompositeReflectivity => "CompositeReflectivity",
            LayerId::GeoAltitude => "GeoAltitude",
            LayerId::RelativeHumidity => "RelativeHumidity",
        }
    }

    /// Fields the loaded data must contain for this layer to be available
    pub fn required_fields(&self) -> &'static [FieldKind] {
        match self {
            LayerId::Wind => &[FieldKind::WindU, FieldKind::WindV],
            LayerId::WindGust => &[FieldKind::Gust],
            LayerId::Pressure => &[FieldKind::Pressure],
            LayerId::Wave => &[FieldKind::WaveHeight],
            LayerId::Current => &[FieldKind::CurrentU, FieldKind::CurrentV],
            LayerId::Precipitation => &[FieldKind::PrecipTotal],
            LayerId::Cloud => &[FieldKind::CloudTotal],
            LayerId::AirTemperature => &[FieldKind::AirTemp],
            LayerId::SeaTemperature => &[FieldKind::SeaTemp],
            LayerId::Cape => &[FieldKind::Cape],
            LayerId::CompositeReflectivity => &[FieldKind::CompReflectivity],
            LayerId::GeoAltitude => &[FieldKind::GeopotentialHeight],
            LayerId::RelativeHumidity => &[FieldKind::RelHumidity],
        }
    }

    /// Vector layers carry an east and a north component
    pub fn vector_components(&self) -> Option<(FieldKind, FieldKind)> {
        match self {
            LayerId::Wind => Some((FieldKind::WindU, FieldKind::WindV)),
            LayerId::Current => Some((FieldKind::CurrentU, FieldKind::CurrentV)),
            _ => None,
        }
    }

    pub fn is_vector(&self) -> bool {
        self.vector_components().is_some()
    }

    /// Scalar source field, `None` for vector layers
    pub fn scalar_field(&self) -> Option<FieldKind> {
        match self.required_fields() {
            [single] => Some(*single),
            _ => None,
        }
    }

    /// Quantity whose unit preference drives this layer, if any
    pub fn quantity(&self) -> Option<Quantity> {
        self.default_unit().quantity()
    }

    pub fn default_unit(&self) -> LayerUnit {
        match self {
            LayerId::Wind | LayerId::WindGust | LayerId::Current => LayerUnit::Speed(SpeedUnit::Knots),
            LayerId::Pressure => LayerUnit::Pressure(PressureUnit::Millibars),
            LayerId::Wave | LayerId::GeoAltitude => LayerUnit::Height(HeightUnit::Meters),
            LayerId::Precipitation => LayerUnit::Rainfall(RainfallUnit::Millimeters),
            LayerId::AirTemperature | LayerId::SeaTemperature => {
                LayerUnit::Temperature(TemperatureUnit::Celsius)
            }
            LayerId::Cloud | LayerId::RelativeHumidity => LayerUnit::Percent,
            LayerId::Cape => LayerUnit::JoulesPerKg,
            LayerId::CompositeReflectivity => LayerUnit::Dbz,
        }
    }

    /// Whether host unit preferences are synced onto this layer. Geopotential
    /// height keeps its own unit even though it is a height.
    pub fn follows_unit_preferences(&self) -> bool {
        !matches!(
            self,
            LayerId::Cape
                | LayerId::CompositeReflectivity
                | LayerId::Cloud
                | LayerId::GeoAltitude
                | LayerId::RelativeHumidity
        )
    }
}

impl std::fmt::Display for LayerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Physical fields a forecast record set may carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldKind {
    WindU,
    WindV,
    Gust,
    Pressure,
    WaveHeight,
    CurrentU,
    CurrentV,
    PrecipTotal,
    CloudTotal,
    AirTemp,
    SeaTemp,
    Cape,
    CompReflectivity,
    GeopotentialHeight,
    RelHumidity,
}

/// Answers which fields the loaded data contains
pub trait FieldCatalog {
    fn contains(&self, field: FieldKind) -> bool;
}

/// The six independent display toggles of a layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DisplayFlag {
    BarbedArrows,
    IsoBars,
    Numbers,
    OverlayMap,
    DirectionArrows,
    Particles,
}

impl DisplayFlag {
    pub const ALL: [DisplayFlag; 6] = [
        DisplayFlag::BarbedArrows,
        DisplayFlag::IsoBars,
        DisplayFlag::Numbers,
        DisplayFlag::OverlayMap,
        DisplayFlag::DirectionArrows,
        DisplayFlag::Particles,
    ];

    pub fn config_key(&self) -> &'static str {
        match self {
            DisplayFlag::BarbedArrows => "BarbedArrows",
            DisplayFlag::IsoBars => "IsoBars",
            DisplayFlag::Numbers => "Numbers",
            DisplayFlag::OverlayMap => "OverlayMap",
            DisplayFlag::DirectionArrows => "DirectionArrows",
            DisplayFlag::Particles => "Particles",
        }
    }
}

/// How densely iso-lines are labelled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum IsoBarVisibility {
    #[default]
    Standard,
    /// Fewer lines, used when the chart is crowded
    Minimal,
}

impl From<bool> for IsoBarVisibility {
    fn from(minimal: bool) -> Self {
        if minimal {
            IsoBarVisibility::Minimal
        } else {
            IsoBarVisibility::Standard
        }
    }
}

impl From<IsoBarVisibility> for bool {
    fn from(mode: IsoBarVisibility) -> bool {
        mode == IsoBarVisibility::Minimal
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_round_trip() {
        for (idx, layer) in LayerId::ALL.iter().enumerate() {
            assert_eq!(layer.index(), idx);
            assert_eq!(LayerId::from_index(idx as i32), Some(*layer));
        }
        assert_eq!(LayerId::from_index(-1), None);
        assert_eq!(LayerId::from_index(LAYER_COUNT as i32), None);
    }

    #[test]
    fn test_vector_layers_need_both_components() {
        assert_eq!(LayerId::Current.required_fields(), &[FieldKind::CurrentU, FieldKind::CurrentV]);
        assert!(LayerId::Wind.is_vector());
        assert!(!LayerId::WindGust.is_vector());
        assert_eq!(LayerId::Wind.scalar_field(), None);
        assert_eq!(LayerId::Wave.scalar_field(), Some(FieldKind::WaveHeight));
    }

    #[test]
    fn test_unit_sync_targets() {
        let synced: Vec<_> = LayerId::ALL.iter().filter(|l| l.follows_unit_preferences()).collect();
        assert_eq!(synced.len(), 8);
        assert_eq!(LayerId::GeoAltitude.quantity(), Some(Quantity::Depth));
        assert!(!LayerId::GeoAltitude.follows_unit_preferences());
    }
}
