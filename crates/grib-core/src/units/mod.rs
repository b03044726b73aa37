//! Unit preferences and the mapping onto overlay units
//!
//! The host exposes unit preferences as small ordinals in its own order
//! ("external"). The overlay stores units in a different order ("internal").
//! Every mapping here is total: out-of-range external ordinals fall back to
//! the most common unit for the quantity.

mod convert;

use serde::{Deserialize, Serialize};

pub use convert::{beaufort_from_ms, density_for_spacing};

/// Physical quantity a unit preference applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Quantity {
    Speed,
    Depth,
    Temperature,
    Pressure,
    Rainfall,
}

impl Quantity {
    pub const ALL: [Quantity; 5] = [
        Quantity::Speed,
        Quantity::Depth,
        Quantity::Temperature,
        Quantity::Pressure,
        Quantity::Rainfall,
    ];

    /// Internal ordinal used when the external ordinal is unknown
    pub fn default_internal(&self) -> i32 {
        match self {
            Quantity::Speed => SpeedUnit::Knots as i32,
            Quantity::Depth => HeightUnit::Meters as i32,
            Quantity::Temperature => TemperatureUnit::Celsius as i32,
            Quantity::Pressure => PressureUnit::Millibars as i32,
            Quantity::Rainfall => RainfallUnit::Millimeters as i32,
        }
    }

    fn table(&self) -> &'static [i32] {
        match self {
            Quantity::Speed => &SPEED_TABLE,
            Quantity::Depth => &DEPTH_TABLE,
            Quantity::Temperature => &TEMPERATURE_TABLE,
            Quantity::Pressure => &PRESSURE_TABLE,
            Quantity::Rainfall => &RAINFALL_TABLE,
        }
    }
}

// External: 0 knots, 1 mph, 2 km/h, 3 m/s
const SPEED_TABLE: [i32; 4] = [
    SpeedUnit::Knots as i32,
    SpeedUnit::Mph as i32,
    SpeedUnit::Kph as i32,
    SpeedUnit::MetersPerSecond as i32,
];

// External: 0 ft, 1 m, 2 fathoms
const DEPTH_TABLE: [i32; 3] = [
    HeightUnit::Feet as i32,
    HeightUnit::Meters as i32,
    HeightUnit::Fathoms as i32,
];

const TEMPERATURE_TABLE: [i32; 3] = [
    TemperatureUnit::Celsius as i32,
    TemperatureUnit::Fahrenheit as i32,
    TemperatureUnit::Kelvin as i32,
];

const PRESSURE_TABLE: [i32; 3] = [
    PressureUnit::Millibars as i32,
    PressureUnit::MmHg as i32,
    PressureUnit::InHg as i32,
];

const RAINFALL_TABLE: [i32; 2] = [RainfallUnit::Millimeters as i32, RainfallUnit::Inches as i32];

/// Map a host preference ordinal to the overlay's unit ordinal
pub fn external_to_internal(quantity: Quantity, external: i32) -> i32 {
    usize::try_from(external)
        .ok()
        .and_then(|idx| quantity.table().get(idx).copied())
        .unwrap_or_else(|| quantity.default_internal())
}

/// Reverse lookup; `None` for internal units the host cannot express (Beaufort)
pub fn internal_to_external(quantity: Quantity, internal: i32) -> Option<i32> {
    quantity
        .table()
        .iter()
        .position(|unit| *unit == internal)
        .map(|idx| idx as i32)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i32)]
pub enum SpeedUnit {
    Knots = 0,
    MetersPerSecond = 1,
    Mph = 2,
    Kph = 3,
    Beaufort = 4,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i32)]
pub enum HeightUnit {
    Meters = 0,
    Feet = 1,
    Fathoms = 2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i32)]
pub enum TemperatureUnit {
    Celsius = 0,
    Fahrenheit = 1,
    Kelvin = 2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i32)]
pub enum PressureUnit {
    Millibars = 0,
    MmHg = 1,
    InHg = 2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i32)]
pub enum RainfallUnit {
    Millimeters = 0,
    Inches = 1,
}

/// Display unit of a layer
///
/// The quantity-bearing variants can be changed by unit preferences, the
/// remaining ones are fixed for their layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LayerUnit {
    Speed(SpeedUnit),
    Height(HeightUnit),
    Temperature(TemperatureUnit),
    Pressure(PressureUnit),
    Rainfall(RainfallUnit),
    Percent,
    JoulesPerKg,
    Dbz,
}

impl LayerUnit {
    pub fn quantity(&self) -> Option<Quantity> {
        match self {
            LayerUnit::Speed(_) => Some(Quantity::Speed),
            LayerUnit::Height(_) => Some(Quantity::Depth),
            LayerUnit::Temperature(_) => Some(Quantity::Temperature),
            LayerUnit::Pressure(_) => Some(Quantity::Pressure),
            LayerUnit::Rainfall(_) => Some(Quantity::Rainfall),
            LayerUnit::Percent | LayerUnit::JoulesPerKg | LayerUnit::Dbz => None,
        }
    }

    /// Internal ordinal, as persisted. Fixed units report 0.
    pub fn ordinal(&self) -> i32 {
        match self {
            LayerUnit::Speed(u) => *u as i32,
            LayerUnit::Height(u) => *u as i32,
            LayerUnit::Temperature(u) => *u as i32,
            LayerUnit::Pressure(u) => *u as i32,
            LayerUnit::Rainfall(u) => *u as i32,
            LayerUnit::Percent | LayerUnit::JoulesPerKg | LayerUnit::Dbz => 0,
        }
    }

    /// Same quantity, different internal ordinal. Unknown ordinals and fixed
    /// units give `None`.
    pub fn with_ordinal(&self, ordinal: i32) -> Option<LayerUnit> {
        let unit = match self {
            LayerUnit::Speed(_) => LayerUnit::Speed(match ordinal {
                0 => SpeedUnit::Knots,
                1 => SpeedUnit::MetersPerSecond,
                2 => SpeedUnit::Mph,
                3 => SpeedUnit::Kph,
                4 => SpeedUnit::Beaufort,
                _ => return None,
            }),
            LayerUnit::Height(_) => LayerUnit::Height(match ordinal {
                0 => HeightUnit::Meters,
                1 => HeightUnit::Feet,
                2 => HeightUnit::Fathoms,
                _ => return None,
            }),
            LayerUnit::Temperature(_) => LayerUnit::Temperature(match ordinal {
                0 => TemperatureUnit::Celsius,
                1 => TemperatureUnit::Fahrenheit,
                2 => TemperatureUnit::Kelvin,
                _ => return None,
            }),
            LayerUnit::Pressure(_) => LayerUnit::Pressure(match ordinal {
                0 => PressureUnit::Millibars,
                1 => PressureUnit::MmHg,
                2 => PressureUnit::InHg,
                _ => return None,
            }),
            LayerUnit::Rainfall(_) => LayerUnit::Rainfall(match ordinal {
                0 => RainfallUnit::Millimeters,
                1 => RainfallUnit::Inches,
                _ => return None,
            }),
            LayerUnit::Percent | LayerUnit::JoulesPerKg | LayerUnit::Dbz => return None,
        };
        Some(unit)
    }
}

/// Host unit preferences, external ordinals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UnitPreferences {
    pub wind_speed: i32,
    /// Speed over ground, also used for currents
    pub speed: i32,
    pub depth: i32,
    pub temperature: i32,
    pub pressure: i32,
    pub rainfall: i32,
}

impl UnitPreferences {
    pub fn internal(&self, quantity: Quantity, wind: bool) -> i32 {
        let external = match quantity {
            Quantity::Speed if wind => self.wind_speed,
            Quantity::Speed => self.speed,
            Quantity::Depth => self.depth,
            Quantity::Temperature => self.temperature,
            Quantity::Pressure => self.pressure,
            Quantity::Rainfall => self.rainfall,
        };
        external_to_internal(quantity, external)
    }
}
