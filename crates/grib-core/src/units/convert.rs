//! Conversions from the SI values stored in forecast fields
//!
//! Base units: m/s, Pa, K, m, mm.

use super::{HeightUnit, LayerUnit, PressureUnit, RainfallUnit, SpeedUnit, TemperatureUnit};

const MS_TO_KNOTS: f64 = 3.6 / 1.852;
const MS_TO_MPH: f64 = 3.6 / 1.609_344;
const MS_TO_KPH: f64 = 3.6;
const PA_PER_MMHG: f64 = 133.322_387;
const PA_PER_INHG: f64 = 3_386.389;
const METERS_PER_FOOT: f64 = 0.3048;
const METERS_PER_FATHOM: f64 = 1.8288;
const MM_PER_INCH: f64 = 25.4;

// Upper bound (m/s) of Beaufort forces 0..=11
const BEAUFORT_LIMITS: [f64; 12] = [0.3, 1.6, 3.4, 5.5, 8.0, 10.8, 13.9, 17.2, 20.8, 24.5, 28.5, 32.7];

/// Beaufort force for a wind speed in m/s
pub fn beaufort_from_ms(speed: f64) -> f64 {
    BEAUFORT_LIMITS
        .iter()
        .position(|limit| speed < *limit)
        .unwrap_or(BEAUFORT_LIMITS.len()) as f64
}

/// Particle density for a symbol spacing in pixels
pub fn density_for_spacing(pixels: i32) -> f64 {
    2.0 - 1.5 * (pixels as f64 - 30.0) / 70.0
}

impl LayerUnit {
    /// Convert a value from the field's base unit
    pub fn from_base(&self, value: f64) -> f64 {
        match self {
            LayerUnit::Speed(unit) => match unit {
                SpeedUnit::Knots => value * MS_TO_KNOTS,
                SpeedUnit::MetersPerSecond => value,
                SpeedUnit::Mph => value * MS_TO_MPH,
                SpeedUnit::Kph => value * MS_TO_KPH,
                SpeedUnit::Beaufort => beaufort_from_ms(value),
            },
            LayerUnit::Height(unit) => match unit {
                HeightUnit::Meters => value,
                HeightUnit::Feet => value / METERS_PER_FOOT,
                HeightUnit::Fathoms => value / METERS_PER_FATHOM,
            },
            LayerUnit::Temperature(unit) => match unit {
                TemperatureUnit::Celsius => value - 273.15,
                TemperatureUnit::Fahrenheit => (value - 273.15) * 1.8 + 32.0,
                TemperatureUnit::Kelvin => value,
            },
            LayerUnit::Pressure(unit) => match unit {
                PressureUnit::Millibars => value / 100.0,
                PressureUnit::MmHg => value / PA_PER_MMHG,
                PressureUnit::InHg => value / PA_PER_INHG,
            },
            LayerUnit::Rainfall(unit) => match unit {
                RainfallUnit::Millimeters => value,
                RainfallUnit::Inches => value / MM_PER_INCH,
            },
            LayerUnit::Percent | LayerUnit::JoulesPerKg | LayerUnit::Dbz => value,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            LayerUnit::Speed(SpeedUnit::Knots) => "kts",
            LayerUnit::Speed(SpeedUnit::MetersPerSecond) => "m/s",
            LayerUnit::Speed(SpeedUnit::Mph) => "mph",
            LayerUnit::Speed(SpeedUnit::Kph) => "km/h",
            LayerUnit::Speed(SpeedUnit::Beaufort) => "bf",
            LayerUnit::Height(HeightUnit::Meters) => "m",
            LayerUnit::Height(HeightUnit::Feet) => "ft",
            LayerUnit::Height(HeightUnit::Fathoms) => "fa",
            LayerUnit::Temperature(TemperatureUnit::Celsius) => "\u{00B0}C",
            LayerUnit::Temperature(TemperatureUnit::Fahrenheit) => "\u{00B0}F",
            LayerUnit::Temperature(TemperatureUnit::Kelvin) => "K",
            LayerUnit::Pressure(PressureUnit::Millibars) => "hPa",
            LayerUnit::Pressure(PressureUnit::MmHg) => "mmHg",
            LayerUnit::Pressure(PressureUnit::InHg) => "inHg",
            LayerUnit::Rainfall(RainfallUnit::Millimeters) => "mm",
            LayerUnit::Rainfall(RainfallUnit::Inches) => "in",
            LayerUnit::Percent => "%",
            LayerUnit::JoulesPerKg => "J/kg",
            LayerUnit::Dbz => "dBZ",
        }
    }

    /// Value in this unit with its label; one decimal, Beaufort as an integer
    pub fn format(&self, base_value: f64) -> String {
        let value = self.from_base(base_value);
        match self {
            LayerUnit::Speed(SpeedUnit::Beaufort) => format!("{} {}", value as i32, self.label()),
            LayerUnit::Pressure(PressureUnit::InHg) => format!("{:.2} {}", value, self.label()),
            _ => format!("{:.1} {}", value, self.label()),
        }
    }
}
