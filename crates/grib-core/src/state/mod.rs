//! Shared overlay settings: the enabled flag, the parameter and the overlay block

use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Lowest accepted value of [`Settings::parameter`]
pub const PARAMETER_MIN: i32 = 0;
/// Highest accepted value of [`Settings::parameter`]
pub const PARAMETER_MAX: i32 = 100;

/// The small record shared between the plugin core and the facade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Whether overlay rendering is enabled
    pub enabled: bool,

    /// Free numeric parameter, always inside `[PARAMETER_MIN, PARAMETER_MAX]`
    pub parameter: i32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            enabled: false,
            parameter: 50,
        }
    }
}

/// Shared handle on [`Settings`]
///
/// The plugin core creates the store and hands clones of the handle to the
/// facade. Every setter reports whether the stored value moved so callers can
/// suppress notifications for no-op writes.
#[derive(Debug, Clone, Default)]
pub struct SettingsStore {
    inner: Arc<RwLock<Settings>>,
}

impl SettingsStore {
    pub fn new(settings: Settings) -> Self {
        let settings = Settings {
            parameter: settings.parameter.clamp(PARAMETER_MIN, PARAMETER_MAX),
            ..settings
        };
        Self {
            inner: Arc::new(RwLock::new(settings)),
        }
    }

    /// Copy of the current values
    pub fn snapshot(&self) -> Settings {
        *self.inner.read()
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.read().enabled
    }

    /// Returns true if the flag changed
    pub fn set_enabled(&self, enabled: bool) -> bool {
        let mut settings = self.inner.write();
        if settings.enabled == enabled {
            return false;
        }
        settings.enabled = enabled;
        true
    }

    pub fn parameter(&self) -> i32 {
        self.inner.read().parameter
    }

    /// Clamp `value` into range and store it. Returns true if the stored value changed.
    pub fn set_parameter(&self, value: i32) -> bool {
        let value = value.clamp(PARAMETER_MIN, PARAMETER_MAX);
        let mut settings = self.inner.write();
        if settings.parameter == value {
            return false;
        }
        settings.parameter = value;
        true
    }

    /// Replace everything at once (used when loading persisted state)
    pub fn replace(&self, settings: Settings) {
        *self.inner.write() = Settings {
            parameter: settings.parameter.clamp(PARAMETER_MIN, PARAMETER_MAX),
            ..settings
        };
    }
}

/// Maximum overlay alpha as stored by the renderer
pub const OVERLAY_ALPHA_MAX: i32 = 254;

/// Playback and blending state of the overlay
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OverlaySettings {
    /// Overlay alpha in `[0, OVERLAY_ALPHA_MAX]`
    pub overlay_alpha: i32,

    /// Restart from the first step when playback reaches the end
    pub loop_mode: bool,

    /// Playback rate in timeline steps per interval, at least 1
    pub updates_per_second: i32,
}

impl Default for OverlaySettings {
    fn default() -> Self {
        Self {
            overlay_alpha: transparency_to_alpha(50),
            loop_mode: false,
            updates_per_second: 4,
        }
    }
}

impl OverlaySettings {
    /// Overlay opacity as a percentage
    pub fn transparency_percent(&self) -> i32 {
        alpha_to_transparency(self.overlay_alpha)
    }

    pub fn set_transparency_percent(&mut self, percent: i32) {
        self.overlay_alpha = transparency_to_alpha(percent);
    }

    pub fn set_updates_per_second(&mut self, speed: i32) {
        self.updates_per_second = speed.max(1);
    }

    /// Timer interval used while playing
    pub fn playback_interval_ms(&self) -> u64 {
        3000 / self.updates_per_second.max(1) as u64
    }
}

/// Percent `[0,100]` (clamped) to renderer alpha `[0,254]`
pub fn transparency_to_alpha(percent: i32) -> i32 {
    let percent = percent.clamp(0, 100);
    (percent as f64 * OVERLAY_ALPHA_MAX as f64 / 100.0) as i32
}

/// Renderer alpha back to a percentage
pub fn alpha_to_transparency(alpha: i32) -> i32 {
    (alpha as f64 * 100.0 / OVERLAY_ALPHA_MAX as f64) as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parameter_is_clamped() {
        let store = SettingsStore::default();
        for (input, expected) in [(-20, 0), (0, 0), (42, 42), (100, 100), (1000, 100), (i32::MIN, 0), (i32::MAX, 100)] {
            store.set_parameter(input);
            assert_eq!(store.parameter(), expected, "input {input}");
        }
    }

    #[test]
    fn test_setters_report_changes_only() {
        let store = SettingsStore::default();
        assert!(!store.set_parameter(50));
        assert!(store.set_parameter(150));
        assert!(!store.set_parameter(100));
        assert!(!store.set_parameter(101));

        assert!(store.set_enabled(true));
        assert!(!store.set_enabled(true));
    }

    #[test]
    fn test_clones_share_state() {
        let store = SettingsStore::default();
        let borrowed = store.clone();
        borrowed.set_enabled(true);
        assert!(store.is_enabled());
    }

    #[test]
    fn test_transparency_conversion() {
        let mut overlay = OverlaySettings::default();
        assert_eq!(overlay.overlay_alpha, 127);
        assert_eq!(overlay.transparency_percent(), 50);

        overlay.set_transparency_percent(100);
        assert_eq!(overlay.overlay_alpha, 254);
        overlay.set_transparency_percent(-5);
        assert_eq!(overlay.overlay_alpha, 0);
        overlay.set_transparency_percent(130);
        assert_eq!(overlay.transparency_percent(), 100);
    }

    #[test]
    fn test_playback_speed_floor() {
        let mut overlay = OverlaySettings::default();
        overlay.set_updates_per_second(0);
        assert_eq!(overlay.updates_per_second, 1);
        assert_eq!(overlay.playback_interval_ms(), 3000);
        overlay.set_updates_per_second(6);
        assert_eq!(overlay.playback_interval_ms(), 500);
    }
}
