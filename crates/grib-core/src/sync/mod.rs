use std::sync::Arc;

use ahash::AHashMap;
use parking_lot::RwLock;
use tracing::debug;

use crate::layers::{DisplayFlag, LayerId, LayerVisibilityMatrix};

/// Placeholder shown when a value cannot be resolved
pub const UNAVAILABLE: &str = "--";

/// Keeps the cursor readout table consistent with the layer matrix
///
/// Cloned handles share the same table.
#[derive(Clone, Default)]
pub struct ReadoutSync {
    rows: Arc<RwLock<AHashMap<LayerId, ReadoutRow>>>,
}

/// One line of the cursor readout
#[derive(Debug, Clone, PartialEq)]
pub struct ReadoutRow {
    pub shown: bool,
    pub value: String,
}

impl Default for ReadoutRow {
    fn default() -> Self {
        Self {
            shown: false,
            value: UNAVAILABLE.to_string(),
        }
    }
}

impl ReadoutSync {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reconcile derived display state after `layer` changed
    ///
    /// Only one colour overlay may be plotted at a time: when `layer` is
    /// plotted with its overlay map on, other plotted layers with an overlay
    /// map are switched off. Readout rows of every touched layer are
    /// refreshed. Returns the layers that were switched off.
    pub fn resolve_display_conflicts(&self, layer: LayerId, matrix: &mut LayerVisibilityMatrix) -> Vec<LayerId> {
        let mut hidden = Vec::new();

        let entry = matrix.entry(layer);
        if entry.visible && entry.flag(DisplayFlag::OverlayMap) {
            for other in LayerId::ALL {
                if other == layer {
                    continue;
                }
                let other_entry = matrix.entry_mut(other);
                if other_entry.visible && other_entry.overlay_map {
                    other_entry.visible = false;
                    hidden.push(other);
                }
            }
        }

        let mut rows = self.rows.write();
        for id in std::iter::once(layer).chain(hidden.iter().copied()) {
            let entry = matrix.entry(id);
            rows.entry(id).or_default().shown = entry.visible && entry.any_display();
        }
        drop(rows);

        if !hidden.is_empty() {
            debug!(%layer, hidden = hidden.len(), "overlay conflict resolved");
        }
        hidden
    }

    /// Rebuild every row from the matrix
    pub fn refresh_all(&self, matrix: &LayerVisibilityMatrix) {
        let mut rows = self.rows.write();
        for (id, entry) in matrix.iter() {
            rows.entry(id).or_default().shown = entry.visible && entry.any_display();
        }
    }

    pub fn is_row_shown(&self, layer: LayerId) -> bool {
        self.rows.read().get(&layer).map(|row| row.shown).unwrap_or(false)
    }

    /// Layers with a visible row, in id order
    pub fn shown_rows(&self) -> Vec<LayerId> {
        let rows = self.rows.read();
        LayerId::ALL
            .iter()
            .copied()
            .filter(|id| rows.get(id).map(|row| row.shown).unwrap_or(false))
            .collect()
    }

    /// Store the values under the cursor
    pub fn update_values(&self, values: impl IntoIterator<Item = (LayerId, String)>) {
        let mut rows = self.rows.write();
        for (id, value) in values {
            rows.entry(id).or_default().value = value;
        }
    }

    /// Reset every value to the placeholder, e.g. after the data was cleared
    pub fn clear_values(&self) {
        for row in self.rows.write().values_mut() {
            row.value = UNAVAILABLE.to_string();
        }
    }

    pub fn value(&self, layer: LayerId) -> String {
        self.rows
            .read()
            .get(&layer)
            .map(|row| row.value.clone())
            .unwrap_or_else(|| UNAVAILABLE.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_overlay_map() {
        let sync = ReadoutSync::new();
        let mut matrix = LayerVisibilityMatrix::new();
        matrix.set_visible(LayerId::Cloud as i32, true).unwrap();
        sync.resolve_display_conflicts(LayerId::Cloud, &mut matrix);

        matrix.set_visible(LayerId::AirTemperature as i32, true).unwrap();
        let hidden = sync.resolve_display_conflicts(LayerId::AirTemperature, &mut matrix);

        assert_eq!(hidden, vec![LayerId::Cloud]);
        assert!(!matrix.is_visible(LayerId::Cloud as i32));
        assert!(sync.is_row_shown(LayerId::AirTemperature));
        assert!(!sync.is_row_shown(LayerId::Cloud));
    }

    #[test]
    fn test_row_follows_toggles() {
        let sync = ReadoutSync::new();
        let mut matrix = LayerVisibilityMatrix::new();
        sync.refresh_all(&matrix);
        assert_eq!(sync.shown_rows(), vec![LayerId::Wind, LayerId::Pressure]);

        matrix.set_flag(LayerId::Wind as i32, DisplayFlag::BarbedArrows, false).unwrap();
        let hidden = sync.resolve_display_conflicts(LayerId::Wind, &mut matrix);
        assert!(hidden.is_empty());
        assert!(!sync.is_row_shown(LayerId::Wind));
    }

    #[test]
    fn test_values_default_to_placeholder() {
        let sync = ReadoutSync::new();
        assert_eq!(sync.value(LayerId::Wave), UNAVAILABLE);
        sync.update_values([(LayerId::Wave, "1.2 m".to_string())]);
        assert_eq!(sync.value(LayerId::Wave), "1.2 m");
        sync.clear_values();
        assert_eq!(sync.value(LayerId::Wave), UNAVAILABLE);
    }
}
