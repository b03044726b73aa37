//! Core state of the forecast overlay
//!
//! Callback registries, settings, the forecast timeline, the per-layer
//! display matrix and unit mapping tables. Nothing in here knows about the
//! facade boundary or the data source.

pub mod events;
pub mod layers;
pub mod render;
pub mod state;
pub mod sync;
pub mod timeline;
pub mod units;

pub use events::{CallbackId, CallbackRegistry, Handler};
pub use layers::{
    DisplayFlag, FieldCatalog, FieldKind, IsoBarVisibility, LayerEntry, LayerError, LayerId,
    LayerVisibilityMatrix, LAYER_COUNT,
};
pub use render::OverlayRenderer;
pub use state::{OverlaySettings, Settings, SettingsStore};
pub use sync::{ReadoutSync, UNAVAILABLE};
pub use timeline::{
    DisplayZone, TimelineContext, TimelineError, TimelineIndex, TimelineListener, TimelineStamp,
    Timestamped,
};
pub use units::{external_to_internal, LayerUnit, Quantity, UnitPreferences};
