//! Contract of the rendering collaborator

use crate::layers::LayerId;
use crate::timeline::TimelineContext;

/// What the core needs from whatever draws the overlay
///
/// Calls are synchronous and must not call back into the core.
pub trait OverlayRenderer: Send + Sync {
    /// Drop cached geometry for one layer
    fn invalidate_layer(&self, layer: LayerId);

    /// Drop every cached layer, e.g. after a unit change
    fn invalidate_all(&self);

    /// Schedule a redraw
    fn request_refresh(&self);

    /// The selected forecast step moved
    fn timeline_changed(&self, context: &TimelineContext) {
        let _ = context;
        self.request_refresh();
    }
}
