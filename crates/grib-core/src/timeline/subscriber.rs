//! Timeline change listeners

use std::sync::{Arc, Weak};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

/// Passed to listeners after the selected step moved
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimelineContext {
    pub index: usize,
    pub time: DateTime<Utc>,
    pub step_count: usize,
}

/// Components that redraw when the selected forecast step changes
pub trait TimelineListener: Send + Sync {
    fn on_timeline_changed(&self, context: &TimelineContext);
}

/// Weakly held listener list; dropped listeners are pruned on notify
#[derive(Default)]
pub struct TimelineListeners {
    listeners: RwLock<Vec<Weak<dyn TimelineListener>>>,
}

impl TimelineListeners {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, listener: &Arc<dyn TimelineListener>) {
        self.listeners.write().push(Arc::downgrade(listener));
    }

    pub fn notify(&self, context: &TimelineContext) {
        // Upgrade under the lock, call outside of it
        let live: Vec<Arc<dyn TimelineListener>> = {
            let mut listeners = self.listeners.write();
            listeners.retain(|weak| weak.strong_count() > 0);
            listeners.iter().filter_map(Weak::upgrade).collect()
        };

        for listener in live {
            listener.on_timeline_changed(context);
        }
    }

    pub fn len(&self) -> usize {
        self.listeners.read().iter().filter(|w| w.strong_count() > 0).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
