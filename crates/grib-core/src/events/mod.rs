//! Multi-subscriber callback registries
//!
//! Every change channel exposed to the consumer is a [`CallbackRegistry`].
//! Notification works on a snapshot of the registrations, so a handler may
//! register or unregister (itself or others) while a pass is running; the
//! change only becomes visible on the next pass.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::layers::LayerId;

/// Identifier returned by [`CallbackRegistry::register`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CallbackId(u64);

impl CallbackId {
    /// Returned when a registration could not be stored. Never issued to a live handler.
    pub const INVALID: CallbackId = CallbackId(0);

    pub fn as_u64(&self) -> u64 {
        self.0
    }

    pub fn is_valid(&self) -> bool {
        self.0 != 0
    }
}

impl From<u64> for CallbackId {
    fn from(raw: u64) -> Self {
        CallbackId(raw)
    }
}

impl fmt::Display for CallbackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Shared handler type stored by a registry
pub type Handler<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct Registrations<T> {
    next_id: u64,
    handlers: IndexMap<CallbackId, Option<Handler<T>>>,
}

/// Registry of handlers for one event channel
pub struct CallbackRegistry<T> {
    name: &'static str,
    inner: Mutex<Registrations<T>>,
}

impl<T> CallbackRegistry<T> {
    /// Create an empty registry. `name` only shows up in diagnostics.
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            inner: Mutex::new(Registrations {
                next_id: 1,
                handlers: IndexMap::new(),
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Register a handler and return its id
    pub fn register<F>(&self, handler: F) -> CallbackId
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.register_handler(Some(Arc::new(handler)))
    }

    /// Register an already shared handler. `None` is accepted and gets an id,
    /// but is skipped on every notification.
    pub fn register_handler(&self, handler: Option<Handler<T>>) -> CallbackId {
        let mut inner = self.inner.lock();

        // Ids are never reused. Once the sequence is spent, refuse instead of wrapping.
        let Some(following) = inner.next_id.checked_add(1) else {
            tracing::error!("{} registry: callback ids exhausted, registration rejected", self.name);
            return CallbackId::INVALID;
        };

        let id = CallbackId(inner.next_id);
        inner.next_id = following;
        inner.handlers.insert(id, handler);
        tracing::debug!("{} registry: registered callback {}", self.name, id);
        id
    }

    /// Remove a handler. Unknown ids are ignored.
    pub fn unregister(&self, id: CallbackId) {
        let removed = self.inner.lock().handlers.shift_remove(&id);
        if removed.is_some() {
            tracing::debug!("{} registry: removed callback {}", self.name, id);
        } else {
            tracing::debug!("{} registry: unregister of unknown callback {} ignored", self.name, id);
        }
    }

    /// Invoke every handler registered at the moment of the call, in
    /// registration order. Returns how many handlers ran.
    pub fn notify_all(&self, args: &T) -> usize {
        let snapshot: Vec<Handler<T>> = {
            let inner = self.inner.lock();
            inner.handlers.values().flatten().cloned().collect()
        };

        for handler in &snapshot {
            handler(args);
        }
        snapshot.len()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().handlers.is_empty()
    }

    pub fn contains(&self, id: CallbackId) -> bool {
        self.inner.lock().handlers.contains_key(&id)
    }

    /// Drop every registration
    pub fn clear(&self) {
        self.inner.lock().handlers.clear();
    }
}

impl<T> fmt::Debug for CallbackRegistry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackRegistry")
            .field("name", &self.name)
            .field("registrations", &self.len())
            .finish()
    }
}

/// Common channel payloads
pub mod payloads {
    use super::*;

    /// Sent on the data-changed channel when a data set is attached or dropped
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    pub struct DataChange {
        pub step_count: usize,
        pub has_active_file: bool,
    }

    /// Sent on the layer-state-changed channel after a layer mutator
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    pub struct LayerStateChange {
        pub layer: LayerId,
    }

    /// What caused a format-state-changed notification
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    pub enum FormatChange {
        /// Unit preferences were reloaded and mapped onto the layers
        Units,
        /// Number abbreviation of one layer changed
        Numbers(LayerId),
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    pub struct DownloadProgress {
        pub transferred: i64,
        pub total: i64,
        pub completed: bool,
        pub success: bool,
    }

    impl DownloadProgress {
        /// Fraction done in `[0, 1]`, `None` while the total is unknown
        pub fn fraction(&self) -> Option<f64> {
            if self.total <= 0 {
                return None;
            }
            Some((self.transferred as f64 / self.total as f64).clamp(0.0, 1.0))
        }
    }

    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct CursorPosition {
        pub lat: f64,
        pub lon: f64,
    }
}

pub use payloads::*;
