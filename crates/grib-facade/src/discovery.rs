//! Publishing and retracting the facade reference
//!
//! A consumer never receives the facade itself, only a [`ReferenceHandle`]
//! in text form. It resolves the handle through the [`FacadeDirectory`] each
//! time it needs the facade. Handles carry a generation, so a handle from a
//! previous publication resolves to nothing once it has been revoked, even
//! if the same plugin instance has published again since.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use ahash::AHashMap;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::facade::GribApi;
use crate::messages::{MessageBus, REFERENCE_PUBLISHED};

/// Body of [`REFERENCE_PUBLISHED`] meaning "no reference"
pub const NO_REFERENCE: &str = "0";

/// Opaque, generation-tagged facade reference; text form `instance:generation`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReferenceHandle {
    instance: u64,
    generation: u64,
}

impl ReferenceHandle {
    pub fn instance(&self) -> u64 {
        self.instance
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Parse a published body. The sentinel and anything unparsable give `None`.
    pub fn from_body(body: &str) -> Option<Self> {
        body.parse().ok()
    }
}

impl fmt::Display for ReferenceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.instance, self.generation)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseHandleError(String);

impl fmt::Display for ParseHandleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "not a facade handle: {:?}", self.0)
    }
}

impl std::error::Error for ParseHandleError {}

impl FromStr for ReferenceHandle {
    type Err = ParseHandleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseHandleError(s.to_string());
        let (instance, generation) = s.trim().split_once(':').ok_or_else(err)?;
        let instance: u64 = instance.parse().map_err(|_| err())?;
        let generation: u64 = generation.parse().map_err(|_| err())?;
        if instance == 0 || generation == 0 {
            return Err(err());
        }
        Ok(Self { instance, generation })
    }
}

/// Where published handles resolve
///
/// Shared by the publishing side and its consumers, passed explicitly to
/// both. Entries hold the facade weakly.
#[derive(Debug, Default)]
pub struct FacadeDirectory {
    next_instance: AtomicU64,
    generations: Mutex<AHashMap<u64, u64>>,
    entries: RwLock<AHashMap<ReferenceHandle, Weak<GribApi>>>,
}

impl FacadeDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Identity for one publishing component, never 0
    pub fn allocate_instance(&self) -> u64 {
        self.next_instance.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Enter a facade under a fresh generation of `instance`
    pub fn register(&self, instance: u64, api: &Arc<GribApi>) -> ReferenceHandle {
        let generation = {
            let mut generations = self.generations.lock();
            let generation = generations.entry(instance).or_insert(0);
            *generation += 1;
            *generation
        };
        let handle = ReferenceHandle { instance, generation };
        self.entries.write().insert(handle, Arc::downgrade(api));
        debug!(%handle, "facade registered");
        handle
    }

    /// Live facade for a handle; revoked, stale or dropped gives `None`
    pub fn resolve(&self, handle: &ReferenceHandle) -> Option<Arc<GribApi>> {
        self.entries.read().get(handle).and_then(Weak::upgrade)
    }

    pub fn revoke(&self, handle: &ReferenceHandle) {
        if self.entries.write().remove(handle).is_some() {
            debug!(%handle, "facade revoked");
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Lifecycle of the published reference
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Uninitialized,
    Published(ReferenceHandle),
    /// Terminal
    Invalidated,
}

/// Publishing side of the handshake
pub struct DiscoveryFacade {
    instance: u64,
    directory: Arc<FacadeDirectory>,
    bus: Arc<dyn MessageBus>,
    state: Mutex<LinkState>,
}

impl DiscoveryFacade {
    pub fn new(directory: Arc<FacadeDirectory>, bus: Arc<dyn MessageBus>) -> Self {
        let instance = directory.allocate_instance();
        Self {
            instance,
            directory,
            bus,
            state: Mutex::new(LinkState::Uninitialized),
        }
    }

    pub fn state(&self) -> LinkState {
        *self.state.lock()
    }

    pub fn handle(&self) -> Option<ReferenceHandle> {
        match self.state() {
            LinkState::Published(handle) => Some(handle),
            LinkState::Uninitialized | LinkState::Invalidated => None,
        }
    }

    /// Announce the facade. The first call registers it; later calls resend
    /// the same handle. Ignored once invalidated.
    pub fn publish(&self, api: &Arc<GribApi>) -> Option<ReferenceHandle> {
        let mut state = self.state.lock();
        let handle = match *state {
            LinkState::Invalidated => {
                debug!("publish after invalidation ignored");
                return None;
            }
            LinkState::Published(handle) => handle,
            LinkState::Uninitialized => {
                let handle = self.directory.register(self.instance, api);
                *state = LinkState::Published(handle);
                handle
            }
        };
        drop(state);

        self.bus.send(REFERENCE_PUBLISHED, &handle.to_string());
        debug!(%handle, "facade reference published");
        Some(handle)
    }

    /// Consumer asked for the reference. Answered in `Uninitialized` and
    /// `Published`; returns whether a reference went out.
    pub fn on_discovery_request(&self, api: Option<&Arc<GribApi>>) -> bool {
        if self.state() == LinkState::Invalidated {
            debug!("discovery request after invalidation ignored");
            return false;
        }
        match api {
            Some(api) => self.publish(api).is_some(),
            None => {
                warn!("discovery request before the facade exists");
                false
            }
        }
    }

    /// Retract the reference: revoke the directory entry and broadcast the
    /// sentinel. Only the first call has any effect.
    pub fn invalidate(&self) -> bool {
        let previous = std::mem::replace(&mut *self.state.lock(), LinkState::Invalidated);
        match previous {
            LinkState::Invalidated => false,
            LinkState::Published(handle) => {
                self.directory.revoke(&handle);
                self.bus.send(REFERENCE_PUBLISHED, NO_REFERENCE);
                info!(%handle, "facade reference invalidated");
                true
            }
            LinkState::Uninitialized => {
                self.bus.send(REFERENCE_PUBLISHED, NO_REFERENCE);
                info!("facade invalidated before first publication");
                true
            }
        }
    }
}

/// Consumer side: tracks the most recent reference it was told about
pub struct ConsumerLink {
    directory: Arc<FacadeDirectory>,
    current: Mutex<Option<ReferenceHandle>>,
}

impl ConsumerLink {
    pub fn new(directory: Arc<FacadeDirectory>) -> Self {
        Self {
            directory,
            current: Mutex::new(None),
        }
    }

    /// Feed every bus message here; returns true when the reference changed
    pub fn on_message(&self, id: &str, body: &str) -> bool {
        if id != REFERENCE_PUBLISHED {
            return false;
        }
        let handle = ReferenceHandle::from_body(body);
        if handle.is_none() && body.trim() != NO_REFERENCE {
            warn!(body, "unreadable facade reference, treated as none");
        }
        let mut current = self.current.lock();
        let changed = *current != handle;
        *current = handle;
        changed
    }

    pub fn handle(&self) -> Option<ReferenceHandle> {
        *self.current.lock()
    }

    /// The facade, if the last announcement still resolves
    pub fn api(&self) -> Option<Arc<GribApi>> {
        let handle = self.handle()?;
        self.directory.resolve(&handle)
    }
}
