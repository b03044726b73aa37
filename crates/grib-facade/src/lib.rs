//! Facade, discovery protocol and lifecycle of the forecast overlay
//!
//! [`PluginHost`] owns the [`GribCore`] context object and hands consumers a
//! [`GribApi`] through the discovery protocol in [`discovery`]. The facade
//! only ever sees the core through the [`GribCapability`] trait and holds it
//! weakly, so a consumer that outlives the plugin gets defaults instead of a
//! dangling reference.

pub mod capability;
pub mod clock;
pub mod discovery;
pub mod download;
pub mod facade;
pub mod host;
pub mod messages;
pub mod plugin;

use grib_core::{LayerError, TimelineError};
use grib_data::DataError;
use thiserror::Error;

pub use capability::{GribCapability, LayerUpdate};
pub use clock::{Clock, FixedClock, SystemClock};
pub use discovery::{ConsumerLink, DiscoveryFacade, FacadeDirectory, LinkState, ReferenceHandle};
pub use download::{DownloadArea, Downloader};
pub use facade::GribApi;
pub use host::PluginHost;
pub use messages::{LocalBus, MessageBus, PluginMessage};
pub use plugin::{CoreDeps, GribCore, StartOption};

pub const PLUGIN_VERSION_MAJOR: i32 = 5;
pub const PLUGIN_VERSION_MINOR: i32 = 0;
pub const API_VERSION_MAJOR: i32 = 1;
pub const API_VERSION_MINOR: i32 = 16;

#[derive(Error, Debug)]
pub enum FacadeError {
    #[error("plugin core is gone")]
    Disconnected,

    #[error(transparent)]
    Layer(#[from] LayerError),

    #[error(transparent)]
    Timeline(#[from] TimelineError),

    #[error(transparent)]
    Data(#[from] DataError),

    #[error("no download collaborator attached")]
    NoDownloader,

    #[error("download failed: {0}")]
    Download(String),

    #[error("malformed {id} message: {reason}")]
    Message { id: String, reason: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
