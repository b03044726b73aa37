//! Plugin lifecycle and message routing
//!
//! The host application drives [`PluginHost`]: `init` when the plugin is
//! loaded, `late_init` once everything else is up, `deinit` on unload. Every
//! bus message addressed to plugins goes through
//! [`PluginHost::set_plugin_message`].

use std::sync::Arc;

use chrono::{DateTime, Utc};
use grib_core::events::{CursorPosition, DownloadProgress};
use grib_core::{TimelineContext, TimelineListener, TimelineStamp};
use grib_data::DataSet;
use tracing::{debug, error, info, warn};

use crate::capability::GribCapability;
use crate::discovery::{DiscoveryFacade, FacadeDirectory, ReferenceHandle};
use crate::facade::GribApi;
use crate::messages::{
    values_reply, MessageBus, VersionReply, DISCOVERY_REQUEST, GLOBAL_UNIT_SETTINGS_CHANGED, GRIB_TIMELINE,
    GRIB_TIMELINE_REQUEST, GRIB_VALUES, GRIB_VALUES_REQUEST, GRIB_VERSION, GRIB_VERSION_REQUEST,
};
use crate::plugin::{CoreDeps, GribCore};
use crate::{API_VERSION_MAJOR, API_VERSION_MINOR, PLUGIN_VERSION_MAJOR, PLUGIN_VERSION_MINOR};

fn broadcast_timeline(bus: &dyn MessageBus, time: Option<DateTime<Utc>>) {
    match serde_json::to_string(&TimelineStamp::from_optional(time)) {
        Ok(body) => bus.send(GRIB_TIMELINE, &body),
        Err(e) => error!(error = %e, "failed to encode timeline stamp"),
    }
}

/// Announces every timeline move on the bus
struct TimelineBroadcaster {
    bus: Arc<dyn MessageBus>,
}

impl TimelineListener for TimelineBroadcaster {
    fn on_timeline_changed(&self, context: &TimelineContext) {
        broadcast_timeline(self.bus.as_ref(), Some(context.time));
    }
}

struct Running {
    core: Arc<GribCore>,
    api: Arc<GribApi>,
    // Listeners are held weakly by the core
    _broadcaster: Arc<dyn TimelineListener>,
}

pub struct PluginHost {
    bus: Arc<dyn MessageBus>,
    discovery: DiscoveryFacade,
    running: Option<Running>,
}

impl PluginHost {
    pub fn new(directory: Arc<FacadeDirectory>, bus: Arc<dyn MessageBus>) -> Self {
        Self {
            discovery: DiscoveryFacade::new(directory, bus.clone()),
            bus,
            running: None,
        }
    }

    /// Create the core and the facade, then publish the facade reference
    pub fn init(&mut self, deps: CoreDeps) -> Option<ReferenceHandle> {
        if let Some(running) = &self.running {
            warn!("init called twice, keeping the running core");
            return self.discovery.publish(&running.api);
        }

        let core = Arc::new(GribCore::new(deps));
        let broadcaster: Arc<dyn TimelineListener> = Arc::new(TimelineBroadcaster { bus: self.bus.clone() });
        core.add_timeline_listener(&broadcaster);

        let capability: Arc<dyn GribCapability> = core.clone();
        let api = Arc::new(GribApi::new(&capability));
        info!(
            major = PLUGIN_VERSION_MAJOR,
            minor = PLUGIN_VERSION_MINOR,
            "overlay plugin initialised"
        );

        let handle = self.discovery.publish(&api);
        self.running = Some(Running {
            core,
            api,
            _broadcaster: broadcaster,
        });
        handle
    }

    /// The host is fully up; announce the reference again for late consumers
    pub fn late_init(&self) -> Option<ReferenceHandle> {
        let running = self.running.as_ref()?;
        self.discovery.publish(&running.api)
    }

    /// Tear down: retract the timeline, save, invalidate the reference, drop
    pub fn deinit(&mut self) {
        let Some(running) = self.running.take() else {
            self.discovery.invalidate();
            return;
        };

        broadcast_timeline(self.bus.as_ref(), None);
        if let Err(e) = running.core.save_config() {
            error!(error = %e, "failed to save configuration on unload");
        }
        running.api.clear_callbacks();
        // Consumers must see the sentinel while the facade still exists
        self.discovery.invalidate();
        drop(running);
        info!("overlay plugin unloaded");
    }

    pub fn discovery(&self) -> &DiscoveryFacade {
        &self.discovery
    }

    pub fn api(&self) -> Option<Arc<GribApi>> {
        self.running.as_ref().map(|r| r.api.clone())
    }

    pub fn core(&self) -> Option<Arc<GribCore>> {
        self.running.as_ref().map(|r| r.core.clone())
    }

    /// Route one bus message
    pub fn set_plugin_message(&self, id: &str, body: &str) {
        match id {
            DISCOVERY_REQUEST => {
                let api = self.running.as_ref().map(|r| &r.api);
                self.discovery.on_discovery_request(api);
            }
            GLOBAL_UNIT_SETTINGS_CHANGED => {
                if let Some(running) = &self.running {
                    running.api.sync_units();
                }
            }
            GRIB_VALUES_REQUEST => {
                let Some(running) = &self.running else {
                    return;
                };
                let reply = values_reply(body, running.core.as_ref());
                if !reply.is_empty() {
                    self.bus.send(GRIB_VALUES, &reply);
                }
            }
            GRIB_VERSION_REQUEST => {
                let reply = VersionReply {
                    major: API_VERSION_MAJOR,
                    minor: API_VERSION_MINOR,
                };
                match serde_json::to_string(&reply) {
                    Ok(body) => self.bus.send(GRIB_VERSION, &body),
                    Err(e) => error!(error = %e, "failed to encode version reply"),
                }
            }
            GRIB_TIMELINE_REQUEST => {
                let time = self.running.as_ref().and_then(|r| r.core.timeline_context()).map(|c| c.time);
                broadcast_timeline(self.bus.as_ref(), time);
            }
            _ => debug!(id, "message ignored"),
        }
    }

    pub fn set_cursor_lat_lon(&self, lat: f64, lon: f64) {
        let Some(running) = &self.running else {
            return;
        };
        running.core.update_cursor(lat, lon);
        running.api.notify_cursor_position(CursorPosition { lat, lon });
    }

    /// Called by the download collaborator
    pub fn notify_download_progress(&self, transferred: i64, total: i64, completed: bool, success: bool) {
        let Some(running) = &self.running else {
            return;
        };
        if completed {
            info!(transferred, success, "download finished");
        }
        running.api.notify_download_progress(DownloadProgress {
            transferred,
            total,
            completed,
            success,
        });
    }

    pub fn begin_loading(&self) {
        if let Some(running) = &self.running {
            running.core.begin_loading();
        }
    }

    pub fn load_data(&self, data: DataSet) {
        let Some(running) = &self.running else {
            warn!(source = data.source(), "data offered before init, ignored");
            return;
        };
        let change = running.core.load_data(data);
        running.api.notify_data_changed(change);
    }

    pub fn clear_data(&self) {
        if let Some(running) = &self.running {
            let change = running.core.clear_data();
            running.api.notify_data_changed(change);
        }
    }
}

impl Drop for PluginHost {
    fn drop(&mut self) {
        if self.running.is_some() {
            self.deinit();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::discovery::{ConsumerLink, NO_REFERENCE};
    use crate::messages::{LocalBus, REFERENCE_PUBLISHED, WIND_DIR, WIND_SPEED};
    use crate::plugin::tests::{base_time, sample_data};
    use chrono::Duration;
    use grib_core::events::{DataChange, FormatChange};
    use grib_core::LayerId;
    use grib_data::{ConfigStore, MemoryConfig, RenderCache};
    use parking_lot::Mutex;
    use serde_json::Value;

    struct Setup {
        host: PluginHost,
        bus: Arc<LocalBus>,
        directory: Arc<FacadeDirectory>,
        config: Arc<MemoryConfig>,
    }

    fn setup() -> Setup {
        let directory = Arc::new(FacadeDirectory::new());
        let bus = Arc::new(LocalBus::new());
        let config = Arc::new(MemoryConfig::new());
        let mut host = PluginHost::new(directory.clone(), bus.clone());
        let deps = CoreDeps::new(Arc::new(RenderCache::new()), config.clone())
            .with_clock(Arc::new(FixedClock::new(base_time())));
        host.init(deps);
        Setup {
            host,
            bus,
            directory,
            config,
        }
    }

    fn stamp(body: &str) -> TimelineStamp {
        serde_json::from_str(body).unwrap()
    }

    #[test]
    fn test_lifecycle_publish_and_invalidate() {
        let mut s = setup();
        let consumer = ConsumerLink::new(s.directory.clone());
        for message in s.bus.sent() {
            consumer.on_message(&message.id, &message.body);
        }
        let api = consumer.api().unwrap();
        api.set_parameter(80);

        s.host.late_init();
        assert_eq!(s.bus.count(REFERENCE_PUBLISHED), 2);

        s.host.deinit();
        assert_eq!(s.bus.last_body(REFERENCE_PUBLISHED).as_deref(), Some(NO_REFERENCE));
        assert_eq!(stamp(&s.bus.last_body(GRIB_TIMELINE).unwrap()), TimelineStamp::INVALID);
        assert_eq!(s.config.read("/PlugIns/GRIB/Parameter").as_deref(), Some("80"));

        // The facade the consumer still holds is cut off from the core
        assert!(!api.is_connected());
        assert_eq!(api.parameter(), 50);

        consumer.on_message(REFERENCE_PUBLISHED, NO_REFERENCE);
        assert!(consumer.api().is_none());

        let published = s.bus.count(REFERENCE_PUBLISHED);
        s.host.set_plugin_message(DISCOVERY_REQUEST, "");
        assert_eq!(s.bus.count(REFERENCE_PUBLISHED), published);
    }

    #[test]
    fn test_discovery_request_republishes() {
        let s = setup();
        s.host.set_plugin_message(DISCOVERY_REQUEST, "");
        assert_eq!(s.bus.count(REFERENCE_PUBLISHED), 2);
        let handle = s.host.discovery().handle().unwrap();
        assert_eq!(s.bus.last_body(REFERENCE_PUBLISHED), Some(handle.to_string()));
    }

    #[test]
    fn test_version_reply() {
        let s = setup();
        s.host.set_plugin_message(GRIB_VERSION_REQUEST, "");
        let reply: Value = serde_json::from_str(&s.bus.last_body(GRIB_VERSION).unwrap()).unwrap();
        assert_eq!(reply["GribVersionMajor"], 1);
        assert_eq!(reply["GribVersionMinor"], 16);
    }

    #[test]
    fn test_timeline_broadcasts() {
        let s = setup();
        s.host.set_plugin_message(GRIB_TIMELINE_REQUEST, "");
        assert_eq!(stamp(&s.bus.last_body(GRIB_TIMELINE).unwrap()), TimelineStamp::INVALID);

        s.host.load_data(sample_data());
        let api = s.host.api().unwrap();
        assert!(api.set_index(2));
        let expected = TimelineStamp::from_datetime(base_time() + Duration::hours(6));
        assert_eq!(stamp(&s.bus.last_body(GRIB_TIMELINE).unwrap()), expected);

        s.host.set_plugin_message(GRIB_TIMELINE_REQUEST, "");
        assert_eq!(stamp(&s.bus.last_body(GRIB_TIMELINE).unwrap()), expected);
    }

    #[test]
    fn test_values_request() {
        let s = setup();
        s.host.load_data(sample_data());

        let mut request = serde_json::to_value(TimelineStamp::from_datetime(base_time())).unwrap();
        request["lat"] = 10.0.into();
        request["lon"] = 20.0.into();
        request[WIND_SPEED] = 1.into();
        s.host.set_plugin_message(GRIB_VALUES_REQUEST, &request.to_string());

        let reply: Value = serde_json::from_str(&s.bus.last_body(GRIB_VALUES).unwrap()).unwrap();
        assert_eq!(reply["Type"], "Reply");
        assert_eq!(reply[WIND_SPEED], 10.0);
        assert_eq!(reply[WIND_DIR], 0.0);

        let before = s.bus.count(GRIB_VALUES);
        s.host.set_plugin_message(GRIB_VALUES_REQUEST, "{}");
        assert_eq!(s.bus.count(GRIB_VALUES), before);
    }

    #[test]
    fn test_unit_settings_message() {
        let s = setup();
        let api = s.host.api().unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        api.format_state_changed().register(move |change: &FormatChange| sink.lock().push(*change));

        s.config.write("/Settings/Units/Speed", "2");
        s.host.set_plugin_message(GLOBAL_UNIT_SETTINGS_CHANGED, "");

        assert_eq!(*seen.lock(), vec![FormatChange::Units]);
        assert_eq!(api.layer_unit(LayerId::Current as i32).map(|u| u.label()), Some("km/h"));
    }

    #[test]
    fn test_channels_forwarded() {
        let s = setup();
        let api = s.host.api().unwrap();
        let data = Arc::new(Mutex::new(Vec::new()));
        let progress = Arc::new(Mutex::new(Vec::new()));
        let cursor = Arc::new(Mutex::new(Vec::new()));
        let (d, p, c) = (data.clone(), progress.clone(), cursor.clone());
        api.data_changed().register(move |change: &DataChange| d.lock().push(*change));
        api.download_progress().register(move |update: &DownloadProgress| p.lock().push(*update));
        api.cursor_position().register(move |position: &CursorPosition| c.lock().push(*position));

        s.host.load_data(sample_data());
        s.host.clear_data();
        s.host.notify_download_progress(50, 100, false, false);
        s.host.set_cursor_lat_lon(10.0, 20.0);

        let data = data.lock();
        assert_eq!(data.len(), 2);
        assert_eq!(data[0].step_count, 5);
        assert!(!data[1].has_active_file);
        assert_eq!(progress.lock()[0].fraction(), Some(0.5));
        assert_eq!(*cursor.lock(), vec![CursorPosition { lat: 10.0, lon: 20.0 }]);
    }

    #[test]
    fn test_cursor_updates_readout() {
        let s = setup();
        s.host.load_data(sample_data());
        s.host.api().unwrap().set_index(0);
        s.host.set_cursor_lat_lon(10.0, 20.0);

        let core = s.host.core().unwrap();
        assert_eq!(core.readout().value(LayerId::Wind), "19.4 kts");
    }
}
