//! String-keyed plugin messages

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use grib_core::{CallbackId, CallbackRegistry, FieldKind, LayerId, TimelineStamp};
use grib_data::VectorSample;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

/// Consumer asks for the facade reference
pub const DISCOVERY_REQUEST: &str = "DP_GUI_TO_GRIB";
/// Facade reference, or [`crate::discovery::NO_REFERENCE`]
pub const REFERENCE_PUBLISHED: &str = "GRIB_API_TO_DP_GUI";
/// Host unit preferences changed
pub const GLOBAL_UNIT_SETTINGS_CHANGED: &str = "GLOBAL_SETTINGS_UPDATED";
pub const GRIB_VALUES_REQUEST: &str = "GRIB_VALUES_REQUEST";
pub const GRIB_VALUES: &str = "GRIB_VALUES";
pub const GRIB_VERSION_REQUEST: &str = "GRIB_VERSION_REQUEST";
pub const GRIB_VERSION: &str = "GRIB_VERSION";
pub const GRIB_TIMELINE_REQUEST: &str = "GRIB_TIMELINE_REQUEST";
pub const GRIB_TIMELINE: &str = "GRIB_TIMELINE";

pub const WIND_SPEED: &str = "WIND SPEED";
pub const WIND_DIR: &str = "WIND DIR";
pub const CURRENT_SPEED: &str = "CURRENT SPEED";
pub const CURRENT_DIR: &str = "CURRENT DIR";
pub const GUST: &str = "GUST";
pub const SWELL: &str = "SWELL";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginMessage {
    pub id: String,
    pub body: String,
}

/// Fire-and-forget delivery to every other component
pub trait MessageBus: Send + Sync {
    fn send(&self, id: &str, body: &str);
}

/// Messages a [`LocalBus`] keeps by default
pub const DEFAULT_LOG_CAPACITY: usize = 256;

/// In-process bus: delivers synchronously and keeps a bounded log of the
/// most recent messages. Older entries fall off once the log is full.
pub struct LocalBus {
    subscribers: CallbackRegistry<PluginMessage>,
    sent: Mutex<VecDeque<PluginMessage>>,
    capacity: usize,
}

impl Default for LocalBus {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_LOG_CAPACITY)
    }

    /// A capacity of zero disables the log
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            subscribers: CallbackRegistry::new("bus"),
            sent: Mutex::new(VecDeque::with_capacity(capacity.min(DEFAULT_LOG_CAPACITY))),
            capacity,
        }
    }

    pub fn subscribe<F>(&self, handler: F) -> CallbackId
    where
        F: Fn(&PluginMessage) + Send + Sync + 'static,
    {
        self.subscribers.register(handler)
    }

    pub fn unsubscribe(&self, id: CallbackId) {
        self.subscribers.unregister(id);
    }

    pub fn sent(&self) -> Vec<PluginMessage> {
        self.sent.lock().iter().cloned().collect()
    }

    /// Drain the log
    pub fn take(&self) -> Vec<PluginMessage> {
        self.sent.lock().drain(..).collect()
    }

    /// Body of the most recent logged message with this id
    pub fn last_body(&self, id: &str) -> Option<String> {
        self.sent
            .lock()
            .iter()
            .rev()
            .find(|m| m.id == id)
            .map(|m| m.body.clone())
    }

    /// Logged messages with this id
    pub fn count(&self, id: &str) -> usize {
        self.sent.lock().iter().filter(|m| m.id == id).count()
    }

    fn record(&self, message: &PluginMessage) {
        if self.capacity == 0 {
            return;
        }
        let mut sent = self.sent.lock();
        while sent.len() >= self.capacity {
            sent.pop_front();
        }
        sent.push_back(message.clone());
    }
}

impl MessageBus for LocalBus {
    fn send(&self, id: &str, body: &str) {
        let message = PluginMessage {
            id: id.to_string(),
            body: body.to_string(),
        };
        self.record(&message);
        self.subscribers.notify_all(&message);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionReply {
    #[serde(rename = "GribVersionMajor")]
    pub major: i32,
    #[serde(rename = "GribVersionMinor")]
    pub minor: i32,
}

/// Time-interpolated lookups needed to answer a values request
pub trait ValueLookup {
    fn vector_at_time(&self, layer: LayerId, time: DateTime<Utc>, lat: f64, lon: f64) -> Option<VectorSample>;

    fn scalar_at_time(&self, field: FieldKind, time: DateTime<Utc>, lat: f64, lon: f64) -> Option<f64>;
}

/// Answer a `GRIB_VALUES_REQUEST` body
///
/// The request object is echoed with every requested value that resolved
/// filled in (base units: m/s, m, degrees) and `"Type": "Reply"` added.
/// Requested values that do not resolve are removed. A body that is not an
/// object with a `Day` member gets an empty reply.
pub fn values_reply(body: &str, lookup: &dyn ValueLookup) -> String {
    let Ok(Value::Object(mut request)) = serde_json::from_str::<Value>(body) else {
        debug!("values request is not a JSON object");
        return String::new();
    };
    if !request.contains_key("Day") {
        return String::new();
    }

    let time = serde_json::from_value::<TimelineStamp>(Value::Object(request.clone()))
        .ok()
        .and_then(|stamp| stamp.to_datetime());
    let lat = request.get("lat").and_then(Value::as_f64);
    let lon = request.get("lon").and_then(Value::as_f64);
    let position = match (time, lat, lon) {
        (Some(time), Some(lat), Some(lon)) => Some((time, lat, lon)),
        _ => None,
    };

    let vectors = [(WIND_SPEED, WIND_DIR, LayerId::Wind), (CURRENT_SPEED, CURRENT_DIR, LayerId::Current)];
    for (speed_key, dir_key, layer) in vectors {
        if !request.contains_key(speed_key) {
            continue;
        }
        let sample = position.and_then(|(t, lat, lon)| lookup.vector_at_time(layer, t, lat, lon));
        match sample {
            Some(sample) => {
                mark_reply(&mut request);
                request.insert(speed_key.into(), sample.magnitude.into());
                request.insert(dir_key.into(), sample.direction.into());
            }
            None => {
                request.remove(speed_key);
                request.remove(dir_key);
            }
        }
    }

    for (key, field) in [(GUST, FieldKind::Gust), (SWELL, FieldKind::WaveHeight)] {
        if !request.contains_key(key) {
            continue;
        }
        match position.and_then(|(t, lat, lon)| lookup.scalar_at_time(field, t, lat, lon)) {
            Some(value) => {
                mark_reply(&mut request);
                request.insert(key.into(), value.into());
            }
            None => {
                request.remove(key);
            }
        }
    }

    Value::Object(request).to_string()
}

fn mark_reply(request: &mut Map<String, Value>) {
    request.insert("Type".into(), Value::from("Reply"));
}

#[cfg(test)]
mod tests {
    use super::*;
    use grib_data::DirectionConvention;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct OnlyWind;

    impl ValueLookup for OnlyWind {
        fn vector_at_time(&self, layer: LayerId, _: DateTime<Utc>, _: f64, _: f64) -> Option<VectorSample> {
            (layer == LayerId::Wind).then(|| VectorSample::from_components(0.0, -10.0, DirectionConvention::From))
        }

        fn scalar_at_time(&self, _: FieldKind, _: DateTime<Utc>, _: f64, _: f64) -> Option<f64> {
            None
        }
    }

    const REQUEST: &str = r#"{"Day":15,"Month":11,"Year":2021,"Hour":10,"Minute":0,"Second":0,
        "lat":10.0,"lon":20.0,"WIND SPEED":1,"CURRENT SPEED":1,"GUST":1}"#;

    #[test]
    fn test_values_reply_fills_and_omits() {
        let reply: Value = serde_json::from_str(&values_reply(REQUEST, &OnlyWind)).unwrap();
        assert_eq!(reply["Type"], "Reply");
        assert_eq!(reply[WIND_SPEED], 10.0);
        assert_eq!(reply[WIND_DIR], 0.0);
        assert!(reply.get(CURRENT_SPEED).is_none());
        assert!(reply.get(CURRENT_DIR).is_none());
        assert!(reply.get(GUST).is_none());
        assert_eq!(reply["lat"], 10.0);
    }

    #[test]
    fn test_values_reply_without_day() {
        assert_eq!(values_reply(r#"{"lat":1.0}"#, &OnlyWind), "");
        assert_eq!(values_reply("not json", &OnlyWind), "");
    }

    #[test]
    fn test_values_reply_invalid_time_resolves_nothing() {
        let body = r#"{"Day":-1,"Month":-1,"Year":-1,"Hour":-1,"Minute":-1,"Second":-1,"lat":0,"lon":0,"WIND SPEED":1}"#;
        let reply: Value = serde_json::from_str(&values_reply(body, &OnlyWind)).unwrap();
        assert!(reply.get("Type").is_none());
        assert!(reply.get(WIND_SPEED).is_none());
    }

    #[test]
    fn test_local_bus_delivers_and_logs() {
        let bus = LocalBus::new();
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = seen.clone();
        let id = bus.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        bus.send(GRIB_VERSION, "{}");
        bus.unsubscribe(id);
        bus.send(GRIB_VERSION, "{\"x\":1}");

        assert_eq!(seen.load(Ordering::SeqCst), 1);
        assert_eq!(bus.count(GRIB_VERSION), 2);
        assert_eq!(bus.last_body(GRIB_VERSION).as_deref(), Some("{\"x\":1}"));
    }

    #[test]
    fn test_local_bus_log_is_bounded() {
        let bus = LocalBus::with_capacity(3);
        for i in 0..10 {
            bus.send(GRIB_TIMELINE, &i.to_string());
        }
        assert_eq!(bus.count(GRIB_TIMELINE), 3);
        assert_eq!(bus.last_body(GRIB_TIMELINE).as_deref(), Some("9"));

        let drained = bus.take();
        assert_eq!(drained.iter().map(|m| m.body.as_str()).collect::<Vec<_>>(), ["7", "8", "9"]);
        assert!(bus.sent().is_empty());

        let silent = LocalBus::with_capacity(0);
        silent.send(GRIB_TIMELINE, "0");
        assert!(silent.take().is_empty());
    }
}
