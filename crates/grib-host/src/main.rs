//! gribsync - runs the overlay plugin against an in-process host
//!
//! Usage:
//!   gribsync                          # defaults, nothing persisted
//!   gribsync overlay.json             # read and write back a config snapshot
//!   gribsync --steps 4 --lat 42 --lon -8

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{ensure, Context, Result};
use chrono::{DateTime, Duration, DurationRound, Utc};
use clap::Parser;
use grib_core::events::{DataChange, LayerStateChange};
use grib_core::{FieldKind, TimelineStamp};
use grib_data::{ConfigStore, DataSet, ForecastRecordSet, MemoryConfig, RegularGrid, RenderCache};
use grib_facade::messages::{
    DISCOVERY_REQUEST, GLOBAL_UNIT_SETTINGS_CHANGED, GRIB_TIMELINE, GRIB_TIMELINE_REQUEST, GRIB_VALUES,
    GRIB_VALUES_REQUEST, GRIB_VERSION, GRIB_VERSION_REQUEST, REFERENCE_PUBLISHED, WIND_SPEED,
};
use grib_facade::{ConsumerLink, CoreDeps, FacadeDirectory, LocalBus, PluginHost};
use tracing::{info, warn};

const STEP_HOURS: i64 = 3;

#[derive(Parser)]
#[command(name = "gribsync")]
#[command(about = "Run the GRIB overlay plugin against an in-process host")]
struct Args {
    /// Flat key/value JSON snapshot, read before init and written back after unload
    config: Option<PathBuf>,

    /// Forecast steps in the synthetic data set, three hours apart
    #[arg(short = 's', long, default_value_t = 8)]
    steps: i64,

    /// Latitude of the sampled point
    #[arg(long, default_value_t = 45.0, allow_negative_numbers = true)]
    lat: f64,

    /// Longitude of the sampled point
    #[arg(long, default_value_t = -5.0, allow_negative_numbers = true)]
    lon: f64,
}

/// A small forecast: wind veering and freshening, a pressure field and gusts
fn synthetic_data(start: DateTime<Utc>, steps: i64) -> Result<DataSet> {
    let (nlat, nlon) = (21, 21);
    let origin = (40.0, -10.0);
    let spacing = (0.5, 0.5);
    let uniform = |value: f64| RegularGrid::uniform(origin, spacing, (nlat, nlon), value);

    let mut records = Vec::new();
    for step in 0..steps {
        let angle = (step as f64 * 15.0).to_radians();
        let speed = 6.0 + step as f64;
        let pressure: Vec<f64> = (0..nlat * nlon)
            .map(|i| 101_000.0 + (i / nlon) as f64 * 20.0 - step as f64 * 50.0)
            .collect();

        let record = ForecastRecordSet::new(start + Duration::hours(step * STEP_HOURS))
            .with_field(FieldKind::WindU, uniform(-speed * angle.sin()))
            .with_field(FieldKind::WindV, uniform(-speed * angle.cos()))
            .with_field(FieldKind::Gust, uniform(speed * 1.4))
            .with_field(
                FieldKind::Pressure,
                RegularGrid::new(origin, spacing, (nlat, nlon), pressure).context("pressure grid")?,
            );
        records.push(record);
    }
    Ok(DataSet::new("synthetic", records))
}

fn load_config(path: Option<&PathBuf>) -> Result<MemoryConfig> {
    let Some(path) = path else {
        return Ok(MemoryConfig::new());
    };
    if !path.exists() {
        info!(path = %path.display(), "config file not found, starting from defaults");
        return Ok(MemoryConfig::new());
    }
    let json = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    MemoryConfig::from_json(&json).with_context(|| format!("parsing {}", path.display()))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    ensure!(args.steps > 0, "--steps must be at least 1");
    let (lat, lon) = (args.lat, args.lon);
    let config = Arc::new(load_config(args.config.as_ref())?);

    let bus = Arc::new(LocalBus::new());
    let directory = Arc::new(FacadeDirectory::new());

    // Consumer side: remembers the published reference
    let consumer = Arc::new(ConsumerLink::new(directory.clone()));
    {
        let consumer = consumer.clone();
        bus.subscribe(move |message| {
            if consumer.on_message(&message.id, &message.body) {
                info!(handle = ?consumer.handle(), "consumer saw a new reference");
            }
        });
    }

    let mut host = PluginHost::new(directory.clone(), bus.clone());
    let renderer = Arc::new(RenderCache::new());
    host.init(CoreDeps::new(renderer.clone(), config.clone()));
    host.set_plugin_message(DISCOVERY_REQUEST, "");
    host.late_init();

    let api = consumer.api().context("facade reference did not resolve")?;
    let (major, minor) = api.version();
    info!(major, minor, "consumer connected");

    api.data_changed().register(|change: &DataChange| {
        info!(steps = change.step_count, active = change.has_active_file, "data changed");
    });
    api.layer_state_changed().register(|change: &LayerStateChange| {
        info!(layer = %change.layer, "layer state changed");
    });

    let start = Utc::now()
        .duration_trunc(Duration::hours(1))
        .context("truncating start time")?;
    host.begin_loading();
    host.load_data(synthetic_data(start, args.steps)?);

    api.set_enabled(true);
    api.set_visible(true);
    api.set_numbers(2, true);
    if !api.set_barbed_arrows(42, true) {
        warn!("layer 42 rejected as expected");
    }

    for index in 0..api.step_count() {
        api.set_index(index);
        info!(
            index,
            time = %api.time_string(index, false),
            wind = %api.layer_value_at_point(0, lat, lon),
            pressure = %api.layer_value_at_point(2, lat, lon),
            "step"
        );
    }
    api.set_to_nearest_now();
    host.set_cursor_lat_lon(lat, lon);

    let mut request = serde_json::to_value(TimelineStamp::from_datetime(start + Duration::minutes(30)))?;
    request["lat"] = lat.into();
    request["lon"] = lon.into();
    request[WIND_SPEED] = 1.into();
    host.set_plugin_message(GRIB_VALUES_REQUEST, &request.to_string());
    host.set_plugin_message(GRIB_VERSION_REQUEST, "");
    host.set_plugin_message(GRIB_TIMELINE_REQUEST, "");

    // The host switches wind speeds to km/h
    config.write("/Settings/Units/WindSpeed", "2");
    host.set_plugin_message(GLOBAL_UNIT_SETTINGS_CHANGED, "");
    info!(wind = %api.layer_value_at_point(0, lat, lon), "after unit change");

    host.deinit();
    info!(
        connected = api.is_connected(),
        reference = ?consumer.handle(),
        published = bus.count(REFERENCE_PUBLISHED),
        refreshes = renderer.refresh_count(),
        "plugin unloaded"
    );
    for message in bus.take() {
        if matches!(message.id.as_str(), GRIB_VALUES | GRIB_VERSION | GRIB_TIMELINE) {
            info!("{}: {}", message.id, message.body);
        }
    }

    if let Some(path) = args.config {
        let json = config.to_json()?;
        std::fs::write(&path, json).with_context(|| format!("writing {}", path.display()))?;
        info!(path = %path.display(), "configuration written");
    }
    Ok(())
}
