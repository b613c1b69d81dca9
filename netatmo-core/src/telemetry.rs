//! OpenTelemetry export of weather readings, with delta reporting against the
//! values recorded by the previous run.
//!
//! Each metric kind gets one observable gauge. Recording a reading stores the
//! latest value per sensor; the periodic OTLP reader picks those values up on
//! every collection and once more when the pipeline is shut down.

use anyhow::{Context, Result, anyhow, bail};
use opentelemetry::{
    KeyValue, global,
    metrics::{AsyncInstrument, MeterProvider as _, ObservableGauge, Unit},
};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{Resource, metrics::SdkMeterProvider, runtime};
use std::{
    collections::{BTreeMap, HashMap},
    fmt,
    sync::{Arc, Mutex, PoisonError},
};
use tracing::{debug, info, warn};
use url::Url;

use crate::{
    config::TelemetryConfig,
    model::{MetricKind, WeatherReading},
    store::{StateMap, StateStore},
};

/// Whether metrics are exported in this run, and if not, why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TelemetryStatus {
    Enabled,
    DisabledByConfig,
    DisabledBySetupError(String),
}

impl TelemetryStatus {
    pub fn is_enabled(&self) -> bool {
        matches!(self, TelemetryStatus::Enabled)
    }
}

impl fmt::Display for TelemetryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TelemetryStatus::Enabled => f.write_str("enabled"),
            TelemetryStatus::DisabledByConfig => f.write_str("disabled by configuration"),
            TelemetryStatus::DisabledBySetupError(reason) => {
                write!(f, "disabled after setup error: {reason}")
            }
        }
    }
}

/// One metric value applied to its gauge.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedMetric {
    pub kind: MetricKind,
    pub state_key: String,
    pub value: f64,
    pub previous: Option<f64>,
}

impl RecordedMetric {
    /// `value - previous`, when a previous value exists.
    pub fn delta(&self) -> Option<f64> {
        self.previous.map(|prev| self.value - prev)
    }
}

/// Signed, two decimals: `+1.50`, `-0.25`.
pub fn format_delta(delta: f64) -> String {
    format!("{delta:+.2}")
}

type Observation = (f64, Vec<KeyValue>);

/// Latest value per metric kind and sensor, read by the gauge callbacks.
#[derive(Debug, Default)]
struct LatestValues {
    inner: Mutex<HashMap<MetricKind, BTreeMap<String, Observation>>>,
}

impl LatestValues {
    fn set(&self, kind: MetricKind, sensor_key: &str, value: f64, attributes: Vec<KeyValue>) {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.entry(kind).or_default().insert(sensor_key.to_string(), (value, attributes));
    }

    fn snapshot(&self, kind: MetricKind) -> Vec<Observation> {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.get(&kind).map(|by_sensor| by_sensor.values().cloned().collect()).unwrap_or_default()
    }
}

pub struct TelemetryManager {
    status: TelemetryStatus,
    provider: Option<SdkMeterProvider>,
    gauges: HashMap<MetricKind, ObservableGauge<f64>>,
    latest: Arc<LatestValues>,
    previous_values: StateMap,
    store: StateStore,
}

impl TelemetryManager {
    /// Load previous values and, when enabled, build the OTLP pipeline.
    ///
    /// Pipeline failures never propagate: they leave the manager in
    /// [`TelemetryStatus::DisabledBySetupError`].
    pub fn new(config: &TelemetryConfig, store: StateStore) -> Self {
        let mut manager = Self::disabled(store);
        if config.enabled {
            manager.setup(config);
        }
        manager
    }

    /// Export through an already-built provider, e.g. one with a manual reader.
    pub fn with_meter_provider(provider: SdkMeterProvider, namespace: &str, store: StateStore) -> Self {
        let mut manager = Self::disabled(store);
        manager.install(provider, namespace);
        manager
    }

    fn disabled(store: StateStore) -> Self {
        let previous_values = load_previous_values(&store);
        Self {
            status: TelemetryStatus::DisabledByConfig,
            provider: None,
            gauges: HashMap::new(),
            latest: Arc::default(),
            previous_values,
            store,
        }
    }

    pub fn status(&self) -> &TelemetryStatus {
        &self.status
    }

    pub fn previous_values(&self) -> &StateMap {
        &self.previous_values
    }

    fn setup(&mut self, config: &TelemetryConfig) {
        match build_meter_provider(config) {
            Ok(provider) => {
                self.install(provider, &config.namespace);
                info!(
                    endpoint = %config.collector_endpoint,
                    service = %config.service_name,
                    "OpenTelemetry configured to export metrics"
                );
            }
            Err(err) => {
                self.status = TelemetryStatus::DisabledBySetupError(format!("{err:#}"));
            }
        }
    }

    fn install(&mut self, provider: SdkMeterProvider, namespace: &str) {
        let meter = provider.meter(namespace.to_string());

        for kind in MetricKind::all().iter().copied() {
            let latest = Arc::clone(&self.latest);
            let gauge = meter
                .f64_observable_gauge(kind.metric_name())
                .with_description(kind.description())
                .with_unit(Unit::new(kind.unit()))
                .with_callback(move |observer: &dyn AsyncInstrument<f64>| {
                    for (value, attributes) in latest.snapshot(kind) {
                        observer.observe(value, &attributes);
                    }
                })
                .init();
            self.gauges.insert(kind, gauge);
        }

        self.provider = Some(provider);
        self.status = TelemetryStatus::Enabled;
    }

    /// Apply every metric of `reading` to its gauge and report deltas.
    ///
    /// Previous values are updated in memory and the whole map is written to
    /// the state file once per reading. Returns nothing when export is disabled.
    pub fn record_metrics(&mut self, reading: &WeatherReading) -> Vec<RecordedMetric> {
        if !self.status.is_enabled() || self.provider.is_none() {
            return Vec::new();
        }

        let sensor_key = reading.sensor_key();
        let attributes = vec![
            KeyValue::new("station_name", reading.station_name.clone()),
            KeyValue::new("module_name", reading.module_name.clone()),
            KeyValue::new("module_type", reading.module_type.to_string()),
        ];

        let mut recorded = Vec::with_capacity(reading.metrics.len());
        for &(kind, value) in &reading.metrics {
            if !self.gauges.contains_key(&kind) {
                continue;
            }
            self.latest.set(kind, &sensor_key, value, attributes.clone());
            info!("Recorded {} value: {} {} for {}", kind.metric_name(), value, kind.unit(), sensor_key);

            let state_key = format!("{sensor_key}:{kind}");
            let previous = self.previous_values.insert(state_key.clone(), value);
            if let Some(prev) = previous {
                info!("  Change since last reading: {} {}", format_delta(value - prev), kind.unit());
            }

            recorded.push(RecordedMetric { kind, state_key, value, previous });
        }

        if let Err(err) = self.store.save(&self.previous_values) {
            warn!(error = %format!("{err:#}"), "Could not save metric state");
        }

        recorded
    }

    /// Flush pending gauge values and stop the export pipeline.
    pub async fn shutdown(self) {
        let Some(provider) = self.provider else {
            return;
        };

        match tokio::task::spawn_blocking(move || provider.shutdown()).await {
            Ok(Ok(())) => debug!("Metrics pipeline shut down"),
            Ok(Err(err)) => warn!(error = %err, "Failed to flush metrics on shutdown"),
            Err(err) => warn!(error = %err, "Metrics shutdown task failed"),
        }
    }
}

fn load_previous_values(store: &StateStore) -> StateMap {
    match store.load() {
        Ok(values) if !values.is_empty() => {
            info!("Loaded previous states for {} metrics", values.len());
            values
        }
        Ok(_) => {
            info!("No previous state found, this appears to be the first run");
            StateMap::new()
        }
        Err(err) => {
            warn!(error = %format!("{err:#}"), "Ignoring unreadable state file");
            StateMap::new()
        }
    }
}

fn build_meter_provider(config: &TelemetryConfig) -> Result<SdkMeterProvider> {
    if config.export_interval_ms == 0 {
        bail!("export_interval_ms must be greater than zero");
    }
    let endpoint = metrics_endpoint(&config.collector_endpoint)?;

    // export failures surface here instead of on stderr
    let _ = global::set_error_handler(|err| warn!(error = %err, "OpenTelemetry export error"));

    let exporter = opentelemetry_otlp::new_exporter().http().with_endpoint(endpoint);
    let resource = Resource::new(vec![
        KeyValue::new("service.name", config.service_name.clone()),
        KeyValue::new("service.namespace", config.namespace.clone()),
    ]);

    opentelemetry_otlp::new_pipeline()
        .metrics(runtime::Tokio)
        .with_exporter(exporter)
        .with_resource(resource)
        .with_period(config.export_interval())
        .build()
        .context("Failed to build OTLP metrics pipeline")
}

fn metrics_endpoint(endpoint: &str) -> Result<String> {
    let trimmed = endpoint.trim();
    let url = Url::parse(trimmed)
        .with_context(|| format!("Invalid collector endpoint `{trimmed}`"))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(anyhow!("Collector endpoint must be http(s), got `{}`", url.scheme()));
    }

    if trimmed.contains("/v1/metrics") {
        return Ok(trimmed.to_string());
    }
    Ok(format!("{}/v1/metrics", trimmed.trim_end_matches('/')))
}
