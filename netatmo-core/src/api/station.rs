use chrono::{DateTime, Local};
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::{
    config::ApiConfig,
    error::ApiError,
    model::{MetricKind, ModuleType, WeatherReading},
};

use super::{AccessToken, send_json};

const STATION_ENDPOINT: &str = "getstationsdata";

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
pub const DEFAULT_STATION_NAME: &str = "Main Weather Station";
pub const MAIN_MODULE_NAME: &str = "Main Module";
pub const DEFAULT_MODULE_NAME: &str = "Unnamed Module";
pub const DEFAULT_MODULE_TYPE: &str = "Unknown";
const UNKNOWN_TIME: &str = "Unknown";

/// The `body` of a getstationsdata response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StationData {
    pub devices: Vec<Device>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Device {
    #[serde(default)]
    pub station_name: Option<String>,
    #[serde(default)]
    pub dashboard_data: Option<DashboardData>,
    #[serde(default)]
    pub modules: Vec<Module>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Module {
    #[serde(default)]
    pub module_name: Option<String>,
    #[serde(default, rename = "type")]
    pub module_type: Option<String>,
    #[serde(default)]
    pub dashboard_data: Option<DashboardData>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DashboardData {
    #[serde(default, rename = "Temperature")]
    pub temperature: Option<f64>,
    #[serde(default, rename = "Humidity")]
    pub humidity: Option<f64>,
    #[serde(default, rename = "Pressure")]
    pub pressure: Option<f64>,
    #[serde(default, rename = "CO2")]
    pub co2: Option<f64>,
    #[serde(default, rename = "Noise")]
    pub noise: Option<f64>,
    #[serde(default)]
    pub time_utc: Option<i64>,
}

impl DashboardData {
    pub fn value(&self, kind: MetricKind) -> Option<f64> {
        match kind {
            MetricKind::Temperature => self.temperature,
            MetricKind::Humidity => self.humidity,
            MetricKind::Pressure => self.pressure,
            MetricKind::Co2 => self.co2,
            MetricKind::Noise => self.noise,
        }
    }

    /// Recognized metrics present in this block.
    pub fn metrics(&self) -> Vec<(MetricKind, f64)> {
        MetricKind::all()
            .iter()
            .filter_map(|kind| self.value(*kind).map(|v| (*kind, v)))
            .collect()
    }
}

#[derive(Debug, Deserialize)]
struct StationDataResponse {
    body: Option<StationData>,
}

/// Fetches raw station payloads with a bearer token.
#[derive(Debug, Clone)]
pub struct StationClient {
    http: Client,
    station_data_url: String,
}

impl StationClient {
    pub fn new(api: &ApiConfig) -> Self {
        Self::with_client(Client::new(), api)
    }

    pub fn with_client(http: Client, api: &ApiConfig) -> Self {
        Self { http, station_data_url: api.station_data_url.clone() }
    }

    pub async fn get_station_data(&self, token: &AccessToken) -> Result<StationData, ApiError> {
        let request = self.http.get(&self.station_data_url).bearer_auth(token.secret());
        let response: StationDataResponse = send_json(STATION_ENDPOINT, request).await?;

        let body = response
            .body
            .ok_or(ApiError::MissingField { endpoint: STATION_ENDPOINT, field: "body" })?;
        debug!(devices = body.devices.len(), "Station data received");

        Ok(body)
    }
}

/// Flatten a payload into one reading per module with at least one metric.
pub fn parse_weather_readings(data: &StationData) -> Vec<WeatherReading> {
    parse_weather_readings_at(data, Local::now())
}

/// Same as [`parse_weather_readings`] with an explicit capture time.
pub fn parse_weather_readings_at(data: &StationData, now: DateTime<Local>) -> Vec<WeatherReading> {
    let timestamp = now.format(TIMESTAMP_FORMAT).to_string();
    let mut readings = Vec::new();

    for device in &data.devices {
        let station_name = device.station_name.as_deref().unwrap_or(DEFAULT_STATION_NAME);

        if let Some(dashboard) = &device.dashboard_data {
            readings.extend(build_reading(
                &timestamp,
                station_name,
                MAIN_MODULE_NAME,
                ModuleType::Main,
                dashboard,
            ));
        }

        for module in &device.modules {
            let Some(dashboard) = &module.dashboard_data else {
                continue;
            };
            let module_name = module.module_name.as_deref().unwrap_or(DEFAULT_MODULE_NAME);
            let module_type =
                ModuleType::Other(module.module_type.as_deref().unwrap_or(DEFAULT_MODULE_TYPE).to_string());

            readings.extend(build_reading(&timestamp, station_name, module_name, module_type, dashboard));
        }
    }

    readings
}

fn build_reading(
    timestamp: &str,
    station_name: &str,
    module_name: &str,
    module_type: ModuleType,
    dashboard: &DashboardData,
) -> Option<WeatherReading> {
    let metrics = dashboard.metrics();
    if metrics.is_empty() {
        return None;
    }

    let last_updated = dashboard
        .time_utc
        .and_then(format_epoch_local)
        .unwrap_or_else(|| UNKNOWN_TIME.to_string());

    Some(WeatherReading {
        timestamp: timestamp.to_string(),
        station_name: station_name.to_string(),
        module_name: module_name.to_string(),
        module_type,
        metrics,
        last_updated,
    })
}

/// Epoch seconds as a local `%Y-%m-%d %H:%M:%S` string.
pub fn format_epoch_local(epoch: i64) -> Option<String> {
    DateTime::from_timestamp(epoch, 0)
        .map(|utc| utc.with_timezone(&Local).format(TIMESTAMP_FORMAT).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn data(value: serde_json::Value) -> StationData {
        serde_json::from_value(value).expect("valid station payload")
    }

    fn fixed_now() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 3, 1, 12, 30, 5).single().expect("unambiguous time")
    }

    #[test]
    fn single_main_module_scenario() {
        let payload = data(json!({
            "devices": [{
                "station_name": "Home",
                "dashboard_data": { "Temperature": 21.5, "time_utc": 1700000000 }
            }]
        }));

        let readings = parse_weather_readings_at(&payload, fixed_now());

        assert_eq!(readings.len(), 1);
        let r = &readings[0];
        assert_eq!(r.station_name, "Home");
        assert_eq!(r.module_name, "Main Module");
        assert_eq!(r.module_type, ModuleType::Main);
        assert_eq!(r.metrics, vec![(MetricKind::Temperature, 21.5)]);
        assert_eq!(r.timestamp, "2024-03-01 12:30:05");
        assert_eq!(Some(r.last_updated.clone()), format_epoch_local(1_700_000_000));
    }

    #[test]
    fn dashboards_without_recognized_metrics_produce_nothing() {
        let payload = data(json!({
            "devices": [{
                "station_name": "Home",
                "dashboard_data": { "time_utc": 1700000000, "WindStrength": 4 },
                "modules": [
                    { "module_name": "Rain", "type": "NAModule3", "dashboard_data": { "Rain": 0.2 } },
                    { "module_name": "Offline", "type": "NAModule1" }
                ]
            }]
        }));

        assert!(parse_weather_readings_at(&payload, fixed_now()).is_empty());
    }

    #[test]
    fn output_order_and_defaults() {
        let payload = data(json!({
            "devices": [
                {
                    "station_name": "Home",
                    "dashboard_data": { "Noise": 38, "CO2": 612, "Temperature": 20.1, "time_utc": 1700000000 },
                    "modules": [
                        { "module_name": "Garden", "type": "NAModule1",
                          "dashboard_data": { "Humidity": 80, "Temperature": 4.2, "time_utc": 1700000100 } },
                        { "dashboard_data": { "Temperature": 18.0 } }
                    ]
                },
                {
                    "dashboard_data": { "Pressure": 1013.2, "time_utc": 1700000000 }
                }
            ]
        }));

        let readings = parse_weather_readings_at(&payload, fixed_now());
        let keys: Vec<String> = readings.iter().map(WeatherReading::sensor_key).collect();

        assert_eq!(
            keys,
            vec![
                "Home:Main Module:MAIN",
                "Home:Garden:NAModule1",
                "Home:Unnamed Module:Unknown",
                "Main Weather Station:Main Module:MAIN",
            ]
        );
        assert_eq!(
            readings[0].metrics,
            vec![
                (MetricKind::Temperature, 20.1),
                (MetricKind::Co2, 612.0),
                (MetricKind::Noise, 38.0),
            ]
        );
        assert_eq!(readings[2].last_updated, "Unknown");
        assert!(readings.iter().all(|r| r.timestamp == readings[0].timestamp));
    }

    #[test]
    fn unknown_payload_fields_are_ignored() {
        let payload = data(json!({
            "devices": [{
                "_id": "70:ee:50:00:00:00",
                "station_name": "Home",
                "wifi_status": 52,
                "dashboard_data": { "Temperature": 19.0, "min_temp": 17.2, "temp_trend": "up" }
            }],
            "user": { "mail": "someone@example.com" }
        }));

        assert_eq!(parse_weather_readings_at(&payload, fixed_now()).len(), 1);
    }
}
