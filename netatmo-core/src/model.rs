use std::fmt;

use serde::{Deserialize, Serialize};

/// The closed set of measurements a Netatmo station module can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    Temperature,
    Humidity,
    Pressure,
    Co2,
    Noise,
}

impl MetricKind {
    pub const fn all() -> &'static [MetricKind] {
        &[
            MetricKind::Temperature,
            MetricKind::Humidity,
            MetricKind::Pressure,
            MetricKind::Co2,
            MetricKind::Noise,
        ]
    }

    /// Short name used in state keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Temperature => "temperature",
            MetricKind::Humidity => "humidity",
            MetricKind::Pressure => "pressure",
            MetricKind::Co2 => "co2",
            MetricKind::Noise => "noise",
        }
    }

    /// Exported instrument name.
    pub fn metric_name(&self) -> &'static str {
        match self {
            MetricKind::Temperature => "netatmo.temperature",
            MetricKind::Humidity => "netatmo.humidity",
            MetricKind::Pressure => "netatmo.pressure",
            MetricKind::Co2 => "netatmo.co2",
            MetricKind::Noise => "netatmo.noise",
        }
    }

    /// UCUM unit.
    pub fn unit(&self) -> &'static str {
        match self {
            MetricKind::Temperature => "Cel",
            MetricKind::Humidity => "%",
            MetricKind::Pressure => "hPa",
            MetricKind::Co2 => "ppm",
            MetricKind::Noise => "dB",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            MetricKind::Temperature => "Temperature in Celsius",
            MetricKind::Humidity => "Relative humidity percentage",
            MetricKind::Pressure => "Atmospheric pressure in hectopascals",
            MetricKind::Co2 => "CO2 concentration in parts per million",
            MetricKind::Noise => "Noise level in decibels",
        }
    }

    /// Human-readable label for console output.
    pub fn label(&self) -> &'static str {
        match self {
            MetricKind::Temperature => "Temperature",
            MetricKind::Humidity => "Humidity",
            MetricKind::Pressure => "Pressure",
            MetricKind::Co2 => "CO2",
            MetricKind::Noise => "Noise",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ModuleType {
    /// The base station itself.
    Main,
    /// Any attached module, carrying the type string Netatmo reports (e.g. "NAModule1").
    Other(String),
}

impl ModuleType {
    pub fn as_str(&self) -> &str {
        match self {
            ModuleType::Main => "MAIN",
            ModuleType::Other(kind) => kind.as_str(),
        }
    }
}

impl fmt::Display for ModuleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One normalized observation set for a single physical sensor.
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherReading {
    /// Capture time, local, second precision.
    pub timestamp: String,
    pub station_name: String,
    pub module_name: String,
    pub module_type: ModuleType,
    /// Unique kinds, in discovery order.
    pub metrics: Vec<(MetricKind, f64)>,
    /// Time the sensor reported the values, local, second precision.
    pub last_updated: String,
}

impl WeatherReading {
    /// `station:module:type`, unique per physical sensor within a run.
    pub fn sensor_key(&self) -> String {
        format!("{}:{}:{}", self.station_name, self.module_name, self.module_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading(module_type: ModuleType) -> WeatherReading {
        WeatherReading {
            timestamp: "2024-01-01 10:00:00".into(),
            station_name: "Home".into(),
            module_name: "Garden".into(),
            module_type,
            metrics: vec![(MetricKind::Temperature, 4.5), (MetricKind::Humidity, 81.0)],
            last_updated: "2024-01-01 09:58:12".into(),
        }
    }

    #[test]
    fn sensor_key_joins_station_module_and_type() {
        assert_eq!(reading(ModuleType::Main).sensor_key(), "Home:Garden:MAIN");
        assert_eq!(
            reading(ModuleType::Other("NAModule1".into())).sensor_key(),
            "Home:Garden:NAModule1"
        );
    }

    #[test]
    fn every_kind_has_prefixed_name_and_unit() {
        for kind in MetricKind::all() {
            assert_eq!(kind.metric_name(), format!("netatmo.{}", kind.as_str()));
            assert!(!kind.unit().is_empty());
        }
    }
}
