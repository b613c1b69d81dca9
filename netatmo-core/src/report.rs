use std::fmt::Write;

use crate::model::WeatherReading;

/// Console report of one collection cycle.
pub fn render(readings: &[WeatherReading]) -> String {
    let Some(first) = readings.first() else {
        return "No weather readings available.\n".to_string();
    };

    let mut out = String::new();
    let _ = writeln!(out, "\nNetatmo Weather Report - {}\n", first.timestamp);

    let mut current_station: Option<&str> = None;
    for reading in readings {
        if current_station != Some(reading.station_name.as_str()) {
            current_station = Some(reading.station_name.as_str());
            let _ = writeln!(out, "Station: {}", reading.station_name);
        }

        let _ = writeln!(out, "  Module: {} ({})", reading.module_name, reading.module_type);
        let _ = writeln!(out, "  Last updated: {}", reading.last_updated);
        for (kind, value) in &reading.metrics {
            let _ = writeln!(out, "    {}: {} {}", kind.label(), value, kind.unit());
        }
        out.push('\n');
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{MetricKind, ModuleType};

    fn reading(station: &str, module: &str, module_type: ModuleType) -> WeatherReading {
        WeatherReading {
            timestamp: "2024-03-01 12:30:05".into(),
            station_name: station.into(),
            module_name: module.into(),
            module_type,
            metrics: vec![(MetricKind::Temperature, 21.5), (MetricKind::Co2, 612.0)],
            last_updated: "2024-03-01 12:29:40".into(),
        }
    }

    #[test]
    fn empty_report() {
        assert_eq!(render(&[]), "No weather readings available.\n");
    }

    #[test]
    fn station_heading_printed_once_per_station() {
        let out = render(&[
            reading("Home", "Main Module", ModuleType::Main),
            reading("Home", "Garden", ModuleType::Other("NAModule1".into())),
            reading("Cabin", "Main Module", ModuleType::Main),
        ]);

        assert!(out.contains("Netatmo Weather Report - 2024-03-01 12:30:05"));
        assert_eq!(out.matches("Station: Home").count(), 1);
        assert_eq!(out.matches("Station: Cabin").count(), 1);
        assert!(out.contains("  Module: Garden (NAModule1)"));
        assert!(out.contains("    Temperature: 21.5 Cel"));
        assert!(out.contains("    CO2: 612 ppm"));
    }
}
