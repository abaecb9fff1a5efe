//! # Dashboard Module
//!
//! Read-only classification of readings for the presentation layer.
//!
//! The telemetry core never consults these thresholds. They exist so a
//! renderer can color soil bars, label the soil as moist or dry, and draw
//! the high temperature line on the gauge.
//!
//! ## Soil Probes
//!
//! Soil probes report raw counts where a HIGHER value means DRIER soil. A
//! probe below `soil_dry` is moist, at or above it is dry.
//!
//! ## Usage
//!
//! ```
//! use irrigation_monitor::dashboard::{soil_average, SoilStatus, Thresholds};
//! use irrigation_monitor::telemetry::Reading;
//!
//! let mut reading = Reading::zeroed(chrono::Local::now());
//! reading.soil = [1000, 1200, 1800, 2000];
//!
//! let thresholds = Thresholds::default();
//! assert_eq!(soil_average(&reading), 1500.0);
//! assert_eq!(thresholds.soil_status_of_average(&reading), SoilStatus::Dry);
//! ```

use serde::Serialize;

use crate::telemetry::reading::{Reading, SOIL_SENSOR_COUNT};

/// Lower edge of the warm gauge band in degrees Celsius
pub const WARM_BAND_START: f64 = 25.0;

/// Lower edge of the hot gauge band in degrees Celsius
pub const HOT_BAND_START: f64 = 30.0;

/// User-adjustable classification thresholds
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Thresholds {
    /// Soil count at or above which a probe reads as dry
    pub soil_dry: u32,

    /// Temperature at or above which the greenhouse is too hot
    pub high_temperature: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            soil_dry: 1500,
            high_temperature: 30.0,
        }
    }
}

impl Thresholds {
    /// Classify a single soil count.
    #[must_use]
    pub fn soil_status(&self, count: f64) -> SoilStatus {
        if count < f64::from(self.soil_dry) {
            SoilStatus::Moist
        } else {
            SoilStatus::Dry
        }
    }

    /// Classify each probe of a reading.
    #[must_use]
    pub fn probe_status(&self, reading: &Reading) -> [SoilStatus; SOIL_SENSOR_COUNT] {
        reading.soil.map(|count| self.soil_status(f64::from(count)))
    }

    /// Classify the average of all probes.
    #[must_use]
    pub fn soil_status_of_average(&self, reading: &Reading) -> SoilStatus {
        self.soil_status(soil_average(reading))
    }

    /// Returns `true` if the reading is at or above the high temperature line.
    #[must_use]
    pub fn is_high_temperature(&self, reading: &Reading) -> bool {
        reading.temperature >= self.high_temperature
    }
}

/// Moisture classification of a soil probe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SoilStatus {
    Moist,
    Dry,
}

/// Color band of the temperature gauge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TemperatureBand {
    /// Below 25 °C
    Normal,
    /// 25 °C up to 30 °C
    Warm,
    /// 30 °C and above
    Hot,
}

impl TemperatureBand {
    #[must_use]
    pub fn of(temperature: f64) -> Self {
        if temperature < WARM_BAND_START {
            TemperatureBand::Normal
        } else if temperature < HOT_BAND_START {
            TemperatureBand::Warm
        } else {
            TemperatureBand::Hot
        }
    }
}

/// Mean of the four soil probe counts.
#[must_use]
pub fn soil_average(reading: &Reading) -> f64 {
    let total: f64 = reading.soil.iter().map(|&v| f64::from(v)).sum();
    total / SOIL_SENSOR_COUNT as f64
}

/// Number of running motors (0 to 2).
#[must_use]
pub fn active_motors(reading: &Reading) -> usize {
    [reading.motor_a, reading.motor_b]
        .iter()
        .filter(|m| m.is_active())
        .count()
}

/// Everything a renderer needs for one refresh tick
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub connected: bool,
    pub reading: Reading,
    pub history_len: usize,
    pub soil_average: f64,
    pub soil_status: SoilStatus,
    pub probe_status: [SoilStatus; SOIL_SENSOR_COUNT],
    pub active_motors: usize,
    pub temperature_band: TemperatureBand,
    pub high_temperature: bool,
    pub thresholds: Thresholds,
}

impl Snapshot {
    /// Classify `reading` against `thresholds`.
    #[must_use]
    pub fn new(connected: bool, reading: Reading, history_len: usize, thresholds: Thresholds) -> Self {
        Self {
            connected,
            reading,
            history_len,
            soil_average: soil_average(&reading),
            soil_status: thresholds.soil_status_of_average(&reading),
            probe_status: thresholds.probe_status(&reading),
            active_motors: active_motors(&reading),
            temperature_band: TemperatureBand::of(reading.temperature),
            high_temperature: thresholds.is_high_temperature(&reading),
            thresholds,
        }
    }

    /// One-line operator summary.
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "{:.1}C | air {:.1}% | soil {:?} (avg {:.0}) [{}] | motors {}/2{}",
            self.reading.temperature,
            self.reading.air_humidity,
            self.soil_status,
            self.soil_average,
            self.reading
                .soil
                .iter()
                .map(u32::to_string)
                .collect::<Vec<_>>()
                .join(" "),
            self.active_motors,
            if self.high_temperature { " | HIGH TEMPERATURE" } else { "" }
        )
    }

    /// Serialize for an external renderer.
    ///
    /// # Errors
    ///
    /// Returns error if serialization fails.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::MotorState;
    use chrono::Local;

    fn reading_with_soil(soil: [u32; 4]) -> Reading {
        let mut r = Reading::zeroed(Local::now());
        r.soil = soil;
        r
    }

    #[test]
    fn test_default_thresholds() {
        let t = Thresholds::default();
        assert_eq!(t.soil_dry, 1500);
        assert_eq!(t.high_temperature, 30.0);
    }

    #[test]
    fn test_soil_status_boundary() {
        let t = Thresholds::default();
        assert_eq!(t.soil_status(1499.0), SoilStatus::Moist);
        assert_eq!(t.soil_status(1500.0), SoilStatus::Dry);
        assert_eq!(t.soil_status(2500.0), SoilStatus::Dry);
    }

    #[test]
    fn test_soil_average() {
        assert_eq!(soil_average(&reading_with_soil([0, 0, 0, 0])), 0.0);
        assert_eq!(soil_average(&reading_with_soil([1000, 2000, 1000, 2001])), 1500.25);
    }

    #[test]
    fn test_probe_status() {
        let t = Thresholds {
            soil_dry: 1200,
            high_temperature: 30.0,
        };
        let status = t.probe_status(&reading_with_soil([800, 1200, 1199, 2400]));
        assert_eq!(
            status,
            [SoilStatus::Moist, SoilStatus::Dry, SoilStatus::Moist, SoilStatus::Dry]
        );
    }

    #[test]
    fn test_active_motors() {
        let mut r = reading_with_soil([0; 4]);
        assert_eq!(active_motors(&r), 0);
        r.motor_b = MotorState::Active;
        assert_eq!(active_motors(&r), 1);
        r.motor_a = MotorState::Active;
        assert_eq!(active_motors(&r), 2);
    }

    #[test]
    fn test_temperature_bands() {
        assert_eq!(TemperatureBand::of(-5.0), TemperatureBand::Normal);
        assert_eq!(TemperatureBand::of(24.9), TemperatureBand::Normal);
        assert_eq!(TemperatureBand::of(25.0), TemperatureBand::Warm);
        assert_eq!(TemperatureBand::of(29.9), TemperatureBand::Warm);
        assert_eq!(TemperatureBand::of(30.0), TemperatureBand::Hot);
    }

    #[test]
    fn test_high_temperature() {
        let t = Thresholds {
            soil_dry: 1500,
            high_temperature: 35.0,
        };
        let mut r = reading_with_soil([0; 4]);
        r.temperature = 34.9;
        assert!(!t.is_high_temperature(&r));
        r.temperature = 35.0;
        assert!(t.is_high_temperature(&r));
    }

    #[test]
    fn test_snapshot() {
        let mut r = reading_with_soil([1600, 1700, 1800, 1900]);
        r.temperature = 31.0;
        r.air_humidity = 45.0;
        r.motor_a = MotorState::Active;

        let snapshot = Snapshot::new(true, r, 7, Thresholds::default());
        assert!(snapshot.connected);
        assert_eq!(snapshot.history_len, 7);
        assert_eq!(snapshot.soil_average, 1750.0);
        assert_eq!(snapshot.soil_status, SoilStatus::Dry);
        assert_eq!(snapshot.active_motors, 1);
        assert_eq!(snapshot.temperature_band, TemperatureBand::Hot);
        assert!(snapshot.high_temperature);

        let summary = snapshot.summary();
        assert!(summary.contains("31.0C"));
        assert!(summary.contains("motors 1/2"));
        assert!(summary.contains("HIGH TEMPERATURE"));
    }

    #[test]
    fn test_snapshot_json() {
        let snapshot = Snapshot::new(false, reading_with_soil([0; 4]), 0, Thresholds::default());
        let json: serde_json::Value = serde_json::from_str(&snapshot.to_json().unwrap()).unwrap();
        assert_eq!(json["connected"], false);
        assert_eq!(json["soil_status"], "MOIST");
        assert_eq!(json["temperature_band"], "NORMAL");
        assert_eq!(json["reading"]["motor_a"], "OFF");
        assert_eq!(json["thresholds"]["soil_dry"], 1500);
    }
}
