//! # Telemetry Reading Types
//!
//! Core data definitions for the controller's telemetry: the merged
//! [`Reading`] snapshot, motor states and the set of known fields.

use chrono::{DateTime, Local};
use serde::Serialize;

use crate::error::{MonitorError, Result};

/// Word the firmware prints for a running motor
pub const MOTOR_ACTIVE_TOKEN: &str = "ACTIVO";

/// Number of soil moisture probes on the controller
pub const SOIL_SENSOR_COUNT: usize = 4;

/// On/off state of an irrigation motor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MotorState {
    /// Pump is running
    Active,
    /// Pump is stopped
    #[default]
    Off,
}

impl MotorState {
    /// Map a firmware token to a motor state.
    ///
    /// Only the exact word `ACTIVO` means running; every other token,
    /// including `APAGADO`, is treated as off.
    ///
    /// # Examples
    ///
    /// ```
    /// use irrigation_monitor::telemetry::reading::MotorState;
    ///
    /// assert_eq!(MotorState::from_token("ACTIVO"), MotorState::Active);
    /// assert_eq!(MotorState::from_token("APAGADO"), MotorState::Off);
    /// assert_eq!(MotorState::from_token("activo"), MotorState::Off);
    /// ```
    #[must_use]
    pub fn from_token(token: &str) -> Self {
        if token == MOTOR_ACTIVE_TOKEN {
            MotorState::Active
        } else {
            MotorState::Off
        }
    }

    /// Returns `true` if the motor is running.
    #[must_use]
    pub fn is_active(self) -> bool {
        self == MotorState::Active
    }
}

/// A complete point-in-time view of the controller.
///
/// Every field always holds a value. Lines from the device usually carry a
/// single field, so each new reading is the previous one with the matched
/// fields overwritten.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Reading {
    /// Air temperature in degrees Celsius
    pub temperature: f64,

    /// Relative air humidity in percent
    pub air_humidity: f64,

    /// Raw soil probe counts, probes 1 to 4 (higher is drier)
    pub soil: [u32; SOIL_SENSOR_COUNT],

    /// Motor A (waters zones 1 and 2)
    pub motor_a: MotorState,

    /// Motor B (waters zones 3 and 4)
    pub motor_b: MotorState,

    /// Wall-clock time the reading was merged
    pub captured_at: DateTime<Local>,
}

impl Reading {
    /// All-zero reading with both motors off.
    #[must_use]
    pub fn zeroed(captured_at: DateTime<Local>) -> Self {
        Self {
            temperature: 0.0,
            air_humidity: 0.0,
            soil: [0; SOIL_SENSOR_COUNT],
            motor_a: MotorState::Off,
            motor_b: MotorState::Off,
            captured_at,
        }
    }

    /// Returns `true` if both readings carry the same sensor values,
    /// ignoring when they were captured.
    #[must_use]
    pub fn same_values(&self, other: &Reading) -> bool {
        self.temperature == other.temperature
            && self.air_humidity == other.air_humidity
            && self.soil == other.soil
            && self.motor_a == other.motor_a
            && self.motor_b == other.motor_b
    }

    /// Overwrite a single field.
    ///
    /// Values whose kind does not match the field are ignored.
    pub fn apply(&mut self, field: Field, value: FieldValue) {
        match (field, value) {
            (Field::Temperature, FieldValue::Float(v)) => self.temperature = v,
            (Field::AirHumidity, FieldValue::Float(v)) => self.air_humidity = v,
            (Field::Soil(probe), FieldValue::Count(v)) => {
                if let Some(slot) = probe.checked_sub(1).and_then(|i| self.soil.get_mut(i)) {
                    *slot = v;
                }
            }
            (Field::MotorA, FieldValue::Motor(state)) => self.motor_a = state,
            (Field::MotorB, FieldValue::Motor(state)) => self.motor_b = state,
            _ => {}
        }
    }

    /// Numeric value of a field for plotting. Motors map to 1.0 (active) / 0.0 (off).
    #[must_use]
    pub fn value_of(&self, field: Field) -> f64 {
        match field {
            Field::Temperature => self.temperature,
            Field::AirHumidity => self.air_humidity,
            Field::Soil(probe) => probe
                .checked_sub(1)
                .and_then(|i| self.soil.get(i))
                .map_or(0.0, |&v| f64::from(v)),
            Field::MotorA => motor_level(self.motor_a),
            Field::MotorB => motor_level(self.motor_b),
        }
    }
}

fn motor_level(state: MotorState) -> f64 {
    if state.is_active() {
        1.0
    } else {
        0.0
    }
}

/// A telemetry field the firmware can report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Temperature,
    AirHumidity,
    /// Soil probe, numbered 1 to 4
    Soil(usize),
    MotorA,
    MotorB,
}

impl Field {
    /// Every known field, in the order the firmware prints them.
    pub const ALL: [Field; 8] = [
        Field::Temperature,
        Field::AirHumidity,
        Field::Soil(1),
        Field::Soil(2),
        Field::Soil(3),
        Field::Soil(4),
        Field::MotorA,
        Field::MotorB,
    ];

    /// Literal label that precedes the value on the wire
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Field::Temperature => "Temperatura:",
            Field::AirHumidity => "Humedad:",
            Field::Soil(1) => "Suelo 1:",
            Field::Soil(2) => "Suelo 2:",
            Field::Soil(3) => "Suelo 3:",
            Field::Soil(4) => "Suelo 4:",
            // Out-of-range probes never appear on the wire
            Field::Soil(_) => "Suelo ?:",
            Field::MotorA => "Motor A:",
            Field::MotorB => "Motor B:",
        }
    }

    /// Regex fragment for the value token following the label
    pub(crate) fn value_pattern(self) -> &'static str {
        match self {
            Field::Temperature => r"-?[\d.]+",
            Field::AirHumidity => r"[\d.]+",
            Field::Soil(_) => r"\d+",
            Field::MotorA | Field::MotorB => r"\w+",
        }
    }

    /// Convert a matched token into a typed value.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::ParseField`] if the token is not a valid
    /// number of the expected kind.
    pub fn parse_value(self, token: &str) -> Result<FieldValue> {
        let parse_error = || MonitorError::ParseField {
            label: self.label(),
            value: token.to_string(),
        };

        match self {
            Field::Temperature | Field::AirHumidity => token
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .map(FieldValue::Float)
                .ok_or_else(parse_error),
            Field::Soil(_) => token
                .parse::<u32>()
                .map(FieldValue::Count)
                .map_err(|_| parse_error()),
            Field::MotorA | Field::MotorB => Ok(FieldValue::Motor(MotorState::from_token(token))),
        }
    }
}

/// Typed value extracted for a [`Field`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue {
    Float(f64),
    Count(u32),
    Motor(MotorState),
}
