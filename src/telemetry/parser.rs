//! # Telemetry Line Parser
//!
//! Decodes the controller's line-oriented text output.
//!
//! The firmware prints one labelled value per line, grouped into frames by
//! separator lines:
//!
//! ```text
//! ===== Lectura =====
//! Temperatura: 24.3
//! Humedad: 61.0
//! Suelo 1: 1820
//! Suelo 2: 1430
//! Suelo 3: 2011
//! Suelo 4: 990
//! Motor A: ACTIVO
//! Motor B: APAGADO
//! ```
//!
//! Each known field has a rule: its label, followed by optional whitespace
//! and a value token. Rules are matched independently anywhere in the line,
//! so a line may update zero, one or several fields.

use regex::Regex;
use tracing::debug;

use super::reading::{Field, FieldValue, Reading};
use crate::error::Result;

/// Character runs the firmware uses as frame delimiters
const SEPARATOR_MARKERS: &[&str] = &["===", "---"];

/// Returns `true` if the line is a frame delimiter carrying no data.
///
/// # Examples
///
/// ```
/// use irrigation_monitor::telemetry::parser::is_separator;
///
/// assert!(is_separator("===== Lectura ====="));
/// assert!(is_separator("----------"));
/// assert!(!is_separator("Temperatura: -3.5"));
/// ```
#[must_use]
pub fn is_separator(line: &str) -> bool {
    SEPARATOR_MARKERS.iter().any(|marker| line.contains(marker))
}

/// Compiled matcher for a single field
#[derive(Debug)]
struct FieldRule {
    field: Field,
    pattern: Regex,
}

impl FieldRule {
    fn new(field: Field) -> Result<Self> {
        let pattern = Regex::new(&format!(
            r"{}\s*({})",
            regex::escape(field.label()),
            field.value_pattern()
        ))?;
        Ok(Self { field, pattern })
    }

    /// Value of the last occurrence in `line` that parses cleanly.
    ///
    /// Occurrences with unparsable values are skipped; they never clear an
    /// earlier valid match.
    fn extract(&self, line: &str) -> Option<FieldValue> {
        let mut value = None;
        for caps in self.pattern.captures_iter(line) {
            let Some(token) = caps.get(1) else { continue };
            match self.field.parse_value(token.as_str()) {
                Ok(v) => value = Some(v),
                Err(e) => debug!("Skipping field: {}", e),
            }
        }
        value
    }
}

/// A field value recognized in a line
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldUpdate {
    pub field: Field,
    pub value: FieldValue,
}

/// Table-driven parser for telemetry lines
#[derive(Debug)]
pub struct TelemetryParser {
    rules: Vec<FieldRule>,
}

impl TelemetryParser {
    /// Build the rule table for every known field.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::Pattern`](crate::error::MonitorError::Pattern)
    /// if a field pattern fails to compile.
    pub fn new() -> Result<Self> {
        let rules = Field::ALL
            .iter()
            .map(|&field| FieldRule::new(field))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { rules })
    }

    /// Extract every recognized field from a line.
    ///
    /// Separator lines and lines without known labels yield no updates.
    /// When a label appears more than once, the last valid value wins.
    ///
    /// # Examples
    ///
    /// ```
    /// use irrigation_monitor::telemetry::parser::TelemetryParser;
    /// use irrigation_monitor::telemetry::reading::{Field, FieldValue};
    ///
    /// let parser = TelemetryParser::new()?;
    /// let updates = parser.parse("Suelo 2: 1430");
    ///
    /// assert_eq!(updates.len(), 1);
    /// assert_eq!(updates[0].field, Field::Soil(2));
    /// assert_eq!(updates[0].value, FieldValue::Count(1430));
    /// # Ok::<(), irrigation_monitor::error::MonitorError>(())
    /// ```
    #[must_use]
    pub fn parse(&self, line: &str) -> Vec<FieldUpdate> {
        if is_separator(line) {
            return Vec::new();
        }

        self.rules
            .iter()
            .filter(|rule| line.contains(rule.field.label()))
            .filter_map(|rule| {
                rule.extract(line).map(|value| FieldUpdate {
                    field: rule.field,
                    value,
                })
            })
            .collect()
    }

    /// Apply a line's updates on top of `prior`, returning the merged reading.
    ///
    /// Fields not present in the line are carried forward unchanged.
    /// `captured_at` is left as in `prior`; the caller stamps it.
    #[must_use]
    pub fn merge(&self, prior: &Reading, line: &str) -> Reading {
        let mut merged = *prior;
        for update in self.parse(line) {
            merged.apply(update.field, update.value);
        }
        merged
    }
}
