//! # Telemetry Store
//!
//! Holds the running [`Reading`] and a bounded history of past readings.
//!
//! ## Merge Semantics
//!
//! Each ingested line is merged onto a copy of the current reading and the
//! result is committed in one assignment, so readers never observe a
//! partially applied line. Every non-separator line produces a new reading,
//! even one with no recognized fields; it is stamped with the ingestion time
//! and appended to the history like any other.
//!
//! ## Usage
//!
//! ```
//! use irrigation_monitor::telemetry::store::TelemetryStore;
//!
//! let mut store = TelemetryStore::new()?;
//! store.ingest("Temperatura: 22.1");
//! store.ingest("Suelo 1: 1800");
//!
//! assert_eq!(store.current().temperature, 22.1);
//! assert_eq!(store.current().soil[0], 1800);
//! assert_eq!(store.history().len(), 2);
//! # Ok::<(), irrigation_monitor::error::MonitorError>(())
//! ```

use chrono::{DateTime, Local};
use std::collections::VecDeque;
use tracing::debug;

use super::parser::{is_separator, TelemetryParser};
use super::reading::{Field, Reading};
use crate::error::Result;

/// Default number of readings kept for trend charts
pub const HISTORY_CAPACITY: usize = 100;

/// Current reading plus bounded FIFO history
#[derive(Debug)]
pub struct TelemetryStore {
    parser: TelemetryParser,
    current: Reading,
    history: VecDeque<Reading>,
    capacity: usize,
}

impl TelemetryStore {
    /// Create a store with the default history capacity of 100 readings.
    ///
    /// # Errors
    ///
    /// Returns error if the field patterns fail to compile.
    pub fn new() -> Result<Self> {
        Self::with_capacity(HISTORY_CAPACITY)
    }

    /// Create a store keeping at most `capacity` readings (minimum 1).
    ///
    /// # Errors
    ///
    /// Returns error if the field patterns fail to compile.
    pub fn with_capacity(capacity: usize) -> Result<Self> {
        let capacity = capacity.max(1);
        Ok(Self {
            parser: TelemetryParser::new()?,
            current: Reading::zeroed(Local::now()),
            history: VecDeque::with_capacity(capacity),
            capacity,
        })
    }

    /// Ingest a raw line, stamping the result with the current wall-clock time.
    ///
    /// Returns `None` for separator lines; the current reading is untouched.
    pub fn ingest(&mut self, line: &str) -> Option<Reading> {
        self.ingest_at(line, Local::now())
    }

    /// Ingest a raw line with an explicit capture time.
    pub fn ingest_at(&mut self, line: &str, captured_at: DateTime<Local>) -> Option<Reading> {
        if is_separator(line) {
            debug!("Ignoring frame separator: {:?}", line);
            return None;
        }

        let mut next = self.parser.merge(&self.current, line);
        next.captured_at = captured_at;

        if next.same_values(&self.current) {
            debug!("No recognized fields in line: {:?}", line);
        }

        self.current = next;
        self.history.push_back(next);
        while self.history.len() > self.capacity {
            self.history.pop_front();
        }

        Some(next)
    }

    /// Latest reading, or the zeroed initial reading before any ingest.
    #[must_use]
    pub fn current(&self) -> Reading {
        self.current
    }

    /// Retained readings, oldest first.
    #[must_use]
    pub fn history(&self) -> Vec<Reading> {
        self.history.iter().copied().collect()
    }

    /// Number of retained readings.
    #[must_use]
    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// Maximum number of retained readings.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drop all retained history. The current reading is kept.
    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    /// Time series of one field across the history, oldest first.
    #[must_use]
    pub fn series(&self, field: Field) -> Vec<(DateTime<Local>, f64)> {
        self.history
            .iter()
            .map(|r| (r.captured_at, r.value_of(field)))
            .collect()
    }
}
