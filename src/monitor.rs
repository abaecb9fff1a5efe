//! # Monitor Session
//!
//! One explicitly owned context per monitoring session: the serial link and
//! the telemetry store, driven by a single polling loop.
//!
//! The session never spawns its own timer or reader thread. The caller paces
//! [`MonitorSession::poll`] and renders between polls.

use std::time::Duration;
use tracing::{debug, warn};

use crate::config::Config;
use crate::dashboard::{Snapshot, Thresholds};
use crate::error::Result;
use crate::serial::port_trait::LinePort;
use crate::serial::{ConnectionState, SerialConnection};
use crate::telemetry::{Reading, TelemetryStore};

/// Serial link plus telemetry store for a single controller
#[derive(Debug)]
pub struct MonitorSession {
    link: SerialConnection,
    store: TelemetryStore,
    port: String,
    baud_rate: u32,
    thresholds: Thresholds,
}

impl MonitorSession {
    /// Build a disconnected session from configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the telemetry store cannot be built.
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            link: SerialConnection::from_config(&config.serial),
            store: TelemetryStore::with_capacity(config.telemetry.history_capacity)?,
            port: config.serial.port.clone(),
            baud_rate: config.serial.baud_rate,
            thresholds: config.thresholds(),
        })
    }

    /// Override the post-open settle delay.
    #[must_use]
    pub fn with_settle_delay(mut self, settle_delay: Duration) -> Self {
        self.link = self.link.with_settle_delay(settle_delay);
        self
    }

    /// Connect to the configured port.
    ///
    /// # Errors
    ///
    /// Returns a connection error if the port cannot be opened. The session
    /// stays usable and may retry.
    pub async fn connect(&mut self) -> Result<()> {
        self.link.connect(&self.port, self.baud_rate).await
    }

    /// Connect to the configured port through an already opened transport.
    pub fn attach(&mut self, port: Box<dyn LinePort>) {
        self.link.attach(&self.port, port);
    }

    /// Close the link. Readings and history are kept.
    pub fn disconnect(&mut self) {
        self.link.disconnect();
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.link.is_connected()
    }

    #[must_use]
    pub fn connection_state(&self) -> ConnectionState {
        self.link.state()
    }

    /// Read at most one available line and ingest it.
    ///
    /// Returns the new reading, or `None` when disconnected, when no line is
    /// ready, or when the line was a frame separator.
    pub fn poll(&mut self) -> Option<Reading> {
        if !self.link.is_connected() {
            return None;
        }

        let line = self.link.read_line_if_available()?;
        let reading = self.store.ingest(&line);
        if reading.is_some() {
            debug!("Ingested line: {:?}", line);
        }
        reading
    }

    /// Like [`poll`](Self::poll), but surfaces read failures to the caller.
    ///
    /// # Errors
    ///
    /// Returns the link's `NotConnected`, `Decode`, `LineTooLong` or `Io`
    /// error. The store is untouched in every error case.
    pub fn try_poll(&mut self) -> Result<Option<Reading>> {
        Ok(self
            .link
            .poll_line()?
            .and_then(|line| self.store.ingest(&line)))
    }

    /// Drain buffered lines, up to `max_lines`, returning how many readings were produced.
    pub fn poll_all(&mut self, max_lines: usize) -> usize {
        let mut produced = 0;
        let mut drained = 0;
        while drained < max_lines && self.link.is_connected() {
            let Some(line) = self.link.read_line_if_available() else {
                break;
            };
            drained += 1;
            if self.store.ingest(&line).is_some() {
                produced += 1;
            }
        }
        if max_lines > 0 && drained == max_lines {
            warn!("Stopped draining after {} lines; more may be buffered", max_lines);
        }
        produced
    }

    #[must_use]
    pub fn current(&self) -> Reading {
        self.store.current()
    }

    #[must_use]
    pub fn history(&self) -> Vec<Reading> {
        self.store.history()
    }

    #[must_use]
    pub fn store(&self) -> &TelemetryStore {
        &self.store
    }

    #[must_use]
    pub fn thresholds(&self) -> Thresholds {
        self.thresholds
    }

    /// Adjust the presentation thresholds.
    pub fn set_thresholds(&mut self, thresholds: Thresholds) {
        self.thresholds = thresholds;
    }

    /// Classified view of the current state for a renderer.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        Snapshot::new(
            self.is_connected(),
            self.store.current(),
            self.store.history_len(),
            self.thresholds,
        )
    }
}
