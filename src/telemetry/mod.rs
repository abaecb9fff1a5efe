//! # Telemetry Module
//!
//! Turns the controller's text output into structured readings.
//!
//! This module handles:
//! - Reading and field definitions
//! - Table-driven line parsing with carry-forward merging
//! - The current reading and a bounded FIFO history

pub mod parser;
pub mod reading;
pub mod store;

pub use reading::{Field, MotorState, Reading};
pub use store::TelemetryStore;
