//! # Irrigation Monitor Library
//!
//! Live monitoring of an irrigation and climate controller over a serial link.
//!
//! This library provides the telemetry core behind the monitor: the serial
//! connection to the controller, the line parser that turns its text output
//! into readings, and the store that keeps the current reading plus a bounded
//! history for trend charts.

pub mod config;
pub mod dashboard;
pub mod error;
pub mod monitor;
pub mod serial;
pub mod telemetry;
