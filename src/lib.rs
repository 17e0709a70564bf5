//! Client library for reading live telemetry from an SMA solar plant.
//!
//! Inverters and the battery inverter are queried over SunSpec Modbus TCP
//! with a self-healing connection; the grid energy meter is read from the
//! Speedwire multicast telegrams it broadcasts about once per second. The
//! [`plant`] module ties both into a single summary of the plant's power
//! flows.

pub mod config;
pub mod discovery;
pub mod error;
pub mod meter;
pub mod modbus;
mod net;
pub mod plant;
pub mod prelude;
pub mod readers;
pub mod sunspec;
