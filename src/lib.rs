//! Synthetic EV charge point telemetry simulator.

pub mod config;
pub mod error;
pub mod logging;
/// Charge point engine, price feed, clocks, and fleet orchestration.
pub mod sim;
/// Event sinks: in-memory and SQLite.
pub mod sink;
pub mod topology;
