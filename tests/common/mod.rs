//! Shared test fixtures for integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use rand::{SeedableRng, rngs::StdRng};

use chargepoint_sim::config::{ChargePointConfig, SimulatorConfig};
use chargepoint_sim::error::SinkError;
use chargepoint_sim::sim::ChargePointEngine;
use chargepoint_sim::sim::clock::LiveClock;
use chargepoint_sim::sim::types::PriceObservation;
use chargepoint_sim::sink::{EventSink, MemorySink, Record};
use chargepoint_sim::topology::ChargePointIdentity;

/// Fixed "now" used as the live clock anchor.
pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 18, 0, 0).unwrap()
}

/// Charge point parameters with a fixed session energy and delivery rate.
///
/// History is one session long and ends right before [`now`].
pub fn fixed_config(energy_kwh: f64, delivery_rate: u8) -> ChargePointConfig {
    ChargePointConfig {
        energy_kwh_min: energy_kwh,
        energy_kwh_max: energy_kwh,
        delivery_rate_min: delivery_rate,
        delivery_rate_max: delivery_rate,
        backfill_sessions: 1,
        backfill_hours: 0,
        ..ChargePointConfig::default()
    }
}

/// Quick preset shrunk to sub-minute sessions, for whole-fleet runs.
pub fn small_fleet_config() -> SimulatorConfig {
    let mut config = SimulatorConfig::quick();
    config.charge_point.energy_kwh_min = 0.5;
    config.charge_point.energy_kwh_max = 0.6;
    config.charge_point.backfill_sessions = 2;
    config.charge_point.backfill_hours = 0;
    config
}

/// Engine for the first built-in charge point, live clock anchored at [`now`].
///
/// Must be called inside a tokio runtime with paused time.
pub fn engine(sink: Arc<dyn EventSink>, config: ChargePointConfig, seed: u64) -> ChargePointEngine {
    ChargePointEngine::new(
        ChargePointIdentity::new(1, "Hamburg_HBF_A", 1),
        config,
        sink,
        LiveClock::anchored_at(now()),
        StdRng::seed_from_u64(seed),
    )
}

/// Memory sink with one price already published at [`now`].
pub fn priced_sink(price: f64) -> Arc<MemorySink> {
    let sink = Arc::new(MemorySink::new());
    sink.insert_price(&PriceObservation {
        timestamp: now(),
        price,
    })
    .unwrap();
    sink
}

/// Sink that accepts prices but refuses every record.
#[derive(Default)]
pub struct FailingSink {
    prices: MemorySink,
}

impl EventSink for FailingSink {
    fn insert(&self, collection: &str, _record: &dyn Record) -> Result<(), SinkError> {
        Err(SinkError::Unavailable(format!("{collection} is offline")))
    }

    fn insert_price(&self, observation: &PriceObservation) -> Result<(), SinkError> {
        self.prices.insert_price(observation)
    }

    fn current_price(&self) -> Result<f64, SinkError> {
        self.prices.current_price()
    }
}

/// Sink that refuses everything, prices included.
pub struct OfflineSink;

impl EventSink for OfflineSink {
    fn insert(&self, _collection: &str, _record: &dyn Record) -> Result<(), SinkError> {
        Err(SinkError::Unavailable("offline".to_string()))
    }

    fn insert_price(&self, _observation: &PriceObservation) -> Result<(), SinkError> {
        Err(SinkError::Unavailable("offline".to_string()))
    }

    fn current_price(&self) -> Result<f64, SinkError> {
        Err(SinkError::Unavailable("offline".to_string()))
    }
}
