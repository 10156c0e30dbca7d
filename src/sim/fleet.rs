//! Fleet orchestration: one price feed plus one engine per charge point.

use std::future::Future;
use std::sync::Arc;

use rand::{SeedableRng, rngs::StdRng};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::config::SimulatorConfig;
use crate::error::SimError;
use crate::sink::EventSink;
use crate::topology::ChargePointIdentity;

use super::charge_point::ChargePointEngine;
use super::clock::LiveClock;
use super::price_feed::PriceFeed;

/// Seed offset for the price feed RNG.
const PRICE_FEED_SEED_OFFSET: u64 = 7;
/// Stride between per-device seeds.
const CHARGE_POINT_SEED_STRIDE: u64 = 57;

/// Runs the price feed and every charge point engine against one sink.
pub struct Fleet {
    config: SimulatorConfig,
    charge_points: Vec<ChargePointIdentity>,
    sink: Arc<dyn EventSink>,
    clock: LiveClock,
    seed: u64,
}

impl Fleet {
    /// Creates a fleet.
    ///
    /// # Arguments
    ///
    /// * `config` - Simulator configuration; validate it first
    /// * `charge_points` - Devices to simulate, one engine each
    /// * `sink` - Shared persistence target
    /// * `clock` - Live clock shared by the feed and every engine
    /// * `seed` - Master seed every per-task RNG is derived from
    pub fn new(
        config: SimulatorConfig,
        charge_points: Vec<ChargePointIdentity>,
        sink: Arc<dyn EventSink>,
        clock: LiveClock,
        seed: u64,
    ) -> Self {
        Self {
            config,
            charge_points,
            sink,
            clock,
            seed,
        }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Seed of the engine simulating the device at `index`.
    pub fn charge_point_seed(&self, index: usize) -> u64 {
        let step = (index as u64 + 1).wrapping_mul(CHARGE_POINT_SEED_STRIDE);
        self.seed.wrapping_add(step)
    }

    /// Builds the price feed.
    pub fn price_feed(&self) -> PriceFeed {
        PriceFeed::new(
            &self.config.price_feed,
            self.sink.clone(),
            self.clock,
            StdRng::seed_from_u64(self.seed.wrapping_add(PRICE_FEED_SEED_OFFSET)),
        )
    }

    /// Builds one engine per charge point, in topology order.
    pub fn engines(&self) -> Vec<ChargePointEngine> {
        self.charge_points
            .iter()
            .enumerate()
            .map(|(index, identity)| {
                ChargePointEngine::new(
                    identity.clone(),
                    self.config.charge_point.clone(),
                    self.sink.clone(),
                    self.clock,
                    StdRng::seed_from_u64(self.charge_point_seed(index)),
                )
            })
            .collect()
    }

    /// Runs every task until `shutdown` fires or one of them fails.
    ///
    /// The first price is published before any engine starts, so engines
    /// always find a current price.
    ///
    /// # Errors
    ///
    /// Returns the error of the first failing task, after cancelling and
    /// aborting all others. A panicking task surfaces as [`SimError::Task`].
    pub async fn run(self, shutdown: CancellationToken) -> Result<(), SimError> {
        let mut feed = self.price_feed();
        let first = feed.prime()?;
        info!(
            seed = self.seed,
            charge_points = self.charge_points.len(),
            price = first.price,
            "Starting fleet"
        );

        let mut tasks = JoinSet::new();
        spawn_until_cancelled(&mut tasks, &shutdown, feed.run());
        for engine in self.engines() {
            spawn_until_cancelled(&mut tasks, &shutdown, engine.run());
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(err) = joined.map_err(SimError::from).and_then(|outcome| outcome) {
                error!(%err, "Simulation task failed, stopping fleet");
                shutdown.cancel();
                tasks.abort_all();
                while tasks.join_next().await.is_some() {}
                return Err(err);
            }
        }

        info!("Fleet stopped");
        Ok(())
    }
}

fn spawn_until_cancelled<F>(
    tasks: &mut JoinSet<Result<(), SimError>>,
    shutdown: &CancellationToken,
    task: F,
) where
    F: Future<Output = Result<(), SimError>> + Send + 'static,
{
    let shutdown = shutdown.clone();
    tasks.spawn(async move {
        tokio::select! {
            outcome = task => outcome,
            () = shutdown.cancelled() => Ok(()),
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::MemorySink;
    use crate::topology::Topology;
    use chrono::{TimeZone, Utc};
    use std::collections::HashSet;

    fn fleet(seed: u64) -> Fleet {
        Fleet::new(
            SimulatorConfig::quick(),
            Topology::builtin().charge_points,
            Arc::new(MemorySink::new()),
            LiveClock::anchored_at(Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()),
            seed,
        )
    }

    #[test]
    fn per_device_seeds_are_distinct() {
        let fleet = fleet(42);
        let seeds: HashSet<u64> = (0..15).map(|i| fleet.charge_point_seed(i)).collect();
        assert_eq!(seeds.len(), 15);
        assert!(!seeds.contains(&fleet.seed()));
    }

    #[test]
    fn one_engine_per_charge_point_in_order() {
        let fleet = fleet(42);
        let engines = fleet.engines();
        assert_eq!(engines.len(), 15);
        let ids: Vec<u32> = engines.iter().map(|e| e.identity().id).collect();
        assert_eq!(ids, (1..=15).collect::<Vec<_>>());
    }

    #[test]
    fn same_seed_draws_same_delivery_rates() {
        let a: Vec<u8> = fleet(9).engines().iter().map(|e| e.delivery_rate().percent()).collect();
        let b: Vec<u8> = fleet(9).engines().iter().map(|e| e.delivery_rate().percent()).collect();
        assert_eq!(a, b);
    }
}
