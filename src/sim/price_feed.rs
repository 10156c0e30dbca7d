//! Periodic publisher of the per-kWh energy price.

use std::sync::Arc;
use std::time::Duration;

use rand::{Rng, rngs::StdRng};
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info, instrument};

use crate::config::PriceFeedConfig;
use crate::error::{SimError, SinkError};
use crate::sink::EventSink;

use super::clock::{LiveClock, TimeSource};
use super::types::PriceObservation;

/// Samples a uniform price and publishes it with the current timestamp,
/// once per interval, forever.
pub struct PriceFeed {
    sink: Arc<dyn EventSink>,
    price_min: f64,
    price_max: f64,
    decimals: u32,
    interval: Duration,
    clock: LiveClock,
    rng: StdRng,
    primed: bool,
}

impl PriceFeed {
    pub fn new(
        config: &PriceFeedConfig,
        sink: Arc<dyn EventSink>,
        clock: LiveClock,
        rng: StdRng,
    ) -> Self {
        Self {
            sink,
            price_min: config.price_min,
            price_max: config.price_max,
            decimals: config.decimals,
            interval: config.interval(),
            clock,
            rng,
            primed: false,
        }
    }

    /// Draws a price from the band, rounded to the configured decimals.
    pub fn sample(&mut self) -> f64 {
        let raw = self.rng.random_range(self.price_min..=self.price_max);
        let scale = 10_f64.powi(self.decimals as i32);
        (raw * scale).round() / scale
    }

    /// Samples and publishes one observation stamped "now".
    pub fn publish_now(&mut self) -> Result<PriceObservation, SinkError> {
        let observation = PriceObservation {
            timestamp: self.clock.now(),
            price: self.sample(),
        };
        self.sink.insert_price(&observation)?;
        debug!(price = observation.price, "New price update");
        Ok(observation)
    }

    /// Publishes the first observation synchronously.
    ///
    /// A primed feed skips its immediate first tick in [`PriceFeed::run`].
    pub fn prime(&mut self) -> Result<PriceObservation, SinkError> {
        let observation = self.publish_now()?;
        self.primed = true;
        Ok(observation)
    }

    /// Publishes a price every interval until the task is dropped.
    ///
    /// # Errors
    ///
    /// Returns the first sink failure; there is no retry.
    #[instrument(name = "price_feed", skip_all)]
    pub async fn run(mut self) -> Result<(), SimError> {
        info!(interval_secs = self.interval.as_secs(), "Starting price feed");
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        if self.primed {
            // The first tick completes immediately; its price is already out.
            ticker.tick().await;
        }
        loop {
            ticker.tick().await;
            self.publish_now()?;
        }
    }
}
