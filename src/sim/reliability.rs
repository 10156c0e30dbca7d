//! Lossy telemetry model.

use std::ops::RangeInclusive;

use rand::Rng;

/// A device's fixed probability, in percent, that a status event is persisted.
///
/// Drawn once per device. Each event then runs its own Bernoulli trial, so
/// losses are independent and the long-run delivered fraction is `rate / 100`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryRate(u8);

impl DeliveryRate {
    /// Creates a rate, capping it at 100 %.
    pub fn new(percent: u8) -> Self {
        Self(percent.min(100))
    }

    /// Draws a rate uniformly from `band` (inclusive).
    pub fn draw<R: Rng + ?Sized>(rng: &mut R, band: RangeInclusive<u8>) -> Self {
        Self::new(rng.random_range(band))
    }

    pub fn percent(self) -> u8 {
        self.0
    }

    /// Runs one trial: `true` if the event gets through.
    pub fn delivers<R: Rng + ?Sized>(self, rng: &mut R) -> bool {
        rng.random_range(0..100_u8) < self.0
    }
}
