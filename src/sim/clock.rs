//! Time sources driving session expansion.
//!
//! A session is expanded one simulated second at a time. The engine asks the
//! time source for the timestamp of the current second, emits its event,
//! then calls [`TimeSource::advance`]. Backfill and live mode differ only in
//! how those two calls behave.

use std::future::{Future, ready};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tokio::time::Instant;

/// Source of event timestamps.
pub trait TimeSource {
    /// Timestamp of the current simulated second.
    fn now(&self) -> DateTime<Utc>;

    /// Moves on to the next simulated second.
    fn advance(&mut self) -> impl Future<Output = ()> + Send;
}

/// Arithmetic clock for materializing history.
///
/// Each `advance` adds exactly one second and completes immediately.
///
/// # Examples
///
/// ```
/// use chrono::{TimeDelta, TimeZone, Utc};
/// use chargepoint_sim::sim::clock::{BackfillClock, TimeSource};
///
/// # tokio_test_block_on(async {
/// let start = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
/// let mut clock = BackfillClock::starting_at(start);
/// clock.advance().await;
/// clock.advance().await;
/// assert_eq!(clock.now() - start, TimeDelta::seconds(2));
/// # });
/// # fn tokio_test_block_on<F: std::future::Future>(f: F) -> F::Output {
/// #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
/// # }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackfillClock {
    current: DateTime<Utc>,
}

impl BackfillClock {
    pub fn starting_at(start: DateTime<Utc>) -> Self {
        Self { current: start }
    }
}

impl TimeSource for BackfillClock {
    fn now(&self) -> DateTime<Utc> {
        self.current
    }

    fn advance(&mut self) -> impl Future<Output = ()> + Send {
        self.current += TimeDelta::seconds(1);
        ready(())
    }
}

/// Real-time clock for live streaming.
///
/// Wall time is derived from a fixed anchor plus the elapsed monotonic time
/// of the tokio clock. Readings are therefore monotonic, and tests that
/// pause tokio time see timestamps that follow the virtual clock.
#[derive(Debug, Clone, Copy)]
pub struct LiveClock {
    wall_anchor: DateTime<Utc>,
    instant_anchor: Instant,
    step: Duration,
}

impl LiveClock {
    /// Anchors the clock at the current system time.
    pub fn system() -> Self {
        Self::anchored_at(Utc::now())
    }

    /// Anchors the clock so that "now" reads as `wall` at this instant.
    pub fn anchored_at(wall: DateTime<Utc>) -> Self {
        Self {
            wall_anchor: wall,
            instant_anchor: Instant::now(),
            step: Duration::from_secs(1),
        }
    }
}

impl TimeSource for LiveClock {
    fn now(&self) -> DateTime<Utc> {
        let elapsed = Instant::now().duration_since(self.instant_anchor);
        // Only out of range after ~292 million years of uptime.
        self.wall_anchor + TimeDelta::from_std(elapsed).unwrap_or(TimeDelta::zero())
    }

    fn advance(&mut self) -> impl Future<Output = ()> + Send {
        tokio::time::sleep(self.step)
    }
}
