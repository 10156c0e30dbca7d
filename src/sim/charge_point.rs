//! Per-device telemetry generator.

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use rand::{Rng, rngs::StdRng};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::config::ChargePointConfig;
use crate::error::{SimError, SinkError};
use crate::sink::EventSink;
use crate::topology::ChargePointIdentity;

use super::clock::{BackfillClock, LiveClock, TimeSource};
use super::reliability::DeliveryRate;
use super::session::{self, SessionPlan};
use super::types::{Status, StatusUpdate, Transaction};

/// Event counts for one expanded phase or session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Emitted {
    /// Events that went through to the sink.
    pub delivered: u64,
    /// Events lost by the delivery model.
    pub dropped: u64,
}

impl Emitted {
    pub fn total(&self) -> u64 {
        self.delivered + self.dropped
    }

    fn add(&mut self, other: Self) {
        self.delivered += other.delivered;
        self.dropped += other.dropped;
    }
}

/// What one session produced.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionSummary {
    pub transaction_id: Uuid,
    pub plan: SessionPlan,
    pub charging: Emitted,
    pub blocking: Emitted,
    pub idle: Emitted,
    /// Timestamp where the next session starts.
    pub next_start: DateTime<Utc>,
}

/// Simulated charge point.
///
/// Generates an endless sequence of sessions
/// (`CHARGING -> BLOCKING -> IDLE`), first as instant backfill and then
/// live, and writes the resulting transactions and status updates to the
/// sink. Status updates are subject to the device's [`DeliveryRate`];
/// transactions never are.
pub struct ChargePointEngine {
    identity: ChargePointIdentity,
    config: ChargePointConfig,
    sink: Arc<dyn EventSink>,
    delivery_rate: DeliveryRate,
    live: LiveClock,
    rng: StdRng,
}

impl ChargePointEngine {
    /// Creates an engine, drawing its delivery rate from `rng`.
    ///
    /// # Arguments
    ///
    /// * `identity` - Charge point this engine simulates
    /// * `config` - Session and telemetry parameters
    /// * `sink` - Shared persistence target
    /// * `live` - Real-time clock used for "now" and live pacing
    /// * `rng` - Private random source; seed it for reproducible output
    pub fn new(
        identity: ChargePointIdentity,
        config: ChargePointConfig,
        sink: Arc<dyn EventSink>,
        live: LiveClock,
        mut rng: StdRng,
    ) -> Self {
        let delivery_rate = DeliveryRate::draw(&mut rng, config.delivery_band());
        Self {
            identity,
            config,
            sink,
            delivery_rate,
            live,
            rng,
        }
    }

    pub fn identity(&self) -> &ChargePointIdentity {
        &self.identity
    }

    pub fn delivery_rate(&self) -> DeliveryRate {
        self.delivery_rate
    }

    /// Runs the device forever: backfill, pad to now, then live sessions.
    ///
    /// # Errors
    ///
    /// Fails on the first sink error, including a missing price once the
    /// live phase starts.
    #[instrument(name = "charge_point", skip_all, fields(name = %self.identity.name))]
    pub async fn run(mut self) -> Result<(), SimError> {
        info!(
            delivery_rate = self.delivery_rate.percent(),
            "Simulating previous transactions"
        );
        let now = self.live.now();
        let price = self.sample_backfill_price();
        let window_start = now
            .checked_sub_signed(self.config.backfill_window())
            .ok_or(SimError::TimeOutOfRange("backfill window start"))?;
        let last = self
            .backfill(window_start, self.config.backfill_sessions, price)
            .await?;
        self.pad_until(last, self.live.now()).await?;

        info!("Streaming live transactions");
        let mut live = self.live;
        loop {
            let price = self.sink.current_price()?;
            debug!(price, "Simulating live transaction");
            self.run_session(&mut live, price).await?;
        }
    }

    /// Draws the single price used for the whole backfill window.
    pub fn sample_backfill_price(&mut self) -> f64 {
        self.rng
            .random_range(self.config.backfill_price_min..=self.config.backfill_price_max)
    }

    /// Draws a session energy from `[energy_kwh_min, energy_kwh_max)`.
    ///
    /// A degenerate band always yields its lower bound.
    pub fn sample_energy(&mut self) -> f64 {
        let (min, max) = (self.config.energy_kwh_min, self.config.energy_kwh_max);
        if max > min {
            self.rng.random_range(min..max)
        } else {
            min
        }
    }

    /// Creates the next transaction: random energy, cost at `price`, fresh id.
    pub fn generate_transaction(&mut self, price: f64) -> Transaction {
        let total_kwh = self.sample_energy();
        let id = uuid::Builder::from_random_bytes(self.rng.random()).into_uuid();
        session::new_transaction(id, self.identity.id, total_kwh, price)
    }

    /// Materializes `count` sessions of history at `price`, with no delay.
    ///
    /// The window starts at `start`, or earlier if the generated sessions
    /// would otherwise reach past the live clock's "now". Returns the
    /// timestamp following the last generated event.
    ///
    /// # Errors
    ///
    /// Fails on the first sink error, or if the history span does not fit
    /// in the representable time range.
    pub async fn backfill(
        &mut self,
        start: DateTime<Utc>,
        count: usize,
        price: f64,
    ) -> Result<DateTime<Utc>, SimError> {
        let transactions: Vec<Transaction> =
            (0..count).map(|_| self.generate_transaction(price)).collect();
        let span_seconds = transactions.iter().fold(0_u64, |span, tx| {
            let plan = SessionPlan::for_energy(tx.total_kwh, self.config.idle_seconds);
            span.saturating_add(plan.total_seconds())
        });
        let latest_start = i64::try_from(span_seconds)
            .ok()
            .and_then(TimeDelta::try_seconds)
            .and_then(|span| self.live.now().checked_sub_signed(span))
            .ok_or(SimError::TimeOutOfRange("backfill span"))?;
        let start = start.min(latest_start);
        debug!(sessions = count, %start, span_seconds, "Backfilling history");

        let mut clock = BackfillClock::starting_at(start);
        for transaction in transactions {
            self.expand_session(&mut clock, transaction, price).await?;
        }
        Ok(clock.now())
    }

    /// Fills `[from, until)` with IDLE events, one per second, with no delay.
    ///
    /// Returns the timestamp following the last event.
    pub async fn pad_until(
        &mut self,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<DateTime<Utc>, SinkError> {
        let gap_us = (until - from).num_microseconds().unwrap_or(i64::MAX).max(0) as u64;
        let seconds = gap_us.div_ceil(1_000_000);
        debug!(seconds, "Padding idle events up to now");
        let mut clock = BackfillClock::starting_at(from);
        self.emit_phase(&mut clock, Status::Idle, seconds).await?;
        Ok(clock.now())
    }

    /// Generates one transaction at `price` and expands it on `clock`.
    pub async fn run_session<T: TimeSource + Send>(
        &mut self,
        clock: &mut T,
        price: f64,
    ) -> Result<SessionSummary, SinkError> {
        let transaction = self.generate_transaction(price);
        self.expand_session(clock, transaction, price).await
    }

    /// Persists `transaction` and emits its full event timeline.
    ///
    /// This is the single expansion routine for both modes; `clock` decides
    /// whether seconds are computed or waited for.
    async fn expand_session<T: TimeSource + Send>(
        &mut self,
        clock: &mut T,
        mut transaction: Transaction,
        price: f64,
    ) -> Result<SessionSummary, SinkError> {
        let plan = SessionPlan::for_energy(transaction.total_kwh, self.config.idle_seconds);
        session::stamp(&mut transaction, clock.now());
        self.sink.insert(Transaction::COLLECTION, &transaction)?;
        debug!(
            transaction = %transaction.id,
            kwh = transaction.total_kwh,
            seconds = plan.charging_seconds,
            "Sending charging events"
        );

        let mut charging = Emitted::default();
        for elapsed in 1..=plan.charging_seconds {
            let kwh = session::delivered_kwh(elapsed, &plan, transaction.total_kwh);
            let update = StatusUpdate::charging(clock.now(), &transaction, kwh, kwh * price);
            charging.add(self.emit(&update)?);
            clock.advance().await;
        }

        let blocking = self
            .emit_phase(clock, Status::Blocking, plan.blocking_seconds)
            .await?;
        let idle = self
            .emit_phase(clock, Status::Idle, plan.idle_seconds)
            .await?;

        Ok(SessionSummary {
            transaction_id: transaction.id,
            plan,
            charging,
            blocking,
            idle,
            next_start: clock.now(),
        })
    }

    /// Emits `seconds` meter-less events with `status`.
    async fn emit_phase<T: TimeSource + Send>(
        &mut self,
        clock: &mut T,
        status: Status,
        seconds: u64,
    ) -> Result<Emitted, SinkError> {
        debug!(%status, seconds, "Sending status events");
        let mut emitted = Emitted::default();
        for _ in 0..seconds {
            let update = StatusUpdate::without_meter(clock.now(), status, self.identity.id);
            emitted.add(self.emit(&update)?);
            clock.advance().await;
        }
        Ok(emitted)
    }

    /// Hands `update` to the sink if it survives the delivery trial.
    fn emit(&mut self, update: &StatusUpdate) -> Result<Emitted, SinkError> {
        if self.delivery_rate.delivers(&mut self.rng) {
            self.sink.insert(StatusUpdate::COLLECTION, update)?;
            Ok(Emitted {
                delivered: 1,
                dropped: 0,
            })
        } else {
            Ok(Emitted {
                delivered: 0,
                dropped: 1,
            })
        }
    }
}
