//! Session sizing: how long each phase lasts and how the meter advances.

use chrono::{DateTime, TimeDelta, Utc};
use uuid::Uuid;

use super::types::Transaction;

/// Charging speed: 1 kWh per minute.
pub const SECONDS_PER_KWH: f64 = 60.0;

/// BLOCKING lasts this fraction of the nominal charging time.
pub const BLOCKING_DIVISOR: u64 = 10;

/// Phase lengths, in seconds, for one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionPlan {
    pub charging_seconds: u64,
    pub blocking_seconds: u64,
    pub idle_seconds: u64,
}

impl SessionPlan {
    /// Sizes a session delivering `total_kwh`.
    ///
    /// CHARGING lasts `ceil(total_kwh * 60)` seconds and BLOCKING one tenth
    /// of that, rounded up.
    pub fn for_energy(total_kwh: f64, idle_seconds: u64) -> Self {
        let charging_seconds = (total_kwh.max(0.0) * SECONDS_PER_KWH).ceil() as u64;
        Self {
            charging_seconds,
            blocking_seconds: charging_seconds.div_ceil(BLOCKING_DIVISOR),
            idle_seconds,
        }
    }

    /// Total number of simulated seconds, i.e. events before loss.
    pub fn total_seconds(&self) -> u64 {
        self.charging_seconds
            .saturating_add(self.blocking_seconds)
            .saturating_add(self.idle_seconds)
    }
}

/// Cumulative energy after `elapsed` charging seconds, clamped to the total.
///
/// The last second of a plan always reports exactly `total_kwh`.
pub fn delivered_kwh(elapsed: u64, plan: &SessionPlan, total_kwh: f64) -> f64 {
    if elapsed >= plan.charging_seconds {
        return total_kwh;
    }
    (elapsed as f64 / SECONDS_PER_KWH).min(total_kwh)
}

/// A new transaction with no timestamps yet.
pub fn new_transaction(id: Uuid, charge_point_id: u32, total_kwh: f64, price: f64) -> Transaction {
    Transaction {
        id,
        total_kwh,
        total_cost: total_kwh * price,
        start_ts: None,
        end_ts: None,
        charge_point_id,
    }
}

/// Stamps `transaction` as starting at `start`.
///
/// The end is the nominal end of energy delivery, `total_kwh` minutes later.
pub fn stamp(transaction: &mut Transaction, start: DateTime<Utc>) {
    let micros = (transaction.total_kwh * SECONDS_PER_KWH * 1e6).round() as i64;
    transaction.start_ts = Some(start);
    transaction.end_ts = Some(start + TimeDelta::microseconds(micros));
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn thirty_kwh_plan() {
        let plan = SessionPlan::for_energy(30.0, 5);
        assert_eq!(plan.charging_seconds, 1800);
        assert_eq!(plan.blocking_seconds, 180);
        assert_eq!(plan.total_seconds(), 1985);
    }

    #[test]
    fn fractional_energy_rounds_up() {
        let plan = SessionPlan::for_energy(20.001, 5);
        assert_eq!(plan.charging_seconds, 1201);
        assert_eq!(plan.blocking_seconds, 121);
    }

    #[test]
    fn blocking_is_a_tenth_of_charging_rounded_up() {
        for tenths in 200..400 {
            let kwh = f64::from(tenths) / 10.0 + 0.0137;
            let plan = SessionPlan::for_energy(kwh, 5);
            assert_eq!(plan.charging_seconds, (kwh * 60.0).ceil() as u64);
            assert_eq!(plan.blocking_seconds, plan.charging_seconds.div_ceil(10));
        }
    }

    #[test]
    fn meter_clamps_on_last_second() {
        let total = 0.045;
        let plan = SessionPlan::for_energy(total, 0);
        assert_eq!(plan.charging_seconds, 3);
        assert!((delivered_kwh(1, &plan, total) - 1.0 / 60.0).abs() < 1e-12);
        assert!((delivered_kwh(2, &plan, total) - 2.0 / 60.0).abs() < 1e-12);
        assert_eq!(delivered_kwh(3, &plan, total), total);
    }

    #[test]
    fn meter_reaches_total_exactly() {
        for total in [20.0, 27.3, 33.333_333, 39.999] {
            let plan = SessionPlan::for_energy(total, 5);
            assert_eq!(delivered_kwh(plan.charging_seconds, &plan, total), total);
            assert!(delivered_kwh(plan.charging_seconds - 1, &plan, total) <= total);
        }
    }

    #[test]
    fn stamp_sets_nominal_end() {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let mut tx = new_transaction(Uuid::nil(), 1, 30.0, 0.4);
        assert_eq!(tx.start_ts, None);
        assert_eq!(tx.end_ts, None);
        stamp(&mut tx, start);
        assert_eq!(tx.start_ts, Some(start));
        assert_eq!(tx.end_ts, Some(start + TimeDelta::minutes(30)));
        assert!((tx.total_cost - 12.0).abs() < 1e-9);
    }
}
