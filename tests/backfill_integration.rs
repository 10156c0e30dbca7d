//! Integration tests for history generation.

mod common;

use std::sync::Arc;

use chrono::TimeDelta;
use tokio::time::Instant;

use chargepoint_sim::config::ChargePointConfig;
use chargepoint_sim::sim::clock::BackfillClock;
use chargepoint_sim::sim::types::{Status, StatusUpdate};
use chargepoint_sim::sink::MemorySink;

fn count(updates: &[StatusUpdate], status: Status) -> usize {
    updates.iter().filter(|u| u.status == status).count()
}

#[tokio::test(start_paused = true)]
async fn thirty_kwh_session_at_forty_cents() {
    let sink = Arc::new(MemorySink::new());
    let mut engine = common::engine(sink.clone(), common::fixed_config(30.0, 100), 1);
    let start = common::now() - TimeDelta::hours(6);

    let before = Instant::now();
    let end = engine.backfill(start, 1, 0.40).await.unwrap();
    assert_eq!(Instant::now(), before, "backfill must not wait");

    let txs = sink.transactions().unwrap();
    assert_eq!(txs.len(), 1);
    assert!((txs[0].total_cost - 12.0).abs() < 1e-9);
    assert_eq!(txs[0].start_ts, Some(start));
    assert_eq!(txs[0].end_ts, Some(start + TimeDelta::minutes(30)));

    let updates = sink.status_updates().unwrap();
    assert_eq!(count(&updates, Status::Charging), 1800);
    assert_eq!(count(&updates, Status::Blocking), 180);
    assert_eq!(count(&updates, Status::Idle), 5);

    let last_charging = &updates[1799];
    assert_eq!(last_charging.current_kwh, Some(30.0));
    assert_eq!(last_charging.transaction_id, Some(txs[0].id));
    assert_eq!(updates[1800].status, Status::Blocking);
    assert_eq!(updates[1800].event_ts - start, TimeDelta::seconds(1800));
    assert_eq!(updates[1980].status, Status::Idle);
    assert_eq!(updates[1980].event_ts - start, TimeDelta::seconds(1980));
    assert_eq!(end - start, TimeDelta::seconds(1985));
}

#[tokio::test(start_paused = true)]
async fn backfill_timestamps_are_one_second_apart() {
    let sink = Arc::new(MemorySink::new());
    let mut engine = common::engine(sink.clone(), common::fixed_config(1.5, 100), 3);
    let start = common::now() - TimeDelta::hours(1);
    engine.backfill(start, 4, 0.40).await.unwrap();

    let updates = sink.status_updates().unwrap();
    assert_eq!(updates.len(), 4 * (90 + 9 + 5));
    assert_eq!(updates[0].event_ts, start);
    for pair in updates.windows(2) {
        assert_eq!(pair[1].event_ts - pair[0].event_ts, TimeDelta::seconds(1));
    }
}

#[tokio::test(start_paused = true)]
async fn non_charging_events_carry_no_meter() {
    let sink = Arc::new(MemorySink::new());
    let mut engine = common::engine(sink.clone(), common::fixed_config(1.0, 100), 3);
    engine
        .backfill(common::now() - TimeDelta::hours(1), 2, 0.40)
        .await
        .unwrap();

    for update in sink.status_updates().unwrap() {
        let metered = update.status == Status::Charging;
        assert_eq!(update.current_kwh.is_some(), metered);
        assert_eq!(update.current_cost.is_some(), metered);
        assert_eq!(update.transaction_id.is_some(), metered);
        assert_eq!(update.charge_point_id, 1);
    }
}

#[tokio::test(start_paused = true)]
async fn same_seed_reproduces_history() {
    let run = |seed: u64| async move {
        let sink = Arc::new(MemorySink::new());
        let mut engine = common::engine(sink.clone(), ChargePointConfig::default(), seed);
        engine
            .backfill(common::now() - TimeDelta::hours(6), 3, 0.40)
            .await
            .unwrap();
        (
            sink.transactions().unwrap(),
            sink.status_updates().unwrap(),
        )
    };

    let (txs_a, updates_a) = run(21).await;
    let (txs_b, updates_b) = run(21).await;
    assert_eq!(txs_a, txs_b);
    assert_eq!(updates_a, updates_b);

    let (txs_c, _) = run(22).await;
    assert_ne!(txs_a, txs_c);
}

#[tokio::test(start_paused = true)]
async fn lossy_device_drops_only_status_updates() {
    let sink = Arc::new(MemorySink::new());
    let mut engine = common::engine(sink.clone(), common::fixed_config(30.0, 90), 8);
    assert_eq!(engine.delivery_rate().percent(), 90);
    engine
        .backfill(common::now() - TimeDelta::hours(6), 3, 0.40)
        .await
        .unwrap();

    assert_eq!(sink.transactions().unwrap().len(), 3);
    let delivered = sink.status_updates().unwrap().len() as f64;
    let fraction = delivered / (3.0 * 1985.0);
    assert!((fraction - 0.9).abs() < 0.03, "delivered fraction {fraction}");
}

#[tokio::test(start_paused = true)]
async fn summary_accounts_for_every_second() {
    let sink = Arc::new(MemorySink::new());
    let mut engine = common::engine(sink.clone(), common::fixed_config(2.0, 50), 4);
    let start = common::now() - TimeDelta::hours(1);
    let mut clock = BackfillClock::starting_at(start);
    let summary = engine.run_session(&mut clock, 0.40).await.unwrap();

    assert_eq!(summary.charging.total(), 120);
    assert_eq!(summary.blocking.total(), 12);
    assert_eq!(summary.idle.total(), 5);
    let delivered = summary.charging.delivered + summary.blocking.delivered + summary.idle.delivered;
    assert_eq!(sink.status_updates().unwrap().len() as u64, delivered);
    assert_eq!(summary.next_start - start, TimeDelta::seconds(137));
    assert_eq!(sink.transactions().unwrap()[0].id, summary.transaction_id);
}
