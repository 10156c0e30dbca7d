//! Core telemetry types: transactions, status updates, and price observations.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::SinkError;
use crate::sink::{Record, Row};

/// Lifecycle phase of a charge point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    Idle,
    Charging,
    Blocking,
}

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "IDLE",
            Self::Charging => "CHARGING",
            Self::Blocking => "BLOCKING",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "IDLE" => Ok(Self::Idle),
            "CHARGING" => Ok(Self::Charging),
            "BLOCKING" => Ok(Self::Blocking),
            other => Err(format!("unknown status \"{other}\"")),
        }
    }
}

/// One charging session as billed to the customer.
///
/// Created before its timestamps are known; the engine fills in
/// `start_ts` and `end_ts` right before handing it to the sink.
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    pub id: Uuid,
    /// Energy delivered over the whole session (kWh).
    pub total_kwh: f64,
    /// `total_kwh` times the session price.
    pub total_cost: f64,
    pub start_ts: Option<DateTime<Utc>>,
    pub end_ts: Option<DateTime<Utc>>,
    pub charge_point_id: u32,
}

impl Transaction {
    pub const COLLECTION: &'static str = "transactions";

    pub fn from_row(row: &Row) -> Result<Self, SinkError> {
        Ok(Self {
            id: row.uuid("id")?,
            total_kwh: row.real("total_kwh")?,
            total_cost: row.real("total_cost")?,
            start_ts: row.opt_timestamp("start_ts")?,
            end_ts: row.opt_timestamp("end_ts")?,
            charge_point_id: charge_point_id(row)?,
        })
    }
}

impl Record for Transaction {
    fn to_row(&self) -> Row {
        Row::new()
            .with("id", self.id)
            .with("total_kwh", self.total_kwh)
            .with("total_cost", self.total_cost)
            .with("start_ts", self.start_ts)
            .with("end_ts", self.end_ts)
            .with("chargepoint_id", self.charge_point_id)
    }
}

/// Per-second meter/status event.
///
/// Only CHARGING events carry energy, cost, and a transaction reference.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusUpdate {
    pub event_ts: DateTime<Utc>,
    /// Cumulative energy delivered in the current session (kWh).
    pub current_kwh: Option<f64>,
    /// Cumulative cost of the current session.
    pub current_cost: Option<f64>,
    pub status: Status,
    pub transaction_id: Option<Uuid>,
    pub charge_point_id: u32,
}

impl StatusUpdate {
    pub const COLLECTION: &'static str = "transaction_meter_values";

    /// A CHARGING event for `transaction` with the given cumulative values.
    pub fn charging(
        event_ts: DateTime<Utc>,
        transaction: &Transaction,
        current_kwh: f64,
        current_cost: f64,
    ) -> Self {
        Self {
            event_ts,
            current_kwh: Some(current_kwh),
            current_cost: Some(current_cost),
            status: Status::Charging,
            transaction_id: Some(transaction.id),
            charge_point_id: transaction.charge_point_id,
        }
    }

    /// An event without meter values (BLOCKING or IDLE).
    pub fn without_meter(event_ts: DateTime<Utc>, status: Status, charge_point_id: u32) -> Self {
        Self {
            event_ts,
            current_kwh: None,
            current_cost: None,
            status,
            transaction_id: None,
            charge_point_id,
        }
    }

    pub fn from_row(row: &Row) -> Result<Self, SinkError> {
        let status = row
            .text("status")?
            .parse()
            .map_err(|reason| SinkError::Decode {
                field: "status",
                reason,
            })?;
        Ok(Self {
            event_ts: row.timestamp("event_ts")?,
            current_kwh: row.opt_real("curr_kwh")?,
            current_cost: row.opt_real("curr_cost")?,
            status,
            transaction_id: row.opt_uuid("transaction_id")?,
            charge_point_id: charge_point_id(row)?,
        })
    }
}

impl Record for StatusUpdate {
    fn to_row(&self) -> Row {
        Row::new()
            .with("event_ts", self.event_ts)
            .with("curr_cost", self.current_cost)
            .with("curr_kwh", self.current_kwh)
            .with("status", self.status.as_str())
            .with("transaction_id", self.transaction_id)
            .with("chargepoint_id", self.charge_point_id)
    }
}

/// A published energy price.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceObservation {
    pub timestamp: DateTime<Utc>,
    /// Price per kWh.
    pub price: f64,
}

impl PriceObservation {
    pub const COLLECTION: &'static str = "kwh_price";

    pub fn from_row(row: &Row) -> Result<Self, SinkError> {
        Ok(Self {
            timestamp: row.timestamp("ts")?,
            price: row.real("price")?,
        })
    }
}

impl Record for PriceObservation {
    fn to_row(&self) -> Row {
        Row::new()
            .with("ts", self.timestamp)
            .with("price", self.price)
    }
}

fn charge_point_id(row: &Row) -> Result<u32, SinkError> {
    let id = row.integer("chargepoint_id")?;
    u32::try_from(id).map_err(|e| SinkError::Decode {
        field: "chargepoint_id",
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::Value;
    use chrono::TimeZone;

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    fn transaction() -> Transaction {
        Transaction {
            id: Uuid::from_u128(42),
            total_kwh: 30.0,
            total_cost: 12.0,
            start_ts: Some(ts()),
            end_ts: None,
            charge_point_id: 3,
        }
    }

    #[test]
    fn status_parses_its_own_display() {
        for status in [Status::Idle, Status::Charging, Status::Blocking] {
            assert_eq!(status.to_string().parse::<Status>(), Ok(status));
        }
        assert!("FAULTED".parse::<Status>().is_err());
    }

    #[test]
    fn transaction_row_keeps_null_end_ts() {
        let row = transaction().to_row();
        assert_eq!(
            row.columns().collect::<Vec<_>>(),
            vec![
                "id",
                "total_kwh",
                "total_cost",
                "start_ts",
                "end_ts",
                "chargepoint_id"
            ]
        );
        assert_eq!(row.get("end_ts"), Some(&Value::Null));
        assert_eq!(Transaction::from_row(&row).ok(), Some(transaction()));
    }

    #[test]
    fn idle_update_has_no_meter_values() {
        let update = StatusUpdate::without_meter(ts(), Status::Idle, 3);
        let row = update.to_row();
        assert_eq!(row.get("curr_kwh"), Some(&Value::Null));
        assert_eq!(row.get("curr_cost"), Some(&Value::Null));
        assert_eq!(row.get("transaction_id"), Some(&Value::Null));
        assert_eq!(row.get("status"), Some(&Value::Text("IDLE".into())));
        assert_eq!(StatusUpdate::from_row(&row).ok(), Some(update));
    }

    #[test]
    fn charging_update_references_transaction() {
        let tx = transaction();
        let update = StatusUpdate::charging(ts(), &tx, 1.0, 0.4);
        assert_eq!(update.transaction_id, Some(tx.id));
        assert_eq!(update.charge_point_id, 3);
        assert_eq!(update.status, Status::Charging);
    }
}
