use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use crate::error::SinkError;
use crate::sim::types::{PriceObservation, StatusUpdate, Transaction};

use super::{EventSink, Record, Row};

#[derive(Default)]
struct State {
    collections: HashMap<String, Vec<Row>>,
    prices: Vec<PriceObservation>,
}

/// In-process sink that keeps every row in memory.
///
/// Used for dry runs and as the inspection point in tests.
#[derive(Default)]
pub struct MemorySink {
    state: Mutex<State>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>, SinkError> {
        self.state.lock().map_err(|_| SinkError::Poisoned)
    }

    /// Rows of `collection` in insertion order.
    pub fn rows(&self, collection: &str) -> Result<Vec<Row>, SinkError> {
        Ok(self
            .lock()?
            .collections
            .get(collection)
            .cloned()
            .unwrap_or_default())
    }

    pub fn transactions(&self) -> Result<Vec<Transaction>, SinkError> {
        self.rows(Transaction::COLLECTION)?
            .iter()
            .map(Transaction::from_row)
            .collect()
    }

    pub fn status_updates(&self) -> Result<Vec<StatusUpdate>, SinkError> {
        self.rows(StatusUpdate::COLLECTION)?
            .iter()
            .map(StatusUpdate::from_row)
            .collect()
    }

    /// Status updates of one charge point, in insertion order.
    pub fn status_updates_for(&self, charge_point_id: u32) -> Result<Vec<StatusUpdate>, SinkError> {
        Ok(self
            .status_updates()?
            .into_iter()
            .filter(|u| u.charge_point_id == charge_point_id)
            .collect())
    }

    pub fn prices(&self) -> Result<Vec<PriceObservation>, SinkError> {
        Ok(self.lock()?.prices.clone())
    }
}

impl EventSink for MemorySink {
    fn insert(&self, collection: &str, record: &dyn Record) -> Result<(), SinkError> {
        let row = record.to_row();
        self.lock()?
            .collections
            .entry(collection.to_string())
            .or_default()
            .push(row);
        Ok(())
    }

    fn insert_price(&self, observation: &PriceObservation) -> Result<(), SinkError> {
        let mut state = self.lock()?;
        state
            .collections
            .entry(PriceObservation::COLLECTION.to_string())
            .or_default()
            .push(observation.to_row());
        state.prices.push(*observation);
        Ok(())
    }

    fn current_price(&self) -> Result<f64, SinkError> {
        // `max_by_key` keeps the last of equal timestamps: last write wins.
        self.lock()?
            .prices
            .iter()
            .max_by_key(|obs| obs.timestamp)
            .map(|obs| obs.price)
            .ok_or(SinkError::NoPriceObservation)
    }
}
