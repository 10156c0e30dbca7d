//! Persistence destinations for transactions, status updates, and prices.
//!
//! The simulator only talks to storage through [`EventSink`]:
//! - `insert` writes one record into a named collection
//! - `insert_price` appends a price observation
//! - `current_price` reads the most recent price back

mod memory;
mod row;
#[cfg(feature = "sqlite")]
mod sqlite;

pub use memory::MemorySink;
pub use row::{Record, Row, Value};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteSink;

use crate::error::SinkError;
use crate::sim::types::PriceObservation;

/// Shared persistence target.
///
/// Calls are synchronous and atomic from the caller's point of view. The
/// simulator never holds a call open across a suspension point.
pub trait EventSink: Send + Sync {
    /// Writes one record into `collection`.
    fn insert(&self, collection: &str, record: &dyn Record) -> Result<(), SinkError>;

    /// Appends a price observation.
    fn insert_price(&self, observation: &PriceObservation) -> Result<(), SinkError>;

    /// Returns the price of the latest observation by timestamp.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::NoPriceObservation`] if nothing has been published.
    fn current_price(&self) -> Result<f64, SinkError>;
}
