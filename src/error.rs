//! Error types shared by the sinks, engines, and orchestrator.

use thiserror::Error;

/// Failure reported by an [`EventSink`](crate::sink::EventSink).
#[derive(Debug, Error)]
pub enum SinkError {
    /// The current price was requested before any observation was published.
    #[error("no price observation has been published yet")]
    NoPriceObservation,

    /// The sink does not know the named collection.
    #[error("unknown collection \"{0}\"")]
    UnknownCollection(String),

    /// The sink cannot accept or serve requests.
    #[error("sink unavailable: {0}")]
    Unavailable(String),

    /// A stored row could not be turned back into a record.
    #[error("cannot decode field \"{field}\": {reason}")]
    Decode { field: &'static str, reason: String },

    #[cfg(feature = "sqlite")]
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A thread panicked while holding the sink lock.
    #[error("sink lock poisoned")]
    Poisoned,
}

/// Failure of a simulation task.
#[derive(Debug, Error)]
pub enum SimError {
    #[error(transparent)]
    Sink(#[from] SinkError),

    /// A timestamp computation left the range chrono can represent.
    #[error("{0} is out of the representable time range")]
    TimeOutOfRange(&'static str),

    /// A task panicked or was aborted before it could report a result.
    #[error("simulation task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
