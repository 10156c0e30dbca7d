//! Flat, named-field representation of persisted records.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::SinkError;

/// A single field value.
///
/// Optional record fields map to [`Value::Null`] instead of being left out,
/// so every row of a collection has the same columns.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Timestamp(DateTime<Utc>),
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Self::Integer(i64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Real(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<Uuid> for Value {
    fn from(v: Uuid) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Self::Timestamp(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

/// Ordered list of `(column, value)` pairs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    fields: Vec<(&'static str, Value)>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a column; builder style.
    pub fn with(mut self, column: &'static str, value: impl Into<Value>) -> Self {
        self.fields.push((column, value.into()));
        self
    }

    pub fn fields(&self) -> &[(&'static str, Value)] {
        &self.fields
    }

    pub fn columns(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields.iter().map(|(column, _)| *column)
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(name, _)| *name == column)
            .map(|(_, value)| value)
    }

    fn require(&self, column: &'static str) -> Result<&Value, SinkError> {
        self.get(column).ok_or(SinkError::Decode {
            field: column,
            reason: "missing".to_string(),
        })
    }

    pub fn integer(&self, column: &'static str) -> Result<i64, SinkError> {
        match self.require(column)? {
            Value::Integer(v) => Ok(*v),
            other => Err(mismatch(column, "integer", other)),
        }
    }

    pub fn opt_real(&self, column: &'static str) -> Result<Option<f64>, SinkError> {
        match self.require(column)? {
            Value::Null => Ok(None),
            Value::Real(v) => Ok(Some(*v)),
            Value::Integer(v) => Ok(Some(*v as f64)),
            other => Err(mismatch(column, "real", other)),
        }
    }

    pub fn real(&self, column: &'static str) -> Result<f64, SinkError> {
        self.opt_real(column)?.ok_or_else(|| null(column))
    }

    pub fn opt_text(&self, column: &'static str) -> Result<Option<&str>, SinkError> {
        match self.require(column)? {
            Value::Null => Ok(None),
            Value::Text(v) => Ok(Some(v.as_str())),
            other => Err(mismatch(column, "text", other)),
        }
    }

    pub fn text(&self, column: &'static str) -> Result<&str, SinkError> {
        self.opt_text(column)?.ok_or_else(|| null(column))
    }

    pub fn opt_uuid(&self, column: &'static str) -> Result<Option<Uuid>, SinkError> {
        self.opt_text(column)?
            .map(|text| {
                Uuid::parse_str(text).map_err(|e| SinkError::Decode {
                    field: column,
                    reason: e.to_string(),
                })
            })
            .transpose()
    }

    pub fn uuid(&self, column: &'static str) -> Result<Uuid, SinkError> {
        self.opt_uuid(column)?.ok_or_else(|| null(column))
    }

    /// Reads a timestamp, accepting RFC 3339 text as stored by SQL backends.
    pub fn opt_timestamp(
        &self,
        column: &'static str,
    ) -> Result<Option<DateTime<Utc>>, SinkError> {
        match self.require(column)? {
            Value::Null => Ok(None),
            Value::Timestamp(v) => Ok(Some(*v)),
            Value::Text(v) => DateTime::parse_from_rfc3339(v)
                .map(|ts| Some(ts.with_timezone(&Utc)))
                .map_err(|e| SinkError::Decode {
                    field: column,
                    reason: e.to_string(),
                }),
            other => Err(mismatch(column, "timestamp", other)),
        }
    }

    pub fn timestamp(&self, column: &'static str) -> Result<DateTime<Utc>, SinkError> {
        self.opt_timestamp(column)?.ok_or_else(|| null(column))
    }
}

fn mismatch(field: &'static str, expected: &str, found: &Value) -> SinkError {
    SinkError::Decode {
        field,
        reason: format!("expected {expected}, found {found:?}"),
    }
}

fn null(field: &'static str) -> SinkError {
    SinkError::Decode {
        field,
        reason: "unexpected null".to_string(),
    }
}

/// A record that can be flattened into a [`Row`] for insertion.
pub trait Record {
    fn to_row(&self) -> Row;
}
