use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::{ToSqlOutput, Value as SqlValue, ValueRef};
use rusqlite::{Connection, OptionalExtension, ToSql, params_from_iter};
use tracing::{debug, info};

use crate::error::SinkError;
use crate::sim::types::{PriceObservation, StatusUpdate, Transaction};
use crate::topology::{ChargePointIdentity, Location, Station, Topology};

use super::{EventSink, Record, Row, Value};

struct Table {
    name: &'static str,
    columns: &'static [&'static str],
    ddl: &'static str,
}

const TABLES: &[Table] = &[
    Table {
        name: Location::COLLECTION,
        columns: &["id", "latitude", "longitude", "city", "state"],
        ddl: "CREATE TABLE IF NOT EXISTS locations (
            id INTEGER PRIMARY KEY,
            latitude REAL NOT NULL,
            longitude REAL NOT NULL,
            city TEXT NOT NULL,
            state TEXT NOT NULL
        )",
    },
    Table {
        name: Station::COLLECTION,
        columns: &["id", "name", "location_id"],
        ddl: "CREATE TABLE IF NOT EXISTS stations (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            location_id INTEGER NOT NULL REFERENCES locations(id)
        )",
    },
    Table {
        name: ChargePointIdentity::COLLECTION,
        columns: &["id", "name", "station_id"],
        ddl: "CREATE TABLE IF NOT EXISTS chargepoints (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            station_id INTEGER NOT NULL REFERENCES stations(id)
        )",
    },
    Table {
        name: Transaction::COLLECTION,
        columns: &[
            "id",
            "total_kwh",
            "total_cost",
            "start_ts",
            "end_ts",
            "chargepoint_id",
        ],
        ddl: "CREATE TABLE IF NOT EXISTS transactions (
            id TEXT PRIMARY KEY,
            total_kwh REAL NOT NULL,
            total_cost REAL NOT NULL,
            start_ts TEXT,
            end_ts TEXT,
            chargepoint_id INTEGER NOT NULL REFERENCES chargepoints(id)
        )",
    },
    Table {
        name: StatusUpdate::COLLECTION,
        columns: &[
            "event_ts",
            "curr_cost",
            "curr_kwh",
            "status",
            "transaction_id",
            "chargepoint_id",
        ],
        ddl: "CREATE TABLE IF NOT EXISTS transaction_meter_values (
            event_ts TEXT NOT NULL,
            curr_cost REAL,
            curr_kwh REAL,
            status TEXT NOT NULL CHECK (status IN ('IDLE', 'CHARGING', 'BLOCKING')),
            transaction_id TEXT REFERENCES transactions(id),
            chargepoint_id INTEGER NOT NULL REFERENCES chargepoints(id)
        )",
    },
    Table {
        name: PriceObservation::COLLECTION,
        columns: &["ts", "price"],
        ddl: "CREATE TABLE IF NOT EXISTS kwh_price (
            ts TEXT NOT NULL,
            price REAL NOT NULL
        )",
    },
];

const INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_meter_values_chargepoint
        ON transaction_meter_values(chargepoint_id, event_ts)",
    "CREATE INDEX IF NOT EXISTS idx_kwh_price_ts ON kwh_price(ts)",
];

fn table(collection: &str) -> Result<&'static Table, SinkError> {
    TABLES
        .iter()
        .find(|t| t.name == collection)
        .ok_or_else(|| SinkError::UnknownCollection(collection.to_string()))
}

/// Fixed-width UTC text, so lexical order matches time order.
fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::Owned(SqlValue::Null),
            Value::Integer(v) => ToSqlOutput::from(*v),
            Value::Real(v) => ToSqlOutput::from(*v),
            Value::Text(v) => ToSqlOutput::from(v.as_str()),
            Value::Timestamp(v) => ToSqlOutput::from(format_timestamp(v)),
        })
    }
}

impl From<ValueRef<'_>> for Value {
    fn from(v: ValueRef<'_>) -> Self {
        match v {
            ValueRef::Null => Self::Null,
            ValueRef::Integer(i) => Self::Integer(i),
            ValueRef::Real(r) => Self::Real(r),
            ValueRef::Text(t) | ValueRef::Blob(t) => {
                Self::Text(String::from_utf8_lossy(t).into_owned())
            }
        }
    }
}

/// SQLite-backed sink holding the full telemetry schema.
pub struct SqliteSink {
    conn: Mutex<Connection>,
}

impl SqliteSink {
    /// Opens (or creates) a database file and bootstraps the schema.
    pub fn open(path: &Path) -> Result<Self, SinkError> {
        let conn = Connection::open(path)?;
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        info!(path = %path.display(), journal_mode = %mode, "Opened SQLite sink");
        Self::bootstrap(conn)
    }

    /// Opens a private in-memory database; nothing outlives the sink.
    pub fn open_in_memory() -> Result<Self, SinkError> {
        Self::bootstrap(Connection::open_in_memory()?)
    }

    fn bootstrap(conn: Connection) -> Result<Self, SinkError> {
        for table in TABLES {
            conn.execute(table.ddl, [])?;
        }
        for index in INDEXES {
            conn.execute(index, [])?;
        }
        debug!(tables = TABLES.len(), "Schema ready");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, SinkError> {
        self.conn.lock().map_err(|_| SinkError::Poisoned)
    }

    /// Writes locations, stations, and charge points, replacing rows with the same id.
    pub fn seed_topology(&self, topology: &Topology) -> Result<(), SinkError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let records = topology
            .locations
            .iter()
            .map(|l| (Location::COLLECTION, l.to_row()))
            .chain(
                topology
                    .stations
                    .iter()
                    .map(|s| (Station::COLLECTION, s.to_row())),
            )
            .chain(
                topology
                    .charge_points
                    .iter()
                    .map(|cp| (ChargePointIdentity::COLLECTION, cp.to_row())),
            );
        for (collection, row) in records {
            tx.execute(
                &insert_sql("INSERT OR REPLACE", collection, &row),
                params_from_iter(row.fields().iter().map(|(_, v)| v)),
            )?;
        }
        tx.commit()?;
        info!(
            charge_points = topology.charge_points.len(),
            "Seeded fleet topology"
        );
        Ok(())
    }

    pub fn row_count(&self, collection: &str) -> Result<usize, SinkError> {
        let table = table(collection)?;
        let count: i64 = self.lock()?.query_row(
            &format!("SELECT COUNT(*) FROM {}", table.name),
            [],
            |row| row.get(0),
        )?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    /// Reads back every row of `collection` in insertion order.
    pub fn rows(&self, collection: &str) -> Result<Vec<Row>, SinkError> {
        let table = table(collection)?;
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM {} ORDER BY rowid",
            table.columns.join(", "),
            table.name
        ))?;
        let rows = stmt.query_map([], |sql_row| {
            let mut row = Row::new();
            for (idx, column) in table.columns.iter().enumerate() {
                row = row.with(*column, Value::from(sql_row.get_ref(idx)?));
            }
            Ok(row)
        })?;
        let rows = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

fn insert_sql(verb: &str, collection: &str, row: &Row) -> String {
    let columns: Vec<&str> = row.columns().collect();
    let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{i}")).collect();
    format!(
        "{verb} INTO {collection} ({}) VALUES ({})",
        columns.join(", "),
        placeholders.join(", ")
    )
}

impl EventSink for SqliteSink {
    fn insert(&self, collection: &str, record: &dyn Record) -> Result<(), SinkError> {
        let table = table(collection)?;
        let row = record.to_row();
        let conn = self.lock()?;
        let mut stmt = conn.prepare_cached(&insert_sql("INSERT", table.name, &row))?;
        stmt.execute(params_from_iter(row.fields().iter().map(|(_, v)| v)))?;
        Ok(())
    }

    fn insert_price(&self, observation: &PriceObservation) -> Result<(), SinkError> {
        self.insert(PriceObservation::COLLECTION, observation)
    }

    fn current_price(&self) -> Result<f64, SinkError> {
        self.lock()?
            .query_row(
                "SELECT price FROM kwh_price ORDER BY ts DESC, rowid DESC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()?
            .ok_or(SinkError::NoPriceObservation)
    }
}
