//! SQLite-backed forecast storage.
//!
//! `SqliteForecastStore` keeps tracked locations and their one forecast
//! record per location. Transactions are opened `IMMEDIATE` so the write
//! lock is taken up front and concurrent reconciliations serialize.

use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::Mutex;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use std::path::Path;
use std::time::Duration;

use crate::model::{ForecastRecord, ForecastValues, LocationId, TrackedLocation};
use crate::store::{ForecastStore, StorageError, StorageResult, StoreTransaction};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);
const NAME_MIN_CHARS: usize = 2;
const NAME_MAX_CHARS: usize = 20;

const LOCATION_COLUMNS: &str = "id, name, latitude, longitude";
const FORECAST_COLUMNS: &str =
    "id, location_id, timestamp, temperature, wind_speed, atmospheric_pressure";

/// SQLite-based forecast storage.
///
/// The mutex is there because `Connection` is not `Sync`; it only orders calls
/// on this one connection. Writers are isolated by the `IMMEDIATE` transaction
/// lock inside SQLite, which also covers other stores and processes opened on
/// the same database file (they wait up to the busy timeout).
pub struct SqliteForecastStore {
    conn: Mutex<Connection>,
}

impl SqliteForecastStore {
    /// Open (or create) the database at `path` and ensure the schema exists.
    pub fn open<P: AsRef<Path>>(path: P) -> StorageResult<Self> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Self::with_connection(conn)
    }

    /// Create an in-memory store (for testing).
    pub fn in_memory() -> StorageResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> StorageResult<Self> {
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn init_schema(conn: &Connection) -> StorageResult<()> {
        conn.execute_batch(
            r#"
            PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS locations (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                latitude REAL NOT NULL,
                longitude REAL NOT NULL
            );

            CREATE TABLE IF NOT EXISTS weather_forecasts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                location_id INTEGER NOT NULL UNIQUE
                    REFERENCES locations(id) ON DELETE CASCADE,
                timestamp TEXT NOT NULL,
                temperature REAL,
                wind_speed REAL,
                atmospheric_pressure REAL
            );

            CREATE INDEX IF NOT EXISTS idx_locations_name ON locations(name);
            "#,
        )?;
        Ok(())
    }

    /// Add a location to track.
    pub fn register_location(
        &self,
        name: &str,
        latitude: f64,
        longitude: f64,
    ) -> StorageResult<TrackedLocation> {
        let name = validate_location(name, latitude, longitude)?;
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO locations (name, latitude, longitude) VALUES (?1, ?2, ?3)",
            params![name, latitude, longitude],
        )?;
        let id = LocationId(conn.last_insert_rowid());
        tracing::info!("Registered location {} ({}) at {}, {}", name, id, latitude, longitude);
        Ok(TrackedLocation {
            id,
            name,
            latitude,
            longitude,
        })
    }

    /// Return the location named `name`, registering it first if absent.
    pub fn ensure_location(
        &self,
        name: &str,
        latitude: f64,
        longitude: f64,
    ) -> StorageResult<TrackedLocation> {
        let existing = {
            let conn = self.conn.lock();
            conn.query_row(
                &format!("SELECT {LOCATION_COLUMNS} FROM locations WHERE name = ?1 ORDER BY id LIMIT 1"),
                params![name.trim()],
                row_to_location,
            )
            .optional()?
        };
        match existing {
            Some(location) => Ok(location),
            None => self.register_location(name, latitude, longitude),
        }
    }

    /// Stop tracking a location; its forecast record goes with it.
    pub fn remove_location(&self, id: LocationId) -> StorageResult<bool> {
        let conn = self.conn.lock();
        let removed = conn.execute("DELETE FROM locations WHERE id = ?1", params![id.0])?;
        Ok(removed > 0)
    }

    /// Number of stored forecast records.
    pub fn forecast_count(&self) -> StorageResult<usize> {
        let conn = self.conn.lock();
        let count: i64 =
            conn.query_row("SELECT COUNT(*) FROM weather_forecasts", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or_default())
    }
}

impl ForecastStore for SqliteForecastStore {
    #[tracing::instrument(skip(self, work), level = "debug")]
    fn transaction<T, F>(&self, work: F) -> StorageResult<T>
    where
        F: FnOnce(&dyn StoreTransaction) -> StorageResult<T>,
    {
        let mut conn = self.conn.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let scope = SqliteTransaction { conn: &tx };
        match work(&scope) {
            Ok(value) => {
                tx.commit()?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback) = tx.rollback() {
                    tracing::warn!("Rollback failed: {}", rollback);
                }
                Err(e)
            }
        }
    }
}

struct SqliteTransaction<'a> {
    conn: &'a Connection,
}

impl StoreTransaction for SqliteTransaction<'_> {
    fn get_location_by_id(&self, id: LocationId) -> StorageResult<Option<TrackedLocation>> {
        let location = self
            .conn
            .query_row(
                &format!("SELECT {LOCATION_COLUMNS} FROM locations WHERE id = ?1"),
                params![id.0],
                row_to_location,
            )
            .optional()?;
        Ok(location)
    }

    fn list_all_locations(&self) -> StorageResult<Vec<TrackedLocation>> {
        let mut stmt =
            self.conn.prepare(&format!("SELECT {LOCATION_COLUMNS} FROM locations ORDER BY id"))?;
        let locations = stmt.query_map([], row_to_location)?.collect::<Result<Vec<_>, _>>()?;
        Ok(locations)
    }

    fn get_forecast_by_location_id(&self, id: LocationId) -> StorageResult<Option<ForecastRecord>> {
        let record = self
            .conn
            .query_row(
                &format!("SELECT {FORECAST_COLUMNS} FROM weather_forecasts WHERE location_id = ?1"),
                params![id.0],
                row_to_forecast,
            )
            .optional()?;
        Ok(record)
    }

    fn upsert_forecast(&self, values: &ForecastValues) -> StorageResult<ForecastRecord> {
        self.conn.execute(
            r#"
            INSERT INTO weather_forecasts
                (location_id, timestamp, temperature, wind_speed, atmospheric_pressure)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(location_id) DO UPDATE SET
                timestamp = excluded.timestamp,
                temperature = excluded.temperature,
                wind_speed = excluded.wind_speed,
                atmospheric_pressure = excluded.atmospheric_pressure
            "#,
            params![
                values.location_id.0,
                values.timestamp.to_rfc3339_opts(SecondsFormat::AutoSi, true),
                values.temperature,
                values.wind_speed,
                values.atmospheric_pressure,
            ],
        )?;

        self.get_forecast_by_location_id(values.location_id)?
            .ok_or(StorageError::LocationNotFound(values.location_id))
    }
}

/// Check a new location's name and coordinates, returning the trimmed name.
fn validate_location(name: &str, latitude: f64, longitude: f64) -> StorageResult<String> {
    let name = name.trim();
    let chars = name.chars().count();
    if !(NAME_MIN_CHARS..=NAME_MAX_CHARS).contains(&chars) {
        return Err(StorageError::InvalidLocation(format!(
            "name must be {}-{} characters, got {}",
            NAME_MIN_CHARS, NAME_MAX_CHARS, chars
        )));
    }
    if !(-90.0..=90.0).contains(&latitude) {
        return Err(StorageError::InvalidLocation(format!(
            "latitude {} is outside -90..=90",
            latitude
        )));
    }
    if !(-180.0..=180.0).contains(&longitude) {
        return Err(StorageError::InvalidLocation(format!(
            "longitude {} is outside -180..=180",
            longitude
        )));
    }
    Ok(name.to_string())
}

fn row_to_location(row: &rusqlite::Row) -> rusqlite::Result<TrackedLocation> {
    Ok(TrackedLocation {
        id: LocationId(row.get(0)?),
        name: row.get(1)?,
        latitude: row.get(2)?,
        longitude: row.get(3)?,
    })
}

fn row_to_forecast(row: &rusqlite::Row) -> rusqlite::Result<ForecastRecord> {
    let timestamp_str: String = row.get(2)?;
    let timestamp = DateTime::parse_from_rfc3339(&timestamp_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(e)))?;

    Ok(ForecastRecord {
        id: row.get(0)?,
        location_id: LocationId(row.get(1)?),
        timestamp,
        temperature: row.get(3)?,
        wind_speed: row.get(4)?,
        atmospheric_pressure: row.get(5)?,
    })
}
