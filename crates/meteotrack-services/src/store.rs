//! Storage contract consumed by the reconciler and the scheduler.
//!
//! Every operation runs inside a transaction obtained from
//! [`ForecastStore::transaction`]; the store commits when the closure
//! returns `Ok` and rolls back otherwise.

use meteotrack_core::{DatabaseError, RusqliteErrorExt};
use thiserror::Error;

use crate::model::{ForecastRecord, ForecastValues, LocationId, TrackedLocation};

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The database rejected or failed the operation.
    #[error(transparent)]
    Database(#[from] DatabaseError),

    /// The location id does not exist.
    #[error("Location not found: {0}")]
    LocationNotFound(LocationId),

    /// Location data failed validation.
    #[error("Invalid location: {0}")]
    InvalidLocation(String),

    /// The blocking storage task could not complete.
    #[error("Storage task failed: {0}")]
    Task(String),
}

impl From<rusqlite::Error> for StorageError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Database(e.into_database_error())
    }
}

impl From<tokio::task::JoinError> for StorageError {
    fn from(e: tokio::task::JoinError) -> Self {
        Self::Task(e.to_string())
    }
}

impl StorageError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Database(e) => e.user_message(),
            Self::LocationNotFound(_) => "Location not found",
            Self::InvalidLocation(_) => "Location data is invalid",
            Self::Task(_) => "A storage operation was interrupted. Please try again.",
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Database(e) => e.is_transient(),
            Self::Task(_) => true,
            _ => false,
        }
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Operations available inside one atomic transaction.
pub trait StoreTransaction {
    fn get_location_by_id(&self, id: LocationId) -> StorageResult<Option<TrackedLocation>>;

    /// All tracked locations ordered by id.
    fn list_all_locations(&self) -> StorageResult<Vec<TrackedLocation>>;

    fn get_forecast_by_location_id(&self, id: LocationId) -> StorageResult<Option<ForecastRecord>>;

    /// Insert the location's forecast or overwrite the existing one in place.
    fn upsert_forecast(&self, values: &ForecastValues) -> StorageResult<ForecastRecord>;
}

/// A store able to run [`StoreTransaction`] work atomically.
///
/// Implementations must isolate concurrent transactions touching the same
/// location so a read-check-write sequence cannot lose an update.
pub trait ForecastStore: Send + Sync {
    /// Run `work` in one transaction: commit on `Ok`, roll back on `Err`.
    fn transaction<T, F>(&self, work: F) -> StorageResult<T>
    where
        F: FnOnce(&dyn StoreTransaction) -> StorageResult<T>;

    fn list_all_locations(&self) -> StorageResult<Vec<TrackedLocation>> {
        self.transaction(|tx| tx.list_all_locations())
    }

    fn get_location_by_id(&self, id: LocationId) -> StorageResult<Option<TrackedLocation>> {
        self.transaction(|tx| tx.get_location_by_id(id))
    }

    fn get_forecast_by_location_id(&self, id: LocationId) -> StorageResult<Option<ForecastRecord>> {
        self.transaction(|tx| tx.get_forecast_by_location_id(id))
    }
}
