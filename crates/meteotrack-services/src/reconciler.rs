//! Writes fetched current conditions into a location's single forecast record.

use chrono::{DateTime, Utc};
use meteotrack_weather::CurrentConditions;
use serde::Serialize;
use std::sync::Arc;

use crate::model::{ForecastRecord, ForecastValues, LocationId};
use crate::store::{ForecastStore, StorageError, StorageResult};

/// Whether reconciliation created the record or overwrote an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcileAction {
    Created,
    Updated,
}

/// A stored record and how it got there.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reconciled {
    pub record: ForecastRecord,
    pub action: ReconcileAction,
}

/// Reconcile `conditions` for `location_id` inside one store transaction.
///
/// The location lookup, record lookup and write all happen in the same
/// transaction, so two concurrent calls for one location still leave exactly
/// one record behind.
pub fn reconcile_at<S: ForecastStore>(
    store: &S,
    location_id: LocationId,
    conditions: &CurrentConditions,
    ingested_at: DateTime<Utc>,
) -> StorageResult<Reconciled> {
    store.transaction(|tx| {
        if tx.get_location_by_id(location_id)?.is_none() {
            return Err(StorageError::LocationNotFound(location_id));
        }

        let action = match tx.get_forecast_by_location_id(location_id)? {
            Some(_) => ReconcileAction::Updated,
            None => ReconcileAction::Created,
        };

        let record = tx.upsert_forecast(&ForecastValues {
            location_id,
            timestamp: ingested_at,
            temperature: conditions.temperature,
            wind_speed: conditions.wind_speed,
            atmospheric_pressure: conditions.atmospheric_pressure,
        })?;

        Ok(Reconciled { record, action })
    })
}

/// Async front for [`reconcile_at`] that keeps SQLite off the runtime threads.
pub struct Reconciler<S> {
    store: Arc<S>,
}

impl<S> Clone for Reconciler<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: ForecastStore + 'static> Reconciler<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Reconcile with the current time as the ingestion timestamp.
    pub async fn reconcile(
        &self,
        location_id: LocationId,
        conditions: CurrentConditions,
    ) -> StorageResult<Reconciled> {
        let store = Arc::clone(&self.store);
        let reconciled = tokio::task::spawn_blocking(move || {
            reconcile_at(store.as_ref(), location_id, &conditions, Utc::now())
        })
        .await??;

        tracing::debug!(
            "{:?} forecast {} for location {}",
            reconciled.action,
            reconciled.record.id,
            location_id
        );
        Ok(reconciled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite_store::SqliteForecastStore;

    fn conditions(temperature: f64) -> CurrentConditions {
        CurrentConditions {
            temperature: Some(temperature),
            wind_speed: Some(5.5),
            atmospheric_pressure: Some(1012.0),
            observed_at: Some("2025-01-15T12:00".to_string()),
        }
    }

    #[test]
    fn test_first_reconcile_creates_record() {
        let store = SqliteForecastStore::in_memory().unwrap();
        let location = store.register_location("Madrid", 40.42, -3.70).unwrap();
        let now = Utc::now();

        let reconciled = reconcile_at(&store, location.id, &conditions(18.0), now).unwrap();

        assert_eq!(reconciled.action, ReconcileAction::Created);
        assert_eq!(reconciled.record.location_id, location.id);
        assert_eq!(reconciled.record.temperature, Some(18.0));
        assert_eq!(reconciled.record.wind_speed, Some(5.5));
        assert_eq!(reconciled.record.atmospheric_pressure, Some(1012.0));
        assert_eq!(reconciled.record.timestamp, now);
    }

    #[test]
    fn test_second_reconcile_overwrites_in_place() {
        let store = SqliteForecastStore::in_memory().unwrap();
        let location = store.register_location("Seoul", 37.57, 126.98).unwrap();
        let first_at = Utc::now();
        let later_at = first_at + chrono::Duration::minutes(15);

        let first = reconcile_at(&store, location.id, &conditions(3.0), first_at).unwrap();
        let second = reconcile_at(&store, location.id, &conditions(3.0), later_at).unwrap();

        assert_eq!(second.action, ReconcileAction::Updated);
        assert_eq!(first.record.id, second.record.id);
        assert!(first.record.same_conditions(&second.record));
        assert!(second.record.timestamp > first.record.timestamp);
        assert_eq!(store.forecast_count().unwrap(), 1);
    }

    #[test]
    fn test_missing_pressure_is_stored_as_null() {
        let store = SqliteForecastStore::in_memory().unwrap();
        let location = store.register_location("Lagos", 6.52, 3.38).unwrap();
        let mut current = conditions(29.0);
        current.atmospheric_pressure = None;

        let reconciled = reconcile_at(&store, location.id, &current, Utc::now()).unwrap();
        assert_eq!(reconciled.record.atmospheric_pressure, None);
    }

    #[test]
    fn test_unknown_location_is_rejected() {
        let store = SqliteForecastStore::in_memory().unwrap();
        let err = reconcile_at(&store, LocationId(77), &conditions(1.0), Utc::now()).unwrap_err();
        assert!(matches!(err, StorageError::LocationNotFound(LocationId(77))));
        assert_eq!(store.forecast_count().unwrap(), 0);
    }

    #[test]
    fn test_reconciles_through_separate_connections_leave_one_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("forecasts.db");
        let first = Arc::new(SqliteForecastStore::open(&path).unwrap());
        let second = Arc::new(SqliteForecastStore::open(&path).unwrap());
        let location = first.register_location("Oslo", 59.91, 10.75).unwrap();

        let workers: Vec<_> = [first.clone(), second.clone()]
            .into_iter()
            .enumerate()
            .map(|(n, store)| {
                std::thread::spawn(move || {
                    let mut created = 0;
                    for i in 0..5 {
                        let current = conditions(f64::from(i) + n as f64 * 10.0);
                        let reconciled =
                            reconcile_at(store.as_ref(), location.id, &current, Utc::now()).unwrap();
                        if reconciled.action == ReconcileAction::Created {
                            created += 1;
                        }
                    }
                    created
                })
            })
            .collect();

        let created: i32 = workers.into_iter().map(|w| w.join().unwrap()).sum();
        assert_eq!(created, 1);
        assert_eq!(first.forecast_count().unwrap(), 1);
        assert_eq!(second.forecast_count().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_async_reconcile_advances_timestamp() {
        let store = Arc::new(SqliteForecastStore::in_memory().unwrap());
        let location = store.register_location("Denver", 39.74, -104.99).unwrap();
        let reconciler = Reconciler::new(store.clone());

        let first = reconciler.reconcile(location.id, conditions(9.0)).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        let second = reconciler.reconcile(location.id, conditions(9.0)).await.unwrap();

        assert_eq!(first.action, ReconcileAction::Created);
        assert_eq!(second.action, ReconcileAction::Updated);
        assert!(first.record.same_conditions(&second.record));
        assert!(second.record.timestamp > first.record.timestamp);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_reconciles_leave_one_record() {
        let store = Arc::new(SqliteForecastStore::in_memory().unwrap());
        let location = store.register_location("Taipei", 25.03, 121.57).unwrap();
        let reconciler = Reconciler::new(store.clone());

        let mut handles = Vec::new();
        for i in 0..8 {
            let reconciler = reconciler.clone();
            handles.push(tokio::spawn(async move {
                reconciler.reconcile(location.id, conditions(f64::from(i))).await
            }));
        }

        let mut created = 0;
        for handle in handles {
            if handle.await.unwrap().unwrap().action == ReconcileAction::Created {
                created += 1;
            }
        }

        assert_eq!(created, 1);
        assert_eq!(store.forecast_count().unwrap(), 1);
    }
}
