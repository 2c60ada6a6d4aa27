//! Fetch-and-reconcile for tracked locations.
//!
//! A refresh cycle lists every tracked location, then for each one fetches
//! current conditions and reconciles them into storage. A failure for one
//! location is recorded in the [`BatchReport`] and never stops the rest.

use chrono::{DateTime, Utc};
use meteotrack_weather::{WeatherError, WeatherQuery};
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::model::{LocationId, TrackedLocation};
use crate::reconciler::{Reconciled, Reconciler};
use crate::store::{ForecastStore, StorageError, StorageResult};

/// Why refreshing one location failed.
#[derive(Debug, Error)]
pub enum RefreshError {
    #[error(transparent)]
    Weather(#[from] WeatherError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl RefreshError {
    pub fn user_message(&self) -> String {
        match self {
            Self::Weather(e) => e.user_message(),
            Self::Storage(e) => e.user_message().to_string(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Weather(e) => e.is_retryable(),
            Self::Storage(e) => e.is_retryable(),
        }
    }
}

/// Result of refreshing one location within a batch.
#[derive(Debug)]
pub struct LocationOutcome {
    pub location_id: LocationId,
    pub result: Result<Reconciled, RefreshError>,
}

/// Per-location outcomes of one pass over the tracked locations.
#[derive(Debug)]
pub struct BatchReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcomes: Vec<LocationOutcome>,
    /// The pass stopped early because cancellation was requested.
    pub cancelled: bool,
}

impl BatchReport {
    fn start() -> Self {
        let now = Utc::now();
        Self {
            started_at: now,
            finished_at: now,
            outcomes: Vec::new(),
            cancelled: false,
        }
    }

    fn record(mut self, outcome: LocationOutcome) -> Self {
        self.outcomes.push(outcome);
        self
    }

    fn finish(mut self, cancelled: bool) -> Self {
        self.finished_at = Utc::now();
        self.cancelled = cancelled;
        self
    }

    pub fn successes(&self) -> impl Iterator<Item = (LocationId, &Reconciled)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().ok().map(|r| (o.location_id, r)))
    }

    pub fn failures(&self) -> impl Iterator<Item = (LocationId, &RefreshError)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().err().map(|e| (o.location_id, e)))
    }
}

/// Outcome of one scheduler cycle.
#[derive(Debug)]
pub enum CycleOutcome {
    /// The location list was read and the batch ran (possibly cut short).
    Completed(BatchReport),
    /// The location list could not be read; nothing was refreshed.
    Aborted { error: StorageError },
}

impl CycleOutcome {
    pub fn report(&self) -> Option<&BatchReport> {
        match self {
            Self::Completed(report) => Some(report),
            Self::Aborted { .. } => None,
        }
    }
}

/// Refreshes tracked locations from the weather provider into the store.
pub struct RefreshService<S> {
    query: WeatherQuery,
    reconciler: Reconciler<S>,
}

impl<S> Clone for RefreshService<S> {
    fn clone(&self) -> Self {
        Self {
            query: self.query.clone(),
            reconciler: self.reconciler.clone(),
        }
    }
}

impl<S: ForecastStore + 'static> RefreshService<S> {
    pub fn new(query: WeatherQuery, store: Arc<S>) -> Self {
        Self {
            query,
            reconciler: Reconciler::new(store),
        }
    }

    pub fn store(&self) -> &Arc<S> {
        self.reconciler.store()
    }

    /// All tracked locations, ordered by id.
    pub async fn list_locations(&self) -> StorageResult<Vec<TrackedLocation>> {
        let store = Arc::clone(self.store());
        tokio::task::spawn_blocking(move || store.list_all_locations()).await?
    }

    /// Fetch and reconcile one location by id.
    pub async fn refresh_location(&self, location_id: LocationId) -> Result<Reconciled, RefreshError> {
        let store = Arc::clone(self.store());
        let location = tokio::task::spawn_blocking(move || store.get_location_by_id(location_id))
            .await
            .map_err(StorageError::from)??
            .ok_or(StorageError::LocationNotFound(location_id))?;

        self.refresh(&location).await
    }

    /// Fetch and reconcile an already loaded location.
    pub async fn refresh(&self, location: &TrackedLocation) -> Result<Reconciled, RefreshError> {
        let conditions = self
            .query
            .current_conditions(location.latitude, location.longitude)
            .await?;
        let reconciled = self.reconciler.reconcile(location.id, conditions).await?;
        Ok(reconciled)
    }

    /// Refresh `locations` in order, folding each result into a report.
    ///
    /// Cancellation is checked between locations; the one in flight is
    /// allowed to finish.
    pub async fn refresh_batch(
        &self,
        locations: &[TrackedLocation],
        cancel: &CancellationToken,
    ) -> BatchReport {
        let mut report = BatchReport::start();

        for location in locations {
            if cancel.is_cancelled() {
                tracing::info!(
                    "Refresh cancelled after {} of {} locations",
                    report.outcomes.len(),
                    locations.len()
                );
                return report.finish(true);
            }

            let result = self.refresh(location).await;
            match &result {
                Ok(reconciled) => tracing::debug!(
                    "Refreshed {} ({}): {:?}",
                    location.name,
                    location.id,
                    reconciled.action
                ),
                Err(e) => tracing::warn!(
                    "Failed to refresh {} ({}): {}",
                    location.name,
                    location.id,
                    e
                ),
            }
            report = report.record(LocationOutcome {
                location_id: location.id,
                result,
            });
        }

        report.finish(false)
    }

    /// List every tracked location and refresh them all.
    pub async fn run_cycle(&self, cancel: &CancellationToken) -> CycleOutcome {
        self.run_cycle_with(cancel, || {}).await
    }

    /// Same as [`run_cycle`](Self::run_cycle), calling `on_batch_start` once the
    /// location list has been read and before the first location is refreshed.
    pub async fn run_cycle_with<F: FnOnce()>(
        &self,
        cancel: &CancellationToken,
        on_batch_start: F,
    ) -> CycleOutcome {
        match self.list_locations().await {
            Ok(locations) => {
                on_batch_start();
                CycleOutcome::Completed(self.refresh_batch(&locations, cancel).await)
            }
            Err(error) => {
                tracing::error!("Refresh cycle aborted, could not list locations: {}", error);
                CycleOutcome::Aborted { error }
            }
        }
    }
}
