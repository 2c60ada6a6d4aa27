pub mod model;
pub mod reconciler;
pub mod refresh;
pub mod scheduler;
pub mod sqlite_store;
pub mod store;

pub use model::{ForecastRecord, ForecastValues, LocationId, TrackedLocation};
pub use reconciler::{reconcile_at, ReconcileAction, Reconciled, Reconciler};
pub use refresh::{BatchReport, CycleOutcome, LocationOutcome, RefreshError, RefreshService};
pub use scheduler::{
    RefreshHandle, RefreshScheduler, SchedulerState, SchedulerStatus, REFRESH_INTERVAL,
};
pub use sqlite_store::SqliteForecastStore;
pub use store::{ForecastStore, StorageError, StorageResult, StoreTransaction};
