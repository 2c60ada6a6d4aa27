//! Periodic background refresh of every tracked location.

use meteotrack_core::{JoinFuture, ManagedTask};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;

use crate::refresh::{CycleOutcome, RefreshService};
use crate::store::ForecastStore;

/// Time between the end of one cycle and the start of the next.
pub const REFRESH_INTERVAL: Duration = Duration::from_secs(15 * 60);

/// Where the scheduler loop currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SchedulerState {
    /// Started, listing locations for the next cycle.
    #[default]
    Idle,
    /// Working through the location list.
    FetchingBatch,
    /// Waiting out the refresh interval.
    Sleeping,
    /// Stopped for good.
    Cancelled,
}

/// Snapshot published after every state change.
#[derive(Debug, Clone, Default)]
pub struct SchedulerStatus {
    pub state: SchedulerState,
    pub cycles_completed: u64,
    pub last_cycle: Option<Arc<CycleOutcome>>,
}

/// Drives [`RefreshService`] on a fixed interval until cancelled.
pub struct RefreshScheduler<S> {
    service: RefreshService<S>,
    interval: Duration,
}

impl<S: ForecastStore + 'static> RefreshScheduler<S> {
    pub fn new(service: RefreshService<S>) -> Self {
        Self {
            service,
            interval: REFRESH_INTERVAL,
        }
    }

    /// Override the sleep between cycles.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Spawn the refresh loop. The first cycle starts immediately.
    pub fn start(self) -> RefreshHandle {
        let cancel = CancellationToken::new();
        let (status_tx, status_rx) = watch::channel(SchedulerStatus::default());

        tracing::info!("Starting forecast refresh every {:?}", self.interval);
        let task = tokio::spawn(self.run(cancel.clone(), status_tx));

        RefreshHandle {
            cancel,
            status: status_rx,
            task,
        }
    }

    async fn run(self, cancel: CancellationToken, status: watch::Sender<SchedulerStatus>) {
        let set_state = |state: SchedulerState| {
            tracing::debug!("Refresh scheduler: {:?}", state);
            status.send_modify(|s| s.state = state);
        };

        loop {
            if cancel.is_cancelled() {
                break;
            }

            set_state(SchedulerState::Idle);
            let outcome = self
                .service
                .run_cycle_with(&cancel, || set_state(SchedulerState::FetchingBatch))
                .await;
            if let Some(report) = outcome.report() {
                tracing::info!(
                    "Refresh cycle finished: {} updated, {} failed{}",
                    report.successes().count(),
                    report.failures().count(),
                    if report.cancelled { " (cancelled)" } else { "" }
                );
            }

            status.send_modify(|s| {
                s.cycles_completed += 1;
                s.last_cycle = Some(Arc::new(outcome));
            });

            if cancel.is_cancelled() {
                break;
            }

            set_state(SchedulerState::Sleeping);
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }

        set_state(SchedulerState::Cancelled);
        tracing::info!("Forecast refresh stopped");
    }
}

/// Handle to a running [`RefreshScheduler`].
pub struct RefreshHandle {
    cancel: CancellationToken,
    status: watch::Receiver<SchedulerStatus>,
    task: JoinHandle<()>,
}

impl RefreshHandle {
    /// Ask the loop to stop. A location refresh already in flight completes first.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Latest published status.
    pub fn status(&self) -> SchedulerStatus {
        self.status.borrow().clone()
    }

    pub fn state(&self) -> SchedulerState {
        self.status.borrow().state
    }

    /// Receiver that observes every status change.
    pub fn subscribe(&self) -> watch::Receiver<SchedulerStatus> {
        self.status.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the loop to exit.
    pub async fn join(self) -> Result<(), JoinError> {
        self.task.await
    }
}

impl ManagedTask for RefreshHandle {
    fn name(&self) -> &str {
        "forecast-refresh"
    }

    fn cancel(&self) {
        RefreshHandle::cancel(self);
    }

    fn is_finished(&self) -> bool {
        RefreshHandle::is_finished(self)
    }

    fn join(self: Box<Self>) -> JoinFuture {
        Box::pin(async move {
            RefreshHandle::join(*self).await?;
            Ok(())
        })
    }
}
