//! Background job scheduler using tokio-cron-scheduler.

use std::sync::Arc;
use std::time::Duration;

use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};

use ratewise_infra::InMemoryCounterStore;

/// Scheduler configuration.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Enable scheduler.
    pub enabled: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl SchedulerConfig {
    pub fn from_env() -> Self {
        Self {
            enabled: std::env::var("SCHEDULER_ENABLED")
                .map(|v| v != "false" && v != "0")
                .unwrap_or(true),
        }
    }
}

/// Job scheduler wrapper.
pub struct Scheduler {
    inner: JobScheduler,
}

impl Scheduler {
    /// Create a new scheduler.
    pub async fn new() -> Result<Self, JobSchedulerError> {
        let inner = JobScheduler::new().await?;
        Ok(Self { inner })
    }

    /// Add a job that runs every `interval`.
    pub async fn add_repeated<F, Fut>(
        &self,
        interval: Duration,
        task: F,
    ) -> Result<uuid::Uuid, JobSchedulerError>
    where
        F: Fn() -> Fut + Send + Sync + Clone + 'static,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        let job = Job::new_repeated_async(interval, move |_uuid, _lock| {
            let task = task.clone();
            Box::pin(async move {
                task().await;
            })
        })?;

        let id = self.inner.add(job).await?;
        tracing::info!(interval_secs = interval.as_secs(), job_id = %id, "Repeated job registered");
        Ok(id)
    }

    /// Periodically reclaim expired local counters.
    pub async fn add_counter_sweep(
        &self,
        store: Arc<InMemoryCounterStore>,
        interval: Duration,
    ) -> Result<uuid::Uuid, JobSchedulerError> {
        self.add_repeated(interval, move || {
            let store = store.clone();
            async move {
                let removed = store.sweep();
                tracing::trace!(removed, live = store.len(), "Counter sweep finished");
            }
        })
        .await
    }

    /// Start the scheduler.
    pub async fn start(&self) -> Result<(), JobSchedulerError> {
        self.inner.start().await?;
        tracing::info!("Scheduler started");
        Ok(())
    }

    /// Stop the scheduler.
    pub async fn shutdown(&mut self) -> Result<(), JobSchedulerError> {
        self.inner.shutdown().await?;
        tracing::info!("Scheduler stopped");
        Ok(())
    }
}

/// Keep the local store swept. With the scheduler enabled the sweep is a
/// scheduler job and the running scheduler is returned; otherwise it runs on
/// a plain interval task, since nothing else reclaims old windows.
pub async fn start_counter_sweep(
    config: &SchedulerConfig,
    store: Arc<InMemoryCounterStore>,
    interval: Duration,
) -> Result<Option<Scheduler>, JobSchedulerError> {
    if !config.enabled {
        tracing::info!("Scheduler disabled, sweeping counters on a plain interval");
        let _sweeper = store.spawn_sweeper(interval);
        return Ok(None);
    }

    let scheduler = Scheduler::new().await?;
    scheduler.add_counter_sweep(store, interval).await?;
    scheduler.start().await?;
    Ok(Some(scheduler))
}
