// Trigger executor: the per-tick callback, leadership-gated and failure-isolated

use std::sync::Arc;

use tokio::sync::OnceCell;
use tracing::{debug, error, info};

use crate::dispatch::Dispatcher;
use crate::jobs::{Job, JobAction};
use crate::leadership::LeadershipClient;
use crate::trigger::TickFn;

/// Builds tick callbacks for every registered job. One executor instance is
/// shared across the registry; it holds the process-wide leadership client
/// (filled in at host-ready) and the host dispatcher.
pub struct TriggerExecutor {
    leadership: Arc<OnceCell<LeadershipClient>>,
    dispatcher: Arc<dyn Dispatcher>,
}

impl TriggerExecutor {
    pub fn new(
        leadership: Arc<OnceCell<LeadershipClient>>,
        dispatcher: Arc<dyn Dispatcher>,
    ) -> Self {
        Self {
            leadership,
            dispatcher,
        }
    }

    /// The tick callback for one job. Errors raised anywhere in the tick
    /// are caught here and logged; a failed tick never reaches the trigger
    /// loop, so it cannot stop future ticks or other jobs.
    pub fn tick_fn(self: &Arc<Self>, job: Arc<Job>) -> TickFn {
        let executor = Arc::clone(self);
        Arc::new(move || {
            let executor = Arc::clone(&executor);
            let job = Arc::clone(&job);
            Box::pin(async move {
                if let Err(e) = executor.run_tick(&job).await {
                    error!(job = %job.name, error = %e, "job tick failed");
                }
            })
        })
    }

    async fn run_tick(&self, job: &Job) -> anyhow::Result<()> {
        let Some(leadership) = self.leadership.get() else {
            debug!(job = %job.name, "leadership client not connected, skipping tick");
            return Ok(());
        };

        let leader = leadership.is_leader().await;
        debug!(job = %job.name, leader, "leadership checked");
        if !leader {
            return Ok(());
        }

        // Exactly one action fires per leader tick.
        match &job.action {
            JobAction::Dispatch(spec) => {
                info!(job = %job.name, method = %spec.method, path = %spec.path, "dispatching job request");
                self.dispatcher.dispatch(spec).await?;
            }
            JobAction::Execute(task) => {
                info!(job = %job.name, "running job task");
                task().await?;
            }
        }

        if let Some(hook) = &job.on_complete {
            hook().await?;
        }

        Ok(())
    }
}
