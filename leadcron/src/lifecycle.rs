// Scheduler lifecycle: atomic registration, host-ready arming, shutdown disarming

use std::sync::Arc;

use tokio::sync::OnceCell;
use tracing::{info, warn};

use crate::config::LockSettings;
use crate::dispatch::Dispatcher;
use crate::errors::{LeadershipError, RegistrationError};
use crate::executor::TriggerExecutor;
use crate::jobs::{self, JobSpec, Registry};
use crate::leadership::LeadershipClient;
use crate::trigger::TriggerHandle;

/// The scheduler plugin for a host process.
///
/// `register` validates everything up front and builds the registry with no
/// trigger armed. The host then calls [`Scheduler::on_ready`] once it is
/// ready to serve and [`Scheduler::on_shutdown_begin`] before it stops.
pub struct Scheduler {
    settings: Option<LockSettings>,
    registry: Registry,
    leadership: Arc<OnceCell<LeadershipClient>>,
}

impl Scheduler {
    /// Validate the lock settings and job specs, and build the registry.
    ///
    /// All-or-nothing: any validation failure aborts with no jobs armed and
    /// no registry retained. The leadership connection is deferred to
    /// [`Scheduler::on_ready`].
    pub fn register(
        settings: LockSettings,
        specs: Vec<JobSpec>,
        dispatcher: Arc<dyn Dispatcher>,
    ) -> Result<Self, RegistrationError> {
        settings.validate()?;
        Self::build(Some(settings), None, specs, dispatcher)
    }

    /// Register with an already connected leadership client, bypassing the
    /// url-based backend selection. Used when the caller owns the
    /// coordination setup, and by tests injecting fake backends.
    pub fn with_client(
        client: LeadershipClient,
        specs: Vec<JobSpec>,
        dispatcher: Arc<dyn Dispatcher>,
    ) -> Result<Self, RegistrationError> {
        Self::build(None, Some(client), specs, dispatcher)
    }

    fn build(
        settings: Option<LockSettings>,
        client: Option<LeadershipClient>,
        specs: Vec<JobSpec>,
        dispatcher: Arc<dyn Dispatcher>,
    ) -> Result<Self, RegistrationError> {
        if specs.is_empty() {
            info!("no cron jobs provided");
        }

        let validated = jobs::validate(&specs)?;

        let leadership = Arc::new(OnceCell::new());
        if let Some(client) = client {
            // A fresh cell cannot already be set.
            let _ = leadership.set(client);
        }

        let executor = Arc::new(TriggerExecutor::new(Arc::clone(&leadership), dispatcher));
        let entries = validated
            .into_iter()
            .map(|job| {
                let name = job.name.clone();
                let schedule = job.schedule.clone();
                let timezone = job.timezone;
                let job = Arc::new(job);
                let trigger =
                    TriggerHandle::new(name.clone(), schedule, timezone, executor.tick_fn(job));
                (name, trigger)
            })
            .collect();

        Ok(Self {
            settings,
            registry: Registry::new(entries),
            leadership,
        })
    }

    /// Host-ready hook. Establishes the leadership connection exactly once,
    /// then arms every trigger in registry order. A connection failure
    /// propagates and must abort host startup.
    pub async fn on_ready(&self) -> Result<(), LeadershipError> {
        self.leadership
            .get_or_try_init(|| async {
                match &self.settings {
                    Some(settings) => LeadershipClient::connect(settings).await,
                    None => Err(LeadershipError::ConnectionFailed(
                        "no leadership configuration or client provided".to_string(),
                    )),
                }
            })
            .await?;

        for (name, trigger) in self.registry.iter() {
            trigger.start().await;
            info!(job = %name, "job trigger armed");
        }
        Ok(())
    }

    /// Host shutdown-begin hook. Stops every trigger in registry order,
    /// awaiting each so that no tick runs once this returns.
    pub async fn on_shutdown_begin(&self) {
        for (name, trigger) in self.registry.iter() {
            trigger.stop().await;
            info!(job = %name, "job trigger stopped");
        }
        if self.registry.is_empty() {
            warn!("shutdown with no jobs registered");
        }
    }

    /// Runtime introspection: job names and trigger state.
    pub fn jobs(&self) -> &Registry {
        &self.registry
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("jobs", &self.registry.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::DispatchError;
    use crate::jobs::RequestSpec;
    use crate::leadership::LeadershipBackend;
    use async_trait::async_trait;
    use axum::http::StatusCode;

    struct NeverLeader;

    #[async_trait]
    impl LeadershipBackend for NeverLeader {
        async fn try_lead(&self) -> Result<bool, LeadershipError> {
            Ok(false)
        }
    }

    struct NullDispatcher;

    #[async_trait]
    impl Dispatcher for NullDispatcher {
        async fn dispatch(&self, _spec: &RequestSpec) -> Result<StatusCode, DispatchError> {
            Ok(StatusCode::OK)
        }
    }

    fn lock_settings() -> LockSettings {
        LockSettings {
            url: "redis://localhost:6379".to_string(),
            key: "lockTest".to_string(),
            ttl_ms: 5000,
            retry_ms: 1000,
        }
    }

    fn valid_spec(name: &str) -> JobSpec {
        JobSpec::new(name, "*/10 * * * * *", "Europe/London")
            .request(RequestSpec::get("/test-url"))
    }

    #[test]
    fn test_register_without_jobs_succeeds() {
        let scheduler =
            Scheduler::register(lock_settings(), Vec::new(), Arc::new(NullDispatcher)).unwrap();
        assert!(scheduler.jobs().is_empty());
    }

    #[test]
    fn test_register_exposes_names_in_order() {
        let specs = vec![valid_spec("alpha"), valid_spec("beta"), valid_spec("gamma")];
        let scheduler =
            Scheduler::register(lock_settings(), specs, Arc::new(NullDispatcher)).unwrap();
        let names: Vec<&str> = scheduler.jobs().names().collect();
        assert_eq!(names, vec!["alpha", "beta", "gamma"]);
    }

    #[test]
    fn test_duplicate_name_leaves_nothing_registered() {
        let specs = vec![valid_spec("testname"), valid_spec("testname")];
        let err =
            Scheduler::register(lock_settings(), specs, Arc::new(NullDispatcher)).unwrap_err();
        assert!(matches!(err, RegistrationError::DuplicateJobName { .. }));
    }

    #[test]
    fn test_register_rejects_bad_lock_settings() {
        let mut settings = lock_settings();
        settings.key = String::new();
        let err = Scheduler::register(settings, vec![valid_spec("job")], Arc::new(NullDispatcher))
            .unwrap_err();
        assert!(matches!(err, RegistrationError::MissingLockKey));
    }

    #[test]
    fn test_scheduler_debug_reports_job_count() {
        let specs = vec![valid_spec("alpha"), valid_spec("beta")];
        let scheduler =
            Scheduler::register(lock_settings(), specs, Arc::new(NullDispatcher)).unwrap();
        assert!(format!("{scheduler:?}").contains('2'));
    }

    #[tokio::test]
    async fn test_on_ready_arms_triggers_and_shutdown_disarms() {
        let client = LeadershipClient::from_backend(Arc::new(NeverLeader));
        let scheduler =
            Scheduler::with_client(client, vec![valid_spec("armed")], Arc::new(NullDispatcher))
                .unwrap();

        assert_eq!(scheduler.jobs().get("armed").unwrap().running(), None);

        scheduler.on_ready().await.unwrap();
        assert_eq!(scheduler.jobs().get("armed").unwrap().running(), Some(true));

        scheduler.on_shutdown_begin().await;
        assert_eq!(
            scheduler.jobs().get("armed").unwrap().running(),
            Some(false)
        );
    }

    #[tokio::test]
    async fn test_unsupported_backend_fails_on_ready() {
        let mut settings = lock_settings();
        settings.url = "zookeeper://localhost:2181".to_string();
        let scheduler =
            Scheduler::register(settings, vec![valid_spec("job")], Arc::new(NullDispatcher))
                .unwrap();

        let err = scheduler.on_ready().await.unwrap_err();
        assert!(matches!(err, LeadershipError::UnsupportedBackend { .. }));
        // Startup failed, so nothing was armed.
        assert_eq!(scheduler.jobs().get("job").unwrap().running(), None);
    }
}
