// Job definitions, registration-time validation, and the job registry

use std::collections::HashSet;
use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;

use axum::http::Method;
use chrono_tz::Tz;
use cron::Schedule as CronSchedule;
use futures::future::BoxFuture;

use crate::errors::RegistrationError;
use crate::trigger::TriggerHandle;

/// Caller-supplied async task, used for execute actions and completion hooks.
pub type TaskFn = Arc<dyn Fn() -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

/// Request spec routed into the host's internal dispatch path on each
/// leader tick.
#[derive(Debug, Clone)]
pub struct RequestSpec {
    pub method: Method,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<serde_json::Value>,
}

impl RequestSpec {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn json_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// Caller-facing job configuration, validated into a [`Job`] at registration.
#[derive(Clone, Default)]
pub struct JobSpec {
    pub name: String,
    /// 6-field cron expression with seconds resolution.
    pub schedule: String,
    /// IANA timezone name the schedule is evaluated in.
    pub timezone: String,
    pub request: Option<RequestSpec>,
    pub execute: Option<TaskFn>,
    pub on_complete: Option<TaskFn>,
}

impl JobSpec {
    pub fn new(
        name: impl Into<String>,
        schedule: impl Into<String>,
        timezone: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            schedule: schedule.into(),
            timezone: timezone.into(),
            ..Self::default()
        }
    }

    pub fn request(mut self, spec: RequestSpec) -> Self {
        self.request = Some(spec);
        self
    }

    pub fn execute<F, Fut>(mut self, task: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.execute = Some(task_fn(task));
        self
    }

    pub fn on_complete<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.on_complete = Some(task_fn(hook));
        self
    }
}

fn task_fn<F, Fut>(f: F) -> TaskFn
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    Arc::new(move || Box::pin(f()))
}

/// The action fired on a leader tick. Exactly one variant per job.
#[derive(Clone)]
pub enum JobAction {
    Dispatch(RequestSpec),
    Execute(TaskFn),
}

/// A validated, immutable scheduled unit of work.
#[derive(Clone)]
pub struct Job {
    pub name: String,
    pub schedule: CronSchedule,
    pub timezone: Tz,
    pub action: JobAction,
    pub on_complete: Option<TaskFn>,
}

impl std::fmt::Debug for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let action = match self.action {
            JobAction::Dispatch(_) => "dispatch",
            JobAction::Execute(_) => "execute",
        };
        f.debug_struct("Job")
            .field("name", &self.name)
            .field("timezone", &self.timezone)
            .field("action", &action)
            .finish_non_exhaustive()
    }
}

/// Validate an ordered sequence of job specs, all-or-nothing.
///
/// The first violated check per job wins; any violation aborts the whole
/// batch so that no partial registry survives.
pub fn validate(specs: &[JobSpec]) -> Result<Vec<Job>, RegistrationError> {
    let mut seen: HashSet<&str> = HashSet::with_capacity(specs.len());
    let mut jobs = Vec::with_capacity(specs.len());

    for spec in specs {
        let job = validate_one(spec, &seen)?;
        seen.insert(spec.name.as_str());
        jobs.push(job);
    }

    Ok(jobs)
}

fn validate_one(spec: &JobSpec, seen: &HashSet<&str>) -> Result<Job, RegistrationError> {
    if seen.contains(spec.name.as_str()) {
        return Err(RegistrationError::DuplicateJobName {
            name: spec.name.clone(),
        });
    }
    if spec.name.is_empty() {
        return Err(RegistrationError::MissingJobName);
    }
    if spec.schedule.is_empty() {
        return Err(RegistrationError::MissingJobSchedule {
            job: spec.name.clone(),
        });
    }
    if spec.timezone.is_empty() {
        return Err(RegistrationError::MissingJobTimezone {
            job: spec.name.clone(),
        });
    }

    // A request spec takes precedence when both variants are supplied.
    let action = match (&spec.request, &spec.execute) {
        (None, None) => {
            return Err(RegistrationError::MissingJobAction {
                job: spec.name.clone(),
            })
        }
        (Some(request), _) => {
            if request.path.is_empty() {
                return Err(RegistrationError::MissingDispatchTarget {
                    job: spec.name.clone(),
                });
            }
            JobAction::Dispatch(request.clone())
        }
        (None, Some(task)) => JobAction::Execute(Arc::clone(task)),
    };

    let schedule = CronSchedule::from_str(&spec.schedule).map_err(|e| {
        RegistrationError::InvalidScheduleExpression {
            job: spec.name.clone(),
            expression: spec.schedule.clone(),
            reason: e.to_string(),
        }
    })?;

    let timezone: Tz = spec
        .timezone
        .parse()
        .map_err(|_| RegistrationError::InvalidTimezone {
            job: spec.name.clone(),
            timezone: spec.timezone.clone(),
        })?;

    Ok(Job {
        name: spec.name.clone(),
        schedule,
        timezone,
        action,
        on_complete: spec.on_complete.as_ref().map(Arc::clone),
    })
}

/// Insertion-ordered mapping from job name to its live trigger handle.
///
/// Enumeration order is the registration order, kept stable for diagnostics
/// and for the lifecycle orchestrator's start/stop sequencing.
pub struct Registry {
    entries: Vec<(String, TriggerHandle)>,
}

impl Registry {
    pub(crate) fn new(entries: Vec<(String, TriggerHandle)>) -> Self {
        Self { entries }
    }

    pub fn get(&self, name: &str) -> Option<&TriggerHandle> {
        self.entries
            .iter()
            .find(|(entry_name, _)| entry_name == name)
            .map(|(_, trigger)| trigger)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &TriggerHandle)> {
        self.entries
            .iter()
            .map(|(name, trigger)| (name.as_str(), trigger))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
