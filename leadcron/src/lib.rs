// Leader-gated cron scheduling for clustered axum hosts

pub mod config;
pub mod dispatch;
pub mod errors;
pub mod executor;
pub mod jobs;
pub mod leadership;
pub mod lifecycle;
pub mod trigger;

pub use config::{LockSettings, Settings};
pub use dispatch::{Dispatcher, RouterDispatcher};
pub use errors::{DispatchError, LeadershipError, RegistrationError};
pub use jobs::{Job, JobAction, JobSpec, Registry, RequestSpec, TaskFn};
pub use leadership::{LeadershipBackend, LeadershipClient};
pub use lifecycle::Scheduler;
pub use trigger::TriggerHandle;
