// Error taxonomy: fail fast at registration/startup, fail soft (logged) per tick

use thiserror::Error;

/// Registration-time configuration errors.
///
/// Any of these aborts the entire registration: no partial registry is kept
/// and no trigger is armed.
#[derive(Error, Debug)]
pub enum RegistrationError {
    #[error("Job name '{name}' has already been defined")]
    DuplicateJobName { name: String },

    #[error("Missing job name")]
    MissingJobName,

    #[error("Missing schedule for job '{job}'")]
    MissingJobSchedule { job: String },

    #[error("Missing timezone for job '{job}'")]
    MissingJobTimezone { job: String },

    #[error("Missing request options or execute task for job '{job}'")]
    MissingJobAction { job: String },

    #[error("Missing request path for job '{job}'")]
    MissingDispatchTarget { job: String },

    #[error("Schedule '{expression}' for job '{job}' is not a cron expression: {reason}")]
    InvalidScheduleExpression {
        job: String,
        expression: String,
        reason: String,
    },

    #[error("Invalid timezone '{timezone}' for job '{job}': expected an IANA timezone name")]
    InvalidTimezone { job: String, timezone: String },

    #[error("Missing lock url")]
    MissingLockUrl,

    #[error("Missing lock key")]
    MissingLockKey,

    #[error("Missing lock ttl")]
    MissingLockTtl,

    #[error("Missing lock retry interval")]
    MissingLockRetry,
}

/// Leadership coordination errors.
///
/// `UnsupportedBackend` and `ConnectionFailed` surface at startup and are
/// fatal. `Lease`/`Lock` errors occur during steady-state checks and are
/// absorbed by the client, which degrades them to "not leader".
#[derive(Error, Debug)]
pub enum LeadershipError {
    #[error("Unsupported lock backend '{url}': url should start with \"postgres\" or \"redis\"")]
    UnsupportedBackend { url: String },

    #[error("Failed to connect to coordination backend: {0}")]
    ConnectionFailed(String),

    #[error("Lease query failed: {0}")]
    Lease(String),

    #[error("Lock operation failed: {0}")]
    Lock(String),
}

impl From<sqlx::Error> for LeadershipError {
    fn from(err: sqlx::Error) -> Self {
        LeadershipError::Lease(err.to_string())
    }
}

impl From<redis::RedisError> for LeadershipError {
    fn from(err: redis::RedisError) -> Self {
        LeadershipError::Lock(err.to_string())
    }
}

/// Internal request dispatch errors, caught per tick by the executor.
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("Failed to build internal request for '{path}': {reason}")]
    InvalidRequest { path: String, reason: String },

    #[error("Failed to encode request body for '{path}': {reason}")]
    BodyEncoding { path: String, reason: String },

    #[error("Internal request to '{path}' returned status {status}")]
    ErrorStatus { path: String, status: u16 },
}
