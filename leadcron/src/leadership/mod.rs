// Distributed leadership: one client, two coordination backends

pub mod lease;
pub mod lock;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::config::LockSettings;
use crate::errors::LeadershipError;

pub use lease::PgLeaseBackend;
pub use lock::RedisLockBackend;

/// Coordination port: one leadership check against the cluster backend.
///
/// Implementations must be safe for concurrent calls; every job's trigger
/// executor shares the same backend instance.
#[async_trait]
pub trait LeadershipBackend: Send + Sync {
    async fn try_lead(&self) -> Result<bool, LeadershipError>;
}

/// Process-wide leadership client shared by all trigger executors.
///
/// Constructed once at host startup; the backend is selected by the lock
/// url scheme and never changes afterwards.
#[derive(Clone)]
pub struct LeadershipClient {
    backend: Arc<dyn LeadershipBackend>,
}

impl LeadershipClient {
    /// Connect to the coordination backend named by the lock url.
    ///
    /// `postgres*` selects the lease backend, `redis*` the lock backend.
    /// Connection failures are fatal to host startup and propagate.
    pub async fn connect(settings: &LockSettings) -> Result<Self, LeadershipError> {
        let backend: Arc<dyn LeadershipBackend> = if settings.url.starts_with("postgres") {
            info!(key = %settings.key, "connecting lease leadership backend");
            Arc::new(PgLeaseBackend::connect(settings).await?)
        } else if settings.url.starts_with("redis") {
            info!(key = %settings.key, "connecting lock leadership backend");
            Arc::new(RedisLockBackend::connect(settings).await?)
        } else {
            return Err(LeadershipError::UnsupportedBackend {
                url: settings.url.clone(),
            });
        };

        Ok(Self { backend })
    }

    /// Build a client over an already constructed backend. The scheduler
    /// takes any backend implementation, which keeps leadership injectable.
    pub fn from_backend(backend: Arc<dyn LeadershipBackend>) -> Self {
        Self { backend }
    }

    /// Whether this process is currently allowed to act as leader.
    ///
    /// Never errors: a failed coordination round degrades to "not leader"
    /// so a transient backend problem quiets the scheduler instead of
    /// crashing it.
    pub async fn is_leader(&self) -> bool {
        match self.backend.try_lead().await {
            Ok(leader) => leader,
            Err(e) => {
                warn!(error = %e, "leadership check failed, treating as not leader");
                false
            }
        }
    }
}

impl std::fmt::Debug for LeadershipClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LeadershipClient").finish_non_exhaustive()
    }
}

/// Log helper for backends: record a leadership round at debug level.
pub(crate) fn trace_round(backend: &str, key: &str, leader: bool) {
    debug!(backend, key, leader, "leadership round");
}
