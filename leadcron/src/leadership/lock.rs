// Lock leadership backend: Redis mutual exclusion with a deferred release

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::LockSettings;
use crate::errors::LeadershipError;
use crate::leadership::{trace_round, LeadershipBackend};

/// How long an acquired lock is held before the deferred release runs.
/// Long enough for the current tick's action to start, short enough that
/// rapid polling across the cluster does not starve other members.
const RELEASE_GRACE: Duration = Duration::from_millis(1500);

/// Mutual-exclusion backend. Each leadership round is a single
/// `SET key token NX PX ttl` attempt with zero retries; a successful
/// acquisition schedules its own release after [`RELEASE_GRACE`].
///
/// Held-token bookkeeping is process-global: when an acquisition fails but
/// this process still holds a live token from a previous round (another
/// job's tick inside the grace window), the round still counts as leader.
pub struct RedisLockBackend {
    conn: ConnectionManager,
    key: String,
    ttl_ms: u64,
    held: Arc<Mutex<HashSet<String>>>,
}

impl RedisLockBackend {
    pub async fn connect(settings: &LockSettings) -> Result<Self, LeadershipError> {
        let client = redis::Client::open(settings.url.as_str())
            .map_err(|e| LeadershipError::ConnectionFailed(e.to_string()))?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| LeadershipError::ConnectionFailed(e.to_string()))?;

        info!(key = %settings.key, ttl_ms = settings.ttl_ms, "lock backend connected");

        Ok(Self {
            conn,
            key: settings.key.clone(),
            ttl_ms: settings.ttl_ms,
            held: Arc::new(Mutex::new(HashSet::new())),
        })
    }

    fn schedule_release(&self, token: String) {
        let conn = self.conn.clone();
        let key = self.key.clone();
        let held = Arc::clone(&self.held);

        tokio::spawn(async move {
            tokio::time::sleep(RELEASE_GRACE).await;
            if let Err(e) = release(conn, &key, &token).await {
                // Release problems (e.g. the lock already expired) are
                // logged only; the TTL guarantees the key comes free.
                warn!(key = %key, error = %e, "deferred lock release failed");
            }
            held.lock().await.remove(&token);
        });
    }
}

#[async_trait]
impl LeadershipBackend for RedisLockBackend {
    async fn try_lead(&self) -> Result<bool, LeadershipError> {
        let token = Uuid::new_v4().to_string();
        let mut conn = self.conn.clone();

        // SET NX PX: atomically take the lock if free, with expiration.
        let acquired: Option<String> = redis::cmd("SET")
            .arg(&self.key)
            .arg(&token)
            .arg("NX")
            .arg("PX")
            .arg(self.ttl_ms)
            .query_async(&mut conn)
            .await?;

        let leader = if acquired.is_some() {
            self.held.lock().await.insert(token.clone());
            self.schedule_release(token);
            true
        } else {
            // Lock already held. Mid-grace-window tokens of our own mean
            // this process is still the leader for this round.
            !self.held.lock().await.is_empty()
        };

        trace_round("lock", &self.key, leader);
        Ok(leader)
    }
}

/// Delete the lock only if it still carries our token.
async fn release(
    mut conn: ConnectionManager,
    key: &str,
    token: &str,
) -> Result<(), LeadershipError> {
    let script = r#"
        if redis.call("get", KEYS[1]) == ARGV[1] then
            return redis.call("del", KEYS[1])
        else
            return 0
        end
    "#;

    let deleted: i32 = redis::Script::new(script)
        .key(key)
        .arg(token)
        .invoke_async(&mut conn)
        .await?;

    if deleted == 1 {
        debug!(key = %key, "lock released");
    } else {
        warn!(key = %key, "lock was not owned or already expired");
    }

    Ok(())
}
