// Cron trigger engine: one timer task per job, armed and disarmed as a unit

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use chrono_tz::Tz;
use cron::Schedule as CronSchedule;
use futures::future::BoxFuture;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Zero-argument tick callback, owned by the trigger for its lifetime.
pub type TickFn = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

const RUN_UNSET: u8 = 0;
const RUN_ACTIVE: u8 = 1;
const RUN_STOPPED: u8 = 2;

/// Handle to one job's cron timer.
///
/// `start` is idempotent; `stop` disarms the timer and waits for any
/// in-flight tick, so no tick callback runs after it returns. `running`
/// is unset until the first `start`.
pub struct TriggerHandle {
    name: String,
    schedule: CronSchedule,
    timezone: Tz,
    tick: TickFn,
    running: AtomicU8,
    worker: Mutex<Option<Worker>>,
}

struct Worker {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl TriggerHandle {
    pub(crate) fn new(name: String, schedule: CronSchedule, timezone: Tz, tick: TickFn) -> Self {
        Self {
            name,
            schedule,
            timezone,
            tick,
            running: AtomicU8::new(RUN_UNSET),
            worker: Mutex::new(None),
        }
    }

    /// `None` before the first start, `Some(true)` while armed,
    /// `Some(false)` after a stop.
    pub fn running(&self) -> Option<bool> {
        match self.running.load(Ordering::SeqCst) {
            RUN_ACTIVE => Some(true),
            RUN_STOPPED => Some(false),
            _ => None,
        }
    }

    /// Arm the schedule. Starting an already armed trigger is a no-op.
    pub async fn start(&self) {
        let mut slot = self.worker.lock().await;
        if slot.is_some() {
            debug!(job = %self.name, "trigger already armed");
            return;
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(run_loop(
            self.name.clone(),
            self.schedule.clone(),
            self.timezone,
            Arc::clone(&self.tick),
            shutdown_rx,
        ));
        *slot = Some(Worker {
            shutdown: shutdown_tx,
            handle,
        });
        self.running.store(RUN_ACTIVE, Ordering::SeqCst);
        debug!(job = %self.name, "trigger armed");
    }

    /// Disarm the schedule and wait for the timer task to finish.
    /// Stopping an unarmed trigger is a no-op.
    pub async fn stop(&self) {
        let mut slot = self.worker.lock().await;
        let Some(worker) = slot.take() else {
            return;
        };

        let _ = worker.shutdown.send(true);
        if let Err(e) = worker.handle.await {
            warn!(job = %self.name, error = %e, "trigger task ended abnormally");
        }
        self.running.store(RUN_STOPPED, Ordering::SeqCst);
        debug!(job = %self.name, "trigger stopped");
    }
}

/// Timer loop: compute the next fire time in the job's timezone, sleep until
/// then, run the tick, repeat. The tick is awaited before the next fire time
/// is computed, so ticks of one job never overlap.
async fn run_loop(
    name: String,
    schedule: CronSchedule,
    timezone: Tz,
    tick: TickFn,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        let now = Utc::now().with_timezone(&timezone);
        let Some(next) = schedule.after(&now).next() else {
            warn!(job = %name, "cron schedule has no upcoming fire times, trigger going idle");
            return;
        };
        let wait = (next - now).to_std().unwrap_or(Duration::ZERO);

        tokio::select! {
            _ = tokio::time::sleep(wait) => {
                debug!(job = %name, fired_at = %next, "cron tick");
                (tick)().await;
            }
            _ = shutdown.changed() => return,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use std::sync::atomic::AtomicUsize;

    fn every_second_trigger(counter: Arc<AtomicUsize>) -> TriggerHandle {
        let tick: TickFn = Arc::new(move || {
            let counter = Arc::clone(&counter);
            Box::pin(async move {
                counter.fetch_add(1, Ordering::SeqCst);
            })
        });
        TriggerHandle::new(
            "ticker".to_string(),
            CronSchedule::from_str("* * * * * *").unwrap(),
            chrono_tz::UTC,
            tick,
        )
    }

    #[tokio::test]
    async fn test_running_flag_lifecycle() {
        let trigger = every_second_trigger(Arc::new(AtomicUsize::new(0)));

        assert_eq!(trigger.running(), None);
        trigger.start().await;
        assert_eq!(trigger.running(), Some(true));
        trigger.stop().await;
        assert_eq!(trigger.running(), Some(false));
    }

    #[tokio::test]
    async fn test_start_is_idempotent() {
        let counter = Arc::new(AtomicUsize::new(0));
        let trigger = every_second_trigger(Arc::clone(&counter));

        trigger.start().await;
        trigger.start().await;
        assert_eq!(trigger.running(), Some(true));

        tokio::time::sleep(Duration::from_millis(2200)).await;
        trigger.stop().await;

        // A doubled timer would have fired roughly twice as often.
        let fired = counter.load(Ordering::SeqCst);
        assert!(fired >= 1 && fired <= 3, "fired {fired} times");
    }

    #[tokio::test]
    async fn test_no_ticks_after_stop_returns() {
        let counter = Arc::new(AtomicUsize::new(0));
        let trigger = every_second_trigger(Arc::clone(&counter));

        trigger.start().await;
        tokio::time::sleep(Duration::from_millis(1100)).await;
        trigger.stop().await;

        let after_stop = counter.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(counter.load(Ordering::SeqCst), after_stop);
    }

    #[tokio::test]
    async fn test_stop_before_start_is_noop() {
        let counter = Arc::new(AtomicUsize::new(0));
        let trigger = every_second_trigger(Arc::clone(&counter));

        trigger.stop().await;
        assert_eq!(trigger.running(), None);
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }
}
