//! The dispatcher proper: entry bookkeeping plus the 1 s tick loop.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use croner::Cron;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::error::{Result, SchedulerError};
use crate::schedule::{next_occurrence, parse_cron};

/// Opaque handle to a scheduled entry. Valid until `unschedule`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntryId(u64);

impl std::fmt::Display for EntryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Work dispatched when an entry fires. Each firing runs on its own task,
/// so a slow callback never delays other entries.
pub type JobCallback = Arc<dyn Fn() -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

struct Entry {
    schedule: Cron,
    expr: String,
    next: DateTime<Utc>,
    callback: JobCallback,
}

/// Time-keyed scheduler with second resolution.
///
/// Internally synchronized: `schedule` and `unschedule` may be called
/// concurrently with the tick loop and with each other.
pub struct Dispatcher {
    entries: Mutex<HashMap<EntryId, Entry>>,
    next_id: AtomicU64,
    running: Mutex<Option<(watch::Sender<bool>, JoinHandle<()>)>>,
}

impl Dispatcher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            entries: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            running: Mutex::new(None),
        })
    }

    /// Validate `expr`, register the entry, and return its handle together
    /// with the first fire time.
    pub fn schedule(&self, expr: &str, callback: JobCallback) -> Result<(EntryId, DateTime<Utc>)> {
        let schedule = parse_cron(expr)?;
        let next = next_occurrence(&schedule, Utc::now()).ok_or_else(|| {
            SchedulerError::NoFutureOccurrence {
                expr: expr.to_string(),
            }
        })?;

        let id = EntryId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.entries.lock().unwrap().insert(
            id,
            Entry {
                schedule,
                expr: expr.to_string(),
                next,
                callback,
            },
        );
        debug!(entry_id = %id, cron = expr, next_run = %next, "entry scheduled");
        Ok((id, next))
    }

    /// Remove an entry. Idempotent: unknown handles are a no-op.
    pub fn unschedule(&self, id: EntryId) {
        if self.entries.lock().unwrap().remove(&id).is_some() {
            debug!(entry_id = %id, "entry unscheduled");
        }
    }

    /// Next fire time of a live entry, if the handle is still valid.
    pub fn next_fire(&self, id: EntryId) -> Option<DateTime<Utc>> {
        self.entries.lock().unwrap().get(&id).map(|e| e.next)
    }

    pub fn entry_count(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    /// Spawn the tick loop. Calling `start` on an already started
    /// dispatcher is a no-op.
    pub fn start(self: &Arc<Self>) {
        let mut running = self.running.lock().unwrap();
        if running.is_some() {
            return;
        }
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let dispatcher = Arc::clone(self);
        let handle = tokio::spawn(async move { dispatcher.run_loop(shutdown_rx).await });
        *running = Some((shutdown_tx, handle));
    }

    /// Stop the tick loop.
    ///
    /// Blocks until no callback is in its dispatch phase; already spawned
    /// callbacks keep running to completion on their own tasks.
    pub async fn stop(&self) {
        let taken = self.running.lock().unwrap().take();
        if let Some((shutdown_tx, handle)) = taken {
            let _ = shutdown_tx.send(true);
            if handle.await.is_err() {
                warn!("dispatcher loop task panicked during stop");
            }
        }
    }

    /// Main loop. Ticks every second until `shutdown` broadcasts `true`.
    async fn run_loop(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        info!("cron dispatcher started");
        let mut ticker = tokio::time::interval(std::time::Duration::from_secs(1));
        // a paused scheduler skips missed instants instead of replaying them
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => self.fire_due(),
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("cron dispatcher stopping");
                        break;
                    }
                }
            }
        }
    }

    /// Dispatch every entry whose fire time has arrived, then recompute
    /// its next occurrence from now.
    fn fire_due(&self) {
        let now = Utc::now();
        let mut due: Vec<(EntryId, JobCallback)> = Vec::new();
        let mut exhausted: Vec<EntryId> = Vec::new();

        {
            let mut entries = self.entries.lock().unwrap();
            for (id, entry) in entries.iter_mut() {
                if entry.next > now {
                    continue;
                }
                due.push((*id, Arc::clone(&entry.callback)));
                match next_occurrence(&entry.schedule, now) {
                    Some(next) => entry.next = next,
                    None => {
                        warn!(entry_id = %id, cron = %entry.expr, "schedule exhausted, removing entry");
                        exhausted.push(*id);
                    }
                }
            }
            for id in exhausted {
                entries.remove(&id);
            }
        }

        for (id, callback) in due {
            debug!(entry_id = %id, "dispatching due entry");
            tokio::spawn(callback());
        }
    }
}
