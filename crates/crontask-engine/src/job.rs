use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, TimeZone, Utc};
use crontask_docker::types::{short_id, CronTask};
use crontask_scheduler::EntryId;
use serde::Serialize;

/// A live scheduled task, owned by the registry and shared (via `Arc`)
/// with the dispatcher callback that fires it.
///
/// Everything except the two time cells is immutable after admission; in
/// particular the command never changes — re-declaring a task means full
/// unregister plus re-register. `last_run`/`next_run` are advisory
/// observability fields updated lock-free; torn reads are acceptable.
#[derive(Debug)]
pub struct Job {
    /// `<short-container-id>-<derived-name>`; unique within the registry.
    pub id: String,
    /// Full id of the target container.
    pub container_id: String,
    pub container_name: String,
    /// Verbatim schedule text from the declaring label.
    pub cron_expr: String,
    /// Passed to `sh -c` inside the container, exactly as declared.
    pub command: String,
    /// The label that declared this job, kept for traceability.
    pub label_key: String,
    /// Live dispatcher entry backing this job.
    pub entry_id: EntryId,
    /// Epoch milliseconds; 0 means never ran.
    last_run_ms: AtomicI64,
    /// Epoch milliseconds of the next planned firing, as last computed.
    next_run_ms: AtomicI64,
}

/// Build a job id from the container short-id and a derived name.
pub fn job_id(container_id: &str, name: &str) -> String {
    format!("{}-{}", short_id(container_id), name)
}

impl Job {
    pub fn new(task: &CronTask, name: &str, entry_id: EntryId, first_run: DateTime<Utc>) -> Self {
        Self {
            id: job_id(&task.container_id, name),
            container_id: task.container_id.clone(),
            container_name: task.container_name.clone(),
            cron_expr: task.cron_expr.clone(),
            command: task.command.clone(),
            label_key: task.label_key.clone(),
            entry_id,
            last_run_ms: AtomicI64::new(0),
            next_run_ms: AtomicI64::new(first_run.timestamp_millis()),
        }
    }

    pub fn short_container_id(&self) -> &str {
        short_id(&self.container_id)
    }

    /// Stamp the start of an execution. Called by the executor before the
    /// exec call goes out.
    pub fn mark_started(&self, at: DateTime<Utc>) {
        self.last_run_ms.store(at.timestamp_millis(), Ordering::Relaxed);
    }

    pub fn last_run(&self) -> Option<DateTime<Utc>> {
        millis_to_datetime(self.last_run_ms.load(Ordering::Relaxed))
    }

    pub fn set_next_run(&self, at: DateTime<Utc>) {
        self.next_run_ms.store(at.timestamp_millis(), Ordering::Relaxed);
    }

    pub fn next_run(&self) -> Option<DateTime<Utc>> {
        millis_to_datetime(self.next_run_ms.load(Ordering::Relaxed))
    }

    /// Point-in-time view for observability readouts.
    pub fn snapshot(&self) -> JobSnapshot {
        JobSnapshot {
            id: self.id.clone(),
            container_id: self.short_container_id().to_string(),
            container_name: self.container_name.clone(),
            cron_expr: self.cron_expr.clone(),
            command: self.command.clone(),
            last_run: self.last_run(),
            next_run: self.next_run(),
        }
    }
}

fn millis_to_datetime(ms: i64) -> Option<DateTime<Utc>> {
    if ms == 0 {
        return None;
    }
    Utc.timestamp_millis_opt(ms).single()
}

/// Serializable view of one job.
#[derive(Debug, Clone, Serialize)]
pub struct JobSnapshot {
    pub id: String,
    /// Short form; full ids stay inside the registry.
    pub container_id: String,
    pub container_name: String,
    pub cron_expr: String,
    pub command: String,
    pub last_run: Option<DateTime<Utc>>,
    pub next_run: Option<DateTime<Utc>>,
}
