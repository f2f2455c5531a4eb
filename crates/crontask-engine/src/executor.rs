//! Runs one fired job inside its target container and records the outcome.

use chrono::Utc;
use crontask_docker::{ContainerRuntime, DockerError};
use crontask_scheduler::Dispatcher;
use tracing::{debug, error, info};

use crate::registry::Registry;

/// Execute the job registered under `job_id`, if it still exists.
///
/// At most once per tick per job, no retry, no queuing. Overlapping runs
/// of the same job are permitted — the in-container exec already bounds
/// resource use.
pub async fn execute(
    registry: &Registry,
    dispatcher: &Dispatcher,
    runtime: &dyn ContainerRuntime,
    job_id: &str,
) {
    let Some(job) = registry.get(job_id) else {
        debug!(job_id, "fired entry refers to a job that is no longer registered");
        return;
    };

    job.mark_started(Utc::now());
    if let Some(next) = dispatcher.next_fire(job.entry_id) {
        job.set_next_run(next);
    }

    info!(
        job_id = %job.id,
        container = job.short_container_id(),
        "executing job"
    );

    match runtime.exec(&job.container_id, &job.command).await {
        Ok(output) => {
            let output = output.trim();
            if output.is_empty() {
                info!(
                    job_id = %job.id,
                    container = job.short_container_id(),
                    "job completed"
                );
            } else {
                info!(
                    job_id = %job.id,
                    container = job.short_container_id(),
                    output,
                    "job completed"
                );
            }
        }
        Err(DockerError::TaskFailed { exit_code, output }) => {
            error!(
                job_id = %job.id,
                container = job.short_container_id(),
                exit_code,
                output = %output.trim(),
                "job failed"
            );
        }
        Err(e) => {
            error!(
                job_id = %job.id,
                container = job.short_container_id(),
                error = %e,
                "job execution error"
            );
        }
    }
}
