//! The serial event consumer that keeps registry and dispatcher in sync
//! with observed container state.

use std::sync::Arc;

use crontask_docker::labels::extract_cron_tasks;
use crontask_docker::types::{short_id, ContainerEvent, ContainerInfo, EventAction};
use crontask_docker::ContainerRuntime;
use crontask_scheduler::{Dispatcher, JobCallback};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::executor;
use crate::job::Job;
use crate::registry::Registry;

pub struct Reconciler {
    registry: Arc<Registry>,
    dispatcher: Arc<Dispatcher>,
    runtime: Arc<dyn ContainerRuntime>,
    label_prefix: String,
}

impl Reconciler {
    pub fn new(
        registry: Arc<Registry>,
        dispatcher: Arc<Dispatcher>,
        runtime: Arc<dyn ContainerRuntime>,
        label_prefix: String,
    ) -> Self {
        Self {
            registry,
            dispatcher,
            runtime,
            label_prefix,
        }
    }

    /// Consume events until the channel closes.
    ///
    /// This is the only writer to the registry and the dispatcher entry
    /// set. The channel closes when the monitor drops its sender on
    /// cancellation; anything already buffered is still drained, so
    /// awaiting this task *is* the shutdown drain step.
    pub async fn run(self, mut events_rx: mpsc::Receiver<ContainerEvent>) {
        info!("reconciler started");
        while let Some(event) = events_rx.recv().await {
            self.process_event(event);
        }
        info!("reconciler drained and stopped");
    }

    /// One serial reconciliation step.
    fn process_event(&self, event: ContainerEvent) {
        debug!(
            action = %event.action,
            container = short_id(&event.container_id),
            state = %event.container.state,
            "processing container event"
        );
        match event.action {
            EventAction::Scan | EventAction::Create | EventAction::Start | EventAction::Update => {
                if event.container.is_running() {
                    self.register_container_jobs(&event.container);
                }
                // non-running snapshots are left alone: previously
                // registered jobs survive until a terminal event arrives
            }
            EventAction::Die | EventAction::Destroy => {
                self.unregister_container_jobs(&event.container_id);
            }
        }
    }

    /// Full re-register: drop whatever this container owned, then admit a
    /// fresh job per valid cron label. Labels may have changed since the
    /// last event; replacing everything converges without label diffing.
    fn register_container_jobs(&self, container: &ContainerInfo) {
        self.unregister_container_jobs(&container.id);

        let mut tasks = extract_cron_tasks(container, &self.label_prefix);
        // labels arrive unordered; sort by key so derived names are stable
        tasks.sort_by(|a, b| a.label_key.cmp(&b.label_key));

        for (index, task) in tasks.iter().enumerate() {
            let name = if index == 0 {
                container.name.clone()
            } else {
                format!("{}-{}", container.name, index + 1)
            };

            let job_id = crate::job::job_id(&container.id, &name);
            let callback = self.fire_callback(job_id);

            let (entry_id, first_run) = match self.dispatcher.schedule(&task.cron_expr, callback) {
                Ok(scheduled) => scheduled,
                Err(e) => {
                    warn!(
                        container = container.short_id(),
                        label = %task.label_key,
                        error = %e,
                        "failed to schedule job"
                    );
                    continue;
                }
            };

            let job = Arc::new(Job::new(task, &name, entry_id, first_run));
            if !self.registry.add(Arc::clone(&job)) {
                // first wins; roll back the entry we just created
                self.dispatcher.unschedule(entry_id);
                warn!(job_id = %job.id, "job id already registered, keeping the first");
                continue;
            }

            info!(
                job_id = %job.id,
                container = container.short_id(),
                name = %container.name,
                cron = %task.cron_expr,
                command = %task.command,
                "job registered"
            );
        }
    }

    fn unregister_container_jobs(&self, container_id: &str) {
        for job in self.registry.remove_by_container(container_id) {
            self.dispatcher.unschedule(job.entry_id);
            info!(
                job_id = %job.id,
                container = short_id(container_id),
                "job unregistered"
            );
        }
    }

    /// Build the dispatcher callback for a job.
    ///
    /// The closure captures only the job id and resolves the *current* job
    /// from the registry at fire time — jobs may have been replaced by a
    /// re-register between scheduling and firing.
    fn fire_callback(&self, job_id: String) -> JobCallback {
        let registry = Arc::clone(&self.registry);
        let dispatcher = Arc::clone(&self.dispatcher);
        let runtime = Arc::clone(&self.runtime);
        Arc::new(move || {
            let registry = Arc::clone(&registry);
            let dispatcher = Arc::clone(&dispatcher);
            let runtime = Arc::clone(&runtime);
            let job_id = job_id.clone();
            Box::pin(async move {
                executor::execute(&registry, &dispatcher, runtime.as_ref(), &job_id).await;
            })
        })
    }
}
