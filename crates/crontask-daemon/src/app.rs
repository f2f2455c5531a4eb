//! Lifecycle coordinator: starts every component, distributes
//! cancellation, and drains them on shutdown.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use crontask_core::config::EVENT_CHANNEL_CAPACITY;
use crontask_core::Config;
use crontask_docker::{ContainerEvent, ContainerRuntime, DockerMonitor};
use crontask_engine::{JobSnapshot, Reconciler, Registry};
use crontask_scheduler::Dispatcher;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, trace, warn};

use crate::shutdown::ShutdownManager;
use crate::signals;

pub struct App {
    config: Config,
}

impl App {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Run until a termination signal arrives, then drain everything
    /// under the configured deadline.
    ///
    /// Errors returned here map to exit code 1: a failed runtime
    /// connection at startup, or a blown shutdown deadline.
    pub async fn run(self) -> anyhow::Result<()> {
        info!(
            app = %self.config.app_name,
            environment = %self.config.environment,
            "starting application"
        );
        info!(
            interval = self.config.worker.interval,
            max_jobs = self.config.worker.max_jobs,
            retry_attempts = self.config.worker.retry_attempts,
            "worker settings loaded"
        );

        if !self.config.docker.enabled {
            info!("container monitoring disabled, running with zero jobs");
            signals::shutdown_signal()
                .await
                .context("failed to install signal handlers")?;
            info!("application shutdown complete");
            return Ok(());
        }

        // fatal at startup when every candidate endpoint fails
        let monitor = Arc::new(
            DockerMonitor::connect(&self.config.docker)
                .await
                .context("failed to connect to the container runtime")?,
        );

        let registry = Registry::new();
        let dispatcher = Dispatcher::new();
        let (events_tx, events_rx) = mpsc::channel::<ContainerEvent>(EVENT_CHANNEL_CAPACITY);
        let (cancel_tx, cancel_rx) = watch::channel(false);

        // event pump: scan + live stream; drops events_tx on exit, which
        // closes the reconciler's channel and lets it drain
        let monitor_handle = {
            let monitor = Arc::clone(&monitor);
            tokio::spawn(async move { monitor.run(events_tx, cancel_rx).await })
        };

        let reconciler = Reconciler::new(
            Arc::clone(&registry),
            Arc::clone(&dispatcher),
            Arc::clone(&monitor) as Arc<dyn ContainerRuntime>,
            self.config.docker.label_prefix.clone(),
        );
        let reconciler_handle = tokio::spawn(reconciler.run(events_rx));

        dispatcher.start();

        // periodic status readout; the cadence comes from worker.interval
        {
            let registry = Arc::clone(&registry);
            let dispatcher = Arc::clone(&dispatcher);
            let mut cancel_rx = cancel_tx.subscribe();
            let period = Duration::from_secs(self.config.worker.interval.max(1));
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(period);
                loop {
                    tokio::select! {
                        _ = ticker.tick() => log_status(&registry, &dispatcher),
                        _ = cancel_rx.changed() => {
                            if *cancel_rx.borrow() {
                                break;
                            }
                        }
                    }
                }
            });
        }

        signals::shutdown_signal()
            .await
            .context("failed to install signal handlers")?;

        // shutdown sequence: broadcast cancellation first, then stop
        // components in dependency order under the drain deadline
        let _ = cancel_tx.send(true);

        let mut manager = ShutdownManager::new(self.config.shutdown.deadline());
        {
            let dispatcher = Arc::clone(&dispatcher);
            manager.register_task("dispatcher", async move {
                dispatcher.stop().await;
                Ok(())
            });
        }
        manager.register_task("event stream", async move {
            monitor_handle.await.context("monitor task panicked")
        });
        {
            let registry = Arc::clone(&registry);
            manager.register_task("reconciler", async move {
                reconciler_handle.await.context("reconciler task panicked")?;
                info!(jobs = registry.count(), "reconciler drained");
                Ok(())
            });
        }
        manager.register_task("runtime client", async move {
            drop(monitor);
            Ok(())
        });

        manager.execute().await?;
        info!("application shutdown complete");
        Ok(())
    }
}

/// Emit one scheduler status readout: counts at debug, the full snapshot
/// list as JSON at trace.
fn log_status(registry: &Registry, dispatcher: &Dispatcher) {
    let snapshots: Vec<JobSnapshot> = registry.all().iter().map(|job| job.snapshot()).collect();
    debug!(
        jobs = snapshots.len(),
        entries = dispatcher.entry_count(),
        "scheduler status"
    );
    if snapshots.is_empty() {
        return;
    }
    match serde_json::to_string(&snapshots) {
        Ok(json) => trace!(jobs = %json, "registered job snapshots"),
        Err(e) => warn!(error = %e, "failed to serialize job snapshots"),
    }
}
