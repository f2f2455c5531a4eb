//! `DockerMonitor` — event stream, inspection, and in-container execution.
//!
//! One monitor instance is shared (behind `Arc`) between the event pump
//! and job executions; the underlying client is immutable after
//! construction and thread-safe per bollard's contract.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use bollard::container::{InspectContainerOptions, ListContainersOptions};
use bollard::exec::{CreateExecOptions, StartExecOptions, StartExecResults};
use bollard::system::EventsOptions;
use bollard::Docker;
use crontask_core::DockerConfig;
use futures_util::StreamExt;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, warn};

use crate::client;
use crate::error::{DockerError, Result};
use crate::runtime::ContainerRuntime;
use crate::types::{
    parse_created_timestamp, short_id, ContainerEvent, ContainerInfo, EventAction,
};

/// Grace period between a lifecycle event and the inspect that snapshots
/// it, letting the runtime finish applying labels to fresh containers.
const EVENT_SETTLE_DELAY: Duration = Duration::from_millis(500);

/// Cap on captured exec output (combined stdout + stderr).
const EXEC_OUTPUT_CAP: usize = 4096;

/// Real (non-synthetic) actions the event subscription is filtered to.
const WATCHED_ACTIONS: [&str; 5] = ["create", "start", "update", "die", "destroy"];

pub struct DockerMonitor {
    client: Docker,
}

impl DockerMonitor {
    /// Connect to the runtime and wrap the client.
    ///
    /// Fails with [`DockerError::RuntimeUnavailable`] when no candidate
    /// endpoint answers; this is fatal at startup.
    pub async fn connect(config: &DockerConfig) -> Result<Self> {
        let client = client::connect(config).await?;
        Ok(Self { client })
    }

    /// Pump container events into `events_tx` until cancellation or
    /// transport loss.
    ///
    /// Starts with a synthetic `scan` event per currently known container
    /// (running or not) so the consumer converges without special-casing
    /// cold start. The send blocks when the channel is full — acceptable,
    /// since the runtime's event stream provides its own backpressure.
    pub async fn run(
        &self,
        events_tx: mpsc::Sender<ContainerEvent>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        debug!("starting container monitor");

        if let Err(e) = self.scan_existing(&events_tx).await {
            error!(error = %e, "failed to scan existing containers");
        }

        let mut filters = HashMap::new();
        filters.insert("type", vec!["container"]);
        filters.insert("event", WATCHED_ACTIONS.to_vec());
        let mut events = self.client.events(Some(EventsOptions::<&str> {
            filters,
            ..Default::default()
        }));

        loop {
            tokio::select! {
                maybe_event = events.next() => match maybe_event {
                    Some(Ok(message)) => {
                        let action = message.action.as_deref().unwrap_or_default().to_string();
                        let container_id = message
                            .actor
                            .and_then(|actor| actor.id)
                            .unwrap_or_default();
                        if container_id.is_empty() {
                            continue;
                        }
                        self.handle_event(&action, container_id, &events_tx).await;
                    }
                    Some(Err(e)) => {
                        error!(error = %e, "container event stream error");
                        break;
                    }
                    None => {
                        warn!("container event stream closed by the runtime");
                        break;
                    }
                },
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        debug!("container monitor stopping");
                        break;
                    }
                }
            }
        }
    }

    /// Emit one synthetic `scan` event per existing container.
    async fn scan_existing(&self, events_tx: &mpsc::Sender<ContainerEvent>) -> Result<()> {
        let containers = self
            .client
            .list_containers(Some(ListContainersOptions::<String> {
                all: true,
                ..Default::default()
            }))
            .await?;

        for summary in containers {
            let Some(id) = summary.id else { continue };
            let container = match self.inspect_container(&id).await {
                Ok(info) => info,
                Err(e) => {
                    error!(container = short_id(&id), error = %e, "failed to inspect container during scan");
                    continue;
                }
            };
            let event = ContainerEvent {
                action: EventAction::Scan,
                container_id: id,
                container,
            };
            if events_tx.send(event).await.is_err() {
                break;
            }
        }

        Ok(())
    }

    /// Snapshot one live event and forward it.
    ///
    /// Sleeps [`EVENT_SETTLE_DELAY`] first so an immediate inspect does not
    /// race labels still being applied. An inspect failure drops the event
    /// with a warning — the container's next lifecycle event re-converges.
    async fn handle_event(
        &self,
        action: &str,
        container_id: String,
        events_tx: &mpsc::Sender<ContainerEvent>,
    ) {
        let Ok(action) = action.parse::<EventAction>() else {
            debug!(action, "ignoring unwatched container event action");
            return;
        };

        tokio::time::sleep(EVENT_SETTLE_DELAY).await;

        let container = match self.inspect_container(&container_id).await {
            Ok(info) => info,
            Err(e) => {
                warn!(
                    action = %action,
                    container = short_id(&container_id),
                    error = %e,
                    "failed to inspect container after event, dropping it"
                );
                return;
            }
        };

        let event = ContainerEvent {
            action,
            container_id,
            container,
        };
        if events_tx.send(event).await.is_err() {
            debug!("event channel closed, discarding container event");
        }
    }

    async fn inspect_container(&self, container_id: &str) -> Result<ContainerInfo> {
        let response = self
            .client
            .inspect_container(container_id, None::<InspectContainerOptions>)
            .await
            .map_err(|e| match e {
                bollard::errors::Error::DockerResponseServerError {
                    status_code: 404, ..
                } => DockerError::NotFound {
                    id: container_id.to_string(),
                },
                other => DockerError::Transport(other),
            })?;

        let id = response.id.unwrap_or_else(|| container_id.to_string());
        let created = response
            .created
            .as_deref()
            .map(|raw| parse_created_timestamp(&id, raw))
            .unwrap_or_else(chrono::Utc::now);
        let state = response
            .state
            .and_then(|s| s.status)
            .map(|status| status.to_string())
            .unwrap_or_default();
        let config = response.config.unwrap_or_default();

        Ok(ContainerInfo {
            name: response
                .name
                .unwrap_or_default()
                .trim_start_matches('/')
                .to_string(),
            state,
            image: config.image.unwrap_or_default(),
            labels: config.labels.unwrap_or_default(),
            created,
            id,
        })
    }

    async fn exec_task(&self, container_id: &str, command: &str) -> Result<String> {
        let exec = self
            .client
            .create_exec(
                container_id,
                CreateExecOptions {
                    cmd: Some(vec!["sh", "-c", command]),
                    attach_stdout: Some(true),
                    attach_stderr: Some(true),
                    ..Default::default()
                },
            )
            .await?;

        let mut captured: Vec<u8> = Vec::new();
        match self
            .client
            .start_exec(&exec.id, None::<StartExecOptions>)
            .await?
        {
            StartExecResults::Attached { mut output, .. } => {
                while let Some(chunk) = output.next().await {
                    match chunk {
                        Ok(log) => {
                            let bytes = log.into_bytes();
                            let remaining = EXEC_OUTPUT_CAP - captured.len();
                            if bytes.len() > remaining {
                                captured.extend_from_slice(&bytes[..remaining]);
                                warn!(
                                    container = short_id(container_id),
                                    cap = EXEC_OUTPUT_CAP,
                                    "exec output truncated at capture cap"
                                );
                                break;
                            }
                            captured.extend_from_slice(&bytes);
                        }
                        Err(e) => return Err(DockerError::ExecIo(e.to_string())),
                    }
                }
            }
            StartExecResults::Detached => {}
        }

        let output = String::from_utf8_lossy(&captured).into_owned();

        let inspect = self.client.inspect_exec(&exec.id).await?;
        let exit_code = inspect.exit_code.unwrap_or(0);
        if exit_code != 0 {
            return Err(DockerError::TaskFailed { exit_code, output });
        }

        Ok(output)
    }
}

#[async_trait]
impl ContainerRuntime for DockerMonitor {
    async fn inspect(&self, container_id: &str) -> Result<ContainerInfo> {
        self.inspect_container(container_id).await
    }

    async fn exec(&self, container_id: &str, command: &str) -> Result<String> {
        debug!(
            container = short_id(container_id),
            command, "executing task in container"
        );
        self.exec_task(container_id, command).await
    }
}
