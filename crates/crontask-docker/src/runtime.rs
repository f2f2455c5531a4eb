use async_trait::async_trait;

use crate::error::Result;
use crate::types::ContainerInfo;

/// Narrow interface the engine consumes from the container runtime.
///
/// Implementations must be `Send + Sync` so one shared adapter can serve
/// the reconciler and any number of concurrent job executions. The event
/// stream is not part of the trait: it is produced once, at startup, by
/// the concrete monitor.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Return a point-in-time snapshot of the container.
    async fn inspect(&self, container_id: &str) -> Result<ContainerInfo>;

    /// Run `command` inside the container via `sh -c` and return the
    /// captured combined output.
    ///
    /// A non-zero exit code is reported as
    /// [`DockerError::TaskFailed`](crate::error::DockerError::TaskFailed),
    /// with the captured output attached.
    async fn exec(&self, container_id: &str, command: &str) -> Result<String>;
}
