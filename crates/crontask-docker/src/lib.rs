//! `crontask-docker` — the container runtime adapter.
//!
//! Exposes a uniform view of the local container runtime: a lifecycle event
//! stream (with a synthetic cold-start scan), container inspection, and
//! in-container command execution. The bollard client is confined to this
//! crate; everything downstream consumes the [`runtime::ContainerRuntime`]
//! trait and the types in [`types`].
//!
//! Label extraction also lives here: a container declares cron tasks with
//! labels of the form
//!
//! ```text
//! <prefix>cronjob('<SCHEDULE>').task = <COMMAND>
//! ```

pub mod client;
pub mod error;
pub mod labels;
pub mod monitor;
pub mod runtime;
pub mod types;

pub use error::{DockerError, Result};
pub use monitor::DockerMonitor;
pub use runtime::ContainerRuntime;
pub use types::{ContainerEvent, ContainerInfo, CronTask, EventAction};
