//! `crontask-core` — configuration loading and the daemon-level error type.
//!
//! Configuration comes from a TOML file (`crontaskd.toml`, searched in the
//! working directory, the user config directory, and the platform system
//! directory) merged with `CRONTASK_*` environment overrides.

pub mod config;
pub mod error;

pub use config::{Config, DockerConfig, ShutdownConfig, WorkerConfig};
pub use error::{CoreError, Result};
