use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{CoreError, Result};

/// Capacity of the container event channel. The producer blocks when the
/// channel is full; the runtime's own event stream provides backpressure.
pub const EVENT_CHANNEL_CAPACITY: usize = 100;

/// Top-level config (`crontaskd.toml` + `CRONTASK_*` env overrides).
///
/// Env keys use `__` as the section separator, e.g.
/// `CRONTASK_DOCKER__LABEL_PREFIX=myapp.`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_app_name")]
    pub app_name: String,
    #[serde(default = "default_environment")]
    pub environment: String,
    /// Seeds the tracing `EnvFilter`; `RUST_LOG` still wins when set.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub worker: WorkerConfig,
    #[serde(default)]
    pub docker: DockerConfig,
    #[serde(default)]
    pub shutdown: ShutdownConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            app_name: default_app_name(),
            environment: default_environment(),
            log_level: default_log_level(),
            worker: WorkerConfig::default(),
            docker: DockerConfig::default(),
            shutdown: ShutdownConfig::default(),
        }
    }
}

/// Worker tuning knobs. The scheduler is label-driven, so these are
/// advisory: they are loaded and logged but do not gate scheduling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Seconds between housekeeping passes.
    #[serde(default = "default_worker_interval")]
    pub interval: u64,
    #[serde(default = "default_worker_max_jobs")]
    pub max_jobs: usize,
    #[serde(default = "default_worker_retry_attempts")]
    pub retry_attempts: u32,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            interval: default_worker_interval(),
            max_jobs: default_worker_max_jobs(),
            retry_attempts: default_worker_retry_attempts(),
        }
    }
}

/// Container runtime settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DockerConfig {
    /// When false, the daemon runs with zero jobs and never touches the
    /// runtime socket.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Explicit runtime endpoint. Empty means platform default plus the
    /// fallback candidate walk.
    #[serde(default)]
    pub socket_path: String,
    /// Seconds; advisory.
    #[serde(default = "default_poll_interval")]
    pub poll_interval: u64,
    /// Prefix that marks a label as a cron task declaration.
    #[serde(default = "default_label_prefix")]
    pub label_prefix: String,
}

impl Default for DockerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            socket_path: String::new(),
            poll_interval: default_poll_interval(),
            label_prefix: default_label_prefix(),
        }
    }
}

/// Shutdown coordinator settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShutdownConfig {
    /// Seconds the coordinator waits for shutdown tasks before giving up.
    #[serde(default = "default_shutdown_timeout")]
    pub timeout: u64,
}

impl ShutdownConfig {
    pub fn deadline(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            timeout: default_shutdown_timeout(),
        }
    }
}

fn default_app_name() -> String {
    "CronTask".to_string()
}
fn default_environment() -> String {
    "development".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_worker_interval() -> u64 {
    5
}
fn default_worker_max_jobs() -> usize {
    10
}
fn default_worker_retry_attempts() -> u32 {
    3
}
fn default_true() -> bool {
    true
}
fn default_poll_interval() -> u64 {
    5
}
fn default_label_prefix() -> String {
    "crontask.".to_string()
}
fn default_shutdown_timeout() -> u64 {
    30
}

impl Config {
    /// Load config from a TOML file with `CRONTASK_*` env var overrides.
    ///
    /// File resolution order:
    ///   1. Explicit path argument
    ///   2. `./crontaskd.toml`
    ///   3. `~/.config/crontask/crontaskd.toml`
    ///   4. System config directory (`/etc/crontask` on Unix-likes)
    ///
    /// A missing file is not an error; defaults apply.
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut figment = Figment::new();

        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        } else if let Some(found) = find_config_file() {
            debug!(path = %found.display(), "using config file");
            figment = figment.merge(Toml::file(found));
        }

        figment
            .merge(Env::prefixed("CRONTASK_").split("__"))
            .extract()
            .map_err(|e| CoreError::Config(e.to_string()))
    }

    /// Write a commented default config file to `path`.
    ///
    /// Refuses to overwrite an existing file.
    pub fn write_default(path: &Path) -> Result<()> {
        if path.exists() {
            return Err(CoreError::ConfigExists(path.display().to_string()));
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, DEFAULT_CONFIG_TOML)?;
        Ok(())
    }
}

/// Return the first existing config file from the search paths.
fn find_config_file() -> Option<PathBuf> {
    config_search_paths().into_iter().find(|p| p.is_file())
}

fn config_search_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from("crontaskd.toml")];
    if let Ok(home) = std::env::var("HOME") {
        paths.push(
            Path::new(&home)
                .join(".config")
                .join("crontask")
                .join("crontaskd.toml"),
        );
    }
    paths.push(system_config_dir().join("crontaskd.toml"));
    paths
}

/// OS-specific system-wide configuration directory.
fn system_config_dir() -> PathBuf {
    if cfg!(windows) {
        let program_data =
            std::env::var("PROGRAMDATA").unwrap_or_else(|_| "C:\\ProgramData".to_string());
        Path::new(&program_data).join("crontask")
    } else if cfg!(target_os = "macos") {
        PathBuf::from("/Library/Application Support/crontask")
    } else {
        PathBuf::from("/etc/crontask")
    }
}

const DEFAULT_CONFIG_TOML: &str = r#"# crontaskd configuration file

app_name = "CronTask"
environment = "production"
log_level = "info"

[worker]
interval = 10
max_jobs = 50
retry_attempts = 5

[docker]
enabled = true
# Empty means: platform default socket plus fallback candidates.
socket_path = ""
poll_interval = 5
label_prefix = "crontask."

[shutdown]
timeout = 30
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = Config::default();
        assert_eq!(cfg.app_name, "CronTask");
        assert_eq!(cfg.log_level, "info");
        assert!(cfg.docker.enabled);
        assert!(cfg.docker.socket_path.is_empty());
        assert_eq!(cfg.docker.label_prefix, "crontask.");
        assert_eq!(cfg.shutdown.timeout, 30);
        assert_eq!(cfg.shutdown.deadline(), Duration::from_secs(30));
        assert_eq!(cfg.worker.max_jobs, 10);
    }

    #[test]
    fn loads_toml_file_with_env_override() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "crontaskd.toml",
                r#"
                log_level = "debug"

                [docker]
                label_prefix = "myapp."

                [shutdown]
                timeout = 5
                "#,
            )?;
            jail.set_env("CRONTASK_DOCKER__SOCKET_PATH", "/tmp/docker.sock");

            let cfg = Config::load(Some("crontaskd.toml")).expect("config loads");
            assert_eq!(cfg.log_level, "debug");
            assert_eq!(cfg.docker.label_prefix, "myapp.");
            assert_eq!(cfg.docker.socket_path, "/tmp/docker.sock");
            assert_eq!(cfg.shutdown.timeout, 5);
            // untouched sections keep their defaults
            assert_eq!(cfg.worker.retry_attempts, 3);
            Ok(())
        });
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        figment::Jail::expect_with(|_jail| {
            let cfg = Config::load(Some("does-not-exist.toml")).expect("defaults apply");
            assert_eq!(cfg.app_name, "CronTask");
            Ok(())
        });
    }

    #[test]
    fn write_default_refuses_to_overwrite() {
        figment::Jail::expect_with(|jail| {
            let path = jail.directory().join("crontaskd.toml");
            Config::write_default(&path).expect("first write succeeds");
            let err = Config::write_default(&path).unwrap_err();
            assert!(matches!(err, CoreError::ConfigExists(_)));
            // the generated file must itself be loadable
            let cfg = Config::load(Some(path.to_str().unwrap())).expect("generated file parses");
            assert_eq!(cfg.environment, "production");
            Ok(())
        });
    }
}
