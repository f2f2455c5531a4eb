//! Runtime client construction with a platform-ordered endpoint walk.
//!
//! The fallback list is data, not control flow: each candidate pairs an
//! endpoint with a platform predicate. An attempt counts as successful only
//! when both client construction and a liveness probe succeed.

use bollard::{Docker, API_DEFAULT_VERSION};
use crontask_core::DockerConfig;
use tracing::{debug, info, warn};

use crate::error::{DockerError, Result};

/// Seconds bollard waits on individual requests. The runtime's own socket
/// timeouts apply beyond this; the adapter adds no further deadlines.
const CLIENT_TIMEOUT_SECS: u64 = 120;

/// One connectable runtime endpoint.
#[derive(Debug, Clone)]
pub(crate) enum Endpoint {
    Unix(String),
    NamedPipe(String),
}

impl Endpoint {
    /// Classify a user-supplied socket path.
    fn parse(path: &str) -> Self {
        if let Some(addr) = path.strip_prefix("npipe://") {
            Endpoint::NamedPipe(addr.to_string())
        } else {
            Endpoint::Unix(path.strip_prefix("unix://").unwrap_or(path).to_string())
        }
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Endpoint::Unix(path) => write!(f, "unix://{path}"),
            Endpoint::NamedPipe(addr) => write!(f, "npipe://{addr}"),
        }
    }
}

struct Candidate {
    endpoint: Endpoint,
    windows_only: bool,
}

/// Candidate endpoints in attempt order: the explicit config path first
/// (when set), then named pipe and WSL socket variants on Windows, then
/// the stock Unix socket.
fn candidate_endpoints(socket_path: &str) -> Vec<Candidate> {
    let mut candidates = Vec::new();

    if !socket_path.is_empty() {
        candidates.push(Candidate {
            endpoint: Endpoint::parse(socket_path),
            windows_only: false,
        });
    }

    candidates.push(Candidate {
        endpoint: Endpoint::NamedPipe("//./pipe/docker_engine".to_string()),
        windows_only: true,
    });
    candidates.push(Candidate {
        endpoint: Endpoint::Unix(
            r"\\wsl$\docker-desktop-data\version-pack-data\community\docker\docker.sock"
                .to_string(),
        ),
        windows_only: true,
    });
    candidates.push(Candidate {
        endpoint: Endpoint::Unix(
            r"\\wsl.localhost\docker-desktop-data\version-pack-data\community\docker\docker.sock"
                .to_string(),
        ),
        windows_only: true,
    });
    candidates.push(Candidate {
        endpoint: Endpoint::Unix("/var/run/docker.sock".to_string()),
        windows_only: false,
    });

    candidates
}

fn try_connect(endpoint: &Endpoint) -> Result<Docker> {
    match endpoint {
        #[cfg(unix)]
        Endpoint::Unix(path) => {
            Docker::connect_with_unix(path, CLIENT_TIMEOUT_SECS, API_DEFAULT_VERSION)
                .map_err(DockerError::Transport)
        }
        #[cfg(windows)]
        Endpoint::NamedPipe(addr) => {
            Docker::connect_with_named_pipe(addr, CLIENT_TIMEOUT_SECS, API_DEFAULT_VERSION)
                .map_err(DockerError::Transport)
        }
        #[allow(unreachable_patterns)]
        other => Err(DockerError::RuntimeUnavailable(format!(
            "endpoint {other} is not supported on this platform"
        ))),
    }
}

/// Build a live runtime client.
///
/// Walks the candidate list; each attempt must construct a client *and*
/// answer a ping. When every candidate fails the last underlying cause is
/// surfaced in [`DockerError::RuntimeUnavailable`].
pub async fn connect(config: &DockerConfig) -> Result<Docker> {
    let mut last_error: Option<String> = None;

    for candidate in candidate_endpoints(&config.socket_path) {
        if candidate.windows_only && !cfg!(windows) {
            continue;
        }

        debug!(endpoint = %candidate.endpoint, "trying container runtime endpoint");
        let client = match try_connect(&candidate.endpoint) {
            Ok(client) => client,
            Err(e) => {
                warn!(endpoint = %candidate.endpoint, error = %e, "client construction failed");
                last_error = Some(e.to_string());
                continue;
            }
        };

        match client.ping().await {
            Ok(_) => {
                info!(endpoint = %candidate.endpoint, "connected to container runtime");
                return Ok(client);
            }
            Err(e) => {
                warn!(endpoint = %candidate.endpoint, error = %e, "liveness probe failed");
                last_error = Some(e.to_string());
            }
        }
    }

    Err(DockerError::RuntimeUnavailable(last_error.unwrap_or_else(
        || "no candidate endpoints for this platform".to_string(),
    )))
}
