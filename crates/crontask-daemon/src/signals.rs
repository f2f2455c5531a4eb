//! OS signal handling for graceful shutdown.

use tracing::info;

/// Wait for the first termination signal and return its name.
///
/// Unix: SIGINT, SIGTERM, or SIGHUP. Elsewhere: Ctrl-C only.
pub async fn shutdown_signal() -> std::io::Result<&'static str> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut terminate = signal(SignalKind::terminate())?;
        let mut hangup = signal(SignalKind::hangup())?;

        let name = tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result?;
                "SIGINT"
            }
            _ = terminate.recv() => "SIGTERM",
            _ = hangup.recv() => "SIGHUP",
        };
        info!(signal = name, "received shutdown signal");
        Ok(name)
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        info!(signal = "ctrl-c", "received shutdown signal");
        Ok("ctrl-c")
    }
}
