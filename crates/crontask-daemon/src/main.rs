//! `crontaskd` — label-driven cron scheduler for containerized workloads.
//!
//! Exit codes: 0 on normal shutdown, 1 on startup failure (config load or
//! runtime connect) or an unrecovered runtime error.

use tracing::error;
use tracing_subscriber::EnvFilter;

mod app;
mod shutdown;
mod signals;

#[tokio::main]
async fn main() {
    // config: explicit path via CRONTASK_CONFIG > search paths > defaults
    let config_path = std::env::var("CRONTASK_CONFIG").ok();
    let config = match crontask_core::Config::load(config_path.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("crontaskd: failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone())),
        )
        .init();

    if let Err(e) = app::App::new(config).run().await {
        error!(error = %e, "application terminated with an error");
        std::process::exit(1);
    }
}
