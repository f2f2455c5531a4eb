//! Ordered shutdown with a coordinator-level deadline.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use anyhow::bail;
use tracing::{error, info};

type ShutdownFuture = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>>;

/// Runs registered shutdown tasks in registration order under one
/// deadline. An individual task failure is logged and does not abort the
/// tasks after it; blowing the deadline does.
pub struct ShutdownManager {
    tasks: Vec<(String, ShutdownFuture)>,
    deadline: Duration,
}

impl ShutdownManager {
    pub fn new(deadline: Duration) -> Self {
        Self {
            tasks: Vec::new(),
            deadline,
        }
    }

    pub fn register_task(
        &mut self,
        name: &str,
        task: impl Future<Output = anyhow::Result<()>> + Send + 'static,
    ) {
        self.tasks.push((name.to_string(), Box::pin(task)));
    }

    /// Execute every task in order. Returns an error only when the
    /// deadline is exceeded.
    pub async fn execute(self) -> anyhow::Result<()> {
        let deadline = self.deadline;
        let run_all = async {
            for (name, task) in self.tasks {
                info!(task = %name, "executing shutdown task");
                if let Err(e) = task.await {
                    error!(task = %name, error = %e, "shutdown task failed");
                }
            }
        };

        if tokio::time::timeout(deadline, run_all).await.is_err() {
            bail!("shutdown deadline of {}s exceeded", deadline.as_secs());
        }
        Ok(())
    }
}
