//! Label → cron task extraction.
//!
//! Expected label shape: `<prefix>cronjob('<SCHEDULE>').task = <COMMAND>`.
//! Labels without the prefix are ignored silently; labels with the prefix
//! but a broken shape are skipped with a warning and do not stop the other
//! labels on the same container from being processed.

use tracing::warn;

use crate::error::LabelError;
use crate::types::{ContainerInfo, CronTask};

const SCHEDULE_OPEN: &str = "('";
const SCHEDULE_CLOSE: &str = "')";

/// Minimum whitespace-separated fields for a plausible cron expression.
/// Full syntactic validation is deferred to the dispatcher's parser.
const MIN_CRON_FIELDS: usize = 5;

/// Extract every cron task declared by `container`'s labels.
///
/// The returned order is unspecified (labels are an unordered map);
/// callers must not rely on it.
pub fn extract_cron_tasks(container: &ContainerInfo, prefix: &str) -> Vec<CronTask> {
    let mut tasks = Vec::new();

    for (label_key, command) in &container.labels {
        if !label_key.starts_with(prefix) {
            continue;
        }

        let cron_expr = match parse_schedule_text(label_key) {
            Ok(expr) => expr,
            Err(e) => {
                warn!(
                    container = container.short_id(),
                    label = %label_key,
                    error = %e,
                    "skipping malformed cron label"
                );
                continue;
            }
        };

        tasks.push(CronTask {
            container_id: container.id.clone(),
            container_name: container.name.clone(),
            cron_expr: cron_expr.to_string(),
            command: command.clone(),
            label_key: label_key.clone(),
        });
    }

    tasks
}

/// Pull the schedule text out of a label key.
///
/// The schedule is the substring strictly between `('` and `')`, and must
/// carry at least [`MIN_CRON_FIELDS`] whitespace-separated fields.
fn parse_schedule_text(label_key: &str) -> Result<&str, LabelError> {
    let open = label_key.find(SCHEDULE_OPEN).ok_or(LabelError::MissingOpen)?;
    let start = open + SCHEDULE_OPEN.len();
    let close = label_key[start..]
        .find(SCHEDULE_CLOSE)
        .map(|i| start + i)
        .ok_or(LabelError::MissingClose)?;

    let cron_expr = &label_key[start..close];

    if cron_expr.split_whitespace().count() < MIN_CRON_FIELDS {
        return Err(LabelError::InvalidCronExpression(cron_expr.to_string()));
    }

    Ok(cron_expr)
}
