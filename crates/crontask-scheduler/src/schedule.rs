use chrono::{DateTime, Utc};
use croner::Cron;

use crate::error::{Result, SchedulerError};

/// Parse a schedule expression permissively.
///
/// Accepts the classic 5-field form, the optional-seconds 6-field form,
/// and descriptors such as `@hourly`. Anything else is
/// [`SchedulerError::InvalidCronExpression`].
pub fn parse_cron(expr: &str) -> Result<Cron> {
    Cron::new(expr)
        .with_seconds_optional()
        .parse()
        .map_err(|source| SchedulerError::InvalidCronExpression {
            expr: expr.to_string(),
            source,
        })
}

/// Compute the next UTC execution time strictly *after* `from`.
///
/// Returns `None` when the schedule never fires again.
pub fn next_occurrence(cron: &Cron, from: DateTime<Utc>) -> Option<DateTime<Utc>> {
    cron.find_next_occurrence(&from, false).ok()
}
