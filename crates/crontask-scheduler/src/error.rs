use thiserror::Error;

/// Errors that can occur within the dispatcher subsystem.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The expression failed full syntactic validation.
    #[error("invalid cron expression {expr:?}: {source}")]
    InvalidCronExpression {
        expr: String,
        #[source]
        source: croner::errors::CronError,
    },

    /// The expression parsed but never fires again (e.g. an impossible
    /// date combination).
    #[error("cron expression {expr:?} has no future occurrence")]
    NoFutureOccurrence { expr: String },
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
