use thiserror::Error;

/// Errors raised by the runtime adapter.
///
/// Only `RuntimeUnavailable` is fatal (at startup). Everything else is
/// contained at its boundary: transport errors drop the event that carried
/// them, task failures leave the job scheduled.
#[derive(Debug, Error)]
pub enum DockerError {
    /// Every candidate endpoint failed; carries the last cause.
    #[error("container runtime unavailable: {0}")]
    RuntimeUnavailable(String),

    #[error("container not found: {id}")]
    NotFound { id: String },

    #[error("runtime transport error: {0}")]
    Transport(#[from] bollard::errors::Error),

    /// The command ran but exited non-zero.
    #[error("task exited with code {exit_code}")]
    TaskFailed { exit_code: i64, output: String },

    /// Reading exec output failed before end-of-stream.
    #[error("failed to read exec output: {0}")]
    ExecIo(String),
}

pub type Result<T> = std::result::Result<T, DockerError>;

/// Per-label extraction failures. These never abort a container's other
/// labels; the reconciler logs them and moves on.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LabelError {
    #[error("invalid cron job label: missing '('")]
    MissingOpen,

    #[error("invalid cron job label: missing ')'")]
    MissingClose,

    /// Fewer than five whitespace-separated fields. Full syntactic
    /// validation is deferred to the dispatcher's parser.
    #[error("invalid cron expression: {0}")]
    InvalidCronExpression(String),
}
