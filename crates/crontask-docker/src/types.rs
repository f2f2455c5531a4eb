use std::collections::HashMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;

/// Length of the short container id used for log correlation.
///
/// Never a primary key — two containers can share a prefix in theory, and
/// the registry always keys on the full id.
pub const SHORT_ID_LEN: usize = 12;

/// First [`SHORT_ID_LEN`] characters of a container id.
pub fn short_id(id: &str) -> &str {
    &id[..id.len().min(SHORT_ID_LEN)]
}

/// Snapshot of a container as reported by the runtime.
#[derive(Debug, Clone, Serialize)]
pub struct ContainerInfo {
    /// Full opaque id.
    pub id: String,
    /// Human-readable name, leading path separator stripped.
    pub name: String,
    /// Lifecycle state in the runtime's vocabulary; only `"running"` is
    /// semantically meaningful to the reconciler.
    pub state: String,
    pub image: String,
    pub labels: HashMap<String, String>,
    /// Informational only — never gates admission (see
    /// [`parse_created_timestamp`]).
    pub created: DateTime<Utc>,
}

impl ContainerInfo {
    pub fn short_id(&self) -> &str {
        short_id(&self.id)
    }

    pub fn is_running(&self) -> bool {
        self.state == "running"
    }
}

/// Container lifecycle actions the adapter lets through.
///
/// `Scan` is synthetic: emitted once per pre-existing container at startup
/// so the reconciler converges without bootstrap logic. The rest map 1:1
/// to runtime events; the event stream is filtered to exactly this set at
/// the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventAction {
    Scan,
    Create,
    Start,
    Update,
    Die,
    Destroy,
}

impl FromStr for EventAction {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "scan" => Ok(EventAction::Scan),
            "create" => Ok(EventAction::Create),
            "start" => Ok(EventAction::Start),
            "update" => Ok(EventAction::Update),
            "die" => Ok(EventAction::Die),
            "destroy" => Ok(EventAction::Destroy),
            other => Err(format!("unhandled container event action: {other}")),
        }
    }
}

impl std::fmt::Display for EventAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            EventAction::Scan => "scan",
            EventAction::Create => "create",
            EventAction::Start => "start",
            EventAction::Update => "update",
            EventAction::Die => "die",
            EventAction::Destroy => "destroy",
        };
        write!(f, "{s}")
    }
}

/// One container lifecycle event, with the snapshot taken after the
/// post-event settle delay.
#[derive(Debug, Clone)]
pub struct ContainerEvent {
    pub action: EventAction,
    pub container_id: String,
    pub container: ContainerInfo,
}

/// A `(schedule, command)` pair extracted from one container label,
/// plus the identity needed to build a job from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronTask {
    pub container_id: String,
    pub container_name: String,
    /// Verbatim schedule text from the label key; syntactic validation is
    /// the dispatcher's job.
    pub cron_expr: String,
    /// Passed verbatim to `sh -c` inside the container.
    pub command: String,
    /// The label that declared this task, kept for traceability.
    pub label_key: String,
}

/// Parse a container creation timestamp.
///
/// The runtime reports it as text in RFC 3339 form, with or without
/// sub-second precision. On failure the current wall time is substituted
/// and a warning emitted — the value is informational only and must never
/// drive a correctness decision.
pub fn parse_created_timestamp(container_id: &str, raw: &str) -> DateTime<Utc> {
    match DateTime::parse_from_rfc3339(raw) {
        Ok(parsed) => parsed.with_timezone(&Utc),
        Err(e) => {
            warn!(
                container = short_id(container_id),
                created = raw,
                error = %e,
                "failed to parse container creation time, using current time"
            );
            Utc::now()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_id_truncates_to_twelve() {
        assert_eq!(short_id("0123456789abcdef0123"), "0123456789ab");
        assert_eq!(short_id("abc"), "abc");
    }

    #[test]
    fn event_action_round_trip() {
        for (text, action) in [
            ("scan", EventAction::Scan),
            ("create", EventAction::Create),
            ("start", EventAction::Start),
            ("update", EventAction::Update),
            ("die", EventAction::Die),
            ("destroy", EventAction::Destroy),
        ] {
            assert_eq!(text.parse::<EventAction>().unwrap(), action);
            assert_eq!(action.to_string(), text);
        }
        assert!("exec_create".parse::<EventAction>().is_err());
    }

    #[test]
    fn created_timestamp_accepts_nano_and_second_precision() {
        let nano = parse_created_timestamp("c1", "2024-05-01T12:30:45.123456789Z");
        assert_eq!(nano.timestamp(), 1_714_566_645);

        let secs = parse_created_timestamp("c1", "2024-05-01T12:30:45Z");
        assert_eq!(secs.timestamp(), 1_714_566_645);
    }

    #[test]
    fn created_timestamp_falls_back_to_now() {
        let before = Utc::now();
        let parsed = parse_created_timestamp("c1", "not-a-timestamp");
        assert!(parsed >= before);
    }
}
