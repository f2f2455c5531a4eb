// Drive the reconciler with synthetic container event sequences and a mock
// runtime, asserting registry / dispatcher agreement after each sequence.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use crontask_docker::error::{DockerError, Result as DockerResult};
use crontask_docker::types::{ContainerEvent, ContainerInfo, EventAction};
use crontask_docker::ContainerRuntime;
use crontask_engine::{Reconciler, Registry};
use crontask_scheduler::Dispatcher;
use tokio::sync::mpsc;

const PREFIX: &str = "crontask.";
const CONTAINER_ID: &str = "abc123abc123def456def456";

/// Runtime double that records exec calls and returns a canned outcome.
struct MockRuntime {
    execs: Mutex<Vec<(String, String)>>,
    outcome: Option<(i64, String)>,
}

impl MockRuntime {
    fn ok() -> Arc<Self> {
        Arc::new(Self {
            execs: Mutex::new(Vec::new()),
            outcome: None,
        })
    }

    fn failing(exit_code: i64, output: &str) -> Arc<Self> {
        Arc::new(Self {
            execs: Mutex::new(Vec::new()),
            outcome: Some((exit_code, output.to_string())),
        })
    }

    fn exec_calls(&self) -> Vec<(String, String)> {
        self.execs.lock().unwrap().clone()
    }
}

#[async_trait]
impl ContainerRuntime for MockRuntime {
    async fn inspect(&self, container_id: &str) -> DockerResult<ContainerInfo> {
        Err(DockerError::NotFound {
            id: container_id.to_string(),
        })
    }

    async fn exec(&self, container_id: &str, command: &str) -> DockerResult<String> {
        self.execs
            .lock()
            .unwrap()
            .push((container_id.to_string(), command.to_string()));
        match &self.outcome {
            None => Ok(String::new()),
            Some((exit_code, output)) => Err(DockerError::TaskFailed {
                exit_code: *exit_code,
                output: output.clone(),
            }),
        }
    }
}

fn container(id: &str, name: &str, state: &str, labels: &[(&str, &str)]) -> ContainerInfo {
    ContainerInfo {
        id: id.to_string(),
        name: name.to_string(),
        state: state.to_string(),
        image: "busybox:latest".to_string(),
        labels: labels
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
        created: Utc::now(),
    }
}

fn event(action: EventAction, snapshot: &ContainerInfo) -> ContainerEvent {
    ContainerEvent {
        action,
        container_id: snapshot.id.clone(),
        container: snapshot.clone(),
    }
}

/// Run one reconciler over `events` to completion, returning the registry
/// and dispatcher it mutated.
async fn reconcile(
    runtime: Arc<dyn ContainerRuntime>,
    events: Vec<ContainerEvent>,
) -> (Arc<Registry>, Arc<Dispatcher>) {
    let registry = Registry::new();
    let dispatcher = Dispatcher::new();
    let reconciler = Reconciler::new(
        Arc::clone(&registry),
        Arc::clone(&dispatcher),
        runtime,
        PREFIX.to_string(),
    );

    let (tx, rx) = mpsc::channel(events.len().max(1));
    let handle = tokio::spawn(reconciler.run(rx));
    for ev in events {
        tx.send(ev).await.expect("reconciler is receiving");
    }
    drop(tx);
    handle.await.expect("reconciler completes");

    (registry, dispatcher)
}

#[tokio::test]
async fn cold_start_with_no_containers_registers_nothing() {
    let (registry, dispatcher) = reconcile(MockRuntime::ok(), Vec::new()).await;
    assert_eq!(registry.count(), 0);
    assert_eq!(dispatcher.entry_count(), 0);
}

#[tokio::test]
async fn single_valid_label_registers_one_job() {
    let c1 = container(
        CONTAINER_ID,
        "C1",
        "running",
        &[("crontask.cronjob('* * * * *').task", "echo hi")],
    );
    let (registry, dispatcher) = reconcile(MockRuntime::ok(), vec![event(EventAction::Scan, &c1)]).await;

    assert_eq!(registry.count(), 1);
    assert_eq!(dispatcher.entry_count(), 1);

    let job = registry.get("abc123abc123-C1").expect("job admitted");
    assert_eq!(job.container_id, CONTAINER_ID);
    assert_eq!(job.command, "echo hi");
    assert_eq!(job.cron_expr, "* * * * *");
    assert!(dispatcher.next_fire(job.entry_id).is_some());
}

#[tokio::test]
async fn non_running_snapshot_is_a_no_op() {
    let created = container(
        CONTAINER_ID,
        "C1",
        "created",
        &[("crontask.cronjob('* * * * *').task", "echo hi")],
    );
    let (registry, dispatcher) =
        reconcile(MockRuntime::ok(), vec![event(EventAction::Create, &created)]).await;
    assert_eq!(registry.count(), 0);
    assert_eq!(dispatcher.entry_count(), 0);
}

#[tokio::test]
async fn malformed_label_does_not_block_valid_sibling() {
    let c2 = container(
        CONTAINER_ID,
        "C2",
        "running",
        &[
            ("crontask.cronjob('* * * * *').task", "ok"),
            ("crontask.cronjob(bad).task", "nope"),
        ],
    );
    let (registry, dispatcher) = reconcile(MockRuntime::ok(), vec![event(EventAction::Scan, &c2)]).await;

    assert_eq!(registry.count(), 1);
    assert_eq!(dispatcher.entry_count(), 1);
    assert_eq!(registry.get("abc123abc123-C2").unwrap().command, "ok");
}

#[tokio::test]
async fn label_that_fails_full_validation_is_skipped() {
    // passes the five-field label gate but not the dispatcher's parser
    let c = container(
        CONTAINER_ID,
        "C1",
        "running",
        &[("crontask.cronjob('99 99 99 99 99').task", "echo hi")],
    );
    let (registry, dispatcher) = reconcile(MockRuntime::ok(), vec![event(EventAction::Scan, &c)]).await;
    assert_eq!(registry.count(), 0);
    assert_eq!(dispatcher.entry_count(), 0);
}

#[tokio::test]
async fn update_re_registers_from_the_new_snapshot() {
    let one_label = container(
        CONTAINER_ID,
        "C3",
        "running",
        &[("crontask.cronjob('* * * * *').task", "first")],
    );
    let two_labels = container(
        CONTAINER_ID,
        "C3",
        "running",
        &[
            ("crontask.cronjob('* * * * *').task", "first"),
            ("crontask.cronjob('0 * * * *').task", "second"),
        ],
    );

    let registry = Registry::new();
    let dispatcher = Dispatcher::new();
    let reconciler = Reconciler::new(
        Arc::clone(&registry),
        Arc::clone(&dispatcher),
        MockRuntime::ok(),
        PREFIX.to_string(),
    );

    let (tx, rx) = mpsc::channel(4);
    let handle = tokio::spawn(reconciler.run(rx));

    tx.send(event(EventAction::Start, &one_label)).await.unwrap();
    // the original job's dispatcher handle must die with the re-register;
    // capture it once the first event has been applied
    let original_entry = loop {
        if let Some(job) = registry.get("abc123abc123-C3") {
            break job.entry_id;
        }
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    };

    tx.send(event(EventAction::Update, &two_labels)).await.unwrap();
    drop(tx);
    handle.await.unwrap();

    assert_eq!(registry.count(), 2);
    assert_eq!(dispatcher.entry_count(), 2);
    assert!(dispatcher.next_fire(original_entry).is_none());

    let mut ids: Vec<String> = registry.all().iter().map(|j| j.id.clone()).collect();
    ids.sort();
    assert_eq!(ids, vec!["abc123abc123-C3", "abc123abc123-C3-2"]);
}

#[tokio::test]
async fn re_register_with_identical_snapshot_is_idempotent() {
    let c = container(
        CONTAINER_ID,
        "C1",
        "running",
        &[("crontask.cronjob('* * * * *').task", "echo hi")],
    );
    let (registry, dispatcher) = reconcile(
        MockRuntime::ok(),
        vec![event(EventAction::Scan, &c), event(EventAction::Update, &c)],
    )
    .await;

    assert_eq!(registry.count(), 1);
    assert_eq!(dispatcher.entry_count(), 1);
    let job = registry.get("abc123abc123-C1").unwrap();
    assert_eq!(job.command, "echo hi");
    assert!(dispatcher.next_fire(job.entry_id).is_some());
}

#[tokio::test]
async fn death_unregisters_every_job_of_the_container() {
    let c4 = container(
        CONTAINER_ID,
        "C4",
        "running",
        &[
            ("crontask.cronjob('* * * * *').task", "one"),
            ("crontask.cronjob('0 * * * *').task", "two"),
        ],
    );
    let (registry, dispatcher) = reconcile(
        MockRuntime::ok(),
        vec![event(EventAction::Start, &c4), event(EventAction::Die, &c4)],
    )
    .await;

    assert_eq!(registry.count(), 0);
    assert_eq!(dispatcher.entry_count(), 0);
}

#[tokio::test]
async fn create_die_create_equals_the_second_create_alone() {
    let first = container(
        CONTAINER_ID,
        "C5",
        "running",
        &[("crontask.cronjob('* * * * *').task", "old command")],
    );
    let second = container(
        CONTAINER_ID,
        "C5",
        "running",
        &[("crontask.cronjob('0 0 * * *').task", "new command")],
    );

    let (registry, dispatcher) = reconcile(
        MockRuntime::ok(),
        vec![
            event(EventAction::Create, &first),
            event(EventAction::Die, &first),
            event(EventAction::Create, &second),
        ],
    )
    .await;

    assert_eq!(registry.count(), 1);
    assert_eq!(dispatcher.entry_count(), 1);
    let job = registry.get("abc123abc123-C5").unwrap();
    assert_eq!(job.command, "new command");
    assert_eq!(job.cron_expr, "0 0 * * *");
}

#[tokio::test]
async fn executor_resolves_job_and_execs_in_container() {
    let runtime = MockRuntime::ok();
    let c1 = container(
        CONTAINER_ID,
        "C1",
        "running",
        &[("crontask.cronjob('* * * * *').task", "echo hi")],
    );
    let (registry, dispatcher) = reconcile(
        Arc::clone(&runtime) as Arc<dyn ContainerRuntime>,
        vec![event(EventAction::Scan, &c1)],
    )
    .await;

    let job = registry.get("abc123abc123-C1").unwrap();
    assert!(job.last_run().is_none());

    crontask_engine::executor::execute(&registry, &dispatcher, runtime.as_ref(), &job.id).await;

    assert_eq!(
        runtime.exec_calls(),
        vec![(CONTAINER_ID.to_string(), "echo hi".to_string())]
    );
    assert!(job.last_run().is_some());
}

#[tokio::test]
async fn failed_task_leaves_the_job_scheduled() {
    let runtime = MockRuntime::failing(2, "boom");
    let c1 = container(
        CONTAINER_ID,
        "C1",
        "running",
        &[("crontask.cronjob('* * * * *').task", "exit 2")],
    );
    let (registry, dispatcher) = reconcile(
        Arc::clone(&runtime) as Arc<dyn ContainerRuntime>,
        vec![event(EventAction::Scan, &c1)],
    )
    .await;

    let job = registry.get("abc123abc123-C1").unwrap();
    crontask_engine::executor::execute(&registry, &dispatcher, runtime.as_ref(), &job.id).await;

    // the failure is logged, not acted on: job and entry stay live
    assert_eq!(registry.count(), 1);
    assert!(dispatcher.next_fire(job.entry_id).is_some());
    assert_eq!(runtime.exec_calls().len(), 1);
}

#[tokio::test]
async fn executing_a_removed_job_is_a_quiet_no_op() {
    let runtime = MockRuntime::ok();
    let registry = Registry::new();
    let dispatcher = Dispatcher::new();

    crontask_engine::executor::execute(&registry, &dispatcher, runtime.as_ref(), "gone-job").await;

    assert!(runtime.exec_calls().is_empty());
}
