//! Suite lifecycle engine
//!
//! Applies a suite's declared resources, starts its chaos workers and tears
//! down everything the tracker recorded. Operations on one suite run
//! sequentially; teardown fans out one task per tracked kind.

use std::sync::Arc;

use metrics::counter;
use serde::Serialize;
use tokio::task::JoinSet;
use tracing::{debug, error, info, instrument, warn};
use utoipa::ToSchema;

use super::error::SuiteError;
use super::tracker::{TrackerError, TrackerStore};
use crate::chaos::WorkerRunner;
use crate::k8s::{GatewayError, Manifest, ResourceGateway};
use crate::models::{ResourceDescriptor, ResourceKind, Suite, SuiteState};

/// Result of an existence check
#[derive(Debug)]
pub enum Existence {
    Exists,
    Absent,
    /// The check itself failed; callers treat this as absent
    Unknown(GatewayError),
}

impl Existence {
    pub fn should_apply(&self) -> bool {
        !matches!(self, Existence::Exists)
    }
}

/// Outcome of applying one declared resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// Created; carries the name the cluster reported
    Created(String),
    /// Already present under this name, nothing created
    Skipped(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct DeleteFailure {
    pub kind: ResourceKind,
    pub name: String,
    pub error: String,
}

/// Summary of a teardown pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct TeardownReport {
    pub deleted: usize,
    /// Tracked names the cluster no longer had
    pub already_gone: usize,
    pub failures: Vec<DeleteFailure>,
    /// Kinds whose tracked names could not be listed
    pub list_failures: Vec<ResourceKind>,
}

impl TeardownReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && self.list_failures.is_empty()
    }
}

/// Per-kind result of a teardown task
struct KindTeardown {
    deleted: usize,
    already_gone: usize,
    failures: Vec<DeleteFailure>,
}

impl KindTeardown {
    fn remaining(&self) -> Vec<String> {
        self.failures.iter().map(|f| f.name.clone()).collect()
    }
}

pub struct SuiteEngine {
    gateway: Arc<dyn ResourceGateway>,
    runner: Arc<dyn WorkerRunner>,
    tracker: Arc<dyn TrackerStore>,
}

impl SuiteEngine {
    pub fn new(
        gateway: Arc<dyn ResourceGateway>,
        runner: Arc<dyn WorkerRunner>,
        tracker: Arc<dyn TrackerStore>,
    ) -> Self {
        Self {
            gateway,
            runner,
            tracker,
        }
    }

    pub fn gateway(&self) -> &Arc<dyn ResourceGateway> {
        &self.gateway
    }

    pub fn tracker(&self) -> &Arc<dyn TrackerStore> {
        &self.tracker
    }

    /// Apply every declared resource in declaration order.
    ///
    /// Chaos daemon sets are skipped; they are started by
    /// [`SuiteEngine::run_chaos_workers`]. The first failure aborts the run and
    /// leaves the suite `Failed`; resources created before it stay tracked.
    #[instrument(skip(self, suite), fields(suite_id = %suite.id, suite = %suite.name))]
    pub async fn run_declared_resources(&self, suite: &mut Suite) -> Result<(), SuiteError> {
        suite.set_state(SuiteState::Applying);

        let resources = suite.resources.clone();
        for resource in &resources {
            if resource.kind == ResourceKind::ChaosDaemonSet {
                debug!(resource = %resource.name, "Skipping chaos daemon set declaration");
                continue;
            }

            let outcome = match self.apply_resource(resource).await {
                Ok(outcome) => outcome,
                Err(e) => return Err(self.fail(suite, e)),
            };

            if let ApplyOutcome::Created(name) = outcome {
                if let Err(e) = self.track(suite, resource.kind, name).await {
                    return Err(self.fail(suite, e));
                }
            }
        }

        info!(resources = resources.len(), "Declared resources applied");
        Ok(())
    }

    /// Parse, check and create a single resource.
    ///
    /// Does not touch the tracker; recording a created name is the caller's job.
    #[instrument(skip(self, resource), fields(kind = %resource.kind, resource = %resource.name))]
    pub async fn apply_resource(
        &self,
        resource: &ResourceDescriptor,
    ) -> Result<ApplyOutcome, SuiteError> {
        let kind = resource.kind;
        let mut manifest = Manifest::parse(kind, resource.value.as_bytes()).map_err(|source| {
            SuiteError::Manifest {
                resource: resource.name.clone(),
                source,
            }
        })?;
        let name = manifest
            .resolve_name(kind, &resource.name)
            .map_err(|source| SuiteError::Manifest {
                resource: resource.name.clone(),
                source,
            })?;

        let existence = self.check_existence(kind, &name).await;
        if !existence.should_apply() {
            debug!(name = %name, "Resource already exists, skipping");
            return Ok(ApplyOutcome::Skipped(name));
        }

        let created = self
            .gateway
            .apply(kind, manifest)
            .await
            .map_err(|source| SuiteError::Apply {
                kind,
                name: name.clone(),
                source,
            })?;

        counter!("resilia_resources_created_total", 1, "kind" => kind.as_str());
        info!(name = %created, "Created resource");
        Ok(ApplyOutcome::Created(created))
    }

    /// Existence check with the forgiving policy: a failed check is logged and
    /// reported as `Unknown`, which still applies.
    pub async fn check_existence(&self, kind: ResourceKind, name: &str) -> Existence {
        match self.gateway.exists(kind, name).await {
            Ok(true) => Existence::Exists,
            Ok(false) => Existence::Absent,
            Err(e) => {
                warn!(
                    kind = %kind,
                    name = %name,
                    error = %e,
                    "Existence check failed, assuming absent"
                );
                Existence::Unknown(e)
            }
        }
    }

    /// Run every declared chaos worker in order and record each created unit
    /// under `ChaosDaemonSet`. The first failure aborts the remaining workers.
    #[instrument(skip(self, suite), fields(suite_id = %suite.id, workers = suite.workers.len()))]
    pub async fn run_chaos_workers(&self, suite: &mut Suite) -> Result<(), SuiteError> {
        let workers = suite.workers.clone();
        for worker in &workers {
            let name = match self.runner.run(worker).await {
                Ok(name) => name,
                Err(source) => {
                    let err = SuiteError::RunWorker {
                        worker_id: worker.id().to_string(),
                        target: worker.target().to_string(),
                        source,
                    };
                    return Err(self.fail(suite, err));
                }
            };
            counter!("resilia_chaos_workers_started_total", 1);

            if let Err(e) = self.track(suite, ResourceKind::ChaosDaemonSet, name).await {
                return Err(self.fail(suite, e));
            }
        }

        suite.set_state(SuiteState::Running);
        info!("Chaos workers running");
        Ok(())
    }

    /// Tear down every tracked resource of the suite.
    ///
    /// Kinds are torn down concurrently, names within a kind sequentially. A
    /// failed delete is logged and its name stays tracked for a later pass; a
    /// kind whose tracked names cannot be listed fails the whole teardown once
    /// every other kind has been attempted.
    #[instrument(skip(self, suite), fields(suite_id = %suite.id))]
    pub async fn stop(&self, suite: &mut Suite) -> Result<TeardownReport, SuiteError> {
        suite.set_state(SuiteState::Stopping);

        let kinds = match self.tracker.kinds(&suite.id).await {
            Ok(kinds) => kinds,
            Err(source) => {
                let err = SuiteError::ListTracked { kind: None, source };
                return Err(self.fail(suite, err));
            }
        };

        let mut tasks = JoinSet::new();
        for kind in kinds {
            let gateway = Arc::clone(&self.gateway);
            let tracker = Arc::clone(&self.tracker);
            let suite_id = suite.id.clone();
            tasks.spawn(async move {
                let outcome = teardown_kind(gateway, tracker, &suite_id, kind).await;
                (kind, outcome)
            });
        }

        let mut report = TeardownReport::default();
        let mut errors = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            let (kind, outcome) = match joined {
                Ok(result) => result,
                Err(e) => {
                    error!(error = %e, "Teardown task did not complete");
                    errors.push(SuiteError::Join(e));
                    continue;
                }
            };

            match outcome {
                Ok(done) => {
                    let remaining = done.remaining();
                    report.deleted += done.deleted;
                    report.already_gone += done.already_gone;
                    report.failures.extend(done.failures);

                    let replaced = self
                        .tracker
                        .replace(&suite.id, kind, remaining.clone())
                        .await;
                    if let Err(source) = replaced {
                        errors.push(SuiteError::Track {
                            kind,
                            name: remaining.join(","),
                            source,
                        });
                    }
                    suite.created_resources.retain_only(kind, remaining);
                }
                Err(source) => {
                    error!(kind = %kind, error = %source, "Failed to list tracked resources");
                    report.list_failures.push(kind);
                    errors.push(SuiteError::ListTracked {
                        kind: Some(kind),
                        source,
                    });
                }
            }
        }
        report.list_failures.sort();

        if !errors.is_empty() {
            let err = SuiteError::Teardown { errors, report };
            return Err(self.fail(suite, err));
        }

        if report.failures.is_empty() {
            if let Err(e) = self.tracker.clear(&suite.id).await {
                warn!(error = %e, "Failed to clear tracker after clean teardown");
            }
            suite.created_resources.clear();
        }

        suite.set_state(SuiteState::Stopped);
        counter!("resilia_suites_total", 1, "outcome" => "stopped");
        info!(
            deleted = report.deleted,
            already_gone = report.already_gone,
            failures = report.failures.len(),
            "Suite torn down"
        );
        Ok(report)
    }

    async fn track(
        &self,
        suite: &mut Suite,
        kind: ResourceKind,
        name: String,
    ) -> Result<(), SuiteError> {
        self.tracker
            .record(&suite.id, kind, &name)
            .await
            .map_err(|source| SuiteError::Track {
                kind,
                name: name.clone(),
                source,
            })?;
        suite.created_resources.record(kind, name);
        Ok(())
    }

    fn fail(&self, suite: &mut Suite, err: SuiteError) -> SuiteError {
        error!(suite_id = %suite.id, error = %err, "Suite failed");
        suite.set_state(SuiteState::Failed);
        counter!("resilia_suites_total", 1, "outcome" => "failed");
        err
    }
}

async fn teardown_kind(
    gateway: Arc<dyn ResourceGateway>,
    tracker: Arc<dyn TrackerStore>,
    suite_id: &str,
    kind: ResourceKind,
) -> Result<KindTeardown, TrackerError> {
    let names = tracker.list(suite_id, kind).await?;

    let mut done = KindTeardown {
        deleted: 0,
        already_gone: 0,
        failures: Vec::new(),
    };
    for name in names {
        match gateway.delete(kind, &name).await {
            Ok(()) => {
                counter!("resilia_resources_deleted_total", 1, "kind" => kind.as_str());
                debug!(kind = %kind, name = %name, "Deleted resource");
                done.deleted += 1;
            }
            Err(e) if e.is_not_found() => {
                debug!(kind = %kind, name = %name, "Resource already gone");
                done.already_gone += 1;
            }
            Err(e) => {
                counter!("resilia_resource_delete_failures_total", 1, "kind" => kind.as_str());
                warn!(kind = %kind, name = %name, error = %e, "Failed to delete resource");
                done.failures.push(DeleteFailure {
                    kind,
                    name,
                    error: e.to_string(),
                });
            }
        }
    }
    Ok(done)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chaos::{MockWorkerRunner, PauseOptions, Worker, WorkerMode, WorkerOption};
    use crate::k8s::MockResourceGateway;
    use crate::suite::{MemoryTracker, MockTrackerStore};
    use mockall::predicate::*;

    const WEB_DEPLOYMENT: &str = r#"
apiVersion: apps/v1
kind: Deployment
metadata:
  name: web
spec:
  selector:
    matchLabels:
      app: web
  template:
    metadata:
      labels:
        app: web
    spec:
      containers:
        - name: web
          image: nginx
"#;

    const WEB_SERVICE: &str = r#"{"apiVersion":"v1","kind":"Service","metadata":{"name":"web"}}"#;

    fn engine(
        gateway: MockResourceGateway,
        runner: MockWorkerRunner,
        tracker: Arc<dyn TrackerStore>,
    ) -> SuiteEngine {
        SuiteEngine::new(Arc::new(gateway), Arc::new(runner), tracker)
    }

    fn pause_worker(target: &str) -> Worker {
        Worker::new(
            target,
            "20s",
            WorkerMode::Pause,
            [WorkerOption::pause(PauseOptions {
                duration: "10s".to_string(),
            })],
        )
    }

    #[tokio::test]
    async fn existing_resource_is_skipped() {
        let mut gateway = MockResourceGateway::new();
        gateway
            .expect_exists()
            .with(eq(ResourceKind::Deployment), eq("web"))
            .returning(|_, _| Ok(true));
        gateway.expect_apply().never();

        let tracker = Arc::new(MemoryTracker::new());
        let engine = engine(gateway, MockWorkerRunner::new(), tracker.clone());

        let mut suite = Suite::new("idempotent");
        suite.add_resource("web", ResourceKind::Deployment, WEB_DEPLOYMENT);
        engine.run_declared_resources(&mut suite).await.unwrap();

        assert!(suite.created_resources.is_empty());
        assert!(tracker.kinds(&suite.id).await.unwrap().is_empty());
        assert_eq!(suite.state, SuiteState::Applying);
    }

    #[tokio::test]
    async fn unknown_existence_still_applies() {
        let mut gateway = MockResourceGateway::new();
        gateway.expect_exists().returning(|kind, name| {
            Err(GatewayError::AlreadyExists {
                kind,
                name: name.to_string(),
            })
        });
        gateway
            .expect_apply()
            .times(1)
            .returning(|_, _| Ok("web".to_string()));

        let engine = engine(gateway, MockWorkerRunner::new(), Arc::new(MemoryTracker::new()));
        let mut suite = Suite::new("forgiving");
        let resource = suite
            .add_resource("web", ResourceKind::Deployment, WEB_DEPLOYMENT)
            .clone();

        let outcome = engine.apply_resource(&resource).await.unwrap();
        assert_eq!(outcome, ApplyOutcome::Created("web".to_string()));
    }

    #[tokio::test]
    async fn chaos_declarations_are_not_applied() {
        let mut gateway = MockResourceGateway::new();
        gateway.expect_exists().never();
        gateway.expect_apply().never();

        let engine = engine(gateway, MockWorkerRunner::new(), Arc::new(MemoryTracker::new()));
        let mut suite = Suite::new("chaos-only");
        suite.add_resource("pumba", ResourceKind::ChaosDaemonSet, "not even yaml: [");
        engine.run_declared_resources(&mut suite).await.unwrap();
        assert!(suite.created_resources.is_empty());
    }

    #[tokio::test]
    async fn invalid_manifest_fails_the_suite() {
        let mut gateway = MockResourceGateway::new();
        gateway.expect_apply().never();

        let engine = engine(gateway, MockWorkerRunner::new(), Arc::new(MemoryTracker::new()));
        let mut suite = Suite::new("broken");
        suite.add_resource("svc", ResourceKind::Service, "- just\n- a list");

        let err = engine.run_declared_resources(&mut suite).await.unwrap_err();
        assert!(matches!(err, SuiteError::Manifest { ref resource, .. } if resource == "svc"));
        assert_eq!(suite.state, SuiteState::Failed);
    }

    #[tokio::test]
    async fn untyped_manifest_is_never_applied() {
        for body in ["{}", "metadata:\n  name: web\n", "::: not yaml ["] {
            let mut gateway = MockResourceGateway::new();
            gateway.expect_exists().never();
            gateway.expect_apply().never();

            let tracker = Arc::new(MemoryTracker::new());
            let engine = engine(gateway, MockWorkerRunner::new(), tracker.clone());
            let mut suite = Suite::new("untyped");
            suite.add_resource("web", ResourceKind::Deployment, body);

            let err = engine.run_declared_resources(&mut suite).await.unwrap_err();
            assert!(
                matches!(err, SuiteError::Manifest { ref resource, .. } if resource == "web"),
                "{body:?} failed with {err:?}"
            );
            assert_eq!(suite.state, SuiteState::Failed);
            assert!(tracker.kinds(&suite.id).await.unwrap().is_empty());
        }
    }

    #[tokio::test]
    async fn apply_failure_aborts_remaining_resources() {
        let mut gateway = MockResourceGateway::new();
        gateway.expect_exists().returning(|_, _| Ok(false));
        gateway
            .expect_apply()
            .with(eq(ResourceKind::Deployment), always())
            .times(1)
            .returning(|kind, _| Err(GatewayError::MissingName { kind }));
        gateway
            .expect_apply()
            .with(eq(ResourceKind::Service), always())
            .never();

        let engine = engine(gateway, MockWorkerRunner::new(), Arc::new(MemoryTracker::new()));
        let mut suite = Suite::new("abort");
        suite.add_resource("web", ResourceKind::Deployment, WEB_DEPLOYMENT);
        suite.add_resource("web", ResourceKind::Service, WEB_SERVICE);

        let err = engine.run_declared_resources(&mut suite).await.unwrap_err();
        assert!(matches!(
            err,
            SuiteError::Apply {
                kind: ResourceKind::Deployment,
                ..
            }
        ));
        assert_eq!(suite.state, SuiteState::Failed);
        assert!(suite.created_resources.is_empty());
    }

    #[tokio::test]
    async fn tracker_failure_while_recording_is_fatal() {
        let mut gateway = MockResourceGateway::new();
        gateway.expect_exists().returning(|_, _| Ok(false));
        gateway.expect_apply().returning(|_, _| Ok("web".to_string()));

        let mut tracker = MockTrackerStore::new();
        tracker
            .expect_record()
            .returning(|_, _, _| Err(TrackerError::Unavailable("down".to_string())));

        let engine = engine(gateway, MockWorkerRunner::new(), Arc::new(tracker));
        let mut suite = Suite::new("untracked");
        suite.add_resource("web", ResourceKind::Deployment, WEB_DEPLOYMENT);

        let err = engine.run_declared_resources(&mut suite).await.unwrap_err();
        assert!(matches!(err, SuiteError::Track { .. }));
        assert_eq!(suite.state, SuiteState::Failed);
    }

    #[tokio::test]
    async fn workers_are_recorded_as_chaos_daemon_sets() {
        let mut runner = MockWorkerRunner::new();
        runner
            .expect_run()
            .times(2)
            .returning(|worker| Ok(format!("resilience-pumba-{}", worker.id())));

        let tracker = Arc::new(MemoryTracker::new());
        let engine = engine(MockResourceGateway::new(), runner, tracker.clone());

        let mut suite = Suite::new("chaos");
        suite.add_worker(pause_worker("pod-a"));
        suite.add_worker(pause_worker("pod-b"));
        engine.run_chaos_workers(&mut suite).await.unwrap();

        let expected: Vec<String> = suite
            .workers
            .iter()
            .map(|w| format!("resilience-pumba-{}", w.id()))
            .collect();
        assert_eq!(
            suite.created_resources.names(ResourceKind::ChaosDaemonSet),
            expected.as_slice()
        );
        assert_eq!(
            tracker.list(&suite.id, ResourceKind::ChaosDaemonSet).await.unwrap(),
            expected
        );
        assert_eq!(suite.state, SuiteState::Running);
    }

    #[tokio::test]
    async fn worker_failure_aborts_remaining_workers() {
        let mut runner = MockWorkerRunner::new();
        runner.expect_run().times(1).returning(|_| {
            Err(GatewayError::MissingName {
                kind: ResourceKind::ChaosDaemonSet,
            })
        });

        let engine = engine(MockResourceGateway::new(), runner, Arc::new(MemoryTracker::new()));
        let mut suite = Suite::new("chaos");
        suite.add_worker(pause_worker("pod-a"));
        suite.add_worker(pause_worker("pod-b"));

        let err = engine.run_chaos_workers(&mut suite).await.unwrap_err();
        assert!(matches!(err, SuiteError::RunWorker { ref target, .. } if target == "pod-a"));
        assert_eq!(suite.state, SuiteState::Failed);
    }

    #[tokio::test]
    async fn stop_continues_past_delete_failures() {
        let mut gateway = MockResourceGateway::new();
        gateway
            .expect_delete()
            .with(eq(ResourceKind::Service), always())
            .times(3)
            .returning(|kind, name| match name {
                "b" => Err(GatewayError::AlreadyExists {
                    kind,
                    name: name.to_string(),
                }),
                _ => Ok(()),
            });

        let tracker = Arc::new(MemoryTracker::new());
        let engine = engine(gateway, MockWorkerRunner::new(), tracker.clone());
        let mut suite = Suite::new("teardown");
        for name in ["a", "b", "c"] {
            engine
                .track(&mut suite, ResourceKind::Service, name.to_string())
                .await
                .unwrap();
        }

        let report = engine.stop(&mut suite).await.unwrap();
        assert_eq!(report.deleted, 2);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].name, "b");
        assert_eq!(suite.state, SuiteState::Stopped);
        assert_eq!(
            tracker.list(&suite.id, ResourceKind::Service).await.unwrap(),
            vec!["b"]
        );
    }

    #[tokio::test]
    async fn clean_stop_clears_the_tracker() {
        let mut gateway = MockResourceGateway::new();
        gateway
            .expect_delete()
            .with(eq(ResourceKind::Deployment), eq("web"))
            .times(1)
            .returning(|_, _| Ok(()));

        let mut tracker = MockTrackerStore::new();
        tracker
            .expect_kinds()
            .returning(|_| Ok(vec![ResourceKind::Deployment]));
        tracker
            .expect_list()
            .returning(|_, _| Ok(vec!["web".to_string()]));
        tracker
            .expect_replace()
            .withf(|_, kind, names| *kind == ResourceKind::Deployment && names.is_empty())
            .times(1)
            .returning(|_, _, _| Ok(()));
        tracker.expect_clear().times(1).returning(|_| Ok(()));

        let engine = engine(gateway, MockWorkerRunner::new(), Arc::new(tracker));
        let mut suite = Suite::new("clean");
        suite.created_resources.record(ResourceKind::Deployment, "web");

        let report = engine.stop(&mut suite).await.unwrap();
        assert!(report.is_clean());
        assert!(suite.created_resources.is_empty());
        assert_eq!(suite.state, SuiteState::Stopped);
    }

    #[tokio::test]
    async fn unreadable_tracker_fails_stop_immediately() {
        let mut gateway = MockResourceGateway::new();
        gateway.expect_delete().never();

        let mut tracker = MockTrackerStore::new();
        tracker
            .expect_kinds()
            .returning(|_| Err(TrackerError::Unavailable("down".to_string())));

        let engine = engine(gateway, MockWorkerRunner::new(), Arc::new(tracker));
        let mut suite = Suite::new("stuck");

        let err = engine.stop(&mut suite).await.unwrap_err();
        assert!(matches!(err, SuiteError::ListTracked { kind: None, .. }));
        assert_eq!(suite.state, SuiteState::Failed);
    }
}
