//! Ordered, resumable upgrade runner.
//!
//! Steps run one at a time in ascending version order. A chunked step reads
//! its key bounds when it starts and walks them in ascending ranges; the
//! first failing chunk halts the run. The applied version only advances
//! after a step has fully completed, so a failed step is selected again on
//! the next run and starts over from its first chunk.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use accountsync_core::config::{UpgraderConfig, DEFAULT_CHUNK_SIZE};
use accountsync_core::error::{Result, UpgradeError};
use accountsync_core::migration::{
    chunk_count, ChunkOutcome, ChunkPlan, ChunkTask, ExecutionSink, MigrationEvent,
    MigrationObserver, MigrationStep, NoopObserver, QueuedTask, StepBody, StepOutcome,
    StepRegistry, StepStatus, VersionStore,
};

/// Runs registered upgrade steps against a store and sink.
pub struct MigrationRunner {
    registry: StepRegistry,
    store: Arc<dyn VersionStore>,
    sink: Arc<dyn ExecutionSink>,
    observer: Arc<dyn MigrationObserver>,
    chunk_size: u64,
}

/// A step that completed during a run.
#[derive(Debug, Clone, Serialize)]
pub struct AppliedStep {
    pub version: i64,
    pub outcome: StepOutcome,
}

/// Summary of a successful run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    /// Applied version when the run began.
    pub starting_version: Option<i64>,
    pub applied: Vec<AppliedStep>,
    pub elapsed_ms: u128,
}

impl RunReport {
    /// Applied version when the run finished.
    pub fn final_version(&self) -> Option<i64> {
        self.applied
            .last()
            .map(|s| s.version)
            .or(self.starting_version)
    }
}

/// A pending step with the work it would do if run now.
#[derive(Debug, Clone, Serialize)]
pub struct PlannedStep {
    pub version: i64,
    pub description: String,
    /// Chunks a chunked step would generate from the current bounds.
    pub chunks: Option<u64>,
}

impl MigrationRunner {
    /// Create a runner over `steps`.
    ///
    /// Fails with a configuration error if two steps share a version.
    pub fn new(
        steps: Vec<MigrationStep>,
        store: Arc<dyn VersionStore>,
        sink: Arc<dyn ExecutionSink>,
    ) -> Result<Self> {
        Ok(Self {
            registry: StepRegistry::new(steps)?,
            store,
            sink,
            observer: Arc::new(NoopObserver),
            chunk_size: DEFAULT_CHUNK_SIZE,
        })
    }

    pub fn with_observer(mut self, observer: Arc<dyn MigrationObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Default chunk size for chunked steps that don't set one.
    pub fn with_chunk_size(mut self, chunk_size: u64) -> Result<Self> {
        if chunk_size == 0 {
            return Err(UpgradeError::Configuration(
                "chunk size must be at least 1".into(),
            ));
        }
        self.chunk_size = chunk_size;
        Ok(self)
    }

    pub fn with_config(self, config: &UpgraderConfig) -> Result<Self> {
        config.validate()?;
        self.with_chunk_size(config.chunk_size)
    }

    pub fn registry(&self) -> &StepRegistry {
        &self.registry
    }

    /// Steps with a version above `current`, ascending.
    pub fn plan_steps(&self, current: Option<i64>) -> Vec<&MigrationStep> {
        self.registry.pending(current).collect()
    }

    /// Apply every pending step in order, recording each as it completes.
    ///
    /// Halts at the first failure; steps applied before it stay recorded.
    pub async fn run(&self) -> Result<RunReport> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let start = Instant::now();

        let starting_version = self.store.get().await?;
        let pending = self.plan_steps(starting_version);

        if pending.is_empty() {
            info!(%run_id, current = ?starting_version, "Schema is up to date");
        } else {
            info!(
                %run_id,
                current = ?starting_version,
                pending = pending.len(),
                "Running pending upgrades"
            );
        }

        let mut applied = Vec::with_capacity(pending.len());
        for step in pending {
            let outcome = self.run_step(step).await?;
            applied.push(AppliedStep {
                version: step.version,
                outcome,
            });
        }

        let report = RunReport {
            run_id,
            started_at,
            starting_version,
            applied,
            elapsed_ms: start.elapsed().as_millis(),
        };
        info!(
            %run_id,
            applied = report.applied.len(),
            version = ?report.final_version(),
            elapsed_ms = report.elapsed_ms as u64,
            "Upgrade run complete"
        );
        Ok(report)
    }

    /// Run one step and record it as applied on success.
    ///
    /// A step already covered by the applied version is skipped. Any other
    /// step must be registered and be the next pending one; recording a
    /// later version would mark the steps before it as applied.
    pub async fn run_step(&self, step: &MigrationStep) -> Result<StepOutcome> {
        if self.registry.get(step.version) != Some(step) {
            return Err(UpgradeError::Configuration(format!(
                "Upgrade {} is not registered with this runner",
                step.version
            )));
        }

        let current = self.store.get().await?;
        if current.is_some_and(|c| step.version <= c) {
            debug!(version = step.version, "Upgrade already applied, skipping");
            return Ok(StepOutcome::AlreadyApplied);
        }

        let next = self.registry.pending(current).next().map(|s| s.version);
        if next != Some(step.version) {
            return Err(UpgradeError::Configuration(format!(
                "Upgrade {} cannot run before {}",
                step.version,
                next.map_or_else(|| "nothing".to_string(), |v| v.to_string())
            )));
        }

        info!(version = step.version, "Applying update {}", step.version);
        self.observer.on_event(&MigrationEvent::StepStarted {
            version: step.version,
            description: step.description.clone(),
        });

        let result = match &step.body {
            StepBody::Atomic(operation) => self
                .sink
                .execute(operation, None)
                .await
                .map(|_| StepOutcome::Atomic)
                .map_err(|e| UpgradeError::StepExecution {
                    version: step.version,
                    message: e.to_string(),
                }),
            StepBody::Chunked(plan) => self.run_chunked(step.version, plan).await,
            StepBody::Tasks(tasks) => self.run_tasks(step.version, tasks).await,
        };

        let result = match result {
            Ok(outcome) => self.store.set(step.version).await.map(|_| outcome),
            Err(e) => Err(e),
        };

        self.observer.on_event(&MigrationEvent::StepFinished {
            version: step.version,
            outcome: result.as_ref().copied().map_err(|e| e.to_string()),
        });

        match &result {
            Ok(outcome) => info!(version = step.version, ?outcome, "Upgrade applied"),
            Err(e) => warn!(version = step.version, error = %e, "Upgrade failed"),
        }
        result
    }

    /// Apply one chunk's action to its key range.
    pub async fn run_chunk(&self, step_version: i64, task: &ChunkTask) -> Result<()> {
        debug!(
            version = step_version,
            range_start = task.range.start,
            range_end = task.range.end,
            "{}",
            task.title
        );
        self.observer.on_event(&MigrationEvent::ChunkStarted {
            step_version,
            range_start: task.range.start,
            range_end: task.range.end,
        });

        let result = self
            .sink
            .execute(&task.action, Some(task.range))
            .await
            .map_err(|e| UpgradeError::ChunkExecution {
                version: step_version,
                range_start: task.range.start,
                range_end: task.range.end,
                message: e.to_string(),
            });

        self.observer.on_event(&MigrationEvent::ChunkFinished {
            step_version,
            range_start: task.range.start,
            range_end: task.range.end,
            outcome: match &result {
                Ok(()) => ChunkOutcome::Succeeded,
                Err(e) => ChunkOutcome::Failed(e.to_string()),
            },
        });

        result
    }

    async fn run_chunked(&self, version: i64, plan: &ChunkPlan) -> Result<StepOutcome> {
        // Bounds are read once; rows added above `max` later are not covered.
        let bounds = self
            .sink
            .key_bounds(&plan.population)
            .await
            .map_err(|e| UpgradeError::StepExecution {
                version,
                message: format!(
                    "reading key bounds of {}.{}: {}",
                    plan.population.table, plan.population.key_column, e
                ),
            })?;

        let (min, max) = match bounds {
            Some((min, max)) if min <= max => (min, max),
            _ => {
                info!(version, table = %plan.population.table, "No rows to process");
                return Ok(StepOutcome::EmptyPopulation);
            }
        };

        let chunk_size = plan.chunk_size.unwrap_or(self.chunk_size);
        info!(
            version,
            min,
            max,
            chunks = chunk_count(min, max, chunk_size),
            "Planning chunked update {}",
            version
        );

        let mut chunks = 0;
        for task in plan.tasks(min, max, self.chunk_size)? {
            self.run_chunk(version, &task).await?;
            chunks += 1;
        }
        Ok(StepOutcome::Chunked { chunks })
    }

    async fn run_tasks(&self, version: i64, tasks: &[QueuedTask]) -> Result<StepOutcome> {
        for (idx, task) in tasks.iter().enumerate() {
            debug!(version, task = idx + 1, of = tasks.len(), "{}", task.title);
            self.sink
                .execute(&task.operation, None)
                .await
                .map_err(|e| UpgradeError::StepExecution {
                    version,
                    message: format!("task '{}': {}", task.title, e),
                })?;
        }
        Ok(StepOutcome::Tasks { count: tasks.len() })
    }

    /// Applied/pending state of every registered step.
    pub async fn status(&self) -> Result<Vec<StepStatus>> {
        let current = self.store.get().await?;
        Ok(self.registry.status(current))
    }

    /// Pending steps, with the chunk count each chunked step would produce
    /// from the current key bounds.
    pub async fn preview(&self) -> Result<Vec<PlannedStep>> {
        let current = self.store.get().await?;
        let mut planned = Vec::new();
        for step in self.plan_steps(current) {
            let chunks = match &step.body {
                StepBody::Chunked(plan) => {
                    let size = plan.chunk_size.unwrap_or(self.chunk_size);
                    let count = match self.sink.key_bounds(&plan.population).await? {
                        Some((min, max)) => chunk_count(min, max, size),
                        None => 0,
                    };
                    Some(count)
                }
                _ => None,
            };
            planned.push(PlannedStep {
                version: step.version,
                description: step.description.clone(),
                chunks,
            });
        }
        Ok(planned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use accountsync_core::migration::{Operation, Population, StepState};
    use accountsync_core::testing::{InMemoryVersionStore, MockExecutionSink, RecordingObserver};
    use serde_json::json;

    fn atomic(version: i64, sql: &str) -> MigrationStep {
        MigrationStep::atomic(version, format!("update {}", version), Operation::sql(sql))
    }

    fn chunked(version: i64, table: &str, size: u64) -> MigrationStep {
        MigrationStep::chunked(
            version,
            format!("backfill {}", table),
            ChunkPlan::new(
                Population::new(table, "id"),
                Operation::sql(format!(
                    "UPDATE {} SET x = 0 WHERE id BETWEEN ? AND ?",
                    table
                )),
            )
            .chunk_size(size),
        )
    }

    struct Harness {
        store: Arc<InMemoryVersionStore>,
        sink: Arc<MockExecutionSink>,
        observer: Arc<RecordingObserver>,
        runner: MigrationRunner,
    }

    fn harness(
        steps: Vec<MigrationStep>,
        store: InMemoryVersionStore,
        sink: MockExecutionSink,
    ) -> Harness {
        let store = Arc::new(store);
        let sink = Arc::new(sink);
        let observer = Arc::new(RecordingObserver::new());
        let runner = MigrationRunner::new(steps, store.clone(), sink.clone())
            .unwrap()
            .with_observer(observer.clone());
        Harness {
            store,
            sink,
            observer,
            runner,
        }
    }

    #[test]
    fn test_plan_steps_filters_and_sorts() {
        let h = harness(
            vec![atomic(1200, "C"), atomic(1000, "A"), atomic(1100, "B")],
            InMemoryVersionStore::new(),
            MockExecutionSink::new(),
        );
        let versions = |current| {
            h.runner
                .plan_steps(current)
                .iter()
                .map(|s| s.version)
                .collect::<Vec<_>>()
        };
        assert_eq!(versions(None), vec![1000, 1100, 1200]);
        assert_eq!(versions(Some(1000)), vec![1100, 1200]);
        assert!(versions(Some(1200)).is_empty());
    }

    #[test]
    fn test_duplicate_versions_fail_fast() {
        let result = MigrationRunner::new(
            vec![atomic(1000, "A"), atomic(1000, "B")],
            Arc::new(InMemoryVersionStore::new()),
            Arc::new(MockExecutionSink::new()),
        );
        assert!(matches!(result, Err(UpgradeError::Configuration(_))));
    }

    #[test]
    fn test_zero_chunk_size_rejected() {
        let runner = MigrationRunner::new(
            vec![],
            Arc::new(InMemoryVersionStore::new()),
            Arc::new(MockExecutionSink::new()),
        )
        .unwrap();
        assert!(runner.with_chunk_size(0).is_err());
    }

    #[tokio::test]
    async fn test_runs_in_version_order() {
        let h = harness(
            vec![atomic(1200, "C"), atomic(1000, "A"), atomic(1100, "B")],
            InMemoryVersionStore::new(),
            MockExecutionSink::new(),
        );

        let report = h.runner.run().await.unwrap();
        assert_eq!(report.final_version(), Some(1200));
        assert_eq!(h.store.writes(), vec![1000, 1100, 1200]);
        assert_eq!(h.observer.started_versions(), vec![1000, 1100, 1200]);
        let sql: Vec<_> = h
            .sink
            .executed()
            .into_iter()
            .map(|e| e.operation)
            .collect();
        assert_eq!(
            sql,
            vec![Operation::sql("A"), Operation::sql("B"), Operation::sql("C")]
        );
    }

    #[tokio::test]
    async fn test_chunked_step_partitions_range() {
        let h = harness(
            vec![chunked(1300, "civicrm_account_invoice", 10)],
            InMemoryVersionStore::new(),
            MockExecutionSink::new().with_bounds("civicrm_account_invoice", 0, 23),
        );

        let step = h.runner.registry().get(1300).unwrap();
        let outcome = h.runner.run_step(step).await.unwrap();
        assert_eq!(outcome, StepOutcome::Chunked { chunks: 3 });
        h.sink.assert_ranges(&[(0, 9), (10, 19), (20, 23)]);
        assert_eq!(h.store.current(), Some(1300));
        assert_eq!(
            h.observer.finished_chunks(),
            vec![(0, 9, true), (10, 19, true), (20, 23, true)]
        );
    }

    #[tokio::test]
    async fn test_chunked_step_uses_runner_default_chunk_size() {
        let step = MigrationStep::chunked(
            1300,
            "backfill",
            ChunkPlan::new(Population::new("t", "id"), Operation::sql("UPDATE t")),
        );
        let h = harness(
            vec![step],
            InMemoryVersionStore::new(),
            MockExecutionSink::new().with_bounds("t", 1, 7),
        );
        let runner = h.runner.with_chunk_size(4).unwrap();

        runner.run().await.unwrap();
        h.sink.assert_ranges(&[(1, 4), (5, 7)]);
    }

    #[tokio::test]
    async fn test_empty_population_is_success() {
        // No bounds registered: the table has no rows.
        let h = harness(
            vec![chunked(1300, "civicrm_account_invoice", 10)],
            InMemoryVersionStore::new(),
            MockExecutionSink::new(),
        );

        let report = h.runner.run().await.unwrap();
        assert_eq!(report.applied[0].outcome, StepOutcome::EmptyPopulation);
        assert_eq!(h.sink.call_count(), 0);
        assert_eq!(h.store.current(), Some(1300));
    }

    #[tokio::test]
    async fn test_inverted_bounds_treated_as_empty() {
        let h = harness(
            vec![chunked(1300, "t", 10)],
            InMemoryVersionStore::new(),
            MockExecutionSink::new().with_bounds("t", 5, 4),
        );
        let report = h.runner.run().await.unwrap();
        assert_eq!(report.applied[0].outcome, StepOutcome::EmptyPopulation);
    }

    #[tokio::test]
    async fn test_failed_chunk_halts_step() {
        let h = harness(
            vec![chunked(1300, "t", 10), atomic(1400, "AFTER")],
            InMemoryVersionStore::with_version(1200),
            MockExecutionSink::new()
                .with_bounds("t", 0, 49)
                .fail_range_starting_at(10),
        );

        let err = h.runner.run().await.unwrap_err();
        match err {
            UpgradeError::ChunkExecution {
                version,
                range_start,
                range_end,
                ..
            } => {
                assert_eq!(version, 1300);
                assert_eq!((range_start, range_end), (10, 19));
            }
            other => panic!("unexpected error: {other:?}"),
        }

        // Chunks 3-5 and the next step never ran; nothing was recorded.
        h.sink.assert_ranges(&[(0, 9), (10, 19)]);
        assert_eq!(h.sink.call_count(), 2);
        assert_eq!(h.store.current(), Some(1200));
        assert!(h.store.writes().is_empty());
        assert_eq!(
            h.observer.finished_chunks(),
            vec![(0, 9, true), (10, 19, false)]
        );
    }

    #[tokio::test]
    async fn test_retry_restarts_step_from_first_chunk() {
        let h = harness(
            vec![chunked(1300, "t", 10)],
            InMemoryVersionStore::new(),
            MockExecutionSink::new()
                .with_bounds("t", 0, 29)
                .fail_times(1, |_, range| range.map(|r| r.start) == Some(20)),
        );

        assert!(h.runner.run().await.is_err());
        let report = h.runner.run().await.unwrap();

        assert_eq!(report.applied[0].outcome, StepOutcome::Chunked { chunks: 3 });
        h.sink
            .assert_ranges(&[(0, 9), (10, 19), (20, 29), (0, 9), (10, 19), (20, 29)]);
        assert_eq!(h.store.writes(), vec![1300]);
    }

    #[tokio::test]
    async fn test_atomic_failure_then_rerun_attempts_only_failed_step() {
        let h = harness(
            vec![atomic(1000, "OK"), atomic(1100, "BROKEN")],
            InMemoryVersionStore::new(),
            MockExecutionSink::new().fail_times(1, |op, _| *op == Operation::sql("BROKEN")),
        );

        let err = h.runner.run().await.unwrap_err();
        assert!(matches!(
            err,
            UpgradeError::StepExecution { version: 1100, .. }
        ));
        assert_eq!(h.store.current(), Some(1000));
        let states: Vec<StepState> = h
            .runner
            .status()
            .await
            .unwrap()
            .iter()
            .map(|s| s.state)
            .collect();
        assert_eq!(states, vec![StepState::Applied, StepState::Pending]);

        let report = h.runner.run().await.unwrap();
        assert_eq!(report.starting_version, Some(1000));
        assert_eq!(report.applied.len(), 1);
        assert_eq!(report.applied[0].version, 1100);
        assert_eq!(h.store.writes(), vec![1000, 1100]);
        assert_eq!(h.observer.started_versions(), vec![1000, 1100, 1100]);
    }

    #[tokio::test]
    async fn test_applied_step_not_rerun() {
        let h = harness(
            vec![atomic(1000, "A")],
            InMemoryVersionStore::new(),
            MockExecutionSink::new(),
        );

        h.runner.run().await.unwrap();
        let report = h.runner.run().await.unwrap();
        assert!(report.applied.is_empty());
        assert_eq!(h.sink.call_count(), 1);

        let step = h.runner.registry().get(1000).unwrap();
        assert_eq!(
            h.runner.run_step(step).await.unwrap(),
            StepOutcome::AlreadyApplied
        );
        assert_eq!(h.sink.call_count(), 1);
    }

    #[tokio::test]
    async fn test_run_step_out_of_order_rejected() {
        let h = harness(
            vec![atomic(1000, "A"), atomic(1100, "B"), atomic(1200, "C")],
            InMemoryVersionStore::new(),
            MockExecutionSink::new(),
        );

        let step = h.runner.registry().get(1200).unwrap();
        let err = h.runner.run_step(step).await.unwrap_err();
        assert!(matches!(err, UpgradeError::Configuration(_)));
        assert_eq!(h.sink.call_count(), 0);
        assert_eq!(h.store.current(), None);

        let report = h.runner.run().await.unwrap();
        let versions: Vec<i64> = report.applied.iter().map(|s| s.version).collect();
        assert_eq!(versions, vec![1000, 1100, 1200]);
        assert_eq!(h.sink.call_count(), 3);
    }

    #[tokio::test]
    async fn test_run_step_unregistered_rejected() {
        let h = harness(
            vec![atomic(1000, "A")],
            InMemoryVersionStore::new(),
            MockExecutionSink::new(),
        );

        let err = h.runner.run_step(&atomic(1000, "other")).await.unwrap_err();
        assert!(matches!(err, UpgradeError::Configuration(_)));
        let err = h.runner.run_step(&atomic(900, "Z")).await.unwrap_err();
        assert!(matches!(err, UpgradeError::Configuration(_)));
        assert_eq!(h.sink.call_count(), 0);
        assert_eq!(h.store.current(), None);
    }

    #[tokio::test]
    async fn test_bounds_read_once_at_step_start() {
        let h = harness(
            vec![chunked(1300, "t", 10)],
            InMemoryVersionStore::new(),
            MockExecutionSink::new()
                .with_bounds("t", 0, 19)
                .grow_after_first_execute("t", 45),
        );

        h.runner.run().await.unwrap();
        // Rows added above the start-time max are left for a later step.
        h.sink.assert_ranges(&[(0, 9), (10, 19)]);
        assert_eq!(h.sink.bounds_reads(), vec!["t".to_string()]);
    }

    #[tokio::test]
    async fn test_task_queue_runs_in_order_and_halts() {
        let step = MigrationStep::tasks(
            4202,
            "process in parts",
            vec![
                QueuedTask::new("Process first step", Operation::handler("part1", json!([1, 2]))),
                QueuedTask::new("Process second step", Operation::handler("part2", json!([3, 4]))),
                QueuedTask::new("Process third step", Operation::handler("part3", json!([5]))),
            ],
        );
        let h = harness(
            vec![step],
            InMemoryVersionStore::new(),
            MockExecutionSink::new().fail_when(|op, _| {
                matches!(op, Operation::Handler { name, .. } if name == "part2")
            }),
        );

        let err = h.runner.run().await.unwrap_err();
        match err {
            UpgradeError::StepExecution { version, message } => {
                assert_eq!(version, 4202);
                assert!(message.contains("Process second step"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(h.sink.call_count(), 2);
        assert_eq!(h.store.current(), None);
    }

    #[tokio::test]
    async fn test_status_and_preview() {
        let h = harness(
            vec![atomic(1000, "A"), chunked(1300, "t", 10)],
            InMemoryVersionStore::with_version(1000),
            MockExecutionSink::new().with_bounds("t", 1, 95),
        );

        let status = h.runner.status().await.unwrap();
        assert_eq!(status.len(), 2);
        assert_eq!(status[0].state, StepState::Applied);
        assert_eq!(status[1].state, StepState::Pending);

        let preview = h.runner.preview().await.unwrap();
        assert_eq!(preview.len(), 1);
        assert_eq!(preview[0].version, 1300);
        assert_eq!(preview[0].chunks, Some(10));
        assert_eq!(h.sink.call_count(), 0);
    }
}
