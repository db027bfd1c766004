use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::{Result, UpgradeError};
use crate::migration::{BoxFuture, ExecutionSink, KeyRange, Operation, Population};

type FailurePredicate = Box<dyn Fn(&Operation, Option<KeyRange>) -> bool + Send + Sync>;

/// Record of an executed operation.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutedOperation {
    pub operation: Operation,
    pub range: Option<KeyRange>,
    /// Whether the call was scripted to fail.
    pub failed: bool,
}

/// Execution sink that records calls instead of touching a database.
#[derive(Default)]
pub struct MockExecutionSink {
    bounds: RwLock<HashMap<String, (i64, i64)>>,
    growth: RwLock<HashMap<String, i64>>,
    failures: RwLock<Vec<(FailurePredicate, Option<usize>)>>,
    executed: RwLock<Vec<ExecutedOperation>>,
    bounds_reads: RwLock<Vec<String>>,
}

impl MockExecutionSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report `[min, max]` as the key bounds of `table`.
    pub fn with_bounds(self, table: &str, min: i64, max: i64) -> Self {
        self.bounds.write().unwrap().insert(table.to_string(), (min, max));
        self
    }

    /// After the first successful execution, raise the max key of `table`
    /// to `new_max`, as a concurrent writer would.
    pub fn grow_after_first_execute(self, table: &str, new_max: i64) -> Self {
        self.growth.write().unwrap().insert(table.to_string(), new_max);
        self
    }

    /// Fail every call matching `predicate`.
    pub fn fail_when<F>(self, predicate: F) -> Self
    where
        F: Fn(&Operation, Option<KeyRange>) -> bool + Send + Sync + 'static,
    {
        self.failures.write().unwrap().push((Box::new(predicate), None));
        self
    }

    /// Fail the first `times` calls matching `predicate`, then succeed.
    pub fn fail_times<F>(self, times: usize, predicate: F) -> Self
    where
        F: Fn(&Operation, Option<KeyRange>) -> bool + Send + Sync + 'static,
    {
        self.failures
            .write()
            .unwrap()
            .push((Box::new(predicate), Some(times)));
        self
    }

    /// Fail every call whose SQL contains `needle`.
    pub fn fail_sql_containing(self, needle: &str) -> Self {
        let needle = needle.to_string();
        self.fail_when(move |op, _| matches!(op, Operation::Sql(sql) if sql.contains(&needle)))
    }

    /// Fail the chunk starting at `start`.
    pub fn fail_range_starting_at(self, start: i64) -> Self {
        self.fail_when(move |_, range| range.map(|r| r.start) == Some(start))
    }

    /// All recorded calls, in order.
    pub fn executed(&self) -> Vec<ExecutedOperation> {
        self.executed.read().unwrap().clone()
    }

    /// Ranges of every recorded chunk call, in order.
    pub fn executed_ranges(&self) -> Vec<(i64, i64)> {
        self.executed
            .read()
            .unwrap()
            .iter()
            .filter_map(|e| e.range.map(|r| (r.start, r.end)))
            .collect()
    }

    /// Number of recorded calls.
    pub fn call_count(&self) -> usize {
        self.executed.read().unwrap().len()
    }

    /// Tables whose bounds were read, in order.
    pub fn bounds_reads(&self) -> Vec<String> {
        self.bounds_reads.read().unwrap().clone()
    }

    /// Assert the exact sequence of chunk ranges executed.
    pub fn assert_ranges(&self, expected: &[(i64, i64)]) {
        let actual = self.executed_ranges();
        assert_eq!(
            actual, expected,
            "Expected chunk ranges {:?}, got {:?}",
            expected, actual
        );
    }

    /// Assert that some call ran SQL containing `needle`.
    pub fn assert_sql_executed(&self, needle: &str) {
        let executed = self.executed.read().unwrap();
        let found = executed
            .iter()
            .any(|e| matches!(&e.operation, Operation::Sql(sql) if sql.contains(needle)));
        assert!(
            found,
            "Expected SQL containing '{}' to be executed, but it wasn't. Executed: {:?}",
            needle,
            executed.iter().map(|e| &e.operation).collect::<Vec<_>>()
        );
    }

    fn should_fail(&self, operation: &Operation, range: Option<KeyRange>) -> bool {
        let mut failures = self.failures.write().unwrap();
        for (predicate, remaining) in failures.iter_mut() {
            if !predicate(operation, range) {
                continue;
            }
            match remaining {
                None => return true,
                Some(0) => continue,
                Some(n) => {
                    *n -= 1;
                    return true;
                }
            }
        }
        false
    }

    fn apply_growth(&self) {
        let growth: Vec<(String, i64)> = self.growth.write().unwrap().drain().collect();
        let mut bounds = self.bounds.write().unwrap();
        for (table, new_max) in growth {
            if let Some(b) = bounds.get_mut(&table) {
                b.1 = new_max;
            }
        }
    }

    fn record(&self, operation: &Operation, range: Option<KeyRange>) -> Result<()> {
        let failed = self.should_fail(operation, range);
        self.executed.write().unwrap().push(ExecutedOperation {
            operation: operation.clone(),
            range,
            failed,
        });

        if failed {
            return Err(UpgradeError::Database("scripted failure".into()));
        }
        self.apply_growth();
        Ok(())
    }
}

impl ExecutionSink for MockExecutionSink {
    fn key_bounds<'a>(&'a self, population: &'a Population) -> BoxFuture<'a, Option<(i64, i64)>> {
        Box::pin(async move {
            self.bounds_reads
                .write()
                .unwrap()
                .push(population.table.clone());
            Ok(self.bounds.read().unwrap().get(&population.table).copied())
        })
    }

    fn execute<'a>(
        &'a self,
        operation: &'a Operation,
        range: Option<KeyRange>,
    ) -> BoxFuture<'a, ()> {
        Box::pin(async move { self.record(operation, range) })
    }
}
