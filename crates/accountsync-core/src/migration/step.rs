use serde::{Deserialize, Serialize};

use super::chunk::KeyRange;

/// Something the execution sink knows how to perform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    /// One or more `;`-separated SQL statements. When run for a chunk, each
    /// statement with placeholders receives the range bounds as its two
    /// positional parameters.
    Sql(String),

    /// A named handler registered by the host.
    Handler {
        name: String,
        #[serde(default)]
        args: serde_json::Value,
    },
}

impl Operation {
    pub fn sql(sql: impl Into<String>) -> Self {
        Operation::Sql(sql.into())
    }

    pub fn handler(name: impl Into<String>, args: serde_json::Value) -> Self {
        Operation::Handler {
            name: name.into(),
            args,
        }
    }
}

/// The rows a chunked step walks over, identified by an integer key column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Population {
    pub table: String,
    pub key_column: String,
}

impl Population {
    pub fn new(table: impl Into<String>, key_column: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            key_column: key_column.into(),
        }
    }
}

/// How a chunked step is split into tasks.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkPlan {
    pub population: Population,
    pub action: Operation,
    /// Overrides the runner's default chunk size.
    pub chunk_size: Option<u64>,
    /// Task title; `{start}` and `{end}` are replaced by the range bounds.
    pub title: String,
}

impl ChunkPlan {
    pub fn new(population: Population, action: Operation) -> Self {
        Self {
            population,
            action,
            chunk_size: None,
            title: "Upgrade batch ({start} => {end})".to_string(),
        }
    }

    pub fn chunk_size(mut self, size: u64) -> Self {
        self.chunk_size = Some(size);
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Render the title for one range.
    pub fn title_for(&self, range: KeyRange) -> String {
        self.title
            .replace("{start}", &range.start.to_string())
            .replace("{end}", &range.end.to_string())
    }
}

/// A titled unit of work planned up front by a step.
#[derive(Debug, Clone, PartialEq)]
pub struct QueuedTask {
    pub title: String,
    pub operation: Operation,
}

impl QueuedTask {
    pub fn new(title: impl Into<String>, operation: Operation) -> Self {
        Self {
            title: title.into(),
            operation,
        }
    }
}

/// What a step does when it runs.
#[derive(Debug, Clone, PartialEq)]
pub enum StepBody {
    /// Applied as a single all-or-nothing unit.
    Atomic(Operation),
    /// Expanded into key-range chunks when the step begins.
    Chunked(ChunkPlan),
    /// A fixed queue of tasks executed in order.
    Tasks(Vec<QueuedTask>),
}

/// One versioned upgrade.
#[derive(Debug, Clone, PartialEq)]
pub struct MigrationStep {
    pub version: i64,
    pub description: String,
    pub body: StepBody,
}

impl MigrationStep {
    pub fn new(version: i64, description: impl Into<String>, body: StepBody) -> Self {
        Self {
            version,
            description: description.into(),
            body,
        }
    }

    pub fn atomic(version: i64, description: impl Into<String>, operation: Operation) -> Self {
        Self::new(version, description, StepBody::Atomic(operation))
    }

    pub fn chunked(version: i64, description: impl Into<String>, plan: ChunkPlan) -> Self {
        Self::new(version, description, StepBody::Chunked(plan))
    }

    pub fn tasks(version: i64, description: impl Into<String>, tasks: Vec<QueuedTask>) -> Self {
        Self::new(version, description, StepBody::Tasks(tasks))
    }

    pub fn is_chunked(&self) -> bool {
        matches!(self.body, StepBody::Chunked(_))
    }
}

/// How a step completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StepOutcome {
    /// The atomic body ran.
    Atomic,
    /// Every chunk ran.
    Chunked { chunks: u64 },
    /// The chunked population had no rows.
    EmptyPopulation,
    /// Every queued task ran.
    Tasks { count: usize },
    /// Already covered by the applied version; nothing ran.
    AlreadyApplied,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_title_substitution() {
        let plan = ChunkPlan::new(
            Population::new("civicrm_contribution", "id"),
            Operation::sql("UPDATE civicrm_contribution SET x = 1 WHERE id BETWEEN ? AND ?"),
        );
        assert_eq!(
            plan.title_for(KeyRange { start: 1, end: 250 }),
            "Upgrade batch (1 => 250)"
        );

        let plan = plan.title("Backfill {start}-{end}");
        assert_eq!(
            plan.title_for(KeyRange { start: 5, end: 9 }),
            "Backfill 5-9"
        );
    }

    #[test]
    fn test_operation_serialization() {
        let op = Operation::handler("process_part", serde_json::json!({"n": 1}));
        let json = serde_json::to_value(&op).unwrap();
        assert_eq!(json["handler"]["name"], "process_part");
        assert_eq!(json["handler"]["args"]["n"], 1);

        let op = Operation::sql("SELECT 1");
        assert_eq!(serde_json::to_value(&op).unwrap()["sql"], "SELECT 1");
    }

    #[test]
    fn test_step_constructors() {
        let step = MigrationStep::atomic(1000, "add column", Operation::sql("SELECT 1"));
        assert_eq!(step.version, 1000);
        assert!(!step.is_chunked());

        let step = MigrationStep::chunked(
            1300,
            "backfill",
            ChunkPlan::new(Population::new("t", "id"), Operation::sql("SELECT 1")),
        );
        assert!(step.is_chunked());
    }
}
