use sqlx::MySqlPool;
use tracing::debug;

use accountsync_core::error::{Result, UpgradeError};
use accountsync_core::migration::{BoxFuture, ExecutionSink, KeyRange, Operation, Population};

use super::handlers::{HandlerRegistry, TaskInput};
use super::sql::{split_sql_statements, Statement};

/// Executes operations against MySQL.
///
/// SQL runs statement by statement on one connection. Statements run for a
/// chunk take the range bounds as their two `?` parameters.
pub struct MySqlExecutionSink {
    pool: MySqlPool,
    handlers: HandlerRegistry,
}

impl MySqlExecutionSink {
    pub fn new(pool: MySqlPool) -> Self {
        Self {
            pool,
            handlers: HandlerRegistry::new(),
        }
    }

    pub fn with_handlers(mut self, handlers: HandlerRegistry) -> Self {
        self.handlers = handlers;
        self
    }

    async fn bounds(&self, population: &Population) -> Result<Option<(i64, i64)>> {
        let column = quote_ident(&population.key_column)?;
        let sql = format!(
            "SELECT CAST(MIN({col}) AS SIGNED), CAST(MAX({col}) AS SIGNED) FROM {table}",
            col = column,
            table = quote_ident(&population.table)?,
        );

        let (min, max): (Option<i64>, Option<i64>) = sqlx::query_as(&sql)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| UpgradeError::Database(format!("Failed to read key bounds: {}", e)))?;

        Ok(min.zip(max))
    }

    async fn execute_sql(&self, sql: &str, range: Option<KeyRange>) -> Result<()> {
        let statements = prepare_statements(sql, range)?;
        let mut conn = self.pool.acquire().await?;

        for statement in statements {
            let query = match (range, statement.placeholders) {
                (Some(range), 2) => sqlx::query(&statement.sql).bind(range.start).bind(range.end),
                _ => sqlx::query(&statement.sql),
            };

            let result = query.execute(&mut *conn).await.map_err(|e| {
                UpgradeError::Database(format!("{} (statement: {})", e, statement.sql))
            })?;
            debug!(rows = result.rows_affected(), ?range, "Statement executed");
        }

        Ok(())
    }

    async fn call_handler(
        &self,
        name: &str,
        args: &serde_json::Value,
        range: Option<KeyRange>,
    ) -> Result<()> {
        let handler = self
            .handlers
            .get(name)
            .ok_or_else(|| UpgradeError::NotFound(format!("Task handler '{}'", name)))?;
        handler(TaskInput {
            args: args.clone(),
            range,
        })
        .await
    }
}

impl ExecutionSink for MySqlExecutionSink {
    fn key_bounds<'a>(&'a self, population: &'a Population) -> BoxFuture<'a, Option<(i64, i64)>> {
        Box::pin(self.bounds(population))
    }

    fn execute<'a>(
        &'a self,
        operation: &'a Operation,
        range: Option<KeyRange>,
    ) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            match operation {
                Operation::Sql(sql) => self.execute_sql(sql, range).await,
                Operation::Handler { name, args } => self.call_handler(name, args, range).await,
            }
        })
    }
}

/// Split `sql` and check its parameters against the range it runs over.
///
/// Without a range no statement may take parameters. Over a range every
/// statement takes either none or exactly `(start, end)`, and at least one
/// must take the range so the action stays within the chunk.
fn prepare_statements(sql: &str, range: Option<KeyRange>) -> Result<Vec<Statement>> {
    let statements = split_sql_statements(sql);

    for statement in &statements {
        match (range, statement.placeholders) {
            (_, 0) | (Some(_), 2) => {}
            (Some(_), n) => {
                return Err(UpgradeError::Configuration(format!(
                    "Chunk statement must take 2 parameters (start, end), found {}: {}",
                    n, statement.sql
                )))
            }
            (None, n) => {
                return Err(UpgradeError::Configuration(format!(
                    "Statement has {} parameter(s) but is not run over a key range: {}",
                    n, statement.sql
                )))
            }
        }
    }

    if let Some(range) = range {
        if !statements.iter().any(|s| s.placeholders == 2) {
            return Err(UpgradeError::Configuration(format!(
                "No statement is restricted to chunk [{}, {}]: {}",
                range.start,
                range.end,
                sql.trim()
            )));
        }
    }

    Ok(statements)
}

/// Quote a possibly schema-qualified identifier with backticks.
pub(crate) fn quote_ident(name: &str) -> Result<String> {
    let parts: Vec<&str> = name.split('.').collect();
    let valid = parts
        .iter()
        .all(|p| !p.is_empty() && !p.contains('`') && !p.contains('\0'));
    if !valid {
        return Err(UpgradeError::Configuration(format!(
            "Invalid identifier: {:?}",
            name
        )));
    }

    Ok(parts
        .iter()
        .map(|p| format!("`{}`", p))
        .collect::<Vec<_>>()
        .join("."))
}
