mod builtin;
mod handlers;
mod lifecycle;
mod loader;
mod observer;
mod runner;
mod sink;
mod sql;
mod store;

pub use builtin::accountsync_upgrades;
pub use handlers::{BoxedTaskHandler, HandlerRegistry, TaskInput};
pub use lifecycle::SqlLifecycle;
pub use loader::load_steps_from_dir;
pub use observer::TracingObserver;
pub use runner::{AppliedStep, MigrationRunner, PlannedStep, RunReport};
pub use sink::MySqlExecutionSink;
pub use sql::{split_sql_statements, Statement};
pub use store::MySqlVersionStore;
