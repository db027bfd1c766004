pub mod db;
pub mod migrations;

pub use db::Database;
pub use migrations::{
    accountsync_upgrades, HandlerRegistry, MigrationRunner, MySqlExecutionSink,
    MySqlVersionStore, RunReport, SqlLifecycle, TracingObserver,
};
