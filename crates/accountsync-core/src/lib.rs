//! Core types for the Accountsync schema upgrader.
//!
//! Defines upgrade steps, key-range chunking, and the capabilities a host
//! supplies to run them: version persistence, execution, observation and
//! extension lifecycle hooks.

pub mod config;
pub mod error;
pub mod migration;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use config::AccountsyncConfig;
pub use error::{Result, UpgradeError};
pub use migration::{
    ChunkPlan, ChunkTask, ExecutionSink, ExtensionLifecycle, KeyRange, MigrationEvent,
    MigrationObserver, MigrationStep, Operation, Population, QueuedTask, StepBody, StepOutcome,
    StepRegistry, VersionStore,
};
