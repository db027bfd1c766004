mod chunk;
mod registry;
mod step;
mod store;
mod traits;

pub use chunk::{chunk_count, partition, ChunkTask, KeyRange, Partition};
pub use registry::{StepRegistry, StepState, StepStatus};
pub use step::{ChunkPlan, MigrationStep, Operation, Population, QueuedTask, StepBody, StepOutcome};
pub use store::InMemoryVersionStore;
pub use traits::{
    BoxFuture, ChunkOutcome, ExecutionSink, ExtensionLifecycle, LifecycleHook, MigrationEvent,
    MigrationObserver, NoopObserver, VersionStore,
};
