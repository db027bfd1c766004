use tracing::{debug, info, warn};

use accountsync_core::migration::{ChunkOutcome, MigrationEvent, MigrationObserver};

/// Observer that turns runner events into structured `tracing` events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl MigrationObserver for TracingObserver {
    fn on_event(&self, event: &MigrationEvent) {
        match event {
            MigrationEvent::StepStarted {
                version,
                description,
            } => info!(version, %description, "Upgrade started"),
            MigrationEvent::ChunkStarted {
                step_version,
                range_start,
                range_end,
            } => debug!(step_version, range_start, range_end, "Chunk started"),
            MigrationEvent::ChunkFinished {
                step_version,
                range_start,
                range_end,
                outcome: ChunkOutcome::Succeeded,
            } => debug!(step_version, range_start, range_end, "Chunk finished"),
            MigrationEvent::ChunkFinished {
                step_version,
                range_start,
                range_end,
                outcome: ChunkOutcome::Failed(error),
            } => warn!(step_version, range_start, range_end, %error, "Chunk failed"),
            MigrationEvent::StepFinished {
                version,
                outcome: Ok(outcome),
            } => info!(version, ?outcome, "Upgrade finished"),
            MigrationEvent::StepFinished {
                version,
                outcome: Err(error),
            } => warn!(version, %error, "Upgrade failed"),
        }
    }
}
