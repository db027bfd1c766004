use std::sync::RwLock;

use crate::migration::{ChunkOutcome, MigrationEvent, MigrationObserver};

/// Observer that keeps every event for later inspection.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: RwLock<Vec<MigrationEvent>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<MigrationEvent> {
        self.events.read().unwrap().clone()
    }

    /// Versions of every `StepStarted` event, in order.
    pub fn started_versions(&self) -> Vec<i64> {
        self.events
            .read()
            .unwrap()
            .iter()
            .filter_map(|e| match e {
                MigrationEvent::StepStarted { version, .. } => Some(*version),
                _ => None,
            })
            .collect()
    }

    /// `(range_start, range_end, succeeded)` for every finished chunk.
    pub fn finished_chunks(&self) -> Vec<(i64, i64, bool)> {
        self.events
            .read()
            .unwrap()
            .iter()
            .filter_map(|e| match e {
                MigrationEvent::ChunkFinished {
                    range_start,
                    range_end,
                    outcome,
                    ..
                } => Some((
                    *range_start,
                    *range_end,
                    *outcome == ChunkOutcome::Succeeded,
                )),
                _ => None,
            })
            .collect()
    }
}

impl MigrationObserver for RecordingObserver {
    fn on_event(&self, event: &MigrationEvent) {
        self.events.write().unwrap().push(event.clone());
    }
}
