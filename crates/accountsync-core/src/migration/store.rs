use std::sync::RwLock;

use super::traits::{BoxFuture, VersionStore};

/// Version store kept in process memory.
///
/// Useful for hosts that persist the version themselves, and for tests.
#[derive(Debug, Default)]
pub struct InMemoryVersionStore {
    version: RwLock<Option<i64>>,
    writes: RwLock<Vec<i64>>,
}

impl InMemoryVersionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an already-applied version.
    pub fn with_version(version: i64) -> Self {
        Self {
            version: RwLock::new(Some(version)),
            writes: RwLock::new(Vec::new()),
        }
    }

    pub fn current(&self) -> Option<i64> {
        *self.version.read().unwrap_or_else(|e| e.into_inner())
    }

    /// Every version passed to `set`, in order.
    pub fn writes(&self) -> Vec<i64> {
        self.writes.read().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl VersionStore for InMemoryVersionStore {
    fn get(&self) -> BoxFuture<'_, Option<i64>> {
        Box::pin(async move { Ok(self.current()) })
    }

    fn set(&self, version: i64) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            *self.version.write().unwrap_or_else(|e| e.into_inner()) = Some(version);
            self.writes
                .write()
                .unwrap_or_else(|e| e.into_inner())
                .push(version);
            Ok(())
        })
    }
}
