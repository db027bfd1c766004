//! Capabilities the host provides to the runner.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

use super::chunk::KeyRange;
use super::step::{Operation, Population, StepOutcome};
use crate::error::Result;

/// Boxed future returned by the host capability traits.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Persists the highest applied upgrade version.
pub trait VersionStore: Send + Sync {
    /// The applied version, or `None` if nothing has been applied.
    fn get(&self) -> BoxFuture<'_, Option<i64>>;

    /// Record `version` as the applied high-water mark.
    fn set(&self, version: i64) -> BoxFuture<'_, ()>;
}

/// Performs operations against the data store.
///
/// The runner treats every call as opaque: it only looks at success or
/// failure. Transactions, if any, are the sink's business.
pub trait ExecutionSink: Send + Sync {
    /// Lowest and highest key of the population, or `None` when empty.
    fn key_bounds<'a>(&'a self, population: &'a Population) -> BoxFuture<'a, Option<(i64, i64)>>;

    /// Run `operation`, restricted to `range` when one is given.
    fn execute<'a>(&'a self, operation: &'a Operation, range: Option<KeyRange>)
        -> BoxFuture<'a, ()>;
}

/// Result of a single chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "error", rename_all = "lowercase")]
pub enum ChunkOutcome {
    Succeeded,
    Failed(String),
}

/// Structured progress events emitted by the runner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum MigrationEvent {
    StepStarted {
        version: i64,
        description: String,
    },
    ChunkStarted {
        step_version: i64,
        range_start: i64,
        range_end: i64,
    },
    ChunkFinished {
        step_version: i64,
        range_start: i64,
        range_end: i64,
        outcome: ChunkOutcome,
    },
    StepFinished {
        version: i64,
        outcome: std::result::Result<StepOutcome, String>,
    },
}

/// Receives runner progress events. Formatting is up to the implementation.
pub trait MigrationObserver: Send + Sync {
    fn on_event(&self, event: &MigrationEvent);
}

/// Observer that drops every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl MigrationObserver for NoopObserver {
    fn on_event(&self, _event: &MigrationEvent) {}
}

/// Extension lifecycle hooks invoked by the host.
///
/// These sit outside the upgrade state machine; every hook defaults to a
/// no-op.
pub trait ExtensionLifecycle: Send + Sync {
    fn install(&self) -> BoxFuture<'_, ()> {
        Box::pin(async { Ok(()) })
    }

    fn uninstall(&self) -> BoxFuture<'_, ()> {
        Box::pin(async { Ok(()) })
    }

    fn enable(&self) -> BoxFuture<'_, ()> {
        Box::pin(async { Ok(()) })
    }

    fn disable(&self) -> BoxFuture<'_, ()> {
        Box::pin(async { Ok(()) })
    }

    /// Dispatch a hook by kind.
    fn invoke(&self, hook: LifecycleHook) -> BoxFuture<'_, ()> {
        match hook {
            LifecycleHook::Install => self.install(),
            LifecycleHook::Uninstall => self.uninstall(),
            LifecycleHook::Enable => self.enable(),
            LifecycleHook::Disable => self.disable(),
        }
    }
}

/// Lifecycle hook kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleHook {
    Install,
    Uninstall,
    Enable,
    Disable,
}

impl fmt::Display for LifecycleHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleHook::Install => "install",
            LifecycleHook::Uninstall => "uninstall",
            LifecycleHook::Enable => "enable",
            LifecycleHook::Disable => "disable",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingLifecycle {
        enabled: AtomicUsize,
    }

    impl ExtensionLifecycle for CountingLifecycle {
        fn enable(&self) -> BoxFuture<'_, ()> {
            Box::pin(async move {
                self.enabled.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
        }
    }

    #[tokio::test]
    async fn test_lifecycle_defaults_and_dispatch() {
        let lifecycle = CountingLifecycle::default();
        lifecycle.invoke(LifecycleHook::Install).await.unwrap();
        lifecycle.invoke(LifecycleHook::Enable).await.unwrap();
        lifecycle.invoke(LifecycleHook::Disable).await.unwrap();
        assert_eq!(lifecycle.enabled.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_event_serialization() {
        let event = MigrationEvent::ChunkFinished {
            step_version: 1300,
            range_start: 0,
            range_end: 9,
            outcome: ChunkOutcome::Succeeded,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "chunk_finished");
        assert_eq!(json["step_version"], 1300);
        assert_eq!(json["outcome"]["status"], "succeeded");
    }

    #[test]
    fn test_hook_display() {
        assert_eq!(LifecycleHook::Uninstall.to_string(), "uninstall");
    }
}
