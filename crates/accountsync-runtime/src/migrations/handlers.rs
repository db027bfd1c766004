use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use accountsync_core::migration::KeyRange;
use accountsync_core::Result;
use serde_json::Value;

/// Input passed to a task handler.
#[derive(Debug, Clone)]
pub struct TaskInput {
    /// Arguments given when the task was planned.
    pub args: Value,
    /// Chunk bounds, when the handler runs as a chunk action.
    pub range: Option<KeyRange>,
}

/// Type alias for boxed task handler function.
pub type BoxedTaskHandler =
    Arc<dyn Fn(TaskInput) -> Pin<Box<dyn Future<Output = Result<()>> + Send>> + Send + Sync>;

/// Registry of named handlers referenced by `Operation::Handler`.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, BoxedTaskHandler>,
}

impl HandlerRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register a handler under `name`, replacing any previous one.
    pub fn register<F, Fut>(&mut self, name: impl Into<String>, handler: F)
    where
        F: Fn(TaskInput) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let handler: BoxedTaskHandler = Arc::new(move |input| Box::pin(handler(input)));
        self.handlers.insert(name.into(), handler);
    }

    /// Get a handler by name.
    pub fn get(&self, name: &str) -> Option<BoxedTaskHandler> {
        self.handlers.get(name).cloned()
    }

    /// Check if a handler exists.
    pub fn exists(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Get all handler names.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}
