//! Per-invocation execution context.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::metadata::Metadata;

/// Context carried through a single function invocation.
///
/// Every host function receives the context of the invocation it serves,
/// so server-side work can be attributed to an execution id and cancelled
/// together with the enclosing request. Contexts are passed explicitly
/// through every layer; nothing in the runtime relies on thread-locals.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    execution_id: String,
    cancellation: CancellationToken,
    plugin: Option<Arc<Metadata>>,
}

impl ExecutionContext {
    /// Creates a context with a fresh execution id and its own
    /// cancellation token.
    pub fn new() -> Self {
        Self {
            execution_id: Uuid::now_v7().to_string(),
            cancellation: CancellationToken::new(),
            plugin: None,
        }
    }

    /// Creates a context bound to an existing cancellation token.
    pub fn with_cancellation(cancellation: CancellationToken) -> Self {
        Self {
            execution_id: Uuid::now_v7().to_string(),
            cancellation,
            plugin: None,
        }
    }

    /// Attaches the plugin being executed.
    pub fn with_plugin(mut self, plugin: Arc<Metadata>) -> Self {
        self.plugin = Some(plugin);
        self
    }

    /// Derives a context for a nested invocation: a fresh execution id
    /// sharing the parent's cancellation.
    pub fn child(&self) -> Self {
        Self {
            execution_id: Uuid::now_v7().to_string(),
            cancellation: self.cancellation.clone(),
            plugin: None,
        }
    }

    /// The execution id of this invocation.
    pub fn execution_id(&self) -> &str {
        &self.execution_id
    }

    /// The cancellation token for this invocation.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Whether the invocation has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Metadata of the plugin currently executing, if attached.
    pub fn plugin(&self) -> Option<&Arc<Metadata>> {
        self.plugin.as_ref()
    }
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_execution_ids_are_unique() {
        let a = ExecutionContext::new();
        let b = ExecutionContext::new();
        assert_ne!(a.execution_id(), b.execution_id());
    }

    #[test]
    fn test_child_shares_cancellation() {
        let parent = ExecutionContext::new();
        let child = parent.child();

        assert_ne!(parent.execution_id(), child.execution_id());
        assert!(!child.is_cancelled());

        parent.cancellation().cancel();
        assert!(child.is_cancelled());
    }
}
