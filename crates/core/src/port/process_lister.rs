// Process Listing Port
// Abstraction over "which processes have this parent right now" (pgrep, /proc, ...)

use crate::domain::ProcessId;
use async_trait::async_trait;
use thiserror::Error;

/// Listing errors
///
/// "No children" is NOT an error: listers return `Ok(vec![])` for it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ListingError {
    #[error("Failed to start listing query for {parent}: {reason}")]
    Spawn { parent: ProcessId, reason: String },

    #[error("Malformed listing entry for parent {parent}: {line:?}")]
    Malformed { parent: ProcessId, line: String },

    #[error("Listing query for {parent} failed: {reason}")]
    QueryFailed { parent: ProcessId, reason: String },
}

/// Process Lister trait
///
/// Implementations:
/// - PgrepLister: shells out to `pgrep -P <pid>`
/// - ProcfsLister: reads `/proc/<pid>/task/*/children`
#[async_trait]
pub trait ProcessLister: Send + Sync {
    /// List the direct children of `parent` as they exist right now
    ///
    /// # Errors
    /// - ListingError::Spawn if the query could not be started
    /// - ListingError::Malformed if an entry is not a process id
    /// - ListingError::QueryFailed for any other query failure
    async fn direct_children(&self, parent: ProcessId) -> Result<Vec<ProcessId>, ListingError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    /// Mock lister backed by a static parent -> children table
    ///
    /// Unknown parents have no children.
    pub struct MockProcessLister {
        tree: HashMap<ProcessId, Result<Vec<ProcessId>, ListingError>>,
        queries: Arc<Mutex<Vec<ProcessId>>>,
    }
    impl MockProcessLister {
        pub fn new() -> Self {
            Self {
                tree: HashMap::new(),
                queries: Arc::new(Mutex::new(Vec::new())),
            }
        }
        /// Build from raw `(parent, [children])` pairs
        pub fn from_edges(edges: &[(i32, &[i32])]) -> Self {
            let mut lister = Self::new();
            for (parent, children) in edges {
                lister = lister.with_children(*parent, children);
            }
            lister
        }
        pub fn with_children(mut self, parent: i32, children: &[i32]) -> Self {
            let kids = children
                .iter()
                .map(|c| ProcessId::new(*c).expect("mock pid must be positive"))
                .collect();
            self.tree.insert(pid(parent), Ok(kids));
            self
        }
        pub fn with_error(mut self, parent: i32, error: ListingError) -> Self {
            self.tree.insert(pid(parent), Err(error));
            self
        }
        /// Parents queried so far, in call order
        pub fn queries(&self) -> Vec<ProcessId> {
            self.queries.lock().unwrap().clone()
        }
    }
    impl Default for MockProcessLister {
        fn default() -> Self {
            Self::new()
        }
    }
    fn pid(raw: i32) -> ProcessId {
        ProcessId::new(raw).expect("mock pid must be positive")
    }
    #[async_trait]
    impl ProcessLister for MockProcessLister {
        async fn direct_children(
            &self,
            parent: ProcessId,
        ) -> Result<Vec<ProcessId>, ListingError> {
            self.queries.lock().unwrap().push(parent);
            self.tree.get(&parent).cloned().unwrap_or_else(|| Ok(Vec::new()))
        }
    }
}
