// Descendant enumeration
use crate::domain::{DescendantSet, ProcessId};
use crate::port::{ListingError, ProcessLister};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

/// Builds point-in-time snapshots of a process's descendant tree
pub struct DescendantEnumerator {
    lister: Arc<dyn ProcessLister>,
}

impl DescendantEnumerator {
    /// Create a new enumerator
    ///
    /// # Example
    /// ```ignore
    /// let enumerator = DescendantEnumerator::new(Arc::new(ProcfsLister::new()));
    /// let snapshot = enumerator.descendants(root_pid).await?;
    /// ```
    pub fn new(lister: Arc<dyn ProcessLister>) -> Self {
        Self { lister }
    }

    /// Collect every transitive descendant of `root`
    ///
    /// Algorithm:
    /// 1. List the direct children of `root`
    /// 2. Pop the next pid from an explicit stack, record it, list its children
    /// 3. Push those children in reverse so they pop in listing order
    ///
    /// This is a depth-first pre-order walk (node before its subtree) with one
    /// listing query per node. The root itself is never part of the result.
    ///
    /// # Errors
    /// Any listing error aborts the walk; the partial snapshot is dropped.
    pub async fn descendants(&self, root: ProcessId) -> Result<DescendantSet, ListingError> {
        let mut discovered = Vec::new();
        let mut seen = HashSet::from([root]);

        let mut frontier = self.lister.direct_children(root).await?;
        frontier.reverse();

        while let Some(pid) = frontier.pop() {
            // A reused pid can make the "tree" loop back on itself
            if !seen.insert(pid) {
                debug!(pid = %pid, "Skipping already discovered pid");
                continue;
            }
            discovered.push(pid);

            let mut children = self.lister.direct_children(pid).await?;
            debug!(parent = %pid, children = ?children, "Listed children");
            children.reverse();
            frontier.extend(children);
        }

        info!(root = %root, count = discovered.len(), "Descendant snapshot taken");
        Ok(DescendantSet::from_discovered(discovered))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::process_lister::mocks::MockProcessLister;

    fn pid(n: i32) -> ProcessId {
        ProcessId::new(n).unwrap()
    }

    fn pids(raw: &[i32]) -> Vec<ProcessId> {
        raw.iter().copied().map(pid).collect()
    }

    #[tokio::test]
    async fn test_no_children_is_empty_not_error() {
        let enumerator = DescendantEnumerator::new(Arc::new(MockProcessLister::new()));

        let snapshot = tokio_test::assert_ok!(enumerator.descendants(pid(100)).await);

        assert!(snapshot.is_empty());
    }

    #[tokio::test]
    async fn test_two_children_one_grandchild_each() {
        // 100 -> {200, 300}, 200 -> 210, 300 -> 310
        let lister = Arc::new(MockProcessLister::from_edges(&[
            (100, &[200, 300]),
            (200, &[210]),
            (300, &[310]),
        ]));
        let enumerator = DescendantEnumerator::new(lister.clone());

        let snapshot = enumerator.descendants(pid(100)).await.unwrap();

        assert_eq!(snapshot.len(), 4);
        assert_eq!(snapshot.as_set(), pids(&[200, 210, 300, 310]).into_iter().collect());
        // One listing query per node, root included
        assert_eq!(lister.queries().len(), 5);
    }

    #[tokio::test]
    async fn test_pre_order_records_node_before_subtree() {
        let lister = Arc::new(MockProcessLister::from_edges(&[
            (1, &[2, 5]),
            (2, &[3, 4]),
            (5, &[6]),
            (6, &[7]),
        ]));
        let enumerator = DescendantEnumerator::new(lister);

        let snapshot = enumerator.descendants(pid(1)).await.unwrap();

        assert_eq!(snapshot.as_slice(), pids(&[2, 3, 4, 5, 6, 7]).as_slice());
    }

    #[tokio::test]
    async fn test_repeated_enumeration_is_stable() {
        let lister = Arc::new(MockProcessLister::from_edges(&[(10, &[11, 12]), (12, &[13])]));
        let enumerator = DescendantEnumerator::new(lister);

        let first = enumerator.descendants(pid(10)).await.unwrap();
        let second = enumerator.descendants(pid(10)).await.unwrap();

        assert_eq!(first.as_set(), second.as_set());
    }

    #[tokio::test]
    async fn test_malformed_listing_discards_partial_result() {
        let lister = Arc::new(
            MockProcessLister::from_edges(&[(1, &[2, 3]), (2, &[4])]).with_error(
                3,
                ListingError::Malformed {
                    parent: pid(3),
                    line: "not-a-pid".to_string(),
                },
            ),
        );
        let enumerator = DescendantEnumerator::new(lister);

        let err = tokio_test::assert_err!(enumerator.descendants(pid(1)).await);

        assert!(matches!(err, ListingError::Malformed { parent, .. } if parent == pid(3)));
    }

    #[tokio::test]
    async fn test_root_listing_failure_is_fatal() {
        let lister = Arc::new(MockProcessLister::new().with_error(
            1,
            ListingError::Spawn {
                parent: pid(1),
                reason: "pgrep: not found".to_string(),
            },
        ));
        let enumerator = DescendantEnumerator::new(lister);

        let result = enumerator.descendants(pid(1)).await;

        assert!(matches!(result, Err(ListingError::Spawn { .. })));
    }

    #[tokio::test]
    async fn test_cycle_from_pid_reuse_terminates() {
        // 2 claims 1 (the root) and itself as children
        let lister = Arc::new(MockProcessLister::from_edges(&[(1, &[2]), (2, &[1, 2, 3])]));
        let enumerator = DescendantEnumerator::new(lister);

        let snapshot = enumerator.descendants(pid(1)).await.unwrap();

        assert_eq!(snapshot.as_slice(), pids(&[2, 3]).as_slice());
    }
}
