// procfs-based process lister (Linux)
// reason: direct-children lookup without spawning a helper process per node
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

use cascade_core::application::constants::DEFAULT_PROCFS_ROOT;
use cascade_core::domain::ProcessId;
use cascade_core::port::{ListingError, ProcessLister};

use crate::listing::parse_pids;

/// Lists direct children from `/proc`
///
/// Primary source is `/proc/<pid>/task/<tid>/children` (kernel 3.5+,
/// CONFIG_PROC_CHILDREN). Children are tracked per thread, so every task of
/// the parent is read and the results are merged. Kernels without those
/// files fall back to scanning `/proc/*/stat` for a matching ppid.
///
/// A parent that no longer exists has no children (same as pgrep).
pub struct ProcfsLister {
    root: PathBuf,
}

impl ProcfsLister {
    pub fn new() -> Self {
        Self::with_root(DEFAULT_PROCFS_ROOT)
    }

    /// Read from a procfs-shaped tree other than `/proc` (tests, chroots)
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn query_failed(parent: ProcessId, path: &Path, err: std::io::Error) -> ListingError {
        ListingError::QueryFailed {
            parent,
            reason: format!("{}: {}", path.display(), err),
        }
    }

    /// Fallback: every `/proc/<n>/stat` whose ppid field is `parent`
    async fn scan_stat(&self, parent: ProcessId) -> Result<Vec<ProcessId>, ListingError> {
        let mut entries = tokio::fs::read_dir(&self.root)
            .await
            .map_err(|e| Self::query_failed(parent, &self.root, e))?;

        let mut children = BTreeSet::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| Self::query_failed(parent, &self.root, e))?
        {
            let name = entry.file_name();
            let Some(candidate) = name.to_str().and_then(|n| n.parse::<ProcessId>().ok()) else {
                continue;
            };

            let stat_path = entry.path().join("stat");
            let stat = match tokio::fs::read_to_string(&stat_path).await {
                Ok(stat) => stat,
                // Exited while we were scanning
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(Self::query_failed(parent, &stat_path, e)),
            };

            match parse_stat_ppid(&stat) {
                Some(ppid) if ppid == parent.as_raw() => {
                    children.insert(candidate);
                }
                Some(_) => {}
                None => {
                    return Err(ListingError::Malformed {
                        parent,
                        line: stat.trim().to_string(),
                    })
                }
            }
        }

        Ok(children.into_iter().collect())
    }
}

impl Default for ProcfsLister {
    fn default() -> Self {
        Self::new()
    }
}

/// Extract the ppid from a `/proc/<pid>/stat` line.
///
/// The comm field may itself contain spaces and parentheses, so fields are
/// counted from the LAST ')'.
pub(crate) fn parse_stat_ppid(stat: &str) -> Option<i32> {
    let rest = stat.get(stat.rfind(')')? + 1..)?;
    let mut fields = rest.split_whitespace();
    let _state = fields.next()?;
    fields.next()?.parse().ok()
}

/// Extract the one-letter state from a `/proc/<pid>/stat` line
pub(crate) fn parse_stat_state(stat: &str) -> Option<char> {
    let rest = stat.get(stat.rfind(')')? + 1..)?;
    rest.split_whitespace().next()?.chars().next()
}

#[async_trait]
impl ProcessLister for ProcfsLister {
    async fn direct_children(&self, parent: ProcessId) -> Result<Vec<ProcessId>, ListingError> {
        let task_dir = self.root.join(parent.to_string()).join("task");

        let mut tasks = match tokio::fs::read_dir(&task_dir).await {
            Ok(tasks) => tasks,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(parent = %parent, "Process gone, no children");
                return Ok(Vec::new());
            }
            Err(e) => return Err(Self::query_failed(parent, &task_dir, e)),
        };

        let mut children = BTreeSet::new();
        let mut saw_children_file = false;

        while let Some(task) = tasks
            .next_entry()
            .await
            .map_err(|e| Self::query_failed(parent, &task_dir, e))?
        {
            let path = task.path().join("children");
            match tokio::fs::read_to_string(&path).await {
                Ok(contents) => {
                    saw_children_file = true;
                    children.extend(parse_pids(parent, contents.split_whitespace())?);
                }
                // Thread exited, or the kernel has no children files
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(Self::query_failed(parent, &path, e)),
            }
        }

        if !saw_children_file {
            debug!(parent = %parent, "No task children files, scanning stat entries");
            return self.scan_stat(parent).await;
        }

        let children: Vec<ProcessId> = children.into_iter().collect();
        debug!(parent = %parent, children = ?children, "procfs listed children");
        Ok(children)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn pid(n: i32) -> ProcessId {
        ProcessId::new(n).unwrap()
    }

    /// Fake `/proc` builder
    struct FakeProc {
        dir: TempDir,
    }

    impl FakeProc {
        fn new() -> Self {
            Self {
                dir: TempDir::new().unwrap(),
            }
        }

        fn children(self, pid: i32, tid: i32, contents: &str) -> Self {
            let task = self.dir.path().join(pid.to_string()).join("task").join(tid.to_string());
            fs::create_dir_all(&task).unwrap();
            fs::write(task.join("children"), contents).unwrap();
            self
        }

        fn task_without_children_file(self, pid: i32) -> Self {
            let task = self.dir.path().join(pid.to_string()).join("task").join(pid.to_string());
            fs::create_dir_all(task).unwrap();
            self
        }

        fn stat(self, pid: i32, comm: &str, ppid: i32) -> Self {
            let dir = self.dir.path().join(pid.to_string());
            fs::create_dir_all(&dir).unwrap();
            fs::write(
                dir.join("stat"),
                format!("{} ({}) S {} {} {} 0 -1 4194304\n", pid, comm, ppid, pid, pid),
            )
            .unwrap();
            self
        }

        fn lister(&self) -> ProcfsLister {
            ProcfsLister::with_root(self.dir.path())
        }
    }

    #[tokio::test]
    async fn test_reads_children_file() {
        let proc = FakeProc::new().children(100, 100, "300 200 ");

        let children = proc.lister().direct_children(pid(100)).await.unwrap();

        assert_eq!(children, vec![pid(200), pid(300)]);
    }

    #[tokio::test]
    async fn test_merges_children_of_all_threads() {
        let proc = FakeProc::new()
            .children(100, 100, "200")
            .children(100, 101, "400 200");

        let children = proc.lister().direct_children(pid(100)).await.unwrap();

        assert_eq!(children, vec![pid(200), pid(400)]);
    }

    #[tokio::test]
    async fn test_empty_children_file_is_no_children() {
        let proc = FakeProc::new().children(100, 100, "");

        let children = proc.lister().direct_children(pid(100)).await.unwrap();

        assert!(children.is_empty());
    }

    #[tokio::test]
    async fn test_vanished_parent_has_no_children() {
        let proc = FakeProc::new();

        let children = proc.lister().direct_children(pid(4242)).await.unwrap();

        assert!(children.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_children_entry() {
        let proc = FakeProc::new().children(100, 100, "200 two-hundred");

        let err = proc.lister().direct_children(pid(100)).await.unwrap_err();

        assert_eq!(
            err,
            ListingError::Malformed {
                parent: pid(100),
                line: "two-hundred".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_falls_back_to_stat_scan() {
        let proc = FakeProc::new()
            .task_without_children_file(100)
            .stat(100, "supervisor", 1)
            .stat(200, "worker (a) b", 100)
            .stat(300, "sandbox", 100)
            .stat(400, "unrelated", 1);

        let children = proc.lister().direct_children(pid(100)).await.unwrap();

        assert_eq!(children, vec![pid(200), pid(300)]);
    }

    #[test]
    fn test_parse_stat_with_parens_in_comm() {
        let stat = "200 (worker (a) b) Z 100 200 200 0 -1";
        assert_eq!(parse_stat_ppid(stat), Some(100));
        assert_eq!(parse_stat_state(stat), Some('Z'));
        assert_eq!(parse_stat_ppid("garbage"), None);
    }
}
