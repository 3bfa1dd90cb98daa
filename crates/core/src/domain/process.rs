// Process Domain Model

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::error::{DomainError, Result};

/// OS-assigned process identifier (always positive)
///
/// Only meaningful while the process is live; the OS may hand the same
/// number to a new process after the old one is reaped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub struct ProcessId(i32);

impl ProcessId {
    /// Create a process ID, rejecting 0 and negative values
    /// (those address process groups or "any child" in kill/waitpid).
    pub fn new(raw: i32) -> Result<Self> {
        if raw <= 0 {
            return Err(DomainError::InvalidPid(raw.to_string()));
        }
        Ok(Self(raw))
    }

    /// Convert from `std::process::Child::id()` style values
    pub fn from_u32(raw: u32) -> Result<Self> {
        let raw = i32::try_from(raw).map_err(|_| DomainError::InvalidPid(raw.to_string()))?;
        Self::new(raw)
    }

    pub fn as_raw(&self) -> i32 {
        self.0
    }
}

impl std::fmt::Display for ProcessId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for ProcessId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self> {
        let raw: i32 = s
            .trim()
            .parse()
            .map_err(|_| DomainError::InvalidPid(s.to_string()))?;
        Self::new(raw)
    }
}

impl TryFrom<i32> for ProcessId {
    type Error = DomainError;

    fn try_from(raw: i32) -> Result<Self> {
        Self::new(raw)
    }
}

impl From<ProcessId> for i32 {
    fn from(pid: ProcessId) -> Self {
        pid.0
    }
}

/// Point-in-time snapshot of a process's transitive descendants
///
/// Stored in discovery order (pre-order: a node before its subtree).
/// Membership is the contract; order only keeps runs reproducible.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct DescendantSet(Vec<ProcessId>);

impl DescendantSet {
    /// Build a snapshot from an already-collected discovery sequence
    pub fn from_discovered(pids: Vec<ProcessId>) -> Self {
        Self(pids)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, pid: ProcessId) -> bool {
        self.0.contains(&pid)
    }

    pub fn iter(&self) -> impl Iterator<Item = ProcessId> + '_ {
        self.0.iter().copied()
    }

    /// Order-insensitive view, for comparing two snapshots
    pub fn as_set(&self) -> BTreeSet<ProcessId> {
        self.0.iter().copied().collect()
    }

    pub fn as_slice(&self) -> &[ProcessId] {
        &self.0
    }
}

impl<'a> IntoIterator for &'a DescendantSet {
    type Item = &'a ProcessId;
    type IntoIter = std::slice::Iter<'a, ProcessId>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pid_rejects_non_positive() {
        assert!(ProcessId::new(0).is_err());
        assert!(ProcessId::new(-1).is_err());
        assert_eq!(ProcessId::new(42).unwrap().as_raw(), 42);
    }

    #[test]
    fn test_pid_from_str() {
        assert_eq!("  1234 ".parse::<ProcessId>().unwrap().as_raw(), 1234);
        assert!("abc".parse::<ProcessId>().is_err());
        assert!("".parse::<ProcessId>().is_err());
        assert!("-5".parse::<ProcessId>().is_err());
    }

    #[test]
    fn test_pid_from_u32_overflow() {
        assert!(ProcessId::from_u32(u32::MAX).is_err());
        assert_eq!(ProcessId::from_u32(7).unwrap().as_raw(), 7);
    }

    #[test]
    fn test_pid_serializes_as_integer() {
        let pid = ProcessId::new(99).unwrap();
        assert_eq!(serde_json::to_string(&pid).unwrap(), "99");

        let back: ProcessId = serde_json::from_str("99").unwrap();
        assert_eq!(back, pid);
        assert!(serde_json::from_str::<ProcessId>("0").is_err());
    }

    #[test]
    fn test_descendant_set_membership_ignores_order() {
        let pid = |n| ProcessId::new(n).unwrap();
        let a = DescendantSet::from_discovered(vec![pid(10), pid(11), pid(12)]);
        let b = DescendantSet::from_discovered(vec![pid(12), pid(10), pid(11)]);

        assert_ne!(a, b);
        assert_eq!(a.as_set(), b.as_set());
        assert!(a.contains(pid(11)));
        assert!(!a.contains(pid(13)));
        assert_eq!(a.len(), 3);
    }
}
