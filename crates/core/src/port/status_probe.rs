// Process Status Port
// Non-blocking "is this process gone?" query used after the root is killed

use crate::domain::{ProcessId, TerminationOutcome};

/// Status probe trait
///
/// Implementations must never block on the queried process: a descendant
/// that refuses to die has to surface as an outcome, not as a hang.
pub trait StatusProbe: Send + Sync {
    /// Query the current state of `pid`
    fn query(&self, pid: ProcessId) -> TerminationOutcome;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;

    /// Mock probe replaying a scripted sequence of outcomes per pid
    ///
    /// The last outcome of a script repeats forever; unscripted pids are Reaped.
    pub struct MockStatusProbe {
        scripts: Mutex<HashMap<ProcessId, VecDeque<TerminationOutcome>>>,
        calls: Mutex<HashMap<ProcessId, usize>>,
    }
    impl MockStatusProbe {
        pub fn new() -> Self {
            Self {
                scripts: Mutex::new(HashMap::new()),
                calls: Mutex::new(HashMap::new()),
            }
        }
        pub fn script(self, pid: i32, outcomes: Vec<TerminationOutcome>) -> Self {
            let pid = ProcessId::new(pid).expect("mock pid must be positive");
            self.scripts
                .lock()
                .unwrap()
                .insert(pid, outcomes.into_iter().collect());
            self
        }
        pub fn call_count(&self, pid: i32) -> usize {
            let pid = ProcessId::new(pid).expect("mock pid must be positive");
            self.calls.lock().unwrap().get(&pid).copied().unwrap_or(0)
        }
    }
    impl Default for MockStatusProbe {
        fn default() -> Self {
            Self::new()
        }
    }
    impl StatusProbe for MockStatusProbe {
        fn query(&self, pid: ProcessId) -> TerminationOutcome {
            *self.calls.lock().unwrap().entry(pid).or_insert(0) += 1;

            let mut scripts = self.scripts.lock().unwrap();
            match scripts.get_mut(&pid) {
                Some(script) if script.len() > 1 => script.pop_front().unwrap(),
                Some(script) => script.front().cloned().unwrap_or(TerminationOutcome::Reaped),
                None => TerminationOutcome::Reaped,
            }
        }
    }
}
