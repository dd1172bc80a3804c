use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::debug;

use crate::clock::TriggerHandle;

/// Process-local map of job name → armed trigger.
///
/// Rebuilt from the job table on every boot; never persisted. All access goes
/// through one mutex so loading and cancellation cannot interleave.
#[derive(Default)]
pub struct TriggerRegistry {
    handles: Mutex<HashMap<String, Arc<dyn TriggerHandle>>>,
}

impl TriggerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn map(&self) -> MutexGuard<'_, HashMap<String, Arc<dyn TriggerHandle>>> {
        self.handles.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Hold `handle` for `name`. An earlier handle under the same name is
    /// cancelled and dropped. Returns true when a handle was replaced.
    pub fn arm(&self, name: &str, handle: Arc<dyn TriggerHandle>) -> bool {
        match self.map().insert(name.to_string(), handle) {
            Some(previous) => {
                previous.cancel();
                debug!(job = %name, "replaced armed trigger");
                true
            }
            None => false,
        }
    }

    /// Remove and return the handle for `name`. The caller cancels it.
    pub fn take(&self, name: &str) -> Option<Arc<dyn TriggerHandle>> {
        self.map().remove(name)
    }

    pub fn lookup(&self, name: &str) -> Option<Arc<dyn TriggerHandle>> {
        self.map().get(name).cloned()
    }

    /// Armed job names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.map().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.map().len()
    }

    pub fn is_empty(&self) -> bool {
        self.map().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};
    use std::sync::atomic::{AtomicBool, Ordering};

    #[derive(Default)]
    struct StubTrigger {
        cancelled: AtomicBool,
    }

    impl TriggerHandle for StubTrigger {
        fn next_fire_time(&self) -> Option<DateTime<Utc>> {
            None
        }
        fn cancel(&self) {
            self.cancelled.store(true, Ordering::SeqCst);
        }
        fn is_cancelled(&self) -> bool {
            self.cancelled.load(Ordering::SeqCst)
        }
    }

    #[test]
    fn arming_same_name_replaces_and_cancels() {
        let registry = TriggerRegistry::new();
        let first = Arc::new(StubTrigger::default());
        let second = Arc::new(StubTrigger::default());

        assert!(!registry.arm("a", first.clone()));
        assert!(registry.arm("a", second.clone()));

        assert_eq!(registry.len(), 1);
        assert!(first.is_cancelled());
        assert!(!second.is_cancelled());
    }

    #[test]
    fn take_removes_entry() {
        let registry = TriggerRegistry::new();
        registry.arm("b", Arc::new(StubTrigger::default()));
        registry.arm("a", Arc::new(StubTrigger::default()));
        assert_eq!(registry.names(), vec!["a", "b"]);

        assert!(registry.take("a").is_some());
        assert!(registry.take("a").is_none());
        assert!(registry.lookup("a").is_none());
        assert!(registry.lookup("b").is_some());
        assert_eq!(registry.len(), 1);
    }
}
