//! Registry of provider ids with a check in flight.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

/// Set of check ids currently being processed.
///
/// An id is claimed with [`InFlightRegistry::try_acquire`] and released when
/// the returned guard is dropped, whether the check succeeded, failed or
/// panicked.
#[derive(Debug, Clone, Default)]
pub struct InFlightRegistry {
    ids: Arc<Mutex<HashSet<String>>>,
}

impl InFlightRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `check_id`. Returns `None` if it is already in flight.
    pub fn try_acquire(&self, check_id: &str) -> Option<InFlightGuard> {
        let mut ids = self.ids.lock().unwrap_or_else(PoisonError::into_inner);
        if !ids.insert(check_id.to_string()) {
            return None;
        }
        crate::metrics::CHECKS_IN_FLIGHT.inc();
        Some(InFlightGuard {
            ids: Arc::clone(&self.ids),
            check_id: check_id.to_string(),
        })
    }

    pub fn contains(&self, check_id: &str) -> bool {
        self.ids
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(check_id)
    }

    pub fn len(&self) -> usize {
        self.ids.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Releases its check id on drop.
#[derive(Debug)]
pub struct InFlightGuard {
    ids: Arc<Mutex<HashSet<String>>>,
    check_id: String,
}

impl InFlightGuard {
    pub fn check_id(&self) -> &str {
        &self.check_id
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let mut ids = self.ids.lock().unwrap_or_else(PoisonError::into_inner);
        if ids.remove(&self.check_id) {
            crate::metrics::CHECKS_IN_FLIGHT.dec();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_is_refused_until_release() {
        let registry = InFlightRegistry::new();
        let guard = registry.try_acquire("doc-1").unwrap();
        assert!(registry.try_acquire("doc-1").is_none());
        assert!(registry.contains("doc-1"));

        drop(guard);
        assert!(registry.is_empty());
        assert!(registry.try_acquire("doc-1").is_some());
    }

    #[test]
    fn ids_are_independent() {
        let registry = InFlightRegistry::new();
        let _a = registry.try_acquire("doc-1").unwrap();
        let _b = registry.try_acquire("doc-1_other").unwrap();
        assert_eq!(registry.len(), 2);
    }

    #[tokio::test]
    async fn released_when_task_panics() {
        let registry = InFlightRegistry::new();
        let guard = registry.try_acquire("doc-1").unwrap();
        let handle = tokio::spawn(async move {
            let _guard = guard;
            panic!("check failed");
        });
        assert!(handle.await.unwrap_err().is_panic());
        assert!(!registry.contains("doc-1"));
    }
}
