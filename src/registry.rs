// Copyright 2022 Jeff Kim <hiking90@gmail.com>
// SPDX-License-Identifier: Apache-2.0

use std::sync::{Arc, Mutex, PoisonError};

use papaya::HashMap;

use crate::StatisticName;

/// Process-wide name to instance table for one statistic kind.
///
/// Lookups of already-registered names go through the lock-free map. Only
/// first registration serializes on `registration`, so two racing callers
/// with the same name always end up sharing one instance.
pub struct Registry<T> {
    kind: &'static str,
    entries: HashMap<String, Arc<T>>,
    registration: Mutex<()>,
}

impl<T: Send + Sync> Registry<T> {
    pub(crate) fn new(kind: &'static str) -> Self {
        Self {
            kind,
            entries: HashMap::new(),
            registration: Mutex::new(()),
        }
    }

    pub(crate) fn find(&self, name: &str) -> Option<Arc<T>> {
        self.entries.pin().get(name).cloned()
    }

    /// Returns the registered instance for `name`, creating it with `create`
    /// when absent. The flag is `true` when this call created the instance.
    pub(crate) fn find_or_insert_with(
        &self,
        name: &StatisticName,
        create: impl FnOnce() -> T,
    ) -> (Arc<T>, bool) {
        if let Some(existing) = self.find(name.as_str()) {
            return (existing, false);
        }

        let _guard = self
            .registration
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let map = self.entries.pin();
        if let Some(existing) = map.get(name.as_str()) {
            return (existing.clone(), false);
        }

        let created = Arc::new(create());
        map.insert(name.as_str().to_string(), created.clone());
        log::trace!("Registered {} statistic {}", self.kind, name);
        (created, true)
    }

    pub(crate) fn remove(&self, name: &str) -> Option<Arc<T>> {
        let _guard = self
            .registration
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let removed = self.entries.pin().remove(name).cloned();
        if removed.is_none() {
            log::warn!("Attempted to remove non-existent {} statistic: {}", self.kind, name);
        }
        removed
    }

    /// Copies out the current instances. The map is not held while the
    /// caller formats or publishes them.
    pub(crate) fn snapshot(&self) -> Vec<Arc<T>> {
        self.entries
            .pin()
            .iter()
            .map(|(_, value)| value.clone())
            .collect()
    }

    pub(crate) fn clear(&self) {
        let _guard = self
            .registration
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        self.entries.pin().clear();
    }

    #[allow(dead_code)]
    pub(crate) fn len(&self) -> usize {
        self.entries.pin().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    #[test]
    fn test_find_or_insert_is_idempotent() {
        let registry: Registry<usize> = Registry::new("test");
        let name = StatisticName::new("Registry.Idempotent");

        let (first, created) = registry.find_or_insert_with(&name, || 1);
        assert!(created);
        let (second, created) = registry.find_or_insert_with(&name, || 2);
        assert!(!created);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(*second, 1);
    }

    #[test]
    fn test_concurrent_registration_creates_once() {
        let registry: Arc<Registry<usize>> = Arc::new(Registry::new("test"));
        let creations = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = registry.clone();
                let creations = creations.clone();
                thread::spawn(move || {
                    let name = StatisticName::new("Registry.Race");
                    registry
                        .find_or_insert_with(&name, || creations.fetch_add(1, Ordering::SeqCst))
                        .0
                })
            })
            .collect();

        let instances: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(creations.load(Ordering::SeqCst), 1);
        assert!(instances.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    }

    #[test]
    fn test_remove_and_clear() {
        let registry: Registry<&'static str> = Registry::new("test");
        registry.find_or_insert_with(&StatisticName::new("A"), || "a");
        registry.find_or_insert_with(&StatisticName::new("B"), || "b");
        assert_eq!(registry.len(), 2);

        assert!(registry.remove("A").is_some());
        assert!(registry.remove("A").is_none());
        assert!(registry.find("A").is_none());

        registry.clear();
        assert!(registry.snapshot().is_empty());
    }
}
