use std::{
    collections::HashSet,
    sync::{Mutex, PoisonError},
};

use uuid::Uuid;

/// Identifies one playback instance created by a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlaybackId(Uuid);

impl From<Uuid> for PlaybackId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

impl PlaybackId {
    pub fn new() -> Self {
        Uuid::new_v4().into()
    }
}

impl Default for PlaybackId {
    fn default() -> Self {
        Self::new()
    }
}

/// Non-owning set of the playback instances a stream has handed out.
///
/// Streams register an instance when they create it and the instance
/// deregisters itself when dropped. The registry never keeps an instance
/// alive; it only answers which instances are still around.
#[derive(Debug, Default)]
pub struct PlaybackRegistry {
    active: Mutex<HashSet<PlaybackId>>,
}

impl PlaybackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self) -> PlaybackId {
        let id = PlaybackId::new();
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id);
        id
    }

    pub fn deregister(&self, id: PlaybackId) {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
    }

    pub fn contains(&self, id: PlaybackId) -> bool {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&id)
    }

    pub fn len(&self) -> usize {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod registry_tests {
    use super::*;

    #[test]
    fn registered_ids_are_unique_and_tracked() {
        let registry = PlaybackRegistry::new();
        let a = registry.register();
        let b = registry.register();

        assert_ne!(a, b);
        assert_eq!(registry.len(), 2);
        assert!(registry.contains(a));
    }

    #[test]
    fn deregister_forgets_the_instance() {
        let registry = PlaybackRegistry::new();
        let a = registry.register();
        registry.deregister(a);
        registry.deregister(a);

        assert!(!registry.contains(a));
        assert!(registry.is_empty());
    }
}
