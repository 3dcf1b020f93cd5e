use std::any::{Any, TypeId};
use std::collections::HashMap;

/// One row per (type, primary key) within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct IdentityKey {
    type_id: TypeId,
    pk: i64,
}

impl IdentityKey {
    pub(crate) fn of<M: 'static>(pk: i64) -> Self {
        Self {
            type_id: TypeId::of::<M>(),
            pk,
        }
    }
}

struct Entry {
    object: Box<dyn Any + Send>,
    expired: bool,
}

/// Objects loaded or flushed by a session, keyed by identity.
///
/// Expired entries stay in the map but are never served; the next lookup
/// goes back to the database and replaces them.
#[derive(Default)]
pub(crate) struct IdentityMap {
    entries: HashMap<IdentityKey, Entry>,
}

impl IdentityMap {
    pub(crate) fn insert(&mut self, key: IdentityKey, object: Box<dyn Any + Send>) {
        self.entries.insert(
            key,
            Entry {
                object,
                expired: false,
            },
        );
    }

    /// The cached object, unless it is missing or expired.
    pub(crate) fn get_fresh<M: Clone + 'static>(&self, key: &IdentityKey) -> Option<M> {
        self.entries
            .get(key)
            .filter(|entry| !entry.expired)
            .and_then(|entry| entry.object.downcast_ref::<M>())
            .cloned()
    }

    pub(crate) fn remove(&mut self, key: &IdentityKey) {
        self.entries.remove(key);
    }

    pub(crate) fn expire_all(&mut self) {
        for entry in self.entries.values_mut() {
            entry.expired = true;
        }
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}
