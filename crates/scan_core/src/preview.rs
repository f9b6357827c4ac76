//! Revocable preview handles for accepted selections.
//!
//! A [`PreviewLease`] keeps its bytes resolvable through the [`PreviewStore`]
//! until the lease is dropped. Dropping revokes the id immediately, so
//! replacing or clearing a selection never leaves a dangling preview.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

/// Identifier of one preview handle. Never reused within a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PreviewId(u64);

impl PreviewId {
    /// Renderable reference, in the spirit of a browser object URL.
    pub fn url(&self) -> String {
        format!("preview://{}", self.0)
    }
}

impl fmt::Display for PreviewId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.url())
    }
}

#[derive(Default)]
struct PreviewSlots {
    next_id: u64,
    live: HashMap<PreviewId, Arc<[u8]>>,
}

#[derive(Clone, Default)]
pub struct PreviewStore {
    slots: Arc<Mutex<PreviewSlots>>,
}

impl fmt::Debug for PreviewStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PreviewStore")
            .field("live", &self.live_count())
            .finish()
    }
}

impl PreviewStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `content` and returns the lease that owns it.
    pub fn acquire(&self, content: Arc<[u8]>) -> PreviewLease {
        let mut slots = self.lock();
        slots.next_id += 1;
        let id = PreviewId(slots.next_id);
        slots.live.insert(id, content);
        tracing::debug!(preview = %id, "preview acquired");
        PreviewLease {
            id,
            store: self.clone(),
        }
    }

    /// Bytes behind a live preview, or `None` once it was revoked.
    pub fn resolve(&self, id: PreviewId) -> Option<Arc<[u8]>> {
        self.lock().live.get(&id).cloned()
    }

    pub fn is_live(&self, id: PreviewId) -> bool {
        self.lock().live.contains_key(&id)
    }

    pub fn live_count(&self) -> usize {
        self.lock().live.len()
    }

    fn revoke(&self, id: PreviewId) {
        if self.lock().live.remove(&id).is_some() {
            tracing::debug!(preview = %id, "preview revoked");
        }
    }

    fn lock(&self) -> MutexGuard<'_, PreviewSlots> {
        // The map stays consistent even if a holder panicked mid-insert.
        self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Owning handle for one preview; revokes on drop.
pub struct PreviewLease {
    id: PreviewId,
    store: PreviewStore,
}

impl PreviewLease {
    pub fn id(&self) -> PreviewId {
        self.id
    }
}

impl fmt::Debug for PreviewLease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PreviewLease").field("id", &self.id).finish()
    }
}

impl Drop for PreviewLease {
    fn drop(&mut self) {
        self.store.revoke(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bytes(v: &[u8]) -> Arc<[u8]> {
        Arc::from(v)
    }

    #[test]
    fn lease_resolves_until_dropped() {
        let store = PreviewStore::new();
        let lease = store.acquire(bytes(b"png"));
        let id = lease.id();
        assert_eq!(store.resolve(id).as_deref(), Some(&b"png"[..]));
        assert_eq!(store.live_count(), 1);

        drop(lease);
        assert!(store.resolve(id).is_none());
        assert!(!store.is_live(id));
        assert_eq!(store.live_count(), 0);
    }

    #[test]
    fn ids_are_never_shared_between_leases() {
        let store = PreviewStore::new();
        let first = store.acquire(bytes(b"a"));
        let first_id = first.id();
        drop(first);
        let second = store.acquire(bytes(b"a"));
        assert_ne!(first_id, second.id());
        assert_eq!(second.id().url(), "preview://2");
    }

    #[test]
    fn clones_share_the_same_slots() {
        let store = PreviewStore::new();
        let view = store.clone();
        let _lease = store.acquire(bytes(b"x"));
        assert_eq!(view.live_count(), 1);
    }
}
