//! Per-resource busy markers and the global starting slot
//!
//! Every acquisition hands out a fresh [`LockToken`]. Completion messages
//! carry the token back, and a release only succeeds when the token matches
//! the one currently held, so a late completion from an abandoned operation
//! can never free a newer lock.

use std::collections::HashMap;

use serde::Serialize;

use srvdeck_core::ResourceId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct LockToken(u64);

impl std::fmt::Display for LockToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Default)]
pub struct OperationLocks {
    busy: HashMap<ResourceId, LockToken>,
    /// At most one resource may be mid-start system-wide
    starting: Option<(ResourceId, LockToken)>,
    next_token: u64,
}

impl OperationLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_busy(&self, id: &ResourceId) -> bool {
        self.busy.contains_key(id)
    }

    /// Resource currently holding the global starting slot
    pub fn starting(&self) -> Option<&ResourceId> {
        self.starting.as_ref().map(|(id, _)| id)
    }

    pub fn busy_count(&self) -> usize {
        self.busy.len()
    }

    fn issue(&mut self) -> LockToken {
        self.next_token += 1;
        LockToken(self.next_token)
    }

    /// Mark `id` busy. Returns `None` when it already is.
    pub fn try_acquire(&mut self, id: &ResourceId) -> Option<LockToken> {
        if self.is_busy(id) {
            return None;
        }
        let token = self.issue();
        self.busy.insert(id.clone(), token);
        Some(token)
    }

    /// Mark `id` busy and take the global starting slot under one token.
    ///
    /// Returns `None`, acquiring nothing, when `id` is busy or any resource
    /// holds the starting slot.
    pub fn try_acquire_start(&mut self, id: &ResourceId) -> Option<LockToken> {
        if self.starting.is_some() {
            return None;
        }
        let token = self.try_acquire(id)?;
        self.starting = Some((id.clone(), token));
        Some(token)
    }

    /// Whether `token` is the live lock for `id`
    pub fn holds(&self, id: &ResourceId, token: LockToken) -> bool {
        self.busy.get(id) == Some(&token)
    }

    /// Release whatever `token` holds for `id`: the busy marker and, when it
    /// was taken by a start, the starting slot. Returns `false` for a stale
    /// token.
    pub fn release(&mut self, id: &ResourceId, token: LockToken) -> bool {
        let mut released = false;

        if self.holds(id, token) {
            self.busy.remove(id);
            released = true;
        }

        if matches!(&self.starting, Some((sid, st)) if sid == id && *st == token) {
            self.starting = None;
            released = true;
        }

        released
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> ResourceId {
        ResourceId::from(s)
    }

    #[test]
    fn test_busy_lock_is_exclusive_per_resource() {
        let mut locks = OperationLocks::new();
        let token = locks.try_acquire(&id("web1")).unwrap();
        assert!(locks.try_acquire(&id("web1")).is_none());
        assert!(locks.try_acquire(&id("web2")).is_some());

        assert!(locks.release(&id("web1"), token));
        assert!(!locks.is_busy(&id("web1")));
    }

    #[test]
    fn test_starting_slot_is_global() {
        let mut locks = OperationLocks::new();
        let token = locks.try_acquire_start(&id("web1")).unwrap();
        assert_eq!(locks.starting(), Some(&id("web1")));

        // A different resource cannot start while the slot is held
        assert!(locks.try_acquire_start(&id("web2")).is_none());
        assert!(!locks.is_busy(&id("web2")));

        // Plain busy locks (stop) on other resources are unaffected
        assert!(locks.try_acquire(&id("web2")).is_some());

        assert!(locks.release(&id("web1"), token));
        assert!(locks.starting().is_none());
        assert!(locks.try_acquire_start(&id("web3")).is_some());
    }

    #[test]
    fn test_start_refused_on_busy_resource_takes_no_slot() {
        let mut locks = OperationLocks::new();
        locks.try_acquire(&id("web1")).unwrap();
        assert!(locks.try_acquire_start(&id("web1")).is_none());
        assert!(locks.starting().is_none());
    }

    #[test]
    fn test_stale_token_does_not_release() {
        let mut locks = OperationLocks::new();
        let old = locks.try_acquire(&id("web1")).unwrap();
        assert!(locks.release(&id("web1"), old));

        let new = locks.try_acquire(&id("web1")).unwrap();
        assert_ne!(old, new);
        assert!(!locks.release(&id("web1"), old));
        assert!(locks.is_busy(&id("web1")));
        assert!(locks.holds(&id("web1"), new));
    }
}
