use crate::common::Value;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

const STRIPE_COUNT: usize = 64;

/// A handle to one lock out of a registry.
pub(crate) struct LockHandle {
    lock: Arc<RwLock<()>>,
}

impl LockHandle {
    pub(crate) fn read(&self) -> RwLockReadGuard<'_, ()> {
        self.lock.read()
    }

    pub(crate) fn write(&self) -> RwLockWriteGuard<'_, ()> {
        self.lock.write()
    }
}

/// Striped locks keyed by primary-key value.
///
/// `modify` serializes read-mutate-write cycles per key through this
/// registry. Striping keeps the registry bounded: two distinct keys may
/// share a stripe, which only costs unnecessary waiting, never lost
/// exclusion.
pub(crate) struct KeyLockRegistry {
    stripes: Vec<Arc<RwLock<()>>>,
}

impl KeyLockRegistry {
    pub(crate) fn new() -> Self {
        let stripes = (0..STRIPE_COUNT)
            .map(|_| Arc::new(RwLock::new(())))
            .collect();
        KeyLockRegistry { stripes }
    }

    pub(crate) fn lock_for(&self, key: &Value) -> LockHandle {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        let stripe = (hasher.finish() as usize) % self.stripes.len();
        LockHandle {
            lock: self.stripes[stripe].clone(),
        }
    }
}

impl Default for KeyLockRegistry {
    fn default() -> Self {
        Self::new()
    }
}
