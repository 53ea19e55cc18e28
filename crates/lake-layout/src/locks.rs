//! Per-resource write serialization.

use std::collections::HashSet;
use std::sync::{Condvar, Mutex, PoisonError};

use tracing::trace;

use lake_types::Uid;

use crate::error::{LayoutError, LayoutResult};

/// Exclusive locks keyed by UID. Writers to different UIDs never block each
/// other; a second writer to the same UID waits for the first guard to drop.
#[derive(Debug, Default)]
pub struct ResourceLocks {
    held: Mutex<HashSet<String>>,
    released: Condvar,
}

impl ResourceLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Block until `uid` is free, then take it.
    pub fn lock(&self, uid: &Uid) -> LayoutResult<ResourceGuard<'_>> {
        let mut held = self.held.lock().map_err(poisoned)?;
        while held.contains(uid.as_str()) {
            trace!(uid = %uid, "waiting for resource lock");
            held = self.released.wait(held).map_err(poisoned)?;
        }
        held.insert(uid.as_str().to_string());
        Ok(ResourceGuard {
            locks: self,
            uid: uid.as_str().to_string(),
        })
    }

    /// Number of UIDs currently locked.
    pub fn held(&self) -> usize {
        self.held.lock().map(|h| h.len()).unwrap_or_default()
    }
}

fn poisoned<T>(_: PoisonError<T>) -> LayoutError {
    LayoutError::StoreUnavailable("resource lock table poisoned".into())
}

/// Releases its UID on drop.
#[derive(Debug)]
pub struct ResourceGuard<'a> {
    locks: &'a ResourceLocks,
    uid: String,
}

impl ResourceGuard<'_> {
    pub fn uid(&self) -> &str {
        &self.uid
    }
}

impl Drop for ResourceGuard<'_> {
    fn drop(&mut self) {
        let mut held = match self.locks.held.lock() {
            Ok(held) => held,
            Err(poisoned) => poisoned.into_inner(),
        };
        held.remove(&self.uid);
        drop(held);
        self.locks.released.notify_all();
    }
}
