//! Lock helpers that keep the cache usable after a panic poisoned it.

use std::sync::{LockResult, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::warn;

pub(crate) fn rw_read<'a, T>(lock: &'a RwLock<T>, op: &'static str) -> RwLockReadGuard<'a, T> {
    recover(lock.read(), "rwlock.read", op)
}

pub(crate) fn rw_write<'a, T>(lock: &'a RwLock<T>, op: &'static str) -> RwLockWriteGuard<'a, T> {
    recover(lock.write(), "rwlock.write", op)
}

fn recover<G>(result: LockResult<G>, lock_kind: &'static str, op: &'static str) -> G {
    result.unwrap_or_else(|poisoned| {
        warn!(
            target: "shelfrate::cache",
            op,
            lock_kind,
            result = "poisoned_recovered",
            "Recovered from poisoned cache lock; entries may be stale until they expire"
        );
        poisoned.into_inner()
    })
}
