//! Optional multi-threaded wrapper.
//!
//! The store itself is single-threaded cooperative. For embedding
//! applications that ingest and read from separate threads, one exclusive
//! lock over the whole store is used rather than per-collection concurrent
//! structures — readers must not retain `&Call`
//! or `&Stream` references across a lock drop, since rotation can destroy
//! them. `parking_lot::RwLock` is used throughout this codebase's
//! counterparts (`rvoip-call-engine`'s orchestrator state,
//! `rvoip-rtp-core`'s session registries) for the same reason: uncontended
//! fast-path locking without `std::sync::PoisonError` plumbing.

use parking_lot::RwLock;

use crate::store::Storage;

/// A [`Storage`] behind one exclusive lock.
///
/// Ingestion (`ingest_sip`/`ingest_rtp`/`ingest_rtcp`) and the writer
/// operations (rotation, clear, sort) take [`SharedStorage::write`]; UI
/// traversals take [`SharedStorage::read`] and must finish before the next
/// write, since a read guard held across a write would deadlock and a
/// `&Call` retained past the guard's drop may outlive its referent.
pub struct SharedStorage {
    inner: RwLock<Storage>,
}

impl SharedStorage {
    pub fn new(storage: Storage) -> Self {
        Self { inner: RwLock::new(storage) }
    }

    pub fn read(&self) -> parking_lot::RwLockReadGuard<'_, Storage> {
        self.inner.read()
    }

    pub fn write(&self) -> parking_lot::RwLockWriteGuard<'_, Storage> {
        self.inner.write()
    }
}
