//! Recyclable per-operation record buffers
//!
//! Buffers live in a growable arena indexed by small integers. Retired indices
//! go onto a free list and are handed out again, so a long-running process
//! reuses the same handful of buffers (and their capacity) for every operation.
//!
//! Every issued [`TrackingId`] carries the generation of its slot. Releasing a
//! slot bumps the generation, so an id kept alive past its operation (a second
//! end call, a slow producer) no longer matches and is ignored.

use crate::record::Record;

use std::fmt;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

/// Handle of one tracked operation
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TrackingId {
    index: usize,
    generation: u64,
}

impl TrackingId {
    /// Index of the buffer slot
    #[must_use]
    pub const fn index(&self) -> usize {
        self.index
    }

    /// Generation of the slot at issuance
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }
}

impl fmt::Display for TrackingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.index, self.generation)
    }
}

#[derive(Debug, Default)]
struct SlotState {
    generation: u64,
    active: bool,
    records: Vec<Record>,
    /// Emptied buffer swapped in on release while the old one is drained
    spare: Vec<Record>,
}

impl SlotState {
    const fn accepts(&self, id: TrackingId) -> bool {
        self.active && self.generation == id.generation
    }
}

#[derive(Debug, Default)]
struct Slot {
    state: Mutex<SlotState>,
}

/// Arena of buffers plus the free list of retired indices
#[derive(Debug, Default)]
pub(crate) struct BufferPool {
    slots: RwLock<Vec<Arc<Slot>>>,
    /// Guards allocation: the free list and arena growth
    free: Mutex<Vec<usize>>,
}

impl BufferPool {
    /// Create a pool with `capacity` retired slots ready for issue
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        let slots = (0..capacity).map(|_| Arc::new(Slot::default())).collect();
        // Popped from the back, so the lowest index is issued first
        let free = (0..capacity).rev().collect();

        Self {
            slots: RwLock::new(slots),
            free: Mutex::new(free),
        }
    }

    /// Issue a handle, reusing a retired slot when one is available
    pub(crate) fn allocate(&self) -> TrackingId {
        let (index, slot) = {
            let mut free = self.free.lock();

            match free.pop() {
                Some(index) => (index, self.slots.read()[index].clone()),
                None => {
                    let mut slots = self.slots.write();
                    let slot = Arc::new(Slot::default());
                    slots.push(slot.clone());
                    (slots.len() - 1, slot)
                }
            }
        };

        let mut state = slot.state.lock();
        state.active = true;

        TrackingId {
            index,
            generation: state.generation,
        }
    }

    /// Append to the buffer of `id`.
    ///
    /// Gives the record back if `id` is not active.
    pub(crate) fn append(&self, id: TrackingId, record: Record) -> Result<(), Record> {
        let Some(slot) = self.slot(id.index) else {
            return Err(record);
        };

        let mut state = slot.state.lock();
        if !state.accepts(id) {
            return Err(record);
        }
        state.records.push(record);

        Ok(())
    }

    /// Retire `id`: hand its buffered records to `drain` in append order, empty
    /// the buffer and return the slot to the free list.
    ///
    /// The slot is retired before `drain` runs and its lock is not held while
    /// draining, so producers still holding `id` are turned away at once.
    ///
    /// Returns `false` without calling `drain` if `id` is not active.
    pub(crate) fn release<F>(&self, id: TrackingId, drain: F) -> bool
    where
        F: FnOnce(&[Record]),
    {
        let Some(slot) = self.slot(id.index) else {
            return false;
        };

        let mut records = {
            let mut state = slot.state.lock();
            if !state.accepts(id) {
                return false;
            }

            state.active = false;
            state.generation = state.generation.wrapping_add(1);

            let spare = std::mem::take(&mut state.spare);
            std::mem::replace(&mut state.records, spare)
        };

        drain(&records);

        // clear() keeps the allocation for a later operation
        records.clear();
        slot.state.lock().spare = records;

        // Only now may the index be issued again
        self.free.lock().push(id.index);

        true
    }

    /// Number of slots ever created
    pub(crate) fn size(&self) -> usize {
        self.slots.read().len()
    }

    /// Number of slots currently issued
    pub(crate) fn active(&self) -> usize {
        let free = self.free.lock();
        self.slots.read().len() - free.len()
    }

    #[cfg(test)]
    fn buffered(&self, id: TrackingId) -> Option<Vec<String>> {
        let slot = self.slot(id.index)?;
        let state = slot.state.lock();
        state.accepts(id).then(|| {
            state
                .records
                .iter()
                .map(|record| record.message().to_string())
                .collect()
        })
    }

    fn slot(&self, index: usize) -> Option<Arc<Slot>> {
        self.slots.read().get(index).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::level::Level;

    use std::collections::HashSet;

    fn record(message: &str) -> Record {
        Record::new().finalize(Level::INFO, message)
    }

    #[test]
    fn test_allocate_grows_then_reuses() {
        let pool = BufferPool::with_capacity(0);

        let a = pool.allocate();
        let b = pool.allocate();
        assert_eq!((a.index(), b.index()), (0, 1));
        assert_eq!(pool.size(), 2);

        assert!(pool.release(a, |_| {}));
        let c = pool.allocate();
        assert_eq!(c.index(), 0);
        assert_eq!(c.generation(), a.generation() + 1);
        assert_eq!(pool.size(), 2);
    }

    #[test]
    fn test_preallocated_slots_issue_lowest_first() {
        let pool = BufferPool::with_capacity(3);

        assert_eq!(pool.size(), 3);
        assert_eq!(pool.active(), 0);
        assert_eq!(pool.allocate().index(), 0);
        assert_eq!(pool.allocate().index(), 1);
        assert_eq!(pool.active(), 2);
    }

    #[test]
    fn test_release_drains_in_append_order_and_clears() {
        let pool = BufferPool::with_capacity(1);
        let id = pool.allocate();

        for message in ["one", "two", "three"] {
            assert!(pool.append(id, record(message)).is_ok());
        }

        let mut drained = Vec::new();
        assert!(pool.release(id, |records| {
            drained.extend(records.iter().map(|r| r.message().to_string()));
        }));
        assert_eq!(drained, ["one", "two", "three"]);

        let next = pool.allocate();
        assert_eq!(next.index(), id.index());
        assert_eq!(pool.buffered(next), Some(Vec::new()));
    }

    #[test]
    fn test_appends_during_drain_do_not_block() {
        let pool = BufferPool::with_capacity(1);
        let id = pool.allocate();
        assert!(pool.append(id, record("buffered")).is_ok());

        let mut late = None;
        assert!(pool.release(id, |records| {
            assert_eq!(records.len(), 1);
            // Would deadlock if the slot lock were held while draining
            late = Some(pool.append(id, record("late")).is_err());
            assert_eq!(pool.active(), 1);
        }));

        assert_eq!(late, Some(true));
        assert_eq!(pool.active(), 0);
    }

    #[test]
    fn test_buffer_capacity_survives_release() {
        let pool = BufferPool::with_capacity(1);

        for _ in 0..3 {
            let id = pool.allocate();
            for message in ["a", "b", "c", "d"] {
                assert!(pool.append(id, record(message)).is_ok());
            }
            assert!(pool.release(id, |records| assert_eq!(records.len(), 4)));
        }

        let slot = pool.slot(0).unwrap();
        let state = slot.state.lock();
        assert!(state.records.capacity() >= 4);
        assert!(state.spare.capacity() >= 4);
    }

    #[test]
    fn test_stale_id_is_rejected() {
        let pool = BufferPool::with_capacity(1);
        let old = pool.allocate();
        assert!(pool.release(old, |_| {}));

        let new = pool.allocate();
        assert_eq!(new.index(), old.index());

        // A producer still holding the old id must not reach the new buffer
        assert!(pool.append(old, record("late")).is_err());
        assert!(!pool.release(old, |_| panic!("stale release must not drain")));

        assert_eq!(pool.buffered(new), Some(Vec::new()));
        assert_eq!(pool.active(), 1);
    }

    #[test]
    fn test_unknown_index_is_rejected() {
        let pool = BufferPool::with_capacity(0);
        let foreign = TrackingId {
            index: 42,
            generation: 0,
        };

        assert!(pool.append(foreign, record("x")).is_err());
        assert!(!pool.release(foreign, |_| {}));
    }

    #[test]
    fn test_concurrent_allocation_never_double_issues() {
        let pool = BufferPool::with_capacity(2);

        let issued: Vec<TrackingId> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|_| s.spawn(|| (0..50).map(|_| pool.allocate()).collect::<Vec<_>>()))
                .collect();

            handles
                .into_iter()
                .flat_map(|h| h.join().unwrap())
                .collect()
        });

        let unique: HashSet<_> = issued.iter().map(TrackingId::index).collect();
        assert_eq!(unique.len(), issued.len());
        assert_eq!(pool.active(), 400);
    }
}
