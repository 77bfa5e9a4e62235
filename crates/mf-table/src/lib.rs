#![forbid(unsafe_code)]

use std::collections::TryReserveError;
use std::fmt;

use mf_types::{MAX_KEY_LEN, StationStats, UpdateKind, tenths_in_range};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default slot count: roughly 10x the expected distinct-key cardinality,
/// so the table stays sparse and probe chains stay short.
pub const DEFAULT_TABLE_CAPACITY: usize = 11_000;

const HASH_SEED: u64 = 102_983;

#[derive(Debug, Error)]
pub enum TableError {
    #[error("slot array allocation failed: {0}")]
    Allocation(#[from] TryReserveError),
    #[error("table capacity must be nonzero")]
    InvalidCapacity,
    #[error("table saturated: all {capacity} slots occupied while placing a new key")]
    Saturated { capacity: usize },
    #[error("key length {len} exceeds the {MAX_KEY_LEN}-byte cap")]
    KeyOverflow { len: usize },
}

/// Rolling hash over key bytes, reduced to a home slot.
///
/// Order-sensitive and cheap; it only needs to spread the expected key set
/// across a sparse slot array, not resist collisions.
#[must_use]
pub fn home_slot(key: &[u8], capacity: usize) -> usize {
    debug_assert!(capacity > 0);
    let mut hash = HASH_SEED;
    for &byte in key {
        hash = (hash ^ (hash << 5).wrapping_add(hash)).wrapping_add(u64::from(byte));
    }
    (hash % capacity as u64) as usize
}

/// Owned bounded-length key, stored inline in the slot array.
#[derive(Clone, Copy)]
struct StationKey {
    bytes: [u8; MAX_KEY_LEN],
    len: u8,
}

impl StationKey {
    fn copy_from(key: &[u8]) -> Self {
        debug_assert!(key.len() <= MAX_KEY_LEN);
        let mut bytes = [0u8; MAX_KEY_LEN];
        bytes[..key.len()].copy_from_slice(key);
        Self {
            bytes,
            len: key.len() as u8,
        }
    }

    fn as_bytes(&self) -> &[u8] {
        &self.bytes[..usize::from(self.len)]
    }
}

impl fmt::Debug for StationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StationKey({:?})", String::from_utf8_lossy(self.as_bytes()))
    }
}

#[derive(Debug, Clone, Copy)]
struct Slot {
    key: StationKey,
    stats: StationStats,
}

/// Shape statistics for a finished table, suitable for trace artifacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableTrace {
    pub capacity: usize,
    pub len: usize,
    pub longest_probe: usize,
}

/// Fixed-capacity open-addressing table from station keys to running
/// aggregates.
///
/// Collisions resolve by linear probing with wraparound. Capacity is fixed
/// at construction; there is no resizing and no deletion, which is what
/// makes the empty-slot lookup termination rule exact.
pub struct StationTable {
    slots: Vec<Option<Slot>>,
    longest_probe: usize,
    len: usize,
}

impl StationTable {
    /// Allocate an empty table with exactly `capacity` slots.
    pub fn with_capacity(capacity: usize) -> Result<Self, TableError> {
        if capacity == 0 {
            return Err(TableError::InvalidCapacity);
        }
        let mut slots = Vec::new();
        slots.try_reserve_exact(capacity)?;
        slots.resize_with(capacity, || None);
        Ok(Self {
            slots,
            // Admits one re-check past the home slot even before any
            // probed insertion has been recorded.
            longest_probe: 1,
            len: 0,
        })
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Longest probe distance any insertion has required. A reported
    /// statistic; lookups never rely on it for termination.
    #[must_use]
    pub fn longest_probe(&self) -> usize {
        self.longest_probe
    }

    #[must_use]
    pub fn trace(&self) -> TableTrace {
        TableTrace {
            capacity: self.capacity(),
            len: self.len,
            longest_probe: self.longest_probe,
        }
    }

    /// Fold one reading into the record for `key`, creating the record on
    /// first sight.
    pub fn upsert(&mut self, key: &[u8], value_tenths: i64) -> Result<UpdateKind, TableError> {
        debug_assert!(tenths_in_range(value_tenths));
        self.fold(key, StationStats::seed(value_tenths))
    }

    /// Fold a whole record into the entry for `key`. This is the combine
    /// rule used when merging per-worker tables.
    pub fn fold(&mut self, key: &[u8], incoming: StationStats) -> Result<UpdateKind, TableError> {
        if key.len() > MAX_KEY_LEN {
            return Err(TableError::KeyOverflow { len: key.len() });
        }
        let capacity = self.slots.len();
        let home = home_slot(key, capacity);
        for step in 0..capacity {
            let entry = &mut self.slots[(home + step) % capacity];
            match entry {
                Some(slot) if slot.key.as_bytes() == key => {
                    slot.stats.merge(&incoming);
                    return Ok(UpdateKind::Updated);
                }
                Some(_) => {}
                None => {
                    *entry = Some(Slot {
                        key: StationKey::copy_from(key),
                        stats: incoming,
                    });
                    self.len += 1;
                    self.longest_probe = self.longest_probe.max(step);
                    return Ok(UpdateKind::Inserted);
                }
            }
        }
        Err(TableError::Saturated { capacity })
    }

    /// Look up the record for `key`. Never mutates; a miss is a normal
    /// `None`.
    ///
    /// Absence is decided by the first empty slot on the probe path, the
    /// standard open-addressing rule. Exact because entries are never
    /// deleted.
    #[must_use]
    pub fn lookup(&self, key: &[u8]) -> Option<&StationStats> {
        if key.len() > MAX_KEY_LEN {
            return None;
        }
        let capacity = self.slots.len();
        let home = home_slot(key, capacity);
        for step in 0..capacity {
            match &self.slots[(home + step) % capacity] {
                Some(slot) if slot.key.as_bytes() == key => return Some(&slot.stats),
                Some(_) => {}
                None => return None,
            }
        }
        None
    }

    /// Indices of occupied slots, in slot order.
    pub fn live_slots(&self) -> impl Iterator<Item = usize> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| slot.as_ref().map(|_| index))
    }

    #[must_use]
    pub fn key_at(&self, slot: usize) -> Option<&[u8]> {
        self.slots.get(slot)?.as_ref().map(|s| s.key.as_bytes())
    }

    #[must_use]
    pub fn stats_at(&self, slot: usize) -> Option<&StationStats> {
        self.slots.get(slot)?.as_ref().map(|s| &s.stats)
    }

    /// Total readings folded in across all keys.
    #[must_use]
    pub fn total_records(&self) -> u64 {
        self.slots
            .iter()
            .flatten()
            .map(|slot| slot.stats.count())
            .sum()
    }

    /// Fold every live record of `other` into this table.
    pub fn merge_from(&mut self, other: &StationTable) -> Result<(), TableError> {
        for slot in other.slots.iter().flatten() {
            self.fold(slot.key.as_bytes(), slot.stats)?;
        }
        Ok(())
    }

    /// Occupied slot indices in ascending byte-lexicographic key order.
    #[must_use]
    pub fn sorted_slots(&self) -> Vec<usize> {
        let mut view: Vec<usize> = self.live_slots().collect();
        self.heapsort_view(&mut view);
        view
    }

    fn slot_key(&self, slot: usize) -> &[u8] {
        self.slots[slot]
            .as_ref()
            .expect("sort view references only occupied slots")
            .key
            .as_bytes()
    }

    // In-place heapsort over the slot view. Keys are unique, so no
    // stability requirement exists.
    fn heapsort_view(&self, view: &mut [usize]) {
        let n = view.len();
        if n < 2 {
            return;
        }
        for root in (0..n / 2).rev() {
            self.sift_down(view, root, n);
        }
        for end in (1..n).rev() {
            view.swap(0, end);
            self.sift_down(view, 0, end);
        }
    }

    fn sift_down(&self, view: &mut [usize], mut root: usize, end: usize) {
        loop {
            let mut child = 2 * root + 1;
            if child >= end {
                break;
            }
            if child + 1 < end && self.slot_key(view[child]) < self.slot_key(view[child + 1]) {
                child += 1;
            }
            if self.slot_key(view[root]) >= self.slot_key(view[child]) {
                break;
            }
            view.swap(root, child);
            root = child;
        }
    }
}

impl fmt::Debug for StationTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StationTable")
            .field("capacity", &self.capacity())
            .field("len", &self.len)
            .field("longest_probe", &self.longest_probe)
            .finish_non_exhaustive()
    }
}
