// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

//! [`RowMap`]: open-addressed hash table over row images
//!
//! The table stores `(hash, group id)` pairs and never looks at key
//! bytes itself; equality and persistence are delegated to a
//! [`KeyStore`], so the table stays oblivious to the key representation.
//! Probing is batched: one mini-batch of hashes flows through
//! [`RowMap::early_filter`], [`RowMap::find`] and
//! [`RowMap::map_new_keys`].

use crate::error::Result;

/// Sentinel marking an empty slot; never a valid group id
const EMPTY: u32 = u32::MAX;

const INITIAL_CAPACITY: usize = 16;

/// Key equality and persistence callbacks, bounded to one mini-batch.
///
/// Row indices are mini-batch-relative; group ids address keys already
/// persisted by earlier [`KeyStore::append`] calls.
pub trait KeyStore {
    /// Whether encoded row `row` equals the stored key `group_id`
    fn equals(&self, row: u16, group_id: u32) -> bool;

    /// Whether encoded rows `a` and `b` of the current mini-batch are equal
    fn rows_equal(&self, a: u16, b: u16) -> bool;

    /// Compare each `selection[i]` against `group_ids[i]` and push the
    /// mismatching rows, in order, onto `mismatch`
    fn compare(&self, selection: &[u16], group_ids: &[u32], mismatch: &mut Vec<u16>) {
        debug_assert_eq!(selection.len(), group_ids.len());
        for (&row, &group_id) in selection.iter().zip(group_ids) {
            if !self.equals(row, group_id) {
                mismatch.push(row);
            }
        }
    }

    /// Persist the selected rows as new keys, in selection order; the
    /// k-th row becomes the key for the k-th newly assigned group id
    fn append(&mut self, selection: &[u16]) -> Result<()>;
}

#[derive(Debug, Clone, Copy)]
struct Slot {
    hash: u32,
    group_id: u32,
}

/// Open-addressed table mapping 32-bit row hashes to dense group ids.
///
/// Capacity is a power of two and doubles when the load factor crosses
/// 3/4; hashes are cached per slot, so a resize rehashes without
/// touching key bytes.
#[derive(Debug)]
pub struct RowMap {
    slots: Vec<Slot>,
    mask: usize,
    len: usize,
}

impl Default for RowMap {
    fn default() -> Self {
        Self::new()
    }
}

impl RowMap {
    pub fn new() -> Self {
        Self {
            slots: vec![
                Slot {
                    hash: 0,
                    group_id: EMPTY
                };
                INITIAL_CAPACITY
            ],
            mask: INITIAL_CAPACITY - 1,
            len: 0,
        }
    }

    /// Number of stored keys (equals the number of groups)
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Drop all entries, keeping capacity
    pub fn clear(&mut self) {
        self.slots.fill(Slot {
            hash: 0,
            group_id: EMPTY,
        });
        self.len = 0;
    }

    /// For each probed hash, record whether a stored entry might match
    /// (same 32-bit hash) and the slot where probing stopped: the
    /// candidate on a possible match, the first empty slot otherwise.
    pub fn early_filter(
        &self,
        hashes: &[u32],
        match_bits: &mut Vec<bool>,
        slots: &mut Vec<u32>,
    ) {
        match_bits.clear();
        slots.clear();
        for &hash in hashes {
            let (found, slot) = self.probe(hash, (hash as usize) & self.mask);
            match_bits.push(found);
            slots.push(slot as u32);
        }
    }

    /// Resolve the candidates flagged by [`Self::early_filter`].
    ///
    /// Rows whose candidate passes `store` equality receive the stored
    /// group id in `out_group_ids`; rows that exhaust their candidates
    /// get their match bit cleared and their slot left at the empty slot
    /// that ended the probe. Other entries of `out_group_ids` are not
    /// written.
    pub fn find(
        &self,
        hashes: &[u32],
        match_bits: &mut [bool],
        slots: &mut [u32],
        out_group_ids: &mut [u32],
        store: &dyn KeyStore,
    ) {
        let mut selection: Vec<u16> = (0..hashes.len())
            .filter(|&i| match_bits[i])
            .map(|i| i as u16)
            .collect();
        let mut group_ids = Vec::with_capacity(selection.len());
        let mut mismatch = Vec::new();

        while !selection.is_empty() {
            group_ids.clear();
            group_ids.extend(
                selection
                    .iter()
                    .map(|&row| self.slots[slots[row as usize] as usize].group_id),
            );
            mismatch.clear();
            store.compare(&selection, &group_ids, &mut mismatch);

            // rows that passed equality take their candidate's id
            let mut miss = mismatch.iter().peekable();
            for (&row, &group_id) in selection.iter().zip(&group_ids) {
                if miss.peek() == Some(&&row) {
                    miss.next();
                } else {
                    out_group_ids[row as usize] = group_id;
                }
            }

            // mismatching rows continue probing past their candidate
            selection.clear();
            for &row in &mismatch {
                let hash = hashes[row as usize];
                let from = (slots[row as usize] as usize + 1) & self.mask;
                let (found, slot) = self.probe(hash, from);
                slots[row as usize] = slot as u32;
                if found {
                    selection.push(row);
                } else {
                    match_bits[row as usize] = false;
                }
            }
        }
    }

    /// Insert the rows in `selection` (those with a cleared match bit),
    /// in row order, assigning dense group ids in first-appearance
    /// order. Duplicates within the mini-batch are detected against the
    /// pending rows through [`KeyStore::rows_equal`]; the de-duplicated
    /// rows are persisted with a single [`KeyStore::append`] call.
    pub fn map_new_keys(
        &mut self,
        selection: &[u16],
        hashes: &[u32],
        out_group_ids: &mut [u32],
        store: &mut dyn KeyStore,
    ) -> Result<()> {
        if selection.is_empty() {
            return Ok(());
        }
        // Grow up front so claimed slot positions stay valid below
        self.reserve(selection.len());

        let base = self.len as u32;
        let mut pending: Vec<u16> = Vec::with_capacity(selection.len());
        for &row in selection {
            let hash = hashes[row as usize];
            let mut slot = (hash as usize) & self.mask;
            let group_id = loop {
                let entry = self.slots[slot];
                if entry.group_id == EMPTY {
                    let group_id = base + pending.len() as u32;
                    self.slots[slot] = Slot { hash, group_id };
                    self.len += 1;
                    pending.push(row);
                    break group_id;
                }
                if entry.hash == hash {
                    let equal = if entry.group_id >= base {
                        store.rows_equal(row, pending[(entry.group_id - base) as usize])
                    } else {
                        store.equals(row, entry.group_id)
                    };
                    if equal {
                        break entry.group_id;
                    }
                }
                slot = (slot + 1) & self.mask;
            };
            out_group_ids[row as usize] = group_id;
        }

        store.append(&pending)
    }

    /// Probe from `from` for `hash`: `(true, slot)` on a cached-hash
    /// match, `(false, slot)` on the first empty slot
    fn probe(&self, hash: u32, from: usize) -> (bool, usize) {
        let mut slot = from;
        loop {
            let entry = self.slots[slot];
            if entry.group_id == EMPTY {
                return (false, slot);
            }
            if entry.hash == hash {
                return (true, slot);
            }
            slot = (slot + 1) & self.mask;
        }
    }

    /// Ensure `additional` more entries fit under the load factor,
    /// rehashing from the cached hashes when the capacity doubles
    fn reserve(&mut self, additional: usize) {
        let required = self.len + additional;
        let mut capacity = self.slots.len();
        while required * 4 > capacity * 3 {
            capacity *= 2;
        }
        if capacity == self.slots.len() {
            return;
        }
        log::debug!("row map resize: {} -> {capacity} slots", self.slots.len());
        let old = std::mem::replace(
            &mut self.slots,
            vec![
                Slot {
                    hash: 0,
                    group_id: EMPTY
                };
                capacity
            ],
        );
        self.mask = capacity - 1;
        for entry in old {
            if entry.group_id == EMPTY {
                continue;
            }
            let mut slot = (entry.hash as usize) & self.mask;
            while self.slots[slot].group_id != EMPTY {
                slot = (slot + 1) & self.mask;
            }
            self.slots[slot] = entry;
        }
    }
}
