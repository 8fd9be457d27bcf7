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

//! [`Grouper`] assigns dense group ids to key tuples
//!
//! # Design
//!
//! Assigning group ids is the performance-critical half of hash
//! aggregation: every input row must be mapped to the id of its distinct
//! key tuple, allocating the next id when the tuple is new.
//!
//! [`new_grouper`] picks between two implementations sharing one
//! contract. [`GrouperFast`] packs each mini-batch of rows into row
//! images, hashes the images and probes a [`RowMap`] whose equality and
//! persistence are delegated back to the row tables. The byte-string
//! fallback in [`crate::fallback`] covers the shapes the row-image path
//! rejects (no keys, large-offset binaries, big-endian hosts).
//!
//! # Group ids
//!
//! Ids are dense `u32`s assigned in strict order of first appearance
//! across all `populate`/`consume` calls; within a grouper's lifetime
//! (between [`Grouper::reset`] calls) the id of a key tuple never
//! changes.

use std::sync::Arc;

use ahash::RandomState;
use arrow::array::{Array, ArrayRef, UInt32Array};
use arrow::buffer::{NullBuffer, ScalarBuffer};
use arrow::datatypes::DataType;
use log::debug;

use crate::column::{batch_views, KeyBatch, KeyColumnKind, KeyColumnView};
use crate::error::{GrouperError, Result};
use crate::fallback::GrouperBytes;
use crate::invalid_argument_err;
use crate::map::{KeyStore, RowMap};
use crate::row::{decode_columns, encode_rows, RowLayout, RowTable};

/// Initial mini-batch size; doubles per processed mini-batch
pub(crate) const MINIBATCH_SIZE_MIN: usize = 128;
/// Mini-batch size ceiling; bounds all transient scratch
pub(crate) const MINIBATCH_SIZE_MAX: usize = 1024;

/// Shared state handed to groupers and segmenters at construction
#[derive(Clone, Default)]
pub struct ExecContext {
    random_state: RandomState,
}

impl ExecContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn random_state(&self) -> &RandomState {
        &self.random_state
    }
}

impl std::fmt::Debug for ExecContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecContext").finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum GrouperMode {
    Populate,
    Consume,
    Lookup,
}

/// Consumes batches of key columns and hands out dense group ids.
///
/// Instances are single-threaded and non-reentrant; calls serialize, and
/// id assignment order is call order crossed with within-call row order.
pub trait Grouper {
    /// The key schema this grouper was created for
    fn key_types(&self) -> &[DataType];

    /// Insert the keys of `batch[offset..offset + length]` without
    /// materializing ids; `None` length means the rest of the batch
    fn populate(
        &mut self,
        batch: &KeyBatch,
        offset: usize,
        length: Option<usize>,
    ) -> Result<()>;

    /// Insert keys and return one group id per consumed row, with no
    /// nulls.
    ///
    /// On error no group id assigned by this call survives: all
    /// validation precedes mutation, so a failed call appears not to
    /// have happened.
    fn consume(
        &mut self,
        batch: &KeyBatch,
        offset: usize,
        length: Option<usize>,
    ) -> Result<UInt32Array>;

    /// Map keys to existing group ids without inserting; absent rows are
    /// null in the result (their integer value is zero)
    fn lookup(
        &mut self,
        batch: &KeyBatch,
        offset: usize,
        length: Option<usize>,
    ) -> Result<UInt32Array>;

    /// Current distinct-key count
    fn num_groups(&self) -> u32;

    /// One row per group, in insertion order, with bound dictionaries
    /// attached verbatim
    fn uniques(&self) -> Result<Vec<ArrayRef>>;

    /// Drop all groups. Dictionaries bound on the first batch are
    /// retained.
    fn reset(&mut self) -> Result<()>;
}

/// Return a [`Grouper`] for the given key schema
pub fn new_grouper(
    key_types: &[DataType],
    ctx: &ExecContext,
) -> Result<Box<dyn Grouper>> {
    if GrouperFast::can_use(key_types) {
        debug!("row-image grouper over {} key columns", key_types.len());
        Ok(Box::new(GrouperFast::try_new(key_types, ctx)?))
    } else {
        debug!("byte-string grouper over {} key columns", key_types.len());
        Ok(Box::new(GrouperBytes::try_new(key_types, ctx)?))
    }
}

/// Validate `offset` and resolve an optional `length` against the batch
pub(crate) fn check_and_cap(
    batch_len: usize,
    offset: usize,
    length: Option<usize>,
) -> Result<usize> {
    if offset > batch_len {
        return invalid_argument_err!(
            "consume offset {offset} out of bounds for batch of length {batch_len}"
        );
    }
    match length {
        None => Ok(batch_len - offset),
        Some(length) if offset + length <= batch_len => Ok(length),
        Some(length) => invalid_argument_err!(
            "consume range [{offset}, {}) out of bounds for batch of length \
             {batch_len}",
            offset + length
        ),
    }
}

/// Row-image grouper: key encoder + row table + row map.
///
/// Selected when the key set is non-empty, the host is little-endian and
/// no key column carries 64-bit offsets.
pub(crate) struct GrouperFast {
    key_types: Vec<DataType>,
    layout: Arc<RowLayout>,
    /// Images of the distinct keys; row id == group id
    rows: RowTable,
    /// Images of the mini-batch currently being probed
    rows_minibatch: RowTable,
    map: RowMap,
    /// One entry per key column, bound on the first batch
    dictionaries: Vec<Option<ArrayRef>>,
    random_state: RandomState,
    minibatch_size: usize,
    /// Reused mini-batch scratch
    hashes: Vec<u32>,
    match_bits: Vec<bool>,
    slots: Vec<u32>,
    selection: Vec<u16>,
    ids_scratch: Vec<u32>,
}

impl GrouperFast {
    pub(crate) fn can_use(key_types: &[DataType]) -> bool {
        if key_types.is_empty() || cfg!(target_endian = "big") {
            return false;
        }
        !key_types.iter().any(|t| {
            matches!(
                KeyColumnKind::try_from_type(t),
                Ok(KeyColumnKind::LargeVarBinary)
            )
        })
    }

    pub(crate) fn try_new(key_types: &[DataType], ctx: &ExecContext) -> Result<Self> {
        let layout = Arc::new(RowLayout::try_new(key_types)?);
        Ok(Self {
            key_types: key_types.to_vec(),
            rows: RowTable::new(Arc::clone(&layout)),
            rows_minibatch: RowTable::new(Arc::clone(&layout)),
            layout,
            map: RowMap::new(),
            dictionaries: vec![None; key_types.len()],
            random_state: ctx.random_state().clone(),
            minibatch_size: MINIBATCH_SIZE_MIN,
            hashes: Vec::new(),
            match_bits: Vec::new(),
            slots: Vec::new(),
            selection: Vec::new(),
            ids_scratch: Vec::new(),
        })
    }

    fn consume_impl(
        &mut self,
        batch: &KeyBatch,
        offset: usize,
        length: Option<usize>,
        mode: GrouperMode,
    ) -> Result<Option<UInt32Array>> {
        let length = check_and_cap(batch.len(), offset, length)?;
        batch.check_types(&self.key_types)?;
        if offset != 0 || length != batch.len() {
            let sliced = batch.slice(offset, length)?;
            return self.consume_batch(&sliced, mode);
        }
        self.consume_batch(batch, mode)
    }

    fn consume_batch(
        &mut self,
        batch: &KeyBatch,
        mode: GrouperMode,
    ) -> Result<Option<UInt32Array>> {
        let batch = batch.broadcast_scalars()?;
        let views = batch_views(&batch)?;
        self.bind_dictionaries(&views)?;

        let num_rows = batch.len();
        let mut ids = match mode {
            GrouperMode::Populate => Vec::new(),
            _ => vec![0_u32; num_rows],
        };
        let mut found_bits = match mode {
            GrouperMode::Lookup => vec![false; num_rows],
            _ => Vec::new(),
        };

        let Self {
            layout,
            rows,
            rows_minibatch,
            map,
            random_state,
            minibatch_size,
            hashes,
            match_bits,
            slots,
            selection,
            ids_scratch,
            ..
        } = self;

        let mut start = 0;
        while start < num_rows {
            let size = usize::min(*minibatch_size, num_rows - start);

            // Encode, then hash the images
            rows_minibatch.clean();
            encode_rows(layout, &views, start, size, rows_minibatch);
            hashes.clear();
            for row in 0..size {
                hashes.push(random_state.hash_one(rows_minibatch.row(row)) as u32);
            }

            map.early_filter(hashes, match_bits, slots);

            let out_ids: &mut [u32] = match mode {
                GrouperMode::Populate => {
                    ids_scratch.clear();
                    ids_scratch.resize(size, 0);
                    &mut ids_scratch[..]
                }
                _ => &mut ids[start..start + size],
            };

            {
                let store = FastKeyStore {
                    rows: &mut *rows,
                    minibatch: &*rows_minibatch,
                };
                map.find(hashes, match_bits, slots, out_ids, &store);
            }

            if mode == GrouperMode::Lookup {
                for (row, matched) in match_bits.iter().enumerate() {
                    found_bits[start + row] = *matched;
                }
            } else {
                selection.clear();
                selection.extend(
                    (0..size).filter(|&row| !match_bits[row]).map(|row| row as u16),
                );
                let mut store = FastKeyStore {
                    rows: &mut *rows,
                    minibatch: &*rows_minibatch,
                };
                map.map_new_keys(selection, hashes, out_ids, &mut store)?;
            }

            start += size;
            *minibatch_size = usize::min(MINIBATCH_SIZE_MAX, 2 * *minibatch_size);
        }

        Ok(match mode {
            GrouperMode::Populate => None,
            GrouperMode::Consume => Some(UInt32Array::from(ids)),
            GrouperMode::Lookup => Some(UInt32Array::new(
                ScalarBuffer::from(ids),
                Some(NullBuffer::from(found_bits)),
            )),
        })
    }

    fn bind_dictionaries(&mut self, views: &[KeyColumnView]) -> Result<()> {
        for (i, view) in views.iter().enumerate() {
            if !matches!(self.layout.kinds[i], KeyColumnKind::Dictionary { .. }) {
                continue;
            }
            let dictionary = view.dictionary();
            match &self.dictionaries[i] {
                Some(bound) => {
                    if bound.to_data() != dictionary.to_data() {
                        return Err(GrouperError::NotImplementedDictionaryUnification(
                            format!(
                                "key column {i} carries a dictionary differing from \
                                 the one bound on the first batch"
                            ),
                        ));
                    }
                }
                None => self.dictionaries[i] = Some(dictionary),
            }
        }
        Ok(())
    }
}

impl Grouper for GrouperFast {
    fn key_types(&self) -> &[DataType] {
        &self.key_types
    }

    fn populate(
        &mut self,
        batch: &KeyBatch,
        offset: usize,
        length: Option<usize>,
    ) -> Result<()> {
        self.consume_impl(batch, offset, length, GrouperMode::Populate)?;
        Ok(())
    }

    fn consume(
        &mut self,
        batch: &KeyBatch,
        offset: usize,
        length: Option<usize>,
    ) -> Result<UInt32Array> {
        match self.consume_impl(batch, offset, length, GrouperMode::Consume)? {
            Some(ids) => Ok(ids),
            None => unreachable!(),
        }
    }

    fn lookup(
        &mut self,
        batch: &KeyBatch,
        offset: usize,
        length: Option<usize>,
    ) -> Result<UInt32Array> {
        match self.consume_impl(batch, offset, length, GrouperMode::Lookup)? {
            Some(ids) => Ok(ids),
            None => unreachable!(),
        }
    }

    fn num_groups(&self) -> u32 {
        self.rows.num_rows() as u32
    }

    fn uniques(&self) -> Result<Vec<ArrayRef>> {
        decode_columns(&self.rows, &self.key_types, &self.dictionaries)
    }

    fn reset(&mut self) -> Result<()> {
        self.rows.clean();
        self.rows_minibatch.clean();
        self.map.clear();
        // dictionaries stay bound; the mini-batch ramp keeps its size
        Ok(())
    }
}

/// Equality and persistence over row images for one mini-batch: compare
/// is a byte compare of images, append relocates the selected images
/// into the long-lived table
struct FastKeyStore<'a> {
    rows: &'a mut RowTable,
    minibatch: &'a RowTable,
}

impl KeyStore for FastKeyStore<'_> {
    fn equals(&self, row: u16, group_id: u32) -> bool {
        self.minibatch.row(row as usize) == self.rows.row(group_id as usize)
    }

    fn rows_equal(&self, a: u16, b: u16) -> bool {
        self.minibatch.row(a as usize) == self.minibatch.row(b as usize)
    }

    fn append(&mut self, selection: &[u16]) -> Result<()> {
        self.rows
            .append_selection_from(self.minibatch, selection.len(), Some(selection));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::KeyValue;
    use arrow::array::{
        Array, BooleanArray, DictionaryArray, Int32Array, Int8Array, StringArray,
        UInt32Array,
    };
    use arrow::datatypes::Int8Type;

    fn batch(arrays: Vec<ArrayRef>) -> KeyBatch {
        KeyBatch::from_arrays(arrays).unwrap()
    }

    fn int32_batch(values: Vec<Option<i32>>) -> KeyBatch {
        batch(vec![Arc::new(Int32Array::from(values))])
    }

    fn ids_of(array: &UInt32Array) -> Vec<u32> {
        assert_eq!(array.null_count(), 0);
        array.values().to_vec()
    }

    #[test]
    fn single_int32_key() {
        let mut grouper =
            new_grouper(&[DataType::Int32], &ExecContext::new()).unwrap();
        let ids = grouper
            .consume(&int32_batch(vec![Some(3), Some(1), Some(3), Some(1), Some(2)]), 0, None)
            .unwrap();
        assert_eq!(ids_of(&ids), vec![0, 1, 0, 1, 2]);
        assert_eq!(grouper.num_groups(), 3);

        let uniques = grouper.uniques().unwrap();
        let keys = uniques[0].as_any().downcast_ref::<Int32Array>().unwrap();
        assert_eq!(keys.values(), &[3, 1, 2]);
    }

    #[test]
    fn two_column_key() {
        let mut grouper = new_grouper(
            &[DataType::Int32, DataType::Utf8],
            &ExecContext::new(),
        )
        .unwrap();
        let a: ArrayRef = Arc::new(Int32Array::from(vec![1, 1, 1, 2]));
        let b: ArrayRef = Arc::new(StringArray::from(vec!["a", "b", "a", "a"]));
        let ids = grouper.consume(&batch(vec![a, b]), 0, None).unwrap();
        assert_eq!(ids_of(&ids), vec![0, 1, 0, 2]);

        let uniques = grouper.uniques().unwrap();
        let a = uniques[0].as_any().downcast_ref::<Int32Array>().unwrap();
        let b = uniques[1].as_any().downcast_ref::<StringArray>().unwrap();
        assert_eq!(a.values(), &[1, 1, 2]);
        let b: Vec<_> = b.iter().map(|v| v.unwrap()).collect();
        assert_eq!(b, vec!["a", "b", "a"]);
    }

    #[test]
    fn nulls_group_together() {
        let mut grouper =
            new_grouper(&[DataType::Int32], &ExecContext::new()).unwrap();
        let ids = grouper
            .consume(&int32_batch(vec![None, None, Some(1), None]), 0, None)
            .unwrap();
        assert_eq!(ids_of(&ids), vec![0, 0, 1, 0]);
        assert_eq!(grouper.num_groups(), 2);

        let uniques = grouper.uniques().unwrap();
        let keys = uniques[0].as_any().downcast_ref::<Int32Array>().unwrap();
        assert!(keys.is_null(0));
        assert_eq!(keys.value(1), 1);
    }

    #[test]
    fn boolean_keys_take_the_row_image_path() {
        assert!(GrouperFast::can_use(&[DataType::Boolean]));

        let mut grouper =
            new_grouper(&[DataType::Boolean], &ExecContext::new()).unwrap();
        let col: ArrayRef = Arc::new(BooleanArray::from(vec![
            Some(true),
            Some(false),
            None,
            Some(true),
            None,
            Some(false),
        ]));
        let ids = grouper.consume(&batch(vec![col]), 0, None).unwrap();
        assert_eq!(ids_of(&ids), vec![0, 1, 2, 0, 2, 1]);
        assert_eq!(grouper.num_groups(), 3);

        let uniques = grouper.uniques().unwrap();
        let keys = uniques[0].as_any().downcast_ref::<BooleanArray>().unwrap();
        assert!(keys.value(0));
        assert!(!keys.value(1));
        assert!(keys.is_null(2));

        let probe: ArrayRef = Arc::new(BooleanArray::from(vec![Some(false), None]));
        let found = grouper.lookup(&batch(vec![probe]), 0, None).unwrap();
        assert_eq!(found.null_count(), 0);
        assert_eq!(found.value(0), 1);
        assert_eq!(found.value(1), 2);
    }

    #[test]
    fn lookup_marks_absent_rows() {
        let mut grouper =
            new_grouper(&[DataType::Int32], &ExecContext::new()).unwrap();
        grouper
            .consume(&int32_batch(vec![Some(1), Some(2), Some(3)]), 0, None)
            .unwrap();

        let found = grouper
            .lookup(&int32_batch(vec![Some(2), Some(4), Some(1)]), 0, None)
            .unwrap();
        assert_eq!(found.len(), 3);
        assert_eq!(found.value(0), 1);
        assert!(found.is_null(1));
        assert_eq!(found.value(2), 0);
        // lookup must not have inserted
        assert_eq!(grouper.num_groups(), 3);
    }

    #[test]
    fn populate_then_uniques_matches_consume() {
        let values = vec![Some(5), None, Some(5), Some(9), None, Some(7)];
        let ctx = ExecContext::new();

        let mut populated = new_grouper(&[DataType::Int32], &ctx).unwrap();
        populated.populate(&int32_batch(values.clone()), 0, None).unwrap();

        let mut consumed = new_grouper(&[DataType::Int32], &ctx).unwrap();
        consumed.consume(&int32_batch(values), 0, None).unwrap();

        assert_eq!(populated.num_groups(), consumed.num_groups());
        let a = populated.uniques().unwrap();
        let b = consumed.uniques().unwrap();
        assert_eq!(a[0].to_data(), b[0].to_data());
    }

    #[test]
    fn ids_are_stable_across_batches() {
        let mut grouper =
            new_grouper(&[DataType::Int32], &ExecContext::new()).unwrap();
        let first = grouper
            .consume(&int32_batch(vec![Some(10), Some(20)]), 0, None)
            .unwrap();
        let second = grouper
            .consume(&int32_batch(vec![Some(20), Some(30), Some(10)]), 0, None)
            .unwrap();
        assert_eq!(ids_of(&first), vec![0, 1]);
        assert_eq!(ids_of(&second), vec![1, 2, 0]);
    }

    #[test]
    fn minibatch_chunking_does_not_change_output() {
        // spans several mini-batches and a few map resizes
        let values: Vec<Option<i32>> = (0..3000).map(|i| Some(i % 7)).collect();
        let mut grouper =
            new_grouper(&[DataType::Int32], &ExecContext::new()).unwrap();
        let ids = grouper.consume(&int32_batch(values), 0, None).unwrap();
        let expect: Vec<u32> = (0..3000).map(|i| (i % 7) as u32).collect();
        assert_eq!(ids_of(&ids), expect);
        assert_eq!(grouper.num_groups(), 7);
    }

    #[test]
    fn consume_slices_the_batch() {
        let mut grouper =
            new_grouper(&[DataType::Int32], &ExecContext::new()).unwrap();
        let full = int32_batch(vec![Some(9), Some(8), Some(7), Some(8), Some(6)]);
        let ids = grouper.consume(&full, 2, Some(2)).unwrap();
        assert_eq!(ids_of(&ids), vec![0, 1]);
        assert_eq!(grouper.num_groups(), 2);

        assert!(grouper.consume(&full, 6, None).is_err());
        assert!(grouper.consume(&full, 3, Some(3)).is_err());
        // the failed calls inserted nothing
        assert_eq!(grouper.num_groups(), 2);
    }

    #[test]
    fn scalar_columns_broadcast() {
        let mut grouper = new_grouper(
            &[DataType::Int32, DataType::Int32],
            &ExecContext::new(),
        )
        .unwrap();
        let col: ArrayRef = Arc::new(Int32Array::from(vec![1, 2, 1]));
        let scalar: ArrayRef = Arc::new(Int32Array::from(vec![5]));
        let batch = KeyBatch::try_new(
            vec![KeyValue::Array(col), KeyValue::Scalar(scalar)],
            3,
        )
        .unwrap();
        let ids = grouper.consume(&batch, 0, None).unwrap();
        assert_eq!(ids_of(&ids), vec![0, 1, 0]);
    }

    #[test]
    fn shape_mismatch_is_invalid_argument() {
        let mut grouper =
            new_grouper(&[DataType::Int32], &ExecContext::new()).unwrap();
        let wrong_type = batch(vec![
            Arc::new(StringArray::from(vec!["a"])) as ArrayRef
        ]);
        assert!(matches!(
            grouper.consume(&wrong_type, 0, None),
            Err(GrouperError::InvalidArgument(_))
        ));

        let a: ArrayRef = Arc::new(Int32Array::from(vec![1]));
        let b: ArrayRef = Arc::new(Int32Array::from(vec![1]));
        let wrong_arity = batch(vec![a, b]);
        assert!(matches!(
            grouper.consume(&wrong_arity, 0, None),
            Err(GrouperError::InvalidArgument(_))
        ));
    }

    #[test]
    fn dictionary_keys_bind_once() {
        let key_type = DataType::Dictionary(
            Box::new(DataType::Int8),
            Box::new(DataType::Utf8),
        );
        let mut grouper = new_grouper(&[key_type], &ExecContext::new()).unwrap();

        let dict: DictionaryArray<Int8Type> =
            vec!["red", "green", "red", "blue"].into_iter().collect();
        let ids = grouper
            .consume(&batch(vec![Arc::new(dict)]), 0, None)
            .unwrap();
        assert_eq!(ids_of(&ids), vec![0, 1, 0, 2]);

        let uniques = grouper.uniques().unwrap();
        let uniques = uniques[0]
            .as_any()
            .downcast_ref::<DictionaryArray<Int8Type>>()
            .unwrap();
        let values = uniques
            .values()
            .as_any()
            .downcast_ref::<StringArray>()
            .unwrap();
        assert_eq!(values.len(), 3);

        // differing dictionary on a later batch is rejected
        let keys = Int8Array::from(vec![0, 1]);
        let values: ArrayRef =
            Arc::new(StringArray::from(vec!["cyan", "magenta", "yellow"]));
        let other = DictionaryArray::new(keys, values);
        assert!(matches!(
            grouper.consume(&batch(vec![Arc::new(other)]), 0, None),
            Err(GrouperError::NotImplementedDictionaryUnification(_))
        ));
    }

    #[test]
    fn reset_is_idempotent_and_drops_groups() {
        let mut grouper =
            new_grouper(&[DataType::Int32], &ExecContext::new()).unwrap();
        grouper
            .consume(&int32_batch(vec![Some(1), Some(2)]), 0, None)
            .unwrap();
        assert_eq!(grouper.num_groups(), 2);

        grouper.reset().unwrap();
        grouper.reset().unwrap();
        assert_eq!(grouper.num_groups(), 0);
        assert!(grouper.uniques().unwrap()[0].is_empty());

        let ids = grouper
            .consume(&int32_batch(vec![Some(2), Some(1)]), 0, None)
            .unwrap();
        assert_eq!(ids_of(&ids), vec![0, 1]);
    }

    #[test]
    fn identical_groupers_agree() {
        let mut r = 987_654_321_u64;
        let mut next = move || {
            r = r.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            (r >> 33) as i32 % 10
        };
        let batches: Vec<KeyBatch> = (0..4)
            .map(|_| int32_batch((0..257).map(|_| Some(next())).collect()))
            .collect();

        let ctx = ExecContext::new();
        let mut a = new_grouper(&[DataType::Int32], &ctx).unwrap();
        let mut b = new_grouper(&[DataType::Int32], &ctx).unwrap();
        for batch in &batches {
            let ia = a.consume(batch, 0, None).unwrap();
            let ib = b.consume(batch, 0, None).unwrap();
            assert_eq!(ids_of(&ia), ids_of(&ib));
        }
        assert_eq!(
            a.uniques().unwrap()[0].to_data(),
            b.uniques().unwrap()[0].to_data()
        );
    }
}
