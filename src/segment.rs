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

//! [`RowSegmenter`] reports contiguous runs of equal-keyed rows
//!
//! Over a stream of batches, each batch is partitioned into maximal
//! runs of rows whose key tuples are equal; the first run of a batch
//! additionally reports whether it continues the last run of the
//! previous batch.

use arrow::array::Array;
use arrow::datatypes::DataType;

use crate::column::{KeyBatch, KeyColumnKind, KeyColumnView, KeyValue};
use crate::error::Result;
use crate::grouper::{new_grouper, ExecContext, Grouper};

/// Sentinel for "no previous key observed"; never a valid group id
const NO_GROUP_ID: u32 = u32::MAX;

/// By default the first segment of a stream extends: there is nothing
/// to differ from
const DEFAULT_EXTENDS: bool = true;

/// A maximal run of equal-keyed rows within one batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    /// Offset of the run within the batch
    pub offset: usize,
    /// Number of rows in the run
    pub length: usize,
    /// Whether the run reaches the end of the batch and may continue in
    /// the next one
    pub is_open: bool,
    /// Whether this run's key equals the last key of the previous
    /// non-empty batch; always false past a batch's first segment
    pub extends: bool,
}

fn make_segment(batch_length: usize, offset: usize, length: usize, extends: bool) -> Segment {
    Segment {
        offset,
        length,
        is_open: offset + length >= batch_length,
        extends,
    }
}

/// Streams batches and emits their equal-key runs.
///
/// Instances are single-threaded and non-reentrant; [`RowSegmenter::reset`]
/// returns the segmenter to its initial state (no saved key).
pub trait RowSegmenter {
    /// The key schema this segmenter was created for
    fn key_types(&self) -> &[DataType];

    /// Forget the saved key of the previous batch
    fn reset(&mut self) -> Result<()>;

    /// Partition `batch` into maximal equal-key runs, in order; an empty
    /// batch yields no segments and leaves the saved key untouched
    fn segments(&mut self, batch: &KeyBatch) -> Result<Vec<Segment>>;
}

/// Return a [`RowSegmenter`] for the given key schema.
///
/// Zero keys segment every batch into one run; a single non-nullable
/// fixed-width key compares raw key bytes; anything else delegates to a
/// grouper.
pub fn new_segmenter(
    key_types: &[DataType],
    nullable_keys: bool,
    ctx: &ExecContext,
) -> Result<Box<dyn RowSegmenter>> {
    if key_types.is_empty() {
        return Ok(Box::new(NoKeysSegmenter {}));
    }
    if !nullable_keys && key_types.len() == 1 {
        if let Ok(KeyColumnKind::Fixed { byte_width }) =
            KeyColumnKind::try_from_type(&key_types[0])
        {
            return Ok(Box::new(SimpleKeySegmenter::new(
                key_types[0].clone(),
                byte_width,
            )));
        }
    }
    Ok(Box::new(AnyKeysSegmenter::try_new(key_types, ctx)?))
}

/// With no keys the whole stream is one conceptual run
struct NoKeysSegmenter {}

impl RowSegmenter for NoKeysSegmenter {
    fn key_types(&self) -> &[DataType] {
        &[]
    }

    fn reset(&mut self) -> Result<()> {
        Ok(())
    }

    fn segments(&mut self, batch: &KeyBatch) -> Result<Vec<Segment>> {
        batch.check_types(&[])?;
        if batch.is_empty() {
            return Ok(vec![]);
        }
        Ok(vec![make_segment(batch.len(), 0, batch.len(), DEFAULT_EXTENDS)])
    }
}

/// Single non-nullable fixed-width key: adjacent rows compare by raw
/// bytes and the previous batch's last key is saved verbatim
struct SimpleKeySegmenter {
    key_types: Vec<DataType>,
    saved_key: Vec<u8>,
    /// False until the first non-empty batch has been seen
    saved_valid: bool,
}

impl SimpleKeySegmenter {
    fn new(key_type: DataType, byte_width: usize) -> Self {
        Self {
            key_types: vec![key_type],
            saved_key: vec![0; byte_width],
            saved_valid: false,
        }
    }

    fn extend(&mut self, key: &[u8]) -> bool {
        if !self.saved_valid {
            self.saved_valid = true;
            return DEFAULT_EXTENDS;
        }
        self.saved_key == key
    }

    /// Length of the run of rows equal to `offset`'s key
    fn match_length(view: &KeyColumnView, offset: usize) -> usize {
        let key = view.fixed_value(offset);
        let mut cursor = offset + 1;
        while cursor < view.len() && view.fixed_value(cursor) == key {
            cursor += 1;
        }
        cursor - offset
    }
}

impl RowSegmenter for SimpleKeySegmenter {
    fn key_types(&self) -> &[DataType] {
        &self.key_types
    }

    fn reset(&mut self) -> Result<()> {
        self.saved_valid = false;
        Ok(())
    }

    fn segments(&mut self, batch: &KeyBatch) -> Result<Vec<Segment>> {
        batch.check_types(&self.key_types)?;
        if batch.is_empty() {
            return Ok(vec![]);
        }

        let value = &batch.values()[0];
        let view = KeyColumnView::try_new(value.array())?;
        debug_assert_eq!(view.null_count(), 0);

        let mut segments = Vec::new();
        match value {
            KeyValue::Scalar(_) => {
                let key = view.fixed_value(0);
                let extends = self.extend(key);
                segments.push(make_segment(batch.len(), 0, batch.len(), extends));
                self.saved_key.copy_from_slice(key);
            }
            KeyValue::Array(_) => {
                let extends = self.extend(view.fixed_value(0));
                let mut offset = 0;
                while offset < batch.len() {
                    let length = Self::match_length(&view, offset);
                    segments.push(make_segment(
                        batch.len(),
                        offset,
                        length,
                        if offset == 0 { extends } else { false },
                    ));
                    offset += length;
                }
                self.saved_key
                    .copy_from_slice(view.fixed_value(batch.len() - 1));
            }
        }
        Ok(segments)
    }
}

/// General case: a wrapped grouper computes group ids per batch and the
/// id runs become segments.
///
/// The grouper is reset between batches to bound its memory, which makes
/// ids incomparable across batches; continuation is decided by a one-row
/// probe performed before the reset, compared against the saved id of
/// the previous batch's last row.
struct AnyKeysSegmenter {
    key_types: Vec<DataType>,
    grouper: Box<dyn Grouper>,
    saved_group_id: u32,
}

impl AnyKeysSegmenter {
    fn try_new(key_types: &[DataType], ctx: &ExecContext) -> Result<Self> {
        Ok(Self {
            key_types: key_types.to_vec(),
            grouper: new_grouper(key_types, ctx)?,
            saved_group_id: NO_GROUP_ID,
        })
    }

    /// Group id of a single row of `batch`, under the grouper's current
    /// id space
    fn map_group_id_at(&mut self, batch: &KeyBatch, offset: usize) -> Result<u32> {
        let ids = self.grouper.consume(batch, offset, Some(1))?;
        debug_assert_eq!(ids.null_count(), 0);
        Ok(ids.value(0))
    }
}

impl RowSegmenter for AnyKeysSegmenter {
    fn key_types(&self) -> &[DataType] {
        &self.key_types
    }

    fn reset(&mut self) -> Result<()> {
        self.grouper.reset()?;
        self.saved_group_id = NO_GROUP_ID;
        Ok(())
    }

    fn segments(&mut self, batch: &KeyBatch) -> Result<Vec<Segment>> {
        batch.check_types(&self.key_types)?;
        if batch.is_empty() {
            return Ok(vec![]);
        }

        // The first row's group id must be computed before resetting the
        // grouper: after the reset the saved id is incomparable
        let mut extends = DEFAULT_EXTENDS;
        if self.saved_group_id != NO_GROUP_ID {
            let group_id = self.map_group_id_at(batch, 0)?;
            extends = group_id == self.saved_group_id;
        }

        // dropping the ids frees the grouper's memory for the next batch
        self.grouper.reset()?;

        let ids = self.grouper.consume(batch, 0, None)?;
        debug_assert_eq!(ids.null_count(), 0);
        let ids = ids.values();

        let mut segments = Vec::new();
        let mut run_start = 0;
        for cursor in 1..ids.len() {
            if ids[cursor] != ids[run_start] {
                segments.push(make_segment(
                    batch.len(),
                    run_start,
                    cursor - run_start,
                    if run_start == 0 { extends } else { false },
                ));
                run_start = cursor;
            }
        }
        segments.push(make_segment(
            batch.len(),
            run_start,
            ids.len() - run_start,
            if run_start == 0 { extends } else { false },
        ));

        self.saved_group_id = ids[ids.len() - 1];
        Ok(segments)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use arrow::array::{ArrayRef, BooleanArray, Int32Array, StringArray};

    fn int32_batch(values: Vec<i32>) -> KeyBatch {
        KeyBatch::from_arrays(vec![Arc::new(Int32Array::from(values))]).unwrap()
    }

    fn seg(offset: usize, length: usize, is_open: bool, extends: bool) -> Segment {
        Segment {
            offset,
            length,
            is_open,
            extends,
        }
    }

    #[test]
    fn no_keys_single_segment_per_batch() {
        let mut segmenter = new_segmenter(&[], false, &ExecContext::new()).unwrap();
        let batch = KeyBatch::try_new(vec![], 5).unwrap();
        assert_eq!(
            segmenter.segments(&batch).unwrap(),
            vec![seg(0, 5, true, true)]
        );
        let empty = KeyBatch::try_new(vec![], 0).unwrap();
        assert!(segmenter.segments(&empty).unwrap().is_empty());
    }

    #[test]
    fn simple_key_runs_across_batches() {
        let mut segmenter =
            new_segmenter(&[DataType::Int32], false, &ExecContext::new()).unwrap();

        let segments = segmenter.segments(&int32_batch(vec![1, 1, 2])).unwrap();
        assert_eq!(segments, vec![seg(0, 2, false, true), seg(2, 1, true, false)]);

        let segments = segmenter.segments(&int32_batch(vec![2, 2, 3])).unwrap();
        assert_eq!(segments, vec![seg(0, 2, false, true), seg(2, 1, true, false)]);

        // a batch whose first key differs does not extend
        let segments = segmenter.segments(&int32_batch(vec![5])).unwrap();
        assert_eq!(segments, vec![seg(0, 1, true, false)]);

        segmenter.reset().unwrap();
        let segments = segmenter.segments(&int32_batch(vec![5])).unwrap();
        assert_eq!(segments, vec![seg(0, 1, true, true)]);
    }

    #[test]
    fn simple_key_scalar_batch() {
        let mut segmenter =
            new_segmenter(&[DataType::Int32], false, &ExecContext::new()).unwrap();
        segmenter.segments(&int32_batch(vec![7, 7])).unwrap();

        let scalar: ArrayRef = Arc::new(Int32Array::from(vec![7]));
        let batch =
            KeyBatch::try_new(vec![KeyValue::Scalar(scalar)], 3).unwrap();
        assert_eq!(
            segmenter.segments(&batch).unwrap(),
            vec![seg(0, 3, true, true)]
        );
    }

    #[test]
    fn single_boolean_key_runs_across_batches() {
        let mut segmenter =
            new_segmenter(&[DataType::Boolean], false, &ExecContext::new()).unwrap();

        let batch = KeyBatch::from_arrays(vec![Arc::new(BooleanArray::from(vec![
            true, true, false, false, false,
        ])) as ArrayRef])
        .unwrap();
        assert_eq!(
            segmenter.segments(&batch).unwrap(),
            vec![seg(0, 2, false, true), seg(2, 3, true, false)]
        );

        // the next batch opens on the same key and continues the run
        let batch = KeyBatch::from_arrays(vec![Arc::new(BooleanArray::from(vec![
            false, true,
        ])) as ArrayRef])
        .unwrap();
        assert_eq!(
            segmenter.segments(&batch).unwrap(),
            vec![seg(0, 1, false, true), seg(1, 1, true, false)]
        );

        segmenter.reset().unwrap();
        let batch = KeyBatch::from_arrays(vec![
            Arc::new(BooleanArray::from(vec![false])) as ArrayRef
        ])
        .unwrap();
        assert_eq!(
            segmenter.segments(&batch).unwrap(),
            vec![seg(0, 1, true, true)]
        );
    }

    #[test]
    fn any_keys_probe_decides_extension() {
        let key_types = [DataType::Int32, DataType::Utf8];
        let mut segmenter =
            new_segmenter(&key_types, true, &ExecContext::new()).unwrap();

        let a: ArrayRef = Arc::new(Int32Array::from(vec![1, 1, 2, 2]));
        let b: ArrayRef = Arc::new(StringArray::from(vec!["x", "x", "x", "y"]));
        let batch = KeyBatch::from_arrays(vec![a, b]).unwrap();
        assert_eq!(
            segmenter.segments(&batch).unwrap(),
            vec![
                seg(0, 2, false, true),
                seg(2, 1, false, false),
                seg(3, 1, true, false),
            ]
        );

        // next batch starts with the same key tuple (2, "y")
        let a: ArrayRef = Arc::new(Int32Array::from(vec![2, 3]));
        let b: ArrayRef = Arc::new(StringArray::from(vec!["y", "y"]));
        let batch = KeyBatch::from_arrays(vec![a, b]).unwrap();
        assert_eq!(
            segmenter.segments(&batch).unwrap(),
            vec![seg(0, 1, false, true), seg(1, 1, true, false)]
        );

        // and one that does not
        let a: ArrayRef = Arc::new(Int32Array::from(vec![9]));
        let b: ArrayRef = Arc::new(StringArray::from(vec!["y"]));
        let batch = KeyBatch::from_arrays(vec![a, b]).unwrap();
        assert_eq!(
            segmenter.segments(&batch).unwrap(),
            vec![seg(0, 1, true, false)]
        );
    }

    #[test]
    fn any_keys_nullable_runs() {
        // nulls group together, so a null run is one segment
        let mut segmenter =
            new_segmenter(&[DataType::Int32], true, &ExecContext::new()).unwrap();
        let batch = KeyBatch::from_arrays(vec![Arc::new(Int32Array::from(vec![
            None,
            None,
            Some(1),
            None,
        ])) as ArrayRef])
        .unwrap();
        assert_eq!(
            segmenter.segments(&batch).unwrap(),
            vec![
                seg(0, 2, false, true),
                seg(2, 1, false, false),
                seg(3, 1, true, false),
            ]
        );
    }

    #[test]
    fn empty_batches_preserve_saved_key() {
        let mut segmenter =
            new_segmenter(&[DataType::Int32], false, &ExecContext::new()).unwrap();
        segmenter.segments(&int32_batch(vec![4])).unwrap();
        assert!(segmenter.segments(&int32_batch(vec![])).unwrap().is_empty());
        let segments = segmenter.segments(&int32_batch(vec![4])).unwrap();
        assert_eq!(segments, vec![seg(0, 1, true, true)]);
    }

    #[test]
    fn batch_shape_is_checked() {
        let mut segmenter =
            new_segmenter(&[DataType::Int32], false, &ExecContext::new()).unwrap();
        let wrong = KeyBatch::from_arrays(vec![
            Arc::new(StringArray::from(vec!["a"])) as ArrayRef
        ])
        .unwrap();
        assert!(segmenter.segments(&wrong).is_err());
    }
}
