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

//! Inverts a group-id array into a partitioning of row indices

use std::sync::Arc;

use arrow::array::{Array, ListArray, UInt32Array};
use arrow::buffer::{OffsetBuffer, ScalarBuffer};
use arrow::compute::take;
use arrow::datatypes::{DataType, Field};

use crate::error::Result;
use crate::invalid_ids_err;

/// Build a list array partitioning `0..ids.len()` by group id: entry `g`
/// lists, in ascending order, the positions `i` with `ids[i] == g`.
///
/// One counting pass, one prefix sum and one placement pass. Fails with
/// `InvalidIds` if `ids` contains nulls or an id is not below
/// `num_groups`.
pub fn make_groupings(ids: &UInt32Array, num_groups: u32) -> Result<ListArray> {
    if ids.null_count() != 0 {
        return invalid_ids_err!("cannot make groupings out of {} null ids", ids.null_count());
    }
    let num_groups = num_groups as usize;

    let mut offsets = vec![0_i32; num_groups + 1];
    for &id in ids.values() {
        if id as usize >= num_groups {
            return invalid_ids_err!("id {id} out of bounds for {num_groups} groups");
        }
        offsets[id as usize + 1] += 1;
    }
    for g in 0..num_groups {
        offsets[g + 1] += offsets[g];
    }

    let mut cursors = offsets.clone();
    let mut permutation = vec![0_u32; ids.len()];
    for (position, &id) in ids.values().iter().enumerate() {
        permutation[cursors[id as usize] as usize] = position as u32;
        cursors[id as usize] += 1;
    }

    let field = Arc::new(Field::new("item", DataType::UInt32, false));
    let offsets = OffsetBuffer::new(ScalarBuffer::from(offsets));
    let values = Arc::new(UInt32Array::from(permutation));
    Ok(ListArray::try_new(field, offsets, values, None)?)
}

/// Gather `values` by a groupings' permutation and re-wrap the result
/// with the same offsets, yielding one list of values per group
pub fn apply_groupings(groupings: &ListArray, values: &dyn Array) -> Result<ListArray> {
    let sorted = take(values, groupings.values().as_ref(), None)?;
    let field = Arc::new(Field::new("item", values.data_type().clone(), true));
    Ok(ListArray::try_new(
        field,
        groupings.offsets().clone(),
        sorted,
        None,
    )?)
}
