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

//! Packs ranges of a columnar batch into row images

use arrow::util::bit_util::{round_upto_power_of_2, set_bit};

use super::{RowLayout, RowTable, ROW_ALIGNMENT};
use crate::column::{KeyColumnKind, KeyColumnView};

/// Byte length row `row` will consume, padding included
pub fn measure_row(layout: &RowLayout, views: &[KeyColumnView], row: usize) -> usize {
    if layout.is_fixed() {
        return layout.fixed_row_width;
    }
    let mut varlena_width = 0;
    for (view, kind) in views.iter().zip(&layout.kinds) {
        if *kind == KeyColumnKind::VarBinary && view.is_valid(row) {
            varlena_width += view.var_value(row).len();
        }
    }
    round_upto_power_of_2(layout.fixed_part_width() + varlena_width, ROW_ALIGNMENT)
}

/// Encode rows `start..start + len` of the viewed batch, appending one
/// image per row to `out`
pub fn encode_rows(
    layout: &RowLayout,
    views: &[KeyColumnView],
    start: usize,
    len: usize,
    out: &mut RowTable,
) {
    debug_assert_eq!(views.len(), layout.num_columns());
    for row in start..start + len {
        let width = measure_row(layout, views, row);
        let image = out.push_zeroed(width);
        write_row(layout, views, row, image);
    }
}

/// Stitch the fields of one key tuple into `out`, which starts zeroed.
/// Null fields leave their bit clear and their slot zeroed, so null
/// compares equal to null and differs from every value.
fn write_row(layout: &RowLayout, views: &[KeyColumnView], row: usize, out: &mut [u8]) {
    let mut varlena_offset = layout.fixed_part_width();
    for (i, (view, kind)) in views.iter().zip(&layout.kinds).enumerate() {
        if !view.is_valid(row) {
            continue;
        }
        set_bit(out, i);
        let offset = layout.field_offsets[i];
        match kind {
            KeyColumnKind::Null => {}
            KeyColumnKind::Boolean => {
                out[offset] = view.bool_value(row) as u8;
            }
            KeyColumnKind::Fixed { byte_width } => {
                out[offset..offset + byte_width]
                    .copy_from_slice(view.fixed_value(row));
            }
            KeyColumnKind::Dictionary { index_width } => {
                out[offset..offset + index_width]
                    .copy_from_slice(view.fixed_value(row));
            }
            KeyColumnKind::VarBinary => {
                let value = view.var_value(row);
                let word = ((varlena_offset as u64) << 32) | value.len() as u64;
                out[offset..offset + 8].copy_from_slice(&word.to_le_bytes());
                out[varlena_offset..varlena_offset + value.len()]
                    .copy_from_slice(value);
                varlena_offset += value.len();
            }
            // planning rejected this kind already
            KeyColumnKind::LargeVarBinary => unreachable!(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use arrow::array::{ArrayRef, Int32Array, StringArray};
    use arrow::datatypes::DataType;

    use super::*;
    use crate::column::KeyColumnView;

    fn views(arrays: &[ArrayRef]) -> Vec<KeyColumnView> {
        arrays
            .iter()
            .map(|a| KeyColumnView::try_new(a).unwrap())
            .collect()
    }

    #[test]
    fn equal_tuples_get_equal_images() {
        let a: ArrayRef =
            Arc::new(Int32Array::from(vec![Some(1), Some(1), None, None, Some(0)]));
        let b: ArrayRef = Arc::new(StringArray::from(vec![
            Some("x"),
            Some("x"),
            Some("x"),
            Some("x"),
            Some(""),
        ]));
        let layout =
            Arc::new(RowLayout::try_new(&[DataType::Int32, DataType::Utf8]).unwrap());
        let mut table = RowTable::new(Arc::clone(&layout));
        encode_rows(&layout, &views(&[a, b]), 0, 5, &mut table);

        assert_eq!(table.row(0), table.row(1));
        assert_eq!(table.row(2), table.row(3));
        assert_ne!(table.row(0), table.row(2));
        // null int differs from zero int even with equal strings
        assert_ne!(table.row(2), table.row(4));
    }

    #[test]
    fn null_string_differs_from_empty_string() {
        let s: ArrayRef = Arc::new(StringArray::from(vec![None, Some("")]));
        let layout = Arc::new(RowLayout::try_new(&[DataType::Utf8]).unwrap());
        let mut table = RowTable::new(Arc::clone(&layout));
        encode_rows(&layout, &views(&[s]), 0, 2, &mut table);
        assert_ne!(table.row(0), table.row(1));
    }

    #[test]
    fn fixed_row_width_is_uniform() {
        let a: ArrayRef = Arc::new(Int32Array::from(vec![5, 6, 7]));
        let layout = Arc::new(RowLayout::try_new(&[DataType::Int32]).unwrap());
        let v = views(&[a]);
        for row in 0..3 {
            assert_eq!(measure_row(&layout, &v, row), layout.fixed_row_width);
        }
    }
}
