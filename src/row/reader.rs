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

//! Converts row images back to arrow arrays

use std::sync::Arc;

use arrow::array::{
    make_array, new_empty_array, Array, ArrayData, ArrayRef, BinaryBuilder,
    BooleanBufferBuilder, BooleanBuilder, NullArray, StringBuilder,
};
use arrow::buffer::{MutableBuffer, NullBuffer};
use arrow::datatypes::DataType;
use arrow::error::ArrowError;
use arrow::util::bit_util::get_bit;

use super::RowTable;
use crate::column::KeyColumnKind;
use crate::error::Result;

/// Decode every column of `rows` into arrays of the given key types, one
/// element per row, in row order.
///
/// `dictionaries` supplies the bound dictionary for each dictionary
/// column (an empty dictionary is attached when none was bound).
pub fn decode_columns(
    rows: &RowTable,
    key_types: &[DataType],
    dictionaries: &[Option<ArrayRef>],
) -> Result<Vec<ArrayRef>> {
    let layout = rows.layout();
    debug_assert_eq!(layout.num_columns(), key_types.len());

    let mut columns = Vec::with_capacity(key_types.len());
    for (i, data_type) in key_types.iter().enumerate() {
        let offset = layout.field_offsets[i];
        let column = match layout.kinds[i] {
            KeyColumnKind::Null => {
                Arc::new(NullArray::new(rows.num_rows())) as ArrayRef
            }
            KeyColumnKind::Boolean => decode_boolean(rows, i, offset),
            KeyColumnKind::Fixed { byte_width } => {
                decode_fixed(rows, i, offset, byte_width, data_type)?
            }
            KeyColumnKind::Dictionary { index_width } => decode_dictionary(
                rows,
                i,
                offset,
                index_width,
                data_type,
                dictionaries[i].as_ref(),
            )?,
            KeyColumnKind::VarBinary => decode_varying(rows, i, offset, data_type)?,
            KeyColumnKind::LargeVarBinary => unreachable!(),
        };
        columns.push(column);
    }
    Ok(columns)
}

fn decode_boolean(rows: &RowTable, column: usize, offset: usize) -> ArrayRef {
    let mut builder = BooleanBuilder::with_capacity(rows.num_rows());
    for row_id in 0..rows.num_rows() {
        let image = rows.row(row_id);
        if get_bit(image, column) {
            builder.append_value(image[offset] != 0);
        } else {
            builder.append_null();
        }
    }
    Arc::new(builder.finish())
}

fn decode_fixed(
    rows: &RowTable,
    column: usize,
    offset: usize,
    byte_width: usize,
    data_type: &DataType,
) -> Result<ArrayRef> {
    let (values, nulls) = decode_fixed_region(rows, column, offset, byte_width);
    let data = ArrayData::builder(data_type.clone())
        .len(rows.num_rows())
        .add_buffer(values.into())
        .nulls(nulls)
        .build()?;
    Ok(make_array(data))
}

fn decode_dictionary(
    rows: &RowTable,
    column: usize,
    offset: usize,
    index_width: usize,
    data_type: &DataType,
    dictionary: Option<&ArrayRef>,
) -> Result<ArrayRef> {
    let DataType::Dictionary(_, value_type) = data_type else {
        unreachable!()
    };
    let dictionary = match dictionary {
        Some(dict) => Arc::clone(dict),
        None => new_empty_array(value_type),
    };
    let (keys, nulls) = decode_fixed_region(rows, column, offset, index_width);
    let data = ArrayData::builder(data_type.clone())
        .len(rows.num_rows())
        .add_buffer(keys.into())
        .nulls(nulls)
        .add_child_data(dictionary.to_data())
        .build()?;
    Ok(make_array(data))
}

fn decode_fixed_region(
    rows: &RowTable,
    column: usize,
    offset: usize,
    byte_width: usize,
) -> (MutableBuffer, Option<NullBuffer>) {
    let num_rows = rows.num_rows();
    let mut values = MutableBuffer::new(num_rows * byte_width);
    let mut validity = BooleanBufferBuilder::new(num_rows);
    let mut null_count = 0;
    for row_id in 0..num_rows {
        let image = rows.row(row_id);
        let valid = get_bit(image, column);
        validity.append(valid);
        if valid {
            values.extend_from_slice(&image[offset..offset + byte_width]);
        } else {
            null_count += 1;
            values.extend_zeros(byte_width);
        }
    }
    let nulls = (null_count > 0).then(|| NullBuffer::new(validity.finish()));
    (values, nulls)
}

fn decode_varying(
    rows: &RowTable,
    column: usize,
    offset: usize,
    data_type: &DataType,
) -> Result<ArrayRef> {
    let num_rows = rows.num_rows();
    match data_type {
        DataType::Utf8 => {
            let mut builder = StringBuilder::with_capacity(num_rows, 0);
            for row_id in 0..num_rows {
                let image = rows.row(row_id);
                if get_bit(image, column) {
                    let value = std::str::from_utf8(varlena(image, offset))
                        .map_err(|e| ArrowError::ParseError(e.to_string()))?;
                    builder.append_value(value);
                } else {
                    builder.append_null();
                }
            }
            Ok(Arc::new(builder.finish()))
        }
        DataType::Binary => {
            let mut builder = BinaryBuilder::with_capacity(num_rows, 0);
            for row_id in 0..num_rows {
                let image = rows.row(row_id);
                if get_bit(image, column) {
                    builder.append_value(varlena(image, offset));
                } else {
                    builder.append_null();
                }
            }
            Ok(Arc::new(builder.finish()))
        }
        _ => unreachable!(),
    }
}

/// Read the payload behind a `(offset << 32 | len)` var-length word
fn varlena(image: &[u8], field_offset: usize) -> &[u8] {
    let word = u64::from_le_bytes(
        image[field_offset..field_offset + 8].try_into().unwrap(),
    );
    let start = (word >> 32) as usize;
    let len = (word & u32::MAX as u64) as usize;
    &image[start..start + len]
}
