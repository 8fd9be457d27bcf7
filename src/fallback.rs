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

//! Byte-string grouper used when the row-image path is unavailable
//!
//! Each key tuple encodes to a byte string: the concatenation, in column
//! order, of `[validity byte][field payload]` fields, with
//! length-prefixed payloads for variable-length columns. A map from byte
//! string to group id does the interning, and the concatenated strings
//! are retained so [`GrouperBytes::uniques`] can replay every key
//! through the per-column decoders in insertion order.

use std::sync::Arc;

use ahash::RandomState;
use arrow::array::{
    make_array, new_empty_array, Array, ArrayData, ArrayRef, BinaryBuilder,
    BooleanBufferBuilder, BooleanBuilder, LargeBinaryBuilder, LargeStringBuilder,
    NullArray, StringBuilder, UInt32Array,
};
use arrow::buffer::{MutableBuffer, NullBuffer, ScalarBuffer};
use arrow::datatypes::DataType;
use arrow::error::ArrowError;
use hashbrown::HashMap;

use crate::column::{batch_views, KeyBatch, KeyColumnKind, KeyColumnView};
use crate::error::{GrouperError, Result};
use crate::grouper::{check_and_cap, ExecContext, Grouper, GrouperMode};

const NULL_BYTE: u8 = 0;
const VALID_BYTE: u8 = 1;

/// Per-column encoder for the byte-string key format
enum KeyEncoder {
    Boolean,
    FixedWidth {
        byte_width: usize,
    },
    Dictionary {
        index_width: usize,
        /// Bound on the first batch; later batches must match
        dictionary: Option<ArrayRef>,
    },
    VarLength {
        large: bool,
    },
    Null,
}

impl KeyEncoder {
    fn try_new(data_type: &DataType) -> Result<Self> {
        Ok(match KeyColumnKind::try_from_type(data_type)? {
            KeyColumnKind::Boolean => Self::Boolean,
            KeyColumnKind::Fixed { byte_width } => Self::FixedWidth { byte_width },
            KeyColumnKind::Dictionary { index_width } => Self::Dictionary {
                index_width,
                dictionary: None,
            },
            KeyColumnKind::VarBinary => Self::VarLength { large: false },
            KeyColumnKind::LargeVarBinary => Self::VarLength { large: true },
            KeyColumnKind::Null => Self::Null,
        })
    }

    /// Add this column's contribution to each row's encoded length
    fn add_lengths(&self, view: &KeyColumnView, lengths: &mut [usize]) {
        match self {
            Self::Boolean => lengths.iter_mut().for_each(|l| *l += 2),
            Self::FixedWidth { byte_width } => {
                lengths.iter_mut().for_each(|l| *l += 1 + byte_width)
            }
            Self::Dictionary { index_width, .. } => {
                lengths.iter_mut().for_each(|l| *l += 1 + index_width)
            }
            Self::VarLength { large } => {
                let prefix = 1 + if *large { 8 } else { 4 };
                for (row, length) in lengths.iter_mut().enumerate() {
                    *length += prefix;
                    if view.is_valid(row) {
                        *length += if *large {
                            view.large_var_value(row).len()
                        } else {
                            view.var_value(row).len()
                        };
                    }
                }
            }
            Self::Null => {}
        }
    }

    /// Write this column's field of every row at `cursors[row]`,
    /// advancing the cursors past the written bytes
    fn encode(
        &mut self,
        view: &KeyColumnView,
        buffer: &mut [u8],
        cursors: &mut [usize],
    ) -> Result<()> {
        if let Self::Dictionary { dictionary, .. } = self {
            let batch_dictionary = view.dictionary();
            match dictionary {
                Some(bound) if bound.to_data() != batch_dictionary.to_data() => {
                    return Err(GrouperError::UnsupportedDictionary(
                        "batch dictionary differs from the one bound on the first \
                         batch"
                            .into(),
                    ))
                }
                Some(_) => {}
                None => *dictionary = Some(batch_dictionary),
            }
        }

        for (row, cursor) in cursors.iter_mut().enumerate() {
            let valid = view.is_valid(row);
            match self {
                Self::Null => continue,
                Self::Boolean => {
                    buffer[*cursor] = if valid { VALID_BYTE } else { NULL_BYTE };
                    buffer[*cursor + 1] = (valid && view.bool_value(row)) as u8;
                    *cursor += 2;
                }
                Self::FixedWidth { byte_width }
                | Self::Dictionary {
                    index_width: byte_width,
                    ..
                } => {
                    buffer[*cursor] = if valid { VALID_BYTE } else { NULL_BYTE };
                    *cursor += 1;
                    if valid {
                        buffer[*cursor..*cursor + *byte_width]
                            .copy_from_slice(view.fixed_value(row));
                    } else {
                        buffer[*cursor..*cursor + *byte_width].fill(0);
                    }
                    *cursor += *byte_width;
                }
                Self::VarLength { large } => {
                    buffer[*cursor] = if valid { VALID_BYTE } else { NULL_BYTE };
                    *cursor += 1;
                    let value: &[u8] = if !valid {
                        &[]
                    } else if *large {
                        view.large_var_value(row)
                    } else {
                        view.var_value(row)
                    };
                    if *large {
                        buffer[*cursor..*cursor + 8]
                            .copy_from_slice(&(value.len() as u64).to_le_bytes());
                        *cursor += 8;
                    } else {
                        buffer[*cursor..*cursor + 4]
                            .copy_from_slice(&(value.len() as u32).to_le_bytes());
                        *cursor += 4;
                    }
                    buffer[*cursor..*cursor + value.len()].copy_from_slice(value);
                    *cursor += value.len();
                }
            }
        }
        Ok(())
    }

    /// Read this column's field of `num_groups` stored keys starting at
    /// `cursors`, advancing the cursors, and materialize the column
    fn decode(
        &self,
        data_type: &DataType,
        key_bytes: &[u8],
        cursors: &mut [usize],
        num_groups: usize,
    ) -> Result<ArrayRef> {
        match self {
            Self::Null => Ok(Arc::new(NullArray::new(num_groups))),
            Self::Boolean => {
                let mut builder = BooleanBuilder::with_capacity(num_groups);
                for cursor in cursors.iter_mut() {
                    let valid = key_bytes[*cursor] == VALID_BYTE;
                    if valid {
                        builder.append_value(key_bytes[*cursor + 1] != 0);
                    } else {
                        builder.append_null();
                    }
                    *cursor += 2;
                }
                Ok(Arc::new(builder.finish()))
            }
            Self::FixedWidth { byte_width } => {
                let (values, nulls) =
                    decode_fixed_fields(key_bytes, cursors, *byte_width);
                let data = ArrayData::builder(data_type.clone())
                    .len(num_groups)
                    .add_buffer(values.into())
                    .nulls(nulls)
                    .build()?;
                Ok(make_array(data))
            }
            Self::Dictionary {
                index_width,
                dictionary,
            } => {
                let DataType::Dictionary(_, value_type) = data_type else {
                    unreachable!()
                };
                let dictionary = match dictionary {
                    Some(dict) => Arc::clone(dict),
                    None => new_empty_array(value_type),
                };
                let (keys, nulls) =
                    decode_fixed_fields(key_bytes, cursors, *index_width);
                let data = ArrayData::builder(data_type.clone())
                    .len(num_groups)
                    .add_buffer(keys.into())
                    .nulls(nulls)
                    .add_child_data(dictionary.to_data())
                    .build()?;
                Ok(make_array(data))
            }
            Self::VarLength { .. } => {
                decode_varlength_fields(self, data_type, key_bytes, cursors, num_groups)
            }
        }
    }
}

fn decode_fixed_fields(
    key_bytes: &[u8],
    cursors: &mut [usize],
    byte_width: usize,
) -> (MutableBuffer, Option<NullBuffer>) {
    let mut values = MutableBuffer::new(cursors.len() * byte_width);
    let mut validity = BooleanBufferBuilder::new(cursors.len());
    let mut null_count = 0;
    for cursor in cursors.iter_mut() {
        let valid = key_bytes[*cursor] == VALID_BYTE;
        validity.append(valid);
        null_count += !valid as usize;
        values.extend_from_slice(&key_bytes[*cursor + 1..*cursor + 1 + byte_width]);
        *cursor += 1 + byte_width;
    }
    let nulls = (null_count > 0).then(|| NullBuffer::new(validity.finish()));
    (values, nulls)
}

fn decode_varlength_fields(
    encoder: &KeyEncoder,
    data_type: &DataType,
    key_bytes: &[u8],
    cursors: &mut [usize],
    num_groups: usize,
) -> Result<ArrayRef> {
    let KeyEncoder::VarLength { large } = encoder else {
        unreachable!()
    };
    let mut fields = Vec::with_capacity(num_groups);
    for cursor in cursors.iter_mut() {
        let valid = key_bytes[*cursor] == VALID_BYTE;
        *cursor += 1;
        let len = if *large {
            let len = u64::from_le_bytes(
                key_bytes[*cursor..*cursor + 8].try_into().unwrap(),
            ) as usize;
            *cursor += 8;
            len
        } else {
            let len = u32::from_le_bytes(
                key_bytes[*cursor..*cursor + 4].try_into().unwrap(),
            ) as usize;
            *cursor += 4;
            len
        };
        let value = &key_bytes[*cursor..*cursor + len];
        *cursor += len;
        fields.push(valid.then_some(value));
    }

    let as_str = |value: &[u8]| {
        std::str::from_utf8(value)
            .map(str::to_owned)
            .map_err(|e| ArrowError::ParseError(e.to_string()))
    };
    Ok(match data_type {
        DataType::Utf8 => {
            let mut builder = StringBuilder::with_capacity(num_groups, 0);
            for field in fields {
                match field {
                    Some(v) => builder.append_value(as_str(v)?),
                    None => builder.append_null(),
                }
            }
            Arc::new(builder.finish())
        }
        DataType::LargeUtf8 => {
            let mut builder = LargeStringBuilder::with_capacity(num_groups, 0);
            for field in fields {
                match field {
                    Some(v) => builder.append_value(as_str(v)?),
                    None => builder.append_null(),
                }
            }
            Arc::new(builder.finish())
        }
        DataType::Binary => {
            let mut builder = BinaryBuilder::with_capacity(num_groups, 0);
            for field in fields {
                match field {
                    Some(v) => builder.append_value(v),
                    None => builder.append_null(),
                }
            }
            Arc::new(builder.finish())
        }
        DataType::LargeBinary => {
            let mut builder = LargeBinaryBuilder::with_capacity(num_groups, 0);
            for field in fields {
                match field {
                    Some(v) => builder.append_value(v),
                    None => builder.append_null(),
                }
            }
            Arc::new(builder.finish())
        }
        _ => unreachable!(),
    })
}

/// Encoding-to-string grouper.
///
/// Selected when the key set is empty, the host is big-endian or a key
/// column carries 64-bit offsets; shares the [`Grouper`] contract with
/// the row-image implementation.
pub(crate) struct GrouperBytes {
    key_types: Vec<DataType>,
    encoders: Vec<KeyEncoder>,
    /// Interned key byte strings to group id
    map: HashMap<Box<[u8]>, u32, RandomState>,
    /// Prefix sums into `key_bytes`, one entry per group plus the end
    offsets: Vec<usize>,
    /// Concatenated key byte strings, in insertion order
    key_bytes: Vec<u8>,
}

impl GrouperBytes {
    pub(crate) fn try_new(key_types: &[DataType], ctx: &ExecContext) -> Result<Self> {
        let encoders = key_types
            .iter()
            .map(KeyEncoder::try_new)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            key_types: key_types.to_vec(),
            encoders,
            map: HashMap::with_hasher(ctx.random_state().clone()),
            offsets: vec![0],
            key_bytes: Vec::new(),
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
            return self.consume_sliced(&sliced, mode);
        }
        self.consume_sliced(batch, mode)
    }

    fn consume_sliced(
        &mut self,
        batch: &KeyBatch,
        mode: GrouperMode,
    ) -> Result<Option<UInt32Array>> {
        let batch = batch.broadcast_scalars()?;
        let views = batch_views(&batch)?;
        let num_rows = batch.len();

        let mut row_lengths = vec![0_usize; num_rows];
        for (encoder, view) in self.encoders.iter().zip(&views) {
            encoder.add_lengths(view, &mut row_lengths);
        }

        let mut row_offsets = Vec::with_capacity(num_rows + 1);
        let mut total = 0;
        for length in &row_lengths {
            row_offsets.push(total);
            total += length;
        }
        row_offsets.push(total);

        let mut buffer = vec![0_u8; total];
        let mut cursors = row_offsets[..num_rows].to_vec();
        for (encoder, view) in self.encoders.iter_mut().zip(&views) {
            encoder.encode(view, &mut buffer, &mut cursors)?;
        }

        let mut ids = Vec::with_capacity(num_rows);
        let mut found_bits = Vec::with_capacity(num_rows);
        for row in 0..num_rows {
            let key = &buffer[row_offsets[row]..row_offsets[row + 1]];
            match mode {
                GrouperMode::Populate | GrouperMode::Consume => {
                    let group_id = match self.map.get(key) {
                        Some(&group_id) => group_id,
                        None => {
                            let group_id = self.map.len() as u32;
                            self.map.insert(Box::from(key), group_id);
                            self.key_bytes.extend_from_slice(key);
                            self.offsets.push(self.key_bytes.len());
                            group_id
                        }
                    };
                    ids.push(group_id);
                }
                GrouperMode::Lookup => match self.map.get(key) {
                    Some(&group_id) => {
                        ids.push(group_id);
                        found_bits.push(true);
                    }
                    None => {
                        // any defined value really
                        ids.push(0);
                        found_bits.push(false);
                    }
                },
            }
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
}

impl Grouper for GrouperBytes {
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
        self.map.len() as u32
    }

    fn uniques(&self) -> Result<Vec<ArrayRef>> {
        let num_groups = self.map.len();
        let mut cursors = self.offsets[..num_groups].to_vec();
        self.key_types
            .iter()
            .zip(&self.encoders)
            .map(|(data_type, encoder)| {
                encoder.decode(data_type, &self.key_bytes, &mut cursors, num_groups)
            })
            .collect()
    }

    fn reset(&mut self) -> Result<()> {
        self.map.clear();
        self.offsets.truncate(1);
        self.key_bytes.clear();
        // dictionaries bound in the encoders stay bound
        Ok(())
    }
}
